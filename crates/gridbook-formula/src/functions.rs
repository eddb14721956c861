//! Built-in function registry.
//!
//! The legacy token stream encodes built-ins as a 16-bit function index in
//! the `PtgFunc`/`PtgFuncVar` tokens. Function identity is that numeric
//! index; display names (and locale variants, see [`crate::locale`]) hang
//! off it. Lookups that miss are hard failures at the call site, never
//! defaulted.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionSpec {
    pub id: u16,
    pub name: &'static str,
    pub min_args: u8,
    pub max_args: u8,
    /// Volatile functions force the serializer's volatile attribute prefix.
    pub volatile: bool,
}

impl FunctionSpec {
    /// `Some(n)` when the function always takes exactly `n` arguments and is
    /// therefore encoded with the fixed-arity function opcode.
    #[must_use]
    pub fn fixed_arity(&self) -> Option<u8> {
        (self.min_args == self.max_args).then_some(self.min_args)
    }
}

const fn f(id: u16, name: &'static str, min_args: u8, max_args: u8) -> FunctionSpec {
    FunctionSpec {
        id,
        name,
        min_args,
        max_args,
        volatile: false,
    }
}

const fn fv(id: u16, name: &'static str, min_args: u8, max_args: u8) -> FunctionSpec {
    FunctionSpec {
        id,
        name,
        min_args,
        max_args,
        volatile: true,
    }
}

/// Variable-arity functions accept up to the legacy 30-argument limit.
const MAX_VAR_ARGS: u8 = 30;

// Function indices follow the legacy published function table. Entries are
// ordered by id. Arity bounds are the legacy ones, not the current
// spreadsheet application's.
pub(crate) const FUNCTION_SPECS: &[FunctionSpec] = &[
    f(0, "COUNT", 1, MAX_VAR_ARGS),
    f(1, "IF", 2, 3),
    f(2, "ISNA", 1, 1),
    f(3, "ISERROR", 1, 1),
    f(4, "SUM", 1, MAX_VAR_ARGS),
    f(5, "AVERAGE", 1, MAX_VAR_ARGS),
    f(6, "MIN", 1, MAX_VAR_ARGS),
    f(7, "MAX", 1, MAX_VAR_ARGS),
    f(8, "ROW", 0, 1),
    f(9, "COLUMN", 0, 1),
    f(10, "NA", 0, 0),
    f(11, "NPV", 2, MAX_VAR_ARGS),
    f(12, "STDEV", 1, MAX_VAR_ARGS),
    f(13, "DOLLAR", 1, 2),
    f(14, "FIXED", 2, 3),
    f(15, "SIN", 1, 1),
    f(16, "COS", 1, 1),
    f(17, "TAN", 1, 1),
    f(18, "ATAN", 1, 1),
    f(19, "PI", 0, 0),
    f(20, "SQRT", 1, 1),
    f(21, "EXP", 1, 1),
    f(22, "LN", 1, 1),
    f(23, "LOG10", 1, 1),
    f(24, "ABS", 1, 1),
    f(25, "INT", 1, 1),
    f(26, "SIGN", 1, 1),
    f(27, "ROUND", 2, 2),
    f(28, "LOOKUP", 2, 3),
    f(29, "INDEX", 2, 4),
    f(30, "REPT", 2, 2),
    f(31, "MID", 3, 3),
    f(32, "LEN", 1, 1),
    f(33, "VALUE", 1, 1),
    f(34, "TRUE", 0, 0),
    f(35, "FALSE", 0, 0),
    f(36, "AND", 1, MAX_VAR_ARGS),
    f(37, "OR", 1, MAX_VAR_ARGS),
    f(38, "NOT", 1, 1),
    f(39, "MOD", 2, 2),
    f(40, "DCOUNT", 3, 3),
    f(41, "DSUM", 3, 3),
    f(42, "DAVERAGE", 3, 3),
    f(43, "DMIN", 3, 3),
    f(44, "DMAX", 3, 3),
    f(45, "DSTDEV", 3, 3),
    f(46, "VAR", 1, MAX_VAR_ARGS),
    f(47, "DVAR", 3, 3),
    f(48, "TEXT", 2, 2),
    f(56, "PV", 3, 5),
    f(57, "FV", 3, 5),
    f(58, "NPER", 3, 5),
    f(59, "PMT", 3, 5),
    f(60, "RATE", 3, 6),
    f(61, "MIRR", 3, 3),
    f(62, "IRR", 1, 2),
    fv(63, "RAND", 0, 0),
    f(64, "MATCH", 2, 3),
    f(65, "DATE", 3, 3),
    f(66, "TIME", 3, 3),
    f(67, "DAY", 1, 1),
    f(68, "MONTH", 1, 1),
    f(69, "YEAR", 1, 1),
    f(70, "WEEKDAY", 1, 2),
    f(71, "HOUR", 1, 1),
    f(72, "MINUTE", 1, 1),
    f(73, "SECOND", 1, 1),
    fv(74, "NOW", 0, 0),
    f(75, "AREAS", 1, 1),
    f(76, "ROWS", 1, 1),
    f(77, "COLUMNS", 1, 1),
    fv(78, "OFFSET", 3, 5),
    f(82, "SEARCH", 2, 3),
    f(83, "TRANSPOSE", 1, 1),
    f(86, "TYPE", 1, 1),
    f(97, "ATAN2", 2, 2),
    f(98, "ASIN", 1, 1),
    f(99, "ACOS", 1, 1),
    f(100, "CHOOSE", 2, MAX_VAR_ARGS),
    f(101, "HLOOKUP", 3, 4),
    f(102, "VLOOKUP", 3, 4),
    f(105, "ISREF", 1, 1),
    f(109, "LOG", 1, 2),
    f(111, "CHAR", 1, 1),
    f(112, "LOWER", 1, 1),
    f(113, "UPPER", 1, 1),
    f(114, "PROPER", 1, 1),
    f(115, "LEFT", 1, 2),
    f(116, "RIGHT", 1, 2),
    f(117, "EXACT", 2, 2),
    f(118, "TRIM", 1, 1),
    f(119, "REPLACE", 4, 4),
    f(120, "SUBSTITUTE", 3, 4),
    f(121, "CODE", 1, 1),
    f(124, "FIND", 2, 3),
    fv(125, "CELL", 1, 2),
    f(126, "ISERR", 1, 1),
    f(127, "ISTEXT", 1, 1),
    f(128, "ISNUMBER", 1, 1),
    f(129, "ISBLANK", 1, 1),
    f(130, "T", 1, 1),
    f(131, "N", 1, 1),
    f(140, "DATEVALUE", 1, 1),
    f(141, "TIMEVALUE", 1, 1),
    f(142, "SLN", 3, 3),
    f(143, "SYD", 4, 4),
    f(144, "DDB", 4, 5),
    fv(148, "INDIRECT", 1, 2),
    f(162, "CLEAN", 1, 1),
    f(163, "MDETERM", 1, 1),
    f(164, "MINVERSE", 1, 1),
    f(165, "MMULT", 2, 2),
    f(167, "IPMT", 4, 6),
    f(168, "PPMT", 4, 6),
    f(169, "COUNTA", 1, MAX_VAR_ARGS),
    f(183, "PRODUCT", 1, MAX_VAR_ARGS),
    f(184, "FACT", 1, 1),
    f(189, "DPRODUCT", 3, 3),
    f(190, "ISNONTEXT", 1, 1),
    f(193, "STDEVP", 1, MAX_VAR_ARGS),
    f(194, "VARP", 1, MAX_VAR_ARGS),
    f(195, "DSTDEVP", 3, 3),
    f(196, "DVARP", 3, 3),
    f(197, "TRUNC", 1, 2),
    f(198, "ISLOGICAL", 1, 1),
    f(199, "DCOUNTA", 3, 3),
    f(212, "ROUNDUP", 2, 2),
    f(213, "ROUNDDOWN", 2, 2),
    f(216, "RANK", 2, 3),
    f(219, "ADDRESS", 2, 5),
    f(220, "DAYS360", 2, 3),
    fv(221, "TODAY", 0, 0),
    f(222, "VDB", 5, 7),
    f(227, "MEDIAN", 1, MAX_VAR_ARGS),
    f(228, "SUMPRODUCT", 1, MAX_VAR_ARGS),
    f(229, "SINH", 1, 1),
    f(230, "COSH", 1, 1),
    f(231, "TANH", 1, 1),
    f(232, "ASINH", 1, 1),
    f(233, "ACOSH", 1, 1),
    f(234, "ATANH", 1, 1),
    fv(244, "INFO", 1, 1),
    f(252, "FREQUENCY", 2, 2),
    f(261, "ERROR.TYPE", 1, 1),
    f(269, "AVEDEV", 1, MAX_VAR_ARGS),
    f(276, "COMBIN", 2, 2),
    f(279, "EVEN", 1, 1),
    f(285, "FLOOR", 2, 2),
    f(288, "CEILING", 2, 2),
    f(298, "ODD", 1, 1),
    f(300, "PERMUT", 2, 2),
    f(303, "SUMSQ", 1, MAX_VAR_ARGS),
    f(307, "SLOPE", 2, 2),
    f(308, "TTEST", 4, 4),
    f(311, "INTERCEPT", 2, 2),
    f(315, "SMALL", 2, 2),
    f(316, "LARGE", 2, 2),
    f(317, "QUARTILE", 2, 2),
    f(318, "PERCENTILE", 2, 2),
    f(319, "PERCENTRANK", 2, 3),
    f(320, "MODE", 1, MAX_VAR_ARGS),
    f(325, "POWER", 2, 2),
    f(336, "CONCATENATE", 1, MAX_VAR_ARGS),
    f(342, "RADIANS", 1, 1),
    f(343, "DEGREES", 1, 1),
    f(344, "SUBTOTAL", 2, MAX_VAR_ARGS),
    f(345, "SUMIF", 2, 3),
    f(346, "COUNTIF", 2, 2),
    f(347, "COUNTBLANK", 1, 1),
    f(350, "ISPMT", 4, 4),
    f(354, "ROMAN", 1, 2),
    f(359, "HYPERLINK", 1, 2),
    f(361, "AVERAGEA", 1, MAX_VAR_ARGS),
    f(362, "MAXA", 1, MAX_VAR_ARGS),
    f(363, "MINA", 1, MAX_VAR_ARGS),
    f(364, "STDEVPA", 1, MAX_VAR_ARGS),
    f(365, "VARPA", 1, MAX_VAR_ARGS),
    f(366, "STDEVA", 1, MAX_VAR_ARGS),
    f(367, "VARA", 1, MAX_VAR_ARGS),
];

/// Function index used by the serializer's inlined-IF terminator marker.
pub const IFTAB_IF: u16 = 1;
/// Function index of SUM (inlined as an attribute when called with one arg).
pub const IFTAB_SUM: u16 = 4;
/// Function index of SUMPRODUCT (area arguments take the array-class opcode).
pub const IFTAB_SUMPRODUCT: u16 = 228;

#[must_use]
pub fn function_spec_from_id(id: u16) -> Option<FunctionSpec> {
    FUNCTION_SPECS.iter().find(|spec| spec.id == id).copied()
}

/// Canonical (en-US) name lookup. Case-insensitive.
#[must_use]
pub fn function_spec_from_name(name: &str) -> Option<FunctionSpec> {
    let upper = name.trim().to_ascii_uppercase();
    FUNCTION_SPECS
        .iter()
        .find(|spec| spec.name == upper)
        .copied()
}
