//! Ptg opcode registry for the BIFF8 rgce token stream.
//!
//! Operator and constant tokens are single classless bytes. Operand tokens
//! carry an operand class in bits 5-6 of the opcode: the reference class is
//! the base value, the value class adds `0x20`, the array class adds `0x40`
//! (PtgRef is `0x24` / `0x44` / `0x64`).

use gridbook_formula::ParseContext;

/// Operand class of a classed token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PtgClass {
    Ref,
    Value,
    Array,
}

impl PtgClass {
    const fn offset(self) -> u8 {
        match self {
            PtgClass::Ref => 0x00,
            PtgClass::Value => 0x20,
            PtgClass::Array => 0x40,
        }
    }
}

impl From<ParseContext> for PtgClass {
    fn from(ctx: ParseContext) -> Self {
        match ctx {
            ParseContext::Default => PtgClass::Value,
            ParseContext::DataValidation => PtgClass::Ref,
            ParseContext::Array => PtgClass::Array,
        }
    }
}

/// One variant per rgce construct the codec understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ptg {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Concat,
    Lt,
    Le,
    Eq,
    Ge,
    Gt,
    Ne,
    Isect,
    Union,
    Range,
    UnaryPlus,
    UnaryMinus,
    Percent,
    Paren,
    MissingArg,
    Str,
    Attr,
    Err,
    Bool,
    Int,
    Num,
    Func,
    FuncVar,
    Name,
    Ref,
    Area,
    MemArea,
    MemFunc,
    RefN,
    AreaN,
    Ref3d,
    Area3d,
}

impl Ptg {
    /// Base opcode byte (reference class for classed tokens).
    pub const fn base(self) -> u8 {
        match self {
            Ptg::Add => 0x03,
            Ptg::Sub => 0x04,
            Ptg::Mul => 0x05,
            Ptg::Div => 0x06,
            Ptg::Pow => 0x07,
            Ptg::Concat => 0x08,
            Ptg::Lt => 0x09,
            Ptg::Le => 0x0A,
            Ptg::Eq => 0x0B,
            Ptg::Ge => 0x0C,
            Ptg::Gt => 0x0D,
            Ptg::Ne => 0x0E,
            Ptg::Isect => 0x0F,
            Ptg::Union => 0x10,
            Ptg::Range => 0x11,
            Ptg::UnaryPlus => 0x12,
            Ptg::UnaryMinus => 0x13,
            Ptg::Percent => 0x14,
            Ptg::Paren => 0x15,
            Ptg::MissingArg => 0x16,
            Ptg::Str => 0x17,
            Ptg::Attr => 0x19,
            Ptg::Err => 0x1C,
            Ptg::Bool => 0x1D,
            Ptg::Int => 0x1E,
            Ptg::Num => 0x1F,
            Ptg::Func => 0x21,
            Ptg::FuncVar => 0x22,
            Ptg::Name => 0x23,
            Ptg::Ref => 0x24,
            Ptg::Area => 0x25,
            Ptg::MemArea => 0x26,
            Ptg::MemFunc => 0x29,
            Ptg::RefN => 0x2C,
            Ptg::AreaN => 0x2D,
            Ptg::Ref3d => 0x3A,
            Ptg::Area3d => 0x3B,
        }
    }

    /// Whether the opcode carries an operand class in bits 5-6.
    pub const fn is_classed(self) -> bool {
        self.base() >= 0x20
    }

    /// Opcode byte for the given operand class. Classless tokens ignore the
    /// class.
    pub const fn code(self, class: PtgClass) -> u8 {
        if self.is_classed() {
            self.base() + class.offset()
        } else {
            self.base()
        }
    }

    pub const fn code_ref(self) -> u8 {
        self.code(PtgClass::Ref)
    }

    pub const fn code_value(self) -> u8 {
        self.code(PtgClass::Value)
    }

    pub const fn code_array(self) -> u8 {
        self.code(PtgClass::Array)
    }

    /// Inverse opcode lookup. `None` for bytes outside the known token set;
    /// callers treat that as a hard decode failure, never a default.
    pub fn classify(byte: u8) -> Option<(Ptg, PtgClass)> {
        if byte < 0x20 {
            let ptg = match byte {
                0x03 => Ptg::Add,
                0x04 => Ptg::Sub,
                0x05 => Ptg::Mul,
                0x06 => Ptg::Div,
                0x07 => Ptg::Pow,
                0x08 => Ptg::Concat,
                0x09 => Ptg::Lt,
                0x0A => Ptg::Le,
                0x0B => Ptg::Eq,
                0x0C => Ptg::Ge,
                0x0D => Ptg::Gt,
                0x0E => Ptg::Ne,
                0x0F => Ptg::Isect,
                0x10 => Ptg::Union,
                0x11 => Ptg::Range,
                0x12 => Ptg::UnaryPlus,
                0x13 => Ptg::UnaryMinus,
                0x14 => Ptg::Percent,
                0x15 => Ptg::Paren,
                0x16 => Ptg::MissingArg,
                0x17 => Ptg::Str,
                0x19 => Ptg::Attr,
                0x1C => Ptg::Err,
                0x1D => Ptg::Bool,
                0x1E => Ptg::Int,
                0x1F => Ptg::Num,
                _ => return None,
            };
            return Some((ptg, PtgClass::Ref));
        }
        let class = match (byte - 0x20) >> 5 {
            0 => PtgClass::Ref,
            1 => PtgClass::Value,
            2 => PtgClass::Array,
            _ => return None,
        };
        let base = 0x20 + ((byte - 0x20) & 0x1F);
        let ptg = match base {
            0x21 => Ptg::Func,
            0x22 => Ptg::FuncVar,
            0x23 => Ptg::Name,
            0x24 => Ptg::Ref,
            0x25 => Ptg::Area,
            0x26 => Ptg::MemArea,
            0x29 => Ptg::MemFunc,
            0x2C => Ptg::RefN,
            0x2D => Ptg::AreaN,
            0x3A => Ptg::Ref3d,
            0x3B => Ptg::Area3d,
            _ => return None,
        };
        Some((ptg, class))
    }
}

/// PtgAttr flag bits.
pub mod attr {
    pub const VOLATILE: u8 = 0x01;
    pub const IF: u8 = 0x02;
    pub const GOTO: u8 = 0x08;
    pub const SUM: u8 = 0x10;
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLASSED: [Ptg; 11] = [
        Ptg::Func,
        Ptg::FuncVar,
        Ptg::Name,
        Ptg::Ref,
        Ptg::Area,
        Ptg::MemArea,
        Ptg::MemFunc,
        Ptg::RefN,
        Ptg::AreaN,
        Ptg::Ref3d,
        Ptg::Area3d,
    ];

    #[test]
    fn classify_inverts_code_for_every_classed_token() {
        for ptg in CLASSED {
            for class in [PtgClass::Ref, PtgClass::Value, PtgClass::Array] {
                assert_eq!(Ptg::classify(ptg.code(class)), Some((ptg, class)));
            }
        }
    }

    #[test]
    fn ref_token_class_encoding() {
        assert_eq!(Ptg::Ref.code_ref(), 0x24);
        assert_eq!(Ptg::Ref.code_value(), 0x44);
        assert_eq!(Ptg::Ref.code_array(), 0x64);
    }

    #[test]
    fn unknown_bytes_do_not_classify() {
        for byte in [0x00u8, 0x01, 0x02, 0x18, 0x1A, 0x1B, 0x27, 0x47, 0x80, 0xFF] {
            assert_eq!(Ptg::classify(byte), None, "byte {byte:#04x}");
        }
    }
}
