use gridbook_model::BiffVersion;

/// Typed failures shared by both formula front ends (text and token stream)
/// and by the renderer/serializer.
///
/// All variants are unrecoverable for the formula being processed. Decoder
/// tolerance for non-conformant producers is expressed separately as
/// warnings, never through this enum.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormulaError {
    /// Malformed formula text at a known byte offset.
    #[error("lexical error at offset {pos}")]
    Lexical { pos: usize },

    /// Malformed or unsupported token-stream opcode.
    #[error("unrecognized token 0x{byte:02X} at offset {pos}")]
    UnrecognizedToken { byte: u8, pos: usize },

    /// Function opcode or name with no registry entry.
    #[error("unrecognized function {name}")]
    UnrecognizedFunction { name: String },

    /// Fixed-arity function called with the wrong argument count.
    #[error("incorrect arguments for {name}: expected {expected}, got {got}")]
    IncorrectArguments {
        name: String,
        expected: String,
        got: usize,
    },

    /// 3-D reference names a sheet absent from the external-sheet table.
    #[error("sheet reference not found: {0}")]
    SheetNotFound(String),

    /// Token stream carries an externsheet index the table cannot resolve.
    #[error("sheet index {0} not found in external-sheet table")]
    SheetIndexNotFound(u16),

    /// Defined name (string or 1-based index) absent from the name table.
    #[error("name not found: {0}")]
    NameNotFound(String),

    /// String literal too long for the token's one-byte length field.
    #[error("string literal of {units} UTF-16 units exceeds the limit of 255")]
    StringTooLong { units: usize },

    /// Token stream ended inside a token payload, or an operator token found
    /// too few operands on the stack.
    #[error("malformed token stream at offset {pos}")]
    MalformedStream { pos: usize },

    /// Workbook stream sub-version too old for token-based formula parsing.
    #[error("workbook version {0:?} does not support token-stream formulas")]
    UnsupportedVersion(BiffVersion),
}
