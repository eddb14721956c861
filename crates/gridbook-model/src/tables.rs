use serde::{Deserialize, Serialize};

/// Legacy workbook stream version.
///
/// Only BIFF8 stores formulas as the token stream this engine understands;
/// parsing a token stream from an older sub-version must fail before any
/// byte is consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BiffVersion {
    Biff5,
    Biff8,
}

impl BiffVersion {
    #[must_use]
    pub fn supports_token_formulas(self) -> bool {
        matches!(self, BiffVersion::Biff8)
    }
}

/// The workbook's external-sheet table, consulted for 3-D references.
///
/// Sheet identity inside a token stream is a 0-based index into this table;
/// formula text uses the sheet's display name.
pub trait SheetTable {
    /// Resolve a sheet name to its externsheet index. Name comparison is the
    /// host's business (typically case-insensitive).
    fn sheet_index(&self, name: &str) -> Option<u16>;

    /// Resolve an externsheet index back to a display name.
    fn sheet_name(&self, index: u16) -> Option<&str>;

    /// The workbook stream version the table was read from.
    fn version(&self) -> BiffVersion;
}

/// The workbook's defined-name table.
///
/// Name indices in the token stream are 1-based, matching the legacy record
/// layout.
pub trait NameTable {
    fn name_index(&self, name: &str) -> Option<u32>;

    fn name(&self, index: u32) -> Option<&str>;
}

/// An empty name table for workbooks without defined names.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoNames;

impl NameTable for NoNames {
    fn name_index(&self, _name: &str) -> Option<u32> {
        None
    }

    fn name(&self, _index: u32) -> Option<&str> {
        None
    }
}
