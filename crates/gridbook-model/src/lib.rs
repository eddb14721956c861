//! Shared addressing model for the gridbook formula engine.
//!
//! This crate holds the small set of types the formula engine shares with its
//! host: 0-indexed cell coordinates, column-label conversion, the legacy
//! workbook version marker, and the traits through which the engine consults
//! the host's sheet and defined-name tables.

mod address;
mod tables;

pub use address::{column_index_to_label, column_label_to_index, CellCoord};
pub use tables::{BiffVersion, NameTable, NoNames, SheetTable};

/// BIFF8 grid limits. Coordinates are 0-indexed, so valid rows are
/// `0..MAX_ROWS` and valid columns `0..MAX_COLS`.
pub const MAX_ROWS: u32 = 65_536;
pub const MAX_COLS: u32 = 256;

/// Row sentinel stored in an area's last corner meaning "entire column"
/// (`A:A` style areas). Never shifted by row edits.
pub const ROW_ENTIRE_COLUMN: u32 = 0xFFFF;
