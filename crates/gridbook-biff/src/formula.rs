//! Formula record facade tying the two front ends together.

use crate::rgce::{decode_rgce, encode_rgce, DecodeContext, DecodeWarning, Decoded};
use gridbook_formula::{
    display, parser, rewrite, Expr, FormulaError, Locale, ParseContext, Validity,
};
use gridbook_model::{CellCoord, NameTable, SheetTable};

/// Workbook collaborators shared by both front ends.
pub struct WorkbookContext<'a> {
    pub sheets: &'a dyn SheetTable,
    pub names: &'a dyn NameTable,
    pub locale: Locale,
}

/// A single cell formula, parsed from either text or an rgce byte stream
/// and convertible back to both.
///
/// The formula tracks its own validity: an import scan that finds
/// non-portable references marks it invalid, and hosts are expected to
/// check [`Formula::is_valid`] before writing the record back.
#[derive(Debug, Clone)]
pub struct Formula {
    expr: Expr,
    host: CellCoord,
    parse_context: ParseContext,
    valid: bool,
    warnings: Vec<DecodeWarning>,
}

impl Formula {
    /// Parse formula text (with or without a leading `=`).
    pub fn parse_text(
        text: &str,
        host: CellCoord,
        ctx: &WorkbookContext,
        parse_context: ParseContext,
    ) -> Result<Self, FormulaError> {
        let opts = parser::ParseOptions {
            sheets: ctx.sheets,
            names: ctx.names,
            locale: ctx.locale,
        };
        let expr = parser::parse_text(text, &opts)?;
        Ok(Self {
            expr,
            host,
            parse_context,
            valid: true,
            warnings: Vec::new(),
        })
    }

    /// Decode an rgce byte stream read from a formula record. `host` is the
    /// owning cell, consulted for shared-formula relative tokens.
    pub fn parse_rgce(
        bytes: &[u8],
        host: CellCoord,
        ctx: &WorkbookContext,
        parse_context: ParseContext,
    ) -> Result<Self, FormulaError> {
        let decode_ctx = DecodeContext {
            sheets: ctx.sheets,
            names: ctx.names,
        };
        let Decoded { expr, warnings } = decode_rgce(bytes, host, &decode_ctx)?;
        Ok(Self {
            expr,
            host,
            parse_context,
            valid: true,
            warnings,
        })
    }

    /// Render the formula as text, localized per the context's locale.
    pub fn text(&self, ctx: &WorkbookContext) -> Result<String, FormulaError> {
        let opts = display::RenderOptions {
            sheets: ctx.sheets,
            names: ctx.names,
            locale: ctx.locale,
        };
        display::render(&self.expr, &opts)
    }

    /// Serialize the formula back to rgce bytes.
    pub fn rgce(&self) -> Result<Vec<u8>, FormulaError> {
        encode_rgce(&self.expr, self.parse_context)
    }

    pub fn row_inserted(&mut self, sheet: u16, row: u32, current_sheet: bool) {
        rewrite::row_inserted(&mut self.expr, sheet, row, current_sheet);
    }

    pub fn row_removed(&mut self, sheet: u16, row: u32, current_sheet: bool) {
        rewrite::row_removed(&mut self.expr, sheet, row, current_sheet);
    }

    pub fn column_inserted(&mut self, sheet: u16, col: u32, current_sheet: bool) {
        rewrite::column_inserted(&mut self.expr, sheet, col, current_sheet);
    }

    pub fn column_removed(&mut self, sheet: u16, col: u32, current_sheet: bool) {
        rewrite::column_removed(&mut self.expr, sheet, col, current_sheet);
    }

    /// Copy-adjustment after the formula moved relative to its source cell.
    pub fn adjust_relative_refs(&mut self, col_delta: i32, row_delta: i32) {
        rewrite::adjust_relative_refs(&mut self.expr, col_delta, row_delta);
    }

    /// Scan for references that cannot survive an import into another
    /// workbook; finding one marks the formula invalid.
    pub fn handle_imported_refs(&mut self) {
        if rewrite::handle_imported_refs(&self.expr) == Validity::Invalid {
            self.valid = false;
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Tolerated-input warnings collected while decoding.
    pub fn warnings(&self) -> &[DecodeWarning] {
        &self.warnings
    }

    /// The owning cell the formula was parsed for.
    pub fn host(&self) -> CellCoord {
        self.host
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }
}
