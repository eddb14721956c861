#![forbid(unsafe_code)]
#![deny(unreachable_patterns)]

//! Formula text parsing, rendering, and reference rebasing.
//!
//! Formula source text is lexed and parsed with [`parser::parse_text`] into
//! the [`ast::Expr`] tree shared with the token codec, and rendered back with
//! [`display::render`]. Function identities live in the built-in table in
//! [`functions`]; [`locale`] maps localized function names and argument
//! separators onto it.
//!
//! Structural-edit rewrites (row/column insertion and removal, copy
//! adjustment, import scans) live in [`rewrite`] and mutate the tree in
//! place.

pub mod ast;
pub mod display;
pub mod error;
pub mod functions;
pub mod lexer;
pub mod locale;
pub mod parser;
pub mod rewrite;

pub use ast::{
    Area3dRef, AreaRef, BinaryOp, Cell3dRef, CellRef, ErrKind, Expr, NameRef, ParseContext,
    UnaryOp,
};
pub use display::{render, RenderOptions};
pub use error::FormulaError;
pub use functions::{function_spec_from_id, function_spec_from_name, FunctionSpec};
pub use locale::Locale;
pub use parser::{parse_text, ParseOptions};
pub use rewrite::{
    adjust_relative_refs, column_inserted, column_removed, handle_imported_refs, row_inserted,
    row_removed, Validity,
};
