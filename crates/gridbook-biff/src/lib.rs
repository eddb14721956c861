#![forbid(unsafe_code)]
#![deny(unreachable_patterns)]

//! BIFF8 rgce token-stream codec.
//!
//! [`rgce::decode_rgce`] turns the byte stream stored in a formula record
//! into the parse tree shared with `gridbook-formula`; [`rgce::encode_rgce`]
//! is its inverse and re-encodes decoder output byte for byte. The
//! [`formula::Formula`] facade combines both with the text front end and the
//! reference-rebasing walks.

pub mod formula;
pub mod ptg;
pub mod rgce;

pub use formula::{Formula, WorkbookContext};
pub use ptg::{Ptg, PtgClass};
pub use rgce::{decode_rgce, encode_rgce, DecodeContext, DecodeWarning, Decoded};
