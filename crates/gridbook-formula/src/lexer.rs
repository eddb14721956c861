//! Formula text lexer.
//!
//! Produces a flat token stream for the two-stack parser. `+`/`-` are lexed
//! as plain operator tokens; the parser decides unary vs binary from its
//! stack state. Whitespace is kept as a token because a space between two
//! operands is the range-intersection operator.

use crate::ast::ErrKind;
use crate::error::FormulaError;
use crate::locale::Locale;
use gridbook_model::column_label_to_index;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    #[must_use]
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellToken {
    pub row: u32,
    pub col: u32,
    pub row_abs: bool,
    pub col_abs: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Numeric literal, raw text preserved so the parser can pick the
    /// integer or floating encoding.
    Number(String),
    String(String),
    Bool(bool),
    ErrConst(ErrKind),
    Cell(CellToken),
    /// Sheet-name prefix including the trailing `!` (name stored unquoted).
    Sheet(String),
    /// Function or defined-name identifier.
    Ident(String),
    Whitespace,
    LParen,
    RParen,
    /// Function argument separator for the active locale.
    ArgSep,
    /// `,` when it is not the locale's argument separator (range union).
    Union,
    Colon,
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Amp,
    Percent,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

pub fn lex(src: &str, locale: Locale) -> Result<Vec<Token>, FormulaError> {
    Lexer::new(src, locale).run()
}

struct Lexer<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    locale: Locale,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str, locale: Locale) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
            locale,
            tokens: Vec::new(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn push(&mut self, kind: TokenKind, start: usize) {
        self.tokens.push(Token {
            kind,
            span: Span::new(start, self.pos),
        });
    }

    fn run(mut self) -> Result<Vec<Token>, FormulaError> {
        let arg_sep = self.locale.arg_separator();
        while let Some(b) = self.peek() {
            let start = self.pos;
            match b {
                b' ' | b'\t' => {
                    while matches!(self.peek(), Some(b' ' | b'\t')) {
                        self.pos += 1;
                    }
                    self.push(TokenKind::Whitespace, start);
                }
                b'(' => self.single(TokenKind::LParen, start),
                b')' => self.single(TokenKind::RParen, start),
                b':' => self.single(TokenKind::Colon, start),
                b'+' => self.single(TokenKind::Plus, start),
                b'-' => self.single(TokenKind::Minus, start),
                b'*' => self.single(TokenKind::Star, start),
                b'/' => self.single(TokenKind::Slash, start),
                b'^' => self.single(TokenKind::Caret, start),
                b'&' => self.single(TokenKind::Amp, start),
                b'%' => self.single(TokenKind::Percent, start),
                b'=' => self.single(TokenKind::Eq, start),
                b'<' => {
                    self.pos += 1;
                    match self.peek() {
                        Some(b'>') => {
                            self.pos += 1;
                            self.push(TokenKind::Ne, start);
                        }
                        Some(b'=') => {
                            self.pos += 1;
                            self.push(TokenKind::Le, start);
                        }
                        _ => self.push(TokenKind::Lt, start),
                    }
                }
                b'>' => {
                    self.pos += 1;
                    if self.peek() == Some(b'=') {
                        self.pos += 1;
                        self.push(TokenKind::Ge, start);
                    } else {
                        self.push(TokenKind::Gt, start);
                    }
                }
                b'"' => self.lex_string(start)?,
                b'\'' => self.lex_quoted_sheet(start)?,
                b'#' => self.lex_error_const(start)?,
                b'0'..=b'9' | b'.' => self.lex_number(start)?,
                b';' | b',' => {
                    self.pos += 1;
                    let ch = b as char;
                    if ch == arg_sep {
                        self.push(TokenKind::ArgSep, start);
                    } else if ch == ',' {
                        self.push(TokenKind::Union, start);
                    } else {
                        return Err(FormulaError::Lexical { pos: start });
                    }
                }
                b'$' | b'A'..=b'Z' | b'a'..=b'z' | b'_' => self.lex_word(start)?,
                _ => return Err(FormulaError::Lexical { pos: start }),
            }
        }
        let end = self.src.len();
        self.tokens.push(Token {
            kind: TokenKind::Eof,
            span: Span::new(end, end),
        });
        Ok(self.tokens)
    }

    fn single(&mut self, kind: TokenKind, start: usize) {
        self.pos += 1;
        self.push(kind, start);
    }

    fn lex_string(&mut self, start: usize) -> Result<(), FormulaError> {
        self.pos += 1;
        let mut value = String::new();
        loop {
            match self.peek() {
                Some(b'"') => {
                    self.pos += 1;
                    // Doubled quote is an escaped quote.
                    if self.peek() == Some(b'"') {
                        self.pos += 1;
                        value.push('"');
                        continue;
                    }
                    break;
                }
                Some(_) => {
                    let ch = self.src[self.pos..]
                        .chars()
                        .next()
                        .ok_or(FormulaError::Lexical { pos: self.pos })?;
                    self.pos += ch.len_utf8();
                    value.push(ch);
                }
                None => return Err(FormulaError::Lexical { pos: start }),
            }
        }
        self.push(TokenKind::String(value), start);
        Ok(())
    }

    /// `'Sheet Name'!` prefix; embedded quotes are doubled.
    fn lex_quoted_sheet(&mut self, start: usize) -> Result<(), FormulaError> {
        self.pos += 1;
        let mut name = String::new();
        loop {
            match self.peek() {
                Some(b'\'') => {
                    self.pos += 1;
                    if self.peek() == Some(b'\'') {
                        self.pos += 1;
                        name.push('\'');
                        continue;
                    }
                    break;
                }
                Some(_) => {
                    let ch = self.src[self.pos..]
                        .chars()
                        .next()
                        .ok_or(FormulaError::Lexical { pos: self.pos })?;
                    self.pos += ch.len_utf8();
                    name.push(ch);
                }
                None => return Err(FormulaError::Lexical { pos: start }),
            }
        }
        if self.peek() != Some(b'!') {
            return Err(FormulaError::Lexical { pos: self.pos });
        }
        self.pos += 1;
        self.push(TokenKind::Sheet(name), start);
        Ok(())
    }

    fn lex_error_const(&mut self, start: usize) -> Result<(), FormulaError> {
        let rest = &self.src[start..];
        for kind in ErrKind::ALL {
            let text = kind.as_str();
            if rest
                .get(..text.len())
                .is_some_and(|p| p.eq_ignore_ascii_case(text))
            {
                self.pos += text.len();
                self.push(TokenKind::ErrConst(kind), start);
                return Ok(());
            }
        }
        Err(FormulaError::Lexical { pos: start })
    }

    fn lex_number(&mut self, start: usize) -> Result<(), FormulaError> {
        let mut seen_dot = false;
        while let Some(b) = self.peek() {
            match b {
                b'0'..=b'9' => self.pos += 1,
                b'.' if !seen_dot => {
                    seen_dot = true;
                    self.pos += 1;
                }
                b'e' | b'E' => {
                    // Exponent only when followed by optional sign and a digit.
                    let mut ahead = 1;
                    if matches!(self.peek_at(1), Some(b'+' | b'-')) {
                        ahead = 2;
                    }
                    if self.peek_at(ahead).is_some_and(|d| d.is_ascii_digit()) {
                        self.pos += ahead + 1;
                        while self.peek().is_some_and(|d| d.is_ascii_digit()) {
                            self.pos += 1;
                        }
                    }
                    break;
                }
                _ => break,
            }
        }
        let raw = &self.src[start..self.pos];
        if raw == "." {
            return Err(FormulaError::Lexical { pos: start });
        }
        self.push(TokenKind::Number(raw.to_string()), start);
        Ok(())
    }

    /// Identifier-ish run: cell reference, boolean, sheet prefix, or a
    /// function/defined-name identifier.
    fn lex_word(&mut self, start: usize) -> Result<(), FormulaError> {
        while let Some(b) = self.peek() {
            match b {
                b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'_' | b'$' | b'.' => self.pos += 1,
                _ => break,
            }
        }
        let word = &self.src[start..self.pos];

        if self.peek() == Some(b'!') {
            self.pos += 1;
            self.push(TokenKind::Sheet(word.to_string()), start);
            return Ok(());
        }

        if word.eq_ignore_ascii_case("TRUE") {
            self.push(TokenKind::Bool(true), start);
            return Ok(());
        }
        if word.eq_ignore_ascii_case("FALSE") {
            self.push(TokenKind::Bool(false), start);
            return Ok(());
        }

        if let Some(cell) = parse_cell_word(word) {
            self.push(TokenKind::Cell(cell), start);
            return Ok(());
        }

        // Outside a full reference a `$` only fits an anchored column label,
        // as in `$A:$A`; the parser folds those into a whole-column area.
        if word.contains('$') && !is_anchored_column(word) {
            return Err(FormulaError::Lexical { pos: start });
        }

        self.push(TokenKind::Ident(word.to_string()), start);
        Ok(())
    }
}

fn is_anchored_column(word: &str) -> bool {
    word.strip_prefix('$')
        .and_then(column_label_to_index)
        .is_some_and(|col| col < gridbook_model::MAX_COLS)
}

/// Parse `$?[letters]$?[digits]` into a cell token. Returns `None` when the
/// word is not shaped like an A1 reference (the caller falls back to an
/// identifier).
fn parse_cell_word(word: &str) -> Option<CellToken> {
    let bytes = word.as_bytes();
    let mut i = 0;

    let col_abs = bytes.first() == Some(&b'$');
    if col_abs {
        i += 1;
    }
    let col_start = i;
    while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
        i += 1;
    }
    if i == col_start || i - col_start > 3 {
        return None;
    }
    let col = column_label_to_index(&word[col_start..i])?;

    let row_abs = bytes.get(i) == Some(&b'$');
    if row_abs {
        i += 1;
    }
    let row_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i == row_start || i != bytes.len() {
        return None;
    }
    let row_1 = word[row_start..].parse::<u32>().ok()?;
    if row_1 == 0 || row_1 > gridbook_model::MAX_ROWS || col >= gridbook_model::MAX_COLS {
        return None;
    }

    Some(CellToken {
        row: row_1 - 1,
        col,
        row_abs,
        col_abs,
    })
}
