//! Formula text parser.
//!
//! Classic two-stack (operand/operator) precedence parse over the lexer's
//! token stream. Ambiguous `+`/`-` tokens resolve to unary form when the
//! previous state is empty or an operator; an incoming unary operator is
//! pushed rather than reduced because its operand is not yet available.
//! Function calls recurse into the same parser for each argument.

use crate::ast::{
    Area3dRef, AreaRef, BinaryOp, Cell3dRef, CellRef, Expr, NameRef, UnaryOp,
};
use crate::error::FormulaError;
use crate::functions::{FunctionSpec, IFTAB_IF, IFTAB_SUM};
use crate::lexer::{lex, CellToken, Token, TokenKind};
use crate::locale::{function_spec_from_localized_name, Locale};
use gridbook_model::{column_label_to_index, NameTable, SheetTable, MAX_COLS, ROW_ENTIRE_COLUMN};

pub struct ParseOptions<'a> {
    pub sheets: &'a dyn SheetTable,
    pub names: &'a dyn NameTable,
    pub locale: Locale,
}

/// Parse formula text (with or without a leading `=`) into a tree.
pub fn parse_text(text: &str, opts: &ParseOptions<'_>) -> Result<Expr, FormulaError> {
    let src = text.strip_prefix('=').unwrap_or(text);
    let tokens = lex(src, opts.locale)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        opts,
    };
    let expr = parser.parse_expr(false)?;
    if parser.peek().kind != TokenKind::Eof {
        return Err(FormulaError::Lexical {
            pos: parser.peek().span.start,
        });
    }
    Ok(expr)
}

/// Operator-stack entry. Unary entries carry the tightest precedence so a
/// later, looser operator reduces them as soon as their operand exists.
#[derive(Debug, Clone, Copy)]
enum Pending {
    Binary(BinaryOp),
    Unary(UnaryOp),
}

impl Pending {
    fn precedence(self) -> u8 {
        match self {
            Pending::Binary(op) => op.precedence(),
            Pending::Unary(_) => 6,
        }
    }
}

struct Parser<'a, 'b> {
    tokens: Vec<Token>,
    pos: usize,
    opts: &'b ParseOptions<'a>,
}

impl Parser<'_, '_> {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind_at(&self, offset: usize) -> Option<&TokenKind> {
        self.tokens.get(self.pos + offset).map(|t| &t.kind)
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn here(&self) -> usize {
        self.peek().span.start
    }

    fn parse_expr(&mut self, in_args: bool) -> Result<Expr, FormulaError> {
        let mut operands: Vec<Expr> = Vec::new();
        let mut operators: Vec<Pending> = Vec::new();
        let mut have_operand = false;

        loop {
            let pos = self.here();
            match &self.peek().kind {
                TokenKind::Eof | TokenKind::RParen => break,
                TokenKind::ArgSep if in_args => break,
                // `,` outside an argument list is the range-union operator.
                TokenKind::ArgSep | TokenKind::Union => {
                    self.advance();
                    self.push_binary(BinaryOp::Union, &mut operands, &mut operators, pos)?;
                    have_operand = false;
                }
                TokenKind::Whitespace => {
                    self.advance();
                    // A space between two operands is range intersection.
                    if have_operand && starts_operand(&self.peek().kind) {
                        self.push_binary(BinaryOp::Intersect, &mut operands, &mut operators, pos)?;
                        have_operand = false;
                    }
                }
                TokenKind::Colon => {
                    self.advance();
                    self.push_binary(BinaryOp::Range, &mut operands, &mut operators, pos)?;
                    have_operand = false;
                }
                TokenKind::Plus | TokenKind::Minus => {
                    let minus = self.peek().kind == TokenKind::Minus;
                    self.advance();
                    if have_operand {
                        let op = if minus { BinaryOp::Sub } else { BinaryOp::Add };
                        self.push_binary(op, &mut operands, &mut operators, pos)?;
                    } else {
                        // Unary form; deferred until its operand is parsed.
                        let op = if minus { UnaryOp::Minus } else { UnaryOp::Plus };
                        operators.push(Pending::Unary(op));
                    }
                    have_operand = false;
                }
                TokenKind::Percent => {
                    if !have_operand {
                        return Err(FormulaError::Lexical { pos });
                    }
                    self.advance();
                    // Postfix; binds tighter than any pending operator.
                    let expr = operands.pop().ok_or(FormulaError::Lexical { pos })?;
                    operands.push(Expr::Unary {
                        op: UnaryOp::Percent,
                        expr: Box::new(expr),
                    });
                }
                TokenKind::Star
                | TokenKind::Slash
                | TokenKind::Caret
                | TokenKind::Amp
                | TokenKind::Eq
                | TokenKind::Ne
                | TokenKind::Lt
                | TokenKind::Gt
                | TokenKind::Le
                | TokenKind::Ge => {
                    if !have_operand {
                        return Err(FormulaError::Lexical { pos });
                    }
                    let op = match self.advance().kind {
                        TokenKind::Star => BinaryOp::Mul,
                        TokenKind::Slash => BinaryOp::Div,
                        TokenKind::Caret => BinaryOp::Pow,
                        TokenKind::Amp => BinaryOp::Concat,
                        TokenKind::Eq => BinaryOp::Eq,
                        TokenKind::Ne => BinaryOp::Ne,
                        TokenKind::Lt => BinaryOp::Lt,
                        TokenKind::Gt => BinaryOp::Gt,
                        TokenKind::Le => BinaryOp::Le,
                        TokenKind::Ge => BinaryOp::Ge,
                        _ => unreachable!("operator token"),
                    };
                    self.push_binary(op, &mut operands, &mut operators, pos)?;
                    have_operand = false;
                }
                TokenKind::LParen => {
                    if have_operand {
                        return Err(FormulaError::Lexical { pos });
                    }
                    self.advance();
                    let inner = self.parse_expr(false)?;
                    self.expect_rparen()?;
                    operands.push(Expr::Paren(Box::new(inner)));
                    have_operand = true;
                }
                _ => {
                    if have_operand {
                        return Err(FormulaError::Lexical { pos });
                    }
                    let operand = self.parse_operand()?;
                    operands.push(operand);
                    have_operand = true;
                }
            }
        }

        let pos = self.here();
        while let Some(pending) = operators.pop() {
            reduce(pending, &mut operands, pos)?;
        }
        match operands.len() {
            1 => Ok(operands.pop().unwrap_or(Expr::Missing)),
            0 if in_args => Ok(Expr::Missing),
            _ => Err(FormulaError::Lexical { pos }),
        }
    }

    /// Shift-reduce step: equal precedence associates left-to-right, so any
    /// stacked operator binding at least as tight reduces first.
    fn push_binary(
        &mut self,
        op: BinaryOp,
        operands: &mut Vec<Expr>,
        operators: &mut Vec<Pending>,
        pos: usize,
    ) -> Result<(), FormulaError> {
        while operators
            .last()
            .is_some_and(|top| top.precedence() >= op.precedence())
        {
            if let Some(pending) = operators.pop() {
                reduce(pending, operands, pos)?;
            }
        }
        operators.push(Pending::Binary(op));
        Ok(())
    }

    fn expect_rparen(&mut self) -> Result<(), FormulaError> {
        if self.peek().kind != TokenKind::RParen {
            return Err(FormulaError::Lexical { pos: self.here() });
        }
        self.advance();
        Ok(())
    }

    fn parse_operand(&mut self) -> Result<Expr, FormulaError> {
        let pos = self.here();
        let token = self.advance();
        match token.kind {
            TokenKind::Number(raw) => number_expr(&raw, pos),
            TokenKind::String(s) => Ok(Expr::Text(s)),
            TokenKind::Bool(b) => Ok(Expr::Bool(b)),
            TokenKind::ErrConst(kind) => Ok(Expr::ErrConst(kind)),
            TokenKind::Cell(cell) => Ok(Expr::Cell(cell_ref(cell))),
            TokenKind::Sheet(name) => self.parse_sheet_qualified(name),
            TokenKind::Ident(word) => self.parse_ident(word, pos),
            _ => Err(FormulaError::Lexical { pos }),
        }
    }

    fn parse_sheet_qualified(&mut self, name: String) -> Result<Expr, FormulaError> {
        let sheet = self
            .opts
            .sheets
            .sheet_index(&name)
            .ok_or(FormulaError::SheetNotFound(name))?;
        let pos = self.here();
        match self.advance().kind {
            TokenKind::Cell(cell) => Ok(Expr::Cell3d(Cell3dRef {
                sheet,
                cell: cell_ref(cell),
            })),
            _ => Err(FormulaError::Lexical { pos }),
        }
    }

    fn parse_ident(&mut self, word: String, pos: usize) -> Result<Expr, FormulaError> {
        if self.peek().kind == TokenKind::LParen {
            return self.parse_call(word);
        }

        // A known function name tolerates space before its argument list;
        // for anything else the space is the intersection operator.
        if self.peek().kind == TokenKind::Whitespace
            && self.peek_kind_at(1) == Some(&TokenKind::LParen)
            && function_spec_from_localized_name(&word, self.opts.locale).is_some()
        {
            self.advance();
            return self.parse_call(word);
        }

        // `A:B` / `$A:$A` — whole-column area. Only triggers when both
        // sides are column labels inside the grid; anything else falls
        // through to a defined-name lookup.
        if let Some((first_col, first_abs)) = in_grid_column(&word) {
            if self.peek().kind == TokenKind::Colon {
                if let Some(TokenKind::Ident(next)) = self.peek_kind_at(1) {
                    if let Some((last_col, last_abs)) = in_grid_column(next) {
                        self.advance();
                        self.advance();
                        return Ok(Expr::Area(whole_column_area(
                            first_col, first_abs, last_col, last_abs,
                        )));
                    }
                }
            }
        }

        // An anchored column label that did not form a whole-column area
        // cannot be a defined name.
        if word.contains('$') {
            return Err(FormulaError::Lexical { pos });
        }

        let index = self
            .opts
            .names
            .name_index(&word)
            .ok_or(FormulaError::NameNotFound(word))?;
        Ok(Expr::Name(NameRef { index }))
    }

    fn parse_call(&mut self, name: String) -> Result<Expr, FormulaError> {
        let spec = function_spec_from_localized_name(&name, self.opts.locale)
            .ok_or(FormulaError::UnrecognizedFunction { name: name.clone() })?;
        self.advance(); // consume `(`

        let mut args = Vec::new();
        if self.peek().kind == TokenKind::RParen {
            self.advance();
        } else {
            loop {
                let arg = self.parse_expr(true)?;
                args.push(arg);
                let pos = self.here();
                match self.advance().kind {
                    TokenKind::ArgSep => continue,
                    TokenKind::RParen => break,
                    _ => return Err(FormulaError::Lexical { pos }),
                }
            }
        }

        build_call(spec, args)
    }
}

fn starts_operand(kind: &TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Number(_)
            | TokenKind::String(_)
            | TokenKind::Bool(_)
            | TokenKind::ErrConst(_)
            | TokenKind::Cell(_)
            | TokenKind::Sheet(_)
            | TokenKind::Ident(_)
            | TokenKind::LParen
    )
}

fn cell_ref(token: CellToken) -> CellRef {
    CellRef {
        row: token.row,
        col: token.col,
        row_abs: token.row_abs,
        col_abs: token.col_abs,
    }
}

/// Column label with an optional `$` anchor, e.g. `B` or `$B`.
fn in_grid_column(label: &str) -> Option<(u32, bool)> {
    let (label, abs) = match label.strip_prefix('$') {
        Some(rest) => (rest, true),
        None => (label, false),
    };
    let col = column_label_to_index(label)?;
    (col < MAX_COLS).then_some((col, abs))
}

fn whole_column_area(first_col: u32, first_abs: bool, last_col: u32, last_abs: bool) -> AreaRef {
    AreaRef::new(
        CellRef {
            row: 0,
            col: first_col,
            row_abs: true,
            col_abs: first_abs,
        },
        CellRef {
            row: ROW_ENTIRE_COLUMN,
            col: last_col,
            row_abs: true,
            col_abs: last_abs,
        },
    )
}

fn number_expr(raw: &str, pos: usize) -> Result<Expr, FormulaError> {
    if !raw.contains(['.', 'e', 'E']) {
        if let Ok(small) = raw.parse::<u16>() {
            return Ok(Expr::Integer(small));
        }
    }
    raw.parse::<f64>()
        .map(Expr::Number)
        .map_err(|_| FormulaError::Lexical { pos })
}

fn reduce(pending: Pending, operands: &mut Vec<Expr>, pos: usize) -> Result<(), FormulaError> {
    match pending {
        Pending::Unary(op) => {
            let expr = operands.pop().ok_or(FormulaError::Lexical { pos })?;
            operands.push(Expr::Unary {
                op,
                expr: Box::new(expr),
            });
        }
        Pending::Binary(op) => {
            let rhs = operands.pop().ok_or(FormulaError::Lexical { pos })?;
            let lhs = operands.pop().ok_or(FormulaError::Lexical { pos })?;
            operands.push(fold_binary(op, lhs, rhs));
        }
    }
    Ok(())
}

/// Build a binary node, collapsing `:` between plain cell references into a
/// static area operand. The range operator node survives only when an
/// endpoint is itself an expression, which the serializer later wraps in a
/// memory-function token.
fn fold_binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    if op == BinaryOp::Range {
        match (lhs, rhs) {
            (Expr::Cell(first), Expr::Cell(last)) => Expr::Area(AreaRef::new(first, last)),
            (Expr::Cell3d(first), Expr::Cell(last)) => Expr::Area3d(Area3dRef {
                sheet: first.sheet,
                area: AreaRef::new(first.cell, last),
            }),
            (Expr::Cell3d(first), Expr::Cell3d(last)) if first.sheet == last.sheet => {
                Expr::Area3d(Area3dRef {
                    sheet: first.sheet,
                    area: AreaRef::new(first.cell, last.cell),
                })
            }
            (lhs, rhs) => Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
        }
    } else {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }
}

/// Arity checking plus the mandated SUM/IF attribute special cases: SUM with
/// exactly one argument and every IF become attribute nodes, never generic
/// function calls.
fn build_call(spec: FunctionSpec, mut args: Vec<Expr>) -> Result<Expr, FormulaError> {
    if spec.id == IFTAB_IF {
        if !(2..=3).contains(&args.len()) {
            return Err(FormulaError::IncorrectArguments {
                name: spec.name.to_string(),
                expected: "2 to 3".to_string(),
                got: args.len(),
            });
        }
        let mut it = args.into_iter();
        let cond = it.next().unwrap_or(Expr::Missing);
        let when_true = it.next().unwrap_or(Expr::Missing);
        let when_false = it.next();
        return Ok(Expr::AttrIf {
            cond: Box::new(cond),
            when_true: Box::new(when_true),
            when_false: when_false.map(Box::new),
        });
    }

    if spec.id == IFTAB_SUM && args.len() == 1 {
        let arg = args.pop().unwrap_or(Expr::Missing);
        return Ok(Expr::AttrSum(Box::new(arg)));
    }

    if let Some(n) = spec.fixed_arity() {
        if args.len() != usize::from(n) {
            return Err(FormulaError::IncorrectArguments {
                name: spec.name.to_string(),
                expected: n.to_string(),
                got: args.len(),
            });
        }
        return Ok(Expr::Func { id: spec.id, args });
    }

    if args.len() < usize::from(spec.min_args) || args.len() > usize::from(spec.max_args) {
        return Err(FormulaError::IncorrectArguments {
            name: spec.name.to_string(),
            expected: format!("{} to {}", spec.min_args, spec.max_args),
            got: args.len(),
        });
    }
    Ok(Expr::FuncVar { id: spec.id, args })
}
