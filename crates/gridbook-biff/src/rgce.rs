//! rgce token-stream codec.
//!
//! The decoder runs a cursor over the byte stream, pushing operands and
//! reducing operators against an operand stack; inlined IF structures are
//! reassembled through an auxiliary if-stack fed by the attribute tokens.
//! The encoder walks the tree bottom-up and emits reverse Polish order, so
//! `encode(decode(bytes)) == bytes` for streams this module produced.
//!
//! Operand tokens carry one of three class variants chosen by the
//! [`ParseContext`] the formula is serialized under; range operators over
//! computed endpoints additionally force their endpoints to the array class
//! and wrap the sub-stream in a length-prefixed `PtgMemFunc`.

use crate::ptg::{attr, Ptg, PtgClass};
use gridbook_formula::ast::{
    Area3dRef, AreaRef, BinaryOp, Cell3dRef, CellRef, ErrKind, Expr, NameRef, ParseContext,
    UnaryOp,
};
use gridbook_formula::functions::{
    function_spec_from_id, IFTAB_IF, IFTAB_SUMPRODUCT,
};
use gridbook_formula::FormulaError;
use gridbook_model::{CellCoord, NameTable, SheetTable, MAX_COLS, MAX_ROWS};

const COL_INDEX_MASK: u16 = 0x3FFF;
const ROW_RELATIVE_BIT: u16 = 0x4000;
const COL_RELATIVE_BIT: u16 = 0x8000;

/// String literals in a formula cap at 255 UTF-16 code units.
const MAX_STR_UNITS: usize = 255;

/// Workbook collaborators the decoder resolves indices against.
pub struct DecodeContext<'a> {
    pub sheets: &'a dyn SheetTable,
    pub names: &'a dyn NameTable,
}

/// Tolerated non-conformance observed while decoding.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeWarning {
    /// The stream left more than one operand on the stack; the top operand
    /// was taken as the result.
    #[error("stream left {depth} operands on the stack")]
    UnreducedStack { depth: usize },
}

/// Decoder output: the tree plus any tolerated-input warnings.
#[derive(Debug)]
pub struct Decoded {
    pub expr: Expr,
    pub warnings: Vec<DecodeWarning>,
}

/// Decode a BIFF8 rgce byte stream into a parse tree.
///
/// `host` is the coordinate of the owning cell, used to resolve the
/// host-relative shared-formula tokens (`PtgRefN`/`PtgAreaN`).
pub fn decode_rgce(
    bytes: &[u8],
    host: CellCoord,
    ctx: &DecodeContext,
) -> Result<Decoded, FormulaError> {
    let version = ctx.sheets.version();
    if !version.supports_token_formulas() {
        return Err(FormulaError::UnsupportedVersion(version));
    }
    let mut warnings = Vec::new();
    let expr = decode_stream(bytes, 0, host, ctx, &mut warnings)?;
    Ok(Decoded { expr, warnings })
}

/// Decode one token stream with its own operand and if stacks. Embedded
/// `Mem*` sub-streams recurse through here; `base` keeps error offsets
/// relative to the outermost stream.
fn decode_stream(
    bytes: &[u8],
    base: usize,
    host: CellCoord,
    ctx: &DecodeContext,
    warnings: &mut Vec<DecodeWarning>,
) -> Result<Expr, FormulaError> {
    let mut cur = Cursor { bytes, pos: 0, base };
    let mut stack: Vec<Expr> = Vec::new();
    let mut if_stack: Vec<Expr> = Vec::new();

    while !cur.done() {
        let token_pos = cur.off();
        let byte = cur.u8()?;
        let (ptg, _class) = Ptg::classify(byte).ok_or(FormulaError::UnrecognizedToken {
            byte,
            pos: token_pos,
        })?;
        match ptg {
            Ptg::Add | Ptg::Sub | Ptg::Mul | Ptg::Div | Ptg::Pow | Ptg::Concat | Ptg::Lt
            | Ptg::Le | Ptg::Eq | Ptg::Ge | Ptg::Gt | Ptg::Ne | Ptg::Isect | Ptg::Union
            | Ptg::Range => {
                let rhs = pop(&mut stack, token_pos)?;
                let lhs = pop(&mut stack, token_pos)?;
                stack.push(Expr::Binary {
                    op: binary_op(ptg),
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                });
            }
            Ptg::UnaryPlus | Ptg::UnaryMinus | Ptg::Percent => {
                let expr = pop(&mut stack, token_pos)?;
                let op = match ptg {
                    Ptg::UnaryPlus => UnaryOp::Plus,
                    Ptg::UnaryMinus => UnaryOp::Minus,
                    _ => UnaryOp::Percent,
                };
                stack.push(Expr::Unary {
                    op,
                    expr: Box::new(expr),
                });
            }
            Ptg::Paren => {
                let inner = pop(&mut stack, token_pos)?;
                stack.push(Expr::Paren(Box::new(inner)));
            }
            Ptg::MissingArg => stack.push(Expr::Missing),
            Ptg::Str => stack.push(Expr::Text(read_string(&mut cur)?)),
            Ptg::Attr => {
                let flags = cur.u8()?;
                let _data = cur.u16()?;
                if flags & attr::SUM != 0 {
                    let arg = pop(&mut stack, token_pos)?;
                    stack.push(Expr::AttrSum(Box::new(arg)));
                } else if flags & attr::IF != 0 {
                    let cond = pop(&mut stack, token_pos)?;
                    if_stack.push(cond);
                } else if flags & attr::GOTO != 0 {
                    let branch = pop(&mut stack, token_pos)?;
                    if_stack.push(branch);
                } else if flags & attr::VOLATILE != 0 {
                    // Volatility is recomputed from the tree at encode time.
                } else {
                    return Err(FormulaError::UnrecognizedToken {
                        byte: flags,
                        pos: token_pos,
                    });
                }
            }
            Ptg::Err => {
                let code = cur.u8()?;
                let kind = ErrKind::from_code(code).ok_or(FormulaError::UnrecognizedToken {
                    byte: code,
                    pos: token_pos,
                })?;
                stack.push(Expr::ErrConst(kind));
            }
            Ptg::Bool => {
                let v = cur.u8()?;
                stack.push(Expr::Bool(v != 0));
            }
            Ptg::Int => {
                let v = cur.u16()?;
                stack.push(Expr::Integer(v));
            }
            Ptg::Num => {
                let v = cur.f64()?;
                stack.push(Expr::Number(v));
            }
            Ptg::Func => {
                let iftab = cur.u16()?;
                let spec =
                    function_spec_from_id(iftab).ok_or(FormulaError::UnrecognizedFunction {
                        name: format!("iftab {iftab}"),
                    })?;
                let argc = spec.fixed_arity().ok_or_else(|| {
                    FormulaError::IncorrectArguments {
                        name: spec.name.to_string(),
                        expected: format!("{}..={} (variable arity opcode)", spec.min_args,
                            spec.max_args),
                        got: 0,
                    }
                })?;
                let args = pop_args(&mut stack, usize::from(argc), token_pos)?;
                stack.push(Expr::Func {
                    id: spec.id,
                    args,
                });
            }
            Ptg::FuncVar => {
                let argc = usize::from(cur.u8()? & 0x7F);
                let iftab = cur.u16()? & 0x7FFF;
                if iftab == IFTAB_IF {
                    stack.push(assemble_if(&mut if_stack, argc, token_pos)?);
                    continue;
                }
                let spec =
                    function_spec_from_id(iftab).ok_or(FormulaError::UnrecognizedFunction {
                        name: format!("iftab {iftab}"),
                    })?;
                if argc < usize::from(spec.min_args) || argc > usize::from(spec.max_args) {
                    return Err(FormulaError::IncorrectArguments {
                        name: spec.name.to_string(),
                        expected: format!("{}..={}", spec.min_args, spec.max_args),
                        got: argc,
                    });
                }
                let args = pop_args(&mut stack, argc, token_pos)?;
                stack.push(Expr::FuncVar {
                    id: spec.id,
                    args,
                });
            }
            Ptg::Name => {
                let ilbl = cur.u16()?;
                let _reserved = cur.u16()?;
                let index = u32::from(ilbl);
                if ctx.names.name(index).is_none() {
                    return Err(FormulaError::NameNotFound(format!("index {index}")));
                }
                stack.push(Expr::Name(NameRef { index }));
            }
            Ptg::Ref => stack.push(Expr::Cell(read_cell(&mut cur)?)),
            Ptg::Area => stack.push(Expr::Area(read_area(&mut cur)?)),
            Ptg::RefN => stack.push(Expr::Cell(read_cell_rel(&mut cur, host)?)),
            Ptg::AreaN => {
                let first = read_cell_rel(&mut cur, host)?;
                let last = read_cell_rel(&mut cur, host)?;
                stack.push(Expr::Area(AreaRef { first, last }));
            }
            Ptg::Ref3d => {
                let sheet = read_sheet(&mut cur, ctx)?;
                let cell = read_cell(&mut cur)?;
                stack.push(Expr::Cell3d(Cell3dRef { sheet, cell }));
            }
            Ptg::Area3d => {
                let sheet = read_sheet(&mut cur, ctx)?;
                let area = read_area(&mut cur)?;
                stack.push(Expr::Area3d(Area3dRef { sheet, area }));
            }
            Ptg::MemArea | Ptg::MemFunc => {
                let cce = usize::from(cur.u16()?);
                let sub_base = cur.off();
                let sub = cur.take(cce)?;
                let inner = decode_stream(sub, sub_base, host, ctx, warnings)?;
                stack.push(match ptg {
                    Ptg::MemArea => Expr::MemArea(Box::new(inner)),
                    _ => Expr::MemFunc(Box::new(inner)),
                });
            }
        }
    }

    let depth = stack.len();
    let expr = stack.pop().ok_or(FormulaError::MalformedStream {
        pos: base + bytes.len(),
    })?;
    if depth != 1 {
        log::warn!("rgce stream left {depth} operands on the stack, taking the top");
        warnings.push(DecodeWarning::UnreducedStack { depth });
    }
    Ok(expr)
}

/// Pop the condition and branches of an inlined IF off the if-stack in
/// push order. The attribute tokens moved them there as each section of the
/// stream completed.
fn assemble_if(
    if_stack: &mut Vec<Expr>,
    argc: usize,
    pos: usize,
) -> Result<Expr, FormulaError> {
    if !(2..=3).contains(&argc) {
        return Err(FormulaError::IncorrectArguments {
            name: "IF".to_string(),
            expected: "2..=3".to_string(),
            got: argc,
        });
    }
    if if_stack.len() < argc {
        return Err(FormulaError::MalformedStream { pos });
    }
    let when_false = if argc == 3 {
        if_stack.pop().map(Box::new)
    } else {
        None
    };
    match (if_stack.pop(), if_stack.pop()) {
        (Some(when_true), Some(cond)) => Ok(Expr::AttrIf {
            cond: Box::new(cond),
            when_true: Box::new(when_true),
            when_false,
        }),
        _ => Err(FormulaError::MalformedStream { pos }),
    }
}

fn binary_op(ptg: Ptg) -> BinaryOp {
    match ptg {
        Ptg::Add => BinaryOp::Add,
        Ptg::Sub => BinaryOp::Sub,
        Ptg::Mul => BinaryOp::Mul,
        Ptg::Div => BinaryOp::Div,
        Ptg::Pow => BinaryOp::Pow,
        Ptg::Concat => BinaryOp::Concat,
        Ptg::Lt => BinaryOp::Lt,
        Ptg::Le => BinaryOp::Le,
        Ptg::Eq => BinaryOp::Eq,
        Ptg::Ge => BinaryOp::Ge,
        Ptg::Gt => BinaryOp::Gt,
        Ptg::Ne => BinaryOp::Ne,
        Ptg::Isect => BinaryOp::Intersect,
        Ptg::Union => BinaryOp::Union,
        _ => BinaryOp::Range,
    }
}

fn pop(stack: &mut Vec<Expr>, pos: usize) -> Result<Expr, FormulaError> {
    stack.pop().ok_or(FormulaError::MalformedStream { pos })
}

/// Pop `argc` operands in call order (the stream pushed them left to right).
fn pop_args(stack: &mut Vec<Expr>, argc: usize, pos: usize) -> Result<Vec<Expr>, FormulaError> {
    if stack.len() < argc {
        return Err(FormulaError::MalformedStream { pos });
    }
    Ok(stack.split_off(stack.len() - argc))
}

fn read_sheet(cur: &mut Cursor, ctx: &DecodeContext) -> Result<u16, FormulaError> {
    let ixti = cur.u16()?;
    if ctx.sheets.sheet_name(ixti).is_none() {
        return Err(FormulaError::SheetIndexNotFound(ixti));
    }
    Ok(ixti)
}

/// `[row: u16][col field: u16]` with the relative flags in the top bits of
/// the column field.
fn read_cell(cur: &mut Cursor) -> Result<CellRef, FormulaError> {
    let row = u32::from(cur.u16()?);
    let field = cur.u16()?;
    Ok(CellRef {
        row,
        col: u32::from(field & COL_INDEX_MASK),
        row_abs: field & ROW_RELATIVE_BIT == 0,
        col_abs: field & COL_RELATIVE_BIT == 0,
    })
}

fn read_area(cur: &mut Cursor) -> Result<AreaRef, FormulaError> {
    let row_first = u32::from(cur.u16()?);
    let row_last = u32::from(cur.u16()?);
    let field_first = cur.u16()?;
    let field_last = cur.u16()?;
    Ok(AreaRef {
        first: CellRef {
            row: row_first,
            col: u32::from(field_first & COL_INDEX_MASK),
            row_abs: field_first & ROW_RELATIVE_BIT == 0,
            col_abs: field_first & COL_RELATIVE_BIT == 0,
        },
        last: CellRef {
            row: row_last,
            col: u32::from(field_last & COL_INDEX_MASK),
            row_abs: field_last & ROW_RELATIVE_BIT == 0,
            col_abs: field_last & COL_RELATIVE_BIT == 0,
        },
    })
}

/// Shared-formula cell: relative coordinates are signed offsets from the
/// host cell (row i16, col i8 in the low byte of the column field), wrapped
/// into the grid. Anchored coordinates are stored directly.
fn read_cell_rel(cur: &mut Cursor, host: CellCoord) -> Result<CellRef, FormulaError> {
    let row_field = cur.u16()?;
    let col_field = cur.u16()?;
    let row_rel = col_field & ROW_RELATIVE_BIT != 0;
    let col_rel = col_field & COL_RELATIVE_BIT != 0;
    let row = if row_rel {
        wrap_coord(host.row, i64::from(row_field as i16), MAX_ROWS)
    } else {
        u32::from(row_field)
    };
    let col = if col_rel {
        wrap_coord(host.col, i64::from((col_field & 0x00FF) as u8 as i8), MAX_COLS)
    } else {
        u32::from(col_field & COL_INDEX_MASK)
    };
    Ok(CellRef {
        row,
        col,
        row_abs: !row_rel,
        col_abs: !col_rel,
    })
}

fn wrap_coord(base: u32, offset: i64, modulus: u32) -> u32 {
    (i64::from(base) + offset).rem_euclid(i64::from(modulus)) as u32
}

/// ShortXLUnicodeString: `[cch: u8][flags: u8]` then `cch` bytes
/// (compressed) or `cch` UTF-16LE code units (flags bit 0).
fn read_string(cur: &mut Cursor) -> Result<String, FormulaError> {
    let cch = usize::from(cur.u8()?);
    let flags = cur.u8()?;
    if flags & 0x01 != 0 {
        let raw = cur.take(cch * 2)?;
        let units: Vec<u16> = raw
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        Ok(String::from_utf16_lossy(&units))
    } else {
        let raw = cur.take(cch)?;
        Ok(raw.iter().map(|&b| char::from(b)).collect())
    }
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
    base: usize,
}

impl<'a> Cursor<'a> {
    fn done(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn off(&self) -> usize {
        self.base + self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], FormulaError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.bytes.len())
            .ok_or(FormulaError::MalformedStream { pos: self.off() })?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, FormulaError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, FormulaError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn f64(&mut self) -> Result<f64, FormulaError> {
        let b = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(b);
        Ok(f64::from_le_bytes(raw))
    }
}

/// Serialize a parse tree to an rgce byte stream.
///
/// `ctx` selects the operand class used for classed tokens; trees holding a
/// volatile built-in or a computed-endpoint range are prefixed with the
/// volatile attribute.
pub fn encode_rgce(expr: &Expr, ctx: ParseContext) -> Result<Vec<u8>, FormulaError> {
    let mut out = Vec::new();
    if expr.is_volatile() {
        out.extend_from_slice(&[Ptg::Attr.base(), attr::VOLATILE, 0x00, 0x00]);
    }
    encode_expr(expr, PtgClass::from(ctx), &mut out)?;
    Ok(out)
}

fn encode_expr(expr: &Expr, class: PtgClass, out: &mut Vec<u8>) -> Result<(), FormulaError> {
    match expr {
        Expr::Integer(v) => {
            out.push(Ptg::Int.base());
            out.extend_from_slice(&v.to_le_bytes());
        }
        Expr::Number(v) => {
            out.push(Ptg::Num.base());
            out.extend_from_slice(&v.to_le_bytes());
        }
        Expr::Text(s) => push_string(s, out)?,
        Expr::Bool(b) => out.extend_from_slice(&[Ptg::Bool.base(), u8::from(*b)]),
        Expr::ErrConst(kind) => out.extend_from_slice(&[Ptg::Err.base(), kind.code()]),
        Expr::Missing => out.push(Ptg::MissingArg.base()),
        Expr::Cell(cell) => {
            out.push(Ptg::Ref.code(class));
            push_cell(cell, out);
        }
        Expr::Area(area) => {
            out.push(Ptg::Area.code(class));
            push_area(area, out);
        }
        Expr::Cell3d(r) => {
            out.push(Ptg::Ref3d.code(class));
            out.extend_from_slice(&r.sheet.to_le_bytes());
            push_cell(&r.cell, out);
        }
        Expr::Area3d(r) => {
            out.push(Ptg::Area3d.code(class));
            out.extend_from_slice(&r.sheet.to_le_bytes());
            push_area(&r.area, out);
        }
        Expr::Name(name) => {
            let ilbl = u16::try_from(name.index)
                .map_err(|_| FormulaError::NameNotFound(format!("index {}", name.index)))?;
            out.push(Ptg::Name.code(class));
            out.extend_from_slice(&ilbl.to_le_bytes());
            out.extend_from_slice(&[0x00, 0x00]);
        }
        Expr::MemArea(inner) => push_mem(Ptg::MemArea, inner, class, out)?,
        // A MemFunc holding a range operator re-encodes exactly like a bare
        // range operator, otherwise round-trips would nest a second wrapper.
        Expr::MemFunc(inner) => match inner.as_ref() {
            Expr::Binary {
                op: BinaryOp::Range,
                lhs,
                rhs,
            } => encode_range(lhs, rhs, class, out)?,
            _ => push_mem(Ptg::MemFunc, inner, class, out)?,
        },
        Expr::Unary { op, expr } => {
            encode_expr(expr, class, out)?;
            out.push(match op {
                UnaryOp::Plus => Ptg::UnaryPlus.base(),
                UnaryOp::Minus => Ptg::UnaryMinus.base(),
                UnaryOp::Percent => Ptg::Percent.base(),
            });
        }
        Expr::Binary {
            op: BinaryOp::Range,
            lhs,
            rhs,
        } => encode_range(lhs, rhs, class, out)?,
        Expr::Binary { op, lhs, rhs } => {
            encode_expr(lhs, class, out)?;
            encode_expr(rhs, class, out)?;
            out.push(binary_ptg(*op).base());
        }
        Expr::Paren(inner) => {
            encode_expr(inner, class, out)?;
            out.push(Ptg::Paren.base());
        }
        Expr::Func { id, args } => {
            let spec = function_spec_from_id(*id).ok_or(FormulaError::UnrecognizedFunction {
                name: format!("iftab {id}"),
            })?;
            if spec.fixed_arity() != Some(args.len() as u8) {
                return Err(FormulaError::IncorrectArguments {
                    name: spec.name.to_string(),
                    expected: format!("{}", spec.min_args),
                    got: args.len(),
                });
            }
            for arg in args {
                encode_expr(arg, class, out)?;
            }
            out.push(Ptg::Func.code(class));
            out.extend_from_slice(&id.to_le_bytes());
        }
        Expr::FuncVar { id, args } => {
            let spec = function_spec_from_id(*id).ok_or(FormulaError::UnrecognizedFunction {
                name: format!("iftab {id}"),
            })?;
            let argc = args.len();
            if argc < usize::from(spec.min_args) || argc > usize::from(spec.max_args) {
                return Err(FormulaError::IncorrectArguments {
                    name: spec.name.to_string(),
                    expected: format!("{}..={}", spec.min_args, spec.max_args),
                    got: argc,
                });
            }
            for arg in args {
                // SUMPRODUCT consumes its areas as arrays.
                let arg_class = if *id == IFTAB_SUMPRODUCT && matches!(arg, Expr::Area(_)) {
                    PtgClass::Array
                } else {
                    class
                };
                encode_expr(arg, arg_class, out)?;
            }
            out.push(Ptg::FuncVar.code(class));
            out.push(argc as u8);
            out.extend_from_slice(&id.to_le_bytes());
        }
        Expr::AttrSum(arg) => {
            encode_expr(arg, class, out)?;
            out.extend_from_slice(&[Ptg::Attr.base(), attr::SUM, 0x00, 0x00]);
        }
        Expr::AttrIf {
            cond,
            when_true,
            when_false,
        } => encode_if(cond, when_true, when_false.as_deref(), class, out)?,
    }
    Ok(())
}

/// Inlined IF: the branches are assembled separately so the jump attributes
/// can carry the branch byte lengths.
///
/// Layout: cond, `tAttrIf(len(true))`, true branch, `tAttrGoto(len(false))`,
/// then for a three-argument call the false branch and a closing
/// `tAttrGoto(3)`, and finally the variable-arity marker with `iftab = 1`.
fn encode_if(
    cond: &Expr,
    when_true: &Expr,
    when_false: Option<&Expr>,
    class: PtgClass,
    out: &mut Vec<u8>,
) -> Result<(), FormulaError> {
    encode_expr(cond, class, out)?;

    let mut true_bytes = Vec::new();
    encode_expr(when_true, class, &mut true_bytes)?;

    out.push(Ptg::Attr.base());
    out.push(attr::IF);
    out.extend_from_slice(&(true_bytes.len() as u16).to_le_bytes());
    out.extend_from_slice(&true_bytes);

    match when_false {
        None => {
            out.extend_from_slice(&[Ptg::Attr.base(), attr::GOTO, 0x00, 0x00]);
            push_if_marker(2, out);
        }
        Some(wf) => {
            let mut false_bytes = Vec::new();
            encode_expr(wf, class, &mut false_bytes)?;
            out.push(Ptg::Attr.base());
            out.push(attr::GOTO);
            out.extend_from_slice(&(false_bytes.len() as u16).to_le_bytes());
            out.extend_from_slice(&false_bytes);
            out.extend_from_slice(&[Ptg::Attr.base(), attr::GOTO, 0x03, 0x00]);
            push_if_marker(3, out);
        }
    }
    Ok(())
}

/// The IF assembly marker is always the value-class variable-arity opcode,
/// independent of the surrounding operand class.
fn push_if_marker(argc: u8, out: &mut Vec<u8>) {
    out.push(Ptg::FuncVar.code_value());
    out.push(argc);
    out.extend_from_slice(&IFTAB_IF.to_le_bytes());
}

/// A range over computed endpoints cannot be resolved statically: the
/// sub-expression is wrapped in a length-prefixed MemFunc and its endpoints
/// take the array class.
fn encode_range(
    lhs: &Expr,
    rhs: &Expr,
    class: PtgClass,
    out: &mut Vec<u8>,
) -> Result<(), FormulaError> {
    let mut inner = Vec::new();
    encode_expr(lhs, PtgClass::Array, &mut inner)?;
    encode_expr(rhs, PtgClass::Array, &mut inner)?;
    inner.push(Ptg::Range.base());
    push_mem_prefix(Ptg::MemFunc, class, &inner, out);
    out.extend_from_slice(&inner);
    Ok(())
}

fn push_mem(
    ptg: Ptg,
    inner: &Expr,
    class: PtgClass,
    out: &mut Vec<u8>,
) -> Result<(), FormulaError> {
    let mut bytes = Vec::new();
    encode_expr(inner, class, &mut bytes)?;
    push_mem_prefix(ptg, class, &bytes, out);
    out.extend_from_slice(&bytes);
    Ok(())
}

fn push_mem_prefix(ptg: Ptg, class: PtgClass, inner: &[u8], out: &mut Vec<u8>) {
    out.push(ptg.code(class));
    out.extend_from_slice(&(inner.len() as u16).to_le_bytes());
}

fn binary_ptg(op: BinaryOp) -> Ptg {
    match op {
        BinaryOp::Add => Ptg::Add,
        BinaryOp::Sub => Ptg::Sub,
        BinaryOp::Mul => Ptg::Mul,
        BinaryOp::Div => Ptg::Div,
        BinaryOp::Pow => Ptg::Pow,
        BinaryOp::Concat => Ptg::Concat,
        BinaryOp::Lt => Ptg::Lt,
        BinaryOp::Le => Ptg::Le,
        BinaryOp::Eq => Ptg::Eq,
        BinaryOp::Ne => Ptg::Ne,
        BinaryOp::Gt => Ptg::Gt,
        BinaryOp::Ge => Ptg::Ge,
        BinaryOp::Intersect => Ptg::Isect,
        BinaryOp::Union => Ptg::Union,
        BinaryOp::Range => Ptg::Range,
    }
}

fn push_cell(cell: &CellRef, out: &mut Vec<u8>) {
    out.extend_from_slice(&(cell.row as u16).to_le_bytes());
    out.extend_from_slice(&col_field(cell).to_le_bytes());
}

fn push_area(area: &AreaRef, out: &mut Vec<u8>) {
    out.extend_from_slice(&(area.first.row as u16).to_le_bytes());
    out.extend_from_slice(&(area.last.row as u16).to_le_bytes());
    out.extend_from_slice(&col_field(&area.first).to_le_bytes());
    out.extend_from_slice(&col_field(&area.last).to_le_bytes());
}

fn col_field(cell: &CellRef) -> u16 {
    let mut field = cell.col as u16 & COL_INDEX_MASK;
    if !cell.row_abs {
        field |= ROW_RELATIVE_BIT;
    }
    if !cell.col_abs {
        field |= COL_RELATIVE_BIT;
    }
    field
}

fn push_string(s: &str, out: &mut Vec<u8>) -> Result<(), FormulaError> {
    let units: Vec<u16> = s.encode_utf16().collect();
    // The token's length field is a single byte.
    if units.len() > MAX_STR_UNITS {
        return Err(FormulaError::StringTooLong { units: units.len() });
    }
    out.push(Ptg::Str.base());
    out.push(units.len() as u8);
    if units.iter().all(|&u| u <= 0xFF) {
        out.push(0x00);
        out.extend(units.iter().map(|&u| u as u8));
    } else {
        out.push(0x01);
        for unit in units {
            out.extend_from_slice(&unit.to_le_bytes());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn column_field_packs_relative_flags() {
        let cell = CellRef {
            row: 5,
            col: 3,
            row_abs: false,
            col_abs: true,
        };
        assert_eq!(col_field(&cell), 0x4003);
        let cell = CellRef::relative(5, 3);
        assert_eq!(col_field(&cell), 0xC003);
        let cell = CellRef::absolute(5, 3);
        assert_eq!(col_field(&cell), 0x0003);
    }

    #[test]
    fn string_payload_picks_the_narrow_form() {
        let mut out = Vec::new();
        push_string("abc", &mut out).unwrap();
        assert_eq!(out, vec![0x17, 3, 0x00, b'a', b'b', b'c']);

        let mut out = Vec::new();
        push_string("π", &mut out).unwrap();
        assert_eq!(out, vec![0x17, 1, 0x01, 0xC0, 0x03]);
    }

    #[test]
    fn overlong_string_literals_are_rejected_not_truncated() {
        let at_limit = Expr::Text("x".repeat(MAX_STR_UNITS));
        let bytes = encode_rgce(&at_limit, ParseContext::Default).unwrap();
        assert_eq!(bytes[1] as usize, MAX_STR_UNITS);

        let over = Expr::Text("x".repeat(300));
        assert_eq!(
            encode_rgce(&over, ParseContext::Default),
            Err(FormulaError::StringTooLong { units: 300 })
        );
    }

    #[test]
    fn shared_formula_offsets_wrap_within_the_grid() {
        assert_eq!(wrap_coord(2, -5, MAX_ROWS), MAX_ROWS - 3);
        assert_eq!(wrap_coord(10, 5, MAX_ROWS), 15);
        assert_eq!(wrap_coord(0, -1, MAX_COLS), MAX_COLS - 1);
    }
}
