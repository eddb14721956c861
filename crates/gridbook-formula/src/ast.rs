//! Parse-tree node model.
//!
//! The tree is the common intermediate representation shared by the text
//! parser, the token-stream decoder, the renderer and the serializer.
//! Nodes own their children (`Box`/`Vec` edges only), so trees are acyclic
//! by construction; upward flag propagation is done through return values
//! of the rebasing walks rather than parent back-pointers.

use serde::{Deserialize, Serialize};

/// Error constants that can appear as formula literals (`#REF!` etc.).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrKind {
    Null,
    Div0,
    Value,
    Ref,
    Name,
    Num,
    Na,
}

impl ErrKind {
    /// Every error constant; the lexer matches display text against this.
    pub const ALL: [ErrKind; 7] = [
        ErrKind::Null,
        ErrKind::Div0,
        ErrKind::Value,
        ErrKind::Ref,
        ErrKind::Name,
        ErrKind::Num,
        ErrKind::Na,
    ];

    /// Legacy error-code byte stored in the token stream.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            ErrKind::Null => 0x00,
            ErrKind::Div0 => 0x07,
            ErrKind::Value => 0x0F,
            ErrKind::Ref => 0x17,
            ErrKind::Name => 0x1D,
            ErrKind::Num => 0x24,
            ErrKind::Na => 0x2A,
        }
    }

    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0x00 => ErrKind::Null,
            0x07 => ErrKind::Div0,
            0x0F => ErrKind::Value,
            0x17 => ErrKind::Ref,
            0x1D => ErrKind::Name,
            0x24 => ErrKind::Num,
            0x2A => ErrKind::Na,
            _ => return None,
        })
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ErrKind::Null => "#NULL!",
            ErrKind::Div0 => "#DIV/0!",
            ErrKind::Value => "#VALUE!",
            ErrKind::Ref => "#REF!",
            ErrKind::Name => "#NAME?",
            ErrKind::Num => "#NUM!",
            ErrKind::Na => "#N/A",
        }
    }
}

/// 2-D cell reference. `row`/`col` are 0-indexed absolute grid coordinates;
/// the `*_abs` flags record whether each coordinate is anchored (`$`) and
/// therefore fixed under copy-adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellRef {
    pub row: u32,
    pub col: u32,
    pub row_abs: bool,
    pub col_abs: bool,
}

impl CellRef {
    #[must_use]
    pub fn relative(row: u32, col: u32) -> Self {
        Self {
            row,
            col,
            row_abs: false,
            col_abs: false,
        }
    }

    #[must_use]
    pub fn absolute(row: u32, col: u32) -> Self {
        Self {
            row,
            col,
            row_abs: true,
            col_abs: true,
        }
    }
}

/// 2-D area reference. The four abs flags are independent per coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaRef {
    pub first: CellRef,
    pub last: CellRef,
}

impl AreaRef {
    #[must_use]
    pub fn new(first: CellRef, last: CellRef) -> Self {
        Self { first, last }
    }
}

/// Cell reference qualified by an external-sheet index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell3dRef {
    pub sheet: u16,
    pub cell: CellRef,
}

/// Area reference qualified by an external-sheet index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Area3dRef {
    pub sheet: u16,
    pub area: AreaRef,
}

/// Defined-name reference (1-based index into the workbook name table).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameRef {
    pub index: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Plus,
    Minus,
    /// Postfix percent.
    Percent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Concat,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    /// Range union (`,` outside an argument list).
    Union,
    /// Range intersection (space).
    Intersect,
    /// Range `:` whose endpoints are sub-expressions. A bare `A1:B2` parses
    /// directly into [`Expr::Area`]; this operator only appears when an
    /// endpoint is not a plain cell reference.
    Range,
}

impl BinaryOp {
    /// Renderer/parser precedence. Higher binds tighter.
    #[must_use]
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::Range => 9,
            BinaryOp::Intersect => 8,
            BinaryOp::Union => 7,
            BinaryOp::Pow => 5,
            BinaryOp::Mul | BinaryOp::Div => 4,
            BinaryOp::Add | BinaryOp::Sub => 3,
            BinaryOp::Concat => 2,
            BinaryOp::Eq
            | BinaryOp::Ne
            | BinaryOp::Lt
            | BinaryOp::Gt
            | BinaryOp::Le
            | BinaryOp::Ge => 1,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Pow => "^",
            BinaryOp::Concat => "&",
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Le => "<=",
            BinaryOp::Ge => ">=",
            BinaryOp::Union => ",",
            BinaryOp::Intersect => " ",
            BinaryOp::Range => ":",
        }
    }
}

/// Syntactic context a formula is parsed/serialized under. Selects the
/// operand-class opcode variant used by the token-stream serializer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParseContext {
    #[default]
    Default,
    DataValidation,
    Array,
}

/// A formula parse-tree node.
///
/// Operand variants are leaves (the `Mem*` wrappers hold a privately owned
/// nested tree); operator variants own their children in call order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// Integer literal in the token stream's 16-bit range. Wider or
    /// fractional literals are [`Expr::Number`].
    Integer(u16),
    Number(f64),
    Text(String),
    Bool(bool),
    ErrConst(ErrKind),
    /// Missing argument placeholder (`IF(,1,2)`).
    Missing,
    Cell(CellRef),
    Area(AreaRef),
    Cell3d(Cell3dRef),
    Area3d(Area3dRef),
    Name(NameRef),
    /// Wrapper around a nested sub-expression decoded from an embedded
    /// length-prefixed byte range (non-statically-resolvable area).
    MemArea(Box<Expr>),
    /// Like [`Expr::MemArea`] but for dynamic range computations.
    MemFunc(Box<Expr>),

    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// Explicit parentheses. Pass-through for precedence; re-emitted on both
    /// output paths so round-trips preserve the author's grouping.
    Paren(Box<Expr>),
    /// Fixed-arity built-in function call; `args.len()` always matches the
    /// registry arity.
    Func {
        id: u16,
        args: Vec<Expr>,
    },
    /// Variable-arity built-in function call.
    FuncVar {
        id: u16,
        args: Vec<Expr>,
    },
    /// Inlined single-argument SUM (encoded as an attribute instruction, not
    /// a generic function call).
    AttrSum(Box<Expr>),
    /// Inlined IF (encoded as conditional-jump attribute instructions).
    AttrIf {
        cond: Box<Expr>,
        when_true: Box<Expr>,
        when_false: Option<Box<Expr>>,
    },
}

impl Expr {
    /// Precedence of the node's result for renderer parenthesization.
    #[must_use]
    pub fn precedence(&self) -> u8 {
        match self {
            Expr::Binary { op, .. } => op.precedence(),
            Expr::Unary { .. } => 6,
            _ => u8::MAX,
        }
    }

    /// Immutable walk over the whole tree (this node included).
    pub fn walk(&self, f: &mut impl FnMut(&Expr)) {
        f(self);
        match self {
            Expr::MemArea(inner) | Expr::MemFunc(inner) | Expr::Paren(inner) => inner.walk(f),
            Expr::Unary { expr, .. } => expr.walk(f),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.walk(f);
                rhs.walk(f);
            }
            Expr::Func { args, .. } | Expr::FuncVar { args, .. } => {
                for arg in args {
                    arg.walk(f);
                }
            }
            Expr::AttrSum(arg) => arg.walk(f),
            Expr::AttrIf {
                cond,
                when_true,
                when_false,
            } => {
                cond.walk(f);
                when_true.walk(f);
                if let Some(wf) = when_false {
                    wf.walk(f);
                }
            }
            _ => {}
        }
    }

    /// Whether serializing this tree requires the volatile attribute prefix:
    /// a volatile built-in anywhere in the tree, or a range operator whose
    /// endpoints are expressions (which the serializer wraps in a MemFunc
    /// and marks volatile).
    #[must_use]
    pub fn is_volatile(&self) -> bool {
        let mut volatile = false;
        self.walk(&mut |e| match e {
            Expr::Func { id, .. } | Expr::FuncVar { id, .. } => {
                if crate::functions::function_spec_from_id(*id).is_some_and(|s| s.volatile) {
                    volatile = true;
                }
            }
            Expr::Binary {
                op: BinaryOp::Range,
                ..
            } => volatile = true,
            _ => {}
        });
        volatile
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trees_survive_a_serde_round_trip() {
        let expr = Expr::Binary {
            op: BinaryOp::Add,
            lhs: Box::new(Expr::Cell(CellRef::relative(0, 0))),
            rhs: Box::new(Expr::AttrIf {
                cond: Box::new(Expr::Bool(true)),
                when_true: Box::new(Expr::Number(1.5)),
                when_false: None,
            }),
        };
        let json = serde_json::to_string(&expr).unwrap();
        assert_eq!(serde_json::from_str::<Expr>(&json).unwrap(), expr);
    }

    #[test]
    fn range_operands_mark_the_tree_volatile() {
        let range = Expr::Binary {
            op: BinaryOp::Range,
            lhs: Box::new(Expr::Cell(CellRef::relative(0, 0))),
            rhs: Box::new(Expr::Cell(CellRef::relative(3, 3))),
        };
        assert!(range.is_volatile());
        assert!(!Expr::Cell(CellRef::relative(0, 0)).is_volatile());
    }
}
