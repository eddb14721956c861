//! Text rendering of a parse tree, the inverse of the text parser.
//!
//! Sheet and name indices resolve back to display strings through the same
//! collaborator tables the parser used; failure to resolve is a hard error
//! (the tree refers to something the workbook no longer knows about).

use crate::ast::{AreaRef, BinaryOp, CellRef, Expr, UnaryOp};
use crate::error::FormulaError;
use crate::locale::{display_name, Locale};
use gridbook_model::{column_index_to_label, NameTable, SheetTable, ROW_ENTIRE_COLUMN};

pub struct RenderOptions<'a> {
    pub sheets: &'a dyn SheetTable,
    pub names: &'a dyn NameTable,
    pub locale: Locale,
}

/// Render a tree to formula text (without a leading `=`).
pub fn render(expr: &Expr, opts: &RenderOptions<'_>) -> Result<String, FormulaError> {
    let mut out = String::new();
    fmt_expr(expr, opts, None, &mut out)?;
    Ok(out)
}

fn fmt_expr(
    expr: &Expr,
    opts: &RenderOptions<'_>,
    parent_prec: Option<u8>,
    out: &mut String,
) -> Result<(), FormulaError> {
    let my_prec = expr.precedence();
    let needs_parens = parent_prec.is_some_and(|p| my_prec < p);
    if needs_parens {
        out.push('(');
    }

    match expr {
        Expr::Integer(v) => out.push_str(&v.to_string()),
        Expr::Number(v) => out.push_str(&format_number(*v)),
        Expr::Text(s) => {
            out.push('"');
            for ch in s.chars() {
                if ch == '"' {
                    out.push('"');
                }
                out.push(ch);
            }
            out.push('"');
        }
        Expr::Bool(b) => out.push_str(if *b { "TRUE" } else { "FALSE" }),
        Expr::ErrConst(kind) => out.push_str(kind.as_str()),
        Expr::Missing => {}
        Expr::Cell(cell) => fmt_cell(cell, out),
        Expr::Area(area) => fmt_area(area, out),
        Expr::Cell3d(r) => {
            fmt_sheet_prefix(r.sheet, opts, out)?;
            fmt_cell(&r.cell, out);
        }
        Expr::Area3d(r) => {
            fmt_sheet_prefix(r.sheet, opts, out)?;
            fmt_area(&r.area, out);
        }
        Expr::Name(name) => {
            let resolved = opts
                .names
                .name(name.index)
                .ok_or_else(|| FormulaError::NameNotFound(format!("index {}", name.index)))?;
            out.push_str(resolved);
        }
        // The wrappers are an encoding artifact; text shows only the
        // wrapped expression.
        Expr::MemArea(inner) | Expr::MemFunc(inner) => fmt_expr(inner, opts, parent_prec, out)?,
        Expr::Paren(inner) => {
            out.push('(');
            fmt_expr(inner, opts, None, out)?;
            out.push(')');
        }
        Expr::Unary { op, expr } => match op {
            UnaryOp::Percent => {
                fmt_expr(expr, opts, Some(my_prec), out)?;
                out.push('%');
            }
            UnaryOp::Plus => {
                out.push('+');
                fmt_expr(expr, opts, Some(my_prec), out)?;
            }
            UnaryOp::Minus => {
                out.push('-');
                fmt_expr(expr, opts, Some(my_prec), out)?;
            }
        },
        Expr::Binary { op, lhs, rhs } => {
            fmt_expr(lhs, opts, Some(my_prec), out)?;
            if *op == BinaryOp::Union {
                out.push(opts.locale.arg_separator());
            } else {
                out.push_str(op.as_str());
            }
            // Left-to-right associativity: an equal-precedence right child
            // needs explicit grouping to read back the same way.
            fmt_expr(rhs, opts, Some(my_prec.saturating_add(1)), out)?;
        }
        Expr::Func { id, args } | Expr::FuncVar { id, args } => {
            fmt_call(*id, args, opts, out)?;
        }
        Expr::AttrSum(arg) => {
            fmt_call(crate::functions::IFTAB_SUM, std::slice::from_ref(arg), opts, out)?;
        }
        Expr::AttrIf {
            cond,
            when_true,
            when_false,
        } => {
            let mut args: Vec<&Expr> = vec![cond, when_true];
            if let Some(wf) = when_false {
                args.push(wf);
            }
            fmt_call_refs(crate::functions::IFTAB_IF, &args, opts, out)?;
        }
    }

    if needs_parens {
        out.push(')');
    }
    Ok(())
}

fn fmt_call(
    id: u16,
    args: &[Expr],
    opts: &RenderOptions<'_>,
    out: &mut String,
) -> Result<(), FormulaError> {
    let refs: Vec<&Expr> = args.iter().collect();
    fmt_call_refs(id, &refs, opts, out)
}

fn fmt_call_refs(
    id: u16,
    args: &[&Expr],
    opts: &RenderOptions<'_>,
    out: &mut String,
) -> Result<(), FormulaError> {
    let name = display_name(id, opts.locale).ok_or(FormulaError::UnrecognizedFunction {
        name: format!("index {id}"),
    })?;
    out.push_str(name);
    out.push('(');
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            out.push(opts.locale.arg_separator());
        }
        // A union inside an argument must be parenthesized so its comma
        // is not read back as an argument separator.
        if contains_union(arg) && !matches!(arg, Expr::Paren(_)) {
            out.push('(');
            fmt_expr(arg, opts, None, out)?;
            out.push(')');
        } else {
            fmt_expr(arg, opts, None, out)?;
        }
    }
    out.push(')');
    Ok(())
}

fn contains_union(expr: &Expr) -> bool {
    match expr {
        Expr::Binary { op, lhs, rhs } => {
            *op == BinaryOp::Union || contains_union(lhs) || contains_union(rhs)
        }
        Expr::Unary { expr, .. } => contains_union(expr),
        Expr::MemArea(inner) | Expr::MemFunc(inner) => contains_union(inner),
        _ => false,
    }
}

fn fmt_sheet_prefix(
    sheet: u16,
    opts: &RenderOptions<'_>,
    out: &mut String,
) -> Result<(), FormulaError> {
    let name = opts
        .sheets
        .sheet_name(sheet)
        .ok_or(FormulaError::SheetIndexNotFound(sheet))?;
    if sheet_name_needs_quoting(name) {
        out.push('\'');
        for ch in name.chars() {
            if ch == '\'' {
                out.push('\'');
            }
            out.push(ch);
        }
        out.push('\'');
    } else {
        out.push_str(name);
    }
    out.push('!');
    Ok(())
}

fn sheet_name_needs_quoting(name: &str) -> bool {
    name.is_empty()
        || name.bytes().next().is_some_and(|b| b.is_ascii_digit())
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || !c.is_ascii())
}

fn fmt_cell(cell: &CellRef, out: &mut String) {
    if cell.col_abs {
        out.push('$');
    }
    out.push_str(&column_index_to_label(cell.col));
    if cell.row_abs {
        out.push('$');
    }
    out.push_str(&(cell.row + 1).to_string());
}

fn fmt_area(area: &AreaRef, out: &mut String) {
    // Whole-column areas render as `A:B`, keeping the column anchors.
    if area.first.row == 0 && area.last.row == ROW_ENTIRE_COLUMN {
        if area.first.col_abs {
            out.push('$');
        }
        out.push_str(&column_index_to_label(area.first.col));
        out.push(':');
        if area.last.col_abs {
            out.push('$');
        }
        out.push_str(&column_index_to_label(area.last.col));
        return;
    }
    fmt_cell(&area.first, out);
    out.push(':');
    fmt_cell(&area.last, out);
}

/// Shortest text that parses back to the same `f64`.
fn format_number(v: f64) -> String {
    let s = format!("{v}");
    if s.contains('.') || s.contains('e') || s.contains("inf") || s.contains("NaN") {
        s
    } else {
        // Keep the floating form distinguishable from an integer literal.
        format!("{v:?}")
    }
}
