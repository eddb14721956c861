//! Reference rebasing under structural edits.
//!
//! These walks mutate reference operands in place. Row/column insertion and
//! removal shift relative coordinates at or beyond the edit point; anchored
//! (`$`) coordinates never move, and whole-column area ends are pinned to
//! the row sentinel. Invalidity discovered during an import
//! is reported upward through the return value; the owning formula records
//! it, there are no parent pointers in the tree.

use crate::ast::{AreaRef, CellRef, Expr};
use gridbook_model::{MAX_COLS, MAX_ROWS, ROW_ENTIRE_COLUMN};

/// Outcome of an import scan: a tree holding defined-name or 3-D references
/// cannot be re-resolved in the destination workbook and becomes invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validity {
    Valid,
    Invalid,
}

impl Validity {
    fn and(self, other: Validity) -> Validity {
        if self == Validity::Invalid || other == Validity::Invalid {
            Validity::Invalid
        } else {
            Validity::Valid
        }
    }
}

/// What a structural edit does to a single coordinate.
#[derive(Debug, Clone, Copy)]
enum Shift {
    Inserted { at: u32 },
    Removed { at: u32 },
}

impl Shift {
    fn apply(self, coord: u32) -> u32 {
        match self {
            Shift::Inserted { at } if coord >= at => coord + 1,
            // The edit point itself collapses onto the removed slot.
            Shift::Removed { at } if coord > at => coord - 1,
            _ => coord,
        }
    }
}

/// Which axis a structural edit runs along.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Row,
    Col,
}

pub fn row_inserted(expr: &mut Expr, sheet: u16, row: u32, current_sheet: bool) {
    structural_edit(expr, sheet, current_sheet, Axis::Row, Shift::Inserted { at: row });
}

pub fn row_removed(expr: &mut Expr, sheet: u16, row: u32, current_sheet: bool) {
    structural_edit(expr, sheet, current_sheet, Axis::Row, Shift::Removed { at: row });
}

pub fn column_inserted(expr: &mut Expr, sheet: u16, col: u32, current_sheet: bool) {
    structural_edit(expr, sheet, current_sheet, Axis::Col, Shift::Inserted { at: col });
}

pub fn column_removed(expr: &mut Expr, sheet: u16, col: u32, current_sheet: bool) {
    structural_edit(expr, sheet, current_sheet, Axis::Col, Shift::Removed { at: col });
}

fn structural_edit(expr: &mut Expr, sheet: u16, current_sheet: bool, axis: Axis, shift: Shift) {
    match expr {
        Expr::Cell(cell) => {
            if current_sheet {
                shift_cell(cell, axis, shift);
            }
        }
        Expr::Area(area) => {
            if current_sheet {
                shift_area(area, axis, shift);
            }
        }
        Expr::Cell3d(r) => {
            if r.sheet == sheet {
                shift_cell(&mut r.cell, axis, shift);
            }
        }
        Expr::Area3d(r) => {
            if r.sheet == sheet {
                shift_area(&mut r.area, axis, shift);
            }
        }
        Expr::MemArea(inner) | Expr::MemFunc(inner) | Expr::Paren(inner) => {
            structural_edit(inner, sheet, current_sheet, axis, shift);
        }
        Expr::Unary { expr, .. } => structural_edit(expr, sheet, current_sheet, axis, shift),
        Expr::Binary { lhs, rhs, .. } => {
            structural_edit(lhs, sheet, current_sheet, axis, shift);
            structural_edit(rhs, sheet, current_sheet, axis, shift);
        }
        Expr::Func { args, .. } | Expr::FuncVar { args, .. } => {
            for arg in args {
                structural_edit(arg, sheet, current_sheet, axis, shift);
            }
        }
        Expr::AttrSum(arg) => structural_edit(arg, sheet, current_sheet, axis, shift),
        Expr::AttrIf {
            cond,
            when_true,
            when_false,
        } => {
            structural_edit(cond, sheet, current_sheet, axis, shift);
            structural_edit(when_true, sheet, current_sheet, axis, shift);
            if let Some(wf) = when_false {
                structural_edit(wf, sheet, current_sheet, axis, shift);
            }
        }
        _ => {}
    }
}

fn shift_cell(cell: &mut CellRef, axis: Axis, shift: Shift) {
    match axis {
        Axis::Row if !cell.row_abs => cell.row = shift.apply(cell.row),
        Axis::Col if !cell.col_abs => cell.col = shift.apply(cell.col),
        _ => {}
    }
}

fn shift_area(area: &mut AreaRef, axis: Axis, shift: Shift) {
    shift_cell(&mut area.first, axis, shift);
    // A whole-column area's last row is the sentinel and never moves under
    // row edits.
    if axis == Axis::Row && area.last.row == ROW_ENTIRE_COLUMN {
        return;
    }
    shift_cell(&mut area.last, axis, shift);
}

/// Copy-adjustment: the formula moved to a cell `col_delta`/`row_delta`
/// away, so every *relative* coordinate follows. Absolute coordinates are
/// untouched. Results are clamped to the grid.
pub fn adjust_relative_refs(expr: &mut Expr, col_delta: i32, row_delta: i32) {
    match expr {
        Expr::Cell(cell) => adjust_cell(cell, col_delta, row_delta),
        Expr::Area(area) => {
            adjust_cell(&mut area.first, col_delta, row_delta);
            adjust_cell(&mut area.last, col_delta, row_delta);
        }
        Expr::Cell3d(r) => adjust_cell(&mut r.cell, col_delta, row_delta),
        Expr::Area3d(r) => {
            adjust_cell(&mut r.area.first, col_delta, row_delta);
            adjust_cell(&mut r.area.last, col_delta, row_delta);
        }
        Expr::MemArea(inner) | Expr::MemFunc(inner) | Expr::Paren(inner) => {
            adjust_relative_refs(inner, col_delta, row_delta);
        }
        Expr::Unary { expr, .. } => adjust_relative_refs(expr, col_delta, row_delta),
        Expr::Binary { lhs, rhs, .. } => {
            adjust_relative_refs(lhs, col_delta, row_delta);
            adjust_relative_refs(rhs, col_delta, row_delta);
        }
        Expr::Func { args, .. } | Expr::FuncVar { args, .. } => {
            for arg in args {
                adjust_relative_refs(arg, col_delta, row_delta);
            }
        }
        Expr::AttrSum(arg) => adjust_relative_refs(arg, col_delta, row_delta),
        Expr::AttrIf {
            cond,
            when_true,
            when_false,
        } => {
            adjust_relative_refs(cond, col_delta, row_delta);
            adjust_relative_refs(when_true, col_delta, row_delta);
            if let Some(wf) = when_false {
                adjust_relative_refs(wf, col_delta, row_delta);
            }
        }
        _ => {}
    }
}

fn adjust_cell(cell: &mut CellRef, col_delta: i32, row_delta: i32) {
    if !cell.col_abs {
        cell.col = offset_coord(cell.col, col_delta, MAX_COLS);
    }
    if !cell.row_abs && cell.row != ROW_ENTIRE_COLUMN {
        cell.row = offset_coord(cell.row, row_delta, MAX_ROWS);
    }
}

fn offset_coord(coord: u32, delta: i32, max: u32) -> u32 {
    let moved = i64::from(coord) + i64::from(delta);
    moved.clamp(0, i64::from(max) - 1) as u32
}

/// Import scan: defined names and 3-D references point into tables of the
/// source workbook and may not resolve in the destination, so their
/// presence invalidates the tree. Plain same-sheet references survive.
pub fn handle_imported_refs(expr: &Expr) -> Validity {
    match expr {
        Expr::Name(_) | Expr::Cell3d(_) | Expr::Area3d(_) => Validity::Invalid,
        Expr::MemArea(inner) | Expr::MemFunc(inner) | Expr::Paren(inner) => {
            handle_imported_refs(inner)
        }
        Expr::Unary { expr, .. } => handle_imported_refs(expr),
        Expr::Binary { lhs, rhs, .. } => {
            handle_imported_refs(lhs).and(handle_imported_refs(rhs))
        }
        Expr::Func { args, .. } | Expr::FuncVar { args, .. } => args
            .iter()
            .fold(Validity::Valid, |v, arg| v.and(handle_imported_refs(arg))),
        Expr::AttrSum(arg) => handle_imported_refs(arg),
        Expr::AttrIf {
            cond,
            when_true,
            when_false,
        } => {
            let mut v = handle_imported_refs(cond).and(handle_imported_refs(when_true));
            if let Some(wf) = when_false {
                v = v.and(handle_imported_refs(wf));
            }
            v
        }
        _ => Validity::Valid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryOp, Cell3dRef};
    use pretty_assertions::assert_eq;

    fn add(lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary {
            op: BinaryOp::Add,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    #[test]
    fn row_insert_shifts_references_at_or_beyond_the_edit() {
        // A1+A5, insert a row at 0-based index 2: A5 shifts, A1 does not.
        let mut expr = add(
            Expr::Cell(CellRef::relative(0, 0)),
            Expr::Cell(CellRef::relative(4, 0)),
        );
        row_inserted(&mut expr, 0, 2, true);
        assert_eq!(
            expr,
            add(
                Expr::Cell(CellRef::relative(0, 0)),
                Expr::Cell(CellRef::relative(5, 0)),
            )
        );
    }

    #[test]
    fn anchored_coordinates_never_move_under_structural_edits() {
        // $A$5 with a row inserted at the top stays $A$5.
        let mut expr = Expr::Cell(CellRef::absolute(4, 0));
        row_inserted(&mut expr, 0, 0, true);
        assert_eq!(expr, Expr::Cell(CellRef::absolute(4, 0)));
        row_removed(&mut expr, 0, 0, true);
        column_inserted(&mut expr, 0, 0, true);
        assert_eq!(expr, Expr::Cell(CellRef::absolute(4, 0)));

        // A mixed anchor moves only on its relative axis.
        let mut expr = Expr::Cell(CellRef {
            row: 4,
            col: 2,
            row_abs: true,
            col_abs: false,
        });
        row_inserted(&mut expr, 0, 0, true);
        column_inserted(&mut expr, 0, 0, true);
        assert_eq!(
            expr,
            Expr::Cell(CellRef {
                row: 4,
                col: 3,
                row_abs: true,
                col_abs: false,
            })
        );
    }

    #[test]
    fn insert_then_remove_at_same_index_is_identity() {
        let original = add(
            Expr::Cell(CellRef::relative(9, 3)),
            Expr::Area(AreaRef::new(
                CellRef::relative(1, 1),
                CellRef::absolute(7, 5),
            )),
        );
        for at in [0, 2, 8] {
            let mut expr = original.clone();
            row_inserted(&mut expr, 0, at, true);
            row_removed(&mut expr, 0, at, true);
            assert_eq!(expr, original, "row edit at {at}");

            let mut expr = original.clone();
            column_inserted(&mut expr, 0, at, true);
            column_removed(&mut expr, 0, at, true);
            assert_eq!(expr, original, "column edit at {at}");
        }
    }

    #[test]
    fn edits_on_other_sheets_leave_3d_references_alone() {
        let mut expr = Expr::Cell3d(Cell3dRef {
            sheet: 1,
            cell: CellRef::relative(5, 5),
        });
        let original = expr.clone();
        row_inserted(&mut expr, 0, 0, false);
        assert_eq!(expr, original);
        row_inserted(&mut expr, 1, 0, false);
        assert_eq!(
            expr,
            Expr::Cell3d(Cell3dRef {
                sheet: 1,
                cell: CellRef::relative(6, 5),
            })
        );
    }

    #[test]
    fn whole_column_area_end_is_pinned_under_row_edits() {
        let mut expr = Expr::Area(AreaRef::new(
            CellRef {
                row: 0,
                col: 0,
                row_abs: true,
                col_abs: false,
            },
            CellRef {
                row: ROW_ENTIRE_COLUMN,
                col: 1,
                row_abs: true,
                col_abs: false,
            },
        ));
        let original = expr.clone();
        row_inserted(&mut expr, 0, 100, true);
        match (&expr, &original) {
            (Expr::Area(a), Expr::Area(b)) => {
                assert_eq!(a.last, b.last, "sentinel end must not move");
            }
            _ => unreachable!("area expression"),
        }
    }

    #[test]
    fn copy_adjust_moves_only_relative_coordinates() {
        let mut expr = add(
            Expr::Cell(CellRef::relative(2, 2)),
            Expr::Cell(CellRef::absolute(2, 2)),
        );
        adjust_relative_refs(&mut expr, 3, -1);
        assert_eq!(
            expr,
            add(
                Expr::Cell(CellRef::relative(1, 5)),
                Expr::Cell(CellRef::absolute(2, 2)),
            )
        );
    }

    #[test]
    fn imported_trees_with_names_or_3d_refs_become_invalid() {
        let plain = add(
            Expr::Cell(CellRef::relative(0, 0)),
            Expr::Integer(1),
        );
        assert_eq!(handle_imported_refs(&plain), Validity::Valid);

        let tree = add(
            Expr::Cell(CellRef::relative(0, 0)),
            Expr::Cell3d(Cell3dRef {
                sheet: 2,
                cell: CellRef::relative(0, 0),
            }),
        );
        assert_eq!(handle_imported_refs(&tree), Validity::Invalid);
    }
}
