use gridbook_formula::{
    display::{render, RenderOptions},
    parser::{parse_text, ParseOptions},
    FormulaError, Locale,
};
use gridbook_model::{BiffVersion, NameTable, SheetTable};
use pretty_assertions::assert_eq;

const SHEETS: [&str; 3] = ["Sheet1", "My Sheet", "Data"];
const NAMES: [&str; 2] = ["TaxRate", "Discount"];

struct Book;

impl SheetTable for Book {
    fn sheet_index(&self, name: &str) -> Option<u16> {
        SHEETS
            .iter()
            .position(|s| s.eq_ignore_ascii_case(name))
            .map(|i| i as u16)
    }

    fn sheet_name(&self, index: u16) -> Option<&str> {
        SHEETS.get(usize::from(index)).copied()
    }

    fn version(&self) -> BiffVersion {
        BiffVersion::Biff8
    }
}

struct Names;

impl NameTable for Names {
    fn name_index(&self, name: &str) -> Option<u32> {
        NAMES
            .iter()
            .position(|n| n.eq_ignore_ascii_case(name))
            .map(|i| i as u32 + 1)
    }

    fn name(&self, index: u32) -> Option<&str> {
        index
            .checked_sub(1)
            .and_then(|i| NAMES.get(i as usize))
            .copied()
    }
}

fn parse_opts(locale: Locale) -> ParseOptions<'static> {
    ParseOptions {
        sheets: &Book,
        names: &Names,
        locale,
    }
}

fn render_opts(locale: Locale) -> RenderOptions<'static> {
    RenderOptions {
        sheets: &Book,
        names: &Names,
        locale,
    }
}

/// Parse, render, re-parse: the text must come back verbatim and the re-parse
/// must produce a tree equal to the first.
fn roundtrip(text: &str) -> String {
    let tree = parse_text(text, &parse_opts(Locale::EnUs)).expect("parse");
    let rendered = render(&tree, &render_opts(Locale::EnUs)).expect("render");
    let reparsed = parse_text(&rendered, &parse_opts(Locale::EnUs)).expect("re-parse");
    assert_eq!(reparsed, tree, "{text}");
    rendered
}

#[test]
fn plain_expressions_roundtrip_verbatim() {
    for text in [
        "A1+A5",
        "-A1%",
        "1+2*3^2",
        "(1+2)*3",
        "2.5/$B$2",
        "A$1:$B2",
        "SUM(A1:A3,B2)",
        "SUM((A1,B2))",
        "IF(A1>0,\"yes\",\"no\")",
        "IF(A1<=2,1)",
        "MAX(1,2,3)",
        "COUNT(A:C)",
        "SUM($A:$A)",
        "COUNT(A:$C)",
        "A1:B2 C1:D4",
        "\"ab\"\"c\"&D2",
        "TaxRate*2",
        "TRUE",
        "#DIV/0!",
        "NOW()",
    ] {
        assert_eq!(roundtrip(text), text);
    }
}

#[test]
fn leading_equals_is_accepted_and_dropped() {
    assert_eq!(roundtrip("=1+2"), "1+2");
}

#[test]
fn sheet_references_resolve_and_requote() {
    assert_eq!(roundtrip("Data!A1"), "Data!A1");
    assert_eq!(roundtrip("Data!A1:B2"), "Data!A1:B2");
    // A sheet name with a space renders quoted, whatever the input form.
    assert_eq!(roundtrip("'My Sheet'!$A$1"), "'My Sheet'!$A$1");
}

#[test]
fn missing_arguments_render_as_empty_slots() {
    assert_eq!(roundtrip("IF(A1>0,,2)"), "IF(A1>0,,2)");
}

#[test]
fn localized_names_and_separators() {
    let tree = parse_text("SUMME(A1;A2)", &parse_opts(Locale::DeDe)).expect("parse de-DE");
    assert_eq!(
        render(&tree, &render_opts(Locale::DeDe)).expect("render de-DE"),
        "SUMME(A1;A2)"
    );
    assert_eq!(
        render(&tree, &render_opts(Locale::EnUs)).expect("render en-US"),
        "SUM(A1,A2)"
    );

    let tree = parse_text("SOMME(A1;A2)", &parse_opts(Locale::FrFr)).expect("parse fr-FR");
    assert_eq!(
        render(&tree, &render_opts(Locale::EnUs)).expect("render en-US"),
        "SUM(A1,A2)"
    );
}

#[test]
fn union_arguments_are_parenthesized_on_render() {
    use gridbook_formula::{BinaryOp, CellRef, Expr};

    assert_eq!(roundtrip("SUM((A1,B2),C3)"), "SUM((A1,B2),C3)");

    // The decoder can produce a bare union argument with no Paren node; the
    // renderer must group it so the comma survives re-parsing.
    let tree = Expr::FuncVar {
        id: 4,
        args: vec![
            Expr::Binary {
                op: BinaryOp::Union,
                lhs: Box::new(Expr::Cell(CellRef::relative(0, 0))),
                rhs: Box::new(Expr::Cell(CellRef::relative(1, 1))),
            },
            Expr::Cell(CellRef::relative(2, 2)),
        ],
    };
    assert_eq!(
        render(&tree, &render_opts(Locale::EnUs)).expect("render"),
        "SUM((A1,B2),C3)"
    );
}

#[test]
fn space_before_the_argument_list_is_still_a_call() {
    assert_eq!(roundtrip("SUM (A1)"), "SUM(A1)");
    assert_eq!(roundtrip("IF (A1>0,1,2)"), "IF(A1>0,1,2)");
    // A defined name followed by a parenthesized operand stays an
    // intersection.
    assert_eq!(roundtrip("TaxRate (A1)"), "TaxRate (A1)");
}

#[test]
fn stray_column_anchors_fail() {
    let err = parse_text("$A+1", &parse_opts(Locale::EnUs)).unwrap_err();
    assert_eq!(err, FormulaError::Lexical { pos: 0 });
}

#[test]
fn unknown_function_names_fail() {
    let err = parse_text("FOO(1)", &parse_opts(Locale::EnUs)).unwrap_err();
    assert_eq!(
        err,
        FormulaError::UnrecognizedFunction {
            name: "FOO".to_string()
        }
    );
}

#[test]
fn bad_arity_fails() {
    let err = parse_text("IF(1)", &parse_opts(Locale::EnUs)).unwrap_err();
    assert!(matches!(err, FormulaError::IncorrectArguments { got: 1, .. }));
}

#[test]
fn unknown_defined_names_fail() {
    let err = parse_text("Bogus+1", &parse_opts(Locale::EnUs)).unwrap_err();
    assert_eq!(err, FormulaError::NameNotFound("Bogus".to_string()));
}

#[test]
fn unknown_sheets_fail() {
    let err = parse_text("Missing!A1", &parse_opts(Locale::EnUs)).unwrap_err();
    assert_eq!(err, FormulaError::SheetNotFound("Missing".to_string()));
}

#[test]
fn lexical_errors_carry_the_offset() {
    let err = parse_text("1+\u{1}", &parse_opts(Locale::EnUs)).unwrap_err();
    assert_eq!(err, FormulaError::Lexical { pos: 2 });
}
