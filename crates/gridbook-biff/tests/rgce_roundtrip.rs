use gridbook_biff::{DecodeWarning, Formula, WorkbookContext};
use gridbook_formula::{FormulaError, Locale, ParseContext};
use gridbook_model::{BiffVersion, CellCoord, NoNames, SheetTable};
use pretty_assertions::assert_eq;

const HOST: CellCoord = CellCoord { row: 0, col: 0 };
const SHEETS: [&str; 2] = ["Sheet1", "Data"];

struct Book {
    version: BiffVersion,
}

impl Book {
    fn biff8() -> Self {
        Book {
            version: BiffVersion::Biff8,
        }
    }
}

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
        self.version
    }
}

fn ctx(book: &Book) -> WorkbookContext<'_> {
    WorkbookContext {
        sheets: book,
        names: &NoNames,
        locale: Locale::EnUs,
    }
}

fn encode(text: &str) -> Vec<u8> {
    let book = Book::biff8();
    Formula::parse_text(text, HOST, &ctx(&book), ParseContext::Default)
        .expect("parse")
        .rgce()
        .expect("encode")
}

/// Encode, decode, check the re-encode is byte-identical, and hand back the
/// rendered text of the decoded tree.
fn roundtrip(text: &str) -> String {
    let book = Book::biff8();
    let bytes = encode(text);
    let formula =
        Formula::parse_rgce(&bytes, HOST, &ctx(&book), ParseContext::Default).expect("decode");
    assert_eq!(formula.rgce().expect("re-encode"), bytes, "{text}");
    assert!(formula.warnings().is_empty(), "{text}");
    formula.text(&ctx(&book)).expect("render")
}

#[test]
fn arithmetic_encodes_in_reverse_polish_order() {
    // 1+2*3: both operands of the addition complete before the operator.
    assert_eq!(
        encode("1+2*3"),
        vec![
            0x1E, 0x01, 0x00, // 1
            0x1E, 0x02, 0x00, // 2
            0x1E, 0x03, 0x00, // 3
            0x05, // *
            0x03, // +
        ]
    );
}

#[test]
fn single_argument_sum_inlines_to_an_attribute() {
    assert_eq!(
        encode("SUM(A1:A3)"),
        vec![
            0x45, // PtgArea, value class
            0x00, 0x00, // first row
            0x02, 0x00, // last row
            0x00, 0xC0, // first col, fully relative
            0x00, 0xC0, // last col, fully relative
            0x19, 0x10, 0x00, 0x00, // tAttrSum
        ]
    );
}

#[test]
fn multi_argument_sum_stays_a_function_call() {
    let bytes = encode("SUM(A1,B2)");
    // Closing token is the variable-arity opcode with argc 2 and iftab 4.
    assert_eq!(&bytes[bytes.len() - 4..], &[0x42, 0x02, 0x04, 0x00]);
    assert_eq!(roundtrip("SUM(A1,B2)"), "SUM(A1,B2)");
}

#[test]
fn if_attributes_carry_branch_byte_lengths() {
    assert_eq!(
        encode("IF(A1>5,1,2)"),
        vec![
            0x44, 0x00, 0x00, 0x00, 0xC0, // A1, value class
            0x1E, 0x05, 0x00, // 5
            0x0D, // >
            0x19, 0x02, 0x03, 0x00, // tAttrIf, true branch is 3 bytes
            0x1E, 0x01, 0x00, // 1
            0x19, 0x08, 0x03, 0x00, // tAttrGoto, false branch is 3 bytes
            0x1E, 0x02, 0x00, // 2
            0x19, 0x08, 0x03, 0x00, // closing tAttrGoto
            0x42, 0x03, 0x01, 0x00, // variable-arity marker, argc 3, iftab 1
        ]
    );
}

#[test]
fn two_argument_if_omits_the_false_branch() {
    let bytes = encode("IF(A1>0,1)");
    assert_eq!(&bytes[bytes.len() - 8..], &[
        0x19, 0x08, 0x00, 0x00, // tAttrGoto, no false branch
        0x42, 0x02, 0x01, 0x00,
    ]);
    assert_eq!(roundtrip("IF(A1>0,1)"), "IF(A1>0,1)");
}

#[test]
fn computed_range_wraps_in_a_memfunc_and_goes_volatile() {
    let bytes = encode("SUM(A1:OFFSET(A10,1,0))");
    assert_eq!(&bytes[..4], &[0x19, 0x01, 0x00, 0x00], "volatile prefix");
    assert_eq!(bytes[4], 0x49, "MemFunc, value class");
    let inner_len = u16::from_le_bytes([bytes[5], bytes[6]]);
    // A1 (5) + A10 (5) + two ints (6) + OFFSET call (4) + range op (1).
    assert_eq!(inner_len, 21);
    assert_eq!(bytes[7], 0x64, "range endpoint takes the array class");
    assert_eq!(roundtrip("SUM(A1:OFFSET(A10,1,0))"), "SUM(A1:OFFSET(A10,1,0))");
}

#[test]
fn sumproduct_areas_take_the_array_class() {
    let bytes = encode("SUMPRODUCT(A1:A3,B1:B3)");
    assert_eq!(bytes[0], 0x65, "PtgArea, array class");
    assert_eq!(bytes[9], 0x65);
    // The call itself keeps the context class.
    assert_eq!(&bytes[bytes.len() - 4..], &[0x42, 0x02, 0xE4, 0x00]);
}

#[test]
fn data_validation_context_selects_the_reference_class() {
    let book = Book::biff8();
    let formula = Formula::parse_text("A1", HOST, &ctx(&book), ParseContext::DataValidation)
        .expect("parse");
    assert_eq!(formula.rgce().expect("encode")[0], 0x24);
}

#[test]
fn decoded_streams_reencode_byte_for_byte() {
    for text in [
        "B1*2",
        "-A1+3",
        "A1%",
        "1<=2",
        "\"ab\"\"c\"&D2",
        "(1+2)*3",
        "SUM((A1,B2))",
        "A1:B2 C1:D4",
        "Data!A1+Data!B1:C4",
        "A:B",
        "$A:$A",
        "IF(A1>0,\"yes\",\"no\")",
        "MAX(1,2,3)",
        "2.5*A$3",
        "TRUE",
        "#REF!+1",
    ] {
        assert_eq!(roundtrip(text), text);
    }
}

#[test]
fn shared_formula_tokens_resolve_against_the_host_cell() {
    let book = Book::biff8();
    // PtgRefN, value class: row offset -2, col offset +1, both relative.
    let bytes = [0x4C, 0xFE, 0xFF, 0x01, 0xC0];
    let host = CellCoord { row: 5, col: 2 };
    let formula =
        Formula::parse_rgce(&bytes, host, &ctx(&book), ParseContext::Default).expect("decode");
    assert_eq!(formula.text(&ctx(&book)).expect("render"), "D4");
}

#[test]
fn rows_inserted_shift_decoded_references() {
    let book = Book::biff8();
    let bytes = encode("A1+A5");
    let mut formula =
        Formula::parse_rgce(&bytes, HOST, &ctx(&book), ParseContext::Default).expect("decode");
    formula.row_inserted(0, 2, true);
    assert_eq!(formula.text(&ctx(&book)).expect("render"), "A1+A6");
}

#[test]
fn imported_3d_references_invalidate_the_formula() {
    let book = Book::biff8();
    let bytes = encode("Data!A1+1");
    let mut formula =
        Formula::parse_rgce(&bytes, HOST, &ctx(&book), ParseContext::Default).expect("decode");
    assert!(formula.is_valid());
    formula.handle_imported_refs();
    assert!(!formula.is_valid());
}

#[test]
fn biff5_streams_are_rejected_before_decoding() {
    let book = Book {
        version: BiffVersion::Biff5,
    };
    let err = Formula::parse_rgce(&[0x1E, 0x01, 0x00], HOST, &ctx(&book), ParseContext::Default)
        .unwrap_err();
    assert_eq!(err, FormulaError::UnsupportedVersion(BiffVersion::Biff5));
}

#[test]
fn unknown_opcodes_fail_with_their_offset() {
    let book = Book::biff8();
    let err = Formula::parse_rgce(
        &[0x1E, 0x01, 0x00, 0x01],
        HOST,
        &ctx(&book),
        ParseContext::Default,
    )
    .unwrap_err();
    assert_eq!(err, FormulaError::UnrecognizedToken { byte: 0x01, pos: 3 });
}

#[test]
fn unknown_sheet_indices_fail() {
    let book = Book::biff8();
    // PtgRef3d, value class, ixti 9.
    let err = Formula::parse_rgce(
        &[0x5A, 0x09, 0x00, 0x00, 0x00, 0x00, 0xC0],
        HOST,
        &ctx(&book),
        ParseContext::Default,
    )
    .unwrap_err();
    assert_eq!(err, FormulaError::SheetIndexNotFound(9));
}

#[test]
fn missing_sheet_names_fail_at_parse_time() {
    let book = Book::biff8();
    let err = Formula::parse_text("Missing!A1", HOST, &ctx(&book), ParseContext::Default)
        .unwrap_err();
    assert_eq!(err, FormulaError::SheetNotFound("Missing".to_string()));
}

#[test]
fn leftover_operands_are_tolerated_with_a_warning() {
    let book = Book::biff8();
    let bytes = [0x1E, 0x01, 0x00, 0x1E, 0x02, 0x00];
    let formula =
        Formula::parse_rgce(&bytes, HOST, &ctx(&book), ParseContext::Default).expect("decode");
    assert_eq!(
        formula.warnings(),
        &[DecodeWarning::UnreducedStack { depth: 2 }]
    );
    assert_eq!(formula.text(&ctx(&book)).expect("render"), "2");
}

#[test]
fn truncated_payloads_are_hard_errors() {
    let book = Book::biff8();
    let err = Formula::parse_rgce(&[0x1E, 0x01], HOST, &ctx(&book), ParseContext::Default)
        .unwrap_err();
    assert_eq!(err, FormulaError::MalformedStream { pos: 1 });
}
