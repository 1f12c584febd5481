//! Tokenizer behavior on realistic upload files

use pcm_server::migration::csv::{parse, parse_bytes, parse_table, ParsedRow};
use pcm_server::migration::report::{render, ErrorRow, REASON_HEADER};

fn values(row: &ParsedRow) -> Vec<Option<&str>> {
    row.values().collect()
}

#[test]
fn test_spreadsheet_export_with_bom_and_crlf() {
    let text = "\u{FEFF}key,name,description\r\nP1,Algebra,\"Linear, quadratic\"\r\n\r\nP2,Geometry,\r\n";
    let table = parse_table(text);

    assert_eq!(table.headers, vec!["key", "name", "description"]);
    assert_eq!(table.rows.len(), 2);
    assert_eq!(
        values(&table.rows[0]),
        vec![Some("P1"), Some("Algebra"), Some("Linear, quadratic")]
    );
    assert_eq!(table.rows[1].get("description"), None);
    assert_eq!(table.rows[1].raw("description"), Some(""));
}

#[test]
fn test_line_numbers_follow_the_source_file() {
    let rows = parse("key,name\n\nP1,Algebra\n   \nP2,Geometry\n");

    assert_eq!(rows[0].line(), 3);
    assert_eq!(rows[1].line(), 5);
}

#[test]
fn test_header_names_are_trimmed_and_lookup_ignores_case() {
    let rows = parse(" Key , programKey \n  P1 ,  X  \n");

    assert_eq!(rows[0].raw("Key"), Some("P1"));
    assert_eq!(rows[0].get("KEY"), Some("P1"));
    assert_eq!(rows[0].get("programkey"), Some("X"));
}

#[test]
fn test_ragged_rows() {
    let rows = parse("a,b,c\n1\n1,2,3,4,5\n");

    assert_eq!(values(&rows[0]), vec![Some("1"), None, None]);
    assert_eq!(values(&rows[1]), vec![Some("1"), Some("2"), Some("3")]);
}

#[test]
fn test_doubled_quotes_collapse_to_nothing() {
    let rows = parse("key,name\nP1,\"The \"\"Best\"\" Program\"\n");

    assert_eq!(rows[0].get("name"), Some("The Best Program"));
}

#[test]
fn test_header_only_and_empty_files() {
    assert!(parse("key,name\n").is_empty());
    assert!(parse("").is_empty());
    assert!(parse_table("\n\n").headers.is_empty());
}

#[test]
fn test_invalid_utf8_reports_offset() {
    let err = parse_bytes(b"key,name\n\xe9t\xe9\n").unwrap_err();

    assert_eq!(err.offset, 9);
    assert!(err.to_string().contains("UTF-8"));
}

#[test]
fn test_error_report_reads_back_as_the_original_rows() {
    let table = parse_table("key,name,description\nP1,\"Algebra, Part 1\",Intro\nP2,Geometry,Shapes\n");
    let errors: Vec<ErrorRow> = table
        .rows
        .iter()
        .map(|row| ErrorRow {
            row: row.clone(),
            reason: "rejected, see log".to_string(),
        })
        .collect();

    let report = parse_table(&render(&table.headers, &errors));

    assert_eq!(report.headers.last().map(String::as_str), Some(REASON_HEADER));
    assert_eq!(report.rows.len(), 2);
    for (original, reread) in table.rows.iter().zip(&report.rows) {
        for header in &table.headers {
            assert_eq!(original.raw(header), reread.raw(header));
        }
        assert_eq!(reread.raw(REASON_HEADER), Some("rejected, see log"));
    }
}
