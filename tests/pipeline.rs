mod common;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sales_import::{
    data::CellValue,
    fields::{CanonicalField, FieldValue},
    mapping::{TableFormat, map_to_canonical},
    sheet::{CsvOptions, parse_table, parse_upload},
    validate::{check_required_columns, validate_and_transform},
};

use common::{Cell, finance_screening_headers, text_table, xlsx_bytes};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

#[test]
fn canonical_rows_split_into_valid_rows_and_errors() {
    let table = text_table(
        &["business_key", "name", "amount", "record_date"],
        &[
            &["A-001", "Alice", "25.50", "2025-01-12"],
            &["", "Bob", "abc", "bad-date"],
        ],
    );
    let (format, canonical) = map_to_canonical(&table);
    assert_eq!(format, TableFormat::Canonical);
    check_required_columns(&canonical).expect("all required columns present");

    let partition = validate_and_transform(&canonical);
    assert_eq!(partition.valid_rows.len(), 1);
    let row = &partition.valid_rows[0];
    assert_eq!(row.business_key, "A-001");
    assert_eq!(row.amount, Decimal::new(2550, 2));
    assert_eq!(row.record_date, date(2025, 1, 12));

    assert_eq!(partition.errors.len(), 3);
    assert!(partition.errors.iter().all(|error| error.row_number == 3));
    let columns = partition
        .errors
        .iter()
        .map(|error| error.column_name.as_deref().unwrap_or_default())
        .collect::<Vec<_>>();
    assert_eq!(columns, vec!["business_key", "amount", "record_date"]);
    assert_eq!(partition.errors[0].error_message, "business_key is required");
    assert_eq!(partition.errors[1].error_message, "amount is invalid: abc");
    assert_eq!(
        partition.errors[2].error_message,
        "record_date is invalid: bad-date"
    );
}

#[test]
fn finance_screening_workbook_maps_thai_headers() {
    let bytes = xlsx_bytes(
        &finance_screening_headers(),
        &[vec![
            Cell::Text("TANK::VINTH001"),
            Cell::Text("INV-001"),
            Cell::Text("สมชาย ใจดี"),
            Cell::Number(45672.0),
            Cell::Text("VINTH001"),
            Cell::Text("ถังน้ำ 2000 ลิตร"),
            Cell::Number(250000.0),
            Cell::Number(267500.0),
            Cell::Text("'0105551234567"),
            Cell::Number(0.0),
        ]],
    );
    let raw = parse_table(&bytes).expect("parse workbook");
    let (format, canonical) = map_to_canonical(&raw);
    assert_eq!(format, TableFormat::FinanceScreening);
    assert_eq!(canonical.value(0, "amount").to_string(), "267500");

    let partition = validate_and_transform(&canonical);
    assert!(partition.errors.is_empty(), "{:?}", partition.errors);
    let row = &partition.valid_rows[0];
    assert_eq!(row.business_key, "TANK::VINTH001");
    assert_eq!(row.name, "สมชาย ใจดี");
    assert_eq!(row.amount.to_string(), "267500");
    assert_eq!(row.record_date, date(2025, 1, 15));
    assert_eq!(row.date(CanonicalField::InvoiceDate), Some(date(2025, 1, 15)));
    assert_eq!(row.text(CanonicalField::TaxpayerId), Some("'0105551234567"));
    assert_eq!(row.text(CanonicalField::GroupId), Some("TANK::VINTH001"));
    assert_eq!(row.text(CanonicalField::InvoiceNo), Some("INV-001"));
    assert_eq!(row.text(CanonicalField::VinNo), Some("VINTH001"));
    assert_eq!(
        row.decimal(CanonicalField::ProductValue),
        Some(Decimal::from(250000))
    );
    assert_eq!(
        row.decimal(CanonicalField::TotalValue),
        Some(Decimal::from(267500))
    );
    assert_eq!(row.integer(CanonicalField::OrgTypeBranchNo), Some(0));
    assert_eq!(row.get(CanonicalField::SalePrice), None);
}

#[test]
fn blank_named_columns_fall_back_to_raw_positions() {
    let table = text_table(
        &["group_id", "", "ชื่อผู้ซื้อ", "วันที่", "", "", "", "มูลค่ารวม"],
        &[&[
            "TANK::VIN02",
            "INV-002",
            "",
            "12/01/2025",
            "",
            "",
            "",
            "1,070",
        ]],
    );
    let (_, canonical) = map_to_canonical(&table);
    let partition = validate_and_transform(&canonical);
    assert_eq!(partition.errors.len(), 1);
    assert_eq!(partition.errors[0].error_message, "name is required");

    let table = text_table(
        &["group_id", "", "", "วันที่", "", "", "", "มูลค่ารวม"],
        &[&["TANK::VIN02", "INV-002", "Somchai", "12/01/2025", "", "", "", "1,070"]],
    );
    let (_, canonical) = map_to_canonical(&table);
    let partition = validate_and_transform(&canonical);
    assert!(partition.errors.is_empty(), "{:?}", partition.errors);
    let row = &partition.valid_rows[0];
    assert_eq!(row.name, "Somchai");
    assert_eq!(row.amount, Decimal::from(1070));
    assert_eq!(row.record_date, date(2025, 1, 12));
    assert_eq!(row.text(CanonicalField::InvoiceNo), Some("INV-002"));
}

#[test]
fn named_sale_price_wins_over_position() {
    let mut headers = vec![""; 17];
    headers[0] = "group_id";
    headers[2] = "ชื่อผู้ซื้อ";
    headers[3] = "วันที่";
    headers[7] = "มูลค่ารวม";
    headers[15] = "หมายเหตุ";
    headers[16] = "ราคาขาย";

    let mut named = vec![""; 17];
    named[0] = "TANK::A";
    named[2] = "A";
    named[3] = "2025-02-01";
    named[7] = "100";
    named[15] = "999";
    named[16] = "950";

    let mut positional = named.clone();
    positional[0] = "TANK::B";
    positional[16] = "";

    let table = text_table(&headers, &[named.as_slice(), positional.as_slice()]);
    let (_, canonical) = map_to_canonical(&table);
    let partition = validate_and_transform(&canonical);
    assert_eq!(partition.valid_rows.len(), 2);
    assert_eq!(
        partition.valid_rows[0].get(CanonicalField::SalePrice),
        Some(FieldValue::Decimal(Decimal::from(950)))
    );
    assert_eq!(
        partition.valid_rows[1].get(CanonicalField::SalePrice),
        Some(FieldValue::Decimal(Decimal::from(999)))
    );
}

#[test]
fn blank_optional_text_is_absent() {
    let table = text_table(
        &["business_key", "name", "amount", "record_date", "invoice_no"],
        &[&["A-001", "Alice", "10", "2025-01-12", "   "]],
    );
    let partition = validate_and_transform(&table);
    assert_eq!(partition.valid_rows[0].get(CanonicalField::InvoiceNo), None);
}

#[test]
fn missing_required_columns_block_validation() {
    let table = text_table(&["customer", "total"], &[&["Alice", "10"]]);
    let (format, canonical) = map_to_canonical(&table);
    assert_eq!(format, TableFormat::Unrecognized);
    let err = check_required_columns(&canonical).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Missing required columns: business_key, name, amount, record_date"
    );
}

#[test]
fn csv_upload_goes_through_the_same_pipeline() {
    let csv = "Business_Key, Name ,Amount,Record_Date\nA-001,Alice,\"1,250.75\",2025-01-12\n";
    let raw = parse_upload("sales.csv", csv.as_bytes(), &CsvOptions::default())
        .expect("parse csv");
    let (format, canonical) = map_to_canonical(&raw);
    assert_eq!(format, TableFormat::Canonical);
    let partition = validate_and_transform(&canonical);
    assert!(partition.errors.is_empty());
    assert_eq!(partition.valid_rows[0].amount, Decimal::new(125075, 2));
}

#[test]
fn workbook_numbers_and_text_dates_both_validate() {
    let bytes = xlsx_bytes(
        &["business_key", "name", "amount", "record_date"],
        &[
            vec![
                Cell::Text("A-001"),
                Cell::Text("Alice"),
                Cell::Number(25.5),
                Cell::Number(45669.0),
            ],
            vec![
                Cell::Text("A-002"),
                Cell::Text("Bob"),
                Cell::Text("1,070"),
                Cell::Text("2025-01-13"),
            ],
            vec![
                Cell::Text("A-003"),
                Cell::Text("Carol"),
                Cell::Blank,
                Cell::Text("2025-01-14"),
            ],
        ],
    );
    let raw = parse_table(&bytes).expect("parse workbook");
    assert_eq!(raw.value(0, "amount"), &CellValue::Float(25.5));

    let partition = validate_and_transform(&raw);
    assert_eq!(partition.valid_rows.len(), 2);
    assert_eq!(partition.valid_rows[0].record_date, date(2025, 1, 12));
    assert_eq!(partition.valid_rows[1].amount, Decimal::from(1070));
    assert_eq!(partition.errors.len(), 1);
    assert_eq!(partition.errors[0].row_number, 4);
    assert_eq!(partition.errors[0].error_message, "amount is invalid: <blank>");
}

#[test]
fn blank_spacer_rows_in_workbooks_are_skipped() {
    let bytes = xlsx_bytes(
        &["business_key", "name", "amount", "record_date"],
        &[
            vec![
                Cell::Text("A-001"),
                Cell::Text("Alice"),
                Cell::Number(10.0),
                Cell::Text("2025-01-12"),
            ],
            vec![Cell::Blank, Cell::Blank, Cell::Blank, Cell::Blank],
            vec![
                Cell::Text("B-002"),
                Cell::Blank,
                Cell::Number(20.0),
                Cell::Text("2025-01-13"),
            ],
            vec![
                Cell::Text("C-003"),
                Cell::Text("Carol"),
                Cell::Number(30.0),
                Cell::Text("2025-01-14"),
            ],
        ],
    );
    let raw = parse_table(&bytes).expect("parse workbook");
    assert_eq!(raw.len(), 3);
    assert_eq!(raw.line_numbers(), &[2, 4, 5]);

    let partition = validate_and_transform(&raw);
    assert_eq!(partition.valid_rows.len(), 2);
    assert_eq!(partition.valid_rows[1].row_number, 5);
    assert_eq!(partition.errors.len(), 1);
    assert_eq!(partition.errors[0].row_number, 4);
    assert_eq!(partition.errors[0].error_message, "name is required");
}
