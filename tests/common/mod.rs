#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use rust_xlsxwriter::Workbook;
use sales_import::{data::CellValue, sheet::RawTable};
use tempfile::{TempDir, tempdir};

/// A cell written into a generated workbook.
#[derive(Debug, Clone)]
pub enum Cell {
    Text(&'static str),
    Number(f64),
    Blank,
}

/// Builds xlsx bytes with one sheet: `headers` on the first row, then `rows`.
pub fn xlsx_bytes(headers: &[&str], rows: &[Vec<Cell>]) -> Vec<u8> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    for (col, header) in headers.iter().enumerate() {
        if !header.is_empty() {
            sheet
                .write_string(0, col as u16, *header)
                .expect("write header");
        }
    }
    for (row_idx, row) in rows.iter().enumerate() {
        let row_num = (row_idx + 1) as u32;
        for (col, cell) in row.iter().enumerate() {
            match cell {
                Cell::Text(text) => {
                    sheet
                        .write_string(row_num, col as u16, *text)
                        .expect("write text cell");
                }
                Cell::Number(number) => {
                    sheet
                        .write_number(row_num, col as u16, *number)
                        .expect("write number cell");
                }
                Cell::Blank => {}
            }
        }
    }
    workbook.save_to_buffer().expect("serialize workbook")
}

/// Builds a raw table from string cells; `""` becomes an empty cell.
pub fn text_table(headers: &[&str], rows: &[&[&str]]) -> RawTable {
    let rows = rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|value| {
                    if value.is_empty() {
                        CellValue::Empty
                    } else {
                        CellValue::from(*value)
                    }
                })
                .collect()
        })
        .collect();
    RawTable::new(headers, rows)
}

/// Headers of a finance-screening export as it comes out of the screening
/// workbook: Thai labels, with a few columns left untitled.
pub fn finance_screening_headers() -> Vec<&'static str> {
    vec![
        "group_id",
        "เลขที่ใบกำกับภาษี",
        "ชื่อผู้ซื้อ",
        "วันที่ใบกำกับภาษี",
        "เลขตัวถัง",
        "รายการ",
        "มูลค่าสินค้า",
        "มูลค่ารวม",
        "เลขประจำตัวผู้เสียภาษี",
        "สาขาที่",
    ]
}

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn store_dir(&self) -> PathBuf {
        self.temp_dir.path().join("store")
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents).expect("write temp file contents");
        path
    }
}
