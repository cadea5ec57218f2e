//! Spreadsheet ingestion into a [`RawTable`].
//!
//! The first row of the first worksheet is the header. Headers are trimmed
//! and lowercased; blank ones become `unnamed: <index>` and repeats get a
//! `.1`, `.2`, ... suffix so every raw column stays addressable by position.
//! Rows whose cells are all blank are dropped by the readers; every kept row
//! remembers the line it came from.

use std::{collections::HashSet, io::Cursor, path::Path};

use calamine::{Data, Range, Reader, open_workbook_auto_from_rs};
use encoding_rs::Encoding;
use log::debug;

use crate::{
    data::{CellValue, excel_serial_to_datetime, parse_naive_date, parse_naive_datetime},
    error::ParseError,
};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

/// Line of the first data row when the header sits on line 1.
pub const ROW_NUMBER_OFFSET: usize = 2;

static EMPTY_CELL: CellValue = CellValue::Empty;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawTable {
    headers: Vec<String>,
    rows: Vec<Vec<CellValue>>,
    line_numbers: Vec<usize>,
}

impl RawTable {
    /// Builds a table, normalizing headers and padding ragged rows. Rows are
    /// numbered from line 2 in order.
    pub fn new<S: AsRef<str>>(headers: &[S], rows: Vec<Vec<CellValue>>) -> Self {
        let numbered = rows
            .into_iter()
            .enumerate()
            .map(|(idx, row)| (idx + ROW_NUMBER_OFFSET, row))
            .collect();
        Self::with_line_numbers(headers, numbered)
    }

    /// Like [`RawTable::new`], with each row paired with its source line.
    pub fn with_line_numbers<S: AsRef<str>>(
        headers: &[S],
        rows: Vec<(usize, Vec<CellValue>)>,
    ) -> Self {
        let width = rows
            .iter()
            .map(|(_, row)| row.len())
            .max()
            .unwrap_or(0)
            .max(headers.len());
        let mut seen = HashSet::with_capacity(width);
        let headers = (0..width)
            .map(|idx| {
                let raw = headers.get(idx).map(|h| h.as_ref()).unwrap_or("");
                unique_header(normalize_header(raw, idx), &mut seen)
            })
            .collect::<Vec<_>>();
        let (line_numbers, rows) = rows
            .into_iter()
            .map(|(line, mut row)| {
                row.resize(width, CellValue::Empty);
                (line, row)
            })
            .unzip();
        Self {
            headers,
            rows,
            line_numbers,
        }
    }

    /// Builds a table whose headers are already normalized and unique.
    pub(crate) fn from_normalized(
        headers: Vec<String>,
        rows: Vec<Vec<CellValue>>,
        line_numbers: Vec<usize>,
    ) -> Self {
        Self {
            headers,
            rows,
            line_numbers,
        }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn line_numbers(&self) -> &[usize] {
        &self.line_numbers
    }

    /// Source line of a zero-based data row.
    pub fn line_number(&self, row: usize) -> usize {
        self.line_numbers
            .get(row)
            .copied()
            .unwrap_or(row + ROW_NUMBER_OFFSET)
    }

    pub fn column_index(&self, header: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == header)
    }

    pub fn has_column(&self, header: &str) -> bool {
        self.column_index(header).is_some()
    }

    /// Cell at a zero-based row and column; out-of-range reads are empty.
    pub fn cell(&self, row: usize, column: usize) -> &CellValue {
        self.rows
            .get(row)
            .and_then(|cells| cells.get(column))
            .unwrap_or(&EMPTY_CELL)
    }

    pub fn value(&self, row: usize, header: &str) -> &CellValue {
        match self.column_index(header) {
            Some(column) => self.cell(row, column),
            None => &EMPTY_CELL,
        }
    }
}

pub fn normalize_header(raw: &str, index: usize) -> String {
    let normalized = raw.trim().to_lowercase();
    if normalized.is_empty() {
        format!("unnamed: {index}")
    } else {
        normalized
    }
}

fn unique_header(candidate: String, seen: &mut HashSet<String>) -> String {
    if seen.insert(candidate.clone()) {
        return candidate;
    }
    let mut suffix = 1usize;
    loop {
        let renamed = format!("{candidate}.{suffix}");
        if seen.insert(renamed.clone()) {
            return renamed;
        }
        suffix += 1;
    }
}

/// Options for delimited-text uploads.
#[derive(Debug, Clone, Copy)]
pub struct CsvOptions {
    pub delimiter: Option<u8>,
    pub encoding: &'static Encoding,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: None,
            encoding: encoding_rs::UTF_8,
        }
    }
}

/// Parses an upload, choosing the reader from the file extension.
pub fn parse_upload(
    file_name: &str,
    bytes: &[u8],
    options: &CsvOptions,
) -> Result<RawTable, ParseError> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("csv") => parse_csv_table(
            bytes,
            options.delimiter.unwrap_or(DEFAULT_CSV_DELIMITER),
            options.encoding,
        ),
        Some("tsv") => parse_csv_table(
            bytes,
            options.delimiter.unwrap_or(DEFAULT_TSV_DELIMITER),
            options.encoding,
        ),
        _ => parse_table(bytes),
    }
}

/// Parses the first worksheet of an xlsx/xlsm/xls/ods workbook.
pub fn parse_table(bytes: &[u8]) -> Result<RawTable, ParseError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or(ParseError::NoSheets)?;
    let range = workbook.worksheet_range(&sheet_name)?;
    let table = table_from_range(&range);
    debug!(
        "Read {} row(s) x {} column(s) from sheet '{}'",
        table.len(),
        table.headers().len(),
        sheet_name
    );
    Ok(table)
}

fn table_from_range(range: &Range<Data>) -> RawTable {
    // Ranges start at the first used cell; pad so positions match the sheet.
    let (first_row, leading) = range
        .start()
        .map(|(row, col)| (row as usize, col as usize))
        .unwrap_or((0, 0));
    let mut rows = range.rows().enumerate().map(|(idx, row)| {
        let mut cells = vec![CellValue::Empty; leading];
        cells.extend(row.iter().map(convert_cell));
        (first_row + idx + 1, cells)
    });
    let headers = match rows.next() {
        Some((_, header_row)) => header_row
            .iter()
            .map(|cell| match cell {
                CellValue::Empty => String::new(),
                other => other.as_display(),
            })
            .collect::<Vec<_>>(),
        None => return RawTable::default(),
    };
    let rows = rows.filter(|(_, cells)| !is_blank_row(cells)).collect();
    RawTable::with_line_numbers(&headers, rows)
}

fn is_blank_row(cells: &[CellValue]) -> bool {
    cells.iter().all(CellValue::is_blank)
}

fn convert_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty | Data::Error(_) => CellValue::Empty,
        Data::String(s) => CellValue::String(s.clone()),
        Data::Int(i) => CellValue::Integer(*i),
        Data::Float(f) => CellValue::Float(*f),
        Data::Bool(b) => CellValue::Boolean(*b),
        Data::DateTime(dt) => {
            let serial = dt.as_f64();
            match excel_serial_to_datetime(serial) {
                Some(parsed) if serial.fract() == 0.0 => CellValue::Date(parsed.date()),
                Some(parsed) => CellValue::DateTime(parsed),
                None => CellValue::Float(serial),
            }
        }
        Data::DateTimeIso(s) => {
            if let Ok(parsed) = parse_naive_datetime(s) {
                CellValue::DateTime(parsed)
            } else if let Ok(parsed) = parse_naive_date(s) {
                CellValue::Date(parsed)
            } else {
                CellValue::String(s.clone())
            }
        }
        Data::DurationIso(s) => CellValue::String(s.clone()),
    }
}

/// Parses delimited text whose first record is the header.
pub fn parse_csv_table(
    bytes: &[u8],
    delimiter: u8,
    encoding: &'static Encoding,
) -> Result<RawTable, ParseError> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        return Err(ParseError::Decode(encoding.name()));
    }
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut records = reader.records();
    let headers = match records.next() {
        Some(record) => record?.iter().map(str::to_string).collect::<Vec<_>>(),
        None => return Ok(RawTable::default()),
    };
    let mut rows = Vec::new();
    for (idx, record) in records.enumerate() {
        let record = record?;
        let line = record
            .position()
            .map(|position| position.line() as usize)
            .unwrap_or(idx + ROW_NUMBER_OFFSET);
        let cells = record
            .iter()
            .map(|field| {
                if field.is_empty() {
                    CellValue::Empty
                } else {
                    CellValue::String(field.to_string())
                }
            })
            .collect::<Vec<_>>();
        if !is_blank_row(&cells) {
            rows.push((line, cells));
        }
    }
    debug!(
        "Read {} row(s) x {} column(s) from delimited text",
        rows.len(),
        headers.len()
    );
    Ok(RawTable::with_line_numbers(&headers, rows))
}
