//! Column resolution and format detection.
//!
//! A table that already carries every required canonical header is used as
//! is. Otherwise, when the headers carry the finance-screening signature
//! (`group_id` or a Thai date header), every canonical column is rebuilt by
//! coalescing the field's aliases from [`FIELDS`] and, after those, the
//! field's fixed raw position. Anything else passes through untouched and is
//! left for the required-column check to reject.
//!
//! Positional fallback applies to any finance-screening table, whether or not
//! the named alias header exists, and is consulted per row only after every
//! named alias came up empty.

use std::fmt;

use log::debug;

use crate::{
    data::{CellValue, clean_string},
    fields::{CanonicalField, FIELDS, FieldSpec, REQUIRED_FIELDS},
    sheet::RawTable,
};

/// Raw headers that identify a finance-screening export.
pub const FINANCE_SCREENING_MARKERS: &[&str] = &["group_id", "วันที่", "วันที่ใบกำกับภาษี"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Canonical,
    FinanceScreening,
    Unrecognized,
}

impl fmt::Display for TableFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TableFormat::Canonical => "canonical",
            TableFormat::FinanceScreening => "finance screening",
            TableFormat::Unrecognized => "unrecognized",
        };
        f.write_str(label)
    }
}

/// Where a coalesced value may come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Candidate<'a> {
    Header(&'a str),
    Position(usize),
}

/// Turns a cell into a coalescing candidate, `None` meaning "keep looking".
pub type Normalizer = fn(&CellValue) -> Option<CellValue>;

/// Cleaned, non-empty text.
pub fn clean_normalizer(value: &CellValue) -> Option<CellValue> {
    let cleaned = clean_string(value);
    (!cleaned.is_empty()).then_some(CellValue::String(cleaned))
}

/// The native cell, unless it is blank.
pub fn raw_normalizer(value: &CellValue) -> Option<CellValue> {
    (!value.is_blank()).then(|| value.clone())
}

/// For each row, the first candidate present in the table whose normalized
/// value is not `None`; rows without one get [`CellValue::Empty`].
pub fn coalesce(
    table: &RawTable,
    candidates: &[Candidate<'_>],
    normalize: Normalizer,
) -> Vec<CellValue> {
    let columns = candidates
        .iter()
        .filter_map(|candidate| match candidate {
            Candidate::Header(header) => table.column_index(header),
            Candidate::Position(position) => {
                (*position < table.headers().len()).then_some(*position)
            }
        })
        .collect::<Vec<_>>();
    (0..table.len())
        .map(|row| {
            columns
                .iter()
                .find_map(|column| normalize(table.cell(row, *column)))
                .unwrap_or_default()
        })
        .collect()
}

/// Coalesces text columns; the result holds cleaned strings or empties.
pub fn coalesce_clean(table: &RawTable, aliases: &[&str]) -> Vec<CellValue> {
    coalesce(table, &header_candidates(aliases), clean_normalizer)
}

/// Coalesces while keeping the native cell values.
pub fn coalesce_raw(table: &RawTable, aliases: &[&str]) -> Vec<CellValue> {
    coalesce(table, &header_candidates(aliases), raw_normalizer)
}

fn header_candidates<'a>(aliases: &[&'a str]) -> Vec<Candidate<'a>> {
    aliases.iter().map(|alias| Candidate::Header(*alias)).collect()
}

fn field_candidates(spec: &FieldSpec) -> Vec<Candidate<'static>> {
    spec.aliases
        .iter()
        .map(|alias| Candidate::Header(*alias))
        .chain(spec.position.map(Candidate::Position))
        .collect()
}

pub fn detect_format(table: &RawTable) -> TableFormat {
    if REQUIRED_FIELDS
        .iter()
        .all(|field| table.has_column(field.as_str()))
    {
        TableFormat::Canonical
    } else if FINANCE_SCREENING_MARKERS
        .iter()
        .any(|marker| table.has_column(marker))
    {
        TableFormat::FinanceScreening
    } else {
        TableFormat::Unrecognized
    }
}

/// Builds the canonical table for a finance-screening export: one column per
/// canonical field, in catalogue order.
pub fn remap_finance_screening(table: &RawTable) -> RawTable {
    let columns = FIELDS
        .iter()
        .map(|spec| {
            let normalize: Normalizer = if spec.kind.is_text() {
                clean_normalizer
            } else {
                raw_normalizer
            };
            coalesce(table, &field_candidates(spec), normalize)
        })
        .collect::<Vec<_>>();

    let rows = (0..table.len())
        .map(|row| {
            columns
                .iter()
                .map(|column| column[row].clone())
                .collect::<Vec<_>>()
        })
        .collect();
    let headers = CanonicalField::all()
        .map(|field| field.as_str().to_string())
        .collect();
    RawTable::from_normalized(headers, rows, table.line_numbers().to_vec())
}

/// Detects the layout and returns the table the validator should see.
pub fn map_to_canonical(table: &RawTable) -> (TableFormat, RawTable) {
    let format = detect_format(table);
    debug!(
        "Detected {format} layout across {} column(s)",
        table.headers().len()
    );
    let mapped = match format {
        TableFormat::FinanceScreening => remap_finance_screening(table),
        TableFormat::Canonical | TableFormat::Unrecognized => table.clone(),
    };
    (format, mapped)
}
