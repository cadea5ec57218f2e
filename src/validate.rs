//! Required-column gate and the row validator/transformer.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use log::debug;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::{
    data::{CellValue, clean_string, parse_date, parse_decimal},
    error::SchemaError,
    fields::{CanonicalField, FIELDS, FieldValue, REQUIRED_FIELDS},
    sheet::RawTable,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationErrorItem {
    pub row_number: usize,
    pub column_name: Option<String>,
    pub error_message: String,
}

impl ValidationErrorItem {
    fn field(row_number: usize, field: CanonicalField, message: String) -> Self {
        Self {
            row_number,
            column_name: Some(field.as_str().to_string()),
            error_message: message,
        }
    }
}

/// A fully validated row. Required fields are always present; optional
/// fields that were blank or failed coercion are simply absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanonicalRow {
    pub row_number: usize,
    pub business_key: String,
    pub name: String,
    pub amount: Decimal,
    pub record_date: NaiveDate,
    pub optional: BTreeMap<CanonicalField, FieldValue>,
}

impl CanonicalRow {
    pub fn get(&self, field: CanonicalField) -> Option<FieldValue> {
        match field {
            CanonicalField::BusinessKey => Some(FieldValue::Text(self.business_key.clone())),
            CanonicalField::Name => Some(FieldValue::Text(self.name.clone())),
            CanonicalField::Amount => Some(FieldValue::Decimal(self.amount)),
            CanonicalField::RecordDate => Some(FieldValue::Date(self.record_date)),
            other => self.optional.get(&other).cloned(),
        }
    }

    pub fn text(&self, field: CanonicalField) -> Option<&str> {
        self.optional.get(&field).and_then(FieldValue::as_text)
    }

    pub fn decimal(&self, field: CanonicalField) -> Option<Decimal> {
        self.optional.get(&field).and_then(FieldValue::as_decimal)
    }

    pub fn date(&self, field: CanonicalField) -> Option<NaiveDate> {
        self.optional.get(&field).and_then(FieldValue::as_date)
    }

    pub fn integer(&self, field: CanonicalField) -> Option<i64> {
        self.optional.get(&field).and_then(FieldValue::as_integer)
    }

    pub fn flag(&self, field: CanonicalField) -> Option<bool> {
        self.optional.get(&field).and_then(FieldValue::as_bool)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportPartition {
    pub valid_rows: Vec<CanonicalRow>,
    pub errors: Vec<ValidationErrorItem>,
}

impl ImportPartition {
    /// Number of distinct rows that produced at least one error.
    pub fn failed_row_count(&self) -> usize {
        self.errors
            .iter()
            .map(|error| error.row_number)
            .collect::<BTreeSet<_>>()
            .len()
    }
}

/// Required fields absent from the table headers, in declaration order.
pub fn find_missing_required_columns(table: &RawTable) -> Vec<CanonicalField> {
    REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|field| !table.has_column(field.as_str()))
        .collect()
}

pub fn check_required_columns(table: &RawTable) -> Result<(), SchemaError> {
    let missing = find_missing_required_columns(table);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(SchemaError { missing })
    }
}

/// Splits rows into fully transformed rows and per-row errors.
///
/// A row with any required-field error is excluded entirely and its optional
/// fields are never evaluated. Rows are numbered by their source line.
pub fn validate_and_transform(table: &RawTable) -> ImportPartition {
    let mut partition = ImportPartition::default();
    for row in 0..table.len() {
        let row_number = table.line_number(row);
        let errors_before = partition.errors.len();
        let cell = |field: CanonicalField| table.value(row, field.as_str());

        let business_key = clean_string(cell(CanonicalField::BusinessKey));
        if business_key.is_empty() {
            partition.errors.push(required_error(row_number, CanonicalField::BusinessKey));
        }
        let name = clean_string(cell(CanonicalField::Name));
        if name.is_empty() {
            partition.errors.push(required_error(row_number, CanonicalField::Name));
        }

        let raw_amount = cell(CanonicalField::Amount);
        let amount = parse_decimal(raw_amount).ok().flatten();
        if amount.is_none() {
            partition
                .errors
                .push(invalid_error(row_number, CanonicalField::Amount, raw_amount));
        }

        let raw_date = cell(CanonicalField::RecordDate);
        let record_date = parse_date(raw_date).ok().flatten();
        if record_date.is_none() {
            partition
                .errors
                .push(invalid_error(row_number, CanonicalField::RecordDate, raw_date));
        }

        let (Some(amount), Some(record_date)) = (amount, record_date) else {
            continue;
        };
        if partition.errors.len() > errors_before {
            continue;
        }

        let optional = FIELDS
            .iter()
            .filter(|spec| !spec.required)
            .filter_map(|spec| {
                spec.kind
                    .coerce_optional(cell(spec.field))
                    .map(|value| (spec.field, value))
            })
            .collect();
        partition.valid_rows.push(CanonicalRow {
            row_number,
            business_key,
            name,
            amount,
            record_date,
            optional,
        });
    }
    debug!(
        "Validated {} row(s): {} valid, {} error(s)",
        table.len(),
        partition.valid_rows.len(),
        partition.errors.len()
    );
    partition
}

fn required_error(row_number: usize, field: CanonicalField) -> ValidationErrorItem {
    ValidationErrorItem::field(row_number, field, format!("{field} is required"))
}

fn invalid_error(row_number: usize, field: CanonicalField, raw: &CellValue) -> ValidationErrorItem {
    ValidationErrorItem::field(
        row_number,
        field,
        format!("{field} is invalid: {}", raw.describe()),
    )
}
