use itertools::Itertools;
use thiserror::Error;

use crate::fields::CanonicalField;

/// The upload could not be read as a table at all.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unreadable workbook: {0}")]
    Workbook(#[from] calamine::Error),
    #[error("workbook contains no sheets")]
    NoSheets,
    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("input is not valid {0} text")]
    Decode(&'static str),
}

/// Required canonical columns are absent even after remapping.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Missing required columns: {}", .missing.iter().join(", "))]
pub struct SchemaError {
    pub missing: Vec<CanonicalField>,
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("File extension {0} is not allowed.")]
    ExtensionNotAllowed(String),
    #[error("File is too large. Max size is {0} MB.")]
    TooLarge(u64),
    #[error("Invalid Excel file: {0}")]
    Parse(#[from] ParseError),
    #[error("Job {0} not found.")]
    JobNotFound(u64),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}
