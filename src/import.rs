//! One upload, end to end: upload gate, parse, detect/map, required-column
//! gate, validate, persist, finalize.

use std::path::Path;

use anyhow::Result;
use log::{info, warn};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    config::Settings,
    error::ImportError,
    mapping::{TableFormat, map_to_canonical},
    sheet::{CsvOptions, parse_upload},
    store::{ImportJob, JobStatus, RecordStore},
    validate::{ValidationErrorItem, check_required_columns, validate_and_transform},
};

const DEFAULT_FILENAME: &str = "unknown.xlsx";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportResult {
    pub job_id: u64,
    pub status: JobStatus,
    pub filename: String,
    pub total_rows: usize,
    pub imported_rows: usize,
    pub failed_rows: usize,
    pub message: Option<String>,
    /// Layout detected for the upload; absent when the job failed before
    /// the table was read.
    pub format: Option<String>,
    pub errors: Vec<ValidationErrorItem>,
}

impl ImportResult {
    fn from_job(
        job: &ImportJob,
        format: Option<TableFormat>,
        errors: Vec<ValidationErrorItem>,
    ) -> Self {
        Self {
            job_id: job.id,
            status: job.status,
            filename: job.filename.clone(),
            total_rows: job.total_rows,
            imported_rows: job.imported_rows,
            failed_rows: job.failed_rows,
            message: job.message.clone(),
            format: format.map(|format| format.to_string()),
            errors,
        }
    }
}

pub struct Importer<'a, S: RecordStore> {
    store: &'a mut S,
    settings: &'a Settings,
    csv_options: CsvOptions,
}

impl<'a, S: RecordStore> Importer<'a, S> {
    pub fn new(store: &'a mut S, settings: &'a Settings) -> Result<Self> {
        let csv_options = settings.csv_options()?;
        Ok(Self {
            store,
            settings,
            csv_options,
        })
    }

    pub fn with_csv_options(mut self, csv_options: CsvOptions) -> Self {
        self.csv_options = csv_options;
        self
    }

    /// Rejects uploads with a disallowed extension or over the size limit.
    pub fn check_upload(&self, filename: &str, size: usize) -> Result<(), ImportError> {
        let extension = Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| format!(".{}", ext.to_ascii_lowercase()));
        match extension {
            Some(ext) if self.settings.is_extension_allowed(&ext) => {}
            Some(ext) => return Err(ImportError::ExtensionNotAllowed(ext)),
            None => return Err(ImportError::ExtensionNotAllowed("unknown".to_string())),
        }
        if size as u64 > self.settings.max_upload_bytes() {
            return Err(ImportError::TooLarge(self.settings.max_upload_size_mb));
        }
        Ok(())
    }

    /// Runs one upload. Parse failures are returned as errors after the job
    /// is marked failed; a failed required-column gate is reported through
    /// the returned result.
    pub fn import(
        &mut self,
        filename: &str,
        bytes: &[u8],
        correlation_id: Option<&str>,
    ) -> Result<ImportResult, ImportError> {
        self.check_upload(filename, bytes.len())?;

        let correlation_id = correlation_id
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let filename = if filename.trim().is_empty() {
            DEFAULT_FILENAME
        } else {
            filename
        };
        let mut job = self.store.create_job(filename, &correlation_id)?;
        info!(
            "[{correlation_id}] Import job {} started for '{filename}' ({} byte(s))",
            job.id,
            bytes.len()
        );

        let raw = match parse_upload(filename, bytes, &self.csv_options) {
            Ok(table) => table,
            Err(err) => {
                warn!("[{correlation_id}] Job {} could not parse upload: {err}", job.id);
                job.fail(format!("Failed to parse excel file: {err}"));
                self.store.update_job(&job)?;
                return Err(ImportError::Parse(err));
            }
        };

        let (format, table) = map_to_canonical(&raw);
        if let Err(schema_error) = check_required_columns(&table) {
            warn!("[{correlation_id}] Job {} rejected: {schema_error}", job.id);
            job.fail(schema_error.to_string());
            self.store.update_job(&job)?;
            return Ok(ImportResult::from_job(&job, Some(format), Vec::new()));
        }

        let partition = validate_and_transform(&table);
        self.store.save_errors(job.id, &partition.errors)?;
        let imported_rows = if partition.valid_rows.is_empty() {
            0
        } else {
            self.store.upsert_records(&partition.valid_rows)?
        };
        job.finish(
            table.len(),
            imported_rows,
            partition.failed_row_count(),
            "Import finished",
        );
        self.store.update_job(&job)?;
        info!(
            "[{correlation_id}] Job {} {}: {} row(s), {} imported, {} failed ({format} layout)",
            job.id, job.status, job.total_rows, job.imported_rows, job.failed_rows
        );
        Ok(ImportResult::from_job(&job, Some(format), partition.errors))
    }

    pub fn job(&self, id: u64) -> Result<ImportJob, ImportError> {
        self.store.job(id)?.ok_or(ImportError::JobNotFound(id))
    }

    pub fn job_errors(&self, id: u64) -> Result<Vec<ValidationErrorItem>, ImportError> {
        self.job(id)?;
        Ok(self
            .store
            .job_errors(id)?
            .into_iter()
            .map(|error| ValidationErrorItem {
                row_number: error.row_number,
                column_name: error.column_name,
                error_message: error.error_message,
            })
            .collect())
    }
}
