//! Persistence for import jobs, row errors and sales records.
//!
//! [`RecordStore`] is the seam the importer talks to. [`JsonStore`] keeps the
//! whole state in one JSON document inside a directory; every change reloads
//! and rewrites it under an exclusive lock file; [`MemoryStore`] keeps it in memory for tests and dry runs.
//! Records are upserted by `business_key`.

use std::{
    collections::BTreeMap,
    fmt,
    fs::{self, File, OpenOptions},
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use fs4::fs_std::FileExt;
use log::debug;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    fields::CanonicalField,
    validate::{CanonicalRow, ValidationErrorItem},
};

const STORE_FILE: &str = "store.json";
const LOCK_FILE: &str = "store.lock";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Success,
    CompletedWithErrors,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Running => "running",
            JobStatus::Success => "success",
            JobStatus::CompletedWithErrors => "completed_with_errors",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportJob {
    pub id: u64,
    pub correlation_id: String,
    pub filename: String,
    pub status: JobStatus,
    pub total_rows: usize,
    pub imported_rows: usize,
    pub failed_rows: usize,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ImportJob {
    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.message = Some(message.into());
        self.updated_at = Utc::now();
    }

    pub fn finish(
        &mut self,
        total_rows: usize,
        imported_rows: usize,
        failed_rows: usize,
        message: impl Into<String>,
    ) {
        self.total_rows = total_rows;
        self.imported_rows = imported_rows;
        self.failed_rows = failed_rows;
        self.status = if failed_rows == 0 {
            JobStatus::Success
        } else {
            JobStatus::CompletedWithErrors
        };
        self.message = Some(message.into());
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredError {
    pub id: u64,
    pub job_id: u64,
    pub row_number: usize,
    pub column_name: Option<String>,
    pub error_message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesRecord {
    pub id: u64,
    pub business_key: String,
    pub name: String,
    pub amount: Decimal,
    pub record_date: NaiveDate,
    pub invoice_date: Option<NaiveDate>,
    pub invoice_no: Option<String>,
    pub item_description: Option<String>,
    pub product_value: Option<Decimal>,
    pub tax_value: Option<Decimal>,
    pub total_value: Option<Decimal>,
    pub vin_no: Option<String>,
    pub cancel_flag: Option<String>,
    pub cancel_product_value: Option<Decimal>,
    pub cancel_tax_value: Option<Decimal>,
    pub cancel_total_value: Option<Decimal>,
    pub org_type_hq: Option<String>,
    pub org_type_branch_no: Option<i64>,
    pub taxpayer_id: Option<String>,
    pub sale_price: Option<Decimal>,
    pub com_fn: Option<Decimal>,
    pub com_value: Option<Decimal>,
    pub rule_applied: Option<String>,
    pub is_duplicate_tank: Option<bool>,
    pub group_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SalesRecord {
    fn from_row(id: u64, row: &CanonicalRow, now: DateTime<Utc>) -> Self {
        let text = |field| row.text(field).map(str::to_string);
        Self {
            id,
            business_key: row.business_key.clone(),
            name: row.name.clone(),
            amount: row.amount,
            record_date: row.record_date,
            invoice_date: row.date(CanonicalField::InvoiceDate),
            invoice_no: text(CanonicalField::InvoiceNo),
            item_description: text(CanonicalField::ItemDescription),
            product_value: row.decimal(CanonicalField::ProductValue),
            tax_value: row.decimal(CanonicalField::TaxValue),
            total_value: row.decimal(CanonicalField::TotalValue),
            vin_no: text(CanonicalField::VinNo),
            cancel_flag: text(CanonicalField::CancelFlag),
            cancel_product_value: row.decimal(CanonicalField::CancelProductValue),
            cancel_tax_value: row.decimal(CanonicalField::CancelTaxValue),
            cancel_total_value: row.decimal(CanonicalField::CancelTotalValue),
            org_type_hq: text(CanonicalField::OrgTypeHq),
            org_type_branch_no: row.integer(CanonicalField::OrgTypeBranchNo),
            taxpayer_id: text(CanonicalField::TaxpayerId),
            sale_price: row.decimal(CanonicalField::SalePrice),
            com_fn: row.decimal(CanonicalField::ComFn),
            com_value: row.decimal(CanonicalField::ComValue),
            rule_applied: text(CanonicalField::RuleApplied),
            is_duplicate_tank: row.flag(CanonicalField::IsDuplicateTank),
            group_id: text(CanonicalField::GroupId),
            created_at: now,
            updated_at: now,
        }
    }
}

pub trait RecordStore {
    /// Creates a job in the `running` state.
    fn create_job(&mut self, filename: &str, correlation_id: &str) -> Result<ImportJob>;
    /// Replaces the stored copy of an existing job.
    fn update_job(&mut self, job: &ImportJob) -> Result<()>;
    fn save_errors(&mut self, job_id: u64, errors: &[ValidationErrorItem]) -> Result<()>;
    /// Inserts or replaces records by `business_key`; returns rows written.
    fn upsert_records(&mut self, rows: &[CanonicalRow]) -> Result<usize>;
    fn job(&self, id: u64) -> Result<Option<ImportJob>>;
    fn job_errors(&self, job_id: u64) -> Result<Vec<StoredError>>;
    fn record(&self, business_key: &str) -> Result<Option<SalesRecord>>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreState {
    next_job_id: u64,
    next_error_id: u64,
    next_record_id: u64,
    jobs: BTreeMap<u64, ImportJob>,
    errors: Vec<StoredError>,
    records: BTreeMap<String, SalesRecord>,
}

impl StoreState {
    fn create_job(&mut self, filename: &str, correlation_id: &str) -> ImportJob {
        self.next_job_id += 1;
        let now = Utc::now();
        let job = ImportJob {
            id: self.next_job_id,
            correlation_id: correlation_id.to_string(),
            filename: filename.to_string(),
            status: JobStatus::Running,
            total_rows: 0,
            imported_rows: 0,
            failed_rows: 0,
            message: None,
            created_at: now,
            updated_at: now,
        };
        self.jobs.insert(job.id, job.clone());
        job
    }

    fn update_job(&mut self, job: &ImportJob) -> Result<()> {
        let stored = self
            .jobs
            .get_mut(&job.id)
            .with_context(|| format!("Job {} not found.", job.id))?;
        *stored = job.clone();
        Ok(())
    }

    fn save_errors(&mut self, job_id: u64, errors: &[ValidationErrorItem]) {
        let now = Utc::now();
        for error in errors {
            self.next_error_id += 1;
            self.errors.push(StoredError {
                id: self.next_error_id,
                job_id,
                row_number: error.row_number,
                column_name: error.column_name.clone(),
                error_message: error.error_message.clone(),
                created_at: now,
            });
        }
    }

    fn upsert_records(&mut self, rows: &[CanonicalRow]) -> usize {
        let now = Utc::now();
        for row in rows {
            match self.records.get_mut(&row.business_key) {
                Some(existing) => {
                    let mut updated = SalesRecord::from_row(existing.id, row, now);
                    updated.created_at = existing.created_at;
                    *existing = updated;
                }
                None => {
                    self.next_record_id += 1;
                    let record = SalesRecord::from_row(self.next_record_id, row, now);
                    self.records.insert(row.business_key.clone(), record);
                }
            }
        }
        rows.len()
    }

    fn job_errors(&self, job_id: u64) -> Vec<StoredError> {
        self.errors
            .iter()
            .filter(|error| error.job_id == job_id)
            .cloned()
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: StoreState,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_count(&self) -> usize {
        self.state.records.len()
    }
}

impl RecordStore for MemoryStore {
    fn create_job(&mut self, filename: &str, correlation_id: &str) -> Result<ImportJob> {
        Ok(self.state.create_job(filename, correlation_id))
    }

    fn update_job(&mut self, job: &ImportJob) -> Result<()> {
        self.state.update_job(job)
    }

    fn save_errors(&mut self, job_id: u64, errors: &[ValidationErrorItem]) -> Result<()> {
        self.state.save_errors(job_id, errors);
        Ok(())
    }

    fn upsert_records(&mut self, rows: &[CanonicalRow]) -> Result<usize> {
        Ok(self.state.upsert_records(rows))
    }

    fn job(&self, id: u64) -> Result<Option<ImportJob>> {
        Ok(self.state.jobs.get(&id).cloned())
    }

    fn job_errors(&self, job_id: u64) -> Result<Vec<StoredError>> {
        Ok(self.state.job_errors(job_id))
    }

    fn record(&self, business_key: &str) -> Result<Option<SalesRecord>> {
        Ok(self.state.records.get(business_key).cloned())
    }
}

#[derive(Debug)]
pub struct JsonStore {
    path: PathBuf,
    lock_path: PathBuf,
}

impl JsonStore {
    /// Opens the store under `dir`, creating the directory when needed.
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir).with_context(|| format!("Creating store directory {dir:?}"))?;
        let store = Self {
            path: dir.join(STORE_FILE),
            lock_path: dir.join(LOCK_FILE),
        };
        let (jobs, records) = store.read(|state| (state.jobs.len(), state.records.len()))?;
        debug!(
            "Opened store {:?} with {jobs} job(s) and {records} record(s)",
            store.path
        );
        Ok(store)
    }

    /// Blocks until this process holds the store lock; released on drop.
    fn lock(&self) -> Result<File> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock_path)
            .with_context(|| format!("Opening lock file {:?}", self.lock_path))?;
        file.lock_exclusive()
            .with_context(|| format!("Locking store {:?}", self.path))?;
        Ok(file)
    }

    fn load(&self) -> Result<StoreState> {
        if !self.path.exists() {
            return Ok(StoreState::default());
        }
        let file = File::open(&self.path).with_context(|| format!("Opening store {:?}", self.path))?;
        serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Parsing store {:?}", self.path))
    }

    fn persist(&self, state: &StoreState) -> Result<()> {
        let staging = self.path.with_extension("json.tmp");
        {
            let file = File::create(&staging)
                .with_context(|| format!("Creating store file {staging:?}"))?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, state).context("Writing store JSON")?;
            writer.flush().context("Flushing store file")?;
        }
        fs::rename(&staging, &self.path)
            .with_context(|| format!("Replacing store {:?}", self.path))
    }

    fn read<T>(&self, view: impl FnOnce(&StoreState) -> T) -> Result<T> {
        let _lock = self.lock()?;
        Ok(view(&self.load()?))
    }

    /// Reloads, changes and rewrites the store while holding the lock, so
    /// concurrent imports against one directory never overwrite each other.
    fn update<T>(&mut self, change: impl FnOnce(&mut StoreState) -> Result<T>) -> Result<T> {
        let _lock = self.lock()?;
        let mut state = self.load()?;
        let outcome = change(&mut state)?;
        self.persist(&state)?;
        Ok(outcome)
    }
}

impl RecordStore for JsonStore {
    fn create_job(&mut self, filename: &str, correlation_id: &str) -> Result<ImportJob> {
        self.update(|state| Ok(state.create_job(filename, correlation_id)))
    }

    fn update_job(&mut self, job: &ImportJob) -> Result<()> {
        self.update(|state| state.update_job(job))
    }

    fn save_errors(&mut self, job_id: u64, errors: &[ValidationErrorItem]) -> Result<()> {
        if errors.is_empty() {
            return Ok(());
        }
        self.update(|state| {
            state.save_errors(job_id, errors);
            Ok(())
        })
    }

    fn upsert_records(&mut self, rows: &[CanonicalRow]) -> Result<usize> {
        self.update(|state| Ok(state.upsert_records(rows)))
    }

    fn job(&self, id: u64) -> Result<Option<ImportJob>> {
        self.read(|state| state.jobs.get(&id).cloned())
    }

    fn job_errors(&self, job_id: u64) -> Result<Vec<StoredError>> {
        self.read(|state| state.job_errors(job_id))
    }

    fn record(&self, business_key: &str) -> Result<Option<SalesRecord>> {
        self.read(|state| state.records.get(business_key).cloned())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::fields::FieldValue;

    fn row(key: &str, name: &str, amount: i64) -> CanonicalRow {
        CanonicalRow {
            row_number: 2,
            business_key: key.to_string(),
            name: name.to_string(),
            amount: Decimal::from(amount),
            record_date: NaiveDate::from_ymd_opt(2025, 1, 12).unwrap(),
            optional: BTreeMap::from([(
                CanonicalField::InvoiceNo,
                FieldValue::Text("INV-1".to_string()),
            )]),
        }
    }

    #[test]
    fn upsert_replaces_existing_records_by_business_key() {
        let mut store = MemoryStore::new();
        store.upsert_records(&[row("A-001", "Alice", 10)]).unwrap();
        let first = store.record("A-001").unwrap().unwrap();

        let written = store
            .upsert_records(&[row("A-001", "Alicia", 20), row("B-002", "Bob", 5)])
            .unwrap();
        assert_eq!(written, 2);
        assert_eq!(store.record_count(), 2);

        let updated = store.record("A-001").unwrap().unwrap();
        assert_eq!(updated.id, first.id);
        assert_eq!(updated.created_at, first.created_at);
        assert_eq!(updated.name, "Alicia");
        assert_eq!(updated.amount, Decimal::from(20));
        assert_eq!(updated.invoice_no.as_deref(), Some("INV-1"));
    }

    #[test]
    fn update_job_requires_existing_job() {
        let mut store = MemoryStore::new();
        let mut job = store.create_job("sales.xlsx", "corr-1").unwrap();
        job.fail("boom");
        store.update_job(&job).unwrap();
        assert_eq!(store.job(job.id).unwrap().unwrap().status, JobStatus::Failed);

        job.id = 99;
        assert!(store.update_job(&job).is_err());
    }

    #[test]
    fn json_store_survives_reopen() {
        let dir = tempfile::tempdir().expect("temp dir");
        let job_id = {
            let mut store = JsonStore::open(dir.path()).unwrap();
            let mut job = store.create_job("sales.xlsx", "corr-2").unwrap();
            store
                .save_errors(
                    job.id,
                    &[ValidationErrorItem {
                        row_number: 3,
                        column_name: Some("name".to_string()),
                        error_message: "name is required".to_string(),
                    }],
                )
                .unwrap();
            store.upsert_records(&[row("A-001", "Alice", 10)]).unwrap();
            job.finish(2, 1, 1, "Import finished");
            store.update_job(&job).unwrap();
            job.id
        };

        let reopened = JsonStore::open(dir.path()).unwrap();
        let job = reopened.job(job_id).unwrap().unwrap();
        assert_eq!(job.status, JobStatus::CompletedWithErrors);
        assert_eq!(reopened.job_errors(job_id).unwrap().len(), 1);
        assert_eq!(
            reopened.record("A-001").unwrap().unwrap().amount,
            Decimal::from(10)
        );
    }

    #[test]
    fn json_stores_sharing_a_directory_do_not_lose_writes() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut first = JsonStore::open(dir.path()).unwrap();
        let mut second = JsonStore::open(dir.path()).unwrap();

        let a = first.create_job("a.xlsx", "corr-a").unwrap();
        let b = second.create_job("b.xlsx", "corr-b").unwrap();
        assert_ne!(a.id, b.id);
        first.upsert_records(&[row("A-001", "Alice", 10)]).unwrap();
        second.upsert_records(&[row("B-002", "Bob", 5)]).unwrap();

        let reopened = JsonStore::open(dir.path()).unwrap();
        assert_eq!(reopened.job(a.id).unwrap().unwrap().filename, "a.xlsx");
        assert_eq!(reopened.job(b.id).unwrap().unwrap().filename, "b.xlsx");
        assert!(reopened.record("A-001").unwrap().is_some());
        assert!(reopened.record("B-002").unwrap().is_some());
        assert_eq!(first.job(b.id).unwrap().unwrap().correlation_id, "corr-b");
    }

    #[test]
    fn json_stores_in_parallel_threads_hand_out_distinct_ids() {
        let dir = tempfile::tempdir().expect("temp dir");
        let handles = (0..4)
            .map(|worker| {
                let path = dir.path().to_path_buf();
                std::thread::spawn(move || {
                    let mut store = JsonStore::open(&path).unwrap();
                    (0..5)
                        .map(|n| {
                            store
                                .create_job(&format!("w{worker}-{n}.xlsx"), "corr")
                                .unwrap()
                                .id
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect::<Vec<_>>();
        let mut ids = handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect::<Vec<_>>();
        ids.sort_unstable();
        assert_eq!(ids, (1..=20).collect::<Vec<u64>>());
    }
}
