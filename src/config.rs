//! Importer settings.
//!
//! Defaults are overridden by an optional YAML file, then by environment
//! variables, then by command-line flags.

use std::{env, fs::File, io::BufReader, path::Path, path::PathBuf};

use anyhow::{Context, Result, anyhow};
use encoding_rs::{Encoding, UTF_8};
use serde::{Deserialize, Serialize};

use crate::{cli::parse_delimiter, sheet::CsvOptions};

pub const ENV_MAX_UPLOAD_MB: &str = "SALES_IMPORT_MAX_UPLOAD_MB";
pub const ENV_ALLOWED_EXTENSIONS: &str = "SALES_IMPORT_ALLOWED_EXTENSIONS";
pub const ENV_STORE_DIR: &str = "SALES_IMPORT_STORE_DIR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub app_name: String,
    pub max_upload_size_mb: u64,
    pub allowed_extensions: Vec<String>,
    pub store_dir: PathBuf,
    /// Delimiter for CSV uploads (`,`, `tab`, `;`, `|`); by extension when unset.
    pub csv_delimiter: Option<String>,
    /// `encoding_rs` label for CSV uploads; UTF-8 when unset.
    pub csv_encoding: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app_name: "Excel Sales Importer".to_string(),
            max_upload_size_mb: 20,
            allowed_extensions: vec![".xlsx".to_string(), ".xls".to_string(), ".csv".to_string()],
            store_dir: PathBuf::from("imports"),
            csv_delimiter: None,
            csv_encoding: None,
        }
    }
}

impl Settings {
    /// Loads settings from `path` (when given) and the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::default(),
        };
        settings.apply_overrides(|key| env::var(key).ok())?;
        Ok(settings)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening settings file {path:?}"))?;
        serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("Parsing settings YAML {path:?}"))
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_MAX_UPLOAD_MB) {
            self.max_upload_size_mb = value
                .trim()
                .parse()
                .with_context(|| format!("Invalid {ENV_MAX_UPLOAD_MB} value '{value}'"))?;
        }
        if let Some(value) = lookup(ENV_ALLOWED_EXTENSIONS) {
            self.allowed_extensions = value
                .split(',')
                .map(str::trim)
                .filter(|ext| !ext.is_empty())
                .map(normalize_extension)
                .collect();
        }
        if let Some(value) = lookup(ENV_STORE_DIR) {
            self.store_dir = PathBuf::from(value);
        }
        Ok(())
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_size_mb.saturating_mul(1024 * 1024)
    }

    /// Case-insensitive check of an extension such as `.xlsx`.
    pub fn is_extension_allowed(&self, extension: &str) -> bool {
        self.allowed_extensions
            .iter()
            .any(|allowed| normalize_extension(allowed) == normalize_extension(extension))
    }

    pub fn csv_options(&self) -> Result<CsvOptions> {
        let delimiter = self
            .csv_delimiter
            .as_deref()
            .map(|value| parse_delimiter(value).map_err(|err| anyhow!(err)))
            .transpose()?;
        Ok(CsvOptions {
            delimiter,
            encoding: resolve_encoding(self.csv_encoding.as_deref())?,
        })
    }
}

fn normalize_extension(extension: &str) -> String {
    let lowered = extension.trim().to_ascii_lowercase();
    if lowered.starts_with('.') {
        lowered
    } else {
        format!(".{lowered}")
    }
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn defaults_allow_spreadsheets_up_to_twenty_megabytes() {
        let settings = Settings::default();
        assert_eq!(settings.max_upload_bytes(), 20 * 1024 * 1024);
        assert!(settings.is_extension_allowed(".XLSX"));
        assert!(settings.is_extension_allowed("xls"));
        assert!(!settings.is_extension_allowed(".pdf"));
    }

    #[test]
    fn overrides_replace_file_values() {
        let vars = HashMap::from([
            (ENV_MAX_UPLOAD_MB, "5"),
            (ENV_ALLOWED_EXTENSIONS, "xlsx, .CSV"),
            (ENV_STORE_DIR, "/tmp/imports"),
        ]);
        let mut settings = Settings::default();
        settings
            .apply_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(settings.max_upload_size_mb, 5);
        assert_eq!(settings.allowed_extensions, vec![".xlsx", ".csv"]);
        assert_eq!(settings.store_dir, PathBuf::from("/tmp/imports"));
    }

    #[test]
    fn invalid_size_override_is_rejected() {
        let mut settings = Settings::default();
        let result = settings.apply_overrides(|key| {
            (key == ENV_MAX_UPLOAD_MB).then(|| "lots".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn yaml_file_fills_missing_keys_with_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("settings.yml");
        std::fs::write(&path, "max_upload_size_mb: 1\ncsv_encoding: windows-874\n").unwrap();
        let settings = Settings::from_yaml_file(&path).unwrap();
        assert_eq!(settings.max_upload_size_mb, 1);
        assert_eq!(settings.allowed_extensions, Settings::default().allowed_extensions);
        let options = settings.csv_options().unwrap();
        assert_eq!(options.encoding, encoding_rs::WINDOWS_874);
        assert_eq!(options.delimiter, None);
    }

    #[test]
    fn unknown_encoding_is_an_error() {
        assert!(resolve_encoding(Some("klingon")).is_err());
    }
}
