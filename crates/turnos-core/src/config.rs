//! Application configuration.
//!
//! [`FormPolicy`] captures everything that differed between the successive
//! versions of the patient form: which fields exist, which are required,
//! numeric or unique, how values are normalized before saving, the list
//! ordering, and whether deletes ask for confirmation.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::PatientField;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid form policy: {0}")]
    InvalidPolicy(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Field set and rules for the patient form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormPolicy {
    /// Fields shown, stored and searched
    pub fields: Vec<PatientField>,
    /// Fields that must be non-blank
    pub required: Vec<PatientField>,
    /// Fields that must parse as a finite number when non-blank
    pub numeric: Vec<PatientField>,
    /// Fields that must not repeat across records
    pub unique: Vec<PatientField>,
    /// Fields capitalized per word before saving
    pub capitalize: Vec<PatientField>,
    /// Fields upper-cased before saving
    pub uppercase: Vec<PatientField>,
    /// Ascending sort key for the record list
    pub sort_by: Option<PatientField>,
    /// Ask the presentation layer before deleting
    pub confirm_delete: bool,
}

impl Default for FormPolicy {
    fn default() -> Self {
        Self::full()
    }
}

impl FormPolicy {
    /// Name, DNI and ficha only; numeric IDs, no normalization, unconditional delete.
    pub fn basic() -> Self {
        use PatientField::*;
        Self {
            fields: vec![Name, Dni, Ficha],
            required: vec![Name, Dni, Ficha],
            numeric: vec![Dni, Ficha],
            unique: vec![Dni, Ficha],
            capitalize: Vec::new(),
            uppercase: Vec::new(),
            sort_by: None,
            confirm_delete: false,
        }
    }

    /// Every field, insurer data required, normalization on, sorted by ficha,
    /// confirmed deletes.
    pub fn full() -> Self {
        use PatientField::*;
        Self {
            fields: PatientField::ALL.to_vec(),
            required: vec![Name, Dni, Ficha, Carnet, ObraSocial],
            numeric: vec![Dni, Ficha],
            unique: vec![Dni, Ficha, Carnet],
            capitalize: vec![Name],
            uppercase: vec![Ficha, ObraSocial],
            sort_by: Some(Ficha),
            confirm_delete: true,
        }
    }

    pub fn includes(&self, field: PatientField) -> bool {
        self.fields.contains(&field)
    }

    pub fn is_required(&self, field: PatientField) -> bool {
        self.required.contains(&field)
    }

    pub fn is_numeric(&self, field: PatientField) -> bool {
        self.numeric.contains(&field)
    }

    /// Check that every rule only names fields in the field set, and that the
    /// fields every record must carry are present and required.
    pub fn check(&self) -> ConfigResult<()> {
        let rules = [
            ("required", &self.required),
            ("numeric", &self.numeric),
            ("unique", &self.unique),
            ("capitalize", &self.capitalize),
            ("uppercase", &self.uppercase),
        ];
        for (rule, fields) in rules {
            if let Some(field) = fields.iter().find(|f| !self.includes(**f)) {
                return Err(ConfigError::InvalidPolicy(format!(
                    "{} lists {} which is not in fields",
                    rule, field
                )));
            }
        }

        if let Some(sort_by) = self.sort_by {
            if !self.includes(sort_by) {
                return Err(ConfigError::InvalidPolicy(format!(
                    "sort_by {} is not in fields",
                    sort_by
                )));
            }
        }

        for field in [PatientField::Name, PatientField::Dni, PatientField::Ficha] {
            if !self.is_required(field) {
                return Err(ConfigError::InvalidPolicy(format!("{} must be required", field)));
            }
        }
        Ok(())
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// SQLite file; in-memory when absent
    pub database_path: Option<PathBuf>,
    /// Collection holding patient documents
    pub collection: String,
    /// Fallback tracing filter when `RUST_LOG` is unset
    pub log_filter: String,
    pub policy: FormPolicy,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            collection: "users".into(),
            log_filter: "info".into(),
            policy: FormPolicy::default(),
        }
    }
}

impl AppConfig {
    /// Parse configuration from JSON. Missing keys take their defaults.
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let config: AppConfig = serde_json::from_str(json)?;
        config.policy.check()?;
        Ok(config)
    }

    /// Load configuration from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}
