//! Turnos Core Library
//!
//! Patient record management for a medical front desk: add, edit, delete and
//! search patient charts, behind a login gate.
//!
//! # Architecture
//!
//! ```text
//!                Presentation (Swift / Kotlin via UniFFI)
//!                                  │
//!                          ┌───────▼────────┐
//!                          │ RecordController│◄──── AuthProvider
//!                          └───────┬────────┘      (session signal)
//!                                  │
//!          ┌───────────┬───────────┼──────────────┬─────────────┐
//!          ▼           ▼           ▼              ▼             ▼
//!      Validator  Uniqueness   Normalizer    Search filter  DocumentStore
//!                  Checker                                      │
//!                     └──────────── queries ────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`models`]: Domain types (Patient, PatientForm, Session)
//! - [`config`]: Form policy and application configuration
//! - [`db`]: SQLite database layer (documents, accounts)
//! - [`store`]: Document store trait and SQLite adapter
//! - [`auth`]: Auth provider trait, session subscriptions, local accounts
//! - [`validation`], [`normalize`], [`uniqueness`], [`search`]: form rules
//! - [`controller`]: Add / update / delete / search orchestration

pub mod auth;
pub mod config;
pub mod controller;
pub mod db;
pub mod logging;
pub mod models;
pub mod normalize;
pub mod search;
pub mod store;
pub mod uniqueness;
pub mod validation;

// Re-export commonly used types
pub use auth::{AuthError, AuthProvider, LocalAuthProvider, SessionHub, SessionSubscription};
pub use config::{AppConfig, ConfigError, FormPolicy};
pub use controller::{ConfirmPrompt, DeleteOutcome, RecordController, RecordError, ViewState};
pub use db::Database;
pub use models::{FieldErrors, Patient, PatientField, PatientForm, Session, SessionEvent};
pub use store::{Document, DocumentStore, SqliteStore, StoreError};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum TurnosError {
    #[error("Validation failed")]
    Validation { errors: HashMap<String, String> },

    #[error("Duplicate values")]
    Duplicate { errors: HashMap<String, String> },

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Not signed in")]
    Unauthenticated,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Auth error: {0}")]
    AuthError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

fn errors_to_map(errors: &FieldErrors) -> HashMap<String, String> {
    errors
        .iter()
        .map(|(field, message)| (field.as_str().to_string(), message.clone()))
        .collect()
}

impl From<RecordError> for TurnosError {
    fn from(e: RecordError) -> Self {
        match e {
            RecordError::Validation(errors) => TurnosError::Validation {
                errors: errors_to_map(&errors),
            },
            RecordError::Duplicate(errors) => TurnosError::Duplicate {
                errors: errors_to_map(&errors),
            },
            RecordError::Credentials => TurnosError::InvalidCredentials,
            RecordError::Unauthenticated => TurnosError::Unauthenticated,
            RecordError::NotFound(id) => TurnosError::NotFound(id),
            RecordError::Store(e) => TurnosError::StoreError(e.to_string()),
            RecordError::Auth(e) => TurnosError::AuthError(e.to_string()),
        }
    }
}

impl From<AuthError> for TurnosError {
    fn from(e: AuthError) -> Self {
        RecordError::from(e).into()
    }
}

impl From<StoreError> for TurnosError {
    fn from(e: StoreError) -> Self {
        TurnosError::StoreError(e.to_string())
    }
}

impl From<ConfigError> for TurnosError {
    fn from(e: ConfigError) -> Self {
        TurnosError::ConfigError(e.to_string())
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open the app with a JSON configuration file.
#[uniffi::export]
pub fn open_app(config_path: String) -> Result<Arc<TurnosCore>, TurnosError> {
    let config = AppConfig::load(&config_path)?;
    TurnosCore::build(config)
}

/// Open the app with default configuration and an in-memory database (for testing).
#[uniffi::export]
pub fn open_app_in_memory() -> Result<Arc<TurnosCore>, TurnosError> {
    TurnosCore::build(AppConfig::default())
}

// =========================================================================
// Main API Object
// =========================================================================

/// Delete confirmation implemented by the presentation layer.
#[uniffi::export(with_foreign)]
pub trait DeleteConfirmation: Send + Sync {
    /// Ask the user whether `patient` should be deleted.
    fn confirm(&self, patient: FfiPatient) -> bool;
}

struct ForeignConfirm(Arc<dyn DeleteConfirmation>);

#[async_trait]
impl ConfirmPrompt for ForeignConfirm {
    async fn confirm(&self, patient: &Patient) -> bool {
        self.0.confirm(patient.clone().into())
    }
}

/// Blocking facade over the async controller for foreign callers.
#[derive(uniffi::Object)]
pub struct TurnosCore {
    runtime: tokio::runtime::Runtime,
    accounts: Arc<LocalAuthProvider>,
    controller: RecordController,
}

impl TurnosCore {
    fn build(config: AppConfig) -> Result<Arc<Self>, TurnosError> {
        // A host that already installed a subscriber keeps it.
        let _ = logging::init_tracing(&config.log_filter);

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| TurnosError::ConfigError(format!("runtime: {}", e)))?;

        let store = match &config.database_path {
            Some(path) => SqliteStore::open(path)?,
            None => SqliteStore::open_in_memory()?,
        };
        let accounts = Arc::new(LocalAuthProvider::new(store.database()));
        let controller = RecordController::from_config(Arc::new(store), accounts.clone(), &config);

        tracing::info!(collection = %config.collection, "turnos core opened");
        Ok(Arc::new(Self {
            runtime,
            accounts,
            controller,
        }))
    }
}

#[uniffi::export]
impl TurnosCore {
    // =========================================================================
    // Session Operations
    // =========================================================================

    /// Create a login account.
    pub fn register_account(&self, email: String, password: String) -> Result<(), TurnosError> {
        self.runtime
            .block_on(self.accounts.register(&email, &password))?;
        Ok(())
    }

    /// Sign in and load the patient list.
    pub fn login(&self, email: String, password: String) -> Result<FfiSession, TurnosError> {
        let session = self.runtime.block_on(self.controller.login(&email, &password))?;
        Ok(session.into())
    }

    /// Sign out and clear loaded data.
    pub fn logout(&self) -> Result<(), TurnosError> {
        Ok(self.runtime.block_on(self.controller.logout())?)
    }

    pub fn is_authenticated(&self) -> bool {
        self.controller.is_authenticated()
    }

    // =========================================================================
    // Patient Operations
    // =========================================================================

    /// Reload the patient list.
    pub fn refresh(&self) -> Result<Vec<FfiPatient>, TurnosError> {
        let patients = self.runtime.block_on(self.controller.refresh())?;
        Ok(patients.into_iter().map(|p| p.into()).collect())
    }

    pub fn set_new_field(&self, field: FfiPatientField, value: String) {
        self.controller.set_new_field(field.into(), value);
    }

    /// Add a patient from the add form.
    pub fn submit_add(&self) -> Result<FfiPatient, TurnosError> {
        let patient = self.runtime.block_on(self.controller.submit_add())?;
        Ok(patient.into())
    }

    pub fn begin_edit(&self, id: String) -> Result<(), TurnosError> {
        Ok(self.controller.begin_edit(&id)?)
    }

    pub fn cancel_edit(&self) {
        self.controller.cancel_edit();
    }

    pub fn set_edit_field(&self, field: FfiPatientField, value: String) {
        self.controller.set_edit_field(field.into(), value);
    }

    /// Save the edit form over patient `id`.
    pub fn submit_edit(&self, id: String) -> Result<FfiPatient, TurnosError> {
        let patient = self.runtime.block_on(self.controller.submit_edit(&id))?;
        Ok(patient.into())
    }

    /// Delete a patient. Returns false if the user declined.
    pub fn delete_patient(
        &self,
        id: String,
        confirmation: Arc<dyn DeleteConfirmation>,
    ) -> Result<bool, TurnosError> {
        let prompt = ForeignConfirm(confirmation);
        let outcome = self.runtime.block_on(self.controller.delete(&id, &prompt))?;
        Ok(outcome == DeleteOutcome::Deleted)
    }

    /// Filter the loaded list.
    pub fn search(&self, term: String) -> Vec<FfiPatient> {
        self.controller
            .search(&term)
            .into_iter()
            .map(|p| p.into())
            .collect()
    }

    /// Snapshot of everything the UI renders.
    pub fn view(&self) -> FfiViewState {
        self.controller.view().into()
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe patient field.
#[derive(Debug, Clone, Copy, uniffi::Enum)]
pub enum FfiPatientField {
    Name,
    Dni,
    Ficha,
    Carnet,
    ObraSocial,
    Telefono,
}

impl From<FfiPatientField> for PatientField {
    fn from(field: FfiPatientField) -> Self {
        match field {
            FfiPatientField::Name => PatientField::Name,
            FfiPatientField::Dni => PatientField::Dni,
            FfiPatientField::Ficha => PatientField::Ficha,
            FfiPatientField::Carnet => PatientField::Carnet,
            FfiPatientField::ObraSocial => PatientField::ObraSocial,
            FfiPatientField::Telefono => PatientField::Telefono,
        }
    }
}

/// FFI-safe patient.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatient {
    pub id: String,
    pub name: String,
    pub dni: String,
    pub ficha: String,
    pub carnet: Option<String>,
    pub obra_social: Option<String>,
    pub telefono: Option<String>,
}

impl From<Patient> for FfiPatient {
    fn from(patient: Patient) -> Self {
        Self {
            id: patient.id,
            name: patient.name,
            dni: patient.dni,
            ficha: patient.ficha,
            carnet: patient.carnet,
            obra_social: patient.obra_social,
            telefono: patient.telefono,
        }
    }
}

/// FFI-safe form input.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatientForm {
    pub name: String,
    pub dni: String,
    pub ficha: String,
    pub carnet: String,
    pub obra_social: String,
    pub telefono: String,
}

impl From<PatientForm> for FfiPatientForm {
    fn from(form: PatientForm) -> Self {
        Self {
            name: form.name,
            dni: form.dni,
            ficha: form.ficha,
            carnet: form.carnet,
            obra_social: form.obra_social,
            telefono: form.telefono,
        }
    }
}

/// FFI-safe session.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSession {
    pub uid: String,
    pub email: String,
    pub signed_in_at: String,
}

impl From<Session> for FfiSession {
    fn from(session: Session) -> Self {
        Self {
            uid: session.uid,
            email: session.email,
            signed_in_at: session.signed_in_at,
        }
    }
}

/// FFI-safe view state.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiViewState {
    pub records: Vec<FfiPatient>,
    pub filtered: Vec<FfiPatient>,
    pub new_form: FfiPatientForm,
    pub edit_form: FfiPatientForm,
    pub editing_id: Option<String>,
    pub errors: HashMap<String, String>,
    pub search_term: String,
    pub loading: bool,
    pub authenticated: bool,
    pub login_error: Option<String>,
    pub notice: Option<String>,
}

impl From<ViewState> for FfiViewState {
    fn from(view: ViewState) -> Self {
        Self {
            records: view.records.into_iter().map(|p| p.into()).collect(),
            filtered: view.filtered.into_iter().map(|p| p.into()).collect(),
            new_form: view.new_form.into(),
            edit_form: view.edit_form.into(),
            editing_id: view.editing_id,
            errors: errors_to_map(&view.errors),
            search_term: view.search_term,
            loading: view.loading,
            authenticated: view.authenticated,
            login_error: view.login_error,
            notice: view.notice,
        }
    }
}
