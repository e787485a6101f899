//! Record controller.
//!
//! Flow for add and update:
//!
//! ```text
//! form ──► validate ──► uniqueness (concurrent queries) ──► normalize
//!             │                    │                           │
//!        field errors         field errors                     ▼
//!        (no store I/O)       (no write)              create / update
//!                                                              │
//!                                                  reset form, refresh list
//! ```
//!
//! The controller also owns the state the presentation layer renders
//! ([`ViewState`]) and gates every record operation behind the session
//! signal from the [`AuthProvider`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use thiserror::Error;

use crate::auth::{AuthError, AuthProvider, SessionSubscription};
use crate::config::{AppConfig, FormPolicy};
use crate::models::{FieldErrors, Patient, PatientField, PatientForm, Session};
use crate::normalize::normalize;
use crate::search::filter_patients;
use crate::store::{Document, DocumentStore, OrderBy, StoreError};
use crate::uniqueness::UniquenessChecker;
use crate::validation::validate;

/// Notice shown when a store call fails. The operation can be retried.
pub const GENERIC_FAILURE: &str = "No se pudo completar la operación. Intente nuevamente.";

/// Login error shown for any rejected credentials.
pub const INVALID_LOGIN: &str = "Usuario no registrado";

/// Record operation errors.
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Validation failed: {0:?}")]
    Validation(FieldErrors),

    #[error("Duplicate values: {0:?}")]
    Duplicate(FieldErrors),

    #[error("Invalid credentials")]
    Credentials,

    #[error("Not signed in")]
    Unauthenticated,

    #[error("Patient not found: {0}")]
    NotFound(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Auth error: {0}")]
    Auth(AuthError),
}

impl From<AuthError> for RecordError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidCredentials => RecordError::Credentials,
            other => RecordError::Auth(other),
        }
    }
}

impl RecordError {
    /// Per-field messages, for validation and duplicate failures.
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            RecordError::Validation(errors) | RecordError::Duplicate(errors) => Some(errors),
            _ => None,
        }
    }
}

pub type RecordResult<T> = Result<T, RecordError>;

/// Yes/no confirmation supplied by the presentation layer.
#[async_trait]
pub trait ConfirmPrompt: Send + Sync {
    async fn confirm(&self, patient: &Patient) -> bool;
}

/// Result of a delete request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    Cancelled,
}

/// Everything the presentation layer renders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewState {
    /// Full list as last loaded from the store
    pub records: Vec<Patient>,
    /// `records` filtered by `search_term`
    pub filtered: Vec<Patient>,
    /// Add form input
    pub new_form: PatientForm,
    /// Edit form input
    pub edit_form: PatientForm,
    /// Record being edited
    pub editing_id: Option<String>,
    /// Inline field errors from the last add/update attempt
    pub errors: FieldErrors,
    pub search_term: String,
    pub loading: bool,
    pub authenticated: bool,
    pub login_error: Option<String>,
    /// Generic failure notice after a store error
    pub notice: Option<String>,
}

/// Orchestrates add, update, delete and search over the patient collection.
///
/// Methods take `&self`, so a presentation layer may start a new operation
/// while another is still awaiting the store. Two known weaknesses follow
/// from that and are kept as-is:
///
/// - `loading` is a single flag, not a counter. When operations overlap, the
///   first one to finish flips it back to idle while the other is still
///   running.
/// - Uniqueness is checked, then written, with no lock in between. Two
///   overlapping adds with the same ficha can both pass the check and both
///   be saved.
///
/// A logout that lands while a write is in flight does not undo the write;
/// the reload that follows it is discarded and returns `Unauthenticated`.
pub struct RecordController {
    store: Arc<dyn DocumentStore>,
    auth: Arc<dyn AuthProvider>,
    session: SessionSubscription,
    checker: UniquenessChecker,
    collection: String,
    policy: FormPolicy,
    state: Mutex<ViewState>,
}

impl RecordController {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        auth: Arc<dyn AuthProvider>,
        collection: impl Into<String>,
        policy: FormPolicy,
    ) -> Self {
        let collection = collection.into();
        Self {
            checker: UniquenessChecker::new(Arc::clone(&store), collection.clone()),
            session: auth.subscribe(),
            store,
            auth,
            collection,
            policy,
            state: Mutex::new(ViewState::default()),
        }
    }

    pub fn from_config(
        store: Arc<dyn DocumentStore>,
        auth: Arc<dyn AuthProvider>,
        config: &AppConfig,
    ) -> Self {
        Self::new(store, auth, config.collection.clone(), config.policy.clone())
    }

    pub fn policy(&self) -> &FormPolicy {
        &self.policy
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    /// Snapshot of the current view state.
    pub fn view(&self) -> ViewState {
        let mut view = self.state().clone();
        view.authenticated = self.is_authenticated();
        view
    }

    fn state(&self) -> MutexGuard<'_, ViewState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn require_session(&self) -> RecordResult<()> {
        if self.is_authenticated() {
            Ok(())
        } else {
            Err(RecordError::Unauthenticated)
        }
    }

    fn set_loading(&self, loading: bool) {
        self.state().loading = loading;
    }

    /// Record a store failure: back to idle, generic notice, error returned.
    fn fail(&self, e: StoreError) -> RecordError {
        tracing::error!(error = %e, "store operation failed");
        {
            let mut state = self.state();
            state.loading = false;
            state.notice = Some(GENERIC_FAILURE.to_string());
        }
        match e {
            StoreError::NotFound { id, .. } => RecordError::NotFound(id),
            other => RecordError::Store(other),
        }
    }

    // =========================================================================
    // Session
    // =========================================================================

    /// Sign in and load the record list.
    pub async fn login(&self, email: &str, password: &str) -> RecordResult<Session> {
        self.state().login_error = None;

        let session = match self.auth.sign_in(email, password).await {
            Ok(session) => session,
            Err(AuthError::InvalidCredentials) => {
                self.state().login_error = Some(INVALID_LOGIN.to_string());
                return Err(RecordError::Credentials);
            }
            Err(e) => return Err(e.into()),
        };

        self.refresh().await?;
        Ok(session)
    }

    /// Sign out and drop everything loaded for the session.
    pub async fn logout(&self) -> RecordResult<()> {
        self.auth.sign_out().await?;
        *self.state() = ViewState::default();
        Ok(())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Reload the record list from the store.
    pub async fn refresh(&self) -> RecordResult<Vec<Patient>> {
        self.require_session()?;
        {
            let mut state = self.state();
            state.notice = None;
            state.loading = true;
        }

        let records = self.reload().await?;
        self.set_loading(false);
        Ok(records)
    }

    /// Fetch, decode and publish the list. Leaves `loading` untouched on success.
    async fn reload(&self) -> RecordResult<Vec<Patient>> {
        let order_by = self.policy.sort_by.map(|field| OrderBy::ascending(field.as_str()));
        let docs = match self.store.get_all_records(&self.collection, order_by).await {
            Ok(docs) => docs,
            Err(e) => return Err(self.fail(e)),
        };

        let records: Vec<Patient> = docs
            .into_iter()
            .filter_map(|doc| match Patient::try_from(doc) {
                Ok(patient) => Some(patient),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping malformed record");
                    None
                }
            })
            .collect();

        tracing::debug!(count = records.len(), "records loaded");

        let mut state = self.state();
        // A logout while the fetch was in flight already reset the view
        if !self.is_authenticated() {
            tracing::debug!("session closed during reload, discarding records");
            return Err(RecordError::Unauthenticated);
        }
        state.filtered = filter_patients(&records, &state.search_term, &self.policy.fields);
        state.records = records.clone();
        Ok(records)
    }

    /// Filter the loaded list. The term is kept and reapplied after reloads.
    pub fn search(&self, term: &str) -> Vec<Patient> {
        let mut state = self.state();
        state.search_term = term.to_string();
        state.filtered = filter_patients(&state.records, term, &self.policy.fields);
        state.filtered.clone()
    }

    // =========================================================================
    // Form input
    // =========================================================================

    pub fn set_new_field(&self, field: PatientField, value: impl Into<String>) {
        self.state().new_form.set(field, value);
    }

    pub fn set_edit_field(&self, field: PatientField, value: impl Into<String>) {
        self.state().edit_form.set(field, value);
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Validate, check, normalize and write a form.
    ///
    /// `target` is the record being edited: it is excluded from uniqueness
    /// checks and updated in place. With no target a new record is created.
    /// On success `loading` is still set; the caller reloads and clears it.
    async fn save(&self, form: &PatientForm, target: Option<&str>) -> RecordResult<Patient> {
        let errors = validate(form, &self.policy);
        if !errors.is_empty() {
            tracing::debug!(?errors, "form rejected");
            self.state().errors = errors.clone();
            return Err(RecordError::Validation(errors));
        }

        {
            let mut state = self.state();
            state.notice = None;
            state.loading = true;
        }

        let normalized = normalize(form, &self.policy);

        let duplicates = match self
            .checker
            .check_all(&normalized, &self.policy.unique, target)
            .await
        {
            Ok(duplicates) => duplicates,
            Err(e) => return Err(self.fail(e)),
        };
        if !duplicates.is_empty() {
            tracing::warn!(fields = ?duplicates.keys().collect::<Vec<_>>(), "duplicate values");
            let mut state = self.state();
            state.errors = duplicates.clone();
            state.loading = false;
            return Err(RecordError::Duplicate(duplicates));
        }

        let fields = normalized.to_fields(&self.policy.fields);
        let id = match target {
            None => match self.store.create_record(&self.collection, fields.clone()).await {
                Ok(id) => id,
                Err(e) => return Err(self.fail(e)),
            },
            Some(id) => match self
                .store
                .update_record(&self.collection, id, fields.clone())
                .await
            {
                Ok(()) => id.to_string(),
                Err(e) => return Err(self.fail(e)),
            },
        };

        Patient::try_from(Document { id, fields }).map_err(|e| self.fail(e))
    }

    /// Add a patient from the add form.
    ///
    /// On success the form and errors are cleared and the list is reloaded.
    /// If only the reload fails, the record is saved but the error is
    /// returned.
    pub async fn submit_add(&self) -> RecordResult<Patient> {
        self.require_session()?;
        let form = self.state().new_form.clone();

        let patient = self.save(&form, None).await?;
        tracing::info!(id = %patient.id, ficha = %patient.ficha, "patient added");

        {
            let mut state = self.state();
            state.new_form.clear();
            state.errors.clear();
        }
        self.reload().await?;
        self.set_loading(false);
        Ok(patient)
    }

    /// Enter editing mode for a loaded record.
    pub fn begin_edit(&self, id: &str) -> RecordResult<()> {
        self.require_session()?;
        let mut state = self.state();

        let form = state
            .records
            .iter()
            .find(|p| p.id == id)
            .map(PatientForm::from)
            .ok_or_else(|| RecordError::NotFound(id.to_string()))?;

        state.edit_form = form;
        state.editing_id = Some(id.to_string());
        state.errors.clear();
        Ok(())
    }

    /// Leave editing mode without saving.
    pub fn cancel_edit(&self) {
        let mut state = self.state();
        state.editing_id = None;
        state.edit_form.clear();
        state.errors.clear();
    }

    /// Save the edit form over record `id`.
    pub async fn submit_edit(&self, id: &str) -> RecordResult<Patient> {
        self.require_session()?;
        let form = self.state().edit_form.clone();

        let patient = self.save(&form, Some(id)).await?;
        tracing::info!(id = %patient.id, ficha = %patient.ficha, "patient updated");

        {
            let mut state = self.state();
            state.editing_id = None;
            state.edit_form.clear();
            state.errors.clear();
        }
        self.reload().await?;
        self.set_loading(false);
        Ok(patient)
    }

    /// Delete record `id`, asking `prompt` first when the policy says so.
    ///
    /// A declined prompt touches nothing.
    pub async fn delete(&self, id: &str, prompt: &dyn ConfirmPrompt) -> RecordResult<DeleteOutcome> {
        self.require_session()?;

        if self.policy.confirm_delete {
            let patient = self
                .state()
                .records
                .iter()
                .find(|p| p.id == id)
                .cloned()
                .ok_or_else(|| RecordError::NotFound(id.to_string()))?;

            tracing::debug!(patient = %patient.label(), "asking to confirm delete");
            if !prompt.confirm(&patient).await {
                tracing::debug!(patient = %patient.label(), "delete cancelled");
                return Ok(DeleteOutcome::Cancelled);
            }
        }

        {
            let mut state = self.state();
            state.notice = None;
            state.loading = true;
        }

        if let Err(e) = self.store.delete_record(&self.collection, id).await {
            return Err(self.fail(e));
        }
        tracing::info!(%id, "patient deleted");

        {
            let mut state = self.state();
            if state.editing_id.as_deref() == Some(id) {
                state.editing_id = None;
                state.edit_form.clear();
                state.errors.clear();
            }
        }
        self.reload().await?;
        self.set_loading(false);
        Ok(DeleteOutcome::Deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::LocalAuthProvider;
    use crate::store::SqliteStore;

    async fn signed_in(policy: FormPolicy) -> RecordController {
        let store = SqliteStore::open_in_memory().unwrap();
        let auth = Arc::new(LocalAuthProvider::new(store.database()));
        auth.register("a@b.c", "secreto1").await.unwrap();

        let controller = RecordController::new(Arc::new(store), auth, "users", policy);
        controller.login("a@b.c", "secreto1").await.unwrap();
        controller
    }

    fn fill(controller: &RecordController, name: &str, dni: &str, ficha: &str) {
        controller.set_new_field(PatientField::Name, name);
        controller.set_new_field(PatientField::Dni, dni);
        controller.set_new_field(PatientField::Ficha, ficha);
    }

    #[tokio::test]
    async fn test_validation_errors_land_in_view() {
        let controller = signed_in(FormPolicy::basic()).await;
        fill(&controller, "", "abc", "10");

        let err = controller.submit_add().await.unwrap_err();
        assert!(matches!(err, RecordError::Validation(_)));

        let view = controller.view();
        assert!(view.errors.contains_key(&PatientField::Name));
        assert!(view.errors.contains_key(&PatientField::Dni));
        assert!(!view.loading);
        // Form input is kept so the user can fix it
        assert_eq!(view.new_form.ficha, "10");
    }

    #[tokio::test]
    async fn test_add_clears_form_and_reloads() {
        let controller = signed_in(FormPolicy::basic()).await;
        fill(&controller, "Ana", "30111222", "10");

        let patient = controller.submit_add().await.unwrap();

        let view = controller.view();
        assert_eq!(view.records, vec![patient.clone()]);
        assert_eq!(view.filtered, vec![patient]);
        assert_eq!(view.new_form, PatientForm::default());
        assert!(view.errors.is_empty());
        assert!(!view.loading);
    }

    #[tokio::test]
    async fn test_begin_edit_unknown_id() {
        let controller = signed_in(FormPolicy::basic()).await;
        assert!(matches!(
            controller.begin_edit("missing"),
            Err(RecordError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_cancel_edit() {
        let controller = signed_in(FormPolicy::basic()).await;
        fill(&controller, "Ana", "1", "10");
        let patient = controller.submit_add().await.unwrap();

        controller.begin_edit(&patient.id).unwrap();
        assert_eq!(controller.view().edit_form.name, "Ana");

        controller.cancel_edit();
        let view = controller.view();
        assert!(view.editing_id.is_none());
        assert_eq!(view.edit_form, PatientForm::default());
    }

    #[tokio::test]
    async fn test_search_term_survives_reload() {
        let controller = signed_in(FormPolicy::basic()).await;
        fill(&controller, "Ana", "1", "10");
        controller.submit_add().await.unwrap();

        controller.search("bob");
        assert!(controller.view().filtered.is_empty());

        fill(&controller, "Bob", "2", "20");
        controller.submit_add().await.unwrap();

        let view = controller.view();
        assert_eq!(view.records.len(), 2);
        assert_eq!(view.filtered.len(), 1);
        assert_eq!(view.filtered[0].name, "Bob");
    }

    #[test]
    fn test_auth_error_mapping() {
        assert!(matches!(
            RecordError::from(AuthError::InvalidCredentials),
            RecordError::Credentials
        ));
        assert!(matches!(
            RecordError::from(AuthError::AccountExists("a".into())),
            RecordError::Auth(_)
        ));
    }
}
