//! Uniqueness checks against the document store.

use std::sync::Arc;

use futures::future::join_all;

use crate::models::{FieldErrors, PatientField, PatientForm};
use crate::store::{DocumentStore, StoreResult};

/// Message for a value already held by another record.
pub fn duplicate_message(field: PatientField) -> &'static str {
    match field {
        PatientField::Name => "El nombre ya está registrado.",
        PatientField::Dni => "El DNI ya está registrado.",
        PatientField::Ficha => "El número de ficha ya está registrado.",
        PatientField::Carnet => "El carnet ya está registrado.",
        PatientField::ObraSocial => "La obra social ya está registrada.",
        PatientField::Telefono => "El teléfono ya está registrado.",
    }
}

/// Checks candidate values against the records already in a collection.
///
/// Values are compared exactly as given, so callers pass the normalized
/// (persisted) form of each value.
pub struct UniquenessChecker {
    store: Arc<dyn DocumentStore>,
    collection: String,
}

impl UniquenessChecker {
    pub fn new(store: Arc<dyn DocumentStore>, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
        }
    }

    /// Check one field.
    ///
    /// Returns a message if any record other than `exclude_id` already holds
    /// `value`. With no exclusion, any match collides.
    pub async fn check(
        &self,
        field: PatientField,
        value: &str,
        exclude_id: Option<&str>,
    ) -> StoreResult<Option<String>> {
        let matches = self
            .store
            .query_by_field(&self.collection, field.as_str(), value)
            .await?;

        let collides = matches
            .iter()
            .any(|doc| Some(doc.id.as_str()) != exclude_id);

        if collides {
            tracing::debug!(%field, value, "uniqueness collision");
            Ok(Some(duplicate_message(field).to_string()))
        } else {
            Ok(None)
        }
    }

    /// Check every listed field concurrently.
    ///
    /// All queries are awaited before anything is decided: a store failure
    /// in any of them fails the whole check, otherwise every colliding field
    /// is reported. Blank values are skipped.
    pub async fn check_all(
        &self,
        form: &PatientForm,
        fields: &[PatientField],
        exclude_id: Option<&str>,
    ) -> StoreResult<FieldErrors> {
        let checks = fields
            .iter()
            .copied()
            .filter(|field| !form.get(*field).is_empty())
            .map(|field| async move { (field, self.check(field, form.get(field), exclude_id).await) });

        let results = join_all(checks).await;

        let mut errors = FieldErrors::new();
        for (field, result) in results {
            if let Some(message) = result? {
                errors.insert(field, message);
            }
        }
        Ok(errors)
    }
}
