//! In-memory search over the loaded record list.

use crate::models::{Patient, PatientField};

/// Whether `patient` matches an already lower-cased term.
///
/// Every field is compared case-insensitively. Digit-only values are
/// unaffected by case folding, so numeric identifiers still match as raw
/// substrings.
pub fn matches(patient: &Patient, term_lower: &str, fields: &[PatientField]) -> bool {
    fields.iter().any(|field| {
        patient
            .field(*field)
            .map_or(false, |value| value.to_lowercase().contains(term_lower))
    })
}

/// Records matching `term` as a substring of any searched field.
///
/// An empty term returns every record. Order is preserved.
pub fn filter_patients(patients: &[Patient], term: &str, fields: &[PatientField]) -> Vec<Patient> {
    if term.is_empty() {
        return patients.to_vec();
    }

    let term_lower = term.to_lowercase();
    patients
        .iter()
        .filter(|patient| matches(patient, &term_lower, fields))
        .cloned()
        .collect()
}
