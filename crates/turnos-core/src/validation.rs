//! Form validation.
//!
//! Pure checks on a candidate [`PatientForm`]; no store access.

use crate::config::FormPolicy;
use crate::models::{FieldErrors, PatientField, PatientForm};

/// Message for a blank required field.
pub fn required_message(field: PatientField) -> &'static str {
    match field {
        PatientField::Name => "El nombre es obligatorio.",
        PatientField::Dni => "El DNI es obligatorio.",
        PatientField::Ficha => "El número de ficha es obligatorio.",
        PatientField::Carnet => "El carnet es obligatorio.",
        PatientField::ObraSocial => "La obra social es obligatoria.",
        PatientField::Telefono => "El teléfono es obligatorio.",
    }
}

/// Message for a non-numeric value in a numeric field.
pub fn numeric_message(field: PatientField) -> &'static str {
    match field {
        PatientField::Dni => "El DNI debe ser numérico.",
        PatientField::Ficha => "El número de ficha debe ser numérico.",
        PatientField::Carnet => "El carnet debe ser numérico.",
        PatientField::Telefono => "El teléfono debe ser numérico.",
        PatientField::Name | PatientField::ObraSocial => "El valor debe ser numérico.",
    }
}

/// Whether a value reads as a finite number once trimmed.
///
/// Accepts signs, decimals and exponents ("12", "-3.5", "1e3"); rejects
/// blanks and the non-finite spellings ("inf", "NaN").
pub fn is_numeric(value: &str) -> bool {
    value
        .trim()
        .parse::<f64>()
        .map(|n| n.is_finite())
        .unwrap_or(false)
}

/// Validate a form against the policy.
///
/// Returns one message per failing field; an empty map means valid. Fields
/// outside the policy's field set are ignored.
pub fn validate(form: &PatientForm, policy: &FormPolicy) -> FieldErrors {
    let mut errors = FieldErrors::new();

    for field in PatientField::ALL {
        if !policy.includes(field) {
            continue;
        }

        let value = form.get(field).trim();
        if value.is_empty() {
            if policy.is_required(field) {
                errors.insert(field, required_message(field).to_string());
            }
            continue;
        }

        if policy.is_numeric(field) && !is_numeric(value) {
            errors.insert(field, numeric_message(field).to_string());
        }
    }

    errors
}
