//! Value normalization applied before a record is saved.

use crate::config::FormPolicy;
use crate::models::{PatientField, PatientForm};

/// Capitalize each whitespace-separated word; the rest of each word is
/// lower-cased and runs of whitespace collapse to one space.
pub fn capitalize_words(value: &str) -> String {
    value
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Trim every field and apply the policy's capitalize / uppercase rules.
pub fn normalize(form: &PatientForm, policy: &FormPolicy) -> PatientForm {
    let mut normalized = PatientForm::default();

    for field in PatientField::ALL {
        let value = form.get(field).trim();
        let value = if policy.capitalize.contains(&field) {
            capitalize_words(value)
        } else if policy.uppercase.contains(&field) {
            value.to_uppercase()
        } else {
            value.to_string()
        };
        normalized.set(field, value);
    }

    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capitalize_words() {
        assert_eq!(capitalize_words("ana maría PEREZ"), "Ana María Perez");
        assert_eq!(capitalize_words("  juan   de la   cruz "), "Juan De La Cruz");
        assert_eq!(capitalize_words("ñandú"), "Ñandú");
        assert_eq!(capitalize_words(""), "");
    }

    #[test]
    fn test_normalize_full_policy() {
        let form = PatientForm {
            name: " ana perez ".into(),
            dni: " 30111222 ".into(),
            ficha: "a12".into(),
            carnet: " c-1 ".into(),
            obra_social: "osde".into(),
            telefono: " 555-1234".into(),
        };
        let normalized = normalize(&form, &FormPolicy::full());

        assert_eq!(normalized.name, "Ana Perez");
        assert_eq!(normalized.dni, "30111222");
        assert_eq!(normalized.ficha, "A12");
        assert_eq!(normalized.carnet, "c-1");
        assert_eq!(normalized.obra_social, "OSDE");
        assert_eq!(normalized.telefono, "555-1234");
    }

    #[test]
    fn test_basic_policy_only_trims() {
        let form = PatientForm::default()
            .with(PatientField::Name, " ana perez")
            .with(PatientField::Ficha, "a12 ");
        let normalized = normalize(&form, &FormPolicy::basic());

        assert_eq!(normalized.name, "ana perez");
        assert_eq!(normalized.ficha, "a12");
    }
}
