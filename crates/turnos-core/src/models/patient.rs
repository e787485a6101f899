//! Patient models.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::store::{Document, Fields, StoreError};

/// A form field of a patient record.
///
/// Serialized names match the document keys used in the `users` collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PatientField {
    Name,
    Dni,
    Ficha,
    Carnet,
    ObraSocial,
    Telefono,
}

impl PatientField {
    /// Every field, in display order.
    pub const ALL: [PatientField; 6] = [
        PatientField::Name,
        PatientField::Dni,
        PatientField::Ficha,
        PatientField::Carnet,
        PatientField::ObraSocial,
        PatientField::Telefono,
    ];

    /// Document key for this field.
    pub fn as_str(&self) -> &'static str {
        match self {
            PatientField::Name => "name",
            PatientField::Dni => "dni",
            PatientField::Ficha => "ficha",
            PatientField::Carnet => "carnet",
            PatientField::ObraSocial => "obraSocial",
            PatientField::Telefono => "telefono",
        }
    }
}

impl fmt::Display for PatientField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown field name.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Unknown patient field: {0}")]
pub struct UnknownField(pub String);

impl FromStr for PatientField {
    type Err = UnknownField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PatientField::ALL
            .iter()
            .copied()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| UnknownField(s.to_string()))
    }
}

/// Per-field error messages. Empty means the candidate is valid.
pub type FieldErrors = BTreeMap<PatientField, String>;

/// A persisted patient record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    /// Store-assigned identifier (not part of the document body)
    #[serde(skip)]
    pub id: String,
    /// Full name
    pub name: String,
    /// National ID number
    pub dni: String,
    /// Chart number
    pub ficha: String,
    /// Insurer membership card number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carnet: Option<String>,
    /// Insurer (obra social) name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obra_social: Option<String>,
    /// Phone number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telefono: Option<String>,
}

impl Patient {
    /// Get a field value, if present.
    pub fn field(&self, field: PatientField) -> Option<&str> {
        match field {
            PatientField::Name => Some(&self.name),
            PatientField::Dni => Some(&self.dni),
            PatientField::Ficha => Some(&self.ficha),
            PatientField::Carnet => self.carnet.as_deref(),
            PatientField::ObraSocial => self.obra_social.as_deref(),
            PatientField::Telefono => self.telefono.as_deref(),
        }
    }

    /// Short label for log lines.
    pub fn label(&self) -> String {
        format!("{} (ficha {})", self.name, self.ficha)
    }
}

impl TryFrom<Document> for Patient {
    type Error = StoreError;

    /// Decode a stored document, rejecting records without a name or ficha.
    fn try_from(doc: Document) -> Result<Self, Self::Error> {
        let invalid = |reason: String| StoreError::InvalidDocument {
            id: doc.id.clone(),
            reason,
        };

        let mut patient: Patient = serde_json::from_value(Value::Object(doc.fields.clone()))
            .map_err(|e| invalid(e.to_string()))?;

        if patient.name.trim().is_empty() {
            return Err(invalid("empty name".into()));
        }
        if patient.ficha.trim().is_empty() {
            return Err(invalid("empty ficha".into()));
        }

        patient.id = doc.id;
        Ok(patient)
    }
}

/// Free-text form input for creating or editing a patient.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientForm {
    pub name: String,
    pub dni: String,
    pub ficha: String,
    pub carnet: String,
    pub obra_social: String,
    pub telefono: String,
}

impl PatientForm {
    /// Get the raw value of a field.
    pub fn get(&self, field: PatientField) -> &str {
        match field {
            PatientField::Name => &self.name,
            PatientField::Dni => &self.dni,
            PatientField::Ficha => &self.ficha,
            PatientField::Carnet => &self.carnet,
            PatientField::ObraSocial => &self.obra_social,
            PatientField::Telefono => &self.telefono,
        }
    }

    /// Replace the value of a field.
    pub fn set(&mut self, field: PatientField, value: impl Into<String>) {
        let value = value.into();
        match field {
            PatientField::Name => self.name = value,
            PatientField::Dni => self.dni = value,
            PatientField::Ficha => self.ficha = value,
            PatientField::Carnet => self.carnet = value,
            PatientField::ObraSocial => self.obra_social = value,
            PatientField::Telefono => self.telefono = value,
        }
    }

    /// Builder-style setter.
    pub fn with(mut self, field: PatientField, value: impl Into<String>) -> Self {
        self.set(field, value);
        self
    }

    /// Reset every field to empty.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Document body holding only the given fields.
    pub fn to_fields(&self, fields: &[PatientField]) -> Fields {
        fields
            .iter()
            .map(|field| (field.as_str().to_string(), Value::String(self.get(*field).to_string())))
            .collect()
    }
}

impl From<&Patient> for PatientForm {
    fn from(patient: &Patient) -> Self {
        Self {
            name: patient.name.clone(),
            dni: patient.dni.clone(),
            ficha: patient.ficha.clone(),
            carnet: patient.carnet.clone().unwrap_or_default(),
            obra_social: patient.obra_social.clone().unwrap_or_default(),
            telefono: patient.telefono.clone().unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, value: Value) -> Document {
        Document {
            id: id.into(),
            fields: value.as_object().cloned().unwrap(),
        }
    }

    #[test]
    fn test_field_names_round_trip() {
        for field in PatientField::ALL {
            assert_eq!(field.as_str().parse::<PatientField>().unwrap(), field);
        }
        assert!("obra_social".parse::<PatientField>().is_err());
    }

    #[test]
    fn test_patient_from_document() {
        let patient = Patient::try_from(doc(
            "abc",
            json!({"name": "Ana Perez", "dni": "30111222", "ficha": "100", "obraSocial": "OSDE"}),
        ))
        .unwrap();

        assert_eq!(patient.id, "abc");
        assert_eq!(patient.obra_social.as_deref(), Some("OSDE"));
        assert_eq!(patient.carnet, None);
        assert_eq!(patient.label(), "Ana Perez (ficha 100)");
    }

    #[test]
    fn test_document_without_ficha_rejected() {
        let result = Patient::try_from(doc("abc", json!({"name": "Ana", "dni": "1", "ficha": " "})));
        assert!(matches!(result, Err(StoreError::InvalidDocument { .. })));

        let result = Patient::try_from(doc("abc", json!({"name": "Ana"})));
        assert!(matches!(result, Err(StoreError::InvalidDocument { .. })));
    }

    #[test]
    fn test_form_from_patient() {
        let patient = Patient {
            id: "x".into(),
            name: "Ana".into(),
            dni: "1".into(),
            ficha: "10".into(),
            carnet: None,
            obra_social: Some("PAMI".into()),
            telefono: None,
        };
        let form = PatientForm::from(&patient);
        assert_eq!(form.get(PatientField::ObraSocial), "PAMI");
        assert_eq!(form.get(PatientField::Carnet), "");
    }

    #[test]
    fn test_to_fields_limited_to_policy() {
        let form = PatientForm::default()
            .with(PatientField::Name, "Ana")
            .with(PatientField::Telefono, "555");
        let fields = form.to_fields(&[PatientField::Name, PatientField::Ficha]);

        assert_eq!(fields.len(), 2);
        assert_eq!(fields["name"], "Ana");
        assert_eq!(fields["ficha"], "");
        assert!(!fields.contains_key("telefono"));
    }
}
