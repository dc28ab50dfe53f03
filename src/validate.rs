//! Schema validation for inbound documents.
//!
//! Remote documents arrive as untyped JSON written by untrusted clients.
//! Every snapshot passes through [`filter_valid`]: documents that fail a
//! check are dropped and logged, and the rest of the snapshot is delivered.

#[cfg(test)]
#[path = "validate_test.rs"]
mod validate_test;

use canvas::doc::NoteColor;
use serde_json::{Map, Value};
use tracing::warn;
use uuid::Uuid;

use crate::records::Document;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("document is not a JSON object")]
    NotAnObject,
    #[error("missing field `{0}`")]
    Missing(&'static str),
    #[error("field `{field}` must be {expected}")]
    WrongType { field: &'static str, expected: &'static str },
    #[error("field `{0}` must be a finite number")]
    NotFinite(&'static str),
    #[error("field `{0}` must be a non-negative integer")]
    NotNonNegativeInteger(&'static str),
    #[error("field `{0}` must be a positive timestamp")]
    BadTimestamp(&'static str),
    #[error("unknown color `{0}`")]
    UnknownColor(String),
}

impl crate::error::ErrorCode for ValidationError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotAnObject => "E_VALIDATION_NOT_OBJECT",
            Self::Missing(_) => "E_VALIDATION_MISSING",
            Self::WrongType { .. } => "E_VALIDATION_TYPE",
            Self::NotFinite(_) => "E_VALIDATION_NOT_FINITE",
            Self::NotNonNegativeInteger(_) => "E_VALIDATION_INTEGER",
            Self::BadTimestamp(_) => "E_VALIDATION_TIMESTAMP",
            Self::UnknownColor(_) => "E_VALIDATION_COLOR",
        }
    }
}

/// Typed field access over a JSON object.
pub struct Fields<'a> {
    map: &'a Map<String, Value>,
}

impl<'a> Fields<'a> {
    /// # Errors
    ///
    /// Returns [`ValidationError::NotAnObject`] for anything but a JSON object.
    pub fn of(value: &'a Value) -> Result<Self, ValidationError> {
        value.as_object().map(|map| Self { map }).ok_or(ValidationError::NotAnObject)
    }

    fn get(&self, field: &'static str) -> Result<&'a Value, ValidationError> {
        match self.map.get(field) {
            None | Some(Value::Null) => Err(ValidationError::Missing(field)),
            Some(v) => Ok(v),
        }
    }

    /// # Errors
    ///
    /// Missing or non-string field.
    pub fn string(&self, field: &'static str) -> Result<String, ValidationError> {
        self.get(field)?
            .as_str()
            .map(str::to_string)
            .ok_or(ValidationError::WrongType { field, expected: "a string" })
    }

    /// # Errors
    ///
    /// Missing field or not a UUID string.
    pub fn uuid(&self, field: &'static str) -> Result<Uuid, ValidationError> {
        self.get(field)?
            .as_str()
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or(ValidationError::WrongType { field, expected: "a UUID" })
    }

    /// # Errors
    ///
    /// Missing, non-numeric or non-finite field.
    pub fn finite(&self, field: &'static str) -> Result<f64, ValidationError> {
        let n = self
            .get(field)?
            .as_f64()
            .ok_or(ValidationError::WrongType { field, expected: "a number" })?;
        if !n.is_finite() {
            return Err(ValidationError::NotFinite(field));
        }
        Ok(n)
    }

    /// # Errors
    ///
    /// Missing field or not a non-negative integer.
    pub fn non_negative_int(&self, field: &'static str) -> Result<u64, ValidationError> {
        let v = self.get(field)?;
        if let Some(n) = v.as_u64() {
            return Ok(n);
        }
        if v.is_number() {
            return Err(ValidationError::NotNonNegativeInteger(field));
        }
        Err(ValidationError::WrongType { field, expected: "an integer" })
    }

    /// # Errors
    ///
    /// Missing field or not a positive integer millisecond timestamp.
    pub fn timestamp(&self, field: &'static str) -> Result<i64, ValidationError> {
        match self.get(field)?.as_i64() {
            Some(ts) if ts > 0 => Ok(ts),
            _ => Err(ValidationError::BadTimestamp(field)),
        }
    }

    /// # Errors
    ///
    /// Missing field or a color outside the note palette.
    pub fn color(&self, field: &'static str) -> Result<NoteColor, ValidationError> {
        let name = self.string(field)?;
        NoteColor::parse(&name).ok_or(ValidationError::UnknownColor(name))
    }
}

/// Decode a snapshot, dropping documents that fail validation.
pub fn filter_valid<T: Document>(docs: Vec<Value>) -> Vec<T> {
    let total = docs.len();
    let valid: Vec<T> = docs
        .into_iter()
        .filter_map(|doc| match T::from_value(&doc) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                let key = doc.get(T::KEY_FIELD).and_then(Value::as_str).unwrap_or("?");
                warn!(collection = T::COLLECTION, key, error = %e, "dropping invalid document");
                None
            }
        })
        .collect();
    if valid.len() < total {
        warn!(collection = T::COLLECTION, dropped = total - valid.len(), kept = valid.len(), "snapshot contained invalid documents");
    }
    valid
}
