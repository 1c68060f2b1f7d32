// Result envelopes returned by the record service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::infrastructure::{Cleanup, Record};

/// Field name to message
pub type FieldErrors = BTreeMap<String, String>;

/// Status of a mutating operation, serialised as the `info` string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Created,
    Updated,
    Deleted,
    NotCreated,
    InvalidData,
    /// Foreign key column whose parent row does not exist
    InvalidForeignKey(String),
    NoSuchRecord,
}

impl Outcome {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Outcome::Created => StatusCode::CREATED,
            Outcome::InvalidData | Outcome::InvalidForeignKey(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Outcome::NoSuchRecord => StatusCode::NOT_FOUND,
            Outcome::Updated | Outcome::Deleted | Outcome::NotCreated => StatusCode::OK,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Created => write!(f, "Created"),
            Outcome::Updated => write!(f, "Updated"),
            Outcome::Deleted => write!(f, "Deleted"),
            Outcome::NotCreated => write!(f, "Not created"),
            Outcome::InvalidData => write!(f, "Invalid data"),
            Outcome::InvalidForeignKey(column) => write!(f, "Invalid {}", column),
            Outcome::NoSuchRecord => write!(f, "No record with such id"),
        }
    }
}

impl Serialize for Outcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    pub info: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: FieldErrors,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub additional_fields: BTreeMap<String, FieldErrors>,
    /// Best-effort blob removals performed by a delete or a photo replacement
    #[serde(skip)]
    pub cleanup: Vec<Cleanup>,
}

impl Envelope {
    fn with_info(info: Outcome) -> Self {
        Self {
            info,
            id: None,
            errors: FieldErrors::new(),
            additional_fields: BTreeMap::new(),
            cleanup: Vec::new(),
        }
    }

    pub fn created(id: i64) -> Self {
        Self {
            id: Some(id),
            ..Self::with_info(Outcome::Created)
        }
    }

    pub fn updated(cleanup: Vec<Cleanup>) -> Self {
        Self {
            cleanup,
            ..Self::with_info(Outcome::Updated)
        }
    }

    pub fn deleted(cleanup: Vec<Cleanup>) -> Self {
        Self {
            cleanup,
            ..Self::with_info(Outcome::Deleted)
        }
    }

    pub fn not_created() -> Self {
        Self::with_info(Outcome::NotCreated)
    }

    pub fn invalid(errors: FieldErrors, additional_fields: BTreeMap<String, FieldErrors>) -> Self {
        Self {
            errors,
            additional_fields,
            ..Self::with_info(Outcome::InvalidData)
        }
    }

    pub fn invalid_foreign_key(column: &str) -> Self {
        Self::with_info(Outcome::InvalidForeignKey(column.to_string()))
    }

    pub fn no_such_record() -> Self {
        Self::with_info(Outcome::NoSuchRecord)
    }
}

impl IntoResponse for Envelope {
    fn into_response(self) -> Response {
        (self.info.status_code(), Json(self)).into_response()
    }
}

/// Rows returned by a read, keyed by the singular or plural record name
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    One { key: String, record: Option<Record> },
    Many { key: String, records: Vec<Record> },
}

impl Selection {
    pub fn records(&self) -> Vec<&Record> {
        match self {
            Selection::One { record, .. } => record.iter().collect(),
            Selection::Many { records, .. } => records.iter().collect(),
        }
    }

    pub fn into_json(self) -> Value {
        let mut body = serde_json::Map::new();
        match self {
            Selection::One { key, record } => {
                body.insert(key, record.map(Value::Object).unwrap_or(Value::Null));
            }
            Selection::Many { key, records } => {
                body.insert(key, Value::Array(records.into_iter().map(Value::Object).collect()));
            }
        }
        Value::Object(body)
    }
}

impl IntoResponse for Selection {
    fn into_response(self) -> Response {
        Json(self.into_json()).into_response()
    }
}
