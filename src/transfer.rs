//! Progress export and import.
//!
//! The export document is the persisted progress blob plus `exportedAt`.
//! Import is all-or-nothing on hard failures (invalid JSON, not an object);
//! otherwise each field is read permissively, defaulting when malformed.

use serde_json::Value;

use crate::domain::ProgressRecord;
use crate::error::ImportError;
use crate::store::{migrate, record_from_value, record_to_value};

pub fn export(record: &ProgressRecord, exported_at: &str) -> Value {
  let mut doc = record_to_value(record);
  if let Value::Object(obj) = &mut doc {
    obj.insert("exportedAt".into(), Value::String(exported_at.to_string()));
  }
  doc
}

pub fn import(raw: &str) -> Result<ProgressRecord, ImportError> {
  let value: Value = serde_json::from_str(raw)?;
  if !value.is_object() {
    return Err(ImportError::NotAnObject);
  }
  Ok(record_from_value(&migrate(value)))
}
