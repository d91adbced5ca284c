//! Schema catalog for the raw input corpora.
//!
//! Each raw record type declares a static manifest of its fields. Decoding
//! checks every JSON record against that manifest before it is turned into a
//! typed struct, so a record that does not fit fails the run with the file,
//! the record position and the offending field.
//!
//! Coercion rules:
//! - `String` accepts strings, numbers and booleans (the latter two are
//!   stringified, the way the log corpus stores numeric user ids).
//! - `Int` and `Long` accept integral numbers within range.
//! - `Float` accepts any number.
//! - `EpochMillis` accepts an integral millisecond timestamp that maps to a
//!   representable instant.
//! - `null` or an absent field is accepted only for nullable fields.
//!
//! Fields that are not in the manifest are ignored.

mod log;
mod song;

pub use log::LogEventRecord;
pub use song::SongMetadataRecord;

use chrono::DateTime;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use snafu::prelude::*;
use std::fmt;

use crate::error::{MalformedJsonSnafu, SchemaError, SchemaMismatchSnafu};

/// Logical type of a manifest field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Int,
    Long,
    Float,
    EpochMillis,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::String => "string",
            FieldType::Int => "int",
            FieldType::Long => "long",
            FieldType::Float => "float",
            FieldType::EpochMillis => "epoch milliseconds",
        };
        f.write_str(name)
    }
}

/// One entry of a record manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub field_type: FieldType,
    pub nullable: bool,
}

impl FieldSpec {
    pub const fn required(name: &'static str, field_type: FieldType) -> Self {
        Self {
            name,
            field_type,
            nullable: false,
        }
    }

    pub const fn nullable(name: &'static str, field_type: FieldType) -> Self {
        Self {
            name,
            field_type,
            nullable: true,
        }
    }
}

/// Which raw corpus a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    SongMetadata,
    LogEvent,
}

impl RecordKind {
    /// Metric label for this corpus.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::SongMetadata => "song",
            RecordKind::LogEvent => "log",
        }
    }
}

/// Why a field failed validation.
#[derive(Debug, Clone, PartialEq)]
pub enum MismatchReason {
    /// The record is not a JSON object.
    NotAnObject { found: &'static str },
    /// A required field is absent or null.
    MissingRequired,
    /// The value has an incompatible JSON type.
    WrongType {
        expected: FieldType,
        found: &'static str,
    },
    /// The value has the right JSON type but does not fit the field.
    OutOfRange { expected: FieldType, value: String },
    /// The conformed record could not be deserialized.
    Incompatible { message: String },
}

impl fmt::Display for MismatchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MismatchReason::NotAnObject { found } => {
                write!(f, "expected a JSON object, found {found}")
            }
            MismatchReason::MissingRequired => f.write_str("is required but missing or null"),
            MismatchReason::WrongType { expected, found } => {
                write!(f, "expected {expected}, found {found}")
            }
            MismatchReason::OutOfRange { expected, value } => {
                write!(f, "value {value} does not fit {expected}")
            }
            MismatchReason::Incompatible { message } => f.write_str(message),
        }
    }
}

/// A raw input record with a static field manifest.
pub trait RawRecord: DeserializeOwned + Send + Sync + Sized {
    const KIND: RecordKind;
    const MANIFEST: &'static [FieldSpec];
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Check one value against a field, returning the coerced value.
fn coerce(spec: &FieldSpec, value: Value) -> Result<Value, MismatchReason> {
    let wrong_type = |value: &Value| MismatchReason::WrongType {
        expected: spec.field_type,
        found: json_type_name(value),
    };

    if value.is_null() {
        return if spec.nullable {
            Ok(Value::Null)
        } else {
            Err(MismatchReason::MissingRequired)
        };
    }

    match spec.field_type {
        FieldType::String => match value {
            Value::String(_) => Ok(value),
            Value::Number(n) => Ok(Value::String(n.to_string())),
            Value::Bool(b) => Ok(Value::String(b.to_string())),
            other => Err(wrong_type(&other)),
        },
        FieldType::Int => match &value {
            Value::Number(n) => match n.as_i64() {
                Some(v) if i32::try_from(v).is_ok() => Ok(value),
                _ => Err(MismatchReason::OutOfRange {
                    expected: spec.field_type,
                    value: n.to_string(),
                }),
            },
            other => Err(wrong_type(other)),
        },
        FieldType::Long => match &value {
            Value::Number(n) if n.is_i64() => Ok(value),
            Value::Number(n) => Err(MismatchReason::OutOfRange {
                expected: spec.field_type,
                value: n.to_string(),
            }),
            other => Err(wrong_type(other)),
        },
        FieldType::Float => match &value {
            Value::Number(_) => Ok(value),
            other => Err(wrong_type(other)),
        },
        FieldType::EpochMillis => match &value {
            Value::Number(n) => match n.as_i64() {
                Some(ms) if DateTime::from_timestamp_millis(ms).is_some() => Ok(value),
                _ => Err(MismatchReason::OutOfRange {
                    expected: spec.field_type,
                    value: n.to_string(),
                }),
            },
            other => Err(wrong_type(other)),
        },
    }
}

/// Validate a JSON value against a manifest and keep only manifest fields.
///
/// On failure returns the offending field name and reason.
pub fn conform(
    manifest: &[FieldSpec],
    value: Value,
) -> Result<Map<String, Value>, (String, MismatchReason)> {
    let mut object = match value {
        Value::Object(object) => object,
        other => {
            return Err((
                "<record>".to_string(),
                MismatchReason::NotAnObject {
                    found: json_type_name(&other),
                },
            ));
        }
    };

    let mut conformed = Map::with_capacity(manifest.len());
    for spec in manifest {
        let raw = object.remove(spec.name).unwrap_or(Value::Null);
        let value = coerce(spec, raw).map_err(|reason| (spec.name.to_string(), reason))?;
        conformed.insert(spec.name.to_string(), value);
    }
    Ok(conformed)
}

/// Decode a single JSON value into a typed record.
pub fn decode_value<R: RawRecord>(value: Value) -> Result<R, (String, MismatchReason)> {
    let conformed = conform(R::MANIFEST, value)?;
    serde_json::from_value(Value::Object(conformed)).map_err(|e| {
        (
            "<record>".to_string(),
            MismatchReason::Incompatible {
                message: e.to_string(),
            },
        )
    })
}

/// Decode every record in a file.
///
/// Accepts one JSON object per file as well as newline-delimited JSON.
/// Records are numbered from one in file order.
pub fn decode_file<R: RawRecord>(path: &str, data: &[u8]) -> Result<Vec<R>, SchemaError> {
    let stream = serde_json::Deserializer::from_slice(data).into_iter::<Value>();

    let mut records = Vec::new();
    for (index, value) in stream.enumerate() {
        let record = index + 1;
        let value = value.context(MalformedJsonSnafu { path, record })?;
        let decoded = decode_value::<R>(value).map_err(|(field, reason)| {
            SchemaMismatchSnafu {
                path,
                record,
                field,
                reason,
            }
            .build()
        })?;
        records.push(decoded);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const MANIFEST: &[FieldSpec] = &[
        FieldSpec::required("id", FieldType::String),
        FieldSpec::required("count", FieldType::Int),
        FieldSpec::nullable("score", FieldType::Float),
        FieldSpec::required("ts", FieldType::EpochMillis),
    ];

    #[test]
    fn test_conform_coerces_numbers_to_strings() {
        let map = conform(MANIFEST, json!({"id": 42, "count": 1, "ts": 0})).unwrap();
        assert_eq!(map["id"], json!("42"));
        assert_eq!(map["score"], Value::Null);
    }

    #[test]
    fn test_conform_drops_unknown_fields() {
        let map = conform(
            MANIFEST,
            json!({"id": "a", "count": 1, "ts": 0, "extra": [1, 2]}),
        )
        .unwrap();
        assert!(!map.contains_key("extra"));
        assert_eq!(map.len(), 4);
    }

    #[test]
    fn test_conform_rejects_missing_required() {
        let (field, reason) = conform(MANIFEST, json!({"id": "a", "ts": 0})).unwrap_err();
        assert_eq!(field, "count");
        assert_eq!(reason, MismatchReason::MissingRequired);
    }

    #[test]
    fn test_conform_rejects_fractional_int() {
        let (field, reason) =
            conform(MANIFEST, json!({"id": "a", "count": 1.5, "ts": 0})).unwrap_err();
        assert_eq!(field, "count");
        assert!(matches!(reason, MismatchReason::OutOfRange { .. }));
    }

    #[test]
    fn test_conform_rejects_string_for_float() {
        let (field, reason) = conform(
            MANIFEST,
            json!({"id": "a", "count": 1, "score": "high", "ts": 0}),
        )
        .unwrap_err();
        assert_eq!(field, "score");
        assert_eq!(
            reason,
            MismatchReason::WrongType {
                expected: FieldType::Float,
                found: "string"
            }
        );
    }

    #[test]
    fn test_conform_rejects_unrepresentable_timestamp() {
        let (field, _) =
            conform(MANIFEST, json!({"id": "a", "count": 1, "ts": i64::MAX})).unwrap_err();
        assert_eq!(field, "ts");
    }

    #[test]
    fn test_conform_rejects_non_object() {
        let (field, reason) = conform(MANIFEST, json!([1, 2])).unwrap_err();
        assert_eq!(field, "<record>");
        assert_eq!(reason, MismatchReason::NotAnObject { found: "array" });
    }

    #[test]
    fn test_mismatch_reason_display() {
        let reason = MismatchReason::WrongType {
            expected: FieldType::Int,
            found: "string",
        };
        assert_eq!(reason.to_string(), "expected int, found string");
    }
}
