//! Conversion between wire JSON and typed records.
//!
//! # Design
//! Every record type implements `ApiRecord`, and the marshaller works only
//! against that trait. Listings arrive as `{"objects": [...]}` and convert
//! all-or-nothing: one bad element discards the whole batch, so a caller
//! never renders a silently shortened list.
//!
//! `Fields` is the extraction helper the record constructors use. Required
//! accessors fail with `DataConversionFailed` when a key is missing, `null`
//! or of the wrong shape. Optional accessors treat missing and `null` as
//! absent but still reject a present value of the wrong shape.

use chrono::{NaiveDate, NaiveDateTime};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

use crate::envelope::ResponseEnvelope;
use crate::error::ApiError;
use crate::resource::ResourcePath;

const OBJECTS_KEY: &str = "objects";

/// A domain record that can be built from, and rendered to, a JSON object.
pub trait ApiRecord: Sized {
    /// Name used in conversion errors.
    const KIND: &'static str;

    /// Collection path relative to the API root, e.g. `employees/`.
    const COLLECTION: &'static str;

    /// Keys that must be present and non-null for construction to succeed.
    const REQUIRED_KEYS: &'static [&'static str];

    fn from_json(object: &Map<String, Value>) -> Result<Self, ApiError>;

    /// Canonical dictionary form used as a request body. Nested references
    /// are rendered as resource path strings.
    fn to_json(&self) -> Map<String, Value>;

    fn resource_uri(&self) -> &ResourcePath;

    fn id(&self) -> Option<u64> {
        self.resource_uri().id()
    }

    /// Build a record from a flat JSON object held in raw bytes.
    fn from_bytes(bytes: &[u8]) -> Result<Self, ApiError> {
        match serde_json::from_slice(bytes) {
            Ok(Value::Object(object)) => Self::from_json(&object),
            _ => Err(ApiError::DataNotValidJson),
        }
    }
}

/// Convert a `{"objects": [...]}` listing into records.
pub fn marshal_list<T: ApiRecord>(envelope: &ResponseEnvelope) -> Result<Vec<T>, ApiError> {
    let body = response_body(envelope)?;
    let listing: Value = serde_json::from_slice(body).map_err(|_| ApiError::DataNotValidJson)?;
    let objects = listing
        .get(OBJECTS_KEY)
        .and_then(Value::as_array)
        .ok_or(ApiError::DataNotValidJson)?;

    objects
        .iter()
        .enumerate()
        .map(|(index, element)| {
            let object = element.as_object().ok_or_else(|| {
                ApiError::DataConversionFailed(format!("{}: element {index} is not an object", T::KIND))
            })?;
            T::from_json(object).inspect_err(|e| {
                debug!(kind = T::KIND, index, error = %e, "listing conversion aborted");
            })
        })
        .collect()
}

/// Convert a single flat JSON object response into a record.
pub fn marshal_one<T: ApiRecord>(envelope: &ResponseEnvelope) -> Result<T, ApiError> {
    T::from_bytes(response_body(envelope)?)
}

fn response_body(envelope: &ResponseEnvelope) -> Result<&[u8], ApiError> {
    envelope.head().ok_or(ApiError::NoResponseFromServer)?;
    let body = envelope.body().ok_or(ApiError::NoDataRetrievedFromServer)?;
    Ok(body.as_ref())
}

/// Typed accessors over one JSON object.
#[derive(Debug, Clone, Copy)]
pub struct Fields<'a> {
    kind: &'static str,
    object: &'a Map<String, Value>,
}

impl<'a> Fields<'a> {
    pub fn new(kind: &'static str, object: &'a Map<String, Value>) -> Self {
        Self { kind, object }
    }

    /// Fail unless every key in `keys` is present and non-null.
    pub fn require(&self, keys: &[&str]) -> Result<(), ApiError> {
        match keys.iter().find(|key| self.value(key).is_none()) {
            Some(key) => Err(self.missing(key)),
            None => Ok(()),
        }
    }

    fn value(&self, key: &str) -> Option<&'a Value> {
        self.object.get(key).filter(|value| !value.is_null())
    }

    fn missing(&self, key: &str) -> ApiError {
        ApiError::conversion(self.kind, key)
    }

    fn required<T>(&self, key: &str, extract: impl FnOnce(&'a Value) -> Option<T>) -> Result<T, ApiError> {
        self.value(key).and_then(extract).ok_or_else(|| self.missing(key))
    }

    fn optional<T>(
        &self,
        key: &str,
        extract: impl FnOnce(&'a Value) -> Option<T>,
    ) -> Result<Option<T>, ApiError> {
        match self.value(key) {
            None => Ok(None),
            Some(value) => extract(value).map(Some).ok_or_else(|| self.missing(key)),
        }
    }

    pub fn string(&self, key: &str) -> Result<String, ApiError> {
        self.required(key, |v| v.as_str().map(str::to_string))
    }

    pub fn opt_string(&self, key: &str) -> Result<Option<String>, ApiError> {
        self.optional(key, |v| v.as_str().map(str::to_string))
    }

    pub fn bool(&self, key: &str) -> Result<bool, ApiError> {
        self.required(key, Value::as_bool)
    }

    pub fn path(&self, key: &str) -> Result<ResourcePath, ApiError> {
        self.required(key, |v| v.as_str().and_then(ResourcePath::parse))
    }

    pub fn opt_path(&self, key: &str) -> Result<Option<ResourcePath>, ApiError> {
        self.optional(key, |v| v.as_str().and_then(ResourcePath::parse))
    }

    /// A required array of resource paths. May be empty.
    pub fn paths(&self, key: &str) -> Result<Vec<ResourcePath>, ApiError> {
        self.required(key, parse_paths)
    }

    /// An optional array of resource paths; missing means empty.
    pub fn opt_paths(&self, key: &str) -> Result<Vec<ResourcePath>, ApiError> {
        Ok(self.optional(key, parse_paths)?.unwrap_or_default())
    }

    /// A required nested object, viewed through the same kind name.
    pub fn object(&self, key: &str) -> Result<Fields<'a>, ApiError> {
        let kind = self.kind;
        self.required(key, |v| v.as_object().map(|object| Fields::new(kind, object)))
    }

    /// An optional array; missing means empty.
    pub fn opt_array(&self, key: &str) -> Result<&'a [Value], ApiError> {
        Ok(self
            .optional(key, |v| v.as_array().map(Vec::as_slice))?
            .unwrap_or_default())
    }

    /// A required value decoded through serde, e.g. an enum.
    pub fn decode<T: DeserializeOwned>(&self, key: &str) -> Result<T, ApiError> {
        self.required(key, |v| serde_json::from_value(v.clone()).ok())
    }

    pub fn date(&self, key: &str, format: &str) -> Result<NaiveDate, ApiError> {
        self.required(key, |v| v.as_str().and_then(|s| NaiveDate::parse_from_str(s, format).ok()))
    }

    pub fn opt_date(&self, key: &str, format: &str) -> Result<Option<NaiveDate>, ApiError> {
        self.optional(key, |v| v.as_str().and_then(|s| NaiveDate::parse_from_str(s, format).ok()))
    }

    pub fn datetime(&self, key: &str, format: &str) -> Result<NaiveDateTime, ApiError> {
        self.required(key, |v| {
            v.as_str()
                .and_then(|s| NaiveDateTime::parse_from_str(s, format).ok())
        })
    }
}

fn parse_paths(value: &Value) -> Option<Vec<ResourcePath>> {
    value
        .as_array()?
        .iter()
        .map(|item| item.as_str().and_then(ResourcePath::parse))
        .collect()
}

/// Render paths as a JSON array of strings.
pub fn paths_to_json(paths: &[ResourcePath]) -> Value {
    Value::Array(paths.iter().map(|p| Value::from(p.as_str())).collect())
}
