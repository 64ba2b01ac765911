//! Group- and version-aware JSON serialization.
//!
//! Entities describe their wire fields through [`Exposed`]. Each field names
//! the groups it belongs to and, optionally, the first API version that
//! carries it. A [`SerializationContext`] picks the groups and the requested
//! version for one response.

use anyhow::Context;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use bookshelf_http::{versioning::ApiVersion, AppError};

/// Value of a single exposed field.
pub enum FieldValue<'a> {
    Value(Value),
    /// A related entity rendered with the same context, or `null`.
    Nested(Option<&'a dyn Exposed>),
}

/// One wire field of an entity.
pub struct Field<'a> {
    pub name: &'static str,
    pub groups: &'static [&'static str],
    pub since: Option<&'static str>,
    pub value: FieldValue<'a>,
}

impl<'a> Field<'a> {
    pub fn new(name: &'static str, groups: &'static [&'static str], value: impl Into<Value>) -> Self {
        Self {
            name,
            groups,
            since: None,
            value: FieldValue::Value(value.into()),
        }
    }

    pub fn nested(
        name: &'static str,
        groups: &'static [&'static str],
        value: Option<&'a dyn Exposed>,
    ) -> Self {
        Self {
            name,
            groups,
            since: None,
            value: FieldValue::Nested(value),
        }
    }

    /// Only emit this field from `version` onwards.
    pub fn since(mut self, version: &'static str) -> Self {
        self.since = Some(version);
        self
    }
}

/// Entities that can be rendered through the versioned serializer.
pub trait Exposed {
    fn fields(&self) -> Vec<Field<'_>>;
}

/// Per-request selection of groups and version.
#[derive(Debug, Clone)]
pub struct SerializationContext {
    groups: Vec<&'static str>,
    version: Option<ApiVersion>,
}

impl SerializationContext {
    pub fn with_groups(groups: &[&'static str]) -> Self {
        Self {
            groups: groups.to_vec(),
            version: None,
        }
    }

    pub fn version(mut self, version: Option<ApiVersion>) -> Self {
        self.version = version;
        self
    }

    fn includes(&self, field: &Field<'_>) -> anyhow::Result<bool> {
        if !field.groups.iter().any(|group| self.groups.contains(group)) {
            return Ok(false);
        }

        let Some(since) = field.since else {
            return Ok(true);
        };
        let since: ApiVersion = since
            .parse()
            .with_context(|| format!("field '{}' declares an invalid version", field.name))?;

        Ok(self
            .version
            .as_ref()
            .is_some_and(|requested| *requested >= since))
    }

    fn to_value(&self, entity: &dyn Exposed) -> anyhow::Result<Value> {
        let mut object = Map::new();
        for field in entity.fields() {
            if !self.includes(&field)? {
                continue;
            }
            let value = match field.value {
                FieldValue::Value(value) => value,
                FieldValue::Nested(Some(nested)) => self.to_value(nested)?,
                FieldValue::Nested(None) => Value::Null,
            };
            object.insert(field.name.to_string(), value);
        }
        Ok(Value::Object(object))
    }
}

/// Serialize one entity to JSON bytes.
pub fn serialize<T: Exposed>(entity: &T, context: &SerializationContext) -> anyhow::Result<Bytes> {
    let value = context.to_value(entity)?;
    Ok(Bytes::from(serde_json::to_vec(&value)?))
}

/// Serialize a list of entities to a JSON array.
pub fn serialize_all<T: Exposed>(
    entities: &[T],
    context: &SerializationContext,
) -> anyhow::Result<Bytes> {
    let values = entities
        .iter()
        .map(|entity| context.to_value(entity))
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(Bytes::from(serde_json::to_vec(&values)?))
}

/// Parse a JSON request body, reporting malformed input as a bad request.
pub fn deserialize<T: DeserializeOwned>(body: &[u8]) -> Result<T, AppError> {
    serde_json::from_slice(body)
        .map_err(|err| AppError::bad_request(format!("invalid JSON body: {err}")))
}
