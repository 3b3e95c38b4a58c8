//! Binding of incoming `arguments` objects to a member's declared parameters.
//!
//! The binder checks presence and shape only. Values are handed over as
//! JSON; a value of the wrong type is reported by the handler when it
//! extracts the argument (see [`Arguments::get`]).

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{BindError, CallError};
use crate::mcp::schema::InputSchema;

/// Arguments bound to a member's parameter list.
///
/// Holds exactly the declared parameters: host-supplied values where given,
/// declared defaults otherwise.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    values: Map<String, Value>,
}

impl Arguments {
    /// Converts a bound argument to the type the handler expects.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::Undeclared`] if `name` is not a declared
    /// parameter, or [`CallError::ArgumentType`] if the value does not
    /// deserialise into `T`.
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<T, CallError> {
        let value = self
            .values
            .get(name)
            .ok_or_else(|| CallError::Undeclared(name.to_string()))?;

        T::deserialize(value).map_err(|source| CallError::ArgumentType {
            name: name.to_string(),
            source,
        })
    }

    /// Raw JSON value of a bound argument.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Number of bound arguments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the member takes no arguments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<Map<String, Value>> for Arguments {
    fn from(values: Map<String, Value>) -> Self {
        Self { values }
    }
}

/// Human-readable JSON type name, for error messages.
const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Binds `arguments` against `schema`.
///
/// Absent (or `null`) arguments count as an empty object. Keys that are not
/// declared parameters are dropped.
///
/// # Errors
///
/// - [`BindError::NotAnObject`] if `arguments` is neither absent nor an object
/// - [`BindError::MissingArgument`] for the first required parameter (in
///   declaration order) that was not supplied
pub fn bind(schema: &InputSchema, arguments: Option<&Value>) -> Result<Arguments, BindError> {
    let empty = Map::new();
    let supplied = match arguments {
        None | Some(Value::Null) => &empty,
        Some(Value::Object(map)) => map,
        Some(other) => return Err(BindError::NotAnObject(json_kind(other))),
    };

    let mut values = Map::new();
    for (name, property) in schema.properties() {
        if let Some(value) = supplied.get(name) {
            values.insert(name.clone(), value.clone());
        } else if let Some(default) = &property.default {
            values.insert(name.clone(), default.clone());
        } else {
            return Err(BindError::MissingArgument(name.clone()));
        }
    }

    Ok(Arguments { values })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::schema::{introspect, JsonType, Param};
    use serde_json::json;

    fn review_schema() -> InputSchema {
        introspect(&[
            Param::required("filename", JsonType::String),
            Param::with_default("issues", JsonType::Integer, &0),
        ])
        .unwrap()
    }

    #[test]
    fn binds_supplied_and_default_values() {
        let args = bind(&review_schema(), Some(&json!({"filename": "foo.rs"}))).unwrap();
        assert_eq!(args.len(), 2);
        assert_eq!(args.get::<String>("filename").unwrap(), "foo.rs");
        assert_eq!(args.get::<i64>("issues").unwrap(), 0);
    }

    #[test]
    fn missing_required_argument() {
        let err = bind(&review_schema(), Some(&json!({"issues": 3}))).unwrap_err();
        assert_eq!(err, BindError::MissingArgument("filename".into()));
    }

    #[test]
    fn absent_arguments_are_empty() {
        let err = bind(&review_schema(), None).unwrap_err();
        assert_eq!(err, BindError::MissingArgument("filename".into()));

        let args = bind(&InputSchema::empty(), Some(&Value::Null)).unwrap();
        assert!(args.is_empty());
    }

    #[test]
    fn extra_keys_are_ignored() {
        let args = bind(
            &review_schema(),
            Some(&json!({"filename": "a", "issues": 1, "_meta": {"progressToken": 1}})),
        )
        .unwrap();
        assert_eq!(args.len(), 2);
        assert!(args.value("_meta").is_none());
    }

    #[test]
    fn non_object_arguments_rejected() {
        let err = bind(&review_schema(), Some(&json!(["foo.rs"]))).unwrap_err();
        assert_eq!(err, BindError::NotAnObject("array"));
    }

    #[test]
    fn type_mismatch_surfaces_on_extraction() {
        let args = bind(&review_schema(), Some(&json!({"filename": 42}))).unwrap();
        let err = args.get::<String>("filename").unwrap_err();
        assert!(matches!(err, CallError::ArgumentType { ref name, .. } if name == "filename"));
    }

    #[test]
    fn undeclared_extraction_fails() {
        let args = bind(&review_schema(), Some(&json!({"filename": "a"}))).unwrap();
        assert!(matches!(
            args.get::<String>("other"),
            Err(CallError::Undeclared(ref n)) if n == "other"
        ));
    }
}
