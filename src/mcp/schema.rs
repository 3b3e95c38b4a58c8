//! Input schema derivation from declared parameter lists.
//!
//! A member declares its parameters once, in order, with a Rust type per
//! parameter. [`introspect`] turns that list into the JSON Schema `object`
//! definition advertised in `tools/list` and `prompts/list`, and into the
//! ordered list of required parameters the binder enforces.
//!
//! # Type Table
//!
//! | Rust type | JSON Schema type |
//! |-----------|------------------|
//! | `String`, `&str`, `char` | `string` |
//! | signed/unsigned integers | `integer` |
//! | `f32`, `f64` | `number` |
//! | `bool` | `boolean` |
//! | `Vec<T>`, slices, arrays, sets | `array` |
//! | maps, `serde_json::Map` | `object` |
//! | `Option<T>` | same as `T` |
//! | anything else (`serde_json::Value`, untyped) | `string` |

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use serde_json::Value;

use crate::error::IntrospectionError;

/// A JSON Schema primitive type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonType {
    /// `"string"`; also the fallback for unrecognised types.
    String,
    /// `"number"` (floating point).
    Number,
    /// `"integer"`.
    Integer,
    /// `"boolean"`.
    Boolean,
    /// `"array"`.
    Array,
    /// `"object"`.
    Object,
}

/// Maps a Rust parameter type onto its JSON Schema type.
pub trait SchemaType {
    /// The schema type advertised for parameters of this type.
    const JSON_TYPE: JsonType;
}

macro_rules! schema_type {
    ($json:ident => $($ty:ty),+ $(,)?) => {
        $(impl SchemaType for $ty {
            const JSON_TYPE: JsonType = JsonType::$json;
        })+
    };
}

schema_type!(String => String, str, char);
schema_type!(Integer => i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);
schema_type!(Number => f32, f64);
schema_type!(Boolean => bool);
schema_type!(Object => serde_json::Map<String, Value>);
schema_type!(String => Value);

impl<T: SchemaType + ?Sized> SchemaType for &T {
    const JSON_TYPE: JsonType = T::JSON_TYPE;
}

impl<T: SchemaType + ?Sized> SchemaType for Box<T> {
    const JSON_TYPE: JsonType = T::JSON_TYPE;
}

impl<T: SchemaType> SchemaType for Option<T> {
    const JSON_TYPE: JsonType = T::JSON_TYPE;
}

impl<T> SchemaType for Vec<T> {
    const JSON_TYPE: JsonType = JsonType::Array;
}

impl<T> SchemaType for VecDeque<T> {
    const JSON_TYPE: JsonType = JsonType::Array;
}

impl<T> SchemaType for [T] {
    const JSON_TYPE: JsonType = JsonType::Array;
}

impl<T, const N: usize> SchemaType for [T; N] {
    const JSON_TYPE: JsonType = JsonType::Array;
}

impl<T, S> SchemaType for HashSet<T, S> {
    const JSON_TYPE: JsonType = JsonType::Array;
}

impl<T> SchemaType for BTreeSet<T> {
    const JSON_TYPE: JsonType = JsonType::Array;
}

impl<T, S> SchemaType for IndexSet<T, S> {
    const JSON_TYPE: JsonType = JsonType::Array;
}

impl<K, V, S> SchemaType for HashMap<K, V, S> {
    const JSON_TYPE: JsonType = JsonType::Object;
}

impl<K, V> SchemaType for BTreeMap<K, V> {
    const JSON_TYPE: JsonType = JsonType::Object;
}

impl<K, V, S> SchemaType for IndexMap<K, V, S> {
    const JSON_TYPE: JsonType = JsonType::Object;
}

/// How a declared parameter gets its value when the host omits it.
#[derive(Debug, Clone, PartialEq)]
enum ParamDefault {
    /// No default: the parameter is mandatory.
    Required,
    /// Optional, with this default.
    Value(Value),
    /// A default was declared but could not be converted to JSON.
    Invalid(String),
}

/// One declared parameter of a tool or prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    name: String,
    json_type: JsonType,
    default: ParamDefault,
}

impl Param {
    /// Declares a mandatory parameter.
    #[must_use]
    pub fn required(name: impl Into<String>, json_type: JsonType) -> Self {
        Self {
            name: name.into(),
            json_type,
            default: ParamDefault::Required,
        }
    }

    /// Declares an optional parameter with a JSON default.
    #[must_use]
    pub fn optional(name: impl Into<String>, json_type: JsonType, default: Value) -> Self {
        Self {
            name: name.into(),
            json_type,
            default: ParamDefault::Value(default),
        }
    }

    /// Declares an optional parameter whose default is any serialisable value.
    ///
    /// A default that fails to serialise is remembered and reported by
    /// [`introspect`], so the member is excluded instead of aborting
    /// registration.
    #[must_use]
    pub fn with_default<T: Serialize + ?Sized>(
        name: impl Into<String>,
        json_type: JsonType,
        default: &T,
    ) -> Self {
        let default = match serde_json::to_value(default) {
            Ok(value) => ParamDefault::Value(value),
            Err(e) => ParamDefault::Invalid(e.to_string()),
        };
        Self {
            name: name.into(),
            json_type,
            default,
        }
    }

    /// Parameter name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Advertised JSON type.
    #[must_use]
    pub const fn json_type(&self) -> JsonType {
        self.json_type
    }
}

/// Schema entry for a single parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertySchema {
    /// JSON type of the parameter.
    #[serde(rename = "type")]
    pub json_type: JsonType,

    /// Default used when the host omits the parameter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

/// JSON Schema `object` describing a member's input.
///
/// Properties correspond one-to-one with the declared parameters, in
/// declaration order; `required` lists the parameters without a default,
/// also in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputSchema {
    #[serde(rename = "type")]
    kind: &'static str,
    properties: IndexMap<String, PropertySchema>,
    required: Vec<String>,
}

impl InputSchema {
    /// Schema for a member that takes no parameters.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            kind: "object",
            properties: IndexMap::new(),
            required: Vec::new(),
        }
    }

    /// Per-parameter schema entries, in declaration order.
    #[must_use]
    pub const fn properties(&self) -> &IndexMap<String, PropertySchema> {
        &self.properties
    }

    /// Parameters without a default, in declaration order.
    #[must_use]
    pub fn required(&self) -> &[String] {
        &self.required
    }

    /// Whether `name` must be supplied by the host.
    #[must_use]
    pub fn is_required(&self, name: &str) -> bool {
        self.required.iter().any(|r| r == name)
    }
}

/// Derives the input schema for a declared parameter list.
///
/// # Errors
///
/// Returns an [`IntrospectionError`] if the list is malformed: an empty
/// parameter name, a name declared twice, or a default that could not be
/// represented as JSON.
pub fn introspect(params: &[Param]) -> Result<InputSchema, IntrospectionError> {
    let mut schema = InputSchema::empty();

    for (position, param) in params.iter().enumerate() {
        if param.name.trim().is_empty() {
            return Err(IntrospectionError::EmptyParamName { position });
        }
        if schema.properties.contains_key(&param.name) {
            return Err(IntrospectionError::DuplicateParam(param.name.clone()));
        }

        let default = match &param.default {
            ParamDefault::Required => {
                schema.required.push(param.name.clone());
                None
            }
            ParamDefault::Value(value) => Some(value.clone()),
            ParamDefault::Invalid(message) => {
                return Err(IntrospectionError::UnserialisableDefault {
                    param: param.name.clone(),
                    message: message.clone(),
                })
            }
        };

        schema.properties.insert(
            param.name.clone(),
            PropertySchema {
                json_type: param.json_type,
                default,
            },
        );
    }

    Ok(schema)
}
