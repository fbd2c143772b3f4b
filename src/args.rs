//! Argument coercion and required-parameter validation
//!
//! Raw MCP arguments are untyped JSON. They are coerced once, against the
//! tool's declared parameter types, before any script is built.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::errors::{AppError, AppResult};
use crate::models::{ParamType, ToolDescriptor};

/// A parameter value after coercion to its declared type
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Text(String),
    Integer(i64),
    Boolean(bool),
    TextList(Vec<String>),
    ObjectList(Vec<Map<String, Value>>),
    Object(Map<String, Value>),
}

impl ParamType {
    /// Coerce a raw JSON value to this type, or `None` if incompatible
    pub fn coerce(self, value: &Value) -> Option<ArgValue> {
        match self {
            Self::String => coerce_string(value).map(ArgValue::Text),
            Self::Integer => coerce_integer(value).map(ArgValue::Integer),
            Self::Boolean => coerce_bool(value).map(ArgValue::Boolean),
            Self::StringArray => coerce_string_list(value).map(ArgValue::TextList),
            Self::ObjectArray => coerce_object_list(value).map(ArgValue::ObjectList),
            Self::Object => value.as_object().cloned().map(ArgValue::Object),
        }
    }
}

pub fn coerce_string(value: &Value) -> Option<String> {
    value.as_str().map(str::to_owned)
}

/// Integers, or strings holding a decimal integer
pub fn coerce_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse::<i64>().ok(),
        _ => None,
    }
}

/// Booleans, or the strings `"true"` / `"false"`
pub fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) if s == "true" => Some(true),
        Value::String(s) if s == "false" => Some(false),
        _ => None,
    }
}

/// Arrays, keeping only their string elements
pub fn coerce_string_list(value: &Value) -> Option<Vec<String>> {
    value
        .as_array()
        .map(|items| items.iter().filter_map(coerce_string).collect())
}

/// Arrays, keeping only their object elements
pub fn coerce_object_list(value: &Value) -> Option<Vec<Map<String, Value>>> {
    value
        .as_array()
        .map(|items| items.iter().filter_map(|v| v.as_object().cloned()).collect())
}

/// Validated arguments for one tool call
///
/// Holds only declared parameters that were present and coercible. Optional
/// parameters that failed coercion are absent.
#[derive(Debug, Default)]
pub struct ToolArgs {
    values: BTreeMap<&'static str, ArgValue>,
}

impl ToolArgs {
    /// Coerce `arguments` against `descriptor`
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` naming the tool's required parameters if any
    /// of them is missing or has an incompatible type.
    pub fn validate(descriptor: &ToolDescriptor, arguments: &Map<String, Value>) -> AppResult<Self> {
        let mut values = BTreeMap::new();
        let mut valid = true;
        for param in descriptor.params {
            match arguments.get(param.name).and_then(|raw| param.kind.coerce(raw)) {
                Some(value) => {
                    values.insert(param.name, value);
                }
                None if param.required => valid = false,
                None => {}
            }
        }

        if valid {
            Ok(Self { values })
        } else {
            Err(AppError::InvalidParameter(required_message(
                &descriptor.required_names(),
            )))
        }
    }

    pub fn text(&self, name: &str) -> AppResult<String> {
        self.opt_text(name).ok_or_else(|| missing(name))
    }

    pub fn opt_text(&self, name: &str) -> Option<String> {
        match self.values.get(name) {
            Some(ArgValue::Text(s)) => Some(s.clone()),
            _ => None,
        }
    }

    pub fn integer(&self, name: &str) -> AppResult<i64> {
        self.opt_integer(name).ok_or_else(|| missing(name))
    }

    pub fn opt_integer(&self, name: &str) -> Option<i64> {
        match self.values.get(name) {
            Some(ArgValue::Integer(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn boolean(&self, name: &str) -> AppResult<bool> {
        self.opt_boolean(name).ok_or_else(|| missing(name))
    }

    pub fn opt_boolean(&self, name: &str) -> Option<bool> {
        match self.values.get(name) {
            Some(ArgValue::Boolean(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn text_list(&self, name: &str) -> AppResult<Vec<String>> {
        self.opt_text_list(name).ok_or_else(|| missing(name))
    }

    pub fn opt_text_list(&self, name: &str) -> Option<Vec<String>> {
        match self.values.get(name) {
            Some(ArgValue::TextList(items)) => Some(items.clone()),
            _ => None,
        }
    }

    /// Object list, empty when absent
    pub fn object_list(&self, name: &str) -> Vec<Map<String, Value>> {
        match self.values.get(name) {
            Some(ArgValue::ObjectList(items)) => items.clone(),
            _ => Vec::new(),
        }
    }

    pub fn opt_object(&self, name: &str) -> Option<Map<String, Value>> {
        match self.values.get(name) {
            Some(ArgValue::Object(map)) => Some(map.clone()),
            _ => None,
        }
    }
}

fn missing(name: &str) -> AppError {
    AppError::InvalidParameter(format!("{name} is required"))
}

/// `"a is required"`, `"a and b are required"`, `"a, b, and c are required"`
fn required_message(names: &[&str]) -> String {
    match names {
        [] => "invalid arguments".to_owned(),
        [only] => format!("{only} is required"),
        [first, second] => format!("{first} and {second} are required"),
        [init @ .., last] => format!("{}, and {last} are required", init.join(", ")),
    }
}
