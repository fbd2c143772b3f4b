//! Tool descriptors, operation results and the response envelope
//!
//! Descriptors are `'static` data declared in [`crate::catalog`]; results and
//! envelopes are created per call and discarded after the response is sent.

use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::args::{coerce_bool, coerce_string};
use crate::errors::{AppError, AppResult};

/// Declared type of a tool parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    /// JSON string
    String,
    /// Integer; decimal strings are accepted
    Integer,
    /// Boolean; `"true"` / `"false"` strings are accepted
    Boolean,
    /// Array of strings; other elements are dropped
    StringArray,
    /// Array of objects; other elements are dropped
    ObjectArray,
    /// JSON object
    Object,
}

impl ParamType {
    /// JSON Schema fragment advertised for this type
    pub fn json_schema(self) -> Map<String, Value> {
        let schema = match self {
            Self::String => json!({ "type": "string" }),
            Self::Integer => json!({ "type": "integer" }),
            Self::Boolean => json!({ "type": "boolean" }),
            Self::StringArray => json!({ "type": "array", "items": { "type": "string" } }),
            Self::ObjectArray => json!({ "type": "array", "items": { "type": "object" } }),
            Self::Object => json!({ "type": "object" }),
        };
        match schema {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }
}

/// One declared tool parameter
#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamType,
    pub required: bool,
    pub description: &'static str,
}

impl ParamSpec {
    pub const fn required(name: &'static str, kind: ParamType, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: true,
            description,
        }
    }

    pub const fn optional(name: &'static str, kind: ParamType, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: false,
            description,
        }
    }
}

/// Catalog entry describing one tool
#[derive(Debug)]
pub struct ToolDescriptor {
    /// Unique tool name
    pub name: &'static str,
    /// Human-readable description shown to MCP clients
    pub description: &'static str,
    /// Parameters in declaration order
    pub params: &'static [ParamSpec],
}

impl ToolDescriptor {
    /// Names of required parameters, in declaration order
    pub fn required_names(&self) -> Vec<&'static str> {
        self.params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name)
            .collect()
    }

    /// JSON Schema for the tool input
    ///
    /// `required` is omitted when the tool has no required parameters.
    pub fn input_schema(&self) -> Map<String, Value> {
        let mut properties = Map::new();
        for param in self.params {
            let mut schema = param.kind.json_schema();
            schema.insert(
                "description".to_owned(),
                Value::String(param.description.to_owned()),
            );
            properties.insert(param.name.to_owned(), Value::Object(schema));
        }

        let mut schema = Map::new();
        schema.insert("type".to_owned(), Value::String("object".to_owned()));
        schema.insert("properties".to_owned(), Value::Object(properties));
        let required = self.required_names();
        if !required.is_empty() {
            schema.insert("required".to_owned(), json!(required));
        }
        schema
    }
}

/// Result of one bridge operation
#[derive(Debug, Clone, PartialEq)]
pub enum OperationResult {
    /// Plain text or confirmation message, passed through verbatim
    Text(String),
    /// Ordered sequence, usually of records
    List(Vec<Value>),
    /// Single record
    Object(Map<String, Value>),
}

impl OperationResult {
    /// Build a list result from records
    pub fn records(records: Vec<Map<String, Value>>) -> Self {
        Self::List(records.into_iter().map(Value::Object).collect())
    }

    /// Serialize for the response envelope
    ///
    /// Structured results are pretty-printed with object keys in lexical
    /// order; callers diff this output.
    pub fn render(self) -> AppResult<String> {
        let value = match self {
            Self::Text(text) => return Ok(text),
            Self::List(items) => Value::Array(items),
            Self::Object(map) => Value::Object(map),
        };
        serde_json::to_string_pretty(&sort_keys(value))
            .map_err(|e| AppError::Internal(format!("serialization failure: {e}")))
    }
}

/// Rebuild objects with lexically ordered keys, recursively
///
/// `serde_json::Map` only sorts while `preserve_order` is off, and any
/// dependency can turn that feature on.
fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, sort_keys(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

/// Response returned for every tool call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseEnvelope {
    pub content: String,
    #[serde(rename = "isError")]
    pub is_error: bool,
}

impl ResponseEnvelope {
    pub fn success(content: String) -> Self {
        Self {
            content,
            is_error: false,
        }
    }

    /// Error envelope; content is always prefixed with `"Error: "`
    pub fn failure(error: &AppError) -> Self {
        Self {
            content: format!("Error: {error}"),
            is_error: true,
        }
    }
}

/// One condition of a mail rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleCondition {
    /// Header or field the condition tests (`from`, `subject`, `X-Spam`, ...)
    pub header: String,
    /// Comparison (`contains`, `begins_with`, ...)
    pub qualifier: String,
    /// Value compared against
    pub expression: String,
}

impl RuleCondition {
    /// Read a condition from a `{header, qualifier, expression}` object
    ///
    /// `qualifier` defaults to `contains`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` when `header` or `expression` is missing.
    pub fn from_json(object: &Map<String, Value>) -> AppResult<Self> {
        let field = |name: &str| object.get(name).and_then(coerce_string);
        match (field("header"), field("expression")) {
            (Some(header), Some(expression)) if !header.trim().is_empty() => Ok(Self {
                header,
                qualifier: field("qualifier").unwrap_or_else(|| "contains".to_owned()),
                expression,
            }),
            _ => Err(AppError::invalid(
                "each rule condition needs a header and an expression",
            )),
        }
    }
}

/// Actions applied by a mail rule
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleActions {
    /// Destination mailbox name
    pub move_message: Option<String>,
    /// Account owning the destination mailbox
    pub move_account: Option<String>,
    pub mark_read: bool,
    pub mark_flagged: bool,
    pub delete_message: bool,
}

impl RuleActions {
    /// Read actions from an object; unknown keys and mistyped values are ignored
    pub fn from_json(object: &Map<String, Value>) -> Self {
        let text = |name: &str| {
            object
                .get(name)
                .and_then(coerce_string)
                .filter(|value| !value.trim().is_empty())
        };
        let flag = |name: &str| object.get(name).and_then(coerce_bool).unwrap_or(false);
        Self {
            move_message: text("move_message"),
            move_account: text("move_account"),
            mark_read: flag("mark_read"),
            mark_flagged: flag("mark_flagged"),
            delete_message: flag("delete_message"),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Map, Value, json};

    use super::{
        OperationResult, ParamSpec, ParamType, ResponseEnvelope, RuleActions, RuleCondition,
        ToolDescriptor,
    };
    use crate::errors::AppError;

    #[test]
    fn render_sorts_keys_and_is_deterministic() {
        let mut record = Map::new();
        record.insert("subject".to_owned(), json!("Hi"));
        record.insert("id".to_owned(), json!("7"));
        record.insert("nested".to_owned(), json!({ "z": 1, "a": 2 }));
        let result = OperationResult::records(vec![record]);

        let first = result.clone().render().expect("render must succeed");
        let second = result.render().expect("render must succeed");
        assert_eq!(first, second);
        assert_eq!(
            first,
            "[\n  {\n    \"id\": \"7\",\n    \"nested\": {\n      \"a\": 2,\n      \"z\": 1\n    },\n    \"subject\": \"Hi\"\n  }\n]"
        );
    }

    #[test]
    fn render_passes_text_through() {
        let text = OperationResult::Text("Email deleted".to_owned())
            .render()
            .expect("render must succeed");
        assert_eq!(text, "Email deleted");
    }

    #[test]
    fn input_schema_lists_required_in_declaration_order() {
        static PARAMS: [ParamSpec; 3] = [
            ParamSpec::required("to", ParamType::StringArray, "Recipients"),
            ParamSpec::optional("cc", ParamType::StringArray, "CC"),
            ParamSpec::required("subject", ParamType::String, "Subject"),
        ];
        let descriptor = ToolDescriptor {
            name: "t",
            description: "test",
            params: &PARAMS,
        };
        let schema = Value::Object(descriptor.input_schema());
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"], json!(["to", "subject"]));
        assert_eq!(schema["properties"]["to"]["items"]["type"], "string");
        assert_eq!(schema["properties"]["cc"]["description"], "CC");
    }

    #[test]
    fn input_schema_omits_empty_required() {
        let descriptor = ToolDescriptor {
            name: "t",
            description: "test",
            params: &[],
        };
        assert!(!descriptor.input_schema().contains_key("required"));
    }

    #[test]
    fn failure_envelope_is_prefixed() {
        let envelope = ResponseEnvelope::failure(&AppError::invalid("name is required"));
        assert!(envelope.is_error);
        assert_eq!(envelope.content, "Error: name is required");
        let json = serde_json::to_value(&envelope).expect("serialize");
        assert_eq!(json["isError"], true);
    }

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn rule_condition_defaults_qualifier() {
        let condition =
            RuleCondition::from_json(&object(json!({ "header": "from", "expression": "boss" })))
                .expect("condition must parse");
        assert_eq!(condition.qualifier, "contains");

        let err = RuleCondition::from_json(&object(json!({ "header": "from" })))
            .expect_err("expression is required");
        assert!(err.to_string().contains("expression"));
    }

    #[test]
    fn rule_actions_accept_string_booleans() {
        let actions = RuleActions::from_json(&object(json!({
            "move_message": "Archive",
            "mark_read": "true",
            "mark_flagged": 3,
            "delete_message": false,
        })));
        assert_eq!(actions.move_message.as_deref(), Some("Archive"));
        assert_eq!(actions.move_account, None);
        assert!(actions.mark_read);
        assert!(!actions.mark_flagged);
        assert!(!actions.delete_message);
    }
}
