//! Typed operation signatures.
//!
//! An [`OperationDescriptor`] is the single source of truth for one callable
//! operation: the tool declaration shown to the model, the default-filling
//! and validation done by the dispatcher, and date correction all derive
//! from it.

use crate::ToolDef;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Parameter names treated as a date range by the dispatcher.
pub const START_DATE: &str = "start_date";
pub const END_DATE: &str = "end_date";

/// JSON type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    StringArray,
    /// A `YYYY-MM-DD` string.
    Date,
}

impl ParamType {
    fn json_schema(self) -> Value {
        match self {
            ParamType::String | ParamType::Date => json!({ "type": "string" }),
            ParamType::Integer => json!({ "type": "integer" }),
            ParamType::Number => json!({ "type": "number" }),
            ParamType::Boolean => json!({ "type": "boolean" }),
            ParamType::StringArray => json!({ "type": "array", "items": { "type": "string" } }),
        }
    }
}

/// One parameter of an operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub description: String,
    /// Value filled in by the dispatcher when an optional argument is omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ParamSpec {
    /// An optional parameter with no default.
    pub fn new(
        name: impl Into<String>,
        param_type: ParamType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            param_type,
            required: false,
            description: description.into(),
            default: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    fn json_schema(&self) -> Value {
        let mut schema = self.param_type.json_schema();
        if let Some(obj) = schema.as_object_mut() {
            let description = match (&self.param_type, self.description.is_empty()) {
                (ParamType::Date, true) => "Date in YYYY-MM-DD format".to_string(),
                (ParamType::Date, false) => format!("{} (YYYY-MM-DD)", self.description),
                _ => self.description.clone(),
            };
            if !description.is_empty() {
                obj.insert("description".into(), Value::String(description));
            }
            if let Some(ref default) = self.default {
                obj.insert("default".into(), default.clone());
            }
        }
        schema
    }
}

/// The typed signature of one operation a provider serves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationDescriptor {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub parameters: Vec<ParamSpec>,
}

impl OperationDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
        }
    }

    /// Add a parameter (builder pattern). Replaces one with the same name.
    pub fn param(mut self, spec: ParamSpec) -> Self {
        self.parameters.retain(|p| p.name != spec.name);
        self.parameters.push(spec);
        self
    }

    /// Add required `start_date` / `end_date` parameters.
    pub fn with_date_range(self) -> Self {
        self.param(ParamSpec::new(START_DATE, ParamType::Date, "Start date").required())
            .param(ParamSpec::new(END_DATE, ParamType::Date, "End date").required())
    }

    pub fn parameter(&self, name: &str) -> Option<&ParamSpec> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Whether the operation takes a `start_date` / `end_date` pair.
    ///
    /// Both fields must be string-valued; `Date` and plain `String` look the
    /// same to the model.
    pub fn has_date_range(&self) -> bool {
        [START_DATE, END_DATE].iter().all(|name| {
            self.parameter(name)
                .is_some_and(|p| matches!(p.param_type, ParamType::Date | ParamType::String))
        })
    }

    /// JSON Schema object describing the arguments.
    pub fn parameters_schema(&self) -> Value {
        let properties: serde_json::Map<String, Value> = self
            .parameters
            .iter()
            .map(|p| (p.name.clone(), p.json_schema()))
            .collect();
        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Project this descriptor into a model-facing tool declaration.
    pub fn to_tool_def(&self) -> ToolDef {
        ToolDef::new(
            self.name.clone(),
            self.description.clone(),
            self.parameters_schema(),
        )
    }
}
