//! Declared parameter schemas and argument validation

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// JSON type a parameter accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Number => "number",
            ParamType::Integer => "integer",
            ParamType::Boolean => "boolean",
            ParamType::Object => "object",
            ParamType::Array => "array",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "string" => Some(ParamType::String),
            "number" => Some(ParamType::Number),
            "integer" => Some(ParamType::Integer),
            "boolean" => Some(ParamType::Boolean),
            "object" => Some(ParamType::Object),
            "array" => Some(ParamType::Array),
            _ => None,
        }
    }

    /// Whether `value` is of this type
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Number => value.is_number(),
            ParamType::Integer => value.is_i64() || value.is_u64(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::Object => value.is_object(),
            ParamType::Array => value.is_array(),
        }
    }
}

/// Name of the JSON type of `value`, for error messages
fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// One declared parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ParamType,
    pub required: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl ParamSpec {
    pub fn required(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            name: name.into(),
            ty,
            required: true,
            description: String::new(),
        }
    }

    pub fn optional(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            required: false,
            ..Self::required(name, ty)
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Declared parameter list of a tool
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamSchema {
    pub params: Vec<ParamSpec>,
}

impl ParamSchema {
    pub fn new(params: Vec<ParamSpec>) -> Self {
        Self { params }
    }

    /// Schema for tools that take no arguments
    pub fn empty() -> Self {
        Self::default()
    }

    /// Check an argument payload against the declared parameters
    ///
    /// Undeclared keys are accepted.
    pub fn validate(&self, arguments: &Value) -> Result<(), String> {
        let args = arguments
            .as_object()
            .ok_or_else(|| format!("arguments must be an object, got {}", json_type_name(arguments)))?;

        for param in &self.params {
            match args.get(&param.name) {
                None | Some(Value::Null) if param.required => {
                    return Err(format!("missing required parameter '{}'", param.name));
                }
                None | Some(Value::Null) => {}
                Some(value) if !param.ty.accepts(value) => {
                    return Err(format!(
                        "parameter '{}' must be {}, got {}",
                        param.name,
                        param.ty.as_str(),
                        json_type_name(value)
                    ));
                }
                Some(_) => {}
            }
        }

        Ok(())
    }

    /// Render as a JSON Schema object for the model
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        for param in &self.params {
            let mut prop = Map::new();
            prop.insert("type".to_string(), json!(param.ty.as_str()));
            if !param.description.is_empty() {
                prop.insert("description".to_string(), json!(param.description));
            }
            properties.insert(param.name.clone(), Value::Object(prop));
        }

        let required: Vec<&str> = self
            .params
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

    /// Parse a JSON Schema `object` as listed by a tool server
    ///
    /// Properties without a recognised `type` are skipped.
    pub fn from_json_schema(schema: &Value) -> Self {
        let required: Vec<&str> = schema
            .get("required")
            .and_then(|r| r.as_array())
            .map(|r| r.iter().filter_map(|v| v.as_str()).collect())
            .unwrap_or_default();

        let params = schema
            .get("properties")
            .and_then(|p| p.as_object())
            .map(|props| {
                props
                    .iter()
                    .filter_map(|(name, prop)| {
                        let ty = prop.get("type").and_then(|t| t.as_str()).and_then(ParamType::parse)?;
                        let description = prop
                            .get("description")
                            .and_then(|d| d.as_str())
                            .unwrap_or_default()
                            .to_string();
                        Some(ParamSpec {
                            name: name.clone(),
                            ty,
                            required: required.contains(&name.as_str()),
                            description,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self { params }
    }
}
