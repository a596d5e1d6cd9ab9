use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::expr::Expr;

/// Supported field kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    LongText,
    Email,
    Phone,
    /// Display string that must parse as a number once separators are stripped.
    Money,
    Choice,
    Boolean,
    /// `YYYY-MM-DD` or `null`.
    Date,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::LongText => "long_text",
            FieldType::Email => "email",
            FieldType::Phone => "phone",
            FieldType::Money => "money",
            FieldType::Choice => "choice",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
        }
    }
}

/// Extra rules applied after presence and format checks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Constraint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_len: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_len: Option<usize>,
    /// Boolean fields only: the value has to be `true`.
    #[serde(default)]
    pub must_be_true: bool,
}

/// Per-field overrides for user-facing error messages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FieldMessages {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub too_short: Option<String>,
}

impl FieldMessages {
    pub fn is_empty(&self) -> bool {
        self.required.is_none() && self.invalid.is_none() && self.too_short.is_none()
    }
}

/// Declarative description of one form field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FieldSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: FieldType,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible_if: Option<Expr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint: Option<Constraint>,
    #[serde(default, skip_serializing_if = "FieldMessages::is_empty")]
    pub messages: FieldMessages,
}

impl FieldSpec {
    /// Value a freshly created record holds for this field.
    pub fn initial_value(&self) -> Value {
        if let Some(value) = &self.default_value {
            return value.clone();
        }
        match self.kind {
            FieldType::Boolean => Value::Bool(false),
            FieldType::Date => Value::Null,
            _ => Value::String(String::new()),
        }
    }

    pub fn required_message(&self) -> String {
        self.messages
            .required
            .clone()
            .unwrap_or_else(|| format!("{} is required", self.title))
    }

    pub fn invalid_message(&self, fallback: &str) -> String {
        self.messages
            .invalid
            .clone()
            .unwrap_or_else(|| fallback.to_string())
    }
}
