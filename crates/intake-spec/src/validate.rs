use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate};
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::money::parse_money;
use crate::spec::field::{FieldSpec, FieldType};
use crate::spec::form::FormSpec;
use crate::visibility::resolve_visibility;

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@.]+(\.[^\s@.]+)+$").expect("email pattern compiles")
});

static PHONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\+?\d{1,3}[-.\s]?)?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}$")
        .expect("phone pattern compiles")
});

/// Field id to user-facing message. A missing key means the field is valid.
pub type ErrorMap = BTreeMap<String, String>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: ErrorMap,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unknown_fields: Vec<String>,
}

/// Whole-record validation, as run on final submit.
pub fn validate(spec: &FormSpec, values: &Value) -> ValidationResult {
    let visibility = resolve_visibility(spec, values);
    let empty = Map::new();
    let values_map = values.as_object().unwrap_or(&empty);

    let mut errors = ErrorMap::new();
    for field in spec.record_fields() {
        if !visibility.get(&field.id).copied().unwrap_or(true) {
            continue;
        }
        if let Some(message) = check_field(field, values_map.get(&field.id)) {
            errors.insert(field.id.clone(), message);
        }
    }

    let known: BTreeSet<&str> = spec.record_fields().map(|field| field.id.as_str()).collect();
    let unknown_fields: Vec<String> = values_map
        .keys()
        .filter(|key| !known.contains(key.as_str()))
        .cloned()
        .collect();

    ValidationResult {
        valid: errors.is_empty() && unknown_fields.is_empty(),
        errors,
        unknown_fields,
    }
}

/// Validates the visible fields of one step (1-based). Unknown steps are valid.
pub fn validate_step(spec: &FormSpec, step: usize, values: &Value) -> ValidationResult {
    let Some(step_spec) = spec.step(step) else {
        return ValidationResult {
            valid: true,
            ..Default::default()
        };
    };
    let visibility = resolve_visibility(spec, values);

    let errors: ErrorMap = step_spec
        .fields
        .iter()
        .filter(|field| visibility.get(&field.id).copied().unwrap_or(true))
        .filter_map(|field| {
            check_field(field, values.get(&field.id)).map(|message| (field.id.clone(), message))
        })
        .collect();

    ValidationResult {
        valid: errors.is_empty(),
        errors,
        unknown_fields: Vec::new(),
    }
}

/// Single-field validation, as run on blur. Hidden and unknown fields pass.
pub fn validate_field(spec: &FormSpec, field_id: &str, values: &Value) -> Option<String> {
    let field = spec.field(field_id)?;
    let visible = resolve_visibility(spec, values)
        .get(field_id)
        .copied()
        .unwrap_or(true);
    if !visible {
        return None;
    }
    check_field(field, values.get(field_id))
}

fn check_field(field: &FieldSpec, value: Option<&Value>) -> Option<String> {
    let value = value.unwrap_or(&Value::Null);
    if is_blank(value) {
        return field.required.then(|| field.required_message());
    }
    if !matches_type(field.kind, value) {
        return Some("type mismatch".into());
    }
    check_format(field, value).or_else(|| check_constraint(field, value))
}

/// `null` or a string that is empty after trimming.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        _ => false,
    }
}

fn matches_type(kind: FieldType, value: &Value) -> bool {
    match kind {
        FieldType::Boolean => value.is_boolean(),
        _ => value.is_string(),
    }
}

fn check_format(field: &FieldSpec, value: &Value) -> Option<String> {
    let text = value.as_str()?.trim();
    let ok = match field.kind {
        FieldType::Email => EMAIL.is_match(text),
        FieldType::Phone => PHONE.is_match(text),
        FieldType::Money => parse_money(text).is_some(),
        FieldType::Choice => field
            .choices
            .as_ref()
            .is_some_and(|choices| choices.iter().any(|choice| choice == text)),
        FieldType::Date => is_date(text),
        FieldType::Text | FieldType::LongText | FieldType::Boolean => true,
    };
    if ok {
        return None;
    }

    let fallback = match field.kind {
        FieldType::Email => "Invalid email address".to_string(),
        FieldType::Phone => "Phone number is not valid".to_string(),
        FieldType::Money => "Must be a valid number".to_string(),
        FieldType::Date => "Must be a valid date".to_string(),
        _ => format!("{} must be one of the listed options", field.title),
    };
    Some(field.invalid_message(&fallback))
}

fn is_date(text: &str) -> bool {
    NaiveDate::parse_from_str(text, "%Y-%m-%d").is_ok()
        || DateTime::parse_from_rfc3339(text).is_ok()
}

fn check_constraint(field: &FieldSpec, value: &Value) -> Option<String> {
    let constraint = field.constraint.as_ref()?;

    if constraint.must_be_true && value.as_bool() == Some(false) {
        return Some(field.invalid_message(&format!("{} must be accepted", field.title)));
    }

    let text = value.as_str()?.trim();

    if let Some(min_len) = constraint.min_len
        && text.chars().count() < min_len
    {
        return Some(field.messages.too_short.clone().unwrap_or_else(|| {
            format!("{} must be at least {} characters", field.title, min_len)
        }));
    }

    if let Some(max_len) = constraint.max_len
        && text.chars().count() > max_len
    {
        return Some(format!(
            "{} must be at most {} characters",
            field.title, max_len
        ));
    }

    if let Some(pattern) = &constraint.pattern
        && let Ok(regex) = Regex::new(pattern)
        && !regex.is_match(text)
    {
        return Some(field.invalid_message("value does not match pattern"));
    }

    None
}
