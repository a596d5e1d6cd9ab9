use serde_json::{Map, Value, json};

use crate::{
    spec::{
        field::{FieldSpec, FieldType},
        form::FormSpec,
    },
    validate::ErrorMap,
    visibility::resolve_visibility,
};

/// Fields step `step` (1-based) displays for the given values, in plan order.
pub fn visible_fields<'a>(spec: &'a FormSpec, step: usize, values: &Value) -> Vec<&'a FieldSpec> {
    let Some(step_spec) = spec.step(step) else {
        return Vec::new();
    };
    let visibility = resolve_visibility(spec, values);
    step_spec
        .fields
        .iter()
        .filter(|field| visibility.get(&field.id).copied().unwrap_or(true))
        .collect()
}

/// Wizard position exposed to renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderProgress {
    pub step: usize,
    pub total: usize,
}

/// Describes a single displayed field.
#[derive(Debug, Clone)]
pub struct RenderField {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub placeholder: Option<String>,
    pub kind: FieldType,
    pub required: bool,
    pub choices: Option<Vec<String>>,
    pub current_value: Value,
    pub error: Option<String>,
}

/// Everything needed to draw one wizard step.
#[derive(Debug, Clone)]
pub struct StepPayload {
    pub form_id: String,
    pub form_title: String,
    pub step_id: String,
    pub step_title: String,
    pub progress: RenderProgress,
    pub help: Option<String>,
    pub fields: Vec<RenderField>,
}

impl StepPayload {
    pub fn is_last_step(&self) -> bool {
        self.progress.step == self.progress.total
    }
}

/// Builds the payload for `step`, or `None` when the step does not exist.
pub fn build_step_payload(
    spec: &FormSpec,
    step: usize,
    values: &Value,
    errors: &ErrorMap,
) -> Option<StepPayload> {
    let step_spec = spec.step(step)?;
    let fields = visible_fields(spec, step, values)
        .into_iter()
        .map(|field| RenderField {
            id: field.id.clone(),
            title: field.title.clone(),
            description: field.description.clone(),
            placeholder: field.placeholder.clone(),
            kind: field.kind,
            required: field.required,
            choices: field.choices.clone(),
            current_value: values
                .get(&field.id)
                .cloned()
                .unwrap_or_else(|| field.initial_value()),
            error: errors.get(&field.id).cloned(),
        })
        .collect();

    Some(StepPayload {
        form_id: spec.id.clone(),
        form_title: spec.title.clone(),
        step_id: step_spec.id.clone(),
        step_title: step_spec.title.clone(),
        progress: RenderProgress {
            step,
            total: spec.total_steps(),
        },
        help: step_spec
            .description
            .clone()
            .or_else(|| (step == 1).then(|| spec.description.clone()).flatten()),
        fields,
    })
}

/// Render the payload as a structured JSON-friendly value.
pub fn render_json_ui(payload: &StepPayload) -> Value {
    let fields = payload
        .fields
        .iter()
        .map(|field| {
            let mut map = Map::new();
            map.insert("id".into(), Value::String(field.id.clone()));
            map.insert("title".into(), Value::String(field.title.clone()));
            map.insert(
                "type".into(),
                Value::String(field.kind.as_str().to_string()),
            );
            map.insert("required".into(), Value::Bool(field.required));
            if let Some(description) = &field.description {
                map.insert("description".into(), Value::String(description.clone()));
            }
            if let Some(placeholder) = &field.placeholder {
                map.insert("placeholder".into(), Value::String(placeholder.clone()));
            }
            if let Some(choices) = &field.choices {
                map.insert(
                    "choices".into(),
                    Value::Array(choices.iter().cloned().map(Value::String).collect()),
                );
            }
            map.insert("value".into(), field.current_value.clone());
            map.insert(
                "error".into(),
                field.error.clone().map(Value::String).unwrap_or(Value::Null),
            );
            Value::Object(map)
        })
        .collect::<Vec<_>>();

    json!({
        "form_id": payload.form_id,
        "form_title": payload.form_title,
        "step_id": payload.step_id,
        "step_title": payload.step_title,
        "progress": {
            "step": payload.progress.step,
            "total": payload.progress.total,
        },
        "help": payload.help,
        "last_step": payload.is_last_step(),
        "fields": fields,
    })
}

/// Render the payload as human-friendly text.
pub fn render_text(payload: &StepPayload) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "{} - Step {} of {}: {}",
        payload.form_title, payload.progress.step, payload.progress.total, payload.step_title
    ));
    if let Some(help) = &payload.help {
        lines.push(help.clone());
    }

    for field in &payload.fields {
        let mut entry = format!(" - {}", field.title);
        if field.required {
            entry.push_str(" *");
        }
        if let Some(display) = value_to_display(&field.current_value) {
            entry.push_str(&format!(" = {}", display));
        }
        lines.push(entry);
        if let Some(choices) = &field.choices {
            lines.push(format!("   Options: {}", choices.join(" | ")));
        }
        if let Some(error) = &field.error {
            lines.push(format!("   ! {}", error));
        }
    }

    lines.join("\n")
}

/// Display form of a value; `None` for blank strings and nulls.
pub fn value_to_display(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) if text.trim().is_empty() => None,
        Value::String(text) => Some(text.clone()),
        Value::Bool(flag) => Some(if *flag { "yes" } else { "no" }.to_string()),
        other => Some(other.to_string()),
    }
}
