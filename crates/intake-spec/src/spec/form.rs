use std::collections::BTreeSet;

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::spec::SpecError;
use crate::spec::field::{FieldSpec, FieldType};

/// One page of the wizard: an ordered group of fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StepSpec {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub fields: Vec<FieldSpec>,
}

/// Top-level form definition: the step plan plus record-only fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FormSpec {
    pub id: String,
    pub title: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub steps: Vec<StepSpec>,
    /// Fields that belong to the record but are never shown by a step.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub carried: Vec<FieldSpec>,
}

impl FormSpec {
    /// Parses and checks a spec from JSON text.
    pub fn from_json(text: &str) -> Result<Self, SpecError> {
        let spec: FormSpec = serde_json::from_str(text)?;
        spec.check()?;
        Ok(spec)
    }

    pub fn total_steps(&self) -> usize {
        self.steps.len()
    }

    /// Step lookup, 1-based.
    pub fn step(&self, index: usize) -> Option<&StepSpec> {
        index.checked_sub(1).and_then(|idx| self.steps.get(idx))
    }

    /// Every field the step plan shows, in plan order.
    pub fn fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.steps.iter().flat_map(|step| step.fields.iter())
    }

    /// Step fields followed by carried fields.
    pub fn record_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields().chain(self.carried.iter())
    }

    pub fn field(&self, id: &str) -> Option<&FieldSpec> {
        self.record_fields().find(|field| field.id == id)
    }

    /// 1-based index of the step showing `id`.
    pub fn step_of(&self, id: &str) -> Option<usize> {
        self.steps
            .iter()
            .position(|step| step.fields.iter().any(|field| field.id == id))
            .map(|idx| idx + 1)
    }

    /// The empty record: every field at its initial value.
    pub fn initial_values(&self) -> Map<String, Value> {
        self.record_fields()
            .map(|field| (field.id.clone(), field.initial_value()))
            .collect()
    }

    fn check(&self) -> Result<(), SpecError> {
        if self.steps.is_empty() {
            return Err(SpecError::EmptyPlan);
        }
        if let Some(step) = self.steps.iter().find(|step| step.fields.is_empty()) {
            return Err(SpecError::EmptyStep(step.id.clone()));
        }

        let mut seen = BTreeSet::new();
        for field in self.record_fields() {
            if !seen.insert(field.id.as_str()) {
                return Err(SpecError::DuplicateField(field.id.clone()));
            }
            if field.kind == FieldType::Choice
                && field.choices.as_ref().is_none_or(|choices| choices.is_empty())
            {
                return Err(SpecError::MissingChoices(field.id.clone()));
            }
            if let Some(pattern) = field
                .constraint
                .as_ref()
                .and_then(|constraint| constraint.pattern.as_ref())
            {
                Regex::new(pattern).map_err(|source| SpecError::InvalidPattern {
                    field: field.id.clone(),
                    source,
                })?;
            }
        }
        Ok(())
    }
}
