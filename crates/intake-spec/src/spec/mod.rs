pub mod field;
pub mod form;

use thiserror::Error;

pub use field::{Constraint, FieldMessages, FieldSpec, FieldType};
pub use form::{FormSpec, StepSpec};

const LENDER_APPLICATION: &str = include_str!("../../forms/lender_application.json");

/// Problems detected while loading a form spec.
#[derive(Debug, Error)]
pub enum SpecError {
    #[error("failed to parse form spec: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("form spec has no steps")]
    EmptyPlan,
    #[error("step '{0}' has no fields")]
    EmptyStep(String),
    #[error("field '{0}' is declared more than once")]
    DuplicateField(String),
    #[error("choice field '{0}' has no options")]
    MissingChoices(String),
    #[error("field '{field}' has an invalid pattern: {source}")]
    InvalidPattern {
        field: String,
        #[source]
        source: regex::Error,
    },
}

/// The bundled four-step lender application.
pub fn lender_application() -> Result<FormSpec, SpecError> {
    FormSpec::from_json(LENDER_APPLICATION)
}
