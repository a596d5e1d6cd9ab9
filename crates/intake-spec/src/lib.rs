#![allow(missing_docs)]

pub mod application;
pub mod expr;
pub mod money;
pub mod render;
pub mod spec;
pub mod validate;
pub mod visibility;

pub use application::{Application, InvestmentStrategy, LoanPurpose, ProjectType};
pub use expr::Expr;
pub use money::parse_money;
pub use render::{
    RenderField, RenderProgress, StepPayload, build_step_payload, render_json_ui, render_text,
    value_to_display, visible_fields,
};
pub use spec::{
    Constraint, FieldMessages, FieldSpec, FieldType, FormSpec, SpecError, StepSpec,
    lender_application,
};
pub use validate::{
    ErrorMap, ValidationResult, is_blank, validate, validate_field, validate_step,
};
pub use visibility::{VisibilityMap, resolve_visibility};
