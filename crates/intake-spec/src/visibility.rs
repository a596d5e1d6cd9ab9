use serde_json::Value;

use crate::spec::form::FormSpec;

pub type VisibilityMap = std::collections::BTreeMap<String, bool>;

/// Resolves `visible_if` for every field in the step plan.
///
/// A condition that cannot be evaluated (missing or non-boolean input) hides
/// the field, so an unset flag never reveals its dependents.
pub fn resolve_visibility(spec: &FormSpec, values: &Value) -> VisibilityMap {
    spec.record_fields()
        .map(|field| {
            let visible = field
                .visible_if
                .as_ref()
                .map(|expr| expr.evaluate(values).unwrap_or(false))
                .unwrap_or(true);
            (field.id.clone(), visible)
        })
        .collect()
}
