use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Small condition language used by `visible_if`.
///
/// Paths are JSON pointers into the current form values, e.g.
/// `/needsRehabFunding`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Expr {
    LiteralBool { value: bool },
    Eq { path: String, value: Value },
    And { expressions: Vec<Expr> },
    Or { expressions: Vec<Expr> },
    Not { expression: Box<Expr> },
    Var { path: String },
}

impl Expr {
    /// Evaluates the expression to a boolean if possible.
    ///
    /// `None` means a referenced value was missing or not a boolean.
    pub fn evaluate(&self, values: &Value) -> Option<bool> {
        match self {
            Expr::LiteralBool { value } => Some(*value),
            Expr::Eq { path, value } => values.pointer(path).map(|found| found == value),
            Expr::And { expressions } => {
                for expr in expressions {
                    match expr.evaluate(values) {
                        Some(true) => continue,
                        Some(false) => return Some(false),
                        None => return None,
                    }
                }
                Some(true)
            }
            Expr::Or { expressions } => {
                for expr in expressions {
                    if let Some(true) = expr.evaluate(values) {
                        return Some(true);
                    }
                }
                Some(false)
            }
            Expr::Not { expression } => expression.evaluate(values).map(|value| !value),
            Expr::Var { path } => values.pointer(path).and_then(Value::as_bool),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn var_reads_boolean_flag() {
        let expr = Expr::Var {
            path: "/needsRehabFunding".into(),
        };
        assert_eq!(expr.evaluate(&json!({ "needsRehabFunding": true })), Some(true));
        assert_eq!(expr.evaluate(&json!({ "needsRehabFunding": false })), Some(false));
        assert_eq!(expr.evaluate(&json!({})), None);
    }

    #[test]
    fn eq_compares_against_literal() {
        let expr = Expr::Eq {
            path: "/loanPurpose".into(),
            value: json!("Refinance"),
        };
        assert_eq!(expr.evaluate(&json!({ "loanPurpose": "Refinance" })), Some(true));
        assert_eq!(expr.evaluate(&json!({ "loanPurpose": "Purchase" })), Some(false));
    }

    #[test]
    fn parses_tagged_json() {
        let expr: Expr = serde_json::from_value(json!({
            "op": "not",
            "expression": { "op": "var", "path": "/flag" }
        }))
        .expect("deserialize");
        assert_eq!(expr.evaluate(&json!({ "flag": false })), Some(true));
    }
}
