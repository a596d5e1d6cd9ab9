use serde_json::{Value, json};

use intake_spec::{
    ErrorMap, FormSpec, build_step_payload, lender_application, render_json_ui, render_text,
    visible_fields,
};

fn spec() -> FormSpec {
    lender_application().expect("bundled spec")
}

fn ids(spec: &FormSpec, step: usize, values: &Value) -> Vec<String> {
    visible_fields(spec, step, values)
        .into_iter()
        .map(|field| field.id.clone())
        .collect()
}

#[test]
fn step_plan_matches_wizard_pages() {
    let spec = spec();
    let values = Value::Object(spec.initial_values());

    assert_eq!(spec.total_steps(), 4);
    assert_eq!(
        ids(&spec, 1, &values),
        ["fullName", "email", "phoneNumber", "creditScore"]
    );
    assert_eq!(
        ids(&spec, 2, &values),
        ["propertyAddress", "propertyType", "loanPurpose", "closingDate"]
    );
    assert_eq!(
        ids(&spec, 3, &values),
        [
            "purchasePrice",
            "downPayment",
            "additionalReserves",
            "loanTerm",
            "needsRehabFunding"
        ]
    );
    assert_eq!(
        ids(&spec, 4, &values),
        [
            "investmentStrategy",
            "experience",
            "additionalInfo",
            "consentTransactional"
        ]
    );
    assert!(ids(&spec, 5, &values).is_empty());
    assert!(ids(&spec, 0, &values).is_empty());
}

#[test]
fn rehab_amount_follows_flag() {
    let spec = spec();
    let mut values = Value::Object(spec.initial_values());
    values["needsRehabFunding"] = json!(true);
    assert_eq!(ids(&spec, 3, &values).last().map(String::as_str), Some("rehabFundingNeeded"));

    values["needsRehabFunding"] = json!(false);
    assert!(!ids(&spec, 3, &values).contains(&"rehabFundingNeeded".to_string()));
}

#[test]
fn initial_values_cover_carried_fields() {
    let values = spec().initial_values();
    assert_eq!(values["loanPurpose"], "Purchase");
    assert_eq!(values["projectType"], "Fix & Flip");
    assert_eq!(values["consentMarketing"], false);
    assert_eq!(values["closingDate"], Value::Null);
    assert_eq!(values.len(), 21);
}

#[test]
fn render_text_shows_progress_and_errors() {
    let spec = spec();
    let values = json!({ "fullName": "Dana Reyes", "email": "nope" });
    let errors = ErrorMap::from([("email".to_string(), "Invalid email address".to_string())]);
    let payload = build_step_payload(&spec, 1, &values, &errors).expect("step 1");

    let text = render_text(&payload);
    assert!(text.contains("Step 1 of 4: Personal Information"));
    assert!(text.contains("Full Name * = Dana Reyes"));
    assert!(text.contains("! Invalid email address"));
    assert!(text.contains("Options: 760+ | 740-759"));
}

#[test]
fn render_json_ui_exposes_structure() {
    let spec = spec();
    let values = Value::Object(spec.initial_values());
    let payload = build_step_payload(&spec, 4, &values, &ErrorMap::new()).expect("step 4");

    let ui = render_json_ui(&payload);
    assert_eq!(ui["form_id"], "lender-application");
    assert_eq!(ui["progress"]["step"], 4);
    assert_eq!(ui["progress"]["total"], 4);
    assert_eq!(ui["last_step"], true);
    let fields = ui["fields"].as_array().expect("fields array");
    assert_eq!(fields[0]["id"], "investmentStrategy");
    assert_eq!(fields[0]["value"], "Flip");
    assert_eq!(fields[0]["choices"], json!(["Flip", "Hold"]));
    assert!(fields.iter().all(|field| field["error"].is_null()));
}

#[test]
fn out_of_range_step_has_no_payload() {
    let spec = spec();
    assert!(build_step_payload(&spec, 9, &json!({}), &ErrorMap::new()).is_none());
}
