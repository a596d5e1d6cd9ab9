use std::collections::BTreeSet;

use chrono::Utc;
use intake_spec::{
    Application, ErrorMap, FormSpec, is_blank, resolve_visibility, validate, validate_field,
    validate_step,
};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::submit::{
    Acknowledgement, Collector, SubmissionContext, SubmissionPayload, SubmitError,
    UNEXPECTED_FAILURE,
};

/// Lifecycle of the submit control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitStatus {
    Idle,
    Submitting,
    Success,
    Error,
}

/// Result of [`FormStore::go_next`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Advanced(usize),
    Blocked(ErrorMap),
    /// Current step is valid but already the last one.
    AtLastStep,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unknown field '{0}'")]
    UnknownField(String),
    #[error("a submission is already in flight")]
    SubmissionInFlight,
    #[error("no submission is in flight")]
    NotSubmitting,
    #[error("submit is only available on the last step (currently on step {step} of {total})")]
    NotOnFinalStep { step: usize, total: usize },
    #[error("{} field(s) failed validation", .0.len())]
    Invalid(ErrorMap),
    #[error("failed to build application record: {0}")]
    Record(#[source] serde_json::Error),
}

/// Wizard state: values, current step, touched/error state, submit status.
#[derive(Debug, Clone)]
pub struct FormStore {
    spec: FormSpec,
    values: Map<String, Value>,
    step: usize,
    touched: BTreeSet<String>,
    errors: ErrorMap,
    status: SubmitStatus,
    banner: Option<String>,
    acknowledgement: Option<Acknowledgement>,
}

impl FormStore {
    pub fn new(spec: FormSpec) -> Self {
        let values = spec.initial_values();
        Self {
            spec,
            values,
            step: 1,
            touched: BTreeSet::new(),
            errors: ErrorMap::new(),
            status: SubmitStatus::Idle,
            banner: None,
            acknowledgement: None,
        }
    }

    /// Starts from prefilled answers; every key must name a known field.
    pub fn with_values(spec: FormSpec, answers: &Map<String, Value>) -> Result<Self, StoreError> {
        let mut store = Self::new(spec);
        for (name, value) in answers {
            store.set_field(name, value.clone())?;
        }
        Ok(store)
    }

    pub fn spec(&self) -> &FormSpec {
        &self.spec
    }

    /// Current values as a JSON object.
    pub fn values(&self) -> Value {
        Value::Object(self.values.clone())
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn step(&self) -> usize {
        self.step
    }

    pub fn total_steps(&self) -> usize {
        self.spec.total_steps()
    }

    pub fn is_last_step(&self) -> bool {
        self.step == self.total_steps()
    }

    pub fn errors(&self) -> &ErrorMap {
        &self.errors
    }

    pub fn is_touched(&self, name: &str) -> bool {
        self.touched.contains(name)
    }

    pub fn status(&self) -> SubmitStatus {
        self.status
    }

    /// Banner-level message from the last failed submission.
    pub fn error_message(&self) -> Option<&str> {
        self.banner.as_deref()
    }

    pub fn acknowledgement(&self) -> Option<&Acknowledgement> {
        self.acknowledgement.as_ref()
    }

    /// Whether the submit control is enabled.
    pub fn can_submit(&self) -> bool {
        self.status != SubmitStatus::Submitting
    }

    pub fn set_field(&mut self, name: &str, value: Value) -> Result<(), StoreError> {
        if self.spec.field(name).is_none() {
            return Err(StoreError::UnknownField(name.to_string()));
        }
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    /// Marks `name` touched and refreshes its error entry.
    pub fn blur(&mut self, name: &str) -> Result<Option<&str>, StoreError> {
        if self.spec.field(name).is_none() {
            return Err(StoreError::UnknownField(name.to_string()));
        }
        self.touched.insert(name.to_string());
        match validate_field(&self.spec, name, &self.values()) {
            Some(message) => {
                self.errors.insert(name.to_string(), message);
            }
            None => {
                self.errors.remove(name);
            }
        }
        Ok(self.errors.get(name).map(String::as_str))
    }

    pub fn go_next(&mut self) -> StepOutcome {
        let result = validate_step(&self.spec, self.step, &self.values());
        self.clear_step_errors(self.step);

        if !result.valid {
            debug!(step = self.step, invalid = result.errors.len(), "step blocked");
            self.touched.extend(result.errors.keys().cloned());
            self.errors.extend(result.errors.clone());
            return StepOutcome::Blocked(result.errors);
        }

        if self.is_last_step() {
            return StepOutcome::AtLastStep;
        }
        self.step += 1;
        StepOutcome::Advanced(self.step)
    }

    pub fn go_prev(&mut self) -> usize {
        self.step = self.step.saturating_sub(1).max(1);
        self.step
    }

    pub fn reset(&mut self) {
        self.values = self.spec.initial_values();
        self.step = 1;
        self.touched.clear();
        self.errors.clear();
        self.status = SubmitStatus::Idle;
        self.banner = None;
        self.acknowledgement = None;
    }

    /// Validates the whole record and moves to `submitting`.
    ///
    /// On failure nothing is sent: the field errors are stored, the step is
    /// left alone, and the status returns to `idle`.
    pub fn begin_submission(
        &mut self,
        context: &SubmissionContext,
    ) -> Result<SubmissionPayload, StoreError> {
        if self.status == SubmitStatus::Submitting {
            return Err(StoreError::SubmissionInFlight);
        }
        if !self.is_last_step() {
            return Err(StoreError::NotOnFinalStep {
                step: self.step,
                total: self.total_steps(),
            });
        }

        let values = self.values();
        let result = validate(&self.spec, &values);
        if !result.valid {
            debug!(invalid = result.errors.len(), "submission blocked by validation");
            self.errors = result.errors.clone();
            self.touched.extend(result.errors.keys().cloned());
            self.status = SubmitStatus::Idle;
            return Err(StoreError::Invalid(result.errors));
        }

        let application = match Application::from_values(&self.submitted_values()) {
            Ok(application) => application,
            Err(err) => {
                error!(error = %err, "validated values do not form an application record");
                self.status = SubmitStatus::Error;
                self.banner = Some(UNEXPECTED_FAILURE.to_string());
                return Err(StoreError::Record(err));
            }
        };
        self.errors.clear();
        self.banner = None;
        self.status = SubmitStatus::Submitting;
        Ok(SubmissionPayload::new(application, context, Utc::now()))
    }

    /// Applies the collector's outcome to an in-flight submission.
    pub fn complete_submission(
        &mut self,
        outcome: Result<Acknowledgement, SubmitError>,
    ) -> Result<SubmitStatus, StoreError> {
        if self.status != SubmitStatus::Submitting {
            return Err(StoreError::NotSubmitting);
        }

        match outcome {
            Ok(ack) => {
                info!(submission_id = ?ack.submission_id, "application submitted");
                self.reset();
                self.status = SubmitStatus::Success;
                self.acknowledgement = Some(ack);
            }
            Err(err) => {
                warn!(error = %err, "application submission failed");
                self.status = SubmitStatus::Error;
                self.banner = Some(err.user_message());
            }
        }
        Ok(self.status)
    }

    /// Validates, sends exactly once, and records the outcome.
    pub async fn submit<C: Collector>(
        &mut self,
        collector: &C,
        context: &SubmissionContext,
    ) -> Result<SubmitStatus, StoreError> {
        let payload = self.begin_submission(context)?;
        let outcome = collector.send(&payload).await;
        self.complete_submission(outcome)
    }

    /// Values as submitted: hidden and blank fields fall back to their
    /// initial value.
    fn submitted_values(&self) -> Value {
        let values = self.values();
        let visibility = resolve_visibility(&self.spec, &values);
        let mut submitted = self.values.clone();
        for field in self.spec.record_fields() {
            let hidden = !visibility.get(&field.id).copied().unwrap_or(true);
            let blank = submitted.get(&field.id).is_none_or(is_blank);
            if hidden || blank {
                submitted.insert(field.id.clone(), field.initial_value());
            }
        }
        Value::Object(submitted)
    }

    fn clear_step_errors(&mut self, step: usize) {
        if let Some(step_spec) = self.spec.step(step) {
            for field in &step_spec.fields {
                self.errors.remove(&field.id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use intake_spec::{InvestmentStrategy, ProjectType, lender_application};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FakeCollector {
        calls: AtomicUsize,
        reply: fn() -> Result<Acknowledgement, SubmitError>,
        seen: Mutex<Vec<SubmissionPayload>>,
    }

    impl FakeCollector {
        fn new(reply: fn() -> Result<Acknowledgement, SubmitError>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                reply,
                seen: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Collector for FakeCollector {
        async fn send(&self, payload: &SubmissionPayload) -> Result<Acknowledgement, SubmitError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(payload.clone());
            (self.reply)()
        }
    }

    fn accepted() -> Result<Acknowledgement, SubmitError> {
        Ok(Acknowledgement {
            success: Some(true),
            message: Some("Form submitted successfully".into()),
            submission_id: Some(1),
        })
    }

    fn server_error() -> Result<Acknowledgement, SubmitError> {
        Err(SubmitError::Status {
            status: 500,
            message: Some("An error occurred while processing your submission".into()),
        })
    }

    fn store() -> FormStore {
        FormStore::new(lender_application().expect("bundled spec"))
    }

    fn filled_store() -> FormStore {
        let mut store = store();
        let answers = [
            ("fullName", json!("Dana Reyes")),
            ("email", json!("dana@example.com")),
            ("phoneNumber", json!("555-123-4567")),
            ("creditScore", json!("740-759")),
            ("propertyAddress", json!("9 Elm St, Dayton, OH")),
            ("propertyType", json!("Mixed-Use")),
            ("purchasePrice", json!("1,234,567")),
            ("consentTransactional", json!(true)),
        ];
        for (name, value) in answers {
            store.set_field(name, value).expect("known field");
        }
        for _ in 1..store.total_steps() {
            assert!(matches!(store.go_next(), StepOutcome::Advanced(_)));
        }
        store
    }

    fn block_on<F: std::future::Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("runtime")
            .block_on(future)
    }

    #[test]
    fn set_field_rejects_unknown_names() {
        let mut store = store();
        let err = store.set_field("favoriteColor", json!("green")).unwrap_err();
        assert!(matches!(err, StoreError::UnknownField(name) if name == "favoriteColor"));
        assert!(store.value("favoriteColor").is_none());
    }

    #[test]
    fn set_field_does_not_validate() {
        let mut store = store();
        store.set_field("email", json!("broken")).unwrap();
        assert!(store.errors().is_empty());
        assert!(!store.is_touched("email"));
    }

    #[test]
    fn blur_updates_single_field_error() {
        let mut store = store();
        store.set_field("email", json!("broken")).unwrap();
        assert_eq!(store.blur("email").unwrap(), Some("Invalid email address"));
        assert!(store.is_touched("email"));
        assert!(!store.errors().contains_key("fullName"));

        store.set_field("email", json!("dana@example.com")).unwrap();
        assert_eq!(store.blur("email").unwrap(), None);
        assert!(store.errors().is_empty());
    }

    #[test]
    fn go_next_blocks_on_invalid_step() {
        let mut store = store();
        store.set_field("fullName", json!("Dana Reyes")).unwrap();
        let outcome = store.go_next();
        let StepOutcome::Blocked(errors) = outcome else {
            panic!("expected blocked, got {outcome:?}");
        };
        assert_eq!(store.step(), 1);
        assert!(errors.contains_key("email"));
        assert!(store.errors().contains_key("phoneNumber"));
        assert!(store.is_touched("creditScore"));
        assert!(!store.errors().contains_key("fullName"));
    }

    #[test]
    fn go_prev_needs_no_validation_and_clamps() {
        let mut store = filled_store();
        assert_eq!(store.step(), 4);
        store.set_field("email", json!("broken")).unwrap();
        assert_eq!(store.go_prev(), 3);
        assert_eq!(store.go_prev(), 2);
        assert_eq!(store.go_prev(), 1);
        assert_eq!(store.go_prev(), 1);
    }

    #[test]
    fn go_next_at_last_step_stays() {
        let mut store = filled_store();
        assert_eq!(store.go_next(), StepOutcome::AtLastStep);
        assert_eq!(store.step(), 4);
    }

    #[test]
    fn submit_before_last_step_is_refused() {
        let mut store = store();
        let err = store.begin_submission(&SubmissionContext::default()).unwrap_err();
        assert!(matches!(err, StoreError::NotOnFinalStep { step: 1, total: 4 }));
    }

    #[test]
    fn invalid_record_never_reaches_collector() {
        let mut store = filled_store();
        store.set_field("email", json!("")).unwrap();
        let collector = FakeCollector::new(accepted);

        let err = block_on(store.submit(&collector, &SubmissionContext::default())).unwrap_err();
        let StoreError::Invalid(errors) = err else {
            panic!("expected validation failure");
        };
        assert_eq!(errors["email"], "Email is required");
        assert_eq!(collector.calls(), 0);
        assert_eq!(store.step(), 4);
        assert_eq!(store.status(), SubmitStatus::Idle);
        assert!(store.errors().contains_key("email"));
    }

    #[test]
    fn success_resets_to_empty_first_step() {
        let mut store = filled_store();
        let collector = FakeCollector::new(accepted);

        let status = block_on(store.submit(&collector, &SubmissionContext::default())).unwrap();
        assert_eq!(status, SubmitStatus::Success);
        assert_eq!(collector.calls(), 1);
        assert_eq!(store.step(), 1);
        assert_eq!(store.values(), Value::Object(store.spec().initial_values()));
        assert_eq!(store.acknowledgement().and_then(|ack| ack.submission_id), Some(1));
        assert!(store.can_submit());
    }

    #[test]
    fn failure_keeps_values_and_reports_message() {
        let mut store = filled_store();
        let before = store.values();
        let collector = FakeCollector::new(server_error);

        let status = block_on(store.submit(&collector, &SubmissionContext::default())).unwrap();
        assert_eq!(status, SubmitStatus::Error);
        assert_eq!(store.values(), before);
        assert_eq!(store.step(), 4);
        assert_eq!(
            store.error_message(),
            Some("An error occurred while processing your submission")
        );

        // user-initiated retry
        let status = block_on(store.submit(&collector, &SubmissionContext::default())).unwrap();
        assert_eq!(status, SubmitStatus::Error);
        assert_eq!(collector.calls(), 2);
    }

    #[test]
    fn second_submit_while_in_flight_is_refused() {
        let mut store = filled_store();
        let context = SubmissionContext::default();
        let collector = FakeCollector::new(accepted);

        let payload = store.begin_submission(&context).expect("first click");
        assert!(!store.can_submit());
        assert!(matches!(
            store.begin_submission(&context),
            Err(StoreError::SubmissionInFlight)
        ));
        assert!(matches!(
            block_on(store.submit(&collector, &context)),
            Err(StoreError::SubmissionInFlight)
        ));

        let outcome = block_on(collector.send(&payload));
        assert_eq!(store.complete_submission(outcome).unwrap(), SubmitStatus::Success);
        assert_eq!(collector.calls(), 1);
    }

    #[test]
    fn complete_without_begin_is_an_error() {
        let mut store = store();
        assert!(matches!(
            store.complete_submission(accepted()),
            Err(StoreError::NotSubmitting)
        ));
    }

    #[test]
    fn hidden_rehab_amount_is_blanked_in_payload() {
        let mut store = filled_store();
        store.go_prev();
        store.set_field("needsRehabFunding", json!(true)).unwrap();
        store.set_field("rehabFundingNeeded", json!("abc")).unwrap();
        assert!(matches!(store.go_next(), StepOutcome::Blocked(_)));

        store.set_field("needsRehabFunding", json!(false)).unwrap();
        assert_eq!(store.go_next(), StepOutcome::Advanced(4));
        assert_eq!(store.value("rehabFundingNeeded"), Some(&json!("abc")));

        let collector = FakeCollector::new(accepted);
        let context = SubmissionContext {
            page_url: Some("https://lender.example.com/apply".into()),
            user_agent: None,
        };
        let status = block_on(store.submit(&collector, &context)).unwrap();
        assert_eq!(status, SubmitStatus::Success);

        let seen = collector.seen.lock().unwrap();
        assert_eq!(seen[0].application.rehab_funding_needed, "");
        assert_eq!(seen[0].application.purchase_price, "1,234,567");
        assert_eq!(seen[0].page_url.as_deref(), Some("https://lender.example.com/apply"));
    }

    #[test]
    fn blank_optional_fields_submit_as_initial_values() {
        let mut store = filled_store();
        store.set_field("investmentStrategy", json!("")).unwrap();
        store.set_field("experience", Value::Null).unwrap();
        store.set_field("projectType", json!("  ")).unwrap();
        store.set_field("ownership", Value::Null).unwrap();
        let collector = FakeCollector::new(accepted);

        let status = block_on(store.submit(&collector, &SubmissionContext::default())).unwrap();
        assert_eq!(status, SubmitStatus::Success);

        let seen = collector.seen.lock().unwrap();
        let application = &seen[0].application;
        assert_eq!(application.investment_strategy, InvestmentStrategy::Flip);
        assert_eq!(application.project_type, ProjectType::FixAndFlip);
        assert_eq!(application.experience, "");
        assert_eq!(application.ownership, "");
    }

    #[test]
    fn unconvertible_record_reports_unexpected_failure() {
        let mut spec = lender_application().expect("bundled spec");
        let strategy = spec
            .steps
            .iter_mut()
            .flat_map(|step| step.fields.iter_mut())
            .find(|field| field.id == "investmentStrategy")
            .expect("strategy field");
        strategy
            .choices
            .get_or_insert_with(Vec::new)
            .push("Wholesale".into());

        let mut store = FormStore::new(spec);
        for (name, value) in [
            ("fullName", json!("Dana Reyes")),
            ("email", json!("dana@example.com")),
            ("phoneNumber", json!("555-123-4567")),
            ("creditScore", json!("740-759")),
            ("propertyAddress", json!("9 Elm St, Dayton, OH")),
            ("propertyType", json!("Mixed-Use")),
            ("purchasePrice", json!("1,234,567")),
            ("investmentStrategy", json!("Wholesale")),
            ("consentTransactional", json!(true)),
        ] {
            store.set_field(name, value).unwrap();
        }
        while !store.is_last_step() {
            assert!(matches!(store.go_next(), StepOutcome::Advanced(_)));
        }
        let collector = FakeCollector::new(accepted);

        let err = block_on(store.submit(&collector, &SubmissionContext::default())).unwrap_err();
        assert!(matches!(err, StoreError::Record(_)));
        assert_eq!(collector.calls(), 0);
        assert_eq!(store.status(), SubmitStatus::Error);
        assert_eq!(store.error_message(), Some(UNEXPECTED_FAILURE));
        assert!(store.can_submit());
    }
}
