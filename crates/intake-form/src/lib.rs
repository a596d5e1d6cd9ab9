//! Wizard state and submission for the lender intake form.
//!
//! [`FormStore`] owns the values, step index, and submit status; it talks to
//! the outside world only through a [`Collector`], normally a
//! [`WebhookClient`].

pub mod config;
pub mod store;
pub mod submit;

pub use config::{ConfigError, DEFAULT_TIMEOUT_SECS, DEFAULT_WEBHOOK_URL, IntakeConfig};
pub use store::{FormStore, StepOutcome, StoreError, SubmitStatus};
pub use submit::{
    Acknowledgement, Collector, GENERIC_FAILURE, SubmissionContext, SubmissionPayload,
    SubmitError, UNEXPECTED_FAILURE, WebhookClient,
};
