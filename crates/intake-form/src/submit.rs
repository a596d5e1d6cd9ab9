use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use intake_spec::Application;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::IntakeConfig;

pub const GENERIC_FAILURE: &str = "Failed to submit application. Please try again.";
pub const UNEXPECTED_FAILURE: &str = "An unexpected error occurred. Please try again.";

/// Best-effort client context attached to a submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionContext {
    pub page_url: Option<String>,
    pub user_agent: Option<String>,
}

impl SubmissionContext {
    pub fn from_config(config: &IntakeConfig) -> Self {
        Self {
            page_url: config.page_url.clone(),
            user_agent: Some(default_user_agent()),
        }
    }
}

/// Body posted to the collector: the record plus submission metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionPayload {
    #[serde(flatten)]
    pub application: Application,
    /// ISO-8601 UTC timestamp with millisecond precision.
    pub submitted_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl SubmissionPayload {
    pub fn new(application: Application, context: &SubmissionContext, now: DateTime<Utc>) -> Self {
        Self {
            application,
            submitted_at: now.to_rfc3339_opts(SecondsFormat::Millis, true),
            page_url: context.page_url.clone(),
            user_agent: context.user_agent.clone(),
        }
    }
}

/// Optional acknowledgement returned by collectors such as `/api/submitForm`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Acknowledgement {
    pub success: Option<bool>,
    pub message: Option<String>,
    pub submission_id: Option<u64>,
}

impl Acknowledgement {
    fn from_body(body: &str) -> Self {
        serde_json::from_str(body).unwrap_or_default()
    }
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("collector responded with status {status}")]
    Status { status: u16, message: Option<String> },
    #[error("request timed out")]
    Timeout,
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),
}

impl From<reqwest::Error> for SubmitError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SubmitError::Timeout
        } else {
            SubmitError::Transport(err)
        }
    }
}

impl SubmitError {
    /// Message safe to show the applicant: the collector's own `message` when
    /// it sent one, otherwise a generic fallback.
    pub fn user_message(&self) -> String {
        match self {
            SubmitError::Status {
                message: Some(message),
                ..
            } => message.clone(),
            SubmitError::Status { .. } | SubmitError::Timeout | SubmitError::Transport(_) => {
                GENERIC_FAILURE.to_string()
            }
        }
    }
}

/// Destination for completed applications.
pub trait Collector {
    fn send(
        &self,
        payload: &SubmissionPayload,
    ) -> impl Future<Output = Result<Acknowledgement, SubmitError>> + Send;
}

/// Posts applications as JSON to a webhook.
#[derive(Debug, Clone)]
pub struct WebhookClient {
    http: reqwest::Client,
    url: String,
}

impl WebhookClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, SubmitError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(default_user_agent())
            .build()?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }

    pub fn from_config(config: &IntakeConfig) -> Result<Self, SubmitError> {
        Self::new(config.webhook_url.clone(), config.timeout)
    }
}

impl Collector for WebhookClient {
    async fn send(&self, payload: &SubmissionPayload) -> Result<Acknowledgement, SubmitError> {
        debug!(url = %self.url, "posting application");
        let response = self.http.post(&self.url).json(payload).send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status.is_success() {
            info!(status = status.as_u16(), "collector accepted application");
            return Ok(Acknowledgement::from_body(&body));
        }

        Err(SubmitError::Status {
            status: status.as_u16(),
            message: body_message(&body),
        })
    }
}

fn body_message(body: &str) -> Option<String> {
    serde_json::from_str::<Value>(body)
        .ok()?
        .get("message")?
        .as_str()
        .map(str::trim)
        .filter(|message| !message.is_empty())
        .map(String::from)
}

fn default_user_agent() -> String {
    format!("lender-intake/{}", env!("CARGO_PKG_VERSION"))
}
