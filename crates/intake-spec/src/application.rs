use chrono::{DateTime, NaiveDate};
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum LoanPurpose {
    #[default]
    Purchase,
    Refinance,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum InvestmentStrategy {
    #[default]
    Flip,
    Hold,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum ProjectType {
    #[default]
    #[serde(rename = "Fix & Flip")]
    FixAndFlip,
    #[serde(rename = "Ground Up Construction (GUC)")]
    GroundUpConstruction,
}

/// The record a prospective borrower submits.
///
/// Money amounts stay display strings (`"1,250,000"`) exactly as entered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct Application {
    pub email: String,
    pub full_name: String,
    pub phone_number: String,
    pub credit_score: String,
    pub experience: String,
    pub ownership: String,
    pub property_address: String,
    pub property_type: String,
    pub loan_purpose: LoanPurpose,
    #[serde(deserialize_with = "closing_date")]
    pub closing_date: Option<NaiveDate>,
    pub purchase_price: String,
    pub needs_rehab_funding: bool,
    pub down_payment: String,
    pub additional_reserves: String,
    pub investment_strategy: InvestmentStrategy,
    pub project_type: ProjectType,
    pub rehab_funding_needed: String,
    pub loan_term: String,
    pub additional_info: String,
    pub consent_transactional: bool,
    pub consent_marketing: bool,
}

impl Application {
    /// Builds the typed record from a form value map.
    pub fn from_values(values: &Value) -> Result<Self, serde_json::Error> {
        Self::deserialize(values)
    }
}

/// Accepts `YYYY-MM-DD`, a full RFC 3339 timestamp, or `null`.
fn closing_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    let Some(text) = raw.map(|text| text.trim().to_string()) else {
        return Ok(None);
    };
    if text.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(&text, "%Y-%m-%d")
        .or_else(|_| DateTime::parse_from_rfc3339(&text).map(|stamp| stamp.date_naive()))
        .map(Some)
        .map_err(serde::de::Error::custom)
}
