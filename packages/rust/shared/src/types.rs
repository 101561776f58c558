//! Core domain types shared by the crawler, storage, and pipeline crates.

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Lenient oracle fields
// ---------------------------------------------------------------------------

/// Deserialize `null` as the type's default. `#[serde(default)]` alone only
/// covers a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Deserialize any JSON number (or `null`) as a 0–100 score.
fn score<'de, D>(deserializer: D) -> std::result::Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<f64>::deserialize(deserializer)?.unwrap_or_default();
    if value.is_nan() {
        return Ok(0);
    }
    Ok(value.round().clamp(0.0, 100.0) as u8)
}

// ---------------------------------------------------------------------------
// SearchId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for search run identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchId(pub Uuid);

impl SearchId {
    /// Generate a new time-sortable search identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for SearchId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SearchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SearchId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// Discovery candidates
// ---------------------------------------------------------------------------

/// A company returned by the discovery oracle, not yet enriched.
///
/// Lives only for the duration of one search run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyCandidate {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    /// Homepage URL. Some discovered companies have no verified website.
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub industry: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub country: String,
}

impl CompanyCandidate {
    /// Website as a string slice, empty when absent.
    pub fn website_str(&self) -> &str {
        self.website.as_deref().unwrap_or("")
    }
}

// ---------------------------------------------------------------------------
// Insight payload
// ---------------------------------------------------------------------------

/// Numeric assessments returned by the insight-extraction oracle (0–100).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InsightScores {
    #[serde(default, deserialize_with = "score")]
    pub market_fit: u8,
    #[serde(default, deserialize_with = "score")]
    pub growth_signal: u8,
    #[serde(default, deserialize_with = "score")]
    pub product_maturity: u8,
}

/// Structured insight record for one company.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InsightPayload {
    /// Display name the payload was produced for.
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    /// Website the payload was produced for.
    #[serde(default, deserialize_with = "null_as_default")]
    pub website: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_proposition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pricing_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_customers: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee_estimate: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub scores: InsightScores,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Terminal success/failure record for one candidate after enrichment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CompanyOutcome {
    Success {
        name: String,
        website: Option<String>,
        description: String,
        industry: String,
        country: String,
        extracted: InsightPayload,
    },
    Failure {
        name: String,
        website: Option<String>,
        description: String,
        error_message: String,
    },
}

impl CompanyOutcome {
    /// Build a failure outcome carrying the candidate's identity.
    pub fn failure(candidate: &CompanyCandidate, error_message: impl Into<String>) -> Self {
        Self::Failure {
            name: candidate.name.clone(),
            website: candidate.website.clone(),
            description: candidate.description.clone(),
            error_message: error_message.into(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Success { name, .. } | Self::Failure { name, .. } => name,
        }
    }

    pub fn website(&self) -> Option<&str> {
        match self {
            Self::Success { website, .. } | Self::Failure { website, .. } => website.as_deref(),
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Self::Success { description, .. } | Self::Failure { description, .. } => description,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

// ---------------------------------------------------------------------------
// Contacts
// ---------------------------------------------------------------------------

/// A contact person discovered on a company's website.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Person {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl Person {
    /// A person is only worth keeping if there is some way to reach them.
    pub fn is_reachable(&self) -> bool {
        let has = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        has(&self.email) || has(&self.phone)
    }
}
