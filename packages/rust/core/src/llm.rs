//! LLM-backed oracles over an OpenAI-compatible chat-completions API.
//!
//! One [`LlmClient`] serves discovery, insight extraction, aggregate insight,
//! and people extraction. JSON answers may arrive wrapped in a markdown code
//! fence; the fence is stripped before parsing.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use prospector_shared::{
    AppConfig, CompanyCandidate, CompanyOutcome, InsightPayload, Person, ProspectorError, Result,
    resolve_api_key,
};

use crate::collaborators::{AggregateInsight, CompanyDiscovery, InsightExtractor};

/// Temperature for extraction-style calls where creativity is unwanted.
const EXTRACTION_TEMPERATURE: f32 = 0.1;

/// Temperature for the narrative aggregate insight.
const AGGREGATE_TEMPERATURE: f32 = 0.5;

/// Longest slice of an error body kept in error messages.
const MAX_ERROR_BODY_CHARS: usize = 300;

static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^\s*```[A-Za-z0-9_-]*\s*\n?(.*?)\s*```\s*$").expect("valid code fence regex")
});

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CompanyList {
    Wrapped { companies: Vec<CompanyCandidate> },
    Bare(Vec<CompanyCandidate>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PeopleList {
    Wrapped { people: Vec<Person> },
    Bare(Vec<Person>),
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Chat-completions client for OpenRouter or any OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct LlmClient {
    http: Client,
    base_url: String,
    model: String,
}

impl LlmClient {
    /// Build a client from the `[llm]` config section, reading the API key
    /// from the configured environment variable.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let api_key = resolve_api_key(config)?;
        Self::new(
            &config.llm.base_url,
            &api_key,
            &config.llm.model,
            Duration::from_secs(config.llm.timeout_secs),
        )
    }

    pub fn new(base_url: &str, api_key: &str, model: &str, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|e| ProspectorError::config(format!("invalid API key: {e}")))?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert("X-Title", HeaderValue::from_static("Prospector"));

        let http = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| ProspectorError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    /// Send one system + user exchange and return the assistant's text.
    async fn complete(&self, system: &str, user: &str, temperature: f32, json: bool) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature,
            response_format: json.then_some(ResponseFormat {
                kind: "json_object",
            }),
        };

        debug!(model = %self.model, json, "chat completion request");

        let response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProspectorError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
            return Err(ProspectorError::Oracle(format!("HTTP {status}: {body}")));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProspectorError::parse(format!("invalid chat response: {e}")))?;

        chat.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ProspectorError::Oracle("response contained no message".into()))
    }

    async fn complete_json<T: DeserializeOwned>(
        &self,
        system: &str,
        user: &str,
        temperature: f32,
    ) -> Result<T> {
        let text = self.complete(system, user, temperature, true).await?;
        parse_json_answer(&text)
    }

    /// Extract contact people from the text of a company's team/contact pages.
    #[instrument(skip_all, fields(website = %website))]
    pub async fn extract_people(&self, website: &str, combined_text: &str) -> Result<Vec<Person>> {
        let user = format!("Website: {website}\n\nPage text:\n{combined_text}");
        let list: PeopleList = self
            .complete_json(PEOPLE_PROMPT, &user, EXTRACTION_TEMPERATURE)
            .await?;
        Ok(match list {
            PeopleList::Wrapped { people } | PeopleList::Bare(people) => people,
        })
    }
}

/// Strip an optional markdown code fence and parse the remainder as JSON.
pub fn parse_json_answer<T: DeserializeOwned>(text: &str) -> Result<T> {
    let body = match CODE_FENCE.captures(text).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str(),
        None => text.trim(),
    };
    serde_json::from_str(body).map_err(|e| {
        let preview: String = body.chars().take(120).collect();
        ProspectorError::parse(format!("malformed oracle output ({e}): {preview}"))
    })
}

// ---------------------------------------------------------------------------
// Oracle implementations
// ---------------------------------------------------------------------------

#[async_trait]
impl CompanyDiscovery for LlmClient {
    #[instrument(skip_all, fields(query = %query, limit = limit, temperature = temperature))]
    async fn discover(&self, query: &str, limit: usize, temperature: f32) -> Result<Vec<CompanyCandidate>> {
        let user = format!("Market query: {query}\nReturn up to {limit} companies.");
        let list: CompanyList = self.complete_json(DISCOVERY_PROMPT, &user, temperature).await?;

        let mut companies = match list {
            CompanyList::Wrapped { companies } | CompanyList::Bare(companies) => companies,
        };
        companies.retain(|c| !c.name.trim().is_empty());
        companies.truncate(limit);

        debug!(count = companies.len(), "discovery returned candidates");
        Ok(companies)
    }
}

#[async_trait]
impl InsightExtractor for LlmClient {
    #[instrument(skip_all, fields(company = %company_name))]
    async fn extract(&self, company_name: &str, website: &str, combined_text: &str) -> Result<InsightPayload> {
        let user = format!("Company: {company_name}\nWebsite: {website}\n\nWebsite text:\n{combined_text}");
        let mut payload: InsightPayload = self
            .complete_json(EXTRACTION_PROMPT, &user, EXTRACTION_TEMPERATURE)
            .await?;

        if payload.summary.trim().is_empty() {
            return Err(ProspectorError::parse("insight payload has an empty summary"));
        }
        payload.name = company_name.to_string();
        payload.website = website.to_string();
        Ok(payload)
    }
}

#[async_trait]
impl AggregateInsight for LlmClient {
    #[instrument(skip_all, fields(query = %query, companies = companies.len()))]
    async fn aggregate_insight(&self, query: &str, companies: &[CompanyOutcome]) -> Result<String> {
        let listing = companies
            .iter()
            .map(|c| match c {
                CompanyOutcome::Success { extracted, .. } => {
                    format!("- {}: {} {}", c.name(), c.description(), extracted.summary)
                }
                CompanyOutcome::Failure { .. } => format!("- {}: {}", c.name(), c.description()),
            })
            .collect::<Vec<_>>()
            .join("\n");
        let user = format!("Market query: {query}\n\nCompanies:\n{listing}");

        let text = self
            .complete(AGGREGATE_PROMPT, &user, AGGREGATE_TEMPERATURE, false)
            .await?;
        Ok(text.trim().to_string())
    }
}

// ---------------------------------------------------------------------------
// Prompts
// ---------------------------------------------------------------------------

const DISCOVERY_PROMPT: &str = "You are a market research assistant. Given a market query, list real, \
currently operating companies that match it. Prefer a varied mix of company sizes and regions. \
Respond with JSON only: {\"companies\": [{\"name\": string, \"website\": string or null, \
\"description\": string, \"industry\": string, \"country\": string}]}. \
Only include a website if you are confident it is the company's official homepage.";

const EXTRACTION_PROMPT: &str = "You analyse company websites for B2B research. From the supplied \
website text, produce JSON only with these fields: \"summary\" (2-3 sentences), \
\"value_proposition\", \"pricing_model\", \"target_customers\", \"employee_estimate\" (strings or null), \
\"scores\": {\"market_fit\", \"growth_signal\", \"product_maturity\"} (integers 0-100), \
and \"tags\" (up to 6 short lowercase strings). Base every field on the text; use null when unknown.";

const AGGREGATE_PROMPT: &str = "You are a market analyst. Given a market query and the companies found \
for it, write one concise paragraph (at most 120 words) describing the landscape: common themes, \
notable differences, and gaps. Plain text only, no lists or markdown.";

const PEOPLE_PROMPT: &str = "Extract the people listed on this company's team, about, or contact pages. \
Respond with JSON only: {\"people\": [{\"name\": string, \"email\": string or null, \
\"phone\": string or null, \"role\": string or null}]}. Only include contact details that appear \
verbatim in the text. Return an empty list if nobody is named.";
