//! Contact discovery from company team and contact pages.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use prospector_crawler::{CONTACT_CATEGORIES, SiteScraper};
use prospector_shared::{Person, ProspectorError, Result};

use crate::collaborators::ContactFinder;
use crate::llm::LlmClient;

/// Finds people by scraping a site's team/contact pages and asking the LLM
/// to pull names and contact details out of the text.
pub struct WebContactFinder {
    scraper: SiteScraper,
    llm: Arc<LlmClient>,
    max_text_chars: usize,
}

impl WebContactFinder {
    pub fn new(scraper: SiteScraper, llm: Arc<LlmClient>, max_text_chars: usize) -> Self {
        Self {
            scraper,
            llm,
            max_text_chars,
        }
    }
}

#[async_trait]
impl ContactFinder for WebContactFinder {
    async fn find_people(&self, website: &str) -> Result<Vec<Person>> {
        let scraped = self.scraper.scrape_with(website, CONTACT_CATEGORIES).await;
        if scraped.pages.is_empty() {
            return Err(ProspectorError::Network(scraped.errors.join("; ")));
        }

        debug!(website, pages = scraped.pages.len(), "scraped contact pages");
        let combined = scraped.combined_text();
        let text = prospector_crawler::truncate_chars(&combined, self.max_text_chars);
        self.llm.extract_people(website, text).await
    }
}

/// Prepare people for persistence: trim every field, drop blanks, drop
/// anyone without an email or phone, and keep the first entry per email
/// (case-insensitive).
pub fn clean_people(people: Vec<Person>) -> Vec<Person> {
    fn tidy(value: Option<String>) -> Option<String> {
        value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    let mut seen_emails = HashSet::new();
    people
        .into_iter()
        .map(|p| Person {
            name: p.name.trim().to_string(),
            email: tidy(p.email),
            phone: tidy(p.phone),
            role: tidy(p.role),
        })
        .filter(|p| !p.name.is_empty() && p.is_reachable())
        .filter(|p| match &p.email {
            Some(email) => seen_emails.insert(email.to_lowercase()),
            None => true,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use prospector_shared::ScrapeConfig;

    use super::*;

    fn person(name: &str, email: Option<&str>, phone: Option<&str>) -> Person {
        Person {
            name: name.into(),
            email: email.map(String::from),
            phone: phone.map(String::from),
            role: None,
        }
    }

    #[test]
    fn cleaning_filters_trims_and_dedupes() {
        let cleaned = clean_people(vec![
            person(" Jane Doe ", Some(" jane@acme.io "), None),
            person("Jane D.", Some("JANE@acme.io"), None),
            person("No Contact", Some("  "), None),
            person("Phone Only", None, Some("+1 555 0100")),
            person("", Some("ghost@acme.io"), None),
        ]);

        let names: Vec<&str> = cleaned.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Jane Doe", "Phone Only"]);
        assert_eq!(cleaned[0].email.as_deref(), Some("jane@acme.io"));
    }

    #[tokio::test]
    async fn finds_people_on_team_page() {
        let site = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_string(r#"<a href="/team">Meet the team</a>"#),
            )
            .mount(&site)
            .await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/team"))
            .respond_with(
                wiremock::ResponseTemplate::new(200).set_body_string("<p>Jane Doe, CEO, jane@acme.io</p>"),
            )
            .mount(&site)
            .await;

        let llm_server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/chat/completions"))
            .and(wiremock::matchers::body_string_contains("jane@acme.io"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{ "message": { "content":
                    "{\"people\": [{\"name\": \"Jane Doe\", \"email\": \"jane@acme.io\", \"role\": \"CEO\"}]}" } }]
            })))
            .mount(&llm_server)
            .await;

        let scraper = SiteScraper::new(&ScrapeConfig {
            timeout: Duration::from_secs(2),
            max_body_bytes: 1024 * 1024,
        })
        .unwrap()
        .allow_private_hosts();
        let llm = LlmClient::new(&llm_server.uri(), "k", "m", Duration::from_secs(5)).unwrap();
        let finder = WebContactFinder::new(scraper, Arc::new(llm), 10_000);

        let people = finder.find_people(&site.uri()).await.unwrap();
        assert_eq!(people.len(), 1);
        assert_eq!(people[0].role.as_deref(), Some("CEO"));
    }

    #[tokio::test]
    async fn unreachable_site_is_an_error() {
        let site = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(502))
            .mount(&site)
            .await;

        let scraper = SiteScraper::new(&ScrapeConfig::default()).unwrap().allow_private_hosts();
        let llm = LlmClient::new("http://127.0.0.1:9", "k", "m", Duration::from_secs(1)).unwrap();
        let finder = WebContactFinder::new(scraper, Arc::new(llm), 10_000);

        let err = finder.find_people(&site.uri()).await.unwrap_err();
        assert!(err.to_string().contains("homepage"));
    }
}
