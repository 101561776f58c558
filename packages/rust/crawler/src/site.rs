//! Bounded site scraping: a homepage plus at most one page per link category.

use futures::future::join_all;
use scraper::Html;
use tracing::{debug, instrument, warn};
use url::Url;

use prospector_shared::{ProspectorError, Result, ScrapeConfig};

use crate::fetch::PageFetcher;
use crate::links::{
    CONTACT_KEYWORDS, LinkCandidate, PRICING_KEYWORDS, PRODUCT_KEYWORDS, TEAM_KEYWORDS,
    extract_links, find_link, same_page,
};
use crate::text::html_to_text;

/// Which kind of page a scraped text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageKind {
    Home,
    Product,
    Pricing,
    Team,
    Contact,
}

impl PageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Home => "home",
            Self::Product => "product",
            Self::Pricing => "pricing",
            Self::Team => "team",
            Self::Contact => "contact",
        }
    }
}

impl std::fmt::Display for PageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A secondary page to look for on the homepage, by keyword.
#[derive(Debug, Clone, Copy)]
pub struct LinkCategory {
    pub kind: PageKind,
    pub keywords: &'static [&'static str],
}

/// Categories fetched for company insight extraction.
pub const INSIGHT_CATEGORIES: &[LinkCategory] = &[
    LinkCategory {
        kind: PageKind::Product,
        keywords: PRODUCT_KEYWORDS,
    },
    LinkCategory {
        kind: PageKind::Pricing,
        keywords: PRICING_KEYWORDS,
    },
];

/// Categories fetched when looking for contact people.
pub const CONTACT_CATEGORIES: &[LinkCategory] = &[
    LinkCategory {
        kind: PageKind::Team,
        keywords: TEAM_KEYWORDS,
    },
    LinkCategory {
        kind: PageKind::Contact,
        keywords: CONTACT_KEYWORDS,
    },
];

/// Visible text of one fetched page.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapePage {
    pub kind: PageKind,
    pub url: String,
    pub text: String,
}

/// Pages fetched from one site plus the errors hit along the way.
///
/// A failed homepage yields no pages and exactly one error. Secondary page
/// failures are recorded but never remove the homepage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScrapeResult {
    pub pages: Vec<ScrapePage>,
    pub errors: Vec<String>,
}

impl ScrapeResult {
    fn homepage_failure(message: String) -> Self {
        Self {
            pages: Vec::new(),
            errors: vec![message],
        }
    }

    /// Concatenate page texts with a label per page, in page order.
    pub fn combined_text(&self) -> String {
        self.pages
            .iter()
            .map(|p| format!("[{} page: {}]\n{}", p.kind, p.url, p.text))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

// ---------------------------------------------------------------------------
// SiteScraper
// ---------------------------------------------------------------------------

/// Fetches a company homepage and a bounded set of linked pages.
#[derive(Debug, Clone)]
pub struct SiteScraper {
    fetcher: PageFetcher,
}

impl SiteScraper {
    pub fn new(config: &ScrapeConfig) -> Result<Self> {
        Ok(Self {
            fetcher: PageFetcher::new(config)?,
        })
    }

    /// Allow scraping localhost/private IPs (mock servers in tests).
    pub fn allow_private_hosts(mut self) -> Self {
        self.fetcher = self.fetcher.allow_private_hosts();
        self
    }

    /// Scrape the homepage plus its product and pricing pages.
    pub async fn scrape(&self, base_url: &str) -> ScrapeResult {
        self.scrape_with(base_url, INSIGHT_CATEGORIES).await
    }

    /// Scrape the homepage, then fetch at most one linked page per category
    /// concurrently.
    ///
    /// A secondary link is skipped when it points back at the homepage or at
    /// a page another category already claimed.
    #[instrument(skip_all, fields(url = %base_url))]
    pub async fn scrape_with(&self, base_url: &str, categories: &[LinkCategory]) -> ScrapeResult {
        let home_url = match parse_base_url(base_url) {
            Ok(url) => url,
            Err(e) => return ScrapeResult::homepage_failure(format!("homepage: {e}")),
        };

        let html = match self.fetcher.fetch_html(&home_url).await {
            Ok(html) => html,
            Err(e) => {
                warn!(url = %home_url, error = %e, "homepage fetch failed");
                return ScrapeResult::homepage_failure(format!("homepage: {e}"));
            }
        };

        let (home_text, links) = analyze_page(&html, &home_url);
        let mut result = ScrapeResult {
            pages: vec![ScrapePage {
                kind: PageKind::Home,
                url: home_url.to_string(),
                text: home_text,
            }],
            errors: Vec::new(),
        };

        let targets = select_targets(&links, &home_url, categories);
        debug!(targets = targets.len(), "secondary pages selected");

        let fetches = targets.into_iter().map(|(kind, url)| self.fetch_page(kind, url));
        for outcome in join_all(fetches).await {
            match outcome {
                Ok(page) => result.pages.push(page),
                Err(e) => result.errors.push(e),
            }
        }

        result
    }

    async fn fetch_page(&self, kind: PageKind, url: Url) -> std::result::Result<ScrapePage, String> {
        match self.fetcher.fetch_html(&url).await {
            Ok(html) => {
                let (text, _) = analyze_page(&html, &url);
                Ok(ScrapePage {
                    kind,
                    url: url.to_string(),
                    text,
                })
            }
            Err(e) => {
                debug!(%url, %kind, error = %e, "secondary page fetch failed");
                Err(format!("{kind} page: {e}"))
            }
        }
    }
}

/// Parse a discovered website into an absolute http(s) URL, assuming
/// `https://` when no scheme is given.
pub fn parse_base_url(raw: &str) -> Result<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ProspectorError::validation("no website"));
    }

    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    let url = Url::parse(&with_scheme)
        .map_err(|e| ProspectorError::validation(format!("invalid website '{trimmed}': {e}")))?;

    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(ProspectorError::validation(format!(
            "unsupported website '{trimmed}'"
        )));
    }

    Ok(url)
}

/// Parse HTML once and pull out visible text and links.
///
/// `Html` is not `Send`, so it must never live across an await point.
fn analyze_page(html: &str, url: &Url) -> (String, Vec<LinkCandidate>) {
    let doc = Html::parse_document(html);
    (html_to_text(&doc), extract_links(&doc, url))
}

fn select_targets(links: &[LinkCandidate], home: &Url, categories: &[LinkCategory]) -> Vec<(PageKind, Url)> {
    let mut targets: Vec<(PageKind, Url)> = Vec::new();
    for category in categories {
        let Some(link) = find_link(links, category.keywords) else {
            continue;
        };
        if same_page(&link.url, home) || targets.iter().any(|(_, u)| same_page(u, &link.url)) {
            continue;
        }
        targets.push((category.kind, link.url.clone()));
    }
    targets
}
