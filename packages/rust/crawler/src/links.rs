//! Link extraction and keyword-based link classification.

use scraper::{Html, Selector};
use url::Url;

/// Keywords marking a product or features page.
pub const PRODUCT_KEYWORDS: &[&str] = &["product", "solution", "platform", "features"];

/// Keywords marking a pricing page.
pub const PRICING_KEYWORDS: &[&str] = &["pricing", "price", "plans", "plan", "how-it-works"];

/// Keywords marking a team or about page.
pub const TEAM_KEYWORDS: &[&str] = &["team", "leadership", "people", "about", "company"];

/// Keywords marking a contact page.
pub const CONTACT_KEYWORDS: &[&str] = &["contact"];

/// An anchor found on a page, resolved to an absolute URL.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkCandidate {
    pub url: Url,
    /// Visible anchor text, trimmed.
    pub text: String,
}

impl LinkCandidate {
    /// True when the link's path/query or its anchor text contains `keyword`
    /// (case-insensitive).
    ///
    /// The host is not considered, otherwise a domain like `productly.io`
    /// would classify every link on the site as a product page.
    pub fn matches(&self, keyword: &str) -> bool {
        let keyword = keyword.to_lowercase();
        let mut target = self.url.path().to_lowercase();
        if let Some(query) = self.url.query() {
            target.push('?');
            target.push_str(&query.to_lowercase());
        }
        target.contains(&keyword) || self.text.to_lowercase().contains(&keyword)
    }
}

/// Extract all `<a href>` links from a document, resolved against the base URL.
///
/// Anchors, `javascript:`, `mailto:` and `tel:` links are skipped, fragments
/// are stripped, and only http(s) targets are kept.
pub fn extract_links(doc: &Html, base_url: &Url) -> Vec<LinkCandidate> {
    let Ok(link_sel) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    let mut links = Vec::new();

    for el in doc.select(&link_sel) {
        let Some(href) = el.value().attr("href") else {
            continue;
        };
        let href = href.trim();
        if href.is_empty()
            || href.starts_with('#')
            || href.starts_with("javascript:")
            || href.starts_with("mailto:")
            || href.starts_with("tel:")
        {
            continue;
        }

        if let Ok(mut resolved) = base_url.join(href) {
            if !matches!(resolved.scheme(), "http" | "https") {
                continue;
            }
            resolved.set_fragment(None);
            let text = el.text().collect::<Vec<_>>().join(" ");
            links.push(LinkCandidate {
                url: resolved,
                text: text.split_whitespace().collect::<Vec<_>>().join(" "),
            });
        }
    }

    links
}

/// Return the first link (in document order) matching the first keyword that
/// matches anything.
///
/// Keywords are tried in priority order, so with `["pricing", "plans"]` a
/// `/pricing` link beats an earlier `/plans` link.
pub fn find_link<'a>(links: &'a [LinkCandidate], keywords: &[&str]) -> Option<&'a LinkCandidate> {
    keywords
        .iter()
        .find_map(|kw| links.iter().find(|link| link.matches(kw)))
}

/// Compare two URLs ignoring fragment and a trailing slash.
pub fn same_page(a: &Url, b: &Url) -> bool {
    fn key(u: &Url) -> String {
        let mut u = u.clone();
        u.set_fragment(None);
        let s = u.to_string();
        s.trim_end_matches('/').to_string()
    }
    key(a) == key(b)
}
