//! Company website scraping.
//!
//! This crate provides:
//! - [`fetch`] — timeout-bounded HTML fetching with SSRF protection
//! - [`links`] — link extraction and keyword classification
//! - [`text`] — visible-text extraction
//! - [`site`] — [`SiteScraper`], which fetches a homepage plus a bounded set of linked pages

pub mod fetch;
pub mod links;
pub mod site;
pub mod text;

pub use fetch::PageFetcher;
pub use links::{LinkCandidate, extract_links, find_link};
pub use site::{
    CONTACT_CATEGORIES, INSIGHT_CATEGORIES, LinkCategory, PageKind, ScrapePage, ScrapeResult,
    SiteScraper, parse_base_url,
};
pub use text::{html_to_text, truncate_chars};
