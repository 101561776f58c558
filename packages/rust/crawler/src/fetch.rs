//! Bounded-timeout HTML fetching.
//!
//! Every request runs inside `tokio::time::timeout`, so an expired deadline
//! drops the in-flight request future and releases its socket immediately
//! instead of waiting for a client-side read timer.

use std::net::IpAddr;
use std::time::Duration;

use reqwest::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use tracing::debug;
use url::Url;

use prospector_shared::{ProspectorError, Result, ScrapeConfig};

/// User-Agent string for scrape requests.
const USER_AGENT: &str = concat!(
    "Mozilla/5.0 (compatible; Prospector/",
    env!("CARGO_PKG_VERSION"),
    "; company research crawler)"
);

/// Accept header sent with every page request.
const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Maximum number of redirects followed per request.
const MAX_REDIRECTS: usize = 5;

/// HTTP client wrapper that fetches HTML pages under a hard deadline.
#[derive(Debug, Clone)]
pub struct PageFetcher {
    client: Client,
    timeout: Duration,
    max_body_bytes: u64,
    /// Allow localhost/private IPs (for integration tests with mock servers).
    allow_private_hosts: bool,
}

impl PageFetcher {
    /// Create a fetcher with the given scrape configuration.
    pub fn new(config: &ScrapeConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.8"));

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(|e| ProspectorError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            timeout: config.timeout,
            max_body_bytes: config.max_body_bytes,
            allow_private_hosts: false,
        })
    }

    /// Allow fetching localhost/private IPs (mock servers in tests).
    pub fn allow_private_hosts(mut self) -> Self {
        self.allow_private_hosts = true;
        self
    }

    /// Fetch a page and return its body, failing on network errors,
    /// non-2xx statuses, oversized bodies, or an expired deadline.
    pub async fn fetch_html(&self, url: &Url) -> Result<String> {
        if !self.allow_private_hosts && is_ssrf_target(url) {
            return Err(ProspectorError::validation(format!(
                "{url}: refusing to fetch private or non-HTTP address"
            )));
        }

        match tokio::time::timeout(self.timeout, self.fetch_unbounded(url)).await {
            Ok(result) => result,
            Err(_) => Err(ProspectorError::Network(format!(
                "{url}: timed out after {}ms",
                self.timeout.as_millis()
            ))),
        }
    }

    fn too_large(&self, url: &Url) -> ProspectorError {
        ProspectorError::validation(format!(
            "{url}: response too large (max {} bytes)",
            self.max_body_bytes
        ))
    }

    async fn fetch_unbounded(&self, url: &Url) -> Result<String> {
        debug!(%url, "fetching page");

        let mut response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| ProspectorError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProspectorError::Network(format!("{url}: HTTP {status}")));
        }

        if let Some(len) = response.content_length() {
            if len > self.max_body_bytes {
                return Err(self.too_large(url));
            }
        }

        // Chunked responses carry no length up front; stop reading at the cap.
        let mut body: Vec<u8> = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| ProspectorError::Network(format!("{url}: body read failed: {e}")))?
        {
            let read = (body.len() + chunk.len()) as u64;
            if read > self.max_body_bytes {
                return Err(self.too_large(url));
            }
            body.extend_from_slice(&chunk);
        }

        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

// ---------------------------------------------------------------------------
// SSRF protection
// ---------------------------------------------------------------------------

/// Check if a URL targets a potentially dangerous resource.
///
/// Discovered company websites come from an LLM, so they are untrusted input.
fn is_ssrf_target(url: &Url) -> bool {
    match url.scheme() {
        "http" | "https" => {}
        _ => return true,
    }

    if let Some(host) = url.host_str() {
        let bare = host.trim_start_matches('[').trim_end_matches(']');
        if let Ok(ip) = bare.parse::<IpAddr>() {
            return is_private_ip(&ip);
        }
        if host == "localhost" || host.ends_with(".local") || host.ends_with(".internal") {
            return true;
        }
    }

    false
}

/// Check if an IP is in a private/reserved range.
fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                // 100.64.0.0/10 (Carrier-grade NAT)
                || (v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64)
        }
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified(),
    }
}
