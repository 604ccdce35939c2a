//! HTTP fetcher with robots.txt compliance.

use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::error::{FetchError, FetchResult};
use crate::fetch::robots::fetch_robots_txt;
use crate::traits::fetcher::{FetchedPage, Fetcher};

static TRACKING_PARAMS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(utm_.+|fbclid|gclid|mc_cid|mc_eid)$").expect("valid regex")
});

/// Canonicalize a URL: strip tracking query params and fragments.
pub fn canonicalize_url(url: &str) -> String {
    let Ok(mut parsed) = Url::parse(url) else {
        return url.to_string();
    };

    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(key, _)| !TRACKING_PARAMS.is_match(key))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    parsed.set_fragment(None);
    if kept.is_empty() {
        parsed.set_query(None);
    } else {
        parsed
            .query_pairs_mut()
            .clear()
            .extend_pairs(kept.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    }
    parsed.to_string()
}

/// HTTP fetcher for candidate article URLs.
///
/// Checks robots.txt before every fetch; a disallowed URL raises the
/// distinguished [`FetchError::RobotsDisallowed`] condition. The robots
/// check fails open when robots.txt itself cannot be read.
pub struct HttpFetcher {
    client: reqwest::Client,
    user_agent: String,
}

impl HttpFetcher {
    /// Create a fetcher with the given user agent and timeout.
    pub fn new(user_agent: impl Into<String>, timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            user_agent: user_agent.into(),
        }
    }

    /// Check robots.txt for the URL's site. Fails open on transport errors.
    async fn is_allowed(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return true;
        };
        let site = format!("{}://{}", url.scheme(), host);
        match fetch_robots_txt(&self.client, &site).await {
            Ok(robots) => robots.is_allowed(&self.user_agent, url.path()),
            Err(e) => {
                debug!(site = %site, error = %e, "robots.txt unreadable, failing open");
                true
            }
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> FetchResult<FetchedPage> {
        let canonical = canonicalize_url(url);
        let parsed = Url::parse(&canonical).map_err(|_| FetchError::InvalidUrl {
            url: canonical.clone(),
        })?;

        if !self.is_allowed(&parsed).await {
            warn!(url = %canonical, "blocked by robots.txt");
            return Err(FetchError::RobotsDisallowed { url: canonical });
        }

        debug!(url = %canonical, "fetching article");
        let response = self
            .client
            .get(parsed)
            .header("User-Agent", &self.user_agent)
            .header("Accept", "text/html,application/xhtml+xml")
            .send()
            .await
            .map_err(|e| FetchError::Http(Box::new(e)))?;

        let status = response.status();
        let final_url = response.url().to_string();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: final_url,
            });
        }

        let html = response
            .text()
            .await
            .map_err(|e| FetchError::Http(Box::new(e)))?;

        Ok(FetchedPage { html, final_url })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_strips_tracking_params() {
        let url = "https://news.example.com/story?id=7&utm_source=x&fbclid=abc";
        assert_eq!(
            canonicalize_url(url),
            "https://news.example.com/story?id=7"
        );
    }

    #[test]
    fn test_canonicalize_strips_fragment_and_empty_query() {
        let url = "https://news.example.com/story?utm_campaign=a#section";
        assert_eq!(canonicalize_url(url), "https://news.example.com/story");
    }

    #[test]
    fn test_canonicalize_leaves_plain_urls_alone() {
        let url = "https://news.example.com/story";
        assert_eq!(canonicalize_url(url), url);
    }

    #[test]
    fn test_canonicalize_tolerates_invalid_input() {
        assert_eq!(canonicalize_url("not a url"), "not a url");
    }
}
