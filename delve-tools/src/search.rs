//! DuckDuckGo HTML search provider.
//!
//! Queries the HTML endpoint (no API key), reads the result anchors and
//! unwraps DuckDuckGo's redirect links to the target URLs.

use crate::extract::normalize_whitespace;
use async_trait::async_trait;
use delve_core::config::SearchConfig;
use delve_core::error::SearchError;
use delve_core::research::{SearchHit, SearchProvider};
use scraper::{Html, Selector};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::debug;
use url::Url;

static RESULT_LINKS: LazyLock<Option<Selector>> =
    LazyLock::new(|| Selector::parse("a.result__a").ok());

/// Web search through DuckDuckGo's HTML interface.
pub struct DuckDuckGoSearch {
    client: reqwest::Client,
    base_url: String,
    timeout_secs: u64,
}

impl DuckDuckGoSearch {
    pub fn new(config: &SearchConfig) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(&config.user_agent)
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout_secs: config.timeout_secs,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGoSearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, SearchError> {
        let endpoint = format!("{}/html/?q={}", self.base_url, urlencoding::encode(query));
        debug!(query, endpoint = %endpoint, "Searching DuckDuckGo");

        let response = self.client.get(&endpoint).send().await.map_err(|e| {
            if e.is_timeout() {
                SearchError::Timeout {
                    timeout_secs: self.timeout_secs,
                }
            } else {
                SearchError::Transport {
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::HttpStatus {
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| SearchError::Transport {
            message: format!("Failed to read search response: {e}"),
        })?;

        let mut hits = parse_results(&body, &self.base_url);
        hits.truncate(max_results);
        debug!(query, count = hits.len(), "Parsed search results");
        Ok(hits)
    }

    fn name(&self) -> &str {
        "duckduckgo"
    }
}

/// Extract result hits from a DuckDuckGo HTML results page.
///
/// Relative and protocol-relative links are resolved against `base_url`;
/// redirect links carrying a `uddg` parameter are replaced by its target.
/// Only http(s) targets are kept.
pub fn parse_results(html: &str, base_url: &str) -> Vec<SearchHit> {
    let Some(selector) = RESULT_LINKS.as_ref() else {
        return Vec::new();
    };
    let base = Url::parse(base_url).ok();
    let document = Html::parse_document(html);

    document
        .select(selector)
        .filter_map(|anchor| {
            let href = anchor.value().attr("href")?;
            let url = resolve_result_url(href, base.as_ref())?;
            let title = normalize_whitespace(&anchor.text().collect::<String>());
            let hit = SearchHit::new(url);
            Some(if title.is_empty() {
                hit
            } else {
                hit.with_title(title)
            })
        })
        .collect()
}

fn resolve_result_url(href: &str, base: Option<&Url>) -> Option<String> {
    let parsed = match Url::parse(href) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => base?.join(href).ok()?,
        Err(_) => return None,
    };

    let target = match parsed
        .query_pairs()
        .find(|(key, _)| key == "uddg")
        .map(|(_, value)| value.into_owned())
    {
        Some(redirect) => Url::parse(&redirect).ok()?,
        None => parsed,
    };

    matches!(target.scheme(), "http" | "https").then(|| target.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PAGE: &str = r#"<html><body>
        <div class="result">
          <a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.iea.org%2Freports%2Fev-outlook&amp;rut=abc">
            Global EV <b>Outlook</b>
          </a>
        </div>
        <div class="result">
          <a class="result__a" href="https://example.org/direct">Direct link</a>
        </div>
        <div class="result">
          <a class="result__a" href="/l/?uddg=ftp%3A%2F%2Ffiles.example.org%2Fdata">FTP mirror</a>
        </div>
        <div class="result">
          <a class="result__snippet" href="https://example.org/snippet">Not a result title</a>
        </div>
    </body></html>"#;

    #[test]
    fn test_parse_results_unwraps_redirects_and_filters_schemes() {
        let hits = parse_results(PAGE, "https://html.duckduckgo.com");
        let urls: Vec<&str> = hits.iter().map(|h| h.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://www.iea.org/reports/ev-outlook",
                "https://example.org/direct",
            ]
        );
        assert_eq!(hits[0].title.as_deref(), Some("Global EV Outlook"));
    }

    #[test]
    fn test_parse_results_empty_page() {
        assert!(parse_results("<html><body>No results.</body></html>", "https://x").is_empty());
    }
}
