//! HTTP page fetcher: URL validation, one bounded GET, HTML extraction.

use crate::extract::{ExtractOptions, extract_page};
use async_trait::async_trait;
use delve_core::config::FetchConfig;
use delve_core::error::FetchError;
use delve_core::research::{FetchedPage, PageFetcher};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Path extensions of documents that are not HTML pages.
const DOCUMENT_EXTENSIONS: &[&str] = &[".pdf", ".doc", ".docx", ".xls", ".xlsx", ".ppt", ".pptx"];

/// Content-type fragments of documents that are not HTML pages.
const DOCUMENT_CONTENT_TYPES: &[&str] = &["pdf", "msword", "officedocument", "ms-excel", "ms-powerpoint"];

/// Check that `raw` is an http(s) URL pointing at something other than an office/PDF document.
pub fn validate_url(raw: &str) -> Result<Url, FetchError> {
    let url = Url::parse(raw.trim()).map_err(|e| FetchError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(FetchError::InvalidUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme '{}', expected http or https", url.scheme()),
        });
    }

    let path = url.path().to_ascii_lowercase();
    if DOCUMENT_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
        return Err(FetchError::UnsupportedDocument {
            url: raw.to_string(),
        });
    }
    Ok(url)
}

fn is_document_content_type(content_type: &str) -> bool {
    let content_type = content_type.to_ascii_lowercase();
    DOCUMENT_CONTENT_TYPES
        .iter()
        .any(|fragment| content_type.contains(fragment))
}

/// Fetches pages over HTTP with reqwest.
pub struct HttpPageFetcher {
    client: reqwest::Client,
    timeout_secs: u64,
    max_body_bytes: usize,
    options: ExtractOptions,
}

impl HttpPageFetcher {
    pub fn new(config: &FetchConfig) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()?;
        Ok(Self {
            client,
            timeout_secs: config.timeout_secs,
            max_body_bytes: config.max_body_bytes,
            options: ExtractOptions::from(config),
        })
    }

    /// Read the body chunk by chunk, stopping at `max_body_bytes`.
    async fn read_body(
        &self,
        url: &str,
        mut response: reqwest::Response,
    ) -> Result<String, FetchError> {
        let mut body: Vec<u8> = Vec::new();
        loop {
            let chunk = response.chunk().await.map_err(|e| {
                if e.is_timeout() {
                    self.send_error(url, e)
                } else {
                    FetchError::Body {
                        url: url.to_string(),
                        message: e.to_string(),
                    }
                }
            })?;
            let Some(chunk) = chunk else {
                break;
            };
            let room = self.max_body_bytes.saturating_sub(body.len());
            if chunk.len() > room {
                body.extend_from_slice(&chunk[..room]);
                debug!(url, limit = self.max_body_bytes, "Body over size limit, truncated");
                break;
            }
            body.extend_from_slice(&chunk);
        }
        // a cut may split a multi-byte character
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    fn send_error(&self, url: &str, error: reqwest::Error) -> FetchError {
        if error.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
                timeout_secs: self.timeout_secs,
            }
        } else {
            FetchError::Transport {
                url: url.to_string(),
                message: error.to_string(),
            }
        }
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let target = validate_url(url)?;
        debug!(url, "Fetching page");

        let response = self
            .client
            .get(target)
            .send()
            .await
            .map_err(|e| self.send_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        if is_document_content_type(&content_type) {
            return Err(FetchError::UnsupportedDocument {
                url: url.to_string(),
            });
        }

        let body = self.read_body(url, response).await?;
        let extracted = extract_page(&body, &self.options);
        if extracted.content.is_empty() {
            return Err(FetchError::EmptyContent {
                url: url.to_string(),
            });
        }
        debug!(
            url,
            chars = extracted.content.chars().count(),
            paragraphs = extracted.paragraphs.len(),
            "Extracted page"
        );

        Ok(FetchedPage {
            url: url.to_string(),
            title: extracted.title,
            content: extracted.content,
            paragraphs: extracted.paragraphs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url_accepts_http_and_https() {
        assert!(validate_url("https://example.com/article").is_ok());
        assert!(validate_url("http://example.com/").is_ok());
    }

    #[test]
    fn test_validate_url_rejects_other_schemes() {
        for raw in ["ftp://example.com/file", "file:///etc/passwd", "not a url", ""] {
            let err = validate_url(raw).unwrap_err();
            assert!(matches!(err, FetchError::InvalidUrl { .. }), "{raw}");
            assert!(!err.to_string().is_empty());
        }
    }

    #[test]
    fn test_validate_url_rejects_documents_case_insensitively() {
        for raw in [
            "https://example.com/report.PDF",
            "https://example.com/a/b.docx",
            "https://example.com/sheet.xls?download=1",
            "https://example.com/deck.pptx",
        ] {
            assert!(
                matches!(validate_url(raw), Err(FetchError::UnsupportedDocument { .. })),
                "{raw}"
            );
        }
        // extension in the query string is not the path
        assert!(validate_url("https://example.com/view?file=a.pdf").is_ok());
    }

    #[test]
    fn test_document_content_types() {
        assert!(is_document_content_type("application/pdf"));
        assert!(is_document_content_type(
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        ));
        assert!(is_document_content_type("application/msword"));
        assert!(!is_document_content_type("text/html; charset=utf-8"));
    }

    #[tokio::test]
    async fn test_fetch_invalid_url_fails_without_network() {
        let fetcher = HttpPageFetcher::new(&FetchConfig::default()).unwrap();
        let err = fetcher.fetch("mailto:someone@example.com").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl { .. }));
    }
}
