//! `LinkFetcher` — §4.10 "LinkPreviewer extracts up to N URLs, fetches each
//! under a shared deadline". Grounded in `bridge_providers::openai`'s
//! reqwest client setup (timeout-bounded client, status-code error mapping).

use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::extract::{extract_urls, scrape_meta};
use crate::types::{FetchError, LinkPreview};

#[async_trait]
pub trait LinkFetcher: Send + Sync {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<LinkPreview, FetchError>;
}

pub struct HttpLinkFetcher {
    client: reqwest::Client,
}

impl HttpLinkFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent("bridge-linkpreview/0.1")
                .build()
                .expect("reqwest client"),
        }
    }
}

impl Default for HttpLinkFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LinkFetcher for HttpLinkFetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<LinkPreview, FetchError> {
        let resp = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout { url: url.to_string() }
                } else {
                    FetchError::Http { url: url.to_string(), source: e }
                }
            })?;

        if !resp.status().is_success() {
            return Err(FetchError::Status { url: url.to_string(), status: resp.status().as_u16() });
        }

        let html = resp.text().await.map_err(|e| FetchError::Http { url: url.to_string(), source: e })?;
        let meta = scrape_meta(&html);

        Ok(LinkPreview {
            url: url.to_string(),
            title: meta.title,
            description: meta.description,
            image_url: meta.image_url,
            site_name: meta.site_name,
        })
    }
}

/// Fetch previews for up to `max_urls` links found in `text`, each under
/// `per_fetch_timeout`, skipping (and logging) any that fail rather than
/// failing the whole batch — §4.10.
pub async fn fetch_all(
    fetcher: &dyn LinkFetcher,
    text: &str,
    max_urls: usize,
    per_fetch_timeout: Duration,
) -> Vec<LinkPreview> {
    let urls = extract_urls(text, max_urls);
    let mut previews = Vec::with_capacity(urls.len());
    for url in urls {
        match fetcher.fetch(&url, per_fetch_timeout).await {
            Ok(preview) => previews.push(preview),
            Err(e) => warn!(url = %url, error = %e, "link preview fetch failed, skipping"),
        }
    }
    previews
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct StubFetcher {
        calls: Arc<AtomicUsize>,
        fail_url: Option<String>,
    }

    #[async_trait]
    impl LinkFetcher for StubFetcher {
        async fn fetch(&self, url: &str, _timeout: Duration) -> Result<LinkPreview, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_url.as_deref() == Some(url) {
                return Err(FetchError::Status { url: url.to_string(), status: 404 });
            }
            Ok(LinkPreview {
                url: url.to_string(),
                title: Some("stub".to_string()),
                description: None,
                image_url: None,
                site_name: None,
            })
        }
    }

    #[tokio::test]
    async fn fetch_all_skips_failures_and_keeps_rest() {
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = StubFetcher { calls: calls.clone(), fail_url: Some("https://bad.test/x".to_string()) };
        let text = "see https://good.test/a and https://bad.test/x";
        let previews = fetch_all(&fetcher, text, 10, Duration::from_secs(1)).await;
        assert_eq!(previews.len(), 1);
        assert_eq!(previews[0].url, "https://good.test/a");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn fetch_all_respects_max_urls_bound() {
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = StubFetcher { calls: calls.clone(), fail_url: None };
        let text = "https://a.test https://b.test https://c.test";
        let previews = fetch_all(&fetcher, text, 1, Duration::from_secs(1)).await;
        assert_eq!(previews.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
