use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkPreview {
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub site_name: Option<String>,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("http error fetching {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("{url} returned non-success status {status}")]
    Status { url: String, status: u16 },
}
