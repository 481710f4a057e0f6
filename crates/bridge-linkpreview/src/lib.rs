pub mod extract;
pub mod fetcher;
pub mod types;

pub use extract::extract_urls;
pub use fetcher::{HttpLinkFetcher, LinkFetcher, fetch_all};
pub use types::{FetchError, LinkPreview};
