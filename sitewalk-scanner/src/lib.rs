pub mod crawler;
pub mod error;
pub mod extract;
pub mod fetcher;
pub mod follow;
pub mod links;
pub mod result;
mod worker;

pub use crawler::{Crawler, ResultCallback, crawl};
pub use error::{FetchError, ScanError};
pub use extract::{Extracted, Extractor, HtmlExtractor};
pub use fetcher::{Fetcher, HttpFetcher};
pub use follow::FollowPredicate;
pub use result::{CrawlRequest, CrawlResult, Page};
pub use worker::ProgressCallback;
