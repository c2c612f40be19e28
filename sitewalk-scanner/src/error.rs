use thiserror::Error;

/// Failure to retrieve a page body.
///
/// The display strings are what ends up in a page's `fetchError` field, so
/// transport errors are rendered exactly as the HTTP client reports them.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("fetch failed: HTTP status {0}")]
    Status(u16),

    #[error("fetch failed: body exceeds {0} bytes")]
    BodyTooLarge(usize),

    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    #[error("{0}")]
    Other(String),
}

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Other error: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, ScanError>;
