use crate::error::ScanError;
use serde::{Deserialize, Serialize};

/// One page waiting to be fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlRequest {
    /// Page the link was discovered on; `None` for the seed.
    pub origin_url: Option<String>,
    pub target_url: String,
}

impl CrawlRequest {
    pub fn seed(url: impl Into<String>) -> Self {
        Self {
            origin_url: None,
            target_url: url.into(),
        }
    }

    pub fn discovered(origin: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            origin_url: Some(origin.into()),
            target_url: target.into(),
        }
    }
}

/// What a worker produced for a single [`CrawlRequest`].
///
/// `links` are absolute and fragment-free, `assets` are verbatim; both are
/// de-duplicated in first-seen order and both are empty when `error` is set.
#[derive(Debug)]
pub struct CrawlResult {
    pub request: CrawlRequest,
    pub error: Option<ScanError>,
    pub links: Vec<String>,
    pub assets: Vec<String>,
}

impl CrawlResult {
    pub fn new(request: CrawlRequest, links: Vec<String>, assets: Vec<String>) -> Self {
        Self {
            request,
            error: None,
            links,
            assets,
        }
    }

    pub fn with_error(request: CrawlRequest, error: ScanError) -> Self {
        Self {
            request,
            error: Some(error),
            links: Vec::new(),
            assets: Vec::new(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// A crawled page as reported to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetch_error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assets: Vec<String>,
}

impl Page {
    pub fn new(url: String) -> Self {
        Self {
            url,
            fetch_error: None,
            links: Vec::new(),
            assets: Vec::new(),
        }
    }

    pub fn with_error(url: String, error: String) -> Self {
        Self {
            url,
            fetch_error: Some(error),
            links: Vec::new(),
            assets: Vec::new(),
        }
    }
}

impl From<&CrawlResult> for Page {
    fn from(result: &CrawlResult) -> Self {
        let url = result.request.target_url.clone();
        match result.error {
            Some(ref error) => Page::with_error(url, error.to_string()),
            None => Page {
                links: result.links.clone(),
                assets: result.assets.clone(),
                ..Page::new(url)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;

    #[test]
    fn test_page_from_failed_result_drops_links() {
        let mut result = CrawlResult::with_error(
            CrawlRequest::seed("http://example.com/"),
            FetchError::Status(500).into(),
        );
        result.links.push("http://example.com/a".to_string());

        let page = Page::from(&result);
        assert_eq!(page.url, "http://example.com/");
        assert_eq!(
            page.fetch_error.as_deref(),
            Some("fetch failed: HTTP status 500")
        );
        assert!(page.links.is_empty());
        assert!(page.assets.is_empty());
    }

    #[test]
    fn test_page_json_omits_empty_fields() {
        let page = Page::new("http://example.com/".to_string());
        let json = serde_json::to_string(&page).unwrap();
        assert_eq!(json, r#"{"url":"http://example.com/"}"#);
    }

    #[test]
    fn test_page_json_field_names() {
        let page = Page {
            url: "http://example.com/".to_string(),
            fetch_error: Some("fetch failed: HTTP status 404".to_string()),
            links: vec!["http://example.com/a".to_string()],
            assets: vec!["a.png".to_string()],
        };
        let value = serde_json::to_value(&page).unwrap();
        assert_eq!(value["fetchError"], "fetch failed: HTTP status 404");
        assert_eq!(value["links"][0], "http://example.com/a");
        assert_eq!(value["assets"][0], "a.png");
    }
}
