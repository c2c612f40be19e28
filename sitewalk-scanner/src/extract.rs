use crate::error::{Result, ScanError};
use scraper::{Html, Selector};

/// Raw references pulled out of a document, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extracted {
    pub links: Vec<String>,
    pub assets: Vec<String>,
}

/// Finds link and asset references in a fetched body.
///
/// Implementations run on tokio's blocking pool, so they are free to do CPU
/// heavy parsing. An `Err` (or a panic) is recorded on the page being crawled
/// and does not stop the crawl.
pub trait Extractor: Send + Sync {
    fn extract(&self, body: &[u8]) -> Result<Extracted>;
}

/// Elements that carry a reference, with the attribute that holds it.
const REFERENCE_ELEMENTS: &str = "a[href], script[src], link[href], img[src]";

/// Default extractor: anchors are links; scripts, `<link>` and images are assets.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlExtractor;

impl Extractor for HtmlExtractor {
    fn extract(&self, body: &[u8]) -> Result<Extracted> {
        let selector = Selector::parse(REFERENCE_ELEMENTS)
            .map_err(|e| ScanError::Extraction(format!("bad selector: {}", e)))?;

        let html = String::from_utf8_lossy(body);
        let document = Html::parse_document(&html);
        let mut extracted = Extracted::default();

        for element in document.select(&selector) {
            let element = element.value();
            match element.name() {
                "a" => {
                    if let Some(href) = element.attr("href") {
                        extracted.links.push(href.to_string());
                    }
                }
                "script" | "img" => {
                    if let Some(src) = element.attr("src") {
                        extracted.assets.push(src.to_string());
                    }
                }
                "link" => {
                    if let Some(href) = element.attr("href") {
                        extracted.assets.push(href.to_string());
                    }
                }
                _ => {}
            }
        }

        Ok(extracted)
    }
}
