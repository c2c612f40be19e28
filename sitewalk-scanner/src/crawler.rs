use crate::error::{Result, ScanError};
use crate::extract::{Extractor, HtmlExtractor};
use crate::fetcher::{DEFAULT_TIMEOUT_SECS, Fetcher, HttpFetcher};
use crate::follow::{self, FollowPredicate};
use crate::result::{CrawlRequest, CrawlResult, Page};
use crate::worker::{self, Pipeline, ProgressCallback};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};
use url::Url;

/// Called with every page as soon as the scheduler has collected it.
pub type ResultCallback = Arc<dyn Fn(Page) + Send + Sync>;

/// Crawls a site from a seed URL with a fixed pool of workers.
///
/// All crawl state (frontier, seen set, outstanding count) lives inside a
/// single [`Crawler::crawl`] call, so one `Crawler` can run any number of
/// independent crawls.
pub struct Crawler {
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn Extractor>,
    follow: Option<FollowPredicate>,
    progress_callback: Option<ProgressCallback>,
    result_callback: Option<ResultCallback>,
}

impl Crawler {
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT_SECS)
    }

    pub fn with_timeout(timeout_secs: u64) -> Result<Self> {
        let fetcher = HttpFetcher::with_timeout(timeout_secs)?;
        Ok(Self::with_fetcher(Arc::new(fetcher)))
    }

    pub fn with_fetcher(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            fetcher,
            extractor: Arc::new(HtmlExtractor),
            follow: None,
            progress_callback: None,
            result_callback: None,
        }
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn Extractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Without a predicate only links on the seed's host are followed.
    pub fn with_follow_predicate(mut self, follow: FollowPredicate) -> Self {
        self.follow = Some(follow);
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn with_result_callback(mut self, callback: ResultCallback) -> Self {
        self.result_callback = Some(callback);
        self
    }

    /// Crawl from `seed_url` with `workers` concurrent fetchers (at least one).
    ///
    /// Pages come back in the order their results were collected, which
    /// depends on worker timing and differs between runs. Fetch and
    /// extraction failures are recorded on the page; the only error returned
    /// is an unparseable seed.
    pub async fn crawl(&self, seed_url: &str, workers: usize) -> Result<Vec<Page>> {
        let workers = workers.max(1);
        info!("Starting crawl of {} with {} workers", seed_url, workers);

        let parsed_url = Url::parse(seed_url)
            .map_err(|e| ScanError::InvalidUrl(format!("{}: {}", seed_url, e)))?;
        let follow = self
            .follow
            .clone()
            .unwrap_or_else(|| follow::same_host(&parsed_url));

        // Dispatch is a one-slot handoff so the frontier stays with the scheduler.
        let (request_tx, request_rx) = mpsc::channel::<CrawlRequest>(1);
        let (result_tx, mut result_rx) = mpsc::channel::<CrawlResult>(workers);

        let pipeline = Arc::new(Pipeline {
            fetcher: self.fetcher.clone(),
            extractor: self.extractor.clone(),
            progress: self.progress_callback.clone(),
        });
        let worker_handles = worker::spawn_workers(
            workers,
            pipeline,
            Arc::new(Mutex::new(request_rx)),
            result_tx,
        );

        let mut frontier = VecDeque::from([CrawlRequest::seed(seed_url)]);
        let mut seen = HashSet::from([seed_url.to_string()]);
        let mut outstanding: usize = 0;
        let mut pages = Vec::new();

        while !frontier.is_empty() || outstanding > 0 {
            tokio::select! {
                permit = request_tx.reserve(), if !frontier.is_empty() => {
                    let Ok(permit) = permit else {
                        warn!("Dispatch channel closed with {} requests pending", frontier.len());
                        break;
                    };
                    if let Some(request) = frontier.pop_front() {
                        debug!("Dispatching {}", request.target_url);
                        permit.send(request);
                        outstanding += 1;
                    }
                }
                result = result_rx.recv() => {
                    let Some(result) = result else {
                        warn!("All workers exited with {} requests outstanding", outstanding);
                        break;
                    };
                    outstanding -= 1;
                    let page = Page::from(&result);
                    self.expand_frontier(result, &follow, &mut seen, &mut frontier);

                    if let Some(ref callback) = self.result_callback {
                        callback(page.clone());
                    }
                    pages.push(page);
                }
            }
        }

        // Closing the dispatch channel stops every worker once it is idle.
        drop(request_tx);
        for handle in worker_handles {
            if let Err(e) = handle.await {
                warn!("Worker task failed: {}", e);
            }
        }

        info!("Crawl complete. Visited {} pages", pages.len());
        Ok(pages)
    }

    /// Queue every link on the page that has not been considered before and
    /// that the follow predicate accepts.
    fn expand_frontier(
        &self,
        result: CrawlResult,
        follow: &FollowPredicate,
        seen: &mut HashSet<String>,
        frontier: &mut VecDeque<CrawlRequest>,
    ) {
        if result.is_error() {
            return;
        }

        let origin = result.request.target_url;
        for link in result.links {
            if !seen.insert(link.clone()) {
                continue;
            }
            if follow(link.as_str()) {
                debug!("Queuing {} (from {})", link, origin);
                frontier.push_back(CrawlRequest::discovered(origin.clone(), link));
            } else {
                debug!("Not following {}", link);
            }
        }
    }
}

/// One-shot crawl with an explicit fetcher and follow predicate.
pub async fn crawl(
    seed_url: &str,
    workers: usize,
    fetcher: Arc<dyn Fetcher>,
    follow: FollowPredicate,
) -> Result<Vec<Page>> {
    Crawler::with_fetcher(fetcher)
        .with_follow_predicate(follow)
        .crawl(seed_url, workers)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::extract::Extracted;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    async fn mount_page(server: &MockServer, route: &str, html: &str) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string(html),
            )
            .mount(server)
            .await;
    }

    /// In-memory site keyed by URL; anything else is a 404.
    struct MapFetcher(HashMap<String, String>);

    #[async_trait]
    impl Fetcher for MapFetcher {
        async fn fetch(&self, url: &str) -> std::result::Result<Vec<u8>, FetchError> {
            self.0
                .get(url)
                .map(|html| html.as_bytes().to_vec())
                .ok_or(FetchError::Status(404))
        }
    }

    #[tokio::test]
    async fn test_link_discovery() {
        let mock_server = MockServer::start().await;
        mount_page(
            &mock_server,
            "/",
            r#"<html><body>
                <a href="page1">Page 1</a>
                <a href="page2">Page 2</a>
            </body></html>"#,
        )
        .await;
        mount_page(&mock_server, "/page1", "<html><body>P1</body></html>").await;
        mount_page(&mock_server, "/page2", "<html><body>P2</body></html>").await;

        let crawler = Crawler::new().unwrap();
        let pages = crawler.crawl(&mock_server.uri(), 1).await.unwrap();

        let mut urls: Vec<_> = pages.iter().map(|p| p.url.clone()).collect();
        urls.sort();
        assert_eq!(
            urls,
            vec![
                mock_server.uri(),
                format!("{}/page1", mock_server.uri()),
                format!("{}/page2", mock_server.uri()),
            ]
        );
    }

    #[tokio::test]
    async fn test_invalid_seed_is_rejected() {
        let crawler = Crawler::new().unwrap();
        let err = crawler.crawl("not a url", 4).await.unwrap_err();
        assert!(matches!(err, ScanError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn test_seed_failure_terminates_with_one_page() {
        let fetcher = Arc::new(MapFetcher(HashMap::new()));
        let pages = crawl("http://site.test/", 3, fetcher, follow::any())
            .await
            .unwrap();

        assert_eq!(pages.len(), 1);
        assert_eq!(
            pages[0].fetch_error.as_deref(),
            Some("fetch failed: HTTP status 404")
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_rejected_links_are_recorded_but_not_fetched() {
        let site = HashMap::from([
            (
                "http://site.test/".to_string(),
                r#"<a href="/a">a</a><a href="http://other.test/">other</a>"#.to_string(),
            ),
            (
                "http://site.test/a".to_string(),
                r#"<a href="/">home</a>"#.to_string(),
            ),
        ]);
        let pages = crawl(
            "http://site.test/",
            2,
            Arc::new(MapFetcher(site)),
            Arc::new(|link: &str| link.starts_with("http://site.test/")),
        )
        .await
        .unwrap();

        assert_eq!(pages.len(), 2);
        let root = pages.iter().find(|p| p.url == "http://site.test/").unwrap();
        assert_eq!(
            root.links,
            vec!["http://site.test/a", "http://other.test/"]
        );
        assert!(pages.iter().all(|p| p.fetch_error.is_none()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_callbacks_see_every_page() {
        let mut site = HashMap::new();
        let mut root = String::new();
        for i in 0..20 {
            root.push_str(&format!(r#"<a href="/p{}">p</a>"#, i));
            site.insert(format!("http://site.test/p{}", i), String::new());
        }
        site.insert("http://site.test/".to_string(), root);

        let collected: Arc<StdMutex<Vec<String>>> = Arc::new(StdMutex::new(Vec::new()));
        let started: Arc<StdMutex<HashMap<usize, usize>>> = Arc::new(StdMutex::new(HashMap::new()));
        let collected_clone = collected.clone();
        let started_clone = started.clone();

        let pages = Crawler::with_fetcher(Arc::new(MapFetcher(site)))
            .with_result_callback(Arc::new(move |page: Page| {
                collected_clone.lock().unwrap().push(page.url);
            }))
            .with_progress_callback(Arc::new(move |worker_id: usize, _url: String| {
                *started_clone.lock().unwrap().entry(worker_id).or_insert(0) += 1;
            }))
            .crawl("http://site.test/", 4)
            .await
            .unwrap();

        let collected = collected.lock().unwrap();
        assert_eq!(pages.len(), 21);
        assert_eq!(
            *collected,
            pages.iter().map(|p| p.url.clone()).collect::<Vec<_>>()
        );

        let started = started.lock().unwrap();
        assert_eq!(started.values().sum::<usize>(), 21);
        assert!(started.keys().all(|worker_id| *worker_id < 4));
    }

    #[tokio::test]
    async fn test_extraction_failure_is_page_scoped() {
        struct FailingExtractor;

        impl Extractor for FailingExtractor {
            fn extract(&self, body: &[u8]) -> Result<Extracted> {
                if body.starts_with(b"<bad") {
                    return Err(ScanError::Extraction("unsupported markup".to_string()));
                }
                HtmlExtractor.extract(body)
            }
        }

        let site = HashMap::from([
            (
                "http://site.test/".to_string(),
                r#"<a href="/bad">bad</a><a href="/good">good</a>"#.to_string(),
            ),
            ("http://site.test/bad".to_string(), "<bad".to_string()),
            ("http://site.test/good".to_string(), "<p>ok</p>".to_string()),
        ]);

        let pages = Crawler::with_fetcher(Arc::new(MapFetcher(site)))
            .with_extractor(Arc::new(FailingExtractor))
            .crawl("http://site.test/", 2)
            .await
            .unwrap();

        assert_eq!(pages.len(), 3);
        let bad = pages.iter().find(|p| p.url.ends_with("/bad")).unwrap();
        assert_eq!(
            bad.fetch_error.as_deref(),
            Some("Extraction error: unsupported markup")
        );
        let good = pages.iter().find(|p| p.url.ends_with("/good")).unwrap();
        assert!(good.fetch_error.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_panicking_progress_callback_does_not_stall_crawl() {
        let site = HashMap::from([
            (
                "http://site.test/".to_string(),
                r#"<a href="/boom">boom</a><a href="/fine">fine</a>"#.to_string(),
            ),
            ("http://site.test/boom".to_string(), "<p>boom</p>".to_string()),
            ("http://site.test/fine".to_string(), "<p>fine</p>".to_string()),
        ]);

        let crawler = Crawler::with_fetcher(Arc::new(MapFetcher(site))).with_progress_callback(
            Arc::new(|_worker_id: usize, url: String| {
                if url.ends_with("/boom") {
                    panic!("progress observer failed");
                }
            }),
        );

        let pages = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            crawler.crawl("http://site.test/", 2),
        )
        .await
        .expect("crawl did not terminate")
        .unwrap();

        assert_eq!(pages.len(), 3);
        assert!(pages.iter().all(|p| p.fetch_error.is_none()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_workers_are_gone_when_crawl_returns() {
        let site = HashMap::from([
            (
                "http://site.test/".to_string(),
                r#"<a href="/a">a</a>"#.to_string(),
            ),
            ("http://site.test/a".to_string(), String::new()),
        ]);
        let fetcher: Arc<dyn Fetcher> = Arc::new(MapFetcher(site));
        let crawler = Crawler::with_fetcher(fetcher.clone());
        assert_eq!(Arc::strong_count(&fetcher), 2);

        // More workers than pages, so most of them never receive a request.
        for workers in [1, 16] {
            let pages = crawler.crawl("http://site.test/", workers).await.unwrap();

            assert_eq!(pages.len(), 2);
            assert_eq!(Arc::strong_count(&fetcher), 2);
        }
    }
}
