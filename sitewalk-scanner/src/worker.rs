use crate::error::ScanError;
use crate::extract::Extractor;
use crate::fetcher::Fetcher;
use crate::links::{dedupe_assets, resolve_links};
use crate::result::{CrawlRequest, CrawlResult};
use futures::FutureExt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use url::Url;

/// Called with `(worker_id, url)` when a worker starts on a request.
pub type ProgressCallback = Arc<dyn Fn(usize, String) + Send + Sync>;

/// Everything a worker needs to turn a request into a result.
pub(crate) struct Pipeline {
    pub fetcher: Arc<dyn Fetcher>,
    pub extractor: Arc<dyn Extractor>,
    pub progress: Option<ProgressCallback>,
}

/// Shared receiving end of the dispatch channel. Each request is taken by one worker.
pub(crate) type Dispatch = Arc<Mutex<mpsc::Receiver<CrawlRequest>>>;

pub(crate) fn spawn_workers(
    count: usize,
    pipeline: Arc<Pipeline>,
    requests: Dispatch,
    results: mpsc::Sender<CrawlResult>,
) -> Vec<JoinHandle<()>> {
    (0..count)
        .map(|worker_id| {
            let pipeline = pipeline.clone();
            let requests = requests.clone();
            let results = results.clone();
            tokio::spawn(run_worker(worker_id, pipeline, requests, results))
        })
        .collect()
}

/// Pull requests until the dispatch channel is closed.
async fn run_worker(
    worker_id: usize,
    pipeline: Arc<Pipeline>,
    requests: Dispatch,
    results: mpsc::Sender<CrawlResult>,
) {
    debug!("Worker {} started", worker_id);

    loop {
        let request = {
            let mut requests = requests.lock().await;
            requests.recv().await
        };
        let Some(request) = request else {
            break;
        };

        if let Some(ref callback) = pipeline.progress {
            let url = request.target_url.clone();
            if catch_unwind(AssertUnwindSafe(|| callback(worker_id, url))).is_err() {
                warn!(
                    "Progress callback panicked on {}, continuing",
                    request.target_url
                );
            }
        }

        let result = pipeline.process(request).await;
        if results.send(result).await.is_err() {
            debug!("Worker {} lost the result channel", worker_id);
            break;
        }
    }

    debug!("Worker {} finished", worker_id);
}

impl Pipeline {
    /// Fetch, extract and resolve one page. Never fails: every problem is
    /// carried on the returned result.
    pub(crate) async fn process(&self, request: CrawlRequest) -> CrawlResult {
        let page_url = match Url::parse(&request.target_url) {
            Ok(url) => url,
            Err(e) => {
                let error = ScanError::InvalidUrl(format!("{}: {}", request.target_url, e));
                return CrawlResult::with_error(request, error);
            }
        };

        let fetched = AssertUnwindSafe(self.fetcher.fetch(&request.target_url))
            .catch_unwind()
            .await;
        let body = match fetched {
            Ok(Ok(body)) => body,
            Ok(Err(e)) => {
                warn!("Fetch error for {}: {}", request.target_url, e);
                return CrawlResult::with_error(request, e.into());
            }
            Err(_) => {
                warn!("Fetcher panicked on {}", request.target_url);
                let error = ScanError::Other(format!("fetcher panicked on {}", request.target_url));
                return CrawlResult::with_error(request, error);
            }
        };

        // The body moves into the blocking task and is dropped there, whatever
        // the extractor does with it.
        let extractor = self.extractor.clone();
        let extracted = tokio::task::spawn_blocking(move || extractor.extract(&body)).await;
        let extracted = match extracted {
            Ok(Ok(extracted)) => extracted,
            Ok(Err(e)) => {
                warn!("Extraction error for {}: {}", request.target_url, e);
                return CrawlResult::with_error(request, e);
            }
            Err(e) => {
                warn!("Extraction aborted for {}: {}", request.target_url, e);
                return CrawlResult::with_error(request, ScanError::Extraction(e.to_string()));
            }
        };

        let links = resolve_links(&page_url, &extracted.links);
        let assets = dedupe_assets(&extracted.assets);
        debug!(
            "{}: {} links, {} assets",
            request.target_url,
            links.len(),
            assets.len()
        );

        CrawlResult::new(request, links, assets)
    }
}
