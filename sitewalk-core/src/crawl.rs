use indicatif::{ProgressBar, ProgressStyle};
use sitewalk_scanner::{Crawler, FollowPredicate, Page, follow};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::warn;
use url::Url;

/// Options for configuring a crawl operation
pub struct CrawlOptions {
    pub urls: Vec<String>,
    pub threads: usize,
    pub follow_mode: FollowMode,
    pub timeout_secs: u64,
    pub show_progress_bars: bool,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            urls: Vec::new(),
            threads: 50,
            follow_mode: FollowMode::default(),
            timeout_secs: 10,
            show_progress_bars: false,
        }
    }
}

/// Which discovered links get crawled, relative to the seed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FollowMode {
    /// Only links on the seed's exact host
    #[default]
    SameHost,
    /// The seed's host and its subdomains
    SameDomain,
    /// Every link, wherever it points
    Any,
}

impl FollowMode {
    pub fn predicate(&self, seed: &Url) -> FollowPredicate {
        match self {
            FollowMode::SameHost => follow::same_host(seed),
            FollowMode::SameDomain => follow::same_domain(seed),
            FollowMode::Any => follow::any(),
        }
    }
}

impl FromStr for FollowMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "same-host" | "host" => Ok(FollowMode::SameHost),
            "same-domain" | "domain" => Ok(FollowMode::SameDomain),
            "any" | "all" => Ok(FollowMode::Any),
            other => Err(format!("Unknown follow mode '{}'", other)),
        }
    }
}

impl fmt::Display for FollowMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FollowMode::SameHost => "same-host",
            FollowMode::SameDomain => "same-domain",
            FollowMode::Any => "any",
        };
        f.write_str(name)
    }
}

/// Callback for reporting crawl progress
pub type CrawlProgressCallback = Arc<dyn Fn(String) + Send + Sync>;

/// Callback for reporting individual pages as they come in
pub type CrawlResultCallback = Arc<dyn Fn(Page) + Send + Sync>;

/// Extract the path component from a URL
pub fn extract_url_path(url: &str) -> String {
    Url::parse(url)
        .ok()
        .map(|u| {
            let path = u.path().to_string();
            if path.is_empty() || path == "/" {
                "/".to_string()
            } else {
                path
            }
        })
        .unwrap_or_else(|| url.to_string())
}

/// Crawl every seed in `options.urls` in turn and concatenate the pages.
///
/// Each seed gets its own crawl state, so a page reachable from two seeds is
/// reported once per seed. Fails only when no seed could be crawled at all.
pub async fn execute_crawl(
    options: CrawlOptions,
    progress_callback: Option<CrawlProgressCallback>,
    result_callback: Option<CrawlResultCallback>,
) -> Result<Vec<Page>, String> {
    let CrawlOptions {
        urls,
        threads,
        follow_mode,
        timeout_secs,
        show_progress_bars,
    } = options;

    if urls.is_empty() {
        return Err("No URLs to crawl".to_string());
    }

    let progress_bar = if show_progress_bars {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .map_err(|e| e.to_string())?,
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_message("Starting crawl...");
        Some(Arc::new(pb))
    } else {
        None
    };

    let processed_count = Arc::new(AtomicUsize::new(0));
    let count_clone = processed_count.clone();
    let pb_clone = progress_bar.clone();
    let worker_progress: sitewalk_scanner::ProgressCallback =
        Arc::new(move |_worker_id: usize, url: String| {
            let count = count_clone.fetch_add(1, Ordering::Relaxed) + 1;
            if let Some(ref pb) = pb_clone {
                pb.set_message(format!(
                    "Crawling... {} URLs processed ({})",
                    count,
                    extract_url_path(&url)
                ));
            }
        });

    let mut all_pages = Vec::new();
    let mut failures = Vec::new();

    for (idx, url_str) in urls.iter().enumerate() {
        if let Some(ref callback) = progress_callback
            && urls.len() > 1
        {
            callback(format!(
                "Crawling host {}/{}: {}",
                idx + 1,
                urls.len(),
                url_str
            ));
        }

        let seed = match Url::parse(url_str) {
            Ok(seed) => seed,
            Err(e) => {
                let message = format!("Invalid URL {}: {}", url_str, e);
                warn!("{}", message);
                if let Some(ref callback) = progress_callback {
                    callback(format!("[!]  Failed to crawl {}: {}", url_str, e));
                }
                failures.push(message);
                continue;
            }
        };

        let mut crawler = Crawler::with_timeout(timeout_secs)
            .map_err(|e| format!("Failed to create HTTP client: {}", e))?
            .with_follow_predicate(follow_mode.predicate(&seed))
            .with_progress_callback(worker_progress.clone());

        if let Some(ref cb) = result_callback {
            let result_cb: sitewalk_scanner::ResultCallback = cb.clone();
            crawler = crawler.with_result_callback(result_cb);
        }

        match crawler.crawl(url_str, threads).await {
            Ok(pages) => all_pages.extend(pages),
            Err(e) => {
                warn!("Failed to crawl {}: {}", url_str, e);
                if let Some(ref callback) = progress_callback {
                    callback(format!("[!]  Failed to crawl {}: {}", url_str, e));
                }
                failures.push(format!("{}: {}", url_str, e));
            }
        }
    }

    if let Some(ref pb) = progress_bar {
        let total = processed_count.load(Ordering::Relaxed);
        pb.finish_with_message(format!("Crawl complete! {} URLs processed", total));
    }

    if failures.len() == urls.len() {
        return Err(failures.join("; "));
    }

    Ok(all_pages)
}
