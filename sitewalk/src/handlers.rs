use clap::ArgMatches;
use colored::Colorize;
use sitewalk_core::report::{ReportFormat, generate_report, save_report, summarize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

// Helper functions for crawl handler

/// Load URLs from either a file or a single URL argument
pub fn load_urls_from_source(
    url: Option<&Url>,
    hosts_file: Option<&PathBuf>,
) -> Result<Vec<String>, String> {
    if let Some(hosts_file_path) = hosts_file {
        load_urls_from_file(hosts_file_path)
    } else if let Some(url) = url {
        Ok(vec![url.as_str().to_string()])
    } else {
        Err("Either --url or --hosts-file must be provided".to_string())
    }
}

/// Load and parse URLs from a file
pub fn load_urls_from_file(path: &Path) -> Result<Vec<String>, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read hosts file {}: {}", path.display(), e))?;

    let urls: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(parse_url_line)
        .collect();

    if urls.is_empty() {
        return Err(format!("No valid URLs found in {}", path.display()));
    }

    Ok(urls)
}

/// Parse a single line as a URL, trying to add http:// if needed
pub fn parse_url_line(line: &str) -> Option<String> {
    if Url::parse(line).is_ok_and(|u| u.has_host()) {
        return Some(line.to_string());
    }

    let with_scheme = format!("http://{}", line);
    if Url::parse(&with_scheme).is_ok() {
        return Some(with_scheme);
    }

    warn!("Skipping invalid URL '{}'", line);
    None
}

/// Clamp a requested worker count to at least one worker.
pub fn worker_count(requested: i64) -> usize {
    usize::try_from(requested.max(1)).unwrap_or(usize::MAX)
}

/// Write the report to `output` (tilde-expanded) or to stdout when absent.
pub fn write_report(report: &str, output: Option<&PathBuf>) -> Result<(), String> {
    match output {
        Some(path) => {
            let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
            let path = PathBuf::from(expanded);
            save_report(report, &path)
                .map_err(|e| format!("Failed to write report to {}: {}", path.display(), e))?;
            debug!("Report written to {}", path.display());
            Ok(())
        }
        None => {
            print!("{}", report);
            if !report.ends_with('\n') {
                println!();
            }
            Ok(())
        }
    }
}

// Re-export crawl types and functions from sitewalk-core
pub use sitewalk_core::crawl::{
    CrawlOptions, CrawlProgressCallback, FollowMode, execute_crawl, extract_url_path,
};

pub async fn handle_crawl(sub_matches: &ArgMatches, quiet: bool) -> Result<(), String> {
    let url = sub_matches.get_one::<Url>("url");
    let hosts_file = sub_matches.get_one::<PathBuf>("hosts-file");
    let threads = worker_count(*sub_matches.get_one::<i64>("threads").unwrap_or(&50));
    let timeout_secs = *sub_matches.get_one::<u64>("timeout").unwrap_or(&10);
    let output = sub_matches.get_one::<PathBuf>("output");
    let no_progress = sub_matches.get_flag("no-progress");

    let follow_mode = match sub_matches.get_one::<String>("follow") {
        Some(mode) => mode.parse::<FollowMode>()?,
        None => FollowMode::default(),
    };
    let format = match sub_matches.get_one::<String>("format") {
        Some(format) => format.parse::<ReportFormat>()?,
        None => ReportFormat::default(),
    };

    let urls = load_urls_from_source(url, hosts_file)?;

    if !quiet {
        eprintln!(
            "{} Crawling {} seed(s) with {} workers, following {} links",
            "→".blue(),
            urls.len().to_string().bright_white(),
            threads.to_string().bright_white(),
            follow_mode.to_string().bright_white()
        );
    }

    let options = CrawlOptions {
        urls,
        threads,
        follow_mode,
        timeout_secs,
        show_progress_bars: !quiet && !no_progress,
    };

    let progress_callback: Option<CrawlProgressCallback> = if quiet {
        None
    } else {
        Some(Arc::new(|msg: String| {
            eprintln!("{}", msg);
        }))
    };

    let pages = execute_crawl(options, progress_callback, None)
        .await
        .map_err(|e| format!("Crawl failed: {}", e))?;

    if !quiet {
        let summary = summarize(&pages);
        eprintln!(
            "{} Crawl complete! {} pages, {} failed, {} links, {} assets",
            "✓".green().bold(),
            summary.pages,
            summary.failed,
            summary.links,
            summary.assets
        );
    }

    let report = generate_report(&pages, format)?;
    write_report(&report, output)
}
