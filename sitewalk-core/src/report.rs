// Report generation from crawled pages

use crate::crawl::extract_url_path;
use serde::Serialize;
use sitewalk_scanner::Page;
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use url::Url;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    /// The page records themselves, as a JSON array
    #[default]
    Json,
    /// Human readable summary grouped by host
    Text,
    /// Indented sitemap tree
    Tree,
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ReportFormat::Json),
            "text" | "txt" => Ok(ReportFormat::Text),
            "tree" | "sitemap" => Ok(ReportFormat::Tree),
            other => Err(format!("Unknown report format '{}'", other)),
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReportFormat::Json => "json",
            ReportFormat::Text => "text",
            ReportFormat::Tree => "tree",
        };
        f.write_str(name)
    }
}

/// Totals over a page collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CrawlSummary {
    pub pages: usize,
    pub failed: usize,
    pub links: usize,
    pub assets: usize,
    pub hosts: usize,
}

pub fn summarize(pages: &[Page]) -> CrawlSummary {
    let hosts = group_by_host(pages).len();
    CrawlSummary {
        pages: pages.len(),
        failed: pages.iter().filter(|p| p.fetch_error.is_some()).count(),
        links: pages.iter().map(|p| p.links.len()).sum(),
        assets: pages.iter().map(|p| p.assets.len()).sum(),
        hosts,
    }
}

pub fn generate_report(pages: &[Page], format: ReportFormat) -> Result<String, String> {
    match format {
        ReportFormat::Json => generate_json_report(pages).map_err(|e| e.to_string()),
        ReportFormat::Text => Ok(generate_text_report(pages)),
        ReportFormat::Tree => Ok(generate_sitemap_tree(pages)),
    }
}

pub fn generate_json_report(pages: &[Page]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(pages)
}

pub fn generate_text_report(pages: &[Page]) -> String {
    let summary = summarize(pages);
    let mut report = String::new();

    report.push_str(RULE);
    report.push('\n');
    report.push_str("                            SITEWALK CRAWL REPORT\n");
    report.push_str(RULE);
    report.push_str("\n\n");

    report.push_str(&format!(
        "Generated:    {}\n",
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    ));
    report.push_str(&format!("Pages:        {}\n", summary.pages));
    report.push_str(&format!("Failed:       {}\n", summary.failed));
    report.push_str(&format!("Links found:  {}\n", summary.links));
    report.push_str(&format!("Assets found: {}\n", summary.assets));
    report.push_str(&format!("Hosts:        {}\n\n", summary.hosts));

    for (host, mut host_pages) in group_by_host(pages) {
        host_pages.sort_by(|a, b| a.url.cmp(&b.url));

        report.push_str(&format!("## {}\n", host));
        report.push_str(&format!("  {} pages\n\n", host_pages.len()));

        for page in host_pages {
            let path = extract_url_path(&page.url);
            match page.fetch_error {
                Some(ref error) => {
                    report.push_str(&format!("  ✗ {}  ({})\n", path, error));
                }
                None => {
                    report.push_str(&format!(
                        "  ✓ {}  [{} links, {} assets]\n",
                        path,
                        page.links.len(),
                        page.assets.len()
                    ));
                }
            }
        }
        report.push('\n');
    }

    report.push_str(RULE);
    report.push('\n');
    report
}

#[derive(Default)]
struct TreeNode<'a> {
    page: Option<&'a Page>,
    children: BTreeMap<String, TreeNode<'a>>,
}

/// Render the pages as one tree per host, following URL path segments.
pub fn generate_sitemap_tree(pages: &[Page]) -> String {
    if pages.is_empty() {
        return "  (empty)\n".to_string();
    }

    let mut hosts: BTreeMap<String, TreeNode> = BTreeMap::new();
    let mut unparsed = Vec::new();

    for page in pages {
        let Ok(parsed) = Url::parse(&page.url) else {
            unparsed.push(page);
            continue;
        };

        let mut node = hosts.entry(host_label(&parsed)).or_default();
        for segment in parsed.path().split('/').filter(|s| !s.is_empty()) {
            node = node.children.entry(segment.to_string()).or_default();
        }
        if let Some(query) = parsed.query() {
            node = node.children.entry(format!("?{}", query)).or_default();
        }
        // The bare seed and "/" land on the same node; keep the first.
        if node.page.is_none() {
            node.page = Some(page);
        }
    }

    let mut result = String::new();
    for (host, root) in &hosts {
        result.push_str(host);
        result.push_str(&page_marker(root.page));
        result.push('\n');
        render_children(root, "", &mut result);
    }
    for page in unparsed {
        result.push_str(&page.url);
        result.push_str(&page_marker(Some(page)));
        result.push('\n');
    }

    result
}

fn render_children(node: &TreeNode, prefix: &str, out: &mut String) {
    let count = node.children.len();
    for (i, (segment, child)) in node.children.iter().enumerate() {
        let is_last = i == count - 1;
        let branch = if is_last { "└── " } else { "├── " };
        out.push_str(prefix);
        out.push_str(branch);
        out.push_str(segment);
        out.push_str(&page_marker(child.page));
        out.push('\n');

        let child_prefix = format!("{}{}", prefix, if is_last { "    " } else { "│   " });
        render_children(child, &child_prefix, out);
    }
}

fn page_marker(page: Option<&Page>) -> String {
    match page.and_then(|p| p.fetch_error.as_deref()) {
        Some(error) => format!("  [✗ {}]", error),
        None => String::new(),
    }
}

fn host_label(url: &Url) -> String {
    let host = url.host_str().unwrap_or("unknown");
    match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}

fn group_by_host(pages: &[Page]) -> BTreeMap<String, Vec<&Page>> {
    let mut by_host: BTreeMap<String, Vec<&Page>> = BTreeMap::new();
    for page in pages {
        let host = Url::parse(&page.url)
            .map(|u| host_label(&u))
            .unwrap_or_else(|_| "unknown".to_string());
        by_host.entry(host).or_default().push(page);
    }
    by_host
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}
