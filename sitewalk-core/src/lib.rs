use colored::Colorize;

pub mod crawl;
pub mod report;

/// Print the name and version banner to stderr, leaving stdout for reports.
pub fn print_banner() {
    eprintln!(
        "{} {}",
        "sitewalk".bright_cyan().bold(),
        env!("CARGO_PKG_VERSION").bright_black()
    );
    eprintln!("{}", "maps pages, links and assets of a site".bright_black());
    eprintln!();
}
