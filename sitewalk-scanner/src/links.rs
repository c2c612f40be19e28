use std::collections::HashSet;
use url::Url;

/// Resolve `href` against the page it was found on and drop any fragment.
///
/// Returns `None` when the reference cannot be turned into a URL.
pub fn resolve_link(base: &Url, href: &str) -> Option<String> {
    let mut resolved = base.join(href).ok()?;
    resolved.set_fragment(None);
    Some(resolved.into())
}

/// Resolve every href against `base`, keeping the first occurrence of each
/// absolute URL. Unresolvable hrefs are skipped.
pub fn resolve_links<S: AsRef<str>>(base: &Url, hrefs: &[S]) -> Vec<String> {
    let mut seen = HashSet::new();
    hrefs
        .iter()
        .filter_map(|href| resolve_link(base, href.as_ref()))
        .filter(|link| seen.insert(link.clone()))
        .collect()
}

/// De-duplicate asset references as written in the markup, first occurrence wins.
pub fn dedupe_assets<S: AsRef<str>>(assets: &[S]) -> Vec<String> {
    let mut seen = HashSet::new();
    assets
        .iter()
        .map(|asset| asset.as_ref())
        .filter(|asset| seen.insert(*asset))
        .map(str::to_string)
        .collect()
}
