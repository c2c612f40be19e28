use std::sync::Arc;
use url::Url;

/// Decides whether a newly discovered absolute URL gets crawled.
pub type FollowPredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Follow links whose host is exactly the seed's host.
pub fn same_host(seed: &Url) -> FollowPredicate {
    let host = seed.host_str().map(str::to_string);
    Arc::new(move |link: &str| match (&host, Url::parse(link)) {
        (Some(host), Ok(parsed)) => parsed.host_str() == Some(host.as_str()),
        _ => false,
    })
}

/// Follow links on the seed's host or any of its subdomains.
pub fn same_domain(seed: &Url) -> FollowPredicate {
    let domain = seed.host_str().map(str::to_string);
    Arc::new(move |link: &str| {
        if let Some(domain) = &domain
            && let Ok(parsed) = Url::parse(link)
            && let Some(host) = parsed.host_str()
        {
            return host == domain || host.ends_with(&format!(".{}", domain));
        }
        false
    })
}

/// Follow every link. Only sensible with an external stop condition.
pub fn any() -> FollowPredicate {
    Arc::new(|_link: &str| true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed() -> Url {
        Url::parse("http://example.com/start").unwrap()
    }

    #[test]
    fn test_same_host() {
        let follow = same_host(&seed());
        assert!(follow("http://example.com/a"));
        assert!(follow("https://example.com:8443/b"));
        assert!(!follow("http://blog.example.com/"));
        assert!(!follow("http://google.com/"));
        assert!(!follow("not a url"));
    }

    #[test]
    fn test_same_domain_includes_subdomains() {
        let follow = same_domain(&seed());
        assert!(follow("http://example.com/a"));
        assert!(follow("http://blog.example.com/"));
        assert!(!follow("http://notexample.com/"));
        assert!(!follow("mailto:someone@example.com"));
    }

    #[test]
    fn test_any() {
        let follow = any();
        assert!(follow("http://anything.test/"));
    }
}
