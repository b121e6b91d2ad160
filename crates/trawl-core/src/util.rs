use url::Url;

/// Dedup key for a URL: `scheme://host[:port]path`, query and fragment dropped.
///
/// Returns `None` if `raw` is not an absolute URL with a host.
pub fn normalize_url(raw: &str) -> Option<String> {
    let url = Url::parse(raw).ok()?;
    let authority = host_key(&url)?;
    Some(format!("{}://{}{}", url.scheme(), authority, url.path()))
}

/// Host plus explicit port, e.g. `example.com` or `example.com:8080`.
///
/// Used for per-host pacing and the stay-on-domain check.
pub fn host_key(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

/// Parse `raw` and return its [`host_key`].
pub fn host_of(raw: &str) -> Option<String> {
    Url::parse(raw).ok().as_ref().and_then(host_key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_query_and_fragment() {
        assert_eq!(
            normalize_url("http://a.test/p?x=1#frag"),
            Some("http://a.test/p".to_string())
        );
        assert_eq!(
            normalize_url("http://a.test/p"),
            normalize_url("http://a.test/p#y")
        );
    }

    #[test]
    fn test_normalize_keeps_port_and_scheme() {
        assert_eq!(
            normalize_url("https://a.test:8443/x"),
            Some("https://a.test:8443/x".to_string())
        );
        assert_ne!(
            normalize_url("http://a.test/x"),
            normalize_url("https://a.test/x")
        );
    }

    #[test]
    fn test_normalize_rejects_relative() {
        assert_eq!(normalize_url("/relative/path"), None);
        assert_eq!(normalize_url("not a url"), None);
        assert_eq!(normalize_url("mailto:someone@a.test"), None);
    }

    #[test]
    fn test_host_of() {
        assert_eq!(host_of("http://a.test/x"), Some("a.test".to_string()));
        assert_eq!(
            host_of("http://a.test:8080/x"),
            Some("a.test:8080".to_string())
        );
        // Default ports are elided by the parser.
        assert_eq!(host_of("https://a.test:443/"), Some("a.test".to_string()));
        assert_eq!(host_of("garbage"), None);
    }
}
