use url::Url;

/// Normalize a page address into its tracking key: the hostname with a
/// leading `www.` label removed. Only `http`/`https` addresses are
/// trackable; internal pages (`chrome://`, `about:`, `file://`, ...) and
/// malformed input yield `None`.
pub fn clean_host(address: &str) -> Option<String> {
    let parsed = Url::parse(address).ok()?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return None;
    }

    let host = parsed.host_str()?;
    let host = host.strip_prefix("www.").unwrap_or(host);
    if host.is_empty() {
        return None;
    }

    Some(host.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_scheme_path_and_www() {
        assert_eq!(clean_host("https://www.reddit.com/r/rust"), Some("reddit.com".to_string()));
        assert_eq!(clean_host("http://github.com"), Some("github.com".to_string()));
        assert_eq!(clean_host("https://docs.rs/rusqlite/latest"), Some("docs.rs".to_string()));
    }

    #[test]
    fn test_drops_port_and_normalizes_case() {
        assert_eq!(clean_host("https://www.Example.COM:8080/watch"), Some("example.com".to_string()));
    }

    #[test]
    fn test_subdomains_other_than_www_are_kept() {
        assert_eq!(clean_host("https://news.ycombinator.com/item"), Some("news.ycombinator.com".to_string()));
    }

    #[test]
    fn test_internal_pages_are_not_trackable() {
        assert_eq!(clean_host("chrome://newtab"), None);
        assert_eq!(clean_host("about:blank"), None);
        assert_eq!(clean_host("file:///home/user/notes.html"), None);
    }

    #[test]
    fn test_malformed_input_is_not_trackable() {
        assert_eq!(clean_host(""), None);
        assert_eq!(clean_host("not a url"), None);
        assert_eq!(clean_host("https://"), None);
    }
}
