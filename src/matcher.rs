//! URL match patterns for script activation.
//!
//! Patterns follow the Chrome extension match-pattern style:
//! `<scheme>://<host>/<path>` where `*` is a wildcard. The scheme must be
//! given (or `*`); a `*.` host prefix matches any subdomain; the path part
//! supports `*` anywhere.

use regex::Regex;
use url::Url;

/// Check whether `raw` matches the given pattern.
pub fn match_url(pattern: &str, raw: &str) -> bool {
    let (scheme, host, path) = parse_pattern(pattern);
    let url = match Url::parse(raw) {
        Ok(u) => u,
        Err(_) => return false,
    };
    if scheme != "*" && scheme != url.scheme() {
        return false;
    }
    if !match_host(&host, url.host_str().unwrap_or_default()) {
        return false;
    }
    match_path(&path, url.path())
}

fn parse_pattern(pattern: &str) -> (String, String, String) {
    let (scheme, rest) = match pattern.split_once("://") {
        Some((s, r)) => (s.to_string(), r),
        None => (String::new(), pattern),
    };
    match rest.split_once('/') {
        Some((host, path)) => (scheme, host.to_string(), format!("/{path}")),
        None => (scheme, rest.to_string(), "/".to_string()),
    }
}

fn match_host(pattern: &str, host: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    if let Some(suffix) = pattern.strip_prefix("*.") {
        return host.ends_with(&format!(".{suffix}")) || host == suffix;
    }
    pattern == host
}

fn match_path(pattern: &str, path: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    let mut pattern = pattern.to_string();
    if !pattern.ends_with('*') && !pattern.ends_with('/') {
        pattern.push('/');
    }
    let mut path = path.to_string();
    if !path.ends_with('/') {
        path.push('/');
    }

    if pattern.contains('*') {
        let escaped = regex::escape(&pattern).replace("\\*", ".*");
        return Regex::new(&format!("^{escaped}$"))
            .map(|re| re.is_match(&path))
            .unwrap_or(false);
    }
    pattern == path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        assert!(match_url(
            "https://github.com/releases",
            "https://github.com/releases"
        ));
        assert!(!match_url(
            "https://github.com/releases",
            "https://github.com/other"
        ));
    }

    #[test]
    fn test_scheme_wildcard() {
        assert!(match_url("*://github.com/*", "https://github.com/a/b"));
        assert!(match_url("*://github.com/*", "http://github.com/"));
        assert!(!match_url("https://github.com/*", "http://github.com/"));
    }

    #[test]
    fn test_host_wildcard() {
        assert!(match_url("*://*/*", "https://anything.example/x"));
        assert!(match_url("*://*.github.com/*", "https://api.github.com/x"));
        assert!(match_url("*://*.github.com/*", "https://github.com/x"));
        assert!(!match_url("*://*.github.com/*", "https://github.org/x"));
    }

    #[test]
    fn test_path_wildcard() {
        assert!(match_url(
            "*://github.com/*/releases",
            "https://github.com/owner/releases"
        ));
        assert!(!match_url(
            "*://github.com/*/releases",
            "https://github.com/owner/tags"
        ));
    }

    #[test]
    fn test_missing_scheme_never_matches() {
        assert!(!match_url("github.com/*", "https://github.com/a"));
    }

    #[test]
    fn test_invalid_url() {
        assert!(!match_url("*://*/*", "not a url"));
    }
}
