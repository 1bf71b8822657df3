//! Article link canonicalization

use url::Url;

/// Query parameters that only carry campaign tracking
pub const TRACKING_QUERY_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "utm_id",
    "gclid",
    "fbclid",
];

/// Normalize a link so that tracking variants of the same article compare equal
///
/// Lowercases scheme and host, strips a trailing slash from the path, drops
/// tracking query parameters and the fragment. Unparseable input is returned
/// trimmed. Applying the function twice yields the same result.
pub fn canonicalize_link(raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        return String::new();
    }

    let Ok(mut url) = Url::parse(raw) else {
        return raw.to_string();
    };

    if let Some(host) = url.host_str() {
        let lowered = host.to_lowercase();
        if lowered != host && url.set_host(Some(&lowered)).is_err() {
            return raw.to_string();
        }
    }

    let path = url.path().trim_end_matches('/').to_string();
    if path.is_empty() {
        url.set_path("/");
    } else {
        url.set_path(&path);
    }

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(name, _)| !TRACKING_QUERY_PARAMS.contains(&name.to_lowercase().as_str()))
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect();

    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }

    url.set_fragment(None);
    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_link_removes_tracking() {
        let link = "https://Example.com/path/?utm_source=x&id=42&fbclid=abc";
        assert_eq!(canonicalize_link(link), "https://example.com/path?id=42");
    }

    #[test]
    fn test_canonicalize_drops_fragment_and_empty_query() {
        let link = "HTTPS://news.example.org/a/b/?utm_medium=rss#comments";
        assert_eq!(canonicalize_link(link), "https://news.example.org/a/b");
    }

    #[test]
    fn test_canonicalize_keeps_root_path() {
        assert_eq!(
            canonicalize_link("https://example.com/"),
            "https://example.com/"
        );
    }

    #[test]
    fn test_canonicalize_is_idempotent() {
        let samples = [
            "https://Example.com/path/?utm_source=x&id=42&fbclid=abc",
            "http://example.com//double//?q=a+b&UTM_TERM=z",
            "https://example.com/?a=1&a=2",
            "not a url",
            "",
            "  https://example.com/x/  ",
        ];
        for sample in samples {
            let once = canonicalize_link(sample);
            assert_eq!(canonicalize_link(&once), once, "input: {:?}", sample);
        }
    }
}
