use sha2::{Digest, Sha256};
use url::{form_urlencoded, Url};

/// Query parameters that only carry tracking state.
const TRACKING_PARAMS: &[&str] = &[
    "fbclid", "gclid", "dclid", "msclkid", "igshid", "mc_cid", "mc_eid", "_ga", "ref",
    "ref_src", "si", "feature",
];

fn is_tracking_param(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    name.starts_with("utm_") || TRACKING_PARAMS.contains(&name.as_str())
}

/// Canonical form of a URL for exact-duplicate detection.
///
/// Scheme and host are lowercased, the fragment and tracking parameters are
/// dropped, a trailing slash is removed and the remaining query pairs are
/// sorted. Strings that do not parse as URLs are trimmed and lowercased.
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let Ok(parsed) = Url::parse(trimmed) else {
        return trimmed.trim_end_matches('/').to_lowercase();
    };

    let Some(host) = parsed.host_str() else {
        let mut opaque = parsed.clone();
        opaque.set_fragment(None);
        return opaque.to_string();
    };

    let mut pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(k, _)| !is_tracking_param(k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    pairs.sort();

    let mut out = format!("{}://{}", parsed.scheme(), host);
    if let Some(port) = parsed.port() {
        out.push_str(&format!(":{}", port));
    }
    out.push_str(parsed.path().trim_end_matches('/'));

    if !pairs.is_empty() {
        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs.iter())
            .finish();
        out.push('?');
        out.push_str(&query);
    }

    out
}

/// Whitespace-collapsed, case-folded body text.
pub fn normalize_body(body: &str) -> String {
    body.split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Hex-encoded SHA-256 digest.
pub fn sha256_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

pub fn url_key(raw_url: &str) -> String {
    sha256_hex(&normalize_url(raw_url))
}

/// Content key, absent when the body normalizes to nothing.
pub fn content_key(body: &str) -> Option<String> {
    let normalized = normalize_body(body);
    if normalized.is_empty() {
        None
    } else {
        Some(sha256_hex(&normalized))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracking_params_stripped() {
        assert_eq!(
            normalize_url("https://Example.com/watch?v=abc&utm_source=x&fbclid=123"),
            "https://example.com/watch?v=abc"
        );
    }

    #[test]
    fn test_fragment_and_trailing_slash_dropped() {
        assert_eq!(
            normalize_url("HTTPS://blog.example.com/post/#comments"),
            "https://blog.example.com/post"
        );
        assert_eq!(normalize_url("https://example.com/"), "https://example.com");
    }

    #[test]
    fn test_query_pairs_sorted() {
        assert_eq!(
            normalize_url("https://example.com/s?b=2&a=1"),
            normalize_url("https://example.com/s?a=1&b=2")
        );
    }

    #[test]
    fn test_non_default_port_kept() {
        assert_eq!(
            normalize_url("http://localhost:8080/a/"),
            "http://localhost:8080/a"
        );
        assert_eq!(normalize_url("https://example.com:443/a"), "https://example.com/a");
    }

    #[test]
    fn test_unparseable_url_falls_back() {
        assert_eq!(normalize_url("  Not A Url/ "), "not a url");
    }

    #[test]
    fn test_url_keys_equal_modulo_normalization() {
        assert_eq!(
            url_key("https://www.youtube.com/watch?v=xyz&feature=share"),
            url_key("https://WWW.YOUTUBE.COM/watch?v=xyz#t=10")
        );
        assert_ne!(
            url_key("https://www.youtube.com/watch?v=xyz"),
            url_key("https://www.youtube.com/watch?v=abc")
        );
    }

    #[test]
    fn test_content_key() {
        assert_eq!(
            content_key("Hello   World\n\tAgain"),
            content_key("hello world again")
        );
        assert!(content_key("   \n ").is_none());
        assert_eq!(content_key("x").unwrap().len(), 64);
    }
}
