// src/normalize.rs
//! Normalizer: raw record → canonical item, plus the dedup fingerprint.
//!
//! Fingerprint policy:
//! - URL key when the source URL is an absolute http(s) URL and the source did not flag it
//!   unstable: lowercase scheme/host, default port dropped, fragment dropped, trailing `/`
//!   stripped, tracking parameters dropped, remaining parameters sorted.
//! - Title key otherwise: lowercase, punctuation stripped, whitespace collapsed.
//!
//! Publication date policy: an item without a date is treated as published at the
//! pipeline run time ("now"). This is fixed, not configurable.

use crate::error::MalformedItemError;
use crate::item::{CanonicalItem, RawItem};
use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use url::Url;

pub const TITLE_MAX_CHARS: usize = 300;
pub const SUMMARY_MAX_CHARS: usize = 1500;

/// Bytes of the SHA-256 digest kept in the fingerprint (hex-encoded → 24 chars).
const FINGERPRINT_BYTES: usize = 12;

const TRACKING_PARAMS: &[&str] = &[
    "fbclid", "gclid", "dclid", "msclkid", "mc_cid", "mc_eid", "igshid", "ref", "ref_src",
    "ref_url", "source", "_hsenc", "_hsmi",
];

/// Normalize free text: decode entities, strip tags, fold typographic quotes,
/// collapse whitespace, trim, cap length.
pub fn normalize_text(s: &str, max_chars: usize) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) “ ” ‘ ’ « » → ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace (incl. NBSP)
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").expect("ws regex"));
    out = re_ws.replace_all(&out, " ").trim().to_string();

    // 5) Length cap
    if out.chars().count() > max_chars {
        out = out.chars().take(max_chars).collect::<String>().trim_end().to_string();
    }

    out
}

fn is_tracking_param(name: &str) -> bool {
    let n = name.to_ascii_lowercase();
    n.starts_with("utm_") || TRACKING_PARAMS.contains(&n.as_str())
}

/// Identity key of a URL, or `None` when it is not an absolute http(s) URL.
pub fn url_key(raw: &str) -> Option<String> {
    let parsed = Url::parse(raw.trim()).ok()?;
    let scheme = parsed.scheme().to_ascii_lowercase();
    if scheme != "http" && scheme != "https" {
        return None;
    }
    let host = parsed.host_str()?.to_ascii_lowercase();
    if host.is_empty() {
        return None;
    }

    let mut key = format!("{scheme}://{host}");
    // `port()` is None for the scheme's default port.
    if let Some(port) = parsed.port() {
        let _ = write!(key, ":{port}");
    }
    key.push_str(parsed.path().trim_end_matches('/'));

    let mut params: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(k, _)| !is_tracking_param(k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    params.sort();
    if !params.is_empty() {
        key.push('?');
        let joined = params
            .iter()
            .map(|(k, v)| if v.is_empty() { k.clone() } else { format!("{k}={v}") })
            .collect::<Vec<_>>()
            .join("&");
        key.push_str(&joined);
    }
    Some(key)
}

/// Identity key of a title: lowercase, punctuation stripped, whitespace collapsed.
pub fn title_key(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Hash a prefixed identity key into a short hex fingerprint.
pub fn fingerprint(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(FINGERPRINT_BYTES * 2);
    for b in digest.iter().take(FINGERPRINT_BYTES) {
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Fingerprint of a raw item, or `None` when it has no usable identity.
pub fn fingerprint_of(raw: &RawItem) -> Option<String> {
    if !raw.unstable_url {
        if let Some(k) = url_key(&raw.url) {
            return Some(fingerprint(&format!("u:{k}")));
        }
    }
    let tk = title_key(&normalize_text(&raw.title, TITLE_MAX_CHARS));
    if tk.is_empty() {
        None
    } else {
        Some(fingerprint(&format!("t:{tk}")))
    }
}

/// Convert a raw record into its canonical form. Pure; `run_time` is only used as the
/// publication date of undated items.
pub fn normalize(raw: &RawItem, run_time: DateTime<Utc>) -> Result<CanonicalItem, MalformedItemError> {
    let url = raw.url.trim();
    if raw.title.trim().is_empty() && url.is_empty() {
        return Err(MalformedItemError::MissingTitleAndUrl {
            source_name: raw.source_name.clone(),
        });
    }

    let id = fingerprint_of(raw).ok_or_else(|| MalformedItemError::NoIdentity {
        source_name: raw.source_name.clone(),
    })?;

    let mut title = normalize_text(&raw.title, TITLE_MAX_CHARS);
    if title.is_empty() {
        title = url.to_string();
    }

    let summary = raw
        .summary
        .as_deref()
        .map(|s| normalize_text(s, SUMMARY_MAX_CHARS))
        .unwrap_or_default();

    let image_url = raw
        .image_url
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    Ok(CanonicalItem {
        id,
        title,
        url: url.to_string(),
        summary,
        source_name: raw.source_name.trim().to_string(),
        source_type: raw.source_type,
        published_at: raw.published_at.unwrap_or(run_time),
        engagement: raw.engagement.unwrap_or(0),
        image_url,
        category: None,
        score: None,
        also_seen_in: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::SourceType;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 6, 9, 0, 0).unwrap()
    }

    #[test]
    fn normalize_text_strips_tags_and_folds_ws() {
        let s = "  <p>Hello&nbsp;&nbsp;<b>world</b></p> &ldquo;ok&rdquo;  ";
        assert_eq!(normalize_text(s, 100), r#"Hello world "ok""#);
    }

    #[test]
    fn normalize_text_caps_length() {
        let s = "x".repeat(2_000);
        assert_eq!(normalize_text(&s, SUMMARY_MAX_CHARS).chars().count(), SUMMARY_MAX_CHARS);
    }

    #[test]
    fn url_key_drops_tracking_fragment_and_trailing_slash() {
        let a = url_key("https://Example.COM/post/1/?utm_source=x&utm_medium=y#top").unwrap();
        let b = url_key("https://example.com/post/1").unwrap();
        assert_eq!(a, b);
        assert_eq!(b, "https://example.com/post/1");
    }

    #[test]
    fn url_key_keeps_identifying_params_sorted() {
        let a = url_key("https://news.ycombinator.com/item?id=42&fbclid=abc").unwrap();
        let b = url_key("https://news.ycombinator.com/item?id=43").unwrap();
        assert_ne!(a, b);
        assert_eq!(a, "https://news.ycombinator.com/item?id=42");
        let c = url_key("https://x.io/s?b=2&a=1").unwrap();
        let d = url_key("https://x.io/s?a=1&b=2").unwrap();
        assert_eq!(c, d);
    }

    #[test]
    fn url_key_rejects_non_http() {
        assert!(url_key("ftp://example.com/a").is_none());
        assert!(url_key("/relative/path").is_none());
        assert!(url_key("").is_none());
    }

    #[test]
    fn default_port_is_dropped() {
        assert_eq!(
            url_key("https://example.com:443/a").unwrap(),
            url_key("https://example.com/a").unwrap()
        );
        assert_ne!(
            url_key("https://example.com:8443/a").unwrap(),
            url_key("https://example.com/a").unwrap()
        );
    }

    #[test]
    fn title_key_strips_punctuation() {
        assert_eq!(title_key("  GPT-5: It's   here!! "), "gpt5 its here");
    }

    #[test]
    fn fingerprint_is_idempotent() {
        let raw = RawItem::new("HN", SourceType::Social, "A title", "https://a.io/x?utm_campaign=1");
        let a = normalize(&raw, t0()).unwrap();
        let b = normalize(&raw, t0()).unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(a.id.len(), FINGERPRINT_BYTES * 2);
    }

    #[test]
    fn unstable_url_falls_back_to_title() {
        let a = RawItem::new("Reddit", SourceType::Social, "Same Title!", "https://r.io/1").with_unstable_url();
        let b = RawItem::new("Blog", SourceType::Blog, "same   title", "https://r.io/2").with_unstable_url();
        assert_eq!(normalize(&a, t0()).unwrap().id, normalize(&b, t0()).unwrap().id);
    }

    #[test]
    fn missing_url_uses_title_and_keeps_display_url_empty() {
        let raw = RawItem::new("Feed", SourceType::Blog, "Only a title", "");
        let it = normalize(&raw, t0()).unwrap();
        assert_eq!(it.url, "");
        assert_eq!(it.id, fingerprint("t:only a title"));
    }

    #[test]
    fn undated_item_is_treated_as_now() {
        let raw = RawItem::new("Feed", SourceType::Blog, "x", "https://a.io/x");
        assert_eq!(normalize(&raw, t0()).unwrap().published_at, t0());
    }

    #[test]
    fn both_empty_is_malformed() {
        let raw = RawItem::new("Feed", SourceType::Blog, "   ", " ");
        assert!(matches!(
            normalize(&raw, t0()),
            Err(MalformedItemError::MissingTitleAndUrl { .. })
        ));
    }

    #[test]
    fn unusable_url_and_punctuation_title_has_no_identity() {
        let raw = RawItem::new("Feed", SourceType::Blog, "!!!", "not a url");
        assert!(matches!(
            normalize(&raw, t0()),
            Err(MalformedItemError::NoIdentity { .. })
        ));
    }

    #[test]
    fn blank_image_url_is_dropped() {
        let with = RawItem::new("Feed", SourceType::Blog, "x", "https://a.io/x").with_image(" https://a.io/i.png ");
        let blank = RawItem::new("Feed", SourceType::Blog, "x", "https://a.io/x").with_image("   ");
        assert_eq!(normalize(&with, t0()).unwrap().image_url.as_deref(), Some("https://a.io/i.png"));
        assert!(normalize(&blank, t0()).unwrap().image_url.is_none());
    }

    #[test]
    fn display_url_keeps_query() {
        let raw = RawItem::new("Feed", SourceType::Blog, "x", " https://a.io/x?utm_source=y ");
        assert_eq!(normalize(&raw, t0()).unwrap().url, "https://a.io/x?utm_source=y");
    }
}
