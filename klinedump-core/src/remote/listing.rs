//! S3 `ListObjects` response parsing.
//!
//! The bucket answers `?delimiter=/&prefix=...&marker=...` with a flat XML
//! document. Only `Key`, `IsTruncated` and `NextMarker` matter here, so the
//! document is scanned for those elements instead of being fully parsed.

use crate::error::DumpError;

/// One page of a bucket listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingPage {
    pub keys: Vec<String>,
    pub is_truncated: bool,
    pub next_marker: Option<String>,
}

impl ListingPage {
    /// Marker for the following request, if there is one.
    pub fn continuation(&self) -> Option<&str> {
        if !self.is_truncated {
            return None;
        }
        self.next_marker
            .as_deref()
            .or_else(|| self.keys.last().map(String::as_str))
    }
}

pub fn parse_listing(xml: &str) -> Result<ListingPage, DumpError> {
    if !xml.contains("<ListBucketResult") {
        return Err(DumpError::ListingFormat(
            "response is not a ListBucketResult document".into(),
        ));
    }

    let keys = element_texts(xml, "Key").map(unescape).collect();
    let is_truncated = element_texts(xml, "IsTruncated")
        .next()
        .map(|v| v.trim() == "true")
        .unwrap_or(false);
    let next_marker = element_texts(xml, "NextMarker")
        .next()
        .map(unescape)
        .filter(|m| !m.is_empty());

    Ok(ListingPage {
        keys,
        is_truncated,
        next_marker,
    })
}

/// Text content of every `<tag>…</tag>` occurrence, in document order.
fn element_texts<'a>(xml: &'a str, tag: &str) -> impl Iterator<Item = &'a str> + 'a {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let mut rest = xml;
    std::iter::from_fn(move || {
        let start = rest.find(&open)? + open.len();
        let len = rest[start..].find(&close)?;
        let text = &rest[start..start + len];
        rest = &rest[start + len + close.len()..];
        Some(text)
    })
}

fn unescape(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
