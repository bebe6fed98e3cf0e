//! Local paths built from backend ids and schema labels.

use reqwest::Url;

const BASE: &str = "http://localhost/";

/// `/a/b/...` with every segment percent-encoded.
pub fn path(segments: &[&str]) -> String {
    with_query(segments, &[])
}

/// Like [`path`], plus a url-encoded query string.
pub fn with_query(segments: &[&str], query: &[(&str, &str)]) -> String {
    let Ok(mut url) = Url::parse(BASE) else {
        return "/".to_string();
    };
    if let Ok(mut path) = url.path_segments_mut() {
        path.clear().extend(segments);
    }
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query);
    }
    match url.query() {
        Some(query) => format!("{}?{query}", url.path()),
        None => url.path().to_string(),
    }
}
