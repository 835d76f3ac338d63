//! URL normalization for cache-key comparisons.
//!
//! Parsing through [`url::Url`] already yields the WHATWG serialization
//! (lowercased scheme and host, default port dropped, path segments
//! percent-encoded and dot-segments resolved), so two URLs a browser treats as
//! the same target serialize identically. On top of that the cache may drop
//! the fragment and, for `ignore_search` queries, the query string.

use url::Url;

use crate::Error;

/// Parse and serialize `input`, optionally without its fragment.
pub fn normalize_str(input: &str, exclude_fragment: bool) -> Result<String, Error> {
    let parsed = Url::parse(input.trim())?;
    Ok(normalize(&parsed, exclude_fragment))
}

/// Serialize an already parsed URL, optionally without its fragment.
pub fn normalize(url: &Url, exclude_fragment: bool) -> String {
    if exclude_fragment && url.fragment().is_some() {
        let mut url = url.clone();
        url.set_fragment(None);
        url.into()
    } else {
        url.as_str().to_string()
    }
}

/// Compare two URLs by their normalized serializations.
pub fn url_equals(a: &Url, b: &Url, exclude_fragment: bool) -> bool {
    normalize(a, exclude_fragment) == normalize(b, exclude_fragment)
}

/// Copy of `url` with its query string removed.
pub fn without_search(url: &Url) -> Url {
    let mut url = url.clone();
    url.set_query(None);
    url
}

/// The string a bucket uses as the unique key for an entry.
pub fn entry_key(url: &Url) -> String {
    normalize(url, true)
}
