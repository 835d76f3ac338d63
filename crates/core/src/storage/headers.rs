//! Header list encoding for the `request_headers`/`response_headers` blobs.
//!
//! A header list is stored as a JSON array of `[name, value]` pairs so that
//! repeated headers survive a round trip in their original order. A value is
//! a string when it is valid UTF-8 and an array of raw bytes otherwise.

use http::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::Error;

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum StoredValue {
    Text(String),
    Bytes(Vec<u8>),
}

impl From<&HeaderValue> for StoredValue {
    fn from(value: &HeaderValue) -> Self {
        match std::str::from_utf8(value.as_bytes()) {
            Ok(text) => StoredValue::Text(text.to_string()),
            Err(_) => StoredValue::Bytes(value.as_bytes().to_vec()),
        }
    }
}

impl StoredValue {
    fn as_bytes(&self) -> &[u8] {
        match self {
            StoredValue::Text(text) => text.as_bytes(),
            StoredValue::Bytes(bytes) => bytes,
        }
    }
}

pub fn encode(headers: &HeaderMap) -> Result<Vec<u8>, Error> {
    let pairs: Vec<(&str, StoredValue)> = headers
        .iter()
        .map(|(name, value)| (name.as_str(), StoredValue::from(value)))
        .collect();

    serde_json::to_vec(&pairs).map_err(|e| Error::InvalidHeaders(e.to_string()))
}

pub fn decode(blob: &[u8]) -> Result<HeaderMap, Error> {
    let pairs: Vec<(String, StoredValue)> =
        serde_json::from_slice(blob).map_err(|e| Error::InvalidHeaders(e.to_string()))?;

    let mut headers = HeaderMap::with_capacity(pairs.len());
    for (name, value) in pairs {
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| Error::InvalidHeaders(e.to_string()))?;
        let value = HeaderValue::from_bytes(value.as_bytes()).map_err(|e| Error::InvalidHeaders(e.to_string()))?;
        headers.append(name, value);
    }

    Ok(headers)
}
