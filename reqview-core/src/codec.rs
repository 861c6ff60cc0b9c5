//! Header and payload codec.
//!
//! Headers are edited as free text (`Key: Value` per line) and stored as an
//! ordered list. Duplicates are legal and order is preserved; only the
//! transport mapping collapses them.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CodecError;

/// An HTTP header: `Key: Value`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub key: String,
    pub value: String,
}

impl Header {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// How the request payload text is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestType {
    #[default]
    Json,
    Text,
}

impl std::fmt::Display for RequestType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RequestType::Json => "JSON",
            RequestType::Text => "TEXT",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for RequestType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "JSON" => Ok(RequestType::Json),
            "TEXT" => Ok(RequestType::Text),
            other => Err(format!("unknown request type: {}", other)),
        }
    }
}

/// Parse header text into an ordered list.
///
/// Each line is split on its first colon. Lines without a colon, or with
/// an empty name, contribute nothing.
pub fn parse_header_list(text: &str) -> Vec<Header> {
    text.lines()
        .filter_map(|line| {
            let (key, value) = line.split_once(':')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            Some(Header::new(key, value.trim()))
        })
        .collect()
}

/// Serialize a header list back to editor text, one `name: value` per line.
pub fn string_headers(headers: &[Header]) -> String {
    headers
        .iter()
        .map(|h| format!("{}: {}", h.key, h.value))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Collapse the list into the mapping handed to the transport.
///
/// A repeated name keeps the position of its first occurrence but the value
/// of its last one.
pub fn header_list_to_object(headers: &[Header]) -> IndexMap<String, String> {
    let mut map = IndexMap::with_capacity(headers.len());
    for h in headers {
        map.insert(h.key.clone(), h.value.clone());
    }
    map
}

/// Interpret the raw payload text according to the request type.
///
/// Blank text means "no body". A JSON payload that does not parse is an
/// error: the send fails rather than shipping malformed data.
pub fn parse_payload(text: &str, request_type: RequestType) -> Result<Option<Value>, CodecError> {
    if text.trim().is_empty() {
        return Ok(None);
    }
    match request_type {
        RequestType::Json => serde_json::from_str(text)
            .map(Some)
            .map_err(|e| CodecError::InvalidJsonPayload(e.to_string())),
        RequestType::Text => Ok(Some(Value::String(text.to_string()))),
    }
}
