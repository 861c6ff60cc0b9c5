//! Request executor boundary.
//!
//! The core never performs I/O itself. `SEND_REQUEST` produces a
//! [`RequestDescriptor`]; the session hands it to an [`HttpClient`]
//! implementation supplied by the host (the CLI uses `reqwest`).

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

use crate::error::CoreError;

/// Supported HTTP methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for HttpMethod {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            "HEAD" => Ok(HttpMethod::Head),
            "OPTIONS" => Ok(HttpMethod::Options),
            _ => Err(CoreError::UnsupportedMethod(s.to_string())),
        }
    }
}

/// Everything the executor needs to issue one request.
///
/// Also the shape accepted by an explicit `SEND_REQUEST` payload:
/// `{"url": ..., "method": ..., "data": ..., "headers": {...}}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RequestDescriptor {
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub headers: IndexMap<String, String>,
}

fn default_method() -> String {
    "GET".to_string()
}

impl RequestDescriptor {
    pub fn http_method(&self) -> Result<HttpMethod, CoreError> {
        self.method.parse()
    }

    /// Body text as it goes on the wire. Strings are sent raw, any other
    /// JSON value is serialized.
    pub fn body_text(&self) -> Option<String> {
        match &self.data {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        }
    }

    /// Headers as sent. A JSON body (anything but a string) gets
    /// `Content-Type: application/json` unless one is already set.
    pub fn header_pairs(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = self
            .headers
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let json_body = matches!(&self.data, Some(data) if !data.is_null() && !data.is_string());
        if json_body && !pairs.iter().any(|(k, _)| k.eq_ignore_ascii_case("content-type")) {
            pairs.push(("Content-Type".to_string(), "application/json".to_string()));
        }
        pairs
    }
}

/// Output of a completed HTTP request.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A generic interface to execute an HTTP request.
///
/// Implementations are called from a blocking worker thread, so they may
/// block freely. Timeouts and retries are the implementation's business.
pub trait HttpClient: Send + Sync + 'static {
    fn execute(
        &self,
        method: &HttpMethod,
        url: &str,
        headers: &[(String, String)],
        body: Option<&str>,
    ) -> Result<HttpResponse, String>;
}
