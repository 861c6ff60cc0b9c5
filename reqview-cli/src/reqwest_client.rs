use std::sync::OnceLock;
use std::time::Duration;

use reqview_core::client::{HttpClient, HttpMethod, HttpResponse};

/// The HTTP client used by the terminal front-end, built on `reqwest`'s
/// blocking client.
///
/// The inner client is created on first use, which is always on a blocking
/// worker thread: `reqwest::blocking` must not be set up from inside the
/// async runtime.
pub struct ReqwestClient {
    timeout: Duration,
    client: OnceLock<Result<reqwest::blocking::Client, String>>,
}

impl ReqwestClient {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            client: OnceLock::new(),
        }
    }

    fn client(&self) -> Result<&reqwest::blocking::Client, String> {
        self.client
            .get_or_init(|| {
                reqwest::blocking::Client::builder()
                    .timeout(self.timeout)
                    .build()
                    .map_err(|e| format!("Failed to build HTTP client: {}", e))
            })
            .as_ref()
            .map_err(Clone::clone)
    }
}

impl Default for ReqwestClient {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl HttpClient for ReqwestClient {
    fn execute(
        &self,
        method: &HttpMethod,
        url: &str,
        headers: &[(String, String)],
        body: Option<&str>,
    ) -> Result<HttpResponse, String> {
        let client = self.client()?;
        let mut builder = match method {
            HttpMethod::Get => client.get(url),
            HttpMethod::Post => client.post(url),
            HttpMethod::Put => client.put(url),
            HttpMethod::Patch => client.patch(url),
            HttpMethod::Delete => client.delete(url),
            HttpMethod::Head => client.head(url),
            HttpMethod::Options => client.request(reqwest::Method::OPTIONS, url),
        };

        for (k, v) in headers {
            builder = builder.header(k.as_str(), v.as_str());
        }

        if let Some(b) = body {
            builder = builder.body(b.to_string());
        }

        let response = builder.send().map_err(|e| {
            tracing::warn!(%method, url, error = %e, "request failed");
            format!("Request failed: {}", e)
        })?;

        let status = response.status().as_u16();
        tracing::debug!(%method, url, status, "response received");

        let mut out_headers = Vec::new();
        for (k, v) in response.headers() {
            out_headers.push((
                k.as_str().to_string(),
                v.to_str().unwrap_or("(binary)").to_string(),
            ));
        }

        let body_text = response
            .text()
            .map_err(|e| format!("Failed to read response body: {}", e))?;

        Ok(HttpResponse {
            status,
            headers: out_headers,
            body: body_text,
        })
    }
}
