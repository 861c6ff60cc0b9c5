//! Session runtime: a store plus the machinery to run its requests.
//!
//! Dispatch and reduction stay on the task that owns the session. Each
//! request produced by `SEND_REQUEST` runs on the tokio blocking pool and
//! reports back over a channel; the owner feeds completions back into the
//! store with [`Session::complete`], in arrival order.

use std::sync::Arc;

use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::action::Action;
use crate::client::{HttpClient, HttpResponse, RequestDescriptor};
use crate::error::CoreError;
use crate::sidecar::Sidecar;
use crate::state::AppState;
use crate::store::Store;

/// The outcome of one request, tagged with the order it was sent in.
#[derive(Debug)]
pub struct Completion {
    pub generation: u64,
    pub url: String,
    pub result: Result<HttpResponse, String>,
}

pub struct Session<C: HttpClient, S: Sidecar> {
    store: Store<S>,
    client: Arc<C>,
    sender: UnboundedSender<Completion>,
    receiver: UnboundedReceiver<Completion>,
    generation: u64,
    in_flight: usize,
}

impl<C: HttpClient, S: Sidecar> Session<C, S> {
    pub fn new(store: Store<S>, client: C) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            store,
            client: Arc::new(client),
            sender,
            receiver,
            generation: 0,
            in_flight: 0,
        }
    }

    pub fn store(&self) -> &Store<S> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut Store<S> {
        &mut self.store
    }

    pub fn state(&self) -> Arc<AppState> {
        self.store.state()
    }

    /// Requests sent whose completion has not been applied yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn dispatch(&mut self, action: Action) -> Result<(), CoreError> {
        match self.store.dispatch(action)? {
            Some(request) => self.spawn(request),
            None => Ok(()),
        }
    }

    pub fn dispatch_named(&mut self, name: &str, payload: Option<Value>) -> Result<(), CoreError> {
        match self.store.dispatch_named(name, payload)? {
            Some(request) => self.spawn(request),
            None => Ok(()),
        }
    }

    fn spawn(&mut self, request: RequestDescriptor) -> Result<(), CoreError> {
        let handle = Handle::try_current().map_err(|e| CoreError::NoRuntime(e.to_string()))?;
        let method = request.http_method()?;
        self.generation += 1;
        let generation = self.generation;
        tracing::info!(generation, %method, url = %request.url, "sending request");

        let client = Arc::clone(&self.client);
        let sender = self.sender.clone();
        handle.spawn_blocking(move || {
            let headers = request.header_pairs();
            let body = request.body_text();
            let result = client.execute(&method, &request.url, &headers, body.as_deref());
            // the receiver only goes away with the session itself
            let _ = sender.send(Completion {
                generation,
                url: request.url,
                result,
            });
        });
        self.in_flight += 1;
        Ok(())
    }

    /// Wait for the next request to finish.
    pub async fn next_completion(&mut self) -> Option<Completion> {
        self.receiver.recv().await
    }

    pub fn try_completion(&mut self) -> Option<Completion> {
        self.receiver.try_recv().ok()
    }

    /// Feed a finished request back into the store.
    pub fn complete(&mut self, completion: Completion) -> Result<(), CoreError> {
        self.in_flight = self.in_flight.saturating_sub(1);
        let Completion {
            generation,
            url,
            result,
        } = completion;
        let action = match result {
            Ok(response) if response.is_success() => {
                tracing::debug!(generation, url = %url, status = response.status, "request completed");
                Action::UpdateResponse(decode_body(response.body))
            }
            Ok(response) => {
                tracing::debug!(generation, url = %url, status = response.status, "request failed");
                Action::UpdateResponseError(format!("HTTP {}: {}", response.status, response.body))
            }
            Err(message) => {
                tracing::debug!(generation, url = %url, error = %message, "request failed");
                Action::UpdateResponseError(message)
            }
        };
        self.dispatch(action)
    }

    /// Apply completions until nothing is in flight.
    pub async fn settle(&mut self) -> Result<(), CoreError> {
        while self.in_flight > 0 {
            match self.next_completion().await {
                Some(completion) => self.complete(completion)?,
                None => break,
            }
        }
        Ok(())
    }
}

/// A JSON body becomes its value; anything else is kept as a JSON string.
fn decode_body(body: String) -> Value {
    if body.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(&body).unwrap_or(Value::String(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::HttpMethod;
    use crate::sidecar::MemorySidecar;
    use serde_json::json;

    struct FixedClient {
        status: u16,
        body: &'static str,
    }

    impl HttpClient for FixedClient {
        fn execute(
            &self,
            _method: &HttpMethod,
            _url: &str,
            _headers: &[(String, String)],
            _body: Option<&str>,
        ) -> Result<HttpResponse, String> {
            Ok(HttpResponse {
                status: self.status,
                headers: vec![],
                body: self.body.to_string(),
            })
        }
    }

    fn session(status: u16, body: &'static str) -> Session<FixedClient, MemorySidecar> {
        let mut store = Store::new(MemorySidecar::new());
        store
            .dispatch(Action::UpdateRequestUrl("http://localhost/items".into()))
            .unwrap();
        Session::new(store, FixedClient { status, body })
    }

    #[tokio::test]
    async fn test_send_installs_json_response() {
        let mut session = session(200, r#"{"items": [{"id": 1}]}"#);
        session.dispatch(Action::SendRequest(None)).unwrap();
        assert_eq!(session.in_flight(), 1);

        let completion = session.next_completion().await.unwrap();
        assert_eq!(completion.generation, 1);
        session.complete(completion).unwrap();

        let state = session.state();
        assert_eq!(session.in_flight(), 0);
        assert_eq!(state.response(), Some(&json!({"items": [{"id": 1}]})));
        assert_eq!(state.view_key.as_str(), "items");
    }

    #[tokio::test]
    async fn test_text_body_becomes_string() {
        let mut session = session(200, "pong");
        session.dispatch_named("SEND_REQUEST", None).unwrap();
        session.settle().await.unwrap();
        assert_eq!(session.state().response(), Some(&json!("pong")));
    }

    #[tokio::test]
    async fn test_http_error_becomes_response_error() {
        let mut session = session(404, "missing");
        session.dispatch(Action::SendRequest(None)).unwrap();
        session.settle().await.unwrap();

        let state = session.state();
        assert_eq!(state.response_error.as_deref(), Some("HTTP 404: missing"));
        assert!(state.response.is_none());
    }

    #[test]
    fn test_send_outside_runtime_fails() {
        let mut session = session(200, "{}");
        assert!(matches!(
            session.dispatch(Action::SendRequest(None)),
            Err(CoreError::NoRuntime(_))
        ));
        assert_eq!(session.in_flight(), 0);
    }

    #[test]
    fn test_decode_body() {
        assert_eq!(decode_body(r#"{"a": 1}"#.to_string()), json!({"a": 1}));
        assert_eq!(decode_body("not json".to_string()), json!("not json"));
        assert_eq!(decode_body("  ".to_string()), Value::Null);
    }
}
