//! The application state snapshot.

use std::sync::Arc;

use serde_json::Value;

use crate::codec::{parse_header_list, Header, RequestType};
use crate::sidecar::{self, Sidecar};
use crate::view_key::ViewKey;

/// One immutable snapshot of everything the UI renders.
///
/// The store never mutates a published snapshot; each accepted action
/// produces a fresh one. Response and view are shared behind `Arc` so a
/// snapshot is cheap to copy.
#[derive(Debug, Clone, PartialEq)]
pub struct AppState {
    pub view_key: ViewKey,
    pub request_type: RequestType,
    pub request_method: String,
    pub request_url: String,
    /// Raw payload text as typed; interpreted only when a request is built.
    pub request_payload: String,
    pub request_headers: Vec<Header>,
    pub response: Option<Arc<Value>>,
    pub response_error: Option<String>,
    pub response_transform: String,
    pub response_transform_error: Option<String>,
    /// The transformed response, or the response itself when there is no
    /// transform or it failed.
    pub view: Option<Arc<Value>>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            view_key: ViewKey::Unset,
            request_type: RequestType::Json,
            request_method: "GET".to_string(),
            request_url: String::new(),
            request_payload: String::new(),
            request_headers: Vec::new(),
            response: None,
            response_error: None,
            response_transform: String::new(),
            response_transform_error: None,
            view: None,
        }
    }
}

impl AppState {
    /// Initial state, seeded from whatever the sidecar remembers.
    pub fn from_sidecar(store: &impl Sidecar) -> Self {
        let mut state = AppState {
            view_key: ViewKey::from_stored(store.get(sidecar::LAST_VIEW_KEY).as_deref()),
            ..AppState::default()
        };
        if let Some(request_type) = store.get(sidecar::LAST_REQUEST_TYPE) {
            match request_type.parse() {
                Ok(t) => state.request_type = t,
                Err(e) => tracing::warn!(error = %e, "ignoring stored request type"),
            }
        }
        if let Some(method) = store.get(sidecar::LAST_METHOD).filter(|m| !m.is_empty()) {
            state.request_method = method;
        }
        if let Some(url) = store.get(sidecar::LAST_URL) {
            state.request_url = url;
        }
        if let Some(payload) = store.get(sidecar::LAST_PAYLOAD) {
            state.request_payload = payload;
        }
        if let Some(headers) = store.get(sidecar::LAST_HEADERS) {
            state.request_headers = parse_header_list(&headers);
        }
        if let Some(transform) = store.get(sidecar::LAST_RES_TRANSFORM) {
            state.response_transform = transform;
        }
        state
    }

    /// The value the key list and table are drawn from.
    pub fn view(&self) -> Option<&Value> {
        self.view.as_deref()
    }

    pub fn response(&self) -> Option<&Value> {
        self.response.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sidecar::MemorySidecar;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_state() {
        let state = AppState::default();
        assert_eq!(state.request_method, "GET");
        assert_eq!(state.request_type, RequestType::Json);
        assert_eq!(state.view_key, ViewKey::Unset);
        assert!(state.response.is_none());
    }

    #[test]
    fn test_from_sidecar() {
        let store = MemorySidecar::with_values([
            (sidecar::LAST_URL, "http://localhost:3000/users"),
            (sidecar::LAST_METHOD, "POST"),
            (sidecar::LAST_REQUEST_TYPE, "TEXT"),
            (sidecar::LAST_PAYLOAD, "hello"),
            (sidecar::LAST_HEADERS, "A: 1\nB: 2"),
            (sidecar::LAST_RES_TRANSFORM, "response.users"),
            (sidecar::LAST_VIEW_KEY, ""),
        ]);
        let state = AppState::from_sidecar(&store);
        assert_eq!(state.request_url, "http://localhost:3000/users");
        assert_eq!(state.request_method, "POST");
        assert_eq!(state.request_type, RequestType::Text);
        assert_eq!(state.request_payload, "hello");
        assert_eq!(
            state.request_headers,
            vec![Header::new("A", "1"), Header::new("B", "2")]
        );
        assert_eq!(state.response_transform, "response.users");
        assert_eq!(state.view_key, ViewKey::Cleared);
    }

    #[test]
    fn test_from_sidecar_ignores_bad_values() {
        let store = MemorySidecar::with_values([
            (sidecar::LAST_REQUEST_TYPE, "XML"),
            (sidecar::LAST_METHOD, ""),
        ]);
        let state = AppState::from_sidecar(&store);
        assert_eq!(state.request_type, RequestType::Json);
        assert_eq!(state.request_method, "GET");
    }
}
