//! The state store.
//!
//! `Store::dispatch` is the only way state changes. It reduces the action
//! against the current snapshot, publishes the new snapshot, persists the
//! request fields that survive restarts, then notifies listeners.
//! `SEND_REQUEST` changes nothing; it hands a request back to the caller.

use std::sync::Arc;

use serde_json::Value;

use crate::action::{Action, ActionName};
use crate::client::RequestDescriptor;
use crate::codec::{header_list_to_object, parse_payload, string_headers};
use crate::dispatcher::{Dispatcher, SubscriptionId};
use crate::error::CoreError;
use crate::sidecar::{self, Sidecar};
use crate::state::AppState;
use crate::transform::TransformEngine;
use crate::view_key::{reconcile, ViewKey};

pub struct Store<S: Sidecar> {
    state: Arc<AppState>,
    dispatcher: Dispatcher,
    engine: TransformEngine,
    sidecar: S,
}

impl<S: Sidecar> Store<S> {
    /// Create a store whose initial state is read from `sidecar`.
    pub fn new(sidecar: S) -> Self {
        let state = AppState::from_sidecar(&sidecar);
        Self {
            state: Arc::new(state),
            dispatcher: Dispatcher::new(),
            engine: TransformEngine::new(),
            sidecar,
        }
    }

    /// The current snapshot. Cheap to clone and safe to hold across
    /// dispatches; it never changes after being published.
    pub fn state(&self) -> Arc<AppState> {
        Arc::clone(&self.state)
    }

    pub fn sidecar(&self) -> &S {
        &self.sidecar
    }

    pub fn register<F>(&mut self, name: ActionName, callback: F) -> SubscriptionId
    where
        F: FnMut(&Action, &AppState) + 'static,
    {
        self.dispatcher.register(name, callback)
    }

    pub fn register_all<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&Action, &AppState) + 'static,
    {
        self.dispatcher.register_all(callback)
    }

    pub fn unregister(&mut self, id: SubscriptionId) -> bool {
        self.dispatcher.unregister(id)
    }

    /// Dispatch by wire name. Unknown names are ignored.
    pub fn dispatch_named(
        &mut self,
        name: &str,
        payload: Option<Value>,
    ) -> Result<Option<RequestDescriptor>, CoreError> {
        match Action::from_named(name, payload)? {
            Some(action) => self.dispatch(action),
            None => {
                tracing::debug!(action = name, "ignoring unknown action");
                Ok(None)
            }
        }
    }

    /// Apply `action`. Returns the request to send for `SEND_REQUEST`.
    pub fn dispatch(&mut self, action: Action) -> Result<Option<RequestDescriptor>, CoreError> {
        tracing::debug!(action = %action.name(), "dispatch");
        let request = self.reduce(&action)?;
        self.persist(&action);
        self.dispatcher.dispatch(&action, &self.state);
        Ok(request)
    }

    fn reduce(&mut self, action: &Action) -> Result<Option<RequestDescriptor>, CoreError> {
        let mut next = AppState::clone(&self.state);
        match action {
            Action::SendRequest(explicit) => {
                let request = match explicit {
                    Some(request) => request.clone(),
                    None => build_request(&self.state)?,
                };
                request.http_method()?;
                if request.url.trim().is_empty() {
                    return Err(CoreError::InvalidRequest("request URL is empty".to_string()));
                }
                return Ok(Some(request));
            }
            Action::UpdateResponse(value) => {
                let response = Arc::new(value.clone());
                next.response_error = None;
                self.install_view(&mut next, &response);
                if let Some(key) = next.view().map(|view| reconcile(&next.view_key, view)) {
                    next.view_key = key;
                }
                next.response = Some(response);
            }
            Action::UpdateResponseError(message) => {
                next.response_error = Some(message.clone());
            }
            Action::UpdateViewKey(key) => {
                next.view_key = ViewKey::from_stored(Some(key));
            }
            Action::UpdateRequestType(request_type) => next.request_type = *request_type,
            Action::UpdateRequestHeaders(headers) => next.request_headers = headers.clone(),
            Action::UpdateRequestUrl(url) => next.request_url = url.clone(),
            Action::UpdateRequestMethod(method) => next.request_method = method.clone(),
            Action::UpdateRequestPayload(payload) => next.request_payload = payload.clone(),
            Action::UpdateResponseTransform(source) => {
                next.response_transform = source.clone();
                match next.response.clone() {
                    Some(response) => self.install_view(&mut next, &response),
                    None => {
                        next.response_transform_error =
                            self.engine.compile(source).err().map(|e| e.to_string());
                    }
                }
            }
            Action::UpdateResponseTransformError(message) => {
                next.response_transform_error = non_empty(message);
            }
        }
        self.state = Arc::new(next);
        Ok(None)
    }

    /// Run the current transform over `response` and install the result
    /// (or the response itself, on failure) as the view.
    fn install_view(&mut self, next: &mut AppState, response: &Arc<Value>) {
        let outcome = self.engine.apply(&next.response_transform, response);
        next.response_transform_error = outcome.error;
        next.view = Some(if next.response_transform_error.is_some() {
            Arc::clone(response)
        } else {
            Arc::new(outcome.view)
        });
    }

    fn persist(&mut self, action: &Action) {
        let (key, value) = match action {
            Action::UpdateViewKey(key) => (sidecar::LAST_VIEW_KEY, key.clone()),
            Action::UpdateRequestType(t) => (sidecar::LAST_REQUEST_TYPE, t.to_string()),
            Action::UpdateRequestHeaders(h) => (sidecar::LAST_HEADERS, string_headers(h)),
            Action::UpdateRequestUrl(url) => (sidecar::LAST_URL, url.clone()),
            Action::UpdateRequestMethod(m) => (sidecar::LAST_METHOD, m.clone()),
            Action::UpdateRequestPayload(p) => (sidecar::LAST_PAYLOAD, p.clone()),
            Action::UpdateResponseTransform(src) => (sidecar::LAST_RES_TRANSFORM, src.clone()),
            _ => return,
        };
        if let Err(e) = self.sidecar.set(key, &value) {
            tracing::warn!(key, error = %e, "failed to persist state");
        }
    }
}

impl<S: Sidecar> std::fmt::Debug for Store<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("state", &self.state)
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

/// Synthesize the request described by the editor fields.
pub fn build_request(state: &AppState) -> Result<RequestDescriptor, CoreError> {
    let data = parse_payload(&state.request_payload, state.request_type)?;
    Ok(RequestDescriptor {
        url: state.request_url.clone(),
        method: state.request_method.clone(),
        data,
        headers: header_list_to_object(&state.request_headers),
    })
}

fn non_empty(message: &str) -> Option<String> {
    (!message.is_empty()).then(|| message.to_string())
}
