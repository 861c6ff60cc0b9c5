//! The fixed action vocabulary.
//!
//! Actions are typed, but they can also arrive by wire name with a loose
//! JSON payload (the way UI collaborators and scripts speak to the store).
//! An unknown name decodes to `None` and is ignored by the store.

use serde_json::Value;

use crate::client::RequestDescriptor;
use crate::codec::{parse_header_list, Header, RequestType};
use crate::error::CoreError;

/// Wire names of every action the store understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionName {
    SendRequest,
    UpdateResponse,
    UpdateResponseError,
    UpdateViewKey,
    UpdateRequestType,
    UpdateRequestHeaders,
    UpdateRequestUrl,
    UpdateRequestMethod,
    UpdateRequestPayload,
    UpdateResponseTransform,
    UpdateResponseTransformError,
}

impl ActionName {
    pub const ALL: [ActionName; 11] = [
        ActionName::SendRequest,
        ActionName::UpdateResponse,
        ActionName::UpdateResponseError,
        ActionName::UpdateViewKey,
        ActionName::UpdateRequestType,
        ActionName::UpdateRequestHeaders,
        ActionName::UpdateRequestUrl,
        ActionName::UpdateRequestMethod,
        ActionName::UpdateRequestPayload,
        ActionName::UpdateResponseTransform,
        ActionName::UpdateResponseTransformError,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionName::SendRequest => "SEND_REQUEST",
            ActionName::UpdateResponse => "UPDATE_RESPONSE",
            ActionName::UpdateResponseError => "UPDATE_RESPONSE_ERROR",
            ActionName::UpdateViewKey => "UPDATE_VIEWKEY",
            ActionName::UpdateRequestType => "UPDATE_REQ_TYPE",
            ActionName::UpdateRequestHeaders => "UPDATE_REQ_HEADERS",
            ActionName::UpdateRequestUrl => "UPDATE_REQ_URL",
            ActionName::UpdateRequestMethod => "UPDATE_REQ_METHOD",
            ActionName::UpdateRequestPayload => "UPDATE_REQ_PAYLOAD",
            ActionName::UpdateResponseTransform => "UPDATE_RES_TRANSFORM",
            ActionName::UpdateResponseTransformError => "UPDATE_RES_TRANSFORM_ERROR",
        }
    }
}

impl std::fmt::Display for ActionName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ActionName {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or(())
    }
}

/// A request to change application state.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// `None` means "build the request from the current state".
    SendRequest(Option<RequestDescriptor>),
    UpdateResponse(Value),
    UpdateResponseError(String),
    UpdateViewKey(String),
    UpdateRequestType(RequestType),
    UpdateRequestHeaders(Vec<Header>),
    UpdateRequestUrl(String),
    UpdateRequestMethod(String),
    UpdateRequestPayload(String),
    UpdateResponseTransform(String),
    UpdateResponseTransformError(String),
}

impl Action {
    pub fn name(&self) -> ActionName {
        match self {
            Action::SendRequest(_) => ActionName::SendRequest,
            Action::UpdateResponse(_) => ActionName::UpdateResponse,
            Action::UpdateResponseError(_) => ActionName::UpdateResponseError,
            Action::UpdateViewKey(_) => ActionName::UpdateViewKey,
            Action::UpdateRequestType(_) => ActionName::UpdateRequestType,
            Action::UpdateRequestHeaders(_) => ActionName::UpdateRequestHeaders,
            Action::UpdateRequestUrl(_) => ActionName::UpdateRequestUrl,
            Action::UpdateRequestMethod(_) => ActionName::UpdateRequestMethod,
            Action::UpdateRequestPayload(_) => ActionName::UpdateRequestPayload,
            Action::UpdateResponseTransform(_) => ActionName::UpdateResponseTransform,
            Action::UpdateResponseTransformError(_) => ActionName::UpdateResponseTransformError,
        }
    }

    /// Decode a wire-named action. Unknown names yield `Ok(None)`; a known
    /// name with a payload of the wrong shape is an error.
    pub fn from_named(name: &str, payload: Option<Value>) -> Result<Option<Action>, CoreError> {
        let Ok(action_name) = name.parse::<ActionName>() else {
            return Ok(None);
        };
        let payload = payload.unwrap_or(Value::Null);
        let action = match action_name {
            ActionName::SendRequest => match payload {
                Value::Null => Action::SendRequest(None),
                Value::String(s) if s.is_empty() => Action::SendRequest(None),
                other => {
                    let descriptor = serde_json::from_value(other)
                        .map_err(|e| invalid(action_name, e.to_string()))?;
                    Action::SendRequest(Some(descriptor))
                }
            },
            ActionName::UpdateResponse => Action::UpdateResponse(payload),
            ActionName::UpdateResponseError => {
                Action::UpdateResponseError(text_payload(action_name, payload)?)
            }
            ActionName::UpdateViewKey => Action::UpdateViewKey(text_payload(action_name, payload)?),
            ActionName::UpdateRequestType => {
                let text = text_payload(action_name, payload)?;
                let request_type = text.parse().map_err(|e| invalid(action_name, e))?;
                Action::UpdateRequestType(request_type)
            }
            ActionName::UpdateRequestHeaders => {
                Action::UpdateRequestHeaders(headers_payload(action_name, payload)?)
            }
            ActionName::UpdateRequestUrl => {
                Action::UpdateRequestUrl(text_payload(action_name, payload)?)
            }
            ActionName::UpdateRequestMethod => {
                Action::UpdateRequestMethod(text_payload(action_name, payload)?)
            }
            ActionName::UpdateRequestPayload => {
                Action::UpdateRequestPayload(text_payload(action_name, payload)?)
            }
            ActionName::UpdateResponseTransform => {
                Action::UpdateResponseTransform(text_payload(action_name, payload)?)
            }
            ActionName::UpdateResponseTransformError => {
                Action::UpdateResponseTransformError(text_payload(action_name, payload)?)
            }
        };
        Ok(Some(action))
    }
}

fn invalid(name: ActionName, reason: impl Into<String>) -> CoreError {
    CoreError::InvalidPayload {
        action: name.to_string(),
        reason: reason.into(),
    }
}

/// Text payloads: a string, or null for "empty".
fn text_payload(name: ActionName, payload: Value) -> Result<String, CoreError> {
    match payload {
        Value::Null => Ok(String::new()),
        Value::String(s) => Ok(s),
        other => Err(invalid(name, format!("expected a string, got {}", other))),
    }
}

/// Header payloads: editor text, a list of `{"key", "value"}` objects, or a
/// list of `[name, value]` pairs.
fn headers_payload(name: ActionName, payload: Value) -> Result<Vec<Header>, CoreError> {
    match payload {
        Value::Null => Ok(Vec::new()),
        Value::String(text) => Ok(parse_header_list(&text)),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Array(pair) => match pair.as_slice() {
                    [Value::String(k), Value::String(v)] => Ok(Header::new(k.as_str(), v.as_str())),
                    _ => Err(invalid(name, "header pairs must be [name, value] strings")),
                },
                other => serde_json::from_value::<Header>(other)
                    .map_err(|e| invalid(name, e.to_string())),
            })
            .collect(),
        other => Err(invalid(name, format!("expected header text or a list, got {}", other))),
    }
}
