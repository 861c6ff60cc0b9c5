//! Core of reqview: a unidirectional state store for an HTTP/JSON
//! exploration tool.
//!
//! Every change flows one way. A caller dispatches an [`Action`]; the
//! [`Store`] reduces it into a fresh [`AppState`] snapshot, persists the
//! request fields through a [`Sidecar`], then notifies listeners. Responses
//! are reshaped by a small sandboxed expression language (see [`transform`])
//! before being displayed, and the [`Session`] runs the requests that
//! `SEND_REQUEST` produces through a host-supplied [`HttpClient`].

pub mod action;
pub mod ast;
pub mod client;
pub mod codec;
pub mod dispatcher;
pub mod error;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod session;
pub mod sidecar;
pub mod state;
pub mod store;
pub mod transform;
pub mod view_key;

pub use action::{Action, ActionName};
pub use client::{HttpClient, HttpMethod, HttpResponse, RequestDescriptor};
pub use codec::{Header, RequestType};
pub use dispatcher::SubscriptionId;
pub use error::{CodecError, CoreError};
pub use session::{Completion, Session};
pub use sidecar::{FileSidecar, MemorySidecar, Sidecar, SidecarError};
pub use state::AppState;
pub use store::Store;
pub use transform::{TransformEngine, TransformError};
pub use view_key::ViewKey;
