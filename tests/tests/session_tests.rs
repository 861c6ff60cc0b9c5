use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqview_core::client::{HttpClient, HttpMethod, HttpResponse};
use reqview_core::{Action, CodecError, CoreError, Header, MemorySidecar, Session, Store};

#[derive(Debug, Clone, PartialEq)]
struct CapturedRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

/// Answers with the canned body for the first matching URL suffix, after
/// an optional per-URL delay.
struct MockClient {
    pub calls: Arc<Mutex<Vec<CapturedRequest>>>,
    pub routes: Vec<(&'static str, u64, u16, &'static str)>,
}

impl MockClient {
    fn new(routes: Vec<(&'static str, u64, u16, &'static str)>) -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            routes,
        }
    }
}

impl HttpClient for MockClient {
    fn execute(
        &self,
        method: &HttpMethod,
        url: &str,
        headers: &[(String, String)],
        body: Option<&str>,
    ) -> Result<HttpResponse, String> {
        self.calls.lock().unwrap().push(CapturedRequest {
            method: *method,
            url: url.to_string(),
            headers: headers.to_owned(),
            body: body.map(|b| b.to_string()),
        });

        let Some(&(_, delay_ms, status, body)) =
            self.routes.iter().find(|(suffix, ..)| url.ends_with(suffix))
        else {
            return Err(format!("Request failed: connection refused ({})", url));
        };
        std::thread::sleep(Duration::from_millis(delay_ms));
        Ok(HttpResponse {
            status,
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: body.to_string(),
        })
    }
}

fn session(client: MockClient) -> Session<MockClient, MemorySidecar> {
    Session::new(Store::new(MemorySidecar::new()), client)
}

#[tokio::test]
async fn test_send_request_from_editor_state() {
    let client = MockClient::new(vec![("/items", 0, 201, r#"{"items": [{"_id": "a"}]}"#)]);
    let calls = Arc::clone(&client.calls);
    let mut session = session(client);

    session
        .dispatch(Action::UpdateRequestUrl("http://localhost:3000/items".into()))
        .unwrap();
    session.dispatch(Action::UpdateRequestMethod("post".into())).unwrap();
    session
        .dispatch(Action::UpdateRequestPayload(r#"{"name": "widget", "qty": 2}"#.into()))
        .unwrap();
    session
        .dispatch(Action::UpdateRequestHeaders(vec![
            Header::new("Content-Type", "application/json"),
            Header::new("X-Token", "old"),
            Header::new("X-Token", "new"),
        ]))
        .unwrap();
    session.dispatch(Action::SendRequest(None)).unwrap();
    session.settle().await.unwrap();

    let calls = calls.lock().unwrap();
    assert_eq!(
        *calls,
        vec![CapturedRequest {
            method: HttpMethod::Post,
            url: "http://localhost:3000/items".to_string(),
            headers: vec![
                ("Content-Type".to_string(), "application/json".to_string()),
                ("X-Token".to_string(), "new".to_string()),
            ],
            body: Some(r#"{"name":"widget","qty":2}"#.to_string()),
        }]
    );
    assert_eq!(session.state().response(), Some(&json!({"items": [{"_id": "a"}]})));
}

#[tokio::test]
async fn test_text_payload_is_sent_verbatim() {
    let client = MockClient::new(vec![("/echo", 0, 200, "ok")]);
    let calls = Arc::clone(&client.calls);
    let mut session = session(client);

    session.dispatch_named("UPDATE_REQ_URL", Some(json!("http://h/echo"))).unwrap();
    session.dispatch_named("UPDATE_REQ_TYPE", Some(json!("TEXT"))).unwrap();
    session.dispatch_named("UPDATE_REQ_METHOD", Some(json!("PUT"))).unwrap();
    session.dispatch_named("UPDATE_REQ_PAYLOAD", Some(json!("{not json"))).unwrap();
    session.dispatch_named("SEND_REQUEST", None).unwrap();
    session.settle().await.unwrap();

    assert_eq!(calls.lock().unwrap()[0].body.as_deref(), Some("{not json"));
    assert_eq!(session.state().response(), Some(&json!("ok")));
}

#[tokio::test]
async fn test_invalid_json_payload_is_not_sent() {
    let client = MockClient::new(vec![("/items", 0, 200, "{}")]);
    let calls = Arc::clone(&client.calls);
    let mut session = session(client);

    session.dispatch(Action::UpdateRequestUrl("http://h/items".into())).unwrap();
    session.dispatch(Action::UpdateRequestPayload("{\"a\": ".into())).unwrap();
    let err = session.dispatch(Action::SendRequest(None)).unwrap_err();

    assert!(matches!(err, CoreError::Codec(CodecError::InvalidJsonPayload(_))));
    assert_eq!(session.in_flight(), 0);
    assert!(calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_explicit_descriptor_overrides_state() {
    let client = MockClient::new(vec![("/other", 0, 200, r#"{"ok": true}"#)]);
    let calls = Arc::clone(&client.calls);
    let mut session = session(client);

    session.dispatch(Action::UpdateRequestUrl("http://h/items".into())).unwrap();
    session
        .dispatch_named(
            "SEND_REQUEST",
            Some(json!({
                "url": "http://h/other",
                "method": "DELETE",
                "headers": {"X-Why": "explicit"}
            })),
        )
        .unwrap();
    session.settle().await.unwrap();

    let calls = calls.lock().unwrap();
    assert_eq!(calls[0].method, HttpMethod::Delete);
    assert_eq!(calls[0].url, "http://h/other");
    assert_eq!(calls[0].body, None);
    assert_eq!(session.state().request_url, "http://h/items");
}

#[tokio::test]
async fn test_failures_become_response_errors() {
    let client = MockClient::new(vec![
        ("/good", 0, 200, r#"{"rows": [1, 2]}"#),
        ("/broken", 0, 500, "internal error"),
    ]);
    let mut session = session(client);

    session.dispatch(Action::UpdateRequestUrl("http://h/good".into())).unwrap();
    session.dispatch(Action::SendRequest(None)).unwrap();
    session.settle().await.unwrap();

    session.dispatch(Action::UpdateRequestUrl("http://h/broken".into())).unwrap();
    session.dispatch(Action::SendRequest(None)).unwrap();
    session.settle().await.unwrap();
    let state = session.state();
    assert_eq!(state.response_error.as_deref(), Some("HTTP 500: internal error"));
    assert_eq!(state.response(), Some(&json!({"rows": [1, 2]})));

    session.dispatch(Action::UpdateRequestUrl("http://h/nowhere".into())).unwrap();
    session.dispatch(Action::SendRequest(None)).unwrap();
    session.settle().await.unwrap();
    assert_eq!(
        session.state().response_error.as_deref(),
        Some("Request failed: connection refused (http://h/nowhere)")
    );
}

#[tokio::test]
async fn test_out_of_order_completions_apply_in_arrival_order() {
    let client = MockClient::new(vec![
        ("/slow", 300, 200, r#"{"from": "A", "rows": [1]}"#),
        ("/fast", 0, 200, r#"{"from": "B", "rows": [2]}"#),
    ]);
    let mut session = session(client);

    session.dispatch(Action::UpdateRequestUrl("http://h/slow".into())).unwrap();
    session.dispatch(Action::SendRequest(None)).unwrap();
    session.dispatch(Action::UpdateRequestUrl("http://h/fast".into())).unwrap();
    session.dispatch(Action::SendRequest(None)).unwrap();
    assert_eq!(session.in_flight(), 2);

    let first = session.next_completion().await.unwrap();
    assert_eq!((first.generation, first.url.as_str()), (2, "http://h/fast"));
    session.complete(first).unwrap();
    assert_eq!(session.state().response(), Some(&json!({"from": "B", "rows": [2]})));

    let second = session.next_completion().await.unwrap();
    assert_eq!((second.generation, second.url.as_str()), (1, "http://h/slow"));
    session.complete(second).unwrap();
    assert_eq!(session.state().response(), Some(&json!({"from": "A", "rows": [1]})));

    assert_eq!(session.in_flight(), 0);
    assert!(session.try_completion().is_none());
}

#[tokio::test]
async fn test_transform_runs_on_each_completion() {
    let client = MockClient::new(vec![(
        "/users",
        0,
        200,
        r#"{"users": [{"name": "Ada", "active": true}, {"name": "Bob", "active": false}]}"#,
    )]);
    let mut session = session(client);

    session
        .dispatch(Action::UpdateResponseTransform(
            "{ active: response.users.filter(u => u.active) }".into(),
        ))
        .unwrap();
    session.dispatch(Action::UpdateRequestUrl("http://h/users".into())).unwrap();
    session.dispatch(Action::SendRequest(None)).unwrap();
    session.settle().await.unwrap();

    let state = session.state();
    assert_eq!(
        state.view(),
        Some(&json!({"active": [{"name": "Ada", "active": true}]}))
    );
    assert_eq!(state.view_key.as_str(), "active");
    assert_eq!(state.response_transform_error, None);
}
