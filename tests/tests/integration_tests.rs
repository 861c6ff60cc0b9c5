use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use reqview_core::codec::{parse_header_list, string_headers};
use reqview_core::sidecar::{self, Sidecar};
use reqview_core::transform::TransformEngine;
use reqview_core::view_key::infer_view_key;
use reqview_core::{Action, ActionName, CoreError, Header, MemorySidecar, Store, ViewKey};

fn users() -> Value {
    json!({
        "meta": {"page": 1, "next": null},
        "users": [
            {"id": 1, "name": "Ada", "age": 36, "active": true, "tags": ["admin", "ops"]},
            {"id": 2, "name": "Linus", "age": 28, "active": false, "tags": []},
            {"id": 3, "name": "Grace", "age": 45, "active": true, "tags": ["dev"]}
        ]
    })
}

fn run(source: &str, response: &Value) -> Value {
    let mut engine = TransformEngine::new();
    let outcome = engine.apply(source, response);
    assert_eq!(outcome.error, None, "transform {:?} failed", source);
    outcome.view
}

fn run_err(source: &str, response: &Value) -> String {
    let mut engine = TransformEngine::new();
    let outcome = engine.apply(source, response);
    assert_eq!(&outcome.view, response, "failed transform must keep the response");
    outcome.error.expect("expected the transform to fail")
}

#[test]
fn test_transform_language_end_to_end() {
    let data = users();

    assert_eq!(run("response.users.length", &data), json!(3));
    assert_eq!(
        run("response.users.filter(u => u.active).map(u => u.name)", &data),
        json!(["Ada", "Grace"])
    );
    assert_eq!(
        run("response.users.find(u => u.age > 40).name", &data),
        json!("Grace")
    );
    assert_eq!(
        run("response.users.map(u => u.tags).flat().sort()", &data),
        json!(["admin", "dev", "ops"])
    );
    assert_eq!(run("sum(response.users.map(u => u.age))", &data), json!(109));
    assert_eq!(
        run("response.users.map((u, i) => i + ':' + u.name.toLowerCase()).join(' ')", &data),
        json!("0:ada 1:linus 2:grace")
    );
    assert_eq!(
        run("{ total: count(response.users), page: response.meta.page }", &data),
        json!({"total": 3, "page": 1})
    );
    assert_eq!(run("response.meta.next?.cursor ?? 'end'", &data), json!("end"));
    assert_eq!(
        run("response.users.some(u => u.tags.includes('dev')) ? 'yes' : 'no'", &data),
        json!("yes")
    );
    assert_eq!(run("keys(response)", &data), json!(["meta", "users"]));
    assert_eq!(run("response['users'][1].name", &data), json!("Linus"));
    assert_eq!(run("response.users.slice(-1).map(u => u.id)", &data), json!([3]));
}

#[test]
fn test_transform_errors_are_reported() {
    let data = users();

    assert_eq!(
        run_err("response.meta.next.cursor", &data),
        "Cannot read property 'cursor' of null"
    );
    assert!(!run_err("response.users.", &data).is_empty());
    assert!(run_err("process.exit(1)", &data).contains("process"));
    assert!(run_err("response.users.map(1)", &data).contains("map"));
    assert!(run_err("eval('1')", &data).contains("eval"));
}

#[test]
fn test_header_text_roundtrip() {
    let headers = vec![
        Header::new("Accept", "application/json"),
        Header::new("X-Trace", "a:b:c"),
        Header::new("Accept", "text/plain"),
    ];
    assert_eq!(parse_header_list(&string_headers(&headers)), headers);
    assert_eq!(
        parse_header_list("no colon here\nA: 1\n: orphan\n"),
        vec![Header::new("A", "1")]
    );
}

#[test]
fn test_view_key_inference_examples() {
    assert_eq!(infer_view_key(&json!({"a": {"x": 1}, "b": [1, 2, 3], "c": "s"})), "b");
    assert_eq!(infer_view_key(&json!({"a": 1})), "");
}

#[test]
fn test_store_flow_with_transform_and_view_key() {
    let mut store = Store::new(MemorySidecar::new());
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    store.register_all(move |action, state| {
        sink.borrow_mut()
            .push(format!("{} -> {}", action.name(), state.view_key.as_str()));
    });

    store.dispatch(Action::UpdateResponse(users())).unwrap();
    assert_eq!(store.state().view_key, ViewKey::Chosen("users".to_string()));

    store
        .dispatch_named(
            "UPDATE_RES_TRANSFORM",
            Some(json!("{ names: response.users.map(u => u.name) }")),
        )
        .unwrap();
    let state = store.state();
    assert_eq!(state.view(), Some(&json!({"names": ["Ada", "Linus", "Grace"]})));
    // the key is reconciled on the next response, not on a transform edit
    assert_eq!(state.view_key, ViewKey::Chosen("users".to_string()));

    store.dispatch(Action::UpdateResponse(users())).unwrap();
    assert_eq!(store.state().view_key, ViewKey::Chosen("names".to_string()));

    assert_eq!(
        *log.borrow(),
        vec![
            "UPDATE_RESPONSE -> users".to_string(),
            "UPDATE_RES_TRANSFORM -> users".to_string(),
            "UPDATE_RESPONSE -> names".to_string(),
        ]
    );
}

#[test]
fn test_snapshots_are_immutable() {
    let mut store = Store::new(MemorySidecar::new());
    store.dispatch(Action::UpdateRequestUrl("http://a".into())).unwrap();
    let old = store.state();
    store.dispatch(Action::UpdateRequestUrl("http://b".into())).unwrap();

    assert_eq!(old.request_url, "http://a");
    assert_eq!(store.state().request_url, "http://b");
    assert!(!Arc::ptr_eq(&old, &store.state()));
}

#[test]
fn test_unknown_and_malformed_actions() {
    let mut store = Store::new(MemorySidecar::new());
    let before = store.state();

    assert_eq!(store.dispatch_named("NOT_A_REAL_ACTION", None), Ok(None));
    assert!(Arc::ptr_eq(&before, &store.state()));

    let err = store
        .dispatch_named("UPDATE_REQ_HEADERS", Some(json!(42)))
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidPayload { ref action, .. } if action == "UPDATE_REQ_HEADERS"));
    assert!(Arc::ptr_eq(&before, &store.state()));
}

#[test]
fn test_restart_restores_request_and_view_key() {
    let mut store = Store::new(MemorySidecar::new());
    store.dispatch(Action::UpdateRequestUrl("http://localhost/users".into())).unwrap();
    store.dispatch(Action::UpdateRequestMethod("POST".into())).unwrap();
    store
        .dispatch(Action::UpdateResponseTransform("response.users".into()))
        .unwrap();
    store.dispatch(Action::UpdateViewKey(String::new())).unwrap();

    let saved = store.sidecar().clone();
    assert_eq!(saved.get(sidecar::LAST_VIEW_KEY).as_deref(), Some(""));

    let restarted = Store::new(saved);
    let state = restarted.state();
    assert_eq!(state.request_url, "http://localhost/users");
    assert_eq!(state.request_method, "POST");
    assert_eq!(state.response_transform, "response.users");
    assert_eq!(state.view_key, ViewKey::Cleared);
    assert!(state.response.is_none());
}

#[test]
fn test_listener_filtering_and_unregister() {
    let mut store = Store::new(MemorySidecar::new());
    let hits = Rc::new(RefCell::new(0));
    let counter = Rc::clone(&hits);
    let id = store.register(ActionName::UpdateViewKey, move |_, _| {
        *counter.borrow_mut() += 1;
    });

    store.dispatch(Action::UpdateViewKey("a".into())).unwrap();
    store.dispatch(Action::UpdateRequestUrl("http://x".into())).unwrap();
    assert!(store.unregister(id));
    assert!(!store.unregister(id));
    store.dispatch(Action::UpdateViewKey("b".into())).unwrap();

    assert_eq!(*hits.borrow(), 1);
}
