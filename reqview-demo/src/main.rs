use reqview_core::client::{HttpClient, HttpMethod, HttpResponse};
use reqview_core::view_key::{key_list, table_columns, table_rows};
use reqview_core::{Action, ActionName, MemorySidecar, Session, Store};
use std::process;

/// A simple Mock Client for demonstration.
/// It doesn't actually make HTTP requests, but returns canned responses.
pub struct ExampleMockClient;

impl HttpClient for ExampleMockClient {
    fn execute(
        &self,
        method: &HttpMethod,
        url: &str,
        _headers: &[(String, String)],
        body: Option<&str>,
    ) -> Result<HttpResponse, String> {
        println!(">>> [MOCK] Intercepted a {} request to '{}'", method, url);
        if let Some(b) = body {
            println!(">>> [MOCK] Body: {}", b);
        }

        let body = if url.ends_with("/users") {
            r#"{
                "meta": {"page": 1},
                "users": [
                    {"id": 1, "name": "Ada", "active": true, "roles": ["admin"]},
                    {"id": 2, "name": "Linus", "active": false, "roles": []},
                    {"id": 3, "name": "Grace", "active": true, "roles": ["ops", "dev"]}
                ],
                "tags": ["a", "b"]
            }"#
        } else {
            r#"{"message": "Hello from ExampleMockClient!"}"#
        };

        Ok(HttpResponse {
            status: 200,
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: body.to_string(),
        })
    }
}

fn show(session: &Session<ExampleMockClient, MemorySidecar>) {
    let state = session.state();
    if let Some(err) = &state.response_transform_error {
        println!("  transform error: {}", err);
    }
    let Some(view) = state.view() else {
        println!("  (no response)");
        return;
    };
    println!("  view: {}", view);
    let keys: Vec<String> = key_list(view)
        .into_iter()
        .map(|k| if k.is_list { format!("[{}]", k.name) } else { k.name })
        .collect();
    println!("  keys: {}", keys.join(", "));
    println!("  selected: {:?}", state.view_key);
    if let Some(rows) = table_rows(view, state.view_key.as_str()) {
        println!("  columns: {}", table_columns(rows).join(" | "));
    }
}

#[tokio::main]
async fn main() {
    let mut store = Store::new(MemorySidecar::new());
    store.register_all(|action, _| println!("--- {}", action.name()));
    store.register(ActionName::UpdateResponse, |_, state| {
        println!("    response installed, view key {:?}", state.view_key.as_str());
    });

    // We instantiate our custom mock client instead of reqwest
    let mut session = Session::new(store, ExampleMockClient);

    let script = vec![
        Action::UpdateRequestUrl("http://localhost:3000/users".to_string()),
        Action::UpdateRequestHeaders(vec![reqview_core::Header::new("Accept", "application/json")]),
        Action::SendRequest(None),
    ];
    for action in script {
        if let Err(e) = session.dispatch(action) {
            eprintln!("Dispatch error: {}", e);
            process::exit(1);
        }
    }
    if let Err(e) = session.settle().await {
        eprintln!("Completion error: {}", e);
        process::exit(1);
    }
    show(&session);

    println!("\nReshaping with a transform...");
    let transforms = [
        "response.users.filter(u => u.active).map(u => u.name)",
        "{ people: response.users.map(u => ({ id: u.id, name: u.name.toUpperCase() })), total: count(response.users) }",
        "response.users.",
    ];
    for source in transforms {
        println!("\n> {}", source);
        if let Err(e) = session.dispatch(Action::UpdateResponseTransform(source.to_string())) {
            eprintln!("Dispatch error: {}", e);
            process::exit(1);
        }
        show(&session);
    }

    println!("\nDispatching by name, as a UI would...");
    for (name, payload) in [
        ("UPDATE_RES_TRANSFORM", Some(serde_json::json!(""))),
        ("UPDATE_VIEWKEY", Some(serde_json::json!("tags"))),
        ("NOT_A_REAL_ACTION", None),
    ] {
        if let Err(e) = session.dispatch_named(name, payload) {
            eprintln!("Dispatch error: {}", e);
            process::exit(1);
        }
    }
    show(&session);
}
