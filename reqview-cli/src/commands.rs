//! Interactive command parsing and execution.

use colored::Colorize;
use serde_json::Value;

use reqview_core::client::HttpClient;
use reqview_core::sidecar::Sidecar;
use reqview_core::{Action, CoreError, Session};

use crate::render;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Url(String),
    Method(String),
    Type(String),
    Payload(String),
    Headers(String),
    Transform(String),
    View(String),
    Send,
    Show,
    Keys,
    Table,
    Dispatch { name: String, payload: Option<Value> },
    Help,
    Quit,
    Empty,
}

const HELP: &[(&str, &str)] = &[
    ("url <URL>", "set the request URL"),
    ("method <METHOD>", "set the HTTP method"),
    ("type json|text", "how the payload is sent"),
    ("payload <TEXT>", "set the request body"),
    ("headers <TEXT>", "set headers, `\\n` separates lines"),
    ("transform <EXPR>", "reshape responses, e.g. response.items.filter(i => i.done)"),
    ("view [KEY]", "select the list to tabulate (empty clears)"),
    ("send", "send the request"),
    ("show", "print the request and the current view"),
    ("keys", "list the view's top-level keys"),
    ("table", "print the selected list as a table"),
    ("dispatch NAME [JSON]", "dispatch a raw action"),
    ("help", "show this help"),
    ("quit", "exit"),
];

/// Parse one input line. The argument is everything after the command
/// word, taken verbatim.
pub fn parse(line: &str) -> Result<Command, String> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    let command = match word {
        "" => Command::Empty,
        "url" => Command::Url(rest.to_string()),
        "method" => Command::Method(rest.to_uppercase()),
        "type" => Command::Type(rest.to_string()),
        "payload" => Command::Payload(rest.to_string()),
        "headers" => Command::Headers(rest.replace("\\n", "\n")),
        "transform" => Command::Transform(rest.to_string()),
        "view" => Command::View(rest.to_string()),
        "send" => Command::Send,
        "show" => Command::Show,
        "keys" => Command::Keys,
        "table" => Command::Table,
        "dispatch" => {
            let (name, payload) = match rest.split_once(char::is_whitespace) {
                Some((name, json)) => (name, Some(json.trim())),
                None => (rest, None),
            };
            if name.is_empty() {
                return Err("usage: dispatch NAME [JSON]".to_string());
            }
            let payload = payload
                .map(|json| serde_json::from_str::<Value>(json).map_err(|e| format!("Invalid JSON: {}", e)))
                .transpose()?;
            Command::Dispatch {
                name: name.to_string(),
                payload,
            }
        }
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(format!("Unknown command '{}' (try 'help')", other)),
    };
    Ok(command)
}

pub fn execute<C: HttpClient, S: Sidecar>(
    session: &mut Session<C, S>,
    command: Command,
) -> Result<(), CoreError> {
    let action = match command {
        Command::Url(url) => Action::UpdateRequestUrl(url),
        Command::Method(method) => {
            method.parse::<reqview_core::HttpMethod>()?;
            Action::UpdateRequestMethod(method)
        }
        Command::Type(t) => {
            let request_type = t.parse().map_err(|reason| CoreError::InvalidPayload {
                action: "UPDATE_REQ_TYPE".to_string(),
                reason,
            })?;
            Action::UpdateRequestType(request_type)
        }
        Command::Payload(text) => Action::UpdateRequestPayload(text),
        Command::Headers(text) => {
            return session.dispatch_named("UPDATE_REQ_HEADERS", Some(Value::String(text)));
        }
        Command::Transform(source) => Action::UpdateResponseTransform(source),
        Command::View(key) => Action::UpdateViewKey(key),
        Command::Send => Action::SendRequest(None),
        Command::Dispatch { name, payload } => return session.dispatch_named(&name, payload),
        Command::Show => {
            render::state(&session.state());
            return Ok(());
        }
        Command::Keys => {
            render::keys(&session.state());
            return Ok(());
        }
        Command::Table => {
            render::table(&session.state());
            return Ok(());
        }
        Command::Help => {
            help();
            return Ok(());
        }
        Command::Quit | Command::Empty => return Ok(()),
    };
    session.dispatch(action)
}

fn help() {
    for (usage, what) in HELP {
        println!("  {} {}", format!("{:<22}", usage).cyan(), what.dimmed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_editor_commands() {
        assert_eq!(
            parse("url   http://localhost:3000/users ").unwrap(),
            Command::Url("http://localhost:3000/users".to_string())
        );
        assert_eq!(parse("method post").unwrap(), Command::Method("POST".to_string()));
        assert_eq!(
            parse("headers Accept: application/json\\nX-Token: abc").unwrap(),
            Command::Headers("Accept: application/json\nX-Token: abc".to_string())
        );
        assert_eq!(
            parse("transform response.items.map(i => i.name)").unwrap(),
            Command::Transform("response.items.map(i => i.name)".to_string())
        );
        assert_eq!(parse("view").unwrap(), Command::View(String::new()));
        assert_eq!(parse("   ").unwrap(), Command::Empty);
    }

    #[test]
    fn test_parse_dispatch() {
        assert_eq!(
            parse(r#"dispatch UPDATE_VIEWKEY "items""#).unwrap(),
            Command::Dispatch {
                name: "UPDATE_VIEWKEY".to_string(),
                payload: Some(json!("items")),
            }
        );
        assert_eq!(
            parse("dispatch SEND_REQUEST").unwrap(),
            Command::Dispatch {
                name: "SEND_REQUEST".to_string(),
                payload: None,
            }
        );
        assert!(parse("dispatch UPDATE_VIEWKEY {oops").is_err());
        assert!(parse("dispatch").is_err());
    }

    #[test]
    fn test_parse_unknown() {
        assert!(parse("fetch http://x").is_err());
        assert_eq!(parse("exit").unwrap(), Command::Quit);
    }
}
