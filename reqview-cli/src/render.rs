//! Terminal rendering of requests, responses and the current view.

use colored::{ColoredString, Colorize};
use serde_json::Value;

use reqview_core::client::{HttpMethod, HttpResponse, RequestDescriptor};
use reqview_core::interpreter::display_string;
use reqview_core::view_key::{key_list, row_id, table_columns, table_rows};
use reqview_core::AppState;

const MAX_LINES: usize = 50;
const MAX_CELL: usize = 24;

pub fn method_colored(method: &str) -> ColoredString {
    match method.parse::<HttpMethod>() {
        Ok(HttpMethod::Get) => "GET".green().bold(),
        Ok(HttpMethod::Post) => "POST".yellow().bold(),
        Ok(HttpMethod::Put) => "PUT".blue().bold(),
        Ok(HttpMethod::Patch) => "PATCH".magenta().bold(),
        Ok(HttpMethod::Delete) => "DELETE".red().bold(),
        Ok(HttpMethod::Head) => "HEAD".cyan().bold(),
        Ok(HttpMethod::Options) => "OPTIONS".white().bold(),
        Err(_) => method.white().bold(),
    }
}

pub fn error(message: &str) {
    eprintln!("{} {}", "✖".red().bold(), message);
}

pub fn request(req: &RequestDescriptor, verbose: bool) {
    println!("{} {}", method_colored(&req.method), req.url.underline());

    if verbose {
        for (k, v) in &req.headers {
            println!("  {}: {}", k.dimmed(), v);
        }
        if let Some(body) = req.body_text() {
            println!("  {}", "Body:".dimmed());
            print_block(&body, 4);
        }
    }
}

pub fn status(response: &HttpResponse, verbose: bool) {
    let text = response.status.to_string();
    let status_colored = match response.status {
        200..=299 => text.green().bold(),
        400..=499 => text.yellow().bold(),
        500..=599 => text.red().bold(),
        _ => text.white().bold(),
    };
    println!("  {} {}", "Status:".dimmed(), status_colored);

    if verbose {
        println!("  {}", "Response Headers:".dimmed());
        for (k, v) in &response.headers {
            println!("    {}: {}", k.as_str().dimmed(), v.as_str());
        }
    }
}

/// Print a value as pretty JSON, or text as-is, cut off after a screenful.
fn print_block(text: &str, indent: usize) {
    let pretty = serde_json::from_str::<Value>(text)
        .ok()
        .and_then(|json| serde_json::to_string_pretty(&json).ok())
        .unwrap_or_else(|| text.to_string());
    let lines: Vec<&str> = pretty.lines().collect();
    for line in lines.iter().take(MAX_LINES) {
        println!("{:indent$}{}", "", line, indent = indent);
    }
    if lines.len() > MAX_LINES {
        println!(
            "{:indent$}{}",
            "",
            format!("... ({} more lines)", lines.len() - MAX_LINES).dimmed(),
            indent = indent
        );
    }
}

fn print_value(value: &Value, indent: usize) {
    let text = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
    print_block(&text, indent);
}

/// The view panel: the transformed response, plus any transform or
/// request error.
pub fn view(state: &AppState) {
    if let Some(err) = &state.response_error {
        println!("  {} {}", "Response error:".red(), err);
    }
    if let Some(err) = &state.response_transform_error {
        println!("  {} {}", "Transform error:".yellow(), err);
    }
    match state.view() {
        Some(value) => {
            println!("  {}", "View:".dimmed());
            print_value(value, 4);
        }
        None => println!("  {}", "(no response yet)".dimmed().italic()),
    }
}

/// Everything: the editor fields, then the view.
pub fn state(state: &AppState) {
    println!("{}", "── Request ──".dimmed());
    println!(
        "  {} {}",
        method_colored(&state.request_method),
        state.request_url.underline()
    );
    println!("  {} {}", "Type:".dimmed(), state.request_type);
    for h in &state.request_headers {
        println!("  {}: {}", h.key.dimmed(), h.value);
    }
    if !state.request_payload.is_empty() {
        println!("  {}", "Payload:".dimmed());
        print_block(&state.request_payload, 4);
    }
    if !state.response_transform.is_empty() {
        println!("  {} {}", "Transform:".dimmed(), state.response_transform.cyan());
    }
    println!("{}", "── Response ──".dimmed());
    view(state);
}

/// Top-level keys of the view; list-valued keys are selectable and the
/// selected one is marked.
pub fn keys(state: &AppState) {
    let entries = state.view().map(key_list).unwrap_or_default();
    if entries.is_empty() {
        println!("  {}", "(view has no keys)".dimmed().italic());
        return;
    }
    let selected = state.view_key.as_str();
    for entry in entries {
        let marker = if entry.name == selected { "▸" } else { " " };
        let name = if entry.is_list {
            entry.name.cyan().bold()
        } else {
            entry.name.dimmed()
        };
        println!("  {} {}", marker.green(), name);
    }
}

/// The rows under the selected key, as a table.
pub fn table(state: &AppState) {
    let key = state.view_key.as_str();
    let Some(rows) = state.view().and_then(|v| table_rows(v, key)) else {
        println!("  {}", "(no list selected)".dimmed().italic());
        return;
    };
    let columns = table_columns(rows);
    let header: Vec<String> = columns.iter().map(|c| pad(c)).collect();
    println!("  {}", header.join(" │ ").bold());

    for row in rows.iter().take(MAX_LINES) {
        let cells: Vec<String> = columns
            .iter()
            .map(|column| {
                let cell = if column == "_id" {
                    row_id(row)
                } else {
                    row.get(column)
                };
                pad(&cell.map(display_string).unwrap_or_default())
            })
            .collect();
        println!("  {}", cells.join(" │ "));
    }
    if rows.len() > MAX_LINES {
        println!(
            "  {}",
            format!("... ({} more rows)", rows.len() - MAX_LINES).dimmed()
        );
    }
}

fn pad(text: &str) -> String {
    let mut cell: String = text.chars().take(MAX_CELL).collect();
    if text.chars().count() > MAX_CELL {
        cell.pop();
        cell.push('…');
    }
    format!("{:<width$}", cell, width = MAX_CELL)
}
