//! View-key inference and the key/column helpers used to display a list
//! out of an arbitrary response shape.

use serde_json::Value;

/// Which top-level key of the view is selected for list display.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ViewKey {
    /// Nothing was ever chosen; the next response picks one.
    #[default]
    Unset,
    /// The user deliberately cleared the selection; keep it empty.
    Cleared,
    Chosen(String),
}

impl ViewKey {
    /// Build from the text stored in the sidecar or sent by the UI.
    /// `None` means "never set", an empty string means "cleared".
    pub fn from_stored(stored: Option<&str>) -> Self {
        match stored {
            None => ViewKey::Unset,
            Some("") => ViewKey::Cleared,
            Some(key) => ViewKey::Chosen(key.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ViewKey::Chosen(key) => key,
            ViewKey::Unset | ViewKey::Cleared => "",
        }
    }
}

/// First top-level key, in document order, whose value is a list.
/// Empty when there is none or the value is not an object.
pub fn infer_view_key(value: &Value) -> String {
    let Value::Object(map) = value else {
        return String::new();
    };
    map.iter()
        .find(|(_, v)| matches!(v, Value::Array(_)))
        .map(|(k, _)| k.clone())
        .unwrap_or_default()
}

pub fn is_valid_view_key(value: &Value, key: &str) -> bool {
    matches!(value.get(key), Some(Value::Array(_)))
}

/// Reconcile the stored selection with a freshly installed view.
pub fn reconcile(current: &ViewKey, view: &Value) -> ViewKey {
    if !view.is_object() {
        return current.clone();
    }
    match current {
        ViewKey::Cleared => ViewKey::Cleared,
        ViewKey::Chosen(key) if is_valid_view_key(view, key) => current.clone(),
        ViewKey::Chosen(_) | ViewKey::Unset => match infer_view_key(view) {
            key if key.is_empty() => ViewKey::Unset,
            key => ViewKey::Chosen(key),
        },
    }
}

/// One row of the key list panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEntry {
    pub name: String,
    /// Only list-valued keys can be selected.
    pub is_list: bool,
}

pub fn key_list(value: &Value) -> Vec<KeyEntry> {
    let Value::Object(map) = value else {
        return Vec::new();
    };
    map.iter()
        .map(|(name, v)| KeyEntry {
            name: name.clone(),
            is_list: matches!(v, Value::Array(_)),
        })
        .collect()
}

/// The list stored under `key`, if that key holds a list.
pub fn table_rows<'a>(value: &'a Value, key: &str) -> Option<&'a [Value]> {
    match value.get(key) {
        Some(Value::Array(rows)) => Some(rows),
        _ => None,
    }
}

/// Column order for a table of rows: `_id` first, then the first row's own
/// keys minus any id column.
pub fn table_columns(rows: &[Value]) -> Vec<String> {
    let mut columns = vec!["_id".to_string()];
    if let Some(Value::Object(first)) = rows.first() {
        columns.extend(
            first
                .keys()
                .filter(|k| {
                    let lower = k.to_lowercase();
                    lower != "id" && lower != "_id"
                })
                .cloned(),
        );
    }
    columns
}

/// The identifier shown in the `_id` column: `_id` itself, else any
/// differently-cased `id`/`_id` key.
pub fn row_id(row: &Value) -> Option<&Value> {
    let Value::Object(map) = row else {
        return None;
    };
    map.get("_id").or_else(|| {
        map.iter()
            .find(|(k, _)| matches!(k.to_lowercase().as_str(), "id" | "_id"))
            .map(|(_, v)| v)
    })
}
