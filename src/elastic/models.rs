use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Parsed body of a `_bulk` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkResponse {
    #[serde(default)]
    pub took: u64,
    #[serde(default)]
    pub errors: bool,
    /// Each entry maps the action name (`index`, `create`, `update`, `delete`) to its outcome.
    #[serde(default)]
    pub items: Vec<HashMap<String, BulkResponseItem>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkResponseItem {
    #[serde(default, rename = "_index")]
    pub index: String,
    #[serde(default, rename = "_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl BulkResponseItem {
    pub fn is_success(&self) -> bool {
        self.error.is_none() && (200..300).contains(&self.status)
    }

    pub fn error_reason(&self) -> Option<String> {
        let error = self.error.as_ref()?;
        match error {
            Value::String(reason) => Some(reason.clone()),
            Value::Object(map) => map
                .get("reason")
                .and_then(Value::as_str)
                .or_else(|| map.get("type").and_then(Value::as_str))
                .map(str::to_string),
            other => Some(other.to_string()),
        }
    }
}

impl BulkResponse {
    /// Iterate `(action, item)` pairs in response order.
    pub fn iter_items(&self) -> impl Iterator<Item = (&str, &BulkResponseItem)> {
        self.items
            .iter()
            .flat_map(|entry| entry.iter().map(|(action, item)| (action.as_str(), item)))
    }

    pub fn failed(&self) -> Vec<&BulkResponseItem> {
        self.iter_items()
            .filter(|(_, item)| !item.is_success())
            .map(|(_, item)| item)
            .collect()
    }

    pub fn succeeded(&self) -> Vec<&BulkResponseItem> {
        self.iter_items()
            .filter(|(_, item)| item.is_success())
            .map(|(_, item)| item)
            .collect()
    }
}
