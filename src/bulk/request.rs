use serde_json::{Map, Value, json};

/// A single `_bulk` action and its payload.
#[derive(Debug, Clone, PartialEq)]
pub enum BulkableRequest {
    Index {
        index: String,
        id: Option<String>,
        doc: Value,
    },
    Update {
        index: String,
        id: String,
        doc: Value,
        doc_as_upsert: bool,
    },
    Delete {
        index: String,
        id: String,
    },
}

impl BulkableRequest {
    pub fn action(&self) -> &'static str {
        match self {
            BulkableRequest::Index { .. } => "index",
            BulkableRequest::Update { .. } => "update",
            BulkableRequest::Delete { .. } => "delete",
        }
    }

    pub fn index(&self) -> &str {
        match self {
            BulkableRequest::Index { index, .. }
            | BulkableRequest::Update { index, .. }
            | BulkableRequest::Delete { index, .. } => index,
        }
    }

    fn metadata(&self) -> Value {
        let mut meta = Map::new();
        meta.insert("_index".to_string(), Value::String(self.index().to_string()));

        let id = match self {
            BulkableRequest::Index { id, .. } => id.as_deref(),
            BulkableRequest::Update { id, .. } | BulkableRequest::Delete { id, .. } => {
                Some(id.as_str())
            }
        };
        if let Some(id) = id {
            meta.insert("_id".to_string(), Value::String(id.to_string()));
        }

        let mut line = Map::new();
        line.insert(self.action().to_string(), Value::Object(meta));
        Value::Object(line)
    }

    /// The NDJSON lines for this action, without trailing newlines.
    pub fn source(&self) -> Vec<String> {
        let mut lines = vec![self.metadata().to_string()];
        match self {
            BulkableRequest::Index { doc, .. } => lines.push(doc.to_string()),
            BulkableRequest::Update {
                doc, doc_as_upsert, ..
            } => {
                let body = if *doc_as_upsert {
                    json!({ "doc": doc, "doc_as_upsert": true })
                } else {
                    json!({ "doc": doc })
                };
                lines.push(body.to_string());
            }
            BulkableRequest::Delete { .. } => {}
        }
        lines
    }

    /// Bytes this action adds to a bulk body, newlines included.
    pub fn size_in_bytes(&self) -> usize {
        self.source().iter().map(|line| line.len() + 1).sum()
    }
}

/// Serialise a batch into a `_bulk` request body.
pub fn build_body(requests: &[BulkableRequest]) -> String {
    let mut body = String::new();
    for request in requests {
        for line in request.source() {
            body.push_str(&line);
            body.push('\n');
        }
    }
    body
}
