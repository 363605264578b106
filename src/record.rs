//! The line-level record shape and its conversion into a bulk action.

use crate::bulk::BulkableRequest;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;

/// One decoded input line.
///
/// The string fields default to empty when absent; anything else in the
/// object is carried in `extra` and indexed untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(default)]
    pub case_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub court: String,
    #[serde(default)]
    pub case_no: String,
    #[serde(default)]
    pub case_type: String,
    #[serde(default)]
    pub doc_type: String,
    #[serde(default)]
    pub trial_round: String,
    #[serde(default)]
    pub decide_date: String,
    #[serde(default)]
    pub judge: String,
    #[serde(default)]
    pub parties: String,
    #[serde(default)]
    pub paragraphs: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Bulk action used for every record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WriteOp {
    #[default]
    Index,
    /// Partial update with `doc_as_upsert`; needs a document id.
    Update,
}

impl FromStr for WriteOp {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "index" => Ok(WriteOp::Index),
            "update" | "upsert" => Ok(WriteOp::Update),
            other => Err(format!("unsupported write op '{other}'")),
        }
    }
}

impl Record {
    /// Document id, if the record carries one.
    pub fn id(&self) -> Option<&str> {
        let id = self.case_id.trim();
        (!id.is_empty()).then_some(id)
    }

    pub fn has_decide_date(&self) -> bool {
        !self.decide_date.trim().is_empty()
    }

    /// Build the indexed document: `paragraphs` is stored as `fulltext`.
    pub fn to_document(&self) -> Value {
        let mut doc = Map::with_capacity(self.extra.len() + 11);
        for (key, value) in &self.extra {
            doc.insert(key.clone(), value.clone());
        }

        let strings = [
            ("case_id", &self.case_id),
            ("title", &self.title),
            ("court", &self.court),
            ("case_no", &self.case_no),
            ("case_type", &self.case_type),
            ("doc_type", &self.doc_type),
            ("trial_round", &self.trial_round),
            ("decide_date", &self.decide_date),
            ("judge", &self.judge),
            ("parties", &self.parties),
        ];
        for (key, value) in strings {
            doc.insert(key.to_string(), Value::String(value.clone()));
        }
        doc.insert("fulltext".to_string(), Value::Array(self.paragraphs.clone()));

        Value::Object(doc)
    }

    /// Convert into a bulk action against `index`.
    ///
    /// An update without an id degrades to a plain index action since
    /// Elasticsearch cannot address it otherwise.
    pub fn into_request(self, index: &str, op: WriteOp) -> BulkableRequest {
        let doc = self.to_document();
        let id = self.id().map(str::to_string);

        match (op, id) {
            (WriteOp::Update, Some(id)) => BulkableRequest::Update {
                index: index.to_string(),
                id,
                doc,
                doc_as_upsert: true,
            },
            (_, id) => BulkableRequest::Index {
                index: index.to_string(),
                id,
                doc,
            },
        }
    }
}
