//! Analyzer response classification and normalization.
//!
//! The analyzer does not commit to a single response shape. The content
//! of a completion is classified once into [`AnalyzerResponse`], and
//! [`normalize`] turns each variant into [`ResultRecord`]s. Both steps are
//! total: no input makes them fail or return nothing for a non-empty chunk.
//!
//! Priority, highest first:
//!
//! | Content | Variant | Records |
//! |---------|---------|---------|
//! | JSON array | `PerItem` | one per message, zipped with item names |
//! | JSON string | `SingleText` | one batched record |
//! | object with `text` string | `StructuredWithText` | one batched record |
//! | anything else | `Opaque` | one batched record with the JSON text |

use serde_json::Value;

use crate::models::{BatchAnalysis, ChunkFailure, ItemAnalysis, ResultRecord};

/// Shape of an analyzer completion.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalyzerResponse {
    PerItem(Vec<String>),
    SingleText(String),
    StructuredWithText(String),
    Opaque(Value),
}

/// Classify the content of a completion.
pub fn classify_content(content: &Value) -> AnalyzerResponse {
    match content {
        Value::Array(messages) => {
            AnalyzerResponse::PerItem(messages.iter().map(message_text).collect())
        }
        Value::String(text) => AnalyzerResponse::SingleText(text.clone()),
        Value::Object(map) => match map.get("text") {
            Some(Value::String(text)) => AnalyzerResponse::StructuredWithText(text.clone()),
            _ => AnalyzerResponse::Opaque(content.clone()),
        },
        other => AnalyzerResponse::Opaque(other.clone()),
    }
}

/// Text of one element of a per-item list.
fn message_text(message: &Value) -> String {
    match message {
        Value::String(s) => s.clone(),
        Value::Object(map) => match map.get("text") {
            Some(Value::String(text)) => text.clone(),
            _ => message.to_string(),
        },
        other => other.to_string(),
    }
}

/// Turn one chunk's response into records.
///
/// `valid_names` are the items that were actually submitted. Per-item
/// messages beyond the item count are dropped; items left without a
/// message are reported in a single failure record.
pub fn normalize(
    response: AnalyzerResponse,
    chunk_index: usize,
    valid_names: &[String],
    timestamp: &str,
) -> Vec<ResultRecord> {
    let batched = |analysis_text: String| {
        vec![ResultRecord::Batched(BatchAnalysis {
            item_names: valid_names.to_vec(),
            analysis_text,
            chunk_index,
            timestamp: timestamp.to_string(),
        })]
    };

    match response {
        AnalyzerResponse::PerItem(messages) => {
            let matched = messages.len().min(valid_names.len());
            if messages.len() > valid_names.len() {
                tracing::debug!(
                    chunk = chunk_index,
                    extra = messages.len() - valid_names.len(),
                    "dropping analyses beyond the submitted images"
                );
            }

            let mut records: Vec<ResultRecord> = valid_names
                .iter()
                .zip(messages)
                .map(|(name, text)| {
                    ResultRecord::PerItem(ItemAnalysis {
                        item_name: name.clone(),
                        analysis_text: text,
                        chunk_index,
                        timestamp: timestamp.to_string(),
                    })
                })
                .collect();

            if matched < valid_names.len() {
                tracing::warn!(
                    chunk = chunk_index,
                    missing = valid_names.len() - matched,
                    "analyzer returned fewer analyses than images"
                );
                records.push(failure_record(
                    chunk_index,
                    &valid_names[matched..],
                    &format!(
                        "analyzer returned {} analyses for {} images",
                        matched,
                        valid_names.len()
                    ),
                    timestamp,
                ));
            }
            records
        }
        AnalyzerResponse::SingleText(text) | AnalyzerResponse::StructuredWithText(text) => {
            batched(text)
        }
        AnalyzerResponse::Opaque(value) => {
            tracing::warn!(chunk = chunk_index, "unexpected analyzer response format");
            batched(value.to_string())
        }
    }
}

pub fn failure_record(
    chunk_index: usize,
    item_names: &[String],
    error_message: &str,
    timestamp: &str,
) -> ResultRecord {
    ResultRecord::Failure(ChunkFailure {
        item_names: item_names.to_vec(),
        error_message: error_message.to_string(),
        chunk_index,
        timestamp: timestamp.to_string(),
    })
}
