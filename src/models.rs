//! Core data models used throughout the pipeline.
//!
//! [`InputItem`]s flow through stride selection and chunk planning into
//! [`Chunk`]s; every processed chunk yields zero or more [`ResultRecord`]s.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::OnceLock;

/// Timestamp layout used for every record, second resolution.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// An image file selected from the input directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputItem {
    /// File name, the item's identity and sort key.
    pub name: String,
    pub path: PathBuf,
}

impl InputItem {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

/// First run of four consecutive digits in `name`, if any.
///
/// `clip_000123.png` yields `"0001"`: the match is the first four digits,
/// not the whole number.
pub fn frame_number(name: &str) -> Option<&str> {
    static FRAME_RE: OnceLock<Regex> = OnceLock::new();
    let re = FRAME_RE.get_or_init(|| Regex::new(r"\d{4}").expect("valid frame regex"));
    re.find(name).map(|m| m.as_str())
}

/// An order-preserving slice of the filtered items, submitted in one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// 1-based position in the plan.
    pub index: usize,
    pub items: Vec<InputItem>,
}

impl Chunk {
    pub fn names(&self) -> Vec<String> {
        self.items.iter().map(|i| i.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Analysis attributed to a single image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemAnalysis {
    #[serde(rename = "image")]
    pub item_name: String,
    #[serde(rename = "analysis")]
    pub analysis_text: String,
    #[serde(rename = "chunk")]
    pub chunk_index: usize,
    pub timestamp: String,
}

/// Analysis covering every valid image of a chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchAnalysis {
    #[serde(rename = "images")]
    pub item_names: Vec<String>,
    #[serde(rename = "analysis")]
    pub analysis_text: String,
    #[serde(rename = "chunk")]
    pub chunk_index: usize,
    pub timestamp: String,
}

/// A chunk, or part of one, that produced no analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkFailure {
    #[serde(rename = "images")]
    pub item_names: Vec<String>,
    #[serde(rename = "error")]
    pub error_message: String,
    #[serde(rename = "chunk")]
    pub chunk_index: usize,
    pub timestamp: String,
}

/// One persisted outcome.
///
/// Serialized without a tag; the field set identifies the shape
/// (`image` + `analysis`, `images` + `analysis`, or `images` + `error`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResultRecord {
    PerItem(ItemAnalysis),
    Batched(BatchAnalysis),
    Failure(ChunkFailure),
}

impl ResultRecord {
    pub fn chunk_index(&self) -> usize {
        match self {
            ResultRecord::PerItem(r) => r.chunk_index,
            ResultRecord::Batched(r) => r.chunk_index,
            ResultRecord::Failure(r) => r.chunk_index,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ResultRecord::Failure(_))
    }

    /// Names of the images this record is attributed to.
    pub fn item_names(&self) -> Vec<&str> {
        match self {
            ResultRecord::PerItem(r) => vec![r.item_name.as_str()],
            ResultRecord::Batched(r) => r.item_names.iter().map(String::as_str).collect(),
            ResultRecord::Failure(r) => r.item_names.iter().map(String::as_str).collect(),
        }
    }
}

/// Wall-clock capture time for a new record.
pub fn capture_timestamp() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}
