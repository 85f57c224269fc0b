//! Image encoding for transport.
//!
//! Each file is read and base64-encoded independently. A failure affects
//! only that item: [`encode_chunk`] keeps going and reports the items it
//! had to leave out.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::path::Path;

use crate::error::{PipelineError, Result};
use crate::models::{Chunk, InputItem};

/// An image ready to be embedded in an analyzer request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub name: String,
    pub mime: &'static str,
    /// Base64 of the file bytes (standard alphabet, padded).
    pub data: String,
}

impl EncodedImage {
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, self.data)
    }
}

/// Result of encoding every item of a chunk.
#[derive(Debug, Default)]
pub struct EncodedChunk {
    pub images: Vec<EncodedImage>,
    pub failures: Vec<PipelineError>,
}

impl EncodedChunk {
    /// Names of the items that will actually be submitted, in chunk order.
    pub fn valid_names(&self) -> Vec<String> {
        self.images.iter().map(|i| i.name.clone()).collect()
    }
}

pub fn encode_bytes(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Read and encode one file. Empty files are rejected.
pub fn encode_file(item: &InputItem) -> Result<EncodedImage> {
    let bytes = std::fs::read(&item.path).map_err(|e| PipelineError::Encode {
        path: item.path.clone(),
        reason: e.to_string(),
    })?;

    if bytes.is_empty() {
        return Err(PipelineError::Encode {
            path: item.path.clone(),
            reason: "file is empty".to_string(),
        });
    }

    Ok(EncodedImage {
        name: item.name.clone(),
        mime: mime_for(&item.path),
        data: encode_bytes(&bytes),
    })
}

pub fn encode_chunk(chunk: &Chunk) -> EncodedChunk {
    let mut out = EncodedChunk::default();
    for item in &chunk.items {
        match encode_file(item) {
            Ok(image) => out.images.push(image),
            Err(e) => {
                tracing::warn!(chunk = chunk.index, error = %e, "skipping image");
                out.failures.push(e);
            }
        }
    }
    out
}

fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "webp" => "image/webp",
        _ => "image/jpeg",
    }
}
