//! Chunk planning.
//!
//! Splits the filtered items into contiguous chunks of at most
//! `chunk_size` items, numbered from 1. Only the last chunk may be short.

use crate::error::{PipelineError, Result};
use crate::models::{Chunk, InputItem};

pub fn plan_chunks(items: &[InputItem], chunk_size: usize) -> Result<Vec<Chunk>> {
    if chunk_size == 0 {
        return Err(PipelineError::InvalidConfig(
            "chunk_size must be >= 1".to_string(),
        ));
    }

    Ok(items
        .chunks(chunk_size)
        .enumerate()
        .map(|(i, slice)| Chunk {
            index: i + 1,
            items: slice.to_vec(),
        })
        .collect())
}
