//! Boundaries to the remote model services.
//!
//! The pipeline talks to two collaborators: an [`Analyzer`] that looks at
//! one chunk of images at a time, and an [`Aggregator`] that turns the
//! assembled narrative into the final report. [`crate::client::LlamaClient`]
//! implements both over HTTP; tests substitute in-process fakes.
//!
//! ```text
//!  chunk of images ──▶ Analyzer ──▶ AnalyzerResponse ──▶ normalize
//!  narrative prompt ─▶ Aggregator ─▶ report text
//! ```

use anyhow::Result;
use async_trait::async_trait;

use crate::encode::EncodedImage;
use crate::normalize::AnalyzerResponse;

/// Stage-one collaborator: analyzes one chunk of images.
///
/// # Example
///
/// ```rust
/// use anyhow::Result;
/// use async_trait::async_trait;
/// use frame_critic::encode::EncodedImage;
/// use frame_critic::normalize::AnalyzerResponse;
/// use frame_critic::traits::Analyzer;
///
/// struct Echo;
///
/// #[async_trait]
/// impl Analyzer for Echo {
///     async fn analyze(&self, _chunk: usize, images: &[EncodedImage]) -> Result<AnalyzerResponse> {
///         Ok(AnalyzerResponse::PerItem(
///             images.iter().map(|i| format!("saw {}", i.name)).collect(),
///         ))
///     }
/// }
/// ```
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Submit `images` (in chunk order) and return the classified response.
    ///
    /// An `Err` means the request as a whole failed; the orchestrator
    /// records it against the chunk and moves on.
    async fn analyze(&self, chunk_index: usize, images: &[EncodedImage])
        -> Result<AnalyzerResponse>;
}

/// Stage-two collaborator: turns one large prompt into one document.
#[async_trait]
pub trait Aggregator: Send + Sync {
    async fn aggregate(&self, prompt: &str) -> Result<String>;
}
