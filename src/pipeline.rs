//! Two-stage pipeline orchestration.
//!
//! Stage one walks the chunk plan strictly in order:
//!
//! ```text
//! scan → stride → plan ─┬─▶ encode → gate → Analyzer → normalize → append ─┐
//!                       └──────────────────── next chunk ◀──────────────────┘
//!                                      │
//!                                      ▼ persist (sorted by chunk)
//! ```
//!
//! Stage two assembles the records (handed over in memory, or loaded from
//! a previous run's artifact) into the critique prompt, sends it to the
//! [`Aggregator`], and writes the report.
//!
//! Per-image encoding failures and per-chunk analyzer failures never leave
//! the loop: they become exclusions and failure records. Source, config,
//! and persistence errors end the run.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::encode::{encode_chunk, EncodedImage};
use crate::error::{PipelineError, Result};
use crate::models::{capture_timestamp, Chunk, InputItem, ResultRecord};
use crate::narrative;
use crate::normalize::{failure_record, normalize};
use crate::planner::plan_chunks;
use crate::progress::{NoProgress, ProgressEvent, ProgressReporter};
use crate::ratelimit::RateLimiter;
use crate::report;
use crate::source;
use crate::store::ResultStore;
use crate::traits::{Aggregator, Analyzer};

/// Settings the orchestrator needs, resolved from [`Config`] and CLI overrides.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub chunk_size: usize,
    pub skip_frames: usize,
    pub delay: Duration,
    pub image_extensions: Vec<String>,
    pub transcript_extensions: Vec<String>,
    pub results_path: PathBuf,
    pub report_path: PathBuf,
    pub prompt_template: String,
}

impl PipelineOptions {
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            chunk_size: config.batch.chunk_size,
            skip_frames: config.batch.skip_frames,
            delay: Duration::from_millis(config.batch.delay_ms),
            image_extensions: config.source.image_extensions.clone(),
            transcript_extensions: config.source.transcript_extensions.clone(),
            results_path: config.output.results_path.clone(),
            report_path: config.output.report_path.clone(),
            prompt_template: narrative::load_template(
                config.aggregator.prompt_template.as_deref(),
            )?,
        })
    }
}

/// Enumerated input and its chunk layout.
#[derive(Debug, Clone)]
pub struct Plan {
    pub found: usize,
    pub selected: Vec<InputItem>,
    pub chunks: Vec<Chunk>,
}

/// Outcome of stage one.
#[derive(Debug, Clone)]
pub struct AnalysisSummary {
    pub found: usize,
    pub selected: usize,
    pub chunks: usize,
    /// Images submitted in chunks the analyzer answered.
    pub processed: usize,
    /// Images excluded because they could not be encoded.
    pub excluded: usize,
    pub failed_chunks: usize,
    pub records: Vec<ResultRecord>,
    pub results_path: PathBuf,
}

/// Outcome of stage two.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CritiqueOutcome {
    /// No records to aggregate; nothing was sent.
    Skipped,
    Written { path: PathBuf, text: String },
}

/// Outcome of a full run.
#[derive(Debug)]
pub struct RunSummary {
    pub analysis: AnalysisSummary,
    /// Stage-two failures do not undo stage one's artifact.
    pub critique: Result<CritiqueOutcome>,
    pub elapsed: Duration,
}

enum ChunkOutcome {
    Analyzed {
        records: Vec<ResultRecord>,
        submitted: usize,
    },
    Failed {
        record: ResultRecord,
    },
}

pub struct Pipeline {
    options: PipelineOptions,
    analyzer: Arc<dyn Analyzer>,
    aggregator: Arc<dyn Aggregator>,
    limiter: RateLimiter,
    progress: Box<dyn ProgressReporter>,
    cancel: CancellationToken,
}

impl Pipeline {
    pub fn new(
        options: PipelineOptions,
        analyzer: Arc<dyn Analyzer>,
        aggregator: Arc<dyn Aggregator>,
    ) -> Self {
        let limiter = RateLimiter::new(options.delay);
        Self {
            options,
            analyzer,
            aggregator,
            limiter,
            progress: Box::new(NoProgress),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_progress(mut self, progress: Box<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Enumerate, sample, and chunk the input directory. No remote calls.
    pub fn plan(&self, dir: &Path) -> Result<Plan> {
        let all = source::scan_images(dir, &self.options.image_extensions)?;
        if all.is_empty() {
            return Err(PipelineError::NoInputItems(dir.to_path_buf()));
        }
        let selected = source::select_stride(&all, self.options.skip_frames)?;
        let chunks = plan_chunks(&selected, self.options.chunk_size)?;

        tracing::info!(
            found = all.len(),
            selected = selected.len(),
            chunks = chunks.len(),
            chunk_size = self.options.chunk_size,
            skip_frames = self.options.skip_frames,
            "input planned"
        );

        Ok(Plan {
            found: all.len(),
            selected,
            chunks,
        })
    }

    /// Run stage one and persist its records.
    ///
    /// On cancellation the records gathered so far are persisted before
    /// [`PipelineError::Cancelled`] is returned.
    pub async fn analyze(&self, dir: &Path) -> Result<AnalysisSummary> {
        let plan = self.plan(dir)?;
        let total = plan.chunks.len() as u64;
        let selected = plan.selected.len();

        self.progress.report(ProgressEvent::Planned {
            found: plan.found as u64,
            selected: selected as u64,
            chunks: total,
        });

        let mut store = ResultStore::new();
        let mut processed = 0usize;
        let mut excluded = 0usize;
        let mut failed_chunks = 0usize;

        for chunk in &plan.chunks {
            if self.cancel.is_cancelled() {
                return self.abort(&mut store);
            }

            let encoded = encode_chunk(chunk);
            excluded += encoded.failures.len();
            let valid_names = encoded.valid_names();

            if valid_names.is_empty() {
                tracing::warn!(chunk = chunk.index, "no valid images in chunk, skipping");
                self.progress.report(ProgressEvent::ChunkSkipped {
                    chunk: chunk.index as u64,
                    total,
                });
                continue;
            }

            let waiting = self.limiter.pending_delay().await;
            if !waiting.is_zero() {
                self.progress.report(ProgressEvent::Waiting {
                    millis: waiting.as_millis() as u64,
                });
            }
            if self.limiter.acquire(&self.cancel).await.is_err() {
                tracing::warn!("cancelled while waiting for the next chunk");
                return self.abort(&mut store);
            }

            self.progress.report(ProgressEvent::ChunkStarted {
                chunk: chunk.index as u64,
                total,
                items: valid_names.clone(),
            });

            let outcome = self
                .submit_chunk(chunk.index, &encoded.images, &valid_names)
                .await;
            self.limiter.release().await;

            let failed = match outcome {
                ChunkOutcome::Analyzed { records, submitted } => {
                    processed += submitted;
                    store.extend(records);
                    false
                }
                ChunkOutcome::Failed { record } => {
                    failed_chunks += 1;
                    store.extend([record]);
                    true
                }
            };

            self.progress.report(ProgressEvent::ChunkFinished {
                chunk: chunk.index as u64,
                total,
                processed: processed as u64,
                selected: selected as u64,
                failed,
            });
        }

        store.persist(&self.options.results_path)?;

        Ok(AnalysisSummary {
            found: plan.found,
            selected,
            chunks: plan.chunks.len(),
            processed,
            excluded,
            failed_chunks,
            records: store.into_records(),
            results_path: self.options.results_path.clone(),
        })
    }

    async fn submit_chunk(
        &self,
        chunk_index: usize,
        images: &[EncodedImage],
        valid_names: &[String],
    ) -> ChunkOutcome {
        match self.analyzer.analyze(chunk_index, images).await {
            Ok(response) => {
                let records = normalize(response, chunk_index, valid_names, &capture_timestamp());
                tracing::debug!(chunk = chunk_index, records = records.len(), "chunk analyzed");
                ChunkOutcome::Analyzed {
                    records,
                    submitted: images.len(),
                }
            }
            Err(e) => {
                let message = format!("{:#}", e);
                let err = PipelineError::ChunkSubmission {
                    chunk: chunk_index,
                    message: message.clone(),
                };
                tracing::error!(error = %err, "chunk failed, continuing");
                ChunkOutcome::Failed {
                    record: failure_record(chunk_index, valid_names, &message, &capture_timestamp()),
                }
            }
        }
    }

    fn abort<T>(&self, store: &mut ResultStore) -> Result<T> {
        if !store.is_empty() {
            store.persist(&self.options.results_path)?;
        }
        Err(PipelineError::Cancelled)
    }

    /// Run stage two over `records`.
    ///
    /// The transcript, if any, is looked up in `dir`.
    pub async fn critique(&self, dir: &Path, records: &[ResultRecord]) -> Result<CritiqueOutcome> {
        if records.is_empty() {
            tracing::warn!("no analysis results to aggregate");
            return Ok(CritiqueOutcome::Skipped);
        }
        if self.cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        let transcript = source::load_transcript(dir, &self.options.transcript_extensions);
        let prompt =
            narrative::build_prompt(&self.options.prompt_template, records, transcript.as_deref());

        self.progress.report(ProgressEvent::Aggregating {
            records: records.len() as u64,
        });

        let text = tokio::select! {
            _ = self.cancel.cancelled() => return Err(PipelineError::Cancelled),
            result = self.aggregator.aggregate(&prompt) => {
                result.map_err(|e| PipelineError::Aggregation(format!("{:#}", e)))?
            }
        };

        report::write_report(&self.options.report_path, &text)?;
        Ok(CritiqueOutcome::Written {
            path: self.options.report_path.clone(),
            text,
        })
    }

    /// Run stage two from a persisted result artifact.
    pub async fn critique_from_artifact(
        &self,
        dir: &Path,
        results_path: &Path,
    ) -> Result<CritiqueOutcome> {
        let store = ResultStore::load(results_path)?;
        tracing::info!(
            path = %results_path.display(),
            records = store.len(),
            "loaded analysis results"
        );
        self.critique(dir, store.records()).await
    }

    /// Run both stages. Stage two is skipped when stage one produced nothing.
    pub async fn run(&self, dir: &Path) -> Result<RunSummary> {
        let started = Instant::now();
        let analysis = self.analyze(dir).await?;
        let critique = self.critique(dir, &analysis.records).await;
        if let Err(e) = &critique {
            tracing::error!(error = %e, "critique stage failed");
        }
        Ok(RunSummary {
            analysis,
            critique,
            elapsed: started.elapsed(),
        })
    }
}
