//! End-to-end tests for the two-stage pipeline.
//!
//! The remote services are replaced by scripted in-process `Analyzer` and
//! `Aggregator` implementations so every outcome (per-item replies, batched
//! replies, failed chunks, cancellation) can be driven deterministically.

use anyhow::{bail, Result};
use async_trait::async_trait;
use frame_critic::config::Config;
use frame_critic::encode::EncodedImage;
use frame_critic::error::PipelineError;
use frame_critic::models::ResultRecord;
use frame_critic::normalize::AnalyzerResponse;
use frame_critic::pipeline::{CritiqueOutcome, Pipeline, PipelineOptions};
use frame_critic::store::ResultStore;
use frame_critic::traits::{Aggregator, Analyzer};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

// ─── Fakes ──────────────────────────────────────────────────────────

#[derive(Clone, Copy)]
enum Reply {
    /// One message per submitted image.
    PerItem,
    /// One message for the whole chunk.
    SingleText,
    /// A single message regardless of chunk size.
    OneMessage,
}

/// Analyzer that answers from a script and records every call.
struct ScriptedAnalyzer {
    reply: Reply,
    fail_chunks: Vec<usize>,
    cancel_after: Option<(usize, CancellationToken)>,
    calls: Mutex<Vec<(usize, Vec<String>)>>,
}

impl ScriptedAnalyzer {
    fn new(reply: Reply) -> Self {
        Self {
            reply,
            fail_chunks: Vec::new(),
            cancel_after: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn failing_on(mut self, chunks: &[usize]) -> Self {
        self.fail_chunks = chunks.to_vec();
        self
    }

    fn cancelling_after(mut self, chunk: usize, token: CancellationToken) -> Self {
        self.cancel_after = Some((chunk, token));
        self
    }

    fn calls(&self) -> Vec<(usize, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Analyzer for ScriptedAnalyzer {
    async fn analyze(&self, chunk_index: usize, images: &[EncodedImage]) -> Result<AnalyzerResponse> {
        let names: Vec<String> = images.iter().map(|i| i.name.clone()).collect();
        self.calls.lock().unwrap().push((chunk_index, names.clone()));

        if let Some((chunk, token)) = &self.cancel_after {
            if *chunk == chunk_index {
                token.cancel();
            }
        }
        if self.fail_chunks.contains(&chunk_index) {
            bail!("HTTP 500: upstream unavailable");
        }

        Ok(match self.reply {
            Reply::PerItem => AnalyzerResponse::PerItem(
                names.iter().map(|n| format!("a shot of {}", n)).collect(),
            ),
            Reply::SingleText => {
                AnalyzerResponse::SingleText(format!("chunk {} overview", chunk_index))
            }
            Reply::OneMessage => AnalyzerResponse::PerItem(vec!["only one".to_string()]),
        })
    }
}

/// Aggregator that records prompts and returns a fixed report.
struct RecordingAggregator {
    fail: bool,
    prompts: Mutex<Vec<String>>,
}

impl RecordingAggregator {
    fn new() -> Self {
        Self {
            fail: false,
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn failing() -> Self {
        Self {
            fail: true,
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Aggregator for RecordingAggregator {
    async fn aggregate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if self.fail {
            bail!("HTTP 503: model overloaded");
        }
        Ok("# Verdict\n\nThey pulled it off.\n".to_string())
    }
}

// ─── Fixtures ───────────────────────────────────────────────────────

struct Fixture {
    _tmp: TempDir,
    frames: PathBuf,
    out: PathBuf,
}

impl Fixture {
    fn with_frames(count: usize) -> Self {
        let tmp = TempDir::new().unwrap();
        let frames = tmp.path().join("frames");
        let out = tmp.path().join("out");
        std::fs::create_dir_all(&frames).unwrap();
        for i in 1..=count {
            std::fs::write(frames.join(format!("frame_{:04}.jpg", i)), b"\xff\xd8jpeg").unwrap();
        }
        Self {
            _tmp: tmp,
            frames,
            out,
        }
    }

    fn results_path(&self) -> PathBuf {
        self.out.join("analysis_results.json")
    }

    fn report_path(&self) -> PathBuf {
        self.out.join("critique.md")
    }

    fn options(&self, chunk_size: usize, skip_frames: usize) -> PipelineOptions {
        let mut cfg = Config::minimal();
        cfg.batch.chunk_size = chunk_size;
        cfg.batch.skip_frames = skip_frames;
        cfg.batch.delay_ms = 0;
        cfg.output.results_path = self.results_path();
        cfg.output.report_path = self.report_path();
        PipelineOptions::from_config(&cfg).unwrap()
    }
}

fn pipeline(
    options: PipelineOptions,
    analyzer: &Arc<ScriptedAnalyzer>,
    aggregator: &Arc<RecordingAggregator>,
) -> Pipeline {
    Pipeline::new(options, analyzer.clone(), aggregator.clone())
}

fn chunk_indices(records: &[ResultRecord]) -> Vec<usize> {
    records.iter().map(ResultRecord::chunk_index).collect()
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn load(path: &Path) -> Vec<ResultRecord> {
    ResultStore::load(path).unwrap().into_records()
}

// ─── Stage one ──────────────────────────────────────────────────────

#[tokio::test]
async fn seven_frames_in_chunks_of_three() {
    let fx = Fixture::with_frames(7);
    let analyzer = Arc::new(ScriptedAnalyzer::new(Reply::PerItem));
    let aggregator = Arc::new(RecordingAggregator::new());
    let p = pipeline(fx.options(3, 1), &analyzer, &aggregator);

    let summary = p.analyze(&fx.frames).await.unwrap();

    let sizes: Vec<usize> = analyzer.calls().iter().map(|(_, n)| n.len()).collect();
    assert_eq!(sizes, vec![3, 3, 1]);
    assert_eq!(summary.found, 7);
    assert_eq!(summary.selected, 7);
    assert_eq!(summary.chunks, 3);
    assert_eq!(summary.processed, 7);
    assert_eq!(summary.failed_chunks, 0);
    assert_eq!(chunk_indices(&summary.records), vec![1, 1, 1, 2, 2, 2, 3]);
    assert_eq!(load(&fx.results_path()), summary.records);
}

#[tokio::test]
async fn stride_selects_every_third_frame() {
    let fx = Fixture::with_frames(7);
    let analyzer = Arc::new(ScriptedAnalyzer::new(Reply::PerItem));
    let aggregator = Arc::new(RecordingAggregator::new());
    let p = pipeline(fx.options(3, 3), &analyzer, &aggregator);

    let plan = p.plan(&fx.frames).unwrap();
    let selected: Vec<&str> = plan.selected.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(
        selected,
        vec!["frame_0001.jpg", "frame_0004.jpg", "frame_0007.jpg"]
    );
    assert_eq!(plan.chunks.len(), 1);

    p.analyze(&fx.frames).await.unwrap();
    assert_eq!(
        analyzer.calls(),
        vec![(
            1,
            names(&["frame_0001.jpg", "frame_0004.jpg", "frame_0007.jpg"])
        )]
    );
}

#[tokio::test]
async fn single_text_reply_becomes_one_batched_record() {
    let fx = Fixture::with_frames(3);
    let analyzer = Arc::new(ScriptedAnalyzer::new(Reply::SingleText));
    let aggregator = Arc::new(RecordingAggregator::new());
    let p = pipeline(fx.options(3, 1), &analyzer, &aggregator);

    let summary = p.analyze(&fx.frames).await.unwrap();

    assert_eq!(summary.records.len(), 1);
    match &summary.records[0] {
        ResultRecord::Batched(b) => {
            assert_eq!(
                b.item_names,
                names(&["frame_0001.jpg", "frame_0002.jpg", "frame_0003.jpg"])
            );
            assert_eq!(b.analysis_text, "chunk 1 overview");
            assert_eq!(b.chunk_index, 1);
        }
        other => panic!("expected a batched record, got {:?}", other),
    }
}

#[tokio::test]
async fn failed_chunk_is_recorded_and_the_loop_continues() {
    let fx = Fixture::with_frames(7);
    let analyzer = Arc::new(ScriptedAnalyzer::new(Reply::PerItem).failing_on(&[2]));
    let aggregator = Arc::new(RecordingAggregator::new());
    let p = pipeline(fx.options(3, 1), &analyzer, &aggregator);

    let summary = p.analyze(&fx.frames).await.unwrap();

    assert_eq!(analyzer.calls().len(), 3);
    assert_eq!(summary.failed_chunks, 1);
    assert_eq!(summary.processed, 4);
    assert_eq!(chunk_indices(&summary.records), vec![1, 1, 1, 2, 3]);

    let failure = summary
        .records
        .iter()
        .find(|r| r.is_failure())
        .expect("a failure record");
    assert_eq!(failure.chunk_index(), 2);
    assert_eq!(
        failure.item_names(),
        vec!["frame_0004.jpg", "frame_0005.jpg", "frame_0006.jpg"]
    );

    let raw = std::fs::read_to_string(fx.results_path()).unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    let entries = json.as_array().unwrap();
    assert_eq!(entries.len(), 5);
    assert!(entries[3]["error"]
        .as_str()
        .unwrap()
        .contains("upstream unavailable"));
    assert_eq!(entries[4]["image"], "frame_0007.jpg");
}

#[tokio::test]
async fn short_per_item_reply_reports_unmatched_images() {
    let fx = Fixture::with_frames(3);
    let analyzer = Arc::new(ScriptedAnalyzer::new(Reply::OneMessage));
    let aggregator = Arc::new(RecordingAggregator::new());
    let p = pipeline(fx.options(3, 1), &analyzer, &aggregator);

    let summary = p.analyze(&fx.frames).await.unwrap();

    assert_eq!(summary.records.len(), 2);
    assert_eq!(summary.records[0].item_names(), vec!["frame_0001.jpg"]);
    assert!(summary.records[1].is_failure());
    assert_eq!(
        summary.records[1].item_names(),
        vec!["frame_0002.jpg", "frame_0003.jpg"]
    );
}

#[tokio::test]
async fn unreadable_images_are_excluded_from_their_chunk() {
    let fx = Fixture::with_frames(4);
    std::fs::write(fx.frames.join("frame_0002.jpg"), b"").unwrap();
    let analyzer = Arc::new(ScriptedAnalyzer::new(Reply::PerItem));
    let aggregator = Arc::new(RecordingAggregator::new());
    let p = pipeline(fx.options(3, 1), &analyzer, &aggregator);

    let summary = p.analyze(&fx.frames).await.unwrap();

    assert_eq!(summary.excluded, 1);
    assert_eq!(summary.processed, 3);
    assert_eq!(
        analyzer.calls()[0],
        (1, names(&["frame_0001.jpg", "frame_0003.jpg"]))
    );
}

#[tokio::test]
async fn chunk_without_valid_images_is_skipped() {
    let fx = Fixture::with_frames(4);
    std::fs::write(fx.frames.join("frame_0003.jpg"), b"").unwrap();
    std::fs::write(fx.frames.join("frame_0004.jpg"), b"").unwrap();
    let analyzer = Arc::new(ScriptedAnalyzer::new(Reply::PerItem));
    let aggregator = Arc::new(RecordingAggregator::new());
    let p = pipeline(fx.options(2, 1), &analyzer, &aggregator);

    let summary = p.analyze(&fx.frames).await.unwrap();

    let submitted: Vec<usize> = analyzer.calls().iter().map(|(c, _)| *c).collect();
    assert_eq!(submitted, vec![1]);
    assert_eq!(summary.chunks, 2);
    assert_eq!(chunk_indices(&summary.records), vec![1, 1]);
}

#[tokio::test]
async fn empty_directory_writes_nothing_and_skips_stage_two() {
    let fx = Fixture::with_frames(0);
    std::fs::write(fx.frames.join("notes.md"), "not an image").unwrap();
    let analyzer = Arc::new(ScriptedAnalyzer::new(Reply::PerItem));
    let aggregator = Arc::new(RecordingAggregator::new());
    let p = pipeline(fx.options(3, 1), &analyzer, &aggregator);

    let err = p.run(&fx.frames).await.unwrap_err();

    assert!(matches!(err, PipelineError::NoInputItems(_)));
    assert!(analyzer.calls().is_empty());
    assert!(aggregator.prompts().is_empty());
    assert!(!fx.results_path().exists());
    assert!(!fx.report_path().exists());
}

#[tokio::test]
async fn missing_directory_makes_no_remote_calls() {
    let fx = Fixture::with_frames(0);
    let analyzer = Arc::new(ScriptedAnalyzer::new(Reply::PerItem));
    let aggregator = Arc::new(RecordingAggregator::new());
    let p = pipeline(fx.options(3, 1), &analyzer, &aggregator);

    let err = p.run(&fx.frames.join("nope")).await.unwrap_err();

    assert!(matches!(err, PipelineError::SourceNotFound(_)));
    assert!(analyzer.calls().is_empty());
    assert!(!fx.results_path().exists());
}

#[tokio::test]
async fn cancellation_persists_partial_results() {
    let fx = Fixture::with_frames(7);
    let cancel = CancellationToken::new();
    let analyzer =
        Arc::new(ScriptedAnalyzer::new(Reply::PerItem).cancelling_after(1, cancel.clone()));
    let aggregator = Arc::new(RecordingAggregator::new());
    let p = pipeline(fx.options(3, 1), &analyzer, &aggregator).with_cancellation(cancel);

    let err = p.run(&fx.frames).await.unwrap_err();

    assert!(matches!(err, PipelineError::Cancelled));
    assert_eq!(analyzer.calls().len(), 1);
    assert!(aggregator.prompts().is_empty());
    assert_eq!(chunk_indices(&load(&fx.results_path())), vec![1, 1, 1]);
}

#[tokio::test]
async fn unwritable_results_stop_before_the_critique() {
    let fx = Fixture::with_frames(3);
    std::fs::write(&fx.out, "a file where the output directory should be").unwrap();
    let analyzer = Arc::new(ScriptedAnalyzer::new(Reply::PerItem));
    let aggregator = Arc::new(RecordingAggregator::new());
    let p = pipeline(fx.options(3, 1), &analyzer, &aggregator);

    let err = p.run(&fx.frames).await.unwrap_err();

    assert!(matches!(err, PipelineError::Persist { .. }));
    assert_eq!(analyzer.calls().len(), 1);
    assert!(aggregator.prompts().is_empty());
    assert!(!fx.report_path().exists());
}

#[tokio::test(start_paused = true)]
async fn chunks_are_spaced_by_the_configured_delay() {
    let fx = Fixture::with_frames(7);
    let analyzer = Arc::new(ScriptedAnalyzer::new(Reply::PerItem));
    let aggregator = Arc::new(RecordingAggregator::new());
    let mut options = fx.options(3, 1);
    options.delay = Duration::from_secs(2);
    let p = pipeline(options, &analyzer, &aggregator);

    let started = tokio::time::Instant::now();
    p.analyze(&fx.frames).await.unwrap();

    assert!(started.elapsed() >= Duration::from_secs(4));
    assert_eq!(analyzer.calls().len(), 3);
}

// ─── Stage two ──────────────────────────────────────────────────────

#[tokio::test]
async fn run_hands_records_and_transcript_to_the_aggregator() {
    let fx = Fixture::with_frames(4);
    std::fs::write(fx.frames.join("voiceover.txt"), "we shot this in one night").unwrap();
    let analyzer = Arc::new(ScriptedAnalyzer::new(Reply::PerItem));
    let aggregator = Arc::new(RecordingAggregator::new());
    let p = pipeline(fx.options(3, 1), &analyzer, &aggregator);

    let summary = p.run(&fx.frames).await.unwrap();

    let prompts = aggregator.prompts();
    assert_eq!(prompts.len(), 1);
    let prompt = &prompts[0];
    assert!(prompt.contains("VIDEO SEQUENCE ANALYSIS:"));
    assert!(prompt.contains("FRAME 0001 (frame_0001.jpg):\na shot of frame_0001.jpg"));
    assert!(prompt.contains("FRAME 0004 (frame_0004.jpg):"));
    assert!(prompt.contains("AUDIO TRANSCRIPT:\n================\nwe shot this in one night"));
    assert!(!prompt.contains("{analysis}"));

    match summary.critique.unwrap() {
        CritiqueOutcome::Written { path, text } => {
            assert_eq!(path, fx.report_path());
            assert_eq!(std::fs::read_to_string(&path).unwrap(), text);
        }
        CritiqueOutcome::Skipped => panic!("critique should have been written"),
    }
}

#[tokio::test]
async fn failed_chunks_appear_in_the_narrative() {
    let fx = Fixture::with_frames(6);
    let analyzer = Arc::new(ScriptedAnalyzer::new(Reply::SingleText).failing_on(&[1]));
    let aggregator = Arc::new(RecordingAggregator::new());
    let p = pipeline(fx.options(3, 1), &analyzer, &aggregator);

    p.run(&fx.frames).await.unwrap();

    let prompt = &aggregator.prompts()[0];
    assert!(prompt.contains("FRAME 1: ERROR - HTTP 500: upstream unavailable"));
    assert!(prompt.contains("SEQUENCE 2 (Frame 0004, Frame 0005, Frame 0006):\nchunk 2 overview"));
}

#[tokio::test]
async fn aggregation_failure_keeps_the_stage_one_artifact() {
    let fx = Fixture::with_frames(3);
    let analyzer = Arc::new(ScriptedAnalyzer::new(Reply::PerItem));
    let aggregator = Arc::new(RecordingAggregator::failing());
    let p = pipeline(fx.options(3, 1), &analyzer, &aggregator);

    let summary = p.run(&fx.frames).await.unwrap();

    let err = summary.critique.unwrap_err();
    assert!(matches!(err, PipelineError::Aggregation(_)));
    assert!(err.to_string().contains("model overloaded"));
    assert_eq!(load(&fx.results_path()).len(), 3);
    assert!(!fx.report_path().exists());
}

#[tokio::test]
async fn critique_resumes_from_a_persisted_artifact() {
    let fx = Fixture::with_frames(3);
    let analyzer = Arc::new(ScriptedAnalyzer::new(Reply::PerItem));
    let first = Arc::new(RecordingAggregator::failing());
    let p = pipeline(fx.options(3, 1), &analyzer, &first);
    p.run(&fx.frames).await.unwrap();

    let second = Arc::new(RecordingAggregator::new());
    let p = pipeline(fx.options(3, 1), &analyzer, &second);
    let outcome = p
        .critique_from_artifact(&fx.frames, &fx.results_path())
        .await
        .unwrap();

    assert!(matches!(outcome, CritiqueOutcome::Written { .. }));
    assert_eq!(analyzer.calls().len(), 1);
    assert_eq!(second.prompts(), first.prompts());
    assert!(fx.report_path().exists());
}

#[tokio::test]
async fn empty_record_set_skips_the_aggregator() {
    let fx = Fixture::with_frames(1);
    let analyzer = Arc::new(ScriptedAnalyzer::new(Reply::PerItem));
    let aggregator = Arc::new(RecordingAggregator::new());
    let p = pipeline(fx.options(3, 1), &analyzer, &aggregator);

    let outcome = p.critique(&fx.frames, &[]).await.unwrap();

    assert_eq!(outcome, CritiqueOutcome::Skipped);
    assert!(aggregator.prompts().is_empty());
    assert!(!fx.report_path().exists());
}

#[tokio::test]
async fn missing_artifact_is_a_load_error() {
    let fx = Fixture::with_frames(1);
    let analyzer = Arc::new(ScriptedAnalyzer::new(Reply::PerItem));
    let aggregator = Arc::new(RecordingAggregator::new());
    let p = pipeline(fx.options(3, 1), &analyzer, &aggregator);

    let err = p
        .critique_from_artifact(&fx.frames, &fx.results_path())
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Load { .. }));
}
