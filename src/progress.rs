//! Run progress reporting.
//!
//! Reports what the pipeline is doing chunk by chunk so users can follow a
//! long run. Progress is emitted on **stderr** so stdout stays clean for
//! the final summary.

use std::io::Write;

/// A single progress event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Input enumerated and planned.
    Planned {
        found: u64,
        selected: u64,
        chunks: u64,
    },
    /// A chunk is about to be submitted.
    ChunkStarted {
        chunk: u64,
        total: u64,
        items: Vec<String>,
    },
    /// A chunk had no encodable images and was not submitted.
    ChunkSkipped { chunk: u64, total: u64 },
    /// A chunk was submitted; `processed` counts images sent so far.
    ChunkFinished {
        chunk: u64,
        total: u64,
        processed: u64,
        selected: u64,
        failed: bool,
    },
    /// Waiting on the rate limiter before the next chunk.
    Waiting { millis: u64 },
    /// The critique prompt is being sent.
    Aggregating { records: u64 },
}

/// Reports run progress. Implementations write to stderr (human or JSON).
pub trait ProgressReporter: Send + Sync {
    /// Emit a progress event. Called from the orchestrator.
    fn report(&self, event: ProgressEvent);
}

/// Human-friendly progress on stderr with a 20-cell bar.
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: ProgressEvent) {
        let line = match &event {
            ProgressEvent::Planned {
                found,
                selected,
                chunks,
            } => format!(
                "found {} images, selected {}, {} chunks\n",
                format_number(*found),
                format_number(*selected),
                format_number(*chunks)
            ),
            ProgressEvent::ChunkStarted { chunk, total, items } => {
                format!("chunk {} of {}  {}\n", chunk, total, items.join(", "))
            }
            ProgressEvent::ChunkSkipped { chunk, total } => {
                format!("chunk {} of {}  no valid images, skipped\n", chunk, total)
            }
            ProgressEvent::ChunkFinished {
                processed,
                selected,
                failed,
                ..
            } => {
                let status = if *failed { "  (failed)" } else { "" };
                format!(
                    "  {} {}% ({}/{}){}\n",
                    progress_bar(*processed, *selected, 20),
                    percent(*processed, *selected),
                    format_number(*processed),
                    format_number(*selected),
                    status
                )
            }
            ProgressEvent::Waiting { millis } => {
                format!("  waiting {:.1}s\n", *millis as f64 / 1000.0)
            }
            ProgressEvent::Aggregating { records } => {
                format!("aggregating {} records into a critique...\n", records)
            }
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, event: ProgressEvent) {
        let obj = match &event {
            ProgressEvent::Planned {
                found,
                selected,
                chunks,
            } => serde_json::json!({
                "event": "planned",
                "found": found,
                "selected": selected,
                "chunks": chunks
            }),
            ProgressEvent::ChunkStarted { chunk, total, items } => serde_json::json!({
                "event": "chunk_started",
                "chunk": chunk,
                "total": total,
                "items": items
            }),
            ProgressEvent::ChunkSkipped { chunk, total } => serde_json::json!({
                "event": "chunk_skipped",
                "chunk": chunk,
                "total": total
            }),
            ProgressEvent::ChunkFinished {
                chunk,
                total,
                processed,
                selected,
                failed,
            } => serde_json::json!({
                "event": "chunk_finished",
                "chunk": chunk,
                "total": total,
                "processed": processed,
                "selected": selected,
                "failed": failed
            }),
            ProgressEvent::Waiting { millis } => serde_json::json!({
                "event": "waiting",
                "millis": millis
            }),
            ProgressEvent::Aggregating { records } => serde_json::json!({
                "event": "aggregating",
                "records": records
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

fn percent(done: u64, total: u64) -> u64 {
    if total == 0 {
        return 0;
    }
    done.min(total) * 100 / total
}

fn progress_bar(done: u64, total: u64, width: usize) -> String {
    let filled = if total == 0 {
        0
    } else {
        (done.min(total) as usize * width) / total as usize
    };
    format!("[{}{}]", "█".repeat(filled), "░".repeat(width - filled))
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    /// Build a reporter for this mode.
    pub fn reporter(&self) -> Box<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
