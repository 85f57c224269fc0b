//! Narrative assembly and the critique prompt.
//!
//! [`assemble`] rebuilds one text document from the result records, in
//! record order, and appends the transcript when there is one. The output
//! depends only on the records and the transcript.

use std::fmt::Write as _;
use std::path::Path;

use crate::error::{PipelineError, Result};
use crate::models::{frame_number, ResultRecord};

const HEADER: &str = "VIDEO SEQUENCE ANALYSIS:\n========================\n\n";

/// Placeholder for the assembled record blocks in a critique template.
pub const ANALYSIS_PLACEHOLDER: &str = "{analysis}";
/// Placeholder for the transcript section in a critique template.
pub const TRANSCRIPT_PLACEHOLDER: &str = "{transcript}";

pub const DEFAULT_CRITIQUE_TEMPLATE: &str = r#"You are a veteran film director reviewing a FINISHED video project. Judge it with the full context below.

THE CREATOR'S SITUATION:
- Self-taught, no formal training
- Unpaid, zero budget, working alone
- Handed raw footage with no advance notice and no control over its quality
- Roughly two hours from receiving the footage to delivery
- Had to deliver something regardless of what they received

Your job: judge this REALISTICALLY. Is it good enough given those constraints?

# REALITY-CHECK CRITIQUE

## FIRST IMPRESSION
[Given the constraints, is this watchable?]

## USE OF TIME
[What did they accomplish in two hours? Did they spend the time on the right things?]

## INSTINCTS AND TECHNIQUE
[Which techniques did they attempt? Were their instincts right?]

## TECHNICAL TRIAGE
[Which corners were cut smartly and which ones hurt the result?]

## VERDICT
[Did they turn raw material into something deliverable?]

## RATING
[1-10, weighing every constraint above.]

## ADVICE FOR THE NEXT DEADLINE
[What would actually help them next time?]

---

Be fair about the constraints and honest about what does not work.

Here is what they delivered, described frame by frame:

{analysis}
{transcript}

Final question: given the constraints, did they pull it off?"#;

/// Frame label for `name`, or the record position when the name has none.
fn frame_label(name: &str, position: usize) -> String {
    frame_number(name)
        .map(str::to_string)
        .unwrap_or_else(|| position.to_string())
}

/// Labeled blocks for every record, starting with the sequence header.
pub fn record_blocks(records: &[ResultRecord]) -> String {
    let mut out = String::from(HEADER);

    for (i, record) in records.iter().enumerate() {
        let position = i + 1;
        match record {
            ResultRecord::Failure(f) => {
                let _ = write!(out, "FRAME {}: ERROR - {}\n\n", position, f.error_message);
            }
            ResultRecord::Batched(b) => {
                let frames: Vec<String> = b
                    .item_names
                    .iter()
                    .map(|name| format!("Frame {}", frame_label(name, position)))
                    .collect();
                let _ = write!(
                    out,
                    "SEQUENCE {} ({}):\n{}\n\n",
                    position,
                    frames.join(", "),
                    b.analysis_text
                );
            }
            ResultRecord::PerItem(p) => {
                let _ = write!(
                    out,
                    "FRAME {} ({}):\n{}\n\n",
                    frame_label(&p.item_name, position),
                    p.item_name,
                    p.analysis_text
                );
            }
        }
    }

    out
}

/// The labeled transcript section, or an empty string.
pub fn transcript_section(transcript: Option<&str>) -> String {
    match transcript {
        Some(t) if !t.is_empty() => {
            format!("\n\nAUDIO TRANSCRIPT:\n================\n{}\n\n", t)
        }
        _ => String::new(),
    }
}

/// The full narrative document: record blocks followed by the transcript.
pub fn assemble(records: &[ResultRecord], transcript: Option<&str>) -> String {
    let mut doc = record_blocks(records);
    doc.push_str(&transcript_section(transcript));
    doc
}

/// Embed the narrative in `template`.
///
/// Placeholders are only recognized in the template itself; record and
/// transcript text is inserted verbatim. Templates without an
/// `{analysis}` placeholder get the record blocks appended at the end,
/// followed by the transcript unless the template places it.
pub fn build_prompt(template: &str, records: &[ResultRecord], transcript: Option<&str>) -> String {
    let blocks = record_blocks(records);
    let transcript = transcript_section(transcript);
    let fill = |piece: &str| piece.replace(TRANSCRIPT_PLACEHOLDER, &transcript);

    if template.contains(ANALYSIS_PLACEHOLDER) {
        template
            .split(ANALYSIS_PLACEHOLDER)
            .map(fill)
            .collect::<Vec<_>>()
            .join(&blocks)
    } else if template.contains(TRANSCRIPT_PLACEHOLDER) {
        format!("{}\n\n{}", fill(template), blocks)
    } else {
        format!("{}\n\n{}\n{}", template, blocks, transcript)
    }
}

/// Read a critique template from disk, or use the built-in one.
pub fn load_template(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path).map_err(|e| {
            PipelineError::InvalidConfig(format!(
                "cannot read prompt template {}: {}",
                path.display(),
                e
            ))
        }),
        None => Ok(DEFAULT_CRITIQUE_TEMPLATE.to_string()),
    }
}
