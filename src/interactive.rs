//! Prompt-driven front end for `fcrit interactive`.
//!
//! Asks for the input directory until an existing one (or a quit word) is
//! given, then for the chunk size and stride. Numeric answers that do not
//! parse reset both values to their defaults instead of failing.

use anyhow::Result;
use std::io::{BufRead, Write};
use std::path::PathBuf;

use crate::config::{DEFAULT_CHUNK_SIZE, DEFAULT_SKIP_FRAMES};

const QUIT_WORDS: &[&str] = &["quit", "exit", "q"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractiveSettings {
    pub dir: PathBuf,
    pub chunk_size: usize,
    pub skip_frames: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompted {
    Quit,
    Run(InteractiveSettings),
}

pub fn prompt_settings<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> Result<Prompted> {
    let dir = loop {
        let Some(answer) = ask(input, output, "Enter the folder path containing images: ")? else {
            return Ok(Prompted::Quit);
        };
        if QUIT_WORDS.contains(&answer.to_lowercase().as_str()) {
            writeln!(output, "Goodbye!")?;
            return Ok(Prompted::Quit);
        }
        let path = PathBuf::from(&answer);
        if !answer.is_empty() && path.is_dir() {
            break path;
        }
        writeln!(output, "Folder not found: {}", answer)?;
        writeln!(output, "Please enter a valid folder path or 'quit' to exit.")?;
    };

    let (chunk_size, skip_frames) = match read_numbers(input, output)? {
        Some(values) => values,
        None => {
            writeln!(
                output,
                "Invalid input, using defaults: chunk_size={}, skip_frames={}",
                DEFAULT_CHUNK_SIZE, DEFAULT_SKIP_FRAMES
            )?;
            (DEFAULT_CHUNK_SIZE, DEFAULT_SKIP_FRAMES)
        }
    };

    Ok(Prompted::Run(InteractiveSettings {
        dir,
        chunk_size,
        skip_frames,
    }))
}

/// Both numeric answers, or `None` as soon as one is invalid.
fn read_numbers<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> Result<Option<(usize, usize)>> {
    let chunk_prompt = format!(
        "Chunk size (images per API call, default {}): ",
        DEFAULT_CHUNK_SIZE
    );
    let Some(chunk_size) = ask_number(input, output, &chunk_prompt, DEFAULT_CHUNK_SIZE)? else {
        return Ok(None);
    };

    let skip_prompt = format!(
        "Skip frames (process every Nth image, default {}): ",
        DEFAULT_SKIP_FRAMES
    );
    let Some(skip_frames) = ask_number(input, output, &skip_prompt, DEFAULT_SKIP_FRAMES)? else {
        return Ok(None);
    };

    Ok(Some((chunk_size, skip_frames)))
}

fn ask_number<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    prompt: &str,
    default: usize,
) -> Result<Option<usize>> {
    let answer = ask(input, output, prompt)?.unwrap_or_default();
    if answer.is_empty() {
        return Ok(Some(default));
    }
    Ok(answer.parse::<usize>().ok().filter(|n| *n >= 1))
}

/// Print `prompt` and read one trimmed line; `None` at end of input.
fn ask<R: BufRead, W: Write>(input: &mut R, output: &mut W, prompt: &str) -> Result<Option<String>> {
    write!(output, "{}", prompt)?;
    output.flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}
