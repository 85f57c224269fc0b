//! # Frame Critic
//!
//! Batch analysis of video frame sequences through a remote multimodal
//! model, followed by a single director-style critique of the whole
//! sequence.
//!
//! Frames are read from a directory, sampled by stride, split into
//! order-preserving chunks, and sent one chunk at a time to an
//! [`Analyzer`](traits::Analyzer). Each answer is normalized into result
//! records that are persisted as JSON. The records, plus an optional
//! audio transcript, are then folded into one narrative prompt for an
//! [`Aggregator`](traits::Aggregator), whose answer becomes the report.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌───────────┐   ┌─────────────┐
//! │  Source  │──▶│ Plan + Encode│──▶│  Analyzer │──▶│  Normalize  │
//! │ (frames) │   │   (chunks)   │   │  (remote) │   │  + Persist  │
//! └──────────┘   └──────────────┘   └───────────┘   └──────┬──────┘
//!                                                         │ records
//!                      ┌──────────────┐   ┌────────────┐   ▼
//!                      │ critique.md  │◀──│ Aggregator │◀── narrative
//!                      └──────────────┘   └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export LLAMA_API_KEY=...
//! fcrit plan ./frames            # dry run, no remote calls
//! fcrit run ./frames             # analyze + critique
//! fcrit critique ./frames        # re-run the critique from analysis_results.json
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Pipeline error taxonomy |
//! | [`models`] | Input items, chunks, result records |
//! | [`source`] | Directory scan, stride sampling, transcript lookup |
//! | [`encode`] | Base64 image encoding |
//! | [`planner`] | Chunk planning |
//! | [`traits`] | `Analyzer` / `Aggregator` boundaries |
//! | [`client`] | HTTP chat-completions client |
//! | [`normalize`] | Response classification and record building |
//! | [`ratelimit`] | Inter-chunk gate |
//! | [`store`] | Result artifact persistence |
//! | [`narrative`] | Critique prompt assembly |
//! | [`report`] | Report persistence and preview |
//! | [`pipeline`] | Two-stage orchestration |
//! | [`progress`] | Progress reporting |
//! | [`interactive`] | Prompt-driven front end |
//! | [`logging`] | `tracing` subscriber setup |

pub mod client;
pub mod config;
pub mod encode;
pub mod error;
pub mod interactive;
pub mod logging;
pub mod models;
pub mod narrative;
pub mod normalize;
pub mod pipeline;
pub mod planner;
pub mod progress;
pub mod ratelimit;
pub mod report;
pub mod source;
pub mod store;
pub mod traits;
