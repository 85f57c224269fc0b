//! TOML configuration parsing and validation.
//!
//! Every section is optional. [`Config::minimal`] yields the defaults used
//! when no configuration file is present.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::PipelineError;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
    #[serde(default)]
    pub aggregator: AggregatorConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    #[serde(default = "default_image_extensions")]
    pub image_extensions: Vec<String>,
    #[serde(default = "default_transcript_extensions")]
    pub transcript_extensions: Vec<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            image_extensions: default_image_extensions(),
            transcript_extensions: default_transcript_extensions(),
        }
    }
}

fn default_image_extensions() -> Vec<String> {
    ["jpg", "jpeg", "png", "bmp", "gif", "tiff", "webp"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_transcript_extensions() -> Vec<String> {
    ["txt", "srt", "vtt", "transcript"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[derive(Debug, Deserialize, Clone)]
pub struct BatchConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_skip_frames")]
    pub skip_frames: usize,
    /// Minimum pause between chunks, in milliseconds.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            skip_frames: default_skip_frames(),
            delay_ms: default_delay_ms(),
        }
    }
}

pub const DEFAULT_CHUNK_SIZE: usize = 3;
pub const DEFAULT_SKIP_FRAMES: usize = 1;

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}
fn default_skip_frames() -> usize {
    DEFAULT_SKIP_FRAMES
}
fn default_delay_ms() -> u64 {
    2000
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.llama.com/v1".to_string()
}
fn default_api_key_env() -> String {
    "LLAMA_API_KEY".to_string()
}
fn default_timeout_secs() -> u64 {
    120
}
fn default_max_retries() -> u32 {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnalyzerConfig {
    #[serde(default = "default_analyzer_model")]
    pub model: String,
    #[serde(default = "default_analyzer_max_tokens")]
    pub max_completion_tokens: u32,
    #[serde(default = "default_analyzer_temperature")]
    pub temperature: f64,
    /// Per-image instruction; `{name}` is replaced by the file name.
    #[serde(default = "default_instruction")]
    pub instruction: String,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            model: default_analyzer_model(),
            max_completion_tokens: default_analyzer_max_tokens(),
            temperature: default_analyzer_temperature(),
            instruction: default_instruction(),
        }
    }
}

fn default_analyzer_model() -> String {
    "Llama-4-Maverick-17B-128E-Instruct-FP8".to_string()
}
fn default_analyzer_max_tokens() -> u32 {
    2048
}
fn default_analyzer_temperature() -> f64 {
    0.7
}
fn default_instruction() -> String {
    "Analyze this image '{name}' and describe what you see. Include details about objects, \
     people, scenes, colors, composition, and any notable features."
        .to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct AggregatorConfig {
    #[serde(default = "default_aggregator_model")]
    pub model: String,
    #[serde(default = "default_aggregator_max_tokens")]
    pub max_completion_tokens: u32,
    #[serde(default = "default_aggregator_temperature")]
    pub temperature: f64,
    /// Optional file overriding the built-in critique template.
    #[serde(default)]
    pub prompt_template: Option<PathBuf>,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            model: default_aggregator_model(),
            max_completion_tokens: default_aggregator_max_tokens(),
            temperature: default_aggregator_temperature(),
            prompt_template: None,
        }
    }
}

fn default_aggregator_model() -> String {
    "Llama-4-Scout-17B-16E-Instruct-FP8".to_string()
}
fn default_aggregator_max_tokens() -> u32 {
    4000
}
fn default_aggregator_temperature() -> f64 {
    0.9
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_results_path")]
    pub results_path: PathBuf,
    #[serde(default = "default_report_path")]
    pub report_path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            results_path: default_results_path(),
            report_path: default_report_path(),
        }
    }
}

fn default_results_path() -> PathBuf {
    PathBuf::from("analysis_results.json")
}
fn default_report_path() -> PathBuf {
    PathBuf::from("critique.md")
}

impl Config {
    /// Defaults for every section.
    pub fn minimal() -> Self {
        Self::default()
    }

    /// Check invariants that the pipeline relies on.
    pub fn validate(&self) -> std::result::Result<(), PipelineError> {
        let invalid = |msg: String| Err(PipelineError::InvalidConfig(msg));

        if self.batch.chunk_size == 0 {
            return invalid("batch.chunk_size must be >= 1".to_string());
        }
        if self.batch.skip_frames == 0 {
            return invalid("batch.skip_frames must be >= 1".to_string());
        }
        if self.source.image_extensions.is_empty() {
            return invalid("source.image_extensions must not be empty".to_string());
        }
        if self.analyzer.instruction.trim().is_empty() {
            return invalid("analyzer.instruction must not be empty".to_string());
        }

        for (section, model, tokens, temperature) in [
            (
                "analyzer",
                &self.analyzer.model,
                self.analyzer.max_completion_tokens,
                self.analyzer.temperature,
            ),
            (
                "aggregator",
                &self.aggregator.model,
                self.aggregator.max_completion_tokens,
                self.aggregator.temperature,
            ),
        ] {
            if model.trim().is_empty() {
                return invalid(format!("{}.model must not be empty", section));
            }
            if tokens == 0 {
                return invalid(format!("{}.max_completion_tokens must be >= 1", section));
            }
            if !(0.0..=2.0).contains(&temperature) {
                return invalid(format!("{}.temperature must be in [0.0, 2.0]", section));
            }
        }

        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;

    Ok(config)
}

/// Load `path` if it exists, otherwise fall back to [`Config::minimal`].
pub fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::warn!(
            config = %path.display(),
            "config file not found, using defaults"
        );
        Ok(Config::minimal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.batch.chunk_size, 3);
        assert_eq!(config.batch.skip_frames, 1);
        assert_eq!(config.batch.delay_ms, 2000);
        assert_eq!(config.analyzer.max_completion_tokens, 2048);
        assert_eq!(config.aggregator.max_completion_tokens, 4000);
        assert!(config.aggregator.temperature > config.analyzer.temperature);
        assert_eq!(config.output.results_path, PathBuf::from("analysis_results.json"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config: Config = toml::from_str(
            r#"
[batch]
chunk_size = 5

[service]
base_url = "http://127.0.0.1:9000"
"#,
        )
        .unwrap();
        assert_eq!(config.batch.chunk_size, 5);
        assert_eq!(config.batch.skip_frames, 1);
        assert_eq!(config.service.base_url, "http://127.0.0.1:9000");
        assert_eq!(config.service.api_key_env, "LLAMA_API_KEY");
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let mut config = Config::minimal();
        config.batch.chunk_size = 0;
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn out_of_range_temperature_is_rejected() {
        let mut config = Config::minimal();
        config.aggregator.temperature = 3.5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("aggregator.temperature"));
    }

    #[test]
    fn load_config_reports_validation_errors() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("fcrit.toml");
        std::fs::write(&path, "[batch]\nskip_frames = 0\n").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("skip_frames"));
    }

    #[test]
    fn example_config_matches_defaults() {
        let config: Config =
            toml::from_str(include_str!("../config/fcrit.example.toml")).unwrap();
        let defaults = Config::minimal();
        assert!(config.validate().is_ok());
        assert_eq!(config.batch.delay_ms, defaults.batch.delay_ms);
        assert_eq!(config.analyzer.model, defaults.analyzer.model);
        assert_eq!(config.analyzer.instruction, defaults.analyzer.instruction);
        assert_eq!(config.aggregator.model, defaults.aggregator.model);
        assert_eq!(config.source.image_extensions, defaults.source.image_extensions);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = load_or_default(&tmp.path().join("absent.toml")).unwrap();
        assert_eq!(config.batch.chunk_size, DEFAULT_CHUNK_SIZE);
    }
}
