//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.themelens.toml` files. Secrets never live here: the engine credential
//! is read from the environment (a `.env` file is loaded at startup).

use crate::analysis::DEFAULT_MATCH_THRESHOLD;
use crate::cli::MAX_CONCEPTS_LIMIT;
use crate::error::ExplorerError;
use crate::induction::llm::API_KEY_ENV;
use crate::induction::LlmConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".themelens.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Dataset settings.
    #[serde(default)]
    pub dataset: DatasetConfig,

    /// Induction engine settings.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Aggregation settings.
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
        }
    }
}

fn default_output() -> String {
    "theme_report.md".to_string()
}

/// Dataset settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Path to the JSON / JSON Lines export of the interviews.
    #[serde(default = "default_data_path")]
    pub path: PathBuf,

    /// Response columns used to build documents, in order.
    #[serde(default = "default_questions")]
    pub questions: Vec<String>,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            path: default_data_path(),
            questions: default_questions(),
        }
    }
}

fn default_data_path() -> PathBuf {
    PathBuf::from("data/pizza_interviews.json")
}

fn default_questions() -> Vec<String> {
    vec!["q1_response".to_string()]
}

/// Which induction engine to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Chat-completions LLM (needs OPENAI_API_KEY)
    #[default]
    Llm,
    /// Replay an exported score table
    Replay,
}

/// Induction engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Engine kind.
    #[serde(default)]
    pub kind: EngineKind,

    /// Base URL of an OpenAI-compatible API.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Model name.
    #[serde(default = "default_model")]
    pub model: String,

    /// Temperature for generation.
    #[serde(default)]
    pub temperature: f32,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Maximum scoring requests in flight.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Documents shown to the model when proposing concepts.
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,

    /// Documents scored per request.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Score table replayed by the replay engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replay_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            kind: EngineKind::default(),
            api_url: default_api_url(),
            model: default_model(),
            temperature: 0.0,
            timeout_seconds: default_timeout(),
            concurrency: default_concurrency(),
            sample_size: default_sample_size(),
            batch_size: default_batch_size(),
            replay_path: None,
        }
    }
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_timeout() -> u64 {
    300
}

fn default_concurrency() -> usize {
    4
}

fn default_sample_size() -> usize {
    40
}

fn default_batch_size() -> usize {
    20
}

/// Aggregation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Score at or above which a document matches a concept.
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    /// Maximum concepts per run.
    #[serde(default = "default_max_concepts")]
    pub max_concepts: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            max_concepts: default_max_concepts(),
        }
    }
}

fn default_threshold() -> f64 {
    DEFAULT_MATCH_THRESHOLD
}

fn default_max_concepts() -> usize {
    5
}

impl EngineConfig {
    /// Build the LLM client config, reading the credential from the environment.
    pub fn llm_config(&self) -> LlmConfig {
        LlmConfig {
            api_url: self.api_url.clone(),
            model: self.model.clone(),
            api_key: std::env::var(API_KEY_ENV)
                .ok()
                .filter(|k| !k.trim().is_empty()),
            temperature: self.temperature,
            timeout_seconds: self.timeout_seconds,
            concurrency: self.concurrency,
            sample_size: self.sample_size,
            batch_size: self.batch_size,
        }
    }
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, and only
    /// override when the CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref data) = args.data {
            self.dataset.path = data.clone();
        }
        if let Some(ref questions) = args.questions {
            self.dataset.questions = questions.clone();
        }

        // A replay file implies the replay engine unless one was chosen
        if let Some(ref replay) = args.replay {
            self.engine.replay_path = Some(replay.clone());
            self.engine.kind = EngineKind::Replay;
        }
        if let Some(kind) = args.engine {
            self.engine.kind = kind;
        }
        if let Some(ref model) = args.model {
            self.engine.model = model.clone();
        }
        if let Some(ref api_url) = args.api_url {
            self.engine.api_url = api_url.clone();
        }
        if let Some(timeout) = args.timeout {
            self.engine.timeout_seconds = timeout;
        }
        if let Some(concurrency) = args.concurrency {
            self.engine.concurrency = concurrency;
        }

        if let Some(threshold) = args.threshold {
            self.analysis.threshold = threshold;
        }
        if let Some(max_concepts) = args.max_concepts {
            self.analysis.max_concepts = max_concepts;
        }

        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }
    }

    /// Check the merged settings. File values never pass through the CLI
    /// validation, so the same ranges are enforced here.
    pub fn validate(&self) -> Result<(), ExplorerError> {
        let invalid = |msg: String| -> Result<(), ExplorerError> {
            Err(ExplorerError::InvalidConfig(msg))
        };

        let max = self.analysis.max_concepts;
        if !(1..=MAX_CONCEPTS_LIMIT).contains(&max) {
            return invalid(format!(
                "max_concepts must be between 1 and {}, got {}",
                MAX_CONCEPTS_LIMIT, max
            ));
        }

        let threshold = self.analysis.threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return invalid(format!(
                "threshold must be between 0.0 and 1.0, got {}",
                threshold
            ));
        }

        let engine = &self.engine;
        if engine.timeout_seconds == 0 {
            return invalid("timeout_seconds must be at least 1".to_string());
        }
        if engine.concurrency == 0 {
            return invalid("concurrency must be at least 1".to_string());
        }
        if engine.sample_size == 0 || engine.batch_size == 0 {
            return invalid("sample_size and batch_size must be at least 1".to_string());
        }

        Ok(())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Args;
    use clap::Parser;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.engine.kind, EngineKind::Llm);
        assert_eq!(config.analysis.threshold, 0.75);
        assert_eq!(config.analysis.max_concepts, 5);
        assert_eq!(config.dataset.questions, vec!["q1_response"]);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
output = "custom_report.md"

[dataset]
path = "exports/interviews.jsonl"
questions = ["q1_response", "q2_response"]

[engine]
kind = "replay"
replay_path = "runs/last.json"
model = "gpt-4o"

[analysis]
threshold = 0.8
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.output, "custom_report.md");
        assert!(config.validate().is_ok());
        assert_eq!(config.dataset.path, PathBuf::from("exports/interviews.jsonl"));
        assert_eq!(config.dataset.questions.len(), 2);
        assert_eq!(config.engine.kind, EngineKind::Replay);
        assert_eq!(config.engine.replay_path, Some(PathBuf::from("runs/last.json")));
        assert_eq!(config.engine.concurrency, 4);
        assert_eq!(config.analysis.threshold, 0.8);
        assert_eq!(config.analysis.max_concepts, 5);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[dataset]"));
        assert!(toml_str.contains("[engine]"));
        assert!(toml_str.contains("[analysis]"));
    }

    #[test]
    fn test_merge_with_args_overrides_only_given_values() {
        let args = Args::parse_from([
            "themelens",
            "--replay",
            "saved.json",
            "--threshold",
            "0.6",
            "--questions",
            "q2_response,q3_response",
        ]);

        let mut config = Config::default();
        config.merge_with_args(&args);

        assert_eq!(config.engine.kind, EngineKind::Replay);
        assert_eq!(config.engine.replay_path, Some(PathBuf::from("saved.json")));
        assert_eq!(config.analysis.threshold, 0.6);
        assert_eq!(config.analysis.max_concepts, 5);
        assert_eq!(config.dataset.questions, vec!["q2_response", "q3_response"]);
        assert_eq!(config.dataset.path, default_data_path());
    }

    #[test]
    fn test_validate_rejects_out_of_range_file_values() {
        assert!(Config::default().validate().is_ok());

        let cases = [
            "[analysis]\nmax_concepts = 0",
            "[analysis]\nmax_concepts = 50",
            "[analysis]\nthreshold = 5.0",
            "[engine]\ntimeout_seconds = 0",
            "[engine]\nconcurrency = 0",
        ];
        for case in cases {
            let config: Config = toml::from_str(case).unwrap();
            let err = config.validate().unwrap_err();
            assert!(err.is_configuration(), "{case}: {err}");
        }
    }

    #[test]
    fn test_cli_values_can_repair_file_values() {
        let mut config: Config = toml::from_str("[analysis]\nmax_concepts = 50").unwrap();
        assert!(config.validate().is_err());

        config.merge_with_args(&Args::parse_from(["themelens", "--max-concepts", "3"]));
        assert!(config.validate().is_ok());
    }
}
