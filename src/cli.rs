//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::config::EngineKind;
use clap::Parser;
use std::path::PathBuf;

/// Highest concept budget accepted per run.
pub const MAX_CONCEPTS_LIMIT: usize = 10;

/// themelens - theme induction explorer for interview data
///
/// Induce descriptive themes from free-text interview responses with an
/// LLM, then report how prevalent each theme is overall and by region.
///
/// Examples:
///   themelens --data data/pizza_interviews.json
///   themelens --region Northeast,South --questions q1_response,q2_response --seed taste
///   themelens --replay runs/last.json --format json -o themes.json
///   themelens --list-regions
///   themelens --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Interview dataset (JSON array or JSON Lines export)
    #[arg(short, long, value_name = "FILE")]
    pub data: Option<PathBuf>,

    /// Only include participants from these regions (comma-separated)
    #[arg(long, value_name = "REGIONS", value_delimiter = ',')]
    pub region: Vec<String>,

    /// Only include participants of these ages (comma-separated)
    #[arg(long, value_name = "AGES", value_delimiter = ',')]
    pub age: Vec<u32>,

    /// Only include participants in these income brackets (comma-separated)
    #[arg(long, value_name = "INCOMES", value_delimiter = ',')]
    pub income: Vec<String>,

    /// Only include participants with these dietary restrictions (comma-separated)
    #[arg(long, value_name = "DIETS", value_delimiter = ',')]
    pub diet: Vec<String>,

    /// Response columns to concatenate into each document (comma-separated)
    ///
    /// Example: --questions q1_response,q2_response
    #[arg(short = 'Q', long, value_name = "COLUMNS", value_delimiter = ',')]
    pub questions: Option<Vec<String>>,

    /// Optional one-word theme seed to steer induction
    ///
    /// Examples: taste, packaging, family
    #[arg(short, long, value_name = "WORD")]
    pub seed: Option<String>,

    /// Maximum number of themes to induce (1-10)
    #[arg(long, value_name = "COUNT")]
    pub max_concepts: Option<usize>,

    /// Score at or above which a document matches a theme (0.0 - 1.0)
    #[arg(long, value_name = "SCORE")]
    pub threshold: Option<f64>,

    /// Induction engine
    #[arg(long, value_name = "ENGINE")]
    pub engine: Option<EngineKind>,

    /// Replay a score table exported with --export-scores
    #[arg(long, value_name = "FILE")]
    pub replay: Option<PathBuf>,

    /// Model used by the LLM engine
    #[arg(short, long, env = "THEMELENS_MODEL")]
    pub model: Option<String>,

    /// Base URL of an OpenAI-compatible API
    #[arg(long, value_name = "URL", env = "THEMELENS_API_URL")]
    pub api_url: Option<String>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Maximum scoring requests in flight
    #[arg(long, value_name = "NUM")]
    pub concurrency: Option<usize>,

    /// Output file path for the report
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Also write the long-form score table and concepts as JSON
    #[arg(long, value_name = "FILE")]
    pub export_scores: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .themelens.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Dry run: filter and assemble documents without calling the engine
    #[arg(long)]
    pub dry_run: bool,

    /// List the regions present in the dataset and exit
    #[arg(long)]
    pub list_regions: bool,

    /// Generate a default .themelens.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// The seed with surrounding whitespace removed; `None` when blank.
    pub fn effective_seed(&self) -> Option<String> {
        self.seed
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if let Some(seed) = self.effective_seed() {
            if seed.split_whitespace().count() > 1 {
                return Err(format!("Seed must be a single word, got '{}'", seed));
            }
        }

        if let Some(max) = self.max_concepts {
            if !(1..=MAX_CONCEPTS_LIMIT).contains(&max) {
                return Err(format!(
                    "Max concepts must be between 1 and {}",
                    MAX_CONCEPTS_LIMIT
                ));
            }
        }

        if let Some(threshold) = self.threshold {
            if !(0.0..=1.0).contains(&threshold) {
                return Err("Threshold must be between 0.0 and 1.0".to_string());
            }
        }

        if let Some(ref url) = self.api_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("API URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if self.concurrency == Some(0) {
            return Err("Concurrency must be at least 1".to_string());
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.engine == Some(EngineKind::Llm) && self.replay.is_some() {
            return Err("--replay cannot be combined with --engine llm".to_string());
        }

        if let Some(ref data) = self.data {
            if !data.is_file() {
                return Err(format!("Data file does not exist: {}", data.display()));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
