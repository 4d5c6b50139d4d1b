//! Concept inducer trait and its request/response types.
//!
//! The induction engine is opaque: it takes documents, an optional seed and
//! a concept budget, and hands back a long-form score table plus concept
//! metadata. Everything downstream only sees these types.

use crate::error::ExplorerError;
use crate::models::{ConceptTable, Document, ScoreRecord};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::warn;

/// Input for one induction run.
#[derive(Debug, Clone)]
pub struct InductionRequest {
    pub documents: Vec<Document>,
    /// Optional one-word steering seed.
    pub seed: Option<String>,
    pub max_concepts: usize,
}

/// Long-form scores and concept metadata from one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InductionOutput {
    pub scores: Vec<ScoreRecord>,
    pub concepts: ConceptTable,
}

impl InductionOutput {
    /// Build an output, keeping the first record of any repeated
    /// (document, concept) pair.
    pub fn new(scores: Vec<ScoreRecord>, concepts: ConceptTable) -> Self {
        let mut seen: HashSet<(String, String)> = HashSet::with_capacity(scores.len());
        let total = scores.len();

        let scores: Vec<ScoreRecord> = scores
            .into_iter()
            .filter(|s| seen.insert((s.doc_id.clone(), s.concept_id.clone())))
            .collect();

        if scores.len() < total {
            warn!(
                "Dropped {} duplicate score records",
                total - scores.len()
            );
        }

        Self { scores, concepts }
    }

    /// Write the score table and concepts as pretty JSON.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize induction output")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write scores to {}", path.display()))
    }

    /// Read a previously exported score table.
    pub fn read_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scores from {}", path.display()))?;
        let output: InductionOutput = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse scores in {}", path.display()))?;
        Ok(Self::new(output.scores, output.concepts))
    }
}

/// An engine that discovers concepts and scores documents against them.
///
/// Implementations must be async because most engines call a remote LLM.
#[async_trait]
pub trait ConceptInducer: Send + Sync {
    /// Short engine name for logs and report metadata.
    fn name(&self) -> &str;

    /// Check that the engine can run (credentials, files) without calling it.
    fn ensure_available(&self) -> Result<(), ExplorerError>;

    /// Run discovery and scoring. Either a complete result or an error.
    async fn induce(&self, request: &InductionRequest) -> Result<InductionOutput>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::highlights::HighlightValue;
    use crate::models::{Concept, Score};
    use tempfile::TempDir;

    fn record(doc: &str, concept: &str, value: f64) -> ScoreRecord {
        ScoreRecord {
            doc_id: doc.to_string(),
            text: "text".to_string(),
            concept_id: concept.to_string(),
            concept_name: concept.to_uppercase(),
            concept_prompt: String::new(),
            score: Some(Score::Numeric(value)),
            rationale: String::new(),
            highlight: HighlightValue::Missing,
            concept_seed: None,
        }
    }

    #[test]
    fn test_new_keeps_first_duplicate() {
        let output = InductionOutput::new(
            vec![record("1", "a", 0.9), record("1", "a", 0.1), record("2", "a", 0.5)],
            ConceptTable::new(),
        );
        assert_eq!(output.scores.len(), 2);
        assert_eq!(output.scores[0].score, Some(Score::Numeric(0.9)));
    }

    #[test]
    fn test_json_export_roundtrip_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("scores.json");

        let concepts: ConceptTable = vec![Concept {
            id: "a".to_string(),
            name: "Crust".to_string(),
            prompt: "Mentions crust?".to_string(),
            summary: Some("People care about crust.".to_string()),
        }]
        .into_iter()
        .collect();
        let output = InductionOutput::new(vec![record("1", "a", 0.8)], concepts);
        output.write_json(&path).unwrap();

        let read = InductionOutput::read_json(&path).unwrap();
        assert_eq!(read.scores, output.scores);
        assert_eq!(read.concepts, output.concepts);
    }
}
