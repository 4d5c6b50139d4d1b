//! Replay of an exported induction run.
//!
//! Reads a score table written with `--export-scores` and restricts it to
//! the documents of the current slice, so aggregation and reports can be
//! rerun without an engine credential.

use crate::error::ExplorerError;
use crate::induction::traits::{ConceptInducer, InductionOutput, InductionRequest};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::info;

/// Inducer that serves a previously exported result.
pub struct ReplayInducer {
    path: Option<PathBuf>,
}

impl ReplayInducer {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

#[async_trait]
impl ConceptInducer for ReplayInducer {
    fn name(&self) -> &str {
        "replay"
    }

    fn ensure_available(&self) -> Result<(), ExplorerError> {
        match &self.path {
            None => Err(ExplorerError::EngineUnavailable(
                "replay engine selected but no replay file configured (use --replay FILE)"
                    .to_string(),
            )),
            Some(path) if !path.is_file() => Err(ExplorerError::ReplayNotFound(path.clone())),
            Some(_) => Ok(()),
        }
    }

    async fn induce(&self, request: &InductionRequest) -> Result<InductionOutput> {
        self.ensure_available()?;
        let path = self.path.clone().unwrap_or_default();

        let saved = tokio::task::spawn_blocking(move || InductionOutput::read_json(&path)).await??;

        let mut concepts = saved.concepts;
        concepts.truncate(request.max_concepts);

        let doc_ids: HashSet<&str> = request
            .documents
            .iter()
            .map(|d| d.doc_id.as_str())
            .collect();

        let scores = saved
            .scores
            .into_iter()
            .filter(|s| doc_ids.contains(s.doc_id.as_str()) && concepts.contains(&s.concept_id))
            .collect::<Vec<_>>();

        info!(
            "Replayed {} score records across {} concepts",
            scores.len(),
            concepts.len()
        );

        Ok(InductionOutput::new(scores, concepts))
    }
}
