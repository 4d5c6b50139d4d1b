//! Concept induction engines.
//!
//! This module provides the inducer trait, the LLM-backed engine, the
//! replay engine, and the blocking entry point used by the CLI.

pub mod llm;
pub mod replay;
pub mod traits;

pub use llm::{LlmConfig, LlmInducer};
pub use replay::ReplayInducer;
pub use traits::{ConceptInducer, InductionOutput, InductionRequest};

use anyhow::{Context, Result};
use tracing::info;

/// Run one induction to completion from synchronous code.
///
/// Availability is checked first so a missing credential fails before any
/// request is made. The calling thread blocks until the engine returns a
/// complete result or fails. Must not be called from inside a runtime.
pub fn run_blocking(
    inducer: &dyn ConceptInducer,
    request: &InductionRequest,
) -> Result<InductionOutput> {
    inducer.ensure_available()?;

    info!(
        "Running induction with {} on {} documents (max {} concepts, seed: {})",
        inducer.name(),
        request.documents.len(),
        request.max_concepts,
        request.seed.as_deref().unwrap_or("none")
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    runtime.block_on(inducer.induce(request))
}
