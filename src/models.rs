//! Data models for the theme explorer.
//!
//! This module contains the core data structures used throughout the
//! application: participants and documents on the input side, concepts and
//! long-form score records from induction, and the derived summaries that
//! end up in a report.

use crate::analysis::highlights::HighlightValue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Demographic attributes carried from a participant to its document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Demographics {
    pub age: Option<u32>,
    pub city_of_residence: Option<String>,
    pub state_of_residence: Option<String>,
    pub region_of_residence: Option<String>,
    pub income: Option<String>,
    pub pizza_consumption: Option<String>,
    pub food_restrictions: Option<String>,
}

/// One interviewee row from the dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantRecord {
    /// String form of the participant identifier (the join key).
    pub participant_id: String,
    /// Demographic attributes.
    pub demographics: Demographics,
    /// The five free-text responses, `q1_response` first.
    pub responses: [Option<String>; 5],
}

/// Assembled text unit submitted to induction, one per participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub doc_id: String,
    pub text: String,
    pub demographics: Demographics,
}

impl Document {
    pub fn region(&self) -> Option<&str> {
        self.demographics.region_of_residence.as_deref()
    }
}

/// An induced theme.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Concept {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Inclusion criteria used to score documents against this concept.
    #[serde(default)]
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl Concept {
    /// Display name, falling back to the identifier when the name is blank.
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

/// Concept metadata keyed by concept id, in induction order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConceptTable {
    concepts: Vec<Concept>,
}

impl ConceptTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a concept, replacing any existing entry with the same id in place.
    pub fn insert(&mut self, concept: Concept) {
        match self.concepts.iter_mut().find(|c| c.id == concept.id) {
            Some(existing) => *existing = concept,
            None => self.concepts.push(concept),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Concept> {
        self.concepts.iter().find(|c| c.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Concept> {
        self.concepts.iter()
    }

    pub fn len(&self) -> usize {
        self.concepts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.concepts.is_empty()
    }

    /// Keep only the first `n` concepts.
    pub fn truncate(&mut self, n: usize) {
        self.concepts.truncate(n);
    }
}

impl FromIterator<Concept> for ConceptTable {
    fn from_iter<I: IntoIterator<Item = Concept>>(iter: I) -> Self {
        let mut table = ConceptTable::new();
        for concept in iter {
            table.insert(concept);
        }
        table
    }
}

/// A document-vs-concept score as produced by the engine.
///
/// Numeric scores are in `0.0..=1.0`; binary scorers emit booleans. Some
/// engines emit numbers as strings, which are coerced when matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Score {
    Binary(bool),
    Numeric(f64),
    Text(String),
}

impl Score {
    /// Whether this score clears `threshold`.
    ///
    /// Binary scores match when true (== 1). Text that does not parse as a
    /// number never matches.
    pub fn is_match(&self, threshold: f64) -> bool {
        match self {
            Score::Binary(b) => *b,
            Score::Numeric(v) => *v >= threshold,
            Score::Text(s) => s
                .trim()
                .parse::<f64>()
                .map(|v| v >= threshold)
                .unwrap_or(false),
        }
    }
}

/// One row of the long-form score table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub doc_id: String,
    #[serde(default)]
    pub text: String,
    pub concept_id: String,
    #[serde(default)]
    pub concept_name: String,
    #[serde(default)]
    pub concept_prompt: String,
    #[serde(default)]
    pub score: Option<Score>,
    #[serde(default)]
    pub rationale: String,
    #[serde(default)]
    pub highlight: HighlightValue,
    #[serde(default)]
    pub concept_seed: Option<String>,
}

impl ScoreRecord {
    /// Whether this row is a match at `threshold`. Missing scores never match.
    pub fn is_match(&self, threshold: f64) -> bool {
        self.score
            .as_ref()
            .map(|s| s.is_match(threshold))
            .unwrap_or(false)
    }
}

/// Per-concept aggregate over the whole slice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptSummary {
    pub concept_id: String,
    /// Concept display name.
    pub concept: String,
    /// Inclusion criteria.
    pub criteria: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// `n_matches / total_docs`, 0 when the slice is empty.
    pub prevalence: f64,
    /// Distinct matching documents.
    pub n_matches: usize,
    /// Distinct documents in the slice (global denominator).
    pub total_docs: usize,
    pub highlights: Vec<String>,
}

/// Matching documents for one concept name (the "docs per theme" chart).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptDocCount {
    pub concept_name: String,
    pub n_matches: usize,
}

/// Per-(concept, region) aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionBreakdown {
    pub region: String,
    /// Distinct matched documents in this region.
    pub n_matches: usize,
    /// Documents of this region in the slice (regional denominator).
    pub region_total: usize,
    /// `n_matches / region_total`, 0 when the region is empty.
    pub prevalence: f64,
}

/// All regions for one concept, ordered by descending matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptRegions {
    pub concept_id: String,
    pub concept: String,
    pub regions: Vec<RegionBreakdown>,
}

/// Informational empty states. These are not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Notice {
    /// Filtering and assembly left no documents.
    NoDocuments,
    /// The engine returned no concepts.
    NoConcepts,
    /// No score cleared the match threshold.
    NoMatches,
}

impl Notice {
    pub fn message(&self) -> &'static str {
        match self {
            Notice::NoDocuments => {
                "No non-empty text after filters/questions. Try adjusting selections."
            }
            Notice::NoConcepts => "No concepts returned.",
            Notice::NoMatches => {
                "No matched documents at the current threshold. Try a different seed, more questions, or lower the threshold."
            }
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Counts describing the analyzed slice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliceStats {
    /// Distinct participant ids after filtering.
    pub participants: usize,
    /// Rows after filtering.
    pub rows: usize,
    /// Documents left after text assembly.
    pub documents: usize,
}

/// Metadata about a theme report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Path of the analyzed dataset.
    pub dataset: String,
    pub analysis_date: DateTime<Utc>,
    /// Engine that produced the concepts.
    pub engine: String,
    pub seed: Option<String>,
    pub max_concepts: usize,
    pub threshold: f64,
    /// Response fields used to build documents.
    pub questions: Vec<String>,
    /// Region filter, empty when all regions were included.
    pub regions: Vec<String>,
    pub slice: SliceStats,
    pub duration_seconds: f64,
}

/// The complete theme report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    /// Concept summaries, most matches first.
    pub concepts: Vec<ConceptSummary>,
    pub docs_per_concept: Vec<ConceptDocCount>,
    pub regional: Vec<ConceptRegions>,
    pub notices: Vec<Notice>,
}
