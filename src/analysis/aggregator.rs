//! Score aggregation and statistics.
//!
//! Turns the long-form score table from induction into per-concept
//! summaries, per-concept document counts and per-region breakdowns.
//! Global prevalence is always over every document in the slice; regional
//! prevalence is over the documents of one region. The two denominators are
//! kept in separately named fields.

use crate::analysis::highlights::MAX_HIGHLIGHTS;
use crate::induction::InductionOutput;
use crate::models::{
    ConceptDocCount, ConceptRegions, ConceptSummary, ConceptTable, Document, Notice,
    RegionBreakdown, ScoreRecord,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

/// Score at or above which a document matches a concept.
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.75;

/// Everything derived from one induction run.
#[derive(Debug, Clone, Default)]
pub struct Analysis {
    pub concepts: Vec<ConceptSummary>,
    pub docs_per_concept: Vec<ConceptDocCount>,
    pub regional: Vec<ConceptRegions>,
    pub notices: Vec<Notice>,
}

/// Aggregate an induction result over the documents of the slice.
pub fn analyze(output: &InductionOutput, documents: &[Document], threshold: f64) -> Analysis {
    let total_docs = distinct_documents(documents);
    let concepts = summarize_concepts(&output.scores, &output.concepts, total_docs, threshold);
    let docs_per_concept = docs_per_concept(&output.scores, threshold);
    let regional = regional_breakdown(&output.scores, &concepts, documents, threshold);

    let mut notices = Vec::new();
    if documents.is_empty() {
        notices.push(Notice::NoDocuments);
    } else if output.concepts.is_empty() {
        notices.push(Notice::NoConcepts);
    } else if docs_per_concept.is_empty() {
        notices.push(Notice::NoMatches);
    }

    Analysis {
        concepts,
        docs_per_concept,
        regional,
        notices,
    }
}

/// `numerator / denominator`, or 0 for an empty denominator.
pub fn prevalence(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Number of distinct documents in the slice.
pub fn distinct_documents(documents: &[Document]) -> usize {
    documents
        .iter()
        .map(|d| d.doc_id.as_str())
        .collect::<HashSet<_>>()
        .len()
}

/// Distinct documents matching `concept_id` at `threshold`.
pub fn matched_documents<'a>(
    scores: &'a [ScoreRecord],
    concept_id: &str,
    threshold: f64,
) -> HashSet<&'a str> {
    scores
        .iter()
        .filter(|s| s.concept_id == concept_id && s.is_match(threshold))
        .map(|s| s.doc_id.as_str())
        .collect()
}

/// Build one summary per concept, most matches first.
///
/// `total_docs` is the slice size, whether or not every document was
/// scored. Ties keep the concept table order. Highlights come from
/// matching rows in input order.
pub fn summarize_concepts(
    scores: &[ScoreRecord],
    concepts: &ConceptTable,
    total_docs: usize,
    threshold: f64,
) -> Vec<ConceptSummary> {
    let mut summaries: Vec<ConceptSummary> = concepts
        .iter()
        .map(|concept| {
            let n_matches = matched_documents(scores, &concept.id, threshold).len();

            let highlights: Vec<String> = scores
                .iter()
                .filter(|s| s.concept_id == concept.id && s.is_match(threshold))
                .filter(|s| !s.highlight.is_blank())
                .flat_map(|s| s.highlight.normalize(MAX_HIGHLIGHTS))
                .take(MAX_HIGHLIGHTS)
                .collect();

            ConceptSummary {
                concept_id: concept.id.clone(),
                concept: concept.display_name().to_string(),
                criteria: concept.prompt.clone(),
                summary: concept.summary.clone(),
                prevalence: prevalence(n_matches, total_docs),
                n_matches,
                total_docs,
                highlights,
            }
        })
        .collect();

    summaries.sort_by_key(|s| std::cmp::Reverse(s.n_matches));

    debug!(
        "Summarized {} concepts over {} documents",
        summaries.len(),
        total_docs
    );
    summaries
}

/// Distinct matching documents per concept name, most first.
///
/// Concepts without matches are left out. Ties are ordered by name.
pub fn docs_per_concept(scores: &[ScoreRecord], threshold: f64) -> Vec<ConceptDocCount> {
    let mut grouped: BTreeMap<&str, HashSet<&str>> = BTreeMap::new();

    for score in scores.iter().filter(|s| s.is_match(threshold)) {
        grouped
            .entry(score.concept_name.as_str())
            .or_default()
            .insert(score.doc_id.as_str());
    }

    let mut counts: Vec<ConceptDocCount> = grouped
        .into_iter()
        .map(|(name, docs)| ConceptDocCount {
            concept_name: name.to_string(),
            n_matches: docs.len(),
        })
        .collect();

    counts.sort_by_key(|c| std::cmp::Reverse(c.n_matches));
    counts
}

/// Distinct documents per region over the whole slice.
///
/// Documents without a region are not counted anywhere.
pub fn region_totals(documents: &[Document]) -> BTreeMap<String, usize> {
    let mut grouped: BTreeMap<&str, HashSet<&str>> = BTreeMap::new();

    for doc in documents {
        if let Some(region) = doc.region() {
            grouped.entry(region).or_default().insert(doc.doc_id.as_str());
        }
    }

    grouped
        .into_iter()
        .map(|(region, docs)| (region.to_string(), docs.len()))
        .collect()
}

/// Per-region match counts for every concept, in summary order.
///
/// Every region of the slice is listed for every concept, zero-filled when
/// nothing matched there. Within a concept, regions are ordered by
/// descending matches, then by name.
pub fn regional_breakdown(
    scores: &[ScoreRecord],
    summaries: &[ConceptSummary],
    documents: &[Document],
    threshold: f64,
) -> Vec<ConceptRegions> {
    let region_of: HashMap<&str, &str> = documents
        .iter()
        .filter_map(|d| d.region().map(|r| (d.doc_id.as_str(), r)))
        .collect();
    let totals = region_totals(documents);

    summaries
        .iter()
        .map(|summary| {
            let mut matched_by_region: HashMap<&str, usize> = HashMap::new();
            for doc_id in matched_documents(scores, &summary.concept_id, threshold) {
                if let Some(region) = region_of.get(doc_id) {
                    *matched_by_region.entry(*region).or_default() += 1;
                }
            }

            let mut regions: Vec<RegionBreakdown> = totals
                .iter()
                .map(|(region, &region_total)| {
                    let n_matches = matched_by_region
                        .get(region.as_str())
                        .copied()
                        .unwrap_or(0);
                    RegionBreakdown {
                        region: region.clone(),
                        n_matches,
                        region_total,
                        prevalence: prevalence(n_matches, region_total),
                    }
                })
                .collect();

            regions.sort_by_key(|r| std::cmp::Reverse(r.n_matches));

            ConceptRegions {
                concept_id: summary.concept_id.clone(),
                concept: summary.concept.clone(),
                regions,
            }
        })
        .collect()
}
