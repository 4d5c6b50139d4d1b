//! Markdown and JSON report generation.
//!
//! This module renders theme cards, the docs-per-theme table and the
//! regional breakdown from an aggregated report.

use crate::models::{ConceptDocCount, ConceptRegions, ConceptSummary, Notice, Report, ReportMetadata};
use anyhow::Result;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report) -> String {
    let mut output = String::new();

    output.push_str("# Theme Report\n\n");

    output.push_str(&generate_metadata_section(&report.metadata));

    output.push_str(&generate_notices_section(&report.notices));

    output.push_str(&generate_themes_section(&report.concepts));

    output.push_str(&generate_docs_per_theme_section(&report.docs_per_concept));

    output.push_str(&generate_regional_section(&report.regional, &report.notices));

    output.push_str(&generate_footer());

    output
}

/// Format a 0..1 fraction as a percentage with one decimal.
fn percent(fraction: f64) -> String {
    format!("{:.1}%", fraction * 100.0)
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Dataset:** `{}`\n", metadata.dataset));
    section.push_str(&format!(
        "- **Analysis Date:** {}\n",
        metadata.analysis_date.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Engine:** `{}`\n", metadata.engine));
    section.push_str(&format!(
        "- **Seed:** {}\n",
        metadata.seed.as_deref().unwrap_or("none")
    ));
    section.push_str(&format!("- **Max Themes:** {}\n", metadata.max_concepts));
    section.push_str(&format!("- **Match Threshold:** {:.2}\n", metadata.threshold));
    section.push_str(&format!(
        "- **Questions:** {}\n",
        metadata.questions.join(", ")
    ));
    if metadata.regions.is_empty() {
        section.push_str("- **Regions:** all\n");
    } else {
        section.push_str(&format!("- **Regions:** {}\n", metadata.regions.join(", ")));
    }
    section.push_str(&format!(
        "- **Participants in Slice:** {} ({} rows)\n",
        metadata.slice.participants, metadata.slice.rows
    ));
    section.push_str(&format!(
        "- **Text Rows Induced On:** {}\n",
        metadata.slice.documents
    ));
    section.push_str(&format!(
        "- **Analysis Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

/// Informational empty states, as blockquotes.
fn generate_notices_section(notices: &[Notice]) -> String {
    let mut section = String::new();

    for notice in notices {
        section.push_str(&format!("> ℹ️ {}\n\n", notice));
    }

    section
}

/// Generate the theme cards.
fn generate_themes_section(concepts: &[ConceptSummary]) -> String {
    let mut section = String::new();

    section.push_str("## Induced Themes\n\n");

    if concepts.is_empty() {
        section.push_str("No themes to display.\n\n");
        return section;
    }

    for concept in concepts {
        section.push_str(&generate_theme_card(concept));
    }

    section
}

/// Generate a single theme card.
fn generate_theme_card(concept: &ConceptSummary) -> String {
    let mut card = String::new();

    card.push_str(&format!("### {}\n\n", concept.concept.trim()));

    if let Some(summary) = concept.summary.as_deref().map(str::trim) {
        if !summary.is_empty() {
            card.push_str(&format!("*{}*\n\n", summary));
        }
    }

    card.push_str(&format!(
        "**Prevalence:** {} | **# Docs:** {} of {}\n\n",
        percent(concept.prevalence),
        concept.n_matches,
        concept.total_docs
    ));

    if !concept.highlights.is_empty() {
        card.push_str("**Highlight quotes**\n\n");
        for quote in &concept.highlights {
            card.push_str(&format!("> {}\n\n", quote.replace('\n', " ")));
        }
    }

    let criteria = concept.criteria.trim();
    if !criteria.is_empty() {
        card.push_str("<details>\n<summary>Inclusion criteria</summary>\n\n");
        card.push_str(criteria);
        card.push_str("\n</details>\n\n");
    }

    card.push_str("---\n\n");

    card
}

/// Generate the docs-per-theme table.
fn generate_docs_per_theme_section(counts: &[ConceptDocCount]) -> String {
    let mut section = String::new();

    section.push_str("## Docs per Theme\n\n");

    if counts.is_empty() {
        section.push_str("No matched documents at the current threshold.\n\n");
        return section;
    }

    section.push_str("| Theme | Docs |\n");
    section.push_str("|:---|:---:|\n");
    for count in counts {
        section.push_str(&format!("| {} | {} |\n", count.concept_name, count.n_matches));
    }
    section.push('\n');

    section
}

/// Generate the per-theme regional tables.
fn generate_regional_section(regional: &[ConceptRegions], notices: &[Notice]) -> String {
    let mut section = String::new();

    section.push_str("## Regional Breakdown\n\n");
    section.push_str(
        "For each theme: # of matching docs by region, plus share within region (prevalence).\n\n",
    );

    if regional.is_empty() || notices.contains(&Notice::NoMatches) {
        section.push_str("No matches to display per region yet.\n\n");
        return section;
    }

    for concept in regional {
        section.push_str(&format!("### {}\n\n", concept.concept.trim()));

        if concept.regions.is_empty() {
            section.push_str("No regions recorded for this slice.\n\n");
            continue;
        }

        section.push_str("| Region | Matches | Texts | Prevalence (%) |\n");
        section.push_str("|:---|:---:|:---:|:---:|\n");
        for region in &concept.regions {
            section.push_str(&format!(
                "| {} | {} | {} | {:.1} |\n",
                region.region,
                region.n_matches,
                region.region_total,
                region.prevalence * 100.0
            ));
        }
        section.push('\n');
    }

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str("*Report generated by themelens*\n");

    footer
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RegionBreakdown, SliceStats};
    use chrono::Utc;

    fn create_test_metadata() -> ReportMetadata {
        ReportMetadata {
            dataset: "data/pizza_interviews.json".to_string(),
            analysis_date: Utc::now(),
            engine: "gpt-4o-mini".to_string(),
            seed: Some("taste".to_string()),
            max_concepts: 5,
            threshold: 0.75,
            questions: vec!["q1_response".to_string(), "q2_response".to_string()],
            regions: vec!["Northeast".to_string()],
            slice: SliceStats {
                participants: 5,
                rows: 5,
                documents: 5,
            },
            duration_seconds: 12.0,
        }
    }

    fn create_test_report() -> Report {
        Report {
            metadata: create_test_metadata(),
            concepts: vec![ConceptSummary {
                concept_id: "concept-1".to_string(),
                concept: "Crust texture".to_string(),
                criteria: "Does the text discuss crust texture?".to_string(),
                summary: Some("Crispness matters".to_string()),
                prevalence: 0.6,
                n_matches: 3,
                total_docs: 5,
                highlights: vec!["crispy all the way".to_string()],
            }],
            docs_per_concept: vec![ConceptDocCount {
                concept_name: "Crust texture".to_string(),
                n_matches: 3,
            }],
            regional: vec![ConceptRegions {
                concept_id: "concept-1".to_string(),
                concept: "Crust texture".to_string(),
                regions: vec![
                    RegionBreakdown {
                        region: "Northeast".to_string(),
                        n_matches: 2,
                        region_total: 3,
                        prevalence: 2.0 / 3.0,
                    },
                    RegionBreakdown {
                        region: "South".to_string(),
                        n_matches: 0,
                        region_total: 2,
                        prevalence: 0.0,
                    },
                ],
            }],
            notices: Vec::new(),
        }
    }

    #[test]
    fn test_generate_markdown_report() {
        let report = create_test_report();
        let markdown = generate_markdown_report(&report);

        assert!(markdown.contains("# Theme Report"));
        assert!(markdown.contains("## Metadata"));
        assert!(markdown.contains("## Induced Themes"));
        assert!(markdown.contains("### Crust texture"));
        assert!(markdown.contains("**Prevalence:** 60.0% | **# Docs:** 3 of 5"));
        assert!(markdown.contains("> crispy all the way"));
        assert!(markdown.contains("| Crust texture | 3 |"));
        assert!(markdown.contains("| Northeast | 2 | 3 | 66.7 |"));
        assert!(markdown.contains("| South | 0 | 2 | 0.0 |"));
    }

    #[test]
    fn test_generate_metadata_section() {
        let section = generate_metadata_section(&create_test_metadata());

        assert!(section.contains("data/pizza_interviews.json"));
        assert!(section.contains("q1_response, q2_response"));
        assert!(section.contains("**Regions:** Northeast"));
        assert!(section.contains("**Seed:** taste"));
    }

    #[test]
    fn test_empty_states() {
        let mut report = create_test_report();
        report.concepts.clear();
        report.docs_per_concept.clear();
        report.regional.clear();
        report.notices = vec![Notice::NoConcepts];

        let markdown = generate_markdown_report(&report);
        assert!(markdown.contains("No concepts returned."));
        assert!(markdown.contains("No themes to display."));
        assert!(markdown.contains("No matched documents at the current threshold."));
        assert!(markdown.contains("No matches to display per region yet."));
    }

    #[test]
    fn test_theme_card_hides_blank_summary_and_criteria() {
        let mut concept = create_test_report().concepts.remove(0);
        concept.summary = Some("  ".to_string());
        concept.criteria = String::new();

        let card = generate_theme_card(&concept);
        assert!(card.starts_with("### Crust texture\n\n**Prevalence:**"));
        assert!(!card.contains("Inclusion criteria"));
    }

    #[test]
    fn test_generate_json_report() {
        let report = create_test_report();
        let json = generate_json_report(&report).unwrap();

        assert!(json.contains("\"concepts\""));
        assert!(json.contains("\"regional\""));
        assert!(json.contains("\"region_total\""));
    }
}
