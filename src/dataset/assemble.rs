//! Text assembly: one document per participant from selected responses.

use super::RESPONSE_COLS;
use crate::error::ExplorerError;
use crate::models::{Document, ParticipantRecord};
use std::fmt;
use tracing::debug;

/// One of the five free-text response fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseField {
    Q1,
    Q2,
    Q3,
    Q4,
    Q5,
}

impl ResponseField {
    pub const ALL: [ResponseField; 5] = [
        ResponseField::Q1,
        ResponseField::Q2,
        ResponseField::Q3,
        ResponseField::Q4,
        ResponseField::Q5,
    ];

    /// Position in `ParticipantRecord::responses`.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Dataset column name.
    pub fn column(self) -> &'static str {
        RESPONSE_COLS[self.index()]
    }

    pub fn from_column(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.column() == name.trim())
    }
}

impl fmt::Display for ResponseField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// Parse an ordered selection of column names.
///
/// Fails on an empty selection or an unknown name. Repeated names keep
/// their first position.
pub fn parse_selection<S: AsRef<str>>(names: &[S]) -> Result<Vec<ResponseField>, ExplorerError> {
    let mut selection: Vec<ResponseField> = Vec::with_capacity(names.len());

    for name in names {
        let name = name.as_ref();
        let field = ResponseField::from_column(name)
            .ok_or_else(|| ExplorerError::UnknownQuestion(name.to_string()))?;
        if !selection.contains(&field) {
            selection.push(field);
        }
    }

    if selection.is_empty() {
        return Err(ExplorerError::NoQuestionsSelected);
    }

    Ok(selection)
}

/// Join the selected non-blank responses with single spaces and trim.
pub fn assemble_text(record: &ParticipantRecord, selection: &[ResponseField]) -> String {
    selection
        .iter()
        .filter_map(|f| record.responses[f.index()].as_deref())
        .filter(|r| !r.trim().is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

/// Build documents from a filtered table, dropping rows with no text.
pub fn build_documents(
    records: &[ParticipantRecord],
    selection: &[ResponseField],
) -> Result<Vec<Document>, ExplorerError> {
    if selection.is_empty() {
        return Err(ExplorerError::NoQuestionsSelected);
    }

    let documents: Vec<Document> = records
        .iter()
        .filter_map(|record| {
            let text = assemble_text(record, selection);
            if text.is_empty() {
                return None;
            }
            Some(Document {
                doc_id: record.participant_id.clone(),
                text,
                demographics: record.demographics.clone(),
            })
        })
        .collect();

    debug!(
        "Assembled {} documents from {} rows ({} dropped as empty)",
        documents.len(),
        records.len(),
        records.len() - documents.len()
    );

    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::test_support::participant;
    use std::collections::HashSet;

    #[test]
    fn test_parse_selection() {
        let selection = parse_selection(&["q2_response", "q1_response", "q2_response"]).unwrap();
        assert_eq!(selection, vec![ResponseField::Q2, ResponseField::Q1]);
    }

    #[test]
    fn test_parse_selection_rejects_empty_and_unknown() {
        let empty: [&str; 0] = [];
        assert!(matches!(
            parse_selection(&empty),
            Err(ExplorerError::NoQuestionsSelected)
        ));
        assert!(matches!(
            parse_selection(&["q6_response"]),
            Err(ExplorerError::UnknownQuestion(name)) if name == "q6_response"
        ));
    }

    #[test]
    fn test_blank_first_field_is_skipped() {
        let records = vec![participant(
            "7",
            "West",
            [Some("   "), Some("Loved it"), None, None, None],
        )];

        let docs = build_documents(&records, &[ResponseField::Q1, ResponseField::Q2]).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].text, "Loved it");
        assert_eq!(docs[0].doc_id, "7");
    }

    #[test]
    fn test_all_blank_row_is_dropped() {
        let records = vec![
            participant("1", "West", [Some(""), None, None, None, None]),
            participant("2", "West", [Some("Crispy"), None, None, None, None]),
        ];

        let docs = build_documents(&records, &[ResponseField::Q1, ResponseField::Q2]).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].doc_id, "2");
    }

    #[test]
    fn test_selection_order_is_respected() {
        let record = participant("1", "South", [Some("first"), None, Some(" third "), None, None]);
        let text = assemble_text(&record, &[ResponseField::Q3, ResponseField::Q1]);
        assert_eq!(text, "third  first");
    }

    #[test]
    fn test_documents_carry_demographics_and_unique_ids() {
        let records = vec![
            participant("1", "Northeast", [Some("a"), None, None, None, None]),
            participant("2", "South", [Some("b"), None, None, None, None]),
            participant("3", "South", [Some("c"), None, None, None, None]),
        ];

        let docs = build_documents(&records, &[ResponseField::Q1]).unwrap();
        let ids: HashSet<_> = docs.iter().map(|d| d.doc_id.as_str()).collect();
        assert_eq!(ids.len(), docs.len());
        assert_eq!(docs[1].region(), Some("South"));
        assert_eq!(docs[0].demographics, records[0].demographics);
    }

    #[test]
    fn test_build_documents_requires_selection() {
        let records = vec![participant("1", "South", [Some("a"), None, None, None, None])];
        assert!(build_documents(&records, &[]).is_err());
    }
}
