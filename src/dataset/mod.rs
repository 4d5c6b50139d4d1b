//! Interview dataset handling.
//!
//! Loading, demographic filtering and text assembly: everything that turns
//! the source table into the documents sent to induction.

pub mod assemble;
pub mod filter;
pub mod loader;

pub use assemble::{build_documents, parse_selection};
pub use filter::{distinct_regions, DemographicFilter};
pub use loader::load_dataset;

use crate::models::{ParticipantRecord, SliceStats};
use std::collections::HashSet;

/// Demographic columns every dataset must carry.
pub const DEMO_COLS: [&str; 8] = [
    "participant_id",
    "age",
    "city_of_residence",
    "state_of_residence",
    "region_of_residence",
    "income",
    "pizza_consumption",
    "food_restrictions",
];

/// Free-text response columns, in question order.
pub const RESPONSE_COLS: [&str; 5] = [
    "q1_response",
    "q2_response",
    "q3_response",
    "q4_response",
    "q5_response",
];

/// Compute slice counts for a filtered table and its assembled documents.
pub fn slice_stats(slice: &[ParticipantRecord], documents: usize) -> SliceStats {
    let participants = slice
        .iter()
        .map(|r| r.participant_id.as_str())
        .collect::<HashSet<_>>()
        .len();

    SliceStats {
        participants,
        rows: slice.len(),
        documents,
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::models::{Demographics, ParticipantRecord};

    /// Build a participant with a region and the given responses.
    pub fn participant(id: &str, region: &str, responses: [Option<&str>; 5]) -> ParticipantRecord {
        ParticipantRecord {
            participant_id: id.to_string(),
            demographics: Demographics {
                age: Some(30),
                city_of_residence: Some("Springfield".to_string()),
                state_of_residence: Some("MA".to_string()),
                region_of_residence: Some(region.to_string()),
                income: Some("50-75k".to_string()),
                pizza_consumption: Some("weekly".to_string()),
                food_restrictions: Some("none".to_string()),
            },
            responses: responses.map(|r| r.map(String::from)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::participant;
    use super::*;

    #[test]
    fn test_slice_stats_counts_distinct_participants() {
        let slice = vec![
            participant("1", "South", [None; 5]),
            participant("1", "South", [None; 5]),
            participant("2", "West", [None; 5]),
        ];

        let stats = slice_stats(&slice, 2);
        assert_eq!(stats.participants, 2);
        assert_eq!(stats.rows, 3);
        assert_eq!(stats.documents, 2);
    }
}
