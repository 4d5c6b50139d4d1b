//! Demographic filtering.

use crate::models::ParticipantRecord;
use std::collections::BTreeSet;

/// Optional membership criteria. An empty list imposes no restriction;
/// supplied criteria compose conjunctively.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DemographicFilter {
    pub regions: Vec<String>,
    pub ages: Vec<u32>,
    pub incomes: Vec<String>,
    pub diets: Vec<String>,
}

impl DemographicFilter {
    /// True when no criterion is set.
    pub fn is_unrestricted(&self) -> bool {
        self.regions.is_empty()
            && self.ages.is_empty()
            && self.incomes.is_empty()
            && self.diets.is_empty()
    }

    /// Whether a single record satisfies every supplied criterion.
    pub fn matches(&self, record: &ParticipantRecord) -> bool {
        let d = &record.demographics;

        member(&self.regions, d.region_of_residence.as_ref())
            && member(&self.ages, d.age.as_ref())
            && member(&self.incomes, d.income.as_ref())
            && member(&self.diets, d.food_restrictions.as_ref())
    }

    /// Return the matching subset, preserving input order.
    pub fn apply(&self, records: &[ParticipantRecord]) -> Vec<ParticipantRecord> {
        records
            .iter()
            .filter(|r| self.matches(r))
            .cloned()
            .collect()
    }
}

fn member<T: PartialEq>(allowed: &[T], value: Option<&T>) -> bool {
    if allowed.is_empty() {
        return true;
    }
    value.map(|v| allowed.contains(v)).unwrap_or(false)
}

/// Sorted, de-duplicated regions present in `records`.
pub fn distinct_regions(records: &[ParticipantRecord]) -> Vec<String> {
    records
        .iter()
        .filter_map(|r| r.demographics.region_of_residence.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
