use std::collections::BTreeSet;

use super::results_table::ResultsBundle;
use crate::model::{BoothTotalRecord, BoothVoteRecord, PollingStationRecord};

/// Run-wide output collections. Appends only; ordering follows document order.
#[derive(Debug, Default)]
pub(crate) struct Aggregator {
    pub booths: Vec<PollingStationRecord>,
    pub candidate_keys: BTreeSet<String>,
    pub booth_votes: Vec<BoothVoteRecord>,
    pub booth_totals: Vec<BoothTotalRecord>,
}

impl Aggregator {
    pub(crate) fn add_roster(&mut self, records: Vec<PollingStationRecord>) {
        self.booths.extend(records);
    }

    pub(crate) fn add_results(&mut self, bundle: ResultsBundle) {
        self.candidate_keys.extend(bundle.candidate_keys());
        self.booth_votes.extend(bundle.booth_votes);
        self.booth_totals.extend(bundle.booth_totals);
    }

    /// Appends a partition accumulated elsewhere, keeping `other` after `self`.
    pub(crate) fn merge(&mut self, other: Aggregator) {
        self.booths.extend(other.booths);
        self.candidate_keys.extend(other.candidate_keys);
        self.booth_votes.extend(other.booth_votes);
        self.booth_totals.extend(other.booth_totals);
    }
}
