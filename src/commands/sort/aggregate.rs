use std::collections::HashMap;

use crate::model::{Group, PageRecord, RunCounts};

/// Collects matched pages into per-key groups, preserving insertion
/// order, and accumulates the per-run counters.
pub struct Aggregator {
    groups: Vec<Group>,
    index_by_key: HashMap<String, usize>,
    counts: RunCounts,
}

impl Aggregator {
    pub fn new() -> Self {
        Self {
            groups: Vec::new(),
            index_by_key: HashMap::new(),
            counts: RunCounts::default(),
        }
    }

    pub fn page_scanned(&mut self) {
        self.counts.pages_scanned += 1;
    }

    pub fn file_processed(&mut self) {
        self.counts.files_processed += 1;
    }

    pub fn file_failed(&mut self) {
        self.counts.failed_files += 1;
    }

    /// Appends a matched page to its group, creating the group on first
    /// sight. Group membership is case-insensitive on the key; the
    /// display key keeps the first-seen casing. Pages without a matched
    /// key are ignored.
    pub fn record(&mut self, page: PageRecord) {
        let Some(key) = page.matched_key.clone() else {
            return;
        };

        self.counts.pages_matched += 1;

        let lookup = key.to_uppercase();
        match self.index_by_key.get(&lookup) {
            Some(&index) => self.groups[index].pages.push(page),
            None => {
                self.index_by_key.insert(lookup, self.groups.len());
                self.groups.push(Group {
                    key,
                    pages: vec![page],
                });
            }
        }
    }

    pub fn finish(mut self) -> (Vec<Group>, RunCounts) {
        self.counts.distinct_groups = self.groups.len();
        (self.groups, self.counts)
    }
}
