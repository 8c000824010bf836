//! Evidence filters deciding which proposed reactions enter the next network.
//!
//! Every filter receives the candidate reactions of one stage and returns the
//! subset it keeps, together with the message recorded as their provenance.

pub mod groups;
pub mod sequence;

use crate::error::Result;
use itertools::Itertools;
use std::collections::{BTreeMap, BTreeSet};

pub use groups::{GroupEvidence, PresenceTable};
pub use sequence::{EvidenceRecord, ProteinLibrary, SequenceEvidence};

/// Reactions kept by one filter run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilteredReactionSet {
    pub kept: BTreeSet<String>,
    /// Written in the `Comment` column of every kept row; `None` leaves the
    /// rows as the solver produced them.
    pub provenance: Option<String>,
    /// Genes supporting each kept reaction, if the filter found any.
    pub genes: BTreeMap<String, BTreeSet<String>>,
}

impl FilteredReactionSet {
    pub fn len(&self) -> usize {
        self.kept.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kept.is_empty()
    }

    /// `(g1) or (g2)` for `reaction`, empty without genes.
    pub fn gene_association(&self, reaction: &str) -> String {
        self.genes
            .get(reaction)
            .map(|genes| genes.iter().map(|g| format!("({g})")).join(" or "))
            .unwrap_or_default()
    }
}

pub trait EvidenceFilter {
    /// Short name used in the log banners.
    fn name(&self) -> String;

    /// Keeps a subset of `candidates`.
    fn filter(&self, candidates: &[String]) -> Result<FilteredReactionSet>;
}

/// Keeps every candidate and leaves its row untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl EvidenceFilter for Passthrough {
    fn name(&self) -> String {
        "FILL".to_string()
    }

    fn filter(&self, candidates: &[String]) -> Result<FilteredReactionSet> {
        Ok(FilteredReactionSet {
            kept: candidates.iter().cloned().collect(),
            provenance: None,
            genes: BTreeMap::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_keeps_everything_without_provenance() {
        let candidates = vec!["RXN-1".to_string(), "RXN-2".to_string()];
        let filtered = Passthrough.filter(&candidates).unwrap();
        assert_eq!(filtered.len(), 2);
        assert_eq!(filtered.provenance, None);
        assert_eq!(filtered.gene_association("RXN-1"), "");
    }
}
