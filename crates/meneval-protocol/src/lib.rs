//! Machine-readable contracts shared between the meneval pipeline and the
//! tools that consume its artifacts.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Result document written by the gap-filling solver for one stage.
///
/// Keys follow the solver's JSON output; keys not listed here are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GapfillResult {
    #[serde(rename = "Unproducible targets", default)]
    pub unproducible_targets: Vec<String>,
    #[serde(rename = "Unreconstructable targets", default)]
    pub unreconstructable_targets: Vec<String>,
    #[serde(rename = "Reconstructable targets", default)]
    pub reconstructable_targets: Vec<String>,
    #[serde(rename = "Essential reactions", default)]
    pub essential_reactions: BTreeMap<String, Vec<String>>,
    #[serde(rename = "One minimal completion", default)]
    pub one_minimal_completion: Vec<String>,
    #[serde(rename = "Intersection of cardinality minimal completions", default)]
    pub intersection_of_minimal_completions: Vec<String>,
    #[serde(rename = "Union of cardinality minimal completions", default)]
    pub union_of_minimal_completions: Vec<String>,
}

impl GapfillResult {
    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// True when every target is already producible from the seeds.
    pub fn has_remaining_targets(&self) -> bool {
        !self.unproducible_targets.is_empty()
    }

    /// Reactions essential for at least one target, deduplicated.
    pub fn essential_reaction_set(&self) -> BTreeSet<String> {
        self.essential_reactions
            .values()
            .flat_map(|reactions| reactions.iter().cloned())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlignmentMethod {
    /// Protein query against the species proteome.
    Blastp,
    /// Protein query against the translated species genome.
    Tblastn,
}

impl AlignmentMethod {
    pub fn label(self) -> &'static str {
        match self {
            Self::Blastp => "Blastp",
            Self::Tblastn => "TBlastn",
        }
    }
}

impl fmt::Display for AlignmentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One tabular (`-outfmt 6`) alignment hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentHit {
    pub subject_id: String,
    pub evalue: f64,
    pub bit_score: f64,
    pub identity: f64,
    pub length: u64,
    pub method: AlignmentMethod,
}

/// Presence of one reaction across the organisms of a reference group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReactionPresence {
    pub reaction: String,
    pub count: usize,
    pub fraction: f64,
    pub organisms: BTreeSet<String>,
}

impl ReactionPresence {
    pub fn percent(&self) -> f64 {
        (self.fraction * 10_000.0).round() / 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_solver_document_and_ignores_unknown_keys() {
        let text = r#"{
            "Draft network file": "0_base.sbml",
            "Unproducible targets": ["M_LYS_c"],
            "Reconstructable targets": ["M_LYS_c"],
            "Essential reactions": {"M_LYS_c": ["R_RXN__45__1", "R_RXN__45__2"], "M_ARG_c": ["R_RXN__45__2"]},
            "Union of cardinality minimal completions": ["R_RXN__45__1", "R_RXN__45__2", "R_RXN__45__3"]
        }"#;
        let result = GapfillResult::from_json_str(text).unwrap();
        assert!(result.has_remaining_targets());
        assert!(result.unreconstructable_targets.is_empty());
        assert_eq!(result.union_of_minimal_completions.len(), 3);
        let essential = result.essential_reaction_set();
        assert_eq!(essential.len(), 2);
        assert!(essential.contains("R_RXN__45__2"));
    }

    #[test]
    fn empty_unproducible_list_means_nothing_to_fill() {
        let result = GapfillResult::from_json_str(r#"{"Unproducible targets": []}"#).unwrap();
        assert!(!result.has_remaining_targets());
    }

    #[test]
    fn presence_percent_is_rounded_to_two_decimals() {
        let presence = ReactionPresence {
            reaction: "R1".to_string(),
            count: 1,
            fraction: 1.0 / 3.0,
            organisms: BTreeSet::from(["a".to_string()]),
        };
        assert_eq!(presence.percent(), 33.33);
    }
}
