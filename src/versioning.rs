//! Naming and numbering of network snapshots and per-stage artifacts.
//!
//! Every artifact of a stage shares the stem `{index}_{group}_{label}`
//! (`{index}_{label}` outside group stages). The index is a counter over
//! committed stage snapshots; the bootstrap snapshot `0_base` is not counted.

use crate::config::GroupMode;
use std::fmt;

pub const BOOTSTRAP_LABEL: &str = "base";
pub const SEQUENCE_LABEL: &str = "gapfilling_blastp";
pub const GROUP_LABEL: &str = "gapfilling_enrichment";
pub const FILL_LABEL: &str = "gapfilling_fill";
pub const EXCLUDE_LABEL: &str = "gapfilling_no_enrichment";

const STAGE_LABELS: [&str; 4] = [SEQUENCE_LABEL, GROUP_LABEL, FILL_LABEL, EXCLUDE_LABEL];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkFormat {
    /// Structured format, input of curation.
    Padmet,
    /// Exchange format, input of the solver.
    Sbml,
}

impl NetworkFormat {
    pub fn ext(self) -> &'static str {
        match self {
            Self::Padmet => ".padmet",
            Self::Sbml => ".sbml",
        }
    }

    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Padmet => "PADMET",
            Self::Sbml => "SBML",
        }
    }
}

/// The logical step a stage run belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StageKind {
    SequenceEvidence,
    Group(String),
    CommitRemainder,
    ExcludeEnrichment,
}

impl StageKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::SequenceEvidence => SEQUENCE_LABEL,
            Self::Group(_) => GROUP_LABEL,
            Self::CommitRemainder => FILL_LABEL,
            Self::ExcludeEnrichment => EXCLUDE_LABEL,
        }
    }

    pub fn group(&self) -> Option<&str> {
        match self {
            Self::Group(name) => Some(name),
            _ => None,
        }
    }

    /// Message written in the `Comment` column of every reaction kept by
    /// this stage. `None` leaves the solver's rows untouched.
    pub fn provenance(&self) -> Option<String> {
        match self {
            Self::SequenceEvidence => Some("Gap-filling BlastP hit".to_string()),
            Self::Group(name) => Some(group_provenance(name)),
            Self::CommitRemainder | Self::ExcludeEnrichment => None,
        }
    }
}

pub fn group_provenance(group: &str) -> String {
    format!("Potential {group} source")
}

/// Group name encoded in a provenance message, if it names a group stage.
pub fn group_from_provenance(message: &str) -> Option<&str> {
    message
        .trim()
        .strip_prefix("Potential ")
        .and_then(|rest| rest.strip_suffix(" source"))
        .filter(|group| !group.is_empty())
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SequenceEvidence => f.write_str("BLASTP"),
            Self::Group(name) => write!(f, "ENRICHMENT {name}"),
            Self::CommitRemainder => f.write_str("FILL"),
            Self::ExcludeEnrichment => f.write_str("EXCLUDE ENRICHMENT"),
        }
    }
}

/// Parsed `{index}_{group?}_{label}` stem.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArtifactName {
    pub index: u32,
    pub group: Option<String>,
    pub label: String,
}

impl ArtifactName {
    pub fn bootstrap() -> Self {
        Self {
            index: 0,
            group: None,
            label: BOOTSTRAP_LABEL.to_string(),
        }
    }

    pub fn for_stage(index: u32, kind: &StageKind) -> Self {
        Self {
            index,
            group: kind.group().map(str::to_string),
            label: kind.label().to_string(),
        }
    }

    pub fn parse(stem: &str) -> Option<Self> {
        let (index, rest) = stem.split_once('_')?;
        let index = index.parse::<u32>().ok()?;
        if rest.is_empty() {
            return None;
        }
        if STAGE_LABELS.contains(&rest) {
            return Some(Self {
                index,
                group: None,
                label: rest.to_string(),
            });
        }
        for label in STAGE_LABELS {
            if let Some(group) = rest.strip_suffix(label).and_then(|g| g.strip_suffix('_')) {
                if !group.is_empty() {
                    return Some(Self {
                        index,
                        group: Some(group.to_string()),
                        label: label.to_string(),
                    });
                }
            }
        }
        Some(Self {
            index,
            group: None,
            label: rest.to_string(),
        })
    }

    pub fn stem(&self) -> String {
        match &self.group {
            Some(group) => format!("{}_{}_{}", self.index, group, self.label),
            None => format!("{}_{}", self.index, self.label),
        }
    }

    pub fn is_bootstrap(&self) -> bool {
        self.index == 0 && self.label == BOOTSTRAP_LABEL
    }

    pub fn kind(&self) -> Option<StageKind> {
        match (self.label.as_str(), &self.group) {
            (SEQUENCE_LABEL, None) => Some(StageKind::SequenceEvidence),
            (GROUP_LABEL, Some(group)) => Some(StageKind::Group(group.clone())),
            (FILL_LABEL, None) => Some(StageKind::CommitRemainder),
            (EXCLUDE_LABEL, None) => Some(StageKind::ExcludeEnrichment),
            _ => None,
        }
    }

    pub fn matches(&self, kind: &StageKind) -> bool {
        self.label == kind.label() && self.group.as_deref() == kind.group()
    }
}

impl fmt::Display for ArtifactName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.stem())
    }
}

/// `1 + count(committed stage snapshots)`.
pub fn next_index(existing_snapshots: &[ArtifactName]) -> u32 {
    let committed = existing_snapshots.iter().filter(|s| s.index > 0).count();
    1 + committed as u32
}

/// Index of an already-addressed stage, or a newly allocated one.
///
/// `recorded` holds the names of stages that produced intermediate artifacts
/// without committing a snapshot, so a stage that stopped early keeps its
/// address on a re-run.
pub fn resolve_index_for(
    kind: &StageKind,
    existing_snapshots: &[ArtifactName],
    recorded: &[ArtifactName],
) -> u32 {
    existing_snapshots
        .iter()
        .chain(recorded.iter())
        .find(|name| name.index > 0 && name.matches(kind))
        .map(|name| name.index)
        .unwrap_or_else(|| next_index(existing_snapshots))
}

/// Picks the snapshot a stage at `index` builds on among `available`
/// (snapshots whose both formats exist).
pub fn select_predecessor<'a>(
    kind: &StageKind,
    index: u32,
    mode: GroupMode,
    available: &'a [ArtifactName],
) -> Option<&'a ArtifactName> {
    available
        .iter()
        .filter(|name| name.index < index)
        .filter(|name| !name.matches(kind))
        .filter(|name| match kind {
            StageKind::ExcludeEnrichment => {
                name.is_bootstrap() || name.kind() == Some(StageKind::SequenceEvidence)
            }
            StageKind::Group(_) | StageKind::CommitRemainder => {
                name.label != EXCLUDE_LABEL
                    && (mode == GroupMode::Sequential || name.label != GROUP_LABEL)
            }
            StageKind::SequenceEvidence => name.label != EXCLUDE_LABEL,
        })
        .filter(|name| name.is_bootstrap() || name.kind().is_some())
        .max_by_key(|name| name.index)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(stem: &str) -> ArtifactName {
        ArtifactName::parse(stem).unwrap()
    }

    #[test]
    fn stems_round_trip_with_and_without_group() {
        let blastp = ArtifactName::for_stage(1, &StageKind::SequenceEvidence);
        assert_eq!(blastp.stem(), "1_gapfilling_blastp");
        let group = ArtifactName::for_stage(3, &StageKind::Group("Group_A".to_string()));
        assert_eq!(group.stem(), "3_Group_A_gapfilling_enrichment");
        assert_eq!(name("3_Group_A_gapfilling_enrichment"), group);
        assert_eq!(name("0_base"), ArtifactName::bootstrap());
        assert_eq!(name("5_gapfilling_no_enrichment").kind(), Some(StageKind::ExcludeEnrichment));
        assert_eq!(ArtifactName::parse("base"), None);
        assert_eq!(ArtifactName::parse("x_gapfilling_fill"), None);
    }

    #[test]
    fn next_index_counts_committed_stage_snapshots() {
        assert_eq!(next_index(&[]), 1);
        assert_eq!(next_index(&[ArtifactName::bootstrap()]), 1);
        let existing = vec![
            ArtifactName::bootstrap(),
            name("1_gapfilling_blastp"),
            name("2_Group1_gapfilling_enrichment"),
        ];
        assert_eq!(next_index(&existing), 3);
    }

    #[test]
    fn re_addressing_returns_existing_index() {
        let existing = vec![
            ArtifactName::bootstrap(),
            name("1_gapfilling_blastp"),
            name("2_Group1_gapfilling_enrichment"),
        ];
        let group1 = StageKind::Group("Group1".to_string());
        let group2 = StageKind::Group("Group2".to_string());
        assert_eq!(resolve_index_for(&StageKind::SequenceEvidence, &existing, &[]), 1);
        assert_eq!(resolve_index_for(&group1, &existing, &[]), 2);
        assert_eq!(resolve_index_for(&group2, &existing, &[]), 3);
        assert_eq!(resolve_index_for(&StageKind::CommitRemainder, &existing, &[]), 3);

        let recorded = vec![name("3_gapfilling_fill")];
        assert_eq!(resolve_index_for(&StageKind::CommitRemainder, &existing, &recorded), 3);
    }

    #[test]
    fn predecessor_follows_group_mode() {
        let available = vec![
            ArtifactName::bootstrap(),
            name("1_gapfilling_blastp"),
            name("2_Group1_gapfilling_enrichment"),
            name("3_Group2_gapfilling_enrichment"),
        ];
        let group3 = StageKind::Group("Group3".to_string());

        let seq = select_predecessor(&group3, 4, GroupMode::Sequential, &available).unwrap();
        assert_eq!(seq.stem(), "3_Group2_gapfilling_enrichment");
        let par = select_predecessor(&group3, 4, GroupMode::Parallel, &available).unwrap();
        assert_eq!(par.stem(), "1_gapfilling_blastp");

        let fill = select_predecessor(&StageKind::CommitRemainder, 4, GroupMode::Parallel, &available)
            .unwrap();
        assert_eq!(fill.stem(), "1_gapfilling_blastp");

        let exclude =
            select_predecessor(&StageKind::ExcludeEnrichment, 5, GroupMode::Sequential, &available)
                .unwrap();
        assert_eq!(exclude.stem(), "1_gapfilling_blastp");

        // A committed group stage re-run still sees its own predecessor.
        let group2 = StageKind::Group("Group2".to_string());
        let rerun = select_predecessor(&group2, 3, GroupMode::Sequential, &available).unwrap();
        assert_eq!(rerun.stem(), "2_Group1_gapfilling_enrichment");

        assert_eq!(
            select_predecessor(&StageKind::SequenceEvidence, 1, GroupMode::Sequential, &[]),
            None
        );
    }

    #[test]
    fn provenance_messages() {
        assert_eq!(
            StageKind::SequenceEvidence.provenance().as_deref(),
            Some("Gap-filling BlastP hit")
        );
        let group = StageKind::Group("Group1".to_string());
        assert_eq!(group.provenance().as_deref(), Some("Potential Group1 source"));
        assert_eq!(group_from_provenance("Potential Group1 source"), Some("Group1"));
        assert_eq!(group_from_provenance("Gap-filling BlastP hit"), None);
        assert_eq!(StageKind::CommitRemainder.provenance(), None);
    }
}
