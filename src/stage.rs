//! One gap-filling stage: solve against the predecessor network, filter the
//! proposed reactions and commit the kept ones into a new snapshot.
//!
//! Each step is skipped when its artifact already exists, so a stage that
//! completed is a no-op and an interrupted one resumes where it stopped.

use crate::{
    config::PipelineConfig,
    error::{MenevalError, Result},
    evidence::EvidenceFilter,
    fsutil::check_file_creation,
    layout::{Layout, SnapshotPaths, StageArtifacts},
    table::{drop_reactions, read_candidates, write_filtered},
    tools::{CurationRequest, EnhanceRequest, NetworkToolkit, SolverRequest},
    versioning::{ArtifactName, StageKind, resolve_index_for, select_predecessor},
};
use meneval_protocol::GapfillResult;
use std::{collections::BTreeSet, fmt, fs, path::Path};

pub const MERGE_TOOL: &str = "MENECO";
pub const MERGE_CATEGORY: &str = "GAP-FILLING";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    LocatePredecessor,
    RunSolver,
    CheckRemainingTargets,
    ConvertResult,
    ApplyFilter,
    MergeReactions,
    ExportSnapshot,
    Done,
}

impl fmt::Display for StageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::LocatePredecessor => "locate predecessor",
            Self::RunSolver => "meneco run",
            Self::CheckRemainingTargets => "check remaining targets",
            Self::ConvertResult => "tsv creation",
            Self::ApplyFilter => "validation",
            Self::MergeReactions => "adding reactions to network",
            Self::ExportSnapshot => "convert Padmet to SBML",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    Committed(SnapshotPaths),
    /// Every target was already producible: nothing filtered or merged.
    NoRemainingTargets,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReport {
    pub stage: StageKind,
    pub index: u32,
    pub outcome: StageOutcome,
    /// Steps skipped because their artifact existed.
    pub resumed: Vec<StageState>,
    /// Reactions kept by the filter, when it ran in this invocation.
    pub kept: Option<usize>,
}

impl StageReport {
    pub fn is_noop(&self) -> bool {
        self.kept.is_none()
            && [
                StageState::RunSolver,
                StageState::ConvertResult,
                StageState::ApplyFilter,
                StageState::MergeReactions,
                StageState::ExportSnapshot,
            ]
            .iter()
            .all(|state| self.resumed.contains(state))
    }
}

pub struct StageRunner<'a> {
    config: &'a PipelineConfig,
    layout: &'a Layout,
    toolkit: &'a dyn NetworkToolkit,
}

struct StageRun<'r> {
    kind: &'r StageKind,
    name: ArtifactName,
    artifacts: StageArtifacts,
    snapshot: SnapshotPaths,
    predecessor: Option<SnapshotPaths>,
    resumed: Vec<StageState>,
    kept: Option<usize>,
    outcome: Option<StageOutcome>,
}

impl StageRun<'_> {
    fn predecessor(&self) -> Result<&SnapshotPaths> {
        self.predecessor
            .as_ref()
            .ok_or_else(|| MenevalError::NoPredecessor {
                stage: self.kind.to_string(),
            })
    }

    fn skip(&mut self, state: StageState, artifact: &Path) {
        tracing::info!("{} file found, passing {state}.", artifact.display());
        self.resumed.push(state);
    }
}

impl<'a> StageRunner<'a> {
    pub fn new(
        config: &'a PipelineConfig,
        layout: &'a Layout,
        toolkit: &'a dyn NetworkToolkit,
    ) -> Self {
        Self {
            config,
            layout,
            toolkit,
        }
    }

    /// Runs `kind` to completion. Reactions of `exclude` never reach the
    /// merged network.
    pub fn run(
        &self,
        kind: &StageKind,
        filter: &dyn EvidenceFilter,
        exclude: &BTreeSet<String>,
    ) -> Result<StageReport> {
        let snapshots = self.layout.list_snapshots()?;
        let recorded = self.layout.list_solver_results()?;
        let index = resolve_index_for(kind, &snapshots, &recorded);
        let name = ArtifactName::for_stage(index, kind);
        let mut run = StageRun {
            kind,
            artifacts: self.layout.stage_artifacts(&name),
            snapshot: self.layout.snapshot(&name),
            name,
            predecessor: None,
            resumed: vec![],
            kept: None,
            outcome: None,
        };

        tracing::info!(
            "{eq}\n\tSTEP {index} : MENECO + {kind} VALIDATION\n{eq}\n",
            eq = "=".repeat(50)
        );
        let mut state = StageState::LocatePredecessor;
        while state != StageState::Done {
            state = self.step(state, &mut run, filter, exclude)?;
        }
        tracing::info!("\n-----------\nStep {index} Done\n");

        Ok(StageReport {
            stage: kind.clone(),
            index,
            outcome: run
                .outcome
                .unwrap_or_else(|| StageOutcome::Committed(run.snapshot.clone())),
            resumed: run.resumed,
            kept: run.kept,
        })
    }

    fn step(
        &self,
        state: StageState,
        run: &mut StageRun,
        filter: &dyn EvidenceFilter,
        exclude: &BTreeSet<String>,
    ) -> Result<StageState> {
        let section = |title: &str| tracing::info!("\n{title} :\n{}\n", "-".repeat(40));
        match state {
            StageState::LocatePredecessor => {
                let available: Vec<ArtifactName> = self
                    .layout
                    .list_snapshots()?
                    .into_iter()
                    .filter(|name| self.layout.snapshot(name).exists())
                    .collect();
                let predecessor =
                    select_predecessor(run.kind, run.name.index, self.config.group_mode, &available)
                        .ok_or_else(|| MenevalError::NoPredecessor {
                            stage: run.kind.to_string(),
                        })?;
                tracing::info!("Previous network : {predecessor}");
                run.predecessor = Some(self.layout.snapshot(predecessor));
                Ok(StageState::RunSolver)
            }
            StageState::RunSolver => {
                section("Running Meneco");
                let output = run.artifacts.solver_json.clone();
                if output.exists() {
                    run.skip(state, &output);
                } else {
                    let predecessor = run.predecessor()?;
                    self.toolkit.solve(&SolverRequest {
                        draft: &predecessor.sbml,
                        seeds: &self.layout.seeds_artefacts_sbml(),
                        targets: &self.layout.targets_sbml(),
                        repair: &self.layout.database_sbml(),
                        output: &output,
                    })?;
                    check_file_creation(&output)?;
                }
                Ok(StageState::CheckRemainingTargets)
            }
            StageState::CheckRemainingTargets => {
                let text = fs::read_to_string(&run.artifacts.solver_json)?;
                let result = GapfillResult::from_json_str(&text)?;
                if result.has_remaining_targets() {
                    Ok(StageState::ConvertResult)
                } else {
                    tracing::info!("No unproducible targets left, nothing to fill at step {}", run.name);
                    run.outcome = Some(StageOutcome::NoRemainingTargets);
                    Ok(StageState::Done)
                }
            }
            StageState::ConvertResult => {
                section("Create Meneco tsv output");
                let output = run.artifacts.solver_tsv.clone();
                if output.exists() {
                    run.skip(state, &output);
                } else {
                    self.toolkit.enhance_result(&EnhanceRequest {
                        result: &run.artifacts.solver_json,
                        reference: &self.layout.require_database_padmet()?,
                        output: &output,
                    })?;
                    check_file_creation(&output)?;
                }
                Ok(StageState::ApplyFilter)
            }
            StageState::ApplyFilter => {
                section(&format!("Running {} validation step", filter.name()));
                let output = run.artifacts.filtered_tsv.clone();
                if output.exists() {
                    run.skip(state, &output);
                } else {
                    let candidates = read_candidates(&run.artifacts.solver_tsv)?;
                    let mut filtered = filter.filter(&candidates)?;
                    let allowed: BTreeSet<&str> = candidates.iter().map(String::as_str).collect();
                    filtered.kept.retain(|reaction| {
                        let known = allowed.contains(reaction.as_str());
                        if !known {
                            tracing::warn!("{reaction} was not proposed by Meneco, ignored");
                        }
                        known
                    });
                    run.kept = Some(write_filtered(&run.artifacts.solver_tsv, &output, &filtered)?);
                }
                Ok(StageState::MergeReactions)
            }
            StageState::MergeReactions => {
                section("Adding reactions found to network");
                let output = run.snapshot.padmet.clone();
                if output.exists() {
                    run.skip(state, &output);
                } else {
                    let data = if exclude.is_empty() {
                        run.artifacts.filtered_tsv.clone()
                    } else {
                        let merge = run.artifacts.merge_tsv.clone();
                        let removed = drop_reactions(&run.artifacts.filtered_tsv, &merge, exclude)?;
                        tracing::info!("{removed} excluded reactions removed before merging");
                        merge
                    };
                    self.toolkit.curate(&CurationRequest {
                        network: &run.predecessor()?.padmet,
                        data: &data,
                        reference: Some(&self.layout.require_database_padmet()?),
                        output: &output,
                        tool: Some(MERGE_TOOL),
                        category: MERGE_CATEGORY,
                    })?;
                    check_file_creation(&output)?;
                }
                Ok(StageState::ExportSnapshot)
            }
            StageState::ExportSnapshot => {
                section("Convert Padmet to SBML");
                let output = run.snapshot.sbml.clone();
                if output.exists() {
                    run.skip(state, &output);
                } else {
                    self.toolkit.padmet_to_sbml(&run.snapshot.padmet, &output)?;
                    check_file_creation(&output)?;
                }
                Ok(StageState::Done)
            }
            StageState::Done => Ok(StageState::Done),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::GroupMode,
        evidence::{FilteredReactionSet, Passthrough},
        table::read_provenance,
        test_support::{FakeToolkit, bootstrapped_root, gapfill},
        versioning::group_provenance,
    };
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    /// Keeps a fixed set of reactions, including one never proposed.
    struct KeepOnly(Vec<&'static str>);

    impl EvidenceFilter for KeepOnly {
        fn name(&self) -> String {
            "ENRICHMENT Group1".to_string()
        }

        fn filter(&self, _candidates: &[String]) -> Result<FilteredReactionSet> {
            Ok(FilteredReactionSet {
                kept: self.0.iter().map(|s| s.to_string()).collect(),
                provenance: Some(group_provenance("Group1")),
                genes: BTreeMap::new(),
            })
        }
    }

    fn merged_reactions(path: &Path) -> Vec<String> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .filter_map(|l| l.strip_prefix("reaction\t"))
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn second_run_invokes_no_tool_and_keeps_its_index() {
        let td = tempdir().unwrap();
        let layout = bootstrapped_root(td.path());
        let config = PipelineConfig::with_root(td.path());
        let toolkit = FakeToolkit::answering(vec![gapfill(&["M_LYS_c"], &["R_RXN__45__1"])]);
        let runner = StageRunner::new(&config, &layout, &toolkit);

        let first = runner
            .run(&StageKind::CommitRemainder, &Passthrough, &BTreeSet::new())
            .unwrap();
        assert_eq!(first.index, 1);
        assert_eq!(first.kept, Some(1));
        assert_eq!(toolkit.calls().len(), 4);
        let StageOutcome::Committed(snapshot) = &first.outcome else {
            panic!("stage should commit");
        };
        assert_eq!(merged_reactions(&snapshot.sbml), vec!["BASE", "RXN-1"]);

        let second = runner
            .run(&StageKind::CommitRemainder, &Passthrough, &BTreeSet::new())
            .unwrap();
        assert_eq!(second.index, 1);
        assert!(second.is_noop());
        assert_eq!(toolkit.calls().len(), 4);
    }

    #[test]
    fn filter_output_is_restricted_to_candidates() {
        let td = tempdir().unwrap();
        let layout = bootstrapped_root(td.path());
        let config = PipelineConfig::with_root(td.path());
        let toolkit =
            FakeToolkit::answering(vec![gapfill(&["M_LYS_c"], &["R_RXN__45__1", "R_RXN__45__2"])]);
        let runner = StageRunner::new(&config, &layout, &toolkit);
        let kind = StageKind::Group("Group1".to_string());

        let report = runner
            .run(&kind, &KeepOnly(vec!["RXN-2", "RXN-99"]), &BTreeSet::new())
            .unwrap();
        assert_eq!(report.kept, Some(1));
        let name = ArtifactName::for_stage(report.index, &kind);
        assert_eq!(name.stem(), "1_Group1_gapfilling_enrichment");
        let rows = read_provenance(&layout.stage_artifacts(&name).filtered_tsv).unwrap();
        assert_eq!(
            rows,
            vec![("RXN-2".to_string(), "Potential Group1 source".to_string())]
        );
        assert_eq!(toolkit.count("curate"), 1);
        assert!(
            toolkit.calls().contains(&format!(
                "curate 0_base.padmet 1_Group1_gapfilling_enrichment_meneco_out_filtered.tsv {MERGE_CATEGORY}"
            ))
        );
    }

    #[test]
    fn no_remaining_targets_short_circuits() {
        let td = tempdir().unwrap();
        let layout = bootstrapped_root(td.path());
        let config = PipelineConfig::with_root(td.path());
        let toolkit = FakeToolkit::answering(vec![gapfill(&[], &[])]);
        let runner = StageRunner::new(&config, &layout, &toolkit);

        let report = runner
            .run(&StageKind::SequenceEvidence, &Passthrough, &BTreeSet::new())
            .unwrap();
        assert_eq!(report.outcome, StageOutcome::NoRemainingTargets);
        assert_eq!(report.kept, None);
        assert_eq!(toolkit.calls(), vec!["solve 0_base.sbml"]);
        let name = ArtifactName::for_stage(1, &StageKind::SequenceEvidence);
        assert!(!layout.stage_artifacts(&name).solver_tsv.exists());
        assert!(!layout.snapshot(&name).padmet.exists());

        // The short-circuited stage keeps its address.
        let again = runner
            .run(&StageKind::SequenceEvidence, &Passthrough, &BTreeSet::new())
            .unwrap();
        assert_eq!(again.index, 1);
        assert_eq!(toolkit.count("solve"), 1);
    }

    #[test]
    fn missing_bootstrap_fails_before_the_solver() {
        let td = tempdir().unwrap();
        let layout = bootstrapped_root(td.path());
        fs::remove_file(layout.bootstrap_snapshot().sbml).unwrap();
        let config = PipelineConfig::with_root(td.path());
        let toolkit = FakeToolkit::answering(vec![gapfill(&["M_LYS_c"], &["R_RXN__45__1"])]);
        let runner = StageRunner::new(&config, &layout, &toolkit);

        let err = runner
            .run(&StageKind::SequenceEvidence, &Passthrough, &BTreeSet::new())
            .unwrap_err();
        assert!(matches!(err, MenevalError::NoPredecessor { .. }));
        assert!(toolkit.calls().is_empty());
    }

    #[test]
    fn tool_without_output_is_fatal() {
        let td = tempdir().unwrap();
        let layout = bootstrapped_root(td.path());
        let config = PipelineConfig::with_root(td.path());
        let toolkit = FakeToolkit::silent();
        let runner = StageRunner::new(&config, &layout, &toolkit);

        let err = runner
            .run(&StageKind::SequenceEvidence, &Passthrough, &BTreeSet::new())
            .unwrap_err();
        assert!(matches!(err, MenevalError::ArtifactNotProduced(p) if p.ends_with("1_gapfilling_blastp_meneco.json")));
    }

    #[test]
    fn stages_chain_on_the_latest_snapshot() {
        let td = tempdir().unwrap();
        let layout = bootstrapped_root(td.path());
        let mut config = PipelineConfig::with_root(td.path());
        config.group_mode = GroupMode::Parallel;
        let toolkit = FakeToolkit::answering(vec![
            gapfill(&["M_LYS_c"], &["R_RXN__45__1"]),
            gapfill(&["M_LYS_c"], &["R_RXN__45__2"]),
            gapfill(&["M_LYS_c"], &["R_RXN__45__3"]),
        ]);
        let runner = StageRunner::new(&config, &layout, &toolkit);
        let none = BTreeSet::new();

        let group = runner
            .run(&StageKind::Group("Group1".to_string()), &Passthrough, &none)
            .unwrap();
        let fill = runner.run(&StageKind::CommitRemainder, &Passthrough, &none).unwrap();
        assert_eq!((group.index, fill.index), (1, 2));
        // Parallel groups: the fill stage roots at the bootstrap, not at the group.
        assert_eq!(toolkit.calls()[4], "solve 0_base.sbml");

        let exclude = BTreeSet::from(["RXN-3".to_string()]);
        let excluded = runner
            .run(&StageKind::ExcludeEnrichment, &Passthrough, &exclude)
            .unwrap();
        assert_eq!(excluded.index, 3);
        let StageOutcome::Committed(snapshot) = excluded.outcome else {
            panic!("stage should commit");
        };
        assert_eq!(merged_reactions(&snapshot.padmet), vec!["BASE"]);
    }
}
