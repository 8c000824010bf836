//! Input/output directory tree of one pipeline root.
//!
//! ```text
//! Input/
//!   DataBase/      <db>.padmet, <prot_seq>.fasta, database.sbml (generated)
//!   Enrichment/    <group>/reactions.tsv [group_template.tsv] or <organism>.sbml
//!   Networks/      <draft>.padmet
//!   Seeds/         seeds.tsv, artefacts.tsv (+ generated forms)
//!   Species_seq/   <sp>.faa [<sp>.fna]
//!   Targets/       targets.tsv (+ generated forms)
//! Output/
//!   BlastP/ Enrichment/ Networks/{PADMET,SBML}/ Meneco/{Filtered_TSV,Json_outputs,TSV}/
//! ```

use crate::{
    error::{MenevalError, Result},
    fsutil::{ensure_dir, unique_file_with_ext},
    versioning::{ArtifactName, NetworkFormat, StageKind},
};
use std::{
    fs,
    path::{Path, PathBuf},
};

pub const INPUT_D: &str = "Input";
pub const OUTPUT_D: &str = "Output";

pub const ENRICH_D: &str = "Enrichment";
pub const DATABASE_D: &str = "DataBase";
pub const NETWORK_D: &str = "Networks";
pub const SEEDS_D: &str = "Seeds";
pub const SPECIES_D: &str = "Species_seq";
pub const TARGETS_D: &str = "Targets";
pub const BLASTP_D: &str = "BlastP";
pub const MENECO_D: &str = "Meneco";

pub const TSV_D: &str = "TSV";
pub const FILTERED_D: &str = "Filtered_TSV";
pub const TOOL_OUTPUTS_D: &str = "Json_outputs";

pub const REACTIONS_TSV: &str = "reactions.tsv";
pub const GROUPS_TSV: &str = "group_template.tsv";
pub const IN_TARGETS: &str = "targets.tsv";
pub const IN_SEEDS: &str = "seeds.tsv";
pub const IN_ARTEFACTS: &str = "artefacts.tsv";

pub const PADMET_EXT: &str = ".padmet";
pub const FASTA_EXT: &str = ".fasta";
pub const FAA_EXT: &str = ".faa";
pub const FNA_EXT: &str = ".fna";

const SOLVER_SUFFIX: &str = "_meneco.json";
const TSV_SUFFIX: &str = "_meneco_out.tsv";
const FILTERED_SUFFIX: &str = "_meneco_out_filtered.tsv";
const MERGE_SUFFIX: &str = "_meneco_out_to_add.tsv";

/// Both formats of one network snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotPaths {
    pub padmet: PathBuf,
    pub sbml: PathBuf,
}

impl SnapshotPaths {
    pub fn exists(&self) -> bool {
        self.padmet.exists() && self.sbml.exists()
    }
}

/// Per-stage intermediate artifacts of the solver and filter steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageArtifacts {
    pub solver_json: PathBuf,
    pub solver_tsv: PathBuf,
    pub filtered_tsv: PathBuf,
    pub merge_tsv: PathBuf,
}

/// Inputs of the sequence-similarity stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceInputs {
    pub database_padmet: PathBuf,
    pub protein_library: PathBuf,
    pub proteome: PathBuf,
    pub genome: Option<PathBuf>,
}

/// Inputs of one enrichment group stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupSource {
    PresenceTable {
        reactions: PathBuf,
        template: Option<PathBuf>,
    },
    Networks {
        networks: Vec<PathBuf>,
        template: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn input(&self) -> PathBuf {
        self.root.join(INPUT_D)
    }

    pub fn output(&self) -> PathBuf {
        self.root.join(OUTPUT_D)
    }

    pub fn database_dir(&self) -> PathBuf {
        self.input().join(DATABASE_D)
    }

    pub fn enrichment_input_dir(&self) -> PathBuf {
        self.input().join(ENRICH_D)
    }

    pub fn species_dir(&self) -> PathBuf {
        self.input().join(SPECIES_D)
    }

    pub fn draft_networks_dir(&self) -> PathBuf {
        self.input().join(NETWORK_D)
    }

    pub fn seeds_dir(&self) -> PathBuf {
        self.input().join(SEEDS_D)
    }

    pub fn targets_dir(&self) -> PathBuf {
        self.input().join(TARGETS_D)
    }

    pub fn blastp_output_dir(&self) -> PathBuf {
        self.output().join(BLASTP_D)
    }

    pub fn enrichment_output_dir(&self, group: &str) -> PathBuf {
        self.output().join(ENRICH_D).join(group)
    }

    pub fn networks_dir(&self) -> PathBuf {
        self.output().join(NETWORK_D)
    }

    pub fn snapshot_dir(&self, format: NetworkFormat) -> PathBuf {
        self.networks_dir().join(format.dir_name())
    }

    pub fn meneco_dir(&self) -> PathBuf {
        self.output().join(MENECO_D)
    }

    pub fn solver_results_dir(&self) -> PathBuf {
        self.meneco_dir().join(TOOL_OUTPUTS_D)
    }

    pub fn stat_nb(&self) -> PathBuf {
        self.meneco_dir().join("stat_nb.tsv")
    }

    pub fn stat_list(&self) -> PathBuf {
        self.meneco_dir().join("stat_list.tsv")
    }

    // Mandatory user inputs

    pub fn in_targets(&self) -> PathBuf {
        self.targets_dir().join(IN_TARGETS)
    }

    pub fn in_seeds(&self) -> PathBuf {
        self.seeds_dir().join(IN_SEEDS)
    }

    pub fn in_artefacts(&self) -> PathBuf {
        self.seeds_dir().join(IN_ARTEFACTS)
    }

    pub fn database_padmet(&self) -> Option<PathBuf> {
        unique_file_with_ext(&self.database_dir(), PADMET_EXT)
    }

    pub fn require_database_padmet(&self) -> Result<PathBuf> {
        self.database_padmet().ok_or_else(|| {
            MenevalError::MissingInput(self.database_dir().join(format!("*{PADMET_EXT}")))
        })
    }

    pub fn draft_network(&self) -> Option<PathBuf> {
        unique_file_with_ext(&self.draft_networks_dir(), PADMET_EXT)
    }

    // Generated inputs

    pub fn seeds_medium_tsv(&self) -> PathBuf {
        self.seeds_dir().join("seeds_medium.tsv")
    }

    pub fn seeds_artefacts_tsv(&self) -> PathBuf {
        self.seeds_dir().join("seeds_artefacts.tsv")
    }

    pub fn seeds_artefacts_sbml(&self) -> PathBuf {
        self.seeds_dir().join("seeds_artefacts.sbml")
    }

    pub fn biomass_tsv(&self) -> PathBuf {
        self.targets_dir().join("biomass.tsv")
    }

    pub fn targets_tsv(&self) -> PathBuf {
        self.targets_dir().join("temp_targets.tsv")
    }

    pub fn targets_sbml(&self) -> PathBuf {
        self.targets_dir().join("targets.sbml")
    }

    pub fn database_sbml(&self) -> PathBuf {
        self.database_dir().join("database.sbml")
    }

    pub fn medium_network(&self) -> PathBuf {
        self.networks_dir().join("0_medium.padmet")
    }

    // Snapshots and stage artifacts

    pub fn snapshot(&self, name: &ArtifactName) -> SnapshotPaths {
        let stem = name.stem();
        SnapshotPaths {
            padmet: self
                .snapshot_dir(NetworkFormat::Padmet)
                .join(format!("{stem}{}", NetworkFormat::Padmet.ext())),
            sbml: self
                .snapshot_dir(NetworkFormat::Sbml)
                .join(format!("{stem}{}", NetworkFormat::Sbml.ext())),
        }
    }

    pub fn bootstrap_snapshot(&self) -> SnapshotPaths {
        self.snapshot(&ArtifactName::bootstrap())
    }

    pub fn stage_artifacts(&self, name: &ArtifactName) -> StageArtifacts {
        let stem = name.stem();
        StageArtifacts {
            solver_json: self.solver_results_dir().join(format!("{stem}{SOLVER_SUFFIX}")),
            solver_tsv: self.meneco_dir().join(TSV_D).join(format!("{stem}{TSV_SUFFIX}")),
            filtered_tsv: self
                .meneco_dir()
                .join(FILTERED_D)
                .join(format!("{stem}{FILTERED_SUFFIX}")),
            merge_tsv: self.meneco_dir().join(TSV_D).join(format!("{stem}{MERGE_SUFFIX}")),
        }
    }

    /// Committed snapshots (PADMET side), sorted by index.
    pub fn list_snapshots(&self) -> Result<Vec<ArtifactName>> {
        list_artifacts(
            &self.snapshot_dir(NetworkFormat::Padmet),
            NetworkFormat::Padmet.ext(),
        )
    }

    /// Stages that recorded a solver result, sorted by index.
    pub fn list_solver_results(&self) -> Result<Vec<ArtifactName>> {
        list_artifacts(&self.solver_results_dir(), SOLVER_SUFFIX)
    }

    /// Stages that wrote a filtered table, sorted by index.
    pub fn list_filtered_tables(&self) -> Result<Vec<(ArtifactName, PathBuf)>> {
        let dir = self.meneco_dir().join(FILTERED_D);
        Ok(list_artifacts(&dir, FILTERED_SUFFIX)?
            .into_iter()
            .map(|name| {
                let path = dir.join(format!("{}{FILTERED_SUFFIX}", name.stem()));
                (name, path)
            })
            .collect())
    }

    // Stage inputs

    pub fn enrichment_groups(&self) -> Result<Vec<String>> {
        let dir = self.enrichment_input_dir();
        if !dir.is_dir() {
            return Ok(vec![]);
        }
        let mut groups: Vec<String> = fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
            .collect();
        groups.sort();
        Ok(groups)
    }

    pub fn sequence_inputs(&self) -> Result<SequenceInputs> {
        let stage = StageKind::SequenceEvidence.to_string();
        let database_padmet = self.database_padmet();
        let protein_library = unique_file_with_ext(&self.database_dir(), FASTA_EXT)
            .or_else(|| unique_file_with_ext(&self.database_dir(), ".fasta.gz"));
        let proteome = unique_file_with_ext(&self.species_dir(), FAA_EXT);
        match (database_padmet, protein_library, proteome) {
            (Some(database_padmet), Some(protein_library), Some(proteome)) => {
                let genome = self
                    .species_dir()
                    .is_dir()
                    .then(|| find_single_quiet(&self.species_dir(), FNA_EXT))
                    .flatten();
                Ok(SequenceInputs {
                    database_padmet,
                    protein_library,
                    proteome,
                    genome,
                })
            }
            (db, lib, prot) => {
                let mut missing = vec![];
                if db.is_none() {
                    missing.push(self.database_dir().join(format!("*{PADMET_EXT}")));
                }
                if lib.is_none() {
                    missing.push(self.database_dir().join(format!("*{FASTA_EXT}")));
                }
                if prot.is_none() {
                    missing.push(self.species_dir().join(format!("*{FAA_EXT}")));
                }
                Err(MenevalError::StageInputsMissing { stage, missing })
            }
        }
    }

    pub fn group_source(&self, group: &str) -> Result<GroupSource> {
        let dir = self.enrichment_input_dir().join(group);
        let template = Some(dir.join(GROUPS_TSV)).filter(|p| p.exists());
        let reactions = dir.join(REACTIONS_TSV);
        if reactions.exists() {
            return Ok(GroupSource::PresenceTable {
                reactions,
                template,
            });
        }
        let mut networks: Vec<PathBuf> = if dir.is_dir() {
            fs::read_dir(&dir)?
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.path())
                .filter(|path| {
                    path.extension()
                        .and_then(|e| e.to_str())
                        .is_some_and(|e| e == "sbml" || e == "xml")
                })
                .collect()
        } else {
            vec![]
        };
        if networks.is_empty() {
            return Err(MenevalError::StageInputsMissing {
                stage: StageKind::Group(group.to_string()).to_string(),
                missing: vec![reactions],
            });
        }
        networks.sort();
        Ok(GroupSource::Networks { networks, template })
    }

    /// Creates every input and output directory of the workflow.
    pub fn create_folders(&self) -> Result<()> {
        tracing::info!(
            "Running init step : creating directories :\n=========================================\n"
        );
        let dirs = [
            self.database_dir(),
            self.enrichment_input_dir(),
            self.species_dir(),
            self.draft_networks_dir(),
            self.seeds_dir(),
            self.targets_dir(),
            self.blastp_output_dir(),
            self.output().join(ENRICH_D),
            self.snapshot_dir(NetworkFormat::Padmet),
            self.snapshot_dir(NetworkFormat::Sbml),
            self.meneco_dir().join(FILTERED_D),
            self.solver_results_dir(),
            self.meneco_dir().join(TSV_D),
        ];
        for dir in &dirs {
            ensure_dir(dir)?;
        }
        tracing::info!("\n--------------\nInit step done\n");
        Ok(())
    }

    /// Fails on the first missing mandatory input; only warns about the
    /// inputs of optional stages.
    pub fn check_required_files(&self) -> Result<()> {
        tracing::info!("Running Check step\n==================\n");
        for file in [self.in_targets(), self.in_seeds(), self.in_artefacts()] {
            if !file.exists() {
                return Err(MenevalError::MissingInput(file));
            }
        }
        self.require_database_padmet()?;
        if self.draft_network().is_none() {
            return Err(MenevalError::MissingInput(
                self.draft_networks_dir().join(format!("*{PADMET_EXT}")),
            ));
        }

        if let Err(e) = self.sequence_inputs() {
            tracing::warn!("{e}, passing the step");
        }
        let groups = self.enrichment_groups()?;
        if groups.is_empty() {
            tracing::warn!("No group directories for ENRICHMENT step, passing the step");
        }
        for group in &groups {
            match self.group_source(group) {
                Ok(_) => tracing::info!("Reaction file found for group {group}, --enrich={group} possible"),
                Err(_) => tracing::warn!("No reaction file for group {group}, --enrich={group} impossible"),
            }
        }
        tracing::info!("All files required found\n\n---------------\nCheck step done\n");
        Ok(())
    }
}

fn find_single_quiet(dir: &Path, ext: &str) -> Option<PathBuf> {
    let matches: Vec<PathBuf> = fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(ext))
        })
        .collect();
    match matches.as_slice() {
        [only] => Some(only.clone()),
        [] => None,
        _ => {
            tracing::warn!("More than 1 file with the extension {ext} in path {}", dir.display());
            None
        }
    }
}

fn list_artifacts(dir: &Path, suffix: &str) -> Result<Vec<ArtifactName>> {
    if !dir.is_dir() {
        return Ok(vec![]);
    }
    let mut names: Vec<ArtifactName> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .filter_map(|name| name.strip_suffix(suffix).and_then(ArtifactName::parse))
        .collect();
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    #[test]
    fn init_is_idempotent() {
        let td = tempdir().unwrap();
        let layout = Layout::new(td.path());
        layout.create_folders().unwrap();
        layout.create_folders().unwrap();
        assert!(layout.snapshot_dir(NetworkFormat::Sbml).is_dir());
        assert!(layout.solver_results_dir().is_dir());
        assert!(layout.enrichment_input_dir().is_dir());
    }

    #[test]
    fn check_fails_on_missing_mandatory_input_and_tolerates_optional_ones() {
        let td = tempdir().unwrap();
        let layout = Layout::new(td.path());
        layout.create_folders().unwrap();
        touch(&layout.in_targets());
        touch(&layout.in_seeds());

        let err = layout.check_required_files().unwrap_err();
        assert!(matches!(err, MenevalError::MissingInput(p) if p == layout.in_artefacts()));

        touch(&layout.in_artefacts());
        touch(&layout.database_dir().join("metacyc.padmet"));
        touch(&layout.draft_networks_dir().join("species.padmet"));
        fs::create_dir_all(layout.enrichment_input_dir().join("Group1")).unwrap();
        layout.check_required_files().unwrap();
    }

    #[test]
    fn groups_are_discovered_from_subdirectories() {
        let td = tempdir().unwrap();
        let layout = Layout::new(td.path());
        for group in ["Group2", "Group1"] {
            fs::create_dir_all(layout.enrichment_input_dir().join(group)).unwrap();
        }
        touch(&layout.enrichment_input_dir().join("notes.txt"));
        assert_eq!(layout.enrichment_groups().unwrap(), vec!["Group1", "Group2"]);

        touch(&layout.enrichment_input_dir().join("Group1").join(REACTIONS_TSV));
        assert!(matches!(
            layout.group_source("Group1").unwrap(),
            GroupSource::PresenceTable { template: None, .. }
        ));
        assert!(matches!(
            layout.group_source("Group2"),
            Err(MenevalError::StageInputsMissing { .. })
        ));
        touch(&layout.enrichment_input_dir().join("Group2").join("ecoli.sbml"));
        assert!(matches!(
            layout.group_source("Group2").unwrap(),
            GroupSource::Networks { networks, .. } if networks.len() == 1
        ));
    }

    #[test]
    fn sequence_inputs_report_what_is_missing() {
        let td = tempdir().unwrap();
        let layout = Layout::new(td.path());
        layout.create_folders().unwrap();
        touch(&layout.database_dir().join("metacyc.padmet"));
        match layout.sequence_inputs() {
            Err(MenevalError::StageInputsMissing { missing, .. }) => assert_eq!(missing.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
        touch(&layout.database_dir().join("prot.fasta"));
        touch(&layout.species_dir().join("sp.faa"));
        let inputs = layout.sequence_inputs().unwrap();
        assert_eq!(inputs.genome, None);
        touch(&layout.species_dir().join("sp.fna"));
        assert_eq!(
            layout.sequence_inputs().unwrap().genome,
            Some(layout.species_dir().join("sp.fna"))
        );
    }
}
