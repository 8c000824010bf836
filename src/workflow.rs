//! Pipeline steps as exposed on the command line.

use crate::{
    config::PipelineConfig,
    error::{MenevalError, Result},
    evidence::{GroupEvidence, Passthrough, SequenceEvidence},
    files_generator,
    layout::Layout,
    stage::{StageReport, StageRunner},
    stats::write_statistics,
    table::read_provenance,
    tools::{Aligner, NetworkToolkit},
    versioning::{StageKind, group_from_provenance},
};
use std::{collections::BTreeSet, fmt, str::FromStr};

pub const ALL_GROUPS: &str = "ALL";

/// Groups addressed by `--enrich`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrichTarget {
    All,
    Group(String),
}

impl FromStr for EnrichTarget {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "" => Err("Empty group name".to_string()),
            name if name.eq_ignore_ascii_case(ALL_GROUPS) => Ok(Self::All),
            name => Ok(Self::Group(name.to_string())),
        }
    }
}

impl fmt::Display for EnrichTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str(ALL_GROUPS),
            Self::Group(name) => f.write_str(name),
        }
    }
}

pub struct Workflow<'a> {
    config: &'a PipelineConfig,
    layout: Layout,
    toolkit: &'a dyn NetworkToolkit,
    aligner: &'a dyn Aligner,
}

impl<'a> Workflow<'a> {
    pub fn new(
        config: &'a PipelineConfig,
        toolkit: &'a dyn NetworkToolkit,
        aligner: &'a dyn Aligner,
    ) -> Self {
        Self {
            config,
            layout: config.layout(),
            toolkit,
            aligner,
        }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    fn runner(&self) -> StageRunner<'_> {
        StageRunner::new(self.config, &self.layout, self.toolkit)
    }

    pub fn init(&self) -> Result<()> {
        self.layout.create_folders()
    }

    pub fn check(&self) -> Result<()> {
        self.layout.check_required_files()?;
        for (tool, resolution) in self.config.tools.resolution_labels() {
            tracing::info!("{tool} executable : {resolution}");
        }
        Ok(())
    }

    pub fn generate_files(&self) -> Result<()> {
        files_generator::generate_all(&self.layout, self.toolkit)
    }

    /// `None` when the stage inputs are missing and the stage was skipped.
    pub fn run_sequence_stage(&self) -> Result<Option<StageReport>> {
        let inputs = match self.layout.sequence_inputs() {
            Ok(inputs) => inputs,
            Err(e @ MenevalError::StageInputsMissing { .. }) => {
                tracing::warn!("{e}, passing the step");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        let filter = SequenceEvidence::new(
            &self.layout,
            inputs,
            &self.config.xrefs,
            self.config.evalue,
            self.aligner,
        );
        self.runner()
            .run(&StageKind::SequenceEvidence, &filter, &BTreeSet::new())
            .map(Some)
    }

    fn run_group_stage(&self, group: &str) -> Result<Option<StageReport>> {
        let source = match self.layout.group_source(group) {
            Ok(source) => source,
            Err(e @ MenevalError::StageInputsMissing { .. }) => {
                tracing::warn!("{e}, passing the step");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        let filter = GroupEvidence::new(&self.layout, group, source);
        self.runner()
            .run(&StageKind::Group(group.to_string()), &filter, &BTreeSet::new())
            .map(Some)
    }

    /// One group stage per addressed group, in sorted group order.
    pub fn run_enrichment(&self, target: &EnrichTarget) -> Result<Vec<StageReport>> {
        let groups = match target {
            EnrichTarget::All => self.layout.enrichment_groups()?,
            EnrichTarget::Group(name) => vec![name.clone()],
        };
        if groups.is_empty() {
            tracing::warn!("No group directories for ENRICHMENT step, passing the step");
        }
        let mut reports = vec![];
        for group in &groups {
            if let Some(report) = self.run_group_stage(group)? {
                reports.push(report);
            }
        }
        Ok(reports)
    }

    /// Commits every remaining proposed reaction, then writes the statistics.
    pub fn run_fill(&self) -> Result<StageReport> {
        let report = self
            .runner()
            .run(&StageKind::CommitRemainder, &Passthrough, &BTreeSet::new())?;
        write_statistics(&self.layout)?;
        Ok(report)
    }

    /// Reactions that only entered the network through a group stage.
    pub fn group_sourced_reactions(&self) -> Result<BTreeSet<String>> {
        let mut reactions = BTreeSet::new();
        for (name, path) in self.layout.list_filtered_tables()? {
            if !matches!(name.kind(), Some(StageKind::Group(_))) {
                continue;
            }
            reactions.extend(
                read_provenance(&path)?
                    .into_iter()
                    .filter(|(_, message)| group_from_provenance(message).is_some())
                    .map(|(reaction, _)| reaction),
            );
        }
        Ok(reactions)
    }

    /// Gap-fills again from the sequence-evidence network, without any
    /// reaction a group stage vouched for.
    pub fn exclude_enrichment(&self) -> Result<StageReport> {
        let excluded = self.group_sourced_reactions()?;
        tracing::info!(
            "{} reactions from enrichment steps excluded from gap-filling",
            excluded.len()
        );
        self.runner()
            .run(&StageKind::ExcludeEnrichment, &Passthrough, &excluded)
    }

    /// check, files, sequence stage, every group stage, fill.
    pub fn run_all(&self) -> Result<Vec<StageReport>> {
        self.check()?;
        self.generate_files()?;
        let mut reports: Vec<StageReport> = self.run_sequence_stage()?.into_iter().collect();
        reports.extend(self.run_enrichment(&EnrichTarget::All)?);
        reports.push(self.run_fill()?);
        Ok(reports)
    }
}
