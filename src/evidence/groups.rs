//! Reference-group evidence: a reaction is kept when at least one organism of
//! the group has it in its network.

use crate::{
    error::{MenevalError, Result},
    evidence::{EvidenceFilter, FilteredReactionSet},
    layout::{GroupSource, Layout, REACTIONS_TSV},
    sbml,
    table::{Table, read_table, write_table},
    versioning::{StageKind, group_provenance},
};
use itertools::Itertools;
use meneval_protocol::ReactionPresence;
use rayon::prelude::*;
use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    path::{Path, PathBuf},
};

const ANNOTATION_MARKERS: [&str; 3] = ["_genes_assoc", "_formula", "(sep="];

fn is_organism_column(header: &str) -> bool {
    !ANNOTATION_MARKERS.iter().any(|marker| header.contains(marker))
}

fn is_present(cell: &str) -> bool {
    cell.trim().parse::<f64>().is_ok_and(|v| v > 0.0)
}

/// Reaction presence across the organisms of one group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresenceTable {
    organisms: Vec<String>,
    presence: HashMap<String, BTreeSet<String>>,
}

impl PresenceTable {
    pub fn organisms(&self) -> &[String] {
        &self.organisms
    }

    pub fn from_tsv(path: &Path) -> Result<Self> {
        let table = read_table(path)?;
        let columns: Vec<(usize, String)> = table
            .header
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(_, header)| is_organism_column(header))
            .map(|(i, header)| (i, header.trim().to_string()))
            .collect();
        if columns.is_empty() {
            return Err(MenevalError::Format(format!(
                "No organism column in presence table '{}'",
                path.display()
            )));
        }
        let mut presence: HashMap<String, BTreeSet<String>> = HashMap::new();
        for row in &table.rows {
            let Some(reaction) = row.first().map(|r| r.trim()).filter(|r| !r.is_empty()) else {
                continue;
            };
            let organisms = presence.entry(reaction.to_string()).or_default();
            organisms.extend(
                columns
                    .iter()
                    .filter(|(i, _)| row.get(*i).is_some_and(|cell| is_present(cell)))
                    .map(|(_, organism)| organism.clone()),
            );
        }
        Ok(Self {
            organisms: columns.into_iter().map(|(_, organism)| organism).collect(),
            presence,
        })
    }

    /// One organism per network, named after the file stem.
    pub fn from_networks(networks: &[PathBuf]) -> Result<Self> {
        let parsed: Vec<(String, BTreeSet<String>)> = networks
            .par_iter()
            .map(|network| -> Result<(String, BTreeSet<String>)> {
                let organism = network
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .ok_or_else(|| {
                        MenevalError::Format(format!("Invalid network name '{}'", network.display()))
                    })?
                    .to_string();
                let reactions = sbml::reaction_ids_from_file(network)?;
                tracing::debug!("{} reactions in {organism}", reactions.len());
                Ok((organism, reactions))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut presence: HashMap<String, BTreeSet<String>> = HashMap::new();
        for (organism, reactions) in &parsed {
            for reaction in reactions {
                presence
                    .entry(reaction.clone())
                    .or_default()
                    .insert(organism.clone());
            }
        }
        let mut organisms: Vec<String> = parsed.into_iter().map(|(organism, _)| organism).collect();
        organisms.sort();
        Ok(Self {
            organisms,
            presence,
        })
    }

    pub fn to_table(&self) -> Table {
        let mut header = vec!["reaction".to_string()];
        header.extend(self.organisms.iter().cloned());
        let mut table = Table::new(header);
        table.rows = self
            .presence
            .iter()
            .sorted_by(|a, b| a.0.cmp(b.0))
            .map(|(reaction, present)| {
                std::iter::once(reaction.clone())
                    .chain(self.organisms.iter().map(|organism| {
                        (if present.contains(organism) { "1" } else { "0" }).to_string()
                    }))
                    .collect()
            })
            .collect();
        table
    }

    /// Keeps only the listed organisms.
    pub fn restrict_to(&mut self, organisms: &BTreeSet<String>) {
        for unknown in organisms.iter().filter(|o| !self.organisms.contains(o)) {
            tracing::warn!("Organism {unknown} of the group template is not in the presence table");
        }
        self.organisms.retain(|organism| organisms.contains(organism));
        for present in self.presence.values_mut() {
            present.retain(|organism| organisms.contains(organism));
        }
    }

    pub fn presence(&self, reaction: &str) -> ReactionPresence {
        let organisms = self.presence.get(reaction).cloned().unwrap_or_default();
        let count = organisms.len();
        let fraction = if self.organisms.is_empty() {
            0.0
        } else {
            count as f64 / self.organisms.len() as f64
        };
        ReactionPresence {
            reaction: reaction.to_string(),
            count,
            fraction,
            organisms,
        }
    }
}

/// Organisms listed on the `group` row of a group template.
pub fn read_group_template(path: &Path, group: &str) -> Result<Option<BTreeSet<String>>> {
    let table = read_table(path)?;
    Ok(std::iter::once(&table.header)
        .chain(table.rows.iter())
        .find(|row| row.first().is_some_and(|name| name.trim() == group))
        .map(|row| {
            row.iter()
                .skip(1)
                .map(|organism| organism.trim().to_string())
                .filter(|organism| !organism.is_empty())
                .collect()
        }))
}

/// `50.0`, `33.33`: two decimals at most, at least one.
fn format_percent(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

pub struct GroupEvidence<'a> {
    layout: &'a Layout,
    group: String,
    source: GroupSource,
}

impl<'a> GroupEvidence<'a> {
    pub fn new(layout: &'a Layout, group: &str, source: GroupSource) -> Self {
        Self {
            layout,
            group: group.to_string(),
            source,
        }
    }

    pub fn output_dir(&self) -> PathBuf {
        self.layout.enrichment_output_dir(&self.group)
    }

    pub fn results_file(&self) -> PathBuf {
        self.output_dir()
            .join(format!("{}_res_validation_networks.tsv", self.group))
    }

    /// Presence table of the group, restricted to its template row.
    pub fn load_presence(&self) -> Result<PresenceTable> {
        let (mut table, template) = match &self.source {
            GroupSource::PresenceTable {
                reactions,
                template,
            } => (PresenceTable::from_tsv(reactions)?, template),
            GroupSource::Networks { networks, template } => {
                let derived = self.output_dir().join(REACTIONS_TSV);
                let table = if derived.exists() {
                    tracing::info!("{} file found, passing presence table derivation.", derived.display());
                    PresenceTable::from_tsv(&derived)?
                } else {
                    tracing::info!(
                        "Deriving presence table of {} from {} networks",
                        self.group,
                        networks.len()
                    );
                    let table = PresenceTable::from_networks(networks)?;
                    write_table(&derived, &table.to_table())?;
                    table
                };
                (table, template)
            }
        };
        if let Some(template) = template {
            match read_group_template(template, &self.group)? {
                Some(organisms) => table.restrict_to(&organisms),
                None => tracing::warn!(
                    "Group {} not found in {}, will consider all species.",
                    self.group,
                    template.display()
                ),
            }
        }
        Ok(table)
    }

    fn write_results(&self, kept: &[ReactionPresence]) -> Result<()> {
        let g = &self.group;
        let mut table = Table::new(vec![
            "RXN".to_string(),
            format!("Nb {g} presence"),
            format!("{g} presence %"),
            format!("{g} list"),
        ]);
        table.rows = kept
            .iter()
            .map(|presence| {
                vec![
                    presence.reaction.clone(),
                    presence.count.to_string(),
                    format_percent(presence.percent()),
                    presence.organisms.iter().join(";"),
                ]
            })
            .collect();
        write_table(&self.results_file(), &table)
    }
}

impl EvidenceFilter for GroupEvidence<'_> {
    fn name(&self) -> String {
        StageKind::Group(self.group.clone()).to_string()
    }

    fn filter(&self, candidates: &[String]) -> Result<FilteredReactionSet> {
        tracing::info!(
            "Start searching for presence in {} of reactions from Meneco output\n\
             ======================================================================================\n",
            self.group
        );
        let table = self.load_presence()?;
        let kept: Vec<ReactionPresence> = candidates
            .iter()
            .map(|reaction| table.presence(reaction))
            .filter(|presence| presence.count > 0)
            .collect();
        self.write_results(&kept)?;
        let kept: BTreeSet<String> = kept.into_iter().map(|p| p.reaction).collect();
        tracing::info!(
            "{} reactions in {} : {}\nDetails in {} file.",
            kept.len(),
            self.group,
            kept.iter().join(", "),
            self.results_file().display()
        );
        tracing::info!("\n================\nEnd of selection");
        Ok(FilteredReactionSet {
            kept,
            provenance: Some(group_provenance(&self.group)),
            genes: BTreeMap::new(),
        })
    }
}
