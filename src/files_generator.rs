//! Solver inputs derived from the user inputs, and the bootstrap snapshot.
//!
//! Every product is kept when it already exists.

use crate::{
    error::{MenevalError, Result},
    fsutil::{check_file_creation, write_atomic},
    layout::Layout,
    table::read_records,
    tools::{CurationRequest, MediumRequest, NetworkToolkit},
};
use std::{fmt::Write as _, path::Path};

pub const SEEDS_COMPARTMENT: &str = "C-BOUNDARY";
pub const CYTOSOL: &str = "c";
pub const BIOMASS_CATEGORY: &str = "MANUAL";

fn skip_existing(path: &Path) -> bool {
    let exists = path.exists();
    if exists {
        tracing::info!("{} file found, keeping it.", path.display());
    }
    exists
}

/// One metabolite per line.
fn read_metabolites(path: &Path) -> Result<Vec<String>> {
    Ok(read_records(path)?
        .into_iter()
        .filter_map(|row| row.into_iter().next())
        .map(|metabolite| metabolite.trim().to_string())
        .filter(|metabolite| !metabolite.is_empty())
        .collect())
}

fn write_text(path: &Path, text: &str) -> Result<()> {
    write_atomic(path, text.as_bytes())?;
    check_file_creation(path)
}

/// `seeds_medium.tsv`, `seeds_artefacts.tsv` and `seeds_artefacts.sbml`.
pub fn generate_seeds(layout: &Layout, toolkit: &dyn NetworkToolkit) -> Result<()> {
    let seeds = read_metabolites(&layout.in_seeds())?;
    let artefacts = read_metabolites(&layout.in_artefacts())?;

    let medium = layout.seeds_medium_tsv();
    if !skip_existing(&medium) {
        let text: String = seeds
            .iter()
            .map(|m| format!("{m}\t{SEEDS_COMPARTMENT}\n"))
            .collect();
        write_text(&medium, &text)?;
    }

    let seeds_artefacts = layout.seeds_artefacts_tsv();
    if !skip_existing(&seeds_artefacts) {
        let text: String = seeds
            .iter()
            .map(|m| format!("{m}\t{SEEDS_COMPARTMENT}\n"))
            .chain(artefacts.iter().map(|m| format!("{m}\t{CYTOSOL}\n")))
            .collect();
        write_text(&seeds_artefacts, &text)?;
    }

    let sbml = layout.seeds_artefacts_sbml();
    if !skip_existing(&sbml) {
        toolkit.compounds_to_sbml(&seeds_artefacts, &sbml)?;
        check_file_creation(&sbml)?;
    }
    Ok(())
}

/// Biomass reaction consuming every target, plus its export reaction.
pub fn biomass_reactions(targets: &[(String, String)]) -> String {
    let mut text = String::from(
        "reaction_id\tbiomass\n\
         comment\treaction of biomass\n\
         reversible\tfalse\n\
         linked_gene\t\n\
         #reactant/product\t#stoichio:compound_id:compar\n",
    );
    for (stoichiometry, metabolite) in targets {
        let _ = writeln!(text, "reactant\t{stoichiometry}:{metabolite}:{CYTOSOL}");
    }
    let _ = write!(
        text,
        "product\t1.0:Bio:{CYTOSOL}\n\
         \n\
         reaction_id\tExport_Bio\n\
         comment\tAvoid storage\n\
         reversible\tfalse\n\
         linked_gene\t\n\
         reactant\t1.0:Bio:{CYTOSOL}\n\
         product\t1.0:Bio:{SEEDS_COMPARTMENT}\n"
    );
    text
}

/// `temp_targets.tsv`, `biomass.tsv` and `targets.sbml`.
pub fn generate_targets(layout: &Layout, toolkit: &dyn NetworkToolkit) -> Result<()> {
    let source = layout.in_targets();
    let targets = read_records(&source)?
        .into_iter()
        .map(|row| match row.as_slice() {
            [stoichiometry, metabolite, ..] => {
                Ok((stoichiometry.trim().to_string(), metabolite.trim().to_string()))
            }
            _ => Err(MenevalError::Format(format!(
                "Malformed target line '{}' in {}, expected '<stoichiometry>\\t<metabolite>'",
                row.join("\t"),
                source.display()
            ))),
        })
        .collect::<Result<Vec<_>>>()?;

    let temp_targets = layout.targets_tsv();
    if !skip_existing(&temp_targets) {
        let text: String = targets
            .iter()
            .map(|(_, m)| format!("{m}\t{CYTOSOL}\n"))
            .collect();
        write_text(&temp_targets, &text)?;
    }

    let biomass = layout.biomass_tsv();
    if !skip_existing(&biomass) {
        write_text(&biomass, &biomass_reactions(&targets))?;
    }

    let sbml = layout.targets_sbml();
    if !skip_existing(&sbml) {
        toolkit.compounds_to_sbml(&temp_targets, &sbml)?;
        check_file_creation(&sbml)?;
    }
    Ok(())
}

/// `database.sbml`, the repair network of the solver.
pub fn generate_database_sbml(layout: &Layout, toolkit: &dyn NetworkToolkit) -> Result<()> {
    let output = layout.database_sbml();
    if !skip_existing(&output) {
        toolkit.padmet_to_sbml(&layout.require_database_padmet()?, &output)?;
        check_file_creation(&output)?;
    }
    Ok(())
}

/// Medium network, then the bootstrap snapshot `0_base` with the biomass
/// reactions.
pub fn generate_base_networks(layout: &Layout, toolkit: &dyn NetworkToolkit) -> Result<()> {
    let draft = layout.draft_network().ok_or_else(|| {
        MenevalError::MissingInput(layout.draft_networks_dir().join("*.padmet"))
    })?;
    let database = layout.require_database_padmet()?;

    let medium = layout.medium_network();
    if !skip_existing(&medium) {
        toolkit.apply_medium(&MediumRequest {
            network: &draft,
            seeds: &layout.seeds_medium_tsv(),
            reference: &database,
            output: &medium,
        })?;
        check_file_creation(&medium)?;
    }

    let bootstrap = layout.bootstrap_snapshot();
    if !skip_existing(&bootstrap.padmet) {
        toolkit.curate(&CurationRequest {
            network: &medium,
            data: &layout.biomass_tsv(),
            reference: None,
            output: &bootstrap.padmet,
            tool: None,
            category: BIOMASS_CATEGORY,
        })?;
        check_file_creation(&bootstrap.padmet)?;
    }
    if !skip_existing(&bootstrap.sbml) {
        toolkit.padmet_to_sbml(&bootstrap.padmet, &bootstrap.sbml)?;
        check_file_creation(&bootstrap.sbml)?;
    }
    Ok(())
}

pub fn generate_all(layout: &Layout, toolkit: &dyn NetworkToolkit) -> Result<()> {
    tracing::info!("Generating Meneco input files\n=============================\n");
    generate_seeds(layout, toolkit)?;
    generate_targets(layout, toolkit)?;
    generate_database_sbml(layout, toolkit)?;
    generate_base_networks(layout, toolkit)?;
    tracing::info!("All files needed created successfully");
    Ok(())
}
