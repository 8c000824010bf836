//! Cross-stage summary of the solver results.

use crate::{
    error::Result,
    layout::Layout,
    sbml::plain_id,
    table::{Table, write_table},
};
use itertools::Itertools;
use meneval_protocol::GapfillResult;
use std::fs;

const COLUMNS: [&str; 7] = [
    "Not producible",
    "Not constructable",
    "Constructible",
    "Essential",
    "Minimal",
    "Intersection",
    "Union",
];

fn decoded(ids: &[String]) -> Vec<String> {
    ids.iter().map(|id| plain_id(id)).collect()
}

/// The seven reaction/metabolite lists summarized for one stage.
fn stage_lists(result: &GapfillResult) -> [Vec<String>; 7] {
    let essential: Vec<String> = result.essential_reaction_set().into_iter().collect();
    [
        decoded(&result.unproducible_targets),
        decoded(&result.unreconstructable_targets),
        decoded(&result.reconstructable_targets),
        decoded(&essential),
        decoded(&result.one_minimal_completion),
        decoded(&result.intersection_of_minimal_completions),
        decoded(&result.union_of_minimal_completions),
    ]
}

/// Writes `stat_nb.tsv` and `stat_list.tsv`, one row per recorded solver
/// result in stage order.
pub fn write_statistics(layout: &Layout) -> Result<()> {
    let mut counts = Table::new(
        std::iter::once(String::new())
            .chain(COLUMNS.iter().map(|c| format!("Nb {}", c.to_lowercase())))
            .collect(),
    );
    let mut lists = Table::new(
        std::iter::once(String::new())
            .chain(COLUMNS.iter().map(|c| c.to_string()))
            .collect(),
    );
    for name in layout.list_solver_results()? {
        let path = layout.stage_artifacts(&name).solver_json;
        let result = GapfillResult::from_json_str(&fs::read_to_string(&path)?)?;
        let stage_lists = stage_lists(&result);
        counts.rows.push(
            std::iter::once(name.stem())
                .chain(stage_lists.iter().map(|l| l.len().to_string()))
                .collect(),
        );
        lists.rows.push(
            std::iter::once(name.stem())
                .chain(stage_lists.iter().map(|l| l.iter().join(", ")))
                .collect(),
        );
    }
    write_table(&layout.stat_nb(), &counts)?;
    write_table(&layout.stat_list(), &lists)?;
    tracing::info!(
        "Meneco statistics written in {} and {}",
        layout.stat_nb().display(),
        layout.stat_list().display()
    );
    Ok(())
}
