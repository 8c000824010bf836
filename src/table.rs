//! Tab-separated tables exchanged with the curation tools.
//!
//! The normalized solver table has an `idRef` header row followed by one row
//! per proposed reaction, reaction id first. Filtering rewrites that table
//! row for row; nothing else about its columns is assumed.

use crate::{
    error::{MenevalError, Result},
    evidence::FilteredReactionSet,
    fsutil::write_atomic,
};
use csv::{QuoteStyle, ReaderBuilder, WriterBuilder};
use itertools::Itertools;
use std::{collections::BTreeSet, path::Path};

pub const COMMENT_HEADER: &str = "Comment";
pub const GENES_HEADER: &str = "Genes";

/// A header row plus data rows, all cells kept as text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(header: Vec<String>) -> Self {
        Self {
            header,
            rows: vec![],
        }
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.header
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
    }

    /// Column holding the provenance message of each row, second to last
    /// when unnamed (an appended `Genes` column does not count).
    fn comment_column(&self) -> Option<usize> {
        let genes = self.header.last().is_some_and(|h| h == GENES_HEADER);
        self.column(COMMENT_HEADER)
            .or_else(|| (self.header.len() - usize::from(genes)).checked_sub(2))
    }
}

/// Every non-blank row of a tab-separated file, header included.
pub fn read_records(path: &Path) -> Result<Vec<Vec<String>>> {
    if !path.exists() {
        return Err(MenevalError::MissingInput(path.to_path_buf()));
    }
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_path(path)?;
    let mut rows = vec![];
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        rows.push(record.iter().map(|cell| cell.trim_end().to_string()).collect());
    }
    Ok(rows)
}

pub fn read_table(path: &Path) -> Result<Table> {
    let mut rows = read_records(path)?.into_iter();
    let Some(header) = rows.next() else {
        return Ok(Table::default());
    };
    Ok(Table {
        header,
        rows: rows.collect(),
    })
}

pub fn write_table(path: &Path, table: &Table) -> Result<()> {
    let mut writer = WriterBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .quote_style(QuoteStyle::Never)
        .from_writer(vec![]);
    writer.write_record(&table.header)?;
    for row in &table.rows {
        writer.write_record(row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| MenevalError::Format(format!("Could not serialize {}: {e}", path.display())))?;
    write_atomic(path, &bytes)
}

/// Reaction ids of the normalized solver table, in file order.
pub fn read_candidates(path: &Path) -> Result<Vec<String>> {
    tracing::info!("Extracting reactions from Meneco output");
    let table = read_table(path)?;
    let candidates: Vec<String> = table
        .rows
        .iter()
        .filter_map(|row| row.first())
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .unique()
        .collect();
    tracing::info!("Total of {} reactions\n", candidates.len());
    Ok(candidates)
}

/// Copies the rows of `input` whose reaction is kept by `filtered`, writing
/// the provenance message and the gene association when present.
pub fn write_filtered(input: &Path, output: &Path, filtered: &FilteredReactionSet) -> Result<usize> {
    let mut table = read_table(input)?;
    let comment = filtered
        .provenance
        .as_ref()
        .and_then(|_| table.comment_column());
    let with_genes = !filtered.genes.is_empty();
    if with_genes {
        table.header.push(GENES_HEADER.to_string());
    }
    table
        .rows
        .retain(|row| row.first().is_some_and(|id| filtered.kept.contains(id.trim())));
    for row in &mut table.rows {
        let id = row.first().map(|id| id.trim().to_string()).unwrap_or_default();
        if let (Some(column), Some(message)) = (comment, filtered.provenance.as_ref()) {
            if row.len() <= column {
                row.resize(column + 1, String::new());
            }
            row[column] = message.clone();
        }
        if with_genes {
            row.push(filtered.gene_association(&id));
        }
    }
    write_table(output, &table)?;
    tracing::info!("Meneco tsv output file saved in : {}", output.display());
    Ok(table.rows.len())
}

/// Copies `input` without the rows of the `exclude` reactions.
pub fn drop_reactions(input: &Path, output: &Path, exclude: &BTreeSet<String>) -> Result<usize> {
    let mut table = read_table(input)?;
    let before = table.rows.len();
    table
        .rows
        .retain(|row| row.first().is_none_or(|id| !exclude.contains(id.trim())));
    let removed = before - table.rows.len();
    write_table(output, &table)?;
    Ok(removed)
}

/// `(reaction, provenance message)` for every row of a filtered table.
pub fn read_provenance(path: &Path) -> Result<Vec<(String, String)>> {
    let table = read_table(path)?;
    let Some(column) = table.comment_column() else {
        return Ok(vec![]);
    };
    Ok(table
        .rows
        .iter()
        .filter_map(|row| match (row.first(), row.get(column)) {
            (Some(id), Some(message)) => Some((id.trim().to_string(), message.trim().to_string())),
            _ => None,
        })
        .collect())
}
