//! Reference protein identifiers attached to the reactions of the database
//! network, read from its cross-reference nodes.
//!
//! A node line reads `xref\t<RXN>_xrefs\t<KEY>\t<v1;v2>\t<KEY>\t...`; only the
//! configured keys (`<namespace><suffix>`) are retained, each id prefixed
//! with its namespace.

use crate::{config::XrefSettings, error::Result};
use std::{
    collections::{BTreeSet, HashMap},
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

const XREF_NODE: &str = "xref";
const XREF_SUFFIX: &str = "_xrefs";

#[derive(Debug, Clone, Default)]
pub struct XrefIndex {
    proteins: HashMap<String, BTreeSet<String>>,
}

impl XrefIndex {
    pub fn load(padmet: &Path, settings: &XrefSettings) -> Result<Self> {
        let reader = BufReader::new(File::open(padmet)?);
        let mut index = Self::default();
        for line in reader.lines() {
            index.read_line(&line?, settings);
        }
        tracing::debug!(
            "{} reactions with cross references in {}",
            index.proteins.len(),
            padmet.display()
        );
        Ok(index)
    }

    fn read_line(&mut self, line: &str, settings: &XrefSettings) {
        let mut fields = line.trim_end().split('\t');
        if fields.next() != Some(XREF_NODE) {
            return;
        }
        let Some(reaction) = fields.next().and_then(|node| node.strip_suffix(XREF_SUFFIX)) else {
            return;
        };
        let misc: Vec<&str> = fields.collect();
        let ids = self.proteins.entry(reaction.to_string()).or_default();
        for pair in misc.chunks(2) {
            let &[key, values] = pair else { continue };
            let Some(namespace) = settings
                .namespaces
                .iter()
                .find(|ns| key.strip_suffix(settings.suffix.as_str()) == Some(ns.as_str()))
            else {
                continue;
            };
            ids.extend(
                values
                    .split(';')
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .map(|id| format!("{namespace}:{id}")),
            );
        }
    }

    /// Protein ids linked to `reaction`; `None` when the database has no
    /// cross-reference node for it.
    pub fn protein_ids(&self, reaction: &str) -> Option<&BTreeSet<String>> {
        self.proteins.get(reaction)
    }
}
