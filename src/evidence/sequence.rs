//! Sequence-similarity evidence: a reaction is kept when one of its reference
//! proteins aligns against the species proteome, or against the species
//! genome when the proteome gives nothing.

use crate::{
    config::XrefSettings,
    error::{MenevalError, Result},
    evidence::{EvidenceFilter, FilteredReactionSet},
    fsutil::write_atomic,
    layout::{Layout, SequenceInputs},
    table::{Table, write_table},
    tools::{Aligner, AlignmentRequest},
    versioning::StageKind,
    xrefs::XrefIndex,
};
use bio::io::fasta;
use flate2::read::GzDecoder;
use itertools::Itertools;
use meneval_protocol::{AlignmentHit, AlignmentMethod};
use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    fs::File,
    io::Read,
    path::{Path, PathBuf},
};

const RXN_PROT_HEADER: [&str; 3] = ["Rxn ID", "Nb prot IDs", "Prot IDs (sep=;)"];
const BLAST_HEADER: [&str; 8] = [
    "Reaction",
    "Uniprot ID",
    "Sequence",
    "E value",
    "Bit score",
    "Identity (%)",
    "Length",
    "Blast method",
];

/// Protein sequences of the reference database, keyed by record id
/// (`UNIPROT:P12345`).
#[derive(Debug, Clone, Default)]
pub struct ProteinLibrary {
    sequences: HashMap<String, Vec<u8>>,
}

impl ProteinLibrary {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let is_gzip = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(".gz"));
        let reader: Box<dyn Read> = if is_gzip {
            Box::new(GzDecoder::new(file))
        } else {
            Box::new(file)
        };
        let sequences = fasta::Reader::new(reader)
            .records()
            .map(|record| {
                record
                    .map(|r| (r.id().to_string(), r.seq().to_vec()))
                    .map_err(|e| {
                        MenevalError::Format(format!("Could not read '{}': {e}", path.display()))
                    })
            })
            .collect::<Result<HashMap<_, _>>>()?;
        tracing::debug!("{} sequences loaded from {}", sequences.len(), path.display());
        Ok(Self { sequences })
    }

    pub fn get(&self, id: &str) -> Option<&[u8]> {
        self.sequences.get(id).map(Vec::as_slice)
    }
}

/// reaction -> reference protein id -> hits.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvidenceRecord {
    pub alignments: BTreeMap<String, BTreeMap<String, Vec<AlignmentHit>>>,
}

impl EvidenceRecord {
    pub fn add_reaction(&mut self, reaction: &str) {
        self.alignments.entry(reaction.to_string()).or_default();
    }

    pub fn record(&mut self, reaction: &str, protein: &str, hits: Vec<AlignmentHit>) {
        self.alignments
            .entry(reaction.to_string())
            .or_default()
            .entry(protein.to_string())
            .or_default()
            .extend(hits);
    }

    /// Reactions with at least one hit for at least one protein.
    pub fn kept(&self) -> BTreeSet<String> {
        self.alignments
            .iter()
            .filter(|(_, proteins)| proteins.values().any(|hits| !hits.is_empty()))
            .map(|(reaction, _)| reaction.clone())
            .collect()
    }

    /// Distinct subject ids hit for each kept reaction.
    pub fn genes(&self) -> BTreeMap<String, BTreeSet<String>> {
        self.alignments
            .iter()
            .map(|(reaction, proteins)| {
                let genes: BTreeSet<String> = proteins
                    .values()
                    .flatten()
                    .map(|hit| hit.subject_id.clone())
                    .collect();
                (reaction.clone(), genes)
            })
            .filter(|(_, genes)| !genes.is_empty())
            .collect()
    }

    fn to_table(&self) -> Table {
        let mut table = Table::new(BLAST_HEADER.iter().map(|h| h.to_string()).collect());
        for (reaction, proteins) in &self.alignments {
            for (protein, hits) in proteins {
                for hit in hits {
                    table.rows.push(vec![
                        reaction.clone(),
                        accession(protein).to_string(),
                        hit.subject_id.clone(),
                        format!("{:e}", hit.evalue),
                        hit.bit_score.to_string(),
                        hit.identity.to_string(),
                        hit.length.to_string(),
                        hit.method.label().to_string(),
                    ]);
                }
            }
        }
        table
    }
}

/// `UNIPROT:P12345` -> `P12345`.
fn accession(protein: &str) -> &str {
    protein
        .split_once(':')
        .map(|(_, accession)| accession)
        .unwrap_or(protein)
}

pub struct SequenceEvidence<'a> {
    layout: &'a Layout,
    inputs: SequenceInputs,
    xrefs: &'a XrefSettings,
    evalue: f64,
    aligner: &'a dyn Aligner,
}

impl<'a> SequenceEvidence<'a> {
    pub fn new(
        layout: &'a Layout,
        inputs: SequenceInputs,
        xrefs: &'a XrefSettings,
        evalue: f64,
        aligner: &'a dyn Aligner,
    ) -> Self {
        Self {
            layout,
            inputs,
            xrefs,
            evalue,
            aligner,
        }
    }

    pub fn results_dir(&self) -> PathBuf {
        self.layout.blastp_output_dir().join("results")
    }

    pub fn sequences_dir(&self) -> PathBuf {
        self.layout.blastp_output_dir().join("sequences")
    }

    fn linked_proteins(
        &self,
        candidates: &[String],
    ) -> Result<Vec<(String, BTreeSet<String>)>> {
        tracing::info!(
            "Start getting proteins linked to each reaction\n\
             ==============================================\n"
        );
        let index = XrefIndex::load(&self.inputs.database_padmet, self.xrefs)?;
        let linked: Vec<(String, BTreeSet<String>)> = candidates
            .iter()
            .map(|reaction| {
                tracing::info!("Extract Uniprot IDs linked to reaction {reaction}");
                let ids = index.protein_ids(reaction).cloned().unwrap_or_default();
                tracing::info!("{} Protein IDs linked to reaction {reaction}\n", ids.len());
                (reaction.clone(), ids)
            })
            .collect();

        let mut table = Table::new(RXN_PROT_HEADER.iter().map(|h| h.to_string()).collect());
        table.rows = linked
            .iter()
            .map(|(reaction, ids)| vec![reaction.clone(), ids.len().to_string(), ids.iter().join(";")])
            .collect();
        write_table(&self.results_dir().join("rxn_prot.tsv"), &table)?;
        Ok(linked)
    }

    /// Query FASTA of one reference protein, written on first use.
    fn query_file(&self, protein: &str, sequence: &[u8]) -> Result<PathBuf> {
        let name = accession(protein);
        let path = self.sequences_dir().join(format!("{name}.fasta"));
        if !path.exists() {
            let mut bytes = vec![];
            {
                let mut writer = fasta::Writer::new(&mut bytes);
                writer.write(name, None, sequence)?;
                writer.flush()?;
            }
            write_atomic(&path, &bytes)?;
        }
        Ok(path)
    }

    fn align(&self, method: AlignmentMethod, query: &Path, subject: &Path) -> Result<Vec<AlignmentHit>> {
        Ok(self.aligner.align(&AlignmentRequest {
            method,
            query,
            subject,
            evalue: self.evalue,
        })?)
    }

    /// Aligns every linked protein; the genome is only searched for proteins
    /// without a proteome hit.
    pub fn collect_evidence(&self, candidates: &[String]) -> Result<EvidenceRecord> {
        let linked = self.linked_proteins(candidates)?;
        let library = ProteinLibrary::load(&self.inputs.protein_library)?;
        let total: usize = linked.iter().map(|(_, ids)| ids.len()).sum();

        tracing::info!("Start blast alignments\n======================\n");
        let mut record = EvidenceRecord::default();
        let mut done = 0;
        for (reaction, proteins) in &linked {
            record.add_reaction(reaction);
            for protein in proteins {
                done += 1;
                tracing::info!("\nGet sequence for {protein} protein");
                let Some(sequence) = library.get(protein) else {
                    tracing::warn!(
                        "No sequence corresponding to {protein} in {} file.",
                        self.inputs.protein_library.display()
                    );
                    tracing::info!("{done}/{total} done");
                    continue;
                };
                let query = self.query_file(protein, sequence)?;

                tracing::info!(
                    "Blastp of protein {} for reaction {reaction} against {} proteome",
                    accession(protein),
                    self.inputs.proteome.display()
                );
                let mut hits = self.align(AlignmentMethod::Blastp, &query, &self.inputs.proteome)?;
                if hits.is_empty() {
                    if let Some(genome) = &self.inputs.genome {
                        tracing::info!(
                            "TBlastn of protein {} for reaction {reaction} against {} genome.",
                            accession(protein),
                            genome.display()
                        );
                        hits = self.align(AlignmentMethod::Tblastn, &query, genome)?;
                    }
                }
                record.record(reaction, protein, hits);
                tracing::info!("{done}/{total} done");
            }
        }
        write_table(&self.results_dir().join("blast_results.tsv"), &record.to_table())?;
        Ok(record)
    }
}

impl EvidenceFilter for SequenceEvidence<'_> {
    fn name(&self) -> String {
        StageKind::SequenceEvidence.to_string()
    }

    fn filter(&self, candidates: &[String]) -> Result<FilteredReactionSet> {
        tracing::info!(
            "Start searching alignments from Meneco output\n\
             =============================================\n"
        );
        let record = self.collect_evidence(candidates)?;
        let kept = record.kept();
        let genes = record.genes();
        tracing::info!(
            "\n\n{} reactions with alignment : {}",
            kept.len(),
            kept.iter().join(", ")
        );
        tracing::info!("=================\nEnd of alignments");
        Ok(FilteredReactionSet {
            kept,
            provenance: StageKind::SequenceEvidence.provenance(),
            genes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeAligner, write_file};
    use std::io::Write;
    use tempfile::tempdir;

    fn setup(root: &Path, genome: bool) -> SequenceInputs {
        let layout = Layout::new(root);
        let database_padmet = layout.database_dir().join("metacyc.padmet");
        write_file(
            &database_padmet,
            "xref\tRXN-1_xrefs\tUNIPROT_70\tP00001;P00002\n\
             xref\tRXN-2_xrefs\tPID_70\tAAA2\n",
        );
        let protein_library = layout.database_dir().join("prot.fasta");
        write_file(
            &protein_library,
            ">UNIPROT:P00002\nMKTAYIAK\n>PID:AAA2\nMSSHHKL\n",
        );
        let proteome = layout.species_dir().join("sp.faa");
        write_file(&proteome, ">g1\nMKTAYIAK\n");
        let genome = genome.then(|| {
            let path = layout.species_dir().join("sp.fna");
            write_file(&path, ">chr\nATGAAA\n");
            path
        });
        SequenceInputs {
            database_padmet,
            protein_library,
            proteome,
            genome,
        }
    }

    #[test]
    fn protein_without_sequence_is_skipped_and_second_hit_keeps_reaction() {
        let td = tempdir().unwrap();
        let layout = Layout::new(td.path());
        let inputs = setup(td.path(), false);
        let aligner = FakeAligner::default().hit("P00002", AlignmentMethod::Blastp, "gene_7");
        let xrefs = XrefSettings::default();
        let evidence = SequenceEvidence::new(&layout, inputs, &xrefs, 1e-10, &aligner);

        let candidates = vec!["RXN-1".to_string(), "RXN-2".to_string(), "RXN-3".to_string()];
        let filtered = evidence.filter(&candidates).unwrap();

        assert_eq!(filtered.kept, BTreeSet::from(["RXN-1".to_string()]));
        assert!(filtered.kept.is_subset(&candidates.iter().cloned().collect()));
        assert_eq!(filtered.provenance.as_deref(), Some("Gap-filling BlastP hit"));
        assert_eq!(filtered.gene_association("RXN-1"), "(gene_7)");

        // P00001 has no sequence: only P00002 and AAA2 were aligned.
        let queries = aligner.queries();
        assert_eq!(queries.len(), 2);
        assert!(queries.iter().all(|(method, _)| *method == AlignmentMethod::Blastp));

        let results = std::fs::read_to_string(evidence.results_dir().join("blast_results.tsv")).unwrap();
        let rows: Vec<&str> = results.lines().collect();
        assert_eq!(rows.len(), 2);
        assert!(rows[1].starts_with("RXN-1\tP00002\tgene_7\t"));
        assert!(rows[1].ends_with("\tBlastp"));

        let rxn_prot = std::fs::read_to_string(evidence.results_dir().join("rxn_prot.tsv")).unwrap();
        assert!(rxn_prot.contains("RXN-1\t2\tUNIPROT:P00001;UNIPROT:P00002"));
        assert!(rxn_prot.contains("RXN-3\t0\t"));
        assert!(evidence.sequences_dir().join("P00002.fasta").exists());
        assert!(!evidence.sequences_dir().join("P00001.fasta").exists());
    }

    #[test]
    fn genome_is_searched_only_without_proteome_hit() {
        let td = tempdir().unwrap();
        let layout = Layout::new(td.path());
        let inputs = setup(td.path(), true);
        let aligner = FakeAligner::default()
            .hit("P00002", AlignmentMethod::Blastp, "gene_7")
            .hit("AAA2", AlignmentMethod::Tblastn, "chr");
        let xrefs = XrefSettings::default();
        let evidence = SequenceEvidence::new(&layout, inputs, &xrefs, 1e-10, &aligner);

        let filtered = evidence
            .filter(&["RXN-1".to_string(), "RXN-2".to_string()])
            .unwrap();
        assert_eq!(filtered.len(), 2);
        let methods: Vec<AlignmentMethod> = aligner.queries().into_iter().map(|(m, _)| m).collect();
        assert_eq!(
            methods,
            vec![AlignmentMethod::Blastp, AlignmentMethod::Blastp, AlignmentMethod::Tblastn]
        );
    }

    #[test]
    fn gzip_library_is_read() {
        let td = tempdir().unwrap();
        let path = td.path().join("prot.fasta.gz");
        let mut encoder =
            flate2::write::GzEncoder::new(File::create(&path).unwrap(), flate2::Compression::default());
        encoder.write_all(b">UNIPROT:Q1\nMKV\n").unwrap();
        encoder.finish().unwrap();
        let library = ProteinLibrary::load(&path).unwrap();
        assert_eq!(library.get("UNIPROT:Q1"), Some(&b"MKV"[..]));
        assert_eq!(library.get("UNIPROT:Q2"), None);
    }
}
