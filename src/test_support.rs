//! Fakes of the external tools, recording every invocation.

use crate::{
    layout::Layout,
    sbml::plain_id,
    tools::{
        Aligner, AlignmentRequest, CurationRequest, EnhanceRequest, MediumRequest, NetworkToolkit,
        SolverRequest, ToolError,
    },
};
use meneval_protocol::{AlignmentHit, AlignmentMethod, GapfillResult};
use std::{
    cell::RefCell,
    fs,
    path::{Path, PathBuf},
};

pub fn write_file(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn name_of(path: &Path) -> String {
    path.file_name().unwrap().to_string_lossy().to_string()
}

fn io(e: std::io::Error) -> ToolError {
    ToolError::Io {
        message: e.to_string(),
    }
}

/// Solver answering with one fixed result per call, in call order; the last
/// result repeats.
#[derive(Debug, Default)]
pub struct FakeToolkit {
    results: Vec<GapfillResult>,
    calls: RefCell<Vec<String>>,
    silent: bool,
}

impl FakeToolkit {
    pub fn answering(results: Vec<GapfillResult>) -> Self {
        Self {
            results,
            ..Self::default()
        }
    }

    /// Succeeds without writing any output.
    pub fn silent() -> Self {
        Self {
            silent: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn count(&self, tool: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|call| call.split_whitespace().next() == Some(tool))
            .count()
    }

    fn record(&self, call: String) {
        self.calls.borrow_mut().push(call);
    }

    fn write(&self, path: &Path, content: &str) -> Result<(), ToolError> {
        if self.silent {
            return Ok(());
        }
        fs::write(path, content).map_err(io)
    }
}

/// Gap-filling result with the given unproducible targets and completion.
pub fn gapfill(unproducible: &[&str], union: &[&str]) -> GapfillResult {
    GapfillResult {
        unproducible_targets: unproducible.iter().map(|s| s.to_string()).collect(),
        reconstructable_targets: unproducible.iter().map(|s| s.to_string()).collect(),
        union_of_minimal_completions: union.iter().map(|s| s.to_string()).collect(),
        one_minimal_completion: union.iter().take(1).map(|s| s.to_string()).collect(),
        ..GapfillResult::default()
    }
}

impl NetworkToolkit for FakeToolkit {
    fn solve(&self, request: &SolverRequest) -> Result<(), ToolError> {
        let round = self.count("solve");
        self.record(format!("solve {}", name_of(request.draft)));
        let result = self
            .results
            .get(round)
            .or(self.results.last())
            .cloned()
            .unwrap_or_default();
        self.write(request.output, &serde_json::to_string_pretty(&result).unwrap())
    }

    fn enhance_result(&self, request: &EnhanceRequest) -> Result<(), ToolError> {
        self.record(format!("enhance {}", name_of(request.result)));
        let text = fs::read_to_string(request.result).map_err(io)?;
        let result = GapfillResult::from_json_str(&text).unwrap();
        let mut tsv = "idRef\tComment\tAction\n".to_string();
        for reaction in &result.union_of_minimal_completions {
            tsv.push_str(&format!("{}\tmeneco\tadd\n", plain_id(reaction)));
        }
        self.write(request.output, &tsv)
    }

    fn curate(&self, request: &CurationRequest) -> Result<(), ToolError> {
        self.record(format!(
            "curate {} {} {}",
            name_of(request.network),
            name_of(request.data),
            request.category
        ));
        let mut network = fs::read_to_string(request.network).map_err(io)?;
        let data = fs::read_to_string(request.data).map_err(io)?;
        for line in data.lines().skip(1) {
            if let Some(reaction) = line.split('\t').next().filter(|r| !r.is_empty()) {
                network.push_str(&format!("reaction\t{reaction}\n"));
            }
        }
        self.write(request.output, &network)
    }

    fn padmet_to_sbml(&self, padmet: &Path, output: &Path) -> Result<(), ToolError> {
        self.record(format!("sbml {}", name_of(padmet)));
        let network = fs::read_to_string(padmet).map_err(io)?;
        self.write(output, &network)
    }

    fn compounds_to_sbml(&self, compounds: &Path, output: &Path) -> Result<(), ToolError> {
        self.record(format!("compounds {}", name_of(compounds)));
        let content = fs::read_to_string(compounds).map_err(io)?;
        self.write(output, &content)
    }

    fn apply_medium(&self, request: &MediumRequest) -> Result<(), ToolError> {
        self.record(format!("medium {}", name_of(request.network)));
        let network = fs::read_to_string(request.network).map_err(io)?;
        self.write(request.output, &network)
    }
}

/// Aligner hitting for chosen query accessions and methods.
#[derive(Debug, Default)]
pub struct FakeAligner {
    hits: Vec<(String, AlignmentMethod, String)>,
    queries: RefCell<Vec<(AlignmentMethod, PathBuf)>>,
}

impl FakeAligner {
    pub fn hit(mut self, accession: &str, method: AlignmentMethod, subject: &str) -> Self {
        self.hits
            .push((accession.to_string(), method, subject.to_string()));
        self
    }

    pub fn queries(&self) -> Vec<(AlignmentMethod, PathBuf)> {
        self.queries.borrow().clone()
    }
}

impl Aligner for FakeAligner {
    fn align(&self, request: &AlignmentRequest) -> Result<Vec<AlignmentHit>, ToolError> {
        self.queries
            .borrow_mut()
            .push((request.method, request.query.to_path_buf()));
        let accession = request.query.file_stem().unwrap().to_string_lossy().to_string();
        Ok(self
            .hits
            .iter()
            .filter(|(a, method, _)| *a == accession && *method == request.method)
            .map(|(_, method, subject)| AlignmentHit {
                subject_id: subject.clone(),
                evalue: 1e-30,
                bit_score: 120.5,
                identity: 55.2,
                length: 300,
                method: *method,
            })
            .collect())
    }
}

/// Root with the mandatory inputs, the generated solver inputs and the
/// bootstrap snapshot in place.
pub fn bootstrapped_root(root: &Path) -> Layout {
    let layout = Layout::new(root);
    layout.create_folders().unwrap();
    write_file(&layout.in_targets(), "1.0\tLYS\n");
    write_file(&layout.in_seeds(), "GLC\n");
    write_file(&layout.in_artefacts(), "ATP\n");
    write_file(&layout.database_dir().join("metacyc.padmet"), "xref\tRXN-1_xrefs\tUNIPROT_70\tP00001\n");
    write_file(&layout.draft_networks_dir().join("species.padmet"), "reaction\tDRAFT\n");
    write_file(&layout.seeds_artefacts_sbml(), "<sbml/>");
    write_file(&layout.targets_sbml(), "<sbml/>");
    write_file(&layout.database_sbml(), "<sbml/>");
    let bootstrap = layout.bootstrap_snapshot();
    write_file(&bootstrap.padmet, "reaction\tBASE\n");
    write_file(&bootstrap.sbml, "reaction\tBASE\n");
    layout
}
