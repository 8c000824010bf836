//! Typed interfaces to the external programs the pipeline drives: the
//! gap-filling solver, the padmet conversion/curation suite and BLAST.
//!
//! Commands are built as argument arrays, never shell strings. A non-zero
//! exit status is an error; tools writing files write into a staging
//! directory next to the declared output, which is renamed in place once
//! the process succeeded.

use crate::tool_overrides::{
    BLASTP_ENV_BIN, MENECO_ENV_BIN, PADMET_ENV_BIN, TBLASTN_ENV_BIN, ToolExecutables,
};
use meneval_protocol::{AlignmentHit, AlignmentMethod};
use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    process::{Command, Output},
};
use thiserror::Error;

pub const BLAST_OUTFMT: &str = "6 sseqid evalue bitscore pident length";

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Could not find {tool} executable '{executable}'. Install {tool} or set {env_var}")]
    ToolNotFound {
        tool: &'static str,
        executable: String,
        env_var: &'static str,
    },
    #[error(
        "{tool} command failed: {executable} {} (status={status:?}, stdout='{}', stderr='{}')",
        .args.join(" "),
        .stdout.trim(),
        .stderr.trim()
    )]
    ToolFailed {
        tool: &'static str,
        executable: String,
        args: Vec<String>,
        status: Option<i32>,
        stdout: String,
        stderr: String,
    },
    #[error("Could not parse {tool} output line '{line}': {reason}")]
    MalformedOutput {
        tool: &'static str,
        line: String,
        reason: String,
    },
    #[error("{message}")]
    Io { message: String },
}

#[derive(Debug, Clone, Copy)]
pub struct SolverRequest<'a> {
    pub draft: &'a Path,
    pub seeds: &'a Path,
    pub targets: &'a Path,
    pub repair: &'a Path,
    pub output: &'a Path,
}

/// Normalizes a raw solver result into the tabular reaction list.
#[derive(Debug, Clone, Copy)]
pub struct EnhanceRequest<'a> {
    pub result: &'a Path,
    pub reference: &'a Path,
    pub output: &'a Path,
}

/// Adds the reactions of `data` to `network`.
#[derive(Debug, Clone, Copy)]
pub struct CurationRequest<'a> {
    pub network: &'a Path,
    pub data: &'a Path,
    pub reference: Option<&'a Path>,
    pub output: &'a Path,
    pub tool: Option<&'a str>,
    pub category: &'a str,
}

#[derive(Debug, Clone, Copy)]
pub struct MediumRequest<'a> {
    pub network: &'a Path,
    pub seeds: &'a Path,
    pub reference: &'a Path,
    pub output: &'a Path,
}

#[derive(Debug, Clone, Copy)]
pub struct AlignmentRequest<'a> {
    pub method: AlignmentMethod,
    pub query: &'a Path,
    pub subject: &'a Path,
    pub evalue: f64,
}

/// The solver plus the network conversion and curation tools.
pub trait NetworkToolkit {
    fn solve(&self, request: &SolverRequest) -> Result<(), ToolError>;
    fn enhance_result(&self, request: &EnhanceRequest) -> Result<(), ToolError>;
    fn curate(&self, request: &CurationRequest) -> Result<(), ToolError>;
    fn padmet_to_sbml(&self, padmet: &Path, output: &Path) -> Result<(), ToolError>;
    fn compounds_to_sbml(&self, compounds: &Path, output: &Path) -> Result<(), ToolError>;
    fn apply_medium(&self, request: &MediumRequest) -> Result<(), ToolError>;
}

pub trait Aligner {
    fn align(&self, request: &AlignmentRequest) -> Result<Vec<AlignmentHit>, ToolError>;
}

#[derive(Debug, Clone, Copy)]
struct ToolSpec {
    name: &'static str,
    env_var: &'static str,
}

const MENECO: ToolSpec = ToolSpec {
    name: "meneco",
    env_var: MENECO_ENV_BIN,
};
const PADMET: ToolSpec = ToolSpec {
    name: "padmet",
    env_var: PADMET_ENV_BIN,
};
const BLASTP: ToolSpec = ToolSpec {
    name: "blastp",
    env_var: BLASTP_ENV_BIN,
};
const TBLASTN: ToolSpec = ToolSpec {
    name: "tblastn",
    env_var: TBLASTN_ENV_BIN,
};

fn run_tool(spec: ToolSpec, executable: &str, args: &[String]) -> Result<Output, ToolError> {
    tracing::debug!("{} {}", executable, args.join(" "));
    let output = Command::new(executable).args(args).output().map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            ToolError::ToolNotFound {
                tool: spec.name,
                executable: executable.to_string(),
                env_var: spec.env_var,
            }
        } else {
            ToolError::Io {
                message: format!(
                    "Could not run {} executable '{}' with args [{}]: {}",
                    spec.name,
                    executable,
                    args.join(" "),
                    e
                ),
            }
        }
    })?;
    if !output.status.success() {
        return Err(ToolError::ToolFailed {
            tool: spec.name,
            executable: executable.to_string(),
            args: args.to_vec(),
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }
    Ok(output)
}

fn io_error(context: &str, path: &Path, e: std::io::Error) -> ToolError {
    ToolError::Io {
        message: format!("{context} '{}': {e}", path.display()),
    }
}

/// Runs `produce` against a path inside a fresh staging directory beside
/// `output`, then moves the staged file to `output` if it was written.
fn staged<F>(output: &Path, produce: F) -> Result<(), ToolError>
where
    F: FnOnce(&Path) -> Result<(), ToolError>,
{
    let parent = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&parent)
        .map_err(|e| io_error("Could not create output directory", &parent, e))?;
    let staging = tempfile::Builder::new()
        .prefix(".meneval-staging-")
        .tempdir_in(&parent)
        .map_err(|e| io_error("Could not create staging directory in", &parent, e))?;
    let file_name = output.file_name().ok_or_else(|| ToolError::Io {
        message: format!("Output path '{}' has no file name", output.display()),
    })?;
    let staged_path = staging.path().join(file_name);
    produce(&staged_path)?;
    if staged_path.exists() {
        fs::rename(&staged_path, output)
            .map_err(|e| io_error("Could not move staged output to", output, e))?;
    }
    Ok(())
}

fn arg(flag: &str, path: &Path) -> String {
    format!("{flag}={}", path.display())
}

/// Subprocess implementation of [`NetworkToolkit`] and [`Aligner`].
#[derive(Debug, Clone)]
pub struct CommandToolkit {
    executables: ToolExecutables,
}

impl CommandToolkit {
    pub fn new(executables: ToolExecutables) -> Self {
        Self { executables }
    }

    fn padmet(&self, args: Vec<String>) -> Result<Output, ToolError> {
        run_tool(PADMET, &self.executables.padmet, &args)
    }
}

impl NetworkToolkit for CommandToolkit {
    fn solve(&self, request: &SolverRequest) -> Result<(), ToolError> {
        let args = vec![
            "-d".to_string(),
            request.draft.display().to_string(),
            "-s".to_string(),
            request.seeds.display().to_string(),
            "-t".to_string(),
            request.targets.display().to_string(),
            "-r".to_string(),
            request.repair.display().to_string(),
            "--json".to_string(),
        ];
        staged(request.output, |path| {
            let output = run_tool(MENECO, &self.executables.meneco, &args)?;
            fs::write(path, &output.stdout)
                .map_err(|e| io_error("Could not write solver result", path, e))
        })
    }

    fn enhance_result(&self, request: &EnhanceRequest) -> Result<(), ToolError> {
        staged(request.output, |path| {
            self.padmet(vec![
                "enhanced_meneco_output".to_string(),
                arg("--meneco", request.result),
                arg("--padmetRef", request.reference),
                arg("--output", path),
                "--json".to_string(),
                "-v".to_string(),
            ])
            .map(|_| ())
        })
    }

    fn curate(&self, request: &CurationRequest) -> Result<(), ToolError> {
        staged(request.output, |path| {
            let mut args = vec![
                "manual_curation".to_string(),
                arg("--padmetSpec", request.network),
                arg("--data", request.data),
            ];
            if let Some(reference) = request.reference {
                args.push(arg("--padmetRef", reference));
            }
            args.push(arg("--output", path));
            if let Some(tool) = request.tool {
                args.push(format!("--tool={tool}"));
            }
            args.push(format!("--category={}", request.category));
            args.push("-v".to_string());
            self.padmet(args).map(|_| ())
        })
    }

    fn padmet_to_sbml(&self, padmet: &Path, output: &Path) -> Result<(), ToolError> {
        staged(output, |path| {
            self.padmet(vec![
                "sbmlGenerator".to_string(),
                arg("--padmet", padmet),
                arg("--output", path),
            ])
            .map(|_| ())
        })
    }

    fn compounds_to_sbml(&self, compounds: &Path, output: &Path) -> Result<(), ToolError> {
        staged(output, |path| {
            self.padmet(vec![
                "sbmlGenerator".to_string(),
                arg("--compound", compounds),
                arg("--output", path),
            ])
            .map(|_| ())
        })
    }

    fn apply_medium(&self, request: &MediumRequest) -> Result<(), ToolError> {
        staged(request.output, |path| {
            self.padmet(vec![
                "padmet_medium".to_string(),
                arg("--padmetSpec", request.network),
                arg("--seeds", request.seeds),
                arg("--padmetRef", request.reference),
                arg("--output", path),
            ])
            .map(|_| ())
        })
    }
}

impl Aligner for CommandToolkit {
    fn align(&self, request: &AlignmentRequest) -> Result<Vec<AlignmentHit>, ToolError> {
        let (spec, executable) = match request.method {
            AlignmentMethod::Blastp => (BLASTP, &self.executables.blastp),
            AlignmentMethod::Tblastn => (TBLASTN, &self.executables.tblastn),
        };
        let args = vec![
            "-query".to_string(),
            request.query.display().to_string(),
            "-subject".to_string(),
            request.subject.display().to_string(),
            "-evalue".to_string(),
            format!("{:e}", request.evalue),
            "-outfmt".to_string(),
            BLAST_OUTFMT.to_string(),
        ];
        let output = run_tool(spec, executable, &args)?;
        parse_tabular_hits(
            spec.name,
            &String::from_utf8_lossy(&output.stdout),
            request.method,
        )
    }
}

/// Parses `-outfmt "6 sseqid evalue bitscore pident length"` output.
pub fn parse_tabular_hits(
    tool: &'static str,
    stdout: &str,
    method: AlignmentMethod,
) -> Result<Vec<AlignmentHit>, ToolError> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| {
            let malformed = |reason: String| ToolError::MalformedOutput {
                tool,
                line: line.to_string(),
                reason,
            };
            let fields: Vec<&str> = line.split_whitespace().collect();
            let &[subject_id, evalue, bit_score, identity, length] = fields.as_slice() else {
                return Err(malformed(format!("expected 5 fields, found {}", fields.len())));
            };
            let number = |value: &str| {
                value
                    .parse::<f64>()
                    .map_err(|e| malformed(format!("invalid number '{value}': {e}")))
            };
            Ok(AlignmentHit {
                subject_id: subject_id.to_string(),
                evalue: number(evalue)?,
                bit_score: number(bit_score)?,
                identity: number(identity)?,
                length: length
                    .parse::<u64>()
                    .map_err(|e| malformed(format!("invalid length '{length}': {e}")))?,
                method,
            })
        })
        .collect()
}
