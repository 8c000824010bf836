use crate::tools::ToolError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MenevalError {
    /// A mandatory input file is absent.
    #[error("No file {} found", .0.display())]
    MissingInput(PathBuf),
    /// An optional stage cannot run because its evidence inputs are absent.
    #[error("Not all files found to run the {stage} step: {}", display_paths(.missing))]
    StageInputsMissing { stage: String, missing: Vec<PathBuf> },
    #[error("No padmet and sbml files found for running step {stage}")]
    NoPredecessor { stage: String },
    /// An external tool ran but its declared output does not exist.
    #[error("/!\\ {} not created !", .0.display())]
    ArtifactNotProduced(PathBuf),
    #[error(transparent)]
    Tool(#[from] ToolError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error("{0}")]
    Format(String),
}

pub type Result<T> = std::result::Result<T, MenevalError>;

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<String> for MenevalError {
    fn from(err: String) -> Self {
        MenevalError::Format(err)
    }
}
