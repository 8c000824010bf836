use crate::{
    error::{MenevalError, Result},
    layout::Layout,
    tool_overrides::ToolOverrides,
};
use serde::{Deserialize, Serialize};
use std::{
    fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
};

pub const DEFAULT_EVALUE: f64 = 1e-10;
pub const DEFAULT_LOG_FILE: &str = "meneco_validation.log";

/// How enrichment group snapshots relate to each other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GroupMode {
    /// Each group stage builds on the previous group's snapshot.
    #[default]
    Sequential,
    /// Every group stage roots at the latest non-group snapshot.
    Parallel,
}

impl fmt::Display for GroupMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequential => f.write_str("sequential"),
            Self::Parallel => f.write_str("parallel"),
        }
    }
}

impl FromStr for GroupMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" | "sequential-groups" => Ok(Self::Sequential),
            "parallel" | "parallel-groups" => Ok(Self::Parallel),
            other => Err(format!(
                "Unknown group mode '{other}', expected 'sequential' or 'parallel'"
            )),
        }
    }
}

/// Cross-reference namespaces holding reference protein ids in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct XrefSettings {
    pub namespaces: Vec<String>,
    pub suffix: String,
}

impl Default for XrefSettings {
    fn default() -> Self {
        Self {
            namespaces: vec!["UNIPROT".to_string(), "PID".to_string()],
            suffix: "_70".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory holding `Input/` and `Output/`.
    pub root: PathBuf,
    /// Alignment significance threshold for both BLAST methods.
    pub evalue: f64,
    pub group_mode: GroupMode,
    /// Running log, relative to `root` unless absolute.
    pub log_file: PathBuf,
    pub xrefs: XrefSettings,
    pub tools: ToolOverrides,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            evalue: DEFAULT_EVALUE,
            group_mode: GroupMode::default(),
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
            xrefs: XrefSettings::default(),
            tools: ToolOverrides::default(),
        }
    }
}

impl PipelineConfig {
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            MenevalError::Format(format!(
                "Could not read configuration '{}': {e}",
                path.display()
            ))
        })?;
        serde_json::from_str(&text).map_err(|e| {
            MenevalError::Format(format!(
                "Could not parse configuration '{}': {e}",
                path.display()
            ))
        })
    }

    pub fn layout(&self) -> Layout {
        Layout::new(&self.root)
    }

    pub fn log_path(&self) -> PathBuf {
        if self.log_file.is_absolute() {
            self.log_file.clone()
        } else {
            self.root.join(&self.log_file)
        }
    }
}
