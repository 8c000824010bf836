use serde::{Deserialize, Serialize};

pub const MENECO_ENV_BIN: &str = "MENEVAL_MENECO_BIN";
pub const PADMET_ENV_BIN: &str = "MENEVAL_PADMET_BIN";
pub const BLASTP_ENV_BIN: &str = "MENEVAL_BLASTP_BIN";
pub const TBLASTN_ENV_BIN: &str = "MENEVAL_TBLASTN_BIN";

const DEFAULT_MENECO_BIN: &str = "meneco";
const DEFAULT_PADMET_BIN: &str = "padmet";
const DEFAULT_BLASTP_BIN: &str = "blastp";
const DEFAULT_TBLASTN_BIN: &str = "tblastn";

/// Executables configured for the external tools. `None` defers to the
/// environment variable of the tool, then to a `PATH` lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolOverrides {
    pub meneco: Option<String>,
    pub padmet: Option<String>,
    pub blastp: Option<String>,
    pub tblastn: Option<String>,
}

/// Fully resolved executables, one per external tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolExecutables {
    pub meneco: String,
    pub padmet: String,
    pub blastp: String,
    pub tblastn: String,
}

impl ToolOverrides {
    pub fn resolve(&self) -> ToolExecutables {
        ToolExecutables {
            meneco: resolve_tool_executable(
                self.meneco.as_deref(),
                MENECO_ENV_BIN,
                DEFAULT_MENECO_BIN,
            ),
            padmet: resolve_tool_executable(
                self.padmet.as_deref(),
                PADMET_ENV_BIN,
                DEFAULT_PADMET_BIN,
            ),
            blastp: resolve_tool_executable(
                self.blastp.as_deref(),
                BLASTP_ENV_BIN,
                DEFAULT_BLASTP_BIN,
            ),
            tblastn: resolve_tool_executable(
                self.tblastn.as_deref(),
                TBLASTN_ENV_BIN,
                DEFAULT_TBLASTN_BIN,
            ),
        }
    }
}

impl ToolOverrides {
    /// `(tool, where its executable comes from)` for every external tool.
    pub fn resolution_labels(&self) -> [(&'static str, String); 4] {
        [
            (
                DEFAULT_MENECO_BIN,
                active_resolution_label(self.meneco.as_deref(), MENECO_ENV_BIN, DEFAULT_MENECO_BIN),
            ),
            (
                DEFAULT_PADMET_BIN,
                active_resolution_label(self.padmet.as_deref(), PADMET_ENV_BIN, DEFAULT_PADMET_BIN),
            ),
            (
                DEFAULT_BLASTP_BIN,
                active_resolution_label(self.blastp.as_deref(), BLASTP_ENV_BIN, DEFAULT_BLASTP_BIN),
            ),
            (
                DEFAULT_TBLASTN_BIN,
                active_resolution_label(
                    self.tblastn.as_deref(),
                    TBLASTN_ENV_BIN,
                    DEFAULT_TBLASTN_BIN,
                ),
            ),
        ]
    }
}

fn normalized_non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn configured_or_env(configured: Option<&str>, env_var: &str) -> Option<String> {
    configured.and_then(normalized_non_empty).or_else(|| {
        std::env::var(env_var)
            .ok()
            .and_then(|v| normalized_non_empty(&v))
    })
}

pub fn resolve_tool_executable(configured: Option<&str>, env_var: &str, default_bin: &str) -> String {
    configured_or_env(configured, env_var).unwrap_or_else(|| default_bin.to_string())
}

pub fn active_resolution_label(configured: Option<&str>, env_var: &str, default_bin: &str) -> String {
    configured_or_env(configured, env_var).unwrap_or_else(|| format!("PATH lookup: {default_bin}"))
}
