pub mod config;
pub mod error;
pub mod evidence;
pub mod files_generator;
pub mod fsutil;
pub mod layout;
pub mod logging;
pub mod sbml;
pub mod stage;
pub mod stats;
pub mod table;
pub mod tool_overrides;
pub mod tools;
pub mod versioning;
pub mod workflow;
pub mod xrefs;

#[cfg(test)]
mod test_support;

pub use config::{GroupMode, PipelineConfig};
pub use error::{MenevalError, Result};
pub use workflow::{EnrichTarget, Workflow};
