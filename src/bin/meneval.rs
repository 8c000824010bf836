use anyhow::{Context, Result};
use clap::Parser;
use meneval::{
    EnrichTarget, GroupMode, PipelineConfig, Workflow, logging::init_logging, stage::StageReport,
    tools::CommandToolkit,
};
use std::{path::PathBuf, process::ExitCode};

/// Gap-fill a draft metabolic network, keeping only reactions backed by
/// sequence or reference-network evidence.
#[derive(Debug, Parser)]
#[command(name = "meneval", version, about)]
struct Cli {
    /// Create the Input/ and Output/ directory tree
    #[arg(long)]
    init: bool,
    /// Check that the required input files are present
    #[arg(long)]
    check: bool,
    /// Generate the solver input files and the base network
    #[arg(long)]
    files: bool,
    /// Run the sequence-similarity stage
    #[arg(long)]
    blastp: bool,
    /// Run the enrichment stage of one group, or of every group with ALL
    #[arg(long, value_name = "GROUP|ALL")]
    enrich: Option<EnrichTarget>,
    /// Run the final fill stage and write the statistics
    #[arg(long)]
    fill: bool,
    /// Run check, files, blastp, enrich ALL and fill
    #[arg(long)]
    workflow: bool,
    /// Gap-fill again from the blastp network without enrichment reactions
    #[arg(long)]
    exclude: bool,

    /// Directory holding Input/ and Output/
    #[arg(long, value_name = "DIR", global = true)]
    root: Option<PathBuf>,
    /// JSON configuration file
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,
    /// How enrichment group stages chain
    #[arg(long, value_name = "sequential|parallel", global = true)]
    group_mode: Option<GroupMode>,
    /// Log file, relative to the root unless absolute
    #[arg(long, value_name = "FILE", global = true)]
    log_file: Option<PathBuf>,
    /// More detailed logs (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

impl Cli {
    fn pipeline_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_json_file(path)?,
            None => PipelineConfig::default(),
        };
        if let Some(root) = &self.root {
            config.root = root.clone();
        }
        if let Some(mode) = self.group_mode {
            config.group_mode = mode;
        }
        if let Some(log_file) = &self.log_file {
            config.log_file = log_file.clone();
        }
        Ok(config)
    }
}

fn summarize(report: &StageReport) {
    tracing::info!(
        "{} step (index {}) : {:?}, kept reactions : {}",
        report.stage,
        report.index,
        report.outcome,
        report
            .kept
            .map(|n| n.to_string())
            .unwrap_or_else(|| "-".to_string())
    );
}

fn run(cli: Cli) -> Result<()> {
    let config = cli.pipeline_config()?;
    init_logging(&config.log_path(), cli.verbose)
        .with_context(|| format!("Could not open log file {}", config.log_path().display()))?;

    let toolkit = CommandToolkit::new(config.tools.resolve());
    let workflow = Workflow::new(&config, &toolkit, &toolkit);

    if cli.workflow {
        for report in workflow.run_all()? {
            summarize(&report);
        }
    } else {
        if cli.init {
            workflow.init()?;
        }
        if cli.check {
            workflow.check()?;
        }
        if cli.files {
            workflow.generate_files()?;
        }
        if cli.blastp {
            if let Some(report) = workflow.run_sequence_stage()? {
                summarize(&report);
            }
        }
        if let Some(target) = &cli.enrich {
            for report in workflow.run_enrichment(target)? {
                summarize(&report);
            }
        }
        if cli.fill {
            summarize(&workflow.run_fill()?);
        }
    }
    if cli.exclude {
        summarize(&workflow.exclude_enrichment()?);
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
