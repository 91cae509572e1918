use anyhow::Context;
use clap::{ArgAction, Parser};
use scanflow_core::{
    ExecutionStatus, ExportFormat, GmpConnector, Orchestrator, ProgressObservation,
    ScanflowConfig, StepExecution, WorkflowObserver, WorkflowOptions, WorkflowRequest,
    WorkflowResult,
};
use serde_json::json;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "scanflow",
    author,
    version,
    about = "Create, run and export a vulnerability scan through the Greenbone management daemon"
)]
struct ScanflowCli {
    /// Hosts to scan, comma separated
    hosts: String,
    /// Port range for the target, e.g. "1-1024" or "T:80,U:53"
    ports: String,
    /// Name of the target to create
    target_name: String,
    /// Name of the task to create; also prefixes the report files
    task_name: String,
    /// YAML configuration file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Path of the daemon's unix socket
    #[arg(long)]
    socket: Option<PathBuf>,
    #[arg(long)]
    username: Option<String>,
    #[arg(long)]
    password: Option<String>,
    /// Scanner matcher: a name substring, `id:<uuid>` or `re:<regex>`
    #[arg(long)]
    scanner: Option<String>,
    /// Scan configuration matcher, same syntax as --scanner
    #[arg(long = "scan-config")]
    scan_config: Option<String>,
    /// Report format to export (pdf, csv, txt). Repeat for multiple formats.
    #[arg(long = "format", value_parser = parse_format, action = ArgAction::Append)]
    formats: Vec<ExportFormat>,
    /// Skip the CSV to JSON conversion
    #[arg(long)]
    no_json: bool,
    /// Directory the reports are written to
    #[arg(long)]
    output_dir: Option<PathBuf>,
    /// Seconds between status queries
    #[arg(long)]
    poll_interval: Option<u64>,
    /// Give up waiting for the scan after this many seconds
    #[arg(long)]
    timeout: Option<u64>,
    /// Delete the target and task when the run aborts before the scan finishes
    #[arg(long)]
    cleanup_on_failure: bool,
    /// Output JSON instead of a human-readable summary
    #[arg(long)]
    json: bool,
    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> anyhow::Result<()> {
    let cli = ScanflowCli::parse();
    init_logging(&cli.log_level);

    let config = build_config(&cli)?;
    debug!(?config, "configuration resolved");
    let options = WorkflowOptions::from_config(&config)
        .map_err(|err| anyhow::anyhow!("invalid matcher: {err}"))?;
    let request = WorkflowRequest {
        hosts: cli.hosts.clone(),
        port_range: cli.ports.clone(),
        target_name: cli.target_name.clone(),
        task_name: cli.task_name.clone(),
    };

    let orchestrator = Orchestrator::new(GmpConnector::new(config.connection.clone()), options);
    let observer = ConsoleObserver { quiet: cli.json };
    let result = orchestrator
        .run_observed(&request, &observer)
        .with_context(|| format!("scan workflow for task '{}' failed", request.task_name))?;

    output_run(&request, &result, cli.json)
}

fn init_logging(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// File and environment first, flags last.
fn build_config(cli: &ScanflowCli) -> anyhow::Result<ScanflowConfig> {
    let mut config = ScanflowConfig::load(cli.config.as_deref())?;

    if let Some(socket) = &cli.socket {
        config.connection.socket_path = socket.clone();
    }
    if let Some(username) = &cli.username {
        config.connection.username = username.clone();
    }
    if let Some(password) = &cli.password {
        config.connection.password = password.clone();
    }
    if let Some(scanner) = &cli.scanner {
        config.scanner = scanner.clone();
    }
    if let Some(scan_config) = &cli.scan_config {
        config.scan_config = scan_config.clone();
    }
    if !cli.formats.is_empty() {
        config.formats = cli.formats.clone();
    }
    if cli.no_json {
        config.convert_json = false;
    }
    if let Some(output_dir) = &cli.output_dir {
        config.output_dir = output_dir.clone();
    }
    if let Some(interval) = cli.poll_interval {
        config.poll.interval_secs = interval;
    }
    if let Some(timeout) = cli.timeout {
        config.poll.timeout_secs = Some(timeout);
    }
    if cli.cleanup_on_failure {
        config.cleanup_on_failure = true;
    }

    config.validate()?;
    Ok(config)
}

struct ConsoleObserver {
    quiet: bool,
}

impl WorkflowObserver for ConsoleObserver {
    fn on_listing(&self, title: &str, listing: &str) {
        if !self.quiet {
            println!("{title}:\n{listing}\n");
        }
    }

    fn on_step(&self, step: &StepExecution) {
        if self.quiet {
            return;
        }
        let marker = match step.status {
            ExecutionStatus::Completed => "ok",
            ExecutionStatus::Skipped => "skip",
            ExecutionStatus::Failed => "fail",
        };
        match &step.message {
            Some(message) => println!("[{marker}] {}: {}", step.name, message),
            None => println!("[{marker}] {}", step.name),
        }
    }

    fn on_progress(&self, observation: &ProgressObservation) {
        if !self.quiet {
            println!("Scanning is in progress... {}% complete.", observation.progress);
        }
    }
}

fn output_run(request: &WorkflowRequest, result: &WorkflowResult, json: bool) -> anyhow::Result<()> {
    if json {
        let payload = json!({
            "request": request,
            "target_id": result.target_id,
            "task_id": result.task_id,
            "report_id": result.report_id,
            "artifacts": result.artifacts,
            "warnings": result.warnings,
            "steps": result.steps,
            "started_at": result.started_at,
            "finished_at": result.finished_at,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        println!("\n{result}");
        if !result.artifacts.is_empty() {
            println!("Artifacts:");
            for artifact in &result.artifacts {
                println!(
                    "  - {} ({} bytes) -> {}",
                    artifact.format,
                    artifact.bytes,
                    artifact.path.display()
                );
            }
        }
        if result.has_warnings() {
            println!("\n[warn] {} warning(s):", result.warnings.len());
            for warning in &result.warnings {
                println!("  - {warning}");
            }
        }
    }
    Ok(())
}

fn parse_format(s: &str) -> Result<ExportFormat, String> {
    s.parse()
}
