use crate::client::{Connect, ScanService};
use crate::config::ScanflowConfig;
use crate::convert::csv_to_json;
use crate::error::{RemoteStep, ResourceKind, WorkflowError, WorkflowWarning};
use crate::export::{artifact_path, ExportOutcome, ReportExporter};
use crate::model::{ExportArtifact, ExportFormat, TargetSpec};
use crate::poll::{
    poll_until_done, CancelToken, Clock, PollError, PollSettings, ProgressObservation, SystemClock,
};
use crate::resolver::{engine_listing, policy_listing, resolve, Matcher};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::PathBuf;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{info, warn};

/// Enumeration filter asking the daemon for every row.
pub const ALL_ROWS_FILTER: &str = "rows=-1";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkflowRequest {
    /// Comma separated host expression.
    pub hosts: String,
    pub port_range: String,
    pub target_name: String,
    pub task_name: String,
}

#[derive(Debug, Clone)]
pub struct WorkflowOptions {
    pub scanner: Matcher,
    pub scan_config: Matcher,
    pub formats: Vec<ExportFormat>,
    pub convert_json: bool,
    pub output_dir: PathBuf,
    pub poll: PollSettings,
    /// Delete what this run created when it aborts.
    pub cleanup_on_failure: bool,
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self {
            scanner: Matcher::name_contains("OpenVAS Default"),
            scan_config: Matcher::name_contains("Full and fast"),
            formats: vec![ExportFormat::Pdf, ExportFormat::Csv],
            convert_json: true,
            output_dir: PathBuf::from("."),
            poll: PollSettings::default(),
            cleanup_on_failure: false,
        }
    }
}

impl WorkflowOptions {
    pub fn from_config(config: &ScanflowConfig) -> Result<Self, String> {
        Ok(Self {
            scanner: config.scanner.parse()?,
            scan_config: config.scan_config.parse()?,
            formats: config.formats.clone(),
            convert_json: config.convert_json,
            output_dir: config.output_dir.clone(),
            poll: PollSettings {
                interval: config.poll.interval(),
                deadline: config.poll.timeout(),
            },
            cleanup_on_failure: config.cleanup_on_failure,
        })
    }
}

/// Hooks for callers that want to display the run as it happens.
pub trait WorkflowObserver {
    fn on_listing(&self, _title: &str, _listing: &str) {}
    fn on_step(&self, _step: &StepExecution) {}
    fn on_progress(&self, _observation: &ProgressObservation) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl WorkflowObserver for NoopObserver {}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum StepKind {
    ResolveEngine,
    ResolvePolicy,
    CreateTarget,
    CreateTask,
    StartTask,
    Poll,
    ResolveReport,
    Export,
    Convert,
    Cleanup,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ExecutionStatus {
    Completed,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepExecution {
    pub name: String,
    pub kind: StepKind,
    pub status: ExecutionStatus,
    pub message: Option<String>,
}

impl StepExecution {
    pub fn completed(name: impl Into<String>, kind: StepKind, message: Option<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            status: ExecutionStatus::Completed,
            message,
        }
    }

    pub fn failed(name: impl Into<String>, kind: StepKind, message: Option<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            status: ExecutionStatus::Failed,
            message,
        }
    }

    pub fn skipped(name: impl Into<String>, kind: StepKind, message: Option<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            status: ExecutionStatus::Skipped,
            message,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub target_id: String,
    pub task_id: String,
    pub report_id: String,
    pub artifacts: Vec<ExportArtifact>,
    pub warnings: Vec<WorkflowWarning>,
    pub steps: Vec<StepExecution>,
    pub started_at: String,
    pub finished_at: String,
}

impl WorkflowResult {
    pub fn report_paths(&self) -> Vec<PathBuf> {
        self.artifacts
            .iter()
            .map(|artifact| artifact.path.clone())
            .collect()
    }

    pub fn empty_formats(&self) -> Vec<ExportFormat> {
        self.warnings
            .iter()
            .filter_map(|warning| match warning {
                WorkflowWarning::EmptyExportResult { format } => Some(*format),
                _ => None,
            })
            .collect()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

impl fmt::Display for WorkflowResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Workflow results:")?;
        for step in &self.steps {
            let status = match step.status {
                ExecutionStatus::Completed => "completed",
                ExecutionStatus::Skipped => "skipped",
                ExecutionStatus::Failed => "failed",
            };
            writeln!(f, "  - [{}] {} ({:?})", status, step.name, step.kind)?;
            if let Some(message) = &step.message {
                for line in message.lines() {
                    writeln!(f, "      {}", line)?;
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum CleanupAction {
    DeleteTarget(String),
    DeleteTask(String),
}

/// Per-run bookkeeping: step ledger and resources to undo on abort.
struct RunState<'a> {
    observer: &'a dyn WorkflowObserver,
    steps: Vec<StepExecution>,
    cleanup: Vec<CleanupAction>,
}

impl<'a> RunState<'a> {
    fn new(observer: &'a dyn WorkflowObserver) -> Self {
        Self {
            observer,
            steps: Vec::new(),
            cleanup: Vec::new(),
        }
    }

    fn record(&mut self, step: StepExecution) {
        self.observer.on_step(&step);
        self.steps.push(step);
    }

    fn fail(&mut self, name: &str, kind: StepKind, err: WorkflowError) -> WorkflowError {
        self.record(StepExecution::failed(name, kind, Some(err.to_string())));
        err
    }

    fn unwind<S: ScanService + ?Sized>(&mut self, session: &mut S) {
        while let Some(action) = self.cleanup.pop() {
            let (name, result) = match &action {
                CleanupAction::DeleteTask(id) => {
                    (format!("delete task {id}"), session.delete_task(id))
                }
                CleanupAction::DeleteTarget(id) => {
                    (format!("delete target {id}"), session.delete_target(id))
                }
            };
            match result {
                Ok(()) => {
                    info!(%name, "cleaned up after aborted run");
                    self.record(StepExecution::completed(name, StepKind::Cleanup, None));
                }
                Err(err) => {
                    warn!(%name, error = %err, "cleanup failed");
                    self.record(StepExecution::failed(
                        name,
                        StepKind::Cleanup,
                        Some(err.to_string()),
                    ));
                }
            }
        }
    }
}

/// Drives one target → task → run → report → export sequence per call.
pub struct Orchestrator<C, K = SystemClock> {
    connector: C,
    options: WorkflowOptions,
    clock: K,
    cancel: CancelToken,
    exporter: ReportExporter,
}

impl<C: Connect> Orchestrator<C, SystemClock> {
    pub fn new(connector: C, options: WorkflowOptions) -> Self {
        Self {
            connector,
            options,
            clock: SystemClock,
            cancel: CancelToken::new(),
            exporter: ReportExporter::new(),
        }
    }
}

impl<C: Connect, K: Clock> Orchestrator<C, K> {
    pub fn with_clock<K2: Clock>(self, clock: K2) -> Orchestrator<C, K2> {
        Orchestrator {
            connector: self.connector,
            options: self.options,
            clock,
            cancel: self.cancel,
            exporter: self.exporter,
        }
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn options(&self) -> &WorkflowOptions {
        &self.options
    }

    pub fn run(&self, request: &WorkflowRequest) -> Result<WorkflowResult, WorkflowError> {
        self.run_observed(request, &NoopObserver)
    }

    /// Runs the workflow on a fresh session which is closed on every exit
    /// path, successful or not.
    pub fn run_observed(
        &self,
        request: &WorkflowRequest,
        observer: &dyn WorkflowObserver,
    ) -> Result<WorkflowResult, WorkflowError> {
        let started_at = timestamp();
        let mut session = self.connector.connect().map_err(WorkflowError::Connection)?;
        let mut state = RunState::new(observer);

        let outcome = self.drive(&mut session, request, &mut state);
        if outcome.is_err() && self.options.cleanup_on_failure {
            state.unwind(&mut session);
        }
        if let Err(err) = session.close() {
            warn!(error = %err, "failed to close session");
        }

        let mut result = outcome?;
        result.steps = state.steps;
        result.started_at = started_at;
        result.finished_at = timestamp();
        Ok(result)
    }

    fn drive<S: ScanService>(
        &self,
        session: &mut S,
        request: &WorkflowRequest,
        state: &mut RunState<'_>,
    ) -> Result<WorkflowResult, WorkflowError> {
        let engines = session
            .list_scan_engines(ALL_ROWS_FILTER)
            .map_err(WorkflowError::remote(RemoteStep::ListEngines))
            .map_err(|err| state.fail("scan engine", StepKind::ResolveEngine, err))?;
        state.observer.on_listing("Scanners", &engine_listing(&engines));
        let engine = resolve(&engines, &self.options.scanner).ok_or_else(|| {
            state.fail(
                "scan engine",
                StepKind::ResolveEngine,
                WorkflowError::ResourceNotFound {
                    kind: ResourceKind::ScanEngine,
                    matcher: self.options.scanner.to_string(),
                },
            )
        })?;
        let engine_id = engine.id.clone();
        state.record(StepExecution::completed(
            "scan engine",
            StepKind::ResolveEngine,
            Some(format!("{} ({})", engine.name, engine.id)),
        ));

        let policies = session
            .list_scan_policies(ALL_ROWS_FILTER)
            .map_err(WorkflowError::remote(RemoteStep::ListPolicies))
            .map_err(|err| state.fail("scan policy", StepKind::ResolvePolicy, err))?;
        state.observer.on_listing("Scan configurations", &policy_listing(&policies));
        let policy = resolve(&policies, &self.options.scan_config).ok_or_else(|| {
            state.fail(
                "scan policy",
                StepKind::ResolvePolicy,
                WorkflowError::ResourceNotFound {
                    kind: ResourceKind::ScanPolicy,
                    matcher: self.options.scan_config.to_string(),
                },
            )
        })?;
        let policy_id = policy.id.clone();
        state.record(StepExecution::completed(
            "scan policy",
            StepKind::ResolvePolicy,
            Some(format!("{} ({})", policy.name, policy.id)),
        ));

        let target = TargetSpec::new(
            request.target_name.clone(),
            &request.hosts,
            request.port_range.clone(),
        );
        let target_id = session
            .create_target(&target)
            .map_err(WorkflowError::remote(RemoteStep::CreateTarget))
            .map_err(|err| state.fail(&request.target_name, StepKind::CreateTarget, err))?;
        state.cleanup.push(CleanupAction::DeleteTarget(target_id.clone()));
        info!(target_name = %request.target_name, %target_id, "target created");
        state.record(StepExecution::completed(
            request.target_name.clone(),
            StepKind::CreateTarget,
            Some(format!("target id {target_id}")),
        ));

        let task_id = session
            .create_task(&request.task_name, &engine_id, &target_id, &policy_id)
            .map_err(WorkflowError::remote(RemoteStep::CreateTask))
            .map_err(|err| state.fail(&request.task_name, StepKind::CreateTask, err))?;
        state.cleanup.push(CleanupAction::DeleteTask(task_id.clone()));
        info!(task_name = %request.task_name, %task_id, "task created");
        state.record(StepExecution::completed(
            request.task_name.clone(),
            StepKind::CreateTask,
            Some(format!("task id {task_id}")),
        ));

        session
            .start_task(&task_id)
            .map_err(WorkflowError::remote(RemoteStep::StartTask))
            .map_err(|err| state.fail(&task_id, StepKind::StartTask, err))?;
        info!(%task_id, "task started");
        state.record(StepExecution::completed(
            task_id.clone(),
            StepKind::StartTask,
            None,
        ));

        let observer = state.observer;
        let snapshot = poll_until_done(
            session,
            &task_id,
            &self.options.poll,
            &self.clock,
            &self.cancel,
            |observation| {
                info!(
                    task_id = %observation.task_id,
                    progress = observation.progress,
                    "scanning is in progress, {}% complete",
                    observation.progress
                );
                observer.on_progress(observation);
            },
        )
        .map_err(|err| {
            let err = match err {
                PollError::Remote(source) => WorkflowError::RemoteCallFailed {
                    step: RemoteStep::PollStatus,
                    source,
                },
                PollError::TimedOut { elapsed } => WorkflowError::PollTimedOut {
                    task_id: task_id.clone(),
                    elapsed,
                },
                PollError::Cancelled => WorkflowError::Cancelled {
                    task_id: task_id.clone(),
                },
            };
            state.fail(&task_id, StepKind::Poll, err)
        })?;
        info!(task_name = %request.task_name, "task completed");
        state.record(StepExecution::completed(
            task_id.clone(),
            StepKind::Poll,
            Some("task done".to_string()),
        ));

        let report_id = snapshot.last_report_id.ok_or_else(|| {
            state.fail(
                &task_id,
                StepKind::ResolveReport,
                WorkflowError::ReportNotFound {
                    task_id: task_id.clone(),
                },
            )
        })?;
        state.record(StepExecution::completed(
            report_id.clone(),
            StepKind::ResolveReport,
            None,
        ));
        // The remote side now holds a finished scan; nothing to undo past here.
        state.cleanup.clear();

        let mut artifacts = Vec::new();
        let mut warnings = Vec::new();
        for format in &self.options.formats {
            let destination =
                artifact_path(&self.options.output_dir, &request.task_name, format.extension());
            let step_name = format!("{} export", format);
            match self
                .exporter
                .export(session, &report_id, *format, &destination)
            {
                Ok(ExportOutcome::Written(artifact)) => {
                    state.record(StepExecution::completed(
                        step_name,
                        StepKind::Export,
                        Some(format!("written to {}", artifact.path.display())),
                    ));
                    artifacts.push(artifact);
                }
                Ok(ExportOutcome::Empty { format }) => {
                    let warning = WorkflowWarning::EmptyExportResult { format };
                    state.record(StepExecution::skipped(
                        step_name,
                        StepKind::Export,
                        Some(warning.to_string()),
                    ));
                    warnings.push(warning);
                }
                Err(err) => {
                    warn!(%format, error = %err, "export failed, continuing with remaining formats");
                    let warning = WorkflowWarning::ExportFailed {
                        format: *format,
                        message: err.to_string(),
                    };
                    state.record(StepExecution::failed(
                        step_name,
                        StepKind::Export,
                        Some(warning.to_string()),
                    ));
                    warnings.push(warning);
                }
            }
        }

        if self.options.convert_json {
            self.convert(request, &mut artifacts, &mut warnings, state);
        }

        Ok(WorkflowResult {
            target_id,
            task_id,
            report_id,
            artifacts,
            warnings,
            steps: Vec::new(),
            started_at: String::new(),
            finished_at: String::new(),
        })
    }

    fn convert(
        &self,
        request: &WorkflowRequest,
        artifacts: &mut Vec<ExportArtifact>,
        warnings: &mut Vec<WorkflowWarning>,
        state: &mut RunState<'_>,
    ) {
        let csv_path = artifacts
            .iter()
            .find(|artifact| artifact.format == ExportFormat::Csv.extension())
            .map(|artifact| artifact.path.clone());
        let csv_path = match csv_path {
            Some(path) => path,
            None => {
                state.record(StepExecution::skipped(
                    "JSON conversion",
                    StepKind::Convert,
                    Some("no CSV artifact to convert".to_string()),
                ));
                return;
            }
        };

        let json_path = artifact_path(&self.options.output_dir, &request.task_name, "json");
        match csv_to_json(&csv_path, &json_path) {
            Ok(path) => {
                let bytes = fs::metadata(&path).map(|meta| meta.len()).unwrap_or(0);
                state.record(StepExecution::completed(
                    "JSON conversion",
                    StepKind::Convert,
                    Some(format!("written to {}", path.display())),
                ));
                artifacts.push(ExportArtifact {
                    format: "json".to_string(),
                    path,
                    bytes,
                });
            }
            Err(err) => {
                warn!(error = %err, "failed to convert CSV to JSON");
                let warning = WorkflowWarning::ConversionFailed {
                    message: err.to_string(),
                };
                state.record(StepExecution::failed(
                    "JSON conversion",
                    StepKind::Convert,
                    Some(warning.to_string()),
                ));
                warnings.push(warning);
            }
        }
    }
}

fn timestamp() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "unknown".to_string())
}
