use crate::client::ClientError;
use crate::model::ExportFormat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    ScanEngine,
    ScanPolicy,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::ScanEngine => f.write_str("scan engine"),
            ResourceKind::ScanPolicy => f.write_str("scan policy"),
        }
    }
}

/// Remote call a fatal failure happened in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RemoteStep {
    ListEngines,
    ListPolicies,
    CreateTarget,
    CreateTask,
    StartTask,
    PollStatus,
}

impl fmt::Display for RemoteStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RemoteStep::ListEngines => "list scan engines",
            RemoteStep::ListPolicies => "list scan policies",
            RemoteStep::CreateTarget => "create target",
            RemoteStep::CreateTask => "create task",
            RemoteStep::StartTask => "start task",
            RemoteStep::PollStatus => "query task status",
        };
        f.write_str(label)
    }
}

/// Conditions that abort a workflow run.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("failed to open a session with the management daemon: {0}")]
    Connection(#[source] ClientError),
    #[error("no {kind} found matching {matcher}")]
    ResourceNotFound { kind: ResourceKind, matcher: String },
    #[error("failed to {step}: {source}")]
    RemoteCallFailed {
        step: RemoteStep,
        #[source]
        source: ClientError,
    },
    #[error("task {task_id} finished without a report")]
    ReportNotFound { task_id: String },
    #[error("task {task_id} did not finish within {elapsed:?}")]
    PollTimedOut { task_id: String, elapsed: Duration },
    #[error("workflow cancelled while waiting for task {task_id}")]
    Cancelled { task_id: String },
}

impl WorkflowError {
    pub(crate) fn remote(step: RemoteStep) -> impl FnOnce(ClientError) -> Self {
        move |source| WorkflowError::RemoteCallFailed { step, source }
    }
}

/// Conditions recorded on a finished run without aborting it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkflowWarning {
    EmptyExportResult { format: ExportFormat },
    ExportFailed { format: ExportFormat, message: String },
    ConversionFailed { message: String },
}

impl fmt::Display for WorkflowWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowWarning::EmptyExportResult { format } => {
                write!(f, "{format} report is empty, nothing written")
            }
            WorkflowWarning::ExportFailed { format, message } => {
                write!(f, "{format} export failed: {message}")
            }
            WorkflowWarning::ConversionFailed { message } => {
                write!(f, "JSON conversion failed: {message}")
            }
        }
    }
}
