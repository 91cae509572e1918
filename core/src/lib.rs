pub mod client;
pub mod config;
pub mod convert;
pub mod error;
pub mod export;
#[cfg(unix)]
pub mod gmp;
pub mod model;
pub mod poll;
pub mod resolver;
pub mod workflow;

#[cfg(test)]
mod testing;

pub use client::{ClientError, Connect, ScanService};
pub use config::{
    ConfigError, ConnectionConfig, PollConfig, ScanflowConfig, DEFAULT_POLL_INTERVAL_SECS,
    DEFAULT_SOCKET_PATH, ENV_PASSWORD, ENV_SOCKET_PATH, ENV_USERNAME,
};
pub use convert::{csv_rows_to_objects, csv_to_json, ConvertError};
pub use error::{RemoteStep, ResourceKind, WorkflowError, WorkflowWarning};
pub use export::{artifact_path, ExportError, ExportOutcome, ReportExporter};
#[cfg(unix)]
pub use gmp::{GmpConnector, GmpSession};
pub use model::{
    ExportArtifact, ExportFormat, Named, RenderedReport, ReportOptions, ScanEngine, ScanPolicy,
    TargetSpec, TaskSnapshot, TaskStatus,
};
pub use poll::{
    poll_until_done, CancelToken, Clock, PollError, PollSettings, ProgressObservation, SystemClock,
};
pub use resolver::{
    engine_listing, find_engine_by_name, find_policy_by_name, policy_listing, resolve, Matcher,
};
pub use workflow::{
    ExecutionStatus, NoopObserver, Orchestrator, StepExecution, StepKind, WorkflowObserver,
    WorkflowOptions, WorkflowRequest, WorkflowResult, ALL_ROWS_FILTER,
};
