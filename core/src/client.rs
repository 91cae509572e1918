use crate::model::{
    ExportFormat, RenderedReport, ReportOptions, ScanEngine, ScanPolicy, TargetSpec, TaskSnapshot,
};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("i/o error talking to the management daemon: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed XML in response to {command}: {message}")]
    Xml { command: String, message: String },
    #[error("{command} rejected with status {status}: {text}")]
    Status {
        command: String,
        status: String,
        text: String,
    },
    #[error("response to {command} is missing {field}")]
    MissingField {
        command: String,
        field: &'static str,
    },
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Operations the workflow needs from the scan-management daemon.
///
/// Identifiers are opaque strings owned by the remote side. Implementations
/// perform one blocking round-trip per call.
pub trait ScanService {
    fn list_scan_engines(&mut self, filter: &str) -> Result<Vec<ScanEngine>, ClientError>;

    fn list_scan_policies(&mut self, filter: &str) -> Result<Vec<ScanPolicy>, ClientError>;

    /// Returns the id of the created target.
    fn create_target(&mut self, target: &TargetSpec) -> Result<String, ClientError>;

    /// Returns the id of the created task.
    fn create_task(
        &mut self,
        name: &str,
        engine_id: &str,
        target_id: &str,
        policy_id: &str,
    ) -> Result<String, ClientError>;

    fn start_task(&mut self, task_id: &str) -> Result<(), ClientError>;

    fn task_status(&mut self, task_id: &str) -> Result<TaskSnapshot, ClientError>;

    /// Content may come back empty when the daemon cannot render the format.
    fn get_report(
        &mut self,
        report_id: &str,
        format: ExportFormat,
        options: &ReportOptions,
    ) -> Result<RenderedReport, ClientError>;

    fn delete_target(&mut self, target_id: &str) -> Result<(), ClientError>;

    fn delete_task(&mut self, task_id: &str) -> Result<(), ClientError>;

    /// Releases the underlying session. Calling it twice is harmless.
    fn close(&mut self) -> Result<(), ClientError> {
        Ok(())
    }
}

/// Opens authenticated sessions against the daemon.
pub trait Connect {
    type Session: ScanService;

    fn connect(&self) -> Result<Self::Session, ClientError>;
}
