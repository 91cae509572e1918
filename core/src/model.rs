use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Scanning engine as reported by the management daemon.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScanEngine {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub host: String,
}

/// Scan policy (a "scan config" in Greenbone terms).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScanPolicy {
    pub id: String,
    pub name: String,
}

/// Common view over enumerated resources, used by the resolver.
pub trait Named {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
}

impl Named for ScanEngine {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for ScanPolicy {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TargetSpec {
    pub name: String,
    pub hosts: Vec<String>,
    pub port_range: String,
}

impl TargetSpec {
    /// Builds a target from a comma separated host expression. Duplicate and
    /// blank entries are dropped, first occurrence order is kept.
    pub fn new(name: impl Into<String>, hosts: &str, port_range: impl Into<String>) -> Self {
        let mut unique: Vec<String> = Vec::new();
        for host in hosts.split(',').map(str::trim).filter(|h| !h.is_empty()) {
            if !unique.iter().any(|existing| existing == host) {
                unique.push(host.to_string());
            }
        }
        Self {
            name: name.into(),
            hosts: unique,
            port_range: port_range.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Running,
    Done,
    Failed,
}

impl TaskStatus {
    /// Maps the daemon's status word onto the observed lifecycle.
    pub fn from_gmp(word: &str) -> Self {
        match word.trim() {
            "Done" => TaskStatus::Done,
            "New" | "Requested" | "Queued" => TaskStatus::Pending,
            "Stopped" | "Interrupted" => TaskStatus::Failed,
            "Running" | "Processing" | "Stop Requested" | "Delete Requested"
            | "Ultimate Delete Requested" => TaskStatus::Running,
            other => {
                tracing::debug!(status = other, "unrecognised task status, treating as running");
                TaskStatus::Running
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Done => "done",
            TaskStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Last observed state of a remote task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskSnapshot {
    pub status: TaskStatus,
    pub progress: u8,
    pub last_report_id: Option<String>,
}

impl TaskSnapshot {
    pub fn new(status: TaskStatus, progress: i64, last_report_id: Option<String>) -> Self {
        Self {
            status,
            progress: progress.clamp(0, 100) as u8,
            last_report_id,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Pdf,
    Csv,
    Txt,
}

impl ExportFormat {
    /// Report format UUID the daemon renders with.
    pub fn renderer_id(&self) -> &'static str {
        match self {
            ExportFormat::Pdf => "c402cc3e-b531-11e1-9163-406186ea4fc5",
            ExportFormat::Csv => "c1645568-627a-11e3-a660-406186ea4fc5",
            ExportFormat::Txt => "a3810a62-1f62-11e1-9219-406186ea4fc5",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Pdf => "pdf",
            ExportFormat::Csv => "csv",
            ExportFormat::Txt => "txt",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Pdf => "PDF",
            ExportFormat::Csv => "CSV",
            ExportFormat::Txt => "TXT",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pdf" => Ok(ExportFormat::Pdf),
            "csv" => Ok(ExportFormat::Csv),
            "txt" | "text" => Ok(ExportFormat::Txt),
            other => Err(format!("unsupported export format '{other}'")),
        }
    }
}

/// Options forwarded with a report request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportOptions {
    pub ignore_pagination: bool,
    pub details: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            ignore_pagination: true,
            details: true,
        }
    }
}

/// Report rendering as returned by the daemon: base64 text, possibly empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedReport {
    pub content: String,
    pub content_type: Option<String>,
}

impl RenderedReport {
    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExportArtifact {
    pub format: String,
    pub path: PathBuf,
    pub bytes: u64,
}
