use crate::client::{ClientError, ScanService};
use crate::model::{ExportArtifact, ExportFormat, ReportOptions};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to fetch {format} report: {source}")]
    Remote {
        format: ExportFormat,
        source: ClientError,
    },
    #[error("{format} report payload is not valid base64: {source}")]
    Decode {
        format: ExportFormat,
        source: base64::DecodeError,
    },
    #[error("failed to write {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    Written(ExportArtifact),
    /// The daemon rendered nothing; no file was touched.
    Empty { format: ExportFormat },
}

#[derive(Debug, Clone, Default)]
pub struct ReportExporter {
    options: ReportOptions,
}

impl ReportExporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ReportOptions) -> Self {
        Self { options }
    }

    pub fn export<S>(
        &self,
        service: &mut S,
        report_id: &str,
        format: ExportFormat,
        destination: &Path,
    ) -> Result<ExportOutcome, ExportError>
    where
        S: ScanService + ?Sized,
    {
        let rendered = service
            .get_report(report_id, format, &self.options)
            .map_err(|source| ExportError::Remote { format, source })?;

        if rendered.is_empty() {
            warn!(
                report_id,
                %format,
                "requested report is empty; either it has no results or the daemon lacks the tools to render it"
            );
            return Ok(ExportOutcome::Empty { format });
        }

        let bytes = decode_payload(&rendered.content)
            .map_err(|source| ExportError::Decode { format, source })?;
        write_overwrite(destination, &bytes)?;

        info!(report_id, %format, path = %destination.display(), "report exported");
        Ok(ExportOutcome::Written(ExportArtifact {
            format: format.extension().to_string(),
            path: destination.to_path_buf(),
            bytes: bytes.len() as u64,
        }))
    }
}

/// Payloads arrive line-wrapped; whitespace is not part of the encoding.
fn decode_payload(content: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let compact: String = content.split_whitespace().collect();
    STANDARD.decode(compact)
}

pub(crate) fn write_overwrite(path: &Path, bytes: &[u8]) -> Result<(), ExportError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| ExportError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let mut file = fs::File::create(path).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    file.write_all(bytes).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// `<dir>/<task>_report.<ext>`. The task name is kept as given apart from
/// characters that would leave `output_dir`.
pub fn artifact_path(output_dir: &Path, task_name: &str, extension: &str) -> PathBuf {
    output_dir.join(format!("{}_report.{}", file_stem(task_name), extension))
}

fn file_stem(task_name: &str) -> String {
    task_name
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect()
}
