//! Process isolation for the native rendering path.
//!
//! Native PDF rendering can take the whole process down on malformed input,
//! so the sandboxed mode runs each job in a fresh OS process. The parent
//! writes a JSON [`SandboxRequest`] to the child's stdin and reads a JSON
//! [`SandboxResponse`] from its stdout; the child's stderr is inherited so
//! its tracing output lands in the parent's log stream. A non-zero exit or
//! an unreadable reply is a [`ConvertError::ProcessCrash`], kept distinct
//! from bad-input failures the child reported itself.

use std::io::Read;
use std::path::Path;
use std::process::Stdio;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::config::ConvertConfig;
use crate::error::ConvertError;
use crate::job::{ConversionJob, ConversionResult};
use crate::worker::DocumentConverter;

#[derive(Debug, Serialize, Deserialize)]
pub struct SandboxRequest {
    pub config: ConvertConfig,
    pub job: ConversionJob,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SandboxResponse {
    Completed { result: ConversionResult },
    Failed { failure: SandboxFailure },
}

/// Serializable mirror of [`ConvertError`] for the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SandboxFailure {
    DocumentParse { message: String },
    PageRender { page: usize, message: String },
    Io { message: String },
    Other { message: String },
}

impl From<&ConvertError> for SandboxFailure {
    fn from(error: &ConvertError) -> Self {
        match error {
            ConvertError::DocumentParse(message) => SandboxFailure::DocumentParse {
                message: message.clone(),
            },
            ConvertError::PageRender { page, message } => SandboxFailure::PageRender {
                page: *page,
                message: message.clone(),
            },
            ConvertError::Io(e) => SandboxFailure::Io {
                message: e.to_string(),
            },
            other => SandboxFailure::Other {
                message: other.to_string(),
            },
        }
    }
}

impl From<SandboxFailure> for ConvertError {
    fn from(failure: SandboxFailure) -> Self {
        match failure {
            SandboxFailure::DocumentParse { message } => ConvertError::DocumentParse(message),
            SandboxFailure::PageRender { page, message } => {
                ConvertError::PageRender { page, message }
            }
            SandboxFailure::Io { message } => ConvertError::Io(std::io::Error::other(message)),
            SandboxFailure::Other { message } => ConvertError::ProcessCrash(message),
        }
    }
}

fn crash(message: impl Into<String>) -> ConvertError {
    ConvertError::ProcessCrash(message.into())
}

/// Run one job in a fresh worker process and wait for its reply.
pub async fn run_sandboxed(
    worker_bin: &Path,
    config: &ConvertConfig,
    job: ConversionJob,
) -> Result<ConversionResult, ConvertError> {
    let job_id = job.id.clone();
    let request = SandboxRequest {
        config: config.clone(),
        job,
    };
    let payload = serde_json::to_vec(&request)
        .map_err(|e| crash(format!("failed to encode worker request: {e}")))?;

    let mut child = tokio::process::Command::new(worker_bin)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|e| crash(format!("failed to spawn {}: {e}", worker_bin.display())))?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| crash("worker stdin unavailable"))?;
    stdin
        .write_all(&payload)
        .await
        .map_err(|e| crash(format!("failed to send job to worker: {e}")))?;
    drop(stdin);

    let output = child
        .wait_with_output()
        .await
        .map_err(|e| crash(format!("failed to reap worker: {e}")))?;
    if !output.status.success() {
        tracing::warn!(job_id = %job_id, status = %output.status, "Worker process died");
        return Err(crash(format!("worker exited with {}", output.status)));
    }

    let response: SandboxResponse = serde_json::from_slice(&output.stdout)
        .map_err(|e| crash(format!("unreadable worker reply: {e}")))?;
    match response {
        SandboxResponse::Completed { result } => Ok(result),
        SandboxResponse::Failed { failure } => Err(failure.into()),
    }
}

/// Child-side entry point used by the worker binary. Reads one request from
/// stdin, runs the conversion, writes one response to stdout, and returns
/// the process exit code.
pub fn run_worker_entry() -> i32 {
    let mut input = Vec::new();
    if let Err(e) = std::io::stdin().read_to_end(&mut input) {
        tracing::error!(error = %e, "Failed to read job request from stdin");
        return 2;
    }
    let request: SandboxRequest = match serde_json::from_slice(&input) {
        Ok(request) => request,
        Err(e) => {
            tracing::error!(error = %e, "Malformed job request");
            return 2;
        }
    };

    let job_id = request.job.id.clone();
    let converter = DocumentConverter::new(request.config);
    let response = match converter.process(&request.job) {
        Ok(result) => SandboxResponse::Completed { result },
        Err(error) => {
            tracing::error!(job_id = %job_id, error = %error, "Conversion failed");
            SandboxResponse::Failed {
                failure: SandboxFailure::from(&error),
            }
        }
    };

    let stdout = std::io::stdout();
    if let Err(e) = serde_json::to_writer(stdout.lock(), &response) {
        tracing::error!(error = %e, "Failed to write worker reply");
        return 2;
    }
    0
}
