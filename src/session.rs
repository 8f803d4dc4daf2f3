//! Interactive session state
//!
//! A [`Session`] stands behind a submit/reset form: each submission runs one
//! transfer, turns every error into a message for the operator, and keeps the
//! produced workbook as the single pending artifact until the next submission
//! or a reset.
use crate::config::TransferConfig;
use crate::config::OUTPUT_MIME_TYPE;
use crate::error::ErrorKind;
use crate::error::TemplateFillError;
use crate::spreadsheet::Workbook;
use crate::transfer::transfer;
use crate::transfer::TransferReport;

/// An uploaded workbook
#[derive(Clone, Debug)]
pub struct Upload {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(name: &str, bytes: Vec<u8>) -> Self {
        Self { name: name.to_owned(), bytes }
    }
}

/// One form submission. Without a destination upload, the source file is
/// also the template.
#[derive(Clone, Debug)]
pub struct TransferRequest {
    pub source: Upload,
    pub destination: Option<Upload>,
    pub config: TransferConfig,
}

/// The downloadable result of a successful submission
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Artifact {
    pub file_name: String,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

/// The message shown after a submission
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Success { message: String, report: TransferReport },
    Failure { message: String, kind: ErrorKind },
}

impl Outcome {
    pub fn message(&self) -> &str {
        match self {
            Outcome::Success { message, .. } | Outcome::Failure { message, .. } => message,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }
}

#[derive(Debug, Default)]
pub struct Session {
    artifact: Option<Artifact>,
    submissions: usize,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs one transfer. A previous artifact is discarded first, so a failed
    /// submission never leaves a stale download behind.
    pub fn submit(&mut self, request: TransferRequest) -> Outcome {
        self.artifact = None;
        self.submissions += 1;
        match run(request) {
            Ok((artifact, report)) => {
                let message = report.to_string();
                log::debug!("Submission #{} produced '{}' ({} bytes)", self.submissions, artifact.file_name, artifact.bytes.len());
                self.artifact = Some(artifact);
                Outcome::Success { message, report }
            }
            Err(error) => {
                let kind = error.kind();
                let message = match kind {
                    ErrorKind::MissingSheet => format!("Error: {error}"),
                    ErrorKind::NoMatchingColumns => {
                        "Error: no column of the source matches a header of the template".to_owned()
                    }
                    ErrorKind::Generic => format!("An error occurred while processing: {error}"),
                };
                log::error!("Submission #{} failed: {}", self.submissions, error);
                Outcome::Failure { message, kind }
            }
        }
    }

    /// The pending download, if the last submission succeeded
    pub fn artifact(&self) -> Option<&Artifact> {
        self.artifact.as_ref()
    }

    pub fn take_artifact(&mut self) -> Option<Artifact> {
        self.artifact.take()
    }

    /// Whether a result is waiting to be downloaded
    pub fn is_processed(&self) -> bool {
        self.artifact.is_some()
    }

    /// Clears the pending result
    pub fn reset(&mut self) {
        if self.artifact.take().is_some() {
            log::debug!("Session reset, pending artifact discarded");
        }
    }
}

fn run(request: TransferRequest) -> Result<(Artifact, TransferReport), TemplateFillError> {
    let TransferRequest { source, destination, config } = request;
    let destination = destination.unwrap_or_else(|| source.clone());
    let mut source = Workbook::from_bytes(&source.name, source.bytes)?;
    let mut destination = Workbook::from_bytes(&destination.name, destination.bytes)?;
    let output = transfer(&mut source, &mut destination, &config)?;
    let artifact = Artifact {
        file_name: output.file_name,
        mime_type: OUTPUT_MIME_TYPE,
        bytes: output.bytes,
    };
    Ok((artifact, output.report))
}
