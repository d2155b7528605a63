use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum LoaderError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("failed to identify an existing user: {0}")]
    SubmitterNotFound(String),

    #[error("{kind} accession already exists: {accession}")]
    Conflict {
        kind: &'static str,
        accession: String,
    },

    #[error("failed to scan {file}: {message}")]
    Scan { file: String, message: String },

    #[error("result reader error: {0}")]
    Reader(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("term cache error: {0}")]
    Cache(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("failed to read submission descriptor at {0}")]
    SubmissionRead(PathBuf),

    #[error("failed to parse submission descriptor: {0}")]
    SubmissionParse(String),

    #[error("file not found for reference: {0}")]
    FileNotFound(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("PubMed request failed: {0}")]
    PubmedHttp(String),

    #[error("PubMed returned status {status}: {message}")]
    PubmedStatus { status: u16, message: String },

    #[error("invalid PubMed id: {0}")]
    InvalidPubmedId(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Scan,
    Conflict,
    Persistence,
    Cache,
    Io,
    Citation,
}

impl LoaderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LoaderError::Validation(_)
            | LoaderError::InvalidPubmedId(_)
            | LoaderError::SubmissionParse(_)
            | LoaderError::ConfigParse(_) => ErrorKind::Validation,
            LoaderError::SubmitterNotFound(_) | LoaderError::FileNotFound(_) => ErrorKind::NotFound,
            LoaderError::Scan { .. } | LoaderError::Reader(_) => ErrorKind::Scan,
            LoaderError::Conflict { .. } => ErrorKind::Conflict,
            LoaderError::Persistence(_) => ErrorKind::Persistence,
            LoaderError::Cache(_) => ErrorKind::Cache,
            LoaderError::ConfigRead(_)
            | LoaderError::SubmissionRead(_)
            | LoaderError::Filesystem(_) => ErrorKind::Io,
            LoaderError::PubmedHttp(_) | LoaderError::PubmedStatus { .. } => ErrorKind::Citation,
        }
    }
}

#[derive(Debug, Error, Diagnostic)]
#[error("failed to load project {project_accession}: {message}")]
pub struct SubmissionLoadError {
    pub message: String,
    pub project_accession: String,
    #[source]
    pub cause: LoaderError,
}

impl SubmissionLoadError {
    pub fn new(project_accession: impl Into<String>, cause: LoaderError) -> Self {
        Self {
            message: cause.to_string(),
            project_accession: project_accession.into(),
            cause,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.cause.kind()
    }
}
