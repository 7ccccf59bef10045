use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum IndexError {
    #[error("graph database unreachable at {endpoint}: {message}")]
    GraphConnection { endpoint: String, message: String },

    #[error("graph request failed: {0}")]
    GraphHttp(String),

    #[error("graph database returned status {status}: {message}")]
    GraphStatus { status: u16, message: String },

    #[error("graph query failed ({code}): {message}")]
    GraphQuery { code: String, message: String },

    #[error("record field `{field}`: {message}")]
    RecordField { field: String, message: String },

    #[error("invalid modification token: {0}")]
    InvalidModification(String),

    #[error("invalid proteoform: {0}")]
    InvalidProteoform(String),

    #[error("invalid variant line on chromosome {chromosome}: {line}")]
    InvalidVariantLine { chromosome: u8, line: String },

    #[error("failed to read variant table for chromosome {chromosome}: {message}")]
    VariantTableRead { chromosome: u8, message: String },

    #[error("failed to persist {name}: {message}")]
    #[diagnostic(help("the output directory must be writable; the run was aborted"))]
    Persistence { name: String, message: String },

    #[error("artifact not found: {0}")]
    ArtifactNotFound(String),

    #[error("failed to read artifact {name}: {message}")]
    ArtifactRead { name: String, message: String },

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("unknown relation: {0}")]
    InvalidRelation(String),

    #[error("{relation} needs {prerequisite}, which could not be built")]
    PrerequisiteFailed {
        relation: String,
        prerequisite: String,
    },

    #[error("{0} already failed in this run")]
    AlreadyFailed(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

impl IndexError {
    /// Errors that abort the whole run instead of skipping a single relation.
    pub fn is_fatal(&self) -> bool {
        matches!(self, IndexError::Persistence { .. })
    }

    pub fn is_graph(&self) -> bool {
        matches!(
            self,
            IndexError::GraphConnection { .. }
                | IndexError::GraphHttp(_)
                | IndexError::GraphStatus { .. }
                | IndexError::GraphQuery { .. }
        )
    }
}
