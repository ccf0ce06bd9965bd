use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum SelectorError {
    #[error("invalid protein identifier: {0:?}")]
    InvalidProteinId(String),

    #[error("invalid PDB structure id: {0}")]
    InvalidStructureId(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid configuration: {0}")]
    #[diagnostic(help("check kira-ss.json and the command line flags"))]
    InvalidConfig(String),

    #[error("failed to read input table {path}: {message}")]
    InputRead { path: PathBuf, message: String },

    #[error("input column `{0}` not found in header")]
    #[diagnostic(help("pass --column with one of the header names, or use a plain list"))]
    MissingColumn(String),

    #[error("PDBe request failed: {0}")]
    PdbeHttp(String),

    #[error("PDBe returned status {status}: {message}")]
    PdbeStatus { status: u16, message: String },

    #[error("RCSB request failed: {0}")]
    RcsbHttp(String),

    #[error("RCSB returned status {status}: {message}")]
    RcsbStatus { status: u16, message: String },

    #[error("malformed response payload: {0}")]
    MalformedPayload(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("failed to start worker pool: {0}")]
    WorkerPool(String),
}
