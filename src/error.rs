use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum MolgenError {
    #[error("no structure files selected")]
    #[diagnostic(help("pass at least one .pdb or .pdbqt file, or list them under `structures` in molgen.json"))]
    NoInput,

    #[error("generation request failed: {0}")]
    ServiceHttp(String),

    #[error("generation service returned status {status}: {message}")]
    ServiceStatus { status: u16, message: String },

    #[error("generation cancelled")]
    Cancelled,

    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    #[error("invalid structure file: {0}")]
    InvalidStructure(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
