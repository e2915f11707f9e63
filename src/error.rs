//! Error types for everything outside the diagram engine.
//!
//! The engine itself never fails; it degrades to placeholder documents. Reading
//! documents, loading configuration and exporting images can fail, and those
//! failures surface as [`FlowsvgError`].

use std::io;

use thiserror::Error;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum FlowsvgError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Export error: {0}")]
    Export(String),

    #[error("{0}")]
    Usage(String),
}

impl FlowsvgError {
    pub fn export(message: impl Into<String>) -> Self {
        Self::Export(message.into())
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage(message.into())
    }
}
