use thiserror::Error;

use crate::path::PathError;

/// Failures that abort a conversion outright, as opposed to diagnostics
/// that are collected while the conversion keeps going.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("{0}")]
    Xml(String),
    #[error("{0}")]
    Diagnostics(String),
    #[error("Invalid path data @ line {line}: {source}")]
    PathData {
        line: usize,
        #[source]
        source: PathError,
    },
}
