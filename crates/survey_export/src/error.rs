use std::path::Path;

use survey_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("No completed samples to export for survey type '{0}'")]
    NoSamples(String),
    #[error("{action} {path}: {source}")]
    Io {
        action: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type ExportResult<T> = Result<T, ExportError>;

/// Attach the failing step and path to an IO error.
pub(crate) fn io_error(action: &'static str, path: &Path) -> impl FnOnce(std::io::Error) -> ExportError {
    let path = path.display().to_string();
    move |source| ExportError::Io {
        action,
        path,
        source,
    }
}
