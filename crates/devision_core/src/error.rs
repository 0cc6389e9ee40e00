use std::path::PathBuf;
use thiserror::Error;

/// Failures surfaced by the gallery workflow.
///
/// Every variant is fatal to the operation that raised it only; the gallery and
/// cursor stay usable afterwards.
#[derive(Debug, Error)]
pub enum Error {
    #[error("gallery is empty")]
    EmptyStore,

    #[error("item index {index} out of range for gallery of {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("cannot read image {}: {source}", path.display())]
    ImageLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("prediction failed: {0:#}")]
    Prediction(#[source] anyhow::Error),

    #[error("cannot write {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("model error: {0}")]
    Model(String),

    #[error("config error: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Persistence {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
