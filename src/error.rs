use std::path::PathBuf;

use thiserror::Error;

use crate::config::LoadError;
use crate::infra::error::InfraError;
use crate::render::RenderError;

/// Top-level failure of the `fragcache` binary.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to load configuration: {0}")]
    Config(#[from] LoadError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("invalid render tree `{}`: {source}", path.display())]
    Tree {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl AppError {
    pub fn tree(path: impl Into<PathBuf>, source: toml::de::Error) -> Self {
        Self::Tree {
            path: path.into(),
            source,
        }
    }
}
