use thiserror::Error;

use crate::catalog::CatalogError;
use crate::config::ConfigError;
use crate::store::StoreError;
use crate::workflow::WorkflowError;

/// Top-level error for starting, running and stopping the system.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),
    #[error("Backend not available: {0}")]
    BackendUnavailable(String),
    #[error("Actor task failed: {0}")]
    ActorTask(String),
}

pub type AppResult<T> = Result<T, AppError>;
