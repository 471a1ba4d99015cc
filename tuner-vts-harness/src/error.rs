//! Harness error types.

use std::path::PathBuf;

use thiserror::Error;
use tuner_vts_protocol::{ConfigurationError, RegistryError, ResourceId, ResourceKind};

/// Errors raised while loading a topology and initialising a suite.
#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("{kind} {id} is declared more than once")]
    DuplicateResource { kind: ResourceKind, id: ResourceId },
}

pub type Result<T> = std::result::Result<T, HarnessError>;
