//! Error types for the rowbind crate
//!
//! This module contains the error type returned by the [`crate::Rowbind`]
//! coordinator. Session operations return [`MappingError`] directly.

use config::ConfigError;
use store_object::MappingError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RowbindError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Mapping(#[from] MappingError),
}
