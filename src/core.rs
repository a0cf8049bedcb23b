//! Core rowbind functionality
//!
//! This module contains the [`Rowbind`] coordinator: it owns the loaded
//! configuration and the per-endpoint metadata registry, and opens sessions
//! on caller-supplied connections.

use std::sync::Arc;

use config::AppConfig;
use store_object::{Connection, MetadataCache, MetadataRegistry, Session};
use type_mapping::{debug_log, CoercionOptions, Coercer};

use crate::errors::RowbindError;

/// Main rowbind coordinator shared by every thread of an application
#[derive(Debug)]
pub struct Rowbind {
    config: AppConfig,
    registry: MetadataRegistry,
    coercer: Coercer,
}

impl Rowbind {
    /// Create a coordinator from an explicit configuration
    pub fn new(config: AppConfig) -> Result<Self, RowbindError> {
        config.validate()?;

        let coercer = Coercer::new(CoercionOptions {
            strict: config.coercion.strict,
            date_format: config.coercion.string_date_format.clone(),
        });
        let registry = MetadataRegistry::new(config.metadata.clone());

        Ok(Self {
            config,
            registry,
            coercer,
        })
    }

    /// Create a coordinator from `ROWBIND_CONFIG`, `./rowbind.toml` or defaults
    pub fn load() -> Result<Self, RowbindError> {
        Self::new(AppConfig::load()?)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn registry(&self) -> &MetadataRegistry {
        &self.registry
    }

    /// Metadata cache of `connection`'s endpoint, discovered on first use
    pub fn metadata(&self, connection: &mut dyn Connection) -> Result<Arc<MetadataCache>, RowbindError> {
        Ok(self.registry.metadata_for(connection)?)
    }

    /// Open a session on `connection`
    pub fn session<'c>(&self, connection: &'c mut dyn Connection) -> Result<Session<'c>, RowbindError> {
        let metadata = self.registry.metadata_for(connection)?;
        debug_log!("Opening session on {}", metadata.endpoint());
        Ok(Session::new(connection, metadata, self.coercer.clone()))
    }
}

impl Default for Rowbind {
    fn default() -> Self {
        let config = AppConfig::default();
        Self {
            registry: MetadataRegistry::new(config.metadata.clone()),
            coercer: Coercer::default(),
            config,
        }
    }
}
