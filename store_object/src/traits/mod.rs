//! Trait definitions
//!
//! This module defines the capability descriptors a mapped type exposes to
//! the metadata engine.

pub mod entity;

pub use entity::{ColumnHints, Entity, EntityDescriptor, PropertyDescriptor, Reader, Writer};
