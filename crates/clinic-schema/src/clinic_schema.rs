//! Clinic Schema - Schema metadata for the form engine
//!
//! This crate provides:
//! - A statically declared schema manifest (TOML, or reflected from a live database)
//! - Typed table descriptors resolved once into a registry arena
//! - Join plans that eager-load every foreign-key path
//! - DDL generation for bootstrapping an empty database

mod column;
mod ddl;
mod labels;
mod manifest;
mod registry;

pub use column::{Column, ColumnKey, ColumnType};
pub use ddl::DdlGenerator;
pub use labels::humanize;
pub use manifest::{ColumnDef, ReferenceDef, SchemaManifest, TableDef};
pub use registry::{
    DisplayColumn, JoinStep, Relationship, SchemaRegistry, TableDescriptor, ROOT_ALIAS,
};
