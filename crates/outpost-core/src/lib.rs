// crates/outpost-core/src/lib.rs
// ============================================================================
// Module: Outpost Core Schema Vocabulary
// Description: Shared schema types for the Outpost reflector and LDB reader.
// Purpose: Keep name validation, type resolution, and LDB bookkeeping
//          byte-for-byte identical across the write and read paths.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Outpost replicates a small, centrally-authored control dataset to a local
//! embedded database (the LDB) on every node. This crate defines the
//! vocabulary both sides of that replication agree on: validated family and
//! table names, the deterministic local-table identifier composition, the
//! closed field-type enumeration with its raw-type resolver, the primary-key
//! descriptor, and the well-known bookkeeping tables the reflector maintains.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod ldb;
pub mod schema;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use ldb::Sequence;
pub use schema::FamilyName;
pub use schema::FieldName;
pub use schema::FieldType;
pub use schema::PkField;
pub use schema::PrimaryKey;
pub use schema::SchemaError;
pub use schema::TableName;
pub use schema::ldb_table_name;
