//! Domain model for the checkup catalog.
//!
//! # Responsibility
//! - Define the canonical data structures used by core business logic.
//! - Keep one storage-facing shape per entity, shared by services and
//!   cache encodings.
//!
//! # Invariants
//! - Every entity is identified by a store-assigned integer id.
//! - Association sets live in link tables, never inline in the entity.

pub mod catalog;
