//! Catalog use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into the group/package call surface.
//! - Own the package cache coherence protocol: read-through population
//!   and post-commit invalidation.
//!
//! # Invariants
//! - Cache failures never abort an operation: reads degrade to the
//!   record store, post-commit invalidation failures are logged.
//! - Substring filters wrap the query with `%` wildcards before
//!   delegating to the record store.

pub mod group_service;
pub mod setmeal_service;

pub use group_service::{GroupService, GroupServiceError};
pub use setmeal_service::{SetmealService, SetmealServiceError};

/// Wraps a non-empty query string with LIKE wildcards.
///
/// Empty or whitespace-only input yields `None`, meaning no filter.
pub fn like_pattern(query: Option<&str>) -> Option<String> {
    let trimmed = query?.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(format!("%{trimmed}%"))
    }
}
