//! Core domain logic for the checkup catalog.
//! This crate is the single source of truth for catalog invariants:
//! group/package association maintenance, deletion guards, and the
//! package cache coherence protocol.

pub mod cache;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use cache::{
    detail_key, listing_key, CacheError, CacheResult, CacheStore, InMemoryCacheStore,
};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::catalog::{
    CatalogValidationError, CheckGroup, CheckGroupFields, CheckItem, GroupDetail, Setmeal,
    SetmealBookingCount, SetmealDetail, SetmealFields, Sex,
};
pub use repo::{
    GroupRepository, PageResult, RepoError, RepoResult, SetmealRepository, SqliteGroupRepository,
    SqliteSetmealRepository,
};
pub use service::{
    like_pattern, GroupService, GroupServiceError, SetmealService, SetmealServiceError,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
