//! Record-access layer: contracts and SQLite implementations.
//!
//! # Responsibility
//! - Define the narrow record-access interface consumed by services.
//! - Keep SQL details inside the persistence boundary.
//! - Own the transactional boundary for composite writes: entity plus
//!   link-set maintenance, and guard checks inside deleting transactions.
//!
//! # Invariants
//! - Write paths validate descriptive fields before SQL mutations.
//! - Association replacement deletes all links for the owning entity and
//!   recreates the requested set inside one transaction.
//! - Deletion guards run before any destructive write, in the same
//!   transaction as the deletion itself.

use crate::db::DbError;
use crate::model::catalog::{CatalogValidationError, Sex};
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod group_repo;
pub mod setmeal_repo;

pub use group_repo::{GroupRepository, SqliteGroupRepository};
pub use setmeal_repo::{SetmealRepository, SqliteSetmealRepository};

const DEFAULT_PAGE_SIZE: u32 = 10;
const MAX_PAGE_SIZE: u32 = 100;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for catalog persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(CatalogValidationError),
    Db(DbError),
    /// Mutation targeted an id that does not exist.
    NotFound { entity: &'static str, id: i64 },
    /// Deletion rejected: dependent records still reference the entity.
    InUse {
        entity: &'static str,
        id: i64,
        dependents: i64,
    },
    /// Persisted state failed to parse back into the domain model.
    InvalidData(String),
    MissingRequiredTable(&'static str),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::InUse {
                entity,
                id,
                dependents,
            } => write!(
                f,
                "{entity} {id} is still referenced by {dependents} dependent record(s)"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted catalog data: {message}"),
            Self::MissingRequiredTable(table) => {
                write!(f, "required table `{table}` is missing; run migrations first")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<CatalogValidationError> for RepoError {
    fn from(value: CatalogValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// One page of rows plus the unfiltered-by-paging total count.
#[derive(Debug, Clone, PartialEq)]
pub struct PageResult<T> {
    pub total: u64,
    pub rows: Vec<T>,
}

/// Normalizes a 1-based page number; page 0 is treated as the first page.
pub fn normalize_page(page: u32) -> u32 {
    page.max(1)
}

/// Normalizes a page size. Zero falls back to the default, oversized
/// requests clamp to the maximum.
pub fn normalize_page_size(page_size: u32) -> u32 {
    match page_size {
        0 => DEFAULT_PAGE_SIZE,
        value if value > MAX_PAGE_SIZE => MAX_PAGE_SIZE,
        value => value,
    }
}

pub(crate) fn sex_to_db(sex: Sex) -> &'static str {
    match sex {
        Sex::Male => "male",
        Sex::Female => "female",
    }
}

pub(crate) fn sex_from_db(value: Option<String>) -> RepoResult<Option<Sex>> {
    match value.as_deref() {
        None => Ok(None),
        Some("male") => Ok(Some(Sex::Male)),
        Some("female") => Ok(Some(Sex::Female)),
        Some(other) => Err(RepoError::InvalidData(format!(
            "invalid sex value `{other}` in catalog row"
        ))),
    }
}

pub(crate) fn ensure_catalog_tables(conn: &Connection) -> RepoResult<()> {
    for table in [
        "t_checkitem",
        "t_checkgroup",
        "t_setmeal",
        "t_checkgroup_checkitem",
        "t_setmeal_checkgroup",
        "t_order",
    ] {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }
    Ok(())
}

fn table_exists(conn: &Connection, table: &'static str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}
