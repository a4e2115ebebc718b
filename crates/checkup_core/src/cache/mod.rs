//! Cache store contract and package cache key derivation.
//!
//! # Responsibility
//! - Define the narrow key-value capability consumed by services.
//! - Derive the two package cache key families deterministically.
//!
//! # Invariants
//! - Exactly two key families exist: the fixed listing key and the
//!   per-package detail key. No TTL, no compare-and-set.
//! - Key derivation is pure and reproducible by external cache tooling.

use std::error::Error;
use std::fmt::{Display, Formatter};

mod memory;

pub use memory::InMemoryCacheStore;

const SETMEAL_LISTING_KEY: &str = "setmealLists";
const SETMEAL_DETAIL_PREFIX: &str = "setmealDetail_";

pub type CacheResult<T> = Result<T, CacheError>;

/// Backend failure from the cache store.
///
/// Never fatal for callers: read paths degrade to the record store and
/// post-commit invalidation failures are logged and swallowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    Backend(String),
}

impl Display for CacheError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Backend(message) => write!(f, "cache backend failure: {message}"),
        }
    }
}

impl Error for CacheError {}

/// Key-value capability injected into services at construction.
///
/// Implementations must support exact-key get/set/delete; deleting an
/// absent key is a successful no-op.
pub trait CacheStore {
    fn get(&self, key: &str) -> CacheResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> CacheResult<()>;
    fn delete(&self, key: &str) -> CacheResult<()>;
}

impl<C: CacheStore + ?Sized> CacheStore for &C {
    fn get(&self, key: &str) -> CacheResult<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> CacheResult<()> {
        (**self).set(key, value)
    }

    fn delete(&self, key: &str) -> CacheResult<()> {
        (**self).delete(key)
    }
}

/// Returns the fixed key holding the full package listing.
pub fn listing_key() -> &'static str {
    SETMEAL_LISTING_KEY
}

/// Returns the detail key for one package id: prefix plus decimal id.
pub fn detail_key(setmeal_id: i64) -> String {
    format!("{SETMEAL_DETAIL_PREFIX}{setmeal_id}")
}

#[cfg(test)]
mod tests {
    use super::{detail_key, listing_key};

    #[test]
    fn listing_key_is_the_fixed_constant() {
        assert_eq!(listing_key(), "setmealLists");
    }

    #[test]
    fn detail_key_concatenates_prefix_and_decimal_id() {
        assert_eq!(detail_key(10), "setmealDetail_10");
        assert_eq!(detail_key(1), "setmealDetail_1");
        assert_eq!(detail_key(120), "setmealDetail_120");
    }
}
