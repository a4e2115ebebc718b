//! Setmeal (package) manager.
//!
//! # Responsibility
//! - Provide package CRUD and package↔group association maintenance.
//! - Own the read-through cache protocol for the package listing and
//!   per-package detail views.
//!
//! # Invariants
//! - The record store is the authority; cache entries are a derived view
//!   repopulated on miss and deleted on every package mutation.
//! - Store writes commit first; cache invalidation follows outside the
//!   transaction.
//! - Deletion is rejected while any order references the package.

use crate::cache::{detail_key, listing_key, CacheStore};
use crate::model::catalog::{
    GroupDetail, Setmeal, SetmealBookingCount, SetmealDetail, SetmealFields,
};
use crate::repo::{
    normalize_page, normalize_page_size, PageResult, RepoError, RepoResult, SetmealRepository,
};
use crate::service::like_pattern;
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for package use-cases.
#[derive(Debug)]
pub enum SetmealServiceError {
    /// Deletion rejected: orders still reference the package.
    SetmealInUse { id: i64, orders: i64 },
    /// Mutation targeted a package that does not exist.
    SetmealNotFound(i64),
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl Display for SetmealServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SetmealInUse { id, orders } => write!(
                f,
                "setmeal {id} is used by {orders} order(s) and cannot be deleted"
            ),
            Self::SetmealNotFound(id) => write!(f, "setmeal not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SetmealServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for SetmealServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { id, .. } => Self::SetmealNotFound(id),
            RepoError::InUse { id, dependents, .. } => Self::SetmealInUse {
                id,
                orders: dependents,
            },
            other => Self::Repo(other),
        }
    }
}

/// Package manager over an injected record store and cache store.
pub struct SetmealService<R: SetmealRepository, C: CacheStore> {
    repo: R,
    cache: C,
}

impl<R: SetmealRepository, C: CacheStore> SetmealService<R, C> {
    pub fn new(repo: R, cache: C) -> Self {
        Self { repo, cache }
    }

    /// Creates a package, links the selected groups and invalidates the
    /// cached listing. Returns the assigned id.
    pub fn add(
        &mut self,
        fields: &SetmealFields,
        group_ids: &[i64],
    ) -> Result<i64, SetmealServiceError> {
        let setmeal_id = self.repo.create_setmeal(fields, group_ids)?;
        info!(
            "event=setmeal_add module=setmeal_service status=ok id={setmeal_id} groups={}",
            group_ids.len()
        );
        self.invalidate_setmeal_keys(setmeal_id);
        Ok(setmeal_id)
    }

    /// Pages packages with an optional case-insensitive substring filter.
    pub fn find_page(
        &self,
        query: Option<&str>,
        page: u32,
        page_size: u32,
    ) -> Result<PageResult<Setmeal>, SetmealServiceError> {
        let pattern = like_pattern(query);
        let page = normalize_page(page);
        let page_size = normalize_page_size(page_size);
        let offset = (page - 1).saturating_mul(page_size);
        Ok(self.repo.find_page(pattern.as_deref(), page_size, offset)?)
    }

    /// Gets one package by id, uncached; absent ids yield `Ok(None)`.
    pub fn find_by_id(&self, id: i64) -> RepoResult<Option<Setmeal>> {
        self.repo.get_setmeal(id)
    }

    /// Returns the group ids currently linked to the package.
    pub fn group_ids_by_setmeal_id(&self, id: i64) -> RepoResult<Vec<i64>> {
        self.repo.group_ids_for_setmeal(id)
    }

    /// Updates package fields, replaces the full group link set, then
    /// invalidates the listing and this package's detail entry.
    pub fn update(
        &mut self,
        setmeal: &Setmeal,
        group_ids: &[i64],
    ) -> Result<(), SetmealServiceError> {
        self.repo.update_setmeal(setmeal, group_ids)?;
        info!(
            "event=setmeal_update module=setmeal_service status=ok id={} groups={}",
            setmeal.id,
            group_ids.len()
        );
        self.invalidate_setmeal_keys(setmeal.id);
        Ok(())
    }

    /// Deletes a package unless an order still references it, then
    /// invalidates the listing and detail entries.
    pub fn delete_by_id(&mut self, id: i64) -> Result<(), SetmealServiceError> {
        match self.repo.delete_setmeal(id) {
            Ok(()) => {
                info!("event=setmeal_delete module=setmeal_service status=ok id={id}");
                self.invalidate_setmeal_keys(id);
                Ok(())
            }
            Err(RepoError::InUse { dependents, .. }) => {
                warn!(
                    "event=setmeal_delete module=setmeal_service status=rejected id={id} orders={dependents}"
                );
                Err(SetmealServiceError::SetmealInUse {
                    id,
                    orders: dependents,
                })
            }
            Err(other) => Err(other.into()),
        }
    }

    /// Read-through listing: cache hit returns the cached collection,
    /// miss reads the store and repopulates the listing key.
    pub fn find_all(&self) -> Result<Vec<Setmeal>, SetmealServiceError> {
        let key = listing_key();
        if let Some(setmeals) = self.cached_value::<Vec<Setmeal>>(key) {
            return Ok(setmeals);
        }

        let setmeals = self.repo.list_setmeals()?;
        self.populate_cache(key, &setmeals);
        Ok(setmeals)
    }

    /// Read-through detail keyed per package id. Absent packages yield
    /// `Ok(None)` and cache nothing.
    pub fn find_detail_by_id(&self, id: i64) -> Result<Option<Setmeal>, SetmealServiceError> {
        let key = detail_key(id);
        if let Some(setmeal) = self.cached_value::<Setmeal>(&key) {
            return Ok(Some(setmeal));
        }

        let Some(setmeal) = self.repo.get_setmeal(id)? else {
            return Ok(None);
        };
        self.populate_cache(&key, &setmeal);
        Ok(Some(setmeal))
    }

    /// Uncached deep read: package, its groups, and each group's items.
    pub fn find_detail_expanded(&self, id: i64) -> Result<Option<SetmealDetail>, SetmealServiceError> {
        let Some(setmeal) = self.repo.get_setmeal(id)? else {
            return Ok(None);
        };

        let groups = self.repo.groups_for_setmeal(id)?;
        let mut group_details = Vec::with_capacity(groups.len());
        for group in groups {
            let items = self.repo.items_for_group(group.id)?;
            group_details.push(GroupDetail { group, items });
        }

        Ok(Some(SetmealDetail {
            setmeal,
            groups: group_details,
        }))
    }

    /// Booking counts per package; pass-through aggregation.
    pub fn booking_report(&self) -> RepoResult<Vec<SetmealBookingCount>> {
        self.repo.booking_report()
    }

    /// All package image references; pass-through projection.
    pub fn list_images(&self) -> RepoResult<Vec<String>> {
        self.repo.list_images()
    }

    fn cached_value<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.cache.get(key) {
            Ok(Some(payload)) => match serde_json::from_str(&payload) {
                Ok(value) => {
                    debug!("event=setmeal_cache module=setmeal_service status=hit key={key}");
                    Some(value)
                }
                Err(err) => {
                    // Corrupt payloads degrade to a miss; the store read
                    // repopulates the key.
                    warn!(
                        "event=setmeal_cache module=setmeal_service status=corrupt key={key} error={err}"
                    );
                    None
                }
            },
            Ok(None) => {
                debug!("event=setmeal_cache module=setmeal_service status=miss key={key}");
                None
            }
            Err(err) => {
                warn!(
                    "event=setmeal_cache module=setmeal_service status=unavailable key={key} error={err}"
                );
                None
            }
        }
    }

    fn populate_cache<T: Serialize>(&self, key: &str, value: &T) {
        match serde_json::to_string(value) {
            Ok(payload) => {
                if let Err(err) = self.cache.set(key, &payload) {
                    warn!(
                        "event=setmeal_cache module=setmeal_service status=store_failed key={key} error={err}"
                    );
                }
            }
            Err(err) => {
                warn!(
                    "event=setmeal_cache module=setmeal_service status=encode_failed key={key} error={err}"
                );
            }
        }
    }

    // The store mutation has already committed; invalidation is
    // best-effort, listing key first, then the detail key.
    fn invalidate_setmeal_keys(&self, setmeal_id: i64) {
        for key in [listing_key().to_string(), detail_key(setmeal_id)] {
            if let Err(err) = self.cache.delete(&key) {
                warn!(
                    "event=cache_invalidate module=setmeal_service status=error key={key} error={err}"
                );
            }
        }
    }
}
