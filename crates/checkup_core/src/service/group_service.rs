//! Check group manager.
//!
//! # Responsibility
//! - Provide group CRUD and group↔item association maintenance.
//! - Invalidate the detail cache entry of every package that depends on
//!   a changed group.
//!
//! # Invariants
//! - Groups themselves are never cached; only package entries are
//!   touched, and only on `update`.
//! - Deletion is rejected while any package references the group.

use crate::cache::{detail_key, CacheStore};
use crate::model::catalog::{CheckGroup, CheckGroupFields};
use crate::repo::{
    normalize_page, normalize_page_size, GroupRepository, PageResult, RepoError, RepoResult,
};
use crate::service::like_pattern;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for group use-cases.
#[derive(Debug)]
pub enum GroupServiceError {
    /// Deletion rejected: packages still reference the group.
    GroupInUse { id: i64, setmeals: i64 },
    /// Mutation targeted a group that does not exist.
    GroupNotFound(i64),
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl Display for GroupServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GroupInUse { id, setmeals } => write!(
                f,
                "check group {id} is used by {setmeals} setmeal(s) and cannot be deleted"
            ),
            Self::GroupNotFound(id) => write!(f, "check group not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for GroupServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for GroupServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { id, .. } => Self::GroupNotFound(id),
            RepoError::InUse { id, dependents, .. } => Self::GroupInUse {
                id,
                setmeals: dependents,
            },
            other => Self::Repo(other),
        }
    }
}

/// Group manager over an injected record store and cache store.
pub struct GroupService<R: GroupRepository, C: CacheStore> {
    repo: R,
    cache: C,
}

impl<R: GroupRepository, C: CacheStore> GroupService<R, C> {
    pub fn new(repo: R, cache: C) -> Self {
        Self { repo, cache }
    }

    /// Creates a group and links the selected items. No cache side
    /// effect: groups are not directly cached.
    pub fn add(
        &mut self,
        fields: &CheckGroupFields,
        item_ids: &[i64],
    ) -> Result<i64, GroupServiceError> {
        let group_id = self.repo.create_group(fields, item_ids)?;
        info!(
            "event=group_add module=group_service status=ok id={group_id} items={}",
            item_ids.len()
        );
        Ok(group_id)
    }

    /// Pages groups with an optional case-insensitive substring filter.
    pub fn find_page(
        &self,
        query: Option<&str>,
        page: u32,
        page_size: u32,
    ) -> Result<PageResult<CheckGroup>, GroupServiceError> {
        let pattern = like_pattern(query);
        let page = normalize_page(page);
        let page_size = normalize_page_size(page_size);
        let offset = (page - 1).saturating_mul(page_size);
        Ok(self.repo.find_page(pattern.as_deref(), page_size, offset)?)
    }

    /// Gets one group by id; absent ids yield `Ok(None)`.
    pub fn find_by_id(&self, id: i64) -> RepoResult<Option<CheckGroup>> {
        self.repo.get_group(id)
    }

    /// Lists all groups.
    pub fn find_all(&self) -> RepoResult<Vec<CheckGroup>> {
        self.repo.list_groups()
    }

    /// Returns the item ids currently linked to the group.
    pub fn item_ids_by_group_id(&self, id: i64) -> RepoResult<Vec<i64>> {
        self.repo.item_ids_for_group(id)
    }

    /// Updates group fields, replaces the full item link set, then
    /// invalidates the cached detail entry of every package referencing
    /// this group.
    pub fn update(
        &mut self,
        group: &CheckGroup,
        item_ids: &[i64],
    ) -> Result<(), GroupServiceError> {
        self.repo.update_group(group, item_ids)?;
        info!(
            "event=group_update module=group_service status=ok id={} items={}",
            group.id,
            item_ids.len()
        );
        self.invalidate_dependent_details(group.id);
        Ok(())
    }

    /// Deletes a group unless a package still references it.
    pub fn delete_by_id(&mut self, id: i64) -> Result<(), GroupServiceError> {
        match self.repo.delete_group(id) {
            Ok(()) => {
                info!("event=group_delete module=group_service status=ok id={id}");
                Ok(())
            }
            Err(RepoError::InUse { dependents, .. }) => {
                warn!(
                    "event=group_delete module=group_service status=rejected id={id} setmeals={dependents}"
                );
                Err(GroupServiceError::GroupInUse {
                    id,
                    setmeals: dependents,
                })
            }
            Err(other) => Err(other.into()),
        }
    }

    // The store mutation has already committed; invalidation is
    // best-effort and a failure leaves the entry stale until the next
    // mutation that targets the same key.
    fn invalidate_dependent_details(&self, group_id: i64) {
        let setmeal_ids = match self.repo.setmeal_ids_referencing_group(group_id) {
            Ok(setmeal_ids) => setmeal_ids,
            Err(err) => {
                warn!(
                    "event=cache_invalidate module=group_service status=error group_id={group_id} error={err}"
                );
                return;
            }
        };

        for setmeal_id in setmeal_ids {
            let key = detail_key(setmeal_id);
            if let Err(err) = self.cache.delete(&key) {
                warn!(
                    "event=cache_invalidate module=group_service status=error key={key} error={err}"
                );
            }
        }
    }
}
