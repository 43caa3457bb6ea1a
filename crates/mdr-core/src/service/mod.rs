//! Generic service layer
//!
//! Validates input, loads the aggregate root, applies one state-machine
//! transition under the optimistic concurrency guard and projects the result.
//! Every public operation is bracketed by the canonical logging macros and
//! attaches entity-kind/uid/operation context to the errors it returns.

pub mod filtering;
pub mod view;

pub use filtering::{
    FilterClause, FilterJoin, FilterOperator, ListQuery, Page, PageLimits, SortKey,
};
pub use view::{ItemView, VersionHistoryEntry};

use chrono::Duration;
use mdr_core_types::{schema, RequestContext};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;

use crate::concurrency::{check_lock_token, LeaseGuard, LeaseStore, LockToken};
use crate::errors::{ExError, MdrError};
use crate::model::{LibraryItem, LibraryItemStatus, ObjectAction, Payload};
use crate::repository::{GenericRepository, LibraryRepository, VersionSelector};
use crate::{log_op_end, log_op_error, log_op_start};

/// Tunables of a service instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceSettings {
    pub lease_ttl: Duration,
    pub page_limits: PageLimits,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            lease_ttl: Duration::seconds(300),
            page_limits: PageLimits::default(),
        }
    }
}

/// Lifecycle operations for one entity kind over any repository backend
pub struct GenericService<P: Payload, R: GenericRepository<P>> {
    repo: Arc<R>,
    libraries: Arc<dyn LibraryRepository>,
    leases: Arc<dyn LeaseStore>,
    settings: ServiceSettings,
    _payload: PhantomData<fn() -> P>,
}

impl<P, R> GenericService<P, R>
where
    P: Payload,
    R: GenericRepository<P>,
{
    pub fn new(
        repo: Arc<R>,
        libraries: Arc<dyn LibraryRepository>,
        leases: Arc<dyn LeaseStore>,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            repo,
            libraries,
            leases,
            settings,
            _payload: PhantomData,
        }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    fn observe<T>(
        &self,
        op: &'static str,
        ctx: Option<&RequestContext>,
        uid: Option<&str>,
        f: impl FnOnce() -> Result<T, ExError>,
    ) -> Result<T, ExError> {
        let start = Instant::now();
        let request_id = ctx.map(|c| c.request_id.to_string()).unwrap_or_default();
        log_op_start!(
            op,
            entity_kind = P::KIND,
            uid = uid,
            { schema::FIELD_REQUEST_ID } = %request_id
        );

        let result = f().map_err(|err| {
            let err = err.or_context(op, P::KIND, uid);
            match ctx {
                Some(ctx) => err.with_request_id(ctx.request_id.clone()),
                None => err,
            }
        });

        let duration_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => {
                log_op_end!(op, duration_ms = duration_ms, entity_kind = P::KIND, uid = uid);
            }
            Err(err) => {
                log_op_error!(
                    op,
                    err.clone(),
                    duration_ms = duration_ms,
                    entity_kind = P::KIND,
                    uid = uid
                );
            }
        }
        result
    }

    fn not_found(uid: &str) -> ExError {
        MdrError::NotFound {
            entity_kind: P::KIND.to_string(),
            uid: uid.to_string(),
        }
        .into()
    }

    fn load_current(&self, uid: &str) -> Result<LibraryItem<P>, ExError> {
        self.repo
            .find_by_uid(uid, &VersionSelector::Latest)?
            .ok_or_else(|| Self::not_found(uid))
    }

    fn ensure_key_free(&self, payload: &P, library: &str, uid: Option<&str>) -> Result<(), ExError> {
        let key = payload.natural_key();
        if self
            .repo
            .check_exists_by_name_in_library(&key, library, uid)?
        {
            return Err(MdrError::DuplicateNaturalKey {
                entity_kind: P::KIND.to_string(),
                key,
                library: library.to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Load, guard, transition and save one item
    fn mutate(
        &self,
        uid: &str,
        expected: Option<LockToken>,
        transition: impl FnOnce(&mut LibraryItem<P>) -> Result<(), ExError>,
    ) -> Result<LibraryItem<P>, ExError> {
        let mut item = self.load_current(uid)?;
        check_lock_token(P::KIND, uid, expected, item.lock_token())?;
        transition(&mut item)?;
        self.repo.save(&mut item)?;
        Ok(item)
    }

    /// Create a new item in Draft 0.1
    pub fn create(
        &self,
        ctx: &RequestContext,
        library_name: &str,
        payload: P,
        change_description: Option<String>,
    ) -> Result<ItemView<P>, ExError> {
        self.observe("create", Some(ctx), None, || {
            payload.validate()?;
            let library = self.libraries.find_library(library_name)?.ok_or_else(|| {
                MdrError::LibraryNotFound {
                    library: library_name.to_string(),
                }
            })?;
            if !library.is_editable {
                return Err(MdrError::LibraryNotEditable {
                    library: library.name,
                }
                .into());
            }
            self.ensure_key_free(&payload, &library.name, None)?;

            let uid = self.repo.generate_uid()?;
            let mut item = LibraryItem::create(
                uid,
                library,
                payload,
                &ctx.author,
                change_description.or_else(|| Some("Initial version".to_string())),
            )?;
            self.repo.save(&mut item)?;
            Ok(ItemView::from_item(&item))
        })
    }

    /// Resolve one snapshot
    pub fn get(&self, uid: &str, selector: &VersionSelector) -> Result<ItemView<P>, ExError> {
        self.observe("get", None, Some(uid), || {
            if let Some(item) = self.repo.find_by_uid(uid, selector)? {
                return Ok(ItemView::from_item(&item));
            }
            if !selector.is_latest()
                && self
                    .repo
                    .find_by_uid(uid, &VersionSelector::Latest)?
                    .is_some()
            {
                return Err(MdrError::SnapshotNotFound {
                    entity_kind: P::KIND.to_string(),
                    uid: uid.to_string(),
                    selector: selector.to_string(),
                }
                .into());
            }
            Err(Self::not_found(uid))
        })
    }

    /// Current versions, optionally filtered
    pub fn get_all(
        &self,
        status: Option<LibraryItemStatus>,
        library_name: Option<&str>,
    ) -> Result<Vec<ItemView<P>>, ExError> {
        self.observe("get_all", None, None, || {
            Ok(self
                .repo
                .find_all(status, library_name)?
                .iter()
                .map(ItemView::from_item)
                .collect())
        })
    }

    /// Current versions of study-scoped items of one study
    pub fn get_by_study(&self, study_uid: &str) -> Result<Vec<ItemView<P>>, ExError> {
        self.observe("get_by_study", None, None, || {
            Ok(self
                .repo
                .find_all_by_study_uid(study_uid)?
                .iter()
                .map(ItemView::from_item)
                .collect())
        })
    }

    /// Current versions of study-scoped items of one project
    pub fn get_by_project(&self, project_number: &str) -> Result<Vec<ItemView<P>>, ExError> {
        self.observe("get_by_project", None, None, || {
            Ok(self
                .repo
                .find_all_by_project_number(project_number)?
                .iter()
                .map(ItemView::from_item)
                .collect())
        })
    }

    /// Full history newest first, each entry flagged with changed fields
    pub fn get_versions(&self, uid: &str) -> Result<Vec<VersionHistoryEntry<P>>, ExError> {
        self.observe("get_versions", None, Some(uid), || {
            let items = self.repo.get_all_versions(uid)?;
            if items.is_empty() {
                return Err(Self::not_found(uid));
            }
            view::history_with_changes(&items)
        })
    }

    /// Final and Retired snapshots newest first
    pub fn get_releases(&self, uid: &str) -> Result<Vec<ItemView<P>>, ExError> {
        self.observe("get_releases", None, Some(uid), || {
            self.load_current(uid)?;
            Ok(self
                .repo
                .find_releases(uid)?
                .iter()
                .map(ItemView::from_item)
                .collect())
        })
    }

    pub fn possible_actions(&self, uid: &str) -> Result<Vec<ObjectAction>, ExError> {
        self.observe("possible_actions", None, Some(uid), || {
            Ok(self.load_current(uid)?.possible_actions())
        })
    }

    /// Draft -> Draft with a new payload
    pub fn edit(
        &self,
        ctx: &RequestContext,
        uid: &str,
        payload: P,
        change_description: Option<String>,
        expected: Option<LockToken>,
    ) -> Result<ItemView<P>, ExError> {
        self.observe("edit", Some(ctx), Some(uid), || {
            payload.validate()?;
            let item = self.mutate(uid, expected, |item| {
                if payload.natural_key() != item.payload().natural_key() {
                    self.ensure_key_free(&payload, &item.library().name, Some(uid))?;
                }
                item.edit(payload, &ctx.author, change_description)?;
                Ok(())
            })?;
            Ok(ItemView::from_item(&item))
        })
    }

    /// Draft -> Final
    pub fn approve(
        &self,
        ctx: &RequestContext,
        uid: &str,
        change_description: Option<String>,
        expected: Option<LockToken>,
    ) -> Result<ItemView<P>, ExError> {
        self.observe("approve", Some(ctx), Some(uid), || {
            let item = self.mutate(uid, expected, |item| {
                item.approve(
                    &ctx.author,
                    change_description.or_else(|| Some("Approved version".to_string())),
                )?;
                self.ensure_key_free(item.payload(), &item.library().name, Some(uid))
            })?;
            Ok(ItemView::from_item(&item))
        })
    }

    /// Final -> Draft derived from the Final payload
    pub fn new_version(
        &self,
        ctx: &RequestContext,
        uid: &str,
        change_description: Option<String>,
        expected: Option<LockToken>,
    ) -> Result<ItemView<P>, ExError> {
        self.observe("new_version", Some(ctx), Some(uid), || {
            let item = self.mutate(uid, expected, |item| {
                item.new_version(
                    &ctx.author,
                    change_description.or_else(|| Some("New draft created".to_string())),
                )?;
                Ok(())
            })?;
            Ok(ItemView::from_item(&item))
        })
    }

    /// Final -> Retired
    pub fn retire(
        &self,
        ctx: &RequestContext,
        uid: &str,
        expected: Option<LockToken>,
    ) -> Result<ItemView<P>, ExError> {
        self.observe("retire", Some(ctx), Some(uid), || {
            let item = self.mutate(uid, expected, |item| {
                item.retire(&ctx.author, Some("Inactivated version".to_string()))?;
                Ok(())
            })?;
            Ok(ItemView::from_item(&item))
        })
    }

    /// Retired -> Final
    pub fn reactivate(
        &self,
        ctx: &RequestContext,
        uid: &str,
        expected: Option<LockToken>,
    ) -> Result<ItemView<P>, ExError> {
        self.observe("reactivate", Some(ctx), Some(uid), || {
            let item = self.mutate(uid, expected, |item| {
                item.reactivate(&ctx.author, Some("Reactivated version".to_string()))?;
                Ok(())
            })?;
            Ok(ItemView::from_item(&item))
        })
    }

    /// Hard-delete a Draft that never had a Final version
    pub fn delete(
        &self,
        ctx: &RequestContext,
        uid: &str,
        expected: Option<LockToken>,
    ) -> Result<(), ExError> {
        self.observe("delete", Some(ctx), Some(uid), || {
            self.mutate(uid, expected, |item| {
                if self.repo.check_exists_final_version(uid)? {
                    return Err(MdrError::InvalidStateTransition {
                        entity_kind: P::KIND.to_string(),
                        uid: uid.to_string(),
                        status: item.status().to_string(),
                        action: ObjectAction::Delete.to_string(),
                    }
                    .into());
                }
                item.mark_deleted()?;
                Ok(())
            })
            .map(|_| ())
        })
    }

    /// Paginated listing over current versions
    pub fn list(&self, query: &ListQuery) -> Result<Page<ItemView<P>>, ExError> {
        self.observe("list", None, None, || {
            let views: Vec<ItemView<P>> = self
                .repo
                .find_all(query.status, query.library_name.as_deref())?
                .iter()
                .map(ItemView::from_item)
                .collect();
            filtering::filter_sort_paginate(views, query, self.settings.page_limits)
        })
    }

    /// Run a multi-step structural update under the study's advisory lease
    ///
    /// Fails fast with `ResourceLocked` if another holder has a live lease.
    /// The lease is released when `f` returns or unwinds.
    pub fn with_study_lease<T>(
        &self,
        ctx: &RequestContext,
        study_uid: &str,
        f: impl FnOnce(&Self) -> Result<T, ExError>,
    ) -> Result<T, ExError> {
        self.observe("with_study_lease", Some(ctx), None, || {
            let guard = LeaseGuard::acquire(
                self.leases.as_ref(),
                study_uid,
                &ctx.author,
                self.settings.lease_ttl,
            )?;
            tracing::debug!(
                holder = %ctx.author,
                { schema::FIELD_STUDY_UID } = study_uid,
                "study lease acquired"
            );
            let outcome = f(self);
            let released = guard.release();
            let value = outcome?;
            released?;
            Ok(value)
        })
    }
}
