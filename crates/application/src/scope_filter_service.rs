//! Permission scope filter.
//!
//! Computes which identifiers of an entity type a user may see from the roles
//! they hold on customers, project groups and projects. Staff users get the
//! `Unrestricted` sentinel and never trigger a repository query.

use std::sync::Arc;

use nodeconductor_core::{AppError, AppResult, UserIdentity};
use nodeconductor_domain::{EntityKind, RoleScope, VisibleIds};
use tracing::debug;
use uuid::Uuid;

use crate::RoleScopeRepository;

/// Role scope of one caller, resolved once and reusable across entity types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedScope {
    /// Staff caller; everything is visible.
    Staff,
    /// Regular caller with the given role scope.
    Scoped(RoleScope),
}

/// Application service restricting reads to the caller's role scope.
#[derive(Clone)]
pub struct ScopeFilterService {
    repository: Arc<dyn RoleScopeRepository>,
}

impl ScopeFilterService {
    /// Creates a new scope filter.
    #[must_use]
    pub fn new(repository: Arc<dyn RoleScopeRepository>) -> Self {
        Self { repository }
    }

    /// Resolves the caller's role scope.
    pub async fn resolve(&self, actor: &UserIdentity) -> AppResult<ResolvedScope> {
        if actor.is_staff() {
            return Ok(ResolvedScope::Staff);
        }

        let scope = self.repository.resolve_scope(actor.user_id()).await?;
        Ok(ResolvedScope::Scoped(scope))
    }

    /// Expands an already resolved scope into identifiers of `kind`.
    pub async fn visible_ids_within(
        &self,
        resolved: &ResolvedScope,
        kind: EntityKind,
    ) -> AppResult<VisibleIds> {
        match resolved {
            ResolvedScope::Staff => Ok(VisibleIds::Unrestricted),
            ResolvedScope::Scoped(scope) if scope.is_empty() => Ok(VisibleIds::none()),
            ResolvedScope::Scoped(scope) => {
                let ids = self.repository.ids_within_scope(kind, scope).await?;
                Ok(VisibleIds::Restricted(ids))
            }
        }
    }

    /// Returns identifiers of `kind` under the given hierarchy roots,
    /// regardless of who is asking.
    pub async fn ids_under(&self, kind: EntityKind, roots: &RoleScope) -> AppResult<VisibleIds> {
        if roots.is_empty() {
            return Ok(VisibleIds::none());
        }

        let ids = self.repository.ids_within_scope(kind, roots).await?;
        Ok(VisibleIds::Restricted(ids))
    }

    /// Returns the identifiers of `kind` visible to the caller.
    pub async fn visible_ids(
        &self,
        actor: &UserIdentity,
        kind: EntityKind,
    ) -> AppResult<VisibleIds> {
        let resolved = self.resolve(actor).await?;
        let visible = self.visible_ids_within(&resolved, kind).await?;

        if visible.is_empty() {
            debug!(
                user_id = %actor.user_id(),
                entity = kind.as_str(),
                "caller has no visible entities"
            );
        }

        Ok(visible)
    }

    /// Keeps only the items of `kind` visible to the caller.
    pub async fn filter_collection<T, F>(
        &self,
        actor: &UserIdentity,
        kind: EntityKind,
        items: Vec<T>,
        id_of: F,
    ) -> AppResult<Vec<T>>
    where
        T: Send,
        F: Fn(&T) -> Uuid + Send,
    {
        let visible = self.visible_ids(actor, kind).await?;
        Ok(visible.filter(items, id_of))
    }

    /// Fails with `NotFound` unless the identifier is visible to the caller.
    pub async fn require_visible(
        &self,
        actor: &UserIdentity,
        kind: EntityKind,
        id: Uuid,
    ) -> AppResult<()> {
        if self.visible_ids(actor, kind).await?.contains(&id) {
            Ok(())
        } else {
            Err(AppError::NotFound(format!("{} '{id}' not found", kind.as_str())))
        }
    }
}
