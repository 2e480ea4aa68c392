use std::collections::BTreeSet;

use async_trait::async_trait;
use nodeconductor_core::{AppResult, UserId};
use nodeconductor_domain::{EntityKind, RoleScope};
use uuid::Uuid;

/// Resolves role scopes and expands them into entity identifiers.
///
/// Implementations must answer each call with a bounded number of set queries
/// (one per hierarchy level at most), never one query per entity row.
#[async_trait]
pub trait RoleScopeRepository: Send + Sync {
    /// Returns customers owned, project groups managed and projects
    /// administered or managed by the user.
    async fn resolve_scope(&self, user_id: UserId) -> AppResult<RoleScope>;

    /// Returns identifiers of `kind` located under any entity of `scope`.
    async fn ids_within_scope(
        &self,
        kind: EntityKind,
        scope: &RoleScope,
    ) -> AppResult<BTreeSet<Uuid>>;
}
