use std::collections::BTreeSet;

use uuid::Uuid;

use crate::structure::{Role, RoleAssignment, ScopeLevel};

/// Structure entities on which a user holds a visibility-granting role.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleScope {
    /// Customers where the user is owner.
    pub customer_ids: BTreeSet<Uuid>,
    /// Project groups where the user is manager.
    pub project_group_ids: BTreeSet<Uuid>,
    /// Projects where the user is administrator or manager.
    pub project_ids: BTreeSet<Uuid>,
}

impl RoleScope {
    /// Builds a scope from raw assignments, ignoring roles that grant no visibility.
    #[must_use]
    pub fn from_assignments<'a>(assignments: impl IntoIterator<Item = &'a RoleAssignment>) -> Self {
        let mut scope = Self::default();

        for assignment in assignments {
            match (assignment.level, assignment.role) {
                (ScopeLevel::Customer, Role::Owner) => {
                    scope.customer_ids.insert(assignment.scope_id);
                }
                (ScopeLevel::ProjectGroup, Role::Manager) => {
                    scope.project_group_ids.insert(assignment.scope_id);
                }
                (ScopeLevel::Project, Role::Administrator | Role::Manager) => {
                    scope.project_ids.insert(assignment.scope_id);
                }
                _ => {}
            }
        }

        scope
    }

    /// Returns whether no level grants anything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.customer_ids.is_empty()
            && self.project_group_ids.is_empty()
            && self.project_ids.is_empty()
    }

    /// Returns the union of two scopes.
    #[must_use]
    pub fn union(mut self, other: &Self) -> Self {
        self.customer_ids.extend(other.customer_ids.iter().copied());
        self.project_group_ids
            .extend(other.project_group_ids.iter().copied());
        self.project_ids.extend(other.project_ids.iter().copied());
        self
    }
}

/// Identifiers of one entity type a user may see.
///
/// `Unrestricted` is a sentinel for staff users; it is never expanded into the
/// full identifier set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisibleIds {
    /// Every identifier is visible.
    Unrestricted,
    /// Only the listed identifiers are visible.
    Restricted(BTreeSet<Uuid>),
}

impl VisibleIds {
    /// Returns an empty restricted set.
    #[must_use]
    pub fn none() -> Self {
        Self::Restricted(BTreeSet::new())
    }

    /// Returns whether the identifier is visible.
    #[must_use]
    pub fn contains(&self, id: &Uuid) -> bool {
        match self {
            Self::Unrestricted => true,
            Self::Restricted(ids) => ids.contains(id),
        }
    }

    /// Returns whether nothing is visible.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Restricted(ids) if ids.is_empty())
    }

    /// Returns the restricted identifiers as a vector for `= ANY($n)` binds.
    ///
    /// `None` means no restriction applies.
    #[must_use]
    pub fn to_bind(&self) -> Option<Vec<Uuid>> {
        match self {
            Self::Unrestricted => None,
            Self::Restricted(ids) => Some(ids.iter().copied().collect()),
        }
    }

    /// Narrows the visible set to the intersection with `other`.
    #[must_use]
    pub fn intersect(&self, other: &Self) -> Self {
        match (self, other) {
            (Self::Unrestricted, value) | (value, Self::Unrestricted) => value.clone(),
            (Self::Restricted(left), Self::Restricted(right)) => {
                Self::Restricted(left.intersection(right).copied().collect())
            }
        }
    }

    /// Keeps only the items whose identifier is visible.
    #[must_use]
    pub fn filter<T>(&self, items: Vec<T>, id_of: impl Fn(&T) -> Uuid) -> Vec<T> {
        match self {
            Self::Unrestricted => items,
            Self::Restricted(ids) if ids.is_empty() => Vec::new(),
            Self::Restricted(ids) => items
                .into_iter()
                .filter(|item| ids.contains(&id_of(item)))
                .collect(),
        }
    }
}

impl FromIterator<Uuid> for VisibleIds {
    fn from_iter<I: IntoIterator<Item = Uuid>>(iter: I) -> Self {
        Self::Restricted(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use nodeconductor_core::UserId;
    use proptest::prelude::*;
    use uuid::Uuid;

    use super::{RoleScope, VisibleIds};
    use crate::structure::{Role, RoleAssignment, ScopeLevel};

    fn uuid_set() -> impl Strategy<Value = BTreeSet<Uuid>> {
        proptest::collection::btree_set(any::<u128>().prop_map(Uuid::from_u128), 0..16)
    }

    #[test]
    fn scope_ignores_non_visibility_roles() {
        let user_id = UserId::new();
        let project_id = Uuid::new_v4();
        let customer_id = Uuid::new_v4();
        let assignments = [
            RoleAssignment {
                id: Uuid::new_v4(),
                user_id,
                level: ScopeLevel::Project,
                scope_id: project_id,
                role: Role::Administrator,
            },
            RoleAssignment {
                id: Uuid::new_v4(),
                user_id,
                level: ScopeLevel::Customer,
                scope_id: customer_id,
                role: Role::Manager,
            },
        ];

        let scope = RoleScope::from_assignments(assignments.iter());
        assert!(scope.project_ids.contains(&project_id));
        assert!(scope.customer_ids.is_empty());
    }

    #[test]
    fn empty_restriction_filters_everything() {
        let items = vec![Uuid::new_v4(), Uuid::new_v4()];
        assert!(VisibleIds::none().filter(items, |id| *id).is_empty());
    }

    proptest! {
        #[test]
        fn filter_is_idempotent(visible in uuid_set(), items in uuid_set(), extra in uuid_set()) {
            let visible: VisibleIds = visible.into_iter().chain(extra.iter().copied()).collect();
            let collection: Vec<Uuid> = items.into_iter().chain(extra).collect();

            let once = visible.filter(collection, |id| *id);
            let twice = visible.filter(once.clone(), |id| *id);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn filtered_items_are_subset_of_visible(visible in uuid_set(), items in uuid_set()) {
            let visible_ids: VisibleIds = visible.iter().copied().collect();
            let filtered = visible_ids.filter(items.into_iter().collect(), |id| *id);
            prop_assert!(filtered.iter().all(|id| visible.contains(id)));
        }

        #[test]
        fn unrestricted_keeps_collection(items in uuid_set()) {
            let collection: Vec<Uuid> = items.into_iter().collect();
            prop_assert_eq!(
                VisibleIds::Unrestricted.filter(collection.clone(), |id| *id),
                collection
            );
        }

        #[test]
        fn intersection_is_commutative(left in uuid_set(), right in uuid_set()) {
            let left: VisibleIds = left.into_iter().collect();
            let right: VisibleIds = right.into_iter().collect();
            prop_assert_eq!(left.intersect(&right), right.intersect(&left));
        }
    }
}
