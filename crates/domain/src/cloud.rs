use std::str::FromStr;

use chrono::{DateTime, Utc};
use nodeconductor_core::{AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

/// Cloud account owned by a customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cloud {
    /// Stable identifier.
    pub id: Uuid,
    /// Owning customer.
    pub customer_id: Uuid,
    /// Display name.
    pub name: NonEmptyString,
    /// Identity endpoint of the backend.
    pub auth_url: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Cloud {
    /// Creates a cloud after validating the identity endpoint.
    pub fn new(customer_id: Uuid, name: &str, auth_url: &str) -> AppResult<Self> {
        let parsed = Url::parse(auth_url)
            .map_err(|error| AppError::Validation(format!("invalid auth_url '{auth_url}': {error}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AppError::Validation(format!(
                "auth_url must use http or https, got '{}'",
                parsed.scheme()
            )));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            customer_id,
            name: NonEmptyString::new(name)?,
            auth_url: parsed.to_string(),
            created_at: Utc::now(),
        })
    }
}

/// Hardware profile offered by a cloud.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flavor {
    /// Stable identifier.
    pub id: Uuid,
    /// Cloud offering the flavor.
    pub cloud_id: Uuid,
    /// Backend name.
    pub name: String,
    /// CPU cores.
    pub cores: i32,
    /// Memory in MiB.
    pub ram: i32,
    /// Root disk in MiB.
    pub disk: i32,
}

/// Synchronization status of a cloud-project link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SynchronizationState {
    /// Created, not yet pushed to the backend.
    New,
    /// Sync in progress.
    Syncing,
    /// Backend tenant matches.
    InSync,
    /// Last sync failed.
    Erred,
}

impl SynchronizationState {
    /// Returns a stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Syncing => "syncing",
            Self::InSync => "in_sync",
            Self::Erred => "erred",
        }
    }
}

impl FromStr for SynchronizationState {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "new" => Ok(Self::New),
            "syncing" => Ok(Self::Syncing),
            "in_sync" => Ok(Self::InSync),
            "erred" => Ok(Self::Erred),
            _ => Err(AppError::Validation(format!(
                "unknown synchronization state '{value}'"
            ))),
        }
    }
}

/// Link between a cloud and a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudProjectMembership {
    /// Stable identifier.
    pub id: Uuid,
    /// Linked cloud.
    pub cloud_id: Uuid,
    /// Linked project.
    pub project_id: Uuid,
    /// Backend tenant identifier once synced.
    pub tenant_id: Option<String>,
    /// Synchronization status.
    pub state: SynchronizationState,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Resource ceilings or consumption of one membership.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceQuota {
    /// CPU cores.
    pub vcpu: i64,
    /// Memory in MiB.
    pub ram: i64,
    /// Volume storage in MiB.
    pub storage: i64,
    /// Number of instances.
    pub max_instances: i64,
    /// Backup storage in MiB.
    pub backup_storage: i64,
}

/// Quota and usage rows of one membership; either may be missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipQuotas {
    /// Membership identifier.
    pub membership_id: Uuid,
    /// Declared ceilings.
    pub quota: Option<ResourceQuota>,
    /// Current consumption.
    pub usage: Option<ResourceQuota>,
}

/// Sum of quotas and usages over a set of memberships.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QuotaTotals {
    /// Summed vcpu quota.
    pub vcpu: i64,
    /// Summed ram quota.
    pub ram: i64,
    /// Summed storage quota.
    pub storage: i64,
    /// Summed instance count quota.
    pub max_instances: i64,
    /// Summed backup storage quota.
    pub backup_storage: i64,
    /// Summed vcpu usage.
    pub vcpu_usage: i64,
    /// Summed ram usage.
    pub ram_usage: i64,
    /// Summed storage usage.
    pub storage_usage: i64,
    /// Summed instance count usage.
    pub max_instances_usage: i64,
    /// Summed backup storage usage.
    pub backup_storage_usage: i64,
}

impl QuotaTotals {
    /// Sums quota rows; memberships without a row contribute zero.
    #[must_use]
    pub fn sum<'a>(memberships: impl IntoIterator<Item = &'a MembershipQuotas>) -> Self {
        memberships
            .into_iter()
            .fold(Self::default(), |mut totals, membership| {
                if let Some(quota) = membership.quota {
                    totals.vcpu += quota.vcpu;
                    totals.ram += quota.ram;
                    totals.storage += quota.storage;
                    totals.max_instances += quota.max_instances;
                    totals.backup_storage += quota.backup_storage;
                }
                if let Some(usage) = membership.usage {
                    totals.vcpu_usage += usage.vcpu;
                    totals.ram_usage += usage.ram;
                    totals.storage_usage += usage.storage;
                    totals.max_instances_usage += usage.max_instances;
                    totals.backup_storage_usage += usage.backup_storage;
                }
                totals
            })
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use uuid::Uuid;

    use super::{Cloud, MembershipQuotas, QuotaTotals, ResourceQuota};

    fn quota(value: i64) -> ResourceQuota {
        ResourceQuota {
            vcpu: value,
            ram: value * 1024,
            storage: value * 10240,
            max_instances: value,
            backup_storage: value * 2048,
        }
    }

    #[test]
    fn cloud_rejects_non_http_auth_url() {
        assert!(Cloud::new(Uuid::new_v4(), "Private", "ftp://keystone:5000").is_err());
        assert!(Cloud::new(Uuid::new_v4(), "Private", "http://keystone:5000/v2.0").is_ok());
    }

    #[test]
    fn membership_without_rows_contributes_zero() {
        let memberships = [
            MembershipQuotas {
                membership_id: Uuid::new_v4(),
                quota: Some(quota(2)),
                usage: Some(quota(1)),
            },
            MembershipQuotas {
                membership_id: Uuid::new_v4(),
                quota: None,
                usage: None,
            },
        ];

        let totals = QuotaTotals::sum(memberships.iter());
        assert_eq!(totals.vcpu, 2);
        assert_eq!(totals.ram_usage, 1024);
        assert_eq!(totals.backup_storage, 4096);
    }

    #[test]
    fn empty_input_yields_zero_totals() {
        assert_eq!(QuotaTotals::sum([].iter()), QuotaTotals::default());
    }

    proptest! {
        #[test]
        fn missing_rows_equal_sum_over_present_rows(
            rows in proptest::collection::vec(
                (proptest::option::of(0i64..1000), proptest::option::of(0i64..1000)),
                0..12,
            ),
        ) {
            let memberships: Vec<MembershipQuotas> = rows
                .iter()
                .map(|(quota_value, usage_value)| MembershipQuotas {
                    membership_id: Uuid::new_v4(),
                    quota: quota_value.map(quota),
                    usage: usage_value.map(quota),
                })
                .collect();

            let present_quota: Vec<MembershipQuotas> = memberships
                .iter()
                .filter(|membership| membership.quota.is_some())
                .map(|membership| MembershipQuotas { usage: None, ..membership.clone() })
                .collect();

            let totals = QuotaTotals::sum(memberships.iter());
            let quota_only = QuotaTotals::sum(present_quota.iter());
            prop_assert_eq!(totals.vcpu, quota_only.vcpu);
            prop_assert_eq!(totals.storage, quota_only.storage);
        }
    }
}
