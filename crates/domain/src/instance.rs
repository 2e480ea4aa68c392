use std::str::FromStr;

use chrono::{DateTime, Utc};
use nodeconductor_core::{AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cloud::Flavor;
use crate::state_machine::{StateMachine, StatefulKind, Transition, TransitionEffect};
use crate::task::TaskName;

/// Lifecycle states of a VM instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceState {
    /// Being created by the backend.
    Provisioning,
    /// Stopped.
    Offline,
    /// Start scheduled or in progress.
    Starting,
    /// Running.
    Online,
    /// Stop scheduled or in progress.
    Stopping,
    /// Flavor change or disk extension in progress.
    Resizing,
    /// Removal scheduled or in progress.
    Deleting,
    /// Last backend operation failed.
    Erred,
}

impl InstanceState {
    /// Returns a human-readable label used in API messages.
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Provisioning => "Provisioning",
            Self::Offline => "Offline",
            Self::Starting => "Starting",
            Self::Online => "Online",
            Self::Stopping => "Stopping",
            Self::Resizing => "Resizing",
            Self::Deleting => "Deleting",
            Self::Erred => "Erred",
        }
    }
}

impl StateMachine for InstanceState {
    const KIND: StatefulKind = StatefulKind::Instance;
    const TRANSITIONS: &'static [Transition<Self>] = &[
        Transition {
            name: "start",
            sources: &[InstanceState::Offline],
            target: InstanceState::Starting,
        },
        Transition {
            name: "stop",
            sources: &[InstanceState::Online],
            target: InstanceState::Stopping,
        },
        Transition {
            name: "destroy",
            sources: &[
                InstanceState::Offline,
                InstanceState::Online,
                InstanceState::Erred,
            ],
            target: InstanceState::Deleting,
        },
        Transition {
            name: "resize",
            sources: &[InstanceState::Offline],
            target: InstanceState::Resizing,
        },
        Transition {
            name: "set_online",
            sources: &[InstanceState::Provisioning, InstanceState::Starting],
            target: InstanceState::Online,
        },
        Transition {
            name: "set_offline",
            sources: &[InstanceState::Stopping, InstanceState::Resizing],
            target: InstanceState::Offline,
        },
        Transition {
            name: "set_erred",
            sources: &[
                InstanceState::Provisioning,
                InstanceState::Starting,
                InstanceState::Stopping,
                InstanceState::Resizing,
                InstanceState::Deleting,
            ],
            target: InstanceState::Erred,
        },
    ];

    fn as_str(&self) -> &'static str {
        match self {
            Self::Provisioning => "provisioning",
            Self::Offline => "offline",
            Self::Starting => "starting",
            Self::Online => "online",
            Self::Stopping => "stopping",
            Self::Resizing => "resizing",
            Self::Deleting => "deleting",
            Self::Erred => "erred",
        }
    }

    fn parse(value: &str) -> Result<Self, AppError> {
        Self::from_str(value)
    }
}

impl FromStr for InstanceState {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "provisioning" => Ok(Self::Provisioning),
            "offline" => Ok(Self::Offline),
            "starting" => Ok(Self::Starting),
            "online" => Ok(Self::Online),
            "stopping" => Ok(Self::Stopping),
            "resizing" => Ok(Self::Resizing),
            "deleting" => Ok(Self::Deleting),
            "erred" => Ok(Self::Erred),
            _ => Err(AppError::Validation(format!(
                "unknown instance state '{value}'"
            ))),
        }
    }
}

/// Named instance transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceTransition {
    /// OFFLINE to STARTING.
    Start,
    /// ONLINE to STOPPING.
    Stop,
    /// Stable states to DELETING.
    Destroy,
    /// OFFLINE to RESIZING.
    Resize,
    /// Backend reports the instance running.
    SetOnline,
    /// Backend reports the instance stopped.
    SetOffline,
    /// Backend reports a failure.
    SetErred,
}

impl InstanceTransition {
    /// Returns the transition table name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Destroy => "destroy",
            Self::Resize => "resize",
            Self::SetOnline => "set_online",
            Self::SetOffline => "set_offline",
            Self::SetErred => "set_erred",
        }
    }
}

/// User-facing instance operations and the backend task each one schedules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceOperation {
    /// Power on.
    Start,
    /// Power off.
    Stop,
    /// Remove the instance.
    Destroy,
    /// Switch to another flavor.
    FlavorChange,
    /// Grow the data volume.
    DiskExtension,
}

impl InstanceOperation {
    /// Returns the label used in API status messages.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Destroy => "destroy",
            Self::FlavorChange => "flavor change",
            Self::DiskExtension => "disk extension",
        }
    }

    /// Returns the marker transition applied when the operation is scheduled.
    #[must_use]
    pub fn transition(&self) -> InstanceTransition {
        match self {
            Self::Start => InstanceTransition::Start,
            Self::Stop => InstanceTransition::Stop,
            Self::Destroy => InstanceTransition::Destroy,
            Self::FlavorChange | Self::DiskExtension => InstanceTransition::Resize,
        }
    }

    /// Returns the backend task performing the operation.
    #[must_use]
    pub fn task(&self) -> TaskName {
        match self {
            Self::Start => TaskName::StartInstance,
            Self::Stop => TaskName::StopInstance,
            Self::Destroy => TaskName::DeleteInstance,
            Self::FlavorChange => TaskName::UpdateInstanceFlavor,
            Self::DiskExtension => TaskName::ExtendInstanceDisk,
        }
    }
}

/// Persisted VM instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    /// Stable identifier.
    pub id: Uuid,
    /// Host name.
    pub hostname: NonEmptyString,
    /// Optional description.
    pub description: Option<String>,
    /// Cloud-project link the instance runs in.
    pub membership_id: Uuid,
    /// Project of the membership.
    pub project_id: Uuid,
    /// Cloud of the membership.
    pub cloud_id: Uuid,
    /// Current flavor.
    pub flavor_id: Uuid,
    /// Template name the instance was built from.
    pub template_name: Option<String>,
    /// CPU cores.
    pub cores: i32,
    /// Memory in MiB.
    pub ram: i32,
    /// System volume size in MiB.
    pub system_volume_size: i32,
    /// Data volume size in MiB.
    pub data_volume_size: i32,
    /// SLA level agreed at creation.
    pub agreed_sla: Option<f64>,
    /// Attached security groups.
    pub security_group_ids: Vec<Uuid>,
    /// Lifecycle state.
    pub state: InstanceState,
    /// Last time the instance went online.
    pub start_time: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Validated input for a new instance.
#[derive(Debug, Clone, PartialEq)]
pub struct NewInstance {
    /// Host name.
    pub hostname: NonEmptyString,
    /// Optional description.
    pub description: Option<String>,
    /// Cloud-project link.
    pub membership_id: Uuid,
    /// Initial flavor.
    pub flavor: Flavor,
    /// Template name.
    pub template_name: Option<String>,
    /// SLA level copied from the template.
    pub agreed_sla: Option<f64>,
    /// Data volume size in MiB.
    pub data_volume_size: i32,
    /// Security groups to attach.
    pub security_group_ids: Vec<Uuid>,
}

impl NewInstance {
    /// Validates the data volume size against the flavor disk.
    pub fn validate(&self) -> AppResult<()> {
        if self.data_volume_size <= 0 {
            return Err(AppError::Validation(
                "data_volume_size must be positive".to_owned(),
            ));
        }

        if let Some(sla) = self.agreed_sla
            && !(0.0..=100.0).contains(&sla)
        {
            return Err(AppError::Validation(
                "agreed_sla must be between 0 and 100".to_owned(),
            ));
        }

        Ok(())
    }
}

/// Requested resize of an offline instance.
#[derive(Debug, Clone, PartialEq)]
pub enum ResizeTarget {
    /// Switch to another flavor of the same cloud.
    Flavor(Flavor),
    /// Grow the data volume to the given size in MiB.
    DiskSize(i32),
}

impl Instance {
    /// Validates a resize and returns the operation with its field changes.
    pub fn plan_resize(
        &self,
        target: &ResizeTarget,
    ) -> AppResult<(InstanceOperation, TransitionEffect)> {
        if self.state != InstanceState::Offline {
            return Err(AppError::Conflict("Instance must be offline".to_owned()));
        }

        match target {
            ResizeTarget::Flavor(flavor) => {
                if flavor.cloud_id != self.cloud_id {
                    return Err(AppError::Validation(
                        "New flavor is not within the same cloud".to_owned(),
                    ));
                }

                Ok((
                    InstanceOperation::FlavorChange,
                    TransitionEffect::InstanceFlavor {
                        flavor_id: flavor.id,
                        cores: flavor.cores,
                        ram: flavor.ram,
                    },
                ))
            }
            ResizeTarget::DiskSize(size) => {
                if *size <= self.data_volume_size {
                    return Err(AppError::Validation(
                        "Disk size must be strictly greater than the current one".to_owned(),
                    ));
                }

                Ok((
                    InstanceOperation::DiskExtension,
                    TransitionEffect::InstanceDataVolume { size: *size },
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use nodeconductor_core::NonEmptyString;
    use proptest::prelude::*;
    use uuid::Uuid;

    use super::{Instance, InstanceOperation, InstanceState, ResizeTarget};
    use crate::cloud::Flavor;
    use crate::state_machine::{StateMachine, TransitionEffect, TransitionRejection, next_state};

    const ALL_STATES: [InstanceState; 8] = [
        InstanceState::Provisioning,
        InstanceState::Offline,
        InstanceState::Starting,
        InstanceState::Online,
        InstanceState::Stopping,
        InstanceState::Resizing,
        InstanceState::Deleting,
        InstanceState::Erred,
    ];

    fn offline_instance(cloud_id: Uuid) -> Instance {
        Instance {
            id: Uuid::new_v4(),
            hostname: NonEmptyString::new("web-1").unwrap_or_else(|_| unreachable!()),
            description: None,
            membership_id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            cloud_id,
            flavor_id: Uuid::new_v4(),
            template_name: None,
            cores: 1,
            ram: 1024,
            system_volume_size: 10240,
            data_volume_size: 20480,
            agreed_sla: None,
            security_group_ids: Vec::new(),
            state: InstanceState::Offline,
            start_time: None,
            created_at: Utc::now(),
        }
    }

    fn flavor(cloud_id: Uuid) -> Flavor {
        Flavor {
            id: Uuid::new_v4(),
            cloud_id,
            name: "m1.large".to_owned(),
            cores: 4,
            ram: 8192,
            disk: 81920,
        }
    }

    #[test]
    fn start_moves_offline_to_starting() {
        assert_eq!(
            next_state(InstanceState::Offline, "start"),
            Ok(InstanceState::Starting)
        );
    }

    #[test]
    fn start_from_starting_is_rejected() {
        assert_eq!(
            next_state(InstanceState::Starting, "start"),
            Err(TransitionRejection::SourceStateNotAllowed)
        );
    }

    #[test]
    fn destroy_accepts_only_stable_states() {
        for state in ALL_STATES {
            let allowed = matches!(
                state,
                InstanceState::Offline | InstanceState::Online | InstanceState::Erred
            );
            assert_eq!(next_state(state, "destroy").is_ok(), allowed, "{state:?}");
        }
    }

    #[test]
    fn storage_values_roundtrip() {
        for state in ALL_STATES {
            assert_eq!(InstanceState::parse(state.as_str()).ok(), Some(state));
        }
    }

    #[test]
    fn flavor_resize_copies_hardware() {
        let cloud_id = Uuid::new_v4();
        let instance = offline_instance(cloud_id);
        let flavor = flavor(cloud_id);

        let planned = instance.plan_resize(&ResizeTarget::Flavor(flavor.clone()));
        let Ok((operation, effect)) = planned else {
            panic!("resize should be accepted");
        };
        assert_eq!(operation, InstanceOperation::FlavorChange);
        assert_eq!(
            effect,
            TransitionEffect::InstanceFlavor {
                flavor_id: flavor.id,
                cores: 4,
                ram: 8192,
            }
        );
    }

    #[test]
    fn flavor_from_other_cloud_is_rejected() {
        let instance = offline_instance(Uuid::new_v4());
        let planned = instance.plan_resize(&ResizeTarget::Flavor(flavor(Uuid::new_v4())));
        assert!(planned.is_err());
    }

    #[test]
    fn disk_must_grow() {
        let instance = offline_instance(Uuid::new_v4());
        assert!(instance.plan_resize(&ResizeTarget::DiskSize(20480)).is_err());
        assert!(instance.plan_resize(&ResizeTarget::DiskSize(30720)).is_ok());
    }

    #[test]
    fn resize_requires_offline() {
        let mut instance = offline_instance(Uuid::new_v4());
        instance.state = InstanceState::Online;
        assert!(instance.plan_resize(&ResizeTarget::DiskSize(99999)).is_err());
    }

    proptest! {
        #[test]
        fn accepted_transitions_come_from_declared_sources(
            state_index in 0usize..8,
            name in prop::sample::select(vec![
                "start", "stop", "destroy", "resize", "set_online", "set_offline", "set_erred", "reboot",
            ]),
        ) {
            let state = ALL_STATES[state_index];
            if let Ok(target) = next_state(state, name) {
                let declared = InstanceState::TRANSITIONS
                    .iter()
                    .any(|transition| {
                        transition.name == name
                            && transition.sources.contains(&state)
                            && transition.target == target
                    });
                prop_assert!(declared);
            }
        }
    }
}
