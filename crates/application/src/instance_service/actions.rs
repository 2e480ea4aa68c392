use super::*;

impl InstanceService {
    /// Schedules start, stop or destroy.
    pub async fn schedule_operation(
        &self,
        actor: &UserIdentity,
        instance_id: Uuid,
        operation: InstanceOperation,
    ) -> AppResult<OperationScheduled> {
        if matches!(
            operation,
            InstanceOperation::FlavorChange | InstanceOperation::DiskExtension
        ) {
            return Err(AppError::Validation(
                "resize operations require a resize target".to_owned(),
            ));
        }

        let instance = self.get_instance(actor, instance_id).await?;
        self.authorization_service
            .require_project_administrator(actor, instance.project_id)
            .await?;

        let request = TransitionRequest::new(instance_id, operation.transition().as_str())
            .with_follow_up(NewTask::new(operation.task(), instance_id));
        self.run(actor, operation, request).await
    }

    /// Schedules a flavor change or a data-volume extension of an offline
    /// instance.
    pub async fn resize(
        &self,
        actor: &UserIdentity,
        instance_id: Uuid,
        input: ResizeInstanceInput,
    ) -> AppResult<OperationScheduled> {
        let instance = self.get_instance(actor, instance_id).await?;
        self.authorization_service
            .require_project_administrator(actor, instance.project_id)
            .await?;

        if instance.state != InstanceState::Offline {
            return Err(AppError::Conflict("Instance must be offline".to_owned()));
        }

        let target = match (input.flavor_id, input.disk_size) {
            (Some(flavor_id), None) => {
                let flavor = self
                    .cloud_repository
                    .find_flavor(flavor_id)
                    .await?
                    .ok_or_else(|| {
                        AppError::Validation(format!("flavor '{flavor_id}' does not exist"))
                    })?;
                ResizeTarget::Flavor(flavor)
            }
            (None, Some(disk_size)) => ResizeTarget::DiskSize(disk_size),
            _ => {
                return Err(AppError::Validation(
                    "exactly one of flavor or disk_size must be given".to_owned(),
                ));
            }
        };

        let (operation, effect) = instance.plan_resize(&target)?;
        let payload = match &target {
            ResizeTarget::Flavor(flavor) => json!({ "flavor_id": flavor.id }),
            ResizeTarget::DiskSize(size) => json!({ "disk_size": size }),
        };

        let request = TransitionRequest::new(instance_id, operation.transition().as_str())
            .with_effect(effect)
            .with_follow_up(NewTask::new(operation.task(), instance_id).with_payload(payload));
        self.run(actor, operation, request).await
    }

    async fn run(
        &self,
        actor: &UserIdentity,
        operation: InstanceOperation,
        request: TransitionRequest,
    ) -> AppResult<OperationScheduled> {
        let subject = actor.user_id().to_string();
        match self
            .executor
            .apply_transition::<InstanceState>(subject.as_str(), request)
            .await
        {
            Ok(_) => Ok(OperationScheduled {
                operation,
                message: format!("{} was scheduled", operation.label()),
            }),
            Err(error) => match &error.reason {
                StateChangeReason::TransitionNotAllowed { current } => Err(AppError::Conflict(
                    not_allowed_message(operation, current),
                )),
                _ => Err(error.into()),
            },
        }
    }
}
