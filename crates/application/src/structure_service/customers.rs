use chrono::Utc;

use super::*;

impl StructureService {
    /// Lists customers visible to the caller.
    pub async fn list_customers(
        &self,
        actor: &UserIdentity,
        query: &StructureListQuery,
    ) -> AppResult<Vec<Customer>> {
        let visible = self
            .scope_filter
            .visible_ids(actor, EntityKind::Customer)
            .await?;
        self.repository.list_customers(&visible, query).await
    }

    /// Returns one visible customer.
    pub async fn get_customer(&self, actor: &UserIdentity, customer_id: Uuid) -> AppResult<Customer> {
        self.scope_filter
            .require_visible(actor, EntityKind::Customer, customer_id)
            .await?;
        self.repository
            .find_customer(customer_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("customer '{customer_id}' not found")))
    }

    /// Creates a customer. Staff only.
    pub async fn create_customer(
        &self,
        actor: &UserIdentity,
        input: CreateCustomerInput,
    ) -> AppResult<Customer> {
        self.authorization_service.require_staff(actor)?;

        let customer = Customer {
            id: Uuid::new_v4(),
            name: NonEmptyString::new(input.name)?,
            native_name: input.native_name,
            abbreviation: input.abbreviation,
            contact_details: input.contact_details,
            created_at: Utc::now(),
        };
        self.repository.save_customer(customer.clone()).await?;

        self.audit(
            actor,
            AuditAction::CustomerCreated,
            "customer",
            customer.id,
            format!("created customer '{}'", customer.name),
        )
        .await;

        Ok(customer)
    }

    /// Updates a customer. Staff or customer owner.
    pub async fn update_customer(
        &self,
        actor: &UserIdentity,
        customer_id: Uuid,
        input: UpdateCustomerInput,
    ) -> AppResult<Customer> {
        let mut customer = self.get_customer(actor, customer_id).await?;
        self.authorization_service
            .require_customer_owner(actor, customer_id)
            .await?;

        if let Some(name) = input.name {
            customer.name = NonEmptyString::new(name)?;
        }
        if input.native_name.is_some() {
            customer.native_name = input.native_name;
        }
        if input.abbreviation.is_some() {
            customer.abbreviation = input.abbreviation;
        }
        if input.contact_details.is_some() {
            customer.contact_details = input.contact_details;
        }

        self.repository.save_customer(customer.clone()).await?;
        Ok(customer)
    }

    /// Deletes a customer without projects. Staff only.
    pub async fn delete_customer(&self, actor: &UserIdentity, customer_id: Uuid) -> AppResult<()> {
        self.get_customer(actor, customer_id).await?;
        self.authorization_service.require_staff(actor)?;
        self.repository.delete_customer(customer_id).await
    }
}
