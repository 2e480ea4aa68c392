use super::*;

impl PostgresStructureRepository {
    pub(super) async fn list_customers_impl(
        &self,
        visible: &VisibleIds,
        query: &StructureListQuery,
    ) -> AppResult<Vec<Customer>> {
        let rows = sqlx::query_as::<_, CustomerRow>(
            r#"
            SELECT id, name, native_name, abbreviation, contact_details, created_at
            FROM customers
            WHERE ($1::UUID[] IS NULL OR id = ANY($1))
              AND ($2::TEXT IS NULL OR name ILIKE '%' || $2 || '%')
            ORDER BY name ASC, id ASC
            "#,
        )
        .bind(visible.to_bind())
        .bind(query.name.as_deref())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list customers: {error}")))?;

        rows.into_iter().map(Customer::try_from).collect()
    }

    pub(super) async fn find_customer_impl(&self, customer_id: Uuid) -> AppResult<Option<Customer>> {
        let row = sqlx::query_as::<_, CustomerRow>(
            r#"
            SELECT id, name, native_name, abbreviation, contact_details, created_at
            FROM customers
            WHERE id = $1
            "#,
        )
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to find customer '{customer_id}': {error}"))
        })?;

        row.map(Customer::try_from).transpose()
    }

    pub(super) async fn save_customer_impl(&self, customer: Customer) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO customers (id, name, native_name, abbreviation, contact_details, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id)
            DO UPDATE SET
                name = EXCLUDED.name,
                native_name = EXCLUDED.native_name,
                abbreviation = EXCLUDED.abbreviation,
                contact_details = EXCLUDED.contact_details
            "#,
        )
        .bind(customer.id)
        .bind(customer.name.as_str())
        .bind(customer.native_name.as_deref())
        .bind(customer.abbreviation.as_deref())
        .bind(customer.contact_details.as_deref())
        .bind(customer.created_at)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to save customer '{}': {error}", customer.id))
        })?;

        Ok(())
    }

    pub(super) async fn delete_customer_impl(&self, customer_id: Uuid) -> AppResult<()> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to start customer delete transaction: {error}"))
        })?;

        sqlx::query(
            r#"
            DELETE FROM role_assignments
            WHERE (level = 'customer' AND scope_id = $1)
               OR (
                    level = 'project_group'
                    AND scope_id IN (SELECT id FROM project_groups WHERE customer_id = $1)
                  )
            "#,
        )
        .bind(customer_id)
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to delete role assignments of customer '{customer_id}': {error}"
            ))
        })?;

        let result = sqlx::query("DELETE FROM customers WHERE id = $1")
            .bind(customer_id)
            .execute(&mut *transaction)
            .await
            .map_err(|error| {
                reference_conflict_or_internal(
                    error,
                    "customer still has projects",
                    "delete customer",
                )
            })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "customer '{customer_id}' not found"
            )));
        }

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit customer delete transaction: {error}"))
        })?;

        Ok(())
    }
}
