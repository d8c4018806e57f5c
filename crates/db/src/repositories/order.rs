use chrono::{DateTime, Utc};

use tierline_core::domain::order::{EntryId, Order, OrderEntry, OrderId};
use tierline_core::domain::profile::ProfileId;
use tierline_core::orders::OrderDraft;

use super::{decimal_from_text, OrderRepository, RepositoryError};
use crate::DbPool;

pub struct SqlOrderRepository {
    pool: DbPool,
}

impl SqlOrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn parse_status<T: std::str::FromStr>(field: &str, value: &str) -> Result<T, RepositoryError>
where
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|error| RepositoryError::Decode(format!("invalid {field}: {error}")))
}

fn entry_from_row(
    row: (i64, i64, i64, String, String, Option<String>),
) -> Result<OrderEntry, RepositoryError> {
    let (id, order_id, number, allocation_gb, status, cost) = row;
    Ok(OrderEntry {
        id: EntryId(id),
        order_id: OrderId(order_id),
        number,
        allocation_units: decimal_from_text("allocation_gb", &allocation_gb)?,
        status: parse_status("entry status", &status)?,
        cost: cost.as_deref().map(|value| decimal_from_text("cost", value)).transpose()?,
    })
}

#[async_trait::async_trait]
impl OrderRepository for SqlOrderRepository {
    async fn create_order(
        &self,
        draft: &OrderDraft,
    ) -> Result<(Order, Vec<OrderEntry>), RepositoryError> {
        let created_at = Utc::now();
        let mut tx = self.pool.begin().await?;

        let order_id: i64 = sqlx::query_scalar(
            "INSERT INTO orders (user_email, status, total_count, pricing_profile_id, pricing_profile_name, created_at)
             VALUES (?1, 'pending', ?2, ?3, ?4, ?5) RETURNING id",
        )
        .bind(&draft.user_email)
        .bind(draft.total_count)
        .bind(draft.pricing_profile_id.0)
        .bind(&draft.pricing_profile_name)
        .bind(created_at)
        .fetch_one(&mut *tx)
        .await?;

        let mut entries = Vec::with_capacity(draft.entries.len());
        for priced in &draft.entries {
            let entry_id: i64 = sqlx::query_scalar(
                "INSERT INTO order_entries (order_id, number, allocation_gb, status, cost)
                 VALUES (?1, ?2, ?3, 'pending', ?4) RETURNING id",
            )
            .bind(order_id)
            .bind(priced.number)
            .bind(priced.allocation_units.to_string())
            .bind(priced.cost.to_string())
            .fetch_one(&mut *tx)
            .await?;

            entries.push(OrderEntry {
                id: EntryId(entry_id),
                order_id: OrderId(order_id),
                number: priced.number,
                allocation_units: priced.allocation_units,
                status: tierline_core::EntryStatus::Pending,
                cost: Some(priced.cost),
            });
        }

        tx.commit().await?;

        let order = Order {
            id: OrderId(order_id),
            user_email: draft.user_email.clone(),
            status: tierline_core::OrderStatus::Pending,
            total_count: draft.total_count,
            pricing_profile_id: draft.pricing_profile_id,
            pricing_profile_name: draft.pricing_profile_name.clone(),
            created_at,
        };

        Ok((order, entries))
    }

    async fn find_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, (i64, String, String, i64, i64, String, DateTime<Utc>)>(
            "SELECT id, user_email, status, total_count, pricing_profile_id, pricing_profile_name, created_at
             FROM orders WHERE id = ?1",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        let Some((id, user_email, status, total_count, profile_id, profile_name, created_at)) = row
        else {
            return Ok(None);
        };

        Ok(Some(Order {
            id: OrderId(id),
            user_email,
            status: parse_status("order status", &status)?,
            total_count,
            pricing_profile_id: ProfileId(profile_id),
            pricing_profile_name: profile_name,
            created_at,
        }))
    }

    async fn entries_for_order(&self, id: OrderId) -> Result<Vec<OrderEntry>, RepositoryError> {
        let rows = sqlx::query_as::<_, (i64, i64, i64, String, String, Option<String>)>(
            "SELECT id, order_id, number, allocation_gb, status, cost
             FROM order_entries WHERE order_id = ?1 ORDER BY id",
        )
        .bind(id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(entry_from_row).collect()
    }
}
