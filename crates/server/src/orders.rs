use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use tierline_core::domain::order::{Order, OrderEntry};
use tierline_core::domain::profile::ProfileId;
use tierline_core::orders::{assemble_order, EntrySpec, OrderAssemblyError};
use tierline_db::{OrderRepository, ProfileRepository, SqlOrderRepository, SqlProfileRepository};

use crate::api::ApiError;
use crate::bootstrap::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub user_email: String,
    pub pricing_profile_id: i64,
    pub entries: Vec<EntrySpec>,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub order: Order,
    pub entries: Vec<OrderEntry>,
}

/// `POST /orders`: price every requested entry against the named profile and
/// persist the order with the profile name snapshotted onto it, all in one
/// transaction.
pub async fn create_order(
    State(state): State<AppState>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    if !request.user_email.contains('@') {
        return Err(ApiError::unprocessable("user_email must be an email address"));
    }

    let profiles = SqlProfileRepository::new(state.db_pool.clone());
    let profile = profiles
        .find_by_id(ProfileId(request.pricing_profile_id))
        .await
        .map_err(|error| ApiError::internal(error.to_string()))?
        .ok_or_else(|| {
            ApiError::not_found(format!(
                "pricing profile {} does not exist",
                request.pricing_profile_id
            ))
        })?;

    let draft =
        assemble_order(&request.user_email, &profile, &request.entries).map_err(|error| {
            match error {
                // Stored tiers failing validation is a data problem on our
                // side, not a bad request.
                OrderAssemblyError::InvalidTierTable { .. } => {
                    warn!(
                        event_name = "orders.profile_invalid",
                        profile_id = profile.id.0,
                        error = %error,
                        "stored profile failed tier validation during order assembly"
                    );
                    ApiError::internal(error.to_string())
                }
                other => ApiError::unprocessable(other.to_string()),
            }
        })?;

    let orders = SqlOrderRepository::new(state.db_pool.clone());
    let (order, entries) =
        orders.create_order(&draft).await.map_err(|error| ApiError::internal(error.to_string()))?;

    info!(
        event_name = "orders.created",
        order_id = order.id.0,
        entry_count = entries.len(),
        pricing_profile_id = order.pricing_profile_id.0,
        "order created"
    );

    Ok((StatusCode::CREATED, Json(OrderResponse { order, entries })))
}
