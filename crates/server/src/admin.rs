//! Administrative routes: pricing-profile management and the bulk cost
//! recompute endpoint. All of them sit behind the optional bearer token.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use tierline_core::domain::order::EntryStatus;
use tierline_core::domain::profile::{PricingProfile, ProfileId};
use tierline_core::pricing::tier::{Tier, TierTable};
use tierline_core::recompute::{CancelToken, EntrySelector, RecomputeReport};
use tierline_db::{ProfileRepository, RecomputeError, RecomputeJob, SqlProfileRepository};

use crate::api::{authorize_admin, ApiError};
use crate::bootstrap::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateProfileRequest {
    pub name: String,
    pub tiers: Vec<Tier>,
}

/// `POST /admin/pricing-profiles`: validate the authored tier table and
/// persist it under a new profile. Validation failures name the offending
/// tier index.
pub async fn create_pricing_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateProfileRequest>,
) -> Result<(StatusCode, Json<PricingProfile>), ApiError> {
    authorize_admin(&state, &headers)?;

    if request.name.trim().is_empty() {
        return Err(ApiError::unprocessable("profile name must not be blank"));
    }

    let table = TierTable::validate(request.tiers).map_err(|error| {
        ApiError::unprocessable(error.to_string())
            .with_detail(json!({ "index": error.index, "reason": error.reason }))
    })?;

    let repo = SqlProfileRepository::new(state.db_pool.clone());
    let profile = repo
        .create(request.name.trim(), &table)
        .await
        .map_err(|error| ApiError::internal(error.to_string()))?;

    info!(
        event_name = "pricing.profile_created",
        profile_id = profile.id.0,
        tier_count = profile.tiers.len(),
        "pricing profile created"
    );

    Ok((StatusCode::CREATED, Json(profile)))
}

#[derive(Debug, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum RecomputeScope {
    All,
    ByOrderIds { order_ids: Vec<i64> },
    ByStatus { status: String },
}

impl RecomputeScope {
    fn into_selector(self) -> Result<EntrySelector, ApiError> {
        match self {
            Self::All => Ok(EntrySelector::All),
            Self::ByOrderIds { order_ids } => Ok(EntrySelector::ByOrderIds(order_ids)),
            Self::ByStatus { status } => {
                let status: EntryStatus = status
                    .parse()
                    .map_err(|error| ApiError::unprocessable(format!("{error}")))?;
                Ok(EntrySelector::ByStatus(status))
            }
        }
    }
}

/// `POST /admin/order-entries/recompute-costs`: run one synchronous recompute
/// pass over the selected entries and return the full report.
///
/// Partial failures come back inside the 200 report; only a rejected run maps
/// to an error status (409 on overlap, 422 on a bad selector).
pub async fn recompute_costs(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(scope): Json<RecomputeScope>,
) -> Result<(StatusCode, Json<RecomputeReport>), ApiError> {
    authorize_admin(&state, &headers)?;

    let Some(default_profile_id) = state.default_profile_id else {
        return Err(ApiError::unprocessable(
            "cost recompute is unavailable: pricing.default_profile_id is not configured",
        ));
    };
    let selector = scope.into_selector()?;

    let job = RecomputeJob::new(
        state.db_pool.clone(),
        state.recompute_batch_size,
        ProfileId(default_profile_id),
        Arc::clone(&state.claims),
    );

    let report = job.run(&selector, &CancelToken::new()).await.map_err(|error| match error {
        RecomputeError::InvalidSelector(_) => ApiError::unprocessable(error.to_string()),
        RecomputeError::Conflict { .. } => ApiError::conflict(error.to_string()),
        RecomputeError::DefaultProfileUnavailable { .. } | RecomputeError::Datastore(_) => {
            ApiError::internal(error.to_string())
        }
    })?;

    Ok((StatusCode::OK, Json(report)))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode};
    use axum::Json;
    use rust_decimal::Decimal;

    use tierline_core::pricing::tier::Tier;
    use tierline_db::{connect_with_settings, migrations, ClaimSet, SeedDataset};

    use crate::bootstrap::AppState;

    use super::{
        create_pricing_profile, recompute_costs, CreateProfileRequest, RecomputeScope,
    };

    async fn seeded_state() -> AppState {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");
        SeedDataset::load(&pool).await.expect("seed");
        AppState {
            db_pool: pool,
            claims: Arc::new(ClaimSet::default()),
            admin_token: None,
            default_profile_id: Some(2),
            recompute_batch_size: 100,
        }
    }

    fn open_tier(floor: i64, price_cents: i64) -> Tier {
        Tier {
            floor_units: Decimal::from(floor),
            ceiling_units: None,
            unit_price: Decimal::new(price_cents, 2),
        }
    }

    #[tokio::test]
    async fn recompute_all_returns_the_full_report() {
        let state = seeded_state().await;

        let (status, Json(report)) =
            recompute_costs(State(state.clone()), HeaderMap::new(), Json(RecomputeScope::All))
                .await
                .expect("recompute");

        assert_eq!(status, StatusCode::OK);
        assert_eq!(report.total_selected, 3);
        assert_eq!(report.succeeded, 3);
        assert!(report.failed.is_empty());

        state.db_pool.close().await;
    }

    #[tokio::test]
    async fn overlapping_run_maps_to_conflict() {
        let state = seeded_state().await;
        let _held = state.claims.try_claim(&[1]).expect("pre-claim");

        let error = recompute_costs(
            State(state.clone()),
            HeaderMap::new(),
            Json(RecomputeScope::ByOrderIds { order_ids: vec![1] }),
        )
        .await
        .expect_err("overlap");
        assert_eq!(error.status, StatusCode::CONFLICT);

        state.db_pool.close().await;
    }

    #[tokio::test]
    async fn unknown_status_and_empty_scope_are_unprocessable() {
        let state = seeded_state().await;

        let error = recompute_costs(
            State(state.clone()),
            HeaderMap::new(),
            Json(RecomputeScope::ByStatus { status: "archived".to_string() }),
        )
        .await
        .expect_err("unknown status");
        assert_eq!(error.status, StatusCode::UNPROCESSABLE_ENTITY);

        let error = recompute_costs(
            State(state.clone()),
            HeaderMap::new(),
            Json(RecomputeScope::ByOrderIds { order_ids: Vec::new() }),
        )
        .await
        .expect_err("empty scope");
        assert_eq!(error.status, StatusCode::UNPROCESSABLE_ENTITY);

        state.db_pool.close().await;
    }

    #[tokio::test]
    async fn recompute_is_refused_without_a_configured_default_profile() {
        let mut state = seeded_state().await;
        state.default_profile_id = None;

        let error =
            recompute_costs(State(state.clone()), HeaderMap::new(), Json(RecomputeScope::All))
                .await
                .expect_err("no default profile configured");
        assert_eq!(error.status, StatusCode::UNPROCESSABLE_ENTITY);

        state.db_pool.close().await;
    }

    #[tokio::test]
    async fn profile_creation_validates_the_tier_table() {
        let state = seeded_state().await;

        let request = CreateProfileRequest {
            name: "Archive 2027".to_string(),
            tiers: vec![open_tier(0, 30)],
        };
        let (status, Json(profile)) =
            create_pricing_profile(State(state.clone()), HeaderMap::new(), Json(request))
                .await
                .expect("create profile");
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(profile.name, "Archive 2027");

        // Two open-ended tiers cannot coexist.
        let request = CreateProfileRequest {
            name: "Broken".to_string(),
            tiers: vec![open_tier(0, 30), open_tier(50, 10)],
        };
        let error = create_pricing_profile(State(state.clone()), HeaderMap::new(), Json(request))
            .await
            .expect_err("invalid table");
        assert_eq!(error.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(error.detail.as_ref().and_then(|d| d["index"].as_u64()), Some(0));

        state.db_pool.close().await;
    }

    #[tokio::test]
    async fn admin_token_guards_the_routes() {
        let mut state = seeded_state().await;
        state.admin_token = Some("tl-secret".to_string().into());

        let error =
            recompute_costs(State(state.clone()), HeaderMap::new(), Json(RecomputeScope::All))
                .await
                .expect_err("no bearer token presented");
        assert_eq!(error.status, StatusCode::UNAUTHORIZED);

        state.db_pool.close().await;
    }
}
