//! Profile gifts endpoint

use axum::{
    Router,
    extract::{Query, State},
    response::Json,
    routing::get,
};

use super::dto::{ProfileGiftsQuery, ProfileGiftsResponse};
use crate::AppState;
use crate::data::AccountHandle;
use crate::error::AppError;
use crate::metrics::{HTTP_REQUEST_DURATION_SECONDS, HTTP_REQUESTS_TOTAL};

const ENDPOINT: &str = "/profile-gifts";

/// Create the profile gifts router
pub fn profile_gifts_router() -> Router<AppState> {
    Router::new().route(ENDPOINT, get(get_profile_gifts))
}

/// GET /profile-gifts?username=<handle>
///
/// Serves the account's gifts from the cache when possible. A missing or
/// empty `username` selects the configured default account.
async fn get_profile_gifts(
    State(state): State<AppState>,
    Query(query): Query<ProfileGiftsQuery>,
) -> Result<Json<ProfileGiftsResponse>, AppError> {
    let _timer = HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&["GET", ENDPOINT])
        .start_timer();

    let result = serve(&state, query).await;

    let status = match &result {
        Ok(_) => "200",
        Err(AppError::Validation(_)) => "400",
        Err(_) => "500",
    };
    HTTP_REQUESTS_TOTAL
        .with_label_values(&["GET", ENDPOINT, status])
        .inc();

    result.map(Json)
}

async fn serve(state: &AppState, query: ProfileGiftsQuery) -> Result<ProfileGiftsResponse, AppError> {
    let requested = query
        .username
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(&state.config.profile.default_username);
    let handle = AccountHandle::parse(requested)?;

    let gifts = state.gifts.get_profile_gifts(&handle).await?;
    tracing::debug!(
        account = %handle,
        cached = gifts.cached,
        refreshing = gifts.refreshing,
        "Served profile gifts"
    );

    Ok(gifts.into())
}
