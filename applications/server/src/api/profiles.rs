/// Profile roster API routes
use crate::{
    error::Result,
    middleware::RequestTrace,
    services::presenter::{self, ProfilesView},
    state::AppState,
};
use axum::{extract::State, Json};
use chrono::Utc;

/// GET /api/profiles - The full roster, seeding the store on first use
pub async fn list_profiles(
    State(app_state): State<AppState>,
    RequestTrace(trace): RequestTrace,
) -> Result<Json<ProfilesView>> {
    let loaded = app_state.loader.load(&trace).await?;
    Ok(Json(presenter::present(&loaded, Utc::now())))
}
