use axum::{Json, Router, extract::State, routing::get};

use crate::error::ApiError;
use crate::middleware::auth_context::AuthContext;
use crate::models::{ApiOk, AppState, OkData};
use crate::scheduling::{self, Dashboard};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/home", get(home))
        .route("/health", get(health))
}

/// Role-based landing payload: visible sections and appointment counts.
pub async fn home(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<Dashboard>>, ApiError> {
    let data = scheduling::dashboard(state.store.as_ref(), &auth.actor).await?;
    Ok(Json(ApiOk { data }))
}

pub async fn health() -> Json<ApiOk<OkData>> {
    Json(ApiOk { data: OkData { ok: true } })
}
