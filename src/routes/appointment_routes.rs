// src/routes/appointment_routes.rs

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use serde::Deserialize;

use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{ApiOk, AppState, AppointmentPatch, AppointmentView, OkData, StatusFilter},
    scheduling::{self, AppointmentDraft},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_appointments).post(create_appointment))
        .route(
            "/{appointment_id}",
            get(get_appointment)
                .patch(update_appointment)
                .delete(delete_appointment),
        )
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// `todos` (default) or one status.
    pub estado: Option<String>,
}

/* ============================================================
   GET /citas
   ============================================================ */

pub async fn list_appointments(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(q): Query<ListQuery>,
) -> Result<Json<ApiOk<Vec<AppointmentView>>>, ApiError> {
    let filter: StatusFilter = q
        .estado
        .as_deref()
        .unwrap_or("todos")
        .parse()
        .map_err(ApiError::validation)?;

    let data = scheduling::list_appointments(state.store.as_ref(), &auth.actor, filter).await?;
    Ok(Json(ApiOk { data }))
}

/* ============================================================
   GET /citas/{id}
   ============================================================ */

pub async fn get_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<i64>,
) -> Result<Json<ApiOk<AppointmentView>>, ApiError> {
    let data = scheduling::get_appointment(state.store.as_ref(), &auth.actor, appointment_id).await?;
    Ok(Json(ApiOk { data }))
}

/* ============================================================
   POST /citas
   ============================================================ */

pub async fn create_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<AppointmentDraft>,
) -> Result<Json<ApiOk<AppointmentView>>, ApiError> {
    let data = scheduling::create_appointment(state.store.as_ref(), &auth.actor, req).await?;
    Ok(Json(ApiOk { data }))
}

/* ============================================================
   PATCH /citas/{id}
   ============================================================ */

pub async fn update_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<i64>,
    Json(req): Json<AppointmentPatch>,
) -> Result<Json<ApiOk<AppointmentView>>, ApiError> {
    let data =
        scheduling::update_appointment(state.store.as_ref(), &auth.actor, appointment_id, req)
            .await?;
    Ok(Json(ApiOk { data }))
}

/* ============================================================
   DELETE /citas/{id}
   ============================================================ */

pub async fn delete_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<i64>,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    scheduling::delete_appointment(state.store.as_ref(), &auth.actor, appointment_id).await?;
    Ok(Json(ApiOk { data: OkData { ok: true } }))
}
