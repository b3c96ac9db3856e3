// src/routes/professional_routes.rs

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use serde::Deserialize;

use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{
        ApiOk, AppState, NewProfessional, OkData, Professional, ProfessionalPatch,
        ProfessionalStatus, Specialty,
    },
    policy::ensure_admin,
    scheduling,
};

#[derive(Debug, Deserialize)]
pub struct CreateProfessionalRequest {
    pub nombre: String,
    pub especialidad: Specialty,
    pub telefono: String,
    pub estado: Option<ProfessionalStatus>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfessionalRequest {
    pub nombre: Option<String>,
    pub especialidad: Option<Specialty>,
    pub telefono: Option<String>,
    pub estado: Option<ProfessionalStatus>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_professionals).post(create_professional))
        .route("/activos", get(list_active_professionals))
        .route(
            "/{professional_id}",
            get(get_professional)
                .patch(update_professional)
                .delete(delete_professional),
        )
}

fn validate_phone(phone: &str) -> Result<(), ApiError> {
    let p = phone.trim();
    if p.is_empty() {
        return Err(ApiError::validation("telefono is required"));
    }
    let allowed = |c: char| c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')');
    if !p.chars().all(allowed) {
        return Err(ApiError::validation("telefono contains invalid characters"));
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<(), ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::validation("nombre is required"));
    }
    Ok(())
}

pub async fn list_professionals(
    State(state): State<AppState>,
    _auth: AuthContext,
) -> Result<Json<ApiOk<Vec<Professional>>>, ApiError> {
    let data = state.store.list_professionals().await?;
    Ok(Json(ApiOk { data }))
}

/// Picker source when booking: only professionals currently taking appointments.
pub async fn list_active_professionals(
    State(state): State<AppState>,
    _auth: AuthContext,
) -> Result<Json<ApiOk<Vec<Professional>>>, ApiError> {
    let data = scheduling::list_active_professionals(state.store.as_ref()).await?;
    Ok(Json(ApiOk { data }))
}

pub async fn get_professional(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(professional_id): Path<i64>,
) -> Result<Json<ApiOk<Professional>>, ApiError> {
    let data = state
        .store
        .get_professional(professional_id)
        .await?
        .ok_or_else(|| ApiError::not_found("professional"))?;
    Ok(Json(ApiOk { data }))
}

pub async fn create_professional(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateProfessionalRequest>,
) -> Result<Json<ApiOk<Professional>>, ApiError> {
    ensure_admin(&auth.actor)?;
    validate_name(&req.nombre)?;
    validate_phone(&req.telefono)?;

    let data = state
        .store
        .create_professional(NewProfessional {
            name: req.nombre.trim().to_string(),
            specialty: req.especialidad,
            phone: req.telefono.trim().to_string(),
            status: req.estado.unwrap_or_default(),
        })
        .await?;

    tracing::info!(professional_id = data.id, "professional created");
    Ok(Json(ApiOk { data }))
}

pub async fn update_professional(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(professional_id): Path<i64>,
    Json(req): Json<UpdateProfessionalRequest>,
) -> Result<Json<ApiOk<Professional>>, ApiError> {
    ensure_admin(&auth.actor)?;
    if let Some(n) = &req.nombre {
        validate_name(n)?;
    }
    if let Some(t) = &req.telefono {
        validate_phone(t)?;
    }

    let patch = ProfessionalPatch {
        name: req.nombre.map(|n| n.trim().to_string()),
        specialty: req.especialidad,
        phone: req.telefono.map(|t| t.trim().to_string()),
        status: req.estado,
    };
    let data = state.store.update_professional(professional_id, patch).await?;
    Ok(Json(ApiOk { data }))
}

pub async fn delete_professional(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(professional_id): Path<i64>,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    ensure_admin(&auth.actor)?;
    state.store.delete_professional(professional_id).await?;
    tracing::info!(professional_id, "professional deleted");
    Ok(Json(ApiOk { data: OkData { ok: true } }))
}
