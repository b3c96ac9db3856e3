use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use serde::Deserialize;

use crate::{
    auth::{hash_password, issue_session, verify_password},
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{ApiOk, AppState, LoginResponseData, NewUser, OkData, Role, UserPublic},
    routes::user_routes::{
        normalize_email, validate_document, validate_email, validate_name, validate_password,
    },
};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub nombre: String,
    pub email: String,
    pub documento: String,
    pub password: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/register", post(register))
        .route("/logout", post(logout))
        .route("/me", get(me))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<ApiOk<LoginResponseData>>, ApiError> {
    let email = normalize_email(&req.email);
    if email.is_empty() || req.password.is_empty() {
        return Err(ApiError::validation("email and password are required"));
    }

    let user = state
        .store
        .find_user_by_email(&email)
        .await?
        .ok_or_else(ApiError::invalid_credentials)?;

    if !verify_password(&req.password, &user.password_hash) {
        tracing::warn!(user_id = user.id, "password mismatch");
        return Err(ApiError::invalid_credentials());
    }

    let data = issue_session(state.store.as_ref(), &user, state.session_ttl_hours).await?;
    Ok(Json(ApiOk { data }))
}

/// Self-service sign up. Always creates a patient and logs them in.
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<ApiOk<LoginResponseData>>, ApiError> {
    validate_name(&req.nombre)?;
    let email = normalize_email(&req.email);
    validate_email(&email)?;
    validate_document(&req.documento)?;
    validate_password(&req.password)?;

    // Uniqueness is decided by the store at insert time, not by a pre-check.
    let user = state
        .store
        .create_user(NewUser {
            name: req.nombre.trim().to_string(),
            email,
            document: req.documento.trim().to_string(),
            password_hash: hash_password(&req.password)?,
            role: Role::Patient,
        })
        .await?;

    tracing::info!(user_id = user.id, "patient registered");
    let data = issue_session(state.store.as_ref(), &user, state.session_ttl_hours).await?;
    Ok(Json(ApiOk { data }))
}

pub async fn logout(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    if !state.store.revoke_session(auth.session_id).await? {
        return Err(ApiError::session_expired());
    }
    tracing::info!(user_id = auth.actor.user_id(), session_id = auth.session_id, "session revoked");
    Ok(Json(ApiOk { data: OkData { ok: true } }))
}

pub async fn me(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<UserPublic>>, ApiError> {
    let user = state
        .store
        .get_user(auth.actor.user_id())
        .await?
        .ok_or_else(ApiError::session_expired)?;
    Ok(Json(ApiOk { data: user.into() }))
}
