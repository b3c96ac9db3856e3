// src/routes/user_routes.rs

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::{
    auth::hash_password,
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{ApiOk, AppState, AppointmentView, NewUser, OkData, Role, UserPatch, UserPublic},
    policy::{ensure_admin, ensure_self_or_admin},
    scheduling,
};

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub nombre: String,
    pub email: String,
    pub documento: String,
    pub password: String,
    pub role: Option<Role>, // default usuario
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub nombre: Option<String>,
    pub email: Option<String>,
    pub documento: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        // /api/v1/usuarios
        .route("/", get(list_users).post(create_user))
        // /api/v1/usuarios/{user_id}
        .route("/{user_id}", get(get_user).patch(update_user).delete(delete_user))
        // /api/v1/usuarios/{user_id}/citas
        .route("/{user_id}/citas", get(list_user_appointments))
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub(crate) fn validate_name(name: &str) -> Result<(), ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::validation("nombre is required"));
    }
    Ok(())
}

/// Expects an already normalized address.
pub(crate) fn validate_email(email: &str) -> Result<(), ApiError> {
    let Some((local, domain)) = email.split_once('@') else {
        return Err(ApiError::validation("email is not valid"));
    };
    if local.is_empty() || !domain.contains('.') || email.contains(char::is_whitespace) {
        return Err(ApiError::validation("email is not valid"));
    }
    Ok(())
}

pub(crate) fn validate_document(document: &str) -> Result<(), ApiError> {
    let d = document.trim();
    if d.is_empty() {
        return Err(ApiError::validation("documento is required"));
    }
    if !d.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(ApiError::validation("documento may only contain letters, digits and '-'"));
    }
    Ok(())
}

pub(crate) fn validate_password(pw: &str) -> Result<(), ApiError> {
    if pw.trim().len() < 6 {
        return Err(ApiError::validation("password must be at least 6 characters"));
    }
    Ok(())
}

pub async fn list_users(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<Vec<UserPublic>>>, ApiError> {
    ensure_admin(&auth.actor)?;

    let users = state.store.list_users().await?;
    Ok(Json(ApiOk {
        data: users.into_iter().map(UserPublic::from).collect(),
    }))
}

pub async fn get_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(user_id): Path<i64>,
) -> Result<Json<ApiOk<UserPublic>>, ApiError> {
    ensure_self_or_admin(&auth.actor, user_id)?;

    let user = state
        .store
        .get_user(user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("user"))?;
    Ok(Json(ApiOk { data: user.into() }))
}

pub async fn create_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateUserRequest>,
) -> Result<Json<ApiOk<UserPublic>>, ApiError> {
    ensure_admin(&auth.actor)?;

    validate_name(&req.nombre)?;
    let email = normalize_email(&req.email);
    validate_email(&email)?;
    validate_document(&req.documento)?;
    validate_password(&req.password)?;

    let user = state
        .store
        .create_user(NewUser {
            name: req.nombre.trim().to_string(),
            email,
            document: req.documento.trim().to_string(),
            password_hash: hash_password(&req.password)?,
            role: req.role.unwrap_or(Role::Patient),
        })
        .await?;

    tracing::info!(user_id = user.id, by = auth.actor.user_id(), "user created");
    Ok(Json(ApiOk { data: user.into() }))
}

pub async fn update_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(user_id): Path<i64>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<ApiOk<UserPublic>>, ApiError> {
    ensure_self_or_admin(&auth.actor, user_id)?;
    if let Some(role) = req.role {
        ensure_admin(&auth.actor)?;
        if role != Role::Admin && user_id == auth.actor.user_id() {
            return Err(ApiError::validation("admins cannot revoke their own admin role"));
        }
    }

    let mut patch = UserPatch {
        role: req.role,
        ..Default::default()
    };
    if let Some(nombre) = req.nombre {
        validate_name(&nombre)?;
        patch.name = Some(nombre.trim().to_string());
    }
    if let Some(email) = req.email {
        let email = normalize_email(&email);
        validate_email(&email)?;
        patch.email = Some(email);
    }
    if let Some(documento) = req.documento {
        validate_document(&documento)?;
        patch.document = Some(documento.trim().to_string());
    }
    if let Some(password) = req.password {
        validate_password(&password)?;
        patch.password_hash = Some(hash_password(&password)?);
    }

    let updated = state.store.update_user(user_id, patch).await?;
    Ok(Json(ApiOk { data: updated.into() }))
}

pub async fn delete_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(user_id): Path<i64>,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    ensure_admin(&auth.actor)?;
    if user_id == auth.actor.user_id() {
        return Err(ApiError::validation("admins cannot delete their own account"));
    }

    state.store.delete_user(user_id).await?;
    tracing::info!(user_id, by = auth.actor.user_id(), "user deleted");
    Ok(Json(ApiOk { data: OkData { ok: true } }))
}

pub async fn list_user_appointments(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(user_id): Path<i64>,
) -> Result<Json<ApiOk<Vec<AppointmentView>>>, ApiError> {
    let data = scheduling::list_appointments_for_user(state.store.as_ref(), &auth.actor, user_id).await?;
    Ok(Json(ApiOk { data }))
}
