use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::TypedHeader;
use chrono::Utc;
use headers::{Authorization, authorization::Bearer};

use crate::auth::hash_access_token;
use crate::error::ApiError;
use crate::models::AppState;
use crate::policy::Actor;

/// Authenticated caller, resolved from `Authorization: Bearer <token>`.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub actor: Actor,
    pub session_id: i64,
}

impl FromRequestParts<AppState> for AuthContext {
    type Rejection = ApiError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        async move {
            let TypedHeader(authz): TypedHeader<Authorization<Bearer>> =
                TypedHeader::from_request_parts(parts, state)
                    .await
                    .map_err(|_| ApiError::session_expired())?;

            let token_hash = hash_access_token(authz.token());

            let session = state
                .store
                .find_active_session(&token_hash, Utc::now())
                .await?
                .ok_or_else(ApiError::session_expired)?;

            // The account may have been deleted after the session was issued.
            let user = state
                .store
                .get_user(session.user_id)
                .await?
                .ok_or_else(ApiError::session_expired)?;

            Ok(AuthContext {
                actor: Actor::from_user(&user),
                session_id: session.id,
            })
        }
    }
}
