use argon2::password_hash::{SaltString, rand_core::OsRng as PHOsRng};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{Duration, Utc};
use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};

use crate::db::Store;
use crate::error::ApiError;
use crate::models::{AuthUser, LoginResponseData, UserRecord};

/// Check a password against the Argon2 PHC string kept in `usuarios.password_hash`.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Argon2id with a random salt.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut PHOsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|phc| phc.to_string())
        .map_err(|e| ApiError::Internal(format!("argon2 hash error: {e}")))
}

/// Opaque bearer token handed to the client. Only its hash is persisted.
pub fn generate_access_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// SHA-256 hex of the token, as stored in `session_token.session_token_hash`.
pub fn hash_access_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Open a session for `user` and build the login payload.
pub async fn issue_session(
    store: &dyn Store,
    user: &UserRecord,
    ttl_hours: i64,
) -> Result<LoginResponseData, ApiError> {
    let access_token = generate_access_token();
    let expires_at = Duration::try_hours(ttl_hours)
        .and_then(|ttl| Utc::now().checked_add_signed(ttl))
        .ok_or_else(|| ApiError::Internal(format!("session ttl of {ttl_hours}h is out of range")))?;

    let session = store
        .create_session(user.id, &hash_access_token(&access_token), expires_at)
        .await?;

    tracing::info!(user_id = user.id, session_id = session.id, "session opened");

    Ok(LoginResponseData {
        access_token,
        expires_at: session.expires_at,
        usuario: AuthUser::from(user),
    })
}
