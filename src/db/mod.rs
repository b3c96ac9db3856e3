use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{
    Appointment, AppointmentPatch, AppointmentScope, AppointmentStatus, NewAppointment,
    NewProfessional, NewUser, Professional, ProfessionalPatch, SessionRecord, UserPatch,
    UserRecord,
};

pub mod memory;
pub mod postgres;
pub mod seed;

pub use memory::MemoryStore;
pub use postgres::{PgStore, connect_pg};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("email is already registered")]
    EmailTaken,
    #[error("document is already registered")]
    DocumentTaken,
    #[error("referenced {0} does not exist")]
    MissingReference(&'static str),
    #[error("{0} is still referenced by appointments")]
    InUse(&'static str),
    #[error("appointment status changed concurrently")]
    StaleStatus,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Persistence port for users, professionals, appointments and sessions.
///
/// New identifiers are `max(id) + 1` (or 1 for an empty table), assigned
/// while holding the table's write lock. Email and document uniqueness and
/// appointment references are checked at write time.
#[async_trait]
pub trait Store: Send + Sync {
    async fn list_users(&self) -> Result<Vec<UserRecord>, StoreError>;
    async fn get_user(&self, id: i64) -> Result<Option<UserRecord>, StoreError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError>;
    async fn create_user(&self, new: NewUser) -> Result<UserRecord, StoreError>;
    async fn update_user(&self, id: i64, patch: UserPatch) -> Result<UserRecord, StoreError>;
    async fn delete_user(&self, id: i64) -> Result<(), StoreError>;

    async fn list_professionals(&self) -> Result<Vec<Professional>, StoreError>;
    async fn get_professional(&self, id: i64) -> Result<Option<Professional>, StoreError>;
    async fn create_professional(&self, new: NewProfessional) -> Result<Professional, StoreError>;
    async fn update_professional(
        &self,
        id: i64,
        patch: ProfessionalPatch,
    ) -> Result<Professional, StoreError>;
    async fn delete_professional(&self, id: i64) -> Result<(), StoreError>;

    /// Ordered by date, time, then id.
    async fn list_appointments(&self, scope: AppointmentScope)
    -> Result<Vec<Appointment>, StoreError>;
    async fn get_appointment(&self, id: i64) -> Result<Option<Appointment>, StoreError>;
    async fn create_appointment(&self, new: NewAppointment) -> Result<Appointment, StoreError>;
    /// When `expected_status` is set the write only happens if the stored
    /// status still matches, otherwise `StaleStatus`.
    async fn update_appointment(
        &self,
        id: i64,
        patch: AppointmentPatch,
        expected_status: Option<AppointmentStatus>,
    ) -> Result<Appointment, StoreError>;
    async fn delete_appointment(&self, id: i64) -> Result<(), StoreError>;

    async fn create_session(
        &self,
        user_id: i64,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<SessionRecord, StoreError>;
    /// Unrevoked session with this token hash that expires after `now`.
    async fn find_active_session(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<SessionRecord>, StoreError>;
    /// Returns false when the session was already revoked or never existed.
    async fn revoke_session(&self, session_id: i64) -> Result<bool, StoreError>;
}
