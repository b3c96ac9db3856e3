// src/db/postgres.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use super::{Store, StoreError};
use crate::models::{
    Appointment, AppointmentPatch, AppointmentScope, AppointmentStatus, NewAppointment,
    NewProfessional, NewUser, Professional, ProfessionalPatch, SessionRecord, UserPatch,
    UserRecord,
};

const USER_COLUMNS: &str = "id, nombre, email, documento, password_hash, rol";
const PROFESSIONAL_COLUMNS: &str = "id, nombre, especialidad, telefono, estado";
const APPOINTMENT_COLUMNS: &str = "id, fecha, hora, estado, profesional_id, usuario_id";

pub async fn connect_pg(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("database migrations applied");
    Ok(pool)
}

fn violated_constraint(e: &sqlx::Error) -> Option<String> {
    e.as_database_error()
        .and_then(|d| d.constraint())
        .map(str::to_owned)
}

/// Maps unique violations on `usuarios` to the matching conflict.
fn user_write_error(e: sqlx::Error) -> StoreError {
    match violated_constraint(&e).as_deref() {
        Some("usuarios_email_key") => StoreError::EmailTaken,
        Some("usuarios_documento_key") => StoreError::DocumentTaken,
        _ => StoreError::Database(e),
    }
}

fn appointment_write_error(e: sqlx::Error) -> StoreError {
    match violated_constraint(&e).as_deref() {
        Some("citas_profesional_id_fkey") => StoreError::MissingReference("professional"),
        Some("citas_usuario_id_fkey") => StoreError::MissingReference("user"),
        _ => StoreError::Database(e),
    }
}

fn delete_error(entity: &'static str) -> impl FnOnce(sqlx::Error) -> StoreError {
    move |e| {
        let referenced = e
            .as_database_error()
            .is_some_and(|d| d.is_foreign_key_violation());
        if referenced {
            StoreError::InUse(entity)
        } else {
            StoreError::Database(e)
        }
    }
}

/// Postgres-backed store. Inserts take an exclusive table lock so that
/// `max(id) + 1` stays unique across concurrent writers.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn lock_table(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        table: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(&format!("LOCK TABLE {table} IN EXCLUSIVE MODE"))
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn list_users(&self) -> Result<Vec<UserRecord>, StoreError> {
        let rows = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM usuarios ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn get_user(&self, id: i64) -> Result<Option<UserRecord>, StoreError> {
        let row = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM usuarios WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let row = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM usuarios WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn create_user(&self, new: NewUser) -> Result<UserRecord, StoreError> {
        let mut tx = self.pool.begin().await?;
        Self::lock_table(&mut tx, "usuarios").await?;

        let user = sqlx::query_as::<_, UserRecord>(&format!(
            r#"
            INSERT INTO usuarios (id, nombre, email, documento, password_hash, rol)
            SELECT COALESCE(MAX(id), 0) + 1, $1, $2, $3, $4, $5 FROM usuarios
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.document)
        .bind(&new.password_hash)
        .bind(new.role)
        .fetch_one(&mut *tx)
        .await
        .map_err(user_write_error)?;

        tx.commit().await?;
        tracing::debug!(user_id = user.id, "user inserted");
        Ok(user)
    }

    async fn update_user(&self, id: i64, patch: UserPatch) -> Result<UserRecord, StoreError> {
        sqlx::query_as::<_, UserRecord>(&format!(
            r#"
            UPDATE usuarios
            SET nombre        = COALESCE($2, nombre),
                email         = COALESCE($3, email),
                documento     = COALESCE($4, documento),
                password_hash = COALESCE($5, password_hash),
                rol           = COALESCE($6, rol)
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(patch.name)
        .bind(patch.email)
        .bind(patch.document)
        .bind(patch.password_hash)
        .bind(patch.role)
        .fetch_optional(&self.pool)
        .await
        .map_err(user_write_error)?
        .ok_or(StoreError::NotFound("user"))
    }

    async fn delete_user(&self, id: i64) -> Result<(), StoreError> {
        let res = sqlx::query("DELETE FROM usuarios WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(delete_error("user"))?;

        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound("user"));
        }
        Ok(())
    }

    async fn list_professionals(&self) -> Result<Vec<Professional>, StoreError> {
        let rows = sqlx::query_as::<_, Professional>(&format!(
            "SELECT {PROFESSIONAL_COLUMNS} FROM profesionales ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn get_professional(&self, id: i64) -> Result<Option<Professional>, StoreError> {
        let row = sqlx::query_as::<_, Professional>(&format!(
            "SELECT {PROFESSIONAL_COLUMNS} FROM profesionales WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn create_professional(&self, new: NewProfessional) -> Result<Professional, StoreError> {
        let mut tx = self.pool.begin().await?;
        Self::lock_table(&mut tx, "profesionales").await?;

        let professional = sqlx::query_as::<_, Professional>(&format!(
            r#"
            INSERT INTO profesionales (id, nombre, especialidad, telefono, estado)
            SELECT COALESCE(MAX(id), 0) + 1, $1, $2, $3, $4 FROM profesionales
            RETURNING {PROFESSIONAL_COLUMNS}
            "#
        ))
        .bind(&new.name)
        .bind(new.specialty)
        .bind(&new.phone)
        .bind(new.status)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::debug!(professional_id = professional.id, "professional inserted");
        Ok(professional)
    }

    async fn update_professional(
        &self,
        id: i64,
        patch: ProfessionalPatch,
    ) -> Result<Professional, StoreError> {
        sqlx::query_as::<_, Professional>(&format!(
            r#"
            UPDATE profesionales
            SET nombre       = COALESCE($2, nombre),
                especialidad = COALESCE($3, especialidad),
                telefono     = COALESCE($4, telefono),
                estado       = COALESCE($5, estado)
            WHERE id = $1
            RETURNING {PROFESSIONAL_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(patch.name)
        .bind(patch.specialty)
        .bind(patch.phone)
        .bind(patch.status)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound("professional"))
    }

    async fn delete_professional(&self, id: i64) -> Result<(), StoreError> {
        let res = sqlx::query("DELETE FROM profesionales WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(delete_error("professional"))?;

        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound("professional"));
        }
        Ok(())
    }

    async fn list_appointments(
        &self,
        scope: AppointmentScope,
    ) -> Result<Vec<Appointment>, StoreError> {
        let owner = match scope {
            AppointmentScope::All => None,
            AppointmentScope::OwnedBy(user_id) => Some(user_id),
        };

        let rows = sqlx::query_as::<_, Appointment>(&format!(
            r#"
            SELECT {APPOINTMENT_COLUMNS}
            FROM citas
            WHERE ($1::BIGINT IS NULL OR usuario_id = $1)
            ORDER BY fecha ASC, hora ASC, id ASC
            "#
        ))
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn get_appointment(&self, id: i64) -> Result<Option<Appointment>, StoreError> {
        let row = sqlx::query_as::<_, Appointment>(&format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM citas WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn create_appointment(&self, new: NewAppointment) -> Result<Appointment, StoreError> {
        let mut tx = self.pool.begin().await?;
        Self::lock_table(&mut tx, "citas").await?;

        let appointment = sqlx::query_as::<_, Appointment>(&format!(
            r#"
            INSERT INTO citas (id, fecha, hora, estado, profesional_id, usuario_id)
            SELECT COALESCE(MAX(id), 0) + 1, $1, $2, $3, $4, $5 FROM citas
            RETURNING {APPOINTMENT_COLUMNS}
            "#
        ))
        .bind(new.date)
        .bind(new.time)
        .bind(new.status)
        .bind(new.professional_id)
        .bind(new.user_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(appointment_write_error)?;

        tx.commit().await?;
        tracing::debug!(appointment_id = appointment.id, "appointment inserted");
        Ok(appointment)
    }

    async fn update_appointment(
        &self,
        id: i64,
        patch: AppointmentPatch,
        expected_status: Option<AppointmentStatus>,
    ) -> Result<Appointment, StoreError> {
        let row = sqlx::query_as::<_, Appointment>(&format!(
            r#"
            UPDATE citas
            SET fecha          = COALESCE($2, fecha),
                hora           = COALESCE($3, hora),
                estado         = COALESCE($4, estado),
                profesional_id = COALESCE($5, profesional_id),
                usuario_id     = COALESCE($6, usuario_id)
            WHERE id = $1
              AND ($7::estado_cita IS NULL OR estado = $7)
            RETURNING {APPOINTMENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(patch.date)
        .bind(patch.time)
        .bind(patch.status)
        .bind(patch.professional_id)
        .bind(patch.user_id)
        .bind(expected_status)
        .fetch_optional(&self.pool)
        .await
        .map_err(appointment_write_error)?;

        if let Some(appointment) = row {
            return Ok(appointment);
        }

        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM citas WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;

        Err(if exists {
            StoreError::StaleStatus
        } else {
            StoreError::NotFound("appointment")
        })
    }

    async fn delete_appointment(&self, id: i64) -> Result<(), StoreError> {
        let res = sqlx::query("DELETE FROM citas WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound("appointment"));
        }
        Ok(())
    }

    async fn create_session(
        &self,
        user_id: i64,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<SessionRecord, StoreError> {
        let session = sqlx::query_as::<_, SessionRecord>(
            r#"
            INSERT INTO session_token (user_id, session_token_hash, expires_at)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, expires_at
            "#,
        )
        .bind(user_id)
        .bind(token_hash)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(session)
    }

    async fn find_active_session(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<SessionRecord>, StoreError> {
        let row = sqlx::query_as::<_, SessionRecord>(
            r#"
            SELECT id, user_id, expires_at
            FROM session_token
            WHERE session_token_hash = $1
              AND revoked_at IS NULL
              AND expires_at > $2
            "#,
        )
        .bind(token_hash)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn revoke_session(&self, session_id: i64) -> Result<bool, StoreError> {
        let res = sqlx::query(
            r#"
            UPDATE session_token
            SET revoked_at = now()
            WHERE id = $1
              AND revoked_at IS NULL
            "#,
        )
        .bind(session_id)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }
}
