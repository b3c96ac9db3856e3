use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub session_ttl_hours: i64,
}

/* -------------------------
   Enumerations
--------------------------*/

/// Stored as smallint in `usuarios.rol`: 0 patient, 1 admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[repr(i16)]
pub enum Role {
    #[serde(rename = "usuario")]
    Patient = 0,
    #[serde(rename = "admin")]
    Admin = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "especialidad")]
pub enum Specialty {
    #[serde(rename = "cardiologia")]
    #[sqlx(rename = "cardiologia")]
    Cardiology,
    #[serde(rename = "pediatria")]
    #[sqlx(rename = "pediatria")]
    Pediatrics,
    #[serde(rename = "ginecologia")]
    #[sqlx(rename = "ginecologia")]
    Gynecology,
    #[serde(rename = "medicina_general")]
    #[sqlx(rename = "medicina_general")]
    GeneralMedicine,
    #[serde(rename = "traumatologia")]
    #[sqlx(rename = "traumatologia")]
    Traumatology,
    #[serde(rename = "dermatologia")]
    #[sqlx(rename = "dermatologia")]
    Dermatology,
    #[serde(rename = "oftalmologia")]
    #[sqlx(rename = "oftalmologia")]
    Ophthalmology,
    #[serde(rename = "psiquiatria")]
    #[sqlx(rename = "psiquiatria")]
    Psychiatry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "estado_profesional")]
pub enum ProfessionalStatus {
    #[default]
    #[serde(rename = "activo")]
    #[sqlx(rename = "activo")]
    Active,
    #[serde(rename = "inactivo")]
    #[sqlx(rename = "inactivo")]
    Inactive,
    #[serde(rename = "vacaciones")]
    #[sqlx(rename = "vacaciones")]
    OnVacation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "estado_cita")]
pub enum AppointmentStatus {
    #[default]
    #[serde(rename = "pendiente")]
    #[sqlx(rename = "pendiente")]
    Pending,
    #[serde(rename = "confirmada")]
    #[sqlx(rename = "confirmada")]
    Confirmed,
    #[serde(rename = "cancelada")]
    #[sqlx(rename = "cancelada")]
    Cancelled,
    #[serde(rename = "completada")]
    #[sqlx(rename = "completada")]
    Completed,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 4] = [
        AppointmentStatus::Pending,
        AppointmentStatus::Confirmed,
        AppointmentStatus::Cancelled,
        AppointmentStatus::Completed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pendiente",
            AppointmentStatus::Confirmed => "confirmada",
            AppointmentStatus::Cancelled => "cancelada",
            AppointmentStatus::Completed => "completada",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AppointmentStatus::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| format!("unknown appointment status: {s}"))
    }
}

/// Client-side style status filter: `todos` or a single status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Only(AppointmentStatus),
}

impl StatusFilter {
    pub fn matches(self, status: AppointmentStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Only(wanted) => wanted == status,
        }
    }
}

impl FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "todos" => Ok(StatusFilter::All),
            other => other.parse().map(StatusFilter::Only),
        }
    }
}

/* -------------------------
   Stored records
--------------------------*/

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRecord {
    pub id: i64,
    #[sqlx(rename = "nombre")]
    pub name: String,
    pub email: String,
    #[sqlx(rename = "documento")]
    pub document: String,
    pub password_hash: String,
    #[sqlx(rename = "rol")]
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Professional {
    pub id: i64,
    #[serde(rename = "nombre")]
    #[sqlx(rename = "nombre")]
    pub name: String,
    #[serde(rename = "especialidad")]
    #[sqlx(rename = "especialidad")]
    pub specialty: Specialty,
    #[serde(rename = "telefono")]
    #[sqlx(rename = "telefono")]
    pub phone: String,
    #[serde(rename = "estado")]
    #[sqlx(rename = "estado")]
    pub status: ProfessionalStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Appointment {
    pub id: i64,
    #[serde(rename = "fecha")]
    #[sqlx(rename = "fecha")]
    pub date: NaiveDate,
    #[serde(rename = "hora", with = "hhmm")]
    #[sqlx(rename = "hora")]
    pub time: NaiveTime,
    #[serde(rename = "estado")]
    #[sqlx(rename = "estado")]
    pub status: AppointmentStatus,
    #[serde(rename = "profesionalId")]
    #[sqlx(rename = "profesional_id")]
    pub professional_id: i64,
    #[serde(rename = "usuarioId")]
    #[sqlx(rename = "usuario_id")]
    pub user_id: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SessionRecord {
    pub id: i64,
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
}

/* -------------------------
   Store inputs
--------------------------*/

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub document: String,
    pub password_hash: String,
    pub role: Role,
}

#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub document: Option<String>,
    pub password_hash: Option<String>,
    pub role: Option<Role>,
}

#[derive(Debug, Clone)]
pub struct NewProfessional {
    pub name: String,
    pub specialty: Specialty,
    pub phone: String,
    pub status: ProfessionalStatus,
}

#[derive(Debug, Clone, Default)]
pub struct ProfessionalPatch {
    pub name: Option<String>,
    pub specialty: Option<Specialty>,
    pub phone: Option<String>,
    pub status: Option<ProfessionalStatus>,
}

#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub status: AppointmentStatus,
    pub professional_id: i64,
    pub user_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AppointmentPatch {
    #[serde(rename = "fecha")]
    pub date: Option<NaiveDate>,
    #[serde(rename = "hora", default, with = "hhmm::option")]
    pub time: Option<NaiveTime>,
    #[serde(rename = "estado")]
    pub status: Option<AppointmentStatus>,
    #[serde(rename = "profesionalId")]
    pub professional_id: Option<i64>,
    #[serde(rename = "usuarioId")]
    pub user_id: Option<i64>,
}

impl AppointmentPatch {
    /// Drops fields whose value equals the current record, so a client
    /// resubmitting a whole form only carries what actually changed.
    pub fn changes_against(mut self, current: &Appointment) -> Self {
        if self.date == Some(current.date) {
            self.date = None;
        }
        if self.time == Some(current.time) {
            self.time = None;
        }
        if self.status == Some(current.status) {
            self.status = None;
        }
        if self.professional_id == Some(current.professional_id) {
            self.professional_id = None;
        }
        if self.user_id == Some(current.user_id) {
            self.user_id = None;
        }
        self
    }

    pub fn touches_more_than_status(&self) -> bool {
        self.date.is_some()
            || self.time.is_some()
            || self.professional_id.is_some()
            || self.user_id.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none() && !self.touches_more_than_status()
    }
}

/// Which appointments a store listing should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppointmentScope {
    All,
    OwnedBy(i64),
}

/* -------------------------
   API DTOs
--------------------------*/

#[derive(Debug, Serialize)]
pub struct ApiOk<T> {
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct OkData {
    pub ok: bool,
}

/// User as returned over the wire; never carries the credential hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserPublic {
    pub id: i64,
    pub nombre: String,
    pub email: String,
    pub documento: String,
    pub role: Role,
}

impl From<UserRecord> for UserPublic {
    fn from(u: UserRecord) -> Self {
        UserPublic {
            id: u.id,
            nombre: u.name,
            email: u.email,
            documento: u.document,
            role: u.role,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthUser {
    pub id: i64,
    pub nombre: String,
    pub email: String,
    pub role: Role,
}

impl From<&UserRecord> for AuthUser {
    fn from(u: &UserRecord) -> Self {
        AuthUser {
            id: u.id,
            nombre: u.name.clone(),
            email: u.email.clone(),
            role: u.role,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoginResponseData {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
    pub usuario: AuthUser,
}

/// Appointment enriched at read time with names from the referenced rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppointmentView {
    #[serde(flatten)]
    pub appointment: Appointment,
    #[serde(rename = "profesionalNombre", skip_serializing_if = "Option::is_none")]
    pub professional_name: Option<String>,
    #[serde(rename = "profesionalEspecialidad", skip_serializing_if = "Option::is_none")]
    pub professional_specialty: Option<Specialty>,
    #[serde(rename = "usuarioNombre", skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
}

/* -------------------------
   Helpers
--------------------------*/

/// `HH:MM` on the wire. `HH:MM:SS` is accepted on input with the seconds
/// dropped, so a value always reads back exactly as it was stored.
pub mod hhmm {
    use chrono::{NaiveTime, Timelike};
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%H:%M";

    pub fn parse(s: &str) -> Option<NaiveTime> {
        let s = s.trim();
        NaiveTime::parse_from_str(s, FORMAT)
            .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
            .ok()
            .and_then(|t| t.with_second(0))
    }

    pub fn serialize<S: Serializer>(t: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&t.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(d)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom("hora must be HH:MM"))
    }

    pub mod option {
        use chrono::NaiveTime;
        use serde::{Deserialize, Deserializer};

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveTime>, D::Error> {
            match Option::<String>::deserialize(d)? {
                None => Ok(None),
                Some(raw) => super::parse(&raw)
                    .map(Some)
                    .ok_or_else(|| serde::de::Error::custom("hora must be HH:MM")),
            }
        }
    }
}
