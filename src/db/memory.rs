// src/db/memory.rs

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{Store, StoreError};
use crate::models::{
    Appointment, AppointmentPatch, AppointmentScope, AppointmentStatus, NewAppointment,
    NewProfessional, NewUser, Professional, ProfessionalPatch, SessionRecord, UserPatch,
    UserRecord,
};

#[derive(Debug, Clone)]
struct SessionRow {
    record: SessionRecord,
    token_hash: String,
    revoked: bool,
}

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<i64, UserRecord>,
    professionals: BTreeMap<i64, Professional>,
    appointments: BTreeMap<i64, Appointment>,
    sessions: BTreeMap<i64, SessionRow>,
    // Sessions are pruned, so their ids come from a counter instead of max+1.
    last_session_id: i64,
}

fn next_id<T>(table: &BTreeMap<i64, T>) -> i64 {
    table.keys().next_back().map_or(1, |max| max + 1)
}

impl Tables {
    fn check_unique_user(&self, email: &str, document: &str, except: Option<i64>) -> Result<(), StoreError> {
        let others = self.users.values().filter(|u| Some(u.id) != except);
        for u in others {
            if u.email.eq_ignore_ascii_case(email) {
                return Err(StoreError::EmailTaken);
            }
            if u.document == document {
                return Err(StoreError::DocumentTaken);
            }
        }
        Ok(())
    }

    fn check_references(&self, professional_id: i64, user_id: i64) -> Result<(), StoreError> {
        if !self.professionals.contains_key(&professional_id) {
            return Err(StoreError::MissingReference("professional"));
        }
        if !self.users.contains_key(&user_id) {
            return Err(StoreError::MissingReference("user"));
        }
        Ok(())
    }
}

/// In-process store. A single lock serializes all writes.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_users(&self) -> Result<Vec<UserRecord>, StoreError> {
        Ok(self.tables.read().await.users.values().cloned().collect())
    }

    async fn get_user(&self, id: i64) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let t = self.tables.read().await;
        Ok(t.users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn create_user(&self, new: NewUser) -> Result<UserRecord, StoreError> {
        let mut t = self.tables.write().await;
        t.check_unique_user(&new.email, &new.document, None)?;

        let user = UserRecord {
            id: next_id(&t.users),
            name: new.name,
            email: new.email,
            document: new.document,
            password_hash: new.password_hash,
            role: new.role,
        };
        t.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_user(&self, id: i64, patch: UserPatch) -> Result<UserRecord, StoreError> {
        let mut t = self.tables.write().await;
        let mut user = t.users.get(&id).cloned().ok_or(StoreError::NotFound("user"))?;

        if let Some(name) = patch.name {
            user.name = name;
        }
        if let Some(email) = patch.email {
            user.email = email;
        }
        if let Some(document) = patch.document {
            user.document = document;
        }
        if let Some(hash) = patch.password_hash {
            user.password_hash = hash;
        }
        if let Some(role) = patch.role {
            user.role = role;
        }

        t.check_unique_user(&user.email, &user.document, Some(id))?;
        t.users.insert(id, user.clone());
        Ok(user)
    }

    async fn delete_user(&self, id: i64) -> Result<(), StoreError> {
        let mut t = self.tables.write().await;
        if !t.users.contains_key(&id) {
            return Err(StoreError::NotFound("user"));
        }
        if t.appointments.values().any(|a| a.user_id == id) {
            return Err(StoreError::InUse("user"));
        }
        t.users.remove(&id);
        t.sessions.retain(|_, s| s.record.user_id != id);
        Ok(())
    }

    async fn list_professionals(&self) -> Result<Vec<Professional>, StoreError> {
        Ok(self.tables.read().await.professionals.values().cloned().collect())
    }

    async fn get_professional(&self, id: i64) -> Result<Option<Professional>, StoreError> {
        Ok(self.tables.read().await.professionals.get(&id).cloned())
    }

    async fn create_professional(&self, new: NewProfessional) -> Result<Professional, StoreError> {
        let mut t = self.tables.write().await;
        let professional = Professional {
            id: next_id(&t.professionals),
            name: new.name,
            specialty: new.specialty,
            phone: new.phone,
            status: new.status,
        };
        t.professionals.insert(professional.id, professional.clone());
        Ok(professional)
    }

    async fn update_professional(
        &self,
        id: i64,
        patch: ProfessionalPatch,
    ) -> Result<Professional, StoreError> {
        let mut t = self.tables.write().await;
        let p = t
            .professionals
            .get_mut(&id)
            .ok_or(StoreError::NotFound("professional"))?;

        if let Some(name) = patch.name {
            p.name = name;
        }
        if let Some(specialty) = patch.specialty {
            p.specialty = specialty;
        }
        if let Some(phone) = patch.phone {
            p.phone = phone;
        }
        if let Some(status) = patch.status {
            p.status = status;
        }
        Ok(p.clone())
    }

    async fn delete_professional(&self, id: i64) -> Result<(), StoreError> {
        let mut t = self.tables.write().await;
        if !t.professionals.contains_key(&id) {
            return Err(StoreError::NotFound("professional"));
        }
        if t.appointments.values().any(|a| a.professional_id == id) {
            return Err(StoreError::InUse("professional"));
        }
        t.professionals.remove(&id);
        Ok(())
    }

    async fn list_appointments(
        &self,
        scope: AppointmentScope,
    ) -> Result<Vec<Appointment>, StoreError> {
        let t = self.tables.read().await;
        let mut out: Vec<Appointment> = t
            .appointments
            .values()
            .filter(|a| match scope {
                AppointmentScope::All => true,
                AppointmentScope::OwnedBy(user_id) => a.user_id == user_id,
            })
            .cloned()
            .collect();
        out.sort_by_key(|a| (a.date, a.time, a.id));
        Ok(out)
    }

    async fn get_appointment(&self, id: i64) -> Result<Option<Appointment>, StoreError> {
        Ok(self.tables.read().await.appointments.get(&id).cloned())
    }

    async fn create_appointment(&self, new: NewAppointment) -> Result<Appointment, StoreError> {
        let mut t = self.tables.write().await;
        t.check_references(new.professional_id, new.user_id)?;

        let appointment = Appointment {
            id: next_id(&t.appointments),
            date: new.date,
            time: new.time,
            status: new.status,
            professional_id: new.professional_id,
            user_id: new.user_id,
        };
        t.appointments.insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    async fn update_appointment(
        &self,
        id: i64,
        patch: AppointmentPatch,
        expected_status: Option<AppointmentStatus>,
    ) -> Result<Appointment, StoreError> {
        let mut t = self.tables.write().await;
        let mut a = t
            .appointments
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound("appointment"))?;

        if expected_status.is_some_and(|s| s != a.status) {
            return Err(StoreError::StaleStatus);
        }

        if let Some(date) = patch.date {
            a.date = date;
        }
        if let Some(time) = patch.time {
            a.time = time;
        }
        if let Some(status) = patch.status {
            a.status = status;
        }
        if let Some(professional_id) = patch.professional_id {
            a.professional_id = professional_id;
        }
        if let Some(user_id) = patch.user_id {
            a.user_id = user_id;
        }

        t.check_references(a.professional_id, a.user_id)?;
        t.appointments.insert(id, a.clone());
        Ok(a)
    }

    async fn delete_appointment(&self, id: i64) -> Result<(), StoreError> {
        let mut t = self.tables.write().await;
        t.appointments
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound("appointment"))
    }

    async fn create_session(
        &self,
        user_id: i64,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<SessionRecord, StoreError> {
        let mut t = self.tables.write().await;
        if !t.users.contains_key(&user_id) {
            return Err(StoreError::MissingReference("user"));
        }
        let now = Utc::now();
        t.sessions.retain(|_, s| !s.revoked && s.record.expires_at > now);

        t.last_session_id += 1;
        let record = SessionRecord {
            id: t.last_session_id,
            user_id,
            expires_at,
        };
        t.sessions.insert(
            record.id,
            SessionRow {
                record: record.clone(),
                token_hash: token_hash.to_string(),
                revoked: false,
            },
        );
        Ok(record)
    }

    async fn find_active_session(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<SessionRecord>, StoreError> {
        let t = self.tables.read().await;
        Ok(t.sessions
            .values()
            .find(|s| s.token_hash == token_hash && !s.revoked && s.record.expires_at > now)
            .map(|s| s.record.clone()))
    }

    async fn revoke_session(&self, session_id: i64) -> Result<bool, StoreError> {
        let mut t = self.tables.write().await;
        match t.sessions.get_mut(&session_id) {
            Some(s) if !s.revoked => {
                s.revoked = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
