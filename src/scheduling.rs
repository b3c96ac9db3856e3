//! Appointment queries and mutations on behalf of an actor.
//!
//! Reads are scoped by [`policy`] and enriched with the current professional
//! and patient names. Writes go through the policy and the status lifecycle
//! before reaching the store.

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::db::Store;
use crate::error::ApiError;
use crate::lifecycle;
use crate::models::{
    Appointment, AppointmentPatch, AppointmentStatus, AppointmentView, NewAppointment,
    Professional, ProfessionalStatus, Role, StatusFilter, hhmm,
};
use crate::policy::{self, Actor};

#[derive(Debug, Clone, Deserialize)]
pub struct AppointmentDraft {
    #[serde(rename = "fecha")]
    pub date: NaiveDate,
    #[serde(rename = "hora", with = "hhmm")]
    pub time: NaiveTime,
    #[serde(rename = "estado")]
    pub status: Option<AppointmentStatus>,
    #[serde(rename = "profesionalId")]
    pub professional_id: i64,
    #[serde(rename = "usuarioId")]
    pub user_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusCount {
    pub estado: AppointmentStatus,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dashboard {
    pub role: Role,
    /// Sections the actor may open: `citas`, plus `usuarios` and `profesionales` for admins.
    pub sections: Vec<&'static str>,
    pub total: usize,
    pub por_estado: Vec<StatusCount>,
    /// Statuses this actor may choose when booking or editing.
    pub estados_permitidos: Vec<AppointmentStatus>,
    pub estado_por_defecto: AppointmentStatus,
}

/// Pure status filter over an already loaded list.
pub fn filter_by_status(list: Vec<AppointmentView>, filter: StatusFilter) -> Vec<AppointmentView> {
    list.into_iter()
        .filter(|v| filter.matches(v.appointment.status))
        .collect()
}

fn enrich(
    appointment: Appointment,
    professionals: &HashMap<i64, Professional>,
    user_names: &HashMap<i64, String>,
) -> AppointmentView {
    let professional = professionals.get(&appointment.professional_id);
    AppointmentView {
        professional_name: professional.map(|p| p.name.clone()),
        professional_specialty: professional.map(|p| p.specialty),
        user_name: user_names.get(&appointment.user_id).cloned(),
        appointment,
    }
}

async fn enrich_all(
    store: &dyn Store,
    appointments: Vec<Appointment>,
) -> Result<Vec<AppointmentView>, ApiError> {
    if appointments.is_empty() {
        return Ok(vec![]);
    }

    let professionals: HashMap<i64, Professional> = store
        .list_professionals()
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();
    let user_names: HashMap<i64, String> = store
        .list_users()
        .await?
        .into_iter()
        .map(|u| (u.id, u.name))
        .collect();

    Ok(appointments
        .into_iter()
        .map(|a| enrich(a, &professionals, &user_names))
        .collect())
}

async fn enrich_one(store: &dyn Store, appointment: Appointment) -> Result<AppointmentView, ApiError> {
    let professional = store.get_professional(appointment.professional_id).await?;
    let user = store.get_user(appointment.user_id).await?;

    Ok(AppointmentView {
        professional_name: professional.as_ref().map(|p| p.name.clone()),
        professional_specialty: professional.map(|p| p.specialty),
        user_name: user.map(|u| u.name),
        appointment,
    })
}

/// Loads an appointment the actor is allowed to see. Invisible ids look
/// exactly like missing ones.
async fn load_visible(store: &dyn Store, actor: &Actor, id: i64) -> Result<Appointment, ApiError> {
    store
        .get_appointment(id)
        .await?
        .filter(|a| policy::can_see(actor, a))
        .ok_or_else(|| ApiError::not_found("appointment"))
}

async fn ensure_bookable(store: &dyn Store, professional_id: i64) -> Result<(), ApiError> {
    let professional = store
        .get_professional(professional_id)
        .await?
        .ok_or_else(|| {
            ApiError::BadRequest("MISSING_REFERENCE", "referenced professional does not exist".into())
        })?;

    if professional.status != ProfessionalStatus::Active {
        return Err(ApiError::BadRequest(
            "PROFESSIONAL_UNAVAILABLE",
            format!("{} is not taking appointments", professional.name),
        ));
    }
    Ok(())
}

pub async fn list_appointments(
    store: &dyn Store,
    actor: &Actor,
    filter: StatusFilter,
) -> Result<Vec<AppointmentView>, ApiError> {
    let visible = store.list_appointments(policy::appointment_scope(actor)).await?;
    let views = enrich_all(store, visible).await?;
    Ok(filter_by_status(views, filter))
}

pub async fn list_appointments_for_user(
    store: &dyn Store,
    actor: &Actor,
    user_id: i64,
) -> Result<Vec<AppointmentView>, ApiError> {
    policy::ensure_self_or_admin(actor, user_id)?;
    if store.get_user(user_id).await?.is_none() {
        return Err(ApiError::not_found("user"));
    }

    let owned = store
        .list_appointments(crate::models::AppointmentScope::OwnedBy(user_id))
        .await?;
    enrich_all(store, owned).await
}

pub async fn list_active_professionals(store: &dyn Store) -> Result<Vec<Professional>, ApiError> {
    Ok(store
        .list_professionals()
        .await?
        .into_iter()
        .filter(|p| p.status == ProfessionalStatus::Active)
        .collect())
}

pub async fn get_appointment(
    store: &dyn Store,
    actor: &Actor,
    id: i64,
) -> Result<AppointmentView, ApiError> {
    let appointment = load_visible(store, actor, id).await?;
    enrich_one(store, appointment).await
}

pub async fn create_appointment(
    store: &dyn Store,
    actor: &Actor,
    draft: AppointmentDraft,
) -> Result<AppointmentView, ApiError> {
    let user_id = policy::owner_for_new(actor, draft.user_id)?;
    let status = draft.status.unwrap_or_else(|| policy::default_status(actor));
    policy::ensure_status_permitted(actor, status)?;
    ensure_bookable(store, draft.professional_id).await?;

    let created = store
        .create_appointment(NewAppointment {
            date: draft.date,
            time: draft.time,
            status,
            professional_id: draft.professional_id,
            user_id,
        })
        .await?;

    tracing::info!(
        appointment_id = created.id,
        actor = actor.user_id(),
        owner = user_id,
        %status,
        "appointment created"
    );
    enrich_one(store, created).await
}

pub async fn update_appointment(
    store: &dyn Store,
    actor: &Actor,
    id: i64,
    patch: AppointmentPatch,
) -> Result<AppointmentView, ApiError> {
    let current = load_visible(store, actor, id).await?;
    let patch = patch.changes_against(&current);

    policy::ensure_patch_permitted(actor, &patch)?;
    if patch.is_empty() {
        return enrich_one(store, current).await;
    }

    if let Some(to) = patch.status {
        lifecycle::validate_transition(current.status, to)?;
    } else if lifecycle::is_terminal(current.status) {
        return Err(ApiError::BadRequest(
            "INVALID_TRANSITION",
            format!("appointment is {} and can no longer be changed", current.status),
        ));
    }
    if let Some(professional_id) = patch.professional_id {
        ensure_bookable(store, professional_id).await?;
    }

    // Only write if nobody moved the status since we validated against it.
    let updated = store
        .update_appointment(id, patch, Some(current.status))
        .await?;

    tracing::info!(
        appointment_id = id,
        actor = actor.user_id(),
        from = %current.status,
        to = %updated.status,
        "appointment updated"
    );
    enrich_one(store, updated).await
}

pub async fn delete_appointment(store: &dyn Store, actor: &Actor, id: i64) -> Result<(), ApiError> {
    load_visible(store, actor, id).await?;
    store.delete_appointment(id).await?;
    tracing::info!(appointment_id = id, actor = actor.user_id(), "appointment deleted");
    Ok(())
}

pub async fn dashboard(store: &dyn Store, actor: &Actor) -> Result<Dashboard, ApiError> {
    let visible = store.list_appointments(policy::appointment_scope(actor)).await?;

    let por_estado = AppointmentStatus::ALL
        .into_iter()
        .map(|estado| StatusCount {
            estado,
            total: visible.iter().filter(|a| a.status == estado).count(),
        })
        .collect();

    let mut sections = vec!["citas"];
    if policy::can_list_patients(actor) {
        sections.extend(["usuarios", "profesionales"]);
    }

    Ok(Dashboard {
        role: actor.role(),
        sections,
        total: visible.len(),
        por_estado,
        estados_permitidos: policy::permitted_statuses(actor).to_vec(),
        estado_por_defecto: policy::default_status(actor),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::models::{NewProfessional, NewUser, Specialty};

    const ADMIN: Actor = Actor::Admin { user_id: 1 };
    const JUAN: Actor = Actor::Patient { user_id: 2 };
    const MARIA: Actor = Actor::Patient { user_id: 3 };

    async fn hospital() -> MemoryStore {
        let store = MemoryStore::new();
        for (name, email, doc, role) in [
            ("Admin Sistema", "admin@hospital.com", "12345678", Role::Admin),
            ("Juan Pérez", "juan@email.com", "87654321", Role::Patient),
            ("María González", "maria@email.com", "11223344", Role::Patient),
        ] {
            store
                .create_user(NewUser {
                    name: name.into(),
                    email: email.into(),
                    document: doc.into(),
                    password_hash: "unused".into(),
                    role,
                })
                .await
                .unwrap();
        }
        for (name, specialty, status) in [
            ("Dr. Carlos Rodríguez", Specialty::Cardiology, ProfessionalStatus::Active),
            ("Dra. Ana Martínez", Specialty::Pediatrics, ProfessionalStatus::Active),
            ("Dr. Luis Fernández", Specialty::Traumatology, ProfessionalStatus::OnVacation),
        ] {
            store
                .create_professional(NewProfessional {
                    name: name.into(),
                    specialty,
                    phone: "555-0000".into(),
                    status,
                })
                .await
                .unwrap();
        }
        store
    }

    fn draft(professional_id: i64, user_id: Option<i64>, status: Option<AppointmentStatus>) -> AppointmentDraft {
        AppointmentDraft {
            date: NaiveDate::from_ymd_opt(2026, 2, 5).unwrap(),
            time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            status,
            professional_id,
            user_id,
        }
    }

    fn status_patch(status: AppointmentStatus) -> AppointmentPatch {
        AppointmentPatch { status: Some(status), ..Default::default() }
    }

    #[tokio::test]
    async fn admin_create_is_enriched_with_fresh_id() {
        let store = hospital().await;
        let view = create_appointment(&store, &ADMIN, draft(1, Some(2), Some(AppointmentStatus::Pending)))
            .await
            .unwrap();

        assert_eq!(view.appointment.id, 1);
        assert_eq!(view.appointment.status, AppointmentStatus::Pending);
        assert_eq!(view.professional_name.as_deref(), Some("Dr. Carlos Rodríguez"));
        assert_eq!(view.professional_specialty, Some(Specialty::Cardiology));
        assert_eq!(view.user_name.as_deref(), Some("Juan Pérez"));
    }

    #[tokio::test]
    async fn patient_books_for_themselves_with_confirmed_default() {
        let store = hospital().await;
        let view = create_appointment(&store, &JUAN, draft(1, Some(3), None)).await.unwrap();
        assert_eq!(view.appointment.user_id, 2);
        assert_eq!(view.appointment.status, AppointmentStatus::Confirmed);

        let err = create_appointment(&store, &JUAN, draft(1, None, Some(AppointmentStatus::Completed)))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "UNAUTHORIZED_STATUS");
    }

    #[tokio::test]
    async fn admin_default_status_is_pending_and_patient_required() {
        let store = hospital().await;
        let view = create_appointment(&store, &ADMIN, draft(2, Some(3), None)).await.unwrap();
        assert_eq!(view.appointment.status, AppointmentStatus::Pending);

        let err = create_appointment(&store, &ADMIN, draft(2, None, None)).await.unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn booking_requires_an_active_existing_professional() {
        let store = hospital().await;
        let err = create_appointment(&store, &JUAN, draft(3, None, None)).await.unwrap_err();
        assert_eq!(err.code(), "PROFESSIONAL_UNAVAILABLE");
        let err = create_appointment(&store, &JUAN, draft(42, None, None)).await.unwrap_err();
        assert_eq!(err.code(), "MISSING_REFERENCE");
    }

    #[tokio::test]
    async fn patients_only_see_their_own() {
        let store = hospital().await;
        create_appointment(&store, &ADMIN, draft(1, Some(2), None)).await.unwrap();
        create_appointment(&store, &ADMIN, draft(2, Some(3), None)).await.unwrap();
        create_appointment(&store, &JUAN, draft(2, None, None)).await.unwrap();

        let juan = list_appointments(&store, &JUAN, StatusFilter::All).await.unwrap();
        assert_eq!(juan.len(), 2);
        assert!(juan.iter().all(|v| v.appointment.user_id == 2));

        let all = list_appointments(&store, &ADMIN, StatusFilter::All).await.unwrap();
        assert_eq!(all.len(), 3);

        let pending = list_appointments(&store, &ADMIN, StatusFilter::Only(AppointmentStatus::Pending))
            .await
            .unwrap();
        assert_eq!(pending.len(), 2);

        assert_eq!(get_appointment(&store, &MARIA, 1).await.unwrap_err().code(), "NOT_FOUND");
        assert!(list_appointments_for_user(&store, &MARIA, 2).await.is_err());
        assert_eq!(list_appointments_for_user(&store, &ADMIN, 3).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn status_update_keeps_references() {
        let store = hospital().await;
        let created = create_appointment(&store, &ADMIN, draft(1, Some(2), None)).await.unwrap();

        let updated = update_appointment(&store, &ADMIN, created.appointment.id, status_patch(AppointmentStatus::Confirmed))
            .await
            .unwrap();
        assert_eq!(updated.appointment.status, AppointmentStatus::Confirmed);
        assert_eq!(updated.appointment.professional_id, 1);
        assert_eq!(updated.appointment.user_id, 2);
    }

    #[tokio::test]
    async fn terminal_appointments_are_frozen() {
        let store = hospital().await;
        let id = create_appointment(&store, &JUAN, draft(1, None, None)).await.unwrap().appointment.id;

        update_appointment(&store, &JUAN, id, status_patch(AppointmentStatus::Cancelled))
            .await
            .unwrap();

        let err = update_appointment(&store, &ADMIN, id, status_patch(AppointmentStatus::Confirmed))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_TRANSITION");

        let reschedule = AppointmentPatch {
            date: NaiveDate::from_ymd_opt(2026, 3, 1),
            ..Default::default()
        };
        let err = update_appointment(&store, &ADMIN, id, reschedule).await.unwrap_err();
        assert_eq!(err.code(), "INVALID_TRANSITION");
    }

    #[tokio::test]
    async fn patient_edits_are_status_only_and_owned() {
        let store = hospital().await;
        let id = create_appointment(&store, &ADMIN, draft(1, Some(2), None)).await.unwrap().appointment.id;

        let err = update_appointment(&store, &JUAN, id, status_patch(AppointmentStatus::Completed))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "UNAUTHORIZED_STATUS");

        let move_doctor = AppointmentPatch { professional_id: Some(2), ..Default::default() };
        let err = update_appointment(&store, &JUAN, id, move_doctor).await.unwrap_err();
        assert_eq!(err.code(), "FORBIDDEN");

        let err = update_appointment(&store, &MARIA, id, status_patch(AppointmentStatus::Cancelled))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");

        // resubmitting the unchanged form plus a new status is fine
        let full_form = AppointmentPatch {
            date: NaiveDate::from_ymd_opt(2026, 2, 5),
            time: NaiveTime::from_hms_opt(9, 0, 0),
            status: Some(AppointmentStatus::Confirmed),
            professional_id: Some(1),
            user_id: Some(2),
        };
        let v = update_appointment(&store, &JUAN, id, full_form).await.unwrap();
        assert_eq!(v.appointment.status, AppointmentStatus::Confirmed);
    }

    #[tokio::test]
    async fn booking_with_seconds_round_trips_through_the_form() {
        let store = hospital().await;
        let booked: AppointmentDraft = serde_json::from_value(serde_json::json!({
            "fecha": "2026-02-05",
            "hora": "09:00:30",
            "profesionalId": 1
        }))
        .unwrap();
        let created = create_appointment(&store, &JUAN, booked).await.unwrap();

        let mut form = serde_json::to_value(&created).unwrap();
        assert_eq!(form["hora"], "09:00");

        form["estado"] = serde_json::json!("cancelada");
        let patch: AppointmentPatch = serde_json::from_value(form).unwrap();
        let v = update_appointment(&store, &JUAN, created.appointment.id, patch)
            .await
            .unwrap();
        assert_eq!(v.appointment.status, AppointmentStatus::Cancelled);
        assert_eq!(v.appointment.time, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn delete_checks_ownership() {
        let store = hospital().await;
        let id = create_appointment(&store, &ADMIN, draft(1, Some(2), None)).await.unwrap().appointment.id;

        assert_eq!(delete_appointment(&store, &MARIA, id).await.unwrap_err().code(), "NOT_FOUND");
        delete_appointment(&store, &JUAN, id).await.unwrap();
        assert!(list_appointments(&store, &ADMIN, StatusFilter::All).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn enrichment_fields_vanish_with_their_rows() {
        let store = hospital().await;
        let id = create_appointment(&store, &ADMIN, draft(1, Some(2), None)).await.unwrap().appointment.id;
        let enriched = get_appointment(&store, &ADMIN, id).await.unwrap();

        let mut professionals = HashMap::new();
        professionals.insert(1, store.get_professional(1).await.unwrap().unwrap());
        let bare = enrich(enriched.appointment.clone(), &HashMap::new(), &HashMap::new());
        assert!(bare.professional_name.is_none() && bare.user_name.is_none());

        let partial = enrich(enriched.appointment, &professionals, &HashMap::new());
        assert_eq!(partial.professional_name, enriched.professional_name);
        assert!(partial.user_name.is_none());
    }

    #[tokio::test]
    async fn active_professionals_and_dashboard() {
        let store = hospital().await;
        let active = list_active_professionals(&store).await.unwrap();
        assert_eq!(active.iter().map(|p| p.id).collect::<Vec<_>>(), vec![1, 2]);

        create_appointment(&store, &ADMIN, draft(1, Some(2), None)).await.unwrap();
        create_appointment(&store, &JUAN, draft(2, None, None)).await.unwrap();

        let admin = dashboard(&store, &ADMIN).await.unwrap();
        assert_eq!(admin.sections, vec!["citas", "usuarios", "profesionales"]);
        assert_eq!(admin.total, 2);

        let juan = dashboard(&store, &JUAN).await.unwrap();
        assert_eq!(juan.sections, vec!["citas"]);
        assert_eq!(juan.estado_por_defecto, AppointmentStatus::Confirmed);
        let confirmed = juan
            .por_estado
            .iter()
            .find(|c| c.estado == AppointmentStatus::Confirmed)
            .unwrap();
        assert_eq!(confirmed.total, 1);
    }
}
