//! Role rules for every operation. Handlers and the scheduling layer call
//! into this module instead of branching on roles themselves.

use crate::error::ApiError;
use crate::models::{
    Appointment, AppointmentPatch, AppointmentScope, AppointmentStatus, Role, UserRecord,
};

const PATIENT_STATUSES: &[AppointmentStatus] =
    &[AppointmentStatus::Confirmed, AppointmentStatus::Cancelled];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Admin { user_id: i64 },
    Patient { user_id: i64 },
}

impl Actor {
    pub fn from_user(user: &UserRecord) -> Self {
        match user.role {
            Role::Admin => Actor::Admin { user_id: user.id },
            Role::Patient => Actor::Patient { user_id: user.id },
        }
    }

    pub fn user_id(&self) -> i64 {
        match *self {
            Actor::Admin { user_id } | Actor::Patient { user_id } => user_id,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Actor::Admin { .. })
    }

    pub fn role(&self) -> Role {
        match self {
            Actor::Admin { .. } => Role::Admin,
            Actor::Patient { .. } => Role::Patient,
        }
    }
}

pub fn ensure_admin(actor: &Actor) -> Result<(), ApiError> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(ApiError::forbidden("Only admins can perform this operation"))
    }
}

/// Admins may act on any user record; patients only on their own.
pub fn ensure_self_or_admin(actor: &Actor, user_id: i64) -> Result<(), ApiError> {
    if actor.is_admin() || actor.user_id() == user_id {
        Ok(())
    } else {
        Err(ApiError::forbidden("Patients can only access their own account"))
    }
}

pub fn appointment_scope(actor: &Actor) -> AppointmentScope {
    match *actor {
        Actor::Admin { .. } => AppointmentScope::All,
        Actor::Patient { user_id } => AppointmentScope::OwnedBy(user_id),
    }
}

pub fn can_see(actor: &Actor, appointment: &Appointment) -> bool {
    match *actor {
        Actor::Admin { .. } => true,
        Actor::Patient { user_id } => appointment.user_id == user_id,
    }
}

/// Whether the patient picker is offered when booking.
pub fn can_list_patients(actor: &Actor) -> bool {
    actor.is_admin()
}

pub fn default_status(actor: &Actor) -> AppointmentStatus {
    match actor {
        Actor::Admin { .. } => AppointmentStatus::Pending,
        Actor::Patient { .. } => AppointmentStatus::Confirmed,
    }
}

pub fn permitted_statuses(actor: &Actor) -> &'static [AppointmentStatus] {
    match actor {
        Actor::Admin { .. } => &AppointmentStatus::ALL,
        Actor::Patient { .. } => PATIENT_STATUSES,
    }
}

pub fn ensure_status_permitted(actor: &Actor, status: AppointmentStatus) -> Result<(), ApiError> {
    if permitted_statuses(actor).contains(&status) {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "UNAUTHORIZED_STATUS",
            format!("status {status} cannot be set by this account"),
        ))
    }
}

/// Owner of a new appointment. Patients always book for themselves,
/// whatever the request says; admins must name the patient.
pub fn owner_for_new(actor: &Actor, requested: Option<i64>) -> Result<i64, ApiError> {
    match *actor {
        Actor::Patient { user_id } => {
            if let Some(other) = requested.filter(|r| *r != user_id) {
                tracing::warn!(actor = user_id, requested = other, "patient booking for another user, forcing owner");
            }
            Ok(user_id)
        }
        Actor::Admin { .. } => {
            requested.ok_or_else(|| ApiError::validation("usuarioId is required"))
        }
    }
}

/// `patch` must already be reduced to the fields that actually change.
pub fn ensure_patch_permitted(actor: &Actor, patch: &AppointmentPatch) -> Result<(), ApiError> {
    if actor.is_admin() {
        return Ok(());
    }
    if patch.touches_more_than_status() {
        return Err(ApiError::forbidden("Patients can only change the status of an appointment"));
    }
    match patch.status {
        Some(status) => ensure_status_permitted(actor, status),
        None => Ok(()),
    }
}
