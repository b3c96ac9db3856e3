//! Appointment status state machine.
//!
//! `pendiente -> {confirmada, cancelada}`, `confirmada -> {completada, cancelada}`.
//! `cancelada` and `completada` are terminal. Re-applying the current status
//! is accepted as a no-op.

use thiserror::Error;

use crate::models::AppointmentStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot move appointment from {from} to {to}")]
pub struct InvalidTransition {
    pub from: AppointmentStatus,
    pub to: AppointmentStatus,
}

pub fn next_statuses(current: AppointmentStatus) -> &'static [AppointmentStatus] {
    use AppointmentStatus::*;
    match current {
        Pending => &[Confirmed, Cancelled],
        Confirmed => &[Completed, Cancelled],
        Cancelled | Completed => &[],
    }
}

pub fn is_terminal(status: AppointmentStatus) -> bool {
    next_statuses(status).is_empty()
}

pub fn validate_transition(
    from: AppointmentStatus,
    to: AppointmentStatus,
) -> Result<(), InvalidTransition> {
    if from == to || next_statuses(from).contains(&to) {
        tracing::debug!(%from, %to, "status transition accepted");
        Ok(())
    } else {
        Err(InvalidTransition { from, to })
    }
}
