// src/db/seed.rs

use chrono::{NaiveDate, NaiveTime};

use super::Store;
use crate::auth::hash_password;
use crate::config::AdminBootstrap;
use crate::models::{
    AppointmentStatus, NewAppointment, NewProfessional, NewUser, ProfessionalStatus, Role,
    Specialty,
};

fn hash(password: &str) -> anyhow::Result<String> {
    hash_password(password).map_err(|e| anyhow::anyhow!("{e:?}"))
}

/// Populate an empty store with the demo hospital. No-op if any user exists.
pub async fn seed_demo_data(store: &dyn Store) -> anyhow::Result<()> {
    if !store.list_users().await?.is_empty() {
        tracing::info!("store already has users, skipping demo data");
        return Ok(());
    }

    let users = [
        ("Admin Sistema", "admin@hospital.com", "12345678", "admin123", Role::Admin),
        ("Juan Pérez", "juan@email.com", "87654321", "user123", Role::Patient),
        ("María González", "maria@email.com", "11223344", "user123", Role::Patient),
    ];
    let mut user_ids = Vec::with_capacity(users.len());
    for (name, email, document, password, role) in users {
        let user = store
            .create_user(NewUser {
                name: name.into(),
                email: email.into(),
                document: document.into(),
                password_hash: hash(password)?,
                role,
            })
            .await?;
        user_ids.push(user.id);
    }

    let professionals = [
        ("Dr. Carlos Rodríguez", Specialty::Cardiology, "555-0001"),
        ("Dra. Ana Martínez", Specialty::Pediatrics, "555-0002"),
        ("Dr. Luis Fernández", Specialty::Traumatology, "555-0003"),
        ("Dra. Carmen Silva", Specialty::Gynecology, "555-0004"),
    ];
    let mut professional_ids = Vec::with_capacity(professionals.len());
    for (name, specialty, phone) in professionals {
        let p = store
            .create_professional(NewProfessional {
                name: name.into(),
                specialty,
                phone: phone.into(),
                status: ProfessionalStatus::Active,
            })
            .await?;
        professional_ids.push(p.id);
    }

    // (date, time, status, professional index, user index)
    let appointments = [
        ((2026, 2, 5), (9, 0), AppointmentStatus::Confirmed, 0, 1),
        ((2026, 2, 5), (10, 0), AppointmentStatus::Pending, 1, 2),
        ((2026, 2, 6), (14, 0), AppointmentStatus::Confirmed, 2, 1),
    ];
    for ((y, m, d), (hh, mm), status, p_idx, u_idx) in appointments {
        let date = NaiveDate::from_ymd_opt(y, m, d)
            .ok_or_else(|| anyhow::anyhow!("bad seed date"))?;
        let time = NaiveTime::from_hms_opt(hh, mm, 0)
            .ok_or_else(|| anyhow::anyhow!("bad seed time"))?;
        store
            .create_appointment(NewAppointment {
                date,
                time,
                status,
                professional_id: professional_ids[p_idx],
                user_id: user_ids[u_idx],
            })
            .await?;
    }

    tracing::info!(
        users = user_ids.len(),
        professionals = professional_ids.len(),
        appointments = appointments.len(),
        "demo data seeded"
    );
    Ok(())
}

/// Create the configured admin account unless its email is already taken.
pub async fn ensure_admin(store: &dyn Store, admin: &AdminBootstrap) -> anyhow::Result<()> {
    let email = admin.email.trim().to_lowercase();
    if let Some(existing) = store.find_user_by_email(&email).await? {
        if existing.role != Role::Admin {
            tracing::warn!(user_id = existing.id, "bootstrap admin email belongs to a patient account");
        }
        return Ok(());
    }

    let user = store
        .create_user(NewUser {
            name: admin.name.trim().to_string(),
            email,
            document: admin.document.trim().to_string(),
            password_hash: hash(&admin.password)?,
            role: Role::Admin,
        })
        .await?;
    tracing::info!(user_id = user.id, "bootstrap admin created");
    Ok(())
}
