use std::sync::Mutex;

use rusqlite::Connection;
use serde::Serialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Appointment, AppointmentStatus, Consultant, User};
use crate::services::functions::{AdminFunctions, DeleteUserResult};

/// Admin endpoints need a signed-in user holding the admin role.
pub fn require_admin(user: Option<User>) -> Result<User, AppError> {
    let user = user.ok_or_else(|| AppError::Unauthenticated("Please log in".to_string()))?;
    if !user.is_admin() {
        return Err(AppError::PermissionDenied("Admin access required".to_string()));
    }
    Ok(user)
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DashboardStats {
    pub total_users: usize,
    pub verified_users: usize,
    pub admin_users: usize,
    pub total_consultants: usize,
    pub total_appointments: usize,
    pub pending_appointments: usize,
}

/// Snapshot of the three collections taken when the admin panel opens.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct Dashboard {
    pub users: Vec<User>,
    pub consultants: Vec<Consultant>,
    pub appointments: Vec<Appointment>,
}

impl Dashboard {
    pub fn load(conn: &Connection) -> rusqlite::Result<Self> {
        Ok(Self {
            users: queries::list_users(conn)?,
            consultants: queries::list_consultants(conn)?,
            appointments: queries::list_appointments(conn)?,
        })
    }

    pub fn stats(&self) -> DashboardStats {
        DashboardStats {
            total_users: self.users.len(),
            verified_users: self.users.iter().filter(|u| u.email_verified).count(),
            admin_users: self.users.iter().filter(|u| u.is_admin()).count(),
            total_consultants: self.consultants.len(),
            total_appointments: self.appointments.len(),
            pending_appointments: self
                .appointments
                .iter()
                .filter(|a| a.status == AppointmentStatus::Pending)
                .count(),
        }
    }

    pub fn user(&self, id: &str) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    pub fn update_user(&mut self, conn: &Connection, user: User) -> Result<(), AppError> {
        if !queries::update_user(conn, &user)? {
            return Err(AppError::NotFound(format!("user {}", user.id)));
        }
        if let Some(row) = self.users.iter_mut().find(|u| u.id == user.id) {
            *row = user;
        }
        Ok(())
    }

    pub fn update_consultant(
        &mut self,
        conn: &Connection,
        consultant: Consultant,
    ) -> Result<(), AppError> {
        if !queries::update_consultant(conn, &consultant)? {
            return Err(AppError::NotFound(format!("consultant {}", consultant.id)));
        }
        if let Some(row) = self.consultants.iter_mut().find(|c| c.id == consultant.id) {
            *row = consultant;
        }
        Ok(())
    }

    /// Marks the profile verified without involving the identity provider.
    pub fn verify_user_email(&mut self, conn: &Connection, id: &str) -> Result<(), AppError> {
        if !queries::set_email_verified(conn, id, true)? {
            return Err(AppError::NotFound(format!("user {id}")));
        }
        if let Some(row) = self.users.iter_mut().find(|u| u.id == id) {
            row.email_verified = true;
        }
        tracing::info!(uid = id, "email verified by admin");
        Ok(())
    }

    /// Removes the consultant document and its row. No privileged call is involved.
    pub fn delete_consultant(&mut self, conn: &Connection, id: &str) -> Result<(), AppError> {
        if !queries::delete_consultant(conn, id)? {
            return Err(AppError::NotFound(format!("consultant {id}")));
        }
        self.consultants.retain(|c| c.id != id);
        Ok(())
    }
}

/// Deletes a user through the privileged function. The loaded row is dropped
/// only after the function reports success.
pub async fn delete_user(
    dashboard: &Mutex<Dashboard>,
    functions: &dyn AdminFunctions,
    id: &str,
) -> Result<DeleteUserResult, AppError> {
    let email = dashboard
        .lock()
        .unwrap()
        .user(id)
        .map(|u| u.email.clone())
        .ok_or_else(|| AppError::NotFound(format!("user {id}")))?;

    let result = functions.delete_user(&email).await?;
    if !result.success {
        return Err(AppError::RemoteUnavailable(result.message));
    }

    dashboard.lock().unwrap().users.retain(|u| u.id != id);
    tracing::info!(uid = id, email = %email, "user removed from dashboard");
    Ok(result)
}
