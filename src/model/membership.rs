use serde::Serialize;

use super::role::Role;

/// Read view of a user's membership in a clinic.
#[derive(Debug, Clone, Serialize)]
pub struct ClinicMembership {
    pub user_id: u64,
    pub clinic_id: u64,
    pub role: Role,
    pub is_active: bool,
}

#[derive(Debug, sqlx::FromRow)]
pub struct MembershipRow {
    pub user_id: u64,
    pub clinic_id: u64,
    pub role_id: u8,
    pub is_active: bool,
}

impl MembershipRow {
    /// Rows with an unknown role id are dropped rather than guessed.
    pub fn into_membership(self) -> Option<ClinicMembership> {
        Some(ClinicMembership {
            user_id: self.user_id,
            clinic_id: self.clinic_id,
            role: Role::from_id(self.role_id)?,
            is_active: self.is_active,
        })
    }
}
