use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub enum Role {
    Admin = 1,
    Manager = 2,
    Staff = 3,
}

impl Role {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Role::Admin),
            2 => Some(Role::Manager),
            3 => Some(Role::Staff),
            _ => None,
        }
    }

    /// Admins and managers may run clinic-level actions (QR codes, schedules, day status)
    pub fn can_manage(self) -> bool {
        matches!(self, Role::Admin | Role::Manager)
    }
}
