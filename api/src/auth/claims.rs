use db::models::user::Role;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject id of the authenticated user.
    pub sub: String,
    pub exp: usize,
    pub role: Role,
}

impl Claims {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Teachers and admins operate scanners and read other subjects' records.
    pub fn is_staff(&self) -> bool {
        matches!(self.role, Role::Teacher | Role::Admin)
    }
}

#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);
