//! Verified caller identity.
//!
//! Principals are provisioned by the authentication collaborator. Each one
//! holds an API key stored as a SHA-256 hash and a role; the core only ever
//! sees the resulting `Identity`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// Role attached to a verified principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    /// Faculty member; may view facilities but not rotate their codes.
    Staff,
    Admin,
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "student" => Ok(Role::Student),
            "staff" => Ok(Role::Staff),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// Represents a principal record from the database.
///
/// # Database Table
///
/// Maps to the `principals` table with columns:
/// - `id`: Subject id (students use this as their student id)
/// - `key_hash`: SHA-256 hash of the API key
/// - `role`: `student`, `staff` or `admin`
/// - `created_at`: When the principal was provisioned
/// - `is_active`: Inactive principals are rejected during authentication
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Principal {
    pub id: Uuid,
    pub key_hash: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
}

/// Authenticated caller, inserted into request extensions by the auth
/// middleware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub subject_id: Uuid,
    pub role: Role,
}

impl Identity {
    pub fn new(subject_id: Uuid, role: Role) -> Self {
        Self { subject_id, role }
    }

    /// Fail with `Forbidden` unless the caller has exactly `role`.
    pub fn require(&self, role: Role) -> Result<(), AppError> {
        if self.role == role {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }

    /// Fail with `Forbidden` unless the caller is admin or staff.
    pub fn require_staff_or_admin(&self) -> Result<(), AppError> {
        match self.role {
            Role::Admin | Role::Staff => Ok(()),
            Role::Student => Err(AppError::Forbidden),
        }
    }
}

impl TryFrom<Principal> for Identity {
    type Error = String;

    fn try_from(principal: Principal) -> Result<Self, Self::Error> {
        Ok(Self::new(principal.id, principal.role.parse()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staff_may_view_but_not_act_as_admin() {
        let staff = Identity::new(Uuid::new_v4(), Role::Staff);
        assert!(staff.require_staff_or_admin().is_ok());
        assert!(matches!(staff.require(Role::Admin), Err(AppError::Forbidden)));
    }

    #[test]
    fn unknown_role_does_not_become_an_identity() {
        let principal = Principal {
            id: Uuid::new_v4(),
            key_hash: String::new(),
            role: "janitor".to_string(),
            created_at: Utc::now(),
            is_active: true,
        };
        assert!(Identity::try_from(principal).is_err());
        assert_eq!("admin".parse::<Role>(), Ok(Role::Admin));
    }

    #[test]
    fn students_cannot_view_facilities() {
        let student = Identity::new(Uuid::new_v4(), Role::Student);
        assert!(student.require(Role::Student).is_ok());
        assert!(matches!(
            student.require_staff_or_admin(),
            Err(AppError::Forbidden)
        ));
    }
}
