use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use validator::Validate;

use super::model::User;
use crate::common::entity::Record;

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UserCreateRequest {
    #[serde(default)]
    #[validate(length(min = 3, max = 50, message = "Username must be between 3 and 50 characters"))]
    pub username: String,
    #[serde(default)]
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[serde(default)]
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[serde(default = "default_active")]
    pub active: bool,
    /// `AGENT` or `ROLE_AGENT`; empty means the default role.
    #[serde(default)]
    pub role_names: Vec<String>,
}

/// Every field optional; `None` leaves the stored value alone. A blank
/// password is ignored too.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdateRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    pub password: Option<String>,
    pub active: Option<bool>,
    pub role_names: Option<Vec<String>>,
}

impl UserUpdateRequest {
    /// Fields only an administrator may change.
    pub fn touches_privileges(&self) -> bool {
        self.active.is_some() || self.role_names.is_some()
    }
}

/// What the API shows of a user. Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub active: bool,
    pub roles: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub created_by: String,
    pub updated_by: String,
}

impl From<Record<User>> for UserDto {
    fn from(rec: Record<User>) -> Self {
        Self {
            id: rec.id,
            username: rec.data.username,
            email: rec.data.email,
            active: rec.data.active,
            roles: rec.data.roles,
            created_at: rec.audit.created_at,
            updated_at: rec.audit.updated_at,
            created_by: rec.audit.created_by,
            updated_by: rec.audit.updated_by,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_request_defaults() {
        let req: UserCreateRequest =
            serde_json::from_str(r#"{"username":"maria","password":"longenough","email":"m@x.pt"}"#)
                .unwrap();
        assert!(req.active);
        assert!(req.role_names.is_empty());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn create_request_reports_each_bad_field() {
        let req: UserCreateRequest =
            serde_json::from_str(r#"{"username":"ab","password":"short","email":"nope"}"#).unwrap();
        let err = req.validate().unwrap_err();
        let fields = err.field_errors();
        assert!(fields.contains_key("username"));
        assert!(fields.contains_key("password"));
        assert!(fields.contains_key("email"));
    }

    #[test]
    fn update_request_privileged_fields() {
        let req: UserUpdateRequest = serde_json::from_str(r#"{"email":"a@b.pt"}"#).unwrap();
        assert!(!req.touches_privileges());
        let req: UserUpdateRequest = serde_json::from_str(r#"{"roleNames":["ADMIN"]}"#).unwrap();
        assert!(req.touches_privileges());
    }
}
