use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::common::entity::{Entity, Value};

/// A login. `roles` holds role names (`ROLE_*`) and is what goes into tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, Validate)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[validate(length(min = 3, max = 50, message = "Username must be between 3 and 50 characters"))]
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    pub active: bool,
    pub roles: Vec<String>,
}

impl User {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

impl Entity for User {
    const TABLE: &'static str = "users";
    const NAME: &'static str = "User";
    const COLUMNS: &'static [&'static str] =
        &["username", "password_hash", "email", "active", "roles"];

    fn values(&self) -> Vec<Value> {
        vec![
            self.username.clone().into(),
            self.password_hash.clone().into(),
            self.email.clone().into(),
            self.active.into(),
            self.roles.clone().into(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    #[validate(length(min = 1, max = 50))]
    pub name: String,
}

impl Entity for Role {
    const TABLE: &'static str = "roles";
    const NAME: &'static str = "Role";
    const COLUMNS: &'static [&'static str] = &["name"];

    fn values(&self) -> Vec<Value> {
        vec![self.name.clone().into()]
    }
}
