use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::common::entity::{Entity, Value};

/// A party that can own properties or act as a client's agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    #[validate(length(min = 1, max = 255, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    pub phone: Option<String>,
    pub role: Option<String>,
}

impl Entity for Account {
    const TABLE: &'static str = "accounts";
    const NAME: &'static str = "Account";
    const COLUMNS: &'static [&'static str] = &["name", "email", "phone", "role"];

    fn values(&self) -> Vec<Value> {
        vec![
            self.name.clone().into(),
            self.email.clone().into(),
            self.phone.clone().into(),
            self.role.clone().into(),
        ]
    }
}
