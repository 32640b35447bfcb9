use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::common::entity::{Entity, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    #[validate(length(min = 1, max = 255, message = "Name is required"))]
    pub name: String,
    #[validate(length(max = 1000, message = "Description cannot exceed 1000 characters"))]
    pub description: Option<String>,
}

impl Entity for Category {
    const TABLE: &'static str = "categories";
    const NAME: &'static str = "Category";
    const COLUMNS: &'static [&'static str] = &["name", "description"];

    fn values(&self) -> Vec<Value> {
        vec![self.name.clone().into(), self.description.clone().into()]
    }
}
