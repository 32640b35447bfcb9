use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::common::entity::{Entity, Value};

/// A prospective buyer or tenant and what they are looking for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    #[validate(length(min = 1, max = 255, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub fiscal_id: Option<String>,
    pub address: Option<String>,
    pub preferred_budget_min: Option<Decimal>,
    pub preferred_budget_max: Option<Decimal>,
    /// Comma separated.
    #[validate(length(max = 1000))]
    pub preferred_locations: Option<String>,
    #[validate(length(max = 500))]
    pub preferred_property_types: Option<String>,
    pub preferred_size_min: Option<f64>,
    pub preferred_size_max: Option<f64>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    /// Account acting as the client's agent.
    pub assigned_agent_id: Option<i64>,
}

impl Entity for Client {
    const TABLE: &'static str = "clients";
    const NAME: &'static str = "Client";
    const COLUMNS: &'static [&'static str] = &[
        "name",
        "email",
        "phone",
        "fiscal_id",
        "address",
        "preferred_budget_min",
        "preferred_budget_max",
        "preferred_locations",
        "preferred_property_types",
        "preferred_size_min",
        "preferred_size_max",
        "notes",
        "assigned_agent_id",
    ];

    fn values(&self) -> Vec<Value> {
        vec![
            self.name.clone().into(),
            self.email.clone().into(),
            self.phone.clone().into(),
            self.fiscal_id.clone().into(),
            self.address.clone().into(),
            self.preferred_budget_min.into(),
            self.preferred_budget_max.into(),
            self.preferred_locations.clone().into(),
            self.preferred_property_types.clone().into(),
            self.preferred_size_min.into(),
            self.preferred_size_max.into(),
            self.notes.clone().into(),
            self.assigned_agent_id.into(),
        ]
    }
}
