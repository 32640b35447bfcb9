use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use validator::Validate;

use super::model::Client;
use crate::common::entity::Record;
use crate::error::AppError;

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ClientRequest {
    #[serde(default)]
    #[validate(length(min = 1, max = 255, message = "Name is required"))]
    pub name: String,
    #[serde(default)]
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Phone is required"))]
    pub phone: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Fiscal ID is required"))]
    pub fiscal_id: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Address is required"))]
    pub address: String,
    pub preferred_budget_min: Option<Decimal>,
    pub preferred_budget_max: Option<Decimal>,
    #[validate(length(max = 1000))]
    pub preferred_locations: Option<String>,
    #[validate(length(max = 500))]
    pub preferred_property_types: Option<String>,
    pub preferred_size_min: Option<f64>,
    pub preferred_size_max: Option<f64>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    pub assigned_agent_id: Option<i64>,
}

impl ClientRequest {
    /// Blank-only strings count as missing; ranges must not be inverted.
    pub fn check(&self) -> Result<(), AppError> {
        for (field, value, message) in [
            ("name", &self.name, "Name is required"),
            ("phone", &self.phone, "Phone is required"),
            ("fiscalId", &self.fiscal_id, "Fiscal ID is required"),
            ("address", &self.address, "Address is required"),
        ] {
            if value.trim().is_empty() {
                return Err(AppError::invalid(field, message));
            }
        }
        if let (Some(min), Some(max)) = (self.preferred_budget_min, self.preferred_budget_max) {
            if min > max {
                return Err(AppError::invalid(
                    "preferredBudgetMin",
                    "Minimum budget cannot exceed maximum budget",
                ));
            }
        }
        if let (Some(min), Some(max)) = (self.preferred_size_min, self.preferred_size_max) {
            if min > max {
                return Err(AppError::invalid(
                    "preferredSizeMin",
                    "Minimum size cannot exceed maximum size",
                ));
            }
        }
        Ok(())
    }

    pub fn into_client(self) -> Client {
        Client {
            name: self.name.trim().to_string(),
            email: Some(self.email.trim().to_string()),
            phone: Some(self.phone.trim().to_string()),
            fiscal_id: Some(self.fiscal_id.trim().to_string()),
            address: Some(self.address),
            preferred_budget_min: self.preferred_budget_min,
            preferred_budget_max: self.preferred_budget_max,
            preferred_locations: self.preferred_locations,
            preferred_property_types: self.preferred_property_types,
            preferred_size_min: self.preferred_size_min,
            preferred_size_max: self.preferred_size_max,
            notes: self.notes,
            assigned_agent_id: self.assigned_agent_id,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientResponse {
    pub id: i64,
    #[serde(flatten)]
    pub client: Client,
    pub assigned_agent_name: Option<String>,
    pub created_by: String,
    pub updated_by: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl ClientResponse {
    pub fn new(rec: Record<Client>, assigned_agent_name: Option<String>) -> Self {
        Self {
            id: rec.id,
            client: rec.data,
            assigned_agent_name,
            created_by: rec.audit.created_by,
            updated_by: rec.audit.updated_by,
            created_at: rec.audit.created_at,
            updated_at: rec.audit.updated_at,
        }
    }
}

/// `?min=&max=`
#[derive(Debug, Clone, Deserialize)]
pub struct BudgetRange {
    pub min: Decimal,
    pub max: Decimal,
}
