use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use validator::Validate;

use crate::common::entity::{text_enum, Entity, Value};

text_enum!(AppointmentStatus {
    Scheduled => "SCHEDULED",
    Completed => "COMPLETED",
    Cancelled => "CANCELLED",
    NoShow => "NO_SHOW",
});

/// A visit or meeting booked for one user, optionally with a client and
/// about a property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    /// Owner of the appointment.
    pub user_id: i64,
    pub client_id: Option<i64>,
    pub property_id: Option<i64>,
    #[serde(with = "time::serde::rfc3339")]
    pub start_time: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end_time: OffsetDateTime,
    #[validate(length(max = 2000, message = "Notes cannot exceed 2000 characters"))]
    pub notes: Option<String>,
    #[validate(length(max = 500, message = "Location cannot exceed 500 characters"))]
    pub location: Option<String>,
    pub status: AppointmentStatus,
    #[validate(length(max = 500, message = "Title cannot exceed 500 characters"))]
    pub title: Option<String>,
}

impl Entity for Appointment {
    const TABLE: &'static str = "appointments";
    const NAME: &'static str = "Appointment";
    const COLUMNS: &'static [&'static str] = &[
        "user_id",
        "client_id",
        "property_id",
        "start_time",
        "end_time",
        "notes",
        "location",
        "status",
        "title",
    ];

    fn values(&self) -> Vec<Value> {
        vec![
            self.user_id.into(),
            self.client_id.into(),
            self.property_id.into(),
            self.start_time.into(),
            self.end_time.into(),
            self.notes.clone().into(),
            self.location.clone().into(),
            self.status.into(),
            self.title.clone().into(),
        ]
    }
}
