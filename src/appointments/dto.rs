use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use validator::Validate;

use super::model::{Appointment, AppointmentStatus};
use crate::common::entity::Record;
use crate::error::AppError;

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentCreateRequest {
    pub user_id: Option<i64>,
    pub client_id: Option<i64>,
    pub property_id: Option<i64>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub start_time: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub end_time: Option<OffsetDateTime>,
    #[validate(length(max = 2000, message = "Notes cannot exceed 2000 characters"))]
    pub notes: Option<String>,
    #[validate(length(max = 500, message = "Location cannot exceed 500 characters"))]
    pub location: Option<String>,
    pub status: Option<AppointmentStatus>,
    #[validate(length(max = 500, message = "Title cannot exceed 500 characters"))]
    pub title: Option<String>,
}

impl AppointmentCreateRequest {
    /// Required fields and the time window, judged against `now`.
    pub fn into_appointment(self, now: OffsetDateTime) -> Result<Appointment, AppError> {
        let mut errors = BTreeMap::new();
        if self.user_id.is_none() {
            errors.insert("userId".to_string(), "User ID is required".to_string());
        }
        for (field, label, value) in [
            ("startTime", "Start time", self.start_time),
            ("endTime", "End time", self.end_time),
        ] {
            match value {
                None => {
                    errors.insert(field.to_string(), format!("{} is required", label));
                }
                Some(t) if t <= now => {
                    errors.insert(field.to_string(), format!("{} must be in the future", label));
                }
                Some(_) => {}
            }
        }
        let (Some(user_id), Some(start_time), Some(end_time), true) =
            (self.user_id, self.start_time, self.end_time, errors.is_empty())
        else {
            return Err(AppError::Validation(errors));
        };
        check_window(start_time, end_time)?;

        Ok(Appointment {
            user_id,
            client_id: self.client_id,
            property_id: self.property_id,
            start_time,
            end_time,
            notes: self.notes,
            location: self.location,
            status: self.status.unwrap_or(AppointmentStatus::Scheduled),
            title: self.title,
        })
    }
}

/// Partial update: absent fields are left alone.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentUpdateRequest {
    pub client_id: Option<i64>,
    pub property_id: Option<i64>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub start_time: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub end_time: Option<OffsetDateTime>,
    #[validate(length(max = 2000, message = "Notes cannot exceed 2000 characters"))]
    pub notes: Option<String>,
    #[validate(length(max = 500, message = "Location cannot exceed 500 characters"))]
    pub location: Option<String>,
    pub status: Option<AppointmentStatus>,
    #[validate(length(max = 500, message = "Title cannot exceed 500 characters"))]
    pub title: Option<String>,
}

impl AppointmentUpdateRequest {
    pub fn apply(self, target: &mut Appointment) -> Result<(), AppError> {
        if let Some(start) = self.start_time {
            target.start_time = start;
        }
        if let Some(end) = self.end_time {
            target.end_time = end;
        }
        check_window(target.start_time, target.end_time)?;
        if let Some(client_id) = self.client_id {
            target.client_id = Some(client_id);
        }
        if let Some(property_id) = self.property_id {
            target.property_id = Some(property_id);
        }
        if self.notes.is_some() {
            target.notes = self.notes;
        }
        if self.location.is_some() {
            target.location = self.location;
        }
        if let Some(status) = self.status {
            target.status = status;
        }
        if self.title.is_some() {
            target.title = self.title;
        }
        Ok(())
    }
}

fn check_window(start: OffsetDateTime, end: OffsetDateTime) -> Result<(), AppError> {
    if end <= start {
        return Err(AppError::BadRequest(
            "End time must be after start time".into(),
        ));
    }
    Ok(())
}

/// `?start=&end=` in RFC 3339.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TimeRange {
    #[serde(with = "time::serde::rfc3339")]
    pub start: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentDto {
    pub id: i64,
    pub user_id: i64,
    pub username: Option<String>,
    pub client_id: Option<i64>,
    pub client_name: Option<String>,
    pub property_id: Option<i64>,
    pub property_title: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub start_time: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end_time: OffsetDateTime,
    pub notes: Option<String>,
    pub location: Option<String>,
    pub status: AppointmentStatus,
    pub title: Option<String>,
    pub created_by: String,
    pub updated_by: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Display names of an appointment's relations.
#[derive(Debug, Clone, Default)]
pub struct RelatedNames {
    pub username: Option<String>,
    pub client_name: Option<String>,
    pub property_title: Option<String>,
}

impl AppointmentDto {
    pub fn new(rec: Record<Appointment>, names: RelatedNames) -> Self {
        let a = rec.data;
        Self {
            id: rec.id,
            user_id: a.user_id,
            username: names.username,
            client_id: a.client_id,
            client_name: names.client_name,
            property_id: a.property_id,
            property_title: names.property_title,
            start_time: a.start_time,
            end_time: a.end_time,
            notes: a.notes,
            location: a.location,
            status: a.status,
            title: a.title,
            created_by: rec.audit.created_by,
            updated_by: rec.audit.updated_by,
            created_at: rec.audit.created_at,
            updated_at: rec.audit.updated_at,
        }
    }
}
