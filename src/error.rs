use std::collections::BTreeMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{error, warn};

use crate::api::response::ApiResponse;

/// Every failure a handler can surface. Services raise these, and
/// `IntoResponse` is the only place they become HTTP.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("Validation failed")]
    Validation(BTreeMap<String, String>),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Conflict(String),
    /// A generic verb switched off in favour of a DTO endpoint.
    #[error("{0}")]
    UnsupportedOperation(String),
    #[error("{0}")]
    NotImplemented(String),
    #[error("storage error: {0:#}")]
    Storage(anyhow::Error),
    #[error("database error: {0}")]
    Database(sqlx::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn not_found(entity: &str, id: i64) -> Self {
        AppError::NotFound(format!("{} not found with id: {}", entity, id))
    }

    /// Single-field validation failure, shaped like the derive-based ones.
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(field.to_string(), message.into());
        AppError::Validation(fields)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_)
            | AppError::Validation(_)
            | AppError::UnsupportedOperation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            AppError::Storage(_) | AppError::Database(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => AppError::NotFound("Entity not found".into()),
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
                let what = db.constraint().unwrap_or("unique constraint").to_string();
                AppError::Conflict(format!("Duplicate value violates {}", what))
            }
            _ => AppError::Database(err),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let fields = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let field = camel_case(&field);
                let message = errs
                    .first()
                    .and_then(|e| e.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| format!("{} is invalid", field));
                (field, message)
            })
            .collect();
        AppError::Validation(fields)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            AppError::Validation(fields) => {
                warn!(?fields, "validation failed");
                ApiResponse {
                    success: false,
                    message: "Validation failed".to_string(),
                    data: Some(serde_json::json!(fields)),
                }
            }
            AppError::Storage(_) | AppError::Database(_) | AppError::Internal(_) => {
                // detail stays in the log, tied to the request span
                error!(error = %self, "request failed");
                ApiResponse::error("Internal Server Error")
            }
            other => {
                warn!(%status, error = %other, "request rejected");
                ApiResponse::error(other.to_string())
            }
        };
        (status, Json(body)).into_response()
    }
}

/// `preferred_budget_min` -> `preferredBudgetMin`
pub fn camel_case(snake: &str) -> String {
    let mut out = String::with_capacity(snake.len());
    let mut upper = false;
    for c in snake.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use validator::Validate;

    #[derive(Validate)]
    struct Probe {
        #[validate(email(message = "Invalid email format"))]
        contact_email: String,
    }

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let res = err.into_response();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn validation_errors_become_camel_case_field_map() {
        let probe = Probe {
            contact_email: "nope".into(),
        };
        let err: AppError = probe.validate().unwrap_err().into();
        let (status, json) = body_json(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "Validation failed");
        assert_eq!(json["data"]["contactEmail"], "Invalid email format");
    }

    #[tokio::test]
    async fn internal_errors_hide_detail() {
        let err = AppError::Internal(anyhow::anyhow!("connection refused on 10.0.0.3"));
        let (status, json) = body_json(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["message"], "Internal Server Error");
        assert!(json["data"].is_null());
    }

    #[tokio::test]
    async fn status_mapping() {
        assert_eq!(AppError::not_found("Property", 7).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::UnsupportedOperation("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::NotImplemented("x".into()).status(),
            StatusCode::NOT_IMPLEMENTED
        );
        assert_eq!(AppError::Forbidden("x".into()).status(), StatusCode::FORBIDDEN);
        let (_, json) = body_json(AppError::not_found("Property", 7)).await;
        assert_eq!(json["message"], "Property not found with id: 7");
    }

    #[test]
    fn camel_case_conversion() {
        assert_eq!(camel_case("preferred_budget_min"), "preferredBudgetMin");
        assert_eq!(camel_case("title"), "title");
    }
}
