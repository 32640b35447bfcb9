use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use tracing::{info, instrument};

use super::dto::{AppointmentCreateRequest, AppointmentDto, AppointmentUpdateRequest, TimeRange};
use super::model::AppointmentStatus;
use crate::{
    api::{
        extract::{IdPath, PathParam, QueryParams, ValidJson},
        response::ApiResponse,
    },
    auth::jwt::AuthUser,
    error::AppError,
    state::AppState,
};

type DtoList = Json<ApiResponse<Vec<AppointmentDto>>>;

pub fn appointment_routes() -> Router<AppState> {
    Router::new()
        .route("/create", post(create_appointment))
        .route("/:id/update", put(update_appointment))
        .route("/:id/delete", delete(delete_appointment))
        .route("/me", get(mine))
        .route("/me/upcoming", get(mine_upcoming))
        .route("/me/past", get(mine_past))
        .route("/user/:user_id", get(by_user))
        .route("/user/:user_id/range", get(by_user_in_range))
        .route("/client/:client_id", get(by_client))
        .route("/property/:property_id", get(by_property))
        .route("/status/:status", get(by_status))
        .route("/range", get(in_range))
}

#[instrument(skip_all, fields(by = %user.username))]
pub async fn create_appointment(
    State(state): State<AppState>,
    user: AuthUser,
    body: Result<ValidJson<AppointmentCreateRequest>, AppError>,
) -> Result<(StatusCode, Json<ApiResponse<AppointmentDto>>), AppError> {
    let ValidJson(req) = body?;
    let record = state
        .appointments
        .create_appointment(req, &user.auditor())
        .await?;
    let dto = state.appointments.to_dto(record).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(dto))))
}

#[instrument(skip(state, user, body), fields(by = %user.username))]
pub async fn update_appointment(
    State(state): State<AppState>,
    user: AuthUser,
    IdPath(id): IdPath,
    body: Result<ValidJson<AppointmentUpdateRequest>, AppError>,
) -> Result<Json<ApiResponse<AppointmentDto>>, AppError> {
    let current = state.appointments.get(id).await?;
    user.require_admin_or_self(current.data.user_id)?;
    let ValidJson(req) = body?;
    let record = state
        .appointments
        .update_appointment(id, req, &user.auditor())
        .await?;
    let dto = state.appointments.to_dto(record).await?;
    Ok(Json(ApiResponse::ok(dto)))
}

#[instrument(skip(state, user), fields(by = %user.username))]
pub async fn delete_appointment(
    State(state): State<AppState>,
    user: AuthUser,
    IdPath(id): IdPath,
) -> Result<Json<ApiResponse<()>>, AppError> {
    let current = state.appointments.get(id).await?;
    user.require_admin_or_self(current.data.user_id)?;
    state
        .appointments
        .delete_appointment(id, &user.auditor())
        .await?;
    info!(id, "appointment deleted");
    Ok(Json(ApiResponse::empty()))
}

pub async fn mine(State(state): State<AppState>, user: AuthUser) -> Result<DtoList, AppError> {
    let records = state.appointments.find_by_user(user.user_id).await?;
    Ok(Json(ApiResponse::ok(state.appointments.to_dtos(records).await?)))
}

pub async fn mine_upcoming(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<DtoList, AppError> {
    let records = state.appointments.find_upcoming_by_user(user.user_id).await?;
    Ok(Json(ApiResponse::ok(state.appointments.to_dtos(records).await?)))
}

pub async fn mine_past(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<DtoList, AppError> {
    let records = state.appointments.find_past_by_user(user.user_id).await?;
    Ok(Json(ApiResponse::ok(state.appointments.to_dtos(records).await?)))
}

#[instrument(skip(state, user))]
pub async fn by_user(
    State(state): State<AppState>,
    user: AuthUser,
    PathParam(user_id): PathParam<i64>,
) -> Result<DtoList, AppError> {
    user.require_admin_or_self(user_id)?;
    let records = state.appointments.find_by_user(user_id).await?;
    Ok(Json(ApiResponse::ok(state.appointments.to_dtos(records).await?)))
}

#[instrument(skip(state, user, range))]
pub async fn by_user_in_range(
    State(state): State<AppState>,
    user: AuthUser,
    PathParam(user_id): PathParam<i64>,
    QueryParams(range): QueryParams<TimeRange>,
) -> Result<DtoList, AppError> {
    user.require_admin_or_self(user_id)?;
    let records = state
        .appointments
        .find_by_user_and_date_range(user_id, &range)
        .await?;
    Ok(Json(ApiResponse::ok(state.appointments.to_dtos(records).await?)))
}

pub async fn by_client(
    State(state): State<AppState>,
    _user: AuthUser,
    PathParam(client_id): PathParam<i64>,
) -> Result<DtoList, AppError> {
    let records = state.appointments.find_by_client(client_id).await?;
    Ok(Json(ApiResponse::ok(state.appointments.to_dtos(records).await?)))
}

pub async fn by_property(
    State(state): State<AppState>,
    _user: AuthUser,
    PathParam(property_id): PathParam<i64>,
) -> Result<DtoList, AppError> {
    let records = state.appointments.find_by_property(property_id).await?;
    Ok(Json(ApiResponse::ok(state.appointments.to_dtos(records).await?)))
}

pub async fn by_status(
    State(state): State<AppState>,
    _user: AuthUser,
    PathParam(status): PathParam<String>,
) -> Result<DtoList, AppError> {
    let status: AppointmentStatus = status
        .parse()
        .map_err(|e: crate::common::entity::UnknownVariant| AppError::BadRequest(e.to_string()))?;
    let records = state.appointments.find_by_status(status).await?;
    Ok(Json(ApiResponse::ok(state.appointments.to_dtos(records).await?)))
}

pub async fn in_range(
    State(state): State<AppState>,
    _user: AuthUser,
    QueryParams(range): QueryParams<TimeRange>,
) -> Result<DtoList, AppError> {
    let records = state.appointments.find_by_date_range(&range).await?;
    Ok(Json(ApiResponse::ok(state.appointments.to_dtos(records).await?)))
}
