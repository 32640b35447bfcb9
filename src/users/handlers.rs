use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tracing::{instrument, warn};

use super::dto::{UserCreateRequest, UserDto, UserUpdateRequest};
use super::model::User;
use crate::{
    api::{
        extract::{IdPath, PathParam, ValidJson},
        response::ApiResponse,
    },
    auth::{jwt::AuthUser, roles},
    common::{entity::Record, service::Readable},
    error::AppError,
    state::AppState,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(current_user))
        .route("/all", get(all_users))
        .route("/active", get(active_users))
        .route("/username/:username", get(user_by_username))
        .route("/role/:role_name", get(users_by_role))
        .route("/new", post(create_user))
        .route("/:id", get(user_by_id))
        .route("/:id/update", put(update_user))
}

fn dtos(records: Vec<Record<User>>) -> Vec<UserDto> {
    records.into_iter().map(UserDto::from).collect()
}

#[instrument(skip_all, fields(user = %user.username))]
pub async fn current_user(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ApiResponse<UserDto>>, AppError> {
    let record = state.users.get_by_username(&user.username).await?;
    Ok(Json(ApiResponse::ok(record.into())))
}

#[instrument(skip_all)]
pub async fn all_users(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ApiResponse<Vec<UserDto>>>, AppError> {
    user.require_any(roles::ADMIN_ONLY)?;
    let records = state.users.find_all().await?;
    Ok(Json(ApiResponse::ok(dtos(records))))
}

#[instrument(skip_all)]
pub async fn active_users(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ApiResponse<Vec<UserDto>>>, AppError> {
    user.require_any(roles::ADMIN_ONLY)?;
    let records = state.users.find_active_users().await?;
    Ok(Json(ApiResponse::ok(dtos(records))))
}

#[instrument(skip(state, user))]
pub async fn user_by_username(
    State(state): State<AppState>,
    user: AuthUser,
    PathParam(username): PathParam<String>,
) -> Result<Json<ApiResponse<UserDto>>, AppError> {
    user.require_any(roles::ADMIN_ONLY)?;
    let record = state.users.get_by_username(&username).await?;
    Ok(Json(ApiResponse::ok(record.into())))
}

#[instrument(skip(state, user))]
pub async fn users_by_role(
    State(state): State<AppState>,
    user: AuthUser,
    PathParam(role_name): PathParam<String>,
) -> Result<Json<ApiResponse<Vec<UserDto>>>, AppError> {
    user.require_any(roles::ADMIN_ONLY)?;
    let records = state.users.find_by_role(&role_name).await?;
    Ok(Json(ApiResponse::ok(dtos(records))))
}

#[instrument(skip(state, user))]
pub async fn user_by_id(
    State(state): State<AppState>,
    user: AuthUser,
    IdPath(id): IdPath,
) -> Result<Json<ApiResponse<UserDto>>, AppError> {
    user.require_any(roles::ADMIN_ONLY)?;
    let record = state.users.get(id).await?;
    Ok(Json(ApiResponse::ok(record.into())))
}

#[instrument(skip_all, fields(by = %user.username))]
pub async fn create_user(
    State(state): State<AppState>,
    user: AuthUser,
    body: Result<ValidJson<UserCreateRequest>, AppError>,
) -> Result<(StatusCode, Json<ApiResponse<UserDto>>), AppError> {
    user.require_any(roles::ADMIN_ONLY)?;
    let ValidJson(req) = body?;
    let record = state.users.create_user(req, &user.auditor()).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(record.into()))))
}

/// Admins may change anything; a user may change their own email and
/// password but not their roles or active flag.
#[instrument(skip(state, user, body), fields(by = %user.username))]
pub async fn update_user(
    State(state): State<AppState>,
    user: AuthUser,
    IdPath(id): IdPath,
    body: Result<ValidJson<UserUpdateRequest>, AppError>,
) -> Result<Json<ApiResponse<UserDto>>, AppError> {
    user.require_admin_or_self(id)?;
    let ValidJson(req) = body?;
    if !user.is_admin() && req.touches_privileges() {
        warn!(id, "non-admin tried to change roles or active flag");
        return Err(AppError::Forbidden("Access denied".into()));
    }
    let record = state.users.update_user(id, req, &user.auditor()).await?;
    Ok(Json(ApiResponse::ok(record.into())))
}
