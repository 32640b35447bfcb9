use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tracing::{debug, instrument};

use super::dto::{BudgetRange, ClientRequest, ClientResponse};
use crate::{
    api::{
        extract::{IdPath, PathParam, QueryParams, ValidJson},
        response::ApiResponse,
    },
    auth::{jwt::AuthUser, roles},
    error::AppError,
    state::AppState,
};

pub fn client_routes() -> Router<AppState> {
    Router::new()
        .route("/new", post(create_client))
        .route("/:id/update", put(update_client))
        .route("/agent/:agent_id", get(by_agent))
        .route("/fiscal/:fiscal_id", get(by_fiscal_id))
        .route("/budget", get(by_budget))
}

#[instrument(skip_all, fields(by = %user.username))]
pub async fn create_client(
    State(state): State<AppState>,
    user: AuthUser,
    body: Result<ValidJson<ClientRequest>, AppError>,
) -> Result<(StatusCode, Json<ApiResponse<ClientResponse>>), AppError> {
    user.require_any(roles::STAFF)?;
    let ValidJson(req) = body?;
    debug!(name = %req.name, "creating client");
    let record = state.clients.create_client(req, &user.auditor()).await?;
    let response = state.clients.to_response(record).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(response))))
}

#[instrument(skip(state, user, body), fields(by = %user.username))]
pub async fn update_client(
    State(state): State<AppState>,
    user: AuthUser,
    IdPath(id): IdPath,
    body: Result<ValidJson<ClientRequest>, AppError>,
) -> Result<Json<ApiResponse<ClientResponse>>, AppError> {
    user.require_any(roles::STAFF)?;
    let ValidJson(req) = body?;
    let record = state.clients.update_client(id, req, &user.auditor()).await?;
    let response = state.clients.to_response(record).await?;
    Ok(Json(ApiResponse::ok(response)))
}

#[instrument(skip(state, _user))]
pub async fn by_agent(
    State(state): State<AppState>,
    _user: AuthUser,
    PathParam(agent_id): PathParam<i64>,
) -> Result<Json<ApiResponse<Vec<ClientResponse>>>, AppError> {
    let records = state.clients.find_by_agent(agent_id).await?;
    let responses = state.clients.to_responses(records).await?;
    Ok(Json(ApiResponse::ok(responses)))
}

#[instrument(skip(state, _user))]
pub async fn by_fiscal_id(
    State(state): State<AppState>,
    _user: AuthUser,
    PathParam(fiscal_id): PathParam<String>,
) -> Result<Json<ApiResponse<ClientResponse>>, AppError> {
    let record = state.clients.get_by_fiscal_id(&fiscal_id).await?;
    let response = state.clients.to_response(record).await?;
    Ok(Json(ApiResponse::ok(response)))
}

#[instrument(skip(state, _user))]
pub async fn by_budget(
    State(state): State<AppState>,
    _user: AuthUser,
    QueryParams(range): QueryParams<BudgetRange>,
) -> Result<Json<ApiResponse<Vec<ClientResponse>>>, AppError> {
    let records = state.clients.find_by_budget_range(&range).await?;
    let responses = state.clients.to_responses(records).await?;
    Ok(Json(ApiResponse::ok(responses)))
}
