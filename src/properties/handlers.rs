use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;
use tracing::{debug, info, instrument};

use super::dto::{PriceRange, PropertyRequest, PropertyResponse};
use crate::{
    api::{
        extract::{IdPath, PathParam, QueryParams, ValidJson},
        response::ApiResponse,
    },
    auth::{jwt::AuthUser, roles},
    error::AppError,
    state::AppState,
    storage::FileUpload,
};

/// Whole multipart body: ten images of up to 10MB plus framing.
const UPLOAD_BODY_LIMIT: usize = 110 * 1024 * 1024;

pub fn property_routes() -> Router<AppState> {
    Router::new()
        .route("/new", post(create_property))
        .route("/:id/update", put(update_property))
        .route("/owner/:owner_id", get(by_owner))
        .route("/category/:category_id", get(by_category))
        .route("/price", get(by_price))
}

pub fn image_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/:id/images",
            post(upload_images)
                .delete(delete_image)
                .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/:id/images/main", put(set_main_image))
        .route("/:id/images/all", delete(delete_all_images))
}

#[instrument(skip_all, fields(by = %user.username))]
pub async fn create_property(
    State(state): State<AppState>,
    user: AuthUser,
    body: Result<ValidJson<PropertyRequest>, AppError>,
) -> Result<(StatusCode, Json<ApiResponse<PropertyResponse>>), AppError> {
    user.require_any(roles::STAFF)?;
    let ValidJson(req) = body?;
    debug!(title = %req.title, "creating property");
    let record = state.properties.create_property(req, &user.auditor()).await?;
    let response = state.properties.to_response(record).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(response))))
}

#[instrument(skip(state, user, body), fields(by = %user.username))]
pub async fn update_property(
    State(state): State<AppState>,
    user: AuthUser,
    IdPath(id): IdPath,
    body: Result<ValidJson<PropertyRequest>, AppError>,
) -> Result<Json<ApiResponse<PropertyResponse>>, AppError> {
    user.require_any(roles::STAFF)?;
    let ValidJson(req) = body?;
    let record = state
        .properties
        .update_property(id, req, &user.auditor())
        .await?;
    let response = state.properties.to_response(record).await?;
    Ok(Json(ApiResponse::ok(response)))
}

#[instrument(skip(state, _user))]
pub async fn by_owner(
    State(state): State<AppState>,
    _user: AuthUser,
    PathParam(owner_id): PathParam<i64>,
) -> Result<Json<ApiResponse<Vec<PropertyResponse>>>, AppError> {
    let records = state.properties.find_by_owner(owner_id).await?;
    let responses = state.properties.to_responses(records).await?;
    Ok(Json(ApiResponse::ok(responses)))
}

#[instrument(skip(state, _user))]
pub async fn by_category(
    State(state): State<AppState>,
    _user: AuthUser,
    PathParam(category_id): PathParam<i64>,
) -> Result<Json<ApiResponse<Vec<PropertyResponse>>>, AppError> {
    let records = state.properties.find_by_category(category_id).await?;
    let responses = state.properties.to_responses(records).await?;
    Ok(Json(ApiResponse::ok(responses)))
}

#[instrument(skip(state, _user))]
pub async fn by_price(
    State(state): State<AppState>,
    _user: AuthUser,
    QueryParams(range): QueryParams<PriceRange>,
) -> Result<Json<ApiResponse<Vec<PropertyResponse>>>, AppError> {
    let records = state.properties.find_by_price_range(&range).await?;
    let responses = state.properties.to_responses(records).await?;
    Ok(Json(ApiResponse::ok(responses)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadParams {
    pub set_as_main: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageUrlParam {
    pub image_url: String,
}

/// POST /:id/images (multipart)
/// Field: files (repeatable). `setAsMain` may come as a query parameter
/// or a form field and defaults to true.
#[instrument(skip(state, user, mp), fields(by = %user.username))]
pub async fn upload_images(
    State(state): State<AppState>,
    user: AuthUser,
    IdPath(id): IdPath,
    QueryParams(params): QueryParams<UploadParams>,
    mp: Result<Multipart, MultipartRejection>,
) -> Result<Json<ApiResponse<Vec<String>>>, AppError> {
    user.require_any(roles::STAFF)?;
    let mut mp = mp.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let mut files: Vec<FileUpload> = Vec::new();
    let mut set_as_main = params.set_as_main;
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        match field.name() {
            Some("files") | Some("files[]") => {
                let filename = field.file_name().map(|s| s.to_string());
                let content_type = field.content_type().map(|s| s.to_string());
                let body = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.body_text()))?;
                files.push(FileUpload {
                    filename,
                    content_type,
                    body,
                });
            }
            Some("setAsMain") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.body_text()))?;
                set_as_main = Some(text.trim().eq_ignore_ascii_case("true"));
            }
            _ => {}
        }
    }

    let urls = state
        .property_images
        .upload_images(id, files, set_as_main.unwrap_or(true), &user.auditor())
        .await?;
    info!(id, count = urls.len(), "uploaded property images");
    Ok(Json(ApiResponse::ok(urls)))
}

#[instrument(skip(state, user), fields(by = %user.username))]
pub async fn set_main_image(
    State(state): State<AppState>,
    user: AuthUser,
    IdPath(id): IdPath,
    QueryParams(param): QueryParams<ImageUrlParam>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    user.require_any(roles::STAFF)?;
    state
        .property_images
        .set_main_image(id, &param.image_url, &user.auditor())
        .await?;
    Ok(Json(ApiResponse::empty()))
}

#[instrument(skip(state, user), fields(by = %user.username))]
pub async fn delete_image(
    State(state): State<AppState>,
    user: AuthUser,
    IdPath(id): IdPath,
    QueryParams(param): QueryParams<ImageUrlParam>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    user.require_any(roles::STAFF)?;
    state
        .property_images
        .delete_image(id, &param.image_url, &user.auditor())
        .await?;
    Ok(Json(ApiResponse::empty()))
}

#[instrument(skip(state, user), fields(by = %user.username))]
pub async fn delete_all_images(
    State(state): State<AppState>,
    user: AuthUser,
    IdPath(id): IdPath,
) -> Result<Json<ApiResponse<()>>, AppError> {
    user.require_any(roles::STAFF)?;
    state
        .property_images
        .delete_all_images(id, &user.auditor())
        .await?;
    Ok(Json(ApiResponse::empty()))
}
