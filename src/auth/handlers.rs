use axum::{
    extract::{FromRef, State},
    routing::post,
    Json, Router,
};
use tracing::{error, info, instrument, warn};

use super::{
    dto::{AuthResponse, LoginRequest, RefreshRequest, TOKEN_TYPE},
    jwt::{JwtKeys, TokenSubject},
    password::{verify_against_dummy, verify_password},
};
use crate::{
    api::{extract::ValidJson, response::ApiResponse},
    common::entity::Record,
    error::AppError,
    state::AppState,
    users::model::User,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
}

fn invalid_credentials() -> AppError {
    AppError::Unauthorized("Invalid username or password".into())
}

fn issue_tokens(keys: &JwtKeys, user: Record<User>) -> Result<AuthResponse, AppError> {
    let subject = TokenSubject {
        user_id: user.id,
        username: user.data.username.clone(),
        roles: user.data.roles.clone(),
    };
    let token = keys.sign_access(&subject).map_err(|e| {
        error!(error = %e, "jwt sign access failed");
        AppError::Internal(e)
    })?;
    let refresh_token = keys.sign_refresh(&subject).map_err(|e| {
        error!(error = %e, "jwt sign refresh failed");
        AppError::Internal(e)
    })?;
    Ok(AuthResponse {
        token,
        refresh_token,
        token_type: TOKEN_TYPE,
        user_id: user.id,
        username: user.data.username,
        email: user.data.email,
        roles: user.data.roles,
    })
}

#[instrument(skip(state, payload), fields(username = %payload.username))]
pub async fn login(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<LoginRequest>,
) -> Result<Json<ApiResponse<AuthResponse>>, AppError> {
    let username = payload.username.trim();

    let user = match state.users.find_by_username(username).await? {
        Some(u) => u,
        None => {
            verify_against_dummy(&payload.password);
            warn!("login unknown username");
            return Err(invalid_credentials());
        }
    };

    if !verify_password(&payload.password, &user.data.password_hash) {
        warn!(user_id = user.id, "login invalid password");
        return Err(invalid_credentials());
    }

    if !user.data.active {
        warn!(user_id = user.id, "login on inactive account");
        return Err(AppError::Unauthorized("User account is disabled".into()));
    }

    let keys = JwtKeys::from_ref(&state);
    let user_id = user.id;
    let response = issue_tokens(&keys, user)?;
    info!(user_id, "user logged in");
    Ok(Json(ApiResponse::ok(response)))
}

/// Trades a refresh token for a new pair. Roles are re-read so a role
/// change takes effect on the next refresh.
#[instrument(skip_all)]
pub async fn refresh(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<RefreshRequest>,
) -> Result<Json<ApiResponse<AuthResponse>>, AppError> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys.verify_refresh(&payload.refresh_token).map_err(|e| {
        warn!(error = %e, "refresh rejected");
        AppError::Unauthorized("Invalid or expired refresh token".into())
    })?;

    let user = state
        .users
        .find_by_username(&claims.sub)
        .await?
        .filter(|u| u.id == claims.uid && u.data.active)
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;

    let response = issue_tokens(&keys, user)?;
    info!(user_id = claims.uid, "tokens refreshed");
    Ok(Json(ApiResponse::ok(response)))
}
