pub mod dto;
pub mod handlers;
pub mod model;
pub mod services;

use std::sync::Arc;

use axum::Router;

use crate::api::crud::{Access, CrudPolicy, CrudRoutes, Verb};
use crate::auth::roles;
use crate::state::AppState;
use model::User;
pub use services::UserService;

pub fn router(service: Arc<UserService>) -> Router<AppState> {
    let admin = Access::AnyRole(roles::ADMIN_ONLY);
    let policy = CrudPolicy {
        create: Access::Disabled("Use POST /api/users/new with UserCreateRequest instead"),
        list: admin,
        get: admin,
        update: Access::Disabled("Use PUT /api/users/{id}/update with UserUpdateRequest instead"),
        delete: admin,
        restore: admin,
        omit: &[Verb::Get],
    };
    Router::new().nest(
        "/api/users",
        handlers::user_routes().merge(CrudRoutes::<User, _>::new(service, policy).into_router()),
    )
}
