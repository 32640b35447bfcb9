pub mod dto;
pub mod handlers;
pub mod model;
pub mod services;

use std::sync::Arc;

use axum::Router;

use crate::api::crud::{Access, CrudPolicy, CrudRoutes};
use crate::auth::roles;
use crate::state::AppState;
use model::Client;
pub use services::ClientService;

pub fn router(service: &ClientService) -> Router<AppState> {
    let policy = CrudPolicy {
        create: Access::Disabled("Use POST /api/clients/new with ClientRequest instead"),
        update: Access::Disabled("Use PUT /api/clients/{id}/update with ClientRequest instead"),
        delete: Access::AnyRole(roles::ADMIN_ONLY),
        ..CrudPolicy::default()
    };
    let generic = CrudRoutes::<Client, _>::new(Arc::new(service.entities().clone()), policy);
    Router::new().nest(
        "/api/clients",
        handlers::client_routes().merge(generic.into_router()),
    )
}
