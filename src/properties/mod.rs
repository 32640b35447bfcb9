pub mod dto;
pub mod handlers;
pub mod images;
pub mod model;
pub mod services;

use std::sync::Arc;

use axum::Router;

use crate::api::crud::{Access, CrudPolicy, CrudRoutes};
use crate::auth::roles;
use crate::state::AppState;
pub use images::PropertyImageService;
use model::Property;
pub use services::PropertyService;

pub fn router(service: &PropertyService) -> Router<AppState> {
    let policy = CrudPolicy {
        create: Access::Disabled("Use POST /api/properties/new with PropertyRequest instead"),
        update: Access::Disabled(
            "Use PUT /api/properties/{id}/update with PropertyRequest instead",
        ),
        delete: Access::AnyRole(roles::ADMIN_ONLY),
        ..CrudPolicy::default()
    };
    let generic = CrudRoutes::<Property, _>::new(Arc::new(service.entities().clone()), policy);
    Router::new().nest(
        "/api/properties",
        handlers::property_routes()
            .merge(handlers::image_routes())
            .merge(generic.into_router()),
    )
}
