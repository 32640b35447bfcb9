pub mod model;

use std::sync::Arc;

use axum::Router;

use crate::api::crud::{Access, CrudPolicy, CrudRoutes};
use crate::auth::roles;
use crate::common::service::EntityService;
use crate::state::AppState;
use model::Category;

pub type CategoryService = EntityService<Category>;

pub fn router(service: Arc<CategoryService>) -> Router<AppState> {
    let policy = CrudPolicy {
        create: Access::AnyRole(roles::ADMIN_ONLY),
        update: Access::AnyRole(roles::ADMIN_ONLY),
        delete: Access::AnyRole(roles::ADMIN_ONLY),
        restore: Access::AnyRole(roles::ADMIN_ONLY),
        ..CrudPolicy::default()
    };
    Router::new().nest(
        "/api/categories",
        CrudRoutes::<Category, _>::new(service, policy).into_router(),
    )
}
