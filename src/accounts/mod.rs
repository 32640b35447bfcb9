pub mod model;

use std::sync::Arc;

use axum::Router;

use crate::api::crud::{Access, CrudPolicy, CrudRoutes};
use crate::auth::roles;
use crate::common::service::EntityService;
use crate::state::AppState;
use model::Account;

pub type AccountService = EntityService<Account>;

pub fn router(service: Arc<AccountService>) -> Router<AppState> {
    let admin = Access::AnyRole(roles::ADMIN_ONLY);
    let policy = CrudPolicy {
        create: admin,
        update: admin,
        delete: admin,
        restore: admin,
        ..CrudPolicy::default()
    };
    Router::new().nest(
        "/api/accounts",
        CrudRoutes::<Account, _>::new(service, policy).into_router(),
    )
}
