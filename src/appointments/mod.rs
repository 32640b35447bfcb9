pub mod dto;
pub mod handlers;
pub mod model;
pub mod services;

use std::sync::Arc;

use axum::Router;

use crate::api::crud::{Access, CrudPolicy, CrudRoutes};
use crate::state::AppState;
use model::Appointment;
pub use services::AppointmentService;

pub fn router(service: &AppointmentService) -> Router<AppState> {
    let policy = CrudPolicy {
        create: Access::Disabled(
            "Use POST /api/appointments/create with AppointmentCreateRequest instead",
        ),
        update: Access::Disabled(
            "Use PUT /api/appointments/{id}/update with AppointmentUpdateRequest instead",
        ),
        delete: Access::Disabled("Use DELETE /api/appointments/{id}/delete instead"),
        ..CrudPolicy::default()
    };
    let generic =
        CrudRoutes::<Appointment, _>::new(Arc::new(service.entities().clone()), policy);
    Router::new().nest(
        "/api/appointments",
        handlers::appointment_routes().merge(generic.into_router()),
    )
}
