use std::net::SocketAddr;

use axum::{
    extract::Request,
    http::HeaderValue,
    middleware::{self, Next},
    response::Response,
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::Instrument;
use uuid::Uuid;

use crate::state::AppState;
use crate::{accounts, api, appointments, auth, categories, clients, properties, storage, users};

pub const CORRELATION_HEADER: &str = "x-correlation-id";

/// Id of the current request, as received or generated.
#[derive(Debug, Clone)]
pub struct CorrelationId(pub String);

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(api::health::router())
        .merge(auth::router())
        .merge(users::router(state.users.clone()))
        .merge(accounts::router(state.accounts.clone()))
        .merge(categories::router(state.categories.clone()))
        .merge(properties::router(&state.properties))
        .merge(clients::router(&state.clients))
        .merge(appointments::router(&state.appointments))
        .merge(storage::handlers::router())
        .with_state(state)
        .layer(middleware::from_fn(correlation_id))
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!(
                        "http_request",
                        %method,
                        uri = %uri,
                        status = tracing::field::Empty
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        )
}

/// Runs the request inside a span carrying its correlation id and echoes
/// the id back. Blank or missing ids are replaced by a fresh UUID.
async fn correlation_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get(CORRELATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    req.extensions_mut().insert(CorrelationId(id.clone()));
    let span = tracing::info_span!("correlation_id", correlation_id = %id);
    let mut res = next.run(req).instrument(span).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        res.headers_mut().insert(CORRELATION_HEADER, value);
    }
    res
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "8080".into())
    )
    .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
