use std::path::PathBuf;

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tracing::{debug, instrument};

use super::local::is_safe_segment;
use crate::{api::extract::PathParam, error::AppError, state::AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/uploads/:filename", get(serve_root_file))
        .route("/uploads/:folder/:filename", get(serve_folder_file))
}

#[instrument(skip(state))]
async fn serve_root_file(
    State(state): State<AppState>,
    PathParam(filename): PathParam<String>,
) -> Result<Response, AppError> {
    serve(&state, None, &filename).await
}

#[instrument(skip(state))]
async fn serve_folder_file(
    State(state): State<AppState>,
    PathParam((folder, filename)): PathParam<(String, String)>,
) -> Result<Response, AppError> {
    serve(&state, Some(&folder), &filename).await
}

async fn serve(state: &AppState, folder: Option<&str>, filename: &str) -> Result<Response, AppError> {
    let not_found = || AppError::NotFound(format!("File not found: {}", filename));
    if !is_safe_segment(filename) || folder.map_or(false, |f| !is_safe_segment(f)) {
        return Err(not_found());
    }

    let mut path = PathBuf::from(&state.config.storage.local_base_path);
    if let Some(folder) = folder {
        path.push(folder);
    }
    path.push(filename);

    match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => {}
        Ok(_) => return Err(not_found()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
        Err(e) => {
            return Err(AppError::Storage(
                anyhow::Error::from(e).context(format!("stat {}", path.display())),
            ))
        }
    }

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
        Err(e) => {
            return Err(AppError::Storage(
                anyhow::Error::from(e).context(format!("read {}", path.display())),
            ))
        }
    };

    let mime = mime_guess::from_path(&path).first_or_octet_stream();
    debug!(path = %path.display(), %mime, size = bytes.len(), "serving file");
    Ok((
        [
            (header::CONTENT_TYPE, mime.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{}\"", filename),
            ),
        ],
        bytes,
    )
        .into_response())
}
