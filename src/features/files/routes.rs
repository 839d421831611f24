use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::features::files::handlers::{
    delete_file, download_file, get_file, get_stats, list_files, upload_files, FilesState,
};

/// Create routes for the files feature
pub fn routes(state: FilesState) -> Router {
    // Room for every file at the size limit plus multipart overhead
    let body_limit = state.upload_service.limits().max_request_body_size();

    Router::new()
        .route(
            "/api/upload",
            post(upload_files).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/api/files", get(list_files))
        .route("/api/files/{id}", get(get_file).delete(delete_file))
        .route("/api/download/{id}", get(download_file))
        .route("/api/stats", get(get_stats))
        .with_state(state)
}
