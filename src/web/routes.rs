use super::handlers;
use super::state::AppState;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, patch, post};
use axum::Router;
use std::sync::Arc;

/// Slack on top of the file limit for multipart boundaries and the name field.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn media_routes(max_upload_bytes: usize) -> Router<Arc<AppState>> {
    let router = Router::new()
        .route("/api/media", get(handlers::media::list_library))
        .route("/api/media/:type", get(handlers::media::list_collection))
        .route("/api/media/:type/reorder", patch(handlers::media::reorder))
        .route("/api/media/:type/:id/rename", patch(handlers::media::rename))
        .route("/api/media/:type/:id", axum::routing::delete(handlers::media::delete))
        .route(
            "/api/upload",
            post(handlers::media::upload)
                .layer(DefaultBodyLimit::max(max_upload_bytes.saturating_add(MULTIPART_OVERHEAD))),
        );

    #[cfg(feature = "remote-upload")]
    let router = router.route("/api/upload-url", post(handlers::media::upload_url));

    router
}

pub fn text_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/text",
            get(handlers::text::list).post(handlers::text::create),
        )
        .route("/api/text/reorder", patch(handlers::text::reorder))
        .route(
            "/api/text/:id",
            get(handlers::text::get)
                .patch(handlers::text::update)
                .delete(handlers::text::delete),
        )
        .route("/api/text/:id/rename", patch(handlers::text::rename))
}

pub fn realtime_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ws", get(handlers::realtime::websocket))
        .route("/api/events", get(handlers::realtime::event_stream))
}

pub fn misc_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/search", get(handlers::search_library))
}
