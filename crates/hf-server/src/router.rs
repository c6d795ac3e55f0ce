//! Axum router construction.
//!
//! JSON endpoints live under `/api`; everything else falls through to the
//! HLS output tree (`/master.m3u8`, `/low/low.m3u8`, segments).

use axum::extract::Request;
use axum::http::header::{HeaderValue, CACHE_CONTROL, CONTENT_TYPE};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::context::AppContext;
use crate::routes;

const PLAYLIST_MIME: &str = "application/vnd.apple.mpegurl";
const SEGMENT_MIME: &str = "video/mp2t";

/// Build the complete Axum router.
pub fn build_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .route("/status", get(routes::status))
        .route("/tools", get(routes::tools))
        .route("/reseed", post(routes::reseed));

    let hls = ServeDir::new(&ctx.config.output.root);

    Router::new()
        .route("/health", get(routes::health))
        .nest("/api", api)
        .fallback_service(hls)
        .layer(middleware::from_fn(hls_headers))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

/// Correct MIME types for HLS files and keep players from caching
/// playlists that are rewritten on every ingested chunk.
async fn hls_headers(req: Request, next: Next) -> Response {
    let path = req.uri().path().to_owned();
    let mut response = next.run(req).await;
    if !response.status().is_success() {
        return response;
    }

    let headers = response.headers_mut();
    if path.ends_with(".m3u8") {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(PLAYLIST_MIME));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    } else if path.ends_with(".ts") {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(SEGMENT_MIME));
    }
    response
}
