//! Controller routes plus the common endpoints, bound to shared state.

use super::common_routes;
use crate::controller::Controller;
use crate::state::AppState;
use axum::extract::DefaultBodyLimit;
use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;

/// Maximum accepted request body. Replaces axum's per-extractor default.
pub const BODY_LIMIT_BYTES: usize = 32 * 1024 * 1024;

/// Register every controller and the common routes, then attach `state`.
pub fn api_routes(controllers: impl IntoIterator<Item = Controller>, state: AppState) -> Router {
    let router = controllers
        .into_iter()
        .fold(common_routes(), |router, controller| controller.register(router));
    router
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT_BYTES))
        .with_state(state)
}
