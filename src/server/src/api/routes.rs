//! API Route Definitions

use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers::get_status;
use super::safe::SafeHandler;
use crate::events::EventEmitter;

/// Create all API routes.
///
/// `GET /` is the only registered route; everything else, including other
/// methods on `/`, falls through to a handler-less wrapper that answers `500`.
pub fn create_routes(events: Arc<EventEmitter>) -> Router {
    let unmatched = SafeHandler::none(Arc::clone(&events));

    Router::new()
        .route(
            "/",
            SafeHandler::new(get_status, Arc::clone(&events))
                .into_get()
                .fallback_service(unmatched.clone().into_any::<()>()),
        )
        .fallback_service(unmatched.into_any::<()>())
        .layer(TraceLayer::new_for_http())
}
