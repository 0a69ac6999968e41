//! API routes

pub mod health;
pub mod messages;
pub mod rooms;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    auth::{require_auth, AuthUser},
    error::{ApiError, ApiResult},
    state::AppState,
    websocket::ws_handler,
};

/// Reject non-agent callers
pub(crate) fn require_agent(user: &AuthUser) -> ApiResult<()> {
    if user.is_agent() {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

/// Create all API routes
pub fn create_router(state: AppState) -> Router {
    // Health check routes (at root level for infrastructure monitoring)
    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness));

    let protected_api_routes = Router::new()
        // Rooms
        .route("/rooms", get(rooms::list_rooms))
        .route("/rooms", post(rooms::create_room))
        .route("/rooms/:room_id/messages", get(rooms::get_messages))
        .route("/rooms/:room_id/messages", post(rooms::send_message))
        .route("/rooms/:room_id/close", post(rooms::close_room))
        .route("/rooms/:room_id/mark-read", post(rooms::mark_read))
        .route("/rooms/:room_id/unread", get(rooms::unread_count))
        .route("/rooms/:room_id/last-seen", get(rooms::last_seen))
        .route("/rooms/:room_id/intents", get(rooms::room_intents))
        // Messages
        .route("/messages/:message_id", delete(messages::delete_message))
        .route("/messages/:message_id/suggestions", post(messages::request_suggestion))
        .route("/messages/:message_id/suggestions", delete(messages::remove_suggestion))
        .route("/messages/:message_id/intents", get(messages::message_intents))
        .route("/messages/:message_id/intents", post(messages::add_intent))
        .route("/messages/:message_id/intent", put(messages::update_intent))
        .route("/messages/:message_id/classify", post(messages::classify_message))
        // Customers
        .route("/customers/:customer_id", delete(rooms::delete_customer));

    // Apply auth middleware to protected routes
    let protected_api_routes = protected_api_routes
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    // WebSocket routes (auth handled in handler via query parameter)
    let websocket_routes = Router::new().route("/ws", get(ws_handler));

    // Combine API routes under /api/v1 prefix
    let api_v1_routes = Router::new()
        .merge(protected_api_routes)
        .merge(websocket_routes);

    Router::new()
        .merge(health_routes)
        .nest("/api/v1", api_v1_routes)
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
