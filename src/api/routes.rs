use crate::api::{handlers, AppState};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

/// Build the main API router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health and metrics
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics))
        // Responder surface
        .route("/api/tree", get(handlers::get_tree))
        .route("/api/incidents", post(handlers::create_incident))
        .route("/api/incidents/log", get(handlers::list_incident_log))
        // Administration
        .route(
            "/api/admin/apps",
            get(handlers::list_applications).post(handlers::create_application),
        )
        .route(
            "/api/admin/apps/:id",
            get(handlers::get_application)
                .put(handlers::update_application)
                .delete(handlers::delete_application),
        )
        .route("/api/admin/capabilities", post(handlers::create_capability))
        .route(
            "/api/admin/capabilities/:id",
            get(handlers::get_capability)
                .put(handlers::update_capability)
                .delete(handlers::delete_capability),
        )
        .route("/api/admin/tags", get(handlers::list_tags))
        // Add state
        .with_state(state)
        // Add middleware
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(CorsLayer::permissive())
}
