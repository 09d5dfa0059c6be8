// routes.rs
use axum::routing::{get, post};
use axum::Router;
use http::Method;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};

use crate::handlers;

pub fn create_routes(pool: SqlitePool) -> Router {
    // The voting page and the admin dashboard live on a different origin
    // than this API.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(Any);

    Router::new()
        .route("/api/polls/{poll_id}", get(handlers::get_poll))
        .route("/api/polls/{poll_id}/vote", post(handlers::vote))
        .route("/api/contacts", post(handlers::create_contact))
        .route(
            "/api/admin/polls/{poll_id}/status",
            post(handlers::set_poll_status),
        )
        .route(
            "/api/admin/polls/{poll_id}/responses",
            get(handlers::list_poll_responses).delete(handlers::clear_poll),
        )
        .route("/api/admin/contacts", get(handlers::list_contacts))
        .route(
            "/api/admin/contacts/{unique_id}/status",
            post(handlers::update_contact_status),
        )
        .route(
            "/api/admin/contacts/{unique_id}/interactions",
            post(handlers::add_interaction),
        )
        .layer(cors)
        .with_state(pool)
}
