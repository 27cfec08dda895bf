use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use account_cell::router::account_routes;
use appointment_cell::router::appointment_routes;
use doctor_cell::router::doctor_routes;
use payment_cell::router::payment_routes;
use review_cell::router::review_routes;
use shared_config::AppConfig;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "Medbook API is running!" }))
        .nest("/auth", account_routes(state.clone()))
        .nest("/doctors", doctor_routes(state.clone()))
        .nest("/appointments", appointment_routes(state.clone()))
        .nest("/payments", payment_routes(state.clone()))
        .nest("/reviews", review_routes(state))
}
