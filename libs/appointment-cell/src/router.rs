// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, delete},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn appointment_routes(state: Arc<AppConfig>) -> Router {
    // All appointment operations require authentication
    let protected_routes = Router::new()
        // Slot management
        .route("/slots", get(handlers::list_available_slots))
        .route("/slots", post(handlers::create_slots))
        .route("/slots/bulk", post(handlers::bulk_create_slots))
        .route("/slots/clear-day", post(handlers::clear_day_slots))
        .route("/slots/{slot_id}", delete(handlers::delete_slot))

        // Booking
        .route("/reserve/{slot_id}", post(handlers::reserve_slot))
        .route("/my", get(handlers::my_appointments))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .route("/{appointment_id}/complete", post(handlers::complete_appointment))
        .route("/{appointment_id}/pay", post(handlers::pay_appointment))

        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
