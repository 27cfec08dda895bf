// libs/payment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn payment_routes(state: Arc<AppConfig>) -> Router {
    // All wallet and payment operations require authentication
    let protected_routes = Router::new()
        .route("/wallet", get(handlers::wallet_detail))
        .route("/wallet/deposit", post(handlers::deposit_funds))
        .route("/wallet/withdraw", post(handlers::withdraw_funds))
        .route("/wallet/transactions", get(handlers::list_transactions))
        .route("/history", get(handlers::payment_history))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
