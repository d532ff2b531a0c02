//! HTTP surface of the checkout service.

pub mod handlers;

use crate::application::checkout::CheckoutService;
use crate::application::contracts::ContractService;
use crate::domain::ports::{SharedEventLog, SharedGateway};
use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

/// Services shared by every request handler.
#[derive(Clone)]
pub struct AppState {
    pub checkout: CheckoutService,
    pub contracts: ContractService,
}

impl AppState {
    pub fn new(gateway: SharedGateway, events: SharedEventLog) -> Self {
        Self {
            checkout: CheckoutService::new(gateway, events.clone()),
            contracts: ContractService::new(events),
        }
    }

    pub fn with_statement_descriptor(mut self, descriptor: impl Into<String>) -> Self {
        self.checkout = self.checkout.with_statement_descriptor(descriptor);
        self
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/checkout", post(handlers::create_order))
        .route("/checkout/with-contract", post(handlers::checkout_with_contract))
        .route("/contract", post(handlers::submit_contract))
        .route("/contract/:id", get(handlers::get_contract))
        .route("/orders/search", get(handlers::search_orders))
        .route("/orders/:id", get(handlers::get_order))
        .route("/orders/:id/cancel", post(handlers::cancel_order))
        .route("/orders/:id/capture", post(handlers::capture_order))
        .route("/orders/:id/refund", post(handlers::refund_order))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
