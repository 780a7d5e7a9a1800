use axum::{
    routing::{get, post, put},
    Router,
};

use crate::handlers::{bookings, catalog, payments, quotes};
use crate::AppState;

pub fn create_router(state: AppState) -> Router {
    // Read-only catalog lookups
    let catalog_routes = Router::new()
        .route("/packages", get(catalog::list_packages))
        .route("/packages/{id}", get(catalog::get_package));

    // Quote -> booking -> payment settlement flow
    let sales_routes = Router::new()
        .route("/quotes", get(quotes::list_quotes).post(quotes::create_quote))
        .route("/quotes/{id}", get(quotes::get_quote))
        .route("/quotes/{id}/status", put(quotes::update_quote_status))
        .route("/bookings", get(bookings::list_bookings).post(bookings::create_booking))
        .route("/bookings/{id}", get(bookings::get_booking))
        .route("/bookings/{id}/status", put(bookings::update_booking_status))
        .route("/bookings/{id}/payments", get(bookings::list_booking_payments))
        .route("/bookings/{id}/reconcile", post(bookings::reconcile_booking))
        .route("/payments", post(payments::record_payment));

    Router::new()
        .nest("/api", catalog_routes.merge(sales_routes))
        .with_state(state)
}
