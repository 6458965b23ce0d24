pub mod health;
pub mod prescriptions;

use crate::db::PrescriptionStore;
use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<PrescriptionStore>,
}

impl AppState {
    pub fn new(store: Arc<PrescriptionStore>) -> Self {
        Self { store }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/rx", get(prescriptions::list_prescriptions))
        .route(
            "/rx/:name",
            get(prescriptions::get_prescription)
                .post(prescriptions::create_prescription)
                .patch(prescriptions::update_prescription)
                .delete(prescriptions::delete_prescription),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
