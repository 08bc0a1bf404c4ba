use axum::{
    Router,
    routing::{get, post},
};

pub mod orders;
pub mod system;

pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/orders", post(orders::create_order))
        .route("/orders/:id", get(orders::get_order))
}
