pub mod aggregator;
pub mod handlers;

use crate::state::AppState;
use axum::{routing::get, Router};

pub fn router() -> Router<AppState> {
    Router::new().route("/dashboard", get(handlers::dashboard))
}
