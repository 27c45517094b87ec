pub mod gate;
pub mod handlers;
pub mod journal;

pub use gate::{AnalysisGate, AnalysisPhase, GateError};
pub use journal::{AppView, Journal};

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::routes()
}
