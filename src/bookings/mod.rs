pub mod availability;
mod dto;
pub mod handlers;
pub mod lifecycle;
pub mod overlap;
pub mod repo;
pub mod repo_types;
mod services;
pub mod time;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::read_router())
        .merge(handlers::write_router())
}
