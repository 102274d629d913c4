use crate::state::AppState;
use axum::Router;

pub mod dates;
pub mod dto;
pub mod handlers;
pub mod repo;
pub mod repo_types;
pub mod services;
pub mod validator;

pub fn router() -> Router<AppState> {
    handlers::user_routes()
}
