//! User account service: registration, login, profile read/update/delete and
//! a public filtered listing, guarded by stored signed access tokens.

pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod extractors;
pub mod response;
pub mod state;
pub mod users;

pub use app::build_app;
pub use error::AppError;
pub use state::AppState;
