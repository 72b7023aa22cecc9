mod convert;
mod dto;
pub mod handlers;
#[cfg(test)]
pub mod memory;
mod password;
pub mod query;
pub mod repo;
mod repo_types;

use crate::state::AppState;
use axum::Router;

pub use repo::{PgUserStore, UserStore};

pub fn router() -> Router<AppState> {
    handlers::user_routes()
}
