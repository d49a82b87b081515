//! API layer - HTTP endpoints and middleware

pub mod health;
pub mod middleware;
pub mod predict;
pub mod router;
pub mod state;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use router::{create_router_with_state, with_metrics};
pub use state::AppState;
