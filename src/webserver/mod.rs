//! HTTP surface over the metadata cache
//!
//! - `GET /metadata/:collection/:token`: cached metadata or a pending marker
//! - `GET /health`: dispatcher and refresh queue state

mod server;

pub mod routes;
pub mod state;

pub use server::{bind, build_app, serve};
pub use state::AppState;
