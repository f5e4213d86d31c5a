//! HTTP API surface (spec.md §6), gated behind the `http-api` feature.

pub mod middleware;
pub mod routes;
pub mod server;
pub mod types;

pub use routes::AppState;
pub use server::{HttpApiConfig, HttpApiServer};
