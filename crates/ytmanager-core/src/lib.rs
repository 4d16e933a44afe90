//! Core library for the ytmanager client.
//!
//! - `auth`: session state machine, token decoding and token storage
//! - `routes`: navigable views and the route guard
//! - `api`: HTTP client for the backend's auth endpoints
//! - `config`: on-disk client configuration

pub mod api;
pub mod auth;
pub mod config;
pub mod routes;

pub use api::{ApiClient, ApiError};
pub use auth::{Identity, Role, SessionEvent, SessionManager, SessionState};
pub use config::Config;
pub use routes::{GuardDecision, Route};
