//! REST API client module for the ytmanager backend.
//!
//! This module provides the `ApiClient` for the login and signup endpoints
//! and for authenticated requests against everything else.
//!
//! The backend issues a JWT at login; authenticated requests carry it as
//! an `Authorization: Bearer` header.

pub mod client;
pub mod error;

pub use client::{ApiClient, HealthStatus, SignupRequest, DEFAULT_API_BASE_URL};
pub use error::ApiError;
