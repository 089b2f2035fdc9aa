//! Middleware module
//!
//! Request logging with trace ids, and admin key authentication.

pub mod auth;
pub mod logging;

pub use auth::{require_admin_key, AuthState};
pub use logging::{log_request, TraceId, REQUEST_ID_HEADER, TRACE_ID_HEADER};
