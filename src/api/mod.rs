//! API endpoint handlers module
//!
//! Health checks, the status report, and admin operations.

pub mod admin;
pub mod health;
pub mod status;
