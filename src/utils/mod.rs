//! Utility modules
//!
//! Retry backoff and string helpers shared by the rotation engine and the
//! HTTP surface.

pub mod retry;
pub mod string;

pub use retry::RetryConfig;
pub use string::{key_preview, truncate_str, truncate_with_suffix};
