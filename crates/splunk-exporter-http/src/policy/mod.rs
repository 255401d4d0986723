//! Reliability policies applied around every Splunk request.
//!
//! ```text
//! Request → [RetryPolicy] → [reqwest]
//! ```

pub mod retry;

pub use retry::{RetryConfig, RetryPolicy};
