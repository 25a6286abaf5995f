//! # corpora-utils
//!
//! Cross-cutting helpers shared by the corpora crates. Today that is the
//! resilience envelope: transient/permanent error classification and
//! bounded retry with exponential backoff and full jitter.

#![warn(missing_debug_implementations)]

pub mod retry;

pub use retry::{classify, retry, ErrorClass, RetryPolicy};
