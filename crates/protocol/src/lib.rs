//! Wire types shared between the applink broker and its callers.
//!
//! Kept free of runtime dependencies so method-call bridges can depend on it
//! without pulling in the broker itself.

pub mod command;

pub use command::{ErrorCode, LaunchMode, Request, Response};
