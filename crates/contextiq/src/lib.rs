//! Public facade crate for `contextiq`.
//!
//! This crate intentionally contains no IO or pipeline logic. It re-exports
//! the backend-agnostic types/traits from `contextiq-core`.

pub use contextiq_core::*;
