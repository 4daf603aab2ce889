//! Shared utilities for docsnap.
//!
//! This crate provides common utilities used across the docsnap workspace:
//! - ULID-based identifier generation
//! - Logging setup with tracing
//! - RAII-based timing for capture and restore measurement

pub mod id;
pub mod log;
pub mod timing;

pub use id::{IdPrefix, Identifier};
pub use timing::{Operation, TimingGuard};
