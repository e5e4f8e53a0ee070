//! Shared utilities.

/// Synchronization primitives
pub mod synchronization;
