//! Metadata model for exception-flow analysis.
//!
//! The analysis reasons about a small, decoder-independent slice of ECMA-335 metadata:
//! member identities, nominal type references with their base-type edges, method and
//! class declarations, and exception handler regions.
//!
//! # Key Components
//!
//! - [`token`] - Metadata table row references used throughout .NET
//! - [`identity`] - Process-wide member identities (module + token)
//! - [`types`] - Type references and the nominal subtype relation
//! - [`member`] - Method, field and class declarations
//! - [`exceptions`] - Handler regions and the coverage check

/// Exception handler regions and coverage
pub mod exceptions;
/// Stable module and member identities
pub mod identity;
/// Method, field and class declarations
pub mod member;
/// Metadata tokens
pub mod token;
/// Type references and subtyping
pub mod types;
