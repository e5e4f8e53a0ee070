//! # throwscope Prelude
//!
//! The types needed to build or load a program, analyse it and read the results.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all throwscope operations
pub use crate::Error;

/// The result type used throughout throwscope
pub use crate::Result;

/// Cooperative cancellation of analysis passes
pub use crate::CancellationToken;

// ================================================================================================
// Programs
// ================================================================================================

/// Programs and their builders
pub use crate::program::{BodyBuilder, Program, ProgramBuilder};

/// Metadata identities and declarations
pub use crate::metadata::{
    identity::{ClassId, MemberId, MethodId, ModuleId},
    member::{ClassDesc, MethodDesc, MethodKind, MethodModifiers},
    token::Token,
    types::{TypeHierarchy, TypeRef},
};

// ================================================================================================
// Analysis
// ================================================================================================

/// The analysis driver and its configuration
pub use crate::analysis::{
    AnalysisOptions, AnalysisOutcome, AnalysisState, CodeSource, DocumentationMode,
    ExceptionFinder,
};

/// Analysis results
pub use crate::analysis::{ExceptionOrigin, ThrownException, Unhandled};

/// Documentation providers
pub use crate::docs::{DocumentationProvider, XmlDocProvider};
