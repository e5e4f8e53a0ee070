//! Exception-flow analysis.
//!
//! This module answers, for a method or a whole class, which exceptions can escape it
//! and along which call chains they travel.
//!
//! # Architecture
//!
//! - [`interpreter`] - symbolic stack interpretation of one method body, reporting
//!   `throw` sites and call edges
//! - [`finder`] - the [`ExceptionFinder`] driving the interpreter over the call graph
//! - [`cache`] - per-method and per-class results shared across passes
//! - [`path`] - shortest call chains between analysed methods
//! - [`policy`] - which callees are followed
//! - [`options`] - [`AnalysisOptions`] and its presets
//! - [`notify`] - batched change notifications
//!
//! The finder reads program metadata through [`CodeSource`], which decouples the
//! analysis from how byte-code was decoded.
//!
//! # Usage
//!
//! ```rust
//! use throwscope::prelude::*;
//!
//! let mut builder = ProgramBuilder::with_framework();
//! let class = builder.class("App", "App.Store", "System.Object");
//! let ctor = builder.constructor_of("System.IO.IOException")?;
//! let open = builder.method(class, "Open").body(|b| {
//!     b.newobj(ctor)?;
//!     b.throw()
//! })?;
//!
//! let finder = ExceptionFinder::new(std::sync::Arc::new(builder.build()?), AnalysisOptions::default());
//! finder.analyze(open, &CancellationToken::new())?;
//!
//! let escaping = finder.unhandled_exceptions(open)?.unwrap_or_default();
//! assert_eq!(escaping[0].exception_type.fullname(), "System.IO.IOException");
//! # Ok::<(), throwscope::Error>(())
//! ```

pub mod cache;
pub mod finder;
pub mod interpreter;
pub mod notify;
pub mod options;
pub mod path;
pub mod policy;
pub mod source;
pub mod thrown;

pub use cache::{AnalysisCache, AnalysisState, CacheStats, ClassEntry, MethodEntry};
pub use finder::{AnalysisOutcome, ExceptionFinder, MAX_CALL_DEPTH};
pub use interpreter::{interpret, Cursor, InterpreterEvent, InterpreterSink};
pub use notify::ChangeSink;
pub use options::{AnalysisOptions, DocumentationMode};
pub use policy::{PolicyDecision, SkipReason};
pub use source::CodeSource;
pub use thrown::{ExceptionOrigin, ThrownException, Unhandled, DOCUMENTED_OFFSET};
