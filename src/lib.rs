// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # throwscope
//!
//! Static exception-flow analysis for .NET CIL byte-code.
//!
//! `throwscope` determines, for a method or a whole class, which exceptions can escape
//! it: exceptions thrown directly, exceptions raised by callees and not caught around
//! the call site, and exceptions declared in XML documentation of library methods whose
//! bodies are unavailable. For every escaping exception it can report the shortest
//! call chain from the analysed root to the throw site.
//!
//! ## Features
//!
//! - **Symbolic interpretation** - tracks the static type of the value reaching each
//!   `throw`, through locals, arguments, calls and catch handlers
//! - **Interprocedural** - follows calls, recursion included, merging callee results
//!   through the caller's handler regions
//! - **Incremental** - results live in a shared cache readable while a pass runs, with
//!   completion notifications in batches
//! - **Configurable** - framework and assembly boundaries, documentation use and
//!   nested types are controlled by [`analysis::AnalysisOptions`]
//! - **Cancellable** - a running pass stops at the next instruction once its
//!   [`CancellationToken`] fires
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use throwscope::prelude::*;
//!
//! let program = Program::from_json(r#"{
//!     "types": [{
//!         "assembly": "App",
//!         "name": "App.Store",
//!         "methods": [{
//!             "name": "Open",
//!             "body": [
//!                 { "op": "newobj", "method": "System.IO.FileNotFoundException::.ctor" },
//!                 { "op": "throw" }
//!             ]
//!         }]
//!     }]
//! }"#)?;
//! let open = program.find_method("App.Store::Open")?;
//!
//! let finder = ExceptionFinder::new(Arc::new(program), AnalysisOptions::default());
//! finder.analyze(open, &CancellationToken::new())?;
//!
//! for thrown in finder.unhandled_exceptions(open)?.unwrap_or_default() {
//!     println!("{} escapes from IL_{:04x}", thrown.exception_type, thrown.offset);
//! }
//! # Ok::<(), throwscope::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`metadata`] - tokens, member identities, type references and handler regions
//! - [`assembly`] - decoded instructions, opcodes and method bodies
//! - [`program`] - in-memory programs, built fluently or loaded from JSON
//! - [`analysis`] - the interpreter, the [`ExceptionFinder`] and its cache
//! - [`docs`] - documented exceptions from XML documentation files
//! - [`Error`] and [`Result`] - error handling
//!
//! ### Testing
//!
//! ```bash
//! cargo test
//! cargo bench --bench finder
//! ```
#[macro_use]
pub(crate) mod macros;

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use throwscope::prelude::*;
///
/// let program = ProgramBuilder::with_framework().build()?;
/// assert!(program.find_class("System.Exception").is_ok());
/// # Ok::<(), throwscope::Error>(())
/// ```
pub mod prelude;

/// Exception-flow analysis over a [`analysis::CodeSource`].
///
/// # Key Types
///
/// - [`ExceptionFinder`] - runs analysis passes and answers queries
/// - [`analysis::AnalysisCache`] - per-method and per-class results
/// - [`analysis::AnalysisOptions`] - which callees are followed and how documentation
///   is used
pub mod analysis;

/// Decoded CIL instructions and method bodies.
pub mod assembly;

/// Documented exceptions from XML documentation files.
pub mod docs;

/// Identities and declarations of CIL metadata: tokens, types, members and exception
/// handler regions.
pub mod metadata;

/// In-memory programs implementing [`analysis::CodeSource`].
pub mod program;

/// Shared utilities.
pub mod utils;

/// `throwscope` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `throwscope` Error type
///
/// # Examples
///
/// ```rust
/// use throwscope::{program::Program, Error};
///
/// match Program::from_json("{ \"types\": 1 }") {
///     Ok(_) => println!("loaded"),
///     Err(Error::Json(e)) => println!("not a program description: {e}"),
///     Err(e) => println!("Error: {e}"),
/// }
/// ```
pub use error::Error;

/// The analysis driver, see [`analysis::ExceptionFinder`].
pub use analysis::ExceptionFinder;

/// Cooperative cancellation of analysis passes.
pub use utils::synchronization::CancellationToken;
