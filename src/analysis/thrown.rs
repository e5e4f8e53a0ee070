//! Exception occurrences produced by the analysis.

use std::{
    fmt,
    hash::{Hash, Hasher},
};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::metadata::{identity::MethodId, types::TypeRef};

/// Offset recorded for exceptions attributed from documentation rather than from a
/// `throw` site in the byte code.
pub const DOCUMENTED_OFFSET: u32 = u32::MAX;

/// How an exception came to be attributed to its thrower.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ExceptionOrigin {
    /// A `throw` instruction with a known operand type
    Thrown,
    /// A `rethrow` inside a catch handler
    Rethrown,
    /// Listed by a documentation provider
    Documented,
}

/// An exception type raised by a specific method.
///
/// Set membership compares the method and the exception type's namespace and name only:
/// a method throwing the same type from two offsets is one logical exception, even though
/// each occurrence keeps its own offset. The type's assembly is left out because a
/// documentation provider may not know which assembly defines a documented type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThrownException {
    /// The method containing the throw site
    pub method: MethodId,
    /// Static type of the thrown object
    pub exception_type: TypeRef,
    /// Offset of the throw site, or [`DOCUMENTED_OFFSET`]
    pub offset: u32,
    /// How the exception was found
    pub origin: ExceptionOrigin,
}

impl ThrownException {
    /// An exception raised by a `throw` or `rethrow` at `offset` in `method`.
    #[must_use]
    pub fn new(
        method: MethodId,
        exception_type: TypeRef,
        offset: u32,
        origin: ExceptionOrigin,
    ) -> Self {
        ThrownException {
            method,
            exception_type,
            offset,
            origin,
        }
    }

    /// An exception attributed to `method` by documentation.
    #[must_use]
    pub fn documented(method: MethodId, exception_type: TypeRef) -> Self {
        Self::new(
            method,
            exception_type,
            DOCUMENTED_OFFSET,
            ExceptionOrigin::Documented,
        )
    }

    /// Returns `true` if the exception comes from documentation and has no real offset.
    #[must_use]
    pub fn is_documented(&self) -> bool {
        self.offset == DOCUMENTED_OFFSET
    }
}

impl PartialEq for ThrownException {
    fn eq(&self, other: &Self) -> bool {
        self.method == other.method && self.exception_type.same_name(&other.exception_type)
    }
}

impl Eq for ThrownException {}

impl Hash for ThrownException {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.method.hash(state);
        self.exception_type.namespace.hash(state);
        self.exception_type.name.hash(state);
    }
}

impl fmt::Display for ThrownException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_documented() {
            write!(f, "{} ({}, documented)", self.exception_type, self.method)
        } else {
            write!(
                f,
                "{} ({} at IL_{:04x}, {})",
                self.exception_type, self.method, self.offset, self.origin
            )
        }
    }
}

/// One way an exception escapes a method: the exception plus the offset in the escaping
/// method where it leaves. For the method's own throws the site is the throw offset, for
/// exceptions inherited from a callee it is the call-site offset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Unhandled {
    /// The exception and its original thrower
    pub thrown: ThrownException,
    /// Offset in the escaping method
    pub site: u32,
}

impl Unhandled {
    /// Creates an occurrence record.
    #[must_use]
    pub fn new(thrown: ThrownException, site: u32) -> Self {
        Unhandled { thrown, site }
    }
}
