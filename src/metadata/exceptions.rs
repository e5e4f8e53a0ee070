//! Exception handler regions of a method body and the handler-coverage check.
//!
//! Each method owns a list of [`HandlerRegion`]s as decoded from its exception handling
//! clauses (ECMA-335 II.25.4.6). The analysis asks one question of them: is an exception
//! of type `E` raised at offset `O` caught by one of this method's own handlers?

use serde::{Deserialize, Serialize};

use crate::metadata::types::{is_assignable_to, TypeHierarchy, TypeRef};

/// The kind of a protected region's handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HandlerKind {
    /// `catch (T)` clause.
    #[default]
    Catch,
    /// `finally` clause.
    Finally,
    /// `fault` clause.
    Fault,
    /// Filtered catch (`catch when (...)`).
    FilterCatch,
}

impl HandlerKind {
    /// Returns `true` for clauses that can stop an exception from propagating.
    #[must_use]
    pub const fn can_catch(&self) -> bool {
        matches!(self, Self::Catch | Self::FilterCatch)
    }
}

/// One protected region of a method body and its handler.
///
/// # Layout in IL
///
/// ```text
/// try {
///     // try_offset -> try_offset + try_length
/// }
/// catch (catch_type) {
///     // handler_offset -> handler_offset + handler_length
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerRegion {
    /// Offset in bytes of try block from start of method body.
    pub try_offset: u32,
    /// Length in bytes of the try block.
    pub try_length: u32,
    /// Location of the handler for this try block.
    pub handler_offset: u32,
    /// Size of the handler code in bytes.
    pub handler_length: u32,
    /// Clause kind.
    #[serde(default)]
    pub kind: HandlerKind,
    /// Declared catch type, `None` for finally/fault and untyped filters.
    #[serde(default)]
    pub catch_type: Option<TypeRef>,
}

impl HandlerRegion {
    /// Returns `true` if `offset` lies inside the protected (try) range.
    #[must_use]
    pub fn try_contains(&self, offset: u32) -> bool {
        offset >= self.try_offset && offset - self.try_offset < self.try_length
    }

    /// Returns `true` if `offset` lies inside the handler range.
    #[must_use]
    pub fn handler_contains(&self, offset: u32) -> bool {
        offset >= self.handler_offset && offset - self.handler_offset < self.handler_length
    }

    /// Returns `true` if this clause catches exceptions of type `exception`.
    ///
    /// Finally and fault clauses never catch. A clause without a declared type never
    /// matches. Hierarchy failures are treated as "does not catch".
    #[must_use]
    pub fn catches<H: TypeHierarchy + ?Sized>(&self, hierarchy: &H, exception: &TypeRef) -> bool {
        if !self.kind.can_catch() {
            return false;
        }
        let Some(catch_type) = &self.catch_type else {
            return false;
        };

        match is_assignable_to(hierarchy, exception, catch_type) {
            Ok(caught) => caught,
            Err(e) => {
                log::debug!("cannot relate {exception} to catch type {catch_type}: {e}");
                false
            }
        }
    }
}

/// The handler-coverage check: is `exception`, raised at `offset`, caught by one of
/// `regions`?
///
/// The first region whose try range contains the offset and whose catch type is the
/// exception type or one of its supertypes suppresses the exception. Handler ordering
/// between nested regions is not modelled, only whether some matching catch exists.
#[must_use]
pub fn is_caught<H: TypeHierarchy + ?Sized>(
    regions: &[HandlerRegion],
    hierarchy: &H,
    offset: u32,
    exception: &TypeRef,
) -> bool {
    regions
        .iter()
        .any(|region| region.try_contains(offset) && region.catches(hierarchy, exception))
}

/// Returns the catch clause whose handler starts at `offset`, if any.
#[must_use]
pub fn catch_handler_at(regions: &[HandlerRegion], offset: u32) -> Option<&HandlerRegion> {
    regions
        .iter()
        .find(|region| region.kind.can_catch() && region.handler_offset == offset)
}

/// Finds the clause a `rethrow` at `offset` rethrows for.
///
/// This is the innermost catch-capable clause whose handler contains the offset. As a
/// fallback for decoders that report handler ranges loosely, the innermost catch-capable
/// clause whose try range contains the offset is used.
#[must_use]
pub fn rethrow_handler(regions: &[HandlerRegion], offset: u32) -> Option<&HandlerRegion> {
    let catching = || regions.iter().filter(|region| region.kind.can_catch());

    catching()
        .filter(|region| region.handler_contains(offset))
        .min_by_key(|region| region.handler_length)
        .or_else(|| {
            catching()
                .filter(|region| region.try_contains(offset))
                .min_by_key(|region| region.try_length)
        })
}
