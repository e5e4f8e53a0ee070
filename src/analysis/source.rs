//! The decoder contract the analysis consumes.

use std::sync::Arc;

use crate::{
    assembly::MethodBody,
    metadata::{
        identity::{ClassId, MemberId, MethodId},
        member::{ClassDesc, MethodDesc},
        types::TypeHierarchy,
    },
    Result,
};

/// Source of method declarations, decoded bodies and class membership.
///
/// Implementations must be deterministic: asking twice for the same identity yields the
/// same answer. Every failure is treated by the analysis as "nothing is known about this
/// member" and degrades only the edge that asked.
pub trait CodeSource: TypeHierarchy {
    /// Declaration of a method, constructor or accessor.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::MemberNotFound`] if the decoder does not know `id`.
    fn method(&self, id: &MethodId) -> Result<MethodDesc>;

    /// Decoded body, or `None` for abstract, extern and runtime-implemented methods.
    ///
    /// # Errors
    ///
    /// Returns an error if the body exists but cannot be decoded.
    fn body(&self, id: &MethodId) -> Result<Option<Arc<MethodBody>>>;

    /// Declaration and members of a type.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::MemberNotFound`] if the decoder does not know `id`.
    fn class(&self, id: &ClassId) -> Result<ClassDesc>;

    /// The type declaring `member`, if known.
    fn declaring_class(&self, member: &MemberId) -> Option<ClassId>;
}
