//! Nominal type references and the subtype relation used by the analysis.
//!
//! The analysis never consults a live runtime type system. It only needs to know a
//! type's full name, the assembly it lives in, and its base type; the base-type edges
//! come from the decoder through [`TypeHierarchy`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Maximum depth of a base-type walk before the hierarchy is considered cyclic.
pub const MAX_HIERARCHY_DEPTH: usize = 256;

/// Full name of the universal base type every walk terminates at.
pub const OBJECT_TYPE: &str = "System.Object";

/// A reference to a named type.
///
/// Equality is nominal on `(assembly, namespace, name)`; generic instantiations are
/// expected to be reduced to their definition by the decoder.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TypeRef {
    /// Simple name of the defining assembly (e.g. `mscorlib`, `MyApp`).
    #[serde(default)]
    pub assembly: String,
    /// Namespace, possibly empty.
    #[serde(default)]
    pub namespace: String,
    /// Type name, nested types use `Outer/Inner`.
    pub name: String,
}

impl TypeRef {
    /// Creates a type reference.
    pub fn new(
        assembly: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        TypeRef {
            assembly: assembly.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Parses `Namespace.Name` into a type reference in the given assembly.
    ///
    /// The last `.` separates namespace and name.
    pub fn parse(assembly: impl Into<String>, full_name: &str) -> Self {
        match full_name.rsplit_once('.') {
            Some((namespace, name)) => TypeRef::new(assembly, namespace, name),
            None => TypeRef::new(assembly, "", full_name),
        }
    }

    /// Returns the full name (Namespace.Name)
    #[must_use]
    pub fn fullname(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }

    /// Returns `true` for `System.Object`, regardless of the assembly it was resolved from.
    #[must_use]
    pub fn is_object(&self) -> bool {
        self.namespace == "System" && self.name == "Object"
    }

    /// Returns `true` if the full name of both references matches.
    ///
    /// Framework types are referenced from many assemblies under different assembly
    /// names (`mscorlib`, `System.Runtime`, ...); matching by full name lets a catch
    /// clause in one module recognise an exception type resolved through another.
    #[must_use]
    pub fn same_name(&self, other: &TypeRef) -> bool {
        self.namespace == other.namespace && self.name == other.name
    }
}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]{}", self.assembly, self.fullname())
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fullname())
    }
}

/// The static type of one symbolic stack slot, local, or argument.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum StackType {
    /// Nothing is known about the slot.
    #[default]
    Unknown,
    /// A value (or object reference) of the given type.
    Known(TypeRef),
    /// A managed pointer to a location of the given type (`ldloca`, `ldflda`, ...).
    ByRef(Box<StackType>),
    /// A function pointer produced by `ldftn`/`ldvirtftn`.
    FnPtr(crate::metadata::identity::MethodId),
}

impl StackType {
    /// Returns the type if the slot holds a known object/value type.
    #[must_use]
    pub fn known(&self) -> Option<&TypeRef> {
        match self {
            StackType::Known(ty) => Some(ty),
            _ => None,
        }
    }

    /// Wraps the slot into a managed pointer.
    #[must_use]
    pub fn by_ref(self) -> StackType {
        StackType::ByRef(Box::new(self))
    }
}

impl From<TypeRef> for StackType {
    fn from(ty: TypeRef) -> Self {
        StackType::Known(ty)
    }
}

impl From<Option<TypeRef>> for StackType {
    fn from(ty: Option<TypeRef>) -> Self {
        ty.map_or(StackType::Unknown, StackType::Known)
    }
}

/// Source of the nominal base-type relation.
///
/// Implemented by the decoder; the analysis builds subtype checks on top of it.
pub trait TypeHierarchy: Send + Sync {
    /// Returns the direct base type of `ty`, or `None` for `System.Object`, interfaces
    /// and types the decoder cannot resolve.
    fn base_type(&self, ty: &TypeRef) -> Option<TypeRef>;
}

/// Returns `true` if `ty` is `ancestor` or (transitively) derives from it.
///
/// Every type is considered assignable to `System.Object`, even when its hierarchy
/// cannot be fully resolved.
///
/// # Errors
///
/// Returns [`Error::RecursionLimit`] if the walk does not terminate within
/// [`MAX_HIERARCHY_DEPTH`] steps, which only happens for a cyclic hierarchy.
pub fn is_assignable_to<H: TypeHierarchy + ?Sized>(
    hierarchy: &H,
    ty: &TypeRef,
    ancestor: &TypeRef,
) -> Result<bool> {
    if ancestor.is_object() {
        return Ok(true);
    }

    let mut current = ty.clone();
    for _ in 0..MAX_HIERARCHY_DEPTH {
        if current.same_name(ancestor) {
            return Ok(true);
        }
        if current.is_object() {
            return Ok(false);
        }
        match hierarchy.base_type(&current) {
            Some(base) => current = base,
            None => return Ok(false),
        }
    }

    Err(Error::RecursionLimit(MAX_HIERARCHY_DEPTH))
}
