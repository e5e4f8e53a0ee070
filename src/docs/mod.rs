//! Documented exceptions.
//!
//! A [`DocumentationProvider`] attributes exception types to members from a declarative
//! source instead of byte code. The analysis combines them with interpreted results
//! according to [`crate::analysis::DocumentationMode`].
//!
//! [`XmlDocProvider`] reads the XML documentation files emitted by .NET compilers,
//! where members are keyed by documentation ids:
//!
//! | member | id |
//! |---|---|
//! | method | `M:Ns.Type.Name(System.String,System.Int32)` |
//! | parameterless method | `M:Ns.Type.Name` |
//! | constructor | `M:Ns.Type.#ctor(System.String)` |
//! | type initializer | `M:Ns.Type.#cctor` |
//! | property | `P:Ns.Type.Length` |
//!
//! Nested types are separated by `.` in ids.

mod xmldoc;

pub use xmldoc::XmlDocProvider;

use crate::{
    metadata::{
        member::{MethodDesc, MethodKind},
        types::TypeRef,
    },
    Result,
};

/// Source of exception types attributed to a member by documentation.
pub trait DocumentationProvider: Send + Sync {
    /// Exception types documented for `method`, empty if nothing is known.
    ///
    /// # Errors
    ///
    /// Returns an error if the documentation source fails. The analysis treats this the
    /// same as "nothing documented".
    fn exceptions(&self, method: &MethodDesc) -> Result<Vec<TypeRef>>;
}

/// Documentation id of the declaring type, without prefix: `Ns.Outer.Inner`.
#[must_use]
pub fn type_doc_name(ty: &TypeRef) -> String {
    ty.fullname().replace('/', ".")
}

/// Documentation id of `method` without its parameter list: `M:Ns.Type.Name`.
#[must_use]
pub fn method_doc_stem(method: &MethodDesc) -> String {
    let name = match method.kind {
        MethodKind::Constructor => "#ctor",
        MethodKind::StaticConstructor => "#cctor",
        _ => method.name.as_str(),
    };
    format!("M:{}.{}", type_doc_name(&method.declaring_type), name)
}

/// Full documentation id of `method`, or `None` if a parameter type is unresolved.
#[must_use]
pub fn method_doc_id(method: &MethodDesc) -> Option<String> {
    let stem = method_doc_stem(method);
    if method.parameters.is_empty() {
        return Some(stem);
    }

    let mut params = Vec::with_capacity(method.parameters.len());
    for param in &method.parameters {
        params.push(type_doc_name(param.as_ref()?));
    }
    Some(format!("{stem}({})", params.join(",")))
}

/// Documentation id of the property owning an accessor: `P:Ns.Type.Length`.
#[must_use]
pub fn property_doc_id(method: &MethodDesc) -> Option<String> {
    if !method.kind.is_property_accessor() {
        return None;
    }
    let property = method.property.as_deref().or_else(|| {
        method
            .name
            .strip_prefix("get_")
            .or_else(|| method.name.strip_prefix("set_"))
    })?;
    Some(format!(
        "P:{}.{}",
        type_doc_name(&method.declaring_type),
        property
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::method_id;

    fn desc(type_name: &str, name: &str) -> MethodDesc {
        MethodDesc::new(method_id(1), TypeRef::parse("App", type_name), name)
    }

    #[test]
    fn test_method_ids() {
        let mut open = desc("App.Store", "Open");
        assert_eq!(method_doc_id(&open).unwrap(), "M:App.Store.Open");

        open.parameters = vec![
            Some(TypeRef::parse("mscorlib", "System.String")),
            Some(TypeRef::parse("mscorlib", "System.Int32")),
        ];
        assert_eq!(
            method_doc_id(&open).unwrap(),
            "M:App.Store.Open(System.String,System.Int32)"
        );

        open.parameters.push(None);
        assert!(method_doc_id(&open).is_none());
        assert_eq!(method_doc_stem(&open), "M:App.Store.Open");
    }

    #[test]
    fn test_constructor_and_nested_ids() {
        let mut ctor = desc("App.Store/Cursor", ".ctor");
        ctor.kind = MethodKind::Constructor;
        assert_eq!(method_doc_id(&ctor).unwrap(), "M:App.Store.Cursor.#ctor");

        let mut cctor = desc("App.Store", ".cctor");
        cctor.kind = MethodKind::StaticConstructor;
        assert_eq!(method_doc_id(&cctor).unwrap(), "M:App.Store.#cctor");
    }

    #[test]
    fn test_property_ids() {
        let mut getter = desc("App.Store", "get_Length");
        assert!(property_doc_id(&getter).is_none());

        getter.kind = MethodKind::PropertyGetter;
        assert_eq!(property_doc_id(&getter).unwrap(), "P:App.Store.Length");

        getter.property = Some("Size".to_string());
        assert_eq!(property_doc_id(&getter).unwrap(), "P:App.Store.Size");
    }
}
