//! Declarations of methods, fields and classes as reported by the decoder.

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::metadata::{
    identity::{ClassId, MethodId},
    types::{StackType, TypeRef},
};

bitflags! {
    /// Method attributes relevant to exception-flow analysis.
    ///
    /// A subset of the ECMA-335 `MethodAttributes`/`MethodImplAttributes` bits, flattened
    /// into one set because the analysis only cares whether a body exists and how the
    /// receiver is passed.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct MethodModifiers: u16 {
        /// No implicit `this` argument.
        const STATIC = 0x0001;
        /// Dispatched through the vtable.
        const VIRTUAL = 0x0002;
        /// No body, must be overridden.
        const ABSTRACT = 0x0004;
        /// Platform invoke into native code.
        const PINVOKE = 0x0008;
        /// Implemented inside the runtime.
        const INTERNAL_CALL = 0x0010;
        /// Name has special meaning (accessors, operators).
        const SPECIAL_NAME = 0x0020;
        /// Emitted by the compiler rather than written by the user.
        const COMPILER_GENERATED = 0x0040;
    }
}

impl fmt::Display for MethodModifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        bitflags::parser::to_writer(self, f)
    }
}

/// What kind of callable unit a method is.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum MethodKind {
    /// An ordinary method.
    #[default]
    Method,
    /// An instance constructor (`.ctor`).
    Constructor,
    /// A type initializer (`.cctor`).
    StaticConstructor,
    /// A property `get_` accessor.
    PropertyGetter,
    /// A property `set_` accessor.
    PropertySetter,
    /// An event `add_` accessor.
    EventAdd,
    /// An event `remove_` accessor.
    EventRemove,
}

impl MethodKind {
    /// Returns `true` for instance and static constructors.
    #[must_use]
    pub const fn is_constructor(&self) -> bool {
        matches!(self, Self::Constructor | Self::StaticConstructor)
    }

    /// Returns `true` for property accessors.
    #[must_use]
    pub const fn is_property_accessor(&self) -> bool {
        matches!(self, Self::PropertyGetter | Self::PropertySetter)
    }
}

/// The declaration of a callable unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDesc {
    /// Identity of the method.
    pub id: MethodId,
    /// Simple name (`Open`, `.ctor`, `get_Length`).
    pub name: String,
    /// The type declaring the method.
    pub declaring_type: TypeRef,
    /// Method, constructor or accessor.
    #[serde(default)]
    pub kind: MethodKind,
    /// Attribute bits.
    #[serde(default)]
    pub modifiers: MethodModifiers,
    /// Declared parameter types, `None` where the type is open (generic parameter) or unresolved.
    #[serde(default)]
    pub parameters: Vec<Option<TypeRef>>,
    /// Declared return type, `None` for `void`.
    #[serde(default)]
    pub return_type: Option<TypeRef>,
    /// For accessors, the name of the owning property or event.
    #[serde(default)]
    pub property: Option<String>,
}

impl MethodDesc {
    /// Creates a declaration for an ordinary instance method returning `void`.
    pub fn new(id: MethodId, declaring_type: TypeRef, name: impl Into<String>) -> Self {
        MethodDesc {
            id,
            name: name.into(),
            declaring_type,
            kind: MethodKind::Method,
            modifiers: MethodModifiers::empty(),
            parameters: Vec::new(),
            return_type: None,
            property: None,
        }
    }

    /// Returns `true` if the method has no implicit `this` argument.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.modifiers.contains(MethodModifiers::STATIC)
    }

    /// Returns `true` if the method has no IL body by declaration (abstract, P/Invoke,
    /// runtime-implemented).
    #[must_use]
    pub fn is_bodyless(&self) -> bool {
        self.modifiers.intersects(
            MethodModifiers::ABSTRACT | MethodModifiers::PINVOKE | MethodModifiers::INTERNAL_CALL,
        )
    }

    /// Returns `true` for event `add_`/`remove_` accessors.
    ///
    /// Accessors are recognised by their semantic kind, or, for decoders that do not
    /// report method semantics, by a special name with the accessor prefix.
    #[must_use]
    pub fn is_event_accessor(&self) -> bool {
        matches!(self.kind, MethodKind::EventAdd | MethodKind::EventRemove)
            || (self.modifiers.contains(MethodModifiers::SPECIAL_NAME)
                && (self.name.starts_with("add_") || self.name.starts_with("remove_")))
    }

    /// The static type of argument `index` as seen by `ldarg`.
    ///
    /// For instance methods, argument 0 is the implicit receiver and has the declaring type.
    #[must_use]
    pub fn argument_type(&self, index: u16) -> StackType {
        let index = usize::from(index);
        if self.is_static() {
            self.parameters.get(index).cloned().flatten().into()
        } else if index == 0 {
            StackType::Known(self.declaring_type.clone())
        } else {
            self.parameters.get(index - 1).cloned().flatten().into()
        }
    }

    /// The type pushed by a call to this method: the constructed type for `newobj`
    /// targets, otherwise the return type.
    #[must_use]
    pub fn result_type(&self, constructs: bool) -> Option<TypeRef> {
        if constructs && self.kind.is_constructor() {
            Some(self.declaring_type.clone())
        } else {
            self.return_type.clone()
        }
    }

    /// `Namespace.Type::Name`, the label used in output and logs.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}::{}", self.declaring_type.fullname(), self.name)
    }
}

impl fmt::Display for MethodDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name())
    }
}

/// A resolved field reference carried by a field instruction's operand.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldRef {
    /// The type declaring the field.
    pub declaring_type: TypeRef,
    /// Field name.
    pub name: String,
    /// Declared field type, `None` if open or unresolved.
    #[serde(default)]
    pub field_type: Option<TypeRef>,
}

/// The declaration of a type whose members can be analyzed as a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDesc {
    /// Identity of the class (`TypeDef` token).
    pub id: ClassId,
    /// The type itself.
    pub type_ref: TypeRef,
    /// Own methods, constructors and accessors, in declaration order.
    #[serde(default)]
    pub methods: Vec<MethodId>,
    /// Directly nested types.
    #[serde(default)]
    pub nested_types: Vec<ClassId>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{identity::ModuleId, token::Token};

    fn desc(name: &str) -> MethodDesc {
        MethodDesc::new(
            MethodId::new(ModuleId::from_name("App.dll"), Token::new(0x0600_0001)),
            TypeRef::parse("App", "App.Widget"),
            name,
        )
    }

    #[test]
    fn test_argument_types_instance() {
        let mut method = desc("Resize");
        method.parameters = vec![Some(TypeRef::parse("mscorlib", "System.Int32")), None];

        assert_eq!(method.argument_type(0).known().unwrap().name, "Widget");
        assert_eq!(method.argument_type(1).known().unwrap().name, "Int32");
        assert_eq!(method.argument_type(2), StackType::Unknown);
        assert_eq!(method.argument_type(9), StackType::Unknown);
    }

    #[test]
    fn test_modifiers_display() {
        let modifiers = MethodModifiers::STATIC | MethodModifiers::VIRTUAL;
        assert_eq!(modifiers.to_string(), "STATIC | VIRTUAL");
        assert_eq!(MethodModifiers::empty().to_string(), "");
    }

    #[test]
    fn test_argument_types_static() {
        let mut method = desc("Create");
        method.modifiers = MethodModifiers::STATIC;
        method.parameters = vec![Some(TypeRef::parse("mscorlib", "System.String"))];

        assert_eq!(method.argument_type(0).known().unwrap().name, "String");
    }

    #[test]
    fn test_event_accessor_detection() {
        let mut by_kind = desc("add_Changed");
        by_kind.kind = MethodKind::EventAdd;
        assert!(by_kind.is_event_accessor());

        let mut by_name = desc("remove_Changed");
        by_name.modifiers = MethodModifiers::SPECIAL_NAME;
        assert!(by_name.is_event_accessor());

        assert!(!desc("add_Item").is_event_accessor());
    }

    #[test]
    fn test_result_type() {
        let mut ctor = desc(".ctor");
        ctor.kind = MethodKind::Constructor;
        assert_eq!(ctor.result_type(true).unwrap().name, "Widget");
        assert_eq!(ctor.result_type(false), None);

        let mut getter = desc("get_Size");
        getter.return_type = Some(TypeRef::parse("mscorlib", "System.Int32"));
        assert_eq!(getter.result_type(false).unwrap().name, "Int32");
    }

    #[test]
    fn test_kind_strings() {
        assert_eq!(MethodKind::PropertyGetter.to_string(), "property-getter");
        assert_eq!(
            "static-constructor".parse::<MethodKind>().unwrap(),
            MethodKind::StaticConstructor
        );
    }
}
