//! In-memory program images.
//!
//! A [`Program`] is a fully decoded set of modules: type declarations with their base
//! types, method declarations, and method bodies with resolved operands. It implements
//! [`CodeSource`] and [`TypeHierarchy`], so it can be handed straight to an
//! [`crate::analysis::ExceptionFinder`].
//!
//! Programs are created with [`ProgramBuilder`], which assigns tokens and CIL byte
//! offsets, or loaded from a JSON description with [`Program::from_json`].
//!
//! # Usage Examples
//!
//! ```rust
//! use throwscope::program::ProgramBuilder;
//!
//! let mut builder = ProgramBuilder::with_framework();
//! let widget = builder.class("App", "App.Widget", "System.Object");
//! let run = builder.method(widget, "Run").body(|b| b.ret())?;
//! let program = builder.build()?;
//!
//! assert_eq!(program.find_method("App.Widget::Run")?, run);
//! assert_eq!(program.method_desc(&run).map(|m| m.full_name()).as_deref(), Some("App.Widget::Run"));
//! # Ok::<(), throwscope::Error>(())
//! ```

mod builder;
mod image;

pub use builder::{BodyBuilder, MethodBuilder, ProgramBuilder};
pub use image::ProgramImage;

use std::{
    collections::{BTreeMap, HashMap},
    path::Path,
    sync::Arc,
};

use crate::{
    analysis::CodeSource,
    assembly::MethodBody,
    metadata::{
        identity::{ClassId, MemberId, MethodId},
        member::{ClassDesc, MethodDesc},
        token::Token,
        types::{TypeHierarchy, TypeRef},
    },
    Error, Result,
};

/// A decoded program: types, methods and bodies of one or more modules.
#[derive(Debug, Clone, Default)]
pub struct Program {
    classes: BTreeMap<ClassId, ClassDesc>,
    types: HashMap<String, ClassId>,
    bases: HashMap<String, TypeRef>,
    methods: BTreeMap<MethodId, MethodDesc>,
    bodies: HashMap<MethodId, Arc<MethodBody>>,
    declaring: HashMap<MethodId, ClassId>,
}

impl Program {
    /// Loads a program from its JSON description.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the text is not a valid [`ProgramImage`], and the errors
    /// of [`ProgramImage::into_program`] if it is inconsistent.
    pub fn from_json(text: &str) -> Result<Program> {
        let image: ProgramImage = serde_json::from_str(text)?;
        image.into_program()
    }

    /// Loads a program from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FileError`] if the file cannot be read, otherwise see
    /// [`Program::from_json`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Program> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// All method declarations, ordered by identity.
    pub fn methods(&self) -> impl Iterator<Item = &MethodDesc> {
        self.methods.values()
    }

    /// All type declarations, ordered by identity.
    pub fn classes(&self) -> impl Iterator<Item = &ClassDesc> {
        self.classes.values()
    }

    /// Number of declared methods.
    #[must_use]
    pub fn method_count(&self) -> usize {
        self.methods.len()
    }

    /// The declaration of `method`, if present.
    #[must_use]
    pub fn method_desc(&self, method: &MethodId) -> Option<&MethodDesc> {
        self.methods.get(method)
    }

    /// The declaration of `class`, if present.
    #[must_use]
    pub fn class_desc(&self, class: &ClassId) -> Option<&ClassDesc> {
        self.classes.get(class)
    }

    /// Returns `true` if `method` has an IL body.
    #[must_use]
    pub fn has_body(&self, method: &MethodId) -> bool {
        self.bodies.contains_key(method)
    }

    /// The type declared under `full_name` (`Ns.Outer/Inner` for nested types).
    #[must_use]
    pub fn find_type(&self, full_name: &str) -> Option<TypeRef> {
        let class = self.types.get(full_name)?;
        self.classes.get(class).map(|desc| desc.type_ref.clone())
    }

    /// The class declared under `full_name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeNotFound`] if no such type is declared.
    pub fn find_class(&self, full_name: &str) -> Result<ClassId> {
        self.types
            .get(full_name)
            .copied()
            .ok_or_else(|| Error::TypeNotFound(full_name.to_string()))
    }

    /// Resolves a method reference written as a token (`0x06000002`) or as
    /// `Ns.Type::Name`.
    ///
    /// Tokens must be unique across modules. Names resolve to the first overload in
    /// token order.
    ///
    /// # Errors
    ///
    /// - [`Error::TypeNotFound`] if the type part of a name is not declared
    /// - [`Error::Malformed`] if nothing matches or a token is ambiguous
    pub fn find_method(&self, reference: &str) -> Result<MethodId> {
        if let Ok(token) = reference.parse::<Token>() {
            let mut matches = self.methods.keys().filter(|id| id.token == token);
            return match (matches.next(), matches.next()) {
                (Some(id), None) => Ok(*id),
                (Some(_), Some(_)) => Err(malformed_error!(
                    "token {} is declared by several modules",
                    token
                )),
                (None, _) => Err(malformed_error!("no method with token {}", token)),
            };
        }

        let Some((type_name, name)) = reference.rsplit_once("::") else {
            return Err(malformed_error!(
                "method reference '{}' is neither a token nor Type::Name",
                reference
            ));
        };
        let class = self.find_class(type_name)?;
        let desc = self
            .classes
            .get(&class)
            .ok_or_else(|| Error::TypeNotFound(type_name.to_string()))?;

        desc.methods
            .iter()
            .filter_map(|id| self.methods.get(id))
            .filter(|method| method.name == name)
            .map(|method| method.id)
            .min()
            .ok_or_else(|| malformed_error!("{} has no method named {}", type_name, name))
    }
}

impl TypeHierarchy for Program {
    fn base_type(&self, ty: &TypeRef) -> Option<TypeRef> {
        self.bases.get(&ty.fullname()).cloned()
    }
}

impl CodeSource for Program {
    fn method(&self, id: &MethodId) -> Result<MethodDesc> {
        self.methods
            .get(id)
            .cloned()
            .ok_or(Error::MemberNotFound(*id))
    }

    fn body(&self, id: &MethodId) -> Result<Option<Arc<MethodBody>>> {
        Ok(self.bodies.get(id).cloned())
    }

    fn class(&self, id: &ClassId) -> Result<ClassDesc> {
        self.classes
            .get(id)
            .cloned()
            .ok_or(Error::MemberNotFound(*id))
    }

    fn declaring_class(&self, member: &MemberId) -> Option<ClassId> {
        self.declaring.get(member).copied()
    }
}
