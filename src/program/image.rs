//! JSON description of a program.
//!
//! The image lists types with their methods. Bodies are written as instruction lists in
//! textual CIL; operands name members and types by their full names, branch targets and
//! handler bounds use labels:
//!
//! ```json
//! {
//!   "types": [{
//!     "assembly": "App",
//!     "name": "App.Store",
//!     "base": "System.Object",
//!     "methods": [{
//!       "name": "Open",
//!       "parameters": ["System.String"],
//!       "body": [
//!         { "label": "try" },
//!         { "op": "newobj", "method": "System.IO.IOException::.ctor" },
//!         { "op": "throw" },
//!         { "label": "handler" },
//!         { "op": "pop" },
//!         { "op": "leave", "target": "end" },
//!         { "label": "end" },
//!         { "op": "ret" }
//!       ],
//!       "handlers": [{
//!         "kind": "catch",
//!         "catch_type": "System.IO.IOException",
//!         "try": ["try", "handler"],
//!         "handler": ["handler", "end"]
//!       }]
//!     }]
//!   }]
//! }
//! ```
//!
//! The framework types of [`ProgramBuilder::framework`] are registered unless
//! `"framework": false` is given.

use serde::Deserialize;

use crate::{
    assembly::Operand,
    metadata::{
        exceptions::HandlerKind,
        identity::{ClassId, MethodId},
        member::{FieldRef, MethodKind, MethodModifiers},
        types::TypeRef,
    },
    program::{BodyBuilder, Program, ProgramBuilder},
    Result,
};

/// Root of a JSON program description.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProgramImage {
    /// Register the built-in framework types
    #[serde(default = "default_true")]
    pub framework: bool,
    /// Top-level types
    #[serde(default)]
    pub types: Vec<TypeImage>,
}

fn default_true() -> bool {
    true
}

/// One type and its members.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TypeImage {
    /// Defining assembly; nested types inherit the outer type's
    #[serde(default)]
    pub assembly: String,
    /// Full name for top-level types, simple name for nested types
    pub name: String,
    /// Full name of the base type, `System.Object` if omitted
    #[serde(default)]
    pub base: Option<String>,
    /// Methods, constructors and accessors
    #[serde(default)]
    pub methods: Vec<MethodImage>,
    /// Nested types
    #[serde(default)]
    pub nested: Vec<TypeImage>,
}

/// One method declaration with an optional body.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MethodImage {
    /// Simple name, `.ctor` for constructors
    pub name: String,
    /// Semantic kind; `.ctor`/`.cctor` imply the constructor kinds
    #[serde(default)]
    pub kind: Option<MethodKind>,
    /// Attribute bits, e.g. `"STATIC | VIRTUAL"`
    #[serde(default)]
    pub modifiers: MethodModifiers,
    /// Parameter type names, `null` for unresolved ones
    #[serde(default)]
    pub parameters: Vec<Option<String>>,
    /// Return type name, omitted for `void`
    #[serde(default)]
    pub returns: Option<String>,
    /// Owning property or event of an accessor
    #[serde(default)]
    pub property: Option<String>,
    /// Local variable type names
    #[serde(default)]
    pub locals: Vec<Option<String>>,
    /// Instructions and labels; a method without body is declared body-less
    #[serde(default)]
    pub body: Option<Vec<BodyItem>>,
    /// Exception handler regions
    #[serde(default)]
    pub handlers: Vec<HandlerImage>,
}

/// A label or an instruction.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum BodyItem {
    /// Defines a label at the next instruction
    Label {
        /// Label name
        label: String,
    },
    /// An instruction
    Instruction(InstructionImage),
}

/// One instruction: a mnemonic plus at most one operand field.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InstructionImage {
    /// Mnemonic
    pub op: String,
    /// Method reference, `Ns.Type::Name` or a token
    pub method: Option<String>,
    /// Field reference
    pub field: Option<FieldImage>,
    /// Type name
    #[serde(rename = "type")]
    pub type_name: Option<String>,
    /// Branch target label
    pub target: Option<String>,
    /// Switch target labels
    pub targets: Option<Vec<String>>,
    /// Immediate value
    pub value: Option<i64>,
    /// String literal
    pub string: Option<String>,
    /// Local variable index
    pub local: Option<u16>,
    /// Argument index
    pub arg: Option<u16>,
}

/// A field reference.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldImage {
    /// Declaring type name
    #[serde(rename = "type")]
    pub declaring_type: String,
    /// Field name
    pub name: String,
    /// Field type name
    #[serde(default)]
    pub field_type: Option<String>,
}

/// One exception handler region, bounded by labels.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HandlerImage {
    /// Clause kind
    #[serde(default)]
    pub kind: HandlerKind,
    /// Caught type name
    #[serde(default)]
    pub catch_type: Option<String>,
    /// Start and end label of the protected range
    #[serde(rename = "try")]
    pub try_range: (String, String),
    /// Start and end label of the handler
    pub handler: (String, String),
}

impl ProgramImage {
    /// Builds the described program.
    ///
    /// Types are declared first, then all method signatures, then bodies, so bodies
    /// may reference any method in the image regardless of order.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::InvalidMnemonic`] for unknown opcodes
    /// - [`crate::Error::UndefinedLabel`], [`crate::Error::DuplicateLabel`] for label
    ///   mistakes
    /// - [`crate::Error::Malformed`] and [`crate::Error::TypeNotFound`] for unresolved
    ///   method references and cyclic hierarchies
    pub fn into_program(self) -> Result<Program> {
        let mut builder = if self.framework {
            ProgramBuilder::with_framework()
        } else {
            ProgramBuilder::new()
        };

        let mut classes = Vec::new();
        for ty in &self.types {
            declare_type(&mut builder, ty, None, &mut classes)?;
        }

        let mut methods = Vec::new();
        for (class, ty) in &classes {
            let assembly = builder
                .type_ref(*class)
                .map(|t| t.assembly)
                .unwrap_or_default();
            for method in &ty.methods {
                let id = declare_method(&mut builder, *class, &assembly, method)?;
                methods.push((id, assembly.clone(), method));
            }
        }

        for (id, assembly, method) in methods {
            let Some(items) = &method.body else {
                continue;
            };
            let assembled = assemble(&builder, &assembly, method, items)?;
            builder.set_body(id, move |b| {
                *b = assembled;
                Ok(())
            })?;
        }

        builder.build()
    }
}

fn declare_type<'i>(
    builder: &mut ProgramBuilder,
    ty: &'i TypeImage,
    outer: Option<ClassId>,
    classes: &mut Vec<(ClassId, &'i TypeImage)>,
) -> Result<()> {
    let base = ty.base.as_deref().unwrap_or("System.Object");
    let class = match outer {
        Some(outer) => builder.nested_class(outer, &ty.name, base)?,
        None => builder.class(&ty.assembly, &ty.name, base),
    };
    classes.push((class, ty));

    for nested in &ty.nested {
        declare_type(builder, nested, Some(class), classes)?;
    }
    Ok(())
}

fn declare_method(
    builder: &mut ProgramBuilder,
    class: ClassId,
    assembly: &str,
    method: &MethodImage,
) -> Result<MethodId> {
    let kind = method.kind.unwrap_or(match method.name.as_str() {
        ".ctor" => MethodKind::Constructor,
        ".cctor" => MethodKind::StaticConstructor,
        _ => MethodKind::Method,
    });
    let parameters: Vec<Option<TypeRef>> = method
        .parameters
        .iter()
        .map(|p| p.as_deref().map(|name| builder.resolve_type(name, assembly)))
        .collect();
    let returns = method
        .returns
        .as_deref()
        .map(|name| builder.resolve_type(name, assembly));

    let mut declared = builder
        .method(class, &method.name)
        .kind(kind)
        .modifiers(method.modifiers)
        .parameters(parameters);
    if kind.is_constructor() {
        declared = declared.modifiers(MethodModifiers::SPECIAL_NAME);
    }
    if let Some(returns) = returns {
        declared = declared.returns(returns);
    }
    if let Some(property) = &method.property {
        declared = declared.property(property);
    }
    declared.declare()
}

/// Assembles the body of `method` against the declarations in `builder`.
fn assemble(
    builder: &ProgramBuilder,
    assembly: &str,
    method: &MethodImage,
    items: &[BodyItem],
) -> Result<BodyBuilder> {
    let resolve = |name: &str| builder.resolve_type(name, assembly);
    let mut b = BodyBuilder::new();

    for local in &method.locals {
        b.local(local.as_deref().map(resolve));
    }

    for item in items {
        match item {
            BodyItem::Label { label } => b.label(label)?,
            BodyItem::Instruction(instr) => {
                if let Some(target) = &instr.target {
                    b.branch(&instr.op, target)?;
                } else if let Some(targets) = &instr.targets {
                    let targets: Vec<&str> = targets.iter().map(String::as_str).collect();
                    b.switch(&targets)?;
                } else {
                    let operand = operand(builder, instr, &resolve)?;
                    b.emit(&instr.op, operand)?;
                }
            }
        }
    }

    for handler in &method.handlers {
        b.try_region(
            handler.kind,
            handler.catch_type.as_deref().map(resolve),
            (&handler.try_range.0, &handler.try_range.1),
            (&handler.handler.0, &handler.handler.1),
        );
    }

    Ok(b)
}

fn operand(
    builder: &ProgramBuilder,
    instr: &InstructionImage,
    resolve: &dyn Fn(&str) -> TypeRef,
) -> Result<Operand> {
    if let Some(method) = &instr.method {
        return Ok(Operand::Method(builder.find_method(method)?));
    }
    if let Some(field) = &instr.field {
        return Ok(Operand::Field(FieldRef {
            declaring_type: resolve(&field.declaring_type),
            name: field.name.clone(),
            field_type: field.field_type.as_deref().map(resolve),
        }));
    }
    if let Some(ty) = &instr.type_name {
        return Ok(Operand::Type(resolve(ty)));
    }
    if let Some(value) = &instr.string {
        return Ok(Operand::String(value.clone()));
    }
    if let Some(local) = instr.local {
        return Ok(Operand::Local(local));
    }
    if let Some(arg) = instr.arg {
        return Ok(Operand::Argument(arg));
    }
    Ok(instr.value.map_or(Operand::None, Operand::Immediate))
}
