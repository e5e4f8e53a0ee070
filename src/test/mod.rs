//! Shared fixtures for unit tests.

use crate::{
    metadata::{
        identity::{MethodId, ModuleId},
        member::MethodModifiers,
        token::Token,
        types::TypeRef,
    },
    program::{Program, ProgramBuilder},
};

/// A `MethodDef` identity in the `Test.dll` module.
pub fn method_id(row: u32) -> MethodId {
    MethodId::new(
        ModuleId::from_name("Test.dll"),
        Token::from_parts(Token::METHOD_DEF, row),
    )
}

/// A framework type by full name.
pub fn exception_type(full_name: &str) -> TypeRef {
    TypeRef::parse("mscorlib", full_name)
}

/// A builder with the framework exception types registered.
pub fn framework_program() -> ProgramBuilder {
    ProgramBuilder::with_framework()
}

/// The framework type hierarchy on its own.
pub fn hierarchy() -> Program {
    framework_program()
        .build()
        .expect("framework types form a valid hierarchy")
}

/// `A -> B -> C` where `C` throws a new `InvalidOperationException` that nobody catches.
///
/// Returns the program and the ids of `[A, B, C]`.
pub fn throwing_chain() -> (Program, [MethodId; 3]) {
    let mut builder = framework_program();
    let class = builder.class("App", "App.Chain", "System.Object");
    let ctor = builder
        .constructor_of("System.InvalidOperationException")
        .expect("framework constructor");

    let c = builder
        .method(class, "C")
        .modifiers(MethodModifiers::STATIC)
        .body(|b| {
            b.newobj(ctor)?;
            b.throw()
        })
        .expect("C");
    let b = builder
        .method(class, "B")
        .modifiers(MethodModifiers::STATIC)
        .body(|b| {
            b.call(c)?;
            b.ret()
        })
        .expect("B");
    let a = builder
        .method(class, "A")
        .modifiers(MethodModifiers::STATIC)
        .body(|body| {
            body.call(b)?;
            body.ret()
        })
        .expect("A");

    (builder.build().expect("chain program"), [a, b, c])
}
