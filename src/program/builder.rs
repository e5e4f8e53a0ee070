//! Fluent construction of programs and method bodies.
//!
//! [`ProgramBuilder`] allocates `TypeDef`/`MethodDef` tokens per assembly and keeps the
//! base-type relation. [`BodyBuilder`] assembles one method body from mnemonics, assigning
//! CIL byte offsets, resolving labels and recording exception handler regions.
//!
//! Call-family stack shapes are filled in when the program is built, from the declared
//! signatures of the callees, the same way a decoder reports them.

use std::{collections::HashMap, sync::Arc};

use crate::{
    assembly::{Instruction, MethodBody, OpCode, OpCodeInfo, Operand, OperandType, StackBehavior},
    metadata::{
        exceptions::{HandlerKind, HandlerRegion},
        identity::{ClassId, MethodId, ModuleId},
        member::{ClassDesc, FieldRef, MethodDesc, MethodKind, MethodModifiers},
        token::Token,
        types::{TypeRef, MAX_HIERARCHY_DEPTH, OBJECT_TYPE},
    },
    program::Program,
    Error, Result,
};

/// Assembly the framework types are registered in.
pub const FRAMEWORK_ASSEMBLY: &str = "mscorlib";

/// Framework types registered by [`ProgramBuilder::framework`], with their base types.
const FRAMEWORK_TYPES: &[(&str, &str)] = &[
    ("System.String", OBJECT_TYPE),
    ("System.Exception", OBJECT_TYPE),
    ("System.SystemException", "System.Exception"),
    ("System.IO.IOException", "System.SystemException"),
    ("System.IO.FileNotFoundException", "System.IO.IOException"),
    ("System.ArgumentException", "System.SystemException"),
    ("System.ArgumentNullException", "System.ArgumentException"),
    ("System.InvalidOperationException", "System.SystemException"),
    ("System.NotSupportedException", "System.SystemException"),
];

#[derive(Debug, Default, Clone, Copy)]
struct Rows {
    types: u32,
    methods: u32,
}

/// Builds a [`Program`].
#[derive(Debug, Default)]
pub struct ProgramBuilder {
    program: Program,
    bodies: HashMap<MethodId, MethodBody>,
    bases: Vec<(String, String, String)>,
    rows: HashMap<String, Rows>,
}

impl ProgramBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder with the framework types already registered.
    #[must_use]
    pub fn with_framework() -> Self {
        let mut builder = Self::new();
        builder.framework();
        builder
    }

    /// Registers `System.Object`, `System.String` and the common exception types in
    /// [`FRAMEWORK_ASSEMBLY`], each with a body-less parameterless constructor.
    pub fn framework(&mut self) -> &mut Self {
        let object = self.declare_class(FRAMEWORK_ASSEMBLY, OBJECT_TYPE, None);
        self.framework_constructor(object);

        for &(name, base) in FRAMEWORK_TYPES {
            let class = self.declare_class(FRAMEWORK_ASSEMBLY, name, Some(base));
            self.framework_constructor(class);
        }
        self
    }

    fn framework_constructor(&mut self, class: ClassId) {
        let declared = self
            .constructor(class)
            .modifiers(MethodModifiers::INTERNAL_CALL)
            .declare();
        if let Err(e) = declared {
            log::debug!("framework constructor not declared: {e}");
        }
    }

    /// Declares a top-level type, or returns the existing one with the same full name.
    ///
    /// `base` is resolved when the program is built: it may be declared later, and an
    /// undeclared base is assumed to live in the same assembly.
    pub fn class(&mut self, assembly: &str, full_name: &str, base: &str) -> ClassId {
        self.declare_class(assembly, full_name, Some(base))
    }

    /// Declares a type nested in `outer`, named `Outer/Name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MemberNotFound`] if `outer` was not declared by this builder.
    pub fn nested_class(&mut self, outer: ClassId, name: &str, base: &str) -> Result<ClassId> {
        let outer_type = self.type_ref(outer).ok_or(Error::MemberNotFound(outer))?;
        let full_name = format!("{}/{}", outer_type.fullname(), name);

        let nested = self.declare_class(&outer_type.assembly, &full_name, Some(base));
        if let Some(desc) = self.program.classes.get_mut(&outer) {
            if !desc.nested_types.contains(&nested) {
                desc.nested_types.push(nested);
            }
        }
        Ok(nested)
    }

    fn declare_class(&mut self, assembly: &str, full_name: &str, base: Option<&str>) -> ClassId {
        if let Some(existing) = self.program.types.get(full_name) {
            return *existing;
        }

        let rows = self.rows.entry(assembly.to_string()).or_default();
        rows.types += 1;
        let id = ClassId::new(
            ModuleId::from_name(assembly),
            Token::from_parts(Token::TYPE_DEF, rows.types),
        );

        let type_ref = TypeRef::parse(assembly, full_name);
        if let Some(base) = base {
            self.bases
                .push((full_name.to_string(), base.to_string(), assembly.to_string()));
        }
        self.program.types.insert(full_name.to_string(), id);
        self.program.classes.insert(
            id,
            ClassDesc {
                id,
                type_ref,
                methods: Vec::new(),
                nested_types: Vec::new(),
            },
        );
        id
    }

    /// The declared type with `full_name`, or a reference into `assembly`.
    pub(crate) fn resolve_type(&self, full_name: &str, assembly: &str) -> TypeRef {
        self.program
            .find_type(full_name)
            .unwrap_or_else(|| TypeRef::parse(assembly, full_name))
    }

    /// The type reference of a declared class.
    #[must_use]
    pub fn type_ref(&self, class: ClassId) -> Option<TypeRef> {
        self.program
            .classes
            .get(&class)
            .map(|desc| desc.type_ref.clone())
    }

    /// The declared type with `full_name`, if any.
    #[must_use]
    pub fn find_type(&self, full_name: &str) -> Option<TypeRef> {
        self.program.find_type(full_name)
    }

    /// The class declared under `full_name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeNotFound`] if no such type is declared.
    pub fn find_class(&self, full_name: &str) -> Result<ClassId> {
        self.program.find_class(full_name)
    }

    /// Resolves a declared method by token or `Ns.Type::Name`, see
    /// [`Program::find_method`].
    ///
    /// # Errors
    ///
    /// Same as [`Program::find_method`].
    pub fn find_method(&self, reference: &str) -> Result<MethodId> {
        self.program.find_method(reference)
    }

    /// Starts declaring an ordinary instance method of `class`.
    pub fn method(&mut self, class: ClassId, name: &str) -> MethodBuilder<'_> {
        let declaring_type = self.type_ref(class);
        MethodBuilder {
            builder: self,
            class,
            declaring_type,
            name: name.to_string(),
            kind: MethodKind::Method,
            modifiers: MethodModifiers::empty(),
            parameters: Vec::new(),
            return_type: None,
            property: None,
        }
    }

    /// Starts declaring an instance constructor of `class`.
    pub fn constructor(&mut self, class: ClassId) -> MethodBuilder<'_> {
        self.method(class, ".ctor")
            .kind(MethodKind::Constructor)
            .modifiers(MethodModifiers::SPECIAL_NAME)
    }

    /// The first declared constructor of the type named `full_name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeNotFound`] if the type is not declared or has no constructor.
    pub fn constructor_of(&self, full_name: &str) -> Result<MethodId> {
        let class = self.program.find_class(full_name)?;
        self.program
            .classes
            .get(&class)
            .into_iter()
            .flat_map(|desc| desc.methods.iter())
            .find(|id| {
                self.program
                    .methods
                    .get(id)
                    .is_some_and(|m| m.kind == MethodKind::Constructor)
            })
            .copied()
            .ok_or_else(|| Error::TypeNotFound(format!("{full_name}::.ctor")))
    }

    /// Assembles the body of an already declared method, replacing any previous body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MemberNotFound`] for an undeclared method, and any error returned
    /// by `assemble` or by [`BodyBuilder::build`].
    pub fn set_body<F>(&mut self, method: MethodId, assemble: F) -> Result<()>
    where
        F: FnOnce(&mut BodyBuilder) -> Result<()>,
    {
        if !self.program.methods.contains_key(&method) {
            return Err(Error::MemberNotFound(method));
        }

        let mut body = BodyBuilder::new();
        assemble(&mut body)?;
        self.bodies.insert(method, body.build()?);
        Ok(())
    }

    fn allocate_method(&mut self, assembly: &str) -> MethodId {
        let rows = self.rows.entry(assembly.to_string()).or_default();
        rows.methods += 1;
        MethodId::new(
            ModuleId::from_name(assembly),
            Token::from_parts(Token::METHOD_DEF, rows.methods),
        )
    }

    fn insert_method(&mut self, class: ClassId, desc: MethodDesc) {
        let id = desc.id;
        if let Some(class_desc) = self.program.classes.get_mut(&class) {
            class_desc.methods.push(id);
        }
        self.program.declaring.insert(id, class);
        self.program.methods.insert(id, desc);
    }

    /// Finishes the program.
    ///
    /// Base types are resolved, and call-family instructions and `ret` get the stack
    /// shape of their target's declared signature.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if the declared base types form a cycle.
    pub fn build(self) -> Result<Program> {
        let ProgramBuilder {
            mut program,
            bodies,
            bases,
            ..
        } = self;

        for (full_name, base, assembly) in bases {
            let base = program
                .find_type(&base)
                .unwrap_or_else(|| TypeRef::parse(assembly, &base));
            program.bases.insert(full_name, base);
        }
        check_hierarchy(&program)?;

        for (id, mut body) in bodies {
            let returns = program
                .methods
                .get(&id)
                .is_some_and(|desc| desc.return_type.is_some());

            for instr in &mut body.instructions {
                if let Some((pops, pushes)) = stack_shape(&program, instr, returns) {
                    instr.stack_behavior = StackBehavior::new(pops, pushes);
                }
            }
            program.bodies.insert(id, Arc::new(body));
        }

        Ok(program)
    }
}

fn check_hierarchy(program: &Program) -> Result<()> {
    for name in program.bases.keys() {
        let mut current = name.clone();
        let mut steps = 0;
        while let Some(base) = program.bases.get(&current) {
            steps += 1;
            if steps > MAX_HIERARCHY_DEPTH {
                return Err(malformed_error!("base types of {} form a cycle", name));
            }
            current = base.fullname();
        }
    }
    Ok(())
}

/// The signature-dependent stack shape of `instr`, if it has one and it is known.
fn stack_shape(program: &Program, instr: &Instruction, returns: bool) -> Option<(u8, u8)> {
    let count = |n: usize| u8::try_from(n).unwrap_or(u8::MAX);

    match (instr.opcode, &instr.operand) {
        (OpCode::Ret, _) => Some((u8::from(returns), 0)),
        (OpCode::Call | OpCode::CallVirt | OpCode::NewObj, Operand::Method(callee)) => {
            let callee = program.methods.get(callee)?;
            let constructs = instr.opcode == OpCode::NewObj;
            let receiver = !callee.is_static() && !constructs;
            Some((
                count(callee.parameters.len() + usize::from(receiver)),
                u8::from(callee.result_type(constructs).is_some()),
            ))
        }
        _ => None,
    }
}

/// Declares one method of a [`ProgramBuilder`].
#[derive(Debug)]
pub struct MethodBuilder<'b> {
    builder: &'b mut ProgramBuilder,
    class: ClassId,
    declaring_type: Option<TypeRef>,
    name: String,
    kind: MethodKind,
    modifiers: MethodModifiers,
    parameters: Vec<Option<TypeRef>>,
    return_type: Option<TypeRef>,
    property: Option<String>,
}

impl<'b> MethodBuilder<'b> {
    /// Sets the semantic kind.
    #[must_use]
    pub fn kind(mut self, kind: MethodKind) -> Self {
        self.kind = kind;
        if kind == MethodKind::StaticConstructor {
            self.modifiers |= MethodModifiers::STATIC | MethodModifiers::SPECIAL_NAME;
        }
        self
    }

    /// Adds attribute bits.
    #[must_use]
    pub fn modifiers(mut self, modifiers: MethodModifiers) -> Self {
        self.modifiers |= modifiers;
        self
    }

    /// Replaces the parameter list.
    #[must_use]
    pub fn parameters(mut self, parameters: Vec<Option<TypeRef>>) -> Self {
        self.parameters = parameters;
        self
    }

    /// Appends a parameter.
    #[must_use]
    pub fn parameter(mut self, ty: TypeRef) -> Self {
        self.parameters.push(Some(ty));
        self
    }

    /// Sets the return type.
    #[must_use]
    pub fn returns(mut self, ty: TypeRef) -> Self {
        self.return_type = Some(ty);
        self
    }

    /// Marks the method as an accessor of `property`.
    #[must_use]
    pub fn property(mut self, property: &str) -> Self {
        self.property = Some(property.to_string());
        self
    }

    fn register(self) -> Result<(&'b mut ProgramBuilder, MethodId)> {
        let MethodBuilder {
            builder,
            class,
            declaring_type,
            name,
            kind,
            modifiers,
            parameters,
            return_type,
            property,
        } = self;
        let declaring_type = declaring_type.ok_or(Error::MemberNotFound(class))?;

        let id = builder.allocate_method(&declaring_type.assembly);
        let mut desc = MethodDesc::new(id, declaring_type, name);
        desc.kind = kind;
        desc.modifiers = modifiers;
        desc.parameters = parameters;
        desc.return_type = return_type;
        desc.property = property;

        builder.insert_method(class, desc);
        Ok((builder, id))
    }

    /// Declares the method without a body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MemberNotFound`] if the declaring class is unknown.
    pub fn declare(self) -> Result<MethodId> {
        self.register().map(|(_, id)| id)
    }

    /// Declares the method and assembles its body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MemberNotFound`] if the declaring class is unknown, and any error
    /// of [`ProgramBuilder::set_body`].
    pub fn body<F>(self, assemble: F) -> Result<MethodId>
    where
        F: FnOnce(&mut BodyBuilder) -> Result<()>,
    {
        let (builder, id) = self.register()?;
        builder.set_body(id, assemble)?;
        Ok(id)
    }
}

#[derive(Debug, Clone)]
struct PendingRegion {
    kind: HandlerKind,
    catch_type: Option<TypeRef>,
    try_start: String,
    try_end: String,
    handler_start: String,
    handler_end: String,
}

/// Assembles one method body.
///
/// Branch targets and handler bounds are written as labels and resolved by
/// [`BodyBuilder::build`].
///
/// # Examples
///
/// ```rust
/// use throwscope::program::BodyBuilder;
///
/// let mut b = BodyBuilder::new();
/// b.ldarg(1)?;
/// b.brtrue("skip")?;
/// b.ldnull()?;
/// b.throw()?;
/// b.label("skip")?;
/// b.ret()?;
///
/// let body = b.build()?;
/// assert_eq!(body.instructions.len(), 5);
/// assert_eq!(body.instructions[1].operand.target(), Some(8));
/// # Ok::<(), throwscope::Error>(())
/// ```
#[derive(Debug, Default)]
pub struct BodyBuilder {
    instructions: Vec<Instruction>,
    offset: u32,
    locals: Vec<Option<TypeRef>>,
    labels: HashMap<String, u32>,
    fixups: Vec<(usize, Vec<String>)>,
    regions: Vec<PendingRegion>,
    fresh: usize,
}

impl BodyBuilder {
    /// Creates an empty body.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Offset of the next instruction.
    #[must_use]
    pub fn current_position(&self) -> u32 {
        self.offset
    }

    /// Declares a local variable and returns its index.
    pub fn local(&mut self, ty: Option<TypeRef>) -> u16 {
        let index = u16::try_from(self.locals.len()).unwrap_or(u16::MAX);
        self.locals.push(ty);
        index
    }

    /// Defines `name` at the current position.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateLabel`] if `name` is already defined.
    pub fn label(&mut self, name: &str) -> Result<()> {
        if self.labels.contains_key(name) {
            return Err(Error::DuplicateLabel(name.to_string()));
        }
        self.labels.insert(name.to_string(), self.offset);
        Ok(())
    }

    fn fresh_label(&mut self, hint: &str) -> String {
        self.fresh += 1;
        format!("@{hint}{}", self.fresh)
    }

    fn mark(&mut self, hint: &str) -> Result<String> {
        let name = self.fresh_label(hint);
        self.label(&name)?;
        Ok(name)
    }

    /// Appends an instruction.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidMnemonic`] for an unknown mnemonic.
    pub fn emit(&mut self, mnemonic: &str, operand: Operand) -> Result<()> {
        let instr = Instruction::decode(self.offset, mnemonic, operand)?;
        self.offset = instr.next_offset();
        self.instructions.push(instr);
        Ok(())
    }

    /// Appends a branch (`br`, `brtrue.s`, `leave`, ...) to `label`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidMnemonic`] for an unknown mnemonic and
    /// [`Error::Malformed`] if the opcode does not take a branch target.
    pub fn branch(&mut self, mnemonic: &str, label: &str) -> Result<()> {
        let info = OpCodeInfo::lookup(mnemonic)
            .ok_or_else(|| Error::InvalidMnemonic(mnemonic.to_string()))?;
        if !matches!(info.operand, OperandType::Target | OperandType::ShortTarget) {
            return Err(malformed_error!("{} does not take a branch target", mnemonic));
        }

        self.fixups
            .push((self.instructions.len(), vec![label.to_string()]));
        self.emit(mnemonic, Operand::Target(0))
    }

    /// Appends a `switch` over `labels`.
    ///
    /// # Errors
    ///
    /// Never fails before [`BodyBuilder::build`] resolves the labels.
    pub fn switch(&mut self, labels: &[&str]) -> Result<()> {
        self.fixups.push((
            self.instructions.len(),
            labels.iter().map(|l| (*l).to_string()).collect(),
        ));
        self.emit("switch", Operand::Switch(vec![0; labels.len()]))
    }

    /// Records a handler region whose bounds are given as labels.
    pub fn try_region(
        &mut self,
        kind: HandlerKind,
        catch_type: Option<TypeRef>,
        try_bounds: (&str, &str),
        handler_bounds: (&str, &str),
    ) {
        self.regions.push(PendingRegion {
            kind,
            catch_type,
            try_start: try_bounds.0.to_string(),
            try_end: try_bounds.1.to_string(),
            handler_start: handler_bounds.0.to_string(),
            handler_end: handler_bounds.1.to_string(),
        });
    }

    /// Emits `try { protected } catch (catch_type) { handler }`.
    ///
    /// Both blocks are closed with a `leave` to the instruction following the handler.
    /// The handler starts with the exception object on the stack.
    ///
    /// # Errors
    ///
    /// Returns any error raised while assembling either block.
    pub fn try_catch<T, H>(&mut self, protected: T, catch_type: TypeRef, handler: H) -> Result<()>
    where
        T: FnOnce(&mut Self) -> Result<()>,
        H: FnOnce(&mut Self) -> Result<()>,
    {
        let end = self.fresh_label("end");
        let try_start = self.mark("try")?;
        protected(self)?;
        self.leave(&end)?;

        let handler_start = self.mark("catch")?;
        handler(self)?;
        self.leave(&end)?;
        self.label(&end)?;

        self.try_region(
            HandlerKind::Catch,
            Some(catch_type),
            (&try_start, &handler_start),
            (&handler_start, &end),
        );
        Ok(())
    }

    /// Emits `try { protected } finally { finally }`.
    ///
    /// # Errors
    ///
    /// Returns any error raised while assembling either block.
    pub fn try_finally<T, F>(&mut self, protected: T, finally: F) -> Result<()>
    where
        T: FnOnce(&mut Self) -> Result<()>,
        F: FnOnce(&mut Self) -> Result<()>,
    {
        let end = self.fresh_label("end");
        let try_start = self.mark("try")?;
        protected(self)?;
        self.leave(&end)?;

        let handler_start = self.mark("finally")?;
        finally(self)?;
        self.emit("endfinally", Operand::None)?;
        self.label(&end)?;

        self.try_region(
            HandlerKind::Finally,
            None,
            (&try_start, &handler_start),
            (&handler_start, &end),
        );
        Ok(())
    }

    /// Resolves labels and produces the body.
    ///
    /// # Errors
    ///
    /// - [`Error::UndefinedLabel`] if a branch or region names an undefined label
    /// - [`Error::Malformed`] if a region ends before it starts or the body is
    ///   inconsistent
    pub fn build(self) -> Result<MethodBody> {
        let BodyBuilder {
            mut instructions,
            locals,
            labels,
            fixups,
            regions,
            ..
        } = self;
        let resolve = |label: &str| {
            labels
                .get(label)
                .copied()
                .ok_or_else(|| Error::UndefinedLabel(label.to_string()))
        };

        for (index, targets) in fixups {
            let Some(instr) = instructions.get_mut(index) else {
                continue;
            };
            let resolved = targets
                .iter()
                .map(|label| resolve(label))
                .collect::<Result<Vec<u32>>>()?;
            instr.operand = match instr.operand {
                Operand::Switch(_) => Operand::Switch(resolved),
                _ => Operand::Target(resolved.first().copied().unwrap_or_default()),
            };
        }

        let mut handlers = Vec::with_capacity(regions.len());
        for region in regions {
            let try_offset = resolve(&region.try_start)?;
            let handler_offset = resolve(&region.handler_start)?;
            let try_length = resolve(&region.try_end)?
                .checked_sub(try_offset)
                .ok_or_else(|| malformed_error!("try region ends before {}", region.try_start))?;
            let handler_length = resolve(&region.handler_end)?
                .checked_sub(handler_offset)
                .ok_or_else(|| {
                    malformed_error!("handler region ends before {}", region.handler_start)
                })?;

            handlers.push(HandlerRegion {
                try_offset,
                try_length,
                handler_offset,
                handler_length,
                kind: region.kind,
                catch_type: region.catch_type,
            });
        }

        MethodBody::new(instructions, handlers, locals)
    }

    fn indexed(&mut self, name: &str, compact: bool, index: u16, operand: Operand) -> Result<()> {
        if compact && index < 4 {
            self.emit(&format!("{name}.{index}"), operand)
        } else if index <= u16::from(u8::MAX) {
            self.emit(&format!("{name}.s"), operand)
        } else {
            self.emit(name, operand)
        }
    }

    /// `nop`
    ///
    /// # Errors
    ///
    /// Infallible in practice; see [`BodyBuilder::emit`].
    pub fn nop(&mut self) -> Result<()> {
        self.emit("nop", Operand::None)
    }

    /// `ret`
    ///
    /// # Errors
    ///
    /// Infallible in practice; see [`BodyBuilder::emit`].
    pub fn ret(&mut self) -> Result<()> {
        self.emit("ret", Operand::None)
    }

    /// `throw`
    ///
    /// # Errors
    ///
    /// Infallible in practice; see [`BodyBuilder::emit`].
    pub fn throw(&mut self) -> Result<()> {
        self.emit("throw", Operand::None)
    }

    /// `rethrow`
    ///
    /// # Errors
    ///
    /// Infallible in practice; see [`BodyBuilder::emit`].
    pub fn rethrow(&mut self) -> Result<()> {
        self.emit("rethrow", Operand::None)
    }

    /// `pop`
    ///
    /// # Errors
    ///
    /// Infallible in practice; see [`BodyBuilder::emit`].
    pub fn pop(&mut self) -> Result<()> {
        self.emit("pop", Operand::None)
    }

    /// `dup`
    ///
    /// # Errors
    ///
    /// Infallible in practice; see [`BodyBuilder::emit`].
    pub fn dup(&mut self) -> Result<()> {
        self.emit("dup", Operand::None)
    }

    /// `ldnull`
    ///
    /// # Errors
    ///
    /// Infallible in practice; see [`BodyBuilder::emit`].
    pub fn ldnull(&mut self) -> Result<()> {
        self.emit("ldnull", Operand::None)
    }

    /// `ldstr`
    ///
    /// # Errors
    ///
    /// Infallible in practice; see [`BodyBuilder::emit`].
    pub fn ldstr(&mut self, value: &str) -> Result<()> {
        self.emit("ldstr", Operand::String(value.to_string()))
    }

    /// `call`
    ///
    /// # Errors
    ///
    /// Infallible in practice; see [`BodyBuilder::emit`].
    pub fn call(&mut self, method: MethodId) -> Result<()> {
        self.emit("call", Operand::Method(method))
    }

    /// `callvirt`
    ///
    /// # Errors
    ///
    /// Infallible in practice; see [`BodyBuilder::emit`].
    pub fn callvirt(&mut self, method: MethodId) -> Result<()> {
        self.emit("callvirt", Operand::Method(method))
    }

    /// `newobj`
    ///
    /// # Errors
    ///
    /// Infallible in practice; see [`BodyBuilder::emit`].
    pub fn newobj(&mut self, constructor: MethodId) -> Result<()> {
        self.emit("newobj", Operand::Method(constructor))
    }

    /// `ldftn`
    ///
    /// # Errors
    ///
    /// Infallible in practice; see [`BodyBuilder::emit`].
    pub fn ldftn(&mut self, method: MethodId) -> Result<()> {
        self.emit("ldftn", Operand::Method(method))
    }

    /// `ldvirtftn`
    ///
    /// # Errors
    ///
    /// Infallible in practice; see [`BodyBuilder::emit`].
    pub fn ldvirtftn(&mut self, method: MethodId) -> Result<()> {
        self.emit("ldvirtftn", Operand::Method(method))
    }

    /// `ldarg`, in its shortest form.
    ///
    /// # Errors
    ///
    /// Infallible in practice; see [`BodyBuilder::emit`].
    pub fn ldarg(&mut self, index: u16) -> Result<()> {
        self.indexed("ldarg", true, index, Operand::Argument(index))
    }

    /// `starg`, in its shortest form.
    ///
    /// # Errors
    ///
    /// Infallible in practice; see [`BodyBuilder::emit`].
    pub fn starg(&mut self, index: u16) -> Result<()> {
        self.indexed("starg", false, index, Operand::Argument(index))
    }

    /// `ldloc`, in its shortest form.
    ///
    /// # Errors
    ///
    /// Infallible in practice; see [`BodyBuilder::emit`].
    pub fn ldloc(&mut self, index: u16) -> Result<()> {
        self.indexed("ldloc", true, index, Operand::Local(index))
    }

    /// `ldloca`, in its shortest form.
    ///
    /// # Errors
    ///
    /// Infallible in practice; see [`BodyBuilder::emit`].
    pub fn ldloca(&mut self, index: u16) -> Result<()> {
        self.indexed("ldloca", false, index, Operand::Local(index))
    }

    /// `stloc`, in its shortest form.
    ///
    /// # Errors
    ///
    /// Infallible in practice; see [`BodyBuilder::emit`].
    pub fn stloc(&mut self, index: u16) -> Result<()> {
        self.indexed("stloc", true, index, Operand::Local(index))
    }

    /// `ldfld`
    ///
    /// # Errors
    ///
    /// Infallible in practice; see [`BodyBuilder::emit`].
    pub fn ldfld(&mut self, field: FieldRef) -> Result<()> {
        self.emit("ldfld", Operand::Field(field))
    }

    /// `stfld`
    ///
    /// # Errors
    ///
    /// Infallible in practice; see [`BodyBuilder::emit`].
    pub fn stfld(&mut self, field: FieldRef) -> Result<()> {
        self.emit("stfld", Operand::Field(field))
    }

    /// `ldsfld`
    ///
    /// # Errors
    ///
    /// Infallible in practice; see [`BodyBuilder::emit`].
    pub fn ldsfld(&mut self, field: FieldRef) -> Result<()> {
        self.emit("ldsfld", Operand::Field(field))
    }

    /// `castclass`
    ///
    /// # Errors
    ///
    /// Infallible in practice; see [`BodyBuilder::emit`].
    pub fn castclass(&mut self, ty: TypeRef) -> Result<()> {
        self.emit("castclass", Operand::Type(ty))
    }

    /// `isinst`
    ///
    /// # Errors
    ///
    /// Infallible in practice; see [`BodyBuilder::emit`].
    pub fn isinst(&mut self, ty: TypeRef) -> Result<()> {
        self.emit("isinst", Operand::Type(ty))
    }

    /// `leave` to `label`
    ///
    /// # Errors
    ///
    /// Infallible in practice; the label is resolved by [`BodyBuilder::build`].
    pub fn leave(&mut self, label: &str) -> Result<()> {
        self.branch("leave", label)
    }

    /// `br` to `label`
    ///
    /// # Errors
    ///
    /// Infallible in practice; the label is resolved by [`BodyBuilder::build`].
    pub fn br(&mut self, label: &str) -> Result<()> {
        self.branch("br", label)
    }

    /// `brtrue` to `label`
    ///
    /// # Errors
    ///
    /// Infallible in practice; the label is resolved by [`BodyBuilder::build`].
    pub fn brtrue(&mut self, label: &str) -> Result<()> {
        self.branch("brtrue", label)
    }
}
