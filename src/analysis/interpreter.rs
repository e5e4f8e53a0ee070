//! Symbolic stack interpreter.
//!
//! Walks one method body once, in offset order, tracking the static type of every
//! evaluation stack slot, local and argument. Values are never modelled, only types.
//! The walk reports two kinds of events: exceptions raised by `throw`/`rethrow` with a
//! known type, and call-family instructions whose target resolves to a method
//! declaration.
//!
//! The pass is linear: no instruction is visited twice and branches are not followed.
//! At the first instruction of a catch handler the stack is reset to hold the handler's
//! catch type, which models the runtime pushing the exception object.
//!
//! [`Cursor`] is the resumable form of the walk: it stops at every event and keeps its
//! position and frame, so a driver can analyze a callee in between without nesting
//! walks on the native stack. [`interpret`] runs a cursor to the end against an
//! [`InterpreterSink`].

use std::sync::Arc;

use crate::{
    analysis::{
        source::CodeSource,
        thrown::{ExceptionOrigin, ThrownException},
    },
    assembly::{Instruction, MethodBody, OpCode, Operand},
    metadata::{
        exceptions::{catch_handler_at, rethrow_handler},
        member::MethodDesc,
        types::{StackType, TypeRef},
    },
    Result,
};

/// Receiver of the events found while interpreting a body.
pub trait InterpreterSink {
    /// Called before every instruction; returning an error aborts the walk.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Cancelled`] to stop the pass.
    fn checkpoint(&self) -> Result<()> {
        Ok(())
    }

    /// A `throw` or `rethrow` with a known exception type.
    ///
    /// # Errors
    ///
    /// Errors abort the walk and are returned by [`interpret`].
    fn on_throw(&mut self, thrown: ThrownException) -> Result<()>;

    /// A call-family instruction (`call`, `callvirt`, `newobj`, `ldftn`, `ldvirtftn`)
    /// whose target resolved to `callee`.
    ///
    /// # Errors
    ///
    /// Errors abort the walk and are returned by [`interpret`].
    fn on_call(&mut self, offset: u32, opcode: OpCode, callee: &MethodDesc) -> Result<()>;
}

/// One event of the walk.
#[derive(Debug, Clone)]
pub enum InterpreterEvent {
    /// A `throw` or `rethrow` with a known exception type
    Throw(ThrownException),
    /// A call-family instruction whose target resolved to `callee`
    Call {
        /// Offset of the instruction
        offset: u32,
        /// `call`, `callvirt`, `newobj`, `ldftn` or `ldvirtftn`
        opcode: OpCode,
        /// Declaration of the target
        callee: MethodDesc,
    },
}

/// Interprets `body` of `method`, reporting throws and calls to `sink`.
///
/// # Arguments
///
/// * `source` - Resolves callee declarations for their stack shape and result type
/// * `method` - Declaration of the method owning `body`
/// * `body` - Decoded body to walk
/// * `sink` - Receives throw and call events in offset order
///
/// # Errors
///
/// Returns whatever the sink returns from [`InterpreterSink::checkpoint`],
/// [`InterpreterSink::on_throw`] or [`InterpreterSink::on_call`]. Problems with the body
/// itself (stack underflow, unresolved operands) are not errors.
pub fn interpret(
    source: &dyn CodeSource,
    method: &MethodDesc,
    body: &Arc<MethodBody>,
    sink: &mut dyn InterpreterSink,
) -> Result<()> {
    let mut cursor = Cursor::new(method.clone(), Arc::clone(body));
    loop {
        let event = cursor.next_event(source, &|| sink.checkpoint())?;
        match event {
            Some(InterpreterEvent::Throw(thrown)) => sink.on_throw(thrown)?,
            Some(InterpreterEvent::Call {
                offset,
                opcode,
                callee,
            }) => sink.on_call(offset, opcode, &callee)?,
            None => return Ok(()),
        }
    }
}

/// A paused walk over one method body.
#[derive(Debug)]
pub struct Cursor {
    method: MethodDesc,
    body: Arc<MethodBody>,
    frame: Frame,
    next: usize,
}

impl Cursor {
    /// Positions a walk at the first instruction of `body`.
    #[must_use]
    pub fn new(method: MethodDesc, body: Arc<MethodBody>) -> Self {
        let frame = Frame::new(&method, &body);
        Cursor {
            method,
            body,
            frame,
            next: 0,
        }
    }

    /// The method being walked.
    #[must_use]
    pub fn method(&self) -> &MethodDesc {
        &self.method
    }

    /// The body being walked.
    #[must_use]
    pub fn body(&self) -> &MethodBody {
        &self.body
    }

    /// Runs to the next event, or to the end of the body (`None`).
    ///
    /// The stack effect of a call is applied before the call event is returned, so the
    /// walk continues correctly whatever the driver does with the callee.
    ///
    /// # Errors
    ///
    /// Returns the first error of `checkpoint`, which is called before every
    /// instruction.
    pub fn next_event(
        &mut self,
        source: &dyn CodeSource,
        checkpoint: &dyn Fn() -> Result<()>,
    ) -> Result<Option<InterpreterEvent>> {
        while let Some(instr) = self.body.instructions.get(self.next) {
            checkpoint()?;
            self.next += 1;

            if let Some(handler) = catch_handler_at(&self.body.handlers, instr.offset) {
                self.frame.stack.clear();
                self.frame.push(handler.catch_type.clone().into());
            }

            if let Some(event) = self.frame.step(source, &self.method, &self.body, instr) {
                return Ok(Some(event));
            }
        }
        Ok(None)
    }
}

#[derive(Debug)]
struct Frame {
    stack: Vec<StackType>,
    args: Vec<StackType>,
    locals: Vec<StackType>,
}

impl Frame {
    fn new(method: &MethodDesc, body: &MethodBody) -> Self {
        let arg_count = method.parameters.len() + usize::from(!method.is_static());
        let args = (0..arg_count)
            .map(|index| {
                u16::try_from(index).map_or(StackType::Unknown, |index| {
                    method.argument_type(index)
                })
            })
            .collect();
        let locals = body.locals.iter().cloned().map(StackType::from).collect();

        Frame {
            stack: Vec::new(),
            args,
            locals,
        }
    }

    fn push(&mut self, ty: StackType) {
        self.stack.push(ty);
    }

    fn pop(&mut self) -> StackType {
        self.stack.pop().unwrap_or_default()
    }

    fn pop_n(&mut self, count: usize) {
        let keep = self.stack.len().saturating_sub(count);
        self.stack.truncate(keep);
    }

    fn push_unknown(&mut self, count: usize) {
        self.stack
            .extend(std::iter::repeat(StackType::Unknown).take(count));
    }

    fn generic(&mut self, instr: &Instruction) {
        self.pop_n(usize::from(instr.stack_behavior.pops));
        self.push_unknown(usize::from(instr.stack_behavior.pushes));
    }

    fn local(&self, index: u16) -> StackType {
        self.locals
            .get(usize::from(index))
            .cloned()
            .unwrap_or_default()
    }

    fn store_local(&mut self, declared: &[Option<TypeRef>], index: u16, value: StackType) {
        let index = usize::from(index);
        let Some(slot) = self.locals.get_mut(index) else {
            return;
        };
        *slot = match value {
            StackType::Unknown => declared.get(index).cloned().flatten().into(),
            known => known,
        };
    }

    fn arg(&self, index: u16) -> StackType {
        self.args.get(usize::from(index)).cloned().unwrap_or_default()
    }

    fn store_arg(&mut self, index: u16, value: StackType) {
        if let Some(slot) = self.args.get_mut(usize::from(index)) {
            if value != StackType::Unknown {
                *slot = value;
            }
        }
    }

    fn step(
        &mut self,
        source: &dyn CodeSource,
        method: &MethodDesc,
        body: &MethodBody,
        instr: &Instruction,
    ) -> Option<InterpreterEvent> {
        let mut event = None;
        match (instr.opcode, &instr.operand) {
            (OpCode::LoadArg, Operand::Argument(index)) => self.push(self.arg(*index)),
            (OpCode::LoadArgAddress, Operand::Argument(index)) => {
                self.push(self.arg(*index).by_ref());
            }
            (OpCode::StoreArg, Operand::Argument(index)) => {
                let value = self.pop();
                self.store_arg(*index, value);
            }
            (OpCode::LoadLocal, Operand::Local(index)) => self.push(self.local(*index)),
            (OpCode::LoadLocalAddress, Operand::Local(index)) => {
                self.push(self.local(*index).by_ref());
            }
            (OpCode::StoreLocal, Operand::Local(index)) => {
                let value = self.pop();
                self.store_local(&body.locals, *index, value);
            }
            (OpCode::LoadField, Operand::Field(field)) => {
                self.pop();
                self.push(field.field_type.clone().into());
            }
            (OpCode::LoadFieldAddress, Operand::Field(field)) => {
                self.pop();
                self.push(StackType::from(field.field_type.clone()).by_ref());
            }
            (OpCode::LoadStaticField, Operand::Field(field)) => {
                self.push(field.field_type.clone().into());
            }
            (OpCode::LoadStaticFieldAddress, Operand::Field(field)) => {
                self.push(StackType::from(field.field_type.clone()).by_ref());
            }
            (
                OpCode::Call | OpCode::CallVirt | OpCode::NewObj | OpCode::LoadFunction,
                Operand::Method(id),
            )
            | (OpCode::LoadVirtualFunction, Operand::Method(id)) => match source.method(id) {
                Ok(callee) => {
                    self.apply_call(instr, &callee);
                    event = Some(InterpreterEvent::Call {
                        offset: instr.offset,
                        opcode: instr.opcode,
                        callee,
                    });
                }
                Err(e) => {
                    log::debug!(
                        "{} IL_{:04x}: cannot resolve callee {id}: {e}",
                        method,
                        instr.offset
                    );
                    self.generic(instr);
                }
            },
            (OpCode::Throw, _) => {
                match self.pop() {
                    StackType::Known(ty) => {
                        event = Some(InterpreterEvent::Throw(ThrownException::new(
                            method.id,
                            ty,
                            instr.offset,
                            ExceptionOrigin::Thrown,
                        )));
                    }
                    other => log::debug!(
                        "{} IL_{:04x}: throw of unknown type ({other:?})",
                        method,
                        instr.offset
                    ),
                }
                self.stack.clear();
            }
            (OpCode::Rethrow, _) => {
                let caught = rethrow_handler(&body.handlers, instr.offset)
                    .and_then(|handler| handler.catch_type.clone());
                match caught {
                    Some(ty) => {
                        event = Some(InterpreterEvent::Throw(ThrownException::new(
                            method.id,
                            ty,
                            instr.offset,
                            ExceptionOrigin::Rethrown,
                        )));
                    }
                    None => log::debug!(
                        "{} IL_{:04x}: rethrow outside a typed catch handler",
                        method,
                        instr.offset
                    ),
                }
                self.stack.clear();
            }
            (OpCode::Dup, _) => {
                let top = self.pop();
                self.push(top.clone());
                self.push(top);
            }
            (OpCode::LoadString, _) => self.push(TypeRef::new("mscorlib", "System", "String").into()),
            (OpCode::CastClass | OpCode::IsInst | OpCode::UnboxAny, Operand::Type(ty)) => {
                self.pop();
                self.push(ty.clone().into());
            }
            (OpCode::Box, _) => {
                self.pop();
                self.push(TypeRef::new("mscorlib", "System", "Object").into());
            }
            (OpCode::Ret | OpCode::Leave | OpCode::EndFinally, _) => self.stack.clear(),
            _ => self.generic(instr),
        }
        event
    }

    /// Pops the arguments of a resolved callee and pushes its result.
    fn apply_call(&mut self, instr: &Instruction, callee: &MethodDesc) {
        match instr.opcode {
            OpCode::LoadFunction => self.push(StackType::FnPtr(callee.id)),
            OpCode::LoadVirtualFunction => {
                self.pop();
                self.push(StackType::FnPtr(callee.id));
            }
            OpCode::NewObj => {
                self.pop_n(callee.parameters.len());
                self.push(callee.declaring_type.clone().into());
            }
            _ => {
                let receiver = usize::from(!callee.is_static());
                self.pop_n(callee.parameters.len() + receiver);
                if let Some(result) = callee.result_type(false) {
                    self.push(result.into());
                }
            }
        }
    }
}
