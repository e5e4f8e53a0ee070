//! Decoded method bodies.

use crate::{
    assembly::instruction::Instruction,
    metadata::{exceptions::HandlerRegion, types::TypeRef},
    Result,
};

/// The decoded body of one method: instruction stream, exception handler clauses and the
/// declared local variable types.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodBody {
    /// Instructions in ascending offset order
    pub instructions: Vec<Instruction>,
    /// Exception handling clauses
    pub handlers: Vec<HandlerRegion>,
    /// Declared local variable types, `None` where open or unresolved
    pub locals: Vec<Option<TypeRef>>,
}

impl MethodBody {
    /// Assembles a body and checks that it is consistent.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the instructions are not in strictly ascending
    /// offset order, or if a handler region reaches past the end of the code.
    pub fn new(
        instructions: Vec<Instruction>,
        handlers: Vec<HandlerRegion>,
        locals: Vec<Option<TypeRef>>,
    ) -> Result<Self> {
        let body = MethodBody {
            instructions,
            handlers,
            locals,
        };
        body.validate()?;
        Ok(body)
    }

    /// Size of the code in bytes.
    #[must_use]
    pub fn code_size(&self) -> u32 {
        self.instructions.last().map_or(0, Instruction::next_offset)
    }

    /// Returns the instruction starting at `offset`.
    #[must_use]
    pub fn instruction_at(&self, offset: u32) -> Option<&Instruction> {
        self.instructions
            .binary_search_by_key(&offset, |instr| instr.offset)
            .ok()
            .map(|index| &self.instructions[index])
    }

    /// Returns `true` if the body has any exception handling clause.
    #[must_use]
    pub fn has_handlers(&self) -> bool {
        !self.handlers.is_empty()
    }

    fn validate(&self) -> Result<()> {
        for pair in self.instructions.windows(2) {
            if pair[1].offset < pair[0].next_offset() {
                return Err(malformed_error!(
                    "Instruction at IL_{:04x} overlaps IL_{:04x}",
                    pair[1].offset,
                    pair[0].offset
                ));
            }
        }

        let code_size = self.code_size();
        for region in &self.handlers {
            let try_end = region.try_offset.checked_add(region.try_length);
            let handler_end = region.handler_offset.checked_add(region.handler_length);
            match (try_end, handler_end) {
                (Some(try_end), Some(handler_end))
                    if try_end <= code_size && handler_end <= code_size => {}
                _ => {
                    return Err(malformed_error!(
                        "Handler region try IL_{:04x}+{} handler IL_{:04x}+{} exceeds code size {}",
                        region.try_offset,
                        region.try_length,
                        region.handler_offset,
                        region.handler_length,
                        code_size
                    ))
                }
            }
        }

        Ok(())
    }
}
