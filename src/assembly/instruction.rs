//! Decoded CIL instructions as consumed by the symbolic interpreter.
//!
//! An [`Instruction`] is what the byte-code decoder hands to the analysis: the byte offset,
//! the opcode category, an operand with all metadata references already resolved, and the
//! stack transition. Instructions are immutable once decoded.

use std::fmt;

use crate::{
    assembly::opcodes::{OpCode, OpCodeInfo},
    metadata::{identity::MethodId, member::FieldRef, types::TypeRef},
    Error, Result,
};

/// Stack effect of an instruction.
///
/// Describes how an instruction modifies the evaluation stack. This information
/// is crucial for stack analysis, type inference, and verification.
///
/// # Examples
///
/// ```rust
/// use throwscope::assembly::StackBehavior;
///
/// // An instruction that pops 2 values and pushes 1 (like 'add')
/// let add = StackBehavior::new(2, 1);
/// assert_eq!(add.net_effect, -1);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StackBehavior {
    /// Number of items popped from stack
    pub pops: u8,
    /// Number of items pushed to stack
    pub pushes: u8,
    /// Net effect on stack depth (pushes - pops)
    pub net_effect: i8,
}

impl StackBehavior {
    /// Creates a stack transition, computing the net effect.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn new(pops: u8, pushes: u8) -> Self {
        StackBehavior {
            pops,
            pushes,
            net_effect: (pushes as i16 - pops as i16) as i8,
        }
    }
}

/// A resolved instruction operand.
///
/// Metadata tokens are resolved by the decoder: the interpreter never sees a raw token,
/// only the member or type it names. A reference the decoder could not resolve is
/// reported as [`Operand::Unresolved`] and contributes nothing to the analysis.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Operand {
    /// No operand present
    #[default]
    None,
    /// Immediate value (constant embedded in instruction)
    Immediate(i64),
    /// String literal of `ldstr`
    String(String),
    /// Branch target offset
    Target(u32),
    /// Switch table of target offsets
    Switch(Vec<u32>),
    /// Local variable index
    Local(u16),
    /// Method argument index
    Argument(u16),
    /// Resolved method reference
    Method(MethodId),
    /// Resolved field reference
    Field(FieldRef),
    /// Resolved type reference
    Type(TypeRef),
    /// A token the decoder could not resolve
    Unresolved(crate::metadata::token::Token),
}

impl Operand {
    /// Returns the method for call-family operands.
    #[must_use]
    pub fn method(&self) -> Option<MethodId> {
        match self {
            Operand::Method(id) => Some(*id),
            _ => None,
        }
    }

    /// Returns the branch target, if any.
    #[must_use]
    pub fn target(&self) -> Option<u32> {
        match self {
            Operand::Target(target) => Some(*target),
            _ => None,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::None => Ok(()),
            Operand::Immediate(value) => write!(f, "{value}"),
            Operand::String(value) => write!(f, "{value:?}"),
            Operand::Target(target) => write!(f, "IL_{target:04x}"),
            Operand::Switch(targets) => {
                let labels: Vec<String> = targets.iter().map(|t| format!("IL_{t:04x}")).collect();
                write!(f, "({})", labels.join(", "))
            }
            Operand::Local(index) => write!(f, "V_{index}"),
            Operand::Argument(index) => write!(f, "A_{index}"),
            Operand::Method(id) => write!(f, "{id}"),
            Operand::Field(field) => write!(f, "{}::{}", field.declaring_type, field.name),
            Operand::Type(ty) => write!(f, "{ty}"),
            Operand::Unresolved(token) => write!(f, "{token}"),
        }
    }
}

/// A decoded CIL instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// Offset of the instruction from the start of the method body
    pub offset: u32,
    /// Size of this instruction in bytes
    pub size: u32,
    /// Human-readable instruction mnemonic (e.g., "ldloc.s", "callvirt")
    pub mnemonic: &'static str,
    /// Category driving the interpreter
    pub opcode: OpCode,
    /// The operand data for this instruction
    pub operand: Operand,
    /// How this instruction affects the evaluation stack
    pub stack_behavior: StackBehavior,
}

impl Instruction {
    /// Decodes a mnemonic and operand into an instruction at `offset`.
    ///
    /// Short forms (`ldloc.1`, `ldarg.0`) get their implicit index as operand. The stack
    /// transition is the opcode's fixed one; call-family shapes are filled in later by
    /// [`Instruction::with_stack`].
    ///
    /// # Arguments
    ///
    /// * `offset` - Byte offset of the instruction in the method body
    /// * `mnemonic` - Textual opcode, case-insensitive
    /// * `operand` - Explicit operand, ignored for short forms
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidMnemonic`] if `mnemonic` is not a CIL opcode.
    pub fn decode(offset: u32, mnemonic: &str, operand: Operand) -> Result<Self> {
        let info = OpCodeInfo::lookup(mnemonic)
            .ok_or_else(|| Error::InvalidMnemonic(mnemonic.to_string()))?;
        let operand = info.implicit_operand().unwrap_or(operand);

        Ok(Instruction {
            offset,
            size: info.encoded_size(&operand),
            mnemonic: info.mnemonic,
            opcode: info.opcode,
            operand,
            stack_behavior: info.stack,
        })
    }

    /// Replaces the stack transition, for call-family instructions whose shape depends
    /// on the callee signature.
    #[must_use]
    pub fn with_stack(mut self, pops: u8, pushes: u8) -> Self {
        self.stack_behavior = StackBehavior::new(pops, pushes);
        self
    }

    /// Offset of the instruction following this one.
    #[must_use]
    pub fn next_offset(&self) -> u32 {
        self.offset + self.size
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if matches!(self.operand, Operand::None) {
            write!(f, "IL_{:04x}: {}", self.offset, self.mnemonic)
        } else {
            write!(f, "IL_{:04x}: {} {}", self.offset, self.mnemonic, self.operand)
        }
    }
}
