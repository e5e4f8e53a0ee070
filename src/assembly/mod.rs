//! CIL instruction model consumed by the analysis.
//!
//! The analysis does not decode raw IL bytes itself. It consumes instructions whose
//! operands are already resolved to methods, fields and types, together with each
//! method's exception handling clauses. This module defines that contract and the opcode
//! table used to turn textual mnemonics into instructions.
//!
//! # Key Components
//!
//! - [`Instruction`] - One decoded instruction with resolved operand and stack transition
//! - [`OpCode`] - Instruction category driving the symbolic interpreter
//! - [`OpCodeInfo`] - Static per-mnemonic description (operand size, implicit index, stack)
//! - [`MethodBody`] - Instructions, handler regions and local types of one method
//!
//! # Examples
//!
//! ```rust
//! use throwscope::assembly::{Instruction, OpCode, Operand};
//!
//! let instr = Instruction::decode(0x10, "ldloc.0", Operand::None)?;
//! assert_eq!(instr.opcode, OpCode::LoadLocal);
//! assert_eq!(instr.operand, Operand::Local(0));
//! # Ok::<(), throwscope::Error>(())
//! ```

mod body;
mod instruction;
mod opcodes;

pub use body::MethodBody;
pub use instruction::{Instruction, Operand, StackBehavior};
pub use opcodes::{OpCode, OpCodeInfo, OperandType, OPCODES};
