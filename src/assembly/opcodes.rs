//! The CIL opcode table (ECMA-335 III), reduced to what exception-flow analysis needs.
//!
//! Each mnemonic maps to an [`OpCode`] category, the kind and size of its inline operand,
//! the implicit index carried by short forms such as `ldloc.2`, and the fixed part of its
//! stack transition. Call-family instructions and `ret` have a stack transition that
//! depends on the callee's signature; the table records zero for them and the decoder
//! fills in the real shape.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::assembly::instruction::{Operand, StackBehavior};

/// Functional category of an instruction, as far as the symbolic interpreter cares.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum OpCode {
    /// `ldarg*`
    LoadArg,
    /// `ldarga*`
    LoadArgAddress,
    /// `starg*`
    StoreArg,
    /// `ldloc*`
    LoadLocal,
    /// `ldloca*`
    LoadLocalAddress,
    /// `stloc*`
    StoreLocal,
    /// `ldfld`
    LoadField,
    /// `ldflda`
    LoadFieldAddress,
    /// `stfld`
    StoreField,
    /// `ldsfld`
    LoadStaticField,
    /// `ldsflda`
    LoadStaticFieldAddress,
    /// `stsfld`
    StoreStaticField,
    /// `call`, `jmp`
    Call,
    /// `callvirt`
    CallVirt,
    /// `calli`
    Calli,
    /// `newobj`
    NewObj,
    /// `ldftn`
    LoadFunction,
    /// `ldvirtftn`
    LoadVirtualFunction,
    /// `leave`, `leave.s`
    Leave,
    /// `br*`, `b*` conditional branches
    Branch,
    /// `switch`
    Switch,
    /// `throw`
    Throw,
    /// `rethrow`
    Rethrow,
    /// `dup`
    Dup,
    /// `ldnull`
    LoadNull,
    /// `ldstr`
    LoadString,
    /// `castclass`
    CastClass,
    /// `isinst`
    IsInst,
    /// `box`
    Box,
    /// `unbox.any`, `ldobj`
    UnboxAny,
    /// `newarr`
    NewArr,
    /// `ret`
    Ret,
    /// `endfinally`, `endfault`, `endfilter`
    EndFinally,
    /// Everything else; only its stack transition matters.
    #[default]
    Other,
}

impl OpCode {
    /// Returns `true` for instructions that reference a method and make it a call-graph edge.
    #[must_use]
    pub const fn is_call_family(&self) -> bool {
        matches!(
            self,
            OpCode::Call
                | OpCode::CallVirt
                | OpCode::Calli
                | OpCode::NewObj
                | OpCode::LoadFunction
                | OpCode::LoadVirtualFunction
        )
    }

    /// Returns `true` for `ldftn`/`ldvirtftn`, which take a method's address instead of calling it.
    #[must_use]
    pub const fn is_address_of(&self) -> bool {
        matches!(self, OpCode::LoadFunction | OpCode::LoadVirtualFunction)
    }

    /// Returns `true` if the stack transition depends on a callee signature.
    #[must_use]
    pub const fn has_variable_stack(&self) -> bool {
        matches!(
            self,
            OpCode::Call | OpCode::CallVirt | OpCode::Calli | OpCode::NewObj | OpCode::Ret
        )
    }

    /// Returns `true` if control never falls through to the next instruction.
    #[must_use]
    pub const fn ends_flow(&self) -> bool {
        matches!(
            self,
            OpCode::Throw | OpCode::Rethrow | OpCode::Ret | OpCode::Leave | OpCode::EndFinally
        )
    }
}

/// Kind of the inline operand that follows an opcode in the byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandType {
    /// No operand present
    None,
    /// 8-bit immediate or short local/argument index
    UInt8,
    /// 16-bit local/argument index
    UInt16,
    /// 32-bit immediate or float
    Int32,
    /// 64-bit immediate or double
    Int64,
    /// Metadata token reference
    Token,
    /// 8-bit relative branch
    ShortTarget,
    /// 32-bit relative branch
    Target,
    /// Switch table operand
    Switch,
}

impl OperandType {
    /// Returns the size in bytes of this operand type, `None` for the variable-size switch table.
    #[must_use]
    pub const fn size(&self) -> Option<u32> {
        match self {
            OperandType::None => Some(0),
            OperandType::UInt8 | OperandType::ShortTarget => Some(1),
            OperandType::UInt16 => Some(2),
            OperandType::Int32 | OperandType::Token | OperandType::Target => Some(4),
            OperandType::Int64 => Some(8),
            OperandType::Switch => None,
        }
    }
}

/// Static description of one CIL opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpCodeInfo {
    /// Textual mnemonic (`ldloc.s`, `callvirt`)
    pub mnemonic: &'static str,
    /// Category used by the interpreter
    pub opcode: OpCode,
    /// Inline operand kind
    pub operand: OperandType,
    /// Index encoded in the mnemonic (`ldarg.1`, `stloc.3`)
    pub implicit: Option<u16>,
    /// Fixed stack transition
    pub stack: StackBehavior,
    /// Encoded with the two-byte `0xFE` prefix
    pub prefixed: bool,
}

impl OpCodeInfo {
    /// Looks up a mnemonic. Matching is case-insensitive.
    #[must_use]
    pub fn lookup(mnemonic: &str) -> Option<&'static OpCodeInfo> {
        OPCODES
            .iter()
            .find(|info| info.mnemonic.eq_ignore_ascii_case(mnemonic))
    }

    /// The operand an instruction of this opcode carries implicitly, if any.
    #[must_use]
    pub fn implicit_operand(&self) -> Option<Operand> {
        let index = self.implicit?;
        match self.opcode {
            OpCode::LoadArg | OpCode::StoreArg | OpCode::LoadArgAddress => {
                Some(Operand::Argument(index))
            }
            OpCode::LoadLocal | OpCode::StoreLocal | OpCode::LoadLocalAddress => {
                Some(Operand::Local(index))
            }
            _ => None,
        }
    }

    /// Encoded size in bytes of an instruction of this opcode carrying `operand`.
    #[must_use]
    pub fn encoded_size(&self, operand: &Operand) -> u32 {
        let opcode_size = if self.prefixed { 2 } else { 1 };
        let operand_size = match self.operand.size() {
            Some(size) => size,
            None => match operand {
                Operand::Switch(targets) => u32::try_from(targets.len())
                    .unwrap_or(u32::MAX)
                    .saturating_mul(4)
                    .saturating_add(4),
                _ => 4,
            },
        };
        opcode_size + operand_size
    }
}

const fn op(
    mnemonic: &'static str,
    opcode: OpCode,
    operand: OperandType,
    pops: u8,
    pushes: u8,
) -> OpCodeInfo {
    OpCodeInfo {
        mnemonic,
        opcode,
        operand,
        implicit: None,
        stack: StackBehavior::new(pops, pushes),
        prefixed: false,
    }
}

const fn fe(
    mnemonic: &'static str,
    opcode: OpCode,
    operand: OperandType,
    pops: u8,
    pushes: u8,
) -> OpCodeInfo {
    OpCodeInfo {
        mnemonic,
        opcode,
        operand,
        implicit: None,
        stack: StackBehavior::new(pops, pushes),
        prefixed: true,
    }
}

const fn short(
    mnemonic: &'static str,
    opcode: OpCode,
    index: u16,
    pops: u8,
    pushes: u8,
) -> OpCodeInfo {
    OpCodeInfo {
        mnemonic,
        opcode,
        operand: OperandType::None,
        implicit: Some(index),
        stack: StackBehavior::new(pops, pushes),
        prefixed: false,
    }
}

use OpCode as C;
use OperandType as T;

/// All opcodes, in encoding order.
pub static OPCODES: &[OpCodeInfo] = &[
    op("nop", C::Other, T::None, 0, 0),
    op("break", C::Other, T::None, 0, 0),
    short("ldarg.0", C::LoadArg, 0, 0, 1),
    short("ldarg.1", C::LoadArg, 1, 0, 1),
    short("ldarg.2", C::LoadArg, 2, 0, 1),
    short("ldarg.3", C::LoadArg, 3, 0, 1),
    short("ldloc.0", C::LoadLocal, 0, 0, 1),
    short("ldloc.1", C::LoadLocal, 1, 0, 1),
    short("ldloc.2", C::LoadLocal, 2, 0, 1),
    short("ldloc.3", C::LoadLocal, 3, 0, 1),
    short("stloc.0", C::StoreLocal, 0, 1, 0),
    short("stloc.1", C::StoreLocal, 1, 1, 0),
    short("stloc.2", C::StoreLocal, 2, 1, 0),
    short("stloc.3", C::StoreLocal, 3, 1, 0),
    op("ldarg.s", C::LoadArg, T::UInt8, 0, 1),
    op("ldarga.s", C::LoadArgAddress, T::UInt8, 0, 1),
    op("starg.s", C::StoreArg, T::UInt8, 1, 0),
    op("ldloc.s", C::LoadLocal, T::UInt8, 0, 1),
    op("ldloca.s", C::LoadLocalAddress, T::UInt8, 0, 1),
    op("stloc.s", C::StoreLocal, T::UInt8, 1, 0),
    op("ldnull", C::LoadNull, T::None, 0, 1),
    op("ldc.i4.m1", C::Other, T::None, 0, 1),
    op("ldc.i4.0", C::Other, T::None, 0, 1),
    op("ldc.i4.1", C::Other, T::None, 0, 1),
    op("ldc.i4.2", C::Other, T::None, 0, 1),
    op("ldc.i4.3", C::Other, T::None, 0, 1),
    op("ldc.i4.4", C::Other, T::None, 0, 1),
    op("ldc.i4.5", C::Other, T::None, 0, 1),
    op("ldc.i4.6", C::Other, T::None, 0, 1),
    op("ldc.i4.7", C::Other, T::None, 0, 1),
    op("ldc.i4.8", C::Other, T::None, 0, 1),
    op("ldc.i4.s", C::Other, T::UInt8, 0, 1),
    op("ldc.i4", C::Other, T::Int32, 0, 1),
    op("ldc.i8", C::Other, T::Int64, 0, 1),
    op("ldc.r4", C::Other, T::Int32, 0, 1),
    op("ldc.r8", C::Other, T::Int64, 0, 1),
    op("dup", C::Dup, T::None, 1, 2),
    op("pop", C::Other, T::None, 1, 0),
    op("jmp", C::Call, T::Token, 0, 0),
    op("call", C::Call, T::Token, 0, 0),
    op("calli", C::Calli, T::Token, 0, 0),
    op("ret", C::Ret, T::None, 0, 0),
    op("br.s", C::Branch, T::ShortTarget, 0, 0),
    op("brfalse.s", C::Branch, T::ShortTarget, 1, 0),
    op("brtrue.s", C::Branch, T::ShortTarget, 1, 0),
    op("beq.s", C::Branch, T::ShortTarget, 2, 0),
    op("bge.s", C::Branch, T::ShortTarget, 2, 0),
    op("bgt.s", C::Branch, T::ShortTarget, 2, 0),
    op("ble.s", C::Branch, T::ShortTarget, 2, 0),
    op("blt.s", C::Branch, T::ShortTarget, 2, 0),
    op("bne.un.s", C::Branch, T::ShortTarget, 2, 0),
    op("bge.un.s", C::Branch, T::ShortTarget, 2, 0),
    op("bgt.un.s", C::Branch, T::ShortTarget, 2, 0),
    op("ble.un.s", C::Branch, T::ShortTarget, 2, 0),
    op("blt.un.s", C::Branch, T::ShortTarget, 2, 0),
    op("br", C::Branch, T::Target, 0, 0),
    op("brfalse", C::Branch, T::Target, 1, 0),
    op("brtrue", C::Branch, T::Target, 1, 0),
    op("beq", C::Branch, T::Target, 2, 0),
    op("bge", C::Branch, T::Target, 2, 0),
    op("bgt", C::Branch, T::Target, 2, 0),
    op("ble", C::Branch, T::Target, 2, 0),
    op("blt", C::Branch, T::Target, 2, 0),
    op("bne.un", C::Branch, T::Target, 2, 0),
    op("bge.un", C::Branch, T::Target, 2, 0),
    op("bgt.un", C::Branch, T::Target, 2, 0),
    op("ble.un", C::Branch, T::Target, 2, 0),
    op("blt.un", C::Branch, T::Target, 2, 0),
    op("switch", C::Switch, T::Switch, 1, 0),
    op("ldind.i1", C::Other, T::None, 1, 1),
    op("ldind.u1", C::Other, T::None, 1, 1),
    op("ldind.i2", C::Other, T::None, 1, 1),
    op("ldind.u2", C::Other, T::None, 1, 1),
    op("ldind.i4", C::Other, T::None, 1, 1),
    op("ldind.u4", C::Other, T::None, 1, 1),
    op("ldind.i8", C::Other, T::None, 1, 1),
    op("ldind.i", C::Other, T::None, 1, 1),
    op("ldind.r4", C::Other, T::None, 1, 1),
    op("ldind.r8", C::Other, T::None, 1, 1),
    op("ldind.ref", C::Other, T::None, 1, 1),
    op("stind.ref", C::Other, T::None, 2, 0),
    op("stind.i1", C::Other, T::None, 2, 0),
    op("stind.i2", C::Other, T::None, 2, 0),
    op("stind.i4", C::Other, T::None, 2, 0),
    op("stind.i8", C::Other, T::None, 2, 0),
    op("stind.r4", C::Other, T::None, 2, 0),
    op("stind.r8", C::Other, T::None, 2, 0),
    op("add", C::Other, T::None, 2, 1),
    op("sub", C::Other, T::None, 2, 1),
    op("mul", C::Other, T::None, 2, 1),
    op("div", C::Other, T::None, 2, 1),
    op("div.un", C::Other, T::None, 2, 1),
    op("rem", C::Other, T::None, 2, 1),
    op("rem.un", C::Other, T::None, 2, 1),
    op("and", C::Other, T::None, 2, 1),
    op("or", C::Other, T::None, 2, 1),
    op("xor", C::Other, T::None, 2, 1),
    op("shl", C::Other, T::None, 2, 1),
    op("shr", C::Other, T::None, 2, 1),
    op("shr.un", C::Other, T::None, 2, 1),
    op("neg", C::Other, T::None, 1, 1),
    op("not", C::Other, T::None, 1, 1),
    op("conv.i1", C::Other, T::None, 1, 1),
    op("conv.i2", C::Other, T::None, 1, 1),
    op("conv.i4", C::Other, T::None, 1, 1),
    op("conv.i8", C::Other, T::None, 1, 1),
    op("conv.r4", C::Other, T::None, 1, 1),
    op("conv.r8", C::Other, T::None, 1, 1),
    op("conv.u4", C::Other, T::None, 1, 1),
    op("conv.u8", C::Other, T::None, 1, 1),
    op("callvirt", C::CallVirt, T::Token, 0, 0),
    op("cpobj", C::Other, T::Token, 2, 0),
    op("ldobj", C::UnboxAny, T::Token, 1, 1),
    op("ldstr", C::LoadString, T::Token, 0, 1),
    op("newobj", C::NewObj, T::Token, 0, 0),
    op("castclass", C::CastClass, T::Token, 1, 1),
    op("isinst", C::IsInst, T::Token, 1, 1),
    op("conv.r.un", C::Other, T::None, 1, 1),
    op("unbox", C::Other, T::Token, 1, 1),
    op("throw", C::Throw, T::None, 1, 0),
    op("ldfld", C::LoadField, T::Token, 1, 1),
    op("ldflda", C::LoadFieldAddress, T::Token, 1, 1),
    op("stfld", C::StoreField, T::Token, 2, 0),
    op("ldsfld", C::LoadStaticField, T::Token, 0, 1),
    op("ldsflda", C::LoadStaticFieldAddress, T::Token, 0, 1),
    op("stsfld", C::StoreStaticField, T::Token, 1, 0),
    op("stobj", C::Other, T::Token, 2, 0),
    op("conv.ovf.i1.un", C::Other, T::None, 1, 1),
    op("conv.ovf.i2.un", C::Other, T::None, 1, 1),
    op("conv.ovf.i4.un", C::Other, T::None, 1, 1),
    op("conv.ovf.i8.un", C::Other, T::None, 1, 1),
    op("conv.ovf.u1.un", C::Other, T::None, 1, 1),
    op("conv.ovf.u2.un", C::Other, T::None, 1, 1),
    op("conv.ovf.u4.un", C::Other, T::None, 1, 1),
    op("conv.ovf.u8.un", C::Other, T::None, 1, 1),
    op("conv.ovf.i.un", C::Other, T::None, 1, 1),
    op("conv.ovf.u.un", C::Other, T::None, 1, 1),
    op("box", C::Box, T::Token, 1, 1),
    op("newarr", C::NewArr, T::Token, 1, 1),
    op("ldlen", C::Other, T::None, 1, 1),
    op("ldelema", C::Other, T::Token, 2, 1),
    op("ldelem.i1", C::Other, T::None, 2, 1),
    op("ldelem.u1", C::Other, T::None, 2, 1),
    op("ldelem.i2", C::Other, T::None, 2, 1),
    op("ldelem.u2", C::Other, T::None, 2, 1),
    op("ldelem.i4", C::Other, T::None, 2, 1),
    op("ldelem.u4", C::Other, T::None, 2, 1),
    op("ldelem.i8", C::Other, T::None, 2, 1),
    op("ldelem.i", C::Other, T::None, 2, 1),
    op("ldelem.r4", C::Other, T::None, 2, 1),
    op("ldelem.r8", C::Other, T::None, 2, 1),
    op("ldelem.ref", C::Other, T::None, 2, 1),
    op("stelem.i", C::Other, T::None, 3, 0),
    op("stelem.i1", C::Other, T::None, 3, 0),
    op("stelem.i2", C::Other, T::None, 3, 0),
    op("stelem.i4", C::Other, T::None, 3, 0),
    op("stelem.i8", C::Other, T::None, 3, 0),
    op("stelem.r4", C::Other, T::None, 3, 0),
    op("stelem.r8", C::Other, T::None, 3, 0),
    op("stelem.ref", C::Other, T::None, 3, 0),
    op("ldelem", C::Other, T::Token, 2, 1),
    op("stelem", C::Other, T::Token, 3, 0),
    op("unbox.any", C::UnboxAny, T::Token, 1, 1),
    op("conv.ovf.i1", C::Other, T::None, 1, 1),
    op("conv.ovf.u1", C::Other, T::None, 1, 1),
    op("conv.ovf.i2", C::Other, T::None, 1, 1),
    op("conv.ovf.u2", C::Other, T::None, 1, 1),
    op("conv.ovf.i4", C::Other, T::None, 1, 1),
    op("conv.ovf.u4", C::Other, T::None, 1, 1),
    op("conv.ovf.i8", C::Other, T::None, 1, 1),
    op("conv.ovf.u8", C::Other, T::None, 1, 1),
    op("refanyval", C::Other, T::Token, 1, 1),
    op("ckfinite", C::Other, T::None, 1, 1),
    op("mkrefany", C::Other, T::Token, 1, 1),
    op("ldtoken", C::Other, T::Token, 0, 1),
    op("conv.u2", C::Other, T::None, 1, 1),
    op("conv.u1", C::Other, T::None, 1, 1),
    op("conv.i", C::Other, T::None, 1, 1),
    op("conv.ovf.i", C::Other, T::None, 1, 1),
    op("conv.ovf.u", C::Other, T::None, 1, 1),
    op("add.ovf", C::Other, T::None, 2, 1),
    op("add.ovf.un", C::Other, T::None, 2, 1),
    op("mul.ovf", C::Other, T::None, 2, 1),
    op("mul.ovf.un", C::Other, T::None, 2, 1),
    op("sub.ovf", C::Other, T::None, 2, 1),
    op("sub.ovf.un", C::Other, T::None, 2, 1),
    op("endfinally", C::EndFinally, T::None, 0, 0),
    op("endfault", C::EndFinally, T::None, 0, 0),
    op("leave", C::Leave, T::Target, 0, 0),
    op("leave.s", C::Leave, T::ShortTarget, 0, 0),
    op("stind.i", C::Other, T::None, 2, 0),
    op("conv.u", C::Other, T::None, 1, 1),
    fe("arglist", C::Other, T::None, 0, 1),
    fe("ceq", C::Other, T::None, 2, 1),
    fe("cgt", C::Other, T::None, 2, 1),
    fe("cgt.un", C::Other, T::None, 2, 1),
    fe("clt", C::Other, T::None, 2, 1),
    fe("clt.un", C::Other, T::None, 2, 1),
    fe("ldftn", C::LoadFunction, T::Token, 0, 1),
    fe("ldvirtftn", C::LoadVirtualFunction, T::Token, 1, 1),
    fe("ldarg", C::LoadArg, T::UInt16, 0, 1),
    fe("ldarga", C::LoadArgAddress, T::UInt16, 0, 1),
    fe("starg", C::StoreArg, T::UInt16, 1, 0),
    fe("ldloc", C::LoadLocal, T::UInt16, 0, 1),
    fe("ldloca", C::LoadLocalAddress, T::UInt16, 0, 1),
    fe("stloc", C::StoreLocal, T::UInt16, 1, 0),
    fe("localloc", C::Other, T::None, 1, 1),
    fe("endfilter", C::EndFinally, T::None, 1, 0),
    fe("unaligned.", C::Other, T::UInt8, 0, 0),
    fe("volatile.", C::Other, T::None, 0, 0),
    fe("tail.", C::Other, T::None, 0, 0),
    fe("initobj", C::Other, T::Token, 1, 0),
    fe("constrained.", C::Other, T::Token, 0, 0),
    fe("cpblk", C::Other, T::None, 3, 0),
    fe("initblk", C::Other, T::None, 3, 0),
    fe("no.", C::Other, T::UInt8, 0, 0),
    fe("rethrow", C::Rethrow, T::None, 0, 0),
    fe("sizeof", C::Other, T::Token, 0, 1),
    fe("refanytype", C::Other, T::None, 1, 1),
    fe("readonly.", C::Other, T::None, 0, 0),
];
