//! Opcode dispatch table
//!
//! Each entry pairs an opcode's static stack metadata with its handler.
//! Metadata that depends on operands or on the current stack (variable
//! arities, produced sizes, syscall prices) is resolved by an optional
//! `refine` hook after decoding, so every limit and the full price are
//! known before the handler runs.

use crate::context::ExecutionHost;
use crate::cost;
use crate::error::{VmError, VmResult};
use crate::frame::ExecutionFrame;
use crate::instructions;
use crate::opcode::{OpCode, OperandSize};
use crate::stack_item::StackItem;
use bytes::Bytes;
use std::sync::{Arc, OnceLock};
use tessera_primitives::Gas;

/// Instruction handler
///
/// Receives the popped arguments (index 0 = former top of stack) and returns
/// the results to push (index 0 becomes the new top).
pub type Handler = fn(&Op, &mut ExecutionFrame, &mut ExecutionHost<'_>, Args) -> VmResult<Outputs>;

/// Resolves operand- or stack-dependent metadata without mutating the frame
pub type Refine = fn(&mut Op, &ExecutionFrame, &ExecutionHost<'_>) -> VmResult<()>;

/// Arguments popped for one instruction
#[derive(Debug, Default)]
pub struct Args {
    /// Evaluation stack arguments, former top first
    pub stack: Vec<StackItem>,
    /// Alt stack arguments, former top first
    pub alt: Vec<StackItem>,
}

impl Args {
    /// Destructure exactly `N` stack arguments
    pub fn take<const N: usize>(self) -> VmResult<[StackItem; N]> {
        let len = self.stack.len();
        self.stack
            .try_into()
            .map_err(|_| VmError::Internal(format!("expected {} arguments, got {}", N, len)))
    }
}

/// Results produced by one instruction
#[derive(Debug, Default)]
pub struct Outputs {
    /// Items for the evaluation stack, new top first
    pub stack: Vec<StackItem>,
    /// Items for the alt stack, new top first
    pub alt: Vec<StackItem>,
}

impl Outputs {
    /// No results
    pub fn none() -> Self {
        Self::default()
    }

    /// One result on the evaluation stack
    pub fn one(item: impl Into<StackItem>) -> Self {
        Self {
            stack: vec![item.into()],
            alt: Vec::new(),
        }
    }

    /// Several results on the evaluation stack
    pub fn stack(items: Vec<StackItem>) -> Self {
        Self {
            stack: items,
            alt: Vec::new(),
        }
    }

    /// One result on the alt stack
    pub fn alt(item: StackItem) -> Self {
        Self {
            stack: Vec::new(),
            alt: vec![item],
        }
    }
}

/// Static description of an opcode
#[derive(Clone, Copy)]
pub struct OpSpec {
    /// Opcode
    pub opcode: OpCode,
    /// Evaluation stack inputs
    pub stack_in: usize,
    /// Alt stack inputs
    pub alt_in: usize,
    /// Evaluation stack outputs
    pub stack_out: usize,
    /// Alt stack outputs
    pub alt_out: usize,
    /// Growth inside compound items already on a stack
    pub growth: isize,
    /// Invocation depth delta
    pub invocation: isize,
    /// Handler
    pub handler: Handler,
    /// Operand/stack dependent metadata
    pub refine: Option<Refine>,
}

impl OpSpec {
    /// Opcode with no stack effect
    pub fn new(opcode: OpCode, handler: Handler) -> Self {
        Self {
            opcode,
            stack_in: 0,
            alt_in: 0,
            stack_out: 0,
            alt_out: 0,
            growth: 0,
            invocation: 0,
            handler,
            refine: None,
        }
    }

    /// Set evaluation stack inputs and outputs
    pub fn io(mut self, stack_in: usize, stack_out: usize) -> Self {
        self.stack_in = stack_in;
        self.stack_out = stack_out;
        self
    }

    /// Set alt stack inputs and outputs
    pub fn alt_io(mut self, alt_in: usize, alt_out: usize) -> Self {
        self.alt_in = alt_in;
        self.alt_out = alt_out;
        self
    }

    /// Set in-place growth
    pub fn growth(mut self, growth: isize) -> Self {
        self.growth = growth;
        self
    }

    /// Set invocation delta
    pub fn invocation(mut self, invocation: isize) -> Self {
        self.invocation = invocation;
        self
    }

    /// Set refine hook
    pub fn refine(mut self, refine: Refine) -> Self {
        self.refine = Some(refine);
        self
    }
}

/// A decoded instruction with fully resolved metadata
#[derive(Clone)]
pub struct Op {
    /// Opcode
    pub opcode: OpCode,
    /// Immediate operand (for prefixed pushes, the data after the prefix)
    pub operand: Bytes,
    /// Encoded size in bytes
    pub size: usize,
    /// Evaluation stack inputs
    pub stack_in: usize,
    /// Alt stack inputs
    pub alt_in: usize,
    /// Evaluation stack outputs
    pub stack_out: usize,
    /// Alt stack outputs
    pub alt_out: usize,
    /// Growth inside compound items already on a stack
    pub growth: isize,
    /// Invocation depth delta
    pub invocation: isize,
    /// Element count of a compound item the instruction may produce
    pub array_size: usize,
    /// Byte size of an item the instruction may produce
    pub item_size: usize,
    /// Price including any service fee
    pub fee: Gas,
    /// Handler
    pub handler: Handler,
    /// Operand/stack dependent metadata
    pub refine: Option<Refine>,
}

impl Op {
    /// Operand as a little-endian signed integer
    pub fn operand_i64(&self) -> i64 {
        match self.operand.len() {
            1 => self.operand[0] as i8 as i64,
            2 => i16::from_le_bytes([self.operand[0], self.operand[1]]) as i64,
            4 => i32::from_le_bytes([self.operand[0], self.operand[1], self.operand[2], self.operand[3]]) as i64,
            _ => {
                let mut bytes = [0u8; 8];
                let len = self.operand.len().min(8);
                bytes[..len].copy_from_slice(&self.operand[..len]);
                i64::from_le_bytes(bytes)
            }
        }
    }

    /// Operand as a little-endian `u32`
    pub fn operand_u32(&self) -> VmResult<u32> {
        let bytes: [u8; 4] = self.operand.as_ref().try_into().map_err(|_| VmError::MalformedInstruction {
            opcode: self.opcode,
            reason: format!("expected 4 operand bytes, found {}", self.operand.len()),
        })?;
        Ok(u32::from_le_bytes(bytes))
    }

    /// First operand byte
    pub fn operand_u8(&self) -> VmResult<u8> {
        self.operand.first().copied().ok_or_else(|| VmError::MalformedInstruction {
            opcode: self.opcode,
            reason: "missing operand".into(),
        })
    }
}

impl std::fmt::Debug for Op {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Op")
            .field("opcode", &self.opcode)
            .field("size", &self.size)
            .field("stack_in", &self.stack_in)
            .field("stack_out", &self.stack_out)
            .field("fee", &self.fee)
            .finish()
    }
}

/// Immutable opcode table indexed by opcode byte
pub struct JumpTable {
    entries: [Option<OpSpec>; 256],
}

impl JumpTable {
    /// Empty table
    pub fn empty() -> Self {
        Self { entries: [None; 256] }
    }

    /// Table with the full standard instruction set
    pub fn standard() -> Self {
        let mut table = Self::empty();
        instructions::register(&mut table);
        table
    }

    /// Process-wide standard table
    pub fn shared() -> Arc<JumpTable> {
        static TABLE: OnceLock<Arc<JumpTable>> = OnceLock::new();
        TABLE.get_or_init(|| Arc::new(JumpTable::standard())).clone()
    }

    /// Add or replace an entry
    pub fn insert(&mut self, spec: OpSpec) {
        self.entries[spec.opcode as usize] = Some(spec);
    }

    /// Remove an entry, making its byte undecodable
    pub fn remove(&mut self, opcode: OpCode) {
        self.entries[opcode as usize] = None;
    }

    /// Look up by byte
    pub fn get(&self, byte: u8) -> Option<&OpSpec> {
        self.entries[byte as usize].as_ref()
    }

    /// Number of registered opcodes
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }

    /// Whether no opcode is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decode the instruction at `pc`
    pub fn decode(&self, code: &Bytes, pc: usize) -> VmResult<Op> {
        let byte = code[pc];
        let spec = self.get(byte).ok_or(VmError::InvalidOpcode(byte))?;
        let opcode = spec.opcode;
        let malformed = |reason: String| VmError::MalformedInstruction { opcode, reason };
        let available = code.len() - pc - 1;

        let (operand, size) = match opcode.operand_size() {
            OperandSize::None => (Bytes::new(), 1),
            OperandSize::Fixed(n) => {
                if available < n {
                    return Err(malformed(format!("expected {} operand bytes, found {}", n, available)));
                }
                (code.slice(pc + 1..pc + 1 + n), 1 + n)
            }
            OperandSize::Prefixed(width) => {
                if available < width {
                    return Err(malformed(format!("expected {}-byte length prefix", width)));
                }
                let mut prefix = [0u8; 8];
                prefix[..width].copy_from_slice(&code[pc + 1..pc + 1 + width]);
                let len = u64::from_le_bytes(prefix);
                if len > (available - width) as u64 {
                    return Err(malformed(format!(
                        "declared {} data bytes, found {}",
                        len,
                        available - width
                    )));
                }
                let start = pc + 1 + width;
                let len = len as usize;
                (code.slice(start..start + len), 1 + width + len)
            }
        };

        let item_size = match opcode.operand_size() {
            OperandSize::Prefixed(_) => operand.len(),
            _ => 0,
        };

        Ok(Op {
            opcode,
            operand,
            size,
            stack_in: spec.stack_in,
            alt_in: spec.alt_in,
            stack_out: spec.stack_out,
            alt_out: spec.alt_out,
            growth: spec.growth,
            invocation: spec.invocation,
            array_size: 0,
            item_size,
            fee: cost::price(opcode),
            handler: spec.handler,
            refine: spec.refine,
        })
    }
}

impl Default for JumpTable {
    fn default() -> Self {
        Self::standard()
    }
}
