//! VM error types

use crate::opcode::OpCode;
use crate::stack_item::StackItemType;
use std::fmt;
use tessera_primitives::{Gas, ScriptHash};
use thiserror::Error;

/// VM execution errors
///
/// Every variant is terminal for the frame that raised it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VmError {
    /// Byte has no opcode table entry
    #[error("invalid opcode: 0x{0:02x}")]
    InvalidOpcode(u8),

    /// Operand bytes missing or out of range
    #[error("malformed {opcode} instruction: {reason}")]
    MalformedInstruction {
        /// Instruction being decoded
        opcode: OpCode,
        /// What is wrong with it
        reason: String,
    },

    /// Not enough items on the evaluation stack
    #[error("stack underflow: {opcode} requires {required} items, found {actual}")]
    StackUnderflow {
        /// Instruction being executed
        opcode: OpCode,
        /// Items required
        required: usize,
        /// Items present
        actual: usize,
    },

    /// Not enough items on the alt stack
    #[error("alt stack underflow: {opcode} requires {required} items, found {actual}")]
    AltStackUnderflow {
        /// Instruction being executed
        opcode: OpCode,
        /// Items required
        required: usize,
        /// Items present
        actual: usize,
    },

    /// Combined stack size over the ceiling
    #[error("stack overflow: size {size} exceeds limit {limit}")]
    StackOverflow {
        /// Size after the instruction
        size: usize,
        /// Configured ceiling
        limit: usize,
    },

    /// Call depth over the ceiling
    #[error("invocation stack overflow: depth {depth} exceeds limit {limit}")]
    InvocationStackOverflow {
        /// Depth after the instruction
        depth: usize,
        /// Configured ceiling
        limit: usize,
    },

    /// Compound item would hold too many elements
    #[error("array overflow: {size} elements exceeds limit {limit}")]
    ArrayOverflow {
        /// Element count requested
        size: usize,
        /// Configured ceiling
        limit: usize,
    },

    /// Byte item would be too large
    #[error("item overflow: {size} bytes exceeds limit {limit}")]
    ItemOverflow {
        /// Byte size requested
        size: usize,
        /// Configured ceiling
        limit: usize,
    },

    /// Gas exhausted
    #[error("out of gas: required {required}, available {available}")]
    OutOfGas {
        /// Price of the instruction
        required: Gas,
        /// Gas left before charging
        available: Gas,
    },

    /// Opcode table and handler disagree
    #[error("internal error: {0}")]
    Internal(String),

    /// Jump target outside the script
    #[error("invalid jump target: {0}")]
    InvalidJump(i64),

    /// Operand has the wrong item type
    #[error("invalid type: expected {expected}, found {found}")]
    InvalidType {
        /// Expected type description
        expected: &'static str,
        /// Actual type
        found: StackItemType,
    },

    /// Item cannot be converted
    #[error("cannot convert {from} to {to}")]
    InvalidConversion {
        /// Source type
        from: StackItemType,
        /// Target type
        to: StackItemType,
    },

    /// Integer wider than allowed
    #[error("integer exceeds {limit} bytes")]
    IntegerOverflow {
        /// Configured width in bytes
        limit: usize,
    },

    /// Division or modulo by zero
    #[error("division by zero")]
    DivisionByZero,

    /// Index outside a collection
    #[error("index {index} out of range for size {size}")]
    IndexOutOfRange {
        /// Requested index
        index: i64,
        /// Collection size
        size: usize,
    },

    /// Bad numeric argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Map key missing
    #[error("key not found")]
    KeyNotFound,

    /// Item not usable as a map key
    #[error("invalid map key: {0}")]
    InvalidMapKey(String),

    /// ABORT executed
    #[error("execution aborted")]
    Abort,

    /// ASSERT on a false value
    #[error("assertion failed")]
    AssertFailed,

    /// THROW executed
    #[error("script threw: {0}")]
    Throw(String),

    /// SYSCALL id not registered
    #[error("unknown syscall: 0x{0:08x}")]
    UnknownSyscall(u32),

    /// Service not callable under the current trigger
    #[error("{service} is not allowed under trigger {trigger}")]
    TriggerNotAllowed {
        /// Service name
        service: &'static str,
        /// Active trigger
        trigger: String,
    },

    /// Write through a read-only storage context
    #[error("storage context is read-only")]
    ReadOnlyContext,

    /// No contract stored under the hash
    #[error("contract not found: {0}")]
    ContractNotFound(ScriptHash),

    /// Contract already stored under the hash
    #[error("contract already exists: {0}")]
    ContractExists(ScriptHash),

    /// Service needs a persisting block and none was supplied
    #[error("no persisting block")]
    MissingPersistingBlock,

    /// Snapshot failure
    #[error("storage error: {0}")]
    Storage(String),

    /// A nested contract call faulted; carries the innermost fault
    #[error("contract call faulted at depth {depth}: {fault}")]
    ContractFault {
        /// Depth of the faulting contract
        depth: usize,
        /// Innermost fault
        fault: String,
    },
}

impl VmError {
    /// Stable short name, used as a metrics label
    pub fn kind(&self) -> &'static str {
        match self {
            VmError::InvalidOpcode(_) => "invalid_opcode",
            VmError::MalformedInstruction { .. } => "malformed_instruction",
            VmError::StackUnderflow { .. } => "stack_underflow",
            VmError::AltStackUnderflow { .. } => "alt_stack_underflow",
            VmError::StackOverflow { .. } => "stack_overflow",
            VmError::InvocationStackOverflow { .. } => "invocation_stack_overflow",
            VmError::ArrayOverflow { .. } => "array_overflow",
            VmError::ItemOverflow { .. } => "item_overflow",
            VmError::OutOfGas { .. } => "out_of_gas",
            VmError::Internal(_) => "internal",
            VmError::InvalidJump(_) => "invalid_jump",
            VmError::InvalidType { .. } => "invalid_type",
            VmError::InvalidConversion { .. } => "invalid_conversion",
            VmError::IntegerOverflow { .. } => "integer_overflow",
            VmError::DivisionByZero => "division_by_zero",
            VmError::IndexOutOfRange { .. } => "index_out_of_range",
            VmError::InvalidArgument(_) => "invalid_argument",
            VmError::KeyNotFound => "key_not_found",
            VmError::InvalidMapKey(_) => "invalid_map_key",
            VmError::Abort => "abort",
            VmError::AssertFailed => "assert_failed",
            VmError::Throw(_) => "throw",
            VmError::UnknownSyscall(_) => "unknown_syscall",
            VmError::TriggerNotAllowed { .. } => "trigger_not_allowed",
            VmError::ReadOnlyContext => "read_only_context",
            VmError::ContractNotFound(_) => "contract_not_found",
            VmError::ContractExists(_) => "contract_exists",
            VmError::MissingPersistingBlock => "missing_persisting_block",
            VmError::Storage(_) => "storage",
            VmError::ContractFault { .. } => "contract_fault",
        }
    }

    /// Shorthand for a type mismatch on `found`
    pub fn invalid_type(expected: &'static str, found: StackItemType) -> Self {
        VmError::InvalidType { expected, found }
    }
}

/// Result type for VM operations
pub type VmResult<T> = Result<T, VmError>;

/// A fault together with where it happened
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultInfo {
    /// The error
    pub error: VmError,
    /// Program counter of the faulting instruction
    pub pc: usize,
    /// Decoded opcode, if decoding got that far
    pub opcode: Option<OpCode>,
}

impl FaultInfo {
    /// Create a fault record
    pub fn new(error: VmError, pc: usize, opcode: Option<OpCode>) -> Self {
        Self { error, pc, opcode }
    }
}

impl fmt::Display for FaultInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.opcode {
            Some(op) => write!(f, "{} (pc={}, opcode={})", self.error, self.pc, op),
            None => write!(f, "{} (pc={})", self.error, self.pc),
        }
    }
}

impl std::error::Error for FaultInfo {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(VmError::InvalidOpcode(0xFE).to_string(), "invalid opcode: 0xfe");
        assert_eq!(
            VmError::StackUnderflow {
                opcode: OpCode::ADD,
                required: 2,
                actual: 1
            }
            .to_string(),
            "stack underflow: ADD requires 2 items, found 1"
        );
        assert_eq!(
            VmError::StackOverflow { size: 2049, limit: 2048 }.to_string(),
            "stack overflow: size 2049 exceeds limit 2048"
        );
        assert_eq!(
            VmError::OutOfGas { required: 30, available: 10 }.to_string(),
            "out of gas: required 30, available 10"
        );
        assert_eq!(VmError::UnknownSyscall(0xdeadbeef).to_string(), "unknown syscall: 0xdeadbeef");
        assert_eq!(VmError::DivisionByZero.to_string(), "division by zero");
    }

    #[test]
    fn test_error_conversion_display() {
        let err = VmError::InvalidConversion {
            from: StackItemType::Map,
            to: StackItemType::Integer,
        };
        assert_eq!(err.to_string(), "cannot convert Map to Integer");
    }

    #[test]
    fn test_contract_fault_display() {
        let err = VmError::ContractFault {
            depth: 4,
            fault: "execution aborted (pc=0, opcode=ABORT)".into(),
        };
        assert_eq!(
            err.to_string(),
            "contract call faulted at depth 4: execution aborted (pc=0, opcode=ABORT)"
        );
        assert_eq!(err.kind(), "contract_fault");
    }

    #[test]
    fn test_error_kind() {
        assert_eq!(VmError::Abort.kind(), "abort");
        assert_eq!(VmError::Internal("x".into()).kind(), "internal");
        assert_eq!(VmError::OutOfGas { required: 1, available: 0 }.kind(), "out_of_gas");
    }

    #[test]
    fn test_error_equality() {
        assert_eq!(VmError::InvalidJump(10), VmError::InvalidJump(10));
        assert_ne!(VmError::InvalidJump(10), VmError::InvalidJump(20));
        assert_ne!(VmError::Abort, VmError::AssertFailed);
    }

    // ==================== FaultInfo ====================

    #[test]
    fn test_fault_info_display_with_opcode() {
        let fault = FaultInfo::new(VmError::AssertFailed, 7, Some(OpCode::ASSERT));
        assert_eq!(fault.to_string(), "assertion failed (pc=7, opcode=ASSERT)");
    }

    #[test]
    fn test_fault_info_display_without_opcode() {
        let fault = FaultInfo::new(VmError::InvalidOpcode(0xFF), 3, None);
        assert_eq!(fault.to_string(), "invalid opcode: 0xff (pc=3)");
    }
}
