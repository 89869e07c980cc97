//! Opcode price table
//!
//! Prices are bundled constants so every node charges the same amount for
//! the same instruction. Variable-length pushes are priced by their length
//! class (`PUSHDATA1/2/4`) rather than by the bytes actually pushed.

use crate::error::{VmError, VmResult};
use crate::opcode::OpCode;
use tessera_primitives::Gas;

/// Price classes
pub mod tier {
    use tessera_primitives::Gas;

    /// Small constants and no-ops
    pub const BASE: Gas = 30;
    /// Stack shuffles touching a fixed number of items
    pub const STACK: Gas = 60;
    /// Jumps
    pub const JUMP: Gas = 70;
    /// Unary numeric operations
    pub const UNARY: Gas = 100;
    /// Byte-size checks
    pub const SIZE: Gas = 150;
    /// Binary numeric and comparison operations
    pub const BINARY: Gas = 200;
    /// Multiplicative operations and shifts
    pub const MULTIPLICATIVE: Gas = 300;
    /// Stack operations touching a variable number of items
    pub const STACK_N: Gas = 400;
    /// Large integer constants and pointers
    pub const PUSH_LARGE: Gas = 120;
    /// Pushes with a one-byte length prefix
    pub const PUSHDATA1: Gas = 180;
    /// Pushes with a two-byte length prefix
    pub const PUSHDATA2: Gas = 13_000;
    /// Pushes with a four-byte length prefix
    pub const PUSHDATA4: Gas = 110_000;
    /// Calls and throws
    pub const CALL: Gas = 22_000;
    /// Buffer allocation and copy
    pub const SPLICE: Gas = 80_000;
    /// Building/flattening compound items
    pub const PACK: Gas = 7_000;
    /// Allocating a sized array
    pub const NEWARRAY: Gas = 15_000;
    /// Keyed access into a compound item
    pub const ITEM_ACCESS: Gas = 270_000;
    /// Listing or mutating a compound item in place
    pub const ITEM_LIST: Gas = 500;
}

/// Price of one instruction, excluding any interop service fee
pub fn price(opcode: OpCode) -> Gas {
    use OpCode::*;
    match opcode {
        PUSHINT8 | PUSHINT16 | PUSHINT32 | PUSHINT64 | PUSHT | PUSHF | PUSHNULL | PUSHM1
        | PUSH0 | PUSH1 | PUSH2 | PUSH3 | PUSH4 | PUSH5 | PUSH6 | PUSH7 | PUSH8 | PUSH9
        | PUSH10 | PUSH11 | PUSH12 | PUSH13 | PUSH14 | PUSH15 | PUSH16 | NOP | ABORT
        | ASSERT | RET | SYSCALL => tier::BASE,

        PUSHINT128 | PUSHINT256 | PUSHA => tier::PUSH_LARGE,
        PUSHDATA1 => tier::PUSHDATA1,
        PUSHDATA2 => tier::PUSHDATA2,
        PUSHDATA4 => tier::PUSHDATA4,

        JMP | JMP_L | JMPIF | JMPIF_L | JMPIFNOT | JMPIFNOT_L | JMPEQ | JMPEQ_L | JMPNE
        | JMPNE_L | JMPGT | JMPGT_L | JMPGE | JMPGE_L | JMPLT | JMPLT_L | JMPLE | JMPLE_L => {
            tier::JUMP
        }
        CALL | CALL_L | CALLA | THROW => tier::CALL,

        DEPTH | DROP | NIP | DUP | OVER | PICK | TUCK | SWAP | ROT | REVERSE3 | REVERSE4
        | DUPFROMALTSTACK | TOALTSTACK | FROMALTSTACK | ISNULL | ISTYPE => tier::STACK,
        XDROP | CLEAR | ROLL | REVERSEN | NEWARRAY0 | NEWSTRUCT0 | CLEARITEMS => tier::STACK_N,

        NEWBUFFER | MEMCPY | CAT | SUBSTR | LEFT | RIGHT | CONVERT => tier::SPLICE,

        INVERT | SIGN | ABS | NEGATE | INC | DEC | NOT | NZ => tier::UNARY,
        AND | OR | XOR | EQUAL | NOTEQUAL | ADD | SUB | BOOLAND | BOOLOR | NUMEQUAL
        | NUMNOTEQUAL | LT | LE | GT | GE | MIN | MAX | WITHIN | NEWMAP => tier::BINARY,
        MUL | DIV | MOD | SHL | SHR => tier::MULTIPLICATIVE,

        PACK | UNPACK | VALUES => tier::PACK,
        NEWARRAY | NEWARRAY_T | NEWSTRUCT | APPEND => tier::NEWARRAY,
        SIZE => tier::SIZE,
        HASKEY | PICKITEM | SETITEM => tier::ITEM_ACCESS,
        KEYS | REVERSEITEMS | REMOVE => tier::ITEM_LIST,
    }
}

/// Price of the instruction encoded by `byte`
pub fn price_of(byte: u8) -> VmResult<Gas> {
    OpCode::from_byte(byte)
        .map(price)
        .ok_or(VmError::InvalidOpcode(byte))
}
