//! Instruction set definitions

use std::fmt;

/// Size of an instruction's immediate operand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandSize {
    /// No operand
    None,
    /// Fixed number of operand bytes
    Fixed(usize),
    /// Little-endian length prefix of the given width, followed by that many bytes
    Prefixed(usize),
}

macro_rules! opcodes {
    ($($name:ident = $byte:literal),* $(,)?) => {
        /// Tessera VM opcodes
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[repr(u8)]
        #[allow(missing_docs, non_camel_case_types)]
        pub enum OpCode {
            $($name = $byte,)*
        }

        impl OpCode {
            /// Every defined opcode, in byte order
            pub const ALL: &'static [OpCode] = &[$(OpCode::$name,)*];

            /// Try to convert from byte
            pub fn from_byte(byte: u8) -> Option<Self> {
                match byte {
                    $($byte => Some(OpCode::$name),)*
                    _ => None,
                }
            }

            /// Mnemonic
            pub fn name(self) -> &'static str {
                match self {
                    $(OpCode::$name => stringify!($name),)*
                }
            }
        }
    };
}

opcodes! {
    // Constants
    PUSHINT8 = 0x00,
    PUSHINT16 = 0x01,
    PUSHINT32 = 0x02,
    PUSHINT64 = 0x03,
    PUSHINT128 = 0x04,
    PUSHINT256 = 0x05,
    PUSHT = 0x08,
    PUSHF = 0x09,
    PUSHA = 0x0A,
    PUSHNULL = 0x0B,
    PUSHDATA1 = 0x0C,
    PUSHDATA2 = 0x0D,
    PUSHDATA4 = 0x0E,
    PUSHM1 = 0x0F,
    PUSH0 = 0x10,
    PUSH1 = 0x11,
    PUSH2 = 0x12,
    PUSH3 = 0x13,
    PUSH4 = 0x14,
    PUSH5 = 0x15,
    PUSH6 = 0x16,
    PUSH7 = 0x17,
    PUSH8 = 0x18,
    PUSH9 = 0x19,
    PUSH10 = 0x1A,
    PUSH11 = 0x1B,
    PUSH12 = 0x1C,
    PUSH13 = 0x1D,
    PUSH14 = 0x1E,
    PUSH15 = 0x1F,
    PUSH16 = 0x20,

    // Flow control
    NOP = 0x21,
    JMP = 0x22,
    JMP_L = 0x23,
    JMPIF = 0x24,
    JMPIF_L = 0x25,
    JMPIFNOT = 0x26,
    JMPIFNOT_L = 0x27,
    JMPEQ = 0x28,
    JMPEQ_L = 0x29,
    JMPNE = 0x2A,
    JMPNE_L = 0x2B,
    JMPGT = 0x2C,
    JMPGT_L = 0x2D,
    JMPGE = 0x2E,
    JMPGE_L = 0x2F,
    JMPLT = 0x30,
    JMPLT_L = 0x31,
    JMPLE = 0x32,
    JMPLE_L = 0x33,
    CALL = 0x34,
    CALL_L = 0x35,
    CALLA = 0x36,
    ABORT = 0x38,
    ASSERT = 0x39,
    THROW = 0x3A,
    RET = 0x40,
    SYSCALL = 0x41,

    // Stack
    DEPTH = 0x43,
    DROP = 0x45,
    NIP = 0x46,
    XDROP = 0x48,
    CLEAR = 0x49,
    DUP = 0x4A,
    OVER = 0x4B,
    PICK = 0x4D,
    TUCK = 0x4E,
    SWAP = 0x50,
    ROT = 0x51,
    ROLL = 0x52,
    REVERSE3 = 0x53,
    REVERSE4 = 0x54,
    REVERSEN = 0x55,

    // Alt stack
    DUPFROMALTSTACK = 0x6A,
    TOALTSTACK = 0x6B,
    FROMALTSTACK = 0x6C,

    // Splice
    NEWBUFFER = 0x88,
    MEMCPY = 0x89,
    CAT = 0x8B,
    SUBSTR = 0x8C,
    LEFT = 0x8D,
    RIGHT = 0x8E,

    // Bitwise logic
    INVERT = 0x90,
    AND = 0x91,
    OR = 0x92,
    XOR = 0x93,
    EQUAL = 0x97,
    NOTEQUAL = 0x98,

    // Arithmetic
    SIGN = 0x99,
    ABS = 0x9A,
    NEGATE = 0x9B,
    INC = 0x9C,
    DEC = 0x9D,
    ADD = 0x9E,
    SUB = 0x9F,
    MUL = 0xA0,
    DIV = 0xA1,
    MOD = 0xA2,
    SHL = 0xA8,
    SHR = 0xA9,
    NOT = 0xAA,
    BOOLAND = 0xAB,
    BOOLOR = 0xAC,
    NZ = 0xB1,
    NUMEQUAL = 0xB3,
    NUMNOTEQUAL = 0xB4,
    LT = 0xB5,
    LE = 0xB6,
    GT = 0xB7,
    GE = 0xB8,
    MIN = 0xB9,
    MAX = 0xBA,
    WITHIN = 0xBB,

    // Compound types
    PACK = 0xC0,
    UNPACK = 0xC1,
    NEWARRAY0 = 0xC2,
    NEWARRAY = 0xC3,
    NEWARRAY_T = 0xC4,
    NEWSTRUCT0 = 0xC5,
    NEWSTRUCT = 0xC6,
    NEWMAP = 0xC8,
    SIZE = 0xCA,
    HASKEY = 0xCB,
    KEYS = 0xCC,
    VALUES = 0xCD,
    PICKITEM = 0xCE,
    APPEND = 0xCF,
    SETITEM = 0xD0,
    REVERSEITEMS = 0xD1,
    REMOVE = 0xD2,
    CLEARITEMS = 0xD3,

    // Types
    ISNULL = 0xD8,
    ISTYPE = 0xD9,
    CONVERT = 0xDB,
}

impl OpCode {
    /// Immediate operand layout
    pub fn operand_size(self) -> OperandSize {
        use OpCode::*;
        match self {
            PUSHINT8 | JMP | JMPIF | JMPIFNOT | JMPEQ | JMPNE | JMPGT | JMPGE | JMPLT | JMPLE
            | CALL | NEWARRAY_T | ISTYPE | CONVERT => OperandSize::Fixed(1),
            PUSHINT16 => OperandSize::Fixed(2),
            PUSHINT32 | PUSHA | JMP_L | JMPIF_L | JMPIFNOT_L | JMPEQ_L | JMPNE_L | JMPGT_L
            | JMPGE_L | JMPLT_L | JMPLE_L | CALL_L | SYSCALL => OperandSize::Fixed(4),
            PUSHINT64 => OperandSize::Fixed(8),
            PUSHINT128 => OperandSize::Fixed(16),
            PUSHINT256 => OperandSize::Fixed(32),
            PUSHDATA1 => OperandSize::Prefixed(1),
            PUSHDATA2 => OperandSize::Prefixed(2),
            PUSHDATA4 => OperandSize::Prefixed(4),
            _ => OperandSize::None,
        }
    }

    /// Value pushed by `PUSHM1`..`PUSH16`, if this is one of them
    pub fn small_int(self) -> Option<i64> {
        let byte = self as u8;
        if (OpCode::PUSHM1 as u8..=OpCode::PUSH16 as u8).contains(&byte) {
            Some(byte as i64 - OpCode::PUSH0 as u8 as i64)
        } else {
            None
        }
    }

    /// Whether this is a jump with a relative target
    pub fn is_jump(self) -> bool {
        (OpCode::JMP as u8..=OpCode::JMPLE_L as u8).contains(&(self as u8))
    }

    /// Whether this opcode takes the 4-byte form of its jump offset
    pub fn is_long_form(self) -> bool {
        matches!(self.operand_size(), OperandSize::Fixed(4)) && (self.is_jump() || self == OpCode::CALL_L)
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_byte() {
        assert_eq!(OpCode::from_byte(0x21), Some(OpCode::NOP));
        assert_eq!(OpCode::from_byte(0x9E), Some(OpCode::ADD));
        assert_eq!(OpCode::from_byte(0x6B), Some(OpCode::TOALTSTACK));
        assert_eq!(OpCode::from_byte(0xDB), Some(OpCode::CONVERT));
    }

    #[test]
    fn test_from_byte_invalid() {
        // Gaps in the table
        assert_eq!(OpCode::from_byte(0x06), None);
        assert_eq!(OpCode::from_byte(0x37), None);
        assert_eq!(OpCode::from_byte(0x3B), None); // no TRY
        assert_eq!(OpCode::from_byte(0x57), None); // no INITSLOT
        assert_eq!(OpCode::from_byte(0xFF), None);
    }

    #[test]
    fn test_all_roundtrip() {
        for op in OpCode::ALL {
            assert_eq!(OpCode::from_byte(*op as u8), Some(*op), "roundtrip {}", op);
        }
    }

    #[test]
    fn test_small_int() {
        assert_eq!(OpCode::PUSHM1.small_int(), Some(-1));
        assert_eq!(OpCode::PUSH0.small_int(), Some(0));
        assert_eq!(OpCode::PUSH16.small_int(), Some(16));
        assert_eq!(OpCode::NOP.small_int(), None);
        assert_eq!(OpCode::PUSHDATA4.small_int(), None);
    }

    #[test]
    fn test_operand_sizes() {
        assert_eq!(OpCode::NOP.operand_size(), OperandSize::None);
        assert_eq!(OpCode::PUSHINT64.operand_size(), OperandSize::Fixed(8));
        assert_eq!(OpCode::PUSHDATA2.operand_size(), OperandSize::Prefixed(2));
        assert_eq!(OpCode::SYSCALL.operand_size(), OperandSize::Fixed(4));
        assert_eq!(OpCode::JMP.operand_size(), OperandSize::Fixed(1));
    }

    #[test]
    fn test_jump_classification() {
        assert!(OpCode::JMP.is_jump());
        assert!(OpCode::JMPLE_L.is_jump());
        assert!(!OpCode::CALL.is_jump());
        assert!(OpCode::JMPNE_L.is_long_form());
        assert!(OpCode::CALL_L.is_long_form());
        assert!(!OpCode::JMPNE.is_long_form());
    }

    #[test]
    fn test_display() {
        assert_eq!(OpCode::JMPIF_L.to_string(), "JMPIF_L");
    }
}
