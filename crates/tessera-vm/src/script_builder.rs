//! Bytecode assembler

use crate::error::{VmError, VmResult};
use crate::frame::Script;
use crate::opcode::OpCode;
use crate::stack_item::StackItemType;
use num_bigint::{BigInt, Sign};

/// Widths of the fixed-size integer pushes, smallest first
const INT_WIDTHS: [(usize, OpCode); 6] = [
    (1, OpCode::PUSHINT8),
    (2, OpCode::PUSHINT16),
    (4, OpCode::PUSHINT32),
    (8, OpCode::PUSHINT64),
    (16, OpCode::PUSHINT128),
    (32, OpCode::PUSHINT256),
];

/// Fluent builder for scripts
///
/// ```
/// use tessera_vm::{OpCode, ScriptBuilder};
///
/// let mut builder = ScriptBuilder::new();
/// builder.emit_push_int(2).emit_push_int(3).emit(OpCode::ADD);
/// assert_eq!(builder.to_bytes(), vec![0x12, 0x13, 0x9E]);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScriptBuilder {
    code: Vec<u8>,
}

impl ScriptBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes emitted so far
    pub fn len(&self) -> usize {
        self.code.len()
    }

    /// Whether nothing has been emitted
    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Emit an opcode with no operand
    pub fn emit(&mut self, opcode: OpCode) -> &mut Self {
        self.code.push(opcode as u8);
        self
    }

    /// Emit an opcode followed by raw operand bytes
    pub fn emit_with_operand(&mut self, opcode: OpCode, operand: &[u8]) -> &mut Self {
        self.code.push(opcode as u8);
        self.code.extend_from_slice(operand);
        self
    }

    /// Emit raw bytes
    pub fn emit_raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.code.extend_from_slice(bytes);
        self
    }

    /// Emit a little-endian `u32`
    pub fn emit_u32_le(&mut self, value: u32) -> &mut Self {
        self.code.extend_from_slice(&value.to_le_bytes());
        self
    }

    /// Push an integer using the shortest encoding
    pub fn emit_push_int(&mut self, value: impl Into<BigInt>) -> &mut Self {
        let value = value.into();
        if let Ok(small) = i64::try_from(&value) {
            if (-1..=16).contains(&small) {
                let byte = OpCode::PUSH0 as u8 as i64 + small;
                self.code.push(byte as u8);
                return self;
            }
        }

        let bytes = value.to_signed_bytes_le();
        match INT_WIDTHS.iter().find(|(width, _)| bytes.len() <= *width) {
            Some(&(width, opcode)) => {
                let fill = if value.sign() == Sign::Minus { 0xFF } else { 0x00 };
                self.code.push(opcode as u8);
                self.code.extend_from_slice(&bytes);
                self.code.resize(self.code.len() + width - bytes.len(), fill);
                self
            }
            // Wider than any fixed push: push the bytes and convert
            None => {
                self.push_data(&bytes);
                self.emit_with_operand(OpCode::CONVERT, &[StackItemType::Integer as u8])
            }
        }
    }

    /// Push bytes with the smallest `PUSHDATA` prefix that fits
    pub fn emit_push_bytes(&mut self, data: &[u8]) -> VmResult<&mut Self> {
        if u32::try_from(data.len()).is_err() {
            return Err(VmError::InvalidArgument(format!("{} bytes cannot be pushed", data.len())));
        }
        self.push_data(data);
        Ok(self)
    }

    fn push_data(&mut self, data: &[u8]) {
        let len = data.len();
        if len <= u8::MAX as usize {
            self.code.push(OpCode::PUSHDATA1 as u8);
            self.code.push(len as u8);
        } else if len <= u16::MAX as usize {
            self.code.push(OpCode::PUSHDATA2 as u8);
            self.code.extend_from_slice(&(len as u16).to_le_bytes());
        } else {
            self.code.push(OpCode::PUSHDATA4 as u8);
            self.code.extend_from_slice(&(len as u32).to_le_bytes());
        }
        self.code.extend_from_slice(data);
    }

    /// Push a boolean
    pub fn emit_push_bool(&mut self, value: bool) -> &mut Self {
        self.emit(if value { OpCode::PUSHT } else { OpCode::PUSHF })
    }

    /// Push null
    pub fn emit_push_null(&mut self) -> &mut Self {
        self.emit(OpCode::PUSHNULL)
    }

    /// Emit a jump or call with a relative offset
    ///
    /// Short forms are widened to their 4-byte variant when the offset does
    /// not fit in one byte. Other opcodes get the offset as a 4-byte operand.
    pub fn emit_jump(&mut self, opcode: OpCode, offset: i32) -> &mut Self {
        let short = opcode == OpCode::CALL || (opcode.is_jump() && !opcode.is_long_form());
        if short {
            if let Ok(offset) = i8::try_from(offset) {
                return self.emit_with_operand(opcode, &[offset as u8]);
            }
            // every short form is directly followed by its long form
            if let Some(long) = OpCode::from_byte(opcode as u8 + 1) {
                return self.emit_with_operand(long, &offset.to_le_bytes());
            }
        }
        self.emit_with_operand(opcode, &offset.to_le_bytes())
    }

    /// Emit a call with a relative offset
    pub fn emit_call(&mut self, offset: i32) -> &mut Self {
        self.emit_jump(OpCode::CALL, offset)
    }

    /// Emit a `SYSCALL` to the named service
    pub fn emit_syscall(&mut self, name: &str) -> &mut Self {
        self.emit(OpCode::SYSCALL);
        self.emit_u32_le(tessera_crypto::interop_id(name))
    }

    /// Copy of the assembled bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        self.code.clone()
    }

    /// Take the assembled bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.code
    }

    /// Assembled script starting at offset 0
    pub fn to_script(&self) -> Script {
        Script::new(self.to_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes(f: impl FnOnce(&mut ScriptBuilder)) -> Vec<u8> {
        let mut builder = ScriptBuilder::new();
        f(&mut builder);
        builder.into_bytes()
    }

    // ==================== Integers ====================

    #[test]
    fn test_push_small_ints() {
        assert_eq!(bytes(|b| {
            b.emit_push_int(-1);
        }), vec![OpCode::PUSHM1 as u8]);
        assert_eq!(bytes(|b| {
            b.emit_push_int(0);
        }), vec![OpCode::PUSH0 as u8]);
        assert_eq!(bytes(|b| {
            b.emit_push_int(16);
        }), vec![OpCode::PUSH16 as u8]);
    }

    #[test]
    fn test_push_int_shortest_width() {
        assert_eq!(bytes(|b| {
            b.emit_push_int(17);
        }), vec![OpCode::PUSHINT8 as u8, 17]);
        assert_eq!(bytes(|b| {
            b.emit_push_int(-2);
        }), vec![OpCode::PUSHINT8 as u8, 0xFE]);
        assert_eq!(bytes(|b| {
            b.emit_push_int(128);
        }), vec![OpCode::PUSHINT16 as u8, 0x80, 0x00]);
        assert_eq!(bytes(|b| {
            b.emit_push_int(-129);
        }), vec![OpCode::PUSHINT16 as u8, 0x7F, 0xFF]);
        assert_eq!(bytes(|b| {
            b.emit_push_int(70_000);
        }), vec![OpCode::PUSHINT32 as u8, 0x70, 0x11, 0x01, 0x00]);
    }

    #[test]
    fn test_push_int_sign_extended() {
        // 3 significant bytes widen to PUSHINT32 with 0xFF fill
        let code = bytes(|b| {
            b.emit_push_int(-70_000);
        });
        assert_eq!(code, vec![OpCode::PUSHINT32 as u8, 0x90, 0xEE, 0xFE, 0xFF]);
    }

    #[test]
    fn test_push_int_wider_than_fixed() {
        let value: BigInt = BigInt::from(1) << 300;
        let code = bytes(|b| {
            b.emit_push_int(value.clone());
        });
        assert_eq!(code[0], OpCode::PUSHDATA1 as u8);
        assert_eq!(code[code.len() - 2..], [OpCode::CONVERT as u8, StackItemType::Integer as u8]);
    }

    // ==================== Bytes ====================

    #[test]
    fn test_push_bytes_prefixes() {
        let mut builder = ScriptBuilder::new();
        builder.emit_push_bytes(&[0xAA; 3]).unwrap();
        assert_eq!(builder.to_bytes(), vec![OpCode::PUSHDATA1 as u8, 3, 0xAA, 0xAA, 0xAA]);

        let mut builder = ScriptBuilder::new();
        builder.emit_push_bytes(&[0u8; 256]).unwrap();
        assert_eq!(&builder.to_bytes()[..3], &[OpCode::PUSHDATA2 as u8, 0x00, 0x01]);
        assert_eq!(builder.len(), 3 + 256);

        let mut builder = ScriptBuilder::new();
        builder.emit_push_bytes(&vec![0u8; 65_536]).unwrap();
        assert_eq!(&builder.to_bytes()[..5], &[OpCode::PUSHDATA4 as u8, 0x00, 0x00, 0x01, 0x00]);
    }

    // ==================== Control flow ====================

    #[test]
    fn test_jump_forms() {
        assert_eq!(bytes(|b| {
            b.emit_jump(OpCode::JMP, -2);
        }), vec![OpCode::JMP as u8, 0xFE]);
        assert_eq!(bytes(|b| {
            b.emit_jump(OpCode::JMPIF, 300);
        }), vec![OpCode::JMPIF_L as u8, 0x2C, 0x01, 0x00, 0x00]);
        assert_eq!(bytes(|b| {
            b.emit_jump(OpCode::JMP_L, 1);
        }), vec![OpCode::JMP_L as u8, 1, 0, 0, 0]);
        assert_eq!(bytes(|b| {
            b.emit_call(1_000);
        }), vec![OpCode::CALL_L as u8, 0xE8, 0x03, 0x00, 0x00]);
    }

    #[test]
    fn test_syscall() {
        let code = bytes(|b| {
            b.emit_syscall("System.Runtime.GetTrigger");
        });
        assert_eq!(code.len(), 5);
        assert_eq!(code[0], OpCode::SYSCALL as u8);
        let id = u32::from_le_bytes([code[1], code[2], code[3], code[4]]);
        assert_eq!(id, tessera_crypto::interop_id("System.Runtime.GetTrigger"));
    }

    #[test]
    fn test_to_script() {
        let mut builder = ScriptBuilder::new();
        builder.emit(OpCode::NOP);
        let script = builder.to_script();
        assert_eq!(script.code.as_ref(), &[OpCode::NOP as u8]);
        assert_eq!(script.offset, 0);
    }
}
