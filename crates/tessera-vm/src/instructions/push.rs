//! Constants

use super::*;
use crate::error::VmError;
use crate::jump_table::{Args, Op, OpSpec, Outputs};
use crate::opcode::OpCode;
use crate::stack_item::Pointer;

pub(super) fn register(table: &mut JumpTable) {
    use OpCode::*;
    for opcode in [PUSHINT8, PUSHINT16, PUSHINT32, PUSHINT64, PUSHINT128, PUSHINT256] {
        table.insert(OpSpec::new(opcode, push_int).io(0, 1));
    }
    table.insert(OpSpec::new(PUSHT, push_true).io(0, 1));
    table.insert(OpSpec::new(PUSHF, push_false).io(0, 1));
    table.insert(OpSpec::new(PUSHA, push_pointer).io(0, 1));
    table.insert(OpSpec::new(PUSHNULL, push_null).io(0, 1));
    for opcode in [PUSHDATA1, PUSHDATA2, PUSHDATA4] {
        table.insert(OpSpec::new(opcode, push_data).io(0, 1));
    }
    for opcode in OpCode::ALL.iter().copied().filter(|op| op.small_int().is_some()) {
        table.insert(OpSpec::new(opcode, push_small).io(0, 1));
    }
}

fn push_int(op: &Op, _: &mut ExecutionFrame, _: &mut ExecutionHost<'_>, _: Args) -> VmResult<Outputs> {
    Ok(Outputs::one(BigInt::from_signed_bytes_le(&op.operand)))
}

fn push_true(_: &Op, _: &mut ExecutionFrame, _: &mut ExecutionHost<'_>, _: Args) -> VmResult<Outputs> {
    Ok(Outputs::one(true))
}

fn push_false(_: &Op, _: &mut ExecutionFrame, _: &mut ExecutionHost<'_>, _: Args) -> VmResult<Outputs> {
    Ok(Outputs::one(false))
}

fn push_null(_: &Op, _: &mut ExecutionFrame, _: &mut ExecutionHost<'_>, _: Args) -> VmResult<Outputs> {
    Ok(Outputs::one(StackItem::Null))
}

fn push_data(op: &Op, _: &mut ExecutionFrame, _: &mut ExecutionHost<'_>, _: Args) -> VmResult<Outputs> {
    Ok(Outputs::one(StackItem::ByteString(op.operand.clone())))
}

fn push_small(op: &Op, _: &mut ExecutionFrame, _: &mut ExecutionHost<'_>, _: Args) -> VmResult<Outputs> {
    let value = op
        .opcode
        .small_int()
        .ok_or_else(|| VmError::Internal(format!("{} is not a small integer push", op.opcode)))?;
    Ok(Outputs::one(value))
}

fn push_pointer(op: &Op, frame: &mut ExecutionFrame, _: &mut ExecutionHost<'_>, _: Args) -> VmResult<Outputs> {
    let position = frame.pc as i64 + op.operand_i64();
    if position < 0 || position as usize >= frame.code.len() {
        return Err(VmError::InvalidJump(position));
    }
    Ok(Outputs::one(StackItem::Pointer(Pointer {
        script: frame.script_hash,
        position: position as usize,
    })))
}

#[cfg(test)]
mod tests {
    use crate::context::ExecutionInit;
    use crate::contract_parameter::ContractParameter;
    use crate::frame::VmState;
    use crate::interpreter::Engine;
    use crate::opcode::OpCode;
    use crate::script_builder::ScriptBuilder;
    use crate::snapshot::MemorySnapshot;
    use crate::ExecuteScriptsResult;
    use num_bigint::BigInt;

    fn run(code: Vec<u8>) -> ExecuteScriptsResult {
        let mut snapshot = MemorySnapshot::new();
        Engine::default().execute(&[code.into()], &mut snapshot, &ExecutionInit::application(), 1_000_000)
    }

    fn int(v: i64) -> ContractParameter {
        ContractParameter::Integer(BigInt::from(v))
    }

    #[test]
    fn test_pushint_sign_extends() {
        let result = run(vec![OpCode::PUSHINT16 as u8, 0x00, 0x80, OpCode::PUSHINT8 as u8, 0x7f]);
        assert_eq!(result.state, VmState::Halt);
        assert_eq!(result.stack, vec![int(127), int(-32768)]);
    }

    #[test]
    fn test_small_ints() {
        let result = run(vec![OpCode::PUSHM1 as u8, OpCode::PUSH0 as u8, OpCode::PUSH16 as u8]);
        assert_eq!(result.stack, vec![int(16), int(0), int(-1)]);
    }

    #[test]
    fn test_push_constants() {
        let result = run(vec![OpCode::PUSHT as u8, OpCode::PUSHF as u8, OpCode::PUSHNULL as u8]);
        assert_eq!(
            result.stack,
            vec![
                ContractParameter::Any,
                ContractParameter::Boolean(false),
                ContractParameter::Boolean(true)
            ]
        );
    }

    #[test]
    fn test_pushdata() {
        let mut builder = ScriptBuilder::new();
        builder.emit_push_bytes(b"tessera").unwrap();
        let result = run(builder.to_bytes());
        assert_eq!(result.stack, vec![ContractParameter::ByteArray(b"tessera".to_vec())]);
        assert_eq!(result.gas_consumed, 180);
    }

    #[test]
    fn test_pusha_out_of_script() {
        let result = run(vec![OpCode::PUSHA as u8, 0x10, 0, 0, 0]);
        assert_eq!(result.state, VmState::Fault);
        assert!(result.error_message.unwrap().starts_with("invalid jump target: 16"));
    }
}
