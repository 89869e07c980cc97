//! Flow control

use super::*;
use crate::error::VmError;
use crate::interop;
use crate::jump_table::{Args, Op, OpSpec, Outputs};
use crate::opcode::OpCode;

pub(super) fn register(table: &mut JumpTable) {
    use OpCode::*;
    table.insert(OpSpec::new(NOP, nop));
    table.insert(OpSpec::new(JMP, jump));
    table.insert(OpSpec::new(JMP_L, jump));
    for opcode in [JMPIF, JMPIF_L, JMPIFNOT, JMPIFNOT_L] {
        table.insert(OpSpec::new(opcode, jump_if).io(1, 0));
    }
    for opcode in [JMPEQ, JMPEQ_L, JMPNE, JMPNE_L, JMPGT, JMPGT_L, JMPGE, JMPGE_L, JMPLT, JMPLT_L, JMPLE, JMPLE_L] {
        table.insert(OpSpec::new(opcode, jump_compare).io(2, 0));
    }
    table.insert(OpSpec::new(CALL, call).invocation(1));
    table.insert(OpSpec::new(CALL_L, call).invocation(1));
    table.insert(OpSpec::new(CALLA, call_pointer).io(1, 0).invocation(1));
    table.insert(OpSpec::new(ABORT, abort));
    table.insert(OpSpec::new(ASSERT, assert).io(1, 0));
    table.insert(OpSpec::new(THROW, throw).io(1, 0));
    table.insert(OpSpec::new(RET, ret));
    table.insert(OpSpec::new(SYSCALL, interop::syscall).refine(interop::refine_syscall));
}

fn nop(_: &Op, _: &mut ExecutionFrame, _: &mut ExecutionHost<'_>, _: Args) -> VmResult<Outputs> {
    Ok(Outputs::none())
}

fn relative_target(op: &Op, frame: &ExecutionFrame) -> i64 {
    frame.pc as i64 + op.operand_i64()
}

fn jump(op: &Op, frame: &mut ExecutionFrame, _: &mut ExecutionHost<'_>, _: Args) -> VmResult<Outputs> {
    frame.jump_to(relative_target(op, frame))?;
    Ok(Outputs::none())
}

fn jump_if(op: &Op, frame: &mut ExecutionFrame, _: &mut ExecutionHost<'_>, args: Args) -> VmResult<Outputs> {
    let [condition] = args.take()?;
    let expected = matches!(op.opcode, OpCode::JMPIF | OpCode::JMPIF_L);
    if condition.to_boolean() == expected {
        frame.jump_to(relative_target(op, frame))?;
    }
    Ok(Outputs::none())
}

fn jump_compare(op: &Op, frame: &mut ExecutionFrame, host: &mut ExecutionHost<'_>, args: Args) -> VmResult<Outputs> {
    use OpCode::*;
    let [x2, x1] = args.take()?;
    let (x1, x2) = (int(&x1, host)?, int(&x2, host)?);
    let taken = match op.opcode {
        JMPEQ | JMPEQ_L => x1 == x2,
        JMPNE | JMPNE_L => x1 != x2,
        JMPGT | JMPGT_L => x1 > x2,
        JMPGE | JMPGE_L => x1 >= x2,
        JMPLT | JMPLT_L => x1 < x2,
        JMPLE | JMPLE_L => x1 <= x2,
        other => return Err(VmError::Internal(format!("{} is not a comparison jump", other))),
    };
    if taken {
        frame.jump_to(relative_target(op, frame))?;
    }
    Ok(Outputs::none())
}

fn enter(frame: &mut ExecutionFrame, return_address: usize, target: i64) -> VmResult<()> {
    frame.jump_to(target)?;
    frame.return_stack.push(return_address);
    frame.depth += 1;
    Ok(())
}

fn call(op: &Op, frame: &mut ExecutionFrame, _: &mut ExecutionHost<'_>, _: Args) -> VmResult<Outputs> {
    let target = relative_target(op, frame);
    let return_address = frame.pc + op.size;
    enter(frame, return_address, target)?;
    Ok(Outputs::none())
}

fn call_pointer(op: &Op, frame: &mut ExecutionFrame, _: &mut ExecutionHost<'_>, args: Args) -> VmResult<Outputs> {
    let [pointer] = args.take()?;
    let pointer = match pointer {
        StackItem::Pointer(pointer) => pointer,
        other => return Err(VmError::invalid_type("Pointer", other.item_type())),
    };
    if pointer.script != frame.script_hash {
        return Err(VmError::InvalidArgument("pointer belongs to another script".into()));
    }
    let return_address = frame.pc + op.size;
    enter(frame, return_address, pointer.position as i64)?;
    Ok(Outputs::none())
}

fn abort(_: &Op, _: &mut ExecutionFrame, _: &mut ExecutionHost<'_>, _: Args) -> VmResult<Outputs> {
    Err(VmError::Abort)
}

fn assert(_: &Op, _: &mut ExecutionFrame, _: &mut ExecutionHost<'_>, args: Args) -> VmResult<Outputs> {
    let [condition] = args.take()?;
    if !condition.to_boolean() {
        return Err(VmError::AssertFailed);
    }
    Ok(Outputs::none())
}

fn throw(_: &Op, _: &mut ExecutionFrame, _: &mut ExecutionHost<'_>, args: Args) -> VmResult<Outputs> {
    let [message] = args.take()?;
    let message = match message.to_bytes() {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(_) => message.item_type().to_string(),
    };
    Err(VmError::Throw(message))
}

fn ret(_: &Op, frame: &mut ExecutionFrame, _: &mut ExecutionHost<'_>, _: Args) -> VmResult<Outputs> {
    match frame.return_stack.pop() {
        Some(address) => {
            frame.jump_to(address as i64)?;
            frame.depth = frame.depth.saturating_sub(1);
        }
        // Leaving the outermost routine ends the script
        None => frame.jump_to(frame.code.len() as i64)?,
    }
    Ok(Outputs::none())
}

#[cfg(test)]
mod tests {
    use crate::context::ExecutionInit;
    use crate::error::VmError;
    use crate::frame::VmState;
    use crate::interpreter::Engine;
    use crate::opcode::OpCode;
    use crate::script_builder::ScriptBuilder;
    use crate::snapshot::MemorySnapshot;
    use crate::ExecuteScriptsResult;

    fn run(code: Vec<u8>) -> ExecuteScriptsResult {
        let engine = Engine::default();
        let mut snapshot = MemorySnapshot::new();
        engine.execute(&[code.into()], &mut snapshot, &ExecutionInit::application(), 1_000_000)
    }

    fn ints(result: &ExecuteScriptsResult) -> Vec<String> {
        result
            .stack
            .iter()
            .map(|p| serde_json::to_value(p).unwrap()["value"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    #[test]
    fn test_jmp_skips_code() {
        // JMP +3 over ABORT, then PUSH1
        let code = vec![OpCode::JMP as u8, 3, OpCode::ABORT as u8, OpCode::PUSH1 as u8];
        let result = run(code);
        assert_eq!(result.state, VmState::Halt);
        assert_eq!(ints(&result), vec!["1"]);
    }

    #[test]
    fn test_jmp_out_of_bounds() {
        let result = run(vec![OpCode::JMP as u8, 10]);
        assert_eq!(result.state, VmState::Fault);
        assert!(result.error_message.unwrap().contains(&VmError::InvalidJump(10).to_string()));
    }

    #[test]
    fn test_jmpif_not_taken() {
        let mut builder = ScriptBuilder::new();
        builder.emit_push_bool(false);
        builder.emit_jump(OpCode::JMPIF, 3);
        builder.emit(OpCode::PUSH2);
        builder.emit(OpCode::PUSH3);
        let result = run(builder.to_bytes());
        assert_eq!(ints(&result), vec!["3", "2"]);
    }

    #[test]
    fn test_jmpgt_compares_deeper_to_top() {
        // 5 > 3 jumps over PUSH9
        let mut builder = ScriptBuilder::new();
        builder.emit_push_int(5).emit_push_int(3);
        builder.emit_jump(OpCode::JMPGT, 3);
        builder.emit(OpCode::PUSH9);
        builder.emit(OpCode::PUSH1);
        let result = run(builder.to_bytes());
        assert_eq!(ints(&result), vec!["1"]);
    }

    #[test]
    fn test_call_and_ret() {
        // CALL +4 -> PUSH7 RET ; after return PUSH1 then RET ends the script
        let code = vec![
            OpCode::CALL as u8,
            4,
            OpCode::PUSH1 as u8,
            OpCode::RET as u8,
            OpCode::PUSH7 as u8,
            OpCode::RET as u8,
        ];
        let result = run(code);
        assert_eq!(result.state, VmState::Halt);
        assert_eq!(ints(&result), vec!["1", "7"]);
    }

    #[test]
    fn test_ret_halts_outermost() {
        let code = vec![OpCode::PUSH1 as u8, OpCode::RET as u8, OpCode::ABORT as u8];
        let result = run(code);
        assert_eq!(result.state, VmState::Halt);
    }

    #[test]
    fn test_abort_and_assert() {
        assert_eq!(run(vec![OpCode::ABORT as u8]).state, VmState::Fault);
        assert_eq!(run(vec![OpCode::PUSHF as u8, OpCode::ASSERT as u8]).state, VmState::Fault);
        assert_eq!(run(vec![OpCode::PUSHT as u8, OpCode::ASSERT as u8]).state, VmState::Halt);
    }

    #[test]
    fn test_throw_message() {
        let mut builder = ScriptBuilder::new();
        builder.emit_push_bytes(b"boom").unwrap();
        builder.emit(OpCode::THROW);
        let result = run(builder.to_bytes());
        assert_eq!(result.state, VmState::Fault);
        assert!(result.error_message.unwrap().starts_with("script threw: boom"));
    }

    #[test]
    fn test_calla_pointer() {
        // PUSHA +7 -> CALLA ; PUSH1 ; RET ; target: PUSH8 RET
        let code = vec![
            OpCode::PUSHA as u8,
            7,
            0,
            0,
            0,
            OpCode::CALLA as u8,
            OpCode::RET as u8,
            OpCode::PUSH8 as u8,
            OpCode::RET as u8,
        ];
        let result = run(code);
        assert_eq!(result.state, VmState::Halt);
        assert_eq!(ints(&result), vec!["8"]);
    }
}
