//! Byte buffers

use super::*;
use crate::error::VmError;
use crate::jump_table::{Args, Op, OpSpec, Outputs};
use crate::opcode::OpCode;

pub(super) fn register(table: &mut JumpTable) {
    use OpCode::*;
    table.insert(OpSpec::new(NEWBUFFER, new_buffer).io(1, 1).refine(refine_new_buffer));
    table.insert(OpSpec::new(MEMCPY, memcpy).io(5, 1));
    table.insert(OpSpec::new(CAT, cat).io(2, 1).refine(refine_cat));
    table.insert(OpSpec::new(SUBSTR, substr).io(3, 1));
    table.insert(OpSpec::new(LEFT, left).io(2, 1));
    table.insert(OpSpec::new(RIGHT, right).io(2, 1));
}

fn refine_new_buffer(op: &mut Op, frame: &ExecutionFrame, host: &ExecutionHost<'_>) -> VmResult<()> {
    if let Some(len) = peek_count(frame, 0, host) {
        op.item_size = len;
    }
    Ok(())
}

fn refine_cat(op: &mut Op, frame: &ExecutionFrame, _: &ExecutionHost<'_>) -> VmResult<()> {
    let b = frame.peek(0).and_then(StackItem::byte_len).unwrap_or(0);
    let a = frame.peek(1).and_then(StackItem::byte_len).unwrap_or(0);
    op.item_size = a.saturating_add(b);
    Ok(())
}

fn checked_range(index: usize, count: usize, len: usize) -> VmResult<std::ops::Range<usize>> {
    match index.checked_add(count) {
        Some(end) if end <= len => Ok(index..end),
        _ => Err(VmError::IndexOutOfRange {
            index: index.saturating_add(count) as i64,
            size: len,
        }),
    }
}

fn new_buffer(_: &Op, _: &mut ExecutionFrame, host: &mut ExecutionHost<'_>, args: Args) -> VmResult<Outputs> {
    let [len] = args.take()?;
    Ok(Outputs::one(StackItem::Buffer(vec![0u8; count(&len, host)?])))
}

fn memcpy(_: &Op, _: &mut ExecutionFrame, host: &mut ExecutionHost<'_>, args: Args) -> VmResult<Outputs> {
    let [len, src_index, src, dst_index, dst] = args.take()?;
    let len = count(&len, host)?;
    let src = src.to_bytes()?;
    let src_range = checked_range(count(&src_index, host)?, len, src.len())?;
    let mut dst = match dst {
        StackItem::Buffer(bytes) => bytes,
        other => return Err(VmError::invalid_type("Buffer", other.item_type())),
    };
    let dst_range = checked_range(count(&dst_index, host)?, len, dst.len())?;
    dst[dst_range].copy_from_slice(&src[src_range]);
    Ok(Outputs::one(StackItem::Buffer(dst)))
}

fn cat(_: &Op, _: &mut ExecutionFrame, _: &mut ExecutionHost<'_>, args: Args) -> VmResult<Outputs> {
    let [b, a] = args.take()?;
    let mut bytes = a.to_bytes()?;
    bytes.extend_from_slice(&b.to_bytes()?);
    Ok(Outputs::one(StackItem::Buffer(bytes)))
}

fn substr(_: &Op, _: &mut ExecutionFrame, host: &mut ExecutionHost<'_>, args: Args) -> VmResult<Outputs> {
    let [len, index, x] = args.take()?;
    let bytes = x.to_bytes()?;
    let range = checked_range(count(&index, host)?, count(&len, host)?, bytes.len())?;
    Ok(Outputs::one(StackItem::Buffer(bytes[range].to_vec())))
}

fn left(_: &Op, _: &mut ExecutionFrame, host: &mut ExecutionHost<'_>, args: Args) -> VmResult<Outputs> {
    let [len, x] = args.take()?;
    let bytes = x.to_bytes()?;
    let range = checked_range(0, count(&len, host)?, bytes.len())?;
    Ok(Outputs::one(StackItem::Buffer(bytes[range].to_vec())))
}

fn right(_: &Op, _: &mut ExecutionFrame, host: &mut ExecutionHost<'_>, args: Args) -> VmResult<Outputs> {
    let [len, x] = args.take()?;
    let bytes = x.to_bytes()?;
    let len = count(&len, host)?;
    let start = bytes.len().checked_sub(len).ok_or(VmError::IndexOutOfRange {
        index: len as i64,
        size: bytes.len(),
    })?;
    Ok(Outputs::one(StackItem::Buffer(bytes[start..].to_vec())))
}

#[cfg(test)]
mod tests {
    use crate::config::{EngineConfig, ExecutionLimits};
    use crate::context::ExecutionInit;
    use crate::frame::VmState;
    use crate::interpreter::Engine;
    use crate::opcode::OpCode;
    use crate::script_builder::ScriptBuilder;
    use crate::snapshot::MemorySnapshot;
    use crate::{ContractParameter, ExecuteScriptsResult};

    fn run_with(engine: &Engine, builder: &ScriptBuilder) -> ExecuteScriptsResult {
        let mut snapshot = MemorySnapshot::new();
        engine.execute(&[builder.to_script()], &mut snapshot, &ExecutionInit::application(), 10_000_000)
    }

    fn run(builder: &ScriptBuilder) -> ExecuteScriptsResult {
        run_with(&Engine::default(), builder)
    }

    fn bytes(value: &[u8]) -> ContractParameter {
        ContractParameter::ByteArray(value.to_vec())
    }

    #[test]
    fn test_cat() {
        let mut builder = ScriptBuilder::new();
        builder.emit_push_bytes(b"ab").unwrap();
        builder.emit_push_bytes(b"cd").unwrap();
        builder.emit(OpCode::CAT);
        assert_eq!(run(&builder).stack, vec![bytes(b"abcd")]);
    }

    #[test]
    fn test_substr_left_right() {
        let mut builder = ScriptBuilder::new();
        builder.emit_push_bytes(b"hello").unwrap();
        builder.emit_push_int(1).emit_push_int(3).emit(OpCode::SUBSTR);
        assert_eq!(run(&builder).stack, vec![bytes(b"ell")]);

        let mut builder = ScriptBuilder::new();
        builder.emit_push_bytes(b"hello").unwrap();
        builder.emit_push_int(2).emit(OpCode::LEFT);
        assert_eq!(run(&builder).stack, vec![bytes(b"he")]);

        let mut builder = ScriptBuilder::new();
        builder.emit_push_bytes(b"hello").unwrap();
        builder.emit_push_int(2).emit(OpCode::RIGHT);
        assert_eq!(run(&builder).stack, vec![bytes(b"lo")]);
    }

    #[test]
    fn test_substr_out_of_range() {
        let mut builder = ScriptBuilder::new();
        builder.emit_push_bytes(b"hi").unwrap();
        builder.emit_push_int(1).emit_push_int(5).emit(OpCode::SUBSTR);
        let result = run(&builder);
        assert_eq!(result.state, VmState::Fault);
        assert!(result.error_message.unwrap().contains("out of range"));
    }

    #[test]
    fn test_newbuffer_and_memcpy() {
        let mut builder = ScriptBuilder::new();
        builder.emit_push_int(4).emit(OpCode::NEWBUFFER);
        builder.emit_push_int(1);
        builder.emit_push_bytes(b"xy").unwrap();
        builder.emit_push_int(0).emit_push_int(2).emit(OpCode::MEMCPY);
        assert_eq!(run(&builder).stack, vec![bytes(&[0, b'x', b'y', 0])]);
    }

    #[test]
    fn test_newbuffer_item_overflow() {
        let config = EngineConfig {
            limits: ExecutionLimits {
                max_item_size: 8,
                ..Default::default()
            },
            ..Default::default()
        };
        let engine = Engine::new(config);
        let mut builder = ScriptBuilder::new();
        builder.emit_push_int(9).emit(OpCode::NEWBUFFER);
        let result = run_with(&engine, &builder);
        assert_eq!(result.state, VmState::Fault);
        assert!(result.error_message.unwrap().contains("item overflow"));
    }

    #[test]
    fn test_cat_item_overflow_checked_before_execution() {
        let config = EngineConfig {
            limits: ExecutionLimits {
                max_item_size: 3,
                ..Default::default()
            },
            ..Default::default()
        };
        let engine = Engine::new(config);
        let mut builder = ScriptBuilder::new();
        builder.emit_push_bytes(b"ab").unwrap();
        builder.emit_push_bytes(b"cd").unwrap();
        builder.emit(OpCode::CAT);
        let result = run_with(&engine, &builder);
        assert_eq!(result.state, VmState::Fault);
        assert!(result.error_message.unwrap().contains("item overflow: 4 bytes exceeds limit 3"));
    }
}
