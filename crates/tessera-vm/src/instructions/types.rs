//! Type inspection and conversion

use super::*;
use crate::error::VmError;
use crate::jump_table::{Args, Op, OpSpec, Outputs};
use crate::opcode::OpCode;
use crate::stack_item::StackItemType;

pub(super) fn register(table: &mut JumpTable) {
    use OpCode::*;
    table.insert(OpSpec::new(ISNULL, is_null).io(1, 1));
    table.insert(OpSpec::new(ISTYPE, is_type).io(1, 1));
    table.insert(OpSpec::new(CONVERT, convert).io(1, 1));
}

fn operand_type(op: &Op) -> VmResult<StackItemType> {
    let byte = op.operand_u8()?;
    match StackItemType::from_byte(byte) {
        Some(StackItemType::Any) | None => Err(VmError::MalformedInstruction {
            opcode: op.opcode,
            reason: format!("invalid item type 0x{:02x}", byte),
        }),
        Some(item_type) => Ok(item_type),
    }
}

fn is_null(_: &Op, _: &mut ExecutionFrame, _: &mut ExecutionHost<'_>, args: Args) -> VmResult<Outputs> {
    let [x] = args.take()?;
    Ok(Outputs::one(x.is_null()))
}

fn is_type(op: &Op, _: &mut ExecutionFrame, _: &mut ExecutionHost<'_>, args: Args) -> VmResult<Outputs> {
    let target = operand_type(op)?;
    let [x] = args.take()?;
    Ok(Outputs::one(x.item_type() == target))
}

fn convert(op: &Op, _: &mut ExecutionFrame, host: &mut ExecutionHost<'_>, args: Args) -> VmResult<Outputs> {
    let target = operand_type(op)?;
    let [x] = args.take()?;
    Ok(Outputs::one(x.convert_to(target, max_int(host))?))
}
