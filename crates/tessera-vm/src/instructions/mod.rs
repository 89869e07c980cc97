//! Instruction handlers, grouped by family

mod compound;
mod control;
mod numeric;
mod push;
mod splice;
mod stack;
mod types;

use crate::context::ExecutionHost;
use crate::error::VmResult;
use crate::frame::ExecutionFrame;
use crate::jump_table::JumpTable;
use crate::stack_item::StackItem;
use num_bigint::BigInt;

/// Register every standard instruction
pub(crate) fn register(table: &mut JumpTable) {
    push::register(table);
    control::register(table);
    stack::register(table);
    splice::register(table);
    numeric::register(table);
    compound::register(table);
    types::register(table);
}

/// Integer width limit of the running engine
pub(crate) fn max_int(host: &ExecutionHost<'_>) -> usize {
    host.engine.config().limits.max_integer_size
}

/// Integer value of an argument
pub(crate) fn int(item: &StackItem, host: &ExecutionHost<'_>) -> VmResult<BigInt> {
    item.to_integer(max_int(host))
}

/// Non-negative count or index held in an argument
pub(crate) fn count(item: &StackItem, host: &ExecutionHost<'_>) -> VmResult<usize> {
    item.to_usize(max_int(host))
}

/// Count held `index` positions below the top, if present and valid
///
/// Used by refine hooks. A missing item is left for the underflow check and
/// an invalid one for the handler, which faults after the fee is charged.
pub(crate) fn peek_count(frame: &ExecutionFrame, index: usize, host: &ExecutionHost<'_>) -> Option<usize> {
    frame.peek(index).and_then(|item| count(item, host).ok())
}

/// Stack slots taken by a copy of `item` beyond the item itself
pub(crate) fn copy_growth(item: Option<&StackItem>) -> isize {
    item.map_or(0, |item| isize::try_from(item.nested_count()).unwrap_or(isize::MAX))
}
