//! Stack manipulation

use super::*;
use crate::jump_table::{Args, Op, OpSpec, Outputs};
use crate::opcode::OpCode;

pub(super) fn register(table: &mut JumpTable) {
    use OpCode::*;
    table.insert(OpSpec::new(DEPTH, depth).io(0, 1));
    table.insert(OpSpec::new(DROP, drop_top).io(1, 0));
    table.insert(OpSpec::new(NIP, nip).io(2, 1));
    table.insert(OpSpec::new(XDROP, xdrop).io(1, 0).refine(refine_xdrop));
    table.insert(OpSpec::new(CLEAR, clear).refine(refine_clear));
    table.insert(OpSpec::new(DUP, dup).io(1, 2).refine(refine_dup));
    table.insert(OpSpec::new(OVER, over).io(2, 3).refine(refine_over));
    table.insert(OpSpec::new(PICK, pick).io(1, 1).refine(refine_pick));
    table.insert(OpSpec::new(TUCK, tuck).io(2, 3).refine(refine_dup));
    table.insert(OpSpec::new(SWAP, swap).io(2, 2));
    table.insert(OpSpec::new(ROT, rot).io(3, 3));
    table.insert(OpSpec::new(ROLL, roll).io(1, 0).refine(refine_roll));
    table.insert(OpSpec::new(REVERSE3, reverse).io(3, 3));
    table.insert(OpSpec::new(REVERSE4, reverse).io(4, 4));
    table.insert(OpSpec::new(REVERSEN, reverse_n).io(1, 0).refine(refine_reverse_n));
    table.insert(
        OpSpec::new(DUPFROMALTSTACK, dup_from_alt)
            .alt_io(1, 1)
            .io(0, 1)
            .refine(refine_dup_from_alt),
    );
    table.insert(OpSpec::new(TOALTSTACK, to_alt).io(1, 0).alt_io(0, 1));
    table.insert(OpSpec::new(FROMALTSTACK, from_alt).alt_io(1, 0).io(0, 1));
}

// ==================== Refine hooks ====================

/// `n` and the `n + 1` items below it; the item at depth `n` is dropped
fn refine_xdrop(op: &mut Op, frame: &ExecutionFrame, host: &ExecutionHost<'_>) -> VmResult<()> {
    if let Some(n) = peek_count(frame, 0, host) {
        op.stack_in = n.saturating_add(2);
        op.stack_out = n;
    }
    Ok(())
}

// Copies of compound items occupy a slot per nested element

fn refine_dup(op: &mut Op, frame: &ExecutionFrame, _: &ExecutionHost<'_>) -> VmResult<()> {
    op.growth = copy_growth(frame.peek(0));
    Ok(())
}

fn refine_over(op: &mut Op, frame: &ExecutionFrame, _: &ExecutionHost<'_>) -> VmResult<()> {
    op.growth = copy_growth(frame.peek(1));
    Ok(())
}

fn refine_dup_from_alt(op: &mut Op, frame: &ExecutionFrame, _: &ExecutionHost<'_>) -> VmResult<()> {
    op.growth = copy_growth(frame.peek_alt(0));
    Ok(())
}

fn refine_clear(op: &mut Op, frame: &ExecutionFrame, _: &ExecutionHost<'_>) -> VmResult<()> {
    op.stack_in = frame.stack.len();
    Ok(())
}

/// `n` and the `n + 1` items below it are restored, plus a copy of the deepest
fn refine_pick(op: &mut Op, frame: &ExecutionFrame, host: &ExecutionHost<'_>) -> VmResult<()> {
    if let Some(n) = peek_count(frame, 0, host) {
        op.stack_in = n.saturating_add(2);
        op.stack_out = n.saturating_add(2);
        op.growth = copy_growth(frame.peek(n.saturating_add(1)));
    }
    Ok(())
}

fn refine_roll(op: &mut Op, frame: &ExecutionFrame, host: &ExecutionHost<'_>) -> VmResult<()> {
    if let Some(n) = peek_count(frame, 0, host) {
        op.stack_in = n.saturating_add(2);
        op.stack_out = n.saturating_add(1);
    }
    Ok(())
}

fn refine_reverse_n(op: &mut Op, frame: &ExecutionFrame, host: &ExecutionHost<'_>) -> VmResult<()> {
    if let Some(n) = peek_count(frame, 0, host) {
        op.stack_in = n.saturating_add(1);
        op.stack_out = n;
    }
    Ok(())
}

// ==================== Handlers ====================

fn depth(_: &Op, frame: &mut ExecutionFrame, _: &mut ExecutionHost<'_>, _: Args) -> VmResult<Outputs> {
    Ok(Outputs::one(frame.stack.len() as i64))
}

fn drop_top(_: &Op, _: &mut ExecutionFrame, _: &mut ExecutionHost<'_>, _: Args) -> VmResult<Outputs> {
    Ok(Outputs::none())
}

fn nip(_: &Op, _: &mut ExecutionFrame, _: &mut ExecutionHost<'_>, args: Args) -> VmResult<Outputs> {
    let [top, _] = args.take()?;
    Ok(Outputs::one(top))
}

fn xdrop(_: &Op, _: &mut ExecutionFrame, host: &mut ExecutionHost<'_>, args: Args) -> VmResult<Outputs> {
    let mut items = args.stack;
    count(&items[0], host)?;
    items.remove(0);
    items.pop();
    Ok(Outputs::stack(items))
}

fn clear(_: &Op, _: &mut ExecutionFrame, _: &mut ExecutionHost<'_>, _: Args) -> VmResult<Outputs> {
    Ok(Outputs::none())
}

fn dup(_: &Op, _: &mut ExecutionFrame, _: &mut ExecutionHost<'_>, args: Args) -> VmResult<Outputs> {
    let [top] = args.take()?;
    Ok(Outputs::stack(vec![top.clone(), top]))
}

fn over(_: &Op, _: &mut ExecutionFrame, _: &mut ExecutionHost<'_>, args: Args) -> VmResult<Outputs> {
    let [b, a] = args.take()?;
    Ok(Outputs::stack(vec![a.clone(), b, a]))
}

fn pick(_: &Op, _: &mut ExecutionFrame, host: &mut ExecutionHost<'_>, args: Args) -> VmResult<Outputs> {
    let mut items = args.stack;
    count(&items[0], host)?;
    items.remove(0);
    let picked = items.last().cloned().unwrap_or(StackItem::Null);
    items.insert(0, picked);
    Ok(Outputs::stack(items))
}

fn tuck(_: &Op, _: &mut ExecutionFrame, _: &mut ExecutionHost<'_>, args: Args) -> VmResult<Outputs> {
    let [b, a] = args.take()?;
    Ok(Outputs::stack(vec![b.clone(), a, b]))
}

fn swap(_: &Op, _: &mut ExecutionFrame, _: &mut ExecutionHost<'_>, args: Args) -> VmResult<Outputs> {
    let [b, a] = args.take()?;
    Ok(Outputs::stack(vec![a, b]))
}

fn rot(_: &Op, _: &mut ExecutionFrame, _: &mut ExecutionHost<'_>, args: Args) -> VmResult<Outputs> {
    let [c, b, a] = args.take()?;
    Ok(Outputs::stack(vec![a, c, b]))
}

fn roll(_: &Op, _: &mut ExecutionFrame, host: &mut ExecutionHost<'_>, args: Args) -> VmResult<Outputs> {
    let mut items = args.stack;
    count(&items[0], host)?;
    items.remove(0);
    if let Some(rolled) = items.pop() {
        items.insert(0, rolled);
    }
    Ok(Outputs::stack(items))
}

fn reverse(_: &Op, _: &mut ExecutionFrame, _: &mut ExecutionHost<'_>, args: Args) -> VmResult<Outputs> {
    let mut items = args.stack;
    items.reverse();
    Ok(Outputs::stack(items))
}

fn reverse_n(_: &Op, _: &mut ExecutionFrame, host: &mut ExecutionHost<'_>, args: Args) -> VmResult<Outputs> {
    let mut items = args.stack;
    count(&items[0], host)?;
    items.remove(0);
    items.reverse();
    Ok(Outputs::stack(items))
}

fn dup_from_alt(_: &Op, _: &mut ExecutionFrame, _: &mut ExecutionHost<'_>, args: Args) -> VmResult<Outputs> {
    let item = args.alt.into_iter().next().unwrap_or(StackItem::Null);
    Ok(Outputs {
        stack: vec![item.clone()],
        alt: vec![item],
    })
}

fn to_alt(_: &Op, _: &mut ExecutionFrame, _: &mut ExecutionHost<'_>, args: Args) -> VmResult<Outputs> {
    let [item] = args.take()?;
    Ok(Outputs::alt(item))
}

fn from_alt(_: &Op, _: &mut ExecutionFrame, _: &mut ExecutionHost<'_>, args: Args) -> VmResult<Outputs> {
    let item = args.alt.into_iter().next().unwrap_or(StackItem::Null);
    Ok(Outputs::one(item))
}
