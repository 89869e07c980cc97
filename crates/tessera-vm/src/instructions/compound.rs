//! Arrays, structs and maps
//!
//! Compound items are values: mutating instructions consume the item and
//! push the updated one back. Every element of a compound item takes a slot
//! of the stack size budget, so refine hooks declare the growth an
//! instruction causes.

use super::*;
use crate::error::VmError;
use crate::jump_table::{Args, Op, OpSpec, Outputs};
use crate::opcode::OpCode;
use crate::stack_item::{StackItemType, StackMap};

pub(super) fn register(table: &mut JumpTable) {
    use OpCode::*;
    table.insert(OpSpec::new(PACK, pack).io(1, 1).refine(refine_pack));
    table.insert(OpSpec::new(UNPACK, unpack).io(1, 1).refine(refine_unpack));
    table.insert(OpSpec::new(NEWARRAY0, new_empty).io(0, 1));
    table.insert(OpSpec::new(NEWSTRUCT0, new_empty).io(0, 1));
    table.insert(OpSpec::new(NEWMAP, new_empty).io(0, 1));
    table.insert(OpSpec::new(NEWARRAY, new_sized).io(1, 1).refine(refine_new_sized));
    table.insert(OpSpec::new(NEWARRAY_T, new_sized).io(1, 1).refine(refine_new_sized));
    table.insert(OpSpec::new(NEWSTRUCT, new_sized).io(1, 1).refine(refine_new_sized));
    table.insert(OpSpec::new(SIZE, size).io(1, 1));
    table.insert(OpSpec::new(HASKEY, has_key).io(2, 1));
    table.insert(OpSpec::new(KEYS, keys).io(1, 1));
    table.insert(OpSpec::new(VALUES, values).io(1, 1));
    table.insert(OpSpec::new(PICKITEM, pick_item).io(2, 1));
    table.insert(OpSpec::new(APPEND, append).io(2, 1).growth(1).refine(refine_append));
    table.insert(OpSpec::new(SETITEM, set_item).io(3, 1).refine(refine_set_item));
    table.insert(OpSpec::new(REVERSEITEMS, reverse_items).io(1, 1));
    table.insert(OpSpec::new(REMOVE, remove).io(2, 1));
    table.insert(OpSpec::new(CLEARITEMS, clear_items).io(1, 1));
}

// ==================== Refine hooks ====================

fn slots(n: usize) -> isize {
    isize::try_from(n).unwrap_or(isize::MAX)
}

fn refine_pack(op: &mut Op, frame: &ExecutionFrame, host: &ExecutionHost<'_>) -> VmResult<()> {
    if let Some(n) = peek_count(frame, 0, host) {
        op.stack_in = n.saturating_add(1);
        op.array_size = n;
        op.growth = slots(n);
    }
    Ok(())
}

/// Unpacked elements move from the item onto the stack
fn refine_unpack(op: &mut Op, frame: &ExecutionFrame, _: &ExecutionHost<'_>) -> VmResult<()> {
    match frame.peek(0) {
        Some(StackItem::Array(items)) | Some(StackItem::Struct(items)) => {
            op.stack_out = items.len() + 1;
            op.growth = -slots(items.len());
        }
        Some(StackItem::Map(map)) => {
            op.stack_out = map.len() * 2 + 1;
            op.growth = -slots(map.len() * 2);
        }
        _ => {}
    }
    Ok(())
}

fn refine_new_sized(op: &mut Op, frame: &ExecutionFrame, host: &ExecutionHost<'_>) -> VmResult<()> {
    if let Some(n) = peek_count(frame, 0, host) {
        op.array_size = n;
        op.growth = slots(n);
    }
    Ok(())
}

fn refine_append(op: &mut Op, frame: &ExecutionFrame, _: &ExecutionHost<'_>) -> VmResult<()> {
    if let Some(len) = frame.peek(1).and_then(StackItem::element_count) {
        op.array_size = len + 1;
    }
    Ok(())
}

fn refine_set_item(op: &mut Op, frame: &ExecutionFrame, _: &ExecutionHost<'_>) -> VmResult<()> {
    if let (Some(StackItem::Map(map)), Some(key)) = (frame.peek(2), frame.peek(1)) {
        // a new entry adds its key and value
        if !map.contains_key(key) {
            op.array_size = map.len() + 1;
            op.growth = 2;
        }
    }
    Ok(())
}

// ==================== Helpers ====================

fn index_of(key: &StackItem, len: usize, host: &ExecutionHost<'_>) -> VmResult<usize> {
    let index = int(key, host)?;
    match usize::try_from(&index) {
        Ok(i) if i < len => Ok(i),
        _ => Err(VmError::IndexOutOfRange {
            index: i64::try_from(&index).unwrap_or(i64::MAX),
            size: len,
        }),
    }
}

fn default_of(item_type: StackItemType) -> StackItem {
    match item_type {
        StackItemType::Boolean => StackItem::Boolean(false),
        StackItemType::Integer => StackItem::int(0),
        StackItemType::ByteString => StackItem::bytes(Vec::new()),
        _ => StackItem::Null,
    }
}

// ==================== Handlers ====================

fn pack(_: &Op, _: &mut ExecutionFrame, host: &mut ExecutionHost<'_>, args: Args) -> VmResult<Outputs> {
    let mut items = args.stack;
    count(&items[0], host)?;
    items.remove(0);
    Ok(Outputs::one(StackItem::Array(items)))
}

fn unpack(_: &Op, _: &mut ExecutionFrame, _: &mut ExecutionHost<'_>, args: Args) -> VmResult<Outputs> {
    let [compound] = args.take()?;
    let mut out = Vec::new();
    match compound {
        StackItem::Array(items) | StackItem::Struct(items) => {
            out.push(StackItem::int(items.len() as i64));
            out.extend(items);
        }
        StackItem::Map(map) => {
            out.push(StackItem::int(map.len() as i64));
            for (key, value) in map.iter() {
                out.push(key.clone());
                out.push(value.clone());
            }
        }
        other => return Err(VmError::invalid_type("Array, Struct or Map", other.item_type())),
    }
    Ok(Outputs::stack(out))
}

fn new_empty(op: &Op, _: &mut ExecutionFrame, _: &mut ExecutionHost<'_>, _: Args) -> VmResult<Outputs> {
    let item = match op.opcode {
        OpCode::NEWARRAY0 => StackItem::Array(Vec::new()),
        OpCode::NEWSTRUCT0 => StackItem::Struct(Vec::new()),
        _ => StackItem::Map(StackMap::new()),
    };
    Ok(Outputs::one(item))
}

fn new_sized(op: &Op, _: &mut ExecutionFrame, host: &mut ExecutionHost<'_>, args: Args) -> VmResult<Outputs> {
    let [n] = args.take()?;
    let n = count(&n, host)?;
    let item = match op.opcode {
        OpCode::NEWSTRUCT => StackItem::Struct(vec![StackItem::Null; n]),
        OpCode::NEWARRAY_T => {
            let byte = op.operand_u8()?;
            let item_type = StackItemType::from_byte(byte).ok_or_else(|| VmError::MalformedInstruction {
                opcode: op.opcode,
                reason: format!("unknown item type 0x{:02x}", byte),
            })?;
            StackItem::Array(vec![default_of(item_type); n])
        }
        _ => StackItem::Array(vec![StackItem::Null; n]),
    };
    Ok(Outputs::one(item))
}

fn size(_: &Op, _: &mut ExecutionFrame, _: &mut ExecutionHost<'_>, args: Args) -> VmResult<Outputs> {
    let [x] = args.take()?;
    let size = x
        .element_count()
        .or_else(|| x.byte_len())
        .ok_or_else(|| VmError::invalid_type("compound or byte item", x.item_type()))?;
    Ok(Outputs::one(size as i64))
}

fn has_key(_: &Op, _: &mut ExecutionFrame, host: &mut ExecutionHost<'_>, args: Args) -> VmResult<Outputs> {
    let [key, x] = args.take()?;
    let found = match &x {
        StackItem::Map(map) => {
            key.check_map_key(host.engine.config().limits.max_map_key_size)?;
            map.contains_key(&key)
        }
        StackItem::Array(_) | StackItem::Struct(_) | StackItem::Buffer(_) | StackItem::ByteString(_) => {
            let len = x.element_count().or_else(|| x.byte_len()).unwrap_or(0);
            let index = int(&key, host)?;
            if index.sign() == num_bigint::Sign::Minus {
                return Err(VmError::IndexOutOfRange {
                    index: i64::try_from(&index).unwrap_or(i64::MIN),
                    size: len,
                });
            }
            usize::try_from(&index).map(|i| i < len).unwrap_or(false)
        }
        other => return Err(VmError::invalid_type("compound or byte item", other.item_type())),
    };
    Ok(Outputs::one(found))
}

fn keys(_: &Op, _: &mut ExecutionFrame, _: &mut ExecutionHost<'_>, args: Args) -> VmResult<Outputs> {
    let [x] = args.take()?;
    match x {
        StackItem::Map(map) => Ok(Outputs::one(StackItem::Array(map.keys().cloned().collect()))),
        other => Err(VmError::invalid_type("Map", other.item_type())),
    }
}

fn values(_: &Op, _: &mut ExecutionFrame, _: &mut ExecutionHost<'_>, args: Args) -> VmResult<Outputs> {
    let [x] = args.take()?;
    let values = match x {
        StackItem::Array(items) | StackItem::Struct(items) => items,
        StackItem::Map(map) => map.values().cloned().collect(),
        other => return Err(VmError::invalid_type("Array, Struct or Map", other.item_type())),
    };
    Ok(Outputs::one(StackItem::Array(values)))
}

fn pick_item(_: &Op, _: &mut ExecutionFrame, host: &mut ExecutionHost<'_>, args: Args) -> VmResult<Outputs> {
    let [key, x] = args.take()?;
    let item = match x {
        StackItem::Array(mut items) | StackItem::Struct(mut items) => {
            let index = index_of(&key, items.len(), host)?;
            items.swap_remove(index)
        }
        StackItem::Map(map) => {
            key.check_map_key(host.engine.config().limits.max_map_key_size)?;
            map.get(&key).cloned().ok_or(VmError::KeyNotFound)?
        }
        StackItem::ByteString(_) | StackItem::Buffer(_) => {
            let bytes = x.to_bytes()?;
            let index = index_of(&key, bytes.len(), host)?;
            StackItem::int(bytes[index])
        }
        other => return Err(VmError::invalid_type("compound or byte item", other.item_type())),
    };
    Ok(Outputs::one(item))
}

fn append(_: &Op, _: &mut ExecutionFrame, _: &mut ExecutionHost<'_>, args: Args) -> VmResult<Outputs> {
    let [item, x] = args.take()?;
    let updated = match x {
        StackItem::Array(mut items) => {
            items.push(item);
            StackItem::Array(items)
        }
        StackItem::Struct(mut items) => {
            items.push(item);
            StackItem::Struct(items)
        }
        other => return Err(VmError::invalid_type("Array or Struct", other.item_type())),
    };
    Ok(Outputs::one(updated))
}

fn set_item(_: &Op, _: &mut ExecutionFrame, host: &mut ExecutionHost<'_>, args: Args) -> VmResult<Outputs> {
    let [value, key, x] = args.take()?;
    let updated = match x {
        StackItem::Array(mut items) => {
            let index = index_of(&key, items.len(), host)?;
            items[index] = value;
            StackItem::Array(items)
        }
        StackItem::Struct(mut items) => {
            let index = index_of(&key, items.len(), host)?;
            items[index] = value;
            StackItem::Struct(items)
        }
        StackItem::Map(mut map) => {
            key.check_map_key(host.engine.config().limits.max_map_key_size)?;
            map.insert(key, value);
            StackItem::Map(map)
        }
        StackItem::Buffer(mut bytes) => {
            let index = index_of(&key, bytes.len(), host)?;
            let byte = int(&value, host)?;
            bytes[index] = match i16::try_from(&byte) {
                Ok(b) if (-128..=255).contains(&b) => b as u8,
                _ => return Err(VmError::InvalidArgument(format!("{} is not a byte", byte))),
            };
            StackItem::Buffer(bytes)
        }
        other => return Err(VmError::invalid_type("Array, Struct, Map or Buffer", other.item_type())),
    };
    Ok(Outputs::one(updated))
}

fn reverse_items(_: &Op, _: &mut ExecutionFrame, _: &mut ExecutionHost<'_>, args: Args) -> VmResult<Outputs> {
    let [x] = args.take()?;
    let updated = match x {
        StackItem::Array(mut items) => {
            items.reverse();
            StackItem::Array(items)
        }
        StackItem::Struct(mut items) => {
            items.reverse();
            StackItem::Struct(items)
        }
        StackItem::Buffer(mut bytes) => {
            bytes.reverse();
            StackItem::Buffer(bytes)
        }
        other => return Err(VmError::invalid_type("Array, Struct or Buffer", other.item_type())),
    };
    Ok(Outputs::one(updated))
}

fn remove(_: &Op, _: &mut ExecutionFrame, host: &mut ExecutionHost<'_>, args: Args) -> VmResult<Outputs> {
    let [key, x] = args.take()?;
    let updated = match x {
        StackItem::Array(mut items) => {
            let index = index_of(&key, items.len(), host)?;
            items.remove(index);
            StackItem::Array(items)
        }
        StackItem::Struct(mut items) => {
            let index = index_of(&key, items.len(), host)?;
            items.remove(index);
            StackItem::Struct(items)
        }
        StackItem::Map(mut map) => {
            key.check_map_key(host.engine.config().limits.max_map_key_size)?;
            map.remove(&key);
            StackItem::Map(map)
        }
        other => return Err(VmError::invalid_type("Array, Struct or Map", other.item_type())),
    };
    Ok(Outputs::one(updated))
}

fn clear_items(_: &Op, _: &mut ExecutionFrame, _: &mut ExecutionHost<'_>, args: Args) -> VmResult<Outputs> {
    let [x] = args.take()?;
    let updated = match x {
        StackItem::Array(_) => StackItem::Array(Vec::new()),
        StackItem::Struct(_) => StackItem::Struct(Vec::new()),
        StackItem::Map(_) => StackItem::Map(StackMap::new()),
        other => return Err(VmError::invalid_type("Array, Struct or Map", other.item_type())),
    };
    Ok(Outputs::one(updated))
}
