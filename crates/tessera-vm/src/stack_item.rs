//! Values manipulated by the interpreter

use crate::contract_parameter::ContractParameter;
use crate::error::{VmError, VmResult};
use bytes::Bytes;
use num_bigint::BigInt;
use num_traits::{ToPrimitive, Zero};
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tessera_primitives::ScriptHash;

/// Type tag of a stack item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StackItemType {
    /// Null
    Any = 0x00,
    /// Code position inside a script
    Pointer = 0x10,
    /// Boolean
    Boolean = 0x20,
    /// Arbitrary-precision signed integer
    Integer = 0x21,
    /// Immutable bytes
    ByteString = 0x28,
    /// Mutable bytes
    Buffer = 0x30,
    /// Ordered items
    Array = 0x40,
    /// Ordered items compared by value
    Struct = 0x41,
    /// Primitive key to item map
    Map = 0x48,
    /// Host object handle
    InteropInterface = 0x60,
}

impl StackItemType {
    /// Try to convert from byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Self::Any),
            0x10 => Some(Self::Pointer),
            0x20 => Some(Self::Boolean),
            0x21 => Some(Self::Integer),
            0x28 => Some(Self::ByteString),
            0x30 => Some(Self::Buffer),
            0x40 => Some(Self::Array),
            0x41 => Some(Self::Struct),
            0x48 => Some(Self::Map),
            0x60 => Some(Self::InteropInterface),
            _ => None,
        }
    }

    /// Whether items of this type may be used as map keys
    pub fn is_primitive(self) -> bool {
        matches!(self, Self::Boolean | Self::Integer | Self::ByteString)
    }
}

impl fmt::Display for StackItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Opaque handle to a host-provided object.
///
/// Handles compare by identity and are never serialized.
#[derive(Clone)]
pub struct InteropHandle {
    inner: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl InteropHandle {
    /// Wrap a host object
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            inner: Arc::new(value),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Borrow the host object if it has type `T`
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// Rust type name of the wrapped object
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl PartialEq for InteropHandle {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(
            Arc::as_ptr(&self.inner) as *const (),
            Arc::as_ptr(&other.inner) as *const (),
        )
    }
}

impl Eq for InteropHandle {}

impl fmt::Debug for InteropHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InteropHandle({})", self.type_name)
    }
}

/// Position inside a script, used for callbacks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pointer {
    /// Script the position belongs to
    pub script: ScriptHash,
    /// Offset into the script
    pub position: usize,
}

/// Insertion-ordered map with unique primitive keys
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackMap {
    entries: Vec<(StackItem, StackItem)>,
}

impl StackMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a value
    pub fn get(&self, key: &StackItem) -> Option<&StackItem> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Whether `key` is present
    pub fn contains_key(&self, key: &StackItem) -> bool {
        self.get(key).is_some()
    }

    /// Insert or replace; a replaced key keeps its original position
    pub fn insert(&mut self, key: StackItem, value: StackItem) -> Option<StackItem> {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Remove an entry
    pub fn remove(&mut self, key: &StackItem) -> Option<StackItem> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    /// Remove every entry
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Keys in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &StackItem> {
        self.entries.iter().map(|(k, _)| k)
    }

    /// Values in insertion order
    pub fn values(&self) -> impl Iterator<Item = &StackItem> {
        self.entries.iter().map(|(_, v)| v)
    }

    /// Entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&StackItem, &StackItem)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }
}

/// A value on an evaluation stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackItem {
    /// Null
    Null,
    /// Boolean
    Boolean(bool),
    /// Arbitrary-precision signed integer
    Integer(BigInt),
    /// Immutable bytes
    ByteString(Bytes),
    /// Mutable bytes
    Buffer(Vec<u8>),
    /// Ordered items
    Array(Vec<StackItem>),
    /// Ordered items compared by value
    Struct(Vec<StackItem>),
    /// Primitive key to item map
    Map(StackMap),
    /// Code position
    Pointer(Pointer),
    /// Host object handle
    InteropInterface(InteropHandle),
}

impl StackItem {
    /// Immutable bytes item
    pub fn bytes(value: impl Into<Bytes>) -> Self {
        StackItem::ByteString(value.into())
    }

    /// Integer item
    pub fn int(value: impl Into<BigInt>) -> Self {
        StackItem::Integer(value.into())
    }

    /// Type tag
    pub fn item_type(&self) -> StackItemType {
        match self {
            StackItem::Null => StackItemType::Any,
            StackItem::Boolean(_) => StackItemType::Boolean,
            StackItem::Integer(_) => StackItemType::Integer,
            StackItem::ByteString(_) => StackItemType::ByteString,
            StackItem::Buffer(_) => StackItemType::Buffer,
            StackItem::Array(_) => StackItemType::Array,
            StackItem::Struct(_) => StackItemType::Struct,
            StackItem::Map(_) => StackItemType::Map,
            StackItem::Pointer(_) => StackItemType::Pointer,
            StackItem::InteropInterface(_) => StackItemType::InteropInterface,
        }
    }

    /// Whether this is Null
    pub fn is_null(&self) -> bool {
        matches!(self, StackItem::Null)
    }

    /// Truthiness
    pub fn to_boolean(&self) -> bool {
        match self {
            StackItem::Null => false,
            StackItem::Boolean(b) => *b,
            StackItem::Integer(i) => !i.is_zero(),
            StackItem::ByteString(b) => b.iter().any(|byte| *byte != 0),
            _ => true,
        }
    }

    /// Integer value, rejecting encodings wider than `max_size` bytes
    pub fn to_integer(&self, max_size: usize) -> VmResult<BigInt> {
        match self {
            StackItem::Boolean(b) => Ok(BigInt::from(*b as u8)),
            StackItem::Integer(i) => Ok(i.clone()),
            StackItem::ByteString(b) => {
                if b.len() > max_size {
                    return Err(VmError::IntegerOverflow { limit: max_size });
                }
                Ok(bytes_to_int(b))
            }
            other => Err(VmError::InvalidConversion {
                from: other.item_type(),
                to: StackItemType::Integer,
            }),
        }
    }

    /// Integer value narrowed to `i64`
    pub fn to_i64(&self, max_size: usize) -> VmResult<i64> {
        let value = self.to_integer(max_size)?;
        value
            .to_i64()
            .ok_or_else(|| VmError::InvalidArgument(format!("{} does not fit in 64 bits", value)))
    }

    /// Non-negative integer value narrowed to `usize`
    pub fn to_usize(&self, max_size: usize) -> VmResult<usize> {
        let value = self.to_integer(max_size)?;
        value
            .to_usize()
            .ok_or_else(|| VmError::InvalidArgument(format!("{} is not a valid count or index", value)))
    }

    /// Byte representation of a primitive or buffer
    pub fn to_bytes(&self) -> VmResult<Vec<u8>> {
        match self {
            StackItem::Boolean(b) => Ok(vec![*b as u8]),
            StackItem::Integer(i) => Ok(int_to_bytes(i)),
            StackItem::ByteString(b) => Ok(b.to_vec()),
            StackItem::Buffer(b) => Ok(b.clone()),
            other => Err(VmError::InvalidConversion {
                from: other.item_type(),
                to: StackItemType::ByteString,
            }),
        }
    }

    /// Byte length of a primitive or buffer, used for size pre-checks
    pub fn byte_len(&self) -> Option<usize> {
        match self {
            StackItem::Boolean(_) => Some(1),
            StackItem::Integer(i) => Some(int_to_bytes(i).len()),
            StackItem::ByteString(b) => Some(b.len()),
            StackItem::Buffer(b) => Some(b.len()),
            _ => None,
        }
    }

    /// Element count of a compound item
    pub fn element_count(&self) -> Option<usize> {
        match self {
            StackItem::Array(items) | StackItem::Struct(items) => Some(items.len()),
            StackItem::Map(map) => Some(map.len()),
            _ => None,
        }
    }

    /// Items held by this value, counting itself and every nested element
    pub fn node_count(&self) -> usize {
        match self {
            StackItem::Array(items) | StackItem::Struct(items) => {
                1 + items.iter().map(StackItem::node_count).sum::<usize>()
            }
            StackItem::Map(map) => 1 + map.iter().map(|(k, v)| k.node_count() + v.node_count()).sum::<usize>(),
            _ => 1,
        }
    }

    /// Elements nested inside this value at any depth
    pub fn nested_count(&self) -> usize {
        self.node_count() - 1
    }

    /// Convert to another item type
    pub fn convert_to(self, target: StackItemType, max_integer_size: usize) -> VmResult<StackItem> {
        let from = self.item_type();
        if from == target {
            return Ok(self);
        }
        match target {
            StackItemType::Boolean => return Ok(StackItem::Boolean(self.to_boolean())),
            StackItemType::Integer => {
                if let StackItem::Buffer(b) = &self {
                    if b.len() > max_integer_size {
                        return Err(VmError::IntegerOverflow { limit: max_integer_size });
                    }
                    return Ok(StackItem::Integer(bytes_to_int(b)));
                }
                return self.to_integer(max_integer_size).map(StackItem::Integer);
            }
            _ => {}
        }
        match (self, target) {
            (item @ (StackItem::Boolean(_) | StackItem::Integer(_) | StackItem::Buffer(_)), StackItemType::ByteString) => {
                Ok(StackItem::ByteString(Bytes::from(item.to_bytes()?)))
            }
            (item @ (StackItem::Boolean(_) | StackItem::Integer(_) | StackItem::ByteString(_)), StackItemType::Buffer) => {
                Ok(StackItem::Buffer(item.to_bytes()?))
            }
            (StackItem::Array(items), StackItemType::Struct) => Ok(StackItem::Struct(items)),
            (StackItem::Struct(items), StackItemType::Array) => Ok(StackItem::Array(items)),
            _ => Err(VmError::InvalidConversion { from, to: target }),
        }
    }

    /// Check that this item may be used as a map key
    pub fn check_map_key(&self, max_size: usize) -> VmResult<()> {
        if !self.item_type().is_primitive() {
            return Err(VmError::InvalidMapKey(format!("{} is not a primitive", self.item_type())));
        }
        let size = self.byte_len().unwrap_or(0);
        if size > max_size {
            return Err(VmError::InvalidMapKey(format!(
                "key of {} bytes exceeds limit {}",
                size, max_size
            )));
        }
        Ok(())
    }

    /// Neutral result form handed to callers
    pub fn to_contract_parameter(&self) -> ContractParameter {
        match self {
            StackItem::Null => ContractParameter::Any,
            StackItem::Boolean(b) => ContractParameter::Boolean(*b),
            StackItem::Integer(i) => ContractParameter::Integer(i.clone()),
            StackItem::ByteString(b) => ContractParameter::ByteArray(b.to_vec()),
            StackItem::Buffer(b) => ContractParameter::ByteArray(b.clone()),
            StackItem::Array(items) | StackItem::Struct(items) => {
                ContractParameter::Array(items.iter().map(StackItem::to_contract_parameter).collect())
            }
            StackItem::Map(map) => ContractParameter::Map(
                map.iter()
                    .map(|(k, v)| (k.to_contract_parameter(), v.to_contract_parameter()))
                    .collect(),
            ),
            StackItem::Pointer(p) => ContractParameter::Integer(BigInt::from(p.position)),
            StackItem::InteropInterface(_) => ContractParameter::InteropInterface,
        }
    }
}

impl From<bool> for StackItem {
    fn from(value: bool) -> Self {
        StackItem::Boolean(value)
    }
}

impl From<i64> for StackItem {
    fn from(value: i64) -> Self {
        StackItem::Integer(BigInt::from(value))
    }
}

impl From<BigInt> for StackItem {
    fn from(value: BigInt) -> Self {
        StackItem::Integer(value)
    }
}

impl From<&str> for StackItem {
    fn from(value: &str) -> Self {
        StackItem::ByteString(Bytes::copy_from_slice(value.as_bytes()))
    }
}

/// Minimal little-endian two's complement encoding; zero encodes as no bytes
pub fn int_to_bytes(value: &BigInt) -> Vec<u8> {
    if value.is_zero() {
        Vec::new()
    } else {
        value.to_signed_bytes_le()
    }
}

/// Decode little-endian two's complement bytes
pub fn bytes_to_int(bytes: &[u8]) -> BigInt {
    BigInt::from_signed_bytes_le(bytes)
}

/// Wrap an arithmetic result, rejecting values wider than `max_size` bytes
pub fn checked_integer(value: BigInt, max_size: usize) -> VmResult<StackItem> {
    if int_to_bytes(&value).len() > max_size {
        return Err(VmError::IntegerOverflow { limit: max_size });
    }
    Ok(StackItem::Integer(value))
}
