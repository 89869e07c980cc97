//! Neutral result form of stack items
//!
//! Serialises as `{"type": ..., "value": ...}` with integers as decimal
//! strings and byte arrays as lowercase hex.

use num_bigint::BigInt;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

/// A stack item as reported to callers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractParameter {
    /// Null
    Any,
    /// Boolean
    Boolean(bool),
    /// Integer
    Integer(BigInt),
    /// Bytes from a ByteString or Buffer
    ByteArray(Vec<u8>),
    /// Items from an Array or Struct
    Array(Vec<ContractParameter>),
    /// Map entries in insertion order
    Map(Vec<(ContractParameter, ContractParameter)>),
    /// Host object; carries no value
    InteropInterface,
}

impl ContractParameter {
    /// Type label used in the JSON form
    pub fn type_name(&self) -> &'static str {
        match self {
            ContractParameter::Any => "Any",
            ContractParameter::Boolean(_) => "Boolean",
            ContractParameter::Integer(_) => "Integer",
            ContractParameter::ByteArray(_) => "ByteArray",
            ContractParameter::Array(_) => "Array",
            ContractParameter::Map(_) => "Map",
            ContractParameter::InteropInterface => "InteropInterface",
        }
    }
}

#[derive(Serialize)]
struct MapEntry<'a> {
    key: &'a ContractParameter,
    value: &'a ContractParameter,
}

impl Serialize for ContractParameter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ContractParameter", 2)?;
        state.serialize_field("type", self.type_name())?;
        match self {
            ContractParameter::Any | ContractParameter::InteropInterface => {
                state.serialize_field("value", &Option::<()>::None)?
            }
            ContractParameter::Boolean(b) => state.serialize_field("value", b)?,
            ContractParameter::Integer(i) => state.serialize_field("value", &i.to_string())?,
            ContractParameter::ByteArray(bytes) => state.serialize_field("value", &hex::encode(bytes))?,
            ContractParameter::Array(items) => state.serialize_field("value", items)?,
            ContractParameter::Map(entries) => {
                let entries: Vec<MapEntry<'_>> = entries
                    .iter()
                    .map(|(key, value)| MapEntry { key, value })
                    .collect();
                state.serialize_field("value", &entries)?
            }
        }
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_primitives() {
        assert_eq!(
            serde_json::to_value(ContractParameter::Any).unwrap(),
            json!({"type": "Any", "value": null})
        );
        assert_eq!(
            serde_json::to_value(ContractParameter::Boolean(true)).unwrap(),
            json!({"type": "Boolean", "value": true})
        );
        assert_eq!(
            serde_json::to_value(ContractParameter::Integer(BigInt::from(-42))).unwrap(),
            json!({"type": "Integer", "value": "-42"})
        );
        assert_eq!(
            serde_json::to_value(ContractParameter::ByteArray(vec![0xde, 0xad])).unwrap(),
            json!({"type": "ByteArray", "value": "dead"})
        );
    }

    #[test]
    fn test_json_large_integer() {
        let big = BigInt::from(u64::MAX) * BigInt::from(u64::MAX);
        let value = serde_json::to_value(ContractParameter::Integer(big.clone())).unwrap();
        assert_eq!(value["value"], json!(big.to_string()));
    }

    #[test]
    fn test_json_nested() {
        let param = ContractParameter::Map(vec![(
            ContractParameter::ByteArray(b"k".to_vec()),
            ContractParameter::Array(vec![ContractParameter::Integer(BigInt::from(1))]),
        )]);
        assert_eq!(
            serde_json::to_value(param).unwrap(),
            json!({
                "type": "Map",
                "value": [{
                    "key": {"type": "ByteArray", "value": "6b"},
                    "value": {"type": "Array", "value": [{"type": "Integer", "value": "1"}]}
                }]
            })
        );
    }
}
