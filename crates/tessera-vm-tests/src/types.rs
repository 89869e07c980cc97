//! Type definitions for the fixture JSON format

use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use tessera_vm::{ExecutionLimits, Gas, Script, TriggerType};

/// Hex-encoded bytes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HexBytes(pub Vec<u8>);

impl<'de> Deserialize<'de> for HexBytes {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = Deserialize::deserialize(deserializer)?;
        let s = s.strip_prefix("0x").unwrap_or(&s);
        if s.is_empty() {
            return Ok(HexBytes(Vec::new()));
        }
        hex::decode(s).map(HexBytes).map_err(serde::de::Error::custom)
    }
}

/// Fixture file structure (map of test name -> fixture), run in name order
pub type FixtureFile = BTreeMap<String, Fixture>;

/// One invocation chain and its expected outcome
#[derive(Debug, Deserialize)]
pub struct Fixture {
    /// Scripts executed in order
    pub scripts: Vec<HexBytes>,
    /// Gas budget
    pub gas: Gas,
    /// Free allowance; none by default
    #[serde(default)]
    pub free_gas: Option<Gas>,
    /// Trigger; `Application` by default
    #[serde(default)]
    pub trigger: Option<TriggerType>,
    /// Resource ceilings; engine defaults when absent
    #[serde(default)]
    pub limits: Option<ExecutionLimits>,
    /// Expected outcome
    pub expected: Expected,
}

impl Fixture {
    /// Scripts ready for execution
    pub fn to_scripts(&self) -> Vec<Script> {
        self.scripts.iter().map(|code| Script::new(code.0.clone())).collect()
    }
}

/// Expected outcome; absent fields are not checked
#[derive(Debug, Deserialize)]
pub struct Expected {
    /// `"HALT"` or `"FAULT"`
    pub state: String,
    /// Result stack in its JSON form, top first
    #[serde(default)]
    pub stack: Option<serde_json::Value>,
    /// Net gas charged
    #[serde(default)]
    pub gas_consumed: Option<Gas>,
    /// Gross gas used
    #[serde(default)]
    pub gas_cost: Option<Gas>,
    /// Substring of the fault message
    #[serde(default)]
    pub error_contains: Option<String>,
}
