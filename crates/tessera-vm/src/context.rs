//! Invocation context shared by every frame of a chain

use crate::contract_parameter::ContractParameter;
use crate::interpreter::Engine;
use crate::snapshot::StateSnapshot;
use serde::{Deserialize, Serialize};
use std::fmt;
use tessera_primitives::{BlockHeight, ScriptHash, H256};

/// Why a chain is being executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TriggerType {
    /// Before a block's transactions are persisted
    OnPersist = 0x01,
    /// After a block's transactions are persisted
    PostPersist = 0x02,
    /// Witness verification; read-only
    Verification = 0x20,
    /// Transaction invocation
    Application = 0x40,
}

impl TriggerType {
    /// Whether state writes are permitted
    pub fn allows_writes(self) -> bool {
        matches!(self, TriggerType::Application)
    }
}

impl fmt::Display for TriggerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Block being persisted, passed through to services that need it
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistingBlock {
    /// Block height
    pub index: BlockHeight,
    /// Block timestamp in milliseconds
    pub timestamp: u64,
    /// Block hash
    pub hash: H256,
}

/// Caller-supplied invocation parameters
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutionInit {
    /// Trigger kind
    pub trigger: TriggerType,
    /// Block being persisted, if any
    pub persisting_block: Option<PersistingBlock>,
    /// Script hashes that have signed the container
    pub witnesses: Vec<ScriptHash>,
}

impl ExecutionInit {
    /// Create init for a trigger with no block and no witnesses
    pub fn new(trigger: TriggerType) -> Self {
        Self {
            trigger,
            persisting_block: None,
            witnesses: Vec::new(),
        }
    }

    /// Application trigger
    pub fn application() -> Self {
        Self::new(TriggerType::Application)
    }

    /// Verification trigger
    pub fn verification() -> Self {
        Self::new(TriggerType::Verification)
    }

    /// Attach a persisting block
    pub fn with_block(mut self, block: PersistingBlock) -> Self {
        self.persisting_block = Some(block);
        self
    }

    /// Attach a witness
    pub fn with_witness(mut self, witness: ScriptHash) -> Self {
        self.witnesses.push(witness);
        self
    }
}

impl Default for ExecutionInit {
    fn default() -> Self {
        Self::application()
    }
}

/// Event emitted by `System.Runtime.Notify`
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Notification {
    /// Emitting script
    pub script_hash: ScriptHash,
    /// Event name
    pub event_name: String,
    /// Event payload
    pub state: ContractParameter,
}

/// Message emitted by `System.Runtime.Log`
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    /// Emitting script
    pub script_hash: ScriptHash,
    /// Message text
    pub message: String,
}

/// Host capabilities available to instruction handlers during one chain
pub struct ExecutionHost<'a> {
    /// Engine running the chain
    pub engine: &'a Engine,
    /// State view
    pub snapshot: &'a mut dyn StateSnapshot,
    /// Invocation parameters
    pub init: &'a ExecutionInit,
}

impl<'a> ExecutionHost<'a> {
    /// Create a host
    pub fn new(engine: &'a Engine, snapshot: &'a mut dyn StateSnapshot, init: &'a ExecutionInit) -> Self {
        Self {
            engine,
            snapshot,
            init,
        }
    }

    /// Active trigger
    pub fn trigger(&self) -> TriggerType {
        self.init.trigger
    }
}
