//! Execution frame: the state of one running script

use crate::context::{LogEntry, Notification};
use crate::error::{FaultInfo, VmError, VmResult};
use crate::stack_item::StackItem;
use bytes::Bytes;
use serde::Serialize;
use std::collections::BTreeSet;
use tessera_primitives::{Gas, ScriptHash};

/// Bytecode plus entry offset
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Script {
    /// Code bytes
    pub code: Bytes,
    /// Starting program counter
    pub offset: usize,
}

impl Script {
    /// Script starting at offset 0
    pub fn new(code: impl Into<Bytes>) -> Self {
        Self {
            code: code.into(),
            offset: 0,
        }
    }

    /// Script starting at `offset`
    pub fn with_offset(code: impl Into<Bytes>, offset: usize) -> Self {
        Self {
            code: code.into(),
            offset,
        }
    }

    /// Identity of this script
    pub fn hash(&self) -> ScriptHash {
        tessera_crypto::script_hash(&self.code)
    }
}

impl From<Vec<u8>> for Script {
    fn from(code: Vec<u8>) -> Self {
        Script::new(code)
    }
}

impl From<Bytes> for Script {
    fn from(code: Bytes) -> Self {
        Script::new(code)
    }
}

impl From<&[u8]> for Script {
    fn from(code: &[u8]) -> Self {
        Script::new(Bytes::copy_from_slice(code))
    }
}

/// Frame lifecycle
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FrameState {
    /// Still executing
    Running,
    /// Finished successfully
    Halt,
    /// Finished with an error
    Fault(FaultInfo),
}

/// Terminal outcome reported to callers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VmState {
    /// Every script halted
    Halt,
    /// Some script faulted
    Fault,
}

/// State carried from one frame to the next in a chain
#[derive(Clone, Debug, Default)]
pub struct FrameResidue {
    /// Evaluation stack, top at the end
    pub stack: Vec<StackItem>,
    /// Alt stack, top at the end
    pub alt_stack: Vec<StackItem>,
    /// Items held by callers of this frame
    pub caller_stack_count: usize,
    /// Alt items held by callers of this frame
    pub caller_alt_stack_count: usize,
    /// Contracts deployed so far
    pub created_contracts: BTreeSet<ScriptHash>,
    /// Notifications emitted so far
    pub notifications: Vec<Notification>,
    /// Log entries emitted so far
    pub logs: Vec<LogEntry>,
}

/// Identity and position of a frame in the call graph
#[derive(Clone, Copy, Debug)]
pub struct FrameOptions {
    /// Invocation depth
    pub depth: usize,
    /// Root script of the chain
    pub entry_script_hash: ScriptHash,
    /// Caller, if any
    pub calling_script_hash: Option<ScriptHash>,
}

/// State of one running script
///
/// Stacks keep their top at the end of the vector. Elements nested inside
/// compound items count toward the combined stack size, so `nested` tracks
/// them alongside the two stacks.
#[derive(Clone, Debug)]
pub struct ExecutionFrame {
    pub(crate) code: Bytes,
    pub(crate) pc: usize,
    pub(crate) stack: Vec<StackItem>,
    pub(crate) alt_stack: Vec<StackItem>,
    pub(crate) nested: usize,
    pub(crate) gas_left: Gas,
    pub(crate) depth: usize,
    pub(crate) script_hash: ScriptHash,
    pub(crate) calling_script_hash: Option<ScriptHash>,
    pub(crate) entry_script_hash: ScriptHash,
    pub(crate) created_contracts: BTreeSet<ScriptHash>,
    pub(crate) caller_stack_count: usize,
    pub(crate) caller_alt_stack_count: usize,
    pub(crate) return_stack: Vec<usize>,
    pub(crate) jump_target: Option<usize>,
    pub(crate) notifications: Vec<Notification>,
    pub(crate) logs: Vec<LogEntry>,
    pub(crate) pending_call: Option<Box<ExecutionFrame>>,
    pub(crate) state: FrameState,
}

impl ExecutionFrame {
    /// Load a script
    pub fn new(script: &Script, gas_left: Gas, options: FrameOptions, residue: FrameResidue) -> Self {
        let nested = residue
            .stack
            .iter()
            .chain(&residue.alt_stack)
            .map(StackItem::nested_count)
            .sum();
        Self {
            code: script.code.clone(),
            pc: script.offset,
            stack: residue.stack,
            alt_stack: residue.alt_stack,
            nested,
            gas_left,
            depth: options.depth,
            script_hash: script.hash(),
            calling_script_hash: options.calling_script_hash,
            entry_script_hash: options.entry_script_hash,
            created_contracts: residue.created_contracts,
            caller_stack_count: residue.caller_stack_count,
            caller_alt_stack_count: residue.caller_alt_stack_count,
            return_stack: Vec::new(),
            jump_target: None,
            notifications: residue.notifications,
            logs: residue.logs,
            pending_call: None,
            state: FrameState::Running,
        }
    }

    /// Release the state carried to the next frame
    pub fn into_residue(self) -> FrameResidue {
        FrameResidue {
            stack: self.stack,
            alt_stack: self.alt_stack,
            caller_stack_count: self.caller_stack_count,
            caller_alt_stack_count: self.caller_alt_stack_count,
            created_contracts: self.created_contracts,
            notifications: self.notifications,
            logs: self.logs,
        }
    }

    /// Code being executed
    pub fn code(&self) -> &Bytes {
        &self.code
    }

    /// Program counter
    pub fn pc(&self) -> usize {
        self.pc
    }

    /// Evaluation stack, top at the end
    pub fn stack(&self) -> &[StackItem] {
        &self.stack
    }

    /// Alt stack, top at the end
    pub fn alt_stack(&self) -> &[StackItem] {
        &self.alt_stack
    }

    /// Remaining gas
    pub fn gas_left(&self) -> Gas {
        self.gas_left
    }

    /// Invocation depth
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Hash of the executing script
    pub fn script_hash(&self) -> ScriptHash {
        self.script_hash
    }

    /// Hash of the caller, `None` for the first frame
    pub fn calling_script_hash(&self) -> Option<ScriptHash> {
        self.calling_script_hash
    }

    /// Hash of the chain's first script
    pub fn entry_script_hash(&self) -> ScriptHash {
        self.entry_script_hash
    }

    /// Contracts deployed during this run
    pub fn created_contracts(&self) -> &BTreeSet<ScriptHash> {
        &self.created_contracts
    }

    /// Items held by callers
    pub fn caller_stack_count(&self) -> usize {
        self.caller_stack_count
    }

    /// Alt items held by callers
    pub fn caller_alt_stack_count(&self) -> usize {
        self.caller_alt_stack_count
    }

    /// Lifecycle state
    pub fn state(&self) -> &FrameState {
        &self.state
    }

    /// Whether the frame may still be stepped
    pub fn is_running(&self) -> bool {
        self.state == FrameState::Running
    }

    /// Fault details, if faulted
    pub fn fault(&self) -> Option<&FaultInfo> {
        match &self.state {
            FrameState::Fault(info) => Some(info),
            _ => None,
        }
    }

    /// Item `index` positions below the top
    pub fn peek(&self, index: usize) -> Option<&StackItem> {
        self.stack.len().checked_sub(index + 1).map(|i| &self.stack[i])
    }

    /// Item `index` positions below the top of the alt stack
    pub fn peek_alt(&self, index: usize) -> Option<&StackItem> {
        self.alt_stack.len().checked_sub(index + 1).map(|i| &self.alt_stack[i])
    }

    /// Redirect control flow after the current instruction
    pub(crate) fn jump_to(&mut self, target: i64) -> VmResult<()> {
        if target < 0 || target as u64 > self.code.len() as u64 {
            return Err(VmError::InvalidJump(target));
        }
        self.jump_target = Some(target as usize);
        Ok(())
    }

    /// Combined stack size: both stacks, their nested elements and every caller's share
    pub fn total_stack_size(&self) -> usize {
        self.own_stack_size() + self.caller_stack_count + self.caller_alt_stack_count
    }

    /// Items held by this frame alone, nested elements included
    pub(crate) fn own_stack_size(&self) -> usize {
        self.stack.len() + self.alt_stack.len() + self.nested
    }

    pub(crate) fn halt(&mut self) {
        self.state = FrameState::Halt;
    }

    pub(crate) fn set_fault(&mut self, info: FaultInfo) {
        self.state = FrameState::Fault(info);
    }
}
