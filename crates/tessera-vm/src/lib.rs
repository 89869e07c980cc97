//! Tessera VM - deterministic stack-machine bytecode engine
//!
//! Scripts are byte strings of one-byte opcodes with inline operands. An
//! [`Engine`] executes an ordered list of scripts as one invocation chain:
//! each script inherits the stacks and remaining gas of the one before it,
//! and every node running the same chain arrives at the same result, stack
//! contents and gas figures.
//!
//! ```
//! use tessera_vm::{Engine, ExecutionInit, MemorySnapshot, OpCode, ScriptBuilder, VmState};
//!
//! let mut builder = ScriptBuilder::new();
//! builder.emit_push_int(2).emit_push_int(3).emit(OpCode::ADD);
//!
//! let engine = Engine::default();
//! let mut snapshot = MemorySnapshot::new();
//! let result = engine.execute(&[builder.to_script()], &mut snapshot, &ExecutionInit::application(), 10_000);
//! assert_eq!(result.state, VmState::Halt);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chain;
pub mod config;
pub mod context;
pub mod contract_parameter;
pub mod cost;
pub mod error;
pub mod frame;
mod instructions;
pub mod interop;
pub mod interpreter;
pub mod jump_table;
pub mod metrics;
pub mod opcode;
pub mod script_builder;
pub mod snapshot;
pub mod stack_item;

pub use chain::ExecuteScriptsResult;
pub use config::{ConfigError, ConfigResult, EngineConfig, ExecutionLimits, FREE_GAS_ALLOWANCE};
pub use context::{ExecutionHost, ExecutionInit, LogEntry, Notification, PersistingBlock, TriggerType};
pub use contract_parameter::ContractParameter;
pub use error::{FaultInfo, VmError, VmResult};
pub use frame::{ExecutionFrame, FrameOptions, FrameResidue, FrameState, Script, VmState};
pub use interop::{InteropDescriptor, InteropRegistry, StorageContext};
pub use interpreter::Engine;
pub use jump_table::{Args, JumpTable, Op, OpSpec, Outputs};
pub use metrics::{ExecutionMetrics, MetricsSnapshot};
pub use opcode::{OpCode, OperandSize};
pub use script_builder::ScriptBuilder;
pub use snapshot::{
    CachedSnapshot, ChangeSet, MemorySnapshot, SnapshotReader, SnapshotWriter, StateSnapshot, StorageError,
    StorageResult,
};
pub use stack_item::{InteropHandle, Pointer, StackItem, StackItemType, StackMap};
pub use tessera_primitives::{Gas, ScriptHash};
