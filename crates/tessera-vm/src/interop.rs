//! Host services reachable through `SYSCALL`
//!
//! A service is addressed by a 4-byte id derived from its name. Its price,
//! arity and invocation delta are resolved while decoding the `SYSCALL`, so
//! the step executor checks limits and charges the full fee before the
//! service runs.
//!
//! `System.Contract.Call` only prepares the callee frame. The run loop
//! executes it and hands the outcome back through [`return_from_call`].

use crate::context::{ExecutionHost, LogEntry, Notification, TriggerType};
use crate::error::{FaultInfo, VmError, VmResult};
use crate::frame::{ExecutionFrame, FrameOptions, FrameResidue, Script};
use crate::jump_table::{Args, Handler, Op, Outputs};
use crate::opcode::OpCode;
use crate::stack_item::{InteropHandle, StackItem};
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};
use tessera_primitives::{Gas, ScriptHash};
use tracing::debug;

/// Largest accepted storage key in bytes
pub const MAX_STORAGE_KEY_SIZE: usize = 64;

/// Largest accepted notification or log name in bytes
pub const MAX_EVENT_NAME_SIZE: usize = 32;

const ALL_TRIGGERS: &[TriggerType] = &[
    TriggerType::OnPersist,
    TriggerType::PostPersist,
    TriggerType::Verification,
    TriggerType::Application,
];

const APPLICATION_ONLY: &[TriggerType] = &[TriggerType::Application];

/// Service prices
pub mod price {
    use tessera_primitives::Gas;

    /// Context queries
    pub const QUERY: Gas = 250;
    /// Script hash and gas queries
    pub const HASH: Gas = 400;
    /// Witness checks
    pub const CHECK_WITNESS: Gas = 30_000;
    /// Log and notify
    pub const EVENT: Gas = 1_000_000;
    /// Storage reads
    pub const STORAGE_READ: Gas = 1_000_000;
    /// Storage writes and deletes
    pub const STORAGE_WRITE: Gas = 1_000_000;
    /// Contract calls
    pub const CONTRACT_CALL: Gas = 1_000_000;
    /// Contract deployment
    pub const CONTRACT_CREATE: Gas = 10_000_000;
}

/// Service names
pub mod names {
    #![allow(missing_docs)]
    pub const RUNTIME_GET_TRIGGER: &str = "System.Runtime.GetTrigger";
    pub const RUNTIME_GET_TIME: &str = "System.Runtime.GetTime";
    pub const RUNTIME_GAS_LEFT: &str = "System.Runtime.GasLeft";
    pub const RUNTIME_GET_EXECUTING_SCRIPT_HASH: &str = "System.Runtime.GetExecutingScriptHash";
    pub const RUNTIME_GET_CALLING_SCRIPT_HASH: &str = "System.Runtime.GetCallingScriptHash";
    pub const RUNTIME_GET_ENTRY_SCRIPT_HASH: &str = "System.Runtime.GetEntryScriptHash";
    pub const RUNTIME_CHECK_WITNESS: &str = "System.Runtime.CheckWitness";
    pub const RUNTIME_LOG: &str = "System.Runtime.Log";
    pub const RUNTIME_NOTIFY: &str = "System.Runtime.Notify";
    pub const STORAGE_GET_CONTEXT: &str = "System.Storage.GetContext";
    pub const STORAGE_GET_READ_ONLY_CONTEXT: &str = "System.Storage.GetReadOnlyContext";
    pub const STORAGE_GET: &str = "System.Storage.Get";
    pub const STORAGE_PUT: &str = "System.Storage.Put";
    pub const STORAGE_DELETE: &str = "System.Storage.Delete";
    pub const CONTRACT_CREATE: &str = "System.Contract.Create";
    pub const CONTRACT_CALL: &str = "System.Contract.Call";
}

/// Static description of one service
#[derive(Clone, Copy)]
pub struct InteropDescriptor {
    /// Full service name
    pub name: &'static str,
    /// Id derived from the name
    pub id: u32,
    /// Fee charged on top of the `SYSCALL` price
    pub price: Gas,
    /// Evaluation stack inputs
    pub arity: usize,
    /// Evaluation stack outputs
    pub results: usize,
    /// Stack slots reserved for results pushed after the service returns
    pub growth: isize,
    /// Invocation depth delta
    pub invocation: isize,
    /// Triggers under which the service may run
    pub triggers: &'static [TriggerType],
    /// Implementation
    pub handler: Handler,
}

impl InteropDescriptor {
    /// Describe a service available under every trigger
    pub fn new(name: &'static str, price: Gas, arity: usize, results: usize, handler: Handler) -> Self {
        Self {
            name,
            id: tessera_crypto::interop_id(name),
            price,
            arity,
            results,
            growth: 0,
            invocation: 0,
            triggers: ALL_TRIGGERS,
            handler,
        }
    }

    /// Restrict the triggers
    pub fn triggers(mut self, triggers: &'static [TriggerType]) -> Self {
        self.triggers = triggers;
        self
    }

    /// Set invocation delta
    pub fn invocation(mut self, invocation: isize) -> Self {
        self.invocation = invocation;
        self
    }

    /// Reserve stack slots for deferred results
    pub fn growth(mut self, growth: isize) -> Self {
        self.growth = growth;
        self
    }

    /// Whether the service may run under `trigger`
    pub fn allows(&self, trigger: TriggerType) -> bool {
        self.triggers.contains(&trigger)
    }
}

impl std::fmt::Debug for InteropDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InteropDescriptor")
            .field("name", &self.name)
            .field("id", &format_args!("0x{:08x}", self.id))
            .field("price", &self.price)
            .finish()
    }
}

/// Service registry keyed by id
#[derive(Debug, Default)]
pub struct InteropRegistry {
    services: BTreeMap<u32, InteropDescriptor>,
}

impl InteropRegistry {
    /// Registry with no services
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with every standard service
    pub fn standard() -> Self {
        use names::*;
        let mut registry = Self::empty();
        registry.register(InteropDescriptor::new(RUNTIME_GET_TRIGGER, price::QUERY, 0, 1, get_trigger));
        registry.register(InteropDescriptor::new(RUNTIME_GET_TIME, price::QUERY, 0, 1, get_time));
        registry.register(InteropDescriptor::new(RUNTIME_GAS_LEFT, price::HASH, 0, 1, gas_left));
        registry.register(InteropDescriptor::new(
            RUNTIME_GET_EXECUTING_SCRIPT_HASH,
            price::HASH,
            0,
            1,
            get_executing_script_hash,
        ));
        registry.register(InteropDescriptor::new(
            RUNTIME_GET_CALLING_SCRIPT_HASH,
            price::HASH,
            0,
            1,
            get_calling_script_hash,
        ));
        registry.register(InteropDescriptor::new(
            RUNTIME_GET_ENTRY_SCRIPT_HASH,
            price::HASH,
            0,
            1,
            get_entry_script_hash,
        ));
        registry.register(InteropDescriptor::new(RUNTIME_CHECK_WITNESS, price::CHECK_WITNESS, 1, 1, check_witness));
        registry.register(InteropDescriptor::new(RUNTIME_LOG, price::EVENT, 1, 0, log));
        registry.register(InteropDescriptor::new(RUNTIME_NOTIFY, price::EVENT, 2, 0, notify));
        registry.register(InteropDescriptor::new(STORAGE_GET_CONTEXT, price::HASH, 0, 1, get_context));
        registry.register(InteropDescriptor::new(
            STORAGE_GET_READ_ONLY_CONTEXT,
            price::HASH,
            0,
            1,
            get_read_only_context,
        ));
        registry.register(InteropDescriptor::new(STORAGE_GET, price::STORAGE_READ, 2, 1, storage_get));
        registry.register(
            InteropDescriptor::new(STORAGE_PUT, price::STORAGE_WRITE, 3, 0, storage_put).triggers(APPLICATION_ONLY),
        );
        registry.register(
            InteropDescriptor::new(STORAGE_DELETE, price::STORAGE_WRITE, 2, 0, storage_delete)
                .triggers(APPLICATION_ONLY),
        );
        registry.register(
            InteropDescriptor::new(CONTRACT_CREATE, price::CONTRACT_CREATE, 1, 1, contract_create)
                .triggers(APPLICATION_ONLY),
        );
        registry.register(
            InteropDescriptor::new(CONTRACT_CALL, price::CONTRACT_CALL, 2, 0, contract_call)
                .invocation(1)
                .growth(1),
        );
        registry
    }

    /// Process-wide standard registry
    pub fn shared() -> Arc<InteropRegistry> {
        static REGISTRY: OnceLock<Arc<InteropRegistry>> = OnceLock::new();
        REGISTRY.get_or_init(|| Arc::new(InteropRegistry::standard())).clone()
    }

    /// Add or replace a service
    pub fn register(&mut self, descriptor: InteropDescriptor) {
        self.services.insert(descriptor.id, descriptor);
    }

    /// Look up by id
    pub fn get(&self, id: u32) -> Option<&InteropDescriptor> {
        self.services.get(&id)
    }

    /// Look up by name
    pub fn by_name(&self, name: &str) -> Option<&InteropDescriptor> {
        self.get(tessera_crypto::interop_id(name))
    }

    /// Number of services
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Whether no service is registered
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Iterate services in id order
    pub fn iter(&self) -> impl Iterator<Item = &InteropDescriptor> {
        self.services.values()
    }
}

/// Storage area handed to scripts as an interop handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageContext {
    /// Owning contract
    pub script_hash: ScriptHash,
    /// Whether writes are rejected
    pub read_only: bool,
}

// ==================== SYSCALL dispatch ====================

fn service<'h>(op: &Op, host: &'h ExecutionHost<'_>) -> VmResult<&'h InteropDescriptor> {
    let id = op.operand_u32()?;
    host.engine.interop().get(id).ok_or(VmError::UnknownSyscall(id))
}

/// Resolve the service's fee, arity and invocation delta
pub(crate) fn refine_syscall(op: &mut Op, _: &ExecutionFrame, host: &ExecutionHost<'_>) -> VmResult<()> {
    let descriptor = *service(op, host)?;
    op.fee = op.fee.saturating_add(descriptor.price);
    op.stack_in = descriptor.arity;
    op.stack_out = descriptor.results;
    op.growth = descriptor.growth;
    op.invocation = descriptor.invocation;
    Ok(())
}

/// Run the service named by the operand
pub(crate) fn syscall(op: &Op, frame: &mut ExecutionFrame, host: &mut ExecutionHost<'_>, args: Args) -> VmResult<Outputs> {
    let descriptor = *service(op, host)?;
    if !descriptor.allows(host.trigger()) {
        return Err(VmError::TriggerNotAllowed {
            service: descriptor.name,
            trigger: host.trigger().to_string(),
        });
    }
    (descriptor.handler)(op, frame, host, args)
}

// ==================== Helpers ====================

fn hash_item(hash: ScriptHash) -> StackItem {
    StackItem::bytes(hash.as_bytes().to_vec())
}

fn hash_arg(item: &StackItem) -> VmResult<ScriptHash> {
    let bytes = item.to_bytes()?;
    ScriptHash::from_slice(&bytes).map_err(|e| VmError::InvalidArgument(e.to_string()))
}

fn text_arg(item: &StackItem, limit: usize) -> VmResult<String> {
    let bytes = item.to_bytes()?;
    if bytes.len() > limit {
        return Err(VmError::InvalidArgument(format!("{} bytes exceeds limit {}", bytes.len(), limit)));
    }
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn storage_context(item: &StackItem) -> VmResult<StorageContext> {
    match item {
        StackItem::InteropInterface(handle) => handle
            .downcast_ref::<StorageContext>()
            .copied()
            .ok_or_else(|| VmError::InvalidArgument(format!("expected storage context, got {}", handle.type_name()))),
        other => Err(VmError::invalid_type("InteropInterface", other.item_type())),
    }
}

fn storage_key(item: &StackItem) -> VmResult<Vec<u8>> {
    let key = item.to_bytes()?;
    if key.len() > MAX_STORAGE_KEY_SIZE {
        return Err(VmError::InvalidArgument(format!(
            "storage key of {} bytes exceeds limit {}",
            key.len(),
            MAX_STORAGE_KEY_SIZE
        )));
    }
    Ok(key)
}

// ==================== Runtime ====================

fn get_trigger(_: &Op, _: &mut ExecutionFrame, host: &mut ExecutionHost<'_>, _: Args) -> VmResult<Outputs> {
    Ok(Outputs::one(host.trigger() as u8 as i64))
}

fn get_time(_: &Op, _: &mut ExecutionFrame, host: &mut ExecutionHost<'_>, _: Args) -> VmResult<Outputs> {
    let block = host.init.persisting_block.as_ref().ok_or(VmError::MissingPersistingBlock)?;
    Ok(Outputs::one(StackItem::int(block.timestamp)))
}

fn gas_left(_: &Op, frame: &mut ExecutionFrame, _: &mut ExecutionHost<'_>, _: Args) -> VmResult<Outputs> {
    Ok(Outputs::one(frame.gas_left))
}

fn get_executing_script_hash(_: &Op, frame: &mut ExecutionFrame, _: &mut ExecutionHost<'_>, _: Args) -> VmResult<Outputs> {
    Ok(Outputs::one(hash_item(frame.script_hash)))
}

fn get_calling_script_hash(_: &Op, frame: &mut ExecutionFrame, _: &mut ExecutionHost<'_>, _: Args) -> VmResult<Outputs> {
    Ok(Outputs::one(frame.calling_script_hash.map(hash_item).unwrap_or(StackItem::Null)))
}

fn get_entry_script_hash(_: &Op, frame: &mut ExecutionFrame, _: &mut ExecutionHost<'_>, _: Args) -> VmResult<Outputs> {
    Ok(Outputs::one(hash_item(frame.entry_script_hash)))
}

fn check_witness(_: &Op, _: &mut ExecutionFrame, host: &mut ExecutionHost<'_>, args: Args) -> VmResult<Outputs> {
    let [hash] = args.take()?;
    let hash = hash_arg(&hash)?;
    Ok(Outputs::one(host.init.witnesses.contains(&hash)))
}

fn log(_: &Op, frame: &mut ExecutionFrame, host: &mut ExecutionHost<'_>, args: Args) -> VmResult<Outputs> {
    let [message] = args.take()?;
    let message = text_arg(&message, host.engine.config().limits.max_item_size)?;
    frame.logs.push(LogEntry {
        script_hash: frame.script_hash,
        message,
    });
    Ok(Outputs::none())
}

fn notify(_: &Op, frame: &mut ExecutionFrame, _: &mut ExecutionHost<'_>, args: Args) -> VmResult<Outputs> {
    let [name, state] = args.take()?;
    frame.notifications.push(Notification {
        script_hash: frame.script_hash,
        event_name: text_arg(&name, MAX_EVENT_NAME_SIZE)?,
        state: state.to_contract_parameter(),
    });
    Ok(Outputs::none())
}

// ==================== Storage ====================

fn context_item(frame: &ExecutionFrame, read_only: bool) -> StackItem {
    StackItem::InteropInterface(InteropHandle::new(StorageContext {
        script_hash: frame.script_hash,
        read_only,
    }))
}

fn get_context(_: &Op, frame: &mut ExecutionFrame, _: &mut ExecutionHost<'_>, _: Args) -> VmResult<Outputs> {
    Ok(Outputs::one(context_item(frame, false)))
}

fn get_read_only_context(_: &Op, frame: &mut ExecutionFrame, _: &mut ExecutionHost<'_>, _: Args) -> VmResult<Outputs> {
    Ok(Outputs::one(context_item(frame, true)))
}

fn storage_get(_: &Op, _: &mut ExecutionFrame, host: &mut ExecutionHost<'_>, args: Args) -> VmResult<Outputs> {
    let [context, key] = args.take()?;
    let context = storage_context(&context)?;
    let value = host.snapshot.get_storage(&context.script_hash, &key.to_bytes()?)?;
    Ok(Outputs::one(value.map(StackItem::bytes).unwrap_or(StackItem::Null)))
}

fn storage_put(_: &Op, _: &mut ExecutionFrame, host: &mut ExecutionHost<'_>, args: Args) -> VmResult<Outputs> {
    let [context, key, value] = args.take()?;
    let context = storage_context(&context)?;
    if context.read_only {
        return Err(VmError::ReadOnlyContext);
    }
    let key = storage_key(&key)?;
    let value = value.to_bytes()?;
    let limit = host.engine.config().limits.max_item_size;
    if value.len() > limit {
        return Err(VmError::ItemOverflow {
            size: value.len(),
            limit,
        });
    }
    host.snapshot.put_storage(context.script_hash, key, value)?;
    Ok(Outputs::none())
}

fn storage_delete(_: &Op, _: &mut ExecutionFrame, host: &mut ExecutionHost<'_>, args: Args) -> VmResult<Outputs> {
    let [context, key] = args.take()?;
    let context = storage_context(&context)?;
    if context.read_only {
        return Err(VmError::ReadOnlyContext);
    }
    host.snapshot.delete_storage(&context.script_hash, &storage_key(&key)?)?;
    Ok(Outputs::none())
}

// ==================== Contract ====================

fn contract_create(_: &Op, frame: &mut ExecutionFrame, host: &mut ExecutionHost<'_>, args: Args) -> VmResult<Outputs> {
    let [code] = args.take()?;
    let code = code.to_bytes()?;
    if code.is_empty() {
        return Err(VmError::InvalidArgument("empty contract script".into()));
    }
    let hash = tessera_crypto::script_hash(&code);
    if host.snapshot.contract_exists(&hash)? {
        return Err(VmError::ContractExists(hash));
    }
    host.snapshot.put_contract(hash, code.into())?;
    frame.created_contracts.insert(hash);
    debug!(contract = %hash, "contract created");
    Ok(Outputs::one(hash_item(hash)))
}

fn contract_call(_: &Op, frame: &mut ExecutionFrame, host: &mut ExecutionHost<'_>, args: Args) -> VmResult<Outputs> {
    let [hash, params] = args.take()?;
    let hash = hash_arg(&hash)?;
    let params = match params {
        StackItem::Array(items) | StackItem::Struct(items) => items,
        StackItem::Null => Vec::new(),
        other => return Err(VmError::invalid_type("Array", other.item_type())),
    };
    let code = host.snapshot.get_contract(&hash)?.ok_or(VmError::ContractNotFound(hash))?;

    // params[0] ends up on top of the callee's stack
    let residue = FrameResidue {
        stack: params.into_iter().rev().collect(),
        alt_stack: Vec::new(),
        caller_stack_count: frame.own_stack_size() + frame.caller_stack_count,
        caller_alt_stack_count: frame.caller_alt_stack_count,
        created_contracts: std::mem::take(&mut frame.created_contracts),
        notifications: std::mem::take(&mut frame.notifications),
        logs: std::mem::take(&mut frame.logs),
    };
    let options = FrameOptions {
        depth: frame.depth + 1,
        entry_script_hash: frame.entry_script_hash,
        calling_script_hash: Some(frame.script_hash),
    };
    let callee = ExecutionFrame::new(&Script::new(code), frame.gas_left, options, residue);
    debug!(contract = %hash, depth = callee.depth, "contract call");
    frame.pending_call = Some(Box::new(callee));
    Ok(Outputs::none())
}

/// Hand a terminated callee back to the caller suspended at `call_pc`
///
/// A halted callee's top item becomes the call's result. A faulted callee
/// faults the caller; the innermost fault is kept as is, so the message
/// does not grow with the call depth.
pub(crate) fn return_from_call(caller: &mut ExecutionFrame, callee: ExecutionFrame, call_pc: usize) {
    caller.gas_left = callee.gas_left;
    let depth = callee.depth;
    let fault = callee.fault().cloned();

    let mut residue = callee.into_residue();
    caller.created_contracts = std::mem::take(&mut residue.created_contracts);
    caller.notifications = std::mem::take(&mut residue.notifications);
    caller.logs = std::mem::take(&mut residue.logs);

    match fault {
        None => {
            let result = residue.stack.pop().unwrap_or(StackItem::Null);
            caller.nested += result.nested_count();
            caller.stack.push(result);
        }
        Some(info) => {
            let error = if matches!(info.error, VmError::ContractFault { .. }) {
                info.error
            } else {
                VmError::ContractFault {
                    depth,
                    fault: info.to_string(),
                }
            };
            caller.set_fault(FaultInfo::new(error, call_pc, Some(OpCode::SYSCALL)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ExecutionInit, PersistingBlock};
    use crate::frame::VmState;
    use crate::interpreter::Engine;
    use crate::opcode::OpCode;
    use crate::script_builder::ScriptBuilder;
    use crate::snapshot::{MemorySnapshot, SnapshotReader};
    use crate::{ContractParameter, ExecuteScriptsResult};
    use num_bigint::BigInt;

    const GAS: Gas = 100_000_000;

    fn run_on(snapshot: &mut MemorySnapshot, init: &ExecutionInit, builder: &ScriptBuilder) -> ExecuteScriptsResult {
        Engine::default().execute(&[builder.to_script()], snapshot, init, GAS)
    }

    fn run(builder: &ScriptBuilder) -> ExecuteScriptsResult {
        run_on(&mut MemorySnapshot::new(), &ExecutionInit::application(), builder)
    }

    fn syscall(name: &str) -> ScriptBuilder {
        let mut builder = ScriptBuilder::new();
        builder.emit_syscall(name);
        builder
    }

    // ==================== Registry ====================

    #[test]
    fn test_standard_registry() {
        let registry = InteropRegistry::standard();
        assert_eq!(registry.len(), 16);
        let put = registry.by_name(names::STORAGE_PUT).unwrap();
        assert_eq!(put.arity, 3);
        assert!(!put.allows(TriggerType::Verification));
        assert!(registry.by_name(names::RUNTIME_LOG).unwrap().allows(TriggerType::Verification));
    }

    #[test]
    fn test_unknown_syscall_charges_nothing() {
        let mut builder = ScriptBuilder::new();
        builder.emit(OpCode::SYSCALL).emit_u32_le(0xdead_beef);
        let result = run(&builder);
        assert_eq!(result.state, VmState::Fault);
        assert!(result.error_message.unwrap().starts_with("unknown syscall: 0xdeadbeef"));
        assert_eq!(result.gas_consumed, 0);
    }

    #[test]
    fn test_syscall_fee_includes_service_price() {
        let result = run(&syscall(names::RUNTIME_GET_TRIGGER));
        assert_eq!(result.state, VmState::Halt);
        assert_eq!(result.gas_consumed, crate::cost::price(OpCode::SYSCALL) + price::QUERY);
    }

    // ==================== Runtime ====================

    #[test]
    fn test_get_trigger() {
        let result = run(&syscall(names::RUNTIME_GET_TRIGGER));
        assert_eq!(result.stack, vec![ContractParameter::Integer(BigInt::from(0x40))]);
    }

    #[test]
    fn test_get_time_requires_block() {
        let result = run(&syscall(names::RUNTIME_GET_TIME));
        assert_eq!(result.state, VmState::Fault);
        assert!(result.error_message.unwrap().starts_with("no persisting block"));

        let init = ExecutionInit::application().with_block(PersistingBlock {
            index: 7,
            timestamp: 1_600_000_000_000,
            ..Default::default()
        });
        let result = run_on(&mut MemorySnapshot::new(), &init, &syscall(names::RUNTIME_GET_TIME));
        assert_eq!(result.stack, vec![ContractParameter::Integer(BigInt::from(1_600_000_000_000u64))]);
    }

    #[test]
    fn test_script_hashes() {
        let builder = syscall(names::RUNTIME_GET_EXECUTING_SCRIPT_HASH);
        let expected = builder.to_script().hash();
        let result = run(&builder);
        assert_eq!(result.stack, vec![ContractParameter::ByteArray(expected.as_bytes().to_vec())]);

        let result = run(&syscall(names::RUNTIME_GET_CALLING_SCRIPT_HASH));
        assert_eq!(result.stack, vec![ContractParameter::Any]);
    }

    #[test]
    fn test_check_witness() {
        let witness = ScriptHash::from_bytes([7u8; 20]);
        let init = ExecutionInit::application().with_witness(witness);
        let mut builder = ScriptBuilder::new();
        builder.emit_push_bytes(witness.as_bytes()).unwrap();
        builder.emit_syscall(names::RUNTIME_CHECK_WITNESS);
        let result = run_on(&mut MemorySnapshot::new(), &init, &builder);
        assert_eq!(result.stack, vec![ContractParameter::Boolean(true)]);

        let result = run(&builder);
        assert_eq!(result.stack, vec![ContractParameter::Boolean(false)]);
    }

    #[test]
    fn test_log_and_notify() {
        let mut builder = ScriptBuilder::new();
        builder.emit_push_bytes(b"hello").unwrap();
        builder.emit_syscall(names::RUNTIME_LOG);
        builder.emit_push_int(5);
        builder.emit_push_bytes(b"Transfer").unwrap();
        builder.emit_syscall(names::RUNTIME_NOTIFY);
        let result = run(&builder);
        assert_eq!(result.state, VmState::Halt);
        assert_eq!(result.logs.len(), 1);
        assert_eq!(result.logs[0].message, "hello");
        assert_eq!(result.notifications.len(), 1);
        assert_eq!(result.notifications[0].event_name, "Transfer");
        assert_eq!(result.notifications[0].state, ContractParameter::Integer(BigInt::from(5)));
    }

    // ==================== Storage ====================

    fn put_script(key: &[u8], value: &[u8]) -> ScriptBuilder {
        let mut builder = ScriptBuilder::new();
        builder.emit_push_bytes(value).unwrap();
        builder.emit_push_bytes(key).unwrap();
        builder.emit_syscall(names::STORAGE_GET_CONTEXT);
        builder.emit_syscall(names::STORAGE_PUT);
        builder
    }

    #[test]
    fn test_storage_put_get() {
        let mut snapshot = MemorySnapshot::new();
        let mut builder = put_script(b"k", b"v");
        builder.emit_push_bytes(b"k").unwrap();
        builder.emit_syscall(names::STORAGE_GET_READ_ONLY_CONTEXT);
        builder.emit_syscall(names::STORAGE_GET);
        let result = run_on(&mut snapshot, &ExecutionInit::application(), &builder);
        assert_eq!(result.state, VmState::Halt);
        assert_eq!(result.stack, vec![ContractParameter::ByteArray(b"v".to_vec())]);

        let owner = builder.to_script().hash();
        assert_eq!(snapshot.get_storage(&owner, b"k").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn test_storage_put_rejected_under_verification() {
        let mut snapshot = MemorySnapshot::new();
        let result = run_on(&mut snapshot, &ExecutionInit::verification(), &put_script(b"k", b"v"));
        assert_eq!(result.state, VmState::Fault);
        assert!(result
            .error_message
            .unwrap()
            .starts_with("System.Storage.Put is not allowed under trigger Verification"));
        assert_eq!(snapshot.storage_len(), 0);
    }

    #[test]
    fn test_storage_put_read_only_context() {
        let mut builder = ScriptBuilder::new();
        builder.emit_push_bytes(b"v").unwrap();
        builder.emit_push_bytes(b"k").unwrap();
        builder.emit_syscall(names::STORAGE_GET_READ_ONLY_CONTEXT);
        builder.emit_syscall(names::STORAGE_PUT);
        let result = run(&builder);
        assert_eq!(result.state, VmState::Fault);
        assert!(result.error_message.unwrap().starts_with("storage context is read-only"));
    }

    #[test]
    fn test_storage_key_limit() {
        let result = run(&put_script(&[1u8; MAX_STORAGE_KEY_SIZE + 1], b"v"));
        assert_eq!(result.state, VmState::Fault);
        assert!(result.error_message.unwrap().contains("storage key of 65 bytes"));
    }

    #[test]
    fn test_storage_delete() {
        let mut snapshot = MemorySnapshot::new();
        let mut builder = put_script(b"k", b"v");
        builder.emit_push_bytes(b"k").unwrap();
        builder.emit_syscall(names::STORAGE_GET_CONTEXT);
        builder.emit_syscall(names::STORAGE_DELETE);
        let result = run_on(&mut snapshot, &ExecutionInit::application(), &builder);
        assert_eq!(result.state, VmState::Halt);
        assert_eq!(snapshot.storage_len(), 0);
    }

    // ==================== Contract ====================

    #[test]
    fn test_contract_create() {
        let code = vec![OpCode::PUSH7 as u8];
        let mut snapshot = MemorySnapshot::new();
        let mut builder = ScriptBuilder::new();
        builder.emit_push_bytes(&code).unwrap();
        builder.emit_syscall(names::CONTRACT_CREATE);
        let result = run_on(&mut snapshot, &ExecutionInit::application(), &builder);
        assert_eq!(result.state, VmState::Halt);

        let hash = tessera_crypto::script_hash(&code);
        assert_eq!(result.stack, vec![ContractParameter::ByteArray(hash.as_bytes().to_vec())]);
        assert!(snapshot.contract_exists(&hash).unwrap());

        // second deployment of the same code
        let result = run_on(&mut snapshot, &ExecutionInit::application(), &builder);
        assert_eq!(result.state, VmState::Fault);
        assert!(result.error_message.unwrap().starts_with("contract already exists"));
    }

    fn call_script(hash: ScriptHash, params: &[i64]) -> ScriptBuilder {
        let mut builder = ScriptBuilder::new();
        for value in params.iter().rev() {
            builder.emit_push_int(*value);
        }
        builder.emit_push_int(params.len() as i64).emit(OpCode::PACK);
        builder.emit_push_bytes(hash.as_bytes()).unwrap();
        builder.emit_syscall(names::CONTRACT_CALL);
        builder
    }

    #[test]
    fn test_contract_call_returns_top() {
        let mut snapshot = MemorySnapshot::new();
        // callee subtracts its second parameter from its first
        let hash = snapshot.deploy(vec![OpCode::SWAP as u8, OpCode::SUB as u8]);
        let result = run_on(&mut snapshot, &ExecutionInit::application(), &call_script(hash, &[10, 3]));
        assert_eq!(result.state, VmState::Halt);
        assert_eq!(result.stack, vec![ContractParameter::Integer(BigInt::from(7))]);
    }

    #[test]
    fn test_contract_call_sees_caller() {
        let mut snapshot = MemorySnapshot::new();
        let callee = syscall(names::RUNTIME_GET_CALLING_SCRIPT_HASH);
        let hash = snapshot.deploy(callee.to_bytes());
        let caller = call_script(hash, &[]);
        let result = run_on(&mut snapshot, &ExecutionInit::application(), &caller);
        assert_eq!(
            result.stack,
            vec![ContractParameter::ByteArray(caller.to_script().hash().as_bytes().to_vec())]
        );
    }

    #[test]
    fn test_contract_call_fault_propagates() {
        let mut snapshot = MemorySnapshot::new();
        let hash = snapshot.deploy(vec![OpCode::ABORT as u8]);
        let result = run_on(&mut snapshot, &ExecutionInit::application(), &call_script(hash, &[]));
        assert_eq!(result.state, VmState::Fault);
        assert_eq!(
            result.error_message.as_deref(),
            Some("contract call faulted at depth 2: execution aborted (pc=0, opcode=ABORT) (pc=24, opcode=SYSCALL)")
        );
    }

    #[test]
    fn test_nested_fault_keeps_innermost_message() {
        let mut snapshot = MemorySnapshot::new();
        let inner = snapshot.deploy(vec![OpCode::ABORT as u8]);
        let middle = snapshot.deploy(call_script(inner, &[]).to_bytes());
        let result = run_on(&mut snapshot, &ExecutionInit::application(), &call_script(middle, &[]));
        assert_eq!(result.state, VmState::Fault);

        let message = result.error_message.unwrap();
        assert!(message.starts_with("contract call faulted at depth 3: execution aborted (pc=0, opcode=ABORT)"));
        assert_eq!(message.matches("contract call faulted").count(), 1);
    }

    #[test]
    fn test_contract_call_restores_caller() {
        let mut snapshot = MemorySnapshot::new();
        let hash = snapshot.deploy(vec![OpCode::PUSH7 as u8]);
        let mut caller = ScriptBuilder::new();
        caller.emit_push_int(1);
        caller.emit_push_int(0).emit(OpCode::PACK);
        caller.emit_push_bytes(hash.as_bytes()).unwrap();
        caller.emit_syscall(names::CONTRACT_CALL);
        caller.emit(OpCode::ADD);
        let result = run_on(&mut snapshot, &ExecutionInit::application(), &caller);
        assert_eq!(result.state, VmState::Halt);
        assert_eq!(result.stack, vec![ContractParameter::Integer(BigInt::from(8))]);
    }

    #[test]
    fn test_contract_call_missing() {
        let hash = ScriptHash::from_bytes([9u8; 20]);
        let result = run(&call_script(hash, &[]));
        assert_eq!(result.state, VmState::Fault);
        assert!(result.error_message.unwrap().starts_with("contract not found"));
    }

    #[test]
    fn test_contract_call_depth_limit() {
        let mut snapshot = MemorySnapshot::new();
        let hash = snapshot.deploy(vec![OpCode::PUSH1 as u8]);
        let engine = Engine::new(crate::config::EngineConfig {
            limits: crate::config::ExecutionLimits {
                max_invocation_depth: 1,
                ..Default::default()
            },
            ..Default::default()
        });
        let result = engine.execute(
            &[call_script(hash, &[]).to_script()],
            &mut snapshot,
            &ExecutionInit::application(),
            GAS,
        );
        assert_eq!(result.state, VmState::Fault);
        assert!(result.error_message.unwrap().starts_with("invocation stack overflow"));
    }
}
