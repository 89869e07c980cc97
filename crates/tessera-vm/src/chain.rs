//! Invocation chain: run scripts in order, carrying stacks forward
//!
//! Every frame of a chain writes through one buffered view of the caller's
//! snapshot. The buffer is applied only when every script halts, so a
//! faulted chain leaves the snapshot untouched.

use crate::context::{ExecutionHost, ExecutionInit, LogEntry, Notification};
use crate::contract_parameter::ContractParameter;
use crate::error::{FaultInfo, VmError};
use crate::frame::{ExecutionFrame, FrameOptions, FrameResidue, Script, VmState};
use crate::interpreter::Engine;
use crate::metrics::names;
use crate::snapshot::{CachedSnapshot, StateSnapshot};
use crate::stack_item::StackItem;
use serde::Serialize;
use tessera_primitives::Gas;
use tracing::{debug, debug_span};

/// Outcome of an invocation chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecuteScriptsResult {
    /// `Halt` only if every script halted
    pub state: VmState,
    /// Final evaluation stack, top first
    pub stack: Vec<ContractParameter>,
    /// Final alt stack, top first
    pub alt_stack: Vec<ContractParameter>,
    /// Gas charged to the caller, net of the free allowance
    pub gas_consumed: Gas,
    /// Gross gas used, including the free allowance
    pub gas_cost: Gas,
    /// Fault message
    pub error_message: Option<String>,
    /// Notifications, reported for halted chains only
    pub notifications: Vec<Notification>,
    /// Log entries, reported for halted chains only
    pub logs: Vec<LogEntry>,
}

impl ExecuteScriptsResult {
    fn empty() -> Self {
        Self {
            state: VmState::Halt,
            stack: Vec::new(),
            alt_stack: Vec::new(),
            gas_consumed: 0,
            gas_cost: 0,
            error_message: None,
            notifications: Vec::new(),
            logs: Vec::new(),
        }
    }

    /// Whether every script halted
    pub fn is_halt(&self) -> bool {
        self.state == VmState::Halt
    }
}

fn top_first(items: &[StackItem]) -> Vec<ContractParameter> {
    items.iter().rev().map(StackItem::to_contract_parameter).collect()
}

impl Engine {
    /// Execute `scripts` in order against `snapshot`
    ///
    /// Each script starts from the stacks the previous one left behind and
    /// the gas it did not spend. Storage writes reach `snapshot` only if the
    /// whole chain halts.
    pub fn execute(
        &self,
        scripts: &[Script],
        snapshot: &mut dyn StateSnapshot,
        init: &ExecutionInit,
        gas: Gas,
    ) -> ExecuteScriptsResult {
        let span = debug_span!("execute_scripts", scripts = scripts.len(), gas);
        let _enter = span.enter();
        let metrics = self.metrics();
        metrics.counter(names::CHAINS, 1);

        let Some(first) = scripts.first() else {
            metrics.counter(names::HALTS, 1);
            return ExecuteScriptsResult::empty();
        };

        let free = self.config().free_gas;
        let budget = gas.saturating_add(free);
        let entry_script_hash = first.hash();

        let mut cache = CachedSnapshot::new(&*snapshot);
        let mut residue = FrameResidue::default();
        let mut gas_left = budget;
        let mut calling_script_hash = None;
        let mut fault: Option<FaultInfo> = None;
        {
            let mut host = ExecutionHost::new(self, &mut cache, init);
            for (idx, script) in scripts.iter().enumerate() {
                let options = FrameOptions {
                    depth: scripts.len() - idx,
                    entry_script_hash,
                    calling_script_hash,
                };
                let mut frame = ExecutionFrame::new(script, gas_left, options, residue);
                let outcome = self.run(&mut frame, &mut host);

                gas_left = frame.gas_left();
                calling_script_hash = Some(frame.script_hash());
                residue = frame.into_residue();
                if let Err(info) = outcome {
                    fault = Some(info);
                    break;
                }
            }
        }

        let changes = cache.into_changes();
        if fault.is_none() {
            if let Err(err) = changes.apply_to(snapshot) {
                fault = Some(FaultInfo::new(VmError::from(err), 0, None));
            }
        }

        let gas_cost = budget.saturating_sub(gas_left);
        let gas_consumed = gas_cost.saturating_sub(free).max(0);
        metrics.gas(gas_consumed);

        let mut result = ExecuteScriptsResult {
            state: VmState::Halt,
            stack: top_first(&residue.stack),
            alt_stack: top_first(&residue.alt_stack),
            gas_consumed,
            gas_cost,
            error_message: None,
            notifications: Vec::new(),
            logs: Vec::new(),
        };
        match fault {
            Some(info) => {
                metrics.counter(names::FAULTS, 1);
                metrics.fault(info.error.kind());
                debug!(fault = %info, gas_consumed, "chain faulted");
                result.state = VmState::Fault;
                result.error_message = Some(info.to_string());
            }
            None => {
                metrics.counter(names::HALTS, 1);
                debug!(gas_consumed, "chain halted");
                result.notifications = residue.notifications;
                result.logs = residue.logs;
            }
        }
        result
    }
}
