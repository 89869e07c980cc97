//! Step executor and run loop
//!
//! One step runs a fixed sequence of checks: halt at end of code, decode,
//! stack underflow, combined stack size, call depth, produced sizes, gas,
//! then the handler. The first failing check decides the reported fault.
//!
//! The combined stack size counts every element nested inside a compound
//! item, so duplicating or packing compound items is bounded by the same
//! ceiling as pushing.
//!
//! Contract calls do not recurse on the host stack: the run loop suspends
//! the caller, runs the callee as the current frame and resumes the caller
//! once the callee terminates.

use crate::config::{EngineConfig, ExecutionLimits};
use crate::context::ExecutionHost;
use crate::error::{FaultInfo, VmError, VmResult};
use crate::frame::ExecutionFrame;
use crate::interop::{self, InteropRegistry};
use crate::jump_table::{Args, JumpTable, Op};
use crate::metrics::{names, ExecutionMetrics};
use crate::opcode::OpCode;
use crate::stack_item::StackItem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, trace};

/// Bytecode engine
///
/// Holds the immutable configuration and dispatch tables; every chain it
/// executes owns its own frames, so one engine may serve many threads.
pub struct Engine {
    config: EngineConfig,
    table: Arc<JumpTable>,
    interop: Arc<InteropRegistry>,
    metrics: Arc<ExecutionMetrics>,
}

impl Engine {
    /// Engine with the standard instruction set and services
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            table: JumpTable::shared(),
            interop: InteropRegistry::shared(),
            metrics: Arc::new(ExecutionMetrics::new()),
        }
    }

    /// Replace the instruction table
    pub fn with_table(mut self, table: Arc<JumpTable>) -> Self {
        self.table = table;
        self
    }

    /// Replace the service registry
    pub fn with_interop(mut self, interop: Arc<InteropRegistry>) -> Self {
        self.interop = interop;
        self
    }

    /// Share a metrics store with other engines
    pub fn with_metrics(mut self, metrics: Arc<ExecutionMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Resource ceilings
    pub fn limits(&self) -> &ExecutionLimits {
        &self.config.limits
    }

    /// Instruction table
    pub fn table(&self) -> &JumpTable {
        &self.table
    }

    /// Service registry
    pub fn interop(&self) -> &InteropRegistry {
        &self.interop
    }

    /// Execution metrics
    pub fn metrics(&self) -> &Arc<ExecutionMetrics> {
        &self.metrics
    }

    /// Advance a running frame by one instruction
    ///
    /// A `System.Contract.Call` leaves the callee pending on the frame;
    /// [`Engine::run`] executes it.
    pub fn step(&self, frame: &mut ExecutionFrame, host: &mut ExecutionHost<'_>) {
        if !frame.is_running() {
            return;
        }
        let pc = frame.pc;
        if pc >= frame.code.len() {
            frame.halt();
            return;
        }

        // Decode and metadata failures are not charged
        let op = match self.prepare(frame, host) {
            Ok(op) => op,
            Err(error) => {
                let opcode = OpCode::from_byte(frame.code[pc]);
                return fail(frame, error, pc, opcode);
            }
        };
        trace!(pc, opcode = %op.opcode, gas_left = frame.gas_left, "step");

        if let Err(error) = self.check_limits(&op, frame) {
            frame.gas_left -= op.fee.min(frame.gas_left.max(0));
            return fail(frame, error, pc, Some(op.opcode));
        }
        if let Err(error) = charge(&op, frame) {
            return fail(frame, error, pc, Some(op.opcode));
        }
        if let Err(error) = execute(&op, frame, host) {
            return fail(frame, error, pc, Some(op.opcode));
        }

        let limit = self.config.limits.max_stack_size;
        let size = frame.total_stack_size();
        if size > limit {
            fail(frame, VmError::StackOverflow { size, limit }, pc, Some(op.opcode));
        }
    }

    /// Run a frame until it halts or faults, including every contract it calls
    pub fn run(&self, frame: &mut ExecutionFrame, host: &mut ExecutionHost<'_>) -> Result<(), FaultInfo> {
        self.start(frame);

        // Suspended callers, innermost last, with the pc of their call
        let mut callers: Vec<(ExecutionFrame, usize)> = Vec::new();
        let mut steps = 0u64;
        loop {
            while frame.is_running() {
                let pc = frame.pc;
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.step(frame, host)));
                if let Err(payload) = outcome {
                    let message = panic_message(payload.as_ref());
                    fail(frame, VmError::Internal(message), pc, None);
                }
                steps += 1;

                if let Some(callee) = frame.pending_call.take() {
                    if frame.is_running() {
                        callers.push((std::mem::replace(frame, *callee), pc));
                        self.start(frame);
                    }
                }
            }

            let Some((caller, call_pc)) = callers.pop() else {
                break;
            };
            let callee = std::mem::replace(frame, caller);
            if let Some(info) = callee.fault() {
                debug!(script = %callee.script_hash, fault = %info, "contract faulted");
            }
            interop::return_from_call(frame, callee, call_pc);
        }
        self.metrics.counter(names::STEPS, steps);

        match frame.fault() {
            Some(info) => {
                debug!(script = %frame.script_hash, fault = %info, "script faulted");
                Err(info.clone())
            }
            None => Ok(()),
        }
    }

    fn start(&self, frame: &ExecutionFrame) {
        debug!(
            script = %frame.script_hash,
            depth = frame.depth,
            gas = frame.gas_left,
            "running script"
        );
        self.metrics.counter(names::SCRIPTS, 1);
    }

    /// Decode the instruction at the program counter and resolve its metadata
    fn prepare(&self, frame: &ExecutionFrame, host: &ExecutionHost<'_>) -> VmResult<Op> {
        let mut op = self.table.decode(&frame.code, frame.pc)?;
        if let Some(refine) = op.refine {
            refine(&mut op, frame, host)?;
        }
        Ok(op)
    }

    /// Stack, depth and size checks made before anything is popped
    fn check_limits(&self, op: &Op, frame: &ExecutionFrame) -> VmResult<()> {
        let limits = &self.config.limits;

        if frame.stack.len() < op.stack_in {
            return Err(VmError::StackUnderflow {
                opcode: op.opcode,
                required: op.stack_in,
                actual: frame.stack.len(),
            });
        }
        if frame.alt_stack.len() < op.alt_in {
            return Err(VmError::AltStackUnderflow {
                opcode: op.opcode,
                required: op.alt_in,
                actual: frame.alt_stack.len(),
            });
        }

        let size = frame.total_stack_size() as i128 + op.stack_out as i128 + op.alt_out as i128 + op.growth as i128
            - op.stack_in as i128
            - op.alt_in as i128;
        if size > limits.max_stack_size as i128 {
            return Err(VmError::StackOverflow {
                size: usize::try_from(size).unwrap_or(usize::MAX),
                limit: limits.max_stack_size,
            });
        }

        let depth = frame.depth as i128 + op.invocation as i128;
        if depth > limits.max_invocation_depth as i128 {
            return Err(VmError::InvocationStackOverflow {
                depth: usize::try_from(depth).unwrap_or(usize::MAX),
                limit: limits.max_invocation_depth,
            });
        }

        if op.array_size > limits.max_array_size {
            return Err(VmError::ArrayOverflow {
                size: op.array_size,
                limit: limits.max_array_size,
            });
        }
        if op.item_size > limits.max_item_size {
            return Err(VmError::ItemOverflow {
                size: op.item_size,
                limit: limits.max_item_size,
            });
        }
        Ok(())
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("opcodes", &self.table.len())
            .field("services", &self.interop.len())
            .finish()
    }
}

fn fail(frame: &mut ExecutionFrame, error: VmError, pc: usize, opcode: Option<OpCode>) {
    frame.set_fault(FaultInfo::new(error, pc, opcode));
}

/// Deduct the instruction's fee; an unaffordable fee leaves no gas
fn charge(op: &Op, frame: &mut ExecutionFrame) -> VmResult<()> {
    let available = frame.gas_left;
    match available.checked_sub(op.fee) {
        Some(left) if left >= 0 => {
            frame.gas_left = left;
            Ok(())
        }
        _ => {
            frame.gas_left = available.min(0);
            Err(VmError::OutOfGas {
                required: op.fee,
                available,
            })
        }
    }
}

/// Pop arguments, run the handler, push results and advance
fn execute(op: &Op, frame: &mut ExecutionFrame, host: &mut ExecutionHost<'_>) -> VmResult<()> {
    let split = frame.stack.len() - op.stack_in;
    let mut stack = frame.stack.split_off(split);
    stack.reverse();
    let split = frame.alt_stack.len() - op.alt_in;
    let mut alt = frame.alt_stack.split_off(split);
    alt.reverse();
    let popped: usize = stack.iter().chain(&alt).map(StackItem::nested_count).sum();
    frame.nested = frame.nested.saturating_sub(popped);

    let outputs = (op.handler)(op, frame, host, Args { stack, alt })?;

    if outputs.stack.len() != op.stack_out || outputs.alt.len() != op.alt_out {
        return Err(VmError::Internal(format!(
            "{} produced {}/{} results, declared {}/{}",
            op.opcode,
            outputs.stack.len(),
            outputs.alt.len(),
            op.stack_out,
            op.alt_out
        )));
    }
    frame.nested += outputs.stack.iter().chain(&outputs.alt).map(StackItem::nested_count).sum::<usize>();
    frame.stack.extend(outputs.stack.into_iter().rev());
    frame.alt_stack.extend(outputs.alt.into_iter().rev());

    frame.pc = match frame.jump_target.take() {
        Some(target) => target,
        None => frame.pc + op.size,
    };
    Ok(())
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    }
}
