//! Bitwise logic and arithmetic
//!
//! Integers are arbitrary precision; every result wider than the configured
//! integer size faults.

use super::*;
use crate::error::VmError;
use crate::jump_table::{Args, Op, OpSpec, Outputs};
use crate::opcode::OpCode;
use crate::stack_item::checked_integer;
use num_traits::{Signed, ToPrimitive, Zero};

/// Largest accepted shift distance
const MAX_SHIFT: u32 = 256;

pub(super) fn register(table: &mut JumpTable) {
    use OpCode::*;
    for opcode in [INVERT, SIGN, ABS, NEGATE, INC, DEC] {
        table.insert(OpSpec::new(opcode, unary).io(1, 1));
    }
    for opcode in [AND, OR, XOR, ADD, SUB, MUL, DIV, MOD, SHL, SHR, MIN, MAX] {
        table.insert(OpSpec::new(opcode, binary).io(2, 1));
    }
    for opcode in [NUMEQUAL, NUMNOTEQUAL, LT, LE, GT, GE] {
        table.insert(OpSpec::new(opcode, compare).io(2, 1));
    }
    table.insert(OpSpec::new(EQUAL, equal).io(2, 1));
    table.insert(OpSpec::new(NOTEQUAL, equal).io(2, 1));
    table.insert(OpSpec::new(NOT, not).io(1, 1));
    table.insert(OpSpec::new(NZ, nz).io(1, 1));
    table.insert(OpSpec::new(BOOLAND, bool_binary).io(2, 1));
    table.insert(OpSpec::new(BOOLOR, bool_binary).io(2, 1));
    table.insert(OpSpec::new(WITHIN, within).io(3, 1));
}

fn unary(op: &Op, _: &mut ExecutionFrame, host: &mut ExecutionHost<'_>, args: Args) -> VmResult<Outputs> {
    use OpCode::*;
    let [x] = args.take()?;
    let x = int(&x, host)?;
    let result = match op.opcode {
        INVERT => -x - 1,
        SIGN => x.signum(),
        ABS => x.abs(),
        NEGATE => -x,
        INC => x + 1,
        DEC => x - 1,
        other => return Err(VmError::Internal(format!("{} is not a unary operation", other))),
    };
    Ok(Outputs::one(checked_integer(result, max_int(host))?))
}

fn shift_distance(shift: &BigInt) -> VmResult<usize> {
    match shift.to_u32() {
        Some(n) if n <= MAX_SHIFT => Ok(n as usize),
        _ => Err(VmError::InvalidArgument(format!("shift {} outside 0..={}", shift, MAX_SHIFT))),
    }
}

fn binary(op: &Op, _: &mut ExecutionFrame, host: &mut ExecutionHost<'_>, args: Args) -> VmResult<Outputs> {
    use OpCode::*;
    let [x2, x1] = args.take()?;
    let (x1, x2) = (int(&x1, host)?, int(&x2, host)?);
    let result = match op.opcode {
        AND => x1 & x2,
        OR => x1 | x2,
        XOR => x1 ^ x2,
        ADD => x1 + x2,
        SUB => x1 - x2,
        MUL => x1 * x2,
        DIV | MOD if x2.is_zero() => return Err(VmError::DivisionByZero),
        DIV => x1 / x2,
        MOD => x1 % x2,
        SHL => x1 << shift_distance(&x2)?,
        SHR => x1 >> shift_distance(&x2)?,
        MIN => x1.min(x2),
        MAX => x1.max(x2),
        other => return Err(VmError::Internal(format!("{} is not a binary operation", other))),
    };
    Ok(Outputs::one(checked_integer(result, max_int(host))?))
}

fn compare(op: &Op, _: &mut ExecutionFrame, host: &mut ExecutionHost<'_>, args: Args) -> VmResult<Outputs> {
    use OpCode::*;
    let [x2, x1] = args.take()?;
    let (x1, x2) = (int(&x1, host)?, int(&x2, host)?);
    let result = match op.opcode {
        NUMEQUAL => x1 == x2,
        NUMNOTEQUAL => x1 != x2,
        LT => x1 < x2,
        LE => x1 <= x2,
        GT => x1 > x2,
        GE => x1 >= x2,
        other => return Err(VmError::Internal(format!("{} is not a comparison", other))),
    };
    Ok(Outputs::one(result))
}

fn equal(op: &Op, _: &mut ExecutionFrame, _: &mut ExecutionHost<'_>, args: Args) -> VmResult<Outputs> {
    let [b, a] = args.take()?;
    let same = a == b;
    Ok(Outputs::one(if op.opcode == OpCode::EQUAL { same } else { !same }))
}

fn not(_: &Op, _: &mut ExecutionFrame, _: &mut ExecutionHost<'_>, args: Args) -> VmResult<Outputs> {
    let [x] = args.take()?;
    Ok(Outputs::one(!x.to_boolean()))
}

fn nz(_: &Op, _: &mut ExecutionFrame, host: &mut ExecutionHost<'_>, args: Args) -> VmResult<Outputs> {
    let [x] = args.take()?;
    Ok(Outputs::one(!int(&x, host)?.is_zero()))
}

fn bool_binary(op: &Op, _: &mut ExecutionFrame, _: &mut ExecutionHost<'_>, args: Args) -> VmResult<Outputs> {
    let [b, a] = args.take()?;
    let (a, b) = (a.to_boolean(), b.to_boolean());
    Ok(Outputs::one(if op.opcode == OpCode::BOOLAND { a && b } else { a || b }))
}

fn within(_: &Op, _: &mut ExecutionFrame, host: &mut ExecutionHost<'_>, args: Args) -> VmResult<Outputs> {
    let [b, a, x] = args.take()?;
    let (x, a, b) = (int(&x, host)?, int(&a, host)?, int(&b, host)?);
    Ok(Outputs::one(a <= x && x < b))
}

#[cfg(test)]
mod tests {
    use crate::context::ExecutionInit;
    use crate::frame::VmState;
    use crate::interpreter::Engine;
    use crate::opcode::OpCode;
    use crate::script_builder::ScriptBuilder;
    use crate::snapshot::MemorySnapshot;
    use crate::{ContractParameter, ExecuteScriptsResult};
    use num_bigint::BigInt;

    fn eval(operands: &[i64], opcode: OpCode) -> ExecuteScriptsResult {
        let mut builder = ScriptBuilder::new();
        for value in operands {
            builder.emit_push_int(*value);
        }
        builder.emit(opcode);
        let mut snapshot = MemorySnapshot::new();
        Engine::default().execute(&[builder.to_script()], &mut snapshot, &ExecutionInit::application(), 10_000_000)
    }

    fn int_result(operands: &[i64], opcode: OpCode) -> BigInt {
        match eval(operands, opcode).stack.first() {
            Some(ContractParameter::Integer(value)) => value.clone(),
            other => panic!("expected integer, got {:?}", other),
        }
    }

    fn bool_result(operands: &[i64], opcode: OpCode) -> bool {
        match eval(operands, opcode).stack.first() {
            Some(ContractParameter::Boolean(value)) => *value,
            other => panic!("expected boolean, got {:?}", other),
        }
    }

    // ==================== Arithmetic ====================

    #[test]
    fn test_arithmetic() {
        assert_eq!(int_result(&[7, 3], OpCode::ADD), BigInt::from(10));
        assert_eq!(int_result(&[7, 3], OpCode::SUB), BigInt::from(4));
        assert_eq!(int_result(&[7, 3], OpCode::MUL), BigInt::from(21));
        assert_eq!(int_result(&[-7, 2], OpCode::DIV), BigInt::from(-3));
        assert_eq!(int_result(&[-7, 2], OpCode::MOD), BigInt::from(-1));
        assert_eq!(int_result(&[1, 8], OpCode::SHL), BigInt::from(256));
        assert_eq!(int_result(&[-5, 1], OpCode::SHR), BigInt::from(-3));
        assert_eq!(int_result(&[3, 9], OpCode::MIN), BigInt::from(3));
        assert_eq!(int_result(&[3, 9], OpCode::MAX), BigInt::from(9));
    }

    #[test]
    fn test_unary() {
        assert_eq!(int_result(&[5], OpCode::INVERT), BigInt::from(-6));
        assert_eq!(int_result(&[-5], OpCode::SIGN), BigInt::from(-1));
        assert_eq!(int_result(&[-5], OpCode::ABS), BigInt::from(5));
        assert_eq!(int_result(&[5], OpCode::NEGATE), BigInt::from(-5));
        assert_eq!(int_result(&[5], OpCode::INC), BigInt::from(6));
        assert_eq!(int_result(&[5], OpCode::DEC), BigInt::from(4));
    }

    #[test]
    fn test_bitwise() {
        assert_eq!(int_result(&[0b1100, 0b1010], OpCode::AND), BigInt::from(0b1000));
        assert_eq!(int_result(&[0b1100, 0b1010], OpCode::OR), BigInt::from(0b1110));
        assert_eq!(int_result(&[0b1100, 0b1010], OpCode::XOR), BigInt::from(0b0110));
        assert_eq!(int_result(&[-1, 0xff], OpCode::AND), BigInt::from(0xff));
    }

    #[test]
    fn test_division_by_zero() {
        let result = eval(&[1, 0], OpCode::DIV);
        assert_eq!(result.state, VmState::Fault);
        assert!(result.error_message.unwrap().starts_with("division by zero"));
        assert_eq!(eval(&[1, 0], OpCode::MOD).state, VmState::Fault);
    }

    #[test]
    fn test_shift_bounds() {
        assert_eq!(eval(&[1, -1], OpCode::SHL).state, VmState::Fault);
        assert_eq!(eval(&[1, 257], OpCode::SHR).state, VmState::Fault);
    }

    #[test]
    fn test_integer_overflow() {
        // 2^255 needs 33 bytes in two's complement
        let result = eval(&[1, 255], OpCode::SHL);
        assert_eq!(result.state, VmState::Fault);
        assert!(result.error_message.unwrap().contains("integer exceeds 32 bytes"));
        assert_eq!(eval(&[1, 254], OpCode::SHL).state, VmState::Halt);
    }

    // ==================== Comparison and logic ====================

    #[test]
    fn test_comparisons() {
        assert!(bool_result(&[3, 3], OpCode::NUMEQUAL));
        assert!(bool_result(&[3, 4], OpCode::NUMNOTEQUAL));
        assert!(bool_result(&[3, 4], OpCode::LT));
        assert!(bool_result(&[4, 4], OpCode::LE));
        assert!(!bool_result(&[3, 4], OpCode::GT));
        assert!(bool_result(&[4, 4], OpCode::GE));
        assert!(bool_result(&[5, 5, 6], OpCode::WITHIN));
        assert!(!bool_result(&[6, 5, 6], OpCode::WITHIN));
    }

    #[test]
    fn test_boolean_logic() {
        assert!(bool_result(&[0], OpCode::NOT));
        assert!(bool_result(&[-3], OpCode::NZ));
        assert!(!bool_result(&[1, 0], OpCode::BOOLAND));
        assert!(bool_result(&[1, 0], OpCode::BOOLOR));
    }

    #[test]
    fn test_equal_is_type_strict() {
        assert!(bool_result(&[2, 2], OpCode::EQUAL));
        assert!(!bool_result(&[2, 3], OpCode::EQUAL));
        assert!(bool_result(&[2, 3], OpCode::NOTEQUAL));

        // Integer 1 vs Boolean true
        let mut builder = ScriptBuilder::new();
        builder.emit_push_int(1).emit_push_bool(true).emit(OpCode::EQUAL);
        let mut snapshot = MemorySnapshot::new();
        let result = Engine::default().execute(
            &[builder.to_script()],
            &mut snapshot,
            &ExecutionInit::application(),
            1_000_000,
        );
        assert_eq!(result.stack, vec![ContractParameter::Boolean(false)]);
    }
}
