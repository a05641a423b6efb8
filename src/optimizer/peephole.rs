//! The straight-line rewrites behind `-O1`: constant folding, copy
//! propagation, algebraic simplification and dead-code elimination, plus
//! the small-window copy-chain rewrite used at `-O3`.
//!
//! The folding and propagation maps track facts along straight-line code
//! only: every label, function marker or other merge point clears them, and
//! any redefinition invalidates the facts it touches.

use crate::ir::{is_literal, Instruction, IrCode, OpCode};
use std::collections::{HashMap, HashSet};

/// Runs the four `-O1` passes in their fixed order until the code stops
/// changing. Simplifications cascade (folding exposes copies, copies expose
/// dead stores), so one round is rarely enough and the fixed point makes
/// the whole stage idempotent.
pub fn run(mut code: IrCode) -> IrCode {
    loop {
        let before = code.clone();
        constant_folding(&mut code);
        copy_propagation(&mut code);
        algebraic_simplification(&mut code);
        dead_code_elimination(&mut code);
        if code == before {
            return code;
        }
    }
}

/// `true` when the facts gathered so far must not flow past `instr`.
fn is_barrier(instr: &Instruction) -> bool {
    matches!(
        instr.op,
        OpCode::Label | OpCode::FunctionBegin | OpCode::FunctionEnd
    )
}

/// Which argument slots of `op` hold values open to substitution. A call's
/// `arg1` is a function name and a branch target is a label, so neither may
/// be rewritten.
fn substitutable(op: OpCode) -> (bool, bool) {
    match op {
        OpCode::Goto
        | OpCode::Label
        | OpCode::FunctionBegin
        | OpCode::FunctionEnd
        | OpCode::Call
        | OpCode::Nop
        | OpCode::Halt => (false, false),
        OpCode::IfFalse | OpCode::IfTrue | OpCode::Param | OpCode::Return | OpCode::Not => {
            (true, false)
        }
        // the base name of an array access is storage, not a value
        OpCode::ArrayAccess => (false, true),
        _ => (true, true),
    }
}

fn substitute(instr: &mut Instruction, map: &HashMap<String, String>) {
    let (sub1, sub2) = substitutable(instr.op);
    if sub1 {
        if let Some(known) = map.get(&instr.arg1) {
            instr.arg1 = known.clone();
        }
    }
    if sub2 {
        if let Some(known) = map.get(&instr.arg2) {
            instr.arg2 = known.clone();
        }
    }
}

fn eval_binary(op: OpCode, lhs: i64, rhs: i64) -> Option<i64> {
    let value = match op {
        OpCode::Add => lhs.checked_add(rhs)?,
        OpCode::Sub => lhs.checked_sub(rhs)?,
        OpCode::Mul => lhs.checked_mul(rhs)?,
        // division and modulus by zero abort the fold
        OpCode::Div => lhs.checked_div(rhs)?,
        OpCode::Mod => lhs.checked_rem(rhs)?,
        OpCode::Eq => i64::from(lhs == rhs),
        OpCode::Ne => i64::from(lhs != rhs),
        OpCode::Lt => i64::from(lhs < rhs),
        OpCode::Le => i64::from(lhs <= rhs),
        OpCode::Gt => i64::from(lhs > rhs),
        OpCode::Ge => i64::from(lhs >= rhs),
        OpCode::And => i64::from(lhs != 0 && rhs != 0),
        OpCode::Or => i64::from(lhs != 0 || rhs != 0),
        _ => return None,
    };
    Some(value)
}

/// Replaces operations on literal operands with `ASSIGN result, <literal>`
/// and propagates known literals into later operands.
pub fn constant_folding(code: &mut IrCode) {
    let mut constants: HashMap<String, String> = HashMap::new();

    for instr in code.iter_mut() {
        if is_barrier(instr) {
            constants.clear();
            continue;
        }

        substitute(instr, &constants);

        let foldable =
            instr.op.is_arithmetic() || instr.op.is_comparison() || instr.op.is_logical();
        if foldable {
            let folded = match instr.op {
                OpCode::Not => {
                    parse_literal(&instr.arg1).map(|v| i64::from(v == 0))
                }
                _ => match (parse_literal(&instr.arg1), parse_literal(&instr.arg2)) {
                    (Some(lhs), Some(rhs)) => eval_binary(instr.op, lhs, rhs),
                    _ => None,
                },
            };
            if let Some(value) = folded {
                instr.op = OpCode::Assign;
                instr.arg1 = value.to_string();
                instr.arg2 = String::new();
            }
        }

        if let Some(defined) = instr.defined_var() {
            let defined = defined.to_owned();
            constants.remove(&defined);
            if instr.op == OpCode::Assign && is_literal(&instr.arg1) {
                constants.insert(defined, instr.arg1.clone());
            }
        }
    }
}

fn parse_literal(operand: &str) -> Option<i64> {
    is_literal(operand).then(|| operand.parse().ok()).flatten()
}

/// Forwards the sources of `ASSIGN`/`COPY` moves into later reads. An entry
/// dies when either of its sides is redefined.
pub fn copy_propagation(code: &mut IrCode) {
    let mut copies: HashMap<String, String> = HashMap::new();

    for instr in code.iter_mut() {
        if is_barrier(instr) {
            copies.clear();
            continue;
        }

        substitute(instr, &copies);

        if let Some(defined) = instr.defined_var() {
            let defined = defined.to_owned();
            copies.remove(&defined);
            copies.retain(|_, source| *source != defined);
            if matches!(instr.op, OpCode::Assign | OpCode::Copy) && !is_literal(&instr.arg1) {
                copies.insert(defined, instr.arg1.clone());
            }
        }
    }
}

/// The identity rewrites: `x+0`, `x-0`, `x*1`, `x/1` become `COPY`, `x*0`
/// becomes `ASSIGN 0`. The result operand is preserved.
pub fn algebraic_simplification(code: &mut IrCode) {
    for instr in code.iter_mut() {
        match (instr.op, instr.arg2.as_str()) {
            (OpCode::Add | OpCode::Sub, "0") | (OpCode::Mul | OpCode::Div, "1") => {
                instr.op = OpCode::Copy;
                instr.arg2 = String::new();
            }
            (OpCode::Mul, "0") => {
                instr.op = OpCode::Assign;
                instr.arg1 = "0".to_owned();
                instr.arg2 = String::new();
            }
            _ => (),
        }
    }
}

/// Drops instructions whose defined variable is never read anywhere in the
/// region. Labels, branches, calls, returns and function markers survive
/// unconditionally.
pub fn dead_code_elimination(code: &mut IrCode) {
    let used: HashSet<String> = code
        .iter()
        .flat_map(|i| i.used_vars().into_iter().map(ToOwned::to_owned))
        .collect();

    code.retain(|instr| {
        if matches!(
            instr.op,
            OpCode::Goto
                | OpCode::IfFalse
                | OpCode::IfTrue
                | OpCode::Label
                | OpCode::Call
                | OpCode::Param
                | OpCode::Return
                | OpCode::FunctionBegin
                | OpCode::FunctionEnd
                | OpCode::Halt
        ) {
            return true;
        }
        match instr.defined_var() {
            Some(defined) => used.contains(defined),
            None => true,
        }
    });
}

/// Window rewrite over adjacent moves: `ASSIGN t, x; ASSIGN y, t` forwards
/// `x` into the second move, leaving the first for dead-code elimination.
pub fn copy_chain_window(mut code: IrCode) -> IrCode {
    for i in 1..code.len() {
        let (head, tail) = code.split_at_mut(i);
        let first = &head[i - 1];
        let second = &mut tail[0];
        if first.op == OpCode::Assign
            && matches!(second.op, OpCode::Assign | OpCode::Copy)
            && !first.result.is_empty()
            && second.arg1 == first.result
        {
            second.arg1 = first.arg1.clone();
        }
    }
    code
}
