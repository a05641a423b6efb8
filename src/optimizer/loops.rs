//! The `-O3` transforms: loop-invariant code motion, strength reduction,
//! loop unrolling, tail-call rewriting and local instruction scheduling.
//!
//! A loop is a backward branch to an earlier label; the body is everything
//! strictly between the header label and the branch.

use crate::ir::{Instruction, IrCode, OpCode};
use std::collections::HashSet;

pub fn run(code: IrCode) -> IrCode {
    let code = loop_invariant_code_motion(code);
    let mut code = code;
    strength_reduction(&mut code);
    let code = unroll_small_loops(code);
    let code = rewrite_tail_calls(code);
    schedule(code)
}

/// `(header index, branch index)` pairs for every backward branch whose
/// target label appears earlier in the region.
fn find_loops(code: &[Instruction]) -> Vec<(usize, usize)> {
    let mut loops = Vec::new();
    for (i, instr) in code.iter().enumerate() {
        if !instr.is_branch() {
            continue;
        }
        let target = instr.result.as_str();
        let header = code[..i]
            .iter()
            .position(|earlier| earlier.is_label() && earlier.result == target);
        if let Some(j) = header {
            loops.push((j, i));
        }
    }
    loops
}

/// Hoists pure instructions whose read operands are never defined inside
/// the loop body to just before the header label. Only single-definition
/// candidates move; anything with control flow, calls or memory traffic
/// stays put.
fn loop_invariant_code_motion(mut code: IrCode) -> IrCode {
    loop {
        let Some((header, moved)) = find_one_motion(&code) else {
            return code;
        };
        let instr = code.remove(moved);
        code.insert(header, instr);
    }
}

fn find_one_motion(code: &[Instruction]) -> Option<(usize, usize)> {
    for (header, branch) in find_loops(code) {
        let body = &code[header + 1..branch];

        let mut defined: HashSet<&str> = HashSet::new();
        let mut definition_count: Vec<(&str, usize)> = Vec::new();
        for instr in body {
            if let Some(var) = instr.defined_var() {
                defined.insert(var);
                match definition_count.iter_mut().find(|(name, _)| *name == var) {
                    Some((_, count)) => *count += 1,
                    None => definition_count.push((var, 1)),
                }
            }
        }

        for (offset, instr) in body.iter().enumerate() {
            if !instr.op.is_pure() {
                continue;
            }
            let Some(var) = instr.defined_var() else {
                continue;
            };
            let reads_loop_state = instr.used_vars().iter().any(|v| defined.contains(v));
            let single_definition = definition_count
                .iter()
                .any(|(name, count)| *name == var && *count == 1);
            if !reads_loop_state && single_definition {
                return Some((header, header + 1 + offset));
            }
        }
    }
    None
}

/// `MUL x, 2` becomes `ADD x, x` on the same operands.
fn strength_reduction(code: &mut IrCode) {
    for instr in code.iter_mut() {
        if instr.op == OpCode::Mul && instr.arg2 == "2" {
            instr.op = OpCode::Add;
            instr.arg2 = instr.arg1.clone();
        }
    }
}

/// Duplicates a small loop body once before the backward branch. The copy
/// includes the loop's own exit test, so iteration semantics are kept; a
/// body that defines a label cannot be duplicated without breaking the
/// unique-label invariant and is left alone.
fn unroll_small_loops(mut code: IrCode) -> IrCode {
    let mut loops = find_loops(&code);
    loops.sort_by_key(|&(_, branch)| std::cmp::Reverse(branch));
    let unrollable = |body: &[Instruction]| {
        body.len() <= 5
            && !body.is_empty()
            && body.iter().all(|i| {
                !i.is_label() && !matches!(i.op, OpCode::FunctionBegin | OpCode::FunctionEnd)
            })
    };

    for (header, branch) in loops {
        let body: Vec<Instruction> = code[header + 1..branch].to_vec();
        if unrollable(&body) {
            code.splice(branch..branch, body);
        }
    }
    code
}

/// `CALL t, f, n` immediately followed by `RETURN _, t` becomes `GOTO f`;
/// the return is dropped.
fn rewrite_tail_calls(code: IrCode) -> IrCode {
    let mut out = IrCode::with_capacity(code.len());
    let mut iter = code.into_iter().peekable();

    while let Some(instr) = iter.next() {
        let tail_position = instr.is_call()
            && !instr.result.is_empty()
            && iter
                .peek()
                .is_some_and(|next| next.op == OpCode::Return && next.arg1 == instr.result);
        if tail_position {
            let line = instr.line;
            out.push(Instruction::new(OpCode::Goto, instr.arg1, "", "").with_line(line));
            iter.next();
        } else {
            out.push(instr);
        }
    }
    out
}

/// Swaps adjacent independent pure instructions, keeping a plain `ASSIGN`
/// load ahead of arithmetic. Control flow, call sequences and memory
/// operations are never reordered.
fn schedule(mut code: IrCode) -> IrCode {
    let mut i = 0;
    while i + 1 < code.len() {
        if can_swap(&code[i], &code[i + 1]) && wants_swap(&code[i], &code[i + 1]) {
            code.swap(i, i + 1);
            i += 2;
        } else {
            i += 1;
        }
    }
    code
}

fn can_swap(first: &Instruction, second: &Instruction) -> bool {
    if !first.op.is_pure() || !second.op.is_pure() {
        return false;
    }
    let independent = |a: &Instruction, b: &Instruction| {
        let Some(defined) = a.defined_var() else {
            return true;
        };
        b.used_vars().iter().all(|v| *v != defined) && b.defined_var() != Some(defined)
    };
    independent(first, second) && independent(second, first)
}

fn wants_swap(first: &Instruction, second: &Instruction) -> bool {
    // keep a load ahead of arithmetic
    !(first.op == OpCode::Assign && second.op.is_arithmetic())
}
