//! The iterate-to-fixed-point dataflow framework and the passes it drives.
//!
//! All three analyses work at instruction granularity over one function
//! region. Successors follow the textual order except at branches
//! (`GOTO` jumps, `IF_*` forks) and at `RETURN`/`FUNCTION_END`/`HALT`,
//! which end the path.
//!
//! | analysis              | direction | meet      |
//! |-----------------------|-----------|-----------|
//! | reaching definitions  | forward   | union     |
//! | liveness              | backward  | union     |
//! | available expressions | forward   | intersect |

use crate::ir::{Instruction, IrCode, OpCode};
use std::collections::{HashMap, HashSet};

fn label_index(code: &[Instruction]) -> HashMap<&str, usize> {
    code.iter()
        .enumerate()
        .filter(|(_, i)| i.is_label())
        .map(|(idx, i)| (i.result.as_str(), idx))
        .collect()
}

/// Instruction-level successor sets. An unknown branch target degrades to
/// the textual successor.
fn successors(code: &[Instruction]) -> Vec<Vec<usize>> {
    let labels = label_index(code);
    code.iter()
        .enumerate()
        .map(|(i, instr)| {
            let next = (i + 1 < code.len()).then_some(i + 1);
            match instr.op {
                OpCode::Return | OpCode::FunctionEnd | OpCode::Halt => Vec::new(),
                OpCode::Goto => match labels.get(instr.result.as_str()) {
                    Some(&target) => vec![target],
                    None => next.into_iter().collect(),
                },
                OpCode::IfFalse | OpCode::IfTrue => {
                    let mut succ: Vec<usize> = next.into_iter().collect();
                    if let Some(&target) = labels.get(instr.result.as_str()) {
                        if !succ.contains(&target) {
                            succ.push(target);
                        }
                    }
                    succ
                }
                _ => next.into_iter().collect(),
            }
        })
        .collect()
}

fn predecessors(successors: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let mut preds = vec![Vec::new(); successors.len()];
    for (from, succ) in successors.iter().enumerate() {
        for &to in succ {
            preds[to].push(from);
        }
    }
    preds
}

/// Per-instruction `in`/`out` sets of definition sites (instruction
/// indices). `gen` is the instruction itself when it defines a variable;
/// `kill` is every other definition of the same variable.
#[derive(Debug)]
pub struct ReachingDefinitions {
    pub in_sets: Vec<HashSet<usize>>,
    pub out_sets: Vec<HashSet<usize>>,
}

pub fn reaching_definitions(code: &[Instruction]) -> ReachingDefinitions {
    let n = code.len();
    let succ = successors(code);
    let preds = predecessors(&succ);

    let mut defs_of: HashMap<&str, Vec<usize>> = HashMap::new();
    for (i, instr) in code.iter().enumerate() {
        if let Some(var) = instr.defined_var() {
            defs_of.entry(var).or_default().push(i);
        }
    }

    let mut in_sets = vec![HashSet::new(); n];
    let mut out_sets = vec![HashSet::new(); n];

    let mut changed = true;
    while changed {
        changed = false;
        for i in 0..n {
            let mut incoming: HashSet<usize> = HashSet::new();
            for &p in &preds[i] {
                incoming.extend(out_sets[p].iter().copied());
            }

            let mut outgoing = incoming.clone();
            if let Some(var) = code[i].defined_var() {
                for &d in &defs_of[var] {
                    outgoing.remove(&d);
                }
                outgoing.insert(i);
            }

            if incoming != in_sets[i] || outgoing != out_sets[i] {
                in_sets[i] = incoming;
                out_sets[i] = outgoing;
                changed = true;
            }
        }
    }

    ReachingDefinitions { in_sets, out_sets }
}

/// Per-instruction live-variable sets. `gen` is the variables the
/// instruction reads, `kill` the variable it defines; information flows
/// backwards.
#[derive(Debug)]
pub struct Liveness {
    pub live_in: Vec<HashSet<String>>,
    pub live_out: Vec<HashSet<String>>,
}

pub fn liveness(code: &[Instruction]) -> Liveness {
    let n = code.len();
    let succ = successors(code);

    let mut live_in = vec![HashSet::new(); n];
    let mut live_out = vec![HashSet::new(); n];

    let mut changed = true;
    while changed {
        changed = false;
        for i in (0..n).rev() {
            let mut outgoing: HashSet<String> = HashSet::new();
            for &s in &succ[i] {
                outgoing.extend(live_in[s].iter().cloned());
            }

            let mut incoming = outgoing.clone();
            if let Some(var) = code[i].defined_var() {
                incoming.remove(var);
            }
            for used in code[i].used_vars() {
                incoming.insert(used.to_owned());
            }

            if incoming != live_in[i] || outgoing != live_out[i] {
                live_in[i] = incoming;
                live_out[i] = outgoing;
                changed = true;
            }
        }
    }

    Liveness { live_in, live_out }
}

/// A pure computation, keyed by opcode and source operands.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct ExprKey {
    pub op: OpCode,
    pub arg1: String,
    pub arg2: String,
}

fn expr_key(instr: &Instruction) -> Option<ExprKey> {
    let pure_computation =
        instr.op.is_arithmetic() || instr.op.is_comparison() || instr.op.is_logical();
    pure_computation.then(|| ExprKey {
        op: instr.op,
        arg1: instr.arg1.clone(),
        arg2: instr.arg2.clone(),
    })
}

fn key_uses(key: &ExprKey, var: &str) -> bool {
    key.arg1 == var || key.arg2 == var
}

/// Per-instruction available-expression sets: expressions computed on every
/// path to the point whose operands have not been redefined since. `None`
/// stands for the full universe before a point is first reached.
#[derive(Debug)]
pub struct AvailableExpressions {
    pub in_sets: Vec<HashSet<ExprKey>>,
    pub out_sets: Vec<HashSet<ExprKey>>,
}

pub fn available_expressions(code: &[Instruction]) -> AvailableExpressions {
    let n = code.len();
    let succ = successors(code);
    let preds = predecessors(&succ);

    let mut in_sets: Vec<Option<HashSet<ExprKey>>> = vec![None; n];
    let mut out_sets: Vec<Option<HashSet<ExprKey>>> = vec![None; n];
    if n > 0 {
        in_sets[0] = Some(HashSet::new());
    }

    let mut changed = true;
    while changed {
        changed = false;
        for i in 0..n {
            let incoming = if i == 0 || preds[i].is_empty() {
                Some(HashSet::new())
            } else {
                // meet over the predecessors computed so far; a point whose
                // predecessors are all still at top stays at top
                let mut meet: Option<HashSet<ExprKey>> = None;
                for &p in &preds[i] {
                    let Some(out) = &out_sets[p] else {
                        continue;
                    };
                    meet = Some(match meet {
                        None => out.clone(),
                        Some(current) => current.intersection(out).cloned().collect(),
                    });
                }
                meet
            };

            let outgoing = incoming.clone().map(|mut set| {
                if let Some(defined) = code[i].defined_var() {
                    set.retain(|key| !key_uses(key, defined));
                }
                if let Some(key) = expr_key(&code[i]) {
                    let self_invalidating = code[i]
                        .defined_var()
                        .is_some_and(|d| key_uses(&key, d));
                    if !self_invalidating {
                        set.insert(key);
                    }
                }
                set
            });

            if incoming != in_sets[i] || outgoing != out_sets[i] {
                in_sets[i] = incoming;
                out_sets[i] = outgoing;
                changed = true;
            }
        }
    }

    AvailableExpressions {
        in_sets: in_sets.into_iter().map(Option::unwrap_or_default).collect(),
        out_sets: out_sets.into_iter().map(Option::unwrap_or_default).collect(),
    }
}

/// Liveness-driven dead-code elimination: a definition whose variable is
/// not live immediately after it is dropped. The same instruction classes
/// as the read-set sweep are preserved unconditionally.
pub fn eliminate_dead_by_liveness(code: IrCode) -> IrCode {
    let live = liveness(&code);

    code.into_iter()
        .enumerate()
        .filter(|(i, instr)| {
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
                Some(defined) => live.live_out[*i].contains(defined),
                None => true,
            }
        })
        .map(|(_, instr)| instr)
        .collect()
}

/// Replaces a pure computation whose expression is available with a `COPY`
/// from the temporary that computed it, when that temporary still holds the
/// value. Facts are tracked within basic blocks.
pub fn eliminate_redundant_computations(mut code: IrCode) -> IrCode {
    let mut memo: HashMap<ExprKey, String> = HashMap::new();

    for instr in code.iter_mut() {
        let block_boundary = instr.is_label()
            || instr.is_branch()
            || matches!(
                instr.op,
                OpCode::FunctionBegin | OpCode::FunctionEnd | OpCode::Return | OpCode::Call
            );
        if block_boundary {
            memo.clear();
            continue;
        }

        let key = expr_key(instr);
        let defined = instr.defined_var().map(ToOwned::to_owned);

        if let Some(key) = &key {
            if let Some(holder) = memo.get(key) {
                if Some(holder) != defined.as_ref() {
                    let holder = holder.clone();
                    instr.op = OpCode::Copy;
                    instr.arg1 = holder;
                    instr.arg2 = String::new();
                }
            }
        }

        if let Some(defined) = defined {
            memo.retain(|key, holder| !key_uses(key, &defined) && *holder != defined);
            if instr.op != OpCode::Copy {
                if let Some(key) = expr_key(instr) {
                    let self_invalidating = key_uses(&key, &defined);
                    if !self_invalidating {
                        memo.insert(key, defined);
                    }
                }
            }
        }
    }
    code
}
