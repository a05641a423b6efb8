//! Basic-block partitioning and the control-flow graph.
//!
//! Block starts are the first instruction, every `LABEL`, and every
//! instruction after a branch, a `RETURN` or a function marker. A
//! synthetic exit block is always present: every `RETURN` block gets an
//! edge to it, and so does the final block when it does not end in a
//! `RETURN`.

use crate::ir::{Instruction, IrCode, OpCode};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::fmt;

#[derive(Debug)]
pub struct BasicBlock {
    pub id: usize,
    /// Set iff the block's first instruction is a `LABEL`.
    pub label: Option<String>,
    pub instructions: Vec<Instruction>,
    pub predecessors: BTreeSet<usize>,
    pub successors: BTreeSet<usize>,
    /// Index of the block's first instruction in the source sequence.
    pub start: usize,
}

impl BasicBlock {
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn last_instruction(&self) -> Option<&Instruction> {
        self.instructions.last()
    }
}

#[derive(Debug)]
pub struct ControlFlowGraph {
    pub blocks: Vec<BasicBlock>,
    pub entry: usize,
    /// The synthetic exit block; it holds no instructions.
    pub exit: usize,
    label_index: HashMap<String, usize>,
}

impl ControlFlowGraph {
    pub fn build(code: &[Instruction]) -> Self {
        let mut starts = BTreeSet::new();
        if !code.is_empty() {
            starts.insert(0);
        }
        for (i, instr) in code.iter().enumerate() {
            if instr.is_label() {
                starts.insert(i);
            }
            let splits_after = instr.is_branch()
                || matches!(
                    instr.op,
                    OpCode::Return | OpCode::FunctionBegin | OpCode::FunctionEnd
                );
            if splits_after && i + 1 < code.len() {
                starts.insert(i + 1);
            }
        }

        let starts: Vec<usize> = starts.into_iter().collect();
        let mut blocks = Vec::with_capacity(starts.len() + 1);
        let mut label_index = HashMap::new();

        for (id, &start) in starts.iter().enumerate() {
            let end = starts.get(id + 1).copied().unwrap_or(code.len());
            let instructions: Vec<Instruction> = code[start..end].to_vec();
            let label = instructions
                .first()
                .filter(|i| i.is_label())
                .map(|i| i.result.clone());
            if let Some(name) = &label {
                let previous = label_index.insert(name.clone(), id);
                assert!(
                    previous.is_none(),
                    "internal error: duplicate label {name}"
                );
            }
            blocks.push(BasicBlock {
                id,
                label,
                instructions,
                predecessors: BTreeSet::new(),
                successors: BTreeSet::new(),
                start,
            });
        }

        let exit = blocks.len();
        blocks.push(BasicBlock {
            id: exit,
            label: None,
            instructions: Vec::new(),
            predecessors: BTreeSet::new(),
            successors: BTreeSet::new(),
            start: code.len(),
        });

        let mut cfg = Self {
            blocks,
            entry: 0,
            exit,
            label_index,
        };
        cfg.connect_blocks();
        cfg
    }

    fn connect_blocks(&mut self) {
        let mut edges: Vec<(usize, usize)> = Vec::new();
        let exit = self.exit;

        for block in &self.blocks[..exit] {
            let id = block.id;
            let fall_through = if id + 1 < exit { id + 1 } else { exit };

            match block.last_instruction() {
                Some(last) if last.op == OpCode::Goto => {
                    // an unknown target degrades to fall-through reachability
                    match self.label_index.get(&last.result) {
                        Some(&target) => edges.push((id, target)),
                        None => edges.push((id, fall_through)),
                    }
                }
                Some(last) if last.is_branch() => {
                    if let Some(&target) = self.label_index.get(&last.result) {
                        edges.push((id, target));
                    }
                    edges.push((id, fall_through));
                }
                Some(last) if last.op == OpCode::Return => edges.push((id, exit)),
                _ => edges.push((id, fall_through)),
            }
        }

        for (from, to) in edges {
            self.blocks[from].successors.insert(to);
            self.blocks[to].predecessors.insert(from);
        }
    }

    pub fn block_of_label(&self, label: &str) -> Option<usize> {
        self.label_index.get(label).copied()
    }

    pub fn reachable_from_entry(&self) -> BTreeSet<usize> {
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::new();
        if !self.blocks.is_empty() {
            seen.insert(self.entry);
            queue.push_back(self.entry);
        }
        while let Some(id) = queue.pop_front() {
            for &next in &self.blocks[id].successors {
                if seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        seen
    }

    pub fn is_reachable(&self, from: usize, to: usize) -> bool {
        if from == to {
            return true;
        }
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::from([from]);
        seen.insert(from);
        while let Some(id) = queue.pop_front() {
            for &next in &self.blocks[id].successors {
                if next == to {
                    return true;
                }
                if seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        false
    }

    /// Blocks in depth-first postorder from the entry; unreachable blocks
    /// are absent.
    pub fn postorder(&self) -> Vec<usize> {
        let mut order = Vec::new();
        let mut seen = BTreeSet::new();
        self.postorder_from(self.entry, &mut seen, &mut order);
        order
    }

    fn postorder_from(&self, id: usize, seen: &mut BTreeSet<usize>, order: &mut Vec<usize>) {
        if !seen.insert(id) {
            return;
        }
        for &next in &self.blocks[id].successors {
            self.postorder_from(next, seen, order);
        }
        order.push(id);
    }

    pub fn reverse_postorder(&self) -> Vec<usize> {
        let mut order = self.postorder();
        order.reverse();
        order
    }

    pub fn to_dot(&self) -> String {
        let mut dot = String::from("digraph CFG {\n  node [shape=box];\n");
        for block in &self.blocks {
            let label = block
                .label
                .as_deref()
                .map(|l| format!("\\n{l}"))
                .unwrap_or_default();
            dot.push_str(&format!("  {} [label=\"Block {}{}\"];\n", block.id, block.id, label));
            for succ in &block.successors {
                dot.push_str(&format!("  {} -> {};\n", block.id, succ));
            }
        }
        dot.push_str("}\n");
        dot
    }
}

impl fmt::Display for ControlFlowGraph {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "entry: {}, exit: {}", self.entry, self.exit)?;
        for block in &self.blocks {
            write!(f, "block {}", block.id)?;
            if let Some(label) = &block.label {
                write!(f, " ({label})")?;
            }
            writeln!(f, ":")?;
            for instr in &block.instructions {
                writeln!(f, "  {instr}")?;
            }
            let preds: Vec<String> = block.predecessors.iter().map(ToString::to_string).collect();
            let succs: Vec<String> = block.successors.iter().map(ToString::to_string).collect();
            writeln!(f, "  preds: [{}]  succs: [{}]", preds.join(", "), succs.join(", "))?;
        }
        Ok(())
    }
}

/// Removes instructions in blocks a breadth-first walk from the entry never
/// reaches. Function markers survive regardless: they delimit the region
/// even when the walk cannot reach them.
pub fn eliminate_unreachable(code: IrCode) -> IrCode {
    if code.is_empty() {
        return code;
    }
    let cfg = ControlFlowGraph::build(&code);
    let reachable = cfg.reachable_from_entry();

    let mut keep = vec![false; code.len()];
    for block in &cfg.blocks {
        if reachable.contains(&block.id) {
            for offset in 0..block.instructions.len() {
                keep[block.start + offset] = true;
            }
        }
    }

    code.into_iter()
        .enumerate()
        .filter(|(i, instr)| {
            keep[*i] || matches!(instr.op, OpCode::FunctionBegin | OpCode::FunctionEnd)
        })
        .map(|(_, instr)| instr)
        .collect()
}
