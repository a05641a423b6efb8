use crate::ir::Instruction;
use crate::irgen::FunctionLayout;
use std::collections::{HashMap, HashSet};

/// Where a name lives for one function.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Slot {
    /// Negative `rbp`-relative offset of a local or temporary.
    Local(i64),
    /// Positive `rbp`-relative offset into the incoming argument area.
    Param(i64),
    /// Absolute data-section cell addressed by name.
    Global,
}

/// Per-function stack frame map, rebuilt at every `FUNCTION_BEGIN`.
///
/// Parameters bind to the caller's pushes: the leftmost argument is pushed
/// last, so it sits closest to the frame at `rbp+16`, right above the saved
/// `rbp` and the return address. Every other name gets a fresh slot at
/// `rbp-8, rbp-16, ...` in first-reference order. Local arrays additionally
/// reserve their element block, and their slot holds the block's address.
#[derive(Debug)]
pub struct Frame {
    slots: HashMap<String, Slot>,
    /// `(name, slot offset, block offset)` per local array, for the
    /// prologue's address stores.
    array_blocks: Vec<(String, i64, i64)>,
    size: i64,
    spill_base: i64,
}

/// The baseline local-variable reservation per function.
const FRAME_FLOOR: i64 = 64;

impl Frame {
    pub fn build(
        region: &[Instruction],
        layout: &FunctionLayout,
        globals: &HashSet<String>,
    ) -> Self {
        let mut slots = HashMap::new();
        for (position, name) in layout.params.iter().enumerate() {
            slots.insert(name.clone(), Slot::Param(16 + 8 * position as i64));
        }

        let mut used = 0i64;
        for instr in region {
            let mut names: Vec<&str> = instr.used_vars();
            if let Some(defined) = instr.defined_var() {
                names.push(defined);
            }
            for name in names {
                if slots.contains_key(name) {
                    continue;
                }
                if globals.contains(name) {
                    slots.insert(name.to_owned(), Slot::Global);
                    continue;
                }
                used += 8;
                slots.insert(name.to_owned(), Slot::Local(-used));
            }
        }

        let mut array_blocks = Vec::new();
        for (name, count) in &layout.arrays {
            let Some(Slot::Local(slot_offset)) = slots.get(name).copied() else {
                // an array the function never touches needs no block
                continue;
            };
            used += 8 * count;
            array_blocks.push((name.clone(), slot_offset, -used));
        }

        let floored = used.max(FRAME_FLOOR);
        let size = ((floored + 15) / 16) * 16;
        Self {
            slots,
            array_blocks,
            size,
            spill_base: -(used + 8),
        }
    }

    /// Renders the addressable form of a non-literal operand.
    pub fn operand(&self, name: &str) -> String {
        match self.slots.get(name) {
            Some(Slot::Local(offset)) | Some(Slot::Param(offset)) => rbp_slot(*offset),
            Some(Slot::Global) => format!("[{name}]"),
            None => panic!("internal error: no slot for operand '{name}'"),
        }
    }

    pub fn slot(&self, name: &str) -> Option<Slot> {
        self.slots.get(name).copied()
    }

    pub fn size(&self) -> i64 {
        self.size
    }

    pub fn spill_base(&self) -> i64 {
        self.spill_base
    }

    pub fn array_blocks(&self) -> &[(String, i64, i64)] {
        &self.array_blocks
    }
}

pub fn rbp_slot(offset: i64) -> String {
    if offset < 0 {
        format!("[rbp-{}]", -offset)
    } else {
        format!("[rbp+{offset}]")
    }
}
