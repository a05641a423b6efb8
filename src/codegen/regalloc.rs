use std::collections::{HashMap, VecDeque};
use std::fmt;

/// General-purpose registers the allocator may hand out. `rsp`/`rbp` frame
/// the stack, `rax` carries return values and division results, and `rdx`
/// is the upper half of the `cqo`/`idiv` pair, so none of them are pooled.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Register {
    Rcx,
    Rsi,
    Rdi,
    R8,
    R9,
    R10,
    R11,
    Rbx,
    R12,
    R13,
    R14,
    R15,
}

impl Register {
    /// Caller-saved first, callee-saved after: the caller-saved half needs
    /// no prologue bookkeeping, so it drains first.
    pub const POOL: [Self; 12] = [
        Self::Rcx,
        Self::Rsi,
        Self::Rdi,
        Self::R8,
        Self::R9,
        Self::R10,
        Self::R11,
        Self::Rbx,
        Self::R12,
        Self::R13,
        Self::R14,
        Self::R15,
    ];
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::Rcx => "rcx",
            Self::Rsi => "rsi",
            Self::Rdi => "rdi",
            Self::R8 => "r8",
            Self::R9 => "r9",
            Self::R10 => "r10",
            Self::R11 => "r11",
            Self::Rbx => "rbx",
            Self::R12 => "r12",
            Self::R13 => "r13",
            Self::R14 => "r14",
            Self::R15 => "r15",
        };
        write!(f, "{s}")
    }
}

/// A spill decision made while allocating: the caller must store
/// `register` to `offset(%rbp)` before reusing it.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Spill {
    pub temp: String,
    pub register: Register,
    pub offset: i64,
}

/// Linear register allocator for one code-generation session. State resets
/// at every function boundary; stale bindings would alias distinct frames.
#[derive(Debug)]
pub struct RegisterAllocator {
    free: VecDeque<Register>,
    /// Allocation order; the victim search walks from the front.
    used: Vec<Register>,
    bindings: HashMap<String, Register>,
    spilled: HashMap<String, i64>,
    next_spill_offset: i64,
}

impl RegisterAllocator {
    /// `spill_base` is the first free `rbp`-relative slot below the
    /// function's variables.
    pub fn new(spill_base: i64) -> Self {
        Self {
            free: Register::POOL.into_iter().collect(),
            used: Vec::new(),
            bindings: HashMap::new(),
            spilled: HashMap::new(),
            next_spill_offset: spill_base,
        }
    }

    /// Pops a free register, spilling a victim when the queue is empty.
    pub fn allocate(&mut self) -> (Register, Option<Spill>) {
        if let Some(register) = self.free.pop_front() {
            self.used.push(register);
            return (register, None);
        }
        let spill = self.spill_victim();
        let register = spill.register;
        self.used.push(register);
        (register, Some(spill))
    }

    /// Memoizing variant: a temporary keeps its register across calls.
    pub fn allocate_for(&mut self, temp: &str) -> (Register, Option<Spill>) {
        if let Some(&register) = self.bindings.get(temp) {
            return (register, None);
        }
        let (register, spill) = self.allocate();
        self.bindings.insert(temp.to_owned(), register);
        (register, spill)
    }

    /// Returns a register to the queue and drops any temporary bound to it.
    pub fn free(&mut self, register: Register) {
        let Some(position) = self.used.iter().position(|&r| r == register) else {
            return;
        };
        self.used.remove(position);
        self.bindings.retain(|_, bound| *bound != register);
        self.free.push_back(register);
    }

    /// The victim is the oldest register still bound to some temporary.
    fn spill_victim(&mut self) -> Spill {
        let victim = self
            .used
            .iter()
            .copied()
            .find(|r| self.bindings.values().any(|bound| bound == r))
            .unwrap_or_else(|| panic!("internal error: register allocator exhausted"));

        let temp = self
            .bindings
            .iter()
            .find(|(_, bound)| **bound == victim)
            .map(|(temp, _)| temp.clone())
            .expect("victim is bound");

        let offset = self.next_spill_offset;
        self.next_spill_offset -= 8;
        self.spilled.insert(temp.clone(), offset);
        self.bindings.remove(&temp);
        let position = self
            .used
            .iter()
            .position(|&r| r == victim)
            .expect("victim is in use");
        self.used.remove(position);

        Spill {
            temp,
            register: victim,
            offset,
        }
    }

    pub fn binding(&self, temp: &str) -> Option<Register> {
        self.bindings.get(temp).copied()
    }

    pub fn spill_slot(&self, temp: &str) -> Option<i64> {
        self.spilled.get(temp).copied()
    }

    pub fn free_count(&self) -> usize {
        self.free.len()
    }
}
