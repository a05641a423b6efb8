//! IR to x86_64 assembly, Intel syntax, through a line-oriented sink.
//!
//! Every value lives in its stack slot between IR instructions; registers
//! are scratch space within one instruction and return to the allocator
//! immediately. Frame map and allocator state are per function and reset at
//! every `FUNCTION_BEGIN`.

mod frame;
mod regalloc;

use crate::emission::{self, AsmLine};
use crate::ir::{is_literal, Instruction, OpCode};
use crate::irgen::{FunctionLayout, Lowered};
use std::collections::HashSet;

pub use frame::{Frame, Slot};
pub use regalloc::{Register, RegisterAllocator, Spill};

/// Generates the complete assembly module: program header, runtime stubs,
/// one body per function, and the data section.
pub fn generate(lowered: &Lowered) -> Vec<AsmLine> {
    let globals: HashSet<String> = lowered.globals.iter().map(|(name, _)| name.clone()).collect();

    let mut out = emission::program_header();
    emission::runtime_stubs(&mut out);

    for region in function_regions(&lowered.code) {
        let layout = region_name(region)
            .and_then(|name| lowered.layouts.get(name))
            .cloned()
            .unwrap_or_default();
        FunctionEmitter::new(region, &layout, &globals).run(&mut out);
    }

    emission::data_section(&mut out, &lowered.globals);
    out
}

fn region_name(region: &[Instruction]) -> Option<&str> {
    region
        .first()
        .filter(|i| i.op == OpCode::FunctionBegin)
        .map(|i| i.result.as_str())
}

fn function_regions(code: &[Instruction]) -> Vec<&[Instruction]> {
    let mut starts: Vec<usize> = code
        .iter()
        .enumerate()
        .filter(|(_, i)| i.op == OpCode::FunctionBegin)
        .map(|(i, _)| i)
        .collect();
    if starts.first() != Some(&0) && !code.is_empty() {
        starts.insert(0, 0);
    }

    let mut regions = Vec::with_capacity(starts.len());
    for (n, &start) in starts.iter().enumerate() {
        let end = starts.get(n + 1).copied().unwrap_or(code.len());
        regions.push(&code[start..end]);
    }
    regions
}

struct FunctionEmitter<'a> {
    region: &'a [Instruction],
    frame: Frame,
    regs: RegisterAllocator,
}

impl<'a> FunctionEmitter<'a> {
    fn new(region: &'a [Instruction], layout: &FunctionLayout, globals: &HashSet<String>) -> Self {
        let frame = Frame::build(region, layout, globals);
        let regs = RegisterAllocator::new(frame.spill_base());
        Self {
            region,
            frame,
            regs,
        }
    }

    fn run(mut self, out: &mut Vec<AsmLine>) {
        for instr in self.region {
            out.push(AsmLine::Comment(format!("IR: {instr}")));
            self.emit(instr, out);
        }
    }

    fn ins(&self, out: &mut Vec<AsmLine>, text: String) {
        out.push(AsmLine::Ins(text));
    }

    /// Assembly form of a source operand: literals pass through verbatim,
    /// names address their slot.
    fn operand(&self, name: &str) -> String {
        if is_literal(name) {
            name.to_owned()
        } else {
            self.frame.operand(name)
        }
    }

    fn scratch(&mut self, out: &mut Vec<AsmLine>) -> Register {
        let (register, spill) = self.regs.allocate();
        if let Some(spill) = spill {
            self.ins(
                out,
                format!("mov {}, {}", frame::rbp_slot(spill.offset), spill.register),
            );
        }
        register
    }

    fn load(&mut self, out: &mut Vec<AsmLine>, name: &str) -> Register {
        let register = self.scratch(out);
        let source = self.operand(name);
        self.ins(out, format!("mov {register}, {source}"));
        register
    }

    fn store(&self, out: &mut Vec<AsmLine>, name: &str, register: Register) {
        let target = self.frame.operand(name);
        self.ins(out, format!("mov {target}, {register}"));
    }

    fn emit(&mut self, instr: &Instruction, out: &mut Vec<AsmLine>) {
        match instr.op {
            OpCode::Add | OpCode::Sub | OpCode::Mul => self.emit_arithmetic(instr, out),
            OpCode::Div | OpCode::Mod => self.emit_division(instr, out),
            OpCode::Eq | OpCode::Ne | OpCode::Lt | OpCode::Le | OpCode::Gt | OpCode::Ge => {
                self.emit_comparison(instr, out)
            }
            OpCode::And | OpCode::Or => self.emit_logical(instr, out),
            OpCode::Not => self.emit_not(instr, out),
            OpCode::Assign | OpCode::Copy => {
                let value = self.load(out, &instr.arg1);
                self.store(out, &instr.result, value);
                self.regs.free(value);
            }
            OpCode::Goto => self.ins(out, format!("jmp {}", instr.result)),
            OpCode::IfFalse | OpCode::IfTrue => {
                let condition = self.load(out, &instr.arg1);
                self.ins(out, format!("test {condition}, {condition}"));
                let jump = if instr.op == OpCode::IfFalse { "jz" } else { "jnz" };
                self.ins(out, format!("{jump} {}", instr.result));
                self.regs.free(condition);
            }
            OpCode::Param => {
                let value = self.load(out, &instr.arg1);
                self.ins(out, format!("push {value}"));
                self.regs.free(value);
            }
            OpCode::Call => self.emit_call(instr, out),
            OpCode::Return => {
                if !instr.arg1.is_empty() {
                    let source = self.operand(&instr.arg1);
                    self.ins(out, format!("mov rax, {source}"));
                }
                self.emit_epilogue(out);
            }
            OpCode::ArrayAccess => self.emit_array_access(instr, out),
            OpCode::ArrayAssign => self.emit_array_assign(instr, out),
            OpCode::Label => out.push(AsmLine::Label(instr.result.clone())),
            OpCode::FunctionBegin => self.emit_prologue(instr, out),
            OpCode::FunctionEnd => self.emit_epilogue(out),
            OpCode::Nop => (),
            OpCode::Halt => {
                self.ins(out, "mov rdi, 0".to_owned());
                self.ins(out, "mov rax, 60".to_owned());
                self.ins(out, "syscall".to_owned());
            }
        }
    }

    fn emit_arithmetic(&mut self, instr: &Instruction, out: &mut Vec<AsmLine>) {
        let lhs = self.load(out, &instr.arg1);
        let rhs = self.load(out, &instr.arg2);
        let mnemonic = match instr.op {
            OpCode::Add => "add",
            OpCode::Sub => "sub",
            OpCode::Mul => "imul",
            _ => unreachable!(),
        };
        self.ins(out, format!("{mnemonic} {lhs}, {rhs}"));
        self.store(out, &instr.result, lhs);
        self.regs.free(rhs);
        self.regs.free(lhs);
    }

    /// `idiv` takes the dividend in `rdx:rax`; `cqo` sign-extends before
    /// the divide, then the quotient lands in `rax` and the remainder in
    /// `rdx`.
    fn emit_division(&mut self, instr: &Instruction, out: &mut Vec<AsmLine>) {
        let lhs = self.load(out, &instr.arg1);
        let rhs = self.load(out, &instr.arg2);
        self.ins(out, format!("mov rax, {lhs}"));
        self.ins(out, "cqo".to_owned());
        self.ins(out, format!("idiv {rhs}"));
        let result = if instr.op == OpCode::Div { "rax" } else { "rdx" };
        self.ins(out, format!("mov {lhs}, {result}"));
        self.store(out, &instr.result, lhs);
        self.regs.free(rhs);
        self.regs.free(lhs);
    }

    fn emit_comparison(&mut self, instr: &Instruction, out: &mut Vec<AsmLine>) {
        let lhs = self.load(out, &instr.arg1);
        let rhs = self.load(out, &instr.arg2);
        self.ins(out, format!("cmp {lhs}, {rhs}"));
        let set = match instr.op {
            OpCode::Eq => "sete",
            OpCode::Ne => "setne",
            OpCode::Lt => "setl",
            OpCode::Le => "setle",
            OpCode::Gt => "setg",
            OpCode::Ge => "setge",
            _ => unreachable!(),
        };
        self.ins(out, format!("{set} al"));
        self.ins(out, format!("movzx {lhs}, al"));
        self.store(out, &instr.result, lhs);
        self.regs.free(rhs);
        self.regs.free(lhs);
    }

    /// `&&` and `||` normalize both operands to 0/1 first; the source
    /// language gives them no short-circuit semantics.
    fn emit_logical(&mut self, instr: &Instruction, out: &mut Vec<AsmLine>) {
        let lhs = self.load(out, &instr.arg1);
        let rhs = self.load(out, &instr.arg2);
        self.ins(out, format!("test {lhs}, {lhs}"));
        self.ins(out, "setne al".to_owned());
        self.ins(out, format!("movzx {lhs}, al"));
        self.ins(out, format!("test {rhs}, {rhs}"));
        self.ins(out, "setne al".to_owned());
        self.ins(out, format!("movzx {rhs}, al"));
        let mnemonic = if instr.op == OpCode::And { "and" } else { "or" };
        self.ins(out, format!("{mnemonic} {lhs}, {rhs}"));
        self.store(out, &instr.result, lhs);
        self.regs.free(rhs);
        self.regs.free(lhs);
    }

    fn emit_not(&mut self, instr: &Instruction, out: &mut Vec<AsmLine>) {
        let value = self.load(out, &instr.arg1);
        self.ins(out, format!("test {value}, {value}"));
        self.ins(out, "sete al".to_owned());
        self.ins(out, format!("movzx {value}, al"));
        self.store(out, &instr.result, value);
        self.regs.free(value);
    }

    fn emit_call(&mut self, instr: &Instruction, out: &mut Vec<AsmLine>) {
        self.ins(out, format!("call {}", instr.arg1));
        let arity: i64 = instr
            .arg2
            .parse()
            .unwrap_or_else(|_| panic!("internal error: bad call arity '{}'", instr.arg2));
        if arity > 0 {
            self.ins(out, format!("add rsp, {}", 8 * arity));
        }
        if !instr.result.is_empty() {
            let target = self.frame.operand(&instr.result);
            self.ins(out, format!("mov {target}, rax"));
        }
    }

    fn emit_array_access(&mut self, instr: &Instruction, out: &mut Vec<AsmLine>) {
        let base = self.load(out, &instr.arg1);
        let index = self.load(out, &instr.arg2);
        self.ins(out, format!("mov {base}, [{base} + {index}*8]"));
        self.store(out, &instr.result, base);
        self.regs.free(index);
        self.regs.free(base);
    }

    fn emit_array_assign(&mut self, instr: &Instruction, out: &mut Vec<AsmLine>) {
        let base = self.load(out, &instr.result);
        let index = self.load(out, &instr.arg1);
        let value = self.load(out, &instr.arg2);
        self.ins(out, format!("mov [{base} + {index}*8], {value}"));
        self.regs.free(value);
        self.regs.free(index);
        self.regs.free(base);
    }

    fn emit_prologue(&mut self, instr: &Instruction, out: &mut Vec<AsmLine>) {
        out.push(AsmLine::Blank);
        out.push(AsmLine::Label(instr.result.clone()));
        self.ins(out, "push rbp".to_owned());
        self.ins(out, "mov rbp, rsp".to_owned());
        self.ins(out, format!("sub rsp, {}", self.frame.size()));
        // local arrays: park each block's address in the variable's slot
        for (_, slot_offset, block_offset) in self.frame.array_blocks().to_vec() {
            self.ins(out, format!("lea rax, [rbp-{}]", -block_offset));
            self.ins(out, format!("mov {}, rax", frame::rbp_slot(slot_offset)));
        }
    }

    fn emit_epilogue(&self, out: &mut Vec<AsmLine>) {
        self.ins(out, "mov rsp, rbp".to_owned());
        self.ins(out, "pop rbp".to_owned());
        self.ins(out, "ret".to_owned());
    }
}
