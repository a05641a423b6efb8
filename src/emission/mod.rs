//! Assembly text rendering: the line model, the program framing around the
//! generated functions, and the hand-written runtime stubs for the
//! `input`/`output` intrinsics.
//!
//! Output targets the GNU assembler in Intel syntax. The module is
//! freestanding: `_start` calls `main` and exits through the `exit`
//! syscall with its return value, so no libc is linked.

use std::fmt;

/// One line of the output file.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum AsmLine {
    Ins(String),
    Label(String),
    Comment(String),
    Blank,
}

impl fmt::Display for AsmLine {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Ins(text) => write!(f, "    {text}"),
            Self::Label(name) => write!(f, "{name}:"),
            Self::Comment(text) => write!(f, "    # {text}"),
            Self::Blank => Ok(()),
        }
    }
}

pub fn render(lines: &[AsmLine]) -> String {
    let mut text = String::new();
    for line in lines {
        text.push_str(&line.to_string());
        text.push('\n');
    }
    text
}

fn ins(out: &mut Vec<AsmLine>, text: &str) {
    out.push(AsmLine::Ins(text.to_owned()));
}

fn label(out: &mut Vec<AsmLine>, name: &str) {
    out.push(AsmLine::Label(name.to_owned()));
}

/// Directives and the `_start` entry: call `main`, hand its value to the
/// `exit` syscall.
pub fn program_header() -> Vec<AsmLine> {
    let mut out = Vec::new();
    ins(&mut out, ".intel_syntax noprefix");
    ins(&mut out, ".global _start");
    out.push(AsmLine::Blank);
    ins(&mut out, ".section .text");
    out.push(AsmLine::Blank);
    label(&mut out, "_start");
    ins(&mut out, "call main");
    ins(&mut out, "mov rdi, rax");
    ins(&mut out, "mov rax, 60");
    ins(&mut out, "syscall");
    out.push(AsmLine::Blank);
    out
}

/// The `.data` section: the I/O buffers plus one cell per global variable.
/// A global array gets a storage block and its cell holds the block's
/// address, so generated code loads every global the same way. The `.`
/// in the block label keeps it out of the source identifier namespace.
pub fn data_section(out: &mut Vec<AsmLine>, globals: &[(String, i64)]) {
    out.push(AsmLine::Blank);
    ins(out, ".section .data");
    label(out, "input_buffer");
    ins(out, ".space 16");
    label(out, "output_buffer");
    ins(out, ".space 16");
    for (name, cells) in globals {
        if *cells == 1 {
            label(out, name);
            ins(out, ".quad 0");
        } else {
            label(out, &format!("{name}.block"));
            ins(out, &format!(".space {}", 8 * cells));
            label(out, name);
            ins(out, &format!(".quad {name}.block"));
        }
    }
}

/// The runtime: `input` reads a line from stdin and converts it, `output`
/// prints a number and a newline, over minimal `atoi`/`itoa` helpers. All
/// four follow the compiler's own stack convention, so compiled code calls
/// them like any other function.
pub fn runtime_stubs(out: &mut Vec<AsmLine>) {
    // int input(void)
    label(out, "input");
    ins(out, "push rbp");
    ins(out, "mov rbp, rsp");
    ins(out, "mov rax, 0");
    ins(out, "mov rdi, 0");
    ins(out, "lea rsi, [input_buffer]");
    ins(out, "mov rdx, 16");
    ins(out, "syscall");
    ins(out, "lea rdi, [input_buffer]");
    ins(out, "call atoi");
    ins(out, "mov rsp, rbp");
    ins(out, "pop rbp");
    ins(out, "ret");
    out.push(AsmLine::Blank);

    // void output(int): argument at [rbp+16] per the stack convention
    label(out, "output");
    ins(out, "push rbp");
    ins(out, "mov rbp, rsp");
    ins(out, "mov rdi, [rbp+16]");
    ins(out, "lea rsi, [output_buffer]");
    ins(out, "call itoa");
    ins(out, "mov rsi, rax");
    ins(out, "mov rax, 1");
    ins(out, "mov rdi, 1");
    ins(out, "syscall");
    ins(out, "mov rsp, rbp");
    ins(out, "pop rbp");
    ins(out, "ret");
    out.push(AsmLine::Blank);

    // atoi(rdi = buffer) -> rax; stops at the first non-digit
    label(out, "atoi");
    ins(out, "push rbp");
    ins(out, "mov rbp, rsp");
    ins(out, "xor rax, rax");
    ins(out, "xor rcx, rcx");
    ins(out, "movzx rdx, byte ptr [rdi]");
    ins(out, "cmp rdx, 45");
    ins(out, "jne atoi_loop");
    ins(out, "inc rcx");
    label(out, "atoi_loop");
    ins(out, "movzx rdx, byte ptr [rdi + rcx]");
    ins(out, "cmp rdx, 48");
    ins(out, "jl atoi_done");
    ins(out, "cmp rdx, 57");
    ins(out, "jg atoi_done");
    ins(out, "sub rdx, 48");
    ins(out, "imul rax, 10");
    ins(out, "add rax, rdx");
    ins(out, "inc rcx");
    ins(out, "jmp atoi_loop");
    label(out, "atoi_done");
    ins(out, "movzx rdx, byte ptr [rdi]");
    ins(out, "cmp rdx, 45");
    ins(out, "jne atoi_ret");
    ins(out, "neg rax");
    label(out, "atoi_ret");
    ins(out, "mov rsp, rbp");
    ins(out, "pop rbp");
    ins(out, "ret");
    out.push(AsmLine::Blank);

    // itoa(rdi = value, rsi = 16-byte buffer) -> rax = start, rdx = length;
    // digits fill from the buffer's end, newline last
    label(out, "itoa");
    ins(out, "push rbp");
    ins(out, "mov rbp, rsp");
    ins(out, "mov rax, rdi");
    ins(out, "mov r8, 0");
    ins(out, "cmp rax, 0");
    ins(out, "jge itoa_digits");
    ins(out, "neg rax");
    ins(out, "mov r8, 1");
    label(out, "itoa_digits");
    ins(out, "mov rcx, 15");
    ins(out, "mov byte ptr [rsi + rcx], 10");
    ins(out, "mov r9, 10");
    label(out, "itoa_loop");
    ins(out, "dec rcx");
    ins(out, "xor rdx, rdx");
    ins(out, "div r9");
    ins(out, "add rdx, 48");
    ins(out, "mov [rsi + rcx], dl");
    ins(out, "test rax, rax");
    ins(out, "jnz itoa_loop");
    ins(out, "cmp r8, 0");
    ins(out, "je itoa_sign_done");
    ins(out, "dec rcx");
    ins(out, "mov byte ptr [rsi + rcx], 45");
    label(out, "itoa_sign_done");
    ins(out, "lea rax, [rsi + rcx]");
    ins(out, "mov rdx, 16");
    ins(out, "sub rdx, rcx");
    ins(out, "mov rsp, rbp");
    ins(out, "pop rbp");
    ins(out, "ret");
    out.push(AsmLine::Blank);
}
