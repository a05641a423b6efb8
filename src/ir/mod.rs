//! The shared three-address code model.
//!
//! Operands are plain strings: a variable name, a generated temporary
//! (`t0, t1, ...`), a label (`L0, L1, ...`), a decimal integer literal, or
//! empty for an unused slot. A literal is recognized by a leading digit,
//! optionally preceded by `-`.

use std::fmt;

pub type IrCode = Vec<Instruction>;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum OpCode {
    // arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    // comparison
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    // logical
    And,
    Or,
    Not,
    // moves
    Assign,
    Copy,
    // control flow
    Goto,
    IfFalse,
    IfTrue,
    // calls
    Param,
    Call,
    Return,
    // arrays
    ArrayAccess,
    ArrayAssign,
    // labels and markers
    Label,
    FunctionBegin,
    FunctionEnd,
    // special
    Nop,
    Halt,
}

impl OpCode {
    pub fn is_arithmetic(&self) -> bool {
        matches!(self, Self::Add | Self::Sub | Self::Mul | Self::Div | Self::Mod)
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            Self::Eq | Self::Ne | Self::Lt | Self::Le | Self::Gt | Self::Ge
        )
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, Self::And | Self::Or | Self::Not)
    }

    /// Value-producing operations without side effects or memory traffic.
    /// These are the only candidates for reordering and hoisting.
    pub fn is_pure(&self) -> bool {
        self.is_arithmetic() || self.is_comparison() || self.is_logical()
            || matches!(self, Self::Assign | Self::Copy)
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::Add => "ADD",
            Self::Sub => "SUB",
            Self::Mul => "MUL",
            Self::Div => "DIV",
            Self::Mod => "MOD",
            Self::Eq => "EQ",
            Self::Ne => "NE",
            Self::Lt => "LT",
            Self::Le => "LE",
            Self::Gt => "GT",
            Self::Ge => "GE",
            Self::And => "AND",
            Self::Or => "OR",
            Self::Not => "NOT",
            Self::Assign => "ASSIGN",
            Self::Copy => "COPY",
            Self::Goto => "GOTO",
            Self::IfFalse => "IF_FALSE",
            Self::IfTrue => "IF_TRUE",
            Self::Param => "PARAM",
            Self::Call => "CALL",
            Self::Return => "RETURN",
            Self::ArrayAccess => "ARRAY_ACCESS",
            Self::ArrayAssign => "ARRAY_ASSIGN",
            Self::Label => "LABEL",
            Self::FunctionBegin => "FUNCTION_BEGIN",
            Self::FunctionEnd => "FUNCTION_END",
            Self::Nop => "NOP",
            Self::Halt => "HALT",
        };
        write!(f, "{s}")
    }
}

/// `true` for a decimal integer literal operand.
pub fn is_literal(operand: &str) -> bool {
    let digits = operand.strip_prefix('-').unwrap_or(operand);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// `true` for a non-empty, non-literal operand, i.e. a name.
pub fn is_var(operand: &str) -> bool {
    !operand.is_empty() && !is_literal(operand)
}

/// One three-address instruction. Unused operand slots hold the empty
/// string; `line` is the source line the instruction was lowered from, 0
/// when unknown.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Instruction {
    pub op: OpCode,
    pub result: String,
    pub arg1: String,
    pub arg2: String,
    pub line: u32,
}

impl Instruction {
    pub fn new(
        op: OpCode,
        result: impl Into<String>,
        arg1: impl Into<String>,
        arg2: impl Into<String>,
    ) -> Self {
        Self {
            op,
            result: result.into(),
            arg1: arg1.into(),
            arg2: arg2.into(),
            line: 0,
        }
    }

    pub fn with_line(mut self, line: u32) -> Self {
        self.line = line;
        self
    }

    pub fn is_branch(&self) -> bool {
        matches!(self.op, OpCode::Goto | OpCode::IfFalse | OpCode::IfTrue)
    }

    pub fn is_label(&self) -> bool {
        self.op == OpCode::Label
    }

    pub fn is_call(&self) -> bool {
        self.op == OpCode::Call
    }

    /// The variable this instruction writes, if any. Stores
    /// (`ARRAY_ASSIGN`) write memory, not a variable, and control-flow
    /// operands are labels, so neither defines anything.
    pub fn defined_var(&self) -> Option<&str> {
        let defines = self.op.is_arithmetic()
            || self.op.is_comparison()
            || self.op.is_logical()
            || matches!(self.op, OpCode::Assign | OpCode::Copy | OpCode::Call | OpCode::ArrayAccess);
        (defines && !self.result.is_empty()).then_some(self.result.as_str())
    }

    /// The variables this instruction reads. The base of an `ARRAY_ASSIGN`
    /// sits in the result slot but is a read; a call's `arg1` is a function
    /// name, not a variable.
    pub fn used_vars(&self) -> Vec<&str> {
        let candidates: [&str; 2] = match self.op {
            OpCode::Goto
            | OpCode::Label
            | OpCode::FunctionBegin
            | OpCode::FunctionEnd
            | OpCode::Call
            | OpCode::Nop
            | OpCode::Halt => ["", ""],
            OpCode::IfFalse | OpCode::IfTrue => [self.arg1.as_str(), ""],
            OpCode::ArrayAssign => {
                let mut used: Vec<&str> = Vec::with_capacity(3);
                for operand in [self.result.as_str(), self.arg1.as_str(), self.arg2.as_str()] {
                    if is_var(operand) {
                        used.push(operand);
                    }
                }
                return used;
            }
            _ => [self.arg1.as_str(), self.arg2.as_str()],
        };
        candidates.into_iter().filter(|s| is_var(s)).collect()
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.op)?;
        let has_args = !self.arg1.is_empty() || !self.arg2.is_empty();
        if !self.result.is_empty() {
            write!(f, " {}", self.result)?;
        } else if has_args {
            write!(f, " _")?;
        }
        if !self.arg1.is_empty() {
            write!(f, ", {}", self.arg1)?;
        }
        if !self.arg2.is_empty() {
            write!(f, ", {}", self.arg2)?;
        }
        Ok(())
    }
}
