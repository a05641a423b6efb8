
use crate::ast::*;
use crate::ir::{Instruction, IrCode, OpCode};
use std::collections::HashMap;

/// Frame facts the code generator cannot recover from the flat IR:
/// parameter names in declaration order and the declared local arrays.
#[derive(Debug, Clone, Default)]
pub struct FunctionLayout {
    pub params: Vec<Identifier>,
    pub arrays: Vec<(Identifier, i64)>,
}

/// The lowered program: the instruction stream plus per-function layouts
/// and the global variables (name and cell count) for the data section.
#[derive(Debug, Default)]
pub struct Lowered {
    pub code: IrCode,
    pub layouts: HashMap<Identifier, FunctionLayout>,
    pub globals: Vec<(Identifier, i64)>,
}

/// Monotone generators for the temporary and label namespaces, scoped to
/// one lowering session.
#[derive(Debug, Default)]
struct NameGen {
    temps: u64,
    labels: u64,
}

impl NameGen {
    fn temp(&mut self) -> String {
        let n = self.temps;
        self.temps += 1;
        format!("t{n}")
    }

    fn label(&mut self) -> String {
        let n = self.labels;
        self.labels += 1;
        format!("L{n}")
    }
}

struct Emitter {
    code: IrCode,
    names: NameGen,
}

impl Emitter {
    fn emit(&mut self, op: OpCode, result: &str, arg1: &str, arg2: &str, line: u32) {
        self.code
            .push(Instruction::new(op, result, arg1, arg2).with_line(line));
    }
}

/// Lowers a validated program to three-address code. Global variable
/// declarations emit no instructions; their storage is a data-section
/// concern recorded in [Lowered::globals].
pub fn generate(program: &Program) -> Lowered {
    let mut emitter = Emitter {
        code: IrCode::new(),
        names: NameGen::default(),
    };
    let mut layouts = HashMap::new();
    let mut globals = Vec::new();

    for decl in &program.declarations {
        match decl {
            Declaration::Var(var) => {
                globals.push((var.name.clone(), var.array_size.unwrap_or(1)));
            }
            Declaration::Fun(fun) => {
                layouts.insert(fun.name.clone(), layout_of(fun));
                emit_function(fun, &mut emitter);
            }
        }
    }

    Lowered {
        code: emitter.code,
        layouts,
        globals,
    }
}

fn layout_of(fun: &FunDecl) -> FunctionLayout {
    let mut layout = FunctionLayout {
        params: fun.params.iter().map(|p| p.name.clone()).collect(),
        arrays: Vec::new(),
    };
    collect_arrays(&fun.body, &mut layout.arrays);
    layout
}

fn collect_arrays(block: &Compound, arrays: &mut Vec<(Identifier, i64)>) {
    for local in &block.locals {
        if let Some(size) = local.array_size {
            arrays.push((local.name.clone(), size));
        }
    }
    for stmt in &block.statements {
        collect_arrays_in_statement(stmt, arrays);
    }
}

fn collect_arrays_in_statement(stmt: &Statement, arrays: &mut Vec<(Identifier, i64)>) {
    match stmt {
        Statement::Compound(block) => collect_arrays(block, arrays),
        Statement::If(if_stmt) => {
            collect_arrays_in_statement(&if_stmt.then_branch, arrays);
            if let Some(els) = &if_stmt.else_branch {
                collect_arrays_in_statement(els, arrays);
            }
        }
        Statement::While(while_stmt) => collect_arrays_in_statement(&while_stmt.body, arrays),
        _ => (),
    }
}

fn emit_function(fun: &FunDecl, emitter: &mut Emitter) {
    let line = fun.loc.line;
    emitter.emit(OpCode::FunctionBegin, &fun.name, "", "", line);
    emit_compound(&fun.body, emitter);
    emitter.emit(OpCode::FunctionEnd, &fun.name, "", "", line);
}

fn emit_compound(block: &Compound, emitter: &mut Emitter) {
    // local declarations reserve no instructions
    for stmt in &block.statements {
        emit_statement(stmt, emitter);
    }
}

fn emit_statement(stmt: &Statement, emitter: &mut Emitter) {
    match stmt {
        Statement::Compound(block) => emit_compound(block, emitter),
        Statement::If(if_stmt) => emit_if(if_stmt, emitter),
        Statement::While(while_stmt) => emit_while(while_stmt, emitter),
        Statement::Return(ret) => emit_return(ret, emitter),
        Statement::Expr(exp) => {
            emit_expression(exp, emitter);
        }
        Statement::Empty => (),
        Statement::Error(loc) => {
            panic!("internal error: error node reached lowering at {loc}")
        }
    }
}

fn emit_if(if_stmt: &IfStmt, emitter: &mut Emitter) {
    let line = if_stmt.condition.loc().line;
    let else_label = emitter.names.label();
    let end_label = emitter.names.label();

    let condition = emit_expression(&if_stmt.condition, emitter);
    emitter.emit(OpCode::IfFalse, &else_label, &condition, "", line);

    emit_statement(&if_stmt.then_branch, emitter);

    if let Some(els) = &if_stmt.else_branch {
        emitter.emit(OpCode::Goto, &end_label, "", "", line);
        emitter.emit(OpCode::Label, &else_label, "", "", line);
        emit_statement(els, emitter);
        emitter.emit(OpCode::Label, &end_label, "", "", line);
    } else {
        // no else: the false edge falls through here
        emitter.emit(OpCode::Label, &else_label, "", "", line);
    }
}

fn emit_while(while_stmt: &WhileStmt, emitter: &mut Emitter) {
    let line = while_stmt.condition.loc().line;
    let top_label = emitter.names.label();
    let end_label = emitter.names.label();

    emitter.emit(OpCode::Label, &top_label, "", "", line);
    let condition = emit_expression(&while_stmt.condition, emitter);
    emitter.emit(OpCode::IfFalse, &end_label, &condition, "", line);

    emit_statement(&while_stmt.body, emitter);

    emitter.emit(OpCode::Goto, &top_label, "", "", line);
    emitter.emit(OpCode::Label, &end_label, "", "", line);
}

fn emit_return(ret: &ReturnStmt, emitter: &mut Emitter) {
    match &ret.expr {
        Some(exp) => {
            let value = emit_expression(exp, emitter);
            emitter.emit(OpCode::Return, "", &value, "", ret.loc.line);
        }
        None => emitter.emit(OpCode::Return, "", "", "", ret.loc.line),
    }
}

/// Lowers an expression and returns the operand holding its value: a
/// literal, a variable name, or a fresh temporary.
fn emit_expression(exp: &Exp, emitter: &mut Emitter) -> String {
    let line = exp.loc().line;
    match exp {
        Exp::Number { value, .. } => value.to_string(),
        Exp::Var { name, index, .. } => match index {
            None => name.clone(),
            Some(idx) => {
                let index_value = emit_expression(idx, emitter);
                let result = emitter.names.temp();
                emitter.emit(OpCode::ArrayAccess, &result, name, &index_value, line);
                result
            }
        },
        Exp::Unary { op, operand, .. } => {
            let value = emit_expression(operand, emitter);
            let result = emitter.names.temp();
            match op {
                UnaryOp::Negate => emitter.emit(OpCode::Sub, &result, "0", &value, line),
                UnaryOp::Not => emitter.emit(OpCode::Not, &result, &value, "", line),
            }
            result
        }
        Exp::Binary {
            op: BinaryOp::Assign,
            lhs,
            rhs,
            ..
        } => emit_assignment(lhs, rhs, emitter, line),
        Exp::Binary { op, lhs, rhs, .. } => {
            let left = emit_expression(lhs, emitter);
            let right = emit_expression(rhs, emitter);
            let result = emitter.names.temp();
            emitter.emit(binary_opcode(*op), &result, &left, &right, line);
            result
        }
        Exp::Call { name, args, .. } => {
            let values: Vec<String> = args.iter().map(|a| emit_expression(a, emitter)).collect();
            // push rightmost first so the callee sees the leftmost on top
            for value in values.iter().rev() {
                emitter.emit(OpCode::Param, "", value, "", line);
            }
            let result = emitter.names.temp();
            let arity = args.len().to_string();
            emitter.emit(OpCode::Call, &result, name, &arity, line);
            result
        }
    }
}

fn emit_assignment(lhs: &Exp, rhs: &Exp, emitter: &mut Emitter, line: u32) -> String {
    let value = emit_expression(rhs, emitter);
    let Exp::Var { name, index, .. } = lhs else {
        panic!("internal error: assignment target is not a variable");
    };
    match index {
        Some(idx) => {
            let index_value = emit_expression(idx, emitter);
            emitter.emit(OpCode::ArrayAssign, name, &index_value, &value, line);
        }
        None => emitter.emit(OpCode::Assign, name, &value, "", line),
    }
    name.clone()
}

fn binary_opcode(op: BinaryOp) -> OpCode {
    match op {
        BinaryOp::Add => OpCode::Add,
        BinaryOp::Sub => OpCode::Sub,
        BinaryOp::Mul => OpCode::Mul,
        BinaryOp::Div => OpCode::Div,
        BinaryOp::Mod => OpCode::Mod,
        BinaryOp::Eq => OpCode::Eq,
        BinaryOp::Ne => OpCode::Ne,
        BinaryOp::Lt => OpCode::Lt,
        BinaryOp::Le => OpCode::Le,
        BinaryOp::Gt => OpCode::Gt,
        BinaryOp::Ge => OpCode::Ge,
        BinaryOp::And => OpCode::And,
        BinaryOp::Or => OpCode::Or,
        BinaryOp::Assign => unreachable!("assignment lowers through emit_assignment"),
    }
}
