mod semantic_error;
mod symbol;

use crate::ast::*;
use std::collections::HashSet;

pub use semantic_error::{ErrorKind, SemanticError, SemanticWarning};
pub use symbol::{DataType, FunInfo, ParamInfo, ScopeId, Symbol, SymbolTable, VarInfo};

/// Result of a clean analysis: the populated scope tree plus any warnings.
#[derive(Debug)]
pub struct Analysis {
    pub table: SymbolTable,
    pub warnings: Vec<SemanticWarning>,
}

/// Validates the program. The first pass enters every top-level function
/// into the global scope so forward references resolve; the second pass
/// descends into bodies. All errors are accumulated and reported together.
pub fn analyze(program: &Program) -> Result<Analysis, Vec<SemanticError>> {
    let mut analyzer = Analyzer::new();
    analyzer.declare_builtins();
    analyzer.collect_functions(program);

    for decl in &program.declarations {
        match decl {
            Declaration::Var(var) => analyzer.declare_variable(var),
            Declaration::Fun(fun) => analyzer.analyze_function(fun),
        }
    }
    analyzer.check_main();

    if analyzer.errors.is_empty() {
        Ok(Analysis {
            table: analyzer.table,
            warnings: analyzer.warnings,
        })
    } else {
        Err(analyzer.errors)
    }
}

fn data_type(spec: TypeSpec) -> DataType {
    match spec {
        TypeSpec::Int => DataType::Int,
        TypeSpec::Void => DataType::Void,
    }
}

struct Analyzer {
    table: SymbolTable,
    current: ScopeId,
    current_return: DataType,
    errors: Vec<SemanticError>,
    warnings: Vec<SemanticWarning>,
    /// Names already reported as undefined; each is diagnosed once per run.
    reported_missing: HashSet<String>,
    /// `(resolving scope, name)` pairs that were actually referenced.
    used: HashSet<(ScopeId, String)>,
}

impl Analyzer {
    fn new() -> Self {
        Self {
            table: SymbolTable::new(),
            current: SymbolTable::GLOBAL,
            current_return: DataType::Unknown,
            errors: Vec::new(),
            warnings: Vec::new(),
            reported_missing: HashSet::new(),
            used: HashSet::new(),
        }
    }

    fn declare_builtins(&mut self) {
        let input = FunInfo {
            return_type: DataType::Int,
            params: Vec::new(),
            is_defined: true,
            location: SourceLoc::default(),
        };
        self.table
            .declare(SymbolTable::GLOBAL, "input", Symbol::Builtin(input));

        let output = FunInfo {
            return_type: DataType::Void,
            params: vec![ParamInfo {
                name: "value".to_owned(),
                data_type: DataType::Int,
            }],
            is_defined: true,
            location: SourceLoc::default(),
        };
        self.table
            .declare(SymbolTable::GLOBAL, "output", Symbol::Builtin(output));
    }

    fn collect_functions(&mut self, program: &Program) {
        for decl in &program.declarations {
            let Declaration::Fun(fun) = decl else {
                continue;
            };
            let params = fun
                .params
                .iter()
                .map(|p| ParamInfo {
                    name: p.name.clone(),
                    data_type: if p.is_array {
                        DataType::IntArray
                    } else {
                        data_type(p.type_spec)
                    },
                })
                .collect();
            let info = FunInfo {
                return_type: data_type(fun.return_type),
                params,
                is_defined: true,
                location: fun.loc,
            };
            if !self
                .table
                .declare(SymbolTable::GLOBAL, &fun.name, Symbol::Function(info))
            {
                self.errors
                    .push(SemanticError::redefinition(&fun.name, fun.loc));
            }
        }
    }

    fn declare_variable(&mut self, var: &VarDecl) {
        if var.type_spec == TypeSpec::Void {
            self.errors
                .push(SemanticError::void_variable(&var.name, var.loc));
            return;
        }

        if self.table.lookup_local(self.current, &var.name).is_none() {
            let shadows = self
                .table
                .lookup(self.current, &var.name)
                .is_some_and(|sym| sym.as_variable().is_some());
            if shadows {
                self.warnings
                    .push(SemanticWarning::shadowed_name(&var.name, var.loc));
            }
        }

        let info = VarInfo {
            data_type: DataType::Int,
            is_array: var.array_size.is_some(),
            array_size: var.array_size,
            scope_level: self.table.level(self.current),
            location: var.loc,
        };
        if !self
            .table
            .declare(self.current, &var.name, Symbol::Variable(info))
        {
            self.errors
                .push(SemanticError::redefinition(&var.name, var.loc));
        }
    }

    fn declare_param(&mut self, param: &Param) {
        if param.type_spec == TypeSpec::Void {
            self.errors
                .push(SemanticError::void_variable(&param.name, param.loc));
            return;
        }

        let info = VarInfo {
            data_type: DataType::Int,
            is_array: param.is_array,
            array_size: None,
            scope_level: self.table.level(self.current),
            location: param.loc,
        };
        if !self
            .table
            .declare(self.current, &param.name, Symbol::Parameter(info))
        {
            self.errors
                .push(SemanticError::redefinition(&param.name, param.loc));
        }
    }

    fn analyze_function(&mut self, fun: &FunDecl) {
        self.current_return = data_type(fun.return_type);
        let body_scope = self.table.enter_scope(SymbolTable::GLOBAL);
        self.current = body_scope;

        // parameters live in the function body's scope
        for param in &fun.params {
            self.declare_param(param);
        }
        self.analyze_block(&fun.body);

        self.report_unused(body_scope);
        self.current = SymbolTable::GLOBAL;
        self.current_return = DataType::Unknown;
    }

    fn analyze_block(&mut self, block: &Compound) {
        for local in &block.locals {
            self.declare_variable(local);
        }
        for stmt in &block.statements {
            self.analyze_statement(stmt);
        }
    }

    fn analyze_statement(&mut self, stmt: &Statement) {
        match stmt {
            Statement::Compound(block) => {
                let parent = self.current;
                self.current = self.table.enter_scope(parent);
                self.analyze_block(block);
                self.current = parent;
            }
            Statement::If(if_stmt) => {
                self.type_of(&if_stmt.condition);
                self.analyze_statement(&if_stmt.then_branch);
                if let Some(els) = &if_stmt.else_branch {
                    self.analyze_statement(els);
                }
            }
            Statement::While(while_stmt) => {
                self.type_of(&while_stmt.condition);
                self.analyze_statement(&while_stmt.body);
            }
            Statement::Return(ret) => self.check_return(ret),
            Statement::Expr(exp) => {
                self.type_of(exp);
            }
            Statement::Empty | Statement::Error(_) => (),
        }
    }

    fn check_return(&mut self, ret: &ReturnStmt) {
        let expected = self.current_return;
        match (&ret.expr, expected) {
            (None, DataType::Void) => (),
            (Some(exp), DataType::Void) => {
                let actual = self.type_of(exp);
                self.errors.push(SemanticError::return_type_mismatch(
                    DataType::Void,
                    actual,
                    ret.loc,
                ));
            }
            (None, expected) => {
                self.errors.push(SemanticError::return_type_mismatch(
                    expected,
                    DataType::Void,
                    ret.loc,
                ));
            }
            (Some(exp), expected) => {
                let actual = self.type_of(exp);
                if actual != DataType::Unknown && actual != expected {
                    self.errors.push(SemanticError::return_type_mismatch(
                        expected, actual, ret.loc,
                    ));
                }
            }
        }
    }

    /// Types an expression, reporting any errors found inside it.
    fn type_of(&mut self, exp: &Exp) -> DataType {
        match exp {
            Exp::Number { .. } => DataType::Int,
            Exp::Var {
                name, index, loc, ..
            } => self.type_of_var(name, index.as_deref(), *loc),
            Exp::Call { name, args, loc } => self.check_call(name, args, *loc),
            Exp::Unary { operand, loc, .. } => {
                let actual = self.type_of(operand);
                if actual != DataType::Int && actual != DataType::Unknown {
                    self.errors
                        .push(SemanticError::invalid_operands("Unary operation", *loc));
                }
                DataType::Int
            }
            Exp::Binary {
                op: BinaryOp::Assign,
                lhs,
                rhs,
                loc,
            } => self.check_assignment(lhs, rhs, *loc),
            Exp::Binary { lhs, rhs, loc, .. } => {
                let left = self.type_of(lhs);
                let right = self.type_of(rhs);
                let unknown = left == DataType::Unknown || right == DataType::Unknown;
                if !unknown && (left != DataType::Int || right != DataType::Int) {
                    self.errors
                        .push(SemanticError::invalid_operands("Binary operation", *loc));
                }
                DataType::Int
            }
        }
    }

    fn type_of_var(&mut self, name: &str, index: Option<&Exp>, loc: SourceLoc) -> DataType {
        let resolved = self
            .table
            .lookup_with_scope(self.current, name)
            .map(|(scope, sym)| (scope, sym.clone()));

        let Some((scope, symbol)) = resolved else {
            if self.reported_missing.insert(name.to_owned()) {
                self.errors.push(SemanticError::undefined_variable(name, loc));
            }
            if let Some(idx) = index {
                self.check_index(idx);
            }
            return DataType::Unknown;
        };

        let Some(info) = symbol.as_variable() else {
            self.errors
                .push(SemanticError::function_used_as_variable(name, loc));
            return DataType::Unknown;
        };

        self.used.insert((scope, name.to_owned()));
        match index {
            None => info.value_type(),
            Some(idx) => {
                self.check_index(idx);
                if !info.is_array {
                    self.errors
                        .push(SemanticError::index_on_non_array(name, loc));
                }
                DataType::Int
            }
        }
    }

    fn check_index(&mut self, index: &Exp) {
        let actual = self.type_of(index);
        if actual != DataType::Int && actual != DataType::Unknown {
            self.errors
                .push(SemanticError::array_index_not_int(index.loc()));
        }
    }

    fn check_call(&mut self, name: &str, args: &[Exp], loc: SourceLoc) -> DataType {
        let resolved = self
            .table
            .lookup_with_scope(self.current, name)
            .map(|(scope, sym)| (scope, sym.clone()));

        let Some((scope, symbol)) = resolved else {
            if self.reported_missing.insert(name.to_owned()) {
                self.errors.push(SemanticError::undefined_function(name, loc));
            }
            for arg in args {
                self.type_of(arg);
            }
            return DataType::Unknown;
        };

        let Some(info) = symbol.as_function() else {
            self.errors.push(SemanticError::variable_called(name, loc));
            for arg in args {
                self.type_of(arg);
            }
            return DataType::Unknown;
        };

        self.used.insert((scope, name.to_owned()));
        if args.len() != info.params.len() {
            self.errors
                .push(SemanticError::signature_mismatch(name, loc));
            for arg in args {
                self.type_of(arg);
            }
            return info.return_type;
        }

        for (arg, param) in args.iter().zip(&info.params) {
            let actual = self.type_of(arg);
            if actual != DataType::Unknown && actual != param.data_type {
                self.errors.push(SemanticError::type_mismatch(
                    param.data_type,
                    actual,
                    arg.loc(),
                ));
            }
        }
        info.return_type
    }

    fn check_assignment(&mut self, lhs: &Exp, rhs: &Exp, loc: SourceLoc) -> DataType {
        if !lhs.is_var() {
            self.errors
                .push(SemanticError::assignment_to_non_variable(loc));
            self.type_of(rhs);
            return DataType::Unknown;
        }

        let left = self.type_of(lhs);
        let right = self.type_of(rhs);

        if left == DataType::IntArray {
            self.errors.push(SemanticError::array_assignment(loc));
            return DataType::Unknown;
        }
        if left != DataType::Unknown && right != DataType::Unknown && left != right {
            self.errors
                .push(SemanticError::type_mismatch(left, right, loc));
        }
        left
    }

    fn check_main(&mut self) {
        match self.table.lookup_local(SymbolTable::GLOBAL, "main") {
            None => self.errors.push(SemanticError::main_missing()),
            Some(symbol) => match symbol.as_function() {
                Some(info) => {
                    if info.return_type != DataType::Int || !info.params.is_empty() {
                        self.errors.push(SemanticError::main_invalid(info.location));
                    }
                }
                None => {
                    let loc = symbol
                        .as_variable()
                        .map_or_else(SourceLoc::default, |v| v.location);
                    self.errors.push(SemanticError::main_invalid(loc));
                }
            },
        }
    }

    /// Emits unused-variable warnings for every scope of one function, in
    /// source order.
    fn report_unused(&mut self, root: ScopeId) {
        let mut found = Vec::new();
        let mut stack = vec![root];
        while let Some(scope) = stack.pop() {
            stack.extend_from_slice(self.table.children(scope));
            for (name, symbol) in self.table.symbols(scope) {
                let Symbol::Variable(info) = symbol else {
                    continue;
                };
                if !self.used.contains(&(scope, name.to_owned())) {
                    found.push((info.location, name.to_owned()));
                }
            }
        }
        found.sort_by_key(|(loc, name)| (loc.line, loc.column, name.clone()));
        for (loc, name) in found {
            self.warnings
                .push(SemanticWarning::unused_variable(&name, loc));
        }
    }
}
