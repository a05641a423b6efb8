use crate::ast::SourceLoc;
use crate::semantic_analysis::DataType;
use std::fmt;

/// The semantic error taxonomy. Analysis accumulates these and keeps going,
/// so one run reports as many problems as possible.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ErrorKind {
    UndefinedVariable,
    UndefinedFunction,
    Redefinition,
    TypeMismatch,
    ArrayIndexNotInt,
    VoidVariable,
    FunctionSignatureMismatch,
    ReturnTypeMismatch,
    MainFunctionMissing,
    MainFunctionInvalid,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SemanticError {
    pub kind: ErrorKind,
    pub message: String,
    pub location: SourceLoc,
}

impl SemanticError {
    fn new(kind: ErrorKind, message: String, location: SourceLoc) -> Self {
        Self {
            kind,
            message,
            location,
        }
    }

    pub fn undefined_variable(name: &str, loc: SourceLoc) -> Self {
        let message = format!("Undefined variable '{name}'");
        Self::new(ErrorKind::UndefinedVariable, message, loc)
    }

    pub fn undefined_function(name: &str, loc: SourceLoc) -> Self {
        let message = format!("Undefined function '{name}'");
        Self::new(ErrorKind::UndefinedFunction, message, loc)
    }

    pub fn redefinition(name: &str, loc: SourceLoc) -> Self {
        let message = format!("Redefinition of '{name}'");
        Self::new(ErrorKind::Redefinition, message, loc)
    }

    pub fn type_mismatch(expected: DataType, actual: DataType, loc: SourceLoc) -> Self {
        let message = format!("Type mismatch: expected {expected}, got {actual}");
        Self::new(ErrorKind::TypeMismatch, message, loc)
    }

    pub fn invalid_operands(what: &str, loc: SourceLoc) -> Self {
        let message = format!("{what} requires integer operands");
        Self::new(ErrorKind::TypeMismatch, message, loc)
    }

    pub fn assignment_to_non_variable(loc: SourceLoc) -> Self {
        let message = "Left side of assignment must be a variable".to_owned();
        Self::new(ErrorKind::TypeMismatch, message, loc)
    }

    pub fn array_assignment(loc: SourceLoc) -> Self {
        let message = "Cannot assign arrays".to_owned();
        Self::new(ErrorKind::TypeMismatch, message, loc)
    }

    pub fn index_on_non_array(name: &str, loc: SourceLoc) -> Self {
        let message = format!("Index applied to non-array variable '{name}'");
        Self::new(ErrorKind::TypeMismatch, message, loc)
    }

    pub fn function_used_as_variable(name: &str, loc: SourceLoc) -> Self {
        let message = format!("Function '{name}' used as a variable");
        Self::new(ErrorKind::TypeMismatch, message, loc)
    }

    pub fn variable_called(name: &str, loc: SourceLoc) -> Self {
        let message = format!("Variable '{name}' called as a function");
        Self::new(ErrorKind::FunctionSignatureMismatch, message, loc)
    }

    pub fn array_index_not_int(loc: SourceLoc) -> Self {
        let message = "Array index must be of type int".to_owned();
        Self::new(ErrorKind::ArrayIndexNotInt, message, loc)
    }

    pub fn void_variable(name: &str, loc: SourceLoc) -> Self {
        let message = format!("Variable '{name}' cannot be of type void");
        Self::new(ErrorKind::VoidVariable, message, loc)
    }

    pub fn signature_mismatch(name: &str, loc: SourceLoc) -> Self {
        let message = format!("Function call '{name}' does not match any declaration");
        Self::new(ErrorKind::FunctionSignatureMismatch, message, loc)
    }

    pub fn return_type_mismatch(expected: DataType, actual: DataType, loc: SourceLoc) -> Self {
        let message = format!("Return type mismatch: expected {expected}, got {actual}");
        Self::new(ErrorKind::ReturnTypeMismatch, message, loc)
    }

    pub fn main_missing() -> Self {
        let message = "Program must have a main function".to_owned();
        Self::new(ErrorKind::MainFunctionMissing, message, SourceLoc::default())
    }

    pub fn main_invalid(loc: SourceLoc) -> Self {
        let message = "Main function must have signature: int main(void)".to_owned();
        Self::new(ErrorKind::MainFunctionInvalid, message, loc)
    }
}

impl fmt::Display for SemanticError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Semantic error at {}: {}", self.location, self.message)
    }
}

impl std::error::Error for SemanticError {}

/// Non-fatal findings. The driver prints these to stdout; they never fail
/// the compilation.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SemanticWarning {
    pub message: String,
    pub location: SourceLoc,
}

impl SemanticWarning {
    pub fn shadowed_name(name: &str, loc: SourceLoc) -> Self {
        Self {
            message: format!("Declaration of '{name}' shadows an earlier declaration"),
            location: loc,
        }
    }

    pub fn unused_variable(name: &str, loc: SourceLoc) -> Self {
        Self {
            message: format!("Variable '{name}' is never used"),
            location: loc,
        }
    }
}

impl fmt::Display for SemanticWarning {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Warning at {}: {}", self.location, self.message)
    }
}
