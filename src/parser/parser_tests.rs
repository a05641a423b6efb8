use super::*;
use crate::lexer::lex;

fn parse_ok(source: &str) -> Program {
    let tokens = lex(source).expect("should lex");
    let outcome = parse(&tokens);
    assert!(
        outcome.errors.is_empty(),
        "unexpected syntax errors: {:?}",
        outcome.errors
    );
    outcome.program
}

fn parse_with_errors(source: &str) -> ParseOutcome {
    let tokens = lex(source).expect("should lex");
    parse(&tokens)
}

fn only_function(program: &Program) -> &FunDecl {
    assert_eq!(1, program.declarations.len());
    match &program.declarations[0] {
        Declaration::Fun(f) => f,
        Declaration::Var(v) => panic!("expected function, got variable {v:?}"),
    }
}

#[test]
fn test_minimal_main() {
    let program = parse_ok("int main(void) { return 0; }");
    let main = only_function(&program);
    assert_eq!("main", main.name);
    assert_eq!(TypeSpec::Int, main.return_type);
    assert!(main.params.is_empty());
    assert_eq!(1, main.body.statements.len());
    let Statement::Return(ret) = &main.body.statements[0] else {
        panic!("expected return");
    };
    assert!(matches!(ret.expr, Some(Exp::Number { value: 0, .. })));
}

#[test]
fn test_bare_return() {
    let program = parse_ok("void f(void) { return; }");
    let f = only_function(&program);
    let Statement::Return(ret) = &f.body.statements[0] else {
        panic!("expected return");
    };
    assert!(ret.expr.is_none());
}

#[test]
fn test_global_and_array_declarations() {
    let program = parse_ok("int g; int buf[32]; int main(void) { return 0; }");
    assert_eq!(3, program.declarations.len());
    let Declaration::Var(buf) = &program.declarations[1] else {
        panic!("expected variable");
    };
    assert_eq!("buf", buf.name);
    assert_eq!(Some(32), buf.array_size);
}

#[test]
fn test_array_size_must_be_positive() {
    let outcome = parse_with_errors("int a[0]; int main(void) { return 0; }");
    assert!(outcome
        .errors
        .iter()
        .any(|e| matches!(e.inner(), InnerSyntaxError::BadArraySize(s) if s == "0")));
}

#[test]
fn test_params_forms() {
    let program = parse_ok("int f(int a, int b[]) { return a; }");
    let f = only_function(&program);
    assert_eq!(2, f.params.len());
    assert!(!f.params[0].is_array);
    assert!(f.params[1].is_array);
    assert_eq!("b", f.params[1].name);
}

#[test]
fn test_void_param_list_is_empty() {
    let program = parse_ok("int f(void) { return 0; }");
    assert!(only_function(&program).params.is_empty());
}

#[test]
fn test_empty_statement() {
    let program = parse_ok("int main(void) { ;; return 0; }");
    let main = only_function(&program);
    assert!(matches!(main.body.statements[0], Statement::Empty));
    assert!(matches!(main.body.statements[1], Statement::Empty));
}

#[test]
fn test_locals_precede_statements() {
    let program = parse_ok("int main(void) { int x; int a[4]; x = 1; return x; }");
    let main = only_function(&program);
    assert_eq!(2, main.body.locals.len());
    assert_eq!(2, main.body.statements.len());
}

#[test]
fn test_assignment_is_binary_with_var_lhs() {
    let program = parse_ok("int main(void) { int x; x = 1 + 2; return x; }");
    let main = only_function(&program);
    let Statement::Expr(Exp::Binary { op, lhs, rhs, .. }) = &main.body.statements[0] else {
        panic!("expected assignment expression");
    };
    assert_eq!(BinaryOp::Assign, *op);
    assert!(matches!(&**lhs, Exp::Var { name, index: None, .. } if name == "x"));
    assert!(matches!(&**rhs, Exp::Binary { op: BinaryOp::Add, .. }));
}

#[test]
fn test_indexed_assignment() {
    let program = parse_ok("int main(void) { int a[4]; a[1 + 2] = 7; return 0; }");
    let main = only_function(&program);
    let Statement::Expr(Exp::Binary { op, lhs, .. }) = &main.body.statements[0] else {
        panic!("expected assignment expression");
    };
    assert_eq!(BinaryOp::Assign, *op);
    let Exp::Var { name, index, .. } = &**lhs else {
        panic!("expected indexed variable");
    };
    assert_eq!("a", name);
    assert!(index.is_some());
}

#[test]
fn test_indexed_read_in_expression() {
    // `a[i]` followed by an operator must not take the assignment path
    let program = parse_ok("int main(void) { int a[4]; int x; x = a[0] + 1; return x; }");
    let main = only_function(&program);
    let Statement::Expr(Exp::Binary { rhs, .. }) = &main.body.statements[0] else {
        panic!("expected assignment expression");
    };
    let Exp::Binary { op, lhs, .. } = &**rhs else {
        panic!("expected addition");
    };
    assert_eq!(BinaryOp::Add, *op);
    assert!(matches!(&**lhs, Exp::Var { index: Some(_), .. }));
}

#[test]
fn test_call_vs_var_disambiguation() {
    let program = parse_ok("int main(void) { int f; f = f + fn(1, 2); return f; }");
    let main = only_function(&program);
    let Statement::Expr(Exp::Binary { rhs, .. }) = &main.body.statements[0] else {
        panic!("expected assignment");
    };
    let Exp::Binary { rhs: call, .. } = &**rhs else {
        panic!("expected addition");
    };
    let Exp::Call { name, args, .. } = &**call else {
        panic!("expected call");
    };
    assert_eq!("fn", name);
    assert_eq!(2, args.len());
}

#[test]
fn test_intrinsics_parse_as_calls() {
    let program = parse_ok("int main(void) { output(input()); return 0; }");
    let main = only_function(&program);
    let Statement::Expr(Exp::Call { name, args, .. }) = &main.body.statements[0] else {
        panic!("expected call statement");
    };
    assert_eq!("output", name);
    assert!(matches!(&args[0], Exp::Call { name, .. } if name == "input"));
}

#[test]
fn test_precedence() {
    // 1 + 2 * 3 parses as 1 + (2 * 3)
    let program = parse_ok("int main(void) { return 1 + 2 * 3; }");
    let main = only_function(&program);
    let Statement::Return(ret) = &main.body.statements[0] else {
        panic!("expected return");
    };
    let Some(Exp::Binary { op, rhs, .. }) = &ret.expr else {
        panic!("expected binary expression");
    };
    assert_eq!(BinaryOp::Add, *op);
    assert!(matches!(&**rhs, Exp::Binary { op: BinaryOp::Mul, .. }));
}

#[test]
fn test_logical_precedence() {
    // a && b || c parses as (a && b) || c
    let program = parse_ok("int main(void) { int a; return a && a || a; }");
    let main = only_function(&program);
    let Statement::Return(ret) = &main.body.statements[0] else {
        panic!("expected return");
    };
    let Some(Exp::Binary { op, lhs, .. }) = &ret.expr else {
        panic!("expected binary expression");
    };
    assert_eq!(BinaryOp::Or, *op);
    assert!(matches!(&**lhs, Exp::Binary { op: BinaryOp::And, .. }));
}

#[test]
fn test_unary_operators() {
    let program = parse_ok("int main(void) { return -1 + !0; }");
    let main = only_function(&program);
    let Statement::Return(ret) = &main.body.statements[0] else {
        panic!("expected return");
    };
    let Some(Exp::Binary { lhs, rhs, .. }) = &ret.expr else {
        panic!("expected binary expression");
    };
    assert!(matches!(
        &**lhs,
        Exp::Unary {
            op: UnaryOp::Negate,
            ..
        }
    ));
    assert!(matches!(
        &**rhs,
        Exp::Unary {
            op: UnaryOp::Not,
            ..
        }
    ));
}

#[test]
fn test_if_else_and_while() {
    let program = parse_ok(
        "int main(void) { int x; x = 0; while (x < 3) { if (x == 1) x = 2; else x = 3; } return x; }",
    );
    let main = only_function(&program);
    let Statement::While(w) = &main.body.statements[1] else {
        panic!("expected while");
    };
    let Statement::Compound(body) = &*w.body else {
        panic!("expected compound body");
    };
    let Statement::If(if_stmt) = &body.statements[0] else {
        panic!("expected if");
    };
    assert!(if_stmt.else_branch.is_some());
}

#[test]
fn test_error_recovery_keeps_later_declarations() {
    let outcome = parse_with_errors(
        "int broken(void) { return 1 + ; }\nint main(void) { return 0; }",
    );
    assert!(!outcome.errors.is_empty());
    // the second function still parses
    let names: Vec<_> = outcome
        .program
        .declarations
        .iter()
        .filter_map(|d| match d {
            Declaration::Fun(f) => Some(f.name.as_str()),
            Declaration::Var(_) => None,
        })
        .collect();
    assert!(names.contains(&"main"));
}

#[test]
fn test_error_recovery_inserts_error_node() {
    let outcome =
        parse_with_errors("int main(void) { x = ; return 0; }");
    assert!(!outcome.errors.is_empty());
    let main = match &outcome.program.declarations[0] {
        Declaration::Fun(f) => f,
        Declaration::Var(_) => panic!("expected function"),
    };
    assert!(main
        .body
        .statements
        .iter()
        .any(|s| matches!(s, Statement::Error(_))));
    // recovery resumed in time to parse the return
    assert!(main
        .body
        .statements
        .iter()
        .any(|s| matches!(s, Statement::Return(_))));
}

#[test]
fn test_error_locations_reported() {
    let outcome = parse_with_errors("int main(void) {\n  return 1 + ;\n}");
    let err = &outcome.errors[0];
    assert_eq!(2, err.loc().line);
    assert!(err.to_string().contains("line 2"));
}

#[test]
fn test_multiple_errors_reported() {
    let outcome = parse_with_errors(
        "int a(void) { return + ; }\nint b(void) { return + ; }\nint main(void) { return 0; }",
    );
    assert!(outcome.errors.len() >= 2);
    assert_eq!(3, outcome.program.declarations.len());
}
