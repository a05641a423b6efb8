mod cursor;
mod parse_error;
#[cfg(test)]
mod parser_tests;

use crate::ast::*;
use crate::lexer::{Token, TokenKind};
use cursor::Cursor;
pub use parse_error::{InnerSyntaxError, Result, SyntaxError};

/// Result of parsing one token stream. The AST is always produced; when
/// `errors` is non-empty it may contain [Statement::Error] placeholders and
/// the compilation must ultimately fail.
#[derive(Debug)]
pub struct ParseOutcome {
    pub program: Program,
    pub errors: Vec<SyntaxError>,
}

pub fn parse(tokens: &[Token]) -> ParseOutcome {
    let mut cursor = Cursor::new(tokens);
    let mut errors = Vec::new();
    let mut program = Program::default();

    while !cursor.at_end() {
        match parse_declaration(&mut cursor, &mut errors) {
            Ok(decl) => program.declarations.push(decl),
            Err(err) => {
                errors.push(err);
                recover(&mut cursor);
            }
        }
    }

    ParseOutcome { program, errors }
}

/// Consumes the offending token, then advances until either the previous
/// token was `;` or the current one can start a statement or declaration.
fn recover(cursor: &mut Cursor) {
    cursor.advance();
    synchronize(cursor);
}

fn synchronize(cursor: &mut Cursor) {
    use TokenKind::*;
    while !cursor.at_end() {
        if cursor.previous().is_some_and(|t| t.is(Semicolon)) {
            return;
        }
        match cursor.peek().kind {
            If | While | Return | Int | Void => return,
            _ => {
                cursor.advance();
            }
        }
    }
}

fn expect_identifier(cursor: &mut Cursor) -> Result<(Identifier, SourceLoc)> {
    let loc = cursor.loc();
    let token = cursor.peek();
    if token.is(TokenKind::Identifier) {
        cursor.advance();
        Ok((token.lexeme.clone(), loc))
    } else {
        Err(InnerSyntaxError::ExpectedIdentifier(token.kind).at(loc))
    }
}

fn parse_type_spec(cursor: &mut Cursor) -> Result<TypeSpec> {
    match cursor.peek().kind {
        TokenKind::Int => {
            cursor.advance();
            Ok(TypeSpec::Int)
        }
        TokenKind::Void => {
            cursor.advance();
            Ok(TypeSpec::Void)
        }
        got => Err(InnerSyntaxError::ExpectedTypeSpecifier(got).at(cursor.loc())),
    }
}

fn parse_declaration(cursor: &mut Cursor, errors: &mut Vec<SyntaxError>) -> Result<Declaration> {
    if !cursor.peek().kind.is_type_keyword() {
        let got = cursor.peek().kind;
        return Err(InnerSyntaxError::ExpectedDeclaration(got).at(cursor.loc()));
    }
    let type_spec = parse_type_spec(cursor)?;
    let (name, loc) = expect_identifier(cursor)?;

    if cursor.check(TokenKind::LParen) {
        parse_fun_declaration(cursor, errors, type_spec, name, loc).map(Declaration::Fun)
    } else {
        parse_var_declaration(cursor, type_spec, name, loc).map(Declaration::Var)
    }
}

/// Parses the part of a variable declaration after `type name`. Array
/// declarations require a literal positive size.
fn parse_var_declaration(
    cursor: &mut Cursor,
    type_spec: TypeSpec,
    name: Identifier,
    loc: SourceLoc,
) -> Result<VarDecl> {
    let array_size = if cursor.bump_if(TokenKind::LBracket) {
        let size_loc = cursor.loc();
        let token = cursor.expect(TokenKind::Number).map_err(|_| {
            InnerSyntaxError::BadArraySize(cursor.peek().lexeme.clone()).at(size_loc)
        })?;
        let size: i64 = token
            .lexeme
            .parse()
            .map_err(|_| InnerSyntaxError::NumberTooLarge(token.lexeme.clone()).at(size_loc))?;
        if size <= 0 {
            return Err(InnerSyntaxError::BadArraySize(token.lexeme.clone()).at(size_loc));
        }
        cursor.expect(TokenKind::RBracket)?;
        Some(size)
    } else {
        None
    };
    cursor.expect(TokenKind::Semicolon)?;

    Ok(VarDecl {
        type_spec,
        name,
        array_size,
        loc,
    })
}

fn parse_fun_declaration(
    cursor: &mut Cursor,
    errors: &mut Vec<SyntaxError>,
    return_type: TypeSpec,
    name: Identifier,
    loc: SourceLoc,
) -> Result<FunDecl> {
    cursor.expect(TokenKind::LParen)?;
    let params = parse_params(cursor)?;
    cursor.expect(TokenKind::RParen)?;
    let body = parse_compound(cursor, errors)?;

    Ok(FunDecl {
        return_type,
        name,
        params,
        body,
        loc,
    })
}

/// A parameter list is `void`, empty, or comma-separated `type name [\[\]]`.
fn parse_params(cursor: &mut Cursor) -> Result<Vec<Param>> {
    if cursor.bump_if(TokenKind::Void) || cursor.check(TokenKind::RParen) {
        return Ok(Vec::new());
    }

    let mut params = vec![parse_param(cursor)?];
    while cursor.bump_if(TokenKind::Comma) {
        params.push(parse_param(cursor)?);
    }
    Ok(params)
}

fn parse_param(cursor: &mut Cursor) -> Result<Param> {
    let type_spec = parse_type_spec(cursor)?;
    let (name, loc) = expect_identifier(cursor)?;
    let is_array = if cursor.bump_if(TokenKind::LBracket) {
        cursor.expect(TokenKind::RBracket)?;
        true
    } else {
        false
    };

    Ok(Param {
        type_spec,
        name,
        is_array,
        loc,
    })
}

fn parse_compound(cursor: &mut Cursor, errors: &mut Vec<SyntaxError>) -> Result<Compound> {
    cursor.expect(TokenKind::LBrace)?;
    let mut block = Compound::default();

    while cursor.peek().kind.is_type_keyword() {
        match parse_local(cursor) {
            Ok(local) => block.locals.push(local),
            Err(err) => {
                errors.push(err);
                recover(cursor);
            }
        }
    }

    while !cursor.check(TokenKind::RBrace) && !cursor.at_end() {
        let loc = cursor.loc();
        match parse_statement(cursor, errors) {
            Ok(stmt) => block.statements.push(stmt),
            Err(err) => {
                errors.push(err);
                recover(cursor);
                block.statements.push(Statement::Error(loc));
            }
        }
    }
    cursor.expect(TokenKind::RBrace)?;

    Ok(block)
}

fn parse_local(cursor: &mut Cursor) -> Result<VarDecl> {
    let type_spec = parse_type_spec(cursor)?;
    let (name, loc) = expect_identifier(cursor)?;
    parse_var_declaration(cursor, type_spec, name, loc)
}

fn parse_statement(cursor: &mut Cursor, errors: &mut Vec<SyntaxError>) -> Result<Statement> {
    match cursor.peek().kind {
        TokenKind::If => parse_if(cursor, errors),
        TokenKind::While => parse_while(cursor, errors),
        TokenKind::Return => parse_return(cursor),
        TokenKind::LBrace => parse_compound(cursor, errors).map(Statement::Compound),
        TokenKind::Semicolon => {
            cursor.advance();
            Ok(Statement::Empty)
        }
        _ => {
            let exp = parse_expression(cursor)?;
            cursor.expect(TokenKind::Semicolon)?;
            Ok(Statement::Expr(exp))
        }
    }
}

fn parse_if(cursor: &mut Cursor, errors: &mut Vec<SyntaxError>) -> Result<Statement> {
    cursor.expect(TokenKind::If)?;
    cursor.expect(TokenKind::LParen)?;
    let condition = parse_expression(cursor)?;
    cursor.expect(TokenKind::RParen)?;
    let then_branch = parse_statement(cursor, errors).map(Box::new)?;
    let else_branch = cursor
        .bump_if(TokenKind::Else)
        .then(|| parse_statement(cursor, errors))
        .transpose()?
        .map(Box::new);

    Ok(Statement::If(IfStmt {
        condition,
        then_branch,
        else_branch,
    }))
}

fn parse_while(cursor: &mut Cursor, errors: &mut Vec<SyntaxError>) -> Result<Statement> {
    cursor.expect(TokenKind::While)?;
    cursor.expect(TokenKind::LParen)?;
    let condition = parse_expression(cursor)?;
    cursor.expect(TokenKind::RParen)?;
    let body = parse_statement(cursor, errors).map(Box::new)?;

    Ok(Statement::While(WhileStmt { condition, body }))
}

fn parse_return(cursor: &mut Cursor) -> Result<Statement> {
    let loc = cursor.loc();
    cursor.expect(TokenKind::Return)?;
    let expr = if cursor.bump_if(TokenKind::Semicolon) {
        None
    } else {
        let exp = parse_expression(cursor)?;
        cursor.expect(TokenKind::Semicolon)?;
        Some(exp)
    };

    Ok(Statement::Return(ReturnStmt { expr, loc }))
}

fn binary(op: BinaryOp, lhs: Exp, rhs: Exp, loc: SourceLoc) -> Exp {
    Exp::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
        loc,
    }
}

/// Expression entry point. A two-token peek splits assignment from the
/// other expression forms: `name =` assigns directly, `name [` parses the
/// indexed variable first and assigns when `=` follows, anything else is an
/// ordinary binary expression.
fn parse_expression(cursor: &mut Cursor) -> Result<Exp> {
    if cursor.check(TokenKind::Identifier) {
        match cursor.peek_nth(1).kind {
            TokenKind::Assign => {
                let (name, loc) = expect_identifier(cursor)?;
                let op_loc = cursor.loc();
                cursor.expect(TokenKind::Assign)?;
                let rhs = parse_expression(cursor)?;
                let lhs = Exp::Var {
                    name,
                    index: None,
                    loc,
                };
                return Ok(binary(BinaryOp::Assign, lhs, rhs, op_loc));
            }
            TokenKind::LBracket => {
                let var = parse_var(cursor)?;
                if cursor.check(TokenKind::Assign) {
                    let op_loc = cursor.loc();
                    cursor.advance();
                    let rhs = parse_expression(cursor)?;
                    return Ok(binary(BinaryOp::Assign, var, rhs, op_loc));
                }
                return continue_binary(cursor, var);
            }
            _ => (),
        }
    }

    let factor = parse_factor(cursor)?;
    continue_binary(cursor, factor)
}

/// Threads an already-parsed factor through the precedence levels, lowest
/// binding last.
fn continue_binary(cursor: &mut Cursor, factor: Exp) -> Result<Exp> {
    let left = parse_term_from(cursor, factor)?;
    let left = parse_additive_from(cursor, left)?;
    let left = parse_relational_from(cursor, left)?;
    let left = parse_and_from(cursor, left)?;
    parse_or_from(cursor, left)
}

fn parse_or_from(cursor: &mut Cursor, mut left: Exp) -> Result<Exp> {
    while cursor.check(TokenKind::OrOr) {
        let loc = cursor.loc();
        cursor.advance();
        let rhs = parse_and(cursor)?;
        left = binary(BinaryOp::Or, left, rhs, loc);
    }
    Ok(left)
}

fn parse_and(cursor: &mut Cursor) -> Result<Exp> {
    let left = parse_relational(cursor)?;
    parse_and_from(cursor, left)
}

fn parse_and_from(cursor: &mut Cursor, mut left: Exp) -> Result<Exp> {
    while cursor.check(TokenKind::AndAnd) {
        let loc = cursor.loc();
        cursor.advance();
        let rhs = parse_relational(cursor)?;
        left = binary(BinaryOp::And, left, rhs, loc);
    }
    Ok(left)
}

fn parse_relational(cursor: &mut Cursor) -> Result<Exp> {
    let left = parse_additive(cursor)?;
    parse_relational_from(cursor, left)
}

/// Comparison is non-associative: at most one relational operator per level,
/// as in the source grammar.
fn parse_relational_from(cursor: &mut Cursor, left: Exp) -> Result<Exp> {
    let op = match cursor.peek().kind {
        TokenKind::Less => BinaryOp::Lt,
        TokenKind::LessEqual => BinaryOp::Le,
        TokenKind::Greater => BinaryOp::Gt,
        TokenKind::GreaterEqual => BinaryOp::Ge,
        TokenKind::EqualEqual => BinaryOp::Eq,
        TokenKind::NotEqual => BinaryOp::Ne,
        _ => return Ok(left),
    };
    let loc = cursor.loc();
    cursor.advance();
    let rhs = parse_additive(cursor)?;
    Ok(binary(op, left, rhs, loc))
}

fn parse_additive(cursor: &mut Cursor) -> Result<Exp> {
    let left = parse_term(cursor)?;
    parse_additive_from(cursor, left)
}

fn parse_additive_from(cursor: &mut Cursor, mut left: Exp) -> Result<Exp> {
    loop {
        let op = match cursor.peek().kind {
            TokenKind::Plus => BinaryOp::Add,
            TokenKind::Minus => BinaryOp::Sub,
            _ => return Ok(left),
        };
        let loc = cursor.loc();
        cursor.advance();
        let rhs = parse_term(cursor)?;
        left = binary(op, left, rhs, loc);
    }
}

fn parse_term(cursor: &mut Cursor) -> Result<Exp> {
    let factor = parse_factor(cursor)?;
    parse_term_from(cursor, factor)
}

fn parse_term_from(cursor: &mut Cursor, mut left: Exp) -> Result<Exp> {
    loop {
        let op = match cursor.peek().kind {
            TokenKind::Star => BinaryOp::Mul,
            TokenKind::Slash => BinaryOp::Div,
            TokenKind::Percent => BinaryOp::Mod,
            _ => return Ok(left),
        };
        let loc = cursor.loc();
        cursor.advance();
        let rhs = parse_factor(cursor)?;
        left = binary(op, left, rhs, loc);
    }
}

fn parse_factor(cursor: &mut Cursor) -> Result<Exp> {
    let loc = cursor.loc();
    match cursor.peek().kind {
        TokenKind::LParen => {
            cursor.advance();
            let exp = parse_expression(cursor)?;
            cursor.expect(TokenKind::RParen)?;
            Ok(exp)
        }
        TokenKind::Number => {
            let token = cursor.advance();
            let value = token
                .lexeme
                .parse()
                .map_err(|_| InnerSyntaxError::NumberTooLarge(token.lexeme.clone()).at(loc))?;
            Ok(Exp::Number { value, loc })
        }
        TokenKind::Identifier => {
            if cursor.peek_nth(1).is(TokenKind::LParen) {
                parse_call(cursor)
            } else {
                parse_var(cursor)
            }
        }
        // the I/O intrinsics are keywords but parse as ordinary calls
        TokenKind::Input | TokenKind::Output => parse_call(cursor),
        TokenKind::Minus => {
            cursor.advance();
            let operand = parse_factor(cursor).map(Box::new)?;
            Ok(Exp::Unary {
                op: UnaryOp::Negate,
                operand,
                loc,
            })
        }
        TokenKind::Not => {
            cursor.advance();
            let operand = parse_factor(cursor).map(Box::new)?;
            Ok(Exp::Unary {
                op: UnaryOp::Not,
                operand,
                loc,
            })
        }
        got => Err(InnerSyntaxError::ExpectedExpression(got).at(loc)),
    }
}

fn parse_var(cursor: &mut Cursor) -> Result<Exp> {
    let (name, loc) = expect_identifier(cursor)?;
    let index = if cursor.bump_if(TokenKind::LBracket) {
        let exp = parse_expression(cursor).map(Box::new)?;
        cursor.expect(TokenKind::RBracket)?;
        Some(exp)
    } else {
        None
    };

    Ok(Exp::Var { name, index, loc })
}

fn parse_call(cursor: &mut Cursor) -> Result<Exp> {
    let loc = cursor.loc();
    let name = cursor.advance().lexeme.clone();
    cursor.expect(TokenKind::LParen)?;
    let args = parse_args(cursor)?;
    cursor.expect(TokenKind::RParen)?;

    Ok(Exp::Call { name, args, loc })
}

fn parse_args(cursor: &mut Cursor) -> Result<Vec<Exp>> {
    if cursor.check(TokenKind::RParen) {
        return Ok(Vec::new());
    }

    let mut args = vec![parse_expression(cursor)?];
    while cursor.bump_if(TokenKind::Comma) {
        args.push(parse_expression(cursor)?);
    }
    Ok(args)
}
