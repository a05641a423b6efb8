use crate::ast::SourceLoc;
use crate::lexer::TokenKind;
use std::fmt::{Display, Formatter};

pub type Result<T> = std::result::Result<T, SyntaxError>;

#[derive(Debug, Eq, PartialEq)]
pub enum InnerSyntaxError {
    ExpectedButGot(TokenKind, TokenKind),
    ExpectedIdentifier(TokenKind),
    ExpectedExpression(TokenKind),
    ExpectedDeclaration(TokenKind),
    ExpectedTypeSpecifier(TokenKind),
    BadArraySize(String),
    NumberTooLarge(String),
}

/// A syntax error with the position of the offending token. The parser
/// records these and synchronizes rather than aborting the file.
#[derive(Debug, Eq, PartialEq)]
pub struct SyntaxError {
    inner: InnerSyntaxError,
    loc: SourceLoc,
}

impl SyntaxError {
    pub fn loc(&self) -> SourceLoc {
        self.loc
    }

    pub fn inner(&self) -> &InnerSyntaxError {
        &self.inner
    }
}

impl InnerSyntaxError {
    pub(super) fn at(self, loc: SourceLoc) -> SyntaxError {
        SyntaxError { inner: self, loc }
    }
}

impl Display for InnerSyntaxError {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            Self::ExpectedButGot(expected, got) => {
                write!(f, "expected {expected}, but got {got}")
            }
            Self::ExpectedIdentifier(got) => write!(f, "expected identifier, but got {got}"),
            Self::ExpectedExpression(got) => write!(f, "expected expression, but got {got}"),
            Self::ExpectedDeclaration(got) => write!(f, "expected declaration, but got {got}"),
            Self::ExpectedTypeSpecifier(got) => {
                write!(f, "expected type specifier, but got {got}")
            }
            Self::BadArraySize(lexeme) => {
                write!(f, "array size must be a positive integer, got '{lexeme}'")
            }
            Self::NumberTooLarge(lexeme) => write!(f, "integer literal '{lexeme}' is too large"),
        }
    }
}

impl Display for SyntaxError {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Syntax error at {}: {}", self.loc, self.inner)
    }
}

impl std::error::Error for InnerSyntaxError {}
impl std::error::Error for SyntaxError {}
