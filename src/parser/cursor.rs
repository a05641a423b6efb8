use crate::ast::SourceLoc;
use crate::lexer::{Token, TokenKind};
use crate::parser::{InnerSyntaxError, Result};

/// Token cursor with one-token lookahead plus the targeted two-token peek
/// the expression grammar needs.
///
/// The token slice always ends in an end-of-file token, so `peek` never runs
/// out: past-the-end positions clamp to that final token.
#[derive(Debug)]
pub struct Cursor<'a> {
    tokens: &'a [Token],
    position: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(tokens: &'a [Token]) -> Self {
        assert!(
            tokens.last().is_some_and(|t| t.is(TokenKind::Eof)),
            "internal error: token stream is not EOF-terminated"
        );
        Self {
            tokens,
            position: 0,
        }
    }

    pub fn peek(&self) -> &'a Token {
        self.nth(self.position)
    }

    pub fn peek_nth(&self, n: usize) -> &'a Token {
        self.nth(self.position + n)
    }

    fn nth(&self, n: usize) -> &'a Token {
        let clamped = n.min(self.tokens.len() - 1);
        &self.tokens[clamped]
    }

    pub fn previous(&self) -> Option<&'a Token> {
        self.position.checked_sub(1).map(|p| self.nth(p))
    }

    pub fn at_end(&self) -> bool {
        self.peek().is(TokenKind::Eof)
    }

    pub fn check(&self, kind: TokenKind) -> bool {
        self.peek().is(kind)
    }

    pub fn advance(&mut self) -> &'a Token {
        let token = self.peek();
        if !self.at_end() {
            self.position += 1;
        }
        token
    }

    pub fn bump_if(&mut self, kind: TokenKind) -> bool {
        let matched = self.check(kind);
        if matched {
            self.advance();
        }
        matched
    }

    pub fn expect(&mut self, kind: TokenKind) -> Result<&'a Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            let got = self.peek();
            Err(InnerSyntaxError::ExpectedButGot(kind, got.kind).at(self.loc()))
        }
    }

    pub fn loc(&self) -> SourceLoc {
        let token = self.peek();
        SourceLoc::new(token.line, token.column)
    }
}
