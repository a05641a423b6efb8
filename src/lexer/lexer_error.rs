use std::{error, fmt};

#[derive(Debug, Eq, PartialEq)]
pub enum InnerLexError {
    UnexpectedChar(char),
    UnterminatedComment,
}

/// A lexical error with the position it was raised at. The scanner does not
/// recover; the first error aborts the stage.
#[derive(Debug, Eq, PartialEq)]
pub struct LexError {
    inner: InnerLexError,
    line: u32,
    column: u32,
}

impl LexError {
    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn column(&self) -> u32 {
        self.column
    }

    pub fn inner(&self) -> &InnerLexError {
        &self.inner
    }
}

impl InnerLexError {
    pub(super) fn at(self, line: u32, column: u32) -> LexError {
        LexError {
            inner: self,
            line,
            column,
        }
    }
}

impl fmt::Display for InnerLexError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::UnexpectedChar(c) => write!(f, "unexpected character '{c}'"),
            Self::UnterminatedComment => write!(f, "unterminated block comment"),
        }
    }
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Lexical error at line {}, column {}: {}",
            self.line, self.column, self.inner
        )
    }
}

impl error::Error for InnerLexError {}
impl error::Error for LexError {}
