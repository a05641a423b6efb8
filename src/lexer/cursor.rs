use std::str::Chars;

/// Character cursor over the source buffer with line/column tracking.
///
/// A newline resets the column to 1 and bumps the line; every other taken
/// character advances the column.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    chars: Chars<'a>,
    line: u32,
    column: u32,
}

impl<'a> Cursor<'a> {
    pub fn new(s: &'a str) -> Self {
        Self {
            chars: s.chars(),
            line: 1,
            column: 1,
        }
    }

    pub fn peek(&self) -> Option<char> {
        self.chars.clone().next()
    }

    pub fn peek_2nd(&self) -> Option<char> {
        // cheap to clone
        let mut chars = self.chars.clone();
        chars.next();
        chars.next()
    }

    pub fn take(&mut self) -> Option<char> {
        let c = self.chars.next();
        match c {
            Some('\n') => {
                self.line += 1;
                self.column = 1;
            }
            Some(_) => self.column += 1,
            None => (),
        }
        c
    }

    pub fn take_if(&mut self, p: impl FnOnce(char) -> bool) -> Option<char> {
        let c = self.peek().filter(|c| p(*c))?;
        self.take();
        Some(c)
    }

    pub fn bump_if(&mut self, expected: char) -> bool {
        let matched = self.peek() == Some(expected);
        if matched {
            self.take();
        }
        matched
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn column(&self) -> u32 {
        self.column
    }
}
