mod cursor;
mod lexer_error;
#[cfg(test)]
mod lexer_tests;
mod token;

use cursor::Cursor;
pub use lexer_error::{InnerLexError, LexError};
pub use token::{Token, TokenKind};

pub type Tokens = Vec<Token>;

/// Skips whitespace and both comment forms until real input (or the end of
/// the buffer) is next. Block comments do not nest.
fn skip_trivia(cursor: &mut Cursor) -> Result<(), LexError> {
    loop {
        while cursor.take_if(char::is_whitespace).is_some() {}

        if cursor.peek() != Some('/') {
            return Ok(());
        }

        match cursor.peek_2nd() {
            Some('/') => {
                while cursor.take_if(|c| c != '\n').is_some() {}
            }
            Some('*') => {
                let (line, column) = (cursor.line(), cursor.column());
                cursor.take();
                cursor.take();
                loop {
                    match cursor.take() {
                        Some('*') if cursor.bump_if('/') => break,
                        Some(_) => (),
                        None => return Err(InnerLexError::UnterminatedComment.at(line, column)),
                    }
                }
            }
            _ => return Ok(()),
        }
    }
}

fn lex_identifier(cursor: &mut Cursor) -> Token {
    let line = cursor.line();
    let column = cursor.column();
    let mut word = String::new();

    while let Some(c) = cursor.take_if(|c| c.is_ascii_alphanumeric() || c == '_') {
        word.push(c);
    }

    let kind = TokenKind::keyword(&word).unwrap_or(TokenKind::Identifier);
    Token::new(kind, word, line, column)
}

/// Integer literals are an unsigned digit run; leading zeros stay in the
/// lexeme.
fn lex_number(cursor: &mut Cursor) -> Token {
    let line = cursor.line();
    let column = cursor.column();
    let mut digits = String::new();

    while let Some(c) = cursor.take_if(|c| c.is_ascii_digit()) {
        digits.push(c);
    }

    Token::new(TokenKind::Number, digits, line, column)
}

/// Greedy longest-match for the one- and two-character operators.
fn lex_operator(cursor: &mut Cursor) -> Result<Token, LexError> {
    let line = cursor.line();
    let column = cursor.column();
    let first = cursor.take().expect("caller checked");

    let two = |cursor: &mut Cursor, second: char, long: TokenKind, short: TokenKind| {
        if cursor.bump_if(second) {
            (long, format!("{first}{second}"))
        } else {
            (short, first.to_string())
        }
    };

    let (kind, lexeme) = match first {
        '=' => two(cursor, '=', TokenKind::EqualEqual, TokenKind::Assign),
        '!' => two(cursor, '=', TokenKind::NotEqual, TokenKind::Not),
        '<' => two(cursor, '=', TokenKind::LessEqual, TokenKind::Less),
        '>' => two(cursor, '=', TokenKind::GreaterEqual, TokenKind::Greater),
        '&' if cursor.bump_if('&') => (TokenKind::AndAnd, "&&".into()),
        '|' if cursor.bump_if('|') => (TokenKind::OrOr, "||".into()),
        '+' => (TokenKind::Plus, "+".into()),
        '-' => (TokenKind::Minus, "-".into()),
        '*' => (TokenKind::Star, "*".into()),
        '/' => (TokenKind::Slash, "/".into()),
        '%' => (TokenKind::Percent, "%".into()),
        '{' => (TokenKind::LBrace, "{".into()),
        '}' => (TokenKind::RBrace, "}".into()),
        '(' => (TokenKind::LParen, "(".into()),
        ')' => (TokenKind::RParen, ")".into()),
        '[' => (TokenKind::LBracket, "[".into()),
        ']' => (TokenKind::RBracket, "]".into()),
        ';' => (TokenKind::Semicolon, ";".into()),
        ',' => (TokenKind::Comma, ",".into()),
        c => return Err(InnerLexError::UnexpectedChar(c).at(line, column)),
    };

    Ok(Token::new(kind, lexeme, line, column))
}

/// Scans the whole buffer into a token sequence terminated by [TokenKind::Eof].
pub fn lex(input: &str) -> Result<Tokens, LexError> {
    let mut tokens = Tokens::new();
    let mut cursor = Cursor::new(input);

    loop {
        skip_trivia(&mut cursor)?;

        let Some(peek) = cursor.peek() else {
            tokens.push(Token::eof(cursor.line(), cursor.column()));
            return Ok(tokens);
        };

        let token = match peek {
            '0'..='9' => lex_number(&mut cursor),
            'a'..='z' | 'A'..='Z' | '_' => lex_identifier(&mut cursor),
            _ => lex_operator(&mut cursor)?,
        };
        tokens.push(token);
    }
}
