use super::*;

fn kinds(input: &str) -> Vec<TokenKind> {
    lex(input)
        .expect("should lex")
        .into_iter()
        .map(|t| t.kind)
        .collect()
}

#[test]
fn test_minimal_program() {
    use TokenKind::*;
    let lexed = kinds("int main(void) {}");
    let expected = vec![Int, Identifier, LParen, Void, RParen, LBrace, RBrace, Eof];
    assert_eq!(expected, lexed);
}

#[test]
fn test_final_token_is_eof() {
    let tokens = lex("").expect("should lex");
    assert_eq!(1, tokens.len());
    assert!(tokens[0].is(TokenKind::Eof));
    assert_eq!((1, 1), (tokens[0].line, tokens[0].column));
}

#[test]
fn test_longest_match_operators() {
    use TokenKind::*;
    let lexed = kinds("== = != ! <= < >= > && ||");
    let expected = vec![
        EqualEqual, Assign, NotEqual, Not, LessEqual, Less, GreaterEqual, Greater, AndAnd, OrOr,
        Eof,
    ];
    assert_eq!(expected, lexed);
}

#[test]
fn test_adjacent_operator_pairs() {
    use TokenKind::*;
    // `==-` must split as `==` then `-`, not `=` `=-`
    let lexed = kinds("a==-1");
    assert_eq!(vec![Identifier, EqualEqual, Minus, Number, Eof], lexed);
}

#[test]
fn test_keywords_vs_identifiers() {
    let tokens = lex("int integer while whilex _if").expect("should lex");
    let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
    use TokenKind::*;
    assert_eq!(
        vec![Int, Identifier, While, Identifier, Identifier, Eof],
        kinds
    );
    assert_eq!("integer", tokens[1].lexeme);
    assert_eq!("_if", tokens[4].lexeme);
}

#[test]
fn test_leading_zeros_preserved() {
    let tokens = lex("007").expect("should lex");
    assert_eq!(TokenKind::Number, tokens[0].kind);
    assert_eq!("007", tokens[0].lexeme);
}

#[test]
fn test_line_and_column_tracking() {
    let tokens = lex("int x;\n  x = 1;").expect("should lex");
    // `int` at 1:1, `x` at 1:5, `;` at 1:6
    assert_eq!((1, 1), (tokens[0].line, tokens[0].column));
    assert_eq!((1, 5), (tokens[1].line, tokens[1].column));
    assert_eq!((1, 6), (tokens[2].line, tokens[2].column));
    // second line after the indent: `x` at 2:3
    assert_eq!((2, 3), (tokens[3].line, tokens[3].column));
}

#[test]
fn test_crlf_line_endings() {
    let tokens = lex("int x;\r\nint y;").expect("should lex");
    let y_decl = &tokens[3];
    assert_eq!(2, y_decl.line);
    assert_eq!(1, y_decl.column);
}

#[test]
fn test_line_comment() {
    use TokenKind::*;
    let lexed = kinds("x // trailing = junk\ny");
    assert_eq!(vec![Identifier, Identifier, Eof], lexed);
}

#[test]
fn test_block_comment() {
    use TokenKind::*;
    let lexed = kinds("x /* spans\ntwo lines */ y");
    assert_eq!(vec![Identifier, Identifier, Eof], lexed);
}

#[test]
fn test_block_comment_does_not_nest() {
    use TokenKind::*;
    // the first `*/` closes the comment
    let lexed = kinds("/* /* */ x");
    assert_eq!(vec![Identifier, Eof], lexed);
}

#[test]
fn test_unterminated_block_comment() {
    let err = lex("x /* never closed").expect_err("should fail");
    assert_eq!(&InnerLexError::UnterminatedComment, err.inner());
    assert_eq!(1, err.line());
    assert_eq!(3, err.column());
}

#[test]
fn test_unexpected_character() {
    let err = lex("int main(void) {\nreturn 0@1;\n}").expect_err("should fail");
    assert_eq!(&InnerLexError::UnexpectedChar('@'), err.inner());
    assert_eq!(2, err.line());
    assert_eq!(9, err.column());
}

#[test]
fn test_error_display_mentions_offender() {
    let err = lex("x = @;").expect_err("should fail");
    let message = err.to_string();
    assert!(message.contains('@'));
    assert!(message.contains("line 1"));
}

#[test]
fn test_lexeme_roundtrip() {
    let source = "int main(void) { int a[10]; a[0] = 3 % 2; return !a[0]; }";
    let tokens = lex(source).expect("should lex");

    let spaced: String = tokens
        .iter()
        .map(|t| t.lexeme.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    let again = lex(&spaced).expect("should lex again");

    let a: Vec<_> = tokens.iter().map(|t| (t.kind, &t.lexeme)).collect();
    let b: Vec<_> = again.iter().map(|t| (t.kind, &t.lexeme)).collect();
    assert_eq!(a, b);
}
