//! Character scanner turning source text into tokens.

use crate::error::LexerError;
use crate::lexer::token::{Token, TokenKind};
use crate::span::Span;

/// The Monkey scanner.
pub struct Scanner {
    chars: Vec<char>,
    current: usize,
    line: usize,
    column: usize,
}

impl Scanner {
    pub fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            current: 0,
            line: 1,
            column: 1,
        }
    }

    /// Scan the whole input. The returned stream always ends with an Eof token.
    pub fn scan_tokens(mut self) -> Result<Vec<Token>, LexerError> {
        let mut tokens = Vec::new();

        loop {
            self.skip_whitespace();
            let span = Span::new(self.line, self.column);

            if self.is_at_end() {
                tokens.push(Token::new(TokenKind::Eof, span));
                return Ok(tokens);
            }

            let c = self.advance();
            let kind = match c {
                '+' => TokenKind::Plus,
                '-' => TokenKind::Minus,
                '*' => TokenKind::Star,
                '/' => TokenKind::Slash,
                '<' => TokenKind::Less,
                '>' => TokenKind::Greater,
                ',' => TokenKind::Comma,
                ':' => TokenKind::Colon,
                ';' => TokenKind::Semicolon,
                '(' => TokenKind::LeftParen,
                ')' => TokenKind::RightParen,
                '{' => TokenKind::LeftBrace,
                '}' => TokenKind::RightBrace,
                '[' => TokenKind::LeftBracket,
                ']' => TokenKind::RightBracket,
                '=' => {
                    if self.match_char('=') {
                        TokenKind::EqualEqual
                    } else {
                        TokenKind::Equal
                    }
                }
                '!' => {
                    if self.match_char('=') {
                        TokenKind::BangEqual
                    } else {
                        TokenKind::Bang
                    }
                }
                '"' => self.string(span)?,
                c if c.is_ascii_digit() => self.number(c, span)?,
                c if c.is_ascii_alphabetic() || c == '_' => self.identifier(c),
                other => return Err(LexerError::UnexpectedChar(other, span)),
            };

            tokens.push(Token::new(kind, span));
        }
    }

    fn skip_whitespace(&mut self) {
        while !self.is_at_end() && self.peek().is_whitespace() {
            self.advance();
        }
    }

    fn string(&mut self, span: Span) -> Result<TokenKind, LexerError> {
        let mut value = String::new();

        loop {
            if self.is_at_end() {
                return Err(LexerError::UnterminatedString(span));
            }
            match self.advance() {
                '"' => return Ok(TokenKind::StringLiteral(value)),
                '\\' => {
                    if self.is_at_end() {
                        return Err(LexerError::UnterminatedString(span));
                    }
                    match self.advance() {
                        'n' => value.push('\n'),
                        't' => value.push('\t'),
                        'r' => value.push('\r'),
                        '"' => value.push('"'),
                        '\\' => value.push('\\'),
                        other => return Err(LexerError::InvalidEscape(other, span)),
                    }
                }
                c => value.push(c),
            }
        }
    }

    fn number(&mut self, first: char, span: Span) -> Result<TokenKind, LexerError> {
        let mut literal = String::from(first);
        while !self.is_at_end() && self.peek().is_ascii_digit() {
            literal.push(self.advance());
        }
        literal
            .parse::<i64>()
            .map(TokenKind::IntLiteral)
            .map_err(|_| LexerError::InvalidNumber(literal, span))
    }

    fn identifier(&mut self, first: char) -> TokenKind {
        let mut literal = String::from(first);
        while !self.is_at_end() && (self.peek().is_ascii_alphanumeric() || self.peek() == '_') {
            literal.push(self.advance());
        }
        TokenKind::keyword(&literal).unwrap_or_else(|| TokenKind::Identifier(literal))
    }

    fn advance(&mut self) -> char {
        let c = self.chars[self.current];
        self.current += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        c
    }

    fn peek(&self) -> char {
        self.chars[self.current]
    }

    fn match_char(&mut self, expected: char) -> bool {
        if !self.is_at_end() && self.peek() == expected {
            self.advance();
            true
        } else {
            false
        }
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.chars.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Scanner::new(source)
            .scan_tokens()
            .expect("lexer error")
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_operators_and_delimiters() {
        let input = "=+(){},;[]:!-/*<>";
        assert_eq!(
            kinds(input),
            vec![
                TokenKind::Equal,
                TokenKind::Plus,
                TokenKind::LeftParen,
                TokenKind::RightParen,
                TokenKind::LeftBrace,
                TokenKind::RightBrace,
                TokenKind::Comma,
                TokenKind::Semicolon,
                TokenKind::LeftBracket,
                TokenKind::RightBracket,
                TokenKind::Colon,
                TokenKind::Bang,
                TokenKind::Minus,
                TokenKind::Slash,
                TokenKind::Star,
                TokenKind::Less,
                TokenKind::Greater,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_full_program() {
        let input = r#"
            let five = 5;
            let add = fn(x, y) { x + y; };
            if (five < 10) { return true; } else { return false; }
            10 == 10; 10 != 9;
            "foobar"
            [1, 2];
            {"foo": "bar"}
        "#;

        let expected = vec![
            TokenKind::Let,
            TokenKind::Identifier("five".to_string()),
            TokenKind::Equal,
            TokenKind::IntLiteral(5),
            TokenKind::Semicolon,
            TokenKind::Let,
            TokenKind::Identifier("add".to_string()),
            TokenKind::Equal,
            TokenKind::Fn,
            TokenKind::LeftParen,
            TokenKind::Identifier("x".to_string()),
            TokenKind::Comma,
            TokenKind::Identifier("y".to_string()),
            TokenKind::RightParen,
            TokenKind::LeftBrace,
            TokenKind::Identifier("x".to_string()),
            TokenKind::Plus,
            TokenKind::Identifier("y".to_string()),
            TokenKind::Semicolon,
            TokenKind::RightBrace,
            TokenKind::Semicolon,
            TokenKind::If,
            TokenKind::LeftParen,
            TokenKind::Identifier("five".to_string()),
            TokenKind::Less,
            TokenKind::IntLiteral(10),
            TokenKind::RightParen,
            TokenKind::LeftBrace,
            TokenKind::Return,
            TokenKind::BoolLiteral(true),
            TokenKind::Semicolon,
            TokenKind::RightBrace,
            TokenKind::Else,
            TokenKind::LeftBrace,
            TokenKind::Return,
            TokenKind::BoolLiteral(false),
            TokenKind::Semicolon,
            TokenKind::RightBrace,
            TokenKind::IntLiteral(10),
            TokenKind::EqualEqual,
            TokenKind::IntLiteral(10),
            TokenKind::Semicolon,
            TokenKind::IntLiteral(10),
            TokenKind::BangEqual,
            TokenKind::IntLiteral(9),
            TokenKind::Semicolon,
            TokenKind::StringLiteral("foobar".to_string()),
            TokenKind::LeftBracket,
            TokenKind::IntLiteral(1),
            TokenKind::Comma,
            TokenKind::IntLiteral(2),
            TokenKind::RightBracket,
            TokenKind::Semicolon,
            TokenKind::LeftBrace,
            TokenKind::StringLiteral("foo".to_string()),
            TokenKind::Colon,
            TokenKind::StringLiteral("bar".to_string()),
            TokenKind::RightBrace,
            TokenKind::Eof,
        ];

        assert_eq!(kinds(input), expected);
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            kinds(r#""a\nb\t\"c\"""#),
            vec![
                TokenKind::StringLiteral("a\nb\t\"c\"".to_string()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_unterminated_string() {
        let err = Scanner::new("\"abc").scan_tokens().unwrap_err();
        assert!(matches!(err, LexerError::UnterminatedString(_)));
    }

    #[test]
    fn test_unexpected_char() {
        let err = Scanner::new("let x = @;").scan_tokens().unwrap_err();
        assert!(matches!(err, LexerError::UnexpectedChar('@', _)));
    }

    #[test]
    fn test_spans() {
        let tokens = Scanner::new("let x\nx").scan_tokens().expect("lexer error");
        assert_eq!(tokens[0].span, Span::new(1, 1));
        assert_eq!(tokens[1].span, Span::new(1, 5));
        assert_eq!(tokens[2].span, Span::new(2, 1));
    }

    #[test]
    fn test_int_overflow() {
        let err = Scanner::new("99999999999999999999").scan_tokens().unwrap_err();
        assert!(matches!(err, LexerError::InvalidNumber(_, _)));
    }
}
