//! Lazy token producer over a source buffer (§4.1).
//!
//! `Scanner` holds only cursor state over a borrowed buffer -- `source`,
//! `start`, `current`, `line` -- and is plain `Copy`. That is deliberate:
//! the compiler saves/restores scanner state by value around a `transclude`
//! splice exactly the way the source's `getCurrentScanner`/
//! `replaceCurrentScanner` pair does, just without the process-global.

use crate::token::{Token, TokenKind};

#[derive(Clone, Copy, Debug)]
pub struct Scanner<'a> {
    source: &'a str,
    start: usize,
    current: usize,
    line: u32,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a str, starting_line: u32) -> Self {
        Self { source, start: 0, current: 0, line: starting_line }
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    fn bytes(&self) -> &'a [u8] {
        self.source.as_bytes()
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.bytes().len()
    }

    fn peek(&self) -> u8 {
        if self.is_at_end() {
            0
        } else {
            self.bytes()[self.current]
        }
    }

    fn peek_next(&self) -> u8 {
        if self.current + 1 >= self.bytes().len() {
            0
        } else {
            self.bytes()[self.current + 1]
        }
    }

    fn advance(&mut self) -> u8 {
        let c = self.bytes()[self.current];
        self.current += 1;
        c
    }

    fn matches(&mut self, expected: u8) -> bool {
        if self.is_at_end() || self.peek() != expected {
            return false;
        }
        self.current += 1;
        true
    }

    fn lexeme(&self) -> &'a str {
        &self.source[self.start..self.current]
    }

    fn make(&self, kind: TokenKind) -> Token<'a> {
        Token::new(kind, self.lexeme(), self.line)
    }

    fn skip_whitespace(&mut self) {
        loop {
            match self.peek() {
                b' ' | b'\r' | b'\t' => {
                    self.advance();
                }
                b'\n' => {
                    self.line += 1;
                    self.advance();
                }
                b'/' if self.peek_next() == b'/' => {
                    while self.peek() != b'\n' && !self.is_at_end() {
                        self.advance();
                    }
                }
                _ => return,
            }
        }
    }

    fn identifier(&mut self) -> Token<'a> {
        while is_alpha(self.peek()) || is_digit(self.peek()) {
            self.advance();
        }
        self.make(identifier_kind(self.lexeme()))
    }

    fn number(&mut self) -> Token<'a> {
        while is_digit(self.peek()) {
            self.advance();
        }
        if self.peek() == b'.' && is_digit(self.peek_next()) {
            self.advance();
            while is_digit(self.peek()) {
                self.advance();
            }
        }
        self.make(TokenKind::Number)
    }

    /// Consumes up to and including the matching `delimiter`. Per §4.1 the
    /// scanner itself does not interpret escapes; it only recognizes a
    /// backslash immediately followed by the delimiter as a pass-through so
    /// that an escaped quote does not prematurely end the string.
    fn string(&mut self, delimiter: u8) -> Token<'a> {
        while self.peek() != delimiter && !self.is_at_end() {
            if self.peek() == b'\n' {
                self.line += 1;
            }
            if self.peek() == b'\\' && self.peek_next() == delimiter {
                self.advance();
            }
            self.advance();
        }
        if self.is_at_end() {
            return Token::error("Unterminated string.", self.line);
        }
        self.advance();
        self.make(TokenKind::String)
    }

    /// Returns the next token, or an `Eof` token once the buffer is
    /// exhausted. Calling this again after `Eof` keeps returning `Eof`.
    pub fn scan_token(&mut self) -> Token<'a> {
        self.skip_whitespace();
        self.start = self.current;

        if self.is_at_end() {
            return self.make(TokenKind::Eof);
        }

        let c = self.advance();
        if is_alpha(c) {
            return self.identifier();
        }
        if is_digit(c) {
            return self.number();
        }

        match c {
            b'(' => self.make(TokenKind::LeftParen),
            b')' => self.make(TokenKind::RightParen),
            b'{' => self.make(TokenKind::LeftBrace),
            b'}' => self.make(TokenKind::RightBrace),
            b';' => self.make(TokenKind::Semicolon),
            b',' => self.make(TokenKind::Comma),
            b'.' => self.make(TokenKind::Dot),
            b'-' => self.make(TokenKind::Minus),
            b'+' => self.make(TokenKind::Plus),
            b'/' => self.make(TokenKind::Slash),
            b'*' => self.make(TokenKind::Star),
            b'!' => {
                let kind = if self.matches(b'=') { TokenKind::BangEqual } else { TokenKind::Bang };
                self.make(kind)
            }
            b'=' => {
                let kind = if self.matches(b'=') { TokenKind::EqualEqual } else { TokenKind::Equal };
                self.make(kind)
            }
            b'<' => {
                let kind = if self.matches(b'=') { TokenKind::LessEqual } else { TokenKind::Less };
                self.make(kind)
            }
            b'>' => {
                let kind = if self.matches(b'=') { TokenKind::GreaterEqual } else { TokenKind::Greater };
                self.make(kind)
            }
            b'"' => self.string(b'"'),
            b'\'' => self.string(b'\''),
            _ => Token::error("Unexpected character.", self.line),
        }
    }
}

fn is_alpha(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

fn is_digit(c: u8) -> bool {
    c.is_ascii_digit()
}

/// Hand-written keyword recognition, matching the trie the source builds
/// by switching on the first one-to-three characters (§4.1).
fn identifier_kind(text: &str) -> TokenKind {
    match text {
        "and" => TokenKind::And,
        "class" => TokenKind::Class,
        "echo" => TokenKind::Echo,
        "else" => TokenKind::Else,
        "exit" => TokenKind::Exit,
        "false" => TokenKind::False,
        "for" => TokenKind::For,
        "fun" => TokenKind::Fun,
        "if" => TokenKind::If,
        "nil" => TokenKind::Nil,
        "or" => TokenKind::Or,
        "print" => TokenKind::Print,
        "return" => TokenKind::Return,
        "super" => TokenKind::Super,
        "this" => TokenKind::This,
        "transclude" => TokenKind::Transclude,
        "true" => TokenKind::True,
        "unvar" => TokenKind::Unvar,
        "var" => TokenKind::Var,
        "while" => TokenKind::While,
        _ => TokenKind::Identifier,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let mut scanner = Scanner::new(source, 1);
        let mut out = Vec::new();
        loop {
            let tok = scanner.scan_token();
            let done = tok.kind == TokenKind::Eof;
            out.push(tok.kind);
            if done {
                break;
            }
        }
        out
    }

    #[test]
    fn scans_punctuation_and_operators() {
        assert_eq!(
            kinds("(){},.-+;/*!!====<<=>>="),
            vec![
                TokenKind::LeftParen,
                TokenKind::RightParen,
                TokenKind::LeftBrace,
                TokenKind::RightBrace,
                TokenKind::Comma,
                TokenKind::Dot,
                TokenKind::Minus,
                TokenKind::Plus,
                TokenKind::Semicolon,
                TokenKind::Slash,
                TokenKind::Star,
                TokenKind::Bang,
                TokenKind::BangEqual,
                TokenKind::EqualEqual,
                TokenKind::Equal,
                TokenKind::Less,
                TokenKind::LessEqual,
                TokenKind::Greater,
                TokenKind::GreaterEqual,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn recognizes_all_keywords_and_extensions() {
        let src = "and class echo else exit false for fun if nil or print return super this transclude true unvar var while";
        let expected = vec![
            TokenKind::And, TokenKind::Class, TokenKind::Echo, TokenKind::Else, TokenKind::Exit,
            TokenKind::False, TokenKind::For, TokenKind::Fun, TokenKind::If, TokenKind::Nil,
            TokenKind::Or, TokenKind::Print, TokenKind::Return, TokenKind::Super, TokenKind::This,
            TokenKind::Transclude, TokenKind::True, TokenKind::Unvar, TokenKind::Var, TokenKind::While,
            TokenKind::Eof,
        ];
        assert_eq!(kinds(src), expected);
    }

    #[test]
    fn distinguishes_identifiers_from_keyword_prefixes() {
        assert_eq!(kinds("andy"), vec![TokenKind::Identifier, TokenKind::Eof]);
        assert_eq!(kinds("classy"), vec![TokenKind::Identifier, TokenKind::Eof]);
    }

    #[test]
    fn scans_numbers_with_optional_fraction() {
        let mut scanner = Scanner::new("42 3.25 7.", 1);
        assert_eq!(scanner.scan_token().lexeme, "42");
        assert_eq!(scanner.scan_token().lexeme, "3.25");
        // A trailing dot with no following digit is not part of the number.
        assert_eq!(scanner.scan_token().lexeme, "7");
        assert_eq!(scanner.scan_token().kind, TokenKind::Dot);
    }

    #[test]
    fn strings_allow_embedded_newlines_and_track_line() {
        let mut scanner = Scanner::new("\"a\nb\"", 1);
        let tok = scanner.scan_token();
        assert_eq!(tok.kind, TokenKind::String);
        assert_eq!(tok.lexeme, "\"a\nb\"");
        assert_eq!(scanner.line(), 2);
    }

    #[test]
    fn unterminated_string_is_an_error_token() {
        let mut scanner = Scanner::new("\"abc", 1);
        let tok = scanner.scan_token();
        assert_eq!(tok.kind, TokenKind::Error);
        assert_eq!(tok.lexeme, "Unterminated string.");
    }

    #[test]
    fn backslash_quote_does_not_end_double_quoted_string() {
        let mut scanner = Scanner::new(r#""a\"b""#, 1);
        let tok = scanner.scan_token();
        assert_eq!(tok.kind, TokenKind::String);
        assert_eq!(tok.lexeme, r#""a\"b""#);
    }

    #[test]
    fn single_quoted_strings_scan_like_double_quoted() {
        let mut scanner = Scanner::new("'hi'", 1);
        let tok = scanner.scan_token();
        assert_eq!(tok.kind, TokenKind::String);
        assert_eq!(tok.lexeme, "'hi'");
    }

    #[test]
    fn line_comments_are_skipped() {
        assert_eq!(kinds("1 // comment\n2"), vec![TokenKind::Number, TokenKind::Number, TokenKind::Eof]);
    }

    #[test]
    fn unexpected_character_is_an_error_token() {
        let mut scanner = Scanner::new("@", 1);
        let tok = scanner.scan_token();
        assert_eq!(tok.kind, TokenKind::Error);
    }

    #[test]
    fn scanner_state_is_copy_for_save_restore() {
        let mut scanner = Scanner::new("1 2 3", 1);
        scanner.scan_token();
        let saved = scanner;
        scanner.scan_token();
        scanner.scan_token();
        assert_eq!(scanner.scan_token().kind, TokenKind::Eof);
        let mut restored = saved;
        assert_eq!(restored.scan_token().lexeme, "2");
    }
}
