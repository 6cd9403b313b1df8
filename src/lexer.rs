use crate::token::{Pos, Token, TokenKind};
use lazy_static::lazy_static;
use std::{collections::HashMap, iter::once, mem, str::Lines};

lazy_static! {
    static ref KEYWORDS: HashMap<&'static str, TokenKind> = HashMap::from([
        ("println", TokenKind::Println),
        ("print", TokenKind::Print),
        ("readint", TokenKind::Readint),
        ("do", TokenKind::Do),
        ("while", TokenKind::While),
        ("if", TokenKind::If),
        ("else", TokenKind::Else),
    ]);
}

/// Demand-driven tokenizer over the source lines.
///
/// Every line pulled from the source is echoed as a `; ` comment into the
/// listing queue, so the caller can interleave the source with the code
/// generated from it. Malformed characters become [`TokenKind::Error`] tokens;
/// the lexer itself never fails.
pub struct Lexer<'a> {
    lines: Lines<'a>,
    line: Vec<char>,
    line_number: usize,
    // 1-based column of `current`, which is also the index of the char after it
    column: usize,
    // `None` once the source is exhausted
    current: Option<char>,
    trace: bool,
    listing: Vec<String>,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            lines: src.lines(),
            line: Vec::new(),
            line_number: 0,
            column: 0,
            // a pending newline makes the first read pull line 1
            current: Some('\n'),
            trace: false,
            listing: Vec::new(),
        }
    }

    /// Also write a `; kd=.. im=..` trace line for every token produced.
    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    /// Comment lines produced since the last call, in order.
    pub fn take_listing(&mut self) -> Vec<String> {
        mem::take(&mut self.listing)
    }

    fn pos(&self) -> Pos {
        (self.line_number, self.column).into()
    }

    fn next_char(&mut self) {
        if self.current == Some('\n') {
            match self.lines.next() {
                Some(line) => {
                    self.listing.push(format!("; {line}"));
                    self.line = line.chars().chain(once('\n')).collect();
                    self.column = 0;
                    self.line_number += 1;
                }
                None => {
                    self.current = None;
                    return;
                }
            }
        }
        if self.current.is_some() {
            self.current = self.line.get(self.column).copied();
            self.column += 1;
        }
    }

    fn lookahead_char(&self) -> Option<char> {
        self.line.get(self.column).copied()
    }

    fn skip_blanks_and_comments(&mut self) {
        loop {
            while self.current.is_some_and(char::is_whitespace) {
                self.next_char();
            }
            if self.current == Some('/') && self.lookahead_char() == Some('/') {
                // drop the rest of the line
                self.current = Some('\n');
                self.next_char();
                continue;
            }
            break;
        }
    }

    fn scan_while(&mut self, image: &mut String, end: &mut Pos, f: impl Fn(char) -> bool) {
        while let Some(c) = self.current.filter(|&c| f(c)) {
            image.push(c);
            *end = self.pos();
            self.next_char();
        }
    }

    fn scan_string(&mut self, image: &mut String, end: &mut Pos) -> TokenKind {
        image.push('"');
        self.next_char();
        loop {
            match self.current {
                None => return TokenKind::Error,
                Some('"') => break,
                Some('\\') => {
                    self.next_char();
                    if self.current == Some('\n') {
                        self.next_char();
                    } else {
                        image.push('\\');
                    }
                }
                Some(_) => (),
            }
            match self.current {
                Some(c) => image.push(c),
                None => return TokenKind::Error,
            }
            self.next_char();
        }
        image.push('"');
        *end = self.pos();
        self.next_char();
        TokenKind::String
    }

    pub fn next_token(&mut self) -> Token {
        self.skip_blanks_and_comments();

        let begin = self.pos();
        let mut end = begin;
        let mut image = String::new();
        let kind = match self.current {
            None => {
                image.push_str("<EOF>");
                TokenKind::Eof
            }
            Some(c) if c.is_ascii_digit() => {
                self.scan_while(&mut image, &mut end, |c| c.is_ascii_digit());
                TokenKind::Unsigned
            }
            Some(c) if c.is_alphabetic() => {
                self.scan_while(&mut image, &mut end, char::is_alphanumeric);
                KEYWORDS.get(image.as_str()).copied().unwrap_or(TokenKind::Id)
            }
            Some('"') => self.scan_string(&mut image, &mut end),
            Some(c) => {
                image.push(c);
                self.next_char();
                TokenKind::punctuation(c).unwrap_or(TokenKind::Error)
            }
        };

        let token = Token {
            kind,
            image,
            begin,
            end,
        };
        if self.trace {
            self.listing.push(format!(
                "; kd={:>3} bL={:>3} bC={:>3} eL={:>3} eC={:>3} im={}",
                token.kind.code(),
                token.begin.line,
                token.begin.column,
                token.end.line,
                token.end.column,
                token.image
            ));
        }
        token
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(src: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(src);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token();
            let eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if eof {
                return tokens;
            }
        }
    }

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokens(src).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn keywords_and_identifiers() {
        use TokenKind::*;
        assert_eq!(
            kinds("println print readint do while if else printx x1"),
            vec![Println, Print, Readint, Do, While, If, Else, Id, Id, Eof]
        );
    }

    #[test]
    fn punctuation_and_error() {
        use TokenKind::*;
        assert_eq!(
            kinds("= ; ( ) + - * / { } # 12"),
            vec![
                Assign, Semicolon, LeftParen, RightParen, Plus, Minus, Times, Div, Open, Close,
                Error, Unsigned, Eof
            ]
        );
    }

    #[test]
    fn positions_are_one_based() {
        let t = tokens("x = 10;\n  y");
        assert_eq!(t[0].begin, Pos { line: 1, column: 1 });
        assert_eq!(t[2].image, "10");
        assert_eq!(t[2].begin, Pos { line: 1, column: 5 });
        assert_eq!(t[2].end, Pos { line: 1, column: 6 });
        assert_eq!(t[4].begin, Pos { line: 2, column: 3 });
    }

    #[test]
    fn comments_are_skipped() {
        use TokenKind::*;
        assert_eq!(
            kinds("// one\n   // two\nx // tail\n/ 2"),
            vec![Id, Div, Unsigned, Eof]
        );
    }

    #[test]
    fn string_escapes() {
        let t = tokens("\"a\\nb\" \"x\\\ny\" \"q\\\"r\"");
        assert_eq!(t[0].image, "\"a\\nb\"");
        assert_eq!(t[1].image, "\"xy\"");
        assert_eq!(t[2].image, "\"q\\\"r\"");
        assert!(t[..3].iter().all(|t| t.kind == TokenKind::String));
    }

    #[test]
    fn unterminated_string_is_error_token() {
        assert_eq!(kinds("\"abc"), vec![TokenKind::Error, TokenKind::Eof]);
    }

    #[test]
    fn eof_is_sticky() {
        let mut lexer = Lexer::new("x");
        lexer.next_token();
        for _ in 0..3 {
            assert_eq!(lexer.next_token().kind, TokenKind::Eof);
        }
    }

    #[test]
    fn echo_and_trace() {
        let mut lexer = Lexer::new("x\ny").with_trace(true);
        lexer.next_token();
        assert_eq!(
            lexer.take_listing(),
            vec!["; x", "; kd=  3 bL=  1 bC=  1 eL=  1 eC=  1 im=x"]
        );
        lexer.next_token();
        assert_eq!(lexer.take_listing()[0], "; y");
    }
}
