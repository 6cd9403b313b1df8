use crate::{lexer::Lexer, token::Token};
use std::collections::VecDeque;

/// Token window over the lexer with unbounded lookahead.
///
/// `peek(1)` is the current token, `peek(2)` the one after it, and so on;
/// `peek(0)` is the token most recently consumed by [`TokenBuffer::advance`].
/// Tokens fetched by a peek are cached, so looking at the same depth again
/// does not touch the lexer.
pub struct TokenBuffer<'a> {
    lexer: Lexer<'a>,
    pending: VecDeque<Token>,
    previous: Option<Token>,
}

impl<'a> TokenBuffer<'a> {
    pub fn new(mut lexer: Lexer<'a>) -> Self {
        let first = lexer.next_token();
        Self {
            lexer,
            pending: VecDeque::from([first]),
            previous: None,
        }
    }

    fn fill(&mut self, depth: usize) {
        while self.pending.len() < depth {
            let token = self.lexer.next_token();
            self.pending.push_back(token);
        }
    }

    pub fn current(&self) -> &Token {
        &self.pending[0]
    }

    pub fn peek(&mut self, i: usize) -> Option<&Token> {
        if i == 0 {
            return self.previous.as_ref();
        }
        self.fill(i);
        self.pending.get(i - 1)
    }

    /// Commit to the next token.
    pub fn advance(&mut self) {
        // keep a current token behind the one being consumed
        self.fill(2);
        self.previous = self.pending.pop_front();
    }

    /// Source echo and trace lines the lexer has produced so far.
    pub fn take_listing(&mut self) -> Vec<String> {
        self.lexer.take_listing()
    }
}
