use crate::{
    codegen::{CodeGen, Op},
    error::Error,
    lexer::Lexer,
    lookahead::TokenBuffer,
    symtab::{SymTab, SymbolId},
    token::{Token, TokenKind},
};
use std::io::Write;

type Result<T> = std::result::Result<T, Error>;

/// Recursive-descent parser that emits code as each production reduces.
///
/// Expression productions return the symbol holding their value: a variable,
/// a constant, or a temporary computed into by the generator. Binary
/// operations on two constants are folded here and never reach the generator.
pub struct Parser<'a, W: Write> {
    tokens: TokenBuffer<'a>,
    gen: CodeGen<W>,
}

impl<'a, W: Write> Parser<'a, W> {
    pub fn new(lexer: Lexer<'a>, out: W) -> Self {
        Self {
            tokens: TokenBuffer::new(lexer),
            gen: CodeGen::new(out),
        }
    }

    pub fn symtab(&self) -> &SymTab {
        &self.gen.symtab
    }

    pub fn parse(&mut self) -> Result<()> {
        self.sync()?;
        self.program()
    }

    // Move pending source echo into the listing ahead of any further code.
    fn sync(&mut self) -> Result<()> {
        let lines = self.tokens.take_listing();
        Ok(self.gen.comments(lines)?)
    }

    fn current(&self) -> &Token {
        self.tokens.current()
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.current().kind == kind
    }

    fn peek_kind(&mut self, i: usize) -> Result<TokenKind> {
        let kind = self.tokens.peek(i).map_or(TokenKind::Eof, |token| token.kind);
        self.sync()?;
        Ok(kind)
    }

    fn advance(&mut self) -> Result<()> {
        self.tokens.advance();
        self.sync()
    }

    fn error(&self, expected: impl Into<String>) -> Error {
        Error::Syntax {
            found: self.current().located(),
            expected: expected.into(),
        }
    }

    fn consume(&mut self, kind: TokenKind) -> Result<()> {
        if self.at(kind) {
            self.advance()
        } else {
            Err(self.error(format!("Expecting {kind}")))
        }
    }

    fn take(&mut self, kind: TokenKind) -> Result<Token> {
        let token = self.current().clone();
        self.consume(kind)?;
        Ok(token)
    }

    fn variable(&mut self) -> Result<SymbolId> {
        let token = self.take(TokenKind::Id)?;
        Ok(self.gen.symtab.variable(&token.image))
    }

    fn program(&mut self) -> Result<()> {
        self.statement_list()?;
        if !self.at(TokenKind::Eof) {
            return Err(self.error(format!("Expecting {}", TokenKind::Eof)));
        }
        Ok(self.gen.end_code()?)
    }

    fn statement_list(&mut self) -> Result<()> {
        loop {
            match self.current().kind {
                TokenKind::Id
                | TokenKind::Println
                | TokenKind::Print
                | TokenKind::Readint
                | TokenKind::Do
                | TokenKind::While
                | TokenKind::If => self.statement()?,
                TokenKind::Semicolon => self.consume(TokenKind::Semicolon)?,
                TokenKind::Open => self.block()?,
                TokenKind::Close | TokenKind::Eof => return Ok(()),
                _ => return Err(self.error("Expecting statement or <EOF>")),
            }
        }
    }

    fn statement(&mut self) -> Result<()> {
        let mark = self.gen.temp_mark();
        match self.current().kind {
            TokenKind::Id => self.assignment()?,
            TokenKind::Println => self.print(TokenKind::Println)?,
            TokenKind::Print => self.print(TokenKind::Print)?,
            TokenKind::Readint => self.readint()?,
            TokenKind::Do => self.do_while()?,
            TokenKind::While => self.while_loop()?,
            TokenKind::If => self.if_chain()?,
            TokenKind::Open => self.block()?,
            _ => return Err(self.error("Expecting statement")),
        }
        self.gen.release_temps(mark, None);
        Ok(())
    }

    fn block(&mut self) -> Result<()> {
        self.consume(TokenKind::Open)?;
        self.statement_list()?;
        self.consume(TokenKind::Close)
    }

    fn assignment(&mut self) -> Result<()> {
        let target = self.variable()?;
        self.consume(TokenKind::Assign)?;
        let value = self.assignment_tail()?;
        self.gen.assign(target, value)?;
        self.consume(TokenKind::Semicolon)
    }

    // `ID '=' ...` continues the chain; anything else is the final expression.
    fn assignment_tail(&mut self) -> Result<SymbolId> {
        if self.at(TokenKind::Id) && self.peek_kind(2)? == TokenKind::Assign {
            let target = self.variable()?;
            self.consume(TokenKind::Assign)?;
            let value = self.assignment_tail()?;
            self.gen.assign(target, value)?;
            Ok(target)
        } else {
            self.expr()
        }
    }

    fn print(&mut self, keyword: TokenKind) -> Result<()> {
        self.consume(keyword)?;
        self.consume(TokenKind::LeftParen)?;
        match self.current().kind {
            TokenKind::String => {
                let label = self.gen.string_label(&self.tokens.current().image);
                self.advance()?;
                self.gen.print_string(label)?;
            }
            TokenKind::RightParen => (),
            _ => {
                let value = self.expr()?;
                self.gen.print_value(value)?;
            }
        }
        if keyword == TokenKind::Println {
            self.gen.newline()?;
        }
        self.consume(TokenKind::RightParen)?;
        self.consume(TokenKind::Semicolon)
    }

    fn readint(&mut self) -> Result<()> {
        self.consume(TokenKind::Readint)?;
        self.consume(TokenKind::LeftParen)?;
        let target = self.variable()?;
        self.gen.read_int(target)?;
        self.consume(TokenKind::RightParen)?;
        self.consume(TokenKind::Semicolon)
    }

    fn do_while(&mut self) -> Result<()> {
        let start = self.gen.do_head()?;
        self.consume(TokenKind::Do)?;
        self.statement()?;
        self.consume(TokenKind::While)?;
        self.consume(TokenKind::LeftParen)?;
        let cond = self.variable()?;
        self.gen.do_tail(cond, &start)?;
        self.consume(TokenKind::RightParen)?;
        self.consume(TokenKind::Semicolon)
    }

    fn while_loop(&mut self) -> Result<()> {
        self.consume(TokenKind::While)?;
        self.consume(TokenKind::LeftParen)?;
        let start = self.gen.new_label();
        let end = self.gen.new_label();
        let cond = self.variable()?;
        self.gen.while_head(cond, &start, &end)?;
        self.consume(TokenKind::RightParen)?;
        self.statement()?;
        Ok(self.gen.while_tail(cond, &start, &end)?)
    }

    /// `if (c) s (else if (c) s)* (else s)?`
    ///
    /// Each `else` label is only reachable from the failed test before it, so
    /// the accumulator state after that test is restored before the arm.
    fn if_chain(&mut self) -> Result<()> {
        let mut next_arm = self.gen.new_label();
        self.consume(TokenKind::If)?;
        self.consume(TokenKind::LeftParen)?;
        let cond = self.variable()?;
        self.gen.branch_if_zero(cond, &next_arm)?;
        let mut tested = self.gen.acc();
        self.consume(TokenKind::RightParen)?;
        self.statement()?;

        if self.at(TokenKind::Else) {
            let end = self.gen.new_label();
            self.gen.jump(&end)?;
            loop {
                self.gen.emit_label(&next_arm)?;
                self.consume(TokenKind::Else)?;
                self.gen.set_acc(tested.clone());
                if !self.at(TokenKind::If) {
                    self.statement()?;
                    break;
                }
                next_arm = self.gen.new_label();
                self.consume(TokenKind::If)?;
                self.consume(TokenKind::LeftParen)?;
                let cond = self.variable()?;
                self.gen.branch_if_zero(cond, &next_arm)?;
                tested = self.gen.acc();
                self.consume(TokenKind::RightParen)?;
                self.statement()?;
                if !self.at(TokenKind::Else) {
                    self.gen.emit_label(&next_arm)?;
                    break;
                }
                self.gen.jump(&end)?;
            }
            self.gen.emit_label(&end)?;
        } else {
            self.gen.emit_label(&next_arm)?;
        }
        self.gen.forget_acc();
        Ok(())
    }

    // Fold two constants, otherwise emit the operation.
    fn combine(&mut self, op: &Token, left: SymbolId, right: SymbolId) -> Result<SymbolId> {
        let op_kind = match op.kind {
            TokenKind::Plus => Op::Add,
            TokenKind::Minus => Op::Sub,
            TokenKind::Times => Op::Mult,
            TokenKind::Div => Op::Div,
            kind => unreachable!("{kind} is not a binary operator"),
        };
        let symtab = &mut self.gen.symtab;
        match (symtab.constant_value(left), symtab.constant_value(right)) {
            (Some(lhs), Some(rhs)) => match op_kind.fold(lhs, rhs) {
                Some(value) => Ok(symtab.constant(value)),
                None => Err(Error::DivideByZero(op.begin)),
            },
            _ => Ok(self.gen.binary(op_kind, left, right)?),
        }
    }

    fn expr(&mut self) -> Result<SymbolId> {
        let mark = self.gen.temp_mark();
        let mut left = self.term()?;
        loop {
            match self.current().kind {
                TokenKind::Plus | TokenKind::Minus => {
                    let op = self.take(self.current().kind)?;
                    let right = self.term()?;
                    left = self.combine(&op, left, right)?;
                }
                TokenKind::RightParen | TokenKind::Semicolon => break,
                _ => return Err(self.error("Expecting \"+\", \"-\", \")\", or \";\"")),
            }
        }
        self.gen.release_temps(mark, Some(left));
        Ok(left)
    }

    fn term(&mut self) -> Result<SymbolId> {
        let mark = self.gen.temp_mark();
        let mut left = self.factor()?;
        loop {
            match self.current().kind {
                TokenKind::Times | TokenKind::Div => {
                    let op = self.take(self.current().kind)?;
                    let right = self.factor()?;
                    left = self.combine(&op, left, right)?;
                }
                TokenKind::Plus
                | TokenKind::Minus
                | TokenKind::RightParen
                | TokenKind::Semicolon => break,
                _ => return Err(self.error("Expecting op, \")\", or \";\"")),
            }
        }
        self.gen.release_temps(mark, Some(left));
        Ok(left)
    }

    fn factor(&mut self) -> Result<SymbolId> {
        match self.current().kind {
            TokenKind::Unsigned => {
                let token = self.take(TokenKind::Unsigned)?;
                let value = token
                    .image
                    .parse()
                    .map_err(|_| Error::IntegerOutOfRange(token.located()))?;
                Ok(self.gen.symtab.constant(value))
            }
            TokenKind::Plus => {
                self.advance()?;
                self.factor()
            }
            TokenKind::Minus => {
                // a run of signs collapses to its parity
                let mut negate = false;
                while let kind @ (TokenKind::Minus | TokenKind::Plus) = self.current().kind {
                    negate ^= kind == TokenKind::Minus;
                    self.advance()?;
                }
                let operand = self.factor()?;
                if !negate {
                    return Ok(operand);
                }
                match self.gen.symtab.constant_value(operand) {
                    Some(value) => Ok(self.gen.symtab.constant(value.wrapping_neg())),
                    None => {
                        let minus_one = self.gen.symtab.constant(-1);
                        Ok(self.gen.binary(Op::Mult, minus_one, operand)?)
                    }
                }
            }
            TokenKind::Id => self.variable(),
            TokenKind::LeftParen => {
                self.advance()?;
                let value = self.expr()?;
                self.consume(TokenKind::RightParen)?;
                Ok(value)
            }
            _ => Err(self.error("Expecting factor")),
        }
    }
}
