//! Statement parsing.

use crate::ast::{Block, Stmt, StmtKind};
use crate::lexer::TokenKind;
use crate::parser::core::{ParseResult, Parser};
use crate::parser::precedence::Precedence;

impl Parser {
    pub(crate) fn statement(&mut self) -> ParseResult<Stmt> {
        if self.match_token(&TokenKind::Let) {
            self.let_statement()
        } else if self.match_token(&TokenKind::Return) {
            self.return_statement()
        } else {
            self.expression_statement()
        }
    }

    fn let_statement(&mut self) -> ParseResult<Stmt> {
        let span = self.previous().span;
        let name = self.expect_identifier()?;
        self.expect(&TokenKind::Equal)?;
        let value = self.expression(Precedence::Lowest)?;
        self.match_token(&TokenKind::Semicolon);
        Ok(Stmt::new(StmtKind::Let { name, value }, span))
    }

    fn return_statement(&mut self) -> ParseResult<Stmt> {
        let span = self.previous().span;
        let value = self.expression(Precedence::Lowest)?;
        self.match_token(&TokenKind::Semicolon);
        Ok(Stmt::new(StmtKind::Return(value), span))
    }

    fn expression_statement(&mut self) -> ParseResult<Stmt> {
        let expr = self.expression(Precedence::Lowest)?;
        let span = expr.span;
        self.match_token(&TokenKind::Semicolon);
        Ok(Stmt::new(StmtKind::Expression(expr), span))
    }

    /// Parse a braced statement block.
    pub(crate) fn block(&mut self) -> ParseResult<Block> {
        let span = self.expect(&TokenKind::LeftBrace)?.span;
        let mut statements = Vec::new();
        while !self.check(&TokenKind::RightBrace) && !self.is_at_end() {
            statements.push(self.statement()?);
        }
        self.expect(&TokenKind::RightBrace)?;
        Ok(Block { statements, span })
    }
}
