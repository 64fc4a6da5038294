//! Expression parsing (Pratt style).

use crate::ast::{BinaryOp, Expr, ExprKind, UnaryOp};
use crate::error::ParserError;
use crate::lexer::TokenKind;
use crate::parser::core::{ParseResult, Parser};
use crate::parser::precedence::{get_precedence, Precedence};
use crate::span::Span;

impl Parser {
    pub(crate) fn expression(&mut self, precedence: Precedence) -> ParseResult<Expr> {
        let mut left = self.prefix()?;

        while !self.check(&TokenKind::Semicolon) && precedence < get_precedence(&self.peek().kind)
        {
            left = self.infix(left)?;
        }

        Ok(left)
    }

    fn prefix(&mut self) -> ParseResult<Expr> {
        if self.is_at_end() {
            return Err(ParserError::UnexpectedEof(self.current_span()));
        }

        let token = self.advance();
        let span = token.span;

        match token.kind {
            TokenKind::Identifier(name) => Ok(Expr::new(ExprKind::Identifier(name), span)),
            TokenKind::IntLiteral(n) => Ok(Expr::new(ExprKind::IntLiteral(n), span)),
            TokenKind::StringLiteral(s) => Ok(Expr::new(ExprKind::StringLiteral(s), span)),
            TokenKind::BoolLiteral(b) => Ok(Expr::new(ExprKind::BoolLiteral(b), span)),
            TokenKind::Bang => self.prefix_operation(UnaryOp::Not, span),
            TokenKind::Minus => self.prefix_operation(UnaryOp::Negate, span),
            TokenKind::LeftParen => {
                let expr = self.expression(Precedence::Lowest)?;
                self.expect(&TokenKind::RightParen)?;
                Ok(expr)
            }
            TokenKind::If => self.if_expression(span),
            TokenKind::Fn => self.function_literal(span),
            TokenKind::LeftBracket => {
                let elements = self.expression_list(&TokenKind::RightBracket)?;
                Ok(Expr::new(ExprKind::Array(elements), span))
            }
            TokenKind::LeftBrace => self.hash_literal(span),
            other => Err(ParserError::no_prefix_parse(format!("{}", other), span)),
        }
    }

    fn infix(&mut self, left: Expr) -> ParseResult<Expr> {
        let token = self.advance();
        let span = token.span;

        match token.kind {
            TokenKind::LeftParen => {
                let arguments = self.expression_list(&TokenKind::RightParen)?;
                Ok(Expr::new(
                    ExprKind::Call {
                        function: Box::new(left),
                        arguments,
                    },
                    span,
                ))
            }
            TokenKind::LeftBracket => {
                let index = self.expression(Precedence::Lowest)?;
                self.expect(&TokenKind::RightBracket)?;
                Ok(Expr::new(
                    ExprKind::Index {
                        object: Box::new(left),
                        index: Box::new(index),
                    },
                    span,
                ))
            }
            kind => {
                let operator = match kind {
                    TokenKind::Plus => BinaryOp::Add,
                    TokenKind::Minus => BinaryOp::Subtract,
                    TokenKind::Star => BinaryOp::Multiply,
                    TokenKind::Slash => BinaryOp::Divide,
                    TokenKind::Less => BinaryOp::Less,
                    TokenKind::Greater => BinaryOp::Greater,
                    TokenKind::EqualEqual => BinaryOp::Equal,
                    TokenKind::BangEqual => BinaryOp::NotEqual,
                    other => {
                        return Err(ParserError::unexpected_token(
                            "infix operator",
                            format!("{}", other),
                            span,
                        ))
                    }
                };
                let precedence = get_precedence(&self.previous().kind);
                let right = self.expression(precedence)?;
                Ok(Expr::new(
                    ExprKind::Infix {
                        operator,
                        left: Box::new(left),
                        right: Box::new(right),
                    },
                    span,
                ))
            }
        }
    }

    fn prefix_operation(&mut self, operator: UnaryOp, span: Span) -> ParseResult<Expr> {
        let right = self.expression(Precedence::Prefix)?;
        Ok(Expr::new(
            ExprKind::Prefix {
                operator,
                right: Box::new(right),
            },
            span,
        ))
    }

    fn if_expression(&mut self, span: Span) -> ParseResult<Expr> {
        self.expect(&TokenKind::LeftParen)?;
        let condition = self.expression(Precedence::Lowest)?;
        self.expect(&TokenKind::RightParen)?;
        let consequence = self.block()?;
        let alternative = if self.match_token(&TokenKind::Else) {
            Some(self.block()?)
        } else {
            None
        };
        Ok(Expr::new(
            ExprKind::If {
                condition: Box::new(condition),
                consequence,
                alternative,
            },
            span,
        ))
    }

    fn function_literal(&mut self, span: Span) -> ParseResult<Expr> {
        self.expect(&TokenKind::LeftParen)?;
        let mut parameters = Vec::new();
        if !self.check(&TokenKind::RightParen) {
            parameters.push(self.expect_identifier()?);
            while self.match_token(&TokenKind::Comma) {
                parameters.push(self.expect_identifier()?);
            }
        }
        self.expect(&TokenKind::RightParen)?;
        let body = self.block()?;
        Ok(Expr::new(ExprKind::Function { parameters, body }, span))
    }

    fn hash_literal(&mut self, span: Span) -> ParseResult<Expr> {
        let mut pairs = Vec::new();
        while !self.check(&TokenKind::RightBrace) {
            let key = self.expression(Precedence::Lowest)?;
            self.expect(&TokenKind::Colon)?;
            let value = self.expression(Precedence::Lowest)?;
            pairs.push((key, value));
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RightBrace)?;
        Ok(Expr::new(ExprKind::Hash(pairs), span))
    }

    fn expression_list(&mut self, end: &TokenKind) -> ParseResult<Vec<Expr>> {
        let mut items = Vec::new();
        if self.match_token(end) {
            return Ok(items);
        }
        items.push(self.expression(Precedence::Lowest)?);
        while self.match_token(&TokenKind::Comma) {
            items.push(self.expression(Precedence::Lowest)?);
        }
        self.expect(end)?;
        Ok(items)
    }
}
