//! Statements inside function bodies
//!
//! Expressions are not built into trees. They are scanned token by token
//! with bracket balancing, recording every identifier use on the way.

use super::{Construct, PResult, Parser};
use crate::symbols::ScopeLayer;
use crate::token::{Keyword, Punct, TokenKind};
use symscope_core::Location;

impl Parser<'_> {
    /// Items of a block up to and including its closing `}`
    pub(crate) fn block_items(&mut self, opened_at: &Location) -> PResult<()> {
        loop {
            if self.eat_punct(Punct::RBrace) {
                return Ok(());
            }
            if self.is_at_end() {
                return Err(self.unbalanced(opened_at));
            }
            if let Err(e) = self.block_item() {
                if e.fatal {
                    return Err(e);
                }
                self.recover(e, false)?;
            }
        }
    }

    fn block_item(&mut self) -> PResult<()> {
        match self.classify() {
            Construct::Declaration => self.declaration(false),
            Construct::UnknownTypeDeclaration => self.declaration(true),
            Construct::Expression => self.statement(),
        }
    }

    fn compound_statement(&mut self) -> PResult<()> {
        let open = self.expect_punct(Punct::LBrace, "{")?;
        self.ctx.symbols.push_scope(ScopeLayer::Block);
        let result = self.block_items(&open.location);
        self.ctx.symbols.pop_scope();
        result
    }

    pub(crate) fn statement(&mut self) -> PResult<()> {
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::Punct(Punct::LBrace) => self.compound_statement(),
            TokenKind::Punct(Punct::Semi) => {
                self.advance();
                Ok(())
            }
            TokenKind::Keyword(Keyword::If) => {
                self.advance();
                self.parenthesized()?;
                self.statement()?;
                if self.eat_keyword(Keyword::Else) {
                    self.statement()?;
                }
                Ok(())
            }
            TokenKind::Keyword(Keyword::While) | TokenKind::Keyword(Keyword::Switch) => {
                self.advance();
                self.parenthesized()?;
                self.statement()
            }
            TokenKind::Keyword(Keyword::Do) => {
                self.advance();
                self.statement()?;
                if !self.eat_keyword(Keyword::While) {
                    return Err(self.error("expected 'while' after 'do' body"));
                }
                self.parenthesized()?;
                self.expect_punct(Punct::Semi, ";")?;
                Ok(())
            }
            TokenKind::Keyword(Keyword::For) => {
                self.advance();
                self.ctx.symbols.push_scope(ScopeLayer::Block);
                let result = self.for_clauses();
                self.ctx.symbols.pop_scope();
                result
            }
            TokenKind::Keyword(Keyword::Case) => {
                self.advance();
                self.scan_expression(&[Punct::Colon])?;
                self.expect_punct(Punct::Colon, ":")?;
                self.labeled()
            }
            TokenKind::Keyword(Keyword::Default) => {
                self.advance();
                self.expect_punct(Punct::Colon, ":")?;
                self.labeled()
            }
            TokenKind::Keyword(Keyword::Return) | TokenKind::Keyword(Keyword::Goto) => {
                self.advance();
                self.scan_expression(&[])?;
                self.expect_punct(Punct::Semi, ";")?;
                Ok(())
            }
            TokenKind::Keyword(Keyword::Break) | TokenKind::Keyword(Keyword::Continue) => {
                self.advance();
                self.expect_punct(Punct::Semi, ";")?;
                Ok(())
            }
            TokenKind::Keyword(Keyword::Else) => Err(self.error("'else' without a previous 'if'")),
            TokenKind::Identifier if self.peek_nth(1).is_punct(Punct::Colon) => {
                self.advance();
                self.advance();
                self.labeled()
            }
            _ => self.expression_statement(),
        }
    }

    /// Whatever follows a label; a label right before `}` is accepted
    fn labeled(&mut self) -> PResult<()> {
        if self.check_punct(Punct::RBrace) {
            return Ok(());
        }
        self.block_item()
    }

    fn parenthesized(&mut self) -> PResult<()> {
        self.expect_punct(Punct::LParen, "(")?;
        self.scan_expression(&[])?;
        self.expect_punct(Punct::RParen, ")")?;
        Ok(())
    }

    fn for_clauses(&mut self) -> PResult<()> {
        self.expect_punct(Punct::LParen, "(")?;
        if !self.eat_punct(Punct::Semi) {
            match self.classify() {
                Construct::Declaration => self.declaration(false)?,
                Construct::UnknownTypeDeclaration => self.declaration(true)?,
                Construct::Expression => self.expression_statement()?,
            }
        }
        if !self.check_punct(Punct::Semi) {
            self.scan_expression(&[])?;
        }
        self.expect_punct(Punct::Semi, ";")?;
        if !self.check_punct(Punct::RParen) {
            self.scan_expression(&[])?;
        }
        self.expect_punct(Punct::RParen, ")")?;
        self.statement()
    }

    pub(crate) fn expression_statement(&mut self) -> PResult<()> {
        self.scan_expression(&[])?;
        self.expect_punct(Punct::Semi, ";")?;
        Ok(())
    }

    /// Skip an expression, stopping before `;`, before an unmatched
    /// closing bracket, or before one of `stops` at nesting depth zero.
    pub(crate) fn scan_expression(&mut self, stops: &[Punct]) -> PResult<()> {
        let mut depth = 0usize;
        let mut after_member_access = false;
        loop {
            let tok = self.peek().clone();
            match tok.kind {
                TokenKind::Eof if depth > 0 => {
                    return Err(self.error("unexpected end of input in expression"));
                }
                TokenKind::Eof | TokenKind::Punct(Punct::Semi) => return Ok(()),
                TokenKind::Punct(p) if depth == 0 && stops.contains(&p) => return Ok(()),
                TokenKind::Punct(Punct::LParen | Punct::LBracket | Punct::LBrace) => depth += 1,
                TokenKind::Punct(Punct::RParen | Punct::RBracket | Punct::RBrace) => {
                    if depth == 0 {
                        return Ok(());
                    }
                    depth -= 1;
                }
                TokenKind::Keyword(
                    Keyword::If
                    | Keyword::Else
                    | Keyword::While
                    | Keyword::For
                    | Keyword::Do
                    | Keyword::Switch
                    | Keyword::Case
                    | Keyword::Return
                    | Keyword::Goto
                    | Keyword::Break
                    | Keyword::Continue,
                ) => {
                    return Err(self.error(format!("expected expression before '{}'", tok.text)));
                }
                TokenKind::Identifier if !after_member_access => {
                    self.ctx.symbols.record_use(&tok.text, tok.location.clone());
                }
                _ => {}
            }
            after_member_access = tok.is_punct(Punct::Dot) || tok.is_punct(Punct::Arrow);
            self.advance();
        }
    }
}
