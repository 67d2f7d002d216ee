//! Typedef-aware recursive descent parser
//!
//! Single pass over the preprocessed token stream. Every decision that
//! depends on whether a name is a type asks the symbol table at that very
//! point, so typedefs are visible from their declaration onward and never
//! before.
//!
//! # Organization
//!
//! Parser methods are split across files using `impl Parser` blocks:
//! - this module: token helpers, construct classification, recovery
//! - `declarations`: specifiers, init-declarators, function definitions
//! - `declarators`: pointer/array/function declarators and parameters
//! - `statements`: statements and expression scanning

mod declarations;
mod declarators;
mod statements;

pub use declarators::{Declarator, DeclaratorMode};

use crate::context::AnalysisContext;
use crate::preprocessor::Preprocessor;
use crate::token::{Keyword, Punct, Token, TokenKind};
use std::collections::VecDeque;
use symscope_core::{DiagnosticKind, Location};
use thiserror::Error;
use tracing::debug;

/// A construct the parser could not make sense of
#[derive(Debug, Clone, Error)]
#[error("{location}: {message}")]
pub struct SyntaxError {
    pub message: String,
    pub location: Location,
    /// The translation unit cannot be finished (end of input inside braces)
    pub fatal: bool,
}

pub type PResult<T> = Result<T, SyntaxError>;

/// How the statement or declaration at the current token is read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Construct {
    Declaration,
    /// Declaration whose type name was never declared (`bool flag;`)
    UnknownTypeDeclaration,
    Expression,
}

pub struct Parser<'r> {
    source: Preprocessor<'r>,
    lookahead: VecDeque<Token>,
    eof: Token,
    pub(crate) ctx: AnalysisContext,
    fatal: bool,
}

impl<'r> Parser<'r> {
    pub fn new(source: Preprocessor<'r>, ctx: AnalysisContext) -> Self {
        let eof = Token::eof(source.end_location());
        Self {
            source,
            lookahead: VecDeque::new(),
            eof,
            ctx,
            fatal: false,
        }
    }

    /// Parse declarations until end of input or a structural failure
    pub fn parse_translation_unit(&mut self) {
        while !self.is_at_end() {
            match self.external_declaration() {
                Ok(()) => {}
                Err(e) if e.fatal => {
                    self.abort(e);
                    break;
                }
                Err(e) => {
                    if let Err(fatal) = self.recover(e, true) {
                        self.abort(fatal);
                        break;
                    }
                }
            }
        }
        self.ctx.symbols.finish(self.ctx.config.promote_tentative);
    }

    /// Analysis stopped early
    pub fn aborted(&self) -> bool {
        self.fatal || self.source.aborted()
    }

    pub fn into_context(self) -> AnalysisContext {
        self.ctx
    }

    pub fn context(&self) -> &AnalysisContext {
        &self.ctx
    }

    fn abort(&mut self, e: SyntaxError) {
        self.fatal = true;
        // The preprocessor reports its own reason for stopping
        if !self.source.aborted() {
            self.ctx
                .diagnostics
                .report(DiagnosticKind::StructuralFatal, e.location, e.message);
        }
    }

    fn external_declaration(&mut self) -> PResult<()> {
        if self.eat_punct(Punct::Semi) {
            return Ok(());
        }
        if self.check_punct(Punct::RBrace) {
            return Err(self.error("unexpected '}'"));
        }
        match self.classify() {
            Construct::Declaration => self.declaration(false),
            Construct::UnknownTypeDeclaration => self.declaration(true),
            Construct::Expression => self.expression_statement(),
        }
    }

    // ===== Classification =====

    /// Decide how to read the construct starting at the current token.
    ///
    /// `T ( X ) ;` is a declaration of `X` exactly when `T` is a typedef
    /// visible here; otherwise it is a call-like expression.
    pub(crate) fn classify(&mut self) -> Construct {
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::Keyword(k) if k.starts_declaration() => Construct::Declaration,
            TokenKind::Identifier => {
                if self.ctx.symbols.is_typedef_visible(&tok.text) {
                    return Construct::Declaration;
                }
                if is_gnu_specifier(&tok.text) {
                    return Construct::Declaration;
                }
                let next = self.peek_nth(1).clone();
                if next.kind == TokenKind::Identifier && !is_gnu_specifier(&next.text) {
                    return Construct::UnknownTypeDeclaration;
                }
                if next.is_keyword(Keyword::Const) || next.is_keyword(Keyword::Volatile) {
                    return Construct::UnknownTypeDeclaration;
                }
                let file_scope = self.ctx.symbols.depth() == 0;
                if file_scope && next.is_punct(Punct::Star) && self.pointer_declaration_follows() {
                    return Construct::UnknownTypeDeclaration;
                }
                if file_scope && next.is_punct(Punct::LParen) {
                    if self.implicit_int_definition_follows() {
                        return Construct::Declaration;
                    }
                    self.flag_implicit_int_call(&tok);
                }
                Construct::Expression
            }
            _ => Construct::Expression,
        }
    }

    /// `f(T);` with `T` a typedef is read as a call; C89 would read it as
    /// an implicit-int declaration of `f`
    fn flag_implicit_int_call(&mut self, callee: &Token) {
        let inner = self.peek_nth(2).clone();
        let closes = self.peek_nth(3).is_punct(Punct::RParen) && self.peek_nth(4).is_punct(Punct::Semi);
        if !(closes && inner.kind == TokenKind::Identifier && self.ctx.symbols.is_typedef_visible(&inner.text)) {
            return;
        }
        if self.ctx.config.report_suspicious {
            self.ctx.diagnostics.report(
                DiagnosticKind::SuspiciousDeclaration,
                callee.location.clone(),
                format!(
                    "'{}({})' is a call here; C89 would read it as an implicit-int declaration of '{}'",
                    callee.text, inner.text, callee.text
                ),
            );
        }
    }

    /// `IDENT * [*...] IDENT` followed by `;`, `,`, `=`, `[` or `)`
    fn pointer_declaration_follows(&mut self) -> bool {
        let mut n = 1;
        while self.peek_nth(n).is_punct(Punct::Star) {
            n += 1;
        }
        if self.peek_nth(n).kind != TokenKind::Identifier {
            return false;
        }
        let after = self.peek_nth(n + 1);
        [Punct::Semi, Punct::Comma, Punct::Assign, Punct::LBracket, Punct::RParen]
            .iter()
            .any(|p| after.is_punct(*p))
    }

    /// Old-style `name(params) {` or `name(a, b) int a; ... {` with an
    /// implicit `int` return type
    fn implicit_int_definition_follows(&mut self) -> bool {
        let mut depth = 0usize;
        let mut n = 1;
        loop {
            let tok = self.peek_nth(n);
            match tok.kind {
                TokenKind::Eof => return false,
                TokenKind::Punct(Punct::Semi) | TokenKind::Punct(Punct::LBrace) if depth > 0 => return false,
                TokenKind::Punct(Punct::LParen) => depth += 1,
                TokenKind::Punct(Punct::RParen) => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                _ => {}
            }
            n += 1;
        }
        let after = self.peek_nth(n + 1).clone();
        after.is_punct(Punct::LBrace)
            || matches!(after.kind, TokenKind::Keyword(k) if k.starts_declaration())
            || (after.kind == TokenKind::Identifier && self.ctx.symbols.is_typedef_visible(&after.text))
    }

    // ===== Token helpers =====

    fn fill(&mut self, n: usize) {
        while self.lookahead.len() < n {
            match self.source.next_token(&mut self.ctx) {
                Some(tok) => self.lookahead.push_back(tok),
                None => {
                    self.eof = Token::eof(self.source.end_location());
                    break;
                }
            }
        }
    }

    pub(crate) fn peek(&mut self) -> &Token {
        self.fill(1);
        self.lookahead.front().unwrap_or(&self.eof)
    }

    pub(crate) fn peek_nth(&mut self, n: usize) -> &Token {
        self.fill(n + 1);
        self.lookahead.get(n).unwrap_or(&self.eof)
    }

    pub(crate) fn advance(&mut self) -> Token {
        self.fill(1);
        self.lookahead
            .pop_front()
            .unwrap_or_else(|| self.eof.clone())
    }

    pub(crate) fn is_at_end(&mut self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    pub(crate) fn check_punct(&mut self, p: Punct) -> bool {
        self.peek().is_punct(p)
    }

    pub(crate) fn check_keyword(&mut self, k: Keyword) -> bool {
        self.peek().is_keyword(k)
    }

    pub(crate) fn eat_punct(&mut self, p: Punct) -> bool {
        if self.check_punct(p) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn eat_keyword(&mut self, k: Keyword) -> bool {
        if self.check_keyword(k) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn expect_punct(&mut self, p: Punct, spelling: &str) -> PResult<Token> {
        if self.check_punct(p) {
            Ok(self.advance())
        } else {
            let found = self.peek().to_string();
            Err(self.error(format!("expected '{}', found {}", spelling, found)))
        }
    }

    pub(crate) fn expect_identifier(&mut self) -> PResult<Token> {
        if self.peek().is_identifier() {
            Ok(self.advance())
        } else {
            let found = self.peek().to_string();
            Err(self.error(format!("expected identifier, found {}", found)))
        }
    }

    /// Recoverable error at the current token
    pub(crate) fn error(&mut self, message: impl Into<String>) -> SyntaxError {
        let location = self.peek().location.clone();
        let fatal = self.peek().kind == TokenKind::Eof && self.ctx.symbols.depth() > 0;
        SyntaxError {
            message: message.into(),
            location,
            fatal,
        }
    }

    pub(crate) fn unbalanced(&mut self, opened_at: &Location) -> SyntaxError {
        SyntaxError {
            message: format!("unbalanced braces: '{{' at {} is never closed", opened_at),
            location: self.peek().location.clone(),
            fatal: true,
        }
    }

    // ===== Recovery =====

    /// Report `e` and skip to the next declaration or statement boundary:
    /// past a `;`, past a balanced `{...}` at file scope, or up to the `}`
    /// closing the current block.
    pub(crate) fn recover(&mut self, e: SyntaxError, top_level: bool) -> PResult<()> {
        if self.source.aborted() {
            return Ok(());
        }
        let mut depth = 0usize;
        let mut opened_at = e.location.clone();
        loop {
            let tok = self.peek().clone();
            match tok.kind {
                TokenKind::Eof if depth > 0 => return Err(self.unbalanced(&opened_at)),
                TokenKind::Eof => break,
                TokenKind::Punct(Punct::Semi) if depth == 0 => {
                    self.advance();
                    break;
                }
                TokenKind::Punct(Punct::LBrace) => {
                    if depth == 0 {
                        opened_at = tok.location.clone();
                    }
                    depth += 1;
                    self.advance();
                }
                TokenKind::Punct(Punct::RBrace) if depth == 0 => {
                    if top_level {
                        self.advance();
                    }
                    break;
                }
                TokenKind::Punct(Punct::RBrace) => {
                    depth -= 1;
                    self.advance();
                    if depth == 0 && top_level {
                        break;
                    }
                }
                _ => {
                    self.advance();
                }
            }
        }

        let resync = self.peek().location.clone();
        debug!("skipped unparseable construct at {}, resuming at {}", e.location, resync);
        self.ctx.diagnostics.report_with_resync(
            DiagnosticKind::UnparseableConstruct,
            e.location,
            e.message,
            resync,
        );
        Ok(())
    }
}

/// GNU extensions that can appear among declaration specifiers
pub(crate) enum GnuWord {
    /// Followed by a parenthesized group to skip
    Attribute,
    /// Ignored on its own
    Ignore,
    /// Spelling of a standard qualifier or specifier
    Alias(&'static str),
}

pub(crate) fn gnu_word(text: &str) -> Option<GnuWord> {
    Some(match text {
        "__attribute__" | "__attribute" | "__declspec" | "__asm__" | "__asm" | "asm" | "__alignas" => {
            GnuWord::Attribute
        }
        "__extension__" | "__inline" | "__inline__" | "__forceinline" | "_Alignas" => GnuWord::Ignore,
        "__const" | "__const__" => GnuWord::Alias("const"),
        "__volatile" | "__volatile__" => GnuWord::Alias("volatile"),
        "__restrict" | "__restrict__" => GnuWord::Alias("restrict"),
        "__signed" | "__signed__" => GnuWord::Alias("signed"),
        _ => return None,
    })
}

fn is_gnu_specifier(text: &str) -> bool {
    gnu_word(text).is_some()
}
