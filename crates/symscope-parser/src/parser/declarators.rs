//! Declarator parsing
//!
//! Derived types are collected from the declared name outward: pointers
//! bind looser than array and function suffixes, and a parenthesized
//! inner declarator binds tighter than both.

use super::{gnu_word, GnuWord, PResult, Parser};
use crate::preprocessor::evaluate_strict;
use crate::token::{Keyword, Punct, Token, TokenKind};
use symscope_core::{Derivation, FunctionSignature, ParamStyle, Parameter, TypeDescriptor};

/// Whether a declarator must name something
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclaratorMode {
    /// Ordinary declarations
    Named,
    /// Parameters and type names; the name is optional
    Abstract,
}

/// A parsed declarator
#[derive(Debug, Clone)]
pub struct Declarator {
    pub name: Option<Token>,
    pub derivations: Vec<Derivation>,
}

impl Parser<'_> {
    pub(crate) fn declarator(&mut self, mode: DeclaratorMode) -> PResult<Declarator> {
        let mut pointers = Vec::new();
        while self.eat_punct(Punct::Star) {
            let mut qualifiers = Vec::new();
            loop {
                let tok = self.peek().clone();
                match tok.kind {
                    TokenKind::Keyword(k) if k.is_qualifier() => {
                        qualifiers.push(tok.text.clone());
                        self.advance();
                    }
                    TokenKind::Identifier => match gnu_word(&tok.text) {
                        Some(GnuWord::Alias(q)) => {
                            qualifiers.push(q.to_string());
                            self.advance();
                        }
                        Some(_) => self.skip_gnu_word()?,
                        None => break,
                    },
                    _ => break,
                }
            }
            pointers.push(Derivation::Pointer { qualifiers });
        }

        self.skip_attributes()?;

        let mut name = None;
        let mut inner = Vec::new();
        if self.peek().is_identifier() {
            name = Some(self.advance());
        } else if self.check_punct(Punct::LParen) && self.paren_starts_nested_declarator(mode) {
            self.advance();
            let nested = self.declarator(mode)?;
            self.expect_punct(Punct::RParen, ")")?;
            name = nested.name;
            inner = nested.derivations;
        } else if mode == DeclaratorMode::Named {
            let found = self.peek().to_string();
            return Err(self.error(format!("expected identifier or '(', found {}", found)));
        }

        let mut suffixes = Vec::new();
        loop {
            if self.check_punct(Punct::LBracket) {
                suffixes.push(self.array_suffix()?);
            } else if self.check_punct(Punct::LParen) {
                suffixes.push(Derivation::Function(self.parameter_list()?));
            } else {
                break;
            }
        }
        self.skip_attributes()?;

        let mut derivations = inner;
        derivations.extend(suffixes);
        derivations.extend(pointers.into_iter().rev());
        Ok(Declarator { name, derivations })
    }

    /// In an abstract declarator, `(` opens either a nested declarator
    /// (`(*)`, `(x)`) or a parameter list (`(int)`, `()`)
    fn paren_starts_nested_declarator(&mut self, mode: DeclaratorMode) -> bool {
        if mode == DeclaratorMode::Named {
            return true;
        }
        let next = self.peek_nth(1).clone();
        match next.kind {
            TokenKind::Punct(Punct::Star) | TokenKind::Punct(Punct::LBracket) => true,
            TokenKind::Punct(Punct::LParen) => true,
            TokenKind::Identifier => {
                !self.ctx.symbols.is_typedef_visible(&next.text) && gnu_word(&next.text).is_none()
            }
            _ => false,
        }
    }

    fn array_suffix(&mut self) -> PResult<Derivation> {
        let open = self.expect_punct(Punct::LBracket, "[")?;
        let mut bound = Vec::new();
        let mut depth = 0usize;
        loop {
            let tok = self.peek().clone();
            match tok.kind {
                TokenKind::Eof => return Err(self.error("unterminated array bound")),
                TokenKind::Punct(Punct::RBracket) if depth == 0 => break,
                TokenKind::Punct(Punct::Semi) => {
                    return Err(self.error(format!("expected ']' to close '[' at {}", open.location)));
                }
                TokenKind::Punct(Punct::LBracket) => depth += 1,
                TokenKind::Punct(Punct::RBracket) => depth -= 1,
                TokenKind::Keyword(Keyword::Static) => {
                    self.advance();
                    continue;
                }
                TokenKind::Keyword(k) if k.is_qualifier() => {
                    self.advance();
                    continue;
                }
                TokenKind::Identifier => {
                    self.ctx.symbols.record_use(&tok.text, tok.location.clone());
                }
                _ => {}
            }
            bound.push(self.advance());
        }
        self.advance();

        let size = if bound.is_empty() {
            None
        } else {
            evaluate_strict(&bound)
                .ok()
                .and_then(|v| u64::try_from(v).ok())
        };
        Ok(Derivation::Array { size })
    }

    pub(crate) fn parameter_list(&mut self) -> PResult<FunctionSignature> {
        self.expect_punct(Punct::LParen, "(")?;

        if self.eat_punct(Punct::RParen) {
            return Ok(FunctionSignature::unspecified());
        }
        if self.check_keyword(Keyword::Void) && self.peek_nth(1).is_punct(Punct::RParen) {
            self.advance();
            self.advance();
            return Ok(FunctionSignature {
                style: ParamStyle::Void,
                params: Vec::new(),
                variadic: false,
            });
        }
        if self.identifier_list_follows() {
            return self.identifier_list();
        }

        let mut params = Vec::new();
        let mut variadic = false;
        loop {
            if self.eat_punct(Punct::Ellipsis) {
                variadic = true;
                self.expect_punct(Punct::RParen, ")")?;
                break;
            }
            let specs = self.declaration_specifiers(true)?;
            let declarator = self.declarator(DeclaratorMode::Abstract)?;
            params.push(Parameter {
                name: declarator.name.as_ref().map(|t| t.text.clone()),
                location: declarator.name.as_ref().map(|t| t.location.clone()),
                ty: TypeDescriptor::with_derivations(specs.base(), declarator.derivations),
            });
            if self.eat_punct(Punct::Comma) {
                continue;
            }
            self.expect_punct(Punct::RParen, ")")?;
            break;
        }

        Ok(FunctionSignature {
            style: ParamStyle::Prototype,
            params,
            variadic,
        })
    }

    /// `(a, b, c)` where no name is a type
    fn identifier_list_follows(&mut self) -> bool {
        let first = self.peek().clone();
        if first.kind != TokenKind::Identifier || self.ctx.symbols.is_typedef_visible(&first.text) {
            return false;
        }
        let next = self.peek_nth(1);
        next.is_punct(Punct::Comma) || next.is_punct(Punct::RParen)
    }

    fn identifier_list(&mut self) -> PResult<FunctionSignature> {
        let mut params = Vec::new();
        loop {
            let name = self.expect_identifier()?;
            params.push(Parameter {
                name: Some(name.text.clone()),
                location: Some(name.location.clone()),
                ty: TypeDescriptor::new("int"),
            });
            if self.eat_punct(Punct::Comma) {
                continue;
            }
            self.expect_punct(Punct::RParen, ")")?;
            break;
        }
        Ok(FunctionSignature {
            style: ParamStyle::IdentifierList,
            params,
            variadic: false,
        })
    }

    /// Skip `__attribute__((...))`, `asm("...")` and friends
    pub(crate) fn skip_attributes(&mut self) -> PResult<()> {
        loop {
            let tok = self.peek().clone();
            if tok.kind == TokenKind::Identifier
                && matches!(gnu_word(&tok.text), Some(GnuWord::Attribute) | Some(GnuWord::Ignore))
            {
                self.skip_gnu_word()?;
            } else {
                return Ok(());
            }
        }
    }

    pub(crate) fn skip_gnu_word(&mut self) -> PResult<()> {
        let word = self.advance();
        if !matches!(gnu_word(&word.text), Some(GnuWord::Attribute)) {
            return Ok(());
        }
        if !self.check_punct(Punct::LParen) {
            return Ok(());
        }
        let mut depth = 0usize;
        loop {
            let tok = self.advance();
            match tok.kind {
                TokenKind::Eof => return Err(self.error(format!("unterminated {}", word.text))),
                TokenKind::Punct(Punct::LParen) => depth += 1,
                TokenKind::Punct(Punct::RParen) => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                _ => {}
            }
        }
    }
}
