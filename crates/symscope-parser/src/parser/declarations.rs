//! Declaration parsing
//!
//! Specifiers, init-declarators, tags and function definitions. Every
//! declarator ends up in the symbol table as it is recognized, so a
//! typedef is usable by the very next declaration.

use super::declarators::DeclaratorMode;
use super::{gnu_word, GnuWord, PResult, Parser};
use crate::symbols::{Declaration, ScopeLayer};
use crate::token::{Keyword, Punct, Token, TokenKind};
use symscope_core::{
    DeclaratorKind, Derivation, DiagnosticKind, Location, ObjectId, ParamStyle, Severity, StorageClass,
    TypeDescriptor, TypeKind,
};
use tracing::debug;

/// Declaration specifiers shared by the declarators of one declaration
#[derive(Debug, Clone, Default)]
pub(crate) struct Specifiers {
    pub storage: StorageClass,
    pub typedef: bool,
    /// Type specifiers and qualifiers as written
    pub words: Vec<String>,
    pub has_type: bool,
    /// Typedefs and tags the specifiers mention
    pub type_refs: Vec<ObjectId>,
}

impl Specifiers {
    /// Base type text; `int` when no type specifier was given
    pub fn base(&self) -> String {
        if self.has_type {
            self.words.join(" ")
        } else if self.words.is_empty() {
            "int".to_string()
        } else {
            format!("{} int", self.words.join(" "))
        }
    }
}

/// What an initializer looks like, as far as array bounds care
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InitShape {
    /// Brace list with this many top-level elements; `None` when
    /// designators make the count meaningless
    Braced(Option<usize>),
    /// String literal of this many characters including the terminator
    String(usize),
    Scalar,
}

impl Parser<'_> {
    /// Declaration or function definition. `allow_unknown` accepts an
    /// undeclared identifier as the type name.
    pub(crate) fn declaration(&mut self, allow_unknown: bool) -> PResult<()> {
        if self.eat_keyword(Keyword::StaticAssert) {
            self.expect_punct(Punct::LParen, "(")?;
            self.scan_expression(&[])?;
            self.expect_punct(Punct::RParen, ")")?;
            self.expect_punct(Punct::Semi, ";")?;
            return Ok(());
        }

        let specs = self.declaration_specifiers(allow_unknown)?;
        if self.eat_punct(Punct::Semi) {
            return Ok(());
        }

        let mut first = true;
        loop {
            let declarator = self.declarator(DeclaratorMode::Named)?;
            let Some(name) = declarator.name else {
                return Err(self.error("declaration does not declare anything"));
            };
            let ty = TypeDescriptor::with_derivations(specs.base(), declarator.derivations);

            if first && !specs.typedef && ty.is_function() && self.function_body_follows(&ty) {
                return self.function_definition(&specs, name, ty);
            }
            first = false;

            self.init_declarator(&specs, name, ty)?;
            if self.eat_punct(Punct::Comma) {
                continue;
            }
            self.expect_punct(Punct::Semi, ";")?;
            return Ok(());
        }
    }

    pub(crate) fn declaration_specifiers(&mut self, allow_unknown: bool) -> PResult<Specifiers> {
        let mut specs = Specifiers::default();
        loop {
            let tok = self.peek().clone();
            match tok.kind {
                TokenKind::Keyword(Keyword::Typedef) => {
                    specs.typedef = true;
                    self.advance();
                }
                TokenKind::Keyword(Keyword::Extern) => {
                    specs.storage = StorageClass::Extern;
                    self.advance();
                }
                TokenKind::Keyword(Keyword::Static) => {
                    specs.storage = StorageClass::Static;
                    self.advance();
                }
                TokenKind::Keyword(Keyword::Auto) => {
                    specs.storage = StorageClass::Auto;
                    self.advance();
                }
                TokenKind::Keyword(Keyword::Register) => {
                    specs.storage = StorageClass::Register;
                    self.advance();
                }
                TokenKind::Keyword(Keyword::Inline)
                | TokenKind::Keyword(Keyword::Noreturn)
                | TokenKind::Keyword(Keyword::ThreadLocal) => {
                    self.advance();
                }
                TokenKind::Keyword(Keyword::Struct)
                | TokenKind::Keyword(Keyword::Union)
                | TokenKind::Keyword(Keyword::Enum) => {
                    let (text, id) = self.tag_specifier()?;
                    specs.words.push(text);
                    specs.has_type = true;
                    specs.type_refs.extend(id);
                }
                TokenKind::Keyword(k) if k.is_qualifier() => {
                    specs.words.push(tok.text.clone());
                    self.advance();
                }
                TokenKind::Keyword(k) if k.is_type_specifier() => {
                    specs.words.push(tok.text.clone());
                    specs.has_type = true;
                    self.advance();
                }
                TokenKind::Identifier => {
                    match gnu_word(&tok.text) {
                        Some(GnuWord::Alias(word)) => {
                            specs.words.push(word.to_string());
                            specs.has_type |= word == "signed";
                            self.advance();
                            continue;
                        }
                        Some(_) => {
                            self.skip_gnu_word()?;
                            continue;
                        }
                        None => {}
                    }
                    if specs.has_type {
                        break;
                    }
                    if self.ctx.symbols.is_typedef_visible(&tok.text) {
                        self.advance();
                        if let Some(id) = self.ctx.symbols.record_use(&tok.text, tok.location.clone()) {
                            specs.type_refs.push(id);
                        }
                        specs.words.push(tok.text.clone());
                        specs.has_type = true;
                        continue;
                    }
                    if !allow_unknown && !self.unknown_type_name_follows() {
                        break;
                    }
                    if self.ctx.config.report_suspicious {
                        self.ctx.diagnostics.report(
                            DiagnosticKind::SuspiciousDeclaration,
                            tok.location.clone(),
                            format!("unknown type name '{}'", tok.text),
                        );
                    }
                    self.ctx.symbols.record_use(&tok.text, tok.location.clone());
                    self.advance();
                    specs.words.push(tok.text.clone());
                    specs.has_type = true;
                }
                _ => break,
            }
        }
        Ok(specs)
    }

    /// Current identifier is followed by another identifier, so it can
    /// only be a type name
    fn unknown_type_name_follows(&mut self) -> bool {
        let next = self.peek_nth(1);
        next.kind == TokenKind::Identifier && gnu_word(&next.text).is_none()
    }

    /// `struct name`, `struct name { ... }`, `enum { ... }`
    fn tag_specifier(&mut self) -> PResult<(String, Option<ObjectId>)> {
        let keyword = self.advance();
        let kind = match keyword.kind {
            TokenKind::Keyword(Keyword::Struct) => TypeKind::Struct,
            TokenKind::Keyword(Keyword::Union) => TypeKind::Union,
            _ => TypeKind::Enum,
        };
        self.skip_attributes()?;
        let name = if self.peek().is_identifier() {
            Some(self.advance())
        } else {
            None
        };
        self.skip_attributes()?;

        let text = match &name {
            Some(n) => format!("{} {}", keyword.text, n.text),
            None => format!("{} <anonymous>", keyword.text),
        };

        if self.check_punct(Punct::LBrace) {
            let id = match &name {
                Some(n) => Some(self.ctx.symbols.declare_tag(
                    &n.text,
                    kind,
                    n.location.clone(),
                    true,
                    &mut self.ctx.diagnostics,
                )),
                None => None,
            };
            if kind == TypeKind::Enum {
                self.enum_body(&text)?;
            } else {
                self.struct_body()?;
            }
            return Ok((text, id));
        }

        let Some(name) = name else {
            return Err(self.error(format!("expected name or '{{' after '{}'", keyword.text)));
        };
        let id = if self.check_punct(Punct::Semi) {
            self.ctx.symbols.declare_tag(
                &name.text,
                kind,
                name.location.clone(),
                false,
                &mut self.ctx.diagnostics,
            )
        } else {
            self.ctx.symbols.tag_reference(
                &name.text,
                kind,
                name.location.clone(),
                &mut self.ctx.diagnostics,
            )
        };
        Ok((text, Some(id)))
    }

    /// Enumerators are constants defined where they are written
    fn enum_body(&mut self, enum_type: &str) -> PResult<()> {
        let open = self.expect_punct(Punct::LBrace, "{")?;
        loop {
            if self.eat_punct(Punct::RBrace) {
                return Ok(());
            }
            if self.is_at_end() {
                return Err(self.unbalanced(&open.location));
            }
            let name = self.expect_identifier()?;
            let id = self.declare(Declaration {
                name: name.text.clone(),
                kind: DeclaratorKind::Variable,
                storage: StorageClass::None,
                location: name.location.clone(),
                ty: Some(TypeDescriptor::new(enum_type)),
                defining: true,
            });
            self.define(id, name.location);
            if self.eat_punct(Punct::Assign) {
                self.scan_expression(&[Punct::Comma])?;
            }
            if !self.eat_punct(Punct::Comma) {
                self.expect_punct(Punct::RBrace, "}")?;
                return Ok(());
            }
        }
    }

    /// Members are parsed for the types they mention but not catalogued
    fn struct_body(&mut self) -> PResult<()> {
        let open = self.expect_punct(Punct::LBrace, "{")?;
        loop {
            if self.eat_punct(Punct::RBrace) {
                return Ok(());
            }
            if self.is_at_end() {
                return Err(self.unbalanced(&open.location));
            }
            if self.eat_punct(Punct::Semi) {
                continue;
            }
            if let Err(e) = self.member_declaration() {
                if e.fatal {
                    return Err(e);
                }
                self.recover(e, false)?;
            }
        }
    }

    fn member_declaration(&mut self) -> PResult<()> {
        if self.check_keyword(Keyword::StaticAssert) {
            return self.declaration(false);
        }
        self.declaration_specifiers(true)?;
        if self.eat_punct(Punct::Semi) {
            return Ok(());
        }
        loop {
            if !self.check_punct(Punct::Colon) {
                self.declarator(DeclaratorMode::Named)?;
            }
            if self.eat_punct(Punct::Colon) {
                self.scan_expression(&[Punct::Comma])?;
            }
            if !self.eat_punct(Punct::Comma) {
                break;
            }
        }
        self.expect_punct(Punct::Semi, ";")?;
        Ok(())
    }

    fn init_declarator(&mut self, specs: &Specifiers, name: Token, ty: TypeDescriptor) -> PResult<()> {
        let location = name.location.clone();
        let mut decl = Declaration {
            name: name.text.clone(),
            kind: DeclaratorKind::Variable,
            storage: specs.storage,
            location: location.clone(),
            ty: None,
            defining: false,
        };

        if specs.typedef {
            let redeclared = self
                .ctx
                .symbols
                .lookup_local(&decl.name)
                .is_some_and(|o| o.is_typedef() && o.is_defined());
            decl.kind = DeclaratorKind::Type(TypeKind::Typedef);
            decl.ty = Some(ty);
            decl.defining = !redeclared;
            let id = self.declare(decl);
            if !redeclared {
                self.define(id, location);
            }
            debug!("typedef {}", name.text);
            if self.check_punct(Punct::Assign) {
                return Err(self.error(format!("typedef '{}' is initialized", name.text)));
            }
            return Ok(());
        }

        if ty.is_function() {
            decl.kind = DeclaratorKind::Function;
            decl.ty = Some(ty.clone());
            let id = self.declare(decl);
            self.add_signature_refs(id, specs, &ty);
            if self.check_punct(Punct::Assign) {
                return Err(self.error(format!(
                    "function '{}' is initialized like a variable",
                    name.text
                )));
            }
            return Ok(());
        }

        if ty.is_void_object() && self.ctx.config.report_suspicious {
            self.ctx.diagnostics.report(
                DiagnosticKind::SuspiciousDeclaration,
                location.clone(),
                format!("variable '{}' declared void", name.text),
            );
        }

        let file_scope = self.ctx.symbols.depth() == 0;
        if self.eat_punct(Punct::Assign) {
            let shape = self.initializer()?;
            decl.ty = Some(self.check_array_initializer(&name, ty, shape));
            decl.defining = true;
            let id = self.declare(decl);
            self.define(id, location);
        } else if specs.storage == StorageClass::Extern {
            decl.ty = Some(ty);
            self.declare(decl);
        } else if file_scope {
            decl.ty = Some(ty);
            let id = self.declare(decl);
            self.ctx.symbols.mark_tentative(id, location);
        } else {
            decl.ty = Some(ty);
            decl.defining = true;
            let id = self.declare(decl);
            self.define(id, location);
        }
        debug!("variable {}", name.text);
        Ok(())
    }

    /// Compare an array bound with its initializer, completing an
    /// incomplete bound from it
    fn check_array_initializer(&mut self, name: &Token, mut ty: TypeDescriptor, shape: InitShape) -> TypeDescriptor {
        if !ty.is_array() {
            return ty;
        }
        let count = match shape {
            InitShape::Braced(Some(n)) => n as u64,
            InitShape::String(len) => len as u64,
            _ => return ty,
        };

        match ty.array_size() {
            None if count > 0 => {
                if let Some(first) = ty.derivations.first_mut() {
                    *first = Derivation::Array { size: Some(count) };
                }
            }
            None => {}
            Some(size) => match shape {
                InitShape::String(_) if count > size + 1 => {
                    self.ctx.diagnostics.report_with_severity(
                        DiagnosticKind::ArraySizeMismatch,
                        Severity::Error,
                        name.location.clone(),
                        format!(
                            "initializer string for array '{}' is too long ({} characters for {} elements)",
                            name.text,
                            count - 1,
                            size
                        ),
                    );
                }
                InitShape::Braced(_) if count > size => {
                    self.ctx.diagnostics.report_with_severity(
                        DiagnosticKind::ArraySizeMismatch,
                        Severity::Error,
                        name.location.clone(),
                        format!(
                            "excess elements in initializer of array '{}' ({} initializers for {} elements)",
                            name.text, count, size
                        ),
                    );
                }
                InitShape::Braced(_) if count > 0 && count < size => {
                    self.ctx.diagnostics.report(
                        DiagnosticKind::ArraySizeMismatch,
                        name.location.clone(),
                        format!(
                            "array '{}' has {} elements but its initializer lists {}",
                            name.text, size, count
                        ),
                    );
                }
                _ => {}
            },
        }
        ty
    }

    pub(crate) fn initializer(&mut self) -> PResult<InitShape> {
        if self.check_punct(Punct::LBrace) {
            return self.brace_initializer();
        }
        if self.peek().kind == TokenKind::StringLiteral {
            let mut length = 0;
            while self.peek().kind == TokenKind::StringLiteral {
                let tok = self.advance();
                length += string_length(&tok.text);
            }
            if self.check_punct(Punct::Comma) || self.check_punct(Punct::Semi) {
                return Ok(InitShape::String(length + 1));
            }
        }
        self.scan_expression(&[Punct::Comma])?;
        Ok(InitShape::Scalar)
    }

    fn brace_initializer(&mut self) -> PResult<InitShape> {
        let open = self.expect_punct(Punct::LBrace, "{")?;
        let mut count = 0usize;
        let mut designated = false;
        loop {
            if self.eat_punct(Punct::RBrace) {
                break;
            }
            if self.is_at_end() {
                return Err(self.unbalanced(&open.location));
            }
            if self.check_punct(Punct::LBracket) || self.check_punct(Punct::Dot) {
                designated = true;
            }
            if self.check_punct(Punct::LBrace) {
                self.brace_initializer()?;
            } else {
                self.scan_expression(&[Punct::Comma])?;
            }
            count += 1;
            if !self.eat_punct(Punct::Comma) {
                self.expect_punct(Punct::RBrace, "}")?;
                break;
            }
        }
        Ok(InitShape::Braced(if designated { None } else { Some(count) }))
    }

    /// A function declarator followed by a body, or by old-style
    /// parameter declarations and then a body
    fn function_body_follows(&mut self, ty: &TypeDescriptor) -> bool {
        if self.check_punct(Punct::LBrace) {
            return true;
        }
        if !ty
            .signature()
            .is_some_and(|s| s.style == ParamStyle::IdentifierList)
        {
            return false;
        }
        let next = self.peek().clone();
        match next.kind {
            TokenKind::Keyword(k) => k.starts_declaration(),
            TokenKind::Identifier => self.ctx.symbols.is_typedef_visible(&next.text),
            _ => false,
        }
    }

    fn function_definition(&mut self, specs: &Specifiers, name: Token, mut ty: TypeDescriptor) -> PResult<()> {
        if !self.check_punct(Punct::LBrace) {
            self.old_style_parameters(&mut ty)?;
        }

        let id = self.declare(Declaration {
            name: name.text.clone(),
            kind: DeclaratorKind::Function,
            storage: specs.storage,
            location: name.location.clone(),
            ty: Some(ty.clone()),
            defining: true,
        });
        self.define(id, name.location.clone());
        self.add_signature_refs(id, specs, &ty);
        debug!("function definition {} at {}", name.text, name.location);

        let open = self.expect_punct(Punct::LBrace, "{")?;
        self.ctx.symbols.push_scope(ScopeLayer::Function(name.text.clone()));
        if let Some(signature) = ty.signature() {
            for param in &signature.params {
                let (Some(param_name), Some(param_location)) = (&param.name, &param.location) else {
                    continue;
                };
                let param_id = self.declare(Declaration {
                    name: param_name.clone(),
                    kind: DeclaratorKind::Variable,
                    storage: StorageClass::None,
                    location: param_location.clone(),
                    ty: Some(param.ty.clone()),
                    defining: true,
                });
                self.define(param_id, param_location.clone());
            }
        }
        let result = self.block_items(&open.location);
        self.ctx.symbols.pop_scope();
        result
    }

    /// `f(a, b) int a; char *b; { ... }`
    fn old_style_parameters(&mut self, ty: &mut TypeDescriptor) -> PResult<()> {
        while !self.check_punct(Punct::LBrace) && !self.is_at_end() {
            let specs = self.declaration_specifiers(true)?;
            loop {
                let declarator = self.declarator(DeclaratorMode::Named)?;
                if let (Some(name), Some(Derivation::Function(signature))) =
                    (declarator.name, ty.derivations.first_mut())
                {
                    if let Some(param) = signature
                        .params
                        .iter_mut()
                        .find(|p| p.name.as_deref() == Some(name.text.as_str()))
                    {
                        param.ty = TypeDescriptor::with_derivations(specs.base(), declarator.derivations);
                        param.location = Some(name.location);
                    }
                }
                if !self.eat_punct(Punct::Comma) {
                    break;
                }
            }
            self.expect_punct(Punct::Semi, ";")?;
        }
        Ok(())
    }

    fn add_signature_refs(&mut self, function: ObjectId, specs: &Specifiers, ty: &TypeDescriptor) {
        let mut refs = specs.type_refs.clone();
        if let Some(signature) = ty.signature() {
            refs.extend(
                signature
                    .params
                    .iter()
                    .filter_map(|p| self.type_object_for(&p.ty.base)),
            );
        }
        for referenced in refs {
            self.ctx.symbols.add_signature_ref(function, referenced);
        }
    }

    /// Typedef or tag object a base type text names
    fn type_object_for(&self, base: &str) -> Option<ObjectId> {
        let words: Vec<&str> = base
            .split_whitespace()
            .filter(|w| !matches!(*w, "const" | "volatile" | "restrict" | "_Atomic"))
            .collect();
        match words.as_slice() {
            [.., "struct" | "union" | "enum", tag] => self.ctx.symbols.lookup_tag(tag).map(|o| o.id),
            [.., last] => self
                .ctx
                .symbols
                .lookup(last)
                .filter(|o| o.is_typedef())
                .map(|o| o.id),
            [] => None,
        }
    }

    pub(crate) fn declare(&mut self, decl: Declaration) -> ObjectId {
        self.ctx.symbols.declare(decl, &mut self.ctx.diagnostics)
    }

    pub(crate) fn define(&mut self, id: ObjectId, location: Location) -> bool {
        self.ctx.symbols.define(id, location, &mut self.ctx.diagnostics)
    }
}

/// Number of characters a string literal contributes, terminator excluded
fn string_length(text: &str) -> usize {
    let Some(start) = text.find('"') else {
        return 0;
    };
    let inner = text[start + 1..].strip_suffix('"').unwrap_or(&text[start + 1..]);
    let mut chars = inner.chars().peekable();
    let mut length = 0;
    while let Some(c) = chars.next() {
        length += 1;
        if c != '\\' {
            continue;
        }
        match chars.next() {
            Some('x') => {
                while chars.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
                    chars.next();
                }
            }
            Some(d) if d.is_digit(8) => {
                for _ in 0..2 {
                    if chars.peek().is_some_and(|c| c.is_digit(8)) {
                        chars.next();
                    }
                }
            }
            _ => {}
        }
    }
    length
}
