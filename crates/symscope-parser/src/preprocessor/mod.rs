//! C preprocessor
//!
//! Pull-based token source for the parser: handles directives, drops
//! inactive regions, splices in included headers and expands macros.
//! All state it changes (macro table, conditional stack, catalogue,
//! diagnostics) belongs to the [`AnalysisContext`] passed to every call.

pub mod conditional;
pub mod expr;
pub mod include;
pub mod macros;

pub use conditional::{BranchRecord, ConditionalError, ConditionalFrame, ConditionalStack};
pub use expr::{evaluate, evaluate_strict, EvalError};
pub use include::{FileSystemIncludes, IncludeResolver, IncludedSource, MemoryIncludes, NoIncludes};
pub use macros::{DefineOutcome, Expansion, MacroDefinition, MacroIssue, MacroTable};

use crate::context::AnalysisContext;
use crate::lexer::Lexer;
use crate::token::{spell, Punct, Token, TokenKind};
use std::collections::VecDeque;
use symscope_core::{DiagnosticKind, Location, Severity};
use tracing::debug;

struct FileCursor {
    path: String,
    tokens: Vec<Token>,
    pos: usize,
}

pub struct Preprocessor<'r> {
    files: Vec<FileCursor>,
    pending: VecDeque<Token>,
    resolver: &'r dyn IncludeResolver,
    last_location: Location,
    finished: bool,
    aborted: bool,
}

impl<'r> Preprocessor<'r> {
    /// `tokens` is the lexed main file
    pub fn new(path: impl Into<String>, tokens: Vec<Token>, resolver: &'r dyn IncludeResolver) -> Self {
        let path = path.into();
        let last_location = Location::new(path.clone(), 1, 1);
        Self {
            files: vec![FileCursor {
                path,
                tokens,
                pos: 0,
            }],
            pending: VecDeque::new(),
            resolver,
            last_location,
            finished: false,
            aborted: false,
        }
    }

    /// A header could not be lexed, or active text holds an unterminated
    /// literal; the unit is abandoned
    pub fn aborted(&self) -> bool {
        self.aborted
    }

    /// Location of the last token read
    pub fn end_location(&self) -> Location {
        self.last_location.clone()
    }

    /// Next token of the active, macro-expanded stream
    pub fn next_token(&mut self, ctx: &mut AnalysisContext) -> Option<Token> {
        loop {
            if self.aborted {
                return None;
            }
            if let Some(tok) = self.pending.pop_front() {
                return self.deliver(tok, ctx);
            }

            let Some(tok) = self.raw_next() else {
                if self.files.len() > 1 {
                    if let Some(done) = self.files.pop() {
                        debug!("leaving {}", done.path);
                    }
                    continue;
                }
                if !self.finished {
                    self.finish(ctx);
                }
                return None;
            };

            if tok.line_start && tok.is_punct(Punct::Hash) {
                self.directive(tok, ctx);
                continue;
            }
            if !ctx.conditions.is_active() {
                continue;
            }
            if tok.is_name() && ctx.macros.is_defined(&tok.text) {
                self.expand_reference(tok, ctx);
                continue;
            }
            return self.deliver(tok, ctx);
        }
    }

    /// Hand an active token to the parser. Unterminated literals are only
    /// fatal here: in skipped groups and directive lines they are inert.
    fn deliver(&mut self, tok: Token, ctx: &mut AnalysisContext) -> Option<Token> {
        if tok.kind != TokenKind::Unterminated {
            return Some(tok);
        }
        let what = match tok.text.chars().find(|c| *c == '"' || *c == '\'') {
            Some('"') => "string literal",
            _ => "character literal",
        };
        ctx.diagnostics.report(
            DiagnosticKind::StructuralFatal,
            tok.location,
            format!("unterminated {}", what),
        );
        self.aborted = true;
        None
    }

    // ===== Raw token access =====

    fn raw_next(&mut self) -> Option<Token> {
        let cursor = self.files.last_mut()?;
        let tok = cursor.tokens.get(cursor.pos)?.clone();
        cursor.pos += 1;
        self.last_location = tok.location.clone();
        Some(tok)
    }

    fn raw_peek(&self) -> Option<&Token> {
        let cursor = self.files.last()?;
        cursor.tokens.get(cursor.pos)
    }

    /// Remaining tokens of the current logical line
    fn line_rest(&mut self) -> Vec<Token> {
        let mut line = Vec::new();
        while self.raw_peek().is_some_and(|t| !t.line_start) {
            if let Some(tok) = self.raw_next() {
                line.push(tok);
            }
        }
        line
    }

    fn current_path(&self) -> String {
        self.files
            .last()
            .map(|f| f.path.clone())
            .unwrap_or_default()
    }

    fn next_is_lparen(&self) -> bool {
        self.raw_peek().is_some_and(|t| t.is_punct(Punct::LParen))
    }

    /// Append a parenthesized argument list from the source to `out`.
    /// Stops early at end of file or at a directive line.
    fn collect_invocation(&mut self, out: &mut Vec<Token>) -> bool {
        let mut depth = 0usize;
        while let Some(next) = self.raw_peek() {
            if next.line_start && next.is_punct(Punct::Hash) {
                return false;
            }
            let Some(tok) = self.raw_next() else { break };
            let close = tok.is_punct(Punct::RParen);
            if tok.is_punct(Punct::LParen) {
                depth += 1;
            } else if close {
                depth = depth.saturating_sub(1);
            }
            out.push(tok);
            if close && depth == 0 {
                return true;
            }
        }
        false
    }

    // ===== Macro expansion =====

    fn expand_reference(&mut self, tok: Token, ctx: &mut AnalysisContext) {
        let function_like = ctx
            .macros
            .get(&tok.text)
            .is_some_and(|d| d.is_function_like());

        if function_like && !self.next_is_lparen() {
            ctx.symbols.record_macro_use(&tok.text, tok.location.clone());
            let mut reference = tok;
            reference.kind = TokenKind::MacroRef;
            self.pending.push_back(reference);
            return;
        }

        let mut invocation = vec![tok];
        if function_like {
            self.collect_invocation(&mut invocation);
        }
        let mut tokens = self.expand_and_record(&invocation, ctx);

        // A function-like macro produced at the end of an expansion may
        // take its arguments from the source that follows
        while tokens
            .last()
            .is_some_and(|t| t.is_name() && ctx.macros.get(&t.text).is_some_and(|d| d.is_function_like()))
            && self.next_is_lparen()
        {
            let mut tail: Vec<Token> = tokens.pop().into_iter().collect();
            self.collect_invocation(&mut tail);
            tokens.extend(self.expand_and_record(&tail, ctx));
        }

        for mut t in tokens {
            if t.is_name() && ctx.macros.get(&t.text).is_some_and(|d| d.is_function_like()) {
                t.kind = TokenKind::MacroRef;
            }
            self.pending.push_back(t);
        }
    }

    fn expand_and_record(&mut self, tokens: &[Token], ctx: &mut AnalysisContext) -> Vec<Token> {
        let expansion = ctx.macros.expand_fully(tokens);
        for (name, location) in &expansion.expanded {
            ctx.symbols.record_macro_use(name, location.clone());
        }
        for issue in expansion.issues {
            ctx.diagnostics
                .report(DiagnosticKind::MacroArguments, issue.location, issue.message);
        }
        expansion.tokens
    }

    // ===== Directives =====

    fn directive(&mut self, hash: Token, ctx: &mut AnalysisContext) {
        let line = self.line_rest();
        let location = hash.location;
        let Some(name_tok) = line.first() else {
            return;
        };
        if name_tok.kind == TokenKind::IntLiteral {
            // `# 12 "file.c"` line marker
            return;
        }
        let name = name_tok.text.clone();
        let args = &line[1..];
        let text = format!("#{} {}", name, spell(args)).trim_end().to_string();
        debug!("{} at {}", text, location);

        match name.as_str() {
            "if" | "ifdef" | "ifndef" => {
                let condition = ctx.conditions.is_active() && self.condition(&name, args, &location, ctx);
                ctx.conditions.push_if(text, condition, location);
            }
            "elif" | "elifdef" | "elifndef" => {
                let condition =
                    ctx.conditions.elif_wants_evaluation() && self.condition(&name, args, &location, ctx);
                if let Err(e) = ctx.conditions.elif(text, condition, location.clone()) {
                    ctx.diagnostics
                        .report(DiagnosticKind::UnmatchedConditional, location, e.to_string());
                }
            }
            "else" => {
                if let Err(e) = ctx.conditions.else_(location.clone()) {
                    ctx.diagnostics
                        .report(DiagnosticKind::UnmatchedConditional, location, e.to_string());
                }
            }
            "endif" => {
                if let Err(e) = ctx.conditions.endif(location.clone()) {
                    ctx.diagnostics
                        .report(DiagnosticKind::UnmatchedConditional, location, e.to_string());
                }
            }
            _ if !ctx.conditions.is_active() => {}
            "define" => self.define(args, &location, ctx),
            "undef" => match args.first() {
                Some(t) if t.is_name() => {
                    ctx.macros.undefine(&t.text);
                }
                _ => ctx.diagnostics.report(
                    DiagnosticKind::UnparseableConstruct,
                    location,
                    "macro name missing in #undef",
                ),
            },
            "include" | "include_next" => self.include(args, &location, ctx),
            "error" => {
                ctx.diagnostics
                    .report(DiagnosticKind::ErrorDirective, location, text);
            }
            "warning" => {
                ctx.diagnostics.report_with_severity(
                    DiagnosticKind::ErrorDirective,
                    Severity::Warning,
                    location,
                    text,
                );
            }
            "pragma" | "line" | "ident" | "sccs" | "assert" | "unassert" => {
                debug!("ignoring #{}", name);
            }
            _ => {
                ctx.diagnostics.report(
                    DiagnosticKind::UnknownDirective,
                    location,
                    format!("unknown preprocessing directive #{}", name),
                );
            }
        }
    }

    fn condition(&mut self, directive: &str, args: &[Token], location: &Location, ctx: &mut AnalysisContext) -> bool {
        let negate = match directive {
            "ifdef" | "elifdef" => false,
            "ifndef" | "elifndef" => true,
            _ => return self.evaluate_condition(args, location, ctx),
        };
        match args.first() {
            Some(t) if t.is_name() => ctx.macros.is_defined(&t.text) != negate,
            _ => {
                ctx.diagnostics.report(
                    DiagnosticKind::UnresolvedConditionalExpression,
                    location.clone(),
                    format!("#{} without macro name", directive),
                );
                false
            }
        }
    }

    /// `defined` first, then macro expansion, then arithmetic. Anything
    /// that cannot be evaluated counts as false.
    fn evaluate_condition(&mut self, args: &[Token], location: &Location, ctx: &mut AnalysisContext) -> bool {
        let mut replaced = Vec::with_capacity(args.len());
        let mut i = 0;
        while i < args.len() {
            let tok = &args[i];
            if !(tok.is_name() && tok.text == "defined") {
                replaced.push(tok.clone());
                i += 1;
                continue;
            }
            let (name, next) = match (args.get(i + 1), args.get(i + 2), args.get(i + 3)) {
                (Some(open), Some(n), Some(close))
                    if open.is_punct(Punct::LParen) && n.is_name() && close.is_punct(Punct::RParen) =>
                {
                    (Some(n), i + 4)
                }
                (Some(n), _, _) if n.is_name() => (Some(n), i + 2),
                _ => (None, i + 1),
            };
            let Some(name) = name else {
                ctx.diagnostics.report(
                    DiagnosticKind::UnresolvedConditionalExpression,
                    tok.location.clone(),
                    "operator 'defined' requires an identifier",
                );
                return false;
            };
            let value = if ctx.macros.is_defined(&name.text) { "1" } else { "0" };
            let mut literal = Token::new(TokenKind::IntLiteral, value, tok.location.clone());
            literal.space_before = tok.space_before;
            replaced.push(literal);
            i = next;
        }

        let expanded = self.expand_and_record(&replaced, ctx);
        let operands = zero_unknown_calls(expanded);
        match expr::evaluate(&operands) {
            Ok(value) => value != 0,
            Err(e) => {
                ctx.diagnostics.report(
                    DiagnosticKind::UnresolvedConditionalExpression,
                    location.clone(),
                    format!("cannot evaluate `{}`: {}", spell(args), e),
                );
                false
            }
        }
    }

    fn define(&mut self, args: &[Token], location: &Location, ctx: &mut AnalysisContext) {
        let definition = match MacroDefinition::from_directive(args) {
            Ok(definition) => definition,
            Err(message) => {
                ctx.diagnostics
                    .report(DiagnosticKind::UnparseableConstruct, location.clone(), message);
                return;
            }
        };
        let name = definition.name.clone();
        let defined_at = definition.location.clone();
        if let DefineOutcome::Redefined { previous } = ctx.macros.define(definition) {
            ctx.diagnostics.report(
                DiagnosticKind::MacroRedefinition,
                defined_at.clone(),
                format!("macro '{}' redefined, previous definition at {}", name, previous),
            );
        }
        ctx.symbols.declare_macro(&name, defined_at);
    }

    fn include(&mut self, args: &[Token], location: &Location, ctx: &mut AnalysisContext) {
        if self.files.len() > ctx.config.max_include_depth {
            ctx.diagnostics.report_with_severity(
                DiagnosticKind::IncludeNotFound,
                Severity::Error,
                location.clone(),
                format!("#include nested deeper than {} levels", ctx.config.max_include_depth),
            );
            return;
        }

        let named = match header_name(args) {
            Some(named) => Some(named),
            // `#include MACRO`
            None if args.first().is_some_and(|t| t.is_name()) => {
                let expanded = self.expand_and_record(args, ctx);
                header_name(&expanded)
            }
            None => None,
        };
        let Some((header, angled)) = named else {
            ctx.diagnostics.report(
                DiagnosticKind::UnparseableConstruct,
                location.clone(),
                "#include expects \"FILENAME\" or <FILENAME>",
            );
            return;
        };

        let including = self.current_path();
        let Some(source) = self.resolver.resolve(&header, angled, &including) else {
            ctx.diagnostics.report(
                DiagnosticKind::IncludeNotFound,
                location.clone(),
                format!("cannot find include file '{}'", header),
            );
            return;
        };

        debug!("including {} from {}", source.path, including);
        match Lexer::new(&source.text, source.path.clone()).tokenize() {
            Ok(tokens) => self.files.push(FileCursor {
                path: source.path,
                tokens,
                pos: 0,
            }),
            Err(e) => {
                ctx.diagnostics
                    .report(DiagnosticKind::StructuralFatal, e.location, e.message);
                self.aborted = true;
            }
        }
    }

    fn finish(&mut self, ctx: &mut AnalysisContext) {
        self.finished = true;
        let end = self.last_location.clone();
        for opened_at in ctx.conditions.finish(&end) {
            ctx.diagnostics.report(
                DiagnosticKind::UnterminatedConditional,
                opened_at,
                "unterminated conditional directive",
            );
        }
    }
}

/// `"name.h"` or `<sys/name.h>`
fn header_name(tokens: &[Token]) -> Option<(String, bool)> {
    let first = tokens.first()?;
    if first.kind == TokenKind::StringLiteral {
        let inner = first.text.strip_prefix('"')?.strip_suffix('"')?;
        return Some((inner.to_string(), false));
    }
    if first.is_punct(Punct::Lt) {
        let close = tokens.iter().position(|t| t.is_punct(Punct::Gt))?;
        let inner: String = tokens[1..close].iter().map(|t| t.text.as_str()).collect();
        return Some((inner, true));
    }
    None
}

/// Replace `name(...)` left over after expansion (`__has_include(x)`,
/// undefined function-like tests) by `0`
fn zero_unknown_calls(tokens: Vec<Token>) -> Vec<Token> {
    let mut out = Vec::with_capacity(tokens.len());
    let mut i = 0;
    while i < tokens.len() {
        let tok = &tokens[i];
        let is_call = tok.is_name() && tokens.get(i + 1).is_some_and(|t| t.is_punct(Punct::LParen));
        if !is_call {
            out.push(tok.clone());
            i += 1;
            continue;
        }
        let mut depth = 0usize;
        let mut j = i + 1;
        while j < tokens.len() {
            if tokens[j].is_punct(Punct::LParen) {
                depth += 1;
            } else if tokens[j].is_punct(Punct::RParen) {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
            j += 1;
        }
        out.push(Token::new(TokenKind::IntLiteral, "0", tok.location.clone()));
        i = j + 1;
    }
    out
}
