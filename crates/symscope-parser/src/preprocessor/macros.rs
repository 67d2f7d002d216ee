//! Macro table and expansion
//!
//! Object-like and function-like macros, `#` stringizing, `##` pasting and
//! `__VA_ARGS__`. Every expanded token carries the set of macro names it
//! came from; a name in that set is never expanded again, so
//! self-referential definitions terminate.

use crate::lexer::lex_fragment;
use crate::token::{Punct, Token, TokenKind};
use std::collections::HashMap;
use symscope_core::Location;
use tracing::trace;

const VA_ARGS: &str = "__VA_ARGS__";

/// A `#define`
#[derive(Debug, Clone)]
pub struct MacroDefinition {
    pub name: String,
    /// `None` for object-like macros. A variadic macro's last parameter
    /// is `__VA_ARGS__` or its GNU-style name.
    pub params: Option<Vec<String>>,
    pub variadic: bool,
    pub body: Vec<Token>,
    pub location: Location,
}

impl MacroDefinition {
    /// Build from the tokens following `#define`
    pub fn from_directive(tokens: &[Token]) -> Result<Self, String> {
        let name_tok = tokens.first().ok_or("macro name missing in #define")?;
        if !name_tok.is_name() {
            return Err(format!("macro name must be an identifier, found {}", name_tok));
        }

        let mut rest = &tokens[1..];
        let mut params = None;
        let mut variadic = false;

        if rest
            .first()
            .is_some_and(|t| t.is_punct(Punct::LParen) && !t.space_before)
        {
            let mut names = Vec::new();
            let mut i = 1;
            loop {
                let tok = rest
                    .get(i)
                    .ok_or_else(|| format!("missing ')' in parameter list of macro {}", name_tok.text))?;
                if tok.is_punct(Punct::RParen) && names.is_empty() {
                    i += 1;
                    break;
                }
                if tok.is_punct(Punct::Ellipsis) {
                    names.push(VA_ARGS.to_string());
                    variadic = true;
                } else if tok.is_name() {
                    names.push(tok.text.clone());
                    if rest.get(i + 1).is_some_and(|t| t.is_punct(Punct::Ellipsis)) {
                        variadic = true;
                        i += 1;
                    }
                } else {
                    return Err(format!("invalid macro parameter {}", tok));
                }
                i += 1;
                match rest.get(i) {
                    Some(t) if t.is_punct(Punct::RParen) => {
                        i += 1;
                        break;
                    }
                    Some(t) if t.is_punct(Punct::Comma) && !variadic => i += 1,
                    _ => return Err(format!("malformed parameter list of macro {}", name_tok.text)),
                }
            }
            rest = &rest[i..];
            params = Some(names);
        }

        let mut body = rest.to_vec();
        if let Some(first) = body.first_mut() {
            first.space_before = false;
        }

        Ok(Self {
            name: name_tok.text.clone(),
            params,
            variadic,
            body,
            location: name_tok.location.clone(),
        })
    }

    pub fn is_function_like(&self) -> bool {
        self.params.is_some()
    }

    /// Same parameters and the same replacement list, whitespace
    /// separation included
    pub fn same_definition(&self, other: &MacroDefinition) -> bool {
        self.params == other.params
            && self.variadic == other.variadic
            && self.body.len() == other.body.len()
            && self.body.iter().zip(&other.body).enumerate().all(|(i, (a, b))| {
                a.text == b.text && (i == 0 || a.space_before == b.space_before)
            })
    }

    fn param_index(&self, tok: &Token) -> Option<usize> {
        if !tok.is_name() {
            return None;
        }
        self.params.as_ref()?.iter().position(|p| *p == tok.text)
    }
}

/// Result of registering a definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefineOutcome {
    New,
    /// Same body as the existing definition
    Identical,
    /// Replaced a definition with a different body
    Redefined { previous: Location },
}

/// Problem met while expanding, reported by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroIssue {
    pub location: Location,
    pub message: String,
}

/// Output of an expansion
#[derive(Debug, Clone, Default)]
pub struct Expansion {
    pub tokens: Vec<Token>,
    /// Every macro expanded, with the location of the reference
    pub expanded: Vec<(String, Location)>,
    pub issues: Vec<MacroIssue>,
}

#[derive(Debug, Clone)]
struct Pending {
    token: Token,
    hide: Vec<String>,
}

impl Pending {
    fn plain(token: Token) -> Self {
        Self {
            token,
            hide: Vec::new(),
        }
    }
}

enum ArgScan {
    NotInvoked,
    Unterminated,
    Args(Vec<Vec<Token>>, usize),
}

/// Currently defined macros
#[derive(Debug, Clone)]
pub struct MacroTable {
    macros: HashMap<String, MacroDefinition>,
    max_passes: usize,
}

impl Default for MacroTable {
    fn default() -> Self {
        Self::new(32)
    }
}

impl MacroTable {
    pub fn new(max_passes: usize) -> Self {
        Self {
            macros: HashMap::new(),
            max_passes: max_passes.max(1),
        }
    }

    /// Register a definition; the last definition wins
    pub fn define(&mut self, definition: MacroDefinition) -> DefineOutcome {
        let outcome = match self.macros.get(&definition.name) {
            None => DefineOutcome::New,
            Some(existing) if existing.same_definition(&definition) => DefineOutcome::Identical,
            Some(existing) => DefineOutcome::Redefined {
                previous: existing.location.clone(),
            },
        };
        self.macros.insert(definition.name.clone(), definition);
        outcome
    }

    /// Object-like macro with an integer body, as supplied by a configuration
    pub fn define_value(&mut self, name: &str, value: i64) {
        let location = Location::builtin();
        let body = vec![Token::new(TokenKind::IntLiteral, value.to_string(), location.clone())];
        self.macros.insert(
            name.to_string(),
            MacroDefinition {
                name: name.to_string(),
                params: None,
                variadic: false,
                body,
                location,
            },
        );
    }

    pub fn undefine(&mut self, name: &str) -> Option<MacroDefinition> {
        self.macros.remove(name)
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&MacroDefinition> {
        self.macros.get(name)
    }

    pub fn len(&self) -> usize {
        self.macros.len()
    }

    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }

    /// One substitution pass. Tokens produced by the pass are not examined
    /// again.
    pub fn expand(&self, tokens: &[Token]) -> Expansion {
        let mut expansion = Expansion::default();
        let seq = tokens.iter().cloned().map(Pending::plain).collect();
        let (seq, _) = self.expand_pass(seq, &mut expansion);
        expansion.tokens = seq.into_iter().map(|p| p.token).collect();
        expansion
    }

    /// Rescan until nothing expandable is left or the pass limit is hit
    pub fn expand_fully(&self, tokens: &[Token]) -> Expansion {
        let mut expansion = Expansion::default();
        let seq = tokens.iter().cloned().map(Pending::plain).collect();
        let seq = self.rescan(seq, &mut expansion);
        expansion.tokens = seq.into_iter().map(|p| p.token).collect();
        expansion
    }

    fn rescan(&self, mut seq: Vec<Pending>, expansion: &mut Expansion) -> Vec<Pending> {
        for _ in 0..self.max_passes {
            let (next, changed) = self.expand_pass(seq, expansion);
            seq = next;
            if !changed {
                return seq;
            }
        }
        if let Some(first) = seq.first() {
            expansion.issues.push(MacroIssue {
                location: first.token.location.clone(),
                message: format!("macro expansion stopped after {} passes", self.max_passes),
            });
        }
        seq
    }

    fn expandable(&self, item: &Pending) -> Option<&MacroDefinition> {
        if !item.token.is_name() || item.hide.contains(&item.token.text) {
            return None;
        }
        self.macros.get(&item.token.text)
    }

    fn expand_pass(&self, seq: Vec<Pending>, expansion: &mut Expansion) -> (Vec<Pending>, bool) {
        let mut out = Vec::with_capacity(seq.len());
        let mut changed = false;
        let mut i = 0;

        while i < seq.len() {
            let item = &seq[i];
            let Some(def) = self.expandable(item) else {
                out.push(item.clone());
                i += 1;
                continue;
            };

            let location = item.token.location.clone();
            let mut hide = item.hide.clone();
            hide.push(def.name.clone());

            let replacement = match &def.params {
                None => {
                    i += 1;
                    self.substitute(def, &[], &hide, expansion)
                }
                Some(params) => {
                    let split_limit = if def.variadic {
                        params.len().saturating_sub(1)
                    } else {
                        usize::MAX
                    };
                    match scan_args(&seq, i + 1, split_limit) {
                        ArgScan::NotInvoked => {
                            out.push(item.clone());
                            i += 1;
                            continue;
                        }
                        ArgScan::Unterminated => {
                            expansion.issues.push(MacroIssue {
                                location,
                                message: format!("unterminated argument list invoking macro {}", def.name),
                            });
                            out.push(item.clone());
                            i += 1;
                            continue;
                        }
                        ArgScan::Args(mut args, next) => {
                            if params.is_empty() && args.len() == 1 && args[0].is_empty() {
                                args.clear();
                            }
                            if def.variadic && args.len() + 1 == params.len() {
                                args.push(Vec::new());
                            }
                            if args.len() != params.len() {
                                expansion.issues.push(MacroIssue {
                                    location,
                                    message: format!(
                                        "macro {} expects {} arguments, {} given",
                                        def.name,
                                        params.len(),
                                        args.len()
                                    ),
                                });
                                out.push(item.clone());
                                i += 1;
                                continue;
                            }
                            i = next;
                            self.substitute(def, &args, &item.hide, expansion)
                        }
                    }
                }
            };

            trace!("expanded macro {} at {}", def.name, location);
            expansion.expanded.push((def.name.clone(), location.clone()));
            changed = true;

            let space_before = item.token.space_before;
            for (k, mut tok) in replacement.into_iter().enumerate() {
                tok.location = location.clone();
                tok.line_start = false;
                if k == 0 {
                    tok.space_before = space_before;
                }
                out.push(Pending {
                    token: tok,
                    hide: hide.clone(),
                });
            }
        }

        (out, changed)
    }

    /// Replacement list with arguments substituted. `outer_hide` is the
    /// invocation's own hide set, used to pre-expand arguments.
    fn substitute(
        &self,
        def: &MacroDefinition,
        args: &[Vec<Token>],
        outer_hide: &[String],
        expansion: &mut Expansion,
    ) -> Vec<Token> {
        let body = &def.body;
        let mut out: Vec<Token> = Vec::with_capacity(body.len());
        let mut j = 0;

        while j < body.len() {
            let tok = &body[j];

            if tok.is_punct(Punct::Hash) && def.is_function_like() {
                if let Some(idx) = body.get(j + 1).and_then(|t| def.param_index(t)) {
                    let mut literal = stringize(&args[idx], &tok.location);
                    literal.space_before = tok.space_before;
                    out.push(literal);
                    j += 2;
                    continue;
                }
            }

            if tok.is_punct(Punct::HashHash) && !out.is_empty() && j + 1 < body.len() {
                let right_tok = &body[j + 1];
                let (right, is_va) = match def.param_index(right_tok) {
                    Some(idx) => (args[idx].clone(), def.variadic && idx + 1 == args.len()),
                    None => (vec![right_tok.clone()], false),
                };
                paste(&mut out, right, is_va);
                j += 2;
                continue;
            }

            if let Some(idx) = def.param_index(tok) {
                let pasted = body.get(j + 1).is_some_and(|t| t.is_punct(Punct::HashHash));
                let mut replacement = if pasted {
                    args[idx].clone()
                } else {
                    let seq = args[idx]
                        .iter()
                        .cloned()
                        .map(|token| Pending {
                            token,
                            hide: outer_hide.to_vec(),
                        })
                        .collect();
                    self.rescan(seq, expansion)
                        .into_iter()
                        .map(|p| p.token)
                        .collect()
                };
                if let Some(first) = replacement.first_mut() {
                    first.space_before = tok.space_before;
                }
                out.extend(replacement);
                j += 1;
                continue;
            }

            out.push(tok.clone());
            j += 1;
        }

        out
    }
}

/// Collect a parenthesized argument list starting at `start`. At most
/// `split_limit` top-level commas separate arguments; later commas stay
/// inside the last argument.
fn scan_args(seq: &[Pending], start: usize, split_limit: usize) -> ArgScan {
    if !seq.get(start).is_some_and(|p| p.token.is_punct(Punct::LParen)) {
        return ArgScan::NotInvoked;
    }

    let mut args = vec![Vec::new()];
    let mut depth = 0usize;
    let mut i = start + 1;
    while let Some(item) = seq.get(i) {
        let tok = &item.token;
        match tok.kind {
            TokenKind::Punct(Punct::LParen) => depth += 1,
            TokenKind::Punct(Punct::RParen) if depth == 0 => {
                return ArgScan::Args(args, i + 1);
            }
            TokenKind::Punct(Punct::RParen) => depth -= 1,
            TokenKind::Punct(Punct::Comma) if depth == 0 && args.len() <= split_limit => {
                args.push(Vec::new());
                i += 1;
                continue;
            }
            _ => {}
        }
        if let Some(current) = args.last_mut() {
            current.push(tok.clone());
        }
        i += 1;
    }
    ArgScan::Unterminated
}

fn stringize(arg: &[Token], location: &Location) -> Token {
    let mut text = String::from("\"");
    for (i, tok) in arg.iter().enumerate() {
        if i > 0 && tok.space_before {
            text.push(' ');
        }
        if matches!(tok.kind, TokenKind::StringLiteral | TokenKind::CharLiteral) {
            for c in tok.text.chars() {
                if c == '"' || c == '\\' {
                    text.push('\\');
                }
                text.push(c);
            }
        } else {
            text.push_str(&tok.text);
        }
    }
    text.push('"');
    Token::new(TokenKind::StringLiteral, text, location.clone())
}

/// Glue the last token of `out` to the first token of `right`
fn paste(out: &mut Vec<Token>, right: Vec<Token>, right_is_va_args: bool) {
    let mut right = right.into_iter();
    let Some(first) = right.next() else {
        // GNU `, ## __VA_ARGS__` with no variadic arguments drops the comma
        if right_is_va_args && out.last().is_some_and(|t| t.is_punct(Punct::Comma)) {
            out.pop();
        }
        return;
    };
    let Some(left) = out.pop() else {
        out.push(first);
        out.extend(right);
        return;
    };

    let glued = format!("{}{}", left.text, first.text);
    match lex_fragment(&glued, &left.location) {
        Some(mut tokens) if tokens.len() == 1 => {
            tokens[0].space_before = left.space_before;
            out.extend(tokens);
        }
        _ => {
            trace!("pasting {} and {} does not give a valid token", left.text, first.text);
            out.push(left);
            out.push(first);
        }
    }
    out.extend(right);
}
