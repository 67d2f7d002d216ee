//! Lexer (tokenizer) for C source code
//!
//! Converts raw source text into a flat [`Token`] stream. Line splices
//! (`\` before a newline) are removed first, comments become whitespace,
//! and every token remembers whether it starts a logical line so the
//! preprocessor can find directives.
//!
//! An unterminated comment is a structural error: the whole translation
//! unit is abandoned. An unterminated quote becomes a
//! [`TokenKind::Unterminated`] token running to the end of its line, so
//! an apostrophe in skipped text or in `#error` prose lexes cleanly; the
//! preprocessor decides whether it is fatal.

use crate::token::{Keyword, Token, TokenKind, PUNCTUATORS};
use symscope_core::Location;
use thiserror::Error;

/// Structural lexing failure
#[derive(Debug, Clone, Error)]
#[error("{location}: {message}")]
pub struct LexError {
    pub message: String,
    pub location: Location,
}

/// Character with its physical position
#[derive(Debug, Clone, Copy)]
struct SourceChar {
    ch: char,
    line: u32,
    column: u32,
}

pub struct Lexer {
    file: String,
    chars: Vec<SourceChar>,
    pos: usize,
    at_line_start: bool,
    space_before: bool,
}

impl Lexer {
    pub fn new(source: &str, file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            chars: splice_lines(source),
            pos: 0,
            at_line_start: true,
            space_before: false,
        }
    }

    /// Tokenize the whole input. The returned stream does not contain an
    /// end-of-input token.
    pub fn tokenize(&mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|c| c.ch)
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).map(|c| c.ch)
    }

    fn location(&self) -> Location {
        match self.chars.get(self.pos).or(self.chars.last()) {
            Some(c) => Location::new(self.file.clone(), c.line, c.column),
            None => Location::new(self.file.clone(), 1, 1),
        }
    }

    fn error(&self, message: impl Into<String>, location: Location) -> LexError {
        LexError {
            message: message.into(),
            location,
        }
    }

    /// Skip whitespace and comments, tracking line starts
    fn skip_trivia(&mut self) -> Result<(), LexError> {
        loop {
            match self.peek() {
                Some('\n') => {
                    self.pos += 1;
                    self.at_line_start = true;
                    self.space_before = true;
                }
                Some(c) if c.is_whitespace() => {
                    self.pos += 1;
                    self.space_before = true;
                }
                Some('/') if self.peek_at(1) == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.pos += 1;
                    }
                    self.space_before = true;
                }
                Some('/') if self.peek_at(1) == Some('*') => {
                    let start = self.location();
                    self.pos += 2;
                    loop {
                        match self.peek() {
                            None => return Err(self.error("unterminated comment", start)),
                            Some('*') if self.peek_at(1) == Some('/') => {
                                self.pos += 2;
                                break;
                            }
                            Some(_) => self.pos += 1,
                        }
                    }
                    self.space_before = true;
                }
                _ => return Ok(()),
            }
        }
    }

    fn next_token(&mut self) -> Result<Option<Token>, LexError> {
        self.skip_trivia()?;
        let Some(c) = self.peek() else {
            return Ok(None);
        };
        let location = self.location();
        let start = self.pos;

        let kind = if c.is_ascii_alphabetic() || c == '_' {
            self.lex_identifier_or_prefixed_literal()
        } else if c.is_ascii_digit() || (c == '.' && self.peek_at(1).is_some_and(|d| d.is_ascii_digit())) {
            self.lex_number()
        } else if c == '"' || c == '\'' {
            self.lex_quoted(c)
        } else if let Some(punct) = self.lex_punct() {
            TokenKind::Punct(punct)
        } else {
            self.pos += 1;
            TokenKind::Other
        };

        let text: String = self.chars[start..self.pos].iter().map(|c| c.ch).collect();
        let mut token = Token::new(kind, text, location);
        token.line_start = self.at_line_start;
        token.space_before = self.space_before;
        self.at_line_start = false;
        self.space_before = false;
        Ok(Some(token))
    }

    fn lex_identifier_or_prefixed_literal(&mut self) -> TokenKind {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        let word: String = self.chars[start..self.pos].iter().map(|c| c.ch).collect();

        // Encoding prefixes: L'x', u"..", U"..", u8".."
        if matches!(word.as_str(), "L" | "u" | "U" | "u8") {
            if let Some(quote @ ('"' | '\'')) = self.peek() {
                return self.lex_quoted(quote);
            }
        }

        match Keyword::lookup(&word) {
            Some(kw) => TokenKind::Keyword(kw),
            None => TokenKind::Identifier,
        }
    }

    /// pp-number: digits, letters, `_`, `.`, and signed exponents
    fn lex_number(&mut self) -> TokenKind {
        let mut is_float = false;
        let is_hex = self.peek() == Some('0') && matches!(self.peek_at(1), Some('x') | Some('X'));
        while let Some(c) = self.peek() {
            if (c == '+' || c == '-')
                && self.pos > 0
                && matches!(self.chars[self.pos - 1].ch, 'e' | 'E' | 'p' | 'P')
            {
                let exp = self.chars[self.pos - 1].ch;
                if (exp == 'e' || exp == 'E') && is_hex {
                    break;
                }
                is_float = true;
                self.pos += 1;
            } else if c.is_ascii_alphanumeric() || c == '_' {
                if !is_hex && (c == 'e' || c == 'E') {
                    is_float = true;
                }
                if is_hex && (c == 'p' || c == 'P') {
                    is_float = true;
                }
                self.pos += 1;
            } else if c == '.' {
                is_float = true;
                self.pos += 1;
            } else {
                break;
            }
        }
        if is_float {
            TokenKind::FloatLiteral
        } else {
            TokenKind::IntLiteral
        }
    }

    /// String or character literal; without its closing quote the token
    /// stops before the newline
    fn lex_quoted(&mut self, quote: char) -> TokenKind {
        self.pos += 1;
        loop {
            match self.peek() {
                None | Some('\n') => return TokenKind::Unterminated,
                Some('\\') => self.pos = (self.pos + 2).min(self.chars.len()),
                Some(c) if c == quote => {
                    self.pos += 1;
                    return if quote == '"' {
                        TokenKind::StringLiteral
                    } else {
                        TokenKind::CharLiteral
                    };
                }
                Some(_) => self.pos += 1,
            }
        }
    }

    fn lex_punct(&mut self) -> Option<crate::token::Punct> {
        for (spelling, punct) in PUNCTUATORS {
            let matches = spelling
                .chars()
                .enumerate()
                .all(|(i, ch)| self.peek_at(i) == Some(ch));
            if matches {
                self.pos += spelling.len();
                return Some(*punct);
            }
        }
        None
    }
}

/// Translation phase 2: drop backslash-newline pairs, keeping the
/// physical position of every remaining character.
fn splice_lines(source: &str) -> Vec<SourceChar> {
    let raw: Vec<char> = source.chars().collect();
    let mut out = Vec::with_capacity(raw.len());
    let (mut line, mut column) = (1u32, 1u32);
    let mut i = 0;
    while i < raw.len() {
        let c = raw[i];
        if c == '\\' {
            let skip = match (raw.get(i + 1), raw.get(i + 2)) {
                (Some('\n'), _) => 2,
                (Some('\r'), Some('\n')) => 3,
                _ => 0,
            };
            if skip > 0 {
                i += skip;
                line += 1;
                column = 1;
                continue;
            }
        }
        if c == '\r' && raw.get(i + 1) == Some(&'\n') {
            i += 1;
            continue;
        }
        out.push(SourceChar { ch: c, line, column });
        if c == '\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
        i += 1;
    }
    out
}

/// Lex a fragment produced inside the preprocessor (token pasting)
pub fn lex_fragment(text: &str, location: &Location) -> Option<Vec<Token>> {
    let mut lexer = Lexer::new(text, location.file.clone());
    let mut tokens = lexer.tokenize().ok()?;
    for tok in &mut tokens {
        tok.location = location.clone();
        tok.line_start = false;
    }
    Some(tokens)
}
