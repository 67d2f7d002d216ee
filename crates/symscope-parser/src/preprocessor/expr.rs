//! Integer constant-expression evaluation
//!
//! Used for `#if`/`#elif` conditions and array bounds. Operates on tokens
//! after `defined` and macro substitution. Arithmetic wraps, and the
//! unevaluated side of `&&`, `||` and `?:` may divide by zero.

use crate::token::{Punct, Token, TokenKind};
use symscope_core::config::parse_int;
use thiserror::Error;

/// Why an expression has no value
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("empty expression")]
    Empty,

    #[error("unexpected {0} in constant expression")]
    Unexpected(String),

    #[error("unexpected end of constant expression")]
    UnexpectedEnd,

    #[error("division by zero in constant expression")]
    DivisionByZero,

    #[error("invalid integer literal `{0}`")]
    InvalidLiteral(String),

    #[error("`{0}` is not a constant")]
    NotConstant(String),
}

/// Evaluate a conditional-directive expression. Remaining identifiers
/// count as 0.
pub fn evaluate(tokens: &[Token]) -> Result<i64, EvalError> {
    Evaluator::new(tokens, false).run()
}

/// Evaluate an expression that must consist of constants only
pub fn evaluate_strict(tokens: &[Token]) -> Result<i64, EvalError> {
    Evaluator::new(tokens, true).run()
}

struct Evaluator<'a> {
    tokens: &'a [Token],
    pos: usize,
    strict: bool,
}

fn binary_precedence(p: Punct) -> Option<u8> {
    Some(match p {
        Punct::PipePipe => 1,
        Punct::AmpAmp => 2,
        Punct::Pipe => 3,
        Punct::Caret => 4,
        Punct::Amp => 5,
        Punct::EqEq | Punct::NotEq => 6,
        Punct::Lt | Punct::Gt | Punct::Le | Punct::Ge => 7,
        Punct::Shl | Punct::Shr => 8,
        Punct::Plus | Punct::Minus => 9,
        Punct::Star | Punct::Slash | Punct::Percent => 10,
        _ => return None,
    })
}

impl<'a> Evaluator<'a> {
    fn new(tokens: &'a [Token], strict: bool) -> Self {
        Self {
            tokens,
            pos: 0,
            strict,
        }
    }

    fn run(mut self) -> Result<i64, EvalError> {
        if self.tokens.is_empty() {
            return Err(EvalError::Empty);
        }
        let value = self.conditional(true)?;
        match self.peek() {
            None => Ok(value),
            Some(tok) => Err(EvalError::Unexpected(tok.to_string())),
        }
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn peek_punct(&self) -> Option<Punct> {
        match self.peek()?.kind {
            TokenKind::Punct(p) => Some(p),
            _ => None,
        }
    }

    fn advance(&mut self) -> Result<&'a Token, EvalError> {
        let tok = self.tokens.get(self.pos).ok_or(EvalError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(tok)
    }

    fn expect(&mut self, p: Punct) -> Result<(), EvalError> {
        let tok = self.advance()?;
        if tok.is_punct(p) {
            Ok(())
        } else {
            Err(EvalError::Unexpected(tok.to_string()))
        }
    }

    fn conditional(&mut self, live: bool) -> Result<i64, EvalError> {
        let cond = self.binary(1, live)?;
        if self.peek_punct() != Some(Punct::Question) {
            return Ok(cond);
        }
        self.pos += 1;
        let then = self.conditional(live && cond != 0)?;
        self.expect(Punct::Colon)?;
        let otherwise = self.conditional(live && cond == 0)?;
        Ok(if cond != 0 { then } else { otherwise })
    }

    fn binary(&mut self, min_prec: u8, live: bool) -> Result<i64, EvalError> {
        let mut lhs = self.unary(live)?;
        while let Some((op, prec)) = self
            .peek_punct()
            .and_then(|p| binary_precedence(p).map(|prec| (p, prec)))
        {
            if prec < min_prec {
                break;
            }
            self.pos += 1;
            let rhs_live = match op {
                Punct::AmpAmp => live && lhs != 0,
                Punct::PipePipe => live && lhs == 0,
                _ => live,
            };
            let rhs = self.binary(prec + 1, rhs_live)?;
            lhs = apply(op, lhs, rhs, rhs_live)?;
        }
        Ok(lhs)
    }

    fn unary(&mut self, live: bool) -> Result<i64, EvalError> {
        let tok = self.advance()?;
        match tok.kind {
            TokenKind::Punct(Punct::Bang) => Ok((self.unary(live)? == 0) as i64),
            TokenKind::Punct(Punct::Tilde) => Ok(!self.unary(live)?),
            TokenKind::Punct(Punct::Minus) => Ok(self.unary(live)?.wrapping_neg()),
            TokenKind::Punct(Punct::Plus) => self.unary(live),
            TokenKind::Punct(Punct::LParen) => {
                let value = self.conditional(live)?;
                self.expect(Punct::RParen)?;
                Ok(value)
            }
            TokenKind::IntLiteral => parse_literal(&tok.text),
            TokenKind::CharLiteral => char_value(&tok.text),
            TokenKind::Identifier | TokenKind::Keyword(_) | TokenKind::MacroRef => {
                if self.strict {
                    Err(EvalError::NotConstant(tok.text.clone()))
                } else {
                    Ok(0)
                }
            }
            _ => Err(EvalError::Unexpected(tok.to_string())),
        }
    }
}

fn apply(op: Punct, lhs: i64, rhs: i64, live: bool) -> Result<i64, EvalError> {
    Ok(match op {
        Punct::PipePipe => (lhs != 0 || rhs != 0) as i64,
        Punct::AmpAmp => (lhs != 0 && rhs != 0) as i64,
        Punct::Pipe => lhs | rhs,
        Punct::Caret => lhs ^ rhs,
        Punct::Amp => lhs & rhs,
        Punct::EqEq => (lhs == rhs) as i64,
        Punct::NotEq => (lhs != rhs) as i64,
        Punct::Lt => (lhs < rhs) as i64,
        Punct::Gt => (lhs > rhs) as i64,
        Punct::Le => (lhs <= rhs) as i64,
        Punct::Ge => (lhs >= rhs) as i64,
        Punct::Shl => lhs.wrapping_shl((rhs & 63) as u32),
        Punct::Shr => lhs.wrapping_shr((rhs & 63) as u32),
        Punct::Plus => lhs.wrapping_add(rhs),
        Punct::Minus => lhs.wrapping_sub(rhs),
        Punct::Star => lhs.wrapping_mul(rhs),
        Punct::Slash | Punct::Percent if rhs == 0 => {
            if live {
                return Err(EvalError::DivisionByZero);
            }
            0
        }
        Punct::Slash => lhs.wrapping_div(rhs),
        Punct::Percent => lhs.wrapping_rem(rhs),
        _ => return Err(EvalError::Unexpected(format!("operator {:?}", op))),
    })
}

/// Integer literal with its `u`/`l` suffixes removed
fn parse_literal(text: &str) -> Result<i64, EvalError> {
    let digits = text.trim_end_matches(['u', 'U', 'l', 'L']);
    if let Some(value) = parse_int(digits) {
        return Ok(value);
    }
    // Values above i64::MAX keep their bit pattern
    let unsigned = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()
    } else {
        digits.parse::<u64>().ok()
    };
    unsigned
        .map(|v| v as i64)
        .ok_or_else(|| EvalError::InvalidLiteral(text.to_string()))
}

/// Value of a character literal; multi-character literals use their
/// first character
fn char_value(text: &str) -> Result<i64, EvalError> {
    let invalid = || EvalError::InvalidLiteral(text.to_string());
    let start = text.find('\'').ok_or_else(invalid)?;
    let inner = text[start + 1..].strip_suffix('\'').ok_or_else(invalid)?;
    let mut chars = inner.chars();
    let first = chars.next().ok_or_else(invalid)?;
    if first != '\\' {
        return Ok(first as i64);
    }
    let escape = chars.next().ok_or_else(invalid)?;
    Ok(match escape {
        'n' => 10,
        't' => 9,
        'r' => 13,
        'a' => 7,
        'b' => 8,
        'f' => 12,
        'v' => 11,
        'x' => {
            let hex: String = chars.take_while(|c| c.is_ascii_hexdigit()).collect();
            i64::from_str_radix(&hex, 16).map_err(|_| invalid())?
        }
        '0'..='7' => {
            let octal: String = std::iter::once(escape)
                .chain(chars.take_while(|c| ('0'..='7').contains(c)).take(2))
                .collect();
            i64::from_str_radix(&octal, 8).map_err(|_| invalid())?
        }
        other => other as i64,
    })
}
