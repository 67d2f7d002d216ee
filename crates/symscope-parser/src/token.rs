//! Token types shared by the lexer, preprocessor and parser

use std::fmt;
use symscope_core::Location;

/// Lexical category of a token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Identifier,
    Keyword(Keyword),
    IntLiteral,
    FloatLiteral,
    CharLiteral,
    StringLiteral,
    Punct(Punct),
    /// Name of a macro that was left unexpanded (function-like macro
    /// without an argument list)
    MacroRef,
    /// Character that starts no valid token
    Other,
    /// String or character literal missing its closing quote; the text
    /// runs to the end of the line
    Unterminated,
    Eof,
}

/// C keywords the parser cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    Auto,
    Break,
    Case,
    Char,
    Const,
    Continue,
    Default,
    Do,
    Double,
    Else,
    Enum,
    Extern,
    Float,
    For,
    Goto,
    If,
    Inline,
    Int,
    Long,
    Register,
    Restrict,
    Return,
    Short,
    Signed,
    Sizeof,
    Static,
    Struct,
    Switch,
    Typedef,
    Union,
    Unsigned,
    Void,
    Volatile,
    While,
    Bool,
    Complex,
    Noreturn,
    StaticAssert,
    Atomic,
    ThreadLocal,
}

impl Keyword {
    pub fn lookup(text: &str) -> Option<Keyword> {
        use Keyword::*;
        Some(match text {
            "auto" => Auto,
            "break" => Break,
            "case" => Case,
            "char" => Char,
            "const" => Const,
            "continue" => Continue,
            "default" => Default,
            "do" => Do,
            "double" => Double,
            "else" => Else,
            "enum" => Enum,
            "extern" => Extern,
            "float" => Float,
            "for" => For,
            "goto" => Goto,
            "if" => If,
            "inline" => Inline,
            "int" => Int,
            "long" => Long,
            "register" => Register,
            "restrict" => Restrict,
            "return" => Return,
            "short" => Short,
            "signed" => Signed,
            "sizeof" => Sizeof,
            "static" => Static,
            "struct" => Struct,
            "switch" => Switch,
            "typedef" => Typedef,
            "union" => Union,
            "unsigned" => Unsigned,
            "void" => Void,
            "volatile" => Volatile,
            "while" => While,
            "_Bool" => Bool,
            "_Complex" => Complex,
            "_Noreturn" => Noreturn,
            "_Static_assert" => StaticAssert,
            "_Atomic" => Atomic,
            "_Thread_local" => ThreadLocal,
            _ => return None,
        })
    }

    /// Basic type specifiers (`int`, `unsigned`, ...)
    pub fn is_type_specifier(&self) -> bool {
        use Keyword::*;
        matches!(
            self,
            Void | Char | Short | Int | Long | Float | Double | Signed | Unsigned | Bool | Complex
        )
    }

    pub fn is_qualifier(&self) -> bool {
        matches!(
            self,
            Keyword::Const | Keyword::Volatile | Keyword::Restrict | Keyword::Atomic
        )
    }

    pub fn is_storage_class(&self) -> bool {
        use Keyword::*;
        matches!(self, Auto | Extern | Register | Static | Typedef | ThreadLocal)
    }

    /// Keywords that can only begin a declaration
    pub fn starts_declaration(&self) -> bool {
        self.is_type_specifier()
            || self.is_qualifier()
            || self.is_storage_class()
            || matches!(
                self,
                Keyword::Struct
                    | Keyword::Union
                    | Keyword::Enum
                    | Keyword::Inline
                    | Keyword::Noreturn
                    | Keyword::StaticAssert
            )
    }
}

/// Punctuators, longest spelling first where prefixes overlap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Punct {
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Semi,
    Comma,
    Dot,
    Ellipsis,
    Arrow,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    PlusPlus,
    MinusMinus,
    Amp,
    Pipe,
    Caret,
    Tilde,
    Bang,
    AmpAmp,
    PipePipe,
    Assign,
    EqEq,
    NotEq,
    Lt,
    Gt,
    Le,
    Ge,
    Shl,
    Shr,
    Question,
    Colon,
    Hash,
    HashHash,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PercentAssign,
    AmpAssign,
    PipeAssign,
    CaretAssign,
    ShlAssign,
    ShrAssign,
}

/// Spellings for the lexer's longest-match scan
pub(crate) const PUNCTUATORS: &[(&str, Punct)] = &[
    ("<<=", Punct::ShlAssign),
    (">>=", Punct::ShrAssign),
    ("...", Punct::Ellipsis),
    ("->", Punct::Arrow),
    ("++", Punct::PlusPlus),
    ("--", Punct::MinusMinus),
    ("&&", Punct::AmpAmp),
    ("||", Punct::PipePipe),
    ("==", Punct::EqEq),
    ("!=", Punct::NotEq),
    ("<=", Punct::Le),
    (">=", Punct::Ge),
    ("<<", Punct::Shl),
    (">>", Punct::Shr),
    ("##", Punct::HashHash),
    ("+=", Punct::PlusAssign),
    ("-=", Punct::MinusAssign),
    ("*=", Punct::StarAssign),
    ("/=", Punct::SlashAssign),
    ("%=", Punct::PercentAssign),
    ("&=", Punct::AmpAssign),
    ("|=", Punct::PipeAssign),
    ("^=", Punct::CaretAssign),
    ("(", Punct::LParen),
    (")", Punct::RParen),
    ("{", Punct::LBrace),
    ("}", Punct::RBrace),
    ("[", Punct::LBracket),
    ("]", Punct::RBracket),
    (";", Punct::Semi),
    (",", Punct::Comma),
    (".", Punct::Dot),
    ("+", Punct::Plus),
    ("-", Punct::Minus),
    ("*", Punct::Star),
    ("/", Punct::Slash),
    ("%", Punct::Percent),
    ("&", Punct::Amp),
    ("|", Punct::Pipe),
    ("^", Punct::Caret),
    ("~", Punct::Tilde),
    ("!", Punct::Bang),
    ("=", Punct::Assign),
    ("<", Punct::Lt),
    (">", Punct::Gt),
    ("?", Punct::Question),
    (":", Punct::Colon),
    ("#", Punct::Hash),
];

/// A lexical unit. Immutable once produced; macro expansion creates new
/// tokens instead of editing existing ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Spelling as written
    pub text: String,
    pub location: Location,
    /// First token of a logical line
    pub line_start: bool,
    /// Preceded by whitespace or a comment
    pub space_before: bool,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, location: Location) -> Self {
        Self {
            kind,
            text: text.into(),
            location,
            line_start: false,
            space_before: false,
        }
    }

    pub fn eof(location: Location) -> Self {
        Self::new(TokenKind::Eof, "", location)
    }

    pub fn is_punct(&self, p: Punct) -> bool {
        self.kind == TokenKind::Punct(p)
    }

    pub fn is_keyword(&self, k: Keyword) -> bool {
        self.kind == TokenKind::Keyword(k)
    }

    /// Identifier, or a keyword in a position where the preprocessor
    /// treats it as a plain name (`#define inline`)
    pub fn is_name(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Identifier | TokenKind::Keyword(_) | TokenKind::MacroRef
        )
    }

    /// Identifier as far as the parser is concerned
    pub fn is_identifier(&self) -> bool {
        matches!(self.kind, TokenKind::Identifier | TokenKind::MacroRef)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::Eof => write!(f, "end of input"),
            TokenKind::Identifier | TokenKind::MacroRef => write!(f, "identifier '{}'", self.text),
            TokenKind::Keyword(_) => write!(f, "'{}'", self.text),
            _ => write!(f, "`{}`", self.text),
        }
    }
}

/// Reassemble source text from tokens, one space where the source had
/// whitespace
pub fn spell(tokens: &[Token]) -> String {
    let mut out = String::new();
    for (i, tok) in tokens.iter().enumerate() {
        if i > 0 && tok.space_before {
            out.push(' ');
        }
        out.push_str(&tok.text);
    }
    out
}
