//! Core type definitions
//!
//! The catalogue produced by the analyzer is a list of [`CodeObject`]s.
//! Each one stands for a single named C entity in one scope: a variable,
//! a function, a type name or tag, or a macro.

use crate::location::Location;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a code object inside the catalogue of one analysis run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub usize);

/// What a declarator introduces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeclaratorKind {
    Variable,
    Function,
    Type(TypeKind),
    Macro,
}

/// Flavour of a type name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeKind {
    Typedef,
    Struct,
    Union,
    Enum,
}

impl DeclaratorKind {
    /// Tags live in their own namespace, separate from ordinary identifiers
    pub fn is_tag(&self) -> bool {
        matches!(
            self,
            DeclaratorKind::Type(TypeKind::Struct | TypeKind::Union | TypeKind::Enum)
        )
    }
}

impl fmt::Display for DeclaratorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeclaratorKind::Variable => write!(f, "variable"),
            DeclaratorKind::Function => write!(f, "function"),
            DeclaratorKind::Type(TypeKind::Typedef) => write!(f, "typedef"),
            DeclaratorKind::Type(TypeKind::Struct) => write!(f, "struct"),
            DeclaratorKind::Type(TypeKind::Union) => write!(f, "union"),
            DeclaratorKind::Type(TypeKind::Enum) => write!(f, "enum"),
            DeclaratorKind::Macro => write!(f, "macro"),
        }
    }
}

/// Scope a code object was first seen in. Never changes afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    /// File scope with external linkage (or no storage class)
    Global,
    /// File scope, `static`
    FileStatic,
    /// Block scope: function parameters and locals
    Local,
}

/// Storage class specifier as written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StorageClass {
    #[default]
    None,
    Extern,
    Static,
    Auto,
    Register,
}

/// Linkage derived from scope and storage class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Linkage {
    External,
    Internal,
    None,
}

/// One step of a declarator's derived type, listed from the declared
/// name outward: `char *f(void)` is `[Function(void), Pointer]` over `char`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Derivation {
    Pointer { qualifiers: Vec<String> },
    Array { size: Option<u64> },
    Function(FunctionSignature),
}

/// How a function declarator spells its parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamStyle {
    /// `f(void)`: no parameters
    Void,
    /// `f()`: parameters unspecified
    Unspecified,
    /// `f(int a, char *b)`
    Prototype,
    /// Old-style `f(a, b)` identifier list
    IdentifierList,
}

/// Parameter list of a function declarator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionSignature {
    pub style: ParamStyle,
    pub params: Vec<Parameter>,
    pub variadic: bool,
}

/// Function parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    /// Parameter name, absent for abstract declarators
    pub name: Option<String>,
    /// Parameter type
    pub ty: TypeDescriptor,
    /// Where the parameter is named
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

/// Textual/structural type of a declared entity.
///
/// The base type is kept as written and never resolved further.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    /// Specifiers and qualifiers as written, e.g. `const unsigned short int`
    pub base: String,
    /// Derived type steps from the name outward
    pub derivations: Vec<Derivation>,
}

impl TypeDescriptor {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            derivations: Vec::new(),
        }
    }

    pub fn with_derivations(base: impl Into<String>, derivations: Vec<Derivation>) -> Self {
        Self {
            base: base.into(),
            derivations,
        }
    }

    pub fn is_function(&self) -> bool {
        matches!(self.derivations.first(), Some(Derivation::Function(_)))
    }

    pub fn is_array(&self) -> bool {
        matches!(self.derivations.first(), Some(Derivation::Array { .. }))
    }

    /// Bound of the outermost array dimension, if it is an array with a bound
    pub fn array_size(&self) -> Option<u64> {
        match self.derivations.first() {
            Some(Derivation::Array { size }) => *size,
            _ => None,
        }
    }

    /// Number of pointer steps directly applied to the name
    pub fn pointer_depth(&self) -> usize {
        self.derivations
            .iter()
            .take_while(|d| matches!(d, Derivation::Pointer { .. }))
            .count()
    }

    pub fn signature(&self) -> Option<&FunctionSignature> {
        match self.derivations.first() {
            Some(Derivation::Function(sig)) => Some(sig),
            _ => None,
        }
    }

    /// Base type with qualifiers stripped, e.g. `int` for `const int`
    pub fn unqualified_base(&self) -> String {
        self.base
            .split_whitespace()
            .filter(|w| !matches!(*w, "const" | "volatile" | "restrict" | "inline"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Base type spelled canonically: qualifiers stripped, `signed` and a
    /// redundant `int` dropped, words sorted. `unsigned`, `int unsigned`
    /// and `unsigned int` all become `unsigned`; `signed char` stays
    /// distinct from `char`.
    pub fn canonical_base(&self) -> String {
        let mut words: Vec<&str> = self
            .base
            .split_whitespace()
            .filter(|w| !matches!(*w, "const" | "volatile" | "restrict" | "inline" | "_Atomic"))
            .collect();
        if !words.contains(&"char") {
            words.retain(|w| *w != "signed");
            if words.iter().any(|w| matches!(*w, "short" | "long" | "unsigned")) {
                words.retain(|w| *w != "int");
            }
            if words.is_empty() && !self.base.trim().is_empty() {
                words.push("int");
            }
        }
        words.sort_unstable();
        words.join(" ")
    }

    /// Plain `void` object type, which no variable may have
    pub fn is_void_object(&self) -> bool {
        self.derivations.is_empty() && self.unqualified_base() == "void"
    }

    /// Loose compatibility check for redeclarations.
    ///
    /// Incomplete array bounds match any bound, and an unspecified
    /// parameter list matches any other parameter list.
    pub fn compatible_with(&self, other: &TypeDescriptor) -> bool {
        if self.canonical_base() != other.canonical_base() {
            return false;
        }
        if self.derivations.len() != other.derivations.len() {
            return false;
        }
        self.derivations
            .iter()
            .zip(&other.derivations)
            .all(|(a, b)| match (a, b) {
                (Derivation::Pointer { .. }, Derivation::Pointer { .. }) => true,
                (Derivation::Array { size: x }, Derivation::Array { size: y }) => {
                    x.is_none() || y.is_none() || x == y
                }
                (Derivation::Function(x), Derivation::Function(y)) => x.compatible_with(y),
                _ => false,
            })
    }
}

impl FunctionSignature {
    pub fn unspecified() -> Self {
        Self {
            style: ParamStyle::Unspecified,
            params: Vec::new(),
            variadic: false,
        }
    }

    pub fn compatible_with(&self, other: &FunctionSignature) -> bool {
        let open = |s: &FunctionSignature| {
            matches!(s.style, ParamStyle::Unspecified | ParamStyle::IdentifierList)
        };
        if open(self) || open(other) {
            return true;
        }
        self.variadic == other.variadic
            && self.params.len() == other.params.len()
            && self
                .params
                .iter()
                .zip(&other.params)
                .all(|(a, b)| a.ty.compatible_with(&b.ty))
    }
}

impl fmt::Display for FunctionSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.style {
            ParamStyle::Void => write!(f, "function(void)"),
            ParamStyle::Unspecified => write!(f, "function()"),
            ParamStyle::Prototype | ParamStyle::IdentifierList => {
                let mut parts: Vec<String> = self.params.iter().map(|p| p.ty.to_string()).collect();
                if self.variadic {
                    parts.push("...".into());
                }
                write!(f, "function({})", parts.join(", "))
            }
        }
    }
}

/// Renders in the "explain" style: `array[4] of const int`,
/// `function(void) returning pointer to char`.
impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for derivation in &self.derivations {
            match derivation {
                Derivation::Pointer { qualifiers } if qualifiers.is_empty() => {
                    write!(f, "pointer to ")?
                }
                Derivation::Pointer { qualifiers } => {
                    write!(f, "{} pointer to ", qualifiers.join(" "))?
                }
                Derivation::Array { size: Some(n) } => write!(f, "array[{}] of ", n)?,
                Derivation::Array { size: None } => write!(f, "array[] of ")?,
                Derivation::Function(sig) => write!(f, "{} returning ", sig)?,
            }
        }
        write!(f, "{}", self.base)
    }
}

/// A catalogued C entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeObject {
    /// Position in the catalogue
    pub id: ObjectId,
    /// Identifier
    pub name: String,
    /// Variable, function, type or macro
    pub kind: DeclaratorKind,
    /// Scope at first sight
    pub scope: Scope,
    /// Storage class of the first declaration
    pub storage_class: StorageClass,
    /// Linkage derived at first sight
    pub linkage: Linkage,
    /// Where the entity was first declared
    pub first_declaration: Location,
    /// Every declaration site, in source order
    pub declarations: Vec<Location>,
    /// The canonical definition, if any
    pub definition: Option<Location>,
    /// Last tentative definition seen (file-scope, no initializer, not extern)
    pub tentative_definition: Option<Location>,
    /// Type as declared; absent for macros and tags
    pub type_descriptor: Option<TypeDescriptor>,
    /// Set when a later declaration disagreed with this one
    pub conflicting_redeclaration: bool,
    /// Function whose body declares this local
    pub enclosing_function: Option<String>,
    /// Type objects referenced by a function's signature
    pub signature_refs: Vec<ObjectId>,
    /// Places the entity is used
    pub uses: Vec<Location>,
}

impl CodeObject {
    pub fn new(
        id: ObjectId,
        name: impl Into<String>,
        kind: DeclaratorKind,
        scope: Scope,
        storage_class: StorageClass,
        location: Location,
    ) -> Self {
        let linkage = derive_linkage(kind, scope, storage_class);
        Self {
            id,
            name: name.into(),
            kind,
            scope,
            storage_class,
            linkage,
            first_declaration: location.clone(),
            declarations: vec![location],
            definition: None,
            tentative_definition: None,
            type_descriptor: None,
            conflicting_redeclaration: false,
            enclosing_function: None,
            signature_refs: Vec::new(),
            uses: Vec::new(),
        }
    }

    pub fn is_defined(&self) -> bool {
        self.definition.is_some()
    }

    pub fn is_typedef(&self) -> bool {
        self.kind == DeclaratorKind::Type(TypeKind::Typedef)
    }

    pub fn is_local(&self) -> bool {
        self.scope == Scope::Local
    }
}

/// Linkage rules for identifiers (C11 6.2.2), restricted to what the
/// catalogue needs.
pub fn derive_linkage(kind: DeclaratorKind, scope: Scope, storage: StorageClass) -> Linkage {
    match kind {
        DeclaratorKind::Type(_) | DeclaratorKind::Macro => Linkage::None,
        _ => match (scope, storage) {
            (_, StorageClass::Static) if scope != Scope::Local || kind == DeclaratorKind::Function => {
                Linkage::Internal
            }
            (Scope::FileStatic, _) => Linkage::Internal,
            (Scope::Global, _) => Linkage::External,
            (Scope::Local, StorageClass::Extern) => Linkage::External,
            (Scope::Local, _) if kind == DeclaratorKind::Function => Linkage::External,
            (Scope::Local, _) => Linkage::None,
        },
    }
}
