//! Symbol table
//!
//! Owns every [`CodeObject`] of a translation unit and the scope stack
//! that decides which of them a name currently refers to. Each name maps
//! to a stack of bindings, innermost last, so lookups and the parser's
//! typedef query are a single hash lookup. Closing a scope pops the
//! bindings it introduced; the objects themselves stay in the catalogue.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use symscope_core::{
    CodeObject, DeclaratorKind, DiagnosticKind, Diagnostics, Location, ObjectId, ParamStyle, Scope,
    StorageClass, TypeDescriptor, TypeKind,
};
use tracing::debug;

/// A declaration as recognized by the parser
#[derive(Debug, Clone)]
pub struct Declaration {
    pub name: String,
    pub kind: DeclaratorKind,
    pub storage: StorageClass,
    pub location: Location,
    pub ty: Option<TypeDescriptor>,
    /// The declaration is also the definition. Its site is recorded as
    /// the definition, not as a declaration site.
    pub defining: bool,
}

/// An identifier use
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub name: String,
    pub location: Location,
    /// Object the name resolved to, innermost scope first
    pub target: Option<ObjectId>,
}

/// Kind of scope on the stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeLayer {
    File,
    /// Parameters and outermost block of a function body
    Function(String),
    Block,
}

#[derive(Debug, Clone, Copy)]
struct Binding {
    depth: usize,
    id: ObjectId,
    typedef: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Namespace {
    Ordinary,
    Tag,
}

#[derive(Debug, Clone)]
pub struct SymbolTable {
    objects: Vec<CodeObject>,
    layers: Vec<ScopeLayer>,
    /// Names each open layer bound, for popping on exit
    introduced: Vec<Vec<(String, Namespace)>>,
    ordinary: HashMap<String, Vec<Binding>>,
    tags: HashMap<String, Vec<Binding>>,
    macros: HashMap<String, ObjectId>,
    references: Vec<Reference>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            objects: Vec::new(),
            layers: vec![ScopeLayer::File],
            introduced: vec![Vec::new()],
            ordinary: HashMap::new(),
            tags: HashMap::new(),
            macros: HashMap::new(),
            references: Vec::new(),
        }
    }

    // ===== Scopes =====

    /// Nesting depth; 0 is file scope
    pub fn depth(&self) -> usize {
        self.layers.len() - 1
    }

    pub fn push_scope(&mut self, layer: ScopeLayer) {
        self.layers.push(layer);
        self.introduced.push(Vec::new());
    }

    /// Close the innermost scope. The file scope is never closed.
    pub fn pop_scope(&mut self) {
        if self.layers.len() <= 1 {
            return;
        }
        self.layers.pop();
        for (name, namespace) in self.introduced.pop().unwrap_or_default() {
            let map = match namespace {
                Namespace::Ordinary => &mut self.ordinary,
                Namespace::Tag => &mut self.tags,
            };
            if let Some(stack) = map.get_mut(&name) {
                stack.pop();
                if stack.is_empty() {
                    map.remove(&name);
                }
            }
        }
    }

    /// Name of the function whose body is being parsed
    pub fn current_function(&self) -> Option<&str> {
        self.layers.iter().rev().find_map(|layer| match layer {
            ScopeLayer::Function(name) => Some(name.as_str()),
            _ => None,
        })
    }

    fn bind(&mut self, name: &str, id: ObjectId, namespace: Namespace) {
        let depth = self.depth();
        let typedef = self.objects[id.0].is_typedef();
        let map = match namespace {
            Namespace::Ordinary => &mut self.ordinary,
            Namespace::Tag => &mut self.tags,
        };
        map.entry(name.to_string())
            .or_default()
            .push(Binding { depth, id, typedef });
        if let Some(layer) = self.introduced.last_mut() {
            layer.push((name.to_string(), namespace));
        }
    }

    fn visible(&self, name: &str, namespace: Namespace) -> Option<Binding> {
        let map = match namespace {
            Namespace::Ordinary => &self.ordinary,
            Namespace::Tag => &self.tags,
        };
        map.get(name).and_then(|stack| stack.last()).copied()
    }

    fn visible_here(&self, name: &str, namespace: Namespace) -> Option<ObjectId> {
        self.visible(name, namespace)
            .filter(|b| b.depth == self.depth())
            .map(|b| b.id)
    }

    // ===== Queries =====

    /// Whether `name` currently denotes a typedef
    pub fn is_typedef_visible(&self, name: &str) -> bool {
        self.visible(name, Namespace::Ordinary).is_some_and(|b| b.typedef)
    }

    /// Innermost visible object named `name`
    pub fn lookup(&self, name: &str) -> Option<&CodeObject> {
        self.lookup_id(name).map(|id| &self.objects[id.0])
    }

    pub fn lookup_id(&self, name: &str) -> Option<ObjectId> {
        self.visible(name, Namespace::Ordinary).map(|b| b.id)
    }

    /// Object bound to `name` in the innermost scope only
    pub fn lookup_local(&self, name: &str) -> Option<&CodeObject> {
        self.visible_here(name, Namespace::Ordinary)
            .map(|id| &self.objects[id.0])
    }

    pub fn lookup_tag(&self, name: &str) -> Option<&CodeObject> {
        self.visible(name, Namespace::Tag).map(|b| &self.objects[b.id.0])
    }

    pub fn get(&self, id: ObjectId) -> Option<&CodeObject> {
        self.objects.get(id.0)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut CodeObject> {
        self.objects.get_mut(id.0)
    }

    pub fn objects(&self) -> &[CodeObject] {
        &self.objects
    }

    pub fn references(&self) -> &[Reference] {
        &self.references
    }

    fn find_kind(&self, name: &str, accept: impl Fn(DeclaratorKind) -> bool) -> Option<&CodeObject> {
        self.objects
            .iter()
            .find(|o| o.name == name && accept(o.kind))
    }

    pub fn find_function(&self, name: &str) -> Option<&CodeObject> {
        self.find_kind(name, |k| k == DeclaratorKind::Function)
    }

    pub fn find_variable(&self, name: &str) -> Option<&CodeObject> {
        self.find_kind(name, |k| k == DeclaratorKind::Variable)
    }

    pub fn find_macro(&self, name: &str) -> Option<&CodeObject> {
        self.macros.get(name).map(|id| &self.objects[id.0])
    }

    /// Typedef or tag named `name`
    pub fn find_type(&self, name: &str) -> Option<&CodeObject> {
        self.find_kind(name, |k| matches!(k, DeclaratorKind::Type(_)))
    }

    pub fn into_parts(self) -> (Vec<CodeObject>, Vec<Reference>) {
        (self.objects, self.references)
    }

    // ===== Updates =====

    fn create(&mut self, decl: &Declaration, scope: Scope) -> ObjectId {
        let id = ObjectId(self.objects.len());
        let mut object = CodeObject::new(
            id,
            decl.name.clone(),
            decl.kind,
            scope,
            decl.storage,
            decl.location.clone(),
        );
        if decl.defining {
            object.declarations.clear();
        }
        object.type_descriptor = decl.ty.clone();
        object.enclosing_function = self.current_function().map(str::to_string);
        self.objects.push(object);
        id
    }

    fn scope_for(&self, storage: StorageClass) -> Scope {
        match (self.depth(), storage) {
            (0, StorageClass::Static) => Scope::FileStatic,
            (0, _) => Scope::Global,
            _ => Scope::Local,
        }
    }

    /// Declare an ordinary identifier in the current scope.
    ///
    /// A redeclaration in the same scope updates the existing object. A
    /// redeclaration of a different kind gets a separate object flagged
    /// as conflicting and leaves the visible binding alone.
    pub fn declare(&mut self, decl: Declaration, diags: &mut Diagnostics) -> ObjectId {
        let Some(id) = self.visible_here(&decl.name, Namespace::Ordinary) else {
            let scope = self.scope_for(decl.storage);
            let id = self.create(&decl, scope);
            self.bind(&decl.name, id, Namespace::Ordinary);
            debug!("declared {} {} at {}", decl.kind, decl.name, decl.location);
            return id;
        };

        let existing = &self.objects[id.0];
        if existing.kind != decl.kind {
            diags.report(
                DiagnosticKind::RedeclarationConflict,
                decl.location.clone(),
                format!(
                    "'{}' redeclared as {}, previously declared as {} at {}",
                    decl.name, decl.kind, existing.kind, existing.first_declaration
                ),
            );
            let scope = existing.scope;
            let conflicting = self.create(&decl, scope);
            self.objects[conflicting.0].conflicting_redeclaration = true;
            return conflicting;
        }

        let depth = self.depth();
        let object = &mut self.objects[id.0];
        if !decl.defining {
            object.declarations.push(decl.location.clone());
        }

        if depth == 0
            && decl.storage == StorageClass::Static
            && object.storage_class != StorageClass::Static
            && object.kind != DeclaratorKind::Type(TypeKind::Typedef)
        {
            diags.report(
                DiagnosticKind::RedeclarationConflict,
                decl.location.clone(),
                format!(
                    "static declaration of '{}' follows non-static declaration at {}",
                    decl.name, object.first_declaration
                ),
            );
            object.conflicting_redeclaration = true;
        }

        if let Some(new_ty) = decl.ty {
            match &object.type_descriptor {
                Some(old) if !old.compatible_with(&new_ty) => {
                    diags.report(
                        DiagnosticKind::RedeclarationConflict,
                        decl.location.clone(),
                        format!(
                            "conflicting types for '{}': {} vs previous {}",
                            decl.name, new_ty, old
                        ),
                    );
                    object.conflicting_redeclaration = true;
                }
                Some(old) => {
                    if completes(old, &new_ty) {
                        object.type_descriptor = Some(new_ty);
                    }
                }
                None => object.type_descriptor = Some(new_ty),
            }
        }
        id
    }

    /// Record the definition of `id`. A second definition is reported and
    /// the first one stays canonical. Returns whether `location` became
    /// the definition.
    pub fn define(&mut self, id: ObjectId, location: Location, diags: &mut Diagnostics) -> bool {
        let Some(object) = self.objects.get_mut(id.0) else {
            return false;
        };
        match &object.definition {
            Some(first) => {
                diags.report(
                    DiagnosticKind::MultipleDefinitions,
                    location,
                    format!("redefinition of '{}', first defined at {}", object.name, first),
                );
                false
            }
            None => {
                object.definition = Some(location);
                object.tentative_definition = None;
                true
            }
        }
    }

    /// Record a tentative definition (file scope, no initializer, not extern)
    pub fn mark_tentative(&mut self, id: ObjectId, location: Location) {
        if let Some(object) = self.objects.get_mut(id.0) {
            if object.definition.is_none() {
                object.tentative_definition = Some(location);
            }
        }
    }

    /// End of translation unit: promote the last tentative definition of
    /// every file-scope variable that never got a real one
    pub fn finish(&mut self, promote_tentative: bool) {
        if !promote_tentative {
            return;
        }
        for object in &mut self.objects {
            if object.definition.is_none() && !object.is_local() {
                if let Some(tentative) = object.tentative_definition.take() {
                    debug!("promoting tentative definition of {} at {}", object.name, tentative);
                    object.definition = Some(tentative);
                }
            }
        }
    }

    /// Record a use of an ordinary identifier
    pub fn record_use(&mut self, name: &str, location: Location) -> Option<ObjectId> {
        let target = self.lookup_id(name);
        self.push_reference(name, location, target)
    }

    fn push_reference(&mut self, name: &str, location: Location, target: Option<ObjectId>) -> Option<ObjectId> {
        if let Some(id) = target {
            self.objects[id.0].uses.push(location.clone());
        }
        self.references.push(Reference {
            name: name.to_string(),
            location,
            target,
        });
        target
    }

    /// Record a use of a macro
    pub fn record_macro_use(&mut self, name: &str, location: Location) -> Option<ObjectId> {
        let target = self.macros.get(name).copied();
        self.push_reference(name, location, target)
    }

    /// Catalogue a `#define`. Macros live in their own namespace and are
    /// never scoped; the most recent definition is the canonical one.
    pub fn declare_macro(&mut self, name: &str, location: Location) -> ObjectId {
        if let Some(&id) = self.macros.get(name) {
            let object = &mut self.objects[id.0];
            object.declarations.push(location.clone());
            object.definition = Some(location);
            return id;
        }
        let decl = Declaration {
            name: name.to_string(),
            kind: DeclaratorKind::Macro,
            storage: StorageClass::None,
            location: location.clone(),
            ty: None,
            defining: true,
        };
        let id = self.create(&decl, Scope::Global);
        let object = &mut self.objects[id.0];
        object.enclosing_function = None;
        object.definition = Some(location);
        self.macros.insert(name.to_string(), id);
        debug!("catalogued macro {}", name);
        id
    }

    /// Declare a struct/union/enum tag in the current scope. `defining` is
    /// true when the tag has a body.
    pub fn declare_tag(
        &mut self,
        name: &str,
        kind: TypeKind,
        location: Location,
        defining: bool,
        diags: &mut Diagnostics,
    ) -> ObjectId {
        let decl_kind = DeclaratorKind::Type(kind);
        if let Some(id) = self.visible_here(name, Namespace::Tag) {
            let existing = &self.objects[id.0];
            if existing.kind != decl_kind {
                diags.report(
                    DiagnosticKind::RedeclarationConflict,
                    location.clone(),
                    format!("'{}' defined as wrong kind of tag, previously {}", name, existing.kind),
                );
                let decl = Declaration {
                    name: name.to_string(),
                    kind: decl_kind,
                    storage: StorageClass::None,
                    location,
                    ty: None,
                    defining,
                };
                let scope = existing.scope;
                let conflicting = self.create(&decl, scope);
                self.objects[conflicting.0].conflicting_redeclaration = true;
                return conflicting;
            }
            if defining {
                self.define(id, location, diags);
            } else {
                self.objects[id.0].declarations.push(location);
            }
            return id;
        }

        let decl = Declaration {
            name: name.to_string(),
            kind: decl_kind,
            storage: StorageClass::None,
            location: location.clone(),
            ty: None,
            defining,
        };
        let scope = self.scope_for(StorageClass::None);
        let id = self.create(&decl, scope);
        if defining {
            self.objects[id.0].definition = Some(location);
        }
        self.bind(name, id, Namespace::Tag);
        debug!("declared {} {}", decl_kind, name);
        id
    }

    /// A tag used without a body (`struct S *p`). Refers to the visible
    /// tag, or declares it in the current scope when there is none.
    pub fn tag_reference(&mut self, name: &str, kind: TypeKind, location: Location, diags: &mut Diagnostics) -> ObjectId {
        match self.visible(name, Namespace::Tag) {
            Some(binding) => {
                self.objects[binding.id.0].uses.push(location.clone());
                self.references.push(Reference {
                    name: name.to_string(),
                    location,
                    target: Some(binding.id),
                });
                binding.id
            }
            None => self.declare_tag(name, kind, location, false, diags),
        }
    }

    /// Note that a function's signature mentions a type object
    pub fn add_signature_ref(&mut self, function: ObjectId, referenced: ObjectId) {
        if let Some(object) = self.objects.get_mut(function.0) {
            if !object.signature_refs.contains(&referenced) {
                object.signature_refs.push(referenced);
            }
        }
    }
}

/// `new` fills in something `old` left open: an array bound, or a
/// prototype for an unspecified parameter list
fn completes(old: &TypeDescriptor, new: &TypeDescriptor) -> bool {
    if old.is_array() && old.array_size().is_none() && new.array_size().is_some() {
        return true;
    }
    match (old.signature(), new.signature()) {
        (Some(o), Some(n)) => o.style == ParamStyle::Unspecified && n.style != ParamStyle::Unspecified,
        _ => false,
    }
}
