//! Scenario tests for whole translation units
//!
//! Each test feeds a small C unit through lexer, preprocessor and parser
//! and checks the catalogue and diagnostics that come out.

use super::*;
use pretty_assertions::assert_eq;
use symscope_core::{Derivation, Linkage, ParamStyle, Scope, Severity, TypeKind};

fn analyze(source: &str) -> UnitAnalysis {
    analyze_unit(
        &SourceUnit::new("test.c", source),
        &AnalyzerConfig::default(),
        None,
        &NoIncludes,
    )
}

fn analyze_with(source: &str, configuration: &Configuration) -> UnitAnalysis {
    analyze_unit(
        &SourceUnit::new("test.c", source),
        &AnalyzerConfig::default(),
        Some(configuration),
        &NoIncludes,
    )
}

fn variable<'a>(analysis: &'a UnitAnalysis, name: &str) -> Option<&'a CodeObject> {
    analysis.find_kind(name, DeclaratorKind::Variable)
}

fn count(analysis: &UnitAnalysis, kind: DiagnosticKind) -> usize {
    analysis.diagnostics_of(kind).count()
}

/// `T (x);` declares `x` when `T` is a typedef
#[test]
fn test_typedef_paren_declares_variable() {
    let source = r#"
typedef int T;
void f(void) {
    T (x);
}
"#;
    let analysis = analyze(source);

    let x = variable(&analysis, "x").expect("x declared");
    assert_eq!(x.scope, Scope::Local);
    assert_eq!(x.type_descriptor.as_ref().unwrap().base, "T");
    assert_eq!(x.enclosing_function.as_deref(), Some("f"));
    assert!(analysis.diagnostics.is_empty(), "{:?}", analysis.diagnostics);
}

/// Without a typedef in sight, `T (x);` is a call-like expression
#[test]
fn test_non_typedef_paren_is_a_use() {
    let source = r#"
void f(void) {
    T (x);
}
"#;
    let analysis = analyze(source);

    assert_eq!(analysis.objects_named("x").count(), 0);
    assert_eq!(analysis.references_to("T").count(), 1);
    assert_eq!(analysis.references_to("x").count(), 1);
    assert!(analysis.references_to("T").all(|r| r.target.is_none()));
    assert!(analysis.diagnostics.is_empty(), "{:?}", analysis.diagnostics);
}

/// Typedef visibility starts at the typedef, and a local variable of the
/// same name hides it
#[test]
fn test_typedef_visibility_is_positional() {
    let source = r#"
void before(void) { T (a); }
typedef int T;
void after(void) { T (b); }
void shadowed(void) {
    int T = 1;
    T (c);
}
"#;
    let analysis = analyze(source);

    assert!(variable(&analysis, "a").is_none());
    assert!(variable(&analysis, "b").is_some());
    assert!(variable(&analysis, "c").is_none());
    assert!(analysis.diagnostics.is_empty(), "{:?}", analysis.diagnostics);
}

#[test]
fn test_file_scope_paren_without_typedef() {
    let analysis = analyze("T (x);\n");
    assert_eq!(analysis.objects_named("x").count(), 0);
    assert_eq!(analysis.references_to("x").count(), 1);
    assert!(analysis.diagnostics.is_empty());
}

/// `f(T);` at file scope stays a call when only `T` is a typedef; the
/// implicit-int reading is flagged instead
#[test]
fn test_file_scope_call_shape_with_typedef_argument() {
    let analysis = analyze("typedef int arg_t;\nf(arg_t);\n");

    assert_eq!(analysis.objects_named("f").count(), 0);
    assert_eq!(analysis.references_to("f").count(), 1);
    assert_eq!(analysis.references_to("arg_t").count(), 1);
    let flagged: Vec<_> = analysis.diagnostics_of(DiagnosticKind::SuspiciousDeclaration).collect();
    assert_eq!(flagged.len(), 1);
    assert_eq!(flagged[0].severity, Severity::Warning);
    assert_eq!(flagged[0].location.line, 2);
    assert!(flagged[0].message.contains("implicit-int"));
    assert_eq!(analysis.diagnostics.len(), 1);
}

#[test]
fn test_redefinition_keeps_first() {
    let source = r#"
extern int v;
extern int v;
int v = 1;
int v = 2;
"#;
    let analysis = analyze(source);

    let objects: Vec<_> = analysis.objects_named("v").collect();
    assert_eq!(objects.len(), 1);
    let v = objects[0];
    assert_eq!(v.declarations.len(), 2);
    assert_eq!(v.definition.as_ref().map(|l| l.line), Some(4));
    assert_eq!(count(&analysis, DiagnosticKind::MultipleDefinitions), 1);
}

#[test]
fn test_function_redefinition() {
    let source = r#"
int f(void);
int f(void) { return 0; }
int f(void) { return 1; }
"#;
    let analysis = analyze(source);

    let f = analysis.find_kind("f", DeclaratorKind::Function).unwrap();
    assert_eq!(f.declarations.len(), 1);
    assert_eq!(f.definition.as_ref().map(|l| l.line), Some(3));
    assert_eq!(count(&analysis, DiagnosticKind::MultipleDefinitions), 1);
}

#[test]
fn test_if_elif_else_branches() {
    let source = r#"
#if 1
int first;
#elif 42
int second;
#endif
#if defined(FOO)
int foo;
#elif defined(BAR)
int bar;
#else
int neither;
#endif
"#;
    let analysis = analyze(source);

    assert!(variable(&analysis, "first").is_some());
    assert!(variable(&analysis, "second").is_none());
    assert!(variable(&analysis, "foo").is_none());
    assert!(variable(&analysis, "bar").is_none());
    assert!(variable(&analysis, "neither").is_some());
    assert!(analysis.diagnostics.is_empty(), "{:?}", analysis.diagnostics);
}

const NESTED: &str = r#"
#if OUTER
int a;
# if 0
int b;
#  if 1
int c;
#  endif
# else
int d;
#  if 1
int e;
#  else
int f;
#  endif
# endif
#endif
"#;

#[test]
fn test_nested_conditionals_follow_taken_path() {
    let analysis = analyze_with(NESTED, &Configuration::new("on").with("OUTER", 1));

    let present: Vec<&str> = ["a", "b", "c", "d", "e", "f"]
        .into_iter()
        .filter(|n| variable(&analysis, n).is_some())
        .collect();
    assert_eq!(present, vec!["a", "d", "e"]);
}

#[test]
fn test_false_outer_branch_suppresses_descendants() {
    let analysis = analyze_with(NESTED, &Configuration::new("off").with("OUTER", 0));
    assert!(analysis
        .objects
        .iter()
        .all(|o| o.kind != DeclaratorKind::Variable));
    assert_eq!(analysis.active_branches().count(), 0);
}

#[test]
fn test_branch_log() {
    let source = "#ifdef FOO\nint a;\n#else\nint b;\n#endif\n";
    let analysis = analyze_with(source, &Configuration::new("foo").with("FOO", 1));

    assert_eq!(analysis.branches.len(), 2);
    let active: Vec<&str> = analysis.active_branches().map(|b| b.directive.as_str()).collect();
    assert_eq!(active, vec!["#ifdef FOO"]);
    assert_eq!(analysis.branches[0].end.as_ref().map(|l| l.line), Some(3));
}

#[test]
fn test_undefined_macro_in_condition_is_zero() {
    let analysis = analyze("#if UNDEFINED_THING\nint a;\n#endif\nint b;\n");
    assert!(variable(&analysis, "a").is_none());
    assert!(variable(&analysis, "b").is_some());
    assert!(analysis.diagnostics.is_empty());
}

#[test]
fn test_malformed_condition_is_false_with_diagnostic() {
    let analysis = analyze("#if 1 +\nint a;\n#else\nint b;\n#endif\n");
    assert!(variable(&analysis, "a").is_none());
    assert!(variable(&analysis, "b").is_some());
    assert_eq!(count(&analysis, DiagnosticKind::UnresolvedConditionalExpression), 1);
}

#[test]
fn test_unmatched_and_unterminated_conditionals() {
    let source = r#"
#endif
int a;
#else
#if 0
int b;
"#;
    let analysis = analyze(source);

    assert!(variable(&analysis, "a").is_some());
    assert!(variable(&analysis, "b").is_none());
    assert_eq!(count(&analysis, DiagnosticKind::UnmatchedConditional), 2);
    assert_eq!(count(&analysis, DiagnosticKind::UnterminatedConditional), 1);
    assert!(!analysis.aborted);
}

#[test]
fn test_array_initializer_mismatch() {
    let source = r#"
const int a[4] = {0, 1};
int b[2] = {1, 2, 3};
int c[] = {1, 2, 3};
char s[3] = "abcdef";
int d[8] = {};
"#;
    let analysis = analyze(source);

    let a = variable(&analysis, "a").unwrap();
    let ty = a.type_descriptor.as_ref().unwrap();
    assert!(ty.is_array());
    assert_eq!(ty.array_size(), Some(4));
    assert!(a.definition.is_some());

    let c = variable(&analysis, "c").unwrap();
    assert_eq!(c.type_descriptor.as_ref().unwrap().array_size(), Some(3));

    let mismatches: Vec<_> = analysis.diagnostics_of(DiagnosticKind::ArraySizeMismatch).collect();
    assert_eq!(mismatches.len(), 3);
    assert_eq!(mismatches[0].location.line, 2);
    assert_eq!(mismatches[0].severity, Severity::Warning);
    assert_eq!(mismatches[1].severity, Severity::Error);
    assert_eq!(mismatches[2].location.line, 5);
}

#[test]
fn test_macro_is_catalogued() {
    let source = "#define FORTYTWO 42\nint i = FORTYTWO;\n";
    let analysis = analyze(source);

    let fortytwo = analysis.find_kind("FORTYTWO", DeclaratorKind::Macro).unwrap();
    assert_eq!(fortytwo.definition.as_ref().map(|l| l.line), Some(1));
    let i = variable(&analysis, "i").unwrap();
    assert!(i.definition.is_some());

    let uses: Vec<_> = analysis.references_to("FORTYTWO").collect();
    assert_eq!(uses.len(), 1);
    assert_eq!(uses[0].target, Some(fortytwo.id));
    assert!(analysis.diagnostics.is_empty(), "{:?}", analysis.diagnostics);
}

#[test]
fn test_macro_redefinition() {
    let source = "#define N 1\n#define N 2\n#define N 2\nint a[N];\n";
    let analysis = analyze(source);

    assert_eq!(count(&analysis, DiagnosticKind::MacroRedefinition), 1);
    let n = analysis.find_kind("N", DeclaratorKind::Macro).unwrap();
    assert_eq!(n.definition.as_ref().map(|l| l.line), Some(3));
    let a = variable(&analysis, "a").unwrap();
    assert_eq!(a.type_descriptor.as_ref().unwrap().array_size(), Some(2));
}

#[test]
fn test_function_like_macros_produce_declarations() {
    let source = r#"
#define DECLARE(type, name) type name
#define STR(x) #x
DECLARE(int, counter);
const char *s = STR(hello world);
"#;
    let analysis = analyze(source);

    let counter = variable(&analysis, "counter").unwrap();
    assert_eq!(counter.type_descriptor.as_ref().unwrap().base, "int");
    assert!(variable(&analysis, "s").unwrap().definition.is_some());
    assert_eq!(analysis.references_to("DECLARE").count(), 1);
    assert_eq!(analysis.references_to("STR").count(), 1);
}

#[test]
fn test_undef_keeps_catalogue_entry() {
    let source = "#define FEATURE 1\n#undef FEATURE\n#ifdef FEATURE\nint on;\n#endif\n";
    let analysis = analyze(source);
    assert!(analysis.find_kind("FEATURE", DeclaratorKind::Macro).is_some());
    assert!(variable(&analysis, "on").is_none());
}

#[test]
fn test_scope_exit() {
    let source = r#"
void f(void) {
    typedef int local_t;
    int counter = 0;
}
local_t (y);
int counter;
"#;
    let analysis = analyze(source);

    assert!(variable(&analysis, "y").is_none());
    let counters: Vec<_> = analysis.objects_named("counter").collect();
    assert_eq!(counters.len(), 2);
    assert_eq!(counters[0].scope, Scope::Local);
    assert_eq!(counters[1].scope, Scope::Global);
    let local_t = analysis.find("local_t").unwrap();
    assert_eq!(local_t.scope, Scope::Local);
    assert_eq!(count(&analysis, DiagnosticKind::RedeclarationConflict), 0);
}

#[test]
fn test_references_resolve_innermost_first() {
    let source = r#"
int x;
void f(void) {
    int x;
    x = 1;
}
void g(void) {
    x = 2;
}
"#;
    let analysis = analyze(source);

    let xs: Vec<_> = analysis.objects_named("x").collect();
    let targets: Vec<_> = analysis.references_to("x").map(|r| r.target).collect();
    assert_eq!(targets, vec![Some(xs[1].id), Some(xs[0].id)]);
}

#[test]
fn test_analysis_is_idempotent() {
    let source = r#"
#define SIZE 3
typedef unsigned long word_t;
static word_t table[SIZE] = {1, 2};
int lookup(int i) { return table[i]; }
"#;
    let first = analyze(source);
    let second = analyze(source);

    assert_eq!(format!("{:?}", first.objects), format!("{:?}", second.objects));
    assert_eq!(first.references, second.references);
    assert_eq!(first.diagnostics, second.diagnostics);
}

#[test]
fn test_tentative_definitions() {
    let source = r#"
int t;
int t;
extern int e;
static int s;
int d;
int d = 5;
"#;
    let analysis = analyze(source);

    let t = variable(&analysis, "t").unwrap();
    assert_eq!(t.declarations.len(), 2);
    assert_eq!(t.definition.as_ref().map(|l| l.line), Some(3));
    assert!(variable(&analysis, "e").unwrap().definition.is_none());
    let s = variable(&analysis, "s").unwrap();
    assert_eq!(s.scope, Scope::FileStatic);
    assert_eq!(s.linkage, Linkage::Internal);
    assert!(s.definition.is_some());
    assert_eq!(variable(&analysis, "d").unwrap().definition.as_ref().map(|l| l.line), Some(7));
    assert!(analysis.diagnostics.is_empty(), "{:?}", analysis.diagnostics);
}

#[test]
fn test_tentative_promotion_can_be_disabled() {
    let config = AnalyzerConfig {
        promote_tentative: false,
        ..AnalyzerConfig::default()
    };
    let analysis = analyze_unit(&SourceUnit::new("t.c", "int t;\n"), &config, None, &NoIncludes);
    let t = variable(&analysis, "t").unwrap();
    assert!(t.definition.is_none());
    assert!(t.tentative_definition.is_some());
}

#[test]
fn test_declarator_shapes() {
    let source = r#"
char a, *b, **c;
int (*fp)(int, char *);
int f(void);
int g();
int *h(int n, ...);
"#;
    let analysis = analyze(source);

    let ty = |name: &str| analysis.find(name).unwrap().type_descriptor.clone().unwrap();
    assert_eq!(ty("a").derivations.len(), 0);
    assert_eq!(ty("b").pointer_depth(), 1);
    assert_eq!(ty("c").pointer_depth(), 2);
    assert_eq!(ty("b").base, "char");

    let fp = analysis.find("fp").unwrap();
    assert_eq!(fp.kind, DeclaratorKind::Variable);
    let fp_ty = fp.type_descriptor.as_ref().unwrap();
    assert!(matches!(fp_ty.derivations[0], Derivation::Pointer { .. }));
    assert!(matches!(&fp_ty.derivations[1], Derivation::Function(sig) if sig.params.len() == 2));

    assert_eq!(ty("f").signature().unwrap().style, ParamStyle::Void);
    assert_eq!(ty("g").signature().unwrap().style, ParamStyle::Unspecified);
    let h = ty("h");
    assert!(h.signature().unwrap().variadic);
    assert!(matches!(h.derivations[1], Derivation::Pointer { .. }));
    assert!(analysis.find("f").unwrap().definition.is_none());
}

#[test]
fn test_function_definition_with_locals() {
    let source = r#"
static int helper(int x, const char *name)
{
    int total = x;
    for (int i = 0; i < x; i++) {
        total += i;
    }
    return total;
}
"#;
    let analysis = analyze(source);

    let helper = analysis.find_kind("helper", DeclaratorKind::Function).unwrap();
    assert!(helper.definition.is_some());
    assert_eq!(helper.scope, Scope::FileStatic);
    assert_eq!(helper.linkage, Linkage::Internal);
    let sig = helper.type_descriptor.as_ref().unwrap().signature().unwrap();
    assert_eq!(sig.params.len(), 2);
    assert_eq!(sig.params[1].ty.base, "const char");
    assert_eq!(sig.params[1].ty.pointer_depth(), 1);

    for local in ["x", "name", "total", "i"] {
        let object = variable(&analysis, local).unwrap();
        assert_eq!(object.scope, Scope::Local, "{}", local);
        assert_eq!(object.enclosing_function.as_deref(), Some("helper"));
        assert!(object.definition.is_some(), "{}", local);
    }
    assert_eq!(variable(&analysis, "total").unwrap().uses.len(), 2);
    assert!(analysis.diagnostics.is_empty(), "{:?}", analysis.diagnostics);
}

#[test]
fn test_old_style_definition() {
    let source = r#"
int add(a, b)
    int a;
    long b;
{
    return a + b;
}
main() { return add(1, 2); }
"#;
    let analysis = analyze(source);

    let add = analysis.find_kind("add", DeclaratorKind::Function).unwrap();
    let sig = add.type_descriptor.as_ref().unwrap().signature().unwrap();
    assert_eq!(sig.style, ParamStyle::IdentifierList);
    assert_eq!(sig.params[1].ty.base, "long");
    assert!(variable(&analysis, "b").is_some());

    let main = analysis.find_kind("main", DeclaratorKind::Function).unwrap();
    assert!(main.definition.is_some());
    assert_eq!(main.type_descriptor.as_ref().unwrap().base, "int");
    assert_eq!(add.uses.len(), 1);
    assert!(analysis.diagnostics.is_empty(), "{:?}", analysis.diagnostics);
}

#[test]
fn test_suspicious_declarations_are_advisory() {
    let source = r#"
bool flag;
void nothing;
void f(void) { bool local = 1; }
"#;
    let analysis = analyze(source);

    assert_eq!(variable(&analysis, "flag").unwrap().type_descriptor.as_ref().unwrap().base, "bool");
    assert!(variable(&analysis, "nothing").is_some());
    assert!(variable(&analysis, "local").is_some());
    assert_eq!(count(&analysis, DiagnosticKind::SuspiciousDeclaration), 3);
    assert!(analysis
        .diagnostics
        .iter()
        .all(|d| d.severity == Severity::Warning));
}

#[test]
fn test_recovery_resumes_at_next_declaration() {
    let source = r#"
int ok1;
int 123 bad;
int ok2;
void f(void) {
    int = 5;
    else x = 1;
    int after;
}
int ok3;
"#;
    let analysis = analyze(source);

    for name in ["ok1", "ok2", "after", "ok3"] {
        assert!(variable(&analysis, name).is_some(), "{}", name);
    }
    let skipped: Vec<_> = analysis.diagnostics_of(DiagnosticKind::UnparseableConstruct).collect();
    assert_eq!(skipped.len(), 3);
    assert_eq!(skipped[0].location.line, 3);
    assert_eq!(skipped[0].resync.as_ref().map(|l| l.line), Some(4));
    assert!(!analysis.aborted);
}

#[test]
fn test_unbalanced_braces_are_fatal() {
    let source = "int before;\nvoid f(void) {\n    int x;\n";
    let analysis = analyze(source);

    assert!(analysis.aborted);
    assert_eq!(count(&analysis, DiagnosticKind::StructuralFatal), 1);
    assert!(variable(&analysis, "before").is_some());
}

#[test]
fn test_unterminated_comment_is_fatal() {
    let analysis = analyze("int a; /* never closed\nint b;\n");
    assert!(analysis.aborted);
    assert_eq!(analysis.diagnostics.len(), 1);
    assert_eq!(analysis.diagnostics[0].severity, Severity::Fatal);
    assert!(analysis.objects.is_empty());
}

/// Apostrophes in skipped groups and in diagnostic prose are not literals
#[test]
fn test_stray_quotes_outside_active_code() {
    let source = r#"
#if 0
it's only a comment written as text
#endif
#ifdef NOPE
#error can't build without NOPE
#endif
#warning don't use this header
int after;
"#;
    let analysis = analyze(source);

    assert!(!analysis.aborted);
    assert!(variable(&analysis, "after").is_some());
    assert_eq!(count(&analysis, DiagnosticKind::StructuralFatal), 0);
    let warned: Vec<_> = analysis.diagnostics_of(DiagnosticKind::ErrorDirective).collect();
    assert_eq!(warned.len(), 1);
    assert_eq!(warned[0].severity, Severity::Warning);
}

#[test]
fn test_unterminated_literal_in_active_code_is_fatal() {
    let analysis = analyze("int a;
char *s = \"open\nint b;\n");
    assert!(analysis.aborted);
    assert_eq!(analysis.diagnostics.len(), 1);
    let fatal = &analysis.diagnostics[0];
    assert_eq!(fatal.kind, DiagnosticKind::StructuralFatal);
    assert_eq!(fatal.location.line, 2);
    assert!(fatal.message.contains("unterminated string literal"));
    assert!(variable(&analysis, "a").is_some());
    assert!(variable(&analysis, "b").is_none());

    let analysis = analyze("#define QUOTE 'x\nint c = QUOTE;\n");
    assert!(analysis.aborted);
    assert_eq!(count(&analysis, DiagnosticKind::StructuralFatal), 1);
}

#[test]
fn test_tags_and_enumerators() {
    let source = r#"
enum color { RED, GREEN = 5, BLUE };
struct point { int x, y; };
struct point origin = { 0, 0 };
typedef struct node node_t;
"#;
    let analysis = analyze(source);

    let color = analysis.find("color").unwrap();
    assert_eq!(color.kind, DeclaratorKind::Type(TypeKind::Enum));
    assert!(color.definition.is_some());
    let green = variable(&analysis, "GREEN").unwrap();
    assert!(green.definition.is_some());
    assert_eq!(green.type_descriptor.as_ref().unwrap().base, "enum color");

    let point = analysis.find("point").unwrap();
    assert_eq!(point.kind, DeclaratorKind::Type(TypeKind::Struct));
    assert_eq!(point.uses.len(), 1);
    assert!(analysis.find("x").is_none());
    assert_eq!(variable(&analysis, "origin").unwrap().type_descriptor.as_ref().unwrap().base, "struct point");

    let node = analysis.find("node").unwrap();
    assert!(node.definition.is_none());
    assert_eq!(analysis.find("node_t").unwrap().kind, DeclaratorKind::Type(TypeKind::Typedef));
    assert!(analysis.diagnostics.is_empty(), "{:?}", analysis.diagnostics);
}

#[test]
fn test_signature_references_types() {
    let source = r#"
typedef struct device device_t;
struct config { int mode; };
int probe(device_t *dev, struct config *cfg);
"#;
    let analysis = analyze(source);

    let probe = analysis.find_kind("probe", DeclaratorKind::Function).unwrap();
    let referenced: Vec<&str> = probe
        .signature_refs
        .iter()
        .filter_map(|id| analysis.get(*id))
        .map(|o| o.name.as_str())
        .collect();
    assert_eq!(referenced, vec!["device_t", "config"]);
}

#[test]
fn test_conflicting_redeclarations() {
    let source = r#"
int thing;
typedef int thing;
int g(void);
static int g(void) { return 0; }
int h(int);
int h(char *);
"#;
    let analysis = analyze(source);

    let things: Vec<_> = analysis.objects_named("thing").collect();
    assert_eq!(things.len(), 2);
    assert!(things[1].conflicting_redeclaration);
    assert!(!things[0].conflicting_redeclaration);
    assert!(analysis.find_kind("g", DeclaratorKind::Function).unwrap().conflicting_redeclaration);
    assert!(analysis.find_kind("h", DeclaratorKind::Function).unwrap().conflicting_redeclaration);
    assert_eq!(count(&analysis, DiagnosticKind::RedeclarationConflict), 3);
}

/// `unsigned` and `unsigned int` name the same type
#[test]
fn test_equivalent_type_spellings_are_compatible() {
    let source = r#"
extern unsigned count;
unsigned int count = 0;
extern long total;
long int total = 0;
extern const signed short level;
const short int level = 1;
"#;
    let analysis = analyze(source);

    assert_eq!(count(&analysis, DiagnosticKind::RedeclarationConflict), 0);
    for name in ["count", "total", "level"] {
        let object = variable(&analysis, name).expect(name);
        assert!(!object.conflicting_redeclaration, "{}", name);
        assert!(object.definition.is_some(), "{}", name);
    }
}

#[test]
fn test_typedef_redeclaration_is_not_a_redefinition() {
    let analysis = analyze("typedef int word;\ntypedef int word;\nword w;\n");
    let word = analysis.find("word").unwrap();
    assert_eq!(word.declarations.len(), 1);
    assert_eq!(count(&analysis, DiagnosticKind::MultipleDefinitions), 0);
    assert!(variable(&analysis, "w").is_some());
}

#[test]
fn test_includes_are_spliced_inline() {
    let includes = MemoryIncludes::new().with("types.h", "typedef int my_int;\n#define LIMIT 8\n");
    let source = "#include \"types.h\"\n#include <missing.h>\nmy_int values[LIMIT];\n";
    let analysis = analyze_unit(
        &SourceUnit::new("main.c", source),
        &AnalyzerConfig::default(),
        None,
        &includes,
    );

    let values = variable(&analysis, "values").unwrap();
    let ty = values.type_descriptor.as_ref().unwrap();
    assert_eq!(ty.base, "my_int");
    assert_eq!(ty.array_size(), Some(8));
    assert_eq!(analysis.find("my_int").unwrap().first_declaration.file, "types.h");
    assert_eq!(count(&analysis, DiagnosticKind::IncludeNotFound), 1);
}

#[test]
fn test_other_directives() {
    let source = r#"
#pragma once
#error "unsupported target"
#warning "deprecated"
#frobnicate
#
int after;
"#;
    let analysis = analyze(source);

    assert!(variable(&analysis, "after").is_some());
    assert_eq!(count(&analysis, DiagnosticKind::ErrorDirective), 2);
    assert_eq!(count(&analysis, DiagnosticKind::UnknownDirective), 1);
    assert!(!analysis.aborted);
}

#[test]
fn test_diagnostics_sorted_by_location() {
    let source = r#"
int z = 1;
int z = 2;
#if 1 +
#endif
#endif
"#;
    let analysis = analyze(source);
    let lines: Vec<u32> = analysis.diagnostics.iter().map(|d| d.location.line).collect();
    let mut sorted = lines.clone();
    sorted.sort();
    assert_eq!(lines, sorted);
    assert_eq!(lines.len(), 3);
}
