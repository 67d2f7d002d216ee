//! Tests for the symscope analysis driver

use super::*;
use pretty_assertions::assert_eq;
use symscope_core::{DeclaratorKind, DiagnosticKind, TypeKind};
use symscope_parser::MemoryIncludes;

const VARIANT_SOURCE: &str = r#"
#if VARIANT & 1
typedef int foo;
#endif
#if VARIANT & 2
typedef int bar;
#endif
foo(bar);
"#;

#[test]
fn test_analyze_with_memory_includes() {
    let includes = MemoryIncludes::new().with("config.h", "#define BUFFER_SIZE 16\ntypedef unsigned char byte;\n");
    let analyzer = Analyzer::default().with_resolver(includes);
    let unit = SourceUnit::new("main.c", "#include \"config.h\"\nbyte buffer[BUFFER_SIZE];\n");

    let analysis = analyzer.analyze(&unit);

    let buffer = analysis.find("buffer").unwrap();
    assert_eq!(buffer.type_descriptor.as_ref().unwrap().array_size(), Some(16));
    assert!(analysis.find_kind("BUFFER_SIZE", DeclaratorKind::Macro).is_some());
    assert!(analysis.diagnostics.is_empty(), "{:?}", analysis.diagnostics);
}

#[test]
fn test_configurations_keep_order() {
    let analyzer = Analyzer::default();
    let unit = SourceUnit::new("variant.c", VARIANT_SOURCE);
    let set = ConfigurationSet::bitmask("VARIANT", 2);

    let analyses = analyzer.analyze_configurations(&unit, &set);

    let names: Vec<_> = analyses.iter().map(|a| a.configuration.clone().unwrap()).collect();
    assert_eq!(names, vec!["VARIANT=0", "VARIANT=1", "VARIANT=2", "VARIANT=3"]);
}

/// `foo(bar);` reads differently depending on which names are typedefs
#[test]
fn test_one_text_four_readings() {
    let analyzer = Analyzer::default();
    let unit = SourceUnit::new("variant.c", VARIANT_SOURCE);
    let analyses = analyzer.analyze_configurations(&unit, &ConfigurationSet::bitmask("VARIANT", 2));

    // Neither is a type: a call-like expression
    assert!(analyses[0].objects.is_empty());
    assert_eq!(analyses[0].references_to("foo").count(), 1);

    // `foo` is a type: variable `bar`
    let bar = analyses[1].find_kind("bar", DeclaratorKind::Variable).unwrap();
    assert_eq!(bar.type_descriptor.as_ref().unwrap().base, "foo");

    // `bar` is a type: still a call, flagged as a possible implicit-int
    // declaration
    assert!(analyses[2].find("foo").is_none());
    assert_eq!(analyses[2].objects.len(), 1);
    assert_eq!(analyses[2].references_to("foo").count(), 1);
    assert_eq!(analyses[2].references_to("bar").count(), 1);
    assert_eq!(
        analyses[2]
            .diagnostics_of(DiagnosticKind::SuspiciousDeclaration)
            .count(),
        1
    );

    // Both are types: `bar` is redeclared as a variable
    assert_eq!(
        analyses[3]
            .diagnostics_of(DiagnosticKind::RedeclarationConflict)
            .count(),
        1
    );

    let report = VarianceReport::from_analyses(&analyses);
    let foo = report.symbol("foo").unwrap();
    assert!(!foo.is_uniform());
    assert!(!foo.kind_varies());
    assert_eq!(foo.absent_from, vec!["VARIANT=0".to_string(), "VARIANT=2".to_string()]);
    assert_eq!(foo.kinds_in("VARIANT=2"), None);
    assert!(report.symbol("bar").unwrap().kind_varies());
    assert_eq!(
        report.symbol("bar").unwrap().kinds_in("VARIANT=3"),
        Some(&[DeclaratorKind::Type(TypeKind::Typedef), DeclaratorKind::Variable][..])
    );
    assert_eq!(report.region_groups().len(), 4);
}

#[test]
fn test_runs_share_no_state() {
    let analyzer = Analyzer::default();
    let unit = SourceUnit::new("variant.c", VARIANT_SOURCE);
    let set = ConfigurationSet::bitmask("VARIANT", 2);

    let parallel = analyzer.analyze_configurations(&unit, &set);
    let sequential: Vec<_> = set.iter().map(|c| analyzer.analyze_with(&unit, c)).collect();

    for (a, b) in parallel.iter().zip(&sequential) {
        assert_eq!(format!("{:?}", a.objects), format!("{:?}", b.objects));
        assert_eq!(a.diagnostics, b.diagnostics);
        assert_eq!(a.branches, b.branches);
    }
}

#[test]
fn test_variance_shortcut() {
    let analyzer = Analyzer::default();
    let unit = SourceUnit::new("uniform.c", "int x;\nvoid f(void) { x = 1; }\n");
    let report = analyzer.variance(&unit, &ConfigurationSet::bitmask("UNUSED", 1));
    assert!(report.is_uniform());
    assert_eq!(report.configurations.len(), 2);
}

#[test]
fn test_analyze_file_missing() {
    let analyzer = Analyzer::default();
    assert!(analyzer
        .analyze_file(std::path::Path::new("/nonexistent/unit.c"))
        .is_err());
}
