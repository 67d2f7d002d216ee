//! Analysis of the C sources under `tests/fixtures`

use pretty_assertions::assert_eq;
use std::path::PathBuf;
use symscope_analysis::{Analyzer, VarianceReport};
use symscope_core::{
    AnalyzerConfig, Configuration, ConfigurationSet, DeclaratorKind, DiagnosticKind, Scope, Severity,
    StorageClass, TypeKind,
};
use symscope_parser::{SourceUnit, UnitAnalysis};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn analyze(name: &str) -> UnitAnalysis {
    Analyzer::default()
        .analyze_file(&fixture(name))
        .expect("fixture should be readable")
}

fn analyze_with(name: &str, configuration: &Configuration) -> UnitAnalysis {
    let unit = SourceUnit::from_file(&fixture(name)).expect("fixture should be readable");
    Analyzer::default().analyze_with(&unit, configuration)
}

/// Names of the file-scope variables, sorted
fn globals(analysis: &UnitAnalysis) -> Vec<&str> {
    let mut names: Vec<&str> = analysis
        .objects
        .iter()
        .filter(|o| o.kind == DeclaratorKind::Variable && o.scope == Scope::Global)
        .map(|o| o.name.as_str())
        .collect();
    names.sort();
    names
}

fn errors(analysis: &UnitAnalysis) -> Vec<String> {
    analysis
        .diagnostics
        .iter()
        .filter(|d| d.severity >= Severity::Error)
        .map(|d| d.to_string())
        .collect()
}

#[test]
fn test_nested_conditionals_per_configuration() {
    let base = analyze("nested.c");
    assert_eq!(globals(&base), vec!["flat", "top", "top_no_foo"]);
    assert!(base.diagnostics.is_empty(), "{:?}", base.diagnostics);

    let foo = analyze_with("nested.c", &Configuration::new("foo").with("FOO", 1).with("LEVEL", 2));
    assert_eq!(
        globals(&foo),
        vec!["deep", "deep_foo", "deep_foo_no_bar", "top", "top_foo"]
    );

    let both = analyze_with(
        "nested.c",
        &Configuration::new("both").with("FOO", 1).with("BAR", 1).with("LEVEL", 3),
    );
    assert!(globals(&both).contains(&"deep_foo_bar"));
    assert!(!globals(&both).contains(&"deep_bar"));

    let bar = analyze_with("nested.c", &Configuration::new("bar").with("BAR", 1).with("LEVEL", 2));
    assert_eq!(globals(&bar), vec!["deep", "deep_bar", "top", "top_no_foo"]);

    let shallow = analyze_with("nested.c", &Configuration::new("shallow").with("LEVEL", 1));
    assert_eq!(globals(&shallow), vec!["shallow", "top", "top_no_foo"]);

    // `#if 1 ... #else` never takes the else branch
    for analysis in [&base, &foo, &both, &bar, &shallow] {
        assert!(analysis.find("never").is_none());
    }
}

#[test]
fn test_function_or_variable() {
    let analysis = analyze("function_or_variable.c");

    let hits = analysis.find_kind("hits", DeclaratorKind::Variable).unwrap();
    assert_eq!(hits.type_descriptor.as_ref().unwrap().base, "counter_t");
    assert_eq!(hits.scope, Scope::Global);
    assert_eq!(hits.uses.len(), 2);

    // `update_hits (argument);` is a call, so neither name is declared
    assert!(analysis.find("update_hits").is_none());
    assert!(analysis.find("argument").is_none());
    assert_eq!(analysis.references_to("update_hits").count(), 2);

    assert!(analysis.find("touch").unwrap().is_defined());
    assert!(errors(&analysis).is_empty(), "{:?}", errors(&analysis));
}

#[test]
fn test_function_or_variable_variance() {
    let unit = SourceUnit::from_file(&fixture("function_or_variable.c")).unwrap();
    let analyzer = Analyzer::default();
    let analyses = analyzer.analyze_configurations(&unit, &ConfigurationSet::bitmask("VARIANT", 2));
    let report = VarianceReport::from_analyses(&analyses);

    for name in ["counter_t", "hits", "touch"] {
        assert!(report.symbol(name).unwrap().is_uniform(), "{} should not vary", name);
    }

    // Only `foo` declares anything in `foo(bar);`; with `bar` alone a
    // type the line is still a call
    let foo = report.symbol("foo").unwrap();
    assert_eq!(foo.absent_from, vec!["VARIANT=0".to_string(), "VARIANT=2".to_string()]);
    assert_eq!(
        foo.kinds_in("VARIANT=1"),
        Some(&[DeclaratorKind::Type(TypeKind::Typedef)][..])
    );
    assert_eq!(foo.kinds_in("VARIANT=2"), None);
    assert_eq!(analyses[2].references_to("foo").count(), 1);
    assert_eq!(
        analyses[2]
            .diagnostics_of(DiagnosticKind::SuspiciousDeclaration)
            .count(),
        1
    );

    let bar = report.symbol("bar").unwrap();
    assert_eq!(bar.kinds_in("VARIANT=1"), Some(&[DeclaratorKind::Variable][..]));
    assert_eq!(
        bar.kinds_in("VARIANT=2"),
        Some(&[DeclaratorKind::Type(TypeKind::Typedef)][..])
    );

    assert_eq!(
        analyses[3]
            .diagnostics_of(DiagnosticKind::RedeclarationConflict)
            .count(),
        1
    );
}

#[test]
fn test_arrays_and_definitions() {
    let analysis = analyze("arrays.c");

    let es_var = analysis.find("es_var").unwrap();
    assert_eq!(es_var.storage_class, StorageClass::Extern);
    assert!(!es_var.is_defined());

    // Tentative definitions become definitions at end of input
    assert!(analysis.find("ai_var_b").unwrap().is_defined());
    assert!(analysis.find("ai_var_a").unwrap().is_defined());

    let sizes: Vec<Option<u64>> = ["ai_var_b", "ai_var_c", "ai_var_d", "ai_var_e"]
        .iter()
        .map(|n| analysis.find(n).unwrap().type_descriptor.as_ref().unwrap().array_size())
        .collect();
    assert_eq!(sizes, vec![Some(2), Some(2), Some(2), Some(4)]);

    let mismatches: Vec<_> = analysis
        .diagnostics_of(DiagnosticKind::ArraySizeMismatch)
        .collect();
    assert_eq!(mismatches.len(), 1);
    assert_eq!(mismatches[0].location.line, 11);
    assert_eq!(mismatches[0].severity, Severity::Warning);

    let i_func_i = analysis.find_kind("i_func_i", DeclaratorKind::Function).unwrap();
    assert_eq!(i_func_i.first_declaration.line, 15);
    assert_eq!(i_func_i.definition.as_ref().unwrap().line, 24);

    let lcc_var = analysis.find("lcc_var").unwrap();
    assert_eq!(lcc_var.scope, Scope::Local);
    assert_eq!(lcc_var.enclosing_function.as_deref(), Some("main"));

    assert!(errors(&analysis).is_empty(), "{:?}", errors(&analysis));
}

#[test]
fn test_quoted_include_next_to_source() {
    let analysis = analyze("ppcond.c");
    assert!(analysis.diagnostics.is_empty(), "{:?}", analysis.diagnostics);

    let i_var = analysis.find("i_var").unwrap();
    assert!(i_var.first_declaration.file.ends_with("minimal.h"));
    assert!(i_var.definition.as_ref().unwrap().file.ends_with("ppcond.c"));
    assert_eq!(i_var.definition.as_ref().unwrap().line, 3);

    // The `#elif` branch is the active one
    let f = analysis.find("pc_func_ui_c_pc").unwrap();
    assert!(f.first_declaration.file.ends_with("minimal.h"));
    assert!(f.is_defined());
    assert!(analysis.find("foobar").is_none());

    assert_eq!(analysis.find("c_var_c").unwrap().uses.len(), 1);
    let fortytwo = analysis.find_kind("FORTYTWO", DeclaratorKind::Macro).unwrap();
    assert!(fortytwo.first_declaration.file.ends_with("minimal.h"));
    assert!(!fortytwo.uses.is_empty());
}

#[test]
fn test_include_paths_from_config() {
    let config = AnalyzerConfig {
        include_paths: vec![fixture("")],
        ..AnalyzerConfig::default()
    };
    let unit = SourceUnit::new("virtual/main.c", "#include <minimal.h>\nint answer = FORTYTWO;\n");
    let analysis = Analyzer::new(config).analyze(&unit);

    assert!(analysis.diagnostics_of(DiagnosticKind::IncludeNotFound).next().is_none());
    assert!(analysis.find("i_func_i").is_some());
    assert!(analysis.find_kind("ADDRESS_OF", DeclaratorKind::Macro).is_some());
}

#[test]
fn test_hello_world() {
    let analysis = analyze("hello.c");
    assert!(!analysis.aborted);

    // System headers are not on any include path
    assert_eq!(analysis.diagnostics_of(DiagnosticKind::IncludeNotFound).count(), 2);
    assert!(errors(&analysis).is_empty(), "{:?}", errors(&analysis));

    let macros: Vec<&str> = analysis
        .objects
        .iter()
        .filter(|o| o.kind == DeclaratorKind::Macro)
        .map(|o| o.name.as_str())
        .collect();
    assert_eq!(
        macros,
        vec!["MAX_STRLEN", "UPPER_H", "LOWER_H", "SUFFIX", "HELLO", "PUNCTUATION"]
    );
    assert_eq!(
        analysis.find_kind("MAX_STRLEN", DeclaratorKind::Macro).unwrap().uses.len(),
        3
    );

    // `char hello[];` is completed by the later declaration
    let hello = analysis.find_kind("hello", DeclaratorKind::Variable).unwrap();
    assert_eq!(hello.type_descriptor.as_ref().unwrap().array_size(), Some(256));
    assert_eq!(hello.declarations.len(), 2);

    let counting_s = analysis
        .find_kind("counting_s", DeclaratorKind::Type(TypeKind::Struct))
        .unwrap();
    assert_eq!(counting_s.first_declaration.line, 13);
    assert_eq!(counting_s.definition.as_ref().unwrap().line, 18);
    assert!(analysis.find("counting_t").unwrap().is_typedef());

    let print_char = analysis.find("print_char").unwrap();
    assert_eq!(print_char.storage_class, StorageClass::Static);
    assert_eq!(print_char.declarations.len(), 1);
    assert_eq!(print_char.definition.as_ref().unwrap().line, 29);
    assert!(!print_char.conflicting_redeclaration);

    // Struct members are not catalogued and `.max` is not a use of anything
    assert!(analysis.find("cur").is_none());
    assert!(analysis.references_to("max").next().is_none());
    assert!(analysis.references_to("printf").all(|r| r.target.is_none()));
}

#[test]
fn test_usb_driver_skeleton() {
    let analysis = analyze("usb_skel.c");
    assert!(!analysis.aborted);
    assert!(errors(&analysis).is_empty(), "{:?}", errors(&analysis));
    assert_eq!(analysis.diagnostics_of(DiagnosticKind::IncludeNotFound).count(), 3);

    // Kernel typedefs are unknown without the headers
    let suspicious: Vec<String> = analysis
        .diagnostics_of(DiagnosticKind::SuspiciousDeclaration)
        .map(|d| d.message.clone())
        .collect();
    assert!(suspicious.iter().any(|m| m.contains("spinlock_t")), "{:?}", suspicious);

    for name in ["skel_delete", "skel_read_bulk_callback", "skel_probe", "skel_disconnect"] {
        let function = analysis.find_kind(name, DeclaratorKind::Function).unwrap();
        assert!(function.is_defined(), "{} should be defined", name);
        assert_eq!(function.storage_class, StorageClass::Static);
    }

    let table = analysis.find("skel_table").unwrap();
    assert_eq!(table.type_descriptor.as_ref().unwrap().array_size(), Some(2));

    // Declared once without an initializer, then defined
    let driver = analysis.find("skel_driver").unwrap();
    assert_eq!(driver.declarations.len(), 1);
    assert_eq!(driver.definition.as_ref().unwrap().line, 141);
    assert!(!driver.conflicting_redeclaration);

    // The driver table refers to the callbacks
    let probe = analysis.find("skel_probe").unwrap();
    assert!(probe.uses.iter().any(|l| l.line == 143));
    assert_eq!(analysis.find("skel_delete").unwrap().uses.len(), 2);

    let retval = analysis
        .objects_named("retval")
        .find(|o| o.enclosing_function.as_deref() == Some("skel_probe"))
        .unwrap();
    assert!(retval.is_local());

    assert!(analysis.find_kind("usb_skel", DeclaratorKind::Type(TypeKind::Struct)).unwrap().is_defined());
    assert_eq!(
        analysis.references_to("MODULE_DEVICE_TABLE").count(),
        1
    );
}

#[test]
fn test_fixture_analysis_is_serializable() {
    let analysis = analyze("hello.c");
    let json = serde_json::to_string(&analysis).unwrap();
    let back: UnitAnalysis = serde_json::from_str(&json).unwrap();
    assert_eq!(back.objects.len(), analysis.objects.len());
    assert_eq!(back.diagnostics, analysis.diagnostics);
}
