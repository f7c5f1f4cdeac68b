//! Integration tests for the CEL dialect: translation and evaluation together.

use nim_audit::cel::{CelCause, CelEvaluator, cel_has, cel_matches, cel_size, evaluate_cel, translate};
use nim_audit::expr::{Context, ErrorKind, Value};
use std::collections::BTreeMap;

fn labels(pairs: &[(&str, &str)]) -> Context {
    let labels: BTreeMap<String, &str> = pairs.iter().map(|(k, v)| ((*k).to_string(), *v)).collect();
    Context::new().with("labels", labels)
}

#[test]
fn test_mapping_get() {
    assert!(evaluate_cel("labels.get('v') == '1.0'", &labels(&[("v", "1.0")])).unwrap());
    assert!(!evaluate_cel("labels.get('v') == '1.0'", &labels(&[("v", "2.0")])).unwrap());
}

#[test]
fn test_matches_is_a_search() {
    assert!(evaluate_cel("env.matches('^NIM_.*')", &Context::new().with("env", "NIM_PORT")).unwrap());
    assert!(!evaluate_cel("env.matches('^NIM_.*')", &Context::new().with("env", "OTHER")).unwrap());
    assert!(evaluate_cel("env.matches('PORT')", &Context::new().with("env", "NIM_PORT")).unwrap());
    assert!(!evaluate_cel("env.matches('x')", &Context::new().with("env", Value::Null)).unwrap());
}

#[test]
fn test_size_forms() {
    let some = Context::new().with("tags", vec![1, 2]);
    let none = Context::new().with("tags", Vec::<i64>::new());

    assert!(evaluate_cel("size(tags) > 0", &some).unwrap());
    assert!(evaluate_cel("tags.size() > 0", &some).unwrap());
    assert!(!evaluate_cel("size(tags) > 0", &none).unwrap());
    assert!(!evaluate_cel("tags.size() > 0", &none).unwrap());
}

#[test]
fn test_keys_exists() {
    assert!(evaluate_cel("labels.keys().exists(k, k.matches('^nim'))", &labels(&[("nim_version", "1")])).unwrap());
    assert!(!evaluate_cel("labels.keys().exists(k, k.matches('^nim'))", &labels(&[("vendor", "x")])).unwrap());
}

#[test]
fn test_negated_has_keeps_not_equal() {
    assert!(evaluate_cel("!has(labels.missing)", &labels(&[])).unwrap());
    assert_eq!(translate("a != 1 && !has(b)").unwrap(), "a != 1  and  not cel_has(b)");

    let ctx = Context::new().with("a", 2).with("b", Option::<i64>::None);
    assert!(evaluate_cel("a != 1 && !has(b)", &ctx).unwrap());

    let ctx = Context::new().with("a", 1).with("b", Option::<i64>::None);
    assert!(!evaluate_cel("a != 1 && !has(b)", &ctx).unwrap());
}

#[test]
fn test_quoted_literals_compare_as_written() {
    let ctx = Context::new().with("flag", "true").with("mode", "FALSE");
    assert!(evaluate_cel("flag == 'true'", &ctx).unwrap());
    assert!(evaluate_cel("mode == \"FALSE\" && true", &ctx).unwrap());
    assert!(!evaluate_cel("flag == 'True'", &ctx).unwrap());
}

#[test]
fn test_case_insensitive_user_pattern() {
    let ctx = Context::new().with("name", "Meta-NIM");
    assert!(evaluate_cel("name.matches('(?i)nim')", &ctx).unwrap());
}

#[test]
fn test_translations() {
    insta::assert_snapshot!(
        translate("env.keys().exists(k, k.matches('^NIM_')) || TRUE").unwrap(),
        @"any((cel_matches(k, '^NIM_')) for k in env.keys())  or  True"
    );
}

#[test]
fn test_invalid_pattern_is_a_cel_error() {
    let err = cel_matches(&Value::from("anything"), "[invalid(").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Pattern);
    assert!(matches!(err.cause(), CelCause::Evaluation(_)));

    let err = evaluate_cel("x.matches('[invalid(')", &Context::new().with("x", "abc")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Pattern);
    assert_eq!(err.translated(), Some("cel_matches(x, '[invalid(')"));
}

#[test]
fn test_unknown_variable_is_a_cel_error() {
    let err = evaluate_cel("gpu.count > 1", &Context::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownVariable);
    assert!(err.to_string().starts_with("CEL evaluation failed: expr='gpu.count > 1' translated='gpu.count > 1': "));
}

#[test]
fn test_depth_is_configurable() {
    let ctx = Context::new().with("x", 1);
    let nested = format!("{}x{} == 1", "(".repeat(8), ")".repeat(8));

    assert!(CelEvaluator::new(32).evaluate(&nested, &ctx).unwrap());
    assert_eq!(CelEvaluator::new(1).evaluate("[[x]] == [[1]]", &ctx).unwrap_err().kind(), ErrorKind::TooDeep);
}

#[test]
fn test_helpers_never_fail_on_odd_values() {
    assert_eq!(cel_size(&Value::Int(7)), 0);
    assert_eq!(cel_size(&Value::from("abc")), 3);
    assert_eq!(cel_size(&Value::from(vec![1, 2, 3])), 3);
    assert!(cel_has(&Value::from("")));
    assert!(cel_has(&Value::Bool(false)));
    assert!(!cel_has(&Value::Null));
}
