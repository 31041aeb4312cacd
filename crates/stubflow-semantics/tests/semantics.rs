use std::collections::HashSet;

use stubflow_semantics::{
    ControlId, IntrinsicId, MarkerId, TYPE_NAMES, control_name, control_options,
    intrinsic_name, is_keyword, is_type_name, marker_name, resolve_control, resolve_intrinsic,
    resolve_marker,
};

#[test]
fn marker_aliases_resolve_to_canonical_ids() {
    assert_eq!(resolve_marker("temporary"), Some(MarkerId::Temporary));
    assert_eq!(resolve_marker("temp"), Some(MarkerId::Temporary));
    assert_eq!(resolve_marker("tag"), Some(MarkerId::Tag));
    assert_eq!(resolve_marker("dynamic"), None);
}

#[test]
fn canonical_marker_names_round_trip() {
    let ids = [
        MarkerId::Temporary,
        MarkerId::Local,
        MarkerId::Inject,
        MarkerId::Default,
        MarkerId::State,
        MarkerId::Template,
        MarkerId::Tag,
    ];
    for id in ids {
        assert_eq!(resolve_marker(marker_name(id)), Some(id));
    }
}

#[test]
fn intrinsic_names_round_trip() {
    let ids = [
        IntrinsicId::Merge,
        IntrinsicId::Catch,
        IntrinsicId::Sync,
        IntrinsicId::Valid,
        IntrinsicId::Defined,
        IntrinsicId::Require,
        IntrinsicId::Stub,
    ];
    let mut seen = HashSet::new();
    for id in ids {
        let name = intrinsic_name(id);
        assert!(seen.insert(name), "duplicate intrinsic name '{name}'");
        assert_eq!(resolve_intrinsic(name), Some(id));
    }
    assert_eq!(resolve_intrinsic("length"), None);
}

#[test]
fn control_keys_accept_directive_prefix() {
    assert_eq!(resolve_control("<<if"), Some(ControlId::If));
    assert_eq!(resolve_control("for"), Some(ControlId::For));
    assert_eq!(resolve_control("<<"), None);
    assert_eq!(resolve_control("<<then"), None);
    assert_eq!(control_name(ControlId::Switch), "switch");
}

#[test]
fn for_requires_a_template_body() {
    let options = control_options(ControlId::For);
    let body = options.iter().find(|o| o.name == "do").unwrap();
    assert!(body.required);
    assert!(body.template);
    assert!(control_options(ControlId::Merge).is_empty());
}

#[test]
fn branch_options_are_template_mode() {
    for option in control_options(ControlId::If) {
        assert!(option.template, "option '{}' must be lazy", option.name);
        assert!(!option.required);
    }
}

#[test]
fn keywords_and_type_names() {
    assert!(is_keyword("merge"));
    assert!(is_keyword("nil"));
    assert!(!is_keyword("name"));
    assert_eq!(TYPE_NAMES.len(), 9);
    assert!(is_type_name("template"));
    assert!(!is_type_name("number"));
}
