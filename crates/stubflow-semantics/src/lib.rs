//! Shared stubflow semantic tables used by the parser, the flow engine and the CLI.
//!
//! This crate centralizes the reserved words of the expression language, the
//! annotation marker tokens, the intrinsic call names and the control
//! constructs with their option keys, so the grammar and the evaluator cannot
//! drift apart.

/// Key of the merge directive inside a map or a list entry (`<<: (( merge ))`).
pub const DIRECTIVE_KEY: &str = "<<";

/// Prefix shared by the directive key and all control keys (`<<if`, `<<for`, ...).
pub const CONTROL_PREFIX: &str = "<<";

/// Default field used to identify list entries during list merges.
pub const DEFAULT_KEY_NAME: &str = "name";

/// Tag name addressing the root of the current document (`doc::path`).
pub const DOCUMENT_TAG: &str = "doc";

/// Words that can never be used as bare references.
pub const KEYWORDS: &[&str] = &["true", "false", "nil", "merge", "auto", "lambda", "prefer"];

/// Returns true if `word` is reserved by the expression language.
pub fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(&word)
}

/// Canonical annotation markers (`&temporary`, `&local`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MarkerId {
    Temporary,
    Local,
    Inject,
    Default,
    State,
    Template,
    Tag,
}

/// Resolve a marker token (without the leading `&`) to its canonical id.
///
/// `tag` is only the head of the `&tag:<name>` form; the tag name itself is
/// parsed separately.
pub fn resolve_marker(name: &str) -> Option<MarkerId> {
    match name {
        "temporary" | "temp" => Some(MarkerId::Temporary),
        "local" => Some(MarkerId::Local),
        "inject" => Some(MarkerId::Inject),
        "default" => Some(MarkerId::Default),
        "state" => Some(MarkerId::State),
        "template" => Some(MarkerId::Template),
        "tag" => Some(MarkerId::Tag),
        _ => None,
    }
}

/// Canonical spelling of a marker, used when printing expressions.
pub fn marker_name(id: MarkerId) -> &'static str {
    match id {
        MarkerId::Temporary => "temporary",
        MarkerId::Local => "local",
        MarkerId::Inject => "inject",
        MarkerId::Default => "default",
        MarkerId::State => "state",
        MarkerId::Template => "template",
        MarkerId::Tag => "tag",
    }
}

/// Calls that receive their arguments unevaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntrinsicId {
    Merge,
    Catch,
    Sync,
    Valid,
    Defined,
    Require,
    Stub,
}

/// Resolve a call name to an intrinsic, if it is one.
pub fn resolve_intrinsic(name: &str) -> Option<IntrinsicId> {
    match name {
        "merge" => Some(IntrinsicId::Merge),
        "catch" => Some(IntrinsicId::Catch),
        "sync" => Some(IntrinsicId::Sync),
        "valid" => Some(IntrinsicId::Valid),
        "defined" => Some(IntrinsicId::Defined),
        "require" => Some(IntrinsicId::Require),
        "stub" => Some(IntrinsicId::Stub),
        _ => None,
    }
}

/// Name of an intrinsic as written in expressions.
pub fn intrinsic_name(id: IntrinsicId) -> &'static str {
    match id {
        IntrinsicId::Merge => "merge",
        IntrinsicId::Catch => "catch",
        IntrinsicId::Sync => "sync",
        IntrinsicId::Valid => "valid",
        IntrinsicId::Defined => "defined",
        IntrinsicId::Require => "require",
        IntrinsicId::Stub => "stub",
    }
}

/// Built-in control constructs recognized by their `<<name` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlId {
    If,
    Switch,
    Type,
    For,
    Merge,
}

/// Declaration of a control option key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionSpec {
    /// Option name without the `<<` prefix.
    pub name: &'static str,
    /// Template-mode options are captured unevaluated and only flowed when selected.
    pub template: bool,
    /// Whether the control refuses to run without this option.
    pub required: bool,
}

impl OptionSpec {
    const fn new(name: &'static str, template: bool, required: bool) -> Self {
        Self {
            name,
            template,
            required,
        }
    }
}

/// Resolve a control key (with or without the `<<` prefix) to a built-in control.
pub fn resolve_control(key: &str) -> Option<ControlId> {
    match key.strip_prefix(CONTROL_PREFIX).unwrap_or(key) {
        "if" => Some(ControlId::If),
        "switch" => Some(ControlId::Switch),
        "type" => Some(ControlId::Type),
        "for" => Some(ControlId::For),
        "merge" => Some(ControlId::Merge),
        _ => None,
    }
}

/// Name of a built-in control without the `<<` prefix.
pub fn control_name(id: ControlId) -> &'static str {
    match id {
        ControlId::If => "if",
        ControlId::Switch => "switch",
        ControlId::Type => "type",
        ControlId::For => "for",
        ControlId::Merge => "merge",
    }
}

/// Option keys understood by a built-in control.
pub fn control_options(id: ControlId) -> &'static [OptionSpec] {
    match id {
        ControlId::If => IF_OPTIONS,
        ControlId::Switch | ControlId::Type => CASE_OPTIONS,
        ControlId::For => FOR_OPTIONS,
        ControlId::Merge => &[],
    }
}

const IF_OPTIONS: &[OptionSpec] = &[
    OptionSpec::new("then", true, false),
    OptionSpec::new("else", true, false),
];
const CASE_OPTIONS: &[OptionSpec] = &[
    OptionSpec::new("cases", true, false),
    OptionSpec::new("default", true, false),
];
const FOR_OPTIONS: &[OptionSpec] = &[
    OptionSpec::new("do", true, true),
    OptionSpec::new("mapkey", true, false),
];

/// Runtime type names reported by `type(x)` and matched by the `<<type` control.
pub const TYPE_NAMES: &[&str] = &[
    "nil", "bool", "int", "float", "string", "list", "map", "lambda", "template",
];

/// Returns true if `name` is a runtime type name.
pub fn is_type_name(name: &str) -> bool {
    TYPE_NAMES.contains(&name)
}
