//! The tri-state evaluation result.
//!
//! Every evaluation either resolves to a value, stays pending until a later
//! flow pass, or fails locally. All three carry an [`EvalInfo`] describing
//! how the result should be annotated when it is written back into the tree.

use stubflow_semantics::MarkerId;

use crate::parser::Marker;
use crate::types::{Annotation, Issue, Value};

/// Metadata accompanying an evaluation result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvalInfo {
    pub redirect_path: Option<Vec<String>>,
    pub replace: bool,
    pub merged: bool,
    pub preferred: bool,
    pub key_name: Option<String>,
    pub issue: Option<Issue>,
    /// The result depends on a node that has an error.
    pub failed: bool,
    /// The result is the explicit "no value" sentinel.
    pub undefined: bool,
    pub temporary: bool,
    pub local: bool,
    pub inject: bool,
    pub default: bool,
    pub state: bool,
    /// A bare `&template` marker (only meaningful for merge directives).
    pub template: bool,
    pub tag: Option<String>,
}

impl EvalInfo {
    pub fn with_issue(message: impl Into<String>) -> Self {
        Self {
            issue: Some(Issue::new(message)),
            ..Self::default()
        }
    }

    /// Combine two infos: flags accumulate, later values win.
    pub fn join(mut self, later: EvalInfo) -> EvalInfo {
        self.replace |= later.replace;
        self.merged |= later.merged;
        self.preferred |= later.preferred;
        self.failed |= later.failed;
        self.undefined |= later.undefined;
        self.temporary |= later.temporary;
        self.local |= later.local;
        self.inject |= later.inject;
        self.default |= later.default;
        self.state |= later.state;
        self.template |= later.template;
        if later.redirect_path.is_some() {
            self.redirect_path = later.redirect_path;
        }
        if later.key_name.is_some() {
            self.key_name = later.key_name;
        }
        if later.issue.is_some() {
            self.issue = later.issue;
        }
        if later.tag.is_some() {
            self.tag = later.tag;
        }
        self
    }

    /// Record an annotation marker.
    pub fn add_marker(&mut self, marker: &Marker) {
        match marker {
            Marker::Flag(MarkerId::Temporary) => self.temporary = true,
            Marker::Flag(MarkerId::Local) => self.local = true,
            Marker::Flag(MarkerId::Inject) => self.inject = true,
            Marker::Flag(MarkerId::Default) => self.default = true,
            Marker::Flag(MarkerId::State) => self.state = true,
            Marker::Flag(MarkerId::Template) => self.template = true,
            Marker::Flag(MarkerId::Tag) => {}
            Marker::Tag(name) => self.tag = Some(name.clone()),
        }
    }

    /// Write the flags of this info onto a node annotation.
    pub fn annotate(&self, annotation: &mut Annotation) {
        annotation.temporary |= self.temporary;
        annotation.local |= self.local;
        annotation.inject |= self.inject;
        annotation.default |= self.default;
        annotation.state |= self.state;
        annotation.replace |= self.replace;
        annotation.merged |= self.merged;
        annotation.preferred |= self.preferred;
        if self.redirect_path.is_some() {
            annotation.redirect_path = self.redirect_path.clone();
        }
        if self.key_name.is_some() {
            annotation.key_name = self.key_name.clone();
        }
        if self.tag.is_some() {
            annotation.tag = self.tag.clone();
        }
    }
}

/// A successfully evaluated value.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub value: Value,
    pub info: EvalInfo,
}

impl Resolved {
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            info: EvalInfo::default(),
        }
    }

    pub fn with_info(value: Value, info: EvalInfo) -> Self {
        Self { value, info }
    }

    /// The `~~` sentinel.
    pub fn undefined() -> Self {
        Self {
            value: Value::Nil,
            info: EvalInfo {
                undefined: true,
                ..EvalInfo::default()
            },
        }
    }
}

/// An evaluation that did not produce a value.
#[derive(Debug, Clone, PartialEq)]
pub enum Unresolved {
    /// A dependency is not available yet; retried on the next pass.
    Pending(EvalInfo),
    /// The expression itself failed.
    Error(EvalInfo),
}

impl Unresolved {
    pub fn pending(message: impl Into<String>) -> Self {
        Unresolved::Pending(EvalInfo::with_issue(message))
    }

    pub fn error(message: impl Into<String>) -> Self {
        Unresolved::Error(EvalInfo::with_issue(message))
    }

    pub fn info(&self) -> &EvalInfo {
        match self {
            Unresolved::Pending(info) | Unresolved::Error(info) => info,
        }
    }

    pub fn into_info(self) -> EvalInfo {
        match self {
            Unresolved::Pending(info) | Unresolved::Error(info) => info,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Unresolved::Error(_))
    }

    /// The issue message, or an empty string.
    pub fn message(&self) -> String {
        self.info()
            .issue
            .as_ref()
            .map(|issue| issue.message.clone())
            .unwrap_or_default()
    }

    /// Wrap the current issue as the nested cause of a new message.
    pub fn context(self, message: impl Into<String>) -> Self {
        let wrap = |mut info: EvalInfo| {
            let nested = info.issue.take().into_iter().collect();
            info.issue = Some(Issue::with_nested(message, nested));
            info
        };
        match self {
            Unresolved::Pending(info) => Unresolved::Pending(wrap(info)),
            Unresolved::Error(info) => Unresolved::Error(wrap(info)),
        }
    }
}

/// Result of evaluating an expression.
pub type Evaluation = Result<Resolved, Unresolved>;

/// Fold the unresolved outcomes of independent sub-evaluations into one.
///
/// Any error makes the whole result an error; otherwise it is pending. The
/// individual issues become nested issues of `message`.
pub fn aggregate(message: impl Into<String>, failures: Vec<Unresolved>, sequence: bool) -> Unresolved {
    let is_error = failures.iter().any(Unresolved::is_error);
    let failed = failures.iter().any(|f| f.info().failed);
    let nested = failures
        .into_iter()
        .filter_map(|f| f.into_info().issue)
        .collect();
    let info = EvalInfo {
        issue: Some(Issue {
            message: message.into(),
            nested,
            sequence,
        }),
        failed,
        ..EvalInfo::default()
    };
    if is_error {
        Unresolved::Error(info)
    } else {
        Unresolved::Pending(info)
    }
}
