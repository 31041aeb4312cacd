//! Diagnostics for nodes left unresolved after the fixpoint.

use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::Serialize;
use stubflow_semantics::{CONTROL_PREFIX, resolve_control};

use crate::types::path::{entry_segment, key_name, render_path};
use crate::types::{Issue, Node, Value};

/// Why a node is still unresolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedKind {
    /// The node's own expression failed.
    LocalError,
    /// The node depends on a node that failed.
    DependsOnError,
    /// A dependency never became available, e.g. in a cycle.
    Unresolved,
}

impl UnresolvedKind {
    /// Classification symbol used in rendered reports.
    pub fn symbol(self) -> char {
        match self {
            UnresolvedKind::LocalError => '-',
            UnresolvedKind::DependsOnError => '*',
            UnresolvedKind::Unresolved => '@',
        }
    }
}

/// One unresolved node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedEntry {
    /// Dotted path of the node.
    pub path: String,
    /// The expression as written, `(( ... ))`.
    pub expression: String,
    /// Name of the document the node came from.
    pub source: String,
    pub kind: UnresolvedKind,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub nested: Vec<Issue>,
}

/// All unresolved nodes of a tree, sorted by path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UnresolvedReport {
    pub entries: Vec<UnresolvedEntry>,
}

impl UnresolvedReport {
    /// Collect the unresolved nodes of `root`.
    pub fn collect(root: &Node, default_key: &str) -> Self {
        let mut entries = Vec::new();
        let mut path = Vec::new();
        collect(root, &mut path, default_key, &mut entries);
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Add the entries of `other` for nodes not reported yet.
    ///
    /// A node is identified by its source and path.
    pub fn absorb(&mut self, other: UnresolvedReport) {
        for entry in other.entries {
            let known = self
                .entries
                .iter()
                .any(|seen| seen.source == entry.source && seen.path == entry.path);
            if !known {
                self.entries.push(entry);
            }
        }
        self.entries.sort_by(|a, b| a.path.cmp(&b.path));
    }
}

fn collect(node: &Node, path: &mut Vec<String>, default_key: &str, entries: &mut Vec<UnresolvedEntry>) {
    let expression = match &node.value {
        Value::Expression(expr) => Some(format!("(( {expr} ))")),
        Value::String(text) if node.annotation.has_error => Some(text.clone()),
        Value::Map(_) | Value::List(_) if node.annotation.issue.is_some() => Some(describe(node)),
        _ => None,
    };
    let leaf = !matches!(node.value, Value::Map(_) | Value::List(_));
    if let Some(expression) = expression {
        let kind = if node.annotation.has_error {
            UnresolvedKind::LocalError
        } else if node.annotation.failed {
            UnresolvedKind::DependsOnError
        } else {
            UnresolvedKind::Unresolved
        };
        let (message, nested) = match &node.annotation.issue {
            Some(issue) => (issue.message.clone(), issue.nested.clone()),
            None => (String::new(), Vec::new()),
        };
        entries.push(UnresolvedEntry {
            path: render_path(path),
            expression,
            source: node.source.to_string(),
            kind,
            message,
            nested,
        });
        if leaf {
            return;
        }
    }
    match &node.value {
        Value::Map(map) => {
            for (key, child) in map {
                path.push(key.clone());
                collect(child, path, default_key, entries);
                path.pop();
            }
        }
        Value::List(items) => {
            let key = key_name(node, default_key);
            for (index, item) in items.iter().enumerate() {
                path.push(entry_segment(item, index, key));
                collect(item, path, default_key, entries);
                path.pop();
            }
        }
        _ => {}
    }
}

/// Short form of a failing map or list: its control or directive key.
fn describe(node: &Node) -> String {
    match &node.value {
        Value::Map(map) => map
            .iter()
            .find(|(key, _)| {
                key.strip_prefix(CONTROL_PREFIX)
                    .is_some_and(|name| resolve_control(name).is_some())
            })
            .or_else(|| map.iter().find(|(key, _)| key.starts_with(CONTROL_PREFIX)))
            .map_or_else(
                || "{...}".to_string(),
                |(key, value)| match &value.value {
                    Value::String(text) => format!("{key}: {text}"),
                    other => format!("{key}: {other}"),
                },
            ),
        _ => "[...]".to_string(),
    }
}

impl Display for UnresolvedEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(
            f,
            "\t{}\tin {}\t{}\t{}{}",
            self.expression,
            self.source,
            self.path,
            self.kind.symbol(),
            self.message
        )?;
        for issue in &self.nested {
            write_issue(f, issue, 1)?;
        }
        Ok(())
    }
}

fn write_issue(f: &mut Formatter<'_>, issue: &Issue, level: usize) -> FmtResult {
    write!(f, "\n\t\t\t\t{}{}", "  ".repeat(level), issue.message)?;
    for nested in &issue.nested {
        write_issue(f, nested, level + 1)?;
    }
    Ok(())
}

impl Display for UnresolvedReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{entry}")?;
        }
        Ok(())
    }
}

