//! Evaluation environment.
//!
//! A [`Binding`] tells the evaluator where it is: the document snapshot of
//! the current pass, the local scope chain, the structural path used for
//! relative lookups, the output path and the path used for stub lookups.
//! Descending into a child or invoking a lambda always derives a new binding.

use std::collections::BTreeMap;
use std::rc::Rc;

use stubflow_semantics::DIRECTIVE_KEY;

use crate::engine::Engine;
use crate::types::path::{lookup, lookup_keyed};
use crate::types::{Node, Value};

/// Identity of a logical document, stable across the passes of one flow.
///
/// A nested document is identified by the document it was created from and
/// the path it was created at, so repeated nested flows at the same place
/// share an identity.
#[derive(Debug, Clone)]
pub struct DocumentId {
    root: Rc<()>,
    path: Vec<String>,
}

impl DocumentId {
    pub fn new() -> Self {
        Self {
            root: Rc::new(()),
            path: Vec::new(),
        }
    }

    /// Identity of a document nested into this one at `path`.
    pub fn nested(&self, path: &[String]) -> Self {
        let mut nested = self.path.clone();
        nested.push(NESTED_MARK.to_string());
        nested.extend(path.iter().cloned());
        Self {
            root: self.root.clone(),
            path: nested,
        }
    }
}

/// Separates the levels of a nested document identity.
const NESTED_MARK: &str = "*";

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for DocumentId {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.root, &other.root) && self.path == other.path
    }
}

/// The snapshot of a document for one flow pass.
#[derive(Debug)]
pub struct Document {
    pub id: DocumentId,
    pub root: Node,
    /// Prepared stubs, highest precedence first.
    pub stubs: Rc<Vec<Node>>,
    pub state: Option<Rc<Node>>,
    /// Tagged subtrees of this snapshot, by tag name.
    pub tags: BTreeMap<String, Node>,
}

impl Document {
    /// Snapshot `root`, collecting its tagged subtrees.
    pub fn new(id: DocumentId, root: Node, stubs: Rc<Vec<Node>>, state: Option<Rc<Node>>) -> Self {
        let mut tags = BTreeMap::new();
        collect_tags(&root, &mut tags);
        for stub in stubs.iter() {
            collect_tags(stub, &mut tags);
        }
        Self {
            id,
            root,
            stubs,
            state,
            tags,
        }
    }
}

fn collect_tags(node: &Node, tags: &mut BTreeMap<String, Node>) {
    if let Some(tag) = &node.annotation.tag {
        tags.entry(tag.clone()).or_insert_with(|| node.clone());
    }
    match &node.value {
        Value::List(items) => items.iter().for_each(|item| collect_tags(item, tags)),
        Value::Map(map) => map.values().for_each(|child| collect_tags(child, tags)),
        _ => {}
    }
}

/// One layer of local names (lambda parameters, loop variables).
#[derive(Debug, Default, PartialEq)]
pub struct LocalScope {
    pub values: BTreeMap<String, Node>,
    pub parent: Option<Rc<LocalScope>>,
}

impl LocalScope {
    pub fn new(values: BTreeMap<String, Node>, parent: Option<Rc<LocalScope>>) -> Self {
        Self { values, parent }
    }

    /// Look a name up, innermost layer first.
    pub fn get(&self, name: &str) -> Option<&Node> {
        self.values
            .get(name)
            .or_else(|| self.parent.as_ref().and_then(|parent| parent.get(name)))
    }

    /// All visible names, for suggestions.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.values.keys().map(String::as_str).collect();
        if let Some(parent) = &self.parent {
            names.extend(parent.names());
        }
        names
    }
}

/// Lexical environment, owned so lambdas can capture it.
#[derive(Debug, Clone)]
pub struct Scope {
    pub document: Rc<Document>,
    pub locals: Option<Rc<LocalScope>>,
    /// Path of the node whose containers are searched for relative names.
    pub anchor: Vec<String>,
    /// Scope of the document a nested document was created from.
    pub outer: Option<Rc<Scope>>,
}

impl Scope {
    /// The scope of the outermost document.
    pub fn root_scope(&self) -> &Scope {
        match &self.outer {
            Some(outer) => outer.root_scope(),
            None => self,
        }
    }

    /// Identity comparison used for lambda equality.
    pub fn same_as(&self, other: &Scope) -> bool {
        let same_locals = match (&self.locals, &other.locals) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b) || a == b,
            (None, None) => true,
            _ => false,
        };
        let same_outer = match (&self.outer, &other.outer) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b) || a.same_as(b),
            (None, None) => true,
            _ => false,
        };
        self.document.id == other.document.id
            && self.anchor == other.anchor
            && same_locals
            && same_outer
    }
}

/// Everything an expression needs to be evaluated.
#[derive(Debug, Clone)]
pub struct Binding<'e> {
    pub engine: &'e Engine,
    pub scope: Scope,
    /// Output path of the node being flowed.
    pub path: Vec<String>,
    /// Path used to look up stub values, differs from `path` under a redirect.
    pub stub_path: Vec<String>,
    /// Key fields of the template lists along `stub_path`, by position.
    pub stub_keys: Vec<Option<String>>,
    /// Lambda call and nested flow depth.
    pub depth: usize,
}

impl<'e> Binding<'e> {
    /// Binding at the root of a document.
    pub fn new(engine: &'e Engine, scope: Scope, depth: usize) -> Self {
        Self {
            engine,
            scope,
            path: Vec::new(),
            stub_path: Vec::new(),
            stub_keys: Vec::new(),
            depth,
        }
    }

    /// Binding for a child of the current node.
    pub fn child(&self, segment: &str) -> Self {
        let mut child = self.clone();
        child.path.push(segment.to_string());
        child.stub_path.push(segment.to_string());
        child.stub_keys.push(None);
        child.scope.anchor.push(segment.to_string());
        child
    }

    /// Binding for an entry of a list whose entries are identified by `key`.
    ///
    /// Stub lists are searched for the entry by the same key.
    pub fn entry(&self, segment: &str, key: &str) -> Self {
        let mut entry = self.child(segment);
        if let Some(last) = entry.stub_keys.last_mut() {
            *last = Some(key.to_string());
        }
        entry
    }

    /// Binding for the merge directive of the current map or list.
    ///
    /// Relative names see the container's own fields; stub lookups use the
    /// container's path.
    pub fn directive(&self) -> Self {
        let mut directive = self.clone();
        directive.path.push(DIRECTIVE_KEY.to_string());
        directive.scope.anchor.push(DIRECTIVE_KEY.to_string());
        directive
    }

    /// Same position, different stub lookup path.
    pub fn redirected(&self, stub_path: Vec<String>) -> Self {
        Self {
            stub_keys: vec![None; stub_path.len()],
            stub_path,
            ..self.clone()
        }
    }

    /// Same position, evaluating in another scope one level deeper.
    pub fn with_scope(&self, scope: Scope) -> Self {
        Self {
            engine: self.engine,
            scope,
            path: self.path.clone(),
            stub_path: self.stub_path.clone(),
            stub_keys: self.stub_keys.clone(),
            depth: self.depth + 1,
        }
    }

    pub fn document(&self) -> &Document {
        &self.scope.document
    }

    /// Source name used for values created by evaluation.
    pub fn source(&self) -> Rc<str> {
        self.scope.document.root.source.clone()
    }

    pub fn default_key(&self) -> &str {
        self.engine.default_key()
    }

    /// First stub that has a value at `path`.
    ///
    /// List keys of the current position apply where `path` shares a prefix
    /// with `stub_path`.
    pub fn stub_value(&self, path: &[String]) -> Option<&Node> {
        let shared = path
            .iter()
            .zip(&self.stub_path)
            .take_while(|(a, b)| a == b)
            .count();
        let keys = &self.stub_keys[..shared.min(self.stub_keys.len())];
        self.document()
            .stubs
            .iter()
            .find_map(|stub| lookup_keyed(stub, path, keys, self.default_key()))
    }

    /// Stub value that overrides the current node, ignoring `&default` stub nodes.
    pub fn override_value(&self) -> Option<&Node> {
        self.document()
            .stubs
            .iter()
            .filter_map(|stub| lookup_keyed(stub, &self.stub_path, &self.stub_keys, self.default_key()))
            .find(|node| !node.annotation.default)
    }

    /// State document value at the current path.
    pub fn state_value(&self) -> Option<&Node> {
        let state = self.document().state.as_ref()?;
        lookup(state, &self.path, self.default_key())
    }
}
