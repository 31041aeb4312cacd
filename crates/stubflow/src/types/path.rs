//! Path navigation over document trees.
//!
//! A path is a list of segments. Map segments are field names; list segments
//! are either an index (`3`, `[3]`, `-1`) or the identity of an entry (the
//! value of its key field, `name` unless the list says otherwise).

use std::ops::Range;

use super::{Node, Value};

/// Dotted form of a path, as shown in diagnostics.
pub fn render_path(path: &[String]) -> String {
    path.join(".")
}

/// Parse an index segment: `3`, `[3]`, `-1` or `[-1]`.
pub fn parse_index(segment: &str) -> Option<i64> {
    let inner = segment
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .unwrap_or(segment);
    let digits = inner.strip_prefix('-').unwrap_or(inner);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    inner.parse().ok()
}

/// Resolve a possibly negative index against a length.
pub fn resolve_index(len: usize, index: i64) -> Option<usize> {
    let resolved = if index < 0 {
        len as i64 + index
    } else {
        index
    };
    (0..len as i64).contains(&resolved).then_some(resolved as usize)
}

/// Inclusive slice bounds `[start..end]` turned into a range.
///
/// Missing bounds default to the first and last element.
pub fn slice_range(len: usize, start: Option<i64>, end: Option<i64>) -> Option<Range<usize>> {
    if len == 0 && start.is_none() && end.is_none() {
        return Some(0..0);
    }
    let first = resolve_index(len, start.unwrap_or(0))?;
    let last = resolve_index(len, end.unwrap_or(-1))?;
    (first <= last + 1).then_some(first..last + 1)
}

/// The field identifying entries of a list node.
pub fn key_name<'a>(list: &'a Node, default_key: &'a str) -> &'a str {
    list.annotation.key_name.as_deref().unwrap_or(default_key)
}

/// Identity of a list entry, if it has one.
pub fn entry_identity(entry: &Node, key: &str) -> Option<String> {
    match &entry.get(key)?.value {
        Value::String(s) => Some(s.clone()),
        Value::Int(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Path segment used for a list entry: its identity or `[index]`.
pub fn entry_segment(entry: &Node, index: usize, key: &str) -> String {
    entry_identity(entry, key).unwrap_or_else(|| format!("[{index}]"))
}

/// Take one step from `node`.
pub fn step<'a>(node: &'a Node, segment: &str, default_key: &str) -> Option<&'a Node> {
    step_by(node, segment, key_name(node, default_key))
}

/// Take one step, matching list entries by the field `key`.
fn step_by<'a>(node: &'a Node, segment: &str, key: &str) -> Option<&'a Node> {
    match &node.value {
        Value::Map(map) => map.get(segment),
        Value::List(items) => {
            if let Some(index) = parse_index(segment) {
                return resolve_index(items.len(), index).map(|i| &items[i]);
            }
            items
                .iter()
                .find(|entry| entry_identity(entry, key).as_deref() == Some(segment))
        }
        _ => None,
    }
}

/// Follow a whole path from `root`.
pub fn lookup<'a>(root: &'a Node, path: &[String], default_key: &str) -> Option<&'a Node> {
    path.iter()
        .try_fold(root, |node, segment| step(node, segment, default_key))
}

/// Follow a path whose list steps may carry the key field of another list.
///
/// A key at `keys[i]` decides which entry `path[i]` names, overriding the
/// key of the list being stepped through.
pub fn lookup_keyed<'a>(
    root: &'a Node,
    path: &[String],
    keys: &[Option<String>],
    default_key: &str,
) -> Option<&'a Node> {
    path.iter()
        .enumerate()
        .try_fold(root, |node, (index, segment)| match keys.get(index).and_then(Option::as_deref) {
            Some(key) => step_by(node, segment, key),
            None => step(node, segment, default_key),
        })
}

/// Set a map field at `path`, creating nothing on the way.
///
/// Returns false if the parent does not exist or is not a map.
pub fn insert_at(root: &mut Node, path: &[String], node: Node) -> bool {
    let Some((last, parents)) = path.split_last() else {
        return false;
    };
    let mut current = root;
    for segment in parents {
        let next = match &mut current.value {
            Value::Map(map) => map.get_mut(segment),
            Value::List(items) => match parse_index(segment) {
                Some(index) => resolve_index(items.len(), index).map(|i| &mut items[i]),
                None => None,
            },
            _ => None,
        };
        match next {
            Some(next) => current = next,
            None => return false,
        }
    }
    match &mut current.value {
        Value::Map(map) => {
            map.insert(last.clone(), node);
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::rc::Rc;

    use super::*;

    fn named(name: &str, value: i64) -> Node {
        let source: Rc<str> = Rc::from("test");
        let mut map = BTreeMap::new();
        map.insert(
            "name".to_string(),
            Node::new(Value::from(name), source.clone()),
        );
        map.insert("value".to_string(), Node::new(Value::Int(value), source.clone()));
        Node::new(Value::Map(map), source)
    }

    #[test]
    fn index_forms() {
        assert_eq!(parse_index("3"), Some(3));
        assert_eq!(parse_index("[3]"), Some(3));
        assert_eq!(parse_index("-1"), Some(-1));
        assert_eq!(parse_index("[-2]"), Some(-2));
        assert_eq!(parse_index("alice"), None);
        assert_eq!(parse_index("-"), None);
        assert_eq!(parse_index("[]"), None);
    }

    #[test]
    fn negative_indices_count_from_the_end() {
        assert_eq!(resolve_index(3, -1), Some(2));
        assert_eq!(resolve_index(3, -4), None);
        assert_eq!(resolve_index(3, 3), None);
    }

    #[test]
    fn slices_are_inclusive() {
        assert_eq!(slice_range(5, Some(1), Some(3)), Some(1..4));
        assert_eq!(slice_range(5, None, Some(-2)), Some(0..4));
        assert_eq!(slice_range(5, Some(2), None), Some(2..5));
        assert_eq!(slice_range(0, None, None), Some(0..0));
        assert_eq!(slice_range(5, Some(7), None), None);
    }

    #[test]
    fn list_steps_by_name_or_index() {
        let source: Rc<str> = Rc::from("test");
        let list = Node::new(
            Value::List(vec![named("alice", 1), named("bob", 2)]),
            source,
        );
        let bob = step(&list, "bob", "name").unwrap();
        assert_eq!(bob.get("value").unwrap().value, Value::Int(2));
        let first = step(&list, "[0]", "name").unwrap();
        assert_eq!(entry_segment(first, 0, "name"), "alice");
        assert!(step(&list, "carol", "name").is_none());
    }

    #[test]
    fn keyed_lookup_uses_the_given_key_field() {
        let source: Rc<str> = Rc::from("test");
        let mut list = Node::new(
            Value::List(vec![named("alice", 1), named("bob", 2)]),
            source,
        );
        list.annotation.key_name = Some("value".to_string());
        let path = vec!["bob".to_string()];
        assert!(lookup(&list, &path, "name").is_none());
        let bob = lookup_keyed(&list, &path, &[Some("name".to_string())], "name").unwrap();
        assert_eq!(bob.get("value").unwrap().value, Value::Int(2));
        assert!(lookup_keyed(&list, &path, &[None], "name").is_none());
    }
}
