use super::Node;

/// A captured subtree.
///
/// The node is kept exactly as written; substituting the template flows a
/// copy of it in the binding of the substitution site.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateValue {
    pub node: Node,
}

impl TemplateValue {
    pub fn new(node: Node) -> Self {
        Self { node }
    }
}
