use super::ControlContext;
use crate::interpreter::Unresolved;
use crate::types::Node;

/// `<<if: cond`, `<<then: a`, `<<else: b`.
///
/// Without the selected branch the map is removed.
pub(super) fn if_control(context: &ControlContext<'_, '_>) -> Result<Option<Node>, Unresolved> {
    let branch = if context.value.value.is_truthy() {
        "then"
    } else {
        "else"
    };
    Ok(context.option(branch).cloned())
}
