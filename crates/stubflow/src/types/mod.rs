mod annotation;
mod document;
mod lambda;
mod node;
pub mod path;
mod template;

pub use annotation::{Annotation, Issue};
pub use document::DocumentError;
pub use lambda::LambdaValue;
pub use node::{Node, Value, is_embedded_expression};
pub use template::TemplateValue;
