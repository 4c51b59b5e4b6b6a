pub mod hospital;
pub mod node;
pub mod registry;
pub mod template;

pub use node::{OptionNode, QuestionKind, QuestionNode};
pub use registry::Registry;

use crate::session::SessionData;

/// Id of the question every dialogue starts from.
pub const ROOT_ID: &str = "main";

/// Options of `node` currently offered to the user, in declaration order.
/// Pure: the result depends only on the node and the session.
pub fn filter_options<'a>(node: &'a QuestionNode, session: &SessionData) -> Vec<&'a OptionNode> {
    node.options
        .iter()
        .filter(|option| option.is_visible(session))
        .collect()
}
