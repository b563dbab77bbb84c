//! Colon-separated string ids.
//!
//! A string id addresses one node in a tree: the root tagname followed by
//! one segment per step. List wrappers contribute their synthetic tagname
//! and a numeric index segment; choice wrappers contribute their synthetic
//! tagname and the chosen alternative.

use std::rc::Rc;

use crate::dict::value::DictValue;
use crate::dtd::schema::Schema;
use crate::error::{Error, Result, TreeError};
use crate::tree::node::Node;

/// Builds (or rebuilds) the path named by `str_id`, vivifying every step
/// with `get_or_add`. When `data` is given the root is populated from it
/// first, so the path resolves against the submitted state.
///
/// Returns the addressed node; the full tree is reachable through
/// [`Node::root_node`].
pub fn resolve_str_id(
    schema: &Rc<Schema>,
    str_id: &str,
    data: Option<&DictValue>,
) -> Result<Node> {
    let mut segments = str_id.split(':');
    let root_tag = segments
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::tree(TreeError::BadPath(str_id.to_string())))?;

    let root = Node::root(schema, root_tag)?;
    if let Some(data) = data {
        root.load_from_dict(data, false)?;
    }

    let mut current = root;
    let mut pending_index: Option<usize> = None;
    for segment in segments {
        // An index segment only makes sense right after a list wrapper.
        if current.is_list() && pending_index.is_none() {
            if let Ok(index) = segment.parse::<usize>() {
                pending_index = Some(index);
                continue;
            }
        }
        current = current.get_or_add(segment, pending_index.take())?;
    }

    // A leaf addressed by id is about to be edited; give it a value.
    if current.is_leaf() && current.text().is_none() {
        current.set_text("")?;
    }
    Ok(current)
}

impl Node {
    /// The string id addressing this node from its root, the inverse of
    /// [`resolve_str_id`].
    pub fn str_id(&self) -> String {
        match self.parent() {
            None => self.tagname(),
            Some(parent) => {
                let prefix = parent.str_id();
                match self.position() {
                    Some(index) => format!("{}:{}:{}", prefix, index, self.tagname()),
                    None => format!("{}:{}", prefix, self.tagname()),
                }
            }
        }
    }
}
