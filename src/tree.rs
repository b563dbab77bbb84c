pub mod node;
pub mod path;

pub use node::{Membership, Node, RootInfo, WriteOptions};
