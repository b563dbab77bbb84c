pub mod content_model;
pub mod grammar;
pub mod schema;
pub mod source;

pub use content_model::ContentSpec;
pub use grammar::{AttributeSpec, Declarations};
pub use schema::{ChildSpec, ElementDescriptor, NodeKind, Schema, SlotKind};
pub use source::Dtd;
