pub mod document;
pub mod reader;
pub mod writer;
pub mod xpath;

pub use document::{Doctype, DoctypeId, XmlDocument, XmlNode, XmlNodeId, XmlNodeKind};
