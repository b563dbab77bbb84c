//! dtdtree: DTD-driven XML tree editing
//!
//! This crate provides functionality to:
//! - Parse DTD grammars and compile them into element schemas
//! - Load XML documents into schema-aware editable trees
//! - Add, delete and address children through lists and choices
//! - Apply flat form submissions back onto a tree and write it out
//!
//! # Examples
//! ```
//! use dtdtree::{load_string, Result};
//!
//! fn example() -> Result<()> {
//!     let tree = load_string(
//!         "<?xml version=\"1.0\"?>\
//!          <!DOCTYPE note SYSTEM \"note.dtd\">\
//!          <note><body>hello</body></note>",
//!         true,
//!     )?;
//!     println!("root: {}", tree.tagname());
//!     Ok(())
//! }
//! ```

pub mod dict;
pub mod dtd;
pub mod error;
pub mod factory;
pub mod test_utils;
pub mod tree;
pub mod validate;
pub mod xml;

// Re-exports
pub use dict::{unflatten_params, DictMap, DictValue};
pub use dtd::source::Dtd;
pub use dtd::Schema;
pub use error::{Error, ErrorKind, Result};
pub use factory::{
    create, get_element_data, get_obj_from_str_id, load_file, load_string, load_string_with_dtd,
    update,
};
pub use tree::{Membership, Node, WriteOptions};
pub use validate::{validate_document, validate_grammar};
