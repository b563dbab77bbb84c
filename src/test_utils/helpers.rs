//! Helper functions shared across the test suites.

use std::path::PathBuf;
use std::rc::Rc;

use crate::dtd::schema::Schema;
use crate::dtd::source::Dtd;
use crate::factory;
use crate::tree::node::Node;
use crate::validate;

/// Parses and compiles a known-good test grammar.
pub fn compile_schema(dtd: &str) -> Rc<Schema> {
    validate::validate_grammar(dtd).expect("test grammar should compile")
}

/// Loads and validates a document against an inline grammar.
pub fn load(xml: &str, dtd: &str) -> Node {
    factory::load_string_with_dtd(xml, &Dtd::from_text(dtd), true)
        .expect("test document should load")
}

/// Creates a bare tree against an inline grammar.
pub fn create(tagname: &str, dtd: &str) -> Node {
    factory::create(tagname, &Dtd::from_text(dtd)).expect("test tree should build")
}

/// A per-process temp file path, cleaned up by the caller.
pub fn tmp_file_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("dtdtree-{}-{}", std::process::id(), name))
}
