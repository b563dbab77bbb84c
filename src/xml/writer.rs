//! XML writer.
//!
//! Serializes a document arena back to text: XML declaration, optional
//! DOCTYPE line, 2-space pretty-printed indentation and a single trailing
//! newline.

use crate::xml::document::{DoctypeId, XmlDocument, XmlNodeId, XmlNodeKind};

/// We expect just `\n` in the XML output.
pub const EOL: &str = "\n";

pub const DEFAULT_ENCODING: &str = "UTF-8";

/// Configuration options for serialization
#[derive(Debug, Clone)]
pub struct WriteConfig {
    /// Number of spaces for indentation
    pub indent_spaces: usize,
    /// Whether to emit the `<?xml ...?>` declaration
    pub declaration: bool,
}

impl Default for WriteConfig {
    fn default() -> Self {
        Self {
            indent_spaces: 2,
            declaration: true,
        }
    }
}

/// Collapses any `\r\n`/`\r` end of line into the single configured EOL.
pub fn update_eol(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push_str(EOL);
            }
            _ => out.push(c),
        }
    }
    out
}

/// Serializes a whole document.
pub fn serialize(doc: &XmlDocument, config: &WriteConfig) -> String {
    let mut out = String::new();
    if config.declaration {
        let encoding = doc.encoding.as_deref().unwrap_or(DEFAULT_ENCODING);
        out.push_str(&format!("<?xml version=\"1.0\" encoding=\"{}\"?>", encoding));
        out.push_str(EOL);
    }
    if let Some(doctype) = &doc.doctype {
        match &doctype.id {
            DoctypeId::System(url) => {
                out.push_str(&format!("<!DOCTYPE {} SYSTEM \"{}\">", doctype.root, url));
            }
            DoctypeId::Public(public, system) => {
                out.push_str(&format!(
                    "<!DOCTYPE {} PUBLIC \"{}\" \"{}\">",
                    doctype.root, public, system
                ));
            }
        }
        out.push_str(EOL);
    }
    for id in &doc.top_level {
        write_node(doc, *id, 0, config, &mut out);
    }
    out
}

/// Serializes one element subtree, pretty-printed with a trailing newline.
pub fn element_to_string(doc: &XmlDocument, id: XmlNodeId, config: &WriteConfig) -> String {
    let mut out = String::new();
    write_node(doc, id, 0, config, &mut out);
    out
}

fn write_node(doc: &XmlDocument, id: XmlNodeId, depth: usize, config: &WriteConfig, out: &mut String) {
    let indent = " ".repeat(depth * config.indent_spaces);
    let Some(node) = doc.node(id) else {
        return;
    };
    match &node.kind {
        XmlNodeKind::Comment(text) => {
            out.push_str(&indent);
            out.push_str(&format!("<!--{}-->", text));
            out.push_str(EOL);
        }
        XmlNodeKind::Text(text) => {
            // Only reached in block context (mixed content); inline text is
            // handled by the owning element.
            if !text.trim().is_empty() {
                out.push_str(&indent);
                out.push_str(&escape_text(text.trim()));
                out.push_str(EOL);
            }
        }
        XmlNodeKind::CData(text) => {
            out.push_str(&indent);
            out.push_str(&format!("<![CDATA[{}]]>", text));
            out.push_str(EOL);
        }
        XmlNodeKind::Element {
            tag,
            attributes,
            children,
        } => {
            let open = open_tag(tag, attributes);
            if children.is_empty() {
                out.push_str(&indent);
                out.push_str(&format!("<{}/>", open));
                out.push_str(EOL);
                return;
            }
            let block = children
                .iter()
                .any(|c| doc.is_element(*c) || doc.is_comment(*c));
            if block {
                out.push_str(&indent);
                out.push_str(&format!("<{}>", open));
                out.push_str(EOL);
                for child in children {
                    if doc.is_blank_text(*child) {
                        continue;
                    }
                    write_node(doc, *child, depth + 1, config, out);
                }
                out.push_str(&indent);
                out.push_str(&format!("</{}>", tag));
                out.push_str(EOL);
            } else {
                // Text-only content stays inline.
                out.push_str(&indent);
                out.push_str(&format!("<{}>", open));
                for child in children {
                    match doc.node(*child).map(|n| &n.kind) {
                        Some(XmlNodeKind::Text(text)) => out.push_str(&escape_text(text)),
                        Some(XmlNodeKind::CData(text)) => {
                            out.push_str(&format!("<![CDATA[{}]]>", text));
                        }
                        _ => {}
                    }
                }
                out.push_str(&format!("</{}>", tag));
                out.push_str(EOL);
            }
        }
    }
}

fn open_tag(tag: &str, attributes: &[(String, String)]) -> String {
    let mut open = tag.to_string();
    for (name, value) in attributes {
        open.push_str(&format!(" {}=\"{}\"", name, escape_attribute(value)));
    }
    open
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attribute(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('"', "&quot;")
}
