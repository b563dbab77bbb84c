//! Validation gateway.
//!
//! Two entry points: [`validate_grammar`] checks that a DTD text is usable
//! at all (parseable, no duplicate ID attributes, no dangling child
//! references), and [`validate_document`] checks a parsed XML document
//! against a compiled schema with an ordered content-model matcher.

use std::rc::Rc;

use crate::dtd::grammar;
use crate::dtd::schema::{ElementDescriptor, Schema, SlotKind};
use crate::error::{DocumentError, Error, GrammarValidationError, Result};
use crate::xml::document::{XmlDocument, XmlNodeId, XmlNodeKind};

/// Parses and compiles a DTD text, rejecting structurally broken grammars.
pub fn validate_grammar(dtd_text: &str) -> Result<Rc<Schema>> {
    let decls = grammar::parse(dtd_text)?;

    for (element, attributes) in &decls.attributes {
        let mut id_attribute: Option<&str> = None;
        for attribute in attributes {
            if attribute.declared_type == "ID" {
                if id_attribute.is_some() {
                    return Err(Error::grammar_validation(
                        GrammarValidationError::DuplicateIdAttribute {
                            element: element.clone(),
                            attribute: attribute.name.clone(),
                        },
                    ));
                }
                id_attribute = Some(&attribute.name);
            }
        }
    }

    Ok(Rc::new(Schema::compile(&decls)?))
}

/// Validates a whole document against the schema, starting at its root
/// element. Errors carry the source line of the offending element when the
/// document was parsed from text.
pub fn validate_document(doc: &XmlDocument, schema: &Schema) -> Result<()> {
    match doc.root() {
        Some(root) => validate_element(doc, schema, root),
        None => Ok(()),
    }
}

fn validate_element(doc: &XmlDocument, schema: &Schema, id: XmlNodeId) -> Result<()> {
    let tag = doc.tag(id).unwrap_or_default().to_string();
    let line = doc.line(id);
    let descriptor = schema.descriptor(&tag).ok_or_else(|| {
        Error::document(DocumentError::UndeclaredElement(tag.clone())).with_line(line)
    })?;

    validate_attributes(doc, id, &tag, &descriptor)?;

    if !descriptor.is_leaf() {
        for child in doc.children(id).iter().copied() {
            let has_text = matches!(
                doc.node(child).map(|n| &n.kind),
                Some(XmlNodeKind::Text(_) | XmlNodeKind::CData(_))
            );
            if has_text && !doc.is_blank_text(child) {
                return Err(
                    Error::document(DocumentError::UnexpectedText(tag.clone())).with_line(line)
                );
            }
        }
    }

    let child_tags: Vec<&str> = doc
        .element_children(id)
        .filter_map(|child| doc.tag(child))
        .collect();
    if !matches_content_model(&descriptor, &child_tags) {
        return Err(Error::document(DocumentError::Invalid {
            element: tag,
            expected: descriptor.content_model.clone(),
            found: child_tags.join(", "),
        })
        .with_line(line));
    }

    for child in doc.element_children(id) {
        validate_element(doc, schema, child)?;
    }
    Ok(())
}

fn validate_attributes(
    doc: &XmlDocument,
    id: XmlNodeId,
    tag: &str,
    descriptor: &ElementDescriptor,
) -> Result<()> {
    let line = doc.line(id);
    for (name, _) in doc.attributes(id) {
        if !descriptor.has_attribute(name) {
            return Err(Error::document(DocumentError::UndeclaredAttribute {
                element: tag.to_string(),
                attribute: name.clone(),
            })
            .with_line(line));
        }
    }
    for attribute in &descriptor.attributes {
        if attribute.default_rule == "#REQUIRED"
            && !doc.attributes(id).iter().any(|(name, _)| name == &attribute.name)
        {
            return Err(Error::document(DocumentError::MissingAttribute {
                element: tag.to_string(),
                attribute: attribute.name.clone(),
            })
            .with_line(line));
        }
    }
    Ok(())
}

/// Ordered, greedy match of the element children against the compiled
/// slots. Lists consume as many consecutive matching children as possible;
/// every child must be consumed by some slot.
fn matches_content_model(descriptor: &ElementDescriptor, child_tags: &[&str]) -> bool {
    let mut pos = 0;
    for slot in &descriptor.children {
        match slot.kind {
            SlotKind::Element => {
                if child_tags.get(pos).copied() == Some(slot.tagname.as_str()) {
                    pos += 1;
                } else if slot.required {
                    return false;
                }
            }
            SlotKind::Choice => {
                let matched = child_tags
                    .get(pos)
                    .is_some_and(|tag| slot.items.iter().any(|item| item == tag));
                if matched {
                    pos += 1;
                } else if slot.required {
                    return false;
                }
            }
            SlotKind::List | SlotKind::ChoiceList => {
                let mut consumed = 0;
                while child_tags
                    .get(pos)
                    .is_some_and(|tag| slot.items.iter().any(|item| item == tag))
                {
                    pos += 1;
                    consumed += 1;
                }
                if slot.required && consumed == 0 {
                    return false;
                }
            }
        }
    }
    pos == child_tags.len()
}
