//! Schema compiler.
//!
//! Walks the parsed grammar and synthesizes, for every element, an immutable
//! node-type descriptor. Descriptors reference their children by tagname
//! through the shared registry, so recursive DTDs terminate without infinite
//! recursion and without reference cycles.

use std::collections::HashMap;
use std::rc::Rc;

use crate::dtd::content_model::{self, ContentSpec};
use crate::dtd::grammar::{AttributeSpec, Declarations};
use crate::error::{Error, GrammarValidationError, Result};

/// The five node kinds a runtime node can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Leaf,
    Container,
    List,
    Choice,
    ChoiceList,
}

/// The compiled shape of one child slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    /// A plain named, non-repeating child.
    Element,
    /// Zero-or-more repetitions of one child shape.
    List,
    /// A single selection among named alternatives.
    Choice,
    /// A repeatable selection among named alternatives.
    ChoiceList,
}

/// One compiled child slot of an element.
///
/// For list and choice slots `tagname` is the synthetic wrapper name
/// (`list__text`, `choice__a_b`, `list__a_b`), distinct from the tagnames of
/// the items, so that "add a text" and "add the list__text list" are
/// addressable independently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildSpec {
    pub tagname: String,
    pub kind: SlotKind,
    pub required: bool,
    /// The element tagnames this slot can hold: one entry for Element/List
    /// slots, the ordered alternatives for Choice/ChoiceList slots.
    pub items: Vec<String>,
}

impl ChildSpec {
    pub fn is_wrapper(&self) -> bool {
        !matches!(self.kind, SlotKind::Element)
    }

    pub fn single_item(&self) -> Option<&str> {
        match self.items.as_slice() {
            [item] => Some(item),
            _ => None,
        }
    }
}

/// Compiled, immutable description of one DTD element.
#[derive(Debug, Clone)]
pub struct ElementDescriptor {
    pub tagname: String,
    /// `Leaf` or `Container`; the list/choice kinds only exist on slots.
    pub kind: NodeKind,
    pub is_empty_leaf: bool,
    pub attributes: Vec<AttributeSpec>,
    pub children: Vec<Rc<ChildSpec>>,
    /// The source content model, kept for diagnostics.
    pub content_model: String,
}

impl ElementDescriptor {
    pub fn is_leaf(&self) -> bool {
        self.kind == NodeKind::Leaf
    }

    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.iter().map(|a| a.name.as_str())
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.iter().any(|a| a.name == name)
    }

    pub fn child_slot(&self, slot_tag: &str) -> Option<&Rc<ChildSpec>> {
        self.children.iter().find(|c| c.tagname == slot_tag)
    }
}

/// The interned descriptor registry for one parsed grammar.
#[derive(Debug, Clone)]
pub struct Schema {
    elements: HashMap<String, Rc<ElementDescriptor>>,
}

impl Schema {
    /// Compiles a schema out of parsed declarations.
    ///
    /// Fails when a content model references an element that is never
    /// declared, which the underlying grammar scan cannot catch.
    pub fn compile(decls: &Declarations) -> Result<Self> {
        let mut elements = HashMap::new();
        for (tagname, model) in &decls.elements {
            let descriptor = compile_element(tagname, model, decls.attributes_of(tagname));
            elements.insert(tagname.clone(), Rc::new(descriptor));
        }

        let schema = Self { elements };
        for descriptor in schema.elements.values() {
            for slot in &descriptor.children {
                for item in &slot.items {
                    if !schema.elements.contains_key(item) {
                        return Err(Error::grammar_validation(
                            GrammarValidationError::UndeclaredChild {
                                element: descriptor.tagname.clone(),
                                child: item.clone(),
                            },
                        ));
                    }
                }
            }
        }
        Ok(schema)
    }

    pub fn descriptor(&self, tagname: &str) -> Option<Rc<ElementDescriptor>> {
        self.elements.get(tagname).cloned()
    }

    pub fn has_element(&self, tagname: &str) -> bool {
        self.elements.contains_key(tagname)
    }

    pub fn element_names(&self) -> impl Iterator<Item = &str> {
        self.elements.keys().map(String::as_str)
    }
}

fn compile_element(tagname: &str, model: &str, attributes: &[AttributeSpec]) -> ElementDescriptor {
    let mut kind = NodeKind::Container;
    let mut is_empty_leaf = false;
    let mut effective_model = model.to_string();

    if model == "#PCDATA" || model == "EMPTY" {
        kind = NodeKind::Leaf;
        is_empty_leaf = model == "EMPTY";
        effective_model.clear();
    } else if let Some((rewritten, is_empty)) = content_model::rewrite_mixed(model) {
        // Mixed content: the element becomes a leaf whose other alternatives
        // turn into optional trailing children.
        kind = NodeKind::Leaf;
        is_empty_leaf = is_empty;
        effective_model = rewritten;
    }

    let children = if effective_model.is_empty() {
        Vec::new()
    } else {
        content_model::parse_specs(&effective_model)
            .iter()
            .filter(|spec| spec.name != "#PCDATA" && spec.name != "EMPTY")
            .map(|spec| Rc::new(compile_slot(spec)))
            .collect()
    };

    ElementDescriptor {
        tagname: tagname.to_string(),
        kind,
        is_empty_leaf,
        attributes: attributes.to_vec(),
        children,
        content_model: model.to_string(),
    }
}

fn compile_slot(spec: &ContentSpec) -> ChildSpec {
    if spec.is_choice() {
        let items: Vec<String> = spec.alternatives.iter().map(|a| a.name.clone()).collect();
        if spec.repeatable {
            ChildSpec {
                tagname: format!("list__{}", spec.name),
                kind: SlotKind::ChoiceList,
                required: spec.required,
                items,
            }
        } else {
            ChildSpec {
                tagname: format!("choice__{}", spec.name),
                kind: SlotKind::Choice,
                required: spec.required,
                items,
            }
        }
    } else if spec.repeatable {
        ChildSpec {
            tagname: format!("list__{}", spec.name),
            kind: SlotKind::List,
            required: spec.required,
            items: vec![spec.name.clone()],
        }
    } else {
        ChildSpec {
            tagname: spec.name.clone(),
            kind: SlotKind::Element,
            required: spec.required,
            items: vec![spec.name.clone()],
        }
    }
}
