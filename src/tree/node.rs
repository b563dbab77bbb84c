//! The generic runtime tree node.
//!
//! One `Node` type serves every element of every compiled schema: behavior
//! is driven by the interned [`ElementDescriptor`] and by the slot the node
//! occupies, with an explicit `membership` field instead of type ancestry.
//! Parent links are weak back-references; a tree's lifetime is strictly
//! determined by root ownership of children.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::rc::{Rc, Weak};

use crate::dtd::schema::{ChildSpec, ElementDescriptor, NodeKind, Schema, SlotKind};
use crate::dict::value::DictValue;
use crate::error::{ConfigError, Error, IoError, Result, TreeError};
use crate::validate;
use crate::xml::document::{Doctype, DoctypeId, XmlDocument, XmlNodeId};
use crate::xml::writer::{self, WriteConfig};
use crate::xml::xpath;

/// How a node sits inside its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    /// Root, or a plain container/wrapper slot.
    Plain,
    /// An item of a list wrapper.
    InList,
    /// The chosen alternative of a choice wrapper.
    InChoice,
}

/// State carried only by the document root.
#[derive(Debug, Clone, Default)]
pub struct RootInfo {
    pub filename: Option<String>,
    pub dtd_url: Option<String>,
    pub dtd_str: Option<String>,
    pub encoding: Option<String>,
}

/// Options for [`Node::write`].
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    pub filename: Option<String>,
    pub encoding: Option<String>,
    pub dtd_url: Option<String>,
    pub dtd_str: Option<String>,
    pub validate: bool,
}

/// One entry of a list wrapper. `Empty` is a placeholder occupying a slot
/// solely to preserve positional indices for sparse data; it owns no
/// descriptor and is never serialized.
#[derive(Debug, Clone)]
enum ListEntry {
    Present(Node),
    Empty,
}

#[derive(Debug, Clone)]
enum NodeContent {
    Leaf { text: Option<String>, cdata: bool },
    Container { slots: HashMap<String, Node> },
    List { entries: Vec<ListEntry> },
    Choice { chosen: Option<Node> },
}

#[derive(Debug)]
struct NodeData {
    tagname: String,
    /// `None` for list/choice wrapper nodes.
    descriptor: Option<Rc<ElementDescriptor>>,
    slot: Rc<ChildSpec>,
    schema: Rc<Schema>,
    parent: Option<WeakNode>,
    membership: Membership,
    content: NodeContent,
    /// Ordered attribute pairs; `None` until the first attribute is set.
    attributes: Option<Vec<(String, String)>>,
    comment: Option<String>,
    sourceline: Option<usize>,
    root_info: Option<RootInfo>,
    /// Backing XML element, set by `load_from_xml`.
    xml_id: Option<XmlNodeId>,
    /// Retained parsed document and the id-to-node table, root only.
    xml_doc: Option<Rc<XmlDocument>>,
    xml_index: Option<HashMap<XmlNodeId, WeakNode>>,
}

/// A shared handle to one tree node.
#[derive(Clone)]
pub struct Node {
    inner: Rc<RefCell<NodeData>>,
}

#[derive(Debug, Clone)]
pub struct WeakNode {
    inner: Weak<RefCell<NodeData>>,
}

impl WeakNode {
    pub fn upgrade(&self) -> Option<Node> {
        self.inner.upgrade().map(|inner| Node { inner })
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.inner.borrow();
        f.debug_struct("Node")
            .field("tagname", &data.tagname)
            .field("membership", &data.membership)
            .finish()
    }
}

/// What a tagname resolves to among a node's addressable children.
enum AddTarget {
    /// A plain named child.
    Plain(Rc<ChildSpec>),
    /// The list/choice wrapper itself, addressed by its synthetic name.
    Wrapper(Rc<ChildSpec>),
    /// An item inside a list or choice-list slot.
    ListItem(Rc<ChildSpec>, String),
    /// One alternative of a choice slot.
    ChoiceItem(Rc<ChildSpec>, String),
}

impl Node {
    // ------------------------------------------------------------------
    // Construction

    /// Creates a bare root node for the given element of the schema.
    pub fn root(schema: &Rc<Schema>, tagname: &str) -> Result<Self> {
        let descriptor = schema.descriptor(tagname).ok_or_else(|| {
            Error::grammar(crate::error::GrammarError::UnknownElement(
                tagname.to_string(),
            ))
        })?;
        let slot = Rc::new(ChildSpec {
            tagname: tagname.to_string(),
            kind: SlotKind::Element,
            required: true,
            items: vec![tagname.to_string()],
        });
        let node = Self::new_element(schema, &descriptor, &slot, Membership::Plain, None);
        node.inner.borrow_mut().root_info = Some(RootInfo::default());
        Ok(node)
    }

    fn new_element(
        schema: &Rc<Schema>,
        descriptor: &Rc<ElementDescriptor>,
        slot: &Rc<ChildSpec>,
        membership: Membership,
        parent: Option<WeakNode>,
    ) -> Self {
        let content = if descriptor.is_leaf() {
            NodeContent::Leaf {
                text: None,
                cdata: false,
            }
        } else {
            NodeContent::Container {
                slots: HashMap::new(),
            }
        };
        Self::from_data(NodeData {
            tagname: descriptor.tagname.clone(),
            descriptor: Some(descriptor.clone()),
            slot: slot.clone(),
            schema: schema.clone(),
            parent,
            membership,
            content,
            attributes: None,
            comment: None,
            sourceline: None,
            root_info: None,
            xml_id: None,
            xml_doc: None,
            xml_index: None,
        })
    }

    fn new_wrapper(schema: &Rc<Schema>, slot: &Rc<ChildSpec>, parent: Option<WeakNode>) -> Self {
        let content = match slot.kind {
            SlotKind::Choice => NodeContent::Choice { chosen: None },
            _ => NodeContent::List {
                entries: Vec::new(),
            },
        };
        Self::from_data(NodeData {
            tagname: slot.tagname.clone(),
            descriptor: None,
            slot: slot.clone(),
            schema: schema.clone(),
            parent,
            membership: Membership::Plain,
            content,
            attributes: None,
            comment: None,
            sourceline: None,
            root_info: None,
            xml_id: None,
            xml_doc: None,
            xml_index: None,
        })
    }

    fn from_data(data: NodeData) -> Self {
        Self {
            inner: Rc::new(RefCell::new(data)),
        }
    }

    pub fn downgrade(&self) -> WeakNode {
        WeakNode {
            inner: Rc::downgrade(&self.inner),
        }
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    // ------------------------------------------------------------------
    // Accessors

    pub fn tagname(&self) -> String {
        self.inner.borrow().tagname.clone()
    }

    /// The five-way kind of this node.
    pub fn kind(&self) -> NodeKind {
        let data = self.inner.borrow();
        match &data.descriptor {
            Some(descriptor) => descriptor.kind,
            None => match data.slot.kind {
                SlotKind::List => NodeKind::List,
                SlotKind::Choice => NodeKind::Choice,
                SlotKind::ChoiceList => NodeKind::ChoiceList,
                SlotKind::Element => NodeKind::Container,
            },
        }
    }

    pub fn is_wrapper(&self) -> bool {
        self.inner.borrow().descriptor.is_none()
    }

    pub fn is_list(&self) -> bool {
        matches!(self.kind(), NodeKind::List | NodeKind::ChoiceList)
    }

    pub fn is_leaf(&self) -> bool {
        self.kind() == NodeKind::Leaf
    }

    pub fn is_empty_leaf(&self) -> bool {
        let data = self.inner.borrow();
        data.descriptor
            .as_ref()
            .is_some_and(|descriptor| descriptor.is_empty_leaf)
    }

    pub fn membership(&self) -> Membership {
        self.inner.borrow().membership
    }

    pub fn required(&self) -> bool {
        self.inner.borrow().slot.required
    }

    pub fn schema(&self) -> Rc<Schema> {
        self.inner.borrow().schema.clone()
    }

    pub fn descriptor(&self) -> Option<Rc<ElementDescriptor>> {
        self.inner.borrow().descriptor.clone()
    }

    pub fn text(&self) -> Option<String> {
        match &self.inner.borrow().content {
            NodeContent::Leaf { text, .. } => text.clone(),
            _ => None,
        }
    }

    pub fn is_cdata(&self) -> bool {
        matches!(
            &self.inner.borrow().content,
            NodeContent::Leaf { cdata: true, .. }
        )
    }

    pub fn set_cdata(&self, cdata: bool) {
        if let NodeContent::Leaf { cdata: c, .. } = &mut self.inner.borrow_mut().content {
            *c = cdata;
        }
    }

    pub fn comment(&self) -> Option<String> {
        self.inner.borrow().comment.clone()
    }

    pub fn set_comment(&self, comment: Option<String>) {
        self.inner.borrow_mut().comment = comment;
    }

    pub fn sourceline(&self) -> Option<usize> {
        self.inner.borrow().sourceline
    }

    pub fn attribute_values(&self) -> Vec<(String, String)> {
        self.inner.borrow().attributes.clone().unwrap_or_default()
    }

    pub fn attribute(&self, name: &str) -> Option<String> {
        self.inner.borrow().attributes.as_ref().and_then(|attrs| {
            attrs
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.clone())
        })
    }

    pub fn parent(&self) -> Option<Self> {
        self.inner.borrow().parent.as_ref().and_then(WeakNode::upgrade)
    }

    /// The logical element parent, skipping list/choice wrappers.
    pub fn logical_parent(&self) -> Option<Self> {
        let parent = self.parent()?;
        if parent.is_wrapper() {
            parent.parent()
        } else {
            Some(parent)
        }
    }

    pub fn root_node(&self) -> Self {
        let mut current = self.clone();
        while let Some(parent) = current.parent() {
            current = parent;
        }
        current
    }

    pub fn is_root(&self) -> bool {
        self.parent().is_none()
    }

    pub fn root_info(&self) -> Option<RootInfo> {
        self.inner.borrow().root_info.clone()
    }

    pub fn update_root_info(&self, update: impl FnOnce(&mut RootInfo)) {
        let mut data = self.inner.borrow_mut();
        let info = data.root_info.get_or_insert_with(RootInfo::default);
        update(info);
    }

    /// If the parent is a list, returns the position of self.
    pub fn position(&self) -> Option<usize> {
        let parent = self.parent()?;
        if !parent.is_list() {
            return None;
        }
        let data = parent.inner.borrow();
        if let NodeContent::List { entries } = &data.content {
            entries.iter().position(|entry| match entry {
                ListEntry::Present(node) => node.ptr_eq(self),
                ListEntry::Empty => false,
            })
        } else {
            None
        }
    }

    // ------------------------------------------------------------------
    // Text and attributes

    pub fn set_text(&self, value: &str) -> Result<()> {
        let mut data = self.inner.borrow_mut();
        let is_empty_leaf = data
            .descriptor
            .as_ref()
            .is_some_and(|descriptor| descriptor.is_empty_leaf);
        match &mut data.content {
            NodeContent::Leaf { text, .. } => {
                if is_empty_leaf && !value.is_empty() {
                    let tagname = data.tagname.clone();
                    return Err(Error::tree(TreeError::ForbiddenValue(tagname)));
                }
                *text = Some(value.to_string());
                Ok(())
            }
            _ => Err(Error::tree(TreeError::NotATextElement(
                data.tagname.clone(),
            ))),
        }
    }

    /// Strict attribute setter: the name must be declared in the schema.
    pub fn add_attribute(&self, name: &str, value: &str) -> Result<()> {
        let declared = self
            .inner
            .borrow()
            .descriptor
            .as_ref()
            .is_some_and(|descriptor| descriptor.has_attribute(name));
        if !declared {
            return Err(Error::tree(TreeError::InvalidAttribute {
                element: self.tagname(),
                attribute: name.to_string(),
            }));
        }
        let mut data = self.inner.borrow_mut();
        let attributes = data.attributes.get_or_insert_with(Vec::new);
        match attributes.iter_mut().find(|(n, _)| n == name) {
            Some(pair) => pair.1 = value.to_string(),
            None => attributes.push((name.to_string(), value.to_string())),
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Addressing

    fn resolve(&self, tagname: &str) -> Option<AddTarget> {
        let data = self.inner.borrow();
        let descriptor = data.descriptor.as_ref()?;
        for slot in &descriptor.children {
            match slot.kind {
                SlotKind::Element => {
                    if slot.tagname == tagname {
                        return Some(AddTarget::Plain(slot.clone()));
                    }
                }
                SlotKind::List => {
                    if slot.tagname == tagname {
                        return Some(AddTarget::Wrapper(slot.clone()));
                    }
                    if slot.items.iter().any(|item| item == tagname) {
                        return Some(AddTarget::ListItem(slot.clone(), tagname.to_string()));
                    }
                }
                SlotKind::Choice => {
                    if slot.tagname == tagname {
                        return Some(AddTarget::Wrapper(slot.clone()));
                    }
                    if slot.items.iter().any(|item| item == tagname) {
                        return Some(AddTarget::ChoiceItem(slot.clone(), tagname.to_string()));
                    }
                }
                SlotKind::ChoiceList => {
                    if slot.tagname == tagname {
                        return Some(AddTarget::Wrapper(slot.clone()));
                    }
                    if slot.items.iter().any(|item| item == tagname) {
                        return Some(AddTarget::ListItem(slot.clone(), tagname.to_string()));
                    }
                }
            }
        }
        None
    }

    /// Non-throwing probe equivalent to attempting `add`.
    pub fn is_addable(&self, tagname: &str) -> bool {
        if self.is_wrapper() {
            return match self.parent() {
                Some(parent) => parent.is_addable(tagname),
                None => false,
            };
        }
        match self.resolve(tagname) {
            None => false,
            Some(AddTarget::Plain(slot)) => self.slot_value(&slot.tagname).is_none(),
            Some(AddTarget::Wrapper(_) | AddTarget::ListItem(..)) => true,
            Some(AddTarget::ChoiceItem(slot, item)) => {
                match self.slot_value(&slot.tagname).and_then(|w| w.chosen()) {
                    Some(chosen) => chosen.tagname() == item,
                    None => true,
                }
            }
        }
    }

    fn slot_value(&self, slot_tag: &str) -> Option<Self> {
        match &self.inner.borrow().content {
            NodeContent::Container { slots } => slots.get(slot_tag).cloned(),
            _ => None,
        }
    }

    fn set_slot_value(&self, slot_tag: &str, value: Self) {
        if let NodeContent::Container { slots } = &mut self.inner.borrow_mut().content {
            slots.insert(slot_tag.to_string(), value);
        }
    }

    fn remove_slot(&self, child: &Self) {
        if let NodeContent::Container { slots } = &mut self.inner.borrow_mut().content {
            slots.retain(|_, v| !v.ptr_eq(child));
        }
    }

    /// Adds a child addressed by `tagname`, optionally setting leaf text and,
    /// for list items, inserting at `index`.
    pub fn add(&self, tagname: &str) -> Result<Self> {
        self.add_with(tagname, None, None)
    }

    pub fn add_text(&self, tagname: &str, value: &str) -> Result<Self> {
        self.add_with(tagname, Some(value), None)
    }

    pub fn add_at(&self, tagname: &str, index: usize) -> Result<Self> {
        self.add_with(tagname, None, Some(index))
    }

    pub fn add_with(
        &self,
        tagname: &str,
        value: Option<&str>,
        index: Option<usize>,
    ) -> Result<Self> {
        if self.is_wrapper() {
            // The logic to add an element to a list or choice is on the
            // parent element.
            let parent = self
                .parent()
                .ok_or_else(|| Error::tree(TreeError::InvalidChild(tagname.to_string())))?;
            return parent.add_with(tagname, value, index);
        }

        let target = self
            .resolve(tagname)
            .ok_or_else(|| Error::tree(TreeError::InvalidChild(tagname.to_string())))?;

        match target {
            AddTarget::Plain(slot) => {
                if self.slot_value(&slot.tagname).is_some() {
                    return Err(Error::tree(TreeError::AlreadyDefined {
                        existing: tagname.to_string(),
                        requested: tagname.to_string(),
                    }));
                }
                let child = self.create_element(&slot, tagname, Membership::Plain, self)?;
                self.set_slot_value(&slot.tagname, child.clone());
                if let Some(value) = value {
                    child.set_text(value)?;
                }
                Ok(child)
            }
            AddTarget::Wrapper(slot) => {
                if value.is_some() {
                    return Err(Error::tree(TreeError::NotATextElement(
                        tagname.to_string(),
                    )));
                }
                Ok(self.get_or_create_wrapper(&slot))
            }
            AddTarget::ListItem(slot, item) => {
                let wrapper = self.get_or_create_wrapper(&slot);
                let child = self.create_element(&slot, &item, Membership::InList, &wrapper)?;
                wrapper.insert_entry(index, child.clone());
                if let Some(value) = value {
                    child.set_text(value)?;
                }
                Ok(child)
            }
            AddTarget::ChoiceItem(slot, item) => {
                let wrapper = self.get_or_create_wrapper(&slot);
                if let Some(chosen) = wrapper.chosen() {
                    if chosen.tagname() == item {
                        // Re-adding the chosen alternative is idempotent.
                        if let Some(value) = value {
                            chosen.set_text(value)?;
                        }
                        return Ok(chosen);
                    }
                    return Err(Error::tree(TreeError::AlreadyDefined {
                        existing: chosen.tagname(),
                        requested: item,
                    }));
                }
                let child = self.create_element(&slot, &item, Membership::InChoice, &wrapper)?;
                wrapper.set_chosen(Some(child.clone()));
                if let Some(value) = value {
                    child.set_text(value)?;
                }
                Ok(child)
            }
        }
    }

    fn create_element(
        &self,
        slot: &Rc<ChildSpec>,
        tagname: &str,
        membership: Membership,
        parent: &Self,
    ) -> Result<Self> {
        let schema = self.schema();
        let descriptor = schema
            .descriptor(tagname)
            .ok_or_else(|| Error::tree(TreeError::InvalidChild(tagname.to_string())))?;
        Ok(Self::new_element(
            &schema,
            &descriptor,
            slot,
            membership,
            Some(parent.downgrade()),
        ))
    }

    fn get_or_create_wrapper(&self, slot: &Rc<ChildSpec>) -> Self {
        if let Some(wrapper) = self.slot_value(&slot.tagname) {
            return wrapper;
        }
        let wrapper = Self::new_wrapper(&self.schema(), slot, Some(self.downgrade()));
        self.set_slot_value(&slot.tagname, wrapper.clone());
        wrapper
    }

    // ------------------------------------------------------------------
    // List wrapper internals

    fn insert_entry(&self, index: Option<usize>, child: Self) {
        if let NodeContent::List { entries } = &mut self.inner.borrow_mut().content {
            match index {
                Some(index) if index <= entries.len() => {
                    entries.insert(index, ListEntry::Present(child));
                }
                _ => entries.push(ListEntry::Present(child)),
            }
        }
    }

    /// Present list items, placeholders skipped.
    pub fn items(&self) -> Vec<Self> {
        match &self.inner.borrow().content {
            NodeContent::List { entries } => entries
                .iter()
                .filter_map(|entry| match entry {
                    ListEntry::Present(node) => Some(node.clone()),
                    ListEntry::Empty => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Number of list entries, placeholders included.
    pub fn entry_count(&self) -> usize {
        match &self.inner.borrow().content {
            NodeContent::List { entries } => entries.len(),
            _ => 0,
        }
    }

    /// The entry at `index`; `None` for placeholders and out-of-range.
    pub fn entry_at(&self, index: usize) -> Option<Self> {
        match &self.inner.borrow().content {
            NodeContent::List { entries } => match entries.get(index) {
                Some(ListEntry::Present(node)) => Some(node.clone()),
                _ => None,
            },
            _ => None,
        }
    }

    fn has_placeholder_at(&self, index: usize) -> bool {
        match &self.inner.borrow().content {
            NodeContent::List { entries } => {
                matches!(entries.get(index), Some(ListEntry::Empty))
            }
            _ => false,
        }
    }

    fn remove_entry_at(&self, index: usize) {
        if let NodeContent::List { entries } = &mut self.inner.borrow_mut().content {
            if index < entries.len() {
                entries.remove(index);
            }
        }
    }

    /// Appends placeholders so that `index` becomes addressable.
    pub fn pad_to(&self, index: usize) {
        if let NodeContent::List { entries } = &mut self.inner.borrow_mut().content {
            while entries.len() < index {
                entries.push(ListEntry::Empty);
            }
        }
    }

    /// The chosen alternative of a choice wrapper.
    pub fn chosen(&self) -> Option<Self> {
        match &self.inner.borrow().content {
            NodeContent::Choice { chosen } => chosen.clone(),
            _ => None,
        }
    }

    fn set_chosen(&self, value: Option<Self>) {
        if let NodeContent::Choice { chosen } = &mut self.inner.borrow_mut().content {
            *chosen = value;
        }
    }

    // ------------------------------------------------------------------
    // Lookup

    /// Returns the child addressed by `tagname`: plain children by their
    /// tag, list wrappers by their synthetic or item tag, chosen choice
    /// alternatives by their tag.
    pub fn get(&self, tagname: &str) -> Option<Self> {
        match self.resolve(tagname)? {
            AddTarget::Plain(slot) => self.slot_value(&slot.tagname),
            AddTarget::Wrapper(slot) | AddTarget::ListItem(slot, _) => {
                self.slot_value(&slot.tagname)
            }
            AddTarget::ChoiceItem(slot, item) => self
                .slot_value(&slot.tagname)
                .and_then(|wrapper| wrapper.chosen())
                .filter(|chosen| chosen.tagname() == item),
        }
    }

    /// Returns the existing child or adds it. On list wrappers the index is
    /// mandatory; a placeholder at that index is replaced by a real item and
    /// a short list is padded with placeholders first.
    pub fn get_or_add(&self, tagname: &str, index: Option<usize>) -> Result<Self> {
        if self.is_list() {
            let index = index
                .ok_or_else(|| Error::tree(TreeError::MissingIndex(tagname.to_string())))?;
            if let Some(existing) = self.entry_at(index) {
                return Ok(existing);
            }
            if self.has_placeholder_at(index) {
                self.remove_entry_at(index);
            }
            self.pad_to(index);
            let parent = self
                .parent()
                .ok_or_else(|| Error::tree(TreeError::InvalidChild(tagname.to_string())))?;
            return parent.add_with(tagname, None, Some(index));
        }
        if self.is_wrapper() {
            // Choice wrapper: adding resolves through the parent element.
            if let Some(chosen) = self.chosen() {
                if chosen.tagname() == tagname {
                    return Ok(chosen);
                }
            }
            let parent = self
                .parent()
                .ok_or_else(|| Error::tree(TreeError::InvalidChild(tagname.to_string())))?;
            return parent.add_with(tagname, None, None);
        }
        match self.get(tagname) {
            Some(existing) => Ok(existing),
            None => self.add_with(tagname, None, index),
        }
    }

    // ------------------------------------------------------------------
    // Deletion

    /// Removes this node from its parent. List deletion shifts later
    /// indices down; deleting a chosen alternative removes the whole choice
    /// wrapper from its parent.
    pub fn delete(&self) -> Result<()> {
        let parent = self
            .parent()
            .ok_or_else(|| Error::tree(TreeError::CannotDeleteRoot))?;
        match self.membership() {
            Membership::InList => {
                if let NodeContent::List { entries } = &mut parent.inner.borrow_mut().content {
                    if let Some(pos) = entries.iter().position(|entry| match entry {
                        ListEntry::Present(node) => node.ptr_eq(self),
                        ListEntry::Empty => false,
                    }) {
                        entries.remove(pos);
                    }
                }
            }
            Membership::InChoice => {
                // Deleting the sole occupant also drops the wrapper.
                parent.delete()?;
                self.inner.borrow_mut().parent = None;
                return Ok(());
            }
            Membership::Plain => {
                parent.remove_slot(self);
            }
        }
        self.inner.borrow_mut().parent = None;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Traversal

    /// Present direct element children, lists and choices flattened.
    pub fn children(&self) -> Vec<Self> {
        let mut out = Vec::new();
        match &self.inner.borrow().content {
            NodeContent::Container { .. } => {}
            NodeContent::List { entries } => {
                for entry in entries {
                    if let ListEntry::Present(node) = entry {
                        out.push(node.clone());
                    }
                }
                return out;
            }
            NodeContent::Choice { chosen } => {
                if let Some(node) = chosen {
                    out.push(node.clone());
                }
                return out;
            }
            NodeContent::Leaf { .. } => return out,
        }
        let descriptor = match self.descriptor() {
            Some(descriptor) => descriptor,
            None => return out,
        };
        for slot in &descriptor.children {
            let Some(value) = self.slot_value(&slot.tagname) else {
                continue;
            };
            match slot.kind {
                SlotKind::Element => out.push(value),
                SlotKind::List | SlotKind::ChoiceList => out.extend(value.items()),
                SlotKind::Choice => out.extend(value.chosen()),
            }
        }
        out
    }

    /// Pre-order depth-first traversal over all present descendant element
    /// nodes, skipping absent optional children and placeholders.
    pub fn walk(&self) -> Vec<Self> {
        let mut out = Vec::new();
        self.walk_into(&mut out);
        out
    }

    fn walk_into(&self, out: &mut Vec<Self>) {
        for child in self.children() {
            out.push(child.clone());
            child.walk_into(out);
        }
    }

    /// All present descendants with the given tagname.
    pub fn findall(&self, tagname: &str) -> Vec<Self> {
        self.walk()
            .into_iter()
            .filter(|node| node.tagname() == tagname)
            .collect()
    }

    // ------------------------------------------------------------------
    // Materialization

    /// Synthesizes a transient node for a required-but-absent child so
    /// callers always have something to inspect. The node is never attached
    /// to the tree; callers needing persistence must explicitly `add`.
    pub fn materialize(&self, tagname: &str) -> Option<Self> {
        match self.resolve(tagname)? {
            AddTarget::Plain(slot) | AddTarget::ListItem(slot, _) => self
                .create_element(&slot, tagname, Membership::Plain, self)
                .ok(),
            AddTarget::Wrapper(slot) => Some(Self::new_wrapper(
                &self.schema(),
                &slot,
                Some(self.downgrade()),
            )),
            AddTarget::ChoiceItem(slot, item) => self
                .create_element(&slot, &item, Membership::Plain, self)
                .ok(),
        }
    }

    // ------------------------------------------------------------------
    // XML bridge: loading

    /// Populates this node from a parsed XML element, recording source
    /// lines, declared attributes and the comment run, then recursing into
    /// child elements through `add`.
    pub fn load_from_xml(&self, doc: &Rc<XmlDocument>, id: XmlNodeId) -> Result<()> {
        let root = self.root_node();
        {
            let mut root_data = root.inner.borrow_mut();
            if root_data.xml_doc.is_none() {
                root_data.xml_doc = Some(doc.clone());
                root_data.xml_index = Some(HashMap::new());
            }
        }
        if root.ptr_eq(self) {
            let mut data = self.inner.borrow_mut();
            data.xml_id = Some(id);
            let weak = WeakNode {
                inner: Rc::downgrade(&self.inner),
            };
            if let Some(index) = data.xml_index.as_mut() {
                index.insert(id, weak);
            }
        } else {
            self.inner.borrow_mut().xml_id = Some(id);
            if let Some(index) = root.inner.borrow_mut().xml_index.as_mut() {
                index.insert(id, self.downgrade());
            }
        }

        self.load_extra_from_xml(doc, id);

        if self.is_leaf() {
            self.load_leaf_from_xml(doc, id);
            return Ok(());
        }

        for child_id in doc.children(id).iter().copied() {
            let Some(tag) = doc.tag(child_id) else {
                // Comments are handled through the sibling heuristic, text
                // between elements is not part of the model.
                continue;
            };
            let child = self.add(tag)?;
            child.load_from_xml(doc, child_id)?;
        }
        Ok(())
    }

    fn load_extra_from_xml(&self, doc: &Rc<XmlDocument>, id: XmlNodeId) {
        {
            let mut data = self.inner.borrow_mut();
            data.sourceline = Some(doc.line(id));
        }
        // Attributes not declared in the schema are silently ignored here,
        // unlike the strict `add_attribute`.
        for (name, value) in doc.attributes(id) {
            let declared = self
                .inner
                .borrow()
                .descriptor
                .as_ref()
                .is_some_and(|descriptor| descriptor.has_attribute(name));
            if declared {
                let _ = self.add_attribute(name, value);
            }
        }
        if let Some(comment) = comment_run(doc, id) {
            self.set_comment(Some(comment));
        }
    }

    fn load_leaf_from_xml(&self, doc: &Rc<XmlDocument>, id: XmlNodeId) {
        use crate::xml::document::XmlNodeKind;

        let children = doc.children(id);
        let has_comment = children.iter().any(|c| doc.is_comment(*c));

        let mut text = String::new();
        let mut cdata = false;
        let mut inner_comments = Vec::new();
        let mut segment_count = 0;
        for child_id in children.iter().copied() {
            match doc.node(child_id).map(|n| &n.kind) {
                Some(XmlNodeKind::Text(segment)) => {
                    text.push_str(segment);
                    segment_count += 1;
                }
                Some(XmlNodeKind::CData(segment)) => {
                    text.push_str(segment);
                    segment_count += 1;
                    cdata = true;
                }
                Some(XmlNodeKind::Comment(comment)) => inner_comments.push(comment.clone()),
                _ => {}
            }
        }

        if has_comment {
            // Comments interleaved with the text: collect them apart from
            // the concatenated text segments. CDATA is not supported in
            // that shape.
            cdata = false;
            if !inner_comments.is_empty() {
                let joined = inner_comments.join("\n");
                let mut data = self.inner.borrow_mut();
                data.comment = match data.comment.take() {
                    Some(existing) if !existing.is_empty() => {
                        Some(format!("{}\n{}", existing, joined))
                    }
                    _ => Some(joined),
                };
            }
        } else {
            cdata = cdata && segment_count == 1;
        }

        if let NodeContent::Leaf { text: t, cdata: c } = &mut self.inner.borrow_mut().content {
            // Empty stays an empty string, distinguished from "never set".
            *t = Some(text);
            *c = cdata;
        }
    }

    // ------------------------------------------------------------------
    // XML bridge: serialization

    /// Builds a fresh XML document for this subtree. The document top level
    /// receives the node's comment (if any) followed by its element; list
    /// nodes contribute one comment+element pair per real item.
    pub fn to_xml(&self) -> Result<XmlDocument> {
        let mut doc = XmlDocument::new();
        let built = self.build_xml(&mut doc)?;
        for (comment, element) in built {
            if let Some(comment) = comment {
                let comment_id = doc.new_comment(&writer::update_eol(&comment));
                doc.append_top_level(comment_id);
            }
            doc.append_top_level(element);
        }
        Ok(doc)
    }

    /// Pretty-printed fragment without an XML declaration.
    pub fn to_xml_string(&self) -> Result<String> {
        let doc = self.to_xml()?;
        let config = WriteConfig::default();
        let mut out = String::new();
        for id in &doc.top_level {
            out.push_str(&writer::element_to_string(&doc, *id, &config));
        }
        Ok(out)
    }

    /// Full serialization with declaration and DOCTYPE, suitable for
    /// writing to disk.
    pub fn serialize(&self) -> Result<String> {
        let info = self.root_node().root_info().unwrap_or_default();
        let mut doc = self.to_xml()?;
        doc.encoding = Some(
            info.encoding
                .unwrap_or_else(|| writer::DEFAULT_ENCODING.to_string()),
        );
        if let Some(url) = info.dtd_url {
            doc.doctype = Some(Doctype {
                root: self.tagname(),
                id: DoctypeId::System(url),
            });
        }
        Ok(writer::serialize(&doc, &WriteConfig::default()))
    }

    fn build_xml(&self, doc: &mut XmlDocument) -> Result<Vec<(Option<String>, XmlNodeId)>> {
        match self.kind() {
            NodeKind::Leaf => {
                let id = self.build_leaf(doc)?;
                Ok(vec![(self.comment(), id)])
            }
            NodeKind::Container => {
                let id = self.build_container(doc)?;
                Ok(vec![(self.comment(), id)])
            }
            NodeKind::List | NodeKind::ChoiceList => self.build_list(doc),
            NodeKind::Choice => match self.chosen() {
                Some(chosen) => chosen.build_xml(doc),
                None => Ok(Vec::new()),
            },
        }
    }

    fn build_leaf(&self, doc: &mut XmlDocument) -> Result<XmlNodeId> {
        let id = doc.new_element(&self.tagname(), 0);
        self.build_attributes(doc, id);
        if self.is_empty_leaf() {
            if self.text().is_some_and(|text| !text.is_empty()) {
                return Err(Error::tree(TreeError::ForbiddenValue(self.tagname())));
            }
            // No text child at all, the tag self-closes on output.
        } else {
            let text = self.text().unwrap_or_default();
            // CDATA content is kept byte for byte, only plain text gets its
            // line endings normalized.
            let child = if self.is_cdata() {
                doc.new_cdata(&text)
            } else {
                doc.new_text(&writer::update_eol(&text))
            };
            doc.append_child(id, child);
        }
        // A mixed-content leaf can carry optional trailing children.
        self.build_child_slots(doc, id)?;
        Ok(id)
    }

    fn build_container(&self, doc: &mut XmlDocument) -> Result<XmlNodeId> {
        let id = doc.new_element(&self.tagname(), 0);
        self.build_attributes(doc, id);
        self.build_child_slots(doc, id)?;
        Ok(id)
    }

    fn build_child_slots(&self, doc: &mut XmlDocument, id: XmlNodeId) -> Result<()> {
        let descriptor = match self.descriptor() {
            Some(descriptor) => descriptor,
            None => return Ok(()),
        };
        for slot in &descriptor.children {
            let value = match self.slot_value(&slot.tagname) {
                Some(value) => Some(value),
                // Required missing children are materialized transiently so
                // the output always satisfies the grammar; nothing is
                // attached to the tree.
                None if slot.required => self.materialize(&slot.tagname),
                None => None,
            };
            let Some(value) = value else { continue };
            for (comment, element) in value.build_xml(doc)? {
                if let Some(comment) = comment {
                    let comment_id = doc.new_comment(&writer::update_eol(&comment));
                    doc.append_child(id, comment_id);
                }
                doc.append_child(id, element);
            }
        }
        Ok(())
    }

    fn build_list(&self, doc: &mut XmlDocument) -> Result<Vec<(Option<String>, XmlNodeId)>> {
        let items = self.items();
        if items.is_empty() {
            // An empty required single-alternative list guarantees at least
            // one element on output.
            let slot = self.inner.borrow().slot.clone();
            if slot.required && slot.kind == SlotKind::List {
                if let Some(item_tag) = slot.single_item() {
                    if let Some(parent) = self.parent() {
                        if let Some(transient) = parent.materialize(item_tag) {
                            return transient.build_xml(doc);
                        }
                    }
                }
            }
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        for item in items {
            out.extend(item.build_xml(doc)?);
        }
        Ok(out)
    }

    fn build_attributes(&self, doc: &mut XmlDocument, id: XmlNodeId) {
        for (name, value) in self.attribute_values() {
            doc.set_attribute(id, &name, &value);
        }
    }

    // ------------------------------------------------------------------
    // Writing

    /// Serializes and writes the tree to disk, optionally validating it
    /// against its schema first.
    pub fn write(&self, options: &WriteOptions) -> Result<()> {
        let info = self.root_node().root_info().unwrap_or_default();
        let filename = options
            .filename
            .clone()
            .or(info.filename.clone())
            .ok_or_else(|| Error::config(ConfigError::MissingFilename))?;
        let dtd_url = options.dtd_url.clone().or(info.dtd_url.clone());
        let dtd_str = options.dtd_str.clone().or(info.dtd_str.clone());
        if dtd_url.is_none() && dtd_str.is_none() {
            return Err(Error::config(ConfigError::MissingDtd));
        }
        let encoding = options
            .encoding
            .clone()
            .or(info.encoding.clone())
            .unwrap_or_else(|| writer::DEFAULT_ENCODING.to_string());

        let mut doc = self.to_xml()?;
        doc.encoding = Some(encoding);
        if let Some(url) = &dtd_url {
            doc.doctype = Some(Doctype {
                root: self.tagname(),
                id: DoctypeId::System(url.clone()),
            });
        }
        if options.validate {
            validate::validate_document(&doc, &self.schema())?;
        }
        let output = writer::serialize(&doc, &WriteConfig::default());
        fs::write(&filename, output).map_err(|e| match e.kind() {
            std::io::ErrorKind::PermissionDenied => {
                Error::io(IoError::PermissionDenied(filename.clone()))
            }
            _ => Error::io(IoError::WriteError(e.to_string())),
        })?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // xpath

    /// Evaluates an xpath-style expression against the backing XML tree and
    /// maps each raw result back to its tree node. Only available on trees
    /// populated through `load_from_xml`.
    pub fn xpath(&self, expr: &str) -> Result<Vec<Self>> {
        let root = self.root_node();
        let doc = root.inner.borrow().xml_doc.clone().ok_or_else(|| {
            Error::tree(TreeError::UnsupportedOperation(
                "xpath is only supported when the object is loaded from XML".to_string(),
            ))
        })?;
        let context = self.inner.borrow().xml_id.ok_or_else(|| {
            Error::tree(TreeError::UnsupportedOperation(
                "xpath is only supported when the object is loaded from XML".to_string(),
            ))
        })?;
        let ids = xpath::evaluate(&doc, context, expr)?;
        let root_data = root.inner.borrow();
        let index = root_data.xml_index.as_ref();
        Ok(ids
            .into_iter()
            .filter_map(|id| {
                index
                    .and_then(|map| map.get(&id))
                    .and_then(WeakNode::upgrade)
            })
            .collect())
    }

    // ------------------------------------------------------------------
    // Dict bridge

    /// Patches this node from externally supplied nested data keyed by the
    /// node's own tagname. With `skip_extra` the `_attrs`/`_comment`
    /// metadata is dropped instead of applied.
    pub fn load_from_dict(&self, data: &DictValue, skip_extra: bool) -> Result<()> {
        let sub = match data {
            DictValue::Map(map) => match map.get(&self.tagname()) {
                Some(sub) => sub,
                // Absent data is a no-op.
                None => return Ok(()),
            },
            DictValue::Null => return Ok(()),
            other => other,
        };
        self.apply_dict(sub, skip_extra)
    }

    fn apply_dict(&self, value: &DictValue, skip_extra: bool) -> Result<()> {
        let map = match value {
            DictValue::Null => return Ok(()),
            DictValue::Text(text) => return self.set_text(text),
            DictValue::Seq(_) => {
                return Err(Error::config(ConfigError::BadData(format!(
                    "unexpected sequence for {}",
                    self.tagname()
                ))))
            }
            DictValue::Map(map) => map,
        };

        if !skip_extra {
            if let Some(DictValue::Text(comment)) = map.get("_comment") {
                self.set_comment(Some(comment.clone()));
            }
            if let Some(DictValue::Map(attrs)) = map.get("_attrs") {
                for (name, attr_value) in attrs.iter_sorted() {
                    if let DictValue::Text(text) = attr_value {
                        self.add_attribute(name, text)?;
                    }
                }
            }
        }
        if map.get("_cdata").is_some() {
            self.set_cdata(true);
        }
        if let Some(DictValue::Text(text)) = map.get("_value") {
            self.set_text(text)?;
        }

        if self.is_wrapper() {
            // Choice wrapper data: a single key naming the alternative.
            for (key, sub) in map.iter_sorted() {
                if key.starts_with('_') {
                    continue;
                }
                let child = self.get_or_add(key, None)?;
                child.apply_dict(sub, skip_extra)?;
            }
            return Ok(());
        }

        let descriptor = match self.descriptor() {
            Some(descriptor) => descriptor,
            None => return Ok(()),
        };
        // Walk the slots in schema order so application is deterministic.
        for slot in &descriptor.children {
            let mut keys: Vec<&str> = vec![slot.tagname.as_str()];
            for item in &slot.items {
                if item != &slot.tagname {
                    keys.push(item);
                }
            }
            for key in keys {
                let Some(sub) = map.get(key) else { continue };
                if sub.is_null() {
                    continue;
                }
                if slot.is_wrapper() {
                    let wrapper = self.add(&slot.tagname)?;
                    let single;
                    let entries: &[DictValue] = match sub {
                        DictValue::Seq(entries) => entries.as_slice(),
                        other => {
                            single = [other.clone()];
                            &single
                        }
                    };
                    for (index, entry) in entries.iter().enumerate() {
                        wrapper.apply_dict_entry(slot, key, index, entry, skip_extra)?;
                    }
                } else {
                    let child = self.get_or_add(key, None)?;
                    child.apply_dict(sub, skip_extra)?;
                }
            }
        }
        Ok(())
    }

    /// Applies one sequence entry onto this wrapper. A one-key map naming an
    /// alternative selects that item tag; otherwise the addressed key (or
    /// the slot's single item) names it. `Null` keeps the index as a gap.
    fn apply_dict_entry(
        &self,
        slot: &Rc<ChildSpec>,
        key: &str,
        index: usize,
        entry: &DictValue,
        skip_extra: bool,
    ) -> Result<()> {
        match entry {
            DictValue::Null => {
                self.pad_to(index + 1);
                Ok(())
            }
            DictValue::Map(entry_map)
                if entry_map.len() == 1
                    && entry_map
                        .keys()
                        .next()
                        .is_some_and(|k| slot.items.iter().any(|item| item == k)) =>
            {
                for (alternative, value) in entry_map.iter_sorted() {
                    let item = self.get_or_add(alternative, Some(index))?;
                    item.apply_dict(value, skip_extra)?;
                }
                Ok(())
            }
            other => {
                let tag = if slot.items.iter().any(|item| item == key) {
                    key
                } else {
                    slot.single_item().ok_or_else(|| {
                        Error::config(ConfigError::BadData(format!(
                            "cannot infer the alternative for {}",
                            slot.tagname
                        )))
                    })?
                };
                let item = self.get_or_add(tag, Some(index))?;
                item.apply_dict(other, skip_extra)
            }
        }
    }
}

/// The newline-joined text of all comment siblings
/// immediately preceding the element, plus the trailing comment run when no
/// other non-comment sibling intervenes before the next real element.
fn comment_run(doc: &XmlDocument, id: XmlNodeId) -> Option<String> {
    let (before, after) = doc.siblings(id);

    let mut comments: Vec<String> = Vec::new();
    for sibling in before.iter().rev() {
        if doc.is_blank_text(*sibling) {
            continue;
        }
        match doc.comment_text(*sibling) {
            Some(text) => comments.push(text.to_string()),
            None => break,
        }
    }
    comments.reverse();

    let mut end_comments: Vec<String> = Vec::new();
    for sibling in &after {
        if doc.is_blank_text(*sibling) {
            continue;
        }
        match doc.comment_text(*sibling) {
            Some(text) => end_comments.push(text.to_string()),
            None => {
                // Trailing comments only attach when nothing else follows.
                end_comments.clear();
                break;
            }
        }
    }
    comments.extend(end_comments);

    if comments.is_empty() {
        None
    } else {
        Some(comments.join("\n"))
    }
}
