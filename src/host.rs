//! The host display surface and an in-memory implementation.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use slab::Slab;

/// Attributes of a host element, by name.
pub type Attributes = BTreeMap<String, String>;

/// A display surface holding one element per rendered binding.
///
/// Elements are addressed by a marker attribute whose value is a binding's
/// [`Locator`](crate::Locator) string. The runtime renders children itself, so an
/// implementation must not render custom elements on its own when content is replaced.
pub trait Host {
    /// Handle to an element.
    type Element: Copy + Eq + fmt::Debug;

    /// Register a custom element tag.
    fn define(&mut self, _tag: &str) -> anyhow::Result<()> {
        Ok(())
    }

    /// The element whose `marker` attribute equals `locator`.
    fn find(&self, marker: &str, locator: &str) -> Option<Self::Element>;

    /// All attributes of `element`.
    fn attributes(&self, element: Self::Element) -> Attributes;

    /// One attribute of `element`.
    fn attribute(&self, element: Self::Element, name: &str) -> Option<String> {
        self.attributes(element).remove(name)
    }

    /// The structural parent of `element`.
    fn parent(&self, element: Self::Element) -> Option<Self::Element>;

    /// Replace the content of `element` with `markup`, discarding its previous children.
    fn set_content(&mut self, element: Self::Element, markup: String);

    /// The child of `parent` whose `marker` attribute equals `locator`, created with `tag` if
    /// there is none.
    fn attach(
        &mut self,
        parent: Self::Element,
        tag: &str,
        marker: &str,
        locator: &str,
    ) -> Self::Element;
}

/// Handle to an element of a [`MemoryHost`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug)]
struct Node {
    tag: String,
    attributes: Attributes,
    content: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// An in-memory element tree.
///
/// Content is kept as the markup string the runtime wrote; child elements are the ones the
/// runtime attached (or the caller created) below it.
#[derive(Debug)]
pub struct MemoryHost {
    nodes: Slab<Node>,
    root: NodeId,
    defined: BTreeSet<String>,
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryHost {
    /// Create a host with an empty `body` root element.
    pub fn new() -> Self {
        let mut nodes = Slab::new();
        let root = NodeId(nodes.insert(Node {
            tag: "body".to_string(),
            attributes: Attributes::new(),
            content: String::new(),
            parent: None,
            children: Vec::new(),
        }));
        Self {
            nodes,
            root,
            defined: BTreeSet::new(),
        }
    }

    /// The root element.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Append a new element under `parent`.
    pub fn create_element<I, K, V>(&mut self, parent: NodeId, tag: &str, attributes: I) -> NodeId
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let id = NodeId(self.nodes.insert(Node {
            tag: tag.to_string(),
            attributes: attributes
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            content: String::new(),
            parent: Some(parent),
            children: Vec::new(),
        }));
        if let Some(node) = self.nodes.get_mut(parent.0) {
            node.children.push(id);
        }
        id
    }

    /// Remove `element` and everything below it.
    pub fn remove(&mut self, element: NodeId) {
        if element == self.root || !self.nodes.contains(element.0) {
            return;
        }
        if let Some(parent) = self.nodes[element.0].parent {
            if let Some(node) = self.nodes.get_mut(parent.0) {
                node.children.retain(|&c| c != element);
            }
        }
        self.drop_subtree(element);
    }

    fn drop_subtree(&mut self, element: NodeId) {
        if let Some(node) = self.nodes.try_remove(element.0) {
            for child in node.children {
                self.drop_subtree(child);
            }
        }
    }

    /// Set one attribute.
    pub fn set_attribute(&mut self, element: NodeId, name: &str, value: &str) {
        if let Some(node) = self.nodes.get_mut(element.0) {
            node.attributes.insert(name.to_string(), value.to_string());
        }
    }

    /// The tag of `element`.
    pub fn tag(&self, element: NodeId) -> Option<&str> {
        self.nodes.get(element.0).map(|n| n.tag.as_str())
    }

    /// The markup last written into `element`.
    pub fn content(&self, element: NodeId) -> Option<&str> {
        self.nodes.get(element.0).map(|n| n.content.as_str())
    }

    /// One attribute of `element`.
    pub fn attribute(&self, element: NodeId, name: &str) -> Option<&str> {
        self.nodes
            .get(element.0)
            .and_then(|n| n.attributes.get(name))
            .map(String::as_str)
    }

    /// Child elements of `element`.
    pub fn children(&self, element: NodeId) -> &[NodeId] {
        self.nodes
            .get(element.0)
            .map(|n| n.children.as_slice())
            .unwrap_or_default()
    }

    /// Returns true if `tag` was defined.
    pub fn is_defined(&self, tag: &str) -> bool {
        self.defined.contains(tag)
    }

    /// Number of live elements, the root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false: the root element cannot be removed.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl Host for MemoryHost {
    type Element = NodeId;

    fn define(&mut self, tag: &str) -> anyhow::Result<()> {
        if !self.defined.insert(tag.to_string()) {
            anyhow::bail!("<{tag}> is already defined on this host");
        }
        Ok(())
    }

    fn find(&self, marker: &str, locator: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .find(|(_, node)| node.attributes.get(marker).is_some_and(|v| v == locator))
            .map(|(key, _)| NodeId(key))
    }

    fn attributes(&self, element: NodeId) -> Attributes {
        self.nodes
            .get(element.0)
            .map(|n| n.attributes.clone())
            .unwrap_or_default()
    }

    fn attribute(&self, element: NodeId, name: &str) -> Option<String> {
        MemoryHost::attribute(self, element, name).map(str::to_string)
    }

    fn parent(&self, element: NodeId) -> Option<NodeId> {
        self.nodes.get(element.0).and_then(|n| n.parent)
    }

    fn set_content(&mut self, element: NodeId, markup: String) {
        let Some(node) = self.nodes.get_mut(element.0) else {
            return;
        };
        node.content = markup;
        for child in std::mem::take(&mut node.children) {
            self.drop_subtree(child);
        }
    }

    fn attach(&mut self, parent: NodeId, tag: &str, marker: &str, locator: &str) -> NodeId {
        let existing = self.children(parent).iter().copied().find(|&child| {
            self.attribute(child, marker) == Some(locator)
        });
        existing.unwrap_or_else(|| self.create_element(parent, tag, [(marker, locator)]))
    }
}
