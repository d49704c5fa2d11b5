//! Binding nodes and the per-volume binding arena.

use std::collections::BTreeMap;

use serde_json::Value;
use slab::Slab;

use crate::component::Component;
use crate::id::BindingId;

/// An instantiated component inside a volume's tree.
///
/// Parent and children are plain ids into the volume's arena; the arena owns every node.
#[derive(Debug, Clone)]
pub struct Binding {
    id: BindingId,
    parent: Option<BindingId>,
    slot: String,
    slots: BTreeMap<String, BindingId>,
    component: Component,
    props: Value,
    mounted: bool,
}

impl Binding {
    /// The binding's id.
    pub fn id(&self) -> BindingId {
        self.id
    }

    /// The parent binding, `None` for roots.
    pub fn parent(&self) -> Option<BindingId> {
        self.parent
    }

    /// The slot this binding occupies under its parent.
    pub fn slot(&self) -> &str {
        &self.slot
    }

    /// Child bindings keyed by slot name.
    pub fn slots(&self) -> &BTreeMap<String, BindingId> {
        &self.slots
    }

    /// The child occupying `slot`, if any.
    pub fn child(&self, slot: &str) -> Option<BindingId> {
        self.slots.get(slot).copied()
    }

    /// The component this binding instantiates.
    pub fn component(&self) -> &Component {
        &self.component
    }

    /// Non-reactive creation arguments.
    pub fn props(&self) -> &Value {
        &self.props
    }

    /// Whether the binding is part of the live tree.
    ///
    /// A child that its parent stopped creating is unmounted until a later pass claims its
    /// slot again. Roots are always mounted.
    pub fn is_mounted(&self) -> bool {
        self.mounted
    }
}

/// Arena of bindings. Ids are slab keys and nodes are never removed.
#[derive(Debug, Default)]
pub(crate) struct BindingGraph {
    bindings: Slab<Binding>,
}

impl BindingGraph {
    pub fn get(&self, id: BindingId) -> Option<&Binding> {
        self.bindings.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Binding> + '_ {
        self.bindings.iter().map(|(_, binding)| binding)
    }

    /// Allocate a node. `parent` must already exist; the caller links the slot.
    pub fn allocate(
        &mut self,
        parent: Option<BindingId>,
        slot: &str,
        component: Component,
        props: Value,
    ) -> BindingId {
        debug_assert!(parent.map_or(true, |p| self.bindings.contains(p.0)));
        let entry = self.bindings.vacant_entry();
        let id = BindingId(entry.key());
        entry.insert(Binding {
            id,
            parent,
            slot: slot.to_string(),
            slots: BTreeMap::new(),
            component,
            props,
            mounted: true,
        });
        if let Some(parent) = parent {
            self.bindings[parent.0].slots.insert(slot.to_string(), id);
        }
        id
    }

    /// Point an existing node at a new component and props, keeping its subtree.
    pub fn rebind(&mut self, id: BindingId, component: Component, props: Value) {
        let binding = &mut self.bindings[id.0];
        binding.component = component;
        binding.props = props;
        binding.mounted = true;
    }

    pub fn set_mounted(&mut self, id: BindingId, mounted: bool) {
        if let Some(binding) = self.bindings.get_mut(id.0) {
            binding.mounted = mounted;
        }
    }

    /// Iterate over the strict ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: BindingId) -> Ancestors<'_> {
        Ancestors {
            graph: self,
            next: self.get(id).and_then(Binding::parent),
        }
    }

    /// Returns true if `ancestor` is a strict ancestor of `id`.
    pub fn is_ancestor(&self, ancestor: BindingId, id: BindingId) -> bool {
        self.ancestors(id).any(|a| a == ancestor)
    }

    /// Returns true if some strict ancestor of `id` satisfies `pred`.
    pub fn has_ancestor(&self, id: BindingId, mut pred: impl FnMut(BindingId) -> bool) -> bool {
        self.ancestors(id).any(|a| pred(a))
    }

    /// Every strict descendant of `id`, depth first.
    pub fn descendants(&self, id: BindingId) -> Vec<BindingId> {
        let mut out = Vec::new();
        let mut stack: Vec<BindingId> = self
            .get(id)
            .map(|b| b.slots.values().rev().copied().collect())
            .unwrap_or_default();
        while let Some(next) = stack.pop() {
            out.push(next);
            if let Some(binding) = self.get(next) {
                stack.extend(binding.slots.values().rev().copied());
            }
        }
        out
    }
}

/// Iterator over a binding's ancestors.
pub(crate) struct Ancestors<'a> {
    graph: &'a BindingGraph,
    next: Option<BindingId>,
}

impl Iterator for Ancestors<'_> {
    type Item = BindingId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.graph.get(current).and_then(Binding::parent);
        Some(current)
    }
}
