//! Dependency index: which bindings re-render when a state field changes.

use std::collections::BTreeSet;

use ahash::HashMap;

use crate::binding::BindingGraph;
use crate::id::BindingId;

/// Outcome of registering a binding's dependency on a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subscription {
    /// The binding now subscribes to the field.
    Added,
    /// The binding already subscribed to the field.
    AlreadyPresent,
    /// An ancestor subscribes to the field; rendering it re-creates this binding anyway.
    CoveredByAncestor,
}

/// Maps state field names to the bindings subscribed to them.
///
/// No subscriber set ever holds both a binding and one of its ancestors.
#[derive(Debug, Default)]
pub struct DependencyIndex {
    fields: HashMap<String, BTreeSet<BindingId>>,
}

impl DependencyIndex {
    /// Bindings subscribed to `field`, in creation order.
    pub fn subscribers(&self, field: &str) -> impl Iterator<Item = BindingId> + '_ {
        self.fields.get(field).into_iter().flatten().copied()
    }

    /// Returns true if `binding` subscribes to `field`.
    pub fn is_subscribed(&self, field: &str, binding: BindingId) -> bool {
        self.fields
            .get(field)
            .is_some_and(|set| set.contains(&binding))
    }

    /// Fields with at least one subscriber.
    pub fn fields(&self) -> impl Iterator<Item = &str> + '_ {
        self.fields
            .iter()
            .filter(|(_, set)| !set.is_empty())
            .map(|(field, _)| field.as_str())
    }

    /// Total number of (field, binding) subscriptions.
    pub fn len(&self) -> usize {
        self.fields.values().map(BTreeSet::len).sum()
    }

    /// Returns true if there are no subscriptions.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Union of the subscribers of every field in `changed`.
    pub fn candidates<'a>(&self, changed: impl IntoIterator<Item = &'a str>) -> BTreeSet<BindingId> {
        changed
            .into_iter()
            .filter_map(|field| self.fields.get(field))
            .flatten()
            .copied()
            .collect()
    }

    /// Subscribe `binding` to `field` unless an ancestor already covers it.
    ///
    /// When the binding is added, subscribed descendants of it are evicted from the field.
    /// The ancestor check walks the live graph on every call.
    pub(crate) fn subscribe(
        &mut self,
        graph: &BindingGraph,
        field: &str,
        binding: BindingId,
    ) -> Subscription {
        let set = self.fields.entry(field.to_string()).or_default();
        if graph.has_ancestor(binding, |a| set.contains(&a)) {
            return Subscription::CoveredByAncestor;
        }
        if !set.insert(binding) {
            return Subscription::AlreadyPresent;
        }
        set.retain(|&other| !graph.is_ancestor(binding, other));
        Subscription::Added
    }

    /// Drop every subscription held by `binding`. Returns how many were dropped.
    pub(crate) fn unsubscribe_all(&mut self, binding: BindingId) -> usize {
        let mut dropped = 0;
        for set in self.fields.values_mut() {
            if set.remove(&binding) {
                dropped += 1;
            }
        }
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Component;
    use serde_json::Value;

    fn tree() -> (BindingGraph, BindingId, BindingId, BindingId) {
        let component = Component::builder("test").build();
        let mut graph = BindingGraph::default();
        let root = graph.allocate(None, "", component.clone(), Value::Null);
        let child = graph.allocate(Some(root), "child", component.clone(), Value::Null);
        let leaf = graph.allocate(Some(child), "leaf", component, Value::Null);
        (graph, root, child, leaf)
    }

    #[test]
    fn test_descendant_covered_by_ancestor() {
        let (graph, root, _, leaf) = tree();
        let mut index = DependencyIndex::default();

        assert_eq!(index.subscribe(&graph, "a", root), Subscription::Added);
        assert_eq!(
            index.subscribe(&graph, "a", leaf),
            Subscription::CoveredByAncestor
        );
        assert_eq!(index.subscribers("a").collect::<Vec<_>>(), vec![root]);

        // A different field is tracked independently.
        assert_eq!(index.subscribe(&graph, "b", leaf), Subscription::Added);
        assert!(index.is_subscribed("b", leaf));
    }

    #[test]
    fn test_subscribe_is_idempotent() {
        let (graph, root, _, _) = tree();
        let mut index = DependencyIndex::default();
        index.subscribe(&graph, "a", root);
        assert_eq!(
            index.subscribe(&graph, "a", root),
            Subscription::AlreadyPresent
        );
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_late_ancestor_evicts_descendants() {
        let (graph, root, child, leaf) = tree();
        let mut index = DependencyIndex::default();
        index.subscribe(&graph, "a", leaf);
        index.subscribe(&graph, "a", child);
        assert_eq!(index.subscribers("a").collect::<Vec<_>>(), vec![child]);

        index.subscribe(&graph, "a", root);
        assert_eq!(index.subscribers("a").collect::<Vec<_>>(), vec![root]);
    }

    #[test]
    fn test_unsubscribe_all() {
        let (graph, _, child, leaf) = tree();
        let mut index = DependencyIndex::default();
        index.subscribe(&graph, "a", child);
        index.subscribe(&graph, "b", child);
        index.subscribe(&graph, "c", leaf);

        assert_eq!(index.unsubscribe_all(child), 2);
        assert_eq!(index.fields().collect::<Vec<_>>(), vec!["c"]);
        assert_eq!(
            index.candidates(["a", "b", "c", "missing"]),
            BTreeSet::from([leaf])
        );
    }
}
