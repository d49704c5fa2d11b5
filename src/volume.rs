//! Volumes: state, binding tree and dependency index, plus the dispatch engine.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::Value;

use crate::action::BoundAction;
use crate::binding::{Binding, BindingGraph};
use crate::component::Component;
use crate::deps::DependencyIndex;
use crate::host::Attributes;
use crate::id::{AppId, BindingId, Locator, VolumeId};
use crate::render::RenderHook;
use crate::state::State;
use crate::tracer::{NoopTracer, Tracer};
use crate::Error;

/// Summary of one dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Number of actions applied.
    pub actions: usize,
    /// Union of the fields the actions declared.
    pub fields: BTreeSet<String>,
    /// Roots of change that rendered, in render order.
    pub rendered: Vec<BindingId>,
}

/// Result of running a binding's data resolver.
#[derive(Debug)]
pub struct Resolution {
    /// The resolved data, or the resolver's failure.
    pub data: anyhow::Result<Value>,
    /// Children claimed during the pass, in creation order.
    pub children: Vec<BindingId>,
}

/// An isolated state container with its binding tree.
///
/// State changes only through [`Volume::dispatch`]; a dispatch re-renders the bindings that
/// declared a dependency on one of the touched fields, skipping any binding whose ancestor
/// re-renders in the same pass.
pub struct Volume {
    id: VolumeId,
    app: AppId,
    state: State,
    graph: BindingGraph,
    deps: DependencyIndex,
    tracer: Arc<dyn Tracer>,
}

impl Volume {
    /// Create a volume owned by `app`.
    pub fn new(app: AppId, state: State) -> Self {
        Self::with_tracer(app, state, Arc::new(NoopTracer))
    }

    /// Create a volume reporting to `tracer`.
    pub fn with_tracer(app: AppId, state: State, tracer: Arc<dyn Tracer>) -> Self {
        Self {
            id: VolumeId::new(),
            app,
            state,
            graph: BindingGraph::default(),
            deps: DependencyIndex::default(),
            tracer,
        }
    }

    /// The volume's id.
    pub fn id(&self) -> VolumeId {
        self.id
    }

    /// The owning app's id.
    pub fn app(&self) -> AppId {
        self.app
    }

    /// The current state.
    pub fn state(&self) -> &State {
        &self.state
    }

    /// The dependency index.
    pub fn dependencies(&self) -> &DependencyIndex {
        &self.deps
    }

    /// Look up a binding.
    pub fn binding(&self, id: BindingId) -> Result<&Binding, Error> {
        self.graph.get(id).ok_or(Error::UnknownBinding {
            volume: self.id,
            binding: id,
        })
    }

    /// All bindings, in creation order.
    pub fn bindings(&self) -> impl Iterator<Item = &Binding> + '_ {
        self.graph.iter()
    }

    /// Number of bindings ever created in this volume.
    pub fn binding_count(&self) -> usize {
        self.graph.len()
    }

    /// The locator addressing `binding`.
    pub fn locator(&self, binding: BindingId) -> Locator {
        Locator {
            app: self.app,
            volume: self.id,
            binding,
        }
    }

    /// Create a binding of `component`, or reuse the one already occupying `slot` under
    /// `parent`, then register the component's declared dependencies.
    ///
    /// A reused binding keeps its id and children; its component and props are replaced.
    /// Never renders.
    pub fn create_binding(
        &mut self,
        component: &Component,
        slot: &str,
        props: Value,
        parent: Option<BindingId>,
    ) -> Result<BindingId, Error> {
        let existing = match parent {
            Some(parent) => {
                let node = self.binding(parent)?;
                if slot.is_empty() {
                    return Err(Error::MissingSlot { parent });
                }
                node.child(slot)
            }
            None => None,
        };

        let id = match existing {
            Some(id) => {
                let previous = self.graph.get(id).map(|b| b.component().clone());
                if previous.is_some_and(|previous| !previous.ptr_eq(component)) {
                    // Subscriptions of the replaced component no longer apply.
                    self.deps.unsubscribe_all(id);
                }
                self.graph.rebind(id, component.clone(), props);
                id
            }
            None => self.graph.allocate(parent, slot, component.clone(), props),
        };

        tracing::trace!(
            volume = %self.id,
            binding = %id,
            component = component.name(),
            reused = existing.is_some(),
            "binding created"
        );
        self.tracer
            .on_binding_created(self.id, id, component.name(), existing.is_some());

        for field in component.dependencies() {
            let subscription = self.deps.subscribe(&self.graph, field, id);
            self.tracer
                .on_dependency_registered(self.id, id, field, subscription);
        }

        Ok(id)
    }

    /// Run `binding`'s data resolver against the current state.
    ///
    /// `attributes` are the non-reactive attributes of the binding's host element. Children
    /// the resolver does not claim again are unmounted when the resolver succeeds.
    ///
    /// Fails only with configuration errors raised inside the pass (such as a slot claimed
    /// twice) or when the binding does not exist; resolver failures are returned inside
    /// [`Resolution::data`].
    pub fn resolve(
        &mut self,
        binding: BindingId,
        attributes: &Attributes,
    ) -> Result<Resolution, Error> {
        let component = self.binding(binding)?.component().clone();

        let mut cx = ResolveContext {
            volume: self,
            binding,
            attributes,
            claimed: Vec::new(),
            error: None,
        };
        let data = component.resolve(&mut cx);
        let ResolveContext { claimed, error, .. } = cx;

        if let Some(error) = error {
            return Err(error);
        }
        let children: Vec<BindingId> = claimed.into_iter().map(|(_, id)| id).collect();
        if data.is_ok() {
            self.unmount_unclaimed(binding, &children);
        }
        Ok(Resolution { data, children })
    }

    /// Unmount every child of `binding`, for renders that replaced the subtree with content
    /// that has no children (such as fallback markup).
    pub fn unmount_children(&mut self, binding: BindingId) {
        self.unmount_unclaimed(binding, &[]);
    }

    fn unmount_unclaimed(&mut self, parent: BindingId, claimed: &[BindingId]) {
        let Some(node) = self.graph.get(parent) else {
            return;
        };
        let stale: Vec<BindingId> = node
            .slots()
            .values()
            .copied()
            .filter(|child| !claimed.contains(child))
            .collect();

        for child in stale {
            let mut subtree = vec![child];
            subtree.extend(self.graph.descendants(child));
            for id in subtree {
                if !self.graph.get(id).is_some_and(Binding::is_mounted) {
                    continue;
                }
                self.graph.set_mounted(id, false);
                self.deps.unsubscribe_all(id);
                self.tracer.on_unmounted(self.id, id);
            }
        }
    }

    /// The minimal set of bindings to render when `fields` changed.
    ///
    /// Subscribers of every field are collected, then any binding with an ancestor in the
    /// collection is dropped. The result is in creation order.
    pub fn roots_of_change<'a>(&self, fields: impl IntoIterator<Item = &'a str>) -> Vec<BindingId> {
        let candidates: BTreeSet<BindingId> = self
            .deps
            .candidates(fields)
            .into_iter()
            .filter(|&id| self.graph.get(id).is_some_and(Binding::is_mounted))
            .collect();

        candidates
            .iter()
            .copied()
            .filter(|&id| !self.graph.has_ancestor(id, |a| candidates.contains(&a)))
            .collect()
    }

    /// Render the roots of change for `fields` through `hook`.
    ///
    /// A configuration error aborts the pass. Any other hook error (a missing host element)
    /// does not stop the remaining roots; the first one is returned once the pass is done.
    pub fn propagate<'a, R>(
        &mut self,
        fields: impl IntoIterator<Item = &'a str>,
        hook: &mut R,
    ) -> Result<Vec<BindingId>, Error>
    where
        R: RenderHook + ?Sized,
    {
        let roots = self.roots_of_change(fields);
        tracing::debug!(volume = %self.id, roots = roots.len(), "propagating changes");

        let mut rendered = Vec::with_capacity(roots.len());
        let mut deferred = None;
        for root in roots {
            match hook.render(self, root) {
                Ok(()) => rendered.push(root),
                Err(error) if error.is_configuration() => return Err(error),
                Err(error) => {
                    tracing::warn!(volume = %self.id, binding = %root, %error, "render failed");
                    deferred.get_or_insert(error);
                }
            }
        }

        match deferred {
            Some(error) => Err(error),
            None => Ok(rendered),
        }
    }

    /// Apply `actions` in order, then render once for the union of their fields.
    ///
    /// Each mutator is awaited to completion before the next one starts, and rendering starts
    /// only after the last one. There is no rollback: if a mutator fails, the state keeps
    /// whatever the earlier actions (and the failing one) changed, nothing is rendered, and
    /// [`Error::Action`] is returned.
    pub async fn dispatch<R, I>(&mut self, actions: I, hook: &mut R) -> Result<DispatchReport, Error>
    where
        R: RenderHook + ?Sized,
        I: IntoIterator<Item = BoundAction>,
    {
        let actions: Vec<BoundAction> = actions.into_iter().collect();
        let mut fields = BTreeSet::new();

        for (index, action) in actions.iter().enumerate() {
            action
                .apply(&mut self.state)
                .await
                .map_err(|source| Error::Action { index, source })?;
            fields.extend(action.fields().iter().cloned());
            self.tracer.on_action_applied(self.id, index, action.fields());
        }

        let rendered = self.propagate(fields.iter().map(String::as_str), hook)?;
        let report = DispatchReport {
            actions: actions.len(),
            fields,
            rendered,
        };
        tracing::debug!(
            volume = %self.id,
            actions = report.actions,
            rendered = report.rendered.len(),
            "dispatch finished"
        );
        self.tracer.on_dispatch_end(self.id, &report);
        Ok(report)
    }

    pub(crate) fn tracer(&self) -> &dyn Tracer {
        &*self.tracer
    }
}

/// What a data resolver can see and do while its binding renders.
pub struct ResolveContext<'a> {
    volume: &'a mut Volume,
    binding: BindingId,
    attributes: &'a Attributes,
    claimed: Vec<(String, BindingId)>,
    error: Option<Error>,
}

impl ResolveContext<'_> {
    /// The volume's current state.
    pub fn state(&self) -> &State {
        &self.volume.state
    }

    /// The binding being resolved.
    pub fn binding(&self) -> BindingId {
        self.binding
    }

    /// The locator of the binding being resolved.
    pub fn locator(&self) -> Locator {
        self.volume.locator(self.binding)
    }

    /// The binding's creation props.
    pub fn props(&self) -> &Value {
        self.volume
            .graph
            .get(self.binding)
            .map(Binding::props)
            .unwrap_or(&Value::Null)
    }

    /// Attributes of the binding's host element.
    pub fn attributes(&self) -> &Attributes {
        self.attributes
    }

    /// A single host element attribute.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Create or reuse the child occupying `slot` and return its locator.
    ///
    /// Claiming the same slot twice in one pass is a [`Error::SlotCollision`]. The error is
    /// also raised from the enclosing render even if the resolver swallows it.
    pub fn child(
        &mut self,
        component: &Component,
        slot: &str,
        props: Value,
    ) -> Result<Locator, Error> {
        let parent = self.binding;
        if slot.is_empty() {
            self.error.get_or_insert(Error::MissingSlot { parent });
            return Err(Error::MissingSlot { parent });
        }
        if self.claimed.iter().any(|(claimed, _)| claimed == slot) {
            let collision = || Error::SlotCollision {
                parent,
                slot: slot.to_string(),
            };
            self.error.get_or_insert_with(collision);
            return Err(collision());
        }

        let id = self
            .volume
            .create_binding(component, slot, props, Some(parent))?;
        self.claimed.push((slot.to_string(), id));
        Ok(self.volume.locator(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Action;
    use crate::render::Headless;
    use futures::executor::block_on;
    use parking_lot::Mutex;
    use serde_json::json;

    fn volume(state: Value) -> Volume {
        Volume::new(AppId::new(), State::from_value(state).unwrap())
    }

    #[test]
    fn test_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}
        assert_send::<Volume>();
        assert_sync::<Volume>();
    }

    #[test]
    fn test_resolver_sees_old_then_new_value() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let component = {
            let seen = seen.clone();
            Component::builder("a")
                .depends_on(["a"])
                .data(move |cx| {
                    let a = cx.state().get("a").cloned().unwrap_or_default();
                    seen.lock().push(a.clone());
                    Ok(json!({ "a": a }))
                })
                .build()
        };
        let increase = Action::new(["a"], |state, args| {
            let by = args[0].as_i64().unwrap_or(0);
            let a = state.get_i64("a").unwrap_or(0);
            state.set("a", a + by);
            Ok(())
        });

        let mut volume = volume(json!({"a": 1, "b": 2}));
        let mut hook = Headless::new();
        let binding = volume.create_binding(&component, "", Value::Null, None).unwrap();
        hook.render(&mut volume, binding).unwrap();

        let report = block_on(volume.dispatch([increase.with([json!(5)])], &mut hook)).unwrap();

        assert_eq!(*seen.lock(), vec![json!(1), json!(6)]);
        assert_eq!(report.rendered, vec![binding]);
        assert_eq!(hook.output(binding), Some(&json!({"a": 6})));
    }

    #[test]
    fn test_unrelated_field_does_not_render() {
        let component = Component::builder("a").depends_on(["a"]).build();
        let touch_b = Action::new(["b"], |state, _| {
            state.set("b", 3);
            Ok(())
        });

        let mut volume = volume(json!({"a": 1, "b": 2}));
        volume.create_binding(&component, "", Value::Null, None).unwrap();
        let mut renders = 0;
        let mut hook = |_: &mut Volume, _: BindingId| -> Result<(), Error> {
            renders += 1;
            Ok(())
        };
        let report = block_on(volume.dispatch([touch_b.call()], &mut hook)).unwrap();

        assert!(report.rendered.is_empty());
        assert_eq!(renders, 0);
        assert_eq!(volume.state().get_i64("b"), Some(3));
    }

    #[test]
    fn test_missing_slot_under_parent() {
        let component = Component::builder("c").build();
        let mut volume = volume(json!({}));
        let root = volume.create_binding(&component, "", Value::Null, None).unwrap();
        let err = volume
            .create_binding(&component, "", Value::Null, Some(root))
            .unwrap_err();
        assert!(matches!(err, Error::MissingSlot { parent } if parent == root));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_unknown_parent() {
        let component = Component::builder("c").build();
        let mut volume = volume(json!({}));
        let err = volume
            .create_binding(&component, "x", Value::Null, Some(BindingId(9)))
            .unwrap_err();
        assert!(matches!(err, Error::UnknownBinding { binding: BindingId(9), .. }));
    }

    #[test]
    fn test_rebind_with_other_component_drops_old_subscriptions() {
        let first = Component::builder("first").depends_on(["a"]).build();
        let second = Component::builder("second").depends_on(["b"]).build();
        let mut volume = volume(json!({}));
        let root = volume
            .create_binding(&Component::builder("root").build(), "", Value::Null, None)
            .unwrap();

        let child = volume
            .create_binding(&first, "slot", Value::Null, Some(root))
            .unwrap();
        assert!(volume.dependencies().is_subscribed("a", child));

        let again = volume
            .create_binding(&second, "slot", Value::Null, Some(root))
            .unwrap();
        assert_eq!(again, child);
        assert!(!volume.dependencies().is_subscribed("a", child));
        assert!(volume.dependencies().is_subscribed("b", child));
    }

    #[test]
    fn test_failed_action_stops_batch_without_render() {
        let component = Component::builder("a").depends_on(["a"]).build();
        let set_a = Action::new(["a"], |state, _| {
            state.set("a", 2);
            Ok(())
        });
        let fail = Action::new(["a"], |_, _| Err(anyhow::anyhow!("broken")));
        let never = Action::new(["a"], |state, _| {
            state.set("a", 100);
            Ok(())
        });

        let mut volume = volume(json!({"a": 1}));
        volume.create_binding(&component, "", Value::Null, None).unwrap();
        let mut hook = Headless::new();
        let err = block_on(volume.dispatch([set_a.call(), fail.call(), never.call()], &mut hook))
            .unwrap_err();

        assert!(matches!(err, Error::Action { index: 1, .. }));
        assert_eq!(volume.state().get_i64("a"), Some(2));
        assert_eq!(hook.render_count(), 0);
    }
}
