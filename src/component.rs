//! Component descriptors.

use std::fmt;
use std::sync::Arc;

use ahash::HashMap;
use serde_json::Value;

use crate::action::BoundAction;
use crate::id::Locator;
use crate::state::State;
use crate::volume::ResolveContext;

/// Produces the data a binding renders with.
///
/// The resolver runs every time its binding renders. It reads the state and props through the
/// [`ResolveContext`] and creates or reuses child bindings with [`ResolveContext::child`].
///
/// Resolvers are synchronous. Asynchronous work belongs in action mutators, which always settle
/// before any render starts.
pub trait DataResolver: Send + Sync + 'static {
    /// Resolve the binding's render data.
    fn resolve(&self, cx: &mut ResolveContext<'_>) -> anyhow::Result<Value>;
}

struct FnResolver<F>(F);

impl<F> DataResolver for FnResolver<F>
where
    F: Fn(&mut ResolveContext<'_>) -> anyhow::Result<Value> + Send + Sync + 'static,
{
    fn resolve(&self, cx: &mut ResolveContext<'_>) -> anyhow::Result<Value> {
        (self.0)(cx)
    }
}

/// Renders a binding's props unchanged.
struct PropsResolver;

impl DataResolver for PropsResolver {
    fn resolve(&self, cx: &mut ResolveContext<'_>) -> anyhow::Result<Value> {
        Ok(cx.props().clone())
    }
}

/// What a behavior handler can see.
pub struct BehaviorContext<'a> {
    /// The state of the binding's volume.
    pub state: &'a State,
    /// The binding's creation props.
    pub props: &'a Value,
    /// Where the binding lives.
    pub locator: Locator,
}

/// An event handler attached to a component.
///
/// Handlers never mutate state directly; they return the actions to dispatch.
pub type Behavior =
    Arc<dyn Fn(&BehaviorContext<'_>, &[Value]) -> anyhow::Result<Vec<BoundAction>> + Send + Sync>;

/// A component: a data resolver, the state fields it depends on, an optional presentation
/// element and an optional table of behaviors.
///
/// Cheap to clone; all bindings created from the same component share one descriptor.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use volume_flow::Component;
///
/// let counter = Component::builder("counter")
///     .element("counter-view")
///     .depends_on(["count"])
///     .data(|cx| Ok(json!({ "count": cx.state().get("count").cloned() })))
///     .build();
/// assert_eq!(counter.dependencies(), ["count"]);
/// ```
#[derive(Clone)]
pub struct Component(Arc<ComponentInner>);

struct ComponentInner {
    name: String,
    element: Option<String>,
    dependencies: Vec<String>,
    resolver: Box<dyn DataResolver>,
    behaviors: HashMap<String, Behavior>,
}

impl Component {
    /// Start describing a component.
    pub fn builder(name: impl Into<String>) -> ComponentBuilder {
        ComponentBuilder {
            name: name.into(),
            element: None,
            dependencies: Vec::new(),
            resolver: None,
            behaviors: HashMap::default(),
        }
    }

    /// The component's name, used in logs and traces.
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// The tag of the element presenting this component, if any.
    pub fn element(&self) -> Option<&str> {
        self.0.element.as_deref()
    }

    /// The state fields whose changes re-render this component.
    pub fn dependencies(&self) -> &[String] {
        &self.0.dependencies
    }

    /// Look up a behavior by name.
    pub fn behavior(&self, name: &str) -> Option<&Behavior> {
        self.0.behaviors.get(name)
    }

    /// Returns true if both handles point at the same descriptor.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn resolve(&self, cx: &mut ResolveContext<'_>) -> anyhow::Result<Value> {
        self.0.resolver.resolve(cx)
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut behaviors: Vec<_> = self.0.behaviors.keys().collect();
        behaviors.sort();
        f.debug_struct("Component")
            .field("name", &self.0.name)
            .field("element", &self.0.element)
            .field("dependencies", &self.0.dependencies)
            .field("behaviors", &behaviors)
            .finish()
    }
}

/// Builder for [`Component`].
pub struct ComponentBuilder {
    name: String,
    element: Option<String>,
    dependencies: Vec<String>,
    resolver: Option<Box<dyn DataResolver>>,
    behaviors: HashMap<String, Behavior>,
}

impl ComponentBuilder {
    /// Present the component with the element registered under `tag`.
    pub fn element(mut self, tag: impl Into<String>) -> Self {
        self.element = Some(tag.into());
        self
    }

    /// Declare state fields the component depends on.
    pub fn depends_on<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for field in fields {
            let field = field.into();
            if !self.dependencies.contains(&field) {
                self.dependencies.push(field);
            }
        }
        self
    }

    /// Use a closure as the data resolver.
    pub fn data<F>(self, f: F) -> Self
    where
        F: Fn(&mut ResolveContext<'_>) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.resolver(FnResolver(f))
    }

    /// Use a [`DataResolver`] implementation.
    ///
    /// Without a resolver the component renders its binding's props.
    pub fn resolver(mut self, resolver: impl DataResolver) -> Self {
        self.resolver = Some(Box::new(resolver));
        self
    }

    /// Attach a behavior handler.
    pub fn behavior<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&BehaviorContext<'_>, &[Value]) -> anyhow::Result<Vec<BoundAction>>
            + Send
            + Sync
            + 'static,
    {
        self.behaviors.insert(name.into(), Arc::new(handler));
        self
    }

    /// Finish the descriptor.
    pub fn build(self) -> Component {
        Component(Arc::new(ComponentInner {
            name: self.name,
            element: self.element,
            dependencies: self.dependencies,
            resolver: self.resolver.unwrap_or_else(|| Box::new(PropsResolver)),
            behaviors: self.behaviors,
        }))
    }
}
