//! Apps: the caller-owned registry tying volumes, elements and a host together.

use std::sync::Arc;

use ahash::HashMap;
use serde_json::Value;

use crate::action::BoundAction;
use crate::component::{BehaviorContext, Component};
use crate::host::{Attributes, Host};
use crate::id::{AppId, BindingId, Locator, VolumeId};
use crate::render::RenderHook;
use crate::state::State;
use crate::template::{Interpolator, TemplateEngine};
use crate::tracer::{NoopTracer, RenderOutcome, Tracer};
use crate::volume::{DispatchReport, Volume};
use crate::Error;

/// Attribute carrying a binding's locator on its host element, unless configured otherwise.
pub const DEFAULT_MARKER_ATTRIBUTE: &str = "data-locator";

/// Markup written in place of a binding whose render failed, unless configured otherwise.
pub const DEFAULT_FALLBACK_MARKUP: &str = "<p>Error rendering component</p>";

/// Settings of an [`App`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Attribute that marks an element as presenting a binding.
    pub marker_attribute: String,
    /// Markup shown when a binding's resolver or template fails.
    pub fallback_markup: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            marker_attribute: DEFAULT_MARKER_ATTRIBUTE.to_string(),
            fallback_markup: DEFAULT_FALLBACK_MARKUP.to_string(),
        }
    }
}

/// Builder for [`App`].
///
/// # Example
///
/// ```
/// use volume_flow::{App, MemoryHost};
///
/// let app = App::<MemoryHost>::builder()
///     .marker_attribute("data-binding")
///     .fallback_markup("<em>unavailable</em>")
///     .build(MemoryHost::new());
/// assert_eq!(app.config().marker_attribute, "data-binding");
/// ```
pub struct AppBuilder {
    config: AppConfig,
    engine: Arc<dyn TemplateEngine>,
    tracer: Arc<dyn Tracer>,
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AppBuilder {
    /// Create a builder with default settings.
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
            engine: Arc::new(Interpolator::new()),
            tracer: Arc::new(NoopTracer),
        }
    }

    /// Set the attribute that carries locators on host elements.
    pub fn marker_attribute(mut self, name: impl Into<String>) -> Self {
        self.config.marker_attribute = name.into();
        self
    }

    /// Set the markup written when a binding fails to render.
    pub fn fallback_markup(mut self, markup: impl Into<String>) -> Self {
        self.config.fallback_markup = markup.into();
        self
    }

    /// Use another template engine. Defaults to [`Interpolator`].
    pub fn template_engine(mut self, engine: impl TemplateEngine) -> Self {
        self.engine = Arc::new(engine);
        self
    }

    /// Report activity to `tracer`. Every volume of the app shares it.
    pub fn tracer(mut self, tracer: Arc<dyn Tracer>) -> Self {
        self.tracer = tracer;
        self
    }

    /// Build the app on top of `host`.
    pub fn build<H: Host>(self, host: H) -> App<H> {
        App {
            id: AppId::new(),
            host,
            volumes: HashMap::default(),
            elements: HashMap::default(),
            config: self.config,
            engine: self.engine,
            tracer: self.tracer,
        }
    }
}

/// Registry of volumes and custom elements, attached to one host.
///
/// The app is owned by the caller and passed by reference to every operation; nothing is
/// registered globally.
///
/// # Example
///
/// ```
/// use futures::executor::block_on;
/// use serde_json::{json, Value};
/// use volume_flow::{Action, App, Component, MemoryHost, State};
///
/// let mut app = App::new(MemoryHost::new());
/// app.define_element("count-view", "<p>{{count}}</p>").unwrap();
///
/// let volume = app.create_volume(State::from_value(json!({"count": 1})).unwrap());
/// let view = Component::builder("count")
///     .element("count-view")
///     .depends_on(["count"])
///     .data(|cx| Ok(json!({ "count": cx.state().get("count").cloned() })))
///     .build();
/// let binding = app.create_binding(volume, &view, "", Value::Null, None).unwrap();
/// let root = app.host().root();
/// let element = app.mount(volume, binding, root).unwrap();
///
/// let increment = Action::new(["count"], |state, _| {
///     let count = state.get_i64("count").unwrap_or(0);
///     state.set("count", count + 1);
///     Ok(())
/// });
/// block_on(app.dispatch(volume, [increment.call()])).unwrap();
/// assert_eq!(app.host().content(element), Some("<p>2</p>"));
/// ```
pub struct App<H: Host> {
    id: AppId,
    host: H,
    volumes: HashMap<VolumeId, Volume>,
    elements: HashMap<String, String>,
    config: AppConfig,
    engine: Arc<dyn TemplateEngine>,
    tracer: Arc<dyn Tracer>,
}

impl<H: Host> App<H> {
    /// Create an app with default settings.
    pub fn new(host: H) -> Self {
        Self::builder().build(host)
    }

    /// Create a builder for customizing the app.
    pub fn builder() -> AppBuilder {
        AppBuilder::new()
    }

    /// The app's id.
    pub fn id(&self) -> AppId {
        self.id
    }

    /// The app's settings.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// The host.
    pub fn host(&self) -> &H {
        &self.host
    }

    /// The host, mutably.
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Register a custom element presenting components with `template`.
    ///
    /// The template is validated by the template engine right away.
    pub fn define_element(
        &mut self,
        tag: impl Into<String>,
        template: impl Into<String>,
    ) -> Result<(), Error> {
        let tag = tag.into();
        let template = template.into();
        if self.elements.contains_key(&tag) {
            return Err(Error::ElementAlreadyDefined { tag });
        }
        if let Err(source) = self.engine.validate(&template) {
            return Err(Error::Template { tag, source });
        }
        if let Err(source) = self.host.define(&tag) {
            return Err(Error::Template { tag, source });
        }
        tracing::debug!(app = %self.id, tag = %tag, "element defined");
        self.elements.insert(tag, template);
        Ok(())
    }

    /// Create a volume holding `state`.
    pub fn create_volume(&mut self, state: State) -> VolumeId {
        let volume = Volume::with_tracer(self.id, state, self.tracer.clone());
        let id = volume.id();
        self.volumes.insert(id, volume);
        id
    }

    /// Look up a volume.
    pub fn volume(&self, id: VolumeId) -> Result<&Volume, Error> {
        self.volumes.get(&id).ok_or(Error::UnknownVolume(id))
    }

    /// Look up a volume mutably.
    pub fn volume_mut(&mut self, id: VolumeId) -> Result<&mut Volume, Error> {
        self.volumes.get_mut(&id).ok_or(Error::UnknownVolume(id))
    }

    /// [`Volume::create_binding`] on one of the app's volumes.
    pub fn create_binding(
        &mut self,
        volume: VolumeId,
        component: &Component,
        slot: &str,
        props: Value,
        parent: Option<BindingId>,
    ) -> Result<BindingId, Error> {
        self.volume_mut(volume)?
            .create_binding(component, slot, props, parent)
    }

    /// Resolve a locator string to a live binding of this app.
    pub fn lookup(&self, locator: &str) -> Result<(VolumeId, BindingId), Error> {
        let locator: Locator = locator.parse()?;
        if locator.app != self.id {
            return Err(Error::ForeignLocator { locator });
        }
        let volume = self.volume(locator.volume)?;
        volume.binding(locator.binding)?;
        Ok((locator.volume, locator.binding))
    }

    /// The host element presenting a binding, if there is one.
    pub fn element_of(&self, volume: VolumeId, binding: BindingId) -> Result<Option<H::Element>, Error> {
        let locator = self.volume(volume)?.locator(binding);
        Ok(self
            .host
            .find(&self.config.marker_attribute, &locator.to_string()))
    }

    /// Attach an element for `binding` under `container` and render it.
    ///
    /// This is what a host does when a custom element gets connected.
    pub fn mount(
        &mut self,
        volume: VolumeId,
        binding: BindingId,
        container: H::Element,
    ) -> Result<H::Element, Error> {
        let (volume, mut renderer) = self.split(volume)?;
        let component = volume.binding(binding)?.component().clone();
        let tag = component.element().ok_or_else(|| Error::NoPresentation {
            component: component.name().to_string(),
        })?;
        renderer.template(tag)?;

        let element = renderer.host.attach(
            container,
            tag,
            &renderer.config.marker_attribute,
            &volume.locator(binding).to_string(),
        );
        renderer.render_into(volume, binding, Some(element))?;
        Ok(element)
    }

    /// Render `binding` into its existing host element.
    ///
    /// Fails with [`Error::HostElementMissing`] if the host has no element for it.
    pub fn render_binding(&mut self, volume: VolumeId, binding: BindingId) -> Result<(), Error> {
        let (volume, mut renderer) = self.split(volume)?;
        renderer.render(volume, binding)
    }

    /// Apply `actions` to a volume and render the affected bindings once.
    ///
    /// See [`Volume::dispatch`].
    pub async fn dispatch<I>(&mut self, volume: VolumeId, actions: I) -> Result<DispatchReport, Error>
    where
        I: IntoIterator<Item = BoundAction>,
    {
        let (volume, mut renderer) = self.split(volume)?;
        volume.dispatch(actions, &mut renderer).await
    }

    /// Run the behavior `handler` of the binding presented by `element` or its nearest bound
    /// ancestor, then dispatch the actions it returns.
    pub async fn execute_behavior(
        &mut self,
        element: H::Element,
        handler: &str,
        args: &[Value],
    ) -> Result<DispatchReport, Error> {
        let marker = &self.config.marker_attribute;
        let mut current = Some(element);
        let locator = loop {
            let Some(el) = current else {
                return Err(Error::NoBoundAncestor);
            };
            if let Some(locator) = self.host.attribute(el, marker) {
                break locator;
            }
            current = self.host.parent(el);
        };

        let (volume_id, binding) = self.lookup(&locator)?;
        let actions = self.run_behavior(volume_id, binding, handler, args)?;
        self.dispatch(volume_id, actions).await
    }

    fn run_behavior(
        &self,
        volume: VolumeId,
        binding: BindingId,
        handler: &str,
        args: &[Value],
    ) -> Result<Vec<BoundAction>, Error> {
        let volume = self.volume(volume)?;
        let node = volume.binding(binding)?;
        let behavior = node
            .component()
            .behavior(handler)
            .ok_or_else(|| Error::HandlerNotFound {
                binding,
                handler: handler.to_string(),
            })?;

        let cx = BehaviorContext {
            state: volume.state(),
            props: node.props(),
            locator: volume.locator(binding),
        };
        let actions = behavior(&cx, args).map_err(|source| Error::Behavior {
            handler: handler.to_string(),
            source,
        })?;
        tracing::debug!(
            locator = %cx.locator,
            handler,
            actions = actions.len(),
            "behavior executed"
        );
        Ok(actions)
    }

    fn split(&mut self, volume: VolumeId) -> Result<(&mut Volume, HostRenderer<'_, H>), Error> {
        let volume = self
            .volumes
            .get_mut(&volume)
            .ok_or(Error::UnknownVolume(volume))?;
        let renderer = HostRenderer {
            host: &mut self.host,
            elements: &self.elements,
            engine: &*self.engine,
            config: &self.config,
        };
        Ok((volume, renderer))
    }
}

/// Render hook presenting bindings through a [`Host`].
struct HostRenderer<'a, H: Host> {
    host: &'a mut H,
    elements: &'a HashMap<String, String>,
    engine: &'a dyn TemplateEngine,
    config: &'a AppConfig,
}

impl<'a, H: Host> HostRenderer<'a, H> {
    fn template(&self, tag: &str) -> Result<&'a str, Error> {
        let elements = self.elements;
        elements
            .get(tag)
            .map(String::as_str)
            .ok_or_else(|| Error::UnknownElement {
                tag: tag.to_string(),
            })
    }

    fn fallback(&mut self, element: Option<H::Element>) {
        if let Some(element) = element {
            self.host
                .set_content(element, self.config.fallback_markup.clone());
        }
    }

    fn render_into(
        &mut self,
        volume: &mut Volume,
        binding: BindingId,
        element: Option<H::Element>,
    ) -> Result<(), Error> {
        let component = volume.binding(binding)?.component().clone();
        let template = component.element().map(|tag| self.template(tag)).transpose()?;

        let mut attributes = element
            .map(|el| self.host.attributes(el))
            .unwrap_or_default();
        attributes.remove(&self.config.marker_attribute);

        let resolution = volume.resolve(binding, &attributes)?;
        let outcome = match resolution.data {
            Ok(data) => match (element, template) {
                (Some(el), Some(template)) => {
                    match self.engine.render(template, &merge(data, &attributes)) {
                        Ok(markup) => {
                            self.host.set_content(el, markup);
                            RenderOutcome::Rendered
                        }
                        Err(error) => RenderOutcome::Fallback {
                            message: error.to_string(),
                        },
                    }
                }
                _ => RenderOutcome::Resolved,
            },
            Err(error) => RenderOutcome::Fallback {
                message: error.to_string(),
            },
        };

        if let RenderOutcome::Fallback { message } = &outcome {
            tracing::error!(
                locator = %volume.locator(binding),
                component = component.name(),
                error = %message,
                "error rendering component"
            );
            self.fallback(element);
            volume.unmount_children(binding);
        }
        volume.tracer().on_render(volume.id(), binding, &outcome);

        if matches!(outcome, RenderOutcome::Fallback { .. }) {
            return Ok(());
        }
        let mut deferred = None;
        for child in resolution.children {
            let rendered = self
                .child_element(volume, element, child)
                .and_then(|child_element| self.render_into(volume, child, child_element));
            match rendered {
                Ok(()) => {}
                Err(error) if error.is_configuration() => return Err(error),
                Err(error) => {
                    tracing::warn!(locator = %volume.locator(child), %error, "child render failed");
                    deferred.get_or_insert(error);
                }
            }
        }
        deferred.map_or(Ok(()), Err)
    }

    fn child_element(
        &mut self,
        volume: &Volume,
        parent: Option<H::Element>,
        child: BindingId,
    ) -> Result<Option<H::Element>, Error> {
        let component = volume.binding(child)?.component().clone();
        let Some(tag) = component.element() else {
            return Ok(None);
        };
        let marker = &self.config.marker_attribute;
        let locator = volume.locator(child);
        let found = match parent {
            Some(parent) => Some(self.host.attach(parent, tag, marker, &locator.to_string())),
            None => self.host.find(marker, &locator.to_string()),
        };
        found
            .map(Some)
            .ok_or(Error::HostElementMissing { locator })
    }
}

impl<H: Host> RenderHook for HostRenderer<'_, H> {
    fn render(&mut self, volume: &mut Volume, binding: BindingId) -> Result<(), Error> {
        let has_element = volume.binding(binding)?.component().element().is_some();
        let element = if has_element {
            let locator = volume.locator(binding);
            let found = self
                .host
                .find(&self.config.marker_attribute, &locator.to_string());
            Some(found.ok_or(Error::HostElementMissing { locator })?)
        } else {
            None
        };
        self.render_into(volume, binding, element)
    }
}

/// Element attributes override resolved fields of the same name.
fn merge(data: Value, attributes: &Attributes) -> Value {
    match data {
        Value::Object(mut map) => {
            for (name, value) in attributes {
                map.insert(name.clone(), Value::String(value.clone()));
            }
            Value::Object(map)
        }
        other => other,
    }
}
