//! Volume-Flow: a minimal reactive UI runtime.
//!
//! State lives in [`Volume`]s. Components declare which top-level state fields they depend
//! on, and every binding of a component registers those fields in its volume's
//! [`DependencyIndex`]. Dispatching a batch of [`Action`]s applies their mutators in order,
//! then re-renders only the bindings subscribed to the touched fields, skipping any binding
//! whose ancestor is re-rendered in the same pass. There is no virtual DOM and no diffing.
//!
//! # Key Features
//!
//! - **Declared dependencies**: a component lists its fields up front; nothing is tracked at
//!   read time
//! - **Ancestor dedup**: a field already covered by an ancestor is never registered again below it
//! - **Stable identity**: children are keyed by slot, so re-rendering a parent reuses the
//!   same child bindings
//! - **Batched dispatch**: async mutators run sequentially and a batch renders once
//! - **Failure isolation**: a failing resolver or template shows fallback markup for its own
//!   binding and leaves siblings untouched
//! - **Event delegation**: behaviors are looked up from the nearest bound host element
//!
//! # Example
//!
//! ```
//! use futures::executor::block_on;
//! use serde_json::{json, Value};
//! use volume_flow::{Action, App, Component, MemoryHost, State};
//!
//! let mut app = App::new(MemoryHost::new());
//! app.define_element("a-view", "<p>a is {{a}}</p>").unwrap();
//!
//! let volume = app.create_volume(State::from_value(json!({"a": 1, "b": 2})).unwrap());
//! let view = Component::builder("a")
//!     .element("a-view")
//!     .depends_on(["a"])
//!     .data(|cx| Ok(json!({ "a": cx.state().get("a").cloned() })))
//!     .build();
//! let binding = app.create_binding(volume, &view, "", Value::Null, None).unwrap();
//! let root = app.host().root();
//! let element = app.mount(volume, binding, root).unwrap();
//! assert_eq!(app.host().content(element), Some("<p>a is 1</p>"));
//!
//! let increase = Action::new(["a"], |state, args| {
//!     let by = args.first().and_then(Value::as_i64).unwrap_or(1);
//!     let a = state.get_i64("a").unwrap_or(0);
//!     state.set("a", a + by);
//!     Ok(())
//! });
//! block_on(app.dispatch(volume, [increase.with([json!(5)])])).unwrap();
//! assert_eq!(app.host().content(element), Some("<p>a is 6</p>"));
//! ```
//!
//! # Observing
//!
//! Log records go through the `tracing` crate. Structured events are delivered to a
//! [`Tracer`] installed with [`AppBuilder::tracer`]; see the [`tracer`] module.

#![warn(missing_docs)]

mod action;
mod app;
mod binding;
mod component;
mod deps;
mod error;
mod host;
mod id;
mod render;
mod state;
mod template;
pub mod tracer;
mod volume;

pub use action::{Action, BoundAction, Mutator};
pub use app::{App, AppBuilder, AppConfig, DEFAULT_FALLBACK_MARKUP, DEFAULT_MARKER_ATTRIBUTE};
pub use binding::Binding;
pub use component::{Behavior, BehaviorContext, Component, ComponentBuilder, DataResolver};
pub use deps::{DependencyIndex, Subscription};
pub use error::Error;
pub use host::{Attributes, Host, MemoryHost, NodeId};
pub use id::{AppId, BindingId, Locator, VolumeId};
pub use render::{Headless, RenderHook};
pub use state::State;
pub use template::{Interpolator, TemplateEngine};
pub use tracer::{NoopTracer, RecordingTracer, RenderOutcome, TraceEvent, Tracer};
pub use volume::{DispatchReport, Resolution, ResolveContext, Volume};
