//! Tests for behavior resolution through host elements.

use futures::executor::block_on;
use serde_json::{json, Value};
use volume_flow::{
    Action, App, BindingId, Component, Error, Host, MemoryHost, NodeId, State, VolumeId,
};

struct Panel {
    app: App<MemoryHost>,
    volume: VolumeId,
    panel: BindingId,
    counter: BindingId,
    panel_el: NodeId,
    counter_el: NodeId,
}

fn add() -> Action {
    Action::new(["count"], |state, args| {
        let by = args.first().and_then(Value::as_i64).unwrap_or(1);
        let count = state.get_i64("count").unwrap_or(0);
        state.set("count", count + by);
        Ok(())
    })
}

/// A panel without dependencies holding one counter with a `step` prop.
fn panel() -> Panel {
    let mut app = App::new(MemoryHost::new());
    app.define_element("x-panel", "<section>panel</section>").unwrap();
    app.define_element("x-counter", "<button>{{count}}</button>").unwrap();
    let volume = app.create_volume(State::from_value(json!({"count": 0})).unwrap());

    let add_step = add();
    let add_args = add();
    let counter = Component::builder("counter")
        .element("x-counter")
        .depends_on(["count"])
        .data(|cx| Ok(json!({ "count": cx.state().get("count").cloned() })))
        .behavior("bump", move |cx, _| {
            let step = cx.props.get("step").and_then(Value::as_i64).unwrap_or(1);
            Ok(vec![add_step.with([json!(step)])])
        })
        .behavior("add", move |_, args| Ok(vec![add_args.with(args.iter().cloned())]))
        .behavior("broken", |_, _| Err(anyhow::anyhow!("handler exploded")))
        .build();
    let panel = Component::builder("panel")
        .element("x-panel")
        .data(move |cx| {
            let counter = cx.child(&counter, "counter", json!({"step": 3}))?;
            Ok(json!({ "counter": counter.to_string() }))
        })
        .behavior("noop", |_, _| Ok(Vec::new()))
        .build();

    let binding = app
        .create_binding(volume, &panel, "", Value::Null, None)
        .unwrap();
    let root = app.host().root();
    let panel_el = app.mount(volume, binding, root).unwrap();
    let counter = app
        .volume(volume)
        .unwrap()
        .binding(binding)
        .unwrap()
        .child("counter")
        .unwrap();
    let counter_el = app.element_of(volume, counter).unwrap().unwrap();

    Panel {
        app,
        volume,
        panel: binding,
        counter,
        panel_el,
        counter_el,
    }
}

#[test]
fn test_behavior_found_from_nested_plain_element() {
    let mut p = panel();
    let icon = p.app.host_mut().create_element(p.counter_el, "span", [("class", "icon")]);

    let report = block_on(p.app.execute_behavior(icon, "bump", &[])).unwrap();

    assert_eq!(report.rendered, vec![p.counter]);
    assert_eq!(p.app.volume(p.volume).unwrap().state().get_i64("count"), Some(3));
    let counter_el = p.app.element_of(p.volume, p.counter).unwrap().unwrap();
    assert_eq!(p.app.host().content(counter_el), Some("<button>3</button>"));
}

#[test]
fn test_behavior_receives_event_arguments() {
    let mut p = panel();

    block_on(p.app.execute_behavior(p.counter_el, "add", &[json!(10)])).unwrap();
    block_on(p.app.execute_behavior(p.counter_el, "add", &[json!(-4)])).unwrap();

    assert_eq!(p.app.volume(p.volume).unwrap().state().get_i64("count"), Some(6));
}

#[test]
fn test_behavior_with_no_actions_renders_nothing() {
    let mut p = panel();

    let report = block_on(p.app.execute_behavior(p.panel_el, "noop", &[])).unwrap();
    assert_eq!(report.actions, 0);
    assert!(report.rendered.is_empty());
}

#[test]
fn test_nearest_bound_ancestor_wins() {
    let mut p = panel();
    let header = p.app.host_mut().create_element(p.panel_el, "h1", Vec::<(String, String)>::new());

    // The panel is the nearest bound element of the header and has no "bump".
    let err = block_on(p.app.execute_behavior(header, "bump", &[])).unwrap_err();
    assert!(matches!(
        err,
        Error::HandlerNotFound { binding, ref handler } if binding == p.panel && handler == "bump"
    ));

    // The counter does not fall back to its parent's behaviors either.
    let err = block_on(p.app.execute_behavior(p.counter_el, "noop", &[])).unwrap_err();
    assert!(matches!(err, Error::HandlerNotFound { binding, .. } if binding == p.counter));
}

#[test]
fn test_no_bound_ancestor() {
    let mut p = panel();
    let root = p.app.host().root();
    let stray = p.app.host_mut().create_element(root, "div", [("id", "stray")]);

    let err = block_on(p.app.execute_behavior(stray, "bump", &[])).unwrap_err();
    assert!(matches!(err, Error::NoBoundAncestor));
    assert_eq!(p.app.volume(p.volume).unwrap().state().get_i64("count"), Some(0));
}

#[test]
fn test_failing_behavior() {
    let mut p = panel();

    let err = block_on(p.app.execute_behavior(p.counter_el, "broken", &[])).unwrap_err();
    assert!(matches!(err, Error::Behavior { ref handler, .. } if handler == "broken"));
    assert!(err.to_string().contains("handler exploded"));
}

#[test]
fn test_locator_of_another_app_is_rejected() {
    let mut p = panel();

    let mut other = App::new(MemoryHost::new());
    let volume = other.create_volume(State::new());
    let binding = other
        .create_binding(volume, &Component::builder("c").build(), "", Value::Null, None)
        .unwrap();
    let foreign = other.volume(volume).unwrap().locator(binding).to_string();

    let root = p.app.host().root();
    let marker = p.app.config().marker_attribute.clone();
    let element = p
        .app
        .host_mut()
        .create_element(root, "x-counter", [(marker.as_str(), foreign.as_str())]);

    let err = block_on(p.app.execute_behavior(element, "bump", &[])).unwrap_err();
    assert!(matches!(err, Error::ForeignLocator { .. }));
}

#[test]
fn test_parent_lookup_walks_host_tree() {
    let p = panel();
    let host = p.app.host();
    assert_eq!(host.parent(p.counter_el), Some(p.panel_el));
    assert_eq!(host.parent(p.panel_el), Some(host.root()));
    assert_eq!(host.parent(host.root()), None);
}
