use elemental_dom::{Document, DomError, Event, NodeId};
use elemental_portal::*;
use pretty_assertions::assert_eq;
use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

fn clock(props: &Props) -> VNode {
    VNode::element("span").child(VNode::text(format!(
        "{}12:00",
        props.get("prefix").unwrap_or_default()
    )))
}

fn only_record(overlay: &Overlay) -> (InstanceKey, InstanceRecord) {
    let map = overlay.instances().get_state().unwrap();
    assert_eq!(map.len(), 1);
    map.iter()
        .next()
        .map(|(key, record)| (*key, record.clone()))
        .unwrap()
}

fn add(document: &Document, markup: &str) -> NodeId {
    document.append_markup(document.body(), markup).unwrap()[0]
}

#[test]
fn light_dom_instances_follow_their_element() {
    let document = Document::new();
    let overlay =
        wrap_as_web_component(&document, clock, "x-clock", ["prefix"], WrapConfig::new()).unwrap();
    let portal = overlay.mount().unwrap();

    let element = add(&document, r#"<x-clock prefix="t:"></x-clock>"#);

    let (key, record) = only_record(&overlay);
    assert_eq!(record.element(), element);
    assert_eq!(record.anchor(), element);
    assert_eq!(record.props().get("prefix"), Some("t:"));

    portal.sync();
    assert_eq!(portal.rendered_keys(), vec![key]);
    assert_eq!(document.text_content(element), "t:12:00");

    document.set_attribute(element, "prefix", "u:").unwrap();
    portal.sync();
    assert_eq!(
        portal.rendered_props(key).unwrap().get("prefix"),
        Some("u:")
    );
    assert_eq!(
        document.inner_html(element),
        "<span>u:12:00</span>"
    );

    document.remove(element).unwrap();
    assert!(overlay.instances().get_state().unwrap().is_empty());

    portal.sync();
    assert!(portal.rendered_keys().is_empty());
    assert!(document.children(element).is_empty());
}

#[test]
fn closed_shadow_roots_hide_the_rendering() {
    let document = Document::new();
    let overlay = wrap_as_web_component(
        &document,
        clock,
        "x-clock-closed",
        ["prefix"],
        WrapConfig::new().with_shadow_mode(ShadowMode::Closed),
    )
    .unwrap();
    let portal = overlay.mount().unwrap();

    let element = add(&document, r#"<x-clock-closed prefix="t:"></x-clock-closed>"#);
    portal.sync();

    let (_, record) = only_record(&overlay);
    assert_ne!(record.anchor(), element);
    assert_eq!(document.shadow_host(record.anchor()), Some(element));
    assert_eq!(document.shadow_root(element), None);

    assert!(document.query_selector_all(document.root(), "span").is_empty());
    assert_eq!(document.text_content(element), "");
    assert_eq!(document.rendered_text(element), "t:12:00");
}

#[test]
fn removing_a_shadow_host_unmounts_its_rendering() {
    for (tag, mode) in [
        ("x-clock-closed", ShadowMode::Closed),
        ("x-clock-open", ShadowMode::Open),
    ] {
        let document = Document::new();
        let overlay = wrap_as_web_component(
            &document,
            clock,
            tag,
            ["prefix"],
            WrapConfig::new().with_shadow_mode(mode),
        )
        .unwrap();
        let portal = overlay.mount().unwrap();

        let element = add(&document, &format!(r#"<{tag} prefix="t:"></{tag}>"#));
        portal.sync();

        let (_, record) = only_record(&overlay);
        let shadow = record.anchor();
        assert_eq!(document.children(shadow).len(), 1);
        assert_eq!(document.rendered_text(element), "t:12:00");

        document.remove(element).unwrap();
        assert!(overlay.instances().get_state().unwrap().is_empty());

        portal.sync();
        assert!(portal.rendered_keys().is_empty());
        assert!(document.children(shadow).is_empty());
        assert_eq!(document.rendered_text(element), "");
        assert_eq!(document.shadow_host(shadow), Some(element));
    }
}

#[test]
fn open_shadow_roots_expose_the_rendering() {
    let document = Document::new();
    let overlay = wrap_as_web_component(
        &document,
        clock,
        "x-clock-open",
        ["prefix"],
        WrapConfig::new().with_shadow_mode(ShadowMode::Open),
    )
    .unwrap();
    let portal = overlay.mount().unwrap();

    let element = add(&document, r#"<x-clock-open prefix="t:"></x-clock-open>"#);
    portal.sync();

    let (_, record) = only_record(&overlay);
    assert_eq!(document.shadow_root(element), Some(record.anchor()));
    assert_eq!(
        document.query_selector_all(record.anchor(), "span").len(),
        1
    );

    // reconnecting keeps the same shadow root
    document.remove(element).unwrap();
    document.append_child(document.body(), element).unwrap();
    let (_, again) = only_record(&overlay);
    assert_eq!(again.anchor(), record.anchor());
}

#[test]
fn second_mount_fails_before_rendering() {
    let document = Document::new();
    let overlay =
        wrap_as_web_component(&document, clock, "x-clock", ["prefix"], WrapConfig::new()).unwrap();

    let first = overlay.mount().unwrap();
    let element = add(&document, r#"<x-clock prefix="t:"></x-clock>"#);

    let err = overlay.clone().mount().unwrap_err();
    assert!(matches!(&err, PortalError::AlreadyMounted { tag } if tag == "x-clock"));
    assert_eq!(err.to_string(), "the portal for <x-clock> is already mounted");
    assert_eq!(document.text_content(element), "");
    assert!(overlay.is_mounted());

    first.unmount();
    assert!(!overlay.is_mounted());

    // a fresh mount starts from what the instance map already holds
    let second = overlay.mount().unwrap();
    second.sync();
    assert_eq!(document.text_content(element), "t:12:00");
}

#[test]
fn unmounting_removes_every_rendering() {
    let document = Document::new();
    let overlay =
        wrap_as_web_component(&document, clock, "x-clock", ["prefix"], WrapConfig::new()).unwrap();
    let portal = overlay.mount().unwrap();

    let a = add(&document, r#"<x-clock prefix="a:"></x-clock>"#);
    let b = add(&document, r#"<x-clock prefix="b:"></x-clock>"#);
    portal.sync();
    assert_eq!(document.text_content(document.body()), "a:12:00b:12:00");

    drop(portal);
    assert_eq!(document.text_content(a), "");
    assert_eq!(document.text_content(b), "");
    assert_eq!(overlay.instances().get_state().unwrap().len(), 2);
}

#[test]
fn define_runs_once() {
    let document = Document::new();
    let overlay =
        wrap_as_web_component(&document, clock, "x-clock", ["prefix"], WrapConfig::new()).unwrap();

    assert!(overlay.is_defined());
    overlay.define().unwrap();
    overlay.define().unwrap();
    assert!(document.is_defined("x-clock"));

    // another wrapper cannot claim the same tag
    let err = wrap_as_web_component(&document, clock, "x-clock", ["prefix"], WrapConfig::new())
        .unwrap_err();
    assert!(matches!(err, PortalError::Dom(DomError::AlreadyDefined(_))));

    let err = wrap_as_web_component(&document, clock, "Clock", ["prefix"], WrapConfig::new())
        .unwrap_err();
    assert!(matches!(
        err,
        PortalError::Dom(DomError::InvalidCustomElementName(_))
    ));
}

#[test]
fn existing_elements_are_upgraded_when_wrapped() {
    let document = Document::new();
    let element = add(&document, r#"<x-clock prefix="early:"></x-clock>"#);

    let overlay =
        wrap_as_web_component(&document, clock, "x-clock", ["prefix"], WrapConfig::new()).unwrap();
    let (_, record) = only_record(&overlay);
    assert_eq!(record.element(), element);
    assert_eq!(record.props().get("prefix"), Some("early:"));
}

#[test]
fn keys_are_present_exactly_while_connected() {
    let document = Document::new();
    let overlay =
        wrap_as_web_component(&document, clock, "x-clock", ["prefix"], WrapConfig::new()).unwrap();
    let element = document.create_element("x-clock");
    let body = document.body();

    let contains = |key: InstanceKey| {
        overlay
            .instances()
            .with_state(|map| map.map_or(false, |map| map.contains_key(&key)))
    };

    document.append_child(body, element).unwrap();
    let (key, _) = only_record(&overlay);

    for _ in 0..3 {
        document.remove_child(body, element).unwrap();
        assert!(!contains(key));

        document.append_child(body, element).unwrap();
        assert!(contains(key));
    }

    // the key survives reconnects
    assert_eq!(only_record(&overlay).0, key);
}

#[test]
fn snapshots_change_only_with_their_own_attributes() {
    let document = Document::new();
    let overlay = wrap_as_web_component(
        &document,
        clock,
        "x-clock",
        ["prefix"],
        WrapConfig::new().with_event_dispatch(true),
    )
    .unwrap();

    let a = add(&document, r#"<x-clock prefix="a:"></x-clock>"#);
    let b = add(&document, r#"<x-clock prefix="b:"></x-clock>"#);

    let props_of = |element: NodeId| {
        overlay
            .instances()
            .get_state()
            .unwrap()
            .values()
            .find(|record| record.element() == element)
            .map(|record| record.props().clone())
            .unwrap()
    };

    let before = props_of(a);
    document.set_attribute(b, "prefix", "bb:").unwrap();
    document.set_attribute(a, "unobserved", "x").unwrap();
    let unrelated = props_of(a);
    assert!(before.ptr_eq(&unrelated));

    document.set_attribute(a, "prefix", "aa:").unwrap();
    let changed = props_of(a);
    assert!(!Rc::ptr_eq(before.snapshot(), changed.snapshot()));
    assert_eq!(changed.get("prefix"), Some("aa:"));
    assert_eq!(changed.get("unobserved"), None);

    // the dispatcher is bound once per element
    assert!(before
        .dispatcher()
        .unwrap()
        .ptr_eq(changed.dispatcher().unwrap()));
}

#[test]
fn every_attribute_change_is_published() {
    let document = Document::new();
    let overlay =
        wrap_as_web_component(&document, clock, "x-clock", ["prefix"], WrapConfig::new()).unwrap();
    let element = add(&document, r#"<x-clock></x-clock>"#);

    for n in 0..5 {
        document
            .set_attribute(element, "prefix", &format!("{n}:"))
            .unwrap();
    }

    let (_, record) = only_record(&overlay);
    assert_eq!(record.props().get("prefix"), Some("4:"));

    document.remove_attribute(element, "prefix").unwrap();
    let (_, record) = only_record(&overlay);
    assert_eq!(record.props().get("prefix"), None);
}

#[test]
fn dispatched_events_bubble_from_the_element() {
    let document = Document::new();

    let overlay = wrap_as_web_component(
        &document,
        |props: &Props| {
            let dispatcher = props.dispatcher().cloned();
            let prefix = props.get("prefix").unwrap_or_default().to_string();
            VNode::element("button").on("click", move |_| {
                if let Some(dispatcher) = &dispatcher {
                    dispatcher
                        .dispatch(Event::new("clock-click").with_detail(prefix.clone()))
                        .unwrap();
                }
            })
        },
        "x-clock",
        ["prefix"],
        WrapConfig::new()
            .with_shadow_mode(ShadowMode::Closed)
            .with_event_dispatch(true),
    )
    .unwrap();
    let portal = overlay.mount().unwrap();

    let element = add(&document, r#"<x-clock prefix="t:"></x-clock>"#);
    portal.sync();

    let seen = Rc::new(RefCell::new(Vec::new()));
    document
        .add_event_listener(document.body(), "clock-click", {
            let seen = seen.clone();
            move |event| {
                seen.borrow_mut()
                    .push((event.target(), event.detail().map(str::to_string)))
            }
        })
        .unwrap();

    let (_, record) = only_record(&overlay);
    let button = document.query_selector_all(record.anchor(), "button")[0];
    document.dispatch_event(button, Event::new("click")).unwrap();

    assert_eq!(*seen.borrow(), vec![(Some(element), Some("t:".to_string()))]);
}

async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(flavor = "current_thread")]
async fn the_loop_renders_the_latest_state_once_per_wake() {
    let local = tokio::task::LocalSet::new();

    local
        .run_until(async {
            let document = Document::new();
            let renders = Rc::new(Cell::new(0));

            let overlay = wrap_as_web_component(
                &document,
                {
                    let renders = renders.clone();
                    move |props: &Props| {
                        renders.set(renders.get() + 1);
                        clock(props)
                    }
                },
                "x-clock",
                ["prefix"],
                WrapConfig::new(),
            )
            .unwrap();

            let portal = overlay.mount().unwrap();
            let task = tokio::task::spawn_local(portal.run());
            settle().await;
            assert_eq!(renders.get(), 0);

            let element = add(&document, r#"<x-clock prefix="1:"></x-clock>"#);
            document.set_attribute(element, "prefix", "2:").unwrap();
            document.set_attribute(element, "prefix", "3:").unwrap();
            settle().await;

            assert_eq!(renders.get(), 1);
            assert_eq!(document.text_content(element), "3:12:00");

            document.set_attribute(element, "prefix", "4:").unwrap();
            settle().await;
            assert_eq!(renders.get(), 2);
            assert_eq!(document.text_content(element), "4:12:00");

            // once unmounted the loop stops at its next wake-up
            portal.unmount();
            assert_eq!(document.text_content(element), "");

            let late = add(&document, r#"<x-clock prefix="5:"></x-clock>"#);
            settle().await;
            assert!(task.is_finished());
            assert_eq!(renders.get(), 2);
            assert_eq!(document.text_content(late), "");

            // a new mount picks up both instances
            let portal = overlay.mount().unwrap();
            let task = tokio::task::spawn_local(portal.run());
            settle().await;
            assert_eq!(document.text_content(element), "4:12:00");
            assert_eq!(document.text_content(late), "5:12:00");
            assert_eq!(portal.rendered_keys().len(), 2);

            document.remove(late).unwrap();
            settle().await;
            assert_eq!(portal.rendered_keys().len(), 1);

            drop(portal);
            document.remove(element).unwrap();
            task.await.unwrap();
        })
        .await;
}
