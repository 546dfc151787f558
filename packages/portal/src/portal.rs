use crate::{
    element::ComponentElement,
    render::{render_into, Mounted},
    wrap::Wrapped,
    InstanceKey, InstanceMap, PortalError, Props,
};
use elemental_dom::{Document, ElementDefinition};
use elemental_signaling::SignalingCell;
use futures_util::future::{FutureExt, LocalBoxFuture};
use std::{
    cell::{Cell, RefCell},
    collections::BTreeMap,
    rc::Rc,
};

/// The always-mounted overlay returned by [`crate::wrap_as_web_component`].
///
/// An overlay renders nothing where it is mounted. Instead it portals its component into every
/// connected instance of its tag. Only one mount may be active at a time.
#[derive(Clone)]
pub struct Overlay {
    wrapped: Rc<Wrapped>,
}

impl Overlay {
    pub(crate) fn new(wrapped: Rc<Wrapped>) -> Self {
        Self { wrapped }
    }

    pub fn tag_name(&self) -> &str {
        &self.wrapped.tag_name
    }

    /// A handle to the instance map this overlay consumes.
    pub fn instances(&self) -> SignalingCell<InstanceMap> {
        self.wrapped.instances.clone()
    }

    pub fn is_defined(&self) -> bool {
        self.wrapped.defined.get()
    }

    pub fn is_mounted(&self) -> bool {
        self.wrapped.mounted.get()
    }

    /// Register the custom element with the document.
    ///
    /// Runs once per overlay; later calls do nothing.
    pub fn define(&self) -> Result<(), PortalError> {
        if self.wrapped.defined.get() {
            tracing::trace!(tag = %self.wrapped.tag_name, "already defined");
            return Ok(());
        }

        let document = self.document()?;
        let wrapped = self.wrapped.clone();
        let definition = ElementDefinition::new(wrapped.observed_attributes.clone(), move || {
            ComponentElement::new(wrapped.clone())
        });

        // claim the flag first: defining upgrades existing elements synchronously
        self.wrapped.defined.set(true);
        if let Err(err) = document.define(&self.wrapped.tag_name, definition) {
            self.wrapped.defined.set(false);
            return Err(err.into());
        }

        tracing::debug!(tag = %self.wrapped.tag_name, "defined");
        Ok(())
    }

    /// Start rendering.
    ///
    /// Fails with [`PortalError::AlreadyMounted`] while another mount of this overlay is active;
    /// nothing is rendered in that case. Drive the returned handle with [`MountedOverlay::run`], or
    /// step it with [`MountedOverlay::sync`].
    pub fn mount(&self) -> Result<MountedOverlay, PortalError> {
        if self.wrapped.mounted.get() {
            tracing::error!(tag = %self.wrapped.tag_name, "portal already mounted");
            return Err(PortalError::AlreadyMounted {
                tag: self.wrapped.tag_name.to_string(),
            });
        }

        let document = self.document()?;
        self.wrapped.mounted.set(true);

        tracing::debug!(tag = %self.wrapped.tag_name, "portal mounted");

        Ok(MountedOverlay {
            state: Rc::new(PortalState {
                wrapped: self.wrapped.clone(),
                document,
                cancelled: Cell::new(false),
                running: Cell::new(false),
                current: RefCell::new(None),
                rendered: RefCell::new(BTreeMap::new()),
            }),
        })
    }

    fn document(&self) -> Result<Document, PortalError> {
        self.wrapped
            .document
            .upgrade()
            .ok_or_else(|| PortalError::DocumentGone {
                tag: self.wrapped.tag_name.to_string(),
            })
    }
}

impl std::fmt::Debug for Overlay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Overlay")
            .field("tag_name", &self.wrapped.tag_name)
            .field("defined", &self.wrapped.defined.get())
            .field("mounted", &self.wrapped.mounted.get())
            .finish()
    }
}

/// An active mount of an [`Overlay`].
///
/// Dropping the handle (or calling [`MountedOverlay::unmount`]) stops the loop, removes everything
/// it rendered and allows the overlay to be mounted again.
pub struct MountedOverlay {
    state: Rc<PortalState>,
}

struct PortalState {
    wrapped: Rc<Wrapped>,
    document: Document,
    cancelled: Cell<bool>,

    /// Set while a [`MountedOverlay::run`] loop exists for this mount.
    running: Cell<bool>,

    /// The last instance map this mount has seen.
    current: RefCell<Option<InstanceMap>>,
    rendered: RefCell<BTreeMap<InstanceKey, RenderedInstance>>,
}

enum Action {
    Mount,
    Rerender,
    Remount,
}

struct RenderedInstance {
    props: Props,
    tree: Mounted,
}

impl MountedOverlay {
    /// The synchronization loop: render the current instances, wait for the next change, repeat.
    ///
    /// The future finishes at the first wake-up after the mount is dropped. Spawn it on a local
    /// executor such as `tokio::task::spawn_local`.
    ///
    /// A mount has a single consumer: while one loop exists, further calls return a future that
    /// completes immediately.
    pub fn run(&self) -> LocalBoxFuture<'static, ()> {
        let state = self.state.clone();

        if state.running.replace(true) {
            tracing::warn!(tag = %state.wrapped.tag_name, "portal loop is already running");
            return futures_util::future::ready(()).boxed_local();
        }
        let running = RunningLoop(state.clone());

        async move {
            loop {
                if state.cancelled.get() {
                    break;
                }

                let next = state.wrapped.instances.next();
                state.sync();
                next.await;
            }

            tracing::debug!(tag = %state.wrapped.tag_name, "portal loop finished");
            drop(running);
        }
        .boxed_local()
    }

    /// Render whatever the instance map holds right now.
    pub fn sync(&self) {
        self.state.sync();
    }

    /// Keys of the instances currently rendered, in key order.
    pub fn rendered_keys(&self) -> Vec<InstanceKey> {
        self.state.rendered.borrow().keys().copied().collect()
    }

    /// The props each instance was last rendered with.
    pub fn rendered_props(&self, key: InstanceKey) -> Option<Props> {
        self.state
            .rendered
            .borrow()
            .get(&key)
            .map(|rendered| rendered.props.clone())
    }

    pub fn tag_name(&self) -> &str {
        &self.state.wrapped.tag_name
    }

    pub fn unmount(self) {
        drop(self)
    }
}

impl Drop for MountedOverlay {
    fn drop(&mut self) {
        self.state.shutdown();
    }
}

impl std::fmt::Debug for MountedOverlay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MountedOverlay")
            .field("tag_name", &self.state.wrapped.tag_name)
            .field("rendered", &self.rendered_keys())
            .finish()
    }
}

/// Clears [`PortalState::running`] when the loop future finishes or is dropped.
struct RunningLoop(Rc<PortalState>);

impl Drop for RunningLoop {
    fn drop(&mut self) {
        self.0.running.set(false);
    }
}

impl PortalState {
    fn sync(&self) {
        if self.cancelled.get() {
            return;
        }

        if let Some(instances) = self.wrapped.instances.get_state() {
            *self.current.borrow_mut() = Some(instances);
            self.commit();
        }
    }

    /// Reconcile the rendered trees with `current`, keyed by instance.
    fn commit(&self) {
        let Some(instances) = self.current.borrow().clone() else {
            return;
        };

        let tag = &self.wrapped.tag_name;
        let mut rendered = self.rendered.borrow_mut();

        let gone: Vec<InstanceKey> = rendered
            .keys()
            .filter(|key| !instances.contains_key(*key))
            .copied()
            .collect();

        for key in gone {
            if let Some(instance) = rendered.remove(&key) {
                tracing::trace!(%tag, %key, "unmounting instance");
                if let Err(err) = instance.tree.unmount() {
                    tracing::warn!(%tag, %key, "failed to unmount: {err}");
                }
            }
        }

        for (key, record) in instances.iter() {
            let action = match rendered.get(key) {
                Some(existing)
                    if existing.tree.anchor() == record.anchor()
                        && existing.props.ptr_eq(record.props()) =>
                {
                    continue
                }
                Some(existing) if existing.tree.anchor() == record.anchor() => Action::Rerender,
                Some(_) => Action::Remount,
                None => Action::Mount,
            };

            let node = self.wrapped.component.render(record.props());

            if let (Action::Rerender, Some(existing)) = (&action, rendered.get_mut(key)) {
                tracing::trace!(%tag, %key, "re-rendering instance");
                match existing.tree.replace(&node) {
                    Ok(()) => existing.props = record.props().clone(),
                    Err(err) => tracing::warn!(%tag, %key, "failed to re-render: {err}"),
                }
                continue;
            }

            if let (Action::Remount, Some(stale)) = (&action, rendered.remove(key)) {
                if let Err(err) = stale.tree.unmount() {
                    tracing::warn!(%tag, %key, "failed to unmount: {err}");
                }
            }

            tracing::trace!(%tag, %key, anchor = %record.anchor(), "rendering instance");
            match render_into(&self.document, record.anchor(), &node) {
                Ok(tree) => {
                    rendered.insert(
                        *key,
                        RenderedInstance {
                            props: record.props().clone(),
                            tree,
                        },
                    );
                }
                Err(err) => tracing::warn!(%tag, %key, "failed to render: {err}"),
            }
        }
    }

    fn shutdown(&self) {
        if self.cancelled.replace(true) {
            return;
        }

        self.wrapped.mounted.set(false);
        self.current.borrow_mut().take();

        let rendered = std::mem::take(&mut *self.rendered.borrow_mut());
        for (key, instance) in rendered {
            if let Err(err) = instance.tree.unmount() {
                tracing::warn!(tag = %self.wrapped.tag_name, %key, "failed to unmount: {err}");
            }
        }

        tracing::debug!(tag = %self.wrapped.tag_name, "portal unmounted");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{VNode, WrapConfig};
    use elemental_dom::CustomElement;

    fn wrapped(document: &Document, instances: SignalingCell<InstanceMap>) -> Rc<Wrapped> {
        Rc::new(Wrapped {
            tag_name: "x-probe".into(),
            observed_attributes: vec!["label".to_string()],
            config: WrapConfig::new(),
            component: Rc::new(|props: &Props| VNode::text(props.get("label").unwrap_or("?"))),
            document: document.downgrade(),
            instances,
            defined: Cell::new(false),
            mounted: Cell::new(false),
        })
    }

    #[test]
    fn absent_state_renders_nothing() {
        let document = Document::new();
        let overlay = Overlay::new(wrapped(&document, SignalingCell::empty()));

        let portal = overlay.mount().unwrap();
        portal.sync();

        assert!(portal.rendered_keys().is_empty());
        assert_eq!(document.inner_html(document.body()), "");
    }

    #[test]
    fn a_mount_runs_a_single_loop() {
        let document = Document::new();
        let overlay = Overlay::new(wrapped(&document, SignalingCell::new(InstanceMap::new())));
        let portal = overlay.mount().unwrap();

        let mut first = portal.run();
        assert!((&mut first).now_or_never().is_none());

        // the duplicate finishes at once and never touches the cell
        assert_eq!(portal.run().now_or_never(), Some(()));
        assert!((&mut first).now_or_never().is_none());

        // dropping the loop frees the mount for another one
        drop(first);
        assert!(portal.run().now_or_never().is_none());
    }

    #[test]
    fn disconnect_without_connect_is_ignored() {
        let document = Document::new();
        let wrapped = wrapped(&document, SignalingCell::new(InstanceMap::new()));

        let element = document.create_element("div");
        let this = document.element_ref(element).unwrap();
        let adapter = ComponentElement::new(wrapped.clone());

        adapter.disconnected_callback(&this);
        assert_eq!(wrapped.instances.version(), 0);

        adapter.connected_callback(&this);
        adapter.disconnected_callback(&this);
        adapter.disconnected_callback(&this);
        assert_eq!(wrapped.instances.version(), 2);
        assert_eq!(wrapped.instances.get_state().map(|map| map.len()), Some(0));
    }

    #[test]
    fn adapter_props_track_attributes() {
        let document = Document::new();
        let wrapped = wrapped(&document, SignalingCell::new(InstanceMap::new()));

        let element = document.create_element("div");
        let this = document.element_ref(element).unwrap();
        let adapter = ComponentElement::new(wrapped);

        let before = adapter.props();
        assert_eq!(before.get("label"), None);
        assert!(before.ptr_eq(&adapter.props()));

        adapter.attribute_changed_callback(&this, "label", None, Some("one"));
        let after = adapter.props();
        assert_eq!(after.get("label"), Some("one"));
        assert!(!before.ptr_eq(&after));
    }
}
