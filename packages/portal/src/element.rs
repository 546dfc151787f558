use crate::{
    wrap::Wrapped, AttributeSnapshot, Dispatcher, InstanceKey, InstanceRecord, Props,
};
use elemental_dom::{CustomElement, ElementRef, NodeId};
use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

/// The custom element behavior behind every wrapped tag.
///
/// Each instance owns one entry of the wrapper's instance map while it is connected. Its own
/// attribute state is only ever touched by its own callbacks, which the document delivers serially.
pub(crate) struct ComponentElement {
    wrapped: Rc<Wrapped>,
    key: Cell<Option<InstanceKey>>,
    published: Cell<bool>,
    anchor: Cell<Option<NodeId>>,
    snapshot: RefCell<Rc<AttributeSnapshot>>,
    dispatcher: RefCell<Option<Dispatcher>>,
}

impl ComponentElement {
    pub(crate) fn new(wrapped: Rc<Wrapped>) -> Self {
        let snapshot = AttributeSnapshot::new(wrapped.observed_attributes.iter().cloned());

        Self {
            wrapped,
            key: Cell::new(None),
            published: Cell::new(false),
            anchor: Cell::new(None),
            snapshot: RefCell::new(Rc::new(snapshot)),
            dispatcher: RefCell::new(None),
        }
    }

    /// The current snapshot, plus the dispatcher if the wrapper asked for one.
    pub(crate) fn props(&self) -> Props {
        Props::new(
            self.snapshot.borrow().clone(),
            self.dispatcher.borrow().clone(),
        )
    }

    fn key(&self) -> InstanceKey {
        match self.key.get() {
            Some(key) => key,
            None => {
                let key = InstanceKey::mint();
                self.key.set(Some(key));
                key
            }
        }
    }

    fn anchor(&self, this: &ElementRef) -> NodeId {
        if let Some(anchor) = self.anchor.get() {
            return anchor;
        }

        let anchor = match self.wrapped.config.shadow_mode() {
            Some(mode) => match this.attach_shadow(mode) {
                Ok(shadow) => shadow,
                Err(err) => {
                    tracing::warn!(
                        tag = %self.wrapped.tag_name,
                        "could not attach a {mode} shadow root, rendering into the element: {err}"
                    );
                    this.id()
                }
            },
            None => this.id(),
        };

        self.anchor.set(Some(anchor));
        anchor
    }

    fn bind_dispatcher(&self, this: &ElementRef) {
        if !self.wrapped.config.dispatch_events() {
            return;
        }

        let mut dispatcher = self.dispatcher.borrow_mut();
        if dispatcher.is_none() {
            *dispatcher = Some(Dispatcher::new(
                self.wrapped.tag_name.clone(),
                this.document().downgrade(),
                this.id(),
            ));
        }
    }

    fn publish(&self, key: InstanceKey, record: InstanceRecord) {
        tracing::trace!(tag = %self.wrapped.tag_name, %key, "publishing instance");
        self.wrapped
            .instances
            .patch_state(|map| map.cloned().unwrap_or_default().update(key, record));
    }
}

impl CustomElement for ComponentElement {
    fn connected_callback(&self, this: &ElementRef) {
        let key = self.key();
        let anchor = self.anchor(this);
        self.bind_dispatcher(this);

        tracing::debug!(tag = %self.wrapped.tag_name, %key, element = %this.id(), "connected");

        self.publish(
            key,
            InstanceRecord {
                element: this.id(),
                anchor,
                props: self.props(),
            },
        );
        self.published.set(true);
    }

    fn disconnected_callback(&self, this: &ElementRef) {
        let key = match (self.key.get(), self.published.get()) {
            (Some(key), true) => key,
            _ => {
                tracing::trace!(tag = %self.wrapped.tag_name, element = %this.id(), "disconnected before connecting");
                return;
            }
        };

        tracing::debug!(tag = %self.wrapped.tag_name, %key, element = %this.id(), "disconnected");

        self.published.set(false);
        self.wrapped
            .instances
            .patch_state(|map| map.cloned().unwrap_or_default().without(&key));
    }

    fn attribute_changed_callback(
        &self,
        this: &ElementRef,
        name: &str,
        _old_value: Option<&str>,
        new_value: Option<&str>,
    ) {
        let next = self.snapshot.borrow().with(name, new_value);
        *self.snapshot.borrow_mut() = Rc::new(next);

        tracing::trace!(tag = %self.wrapped.tag_name, element = %this.id(), name, value = ?new_value, "attribute changed");

        if let (Some(key), true, Some(anchor)) =
            (self.key.get(), self.published.get(), self.anchor.get())
        {
            self.publish(
                key,
                InstanceRecord {
                    element: this.id(),
                    anchor,
                    props: self.props(),
                },
            );
        }
    }
}
