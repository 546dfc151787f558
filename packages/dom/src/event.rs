use crate::NodeId;
use std::rc::Rc;

/// A named DOM event.
///
/// `target` and `current_target` are filled in by [`crate::Document::dispatch_event`] as the event
/// travels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Event {
    name: String,
    detail: Option<String>,
    bubbles: bool,
    target: Option<NodeId>,
    current_target: Option<NodeId>,
}

impl Event {
    /// A non-bubbling event with no detail.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            detail: None,
            bubbles: false,
            target: None,
            current_target: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_bubbles(mut self, bubbles: bool) -> Self {
        self.bubbles = bubbles;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    pub fn bubbles(&self) -> bool {
        self.bubbles
    }

    /// The node the event was dispatched on.
    pub fn target(&self) -> Option<NodeId> {
        self.target
    }

    /// The node whose listener is currently running.
    pub fn current_target(&self) -> Option<NodeId> {
        self.current_target
    }

    pub(crate) fn retarget(&mut self, target: NodeId) {
        self.target = Some(target);
    }

    pub(crate) fn set_current_target(&mut self, current: NodeId) {
        self.current_target = Some(current);
    }
}

pub type Listener = Rc<dyn Fn(&Event)>;

/// Returned by [`crate::Document::add_event_listener`] so the listener can be removed again.
#[derive(Hash, PartialEq, Eq, Clone, Copy, Debug)]
pub struct ListenerId(pub(crate) u64);

pub(crate) struct RegisteredListener {
    pub id: ListenerId,
    pub name: String,
    pub callback: Listener,
}
