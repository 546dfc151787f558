use crate::PortalError;
use elemental_dom::{Event, NodeId, WeakDocument};
use indexmap::IndexMap;
use std::{
    fmt::Display,
    rc::Rc,
    sync::atomic::{AtomicU64, Ordering},
};

/// Identifies one custom element instance for as long as it lives.
///
/// Keys are minted from a process-wide counter and never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceKey(u64);

impl InstanceKey {
    pub(crate) fn mint() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl Display for InstanceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "instance-{}", self.0)
    }
}

/// The values of a fixed set of observed attributes.
///
/// A snapshot is never changed after it is built; an attribute change produces a new one.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct AttributeSnapshot {
    values: IndexMap<String, Option<String>>,
}

impl AttributeSnapshot {
    /// A snapshot where every name in `names` is absent.
    pub fn new(names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            values: names.into_iter().map(|name| (name.into(), None)).collect(),
        }
    }

    /// A copy of this snapshot with `name` set to `value`.
    ///
    /// Names outside of the declared set are ignored.
    pub fn with(&self, name: &str, value: Option<&str>) -> Self {
        let mut next = self.clone();
        if let Some(slot) = next.values.get_mut(name) {
            *slot = value.map(str::to_string);
        }
        next
    }

    /// The current value of `name`. Undeclared names are always absent.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name)?.as_deref()
    }

    /// Whether `name` is one of the declared attributes.
    pub fn declares(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Declared names and their values, in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.values
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_deref()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Raises DOM events on the custom element it was created for.
///
/// One dispatcher is bound per element, so clones compare equal with [`Dispatcher::ptr_eq`] across
/// renders.
#[derive(Clone)]
pub struct Dispatcher {
    target: Rc<DispatchTarget>,
}

struct DispatchTarget {
    tag_name: Rc<str>,
    document: WeakDocument,
    element: NodeId,
}

impl Dispatcher {
    pub(crate) fn new(tag_name: Rc<str>, document: WeakDocument, element: NodeId) -> Self {
        Self {
            target: Rc::new(DispatchTarget {
                tag_name,
                document,
                element,
            }),
        }
    }

    /// The element events are raised on.
    pub fn element(&self) -> NodeId {
        self.target.element
    }

    /// Raise `event` on the element. The event always bubbles.
    ///
    /// Returns how many listeners observed it.
    pub fn dispatch(&self, event: Event) -> Result<usize, PortalError> {
        let document = self
            .target
            .document
            .upgrade()
            .ok_or_else(|| PortalError::DocumentGone {
                tag: self.target.tag_name.to_string(),
            })?;

        Ok(document.dispatch_event(self.target.element, event.with_bubbles(true))?)
    }

    pub fn ptr_eq(&self, other: &Dispatcher) -> bool {
        Rc::ptr_eq(&self.target, &other.target)
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("tag_name", &self.target.tag_name)
            .field("element", &self.target.element)
            .finish()
    }
}

/// What a wrapped component is rendered with.
#[derive(Clone, Debug)]
pub struct Props {
    attributes: Rc<AttributeSnapshot>,
    dispatcher: Option<Dispatcher>,
}

impl Props {
    pub(crate) fn new(attributes: Rc<AttributeSnapshot>, dispatcher: Option<Dispatcher>) -> Self {
        Self {
            attributes,
            dispatcher,
        }
    }

    /// Shorthand for `self.attributes().get(name)`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes.get(name)
    }

    pub fn attributes(&self) -> &AttributeSnapshot {
        &self.attributes
    }

    /// The shared snapshot, for identity comparisons.
    pub fn snapshot(&self) -> &Rc<AttributeSnapshot> {
        &self.attributes
    }

    pub fn dispatcher(&self) -> Option<&Dispatcher> {
        self.dispatcher.as_ref()
    }

    /// Whether both props hold the very same snapshot and dispatcher.
    pub fn ptr_eq(&self, other: &Props) -> bool {
        let same_dispatcher = match (&self.dispatcher, &other.dispatcher) {
            (Some(a), Some(b)) => a.ptr_eq(b),
            (None, None) => true,
            _ => false,
        };
        Rc::ptr_eq(&self.attributes, &other.attributes) && same_dispatcher
    }
}

/// One live custom element as seen by the portal.
#[derive(Clone, Debug)]
pub struct InstanceRecord {
    pub(crate) element: NodeId,
    pub(crate) anchor: NodeId,
    pub(crate) props: Props,
}

impl InstanceRecord {
    /// The custom element itself.
    pub fn element(&self) -> NodeId {
        self.element
    }

    /// Where the component is rendered: the element or its shadow root.
    pub fn anchor(&self) -> NodeId {
        self.anchor
    }

    pub fn props(&self) -> &Props {
        &self.props
    }
}

/// Every connected instance of a wrapped tag.
///
/// A persistent map: publishing a new version never touches one a reader may still hold.
pub type InstanceMap = im_rc::OrdMap<InstanceKey, InstanceRecord>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshots_only_track_declared_names() {
        let empty = AttributeSnapshot::new(["prefix", "suffix"]);
        assert_eq!(empty.get("prefix"), None);
        assert_eq!(empty.len(), 2);

        let set = empty.with("prefix", Some("t:"));
        assert_eq!(set.get("prefix"), Some("t:"));
        assert_eq!(empty.get("prefix"), None);

        let ignored = set.with("color", Some("red"));
        assert_eq!(ignored, set);
        assert_eq!(ignored.get("color"), None);
        assert!(!ignored.declares("color"));

        assert_eq!(
            set.iter().collect::<Vec<_>>(),
            vec![("prefix", Some("t:")), ("suffix", None)]
        );
    }

    #[test]
    fn keys_are_unique() {
        let a = InstanceKey::mint();
        let b = InstanceKey::mint();
        assert_ne!(a, b);
        assert!(b.get() > a.get());
        assert_eq!(a.to_string(), format!("instance-{}", a.get()));
    }
}
