use crate::registry::{CustomElement, ElementDefinition};
use indexmap::IndexMap;
use std::{fmt::Display, rc::Rc};

/// A handle to a node in a [`crate::Document`].
///
/// Ids carry a generation so a handle to a destroyed node never aliases a newer node that reuses
/// its slot.
#[derive(Hash, PartialEq, Eq, Clone, Copy, Debug, PartialOrd, Ord)]
pub struct NodeId {
    pub(crate) slot: usize,
    pub(crate) generation: u64,
}

impl Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.slot)
    }
}

/// How much of a shadow root is visible to code outside of its host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "lowercase"))]
pub enum ShadowMode {
    /// The root is reachable through [`crate::Document::shadow_root`].
    Open,
    /// The root is only known to whoever attached it.
    Closed,
}

impl ShadowMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShadowMode::Open => "open",
            ShadowMode::Closed => "closed",
        }
    }
}

impl Display for ShadowMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub(crate) struct Node {
    pub generation: u64,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub kind: NodeKind,
}

pub(crate) enum NodeKind {
    Document,
    Element(ElementData),
    Text(String),
    ShadowRoot { host: NodeId, mode: ShadowMode },
}

pub(crate) struct ElementData {
    pub tag: String,
    pub attributes: IndexMap<String, String>,
    pub shadow_root: Option<NodeId>,
    pub behavior: Option<Upgraded>,
}

impl ElementData {
    pub fn new(tag: String) -> Self {
        Self {
            tag,
            attributes: IndexMap::new(),
            shadow_root: None,
            behavior: None,
        }
    }
}

/// The custom element instance attached to an element once its tag has been defined.
pub(crate) struct Upgraded {
    pub definition: Rc<ElementDefinition>,
    pub instance: Rc<dyn CustomElement>,
}
