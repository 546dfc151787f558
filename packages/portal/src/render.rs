//! A small component model.
//!
//! Components turn [`Props`] into a [`VNode`] tree; [`render_into`] materializes that tree under any
//! anchor node, whether or not the anchor is part of the tree that owns the component.

use crate::Props;
use elemental_dom::{Document, DomError, Event, Listener, NodeId};
use std::rc::Rc;

/// Something that can be rendered with [`Props`].
///
/// Any `Fn(&Props) -> VNode` is a component.
pub trait Component: 'static {
    fn render(&self, props: &Props) -> VNode;
}

impl<F> Component for F
where
    F: Fn(&Props) -> VNode + 'static,
{
    fn render(&self, props: &Props) -> VNode {
        self(props)
    }
}

/// A description of DOM nodes to create.
#[derive(Clone)]
pub enum VNode {
    Element {
        tag: String,
        attributes: Vec<(String, String)>,
        listeners: Vec<(String, Listener)>,
        children: Vec<VNode>,
    },
    Text(String),
    Fragment(Vec<VNode>),
}

impl VNode {
    pub fn element(tag: impl Into<String>) -> Self {
        VNode::Element {
            tag: tag.into(),
            attributes: Vec::new(),
            listeners: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        VNode::Text(text.into())
    }

    pub fn fragment(children: impl IntoIterator<Item = VNode>) -> Self {
        VNode::Fragment(children.into_iter().collect())
    }

    /// Renders nothing.
    pub fn empty() -> Self {
        VNode::Fragment(Vec::new())
    }

    /// Set an attribute. No effect on text and fragments.
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        if let VNode::Element { attributes, .. } = &mut self {
            attributes.push((name.into(), value.into()));
        }
        self
    }

    /// Listen for `name` events on this element. No effect on text and fragments.
    pub fn on(mut self, name: impl Into<String>, listener: impl Fn(&Event) + 'static) -> Self {
        if let VNode::Element { listeners, .. } = &mut self {
            listeners.push((name.into(), Rc::new(listener)));
        }
        self
    }

    /// Append a child. No effect on text nodes.
    pub fn child(mut self, child: VNode) -> Self {
        match &mut self {
            VNode::Element { children, .. } | VNode::Fragment(children) => children.push(child),
            VNode::Text(_) => {}
        }
        self
    }

    pub fn children(self, children: impl IntoIterator<Item = VNode>) -> Self {
        children.into_iter().fold(self, VNode::child)
    }
}

impl std::fmt::Debug for VNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VNode::Element {
                tag,
                attributes,
                listeners,
                children,
            } => f
                .debug_struct("Element")
                .field("tag", tag)
                .field("attributes", attributes)
                .field(
                    "listeners",
                    &listeners.iter().map(|(name, _)| name).collect::<Vec<_>>(),
                )
                .field("children", children)
                .finish(),
            VNode::Text(text) => f.debug_tuple("Text").field(text).finish(),
            VNode::Fragment(children) => f.debug_tuple("Fragment").field(children).finish(),
        }
    }
}

/// A rendered [`VNode`] tree living under an anchor.
#[derive(Debug)]
pub struct Mounted {
    document: Document,
    anchor: NodeId,
    roots: Vec<NodeId>,
}

/// Create the nodes described by `node` and append them to `anchor`.
pub fn render_into(document: &Document, anchor: NodeId, node: &VNode) -> Result<Mounted, DomError> {
    let roots = build_roots(document, anchor, node)?;

    Ok(Mounted {
        document: document.clone(),
        anchor,
        roots,
    })
}

fn build_roots(document: &Document, anchor: NodeId, node: &VNode) -> Result<Vec<NodeId>, DomError> {
    if !document.contains(anchor) {
        return Err(DomError::UnknownNode(anchor));
    }

    let mut roots = Vec::new();
    build(document, node, &mut roots)?;

    // the roots are assembled detached so custom elements inside connect once, fully built
    for root in &roots {
        document.append_child(anchor, *root)?;
    }
    Ok(roots)
}

fn build(document: &Document, node: &VNode, out: &mut Vec<NodeId>) -> Result<(), DomError> {
    match node {
        VNode::Text(text) => out.push(document.create_text_node(text)),
        VNode::Fragment(children) => {
            for child in children {
                build(document, child, out)?;
            }
        }
        VNode::Element {
            tag,
            attributes,
            listeners,
            children,
        } => {
            let id = document.create_element(tag);
            for (name, value) in attributes {
                document.set_attribute(id, name, value)?;
            }
            for (name, listener) in listeners {
                let listener = listener.clone();
                document.add_event_listener(id, name, move |event| listener(event))?;
            }

            let mut built = Vec::new();
            for child in children {
                build(document, child, &mut built)?;
            }
            for child in built {
                document.append_child(id, child)?;
            }

            out.push(id);
        }
    }
    Ok(())
}

impl Mounted {
    pub fn anchor(&self) -> NodeId {
        self.anchor
    }

    /// The top-level nodes this tree added to the anchor.
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Swap the rendered nodes for a fresh rendering of `node`.
    pub fn replace(&mut self, node: &VNode) -> Result<(), DomError> {
        self.clear()?;
        self.roots = build_roots(&self.document, self.anchor, node)?;
        Ok(())
    }

    /// Remove and free every node this tree created.
    pub fn unmount(mut self) -> Result<(), DomError> {
        self.clear()
    }

    fn clear(&mut self) -> Result<(), DomError> {
        for root in self.roots.drain(..) {
            // the anchor may have been destroyed along with everything below it
            if self.document.contains(root) {
                self.document.destroy(root)?;
            }
        }
        Ok(())
    }
}
