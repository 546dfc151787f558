use crate::event::RegisteredListener;
use crate::node::{ElementData, Node, NodeKind, Upgraded};
use crate::registry::is_valid_custom_element_name;
use crate::{
    CustomElement, DomError, ElementDefinition, ElementRef, Event, ListenerId, NodeId, ShadowMode,
};
use rustc_hash::FxHashMap;
use slab::Slab;
use std::{
    cell::RefCell,
    rc::{Rc, Weak},
};

/// An in-memory document tree.
///
/// Cloning a `Document` produces another handle to the same tree. The document starts out with a
/// root node and a `body` element; anything appended below the root (directly or through a shadow
/// root's host) is *connected* and receives custom element lifecycle callbacks.
#[derive(Clone)]
pub struct Document {
    inner: Rc<RefCell<DocumentInner>>,
}

/// A handle that does not keep the document alive.
#[derive(Clone, Default)]
pub struct WeakDocument {
    inner: Weak<RefCell<DocumentInner>>,
}

impl WeakDocument {
    pub fn upgrade(&self) -> Option<Document> {
        self.inner.upgrade().map(|inner| Document { inner })
    }
}

struct DocumentInner {
    nodes: Slab<Node>,
    generation: u64,
    root: NodeId,
    body: NodeId,
    registry: FxHashMap<String, Rc<ElementDefinition>>,
    listeners: FxHashMap<NodeId, Vec<RegisteredListener>>,
    next_listener: u64,
}

enum Reaction {
    Connected,
    Disconnected,
    AttributeChanged {
        name: String,
        old_value: Option<String>,
        new_value: Option<String>,
    },
}

struct PendingReaction {
    instance: Rc<dyn CustomElement>,
    element: NodeId,
    reaction: Reaction,
}

enum Target {
    Ready(Rc<dyn CustomElement>),
    Upgrade(Rc<ElementDefinition>),
}

impl DocumentInner {
    fn insert(&mut self, kind: NodeKind) -> NodeId {
        self.generation += 1;
        let generation = self.generation;
        let entry = self.nodes.vacant_entry();
        let id = NodeId {
            slot: entry.key(),
            generation,
        };
        entry.insert(Node {
            generation,
            parent: None,
            children: Vec::new(),
            kind,
        });
        id
    }

    fn node(&self, id: NodeId) -> Result<&Node, DomError> {
        self.nodes
            .get(id.slot)
            .filter(|node| node.generation == id.generation)
            .ok_or(DomError::UnknownNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, DomError> {
        self.nodes
            .get_mut(id.slot)
            .filter(|node| node.generation == id.generation)
            .ok_or(DomError::UnknownNode(id))
    }

    fn element(&self, id: NodeId) -> Result<&ElementData, DomError> {
        match &self.node(id)?.kind {
            NodeKind::Element(element) => Ok(element),
            _ => Err(DomError::NotAnElement(id)),
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Result<&mut ElementData, DomError> {
        match &mut self.node_mut(id)?.kind {
            NodeKind::Element(element) => Ok(element),
            _ => Err(DomError::NotAnElement(id)),
        }
    }

    /// The parent of a node, or the host of a shadow root.
    fn parent_or_host(&self, id: NodeId) -> Option<NodeId> {
        let node = self.node(id).ok()?;
        match node.kind {
            NodeKind::ShadowRoot { host, .. } => Some(host),
            _ => node.parent,
        }
    }

    fn is_connected(&self, id: NodeId) -> bool {
        let mut current = id;
        loop {
            if current == self.root {
                return true;
            }
            match self.parent_or_host(current) {
                Some(next) => current = next,
                None => return false,
            }
        }
    }

    fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent_or_host(id);
        }
        false
    }

    /// `root` and everything below it, shadow trees included, in tree order.
    fn shadow_including_descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let Ok(node) = self.node(id) else { continue };
            out.push(id);
            stack.extend(node.children.iter().rev().copied());
            if let NodeKind::Element(ElementData {
                shadow_root: Some(shadow),
                ..
            }) = &node.kind
            {
                stack.push(*shadow);
            }
        }
        out
    }

    fn detach(&mut self, child: NodeId) -> Result<Option<NodeId>, DomError> {
        let parent = self.node_mut(child)?.parent.take();
        if let Some(parent) = parent {
            self.node_mut(parent)?.children.retain(|c| *c != child);
        }
        Ok(parent)
    }

    fn disconnect_reactions(&self, root: NodeId) -> Vec<PendingReaction> {
        self.shadow_including_descendants(root)
            .into_iter()
            .filter_map(|id| {
                let behavior = self.element(id).ok()?.behavior.as_ref()?;
                Some(PendingReaction {
                    instance: behavior.instance.clone(),
                    element: id,
                    reaction: Reaction::Disconnected,
                })
            })
            .collect()
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Document")
            .field("nodes", &inner.nodes.len())
            .field("defined", &inner.registry.len())
            .finish()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        let mut inner = DocumentInner {
            nodes: Slab::new(),
            generation: 0,
            root: NodeId {
                slot: 0,
                generation: 0,
            },
            body: NodeId {
                slot: 0,
                generation: 0,
            },
            registry: FxHashMap::default(),
            listeners: FxHashMap::default(),
            next_listener: 0,
        };

        let root = inner.insert(NodeKind::Document);
        let body = inner.insert(NodeKind::Element(ElementData::new("body".to_string())));
        inner.nodes[body.slot].parent = Some(root);
        inner.nodes[root.slot].children.push(body);
        inner.root = root;
        inner.body = body;

        Self {
            inner: Rc::new(RefCell::new(inner)),
        }
    }

    pub fn downgrade(&self) -> WeakDocument {
        WeakDocument {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Whether two handles point at the same document.
    pub fn ptr_eq(&self, other: &Document) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn root(&self) -> NodeId {
        self.inner.borrow().root
    }

    pub fn body(&self) -> NodeId {
        self.inner.borrow().body
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.inner.borrow().node(id).is_ok()
    }

    /// Create a detached element.
    ///
    /// If `tag` has been defined, the custom element instance is constructed right away.
    pub fn create_element(&self, tag: &str) -> NodeId {
        let tag = tag.to_ascii_lowercase();
        let definition = self.inner.borrow().registry.get(&tag).cloned();

        let mut element = ElementData::new(tag);
        if let Some(definition) = definition {
            let instance = definition.construct();
            element.behavior = Some(Upgraded {
                definition,
                instance,
            });
        }

        self.inner.borrow_mut().insert(NodeKind::Element(element))
    }

    /// A handle to an element, as passed to lifecycle callbacks.
    pub fn element_ref(&self, id: NodeId) -> Option<ElementRef> {
        self.inner.borrow().element(id).ok()?;
        Some(ElementRef::new(self.clone(), id))
    }

    pub fn create_text_node(&self, text: &str) -> NodeId {
        self.inner
            .borrow_mut()
            .insert(NodeKind::Text(text.to_string()))
    }

    pub fn set_text(&self, id: NodeId, text: &str) -> Result<(), DomError> {
        match &mut self.inner.borrow_mut().node_mut(id)?.kind {
            NodeKind::Text(value) => {
                *value = text.to_string();
                Ok(())
            }
            _ => Err(DomError::NotAText(id)),
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.inner.borrow().node(id).ok()?.parent
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.inner
            .borrow()
            .node(id)
            .map(|node| node.children.clone())
            .unwrap_or_default()
    }

    /// The lowercase tag of an element.
    pub fn tag_name(&self, id: NodeId) -> Option<String> {
        self.inner
            .borrow()
            .element(id)
            .ok()
            .map(|element| element.tag.clone())
    }

    pub fn is_connected(&self, id: NodeId) -> bool {
        let inner = self.inner.borrow();
        inner.node(id).is_ok() && inner.is_connected(id)
    }

    /// Insert `child` as the last child of `parent`, moving it out of its current parent first.
    pub fn append_child(&self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        let mut reactions = {
            let mut inner = self.inner.borrow_mut();

            let accepts_children = !matches!(inner.node(parent)?.kind, NodeKind::Text(_));
            let insertable = matches!(
                inner.node(child)?.kind,
                NodeKind::Element(_) | NodeKind::Text(_)
            );
            if !accepts_children || !insertable || inner.is_inclusive_ancestor(child, parent) {
                return Err(DomError::HierarchyRequest { parent, child });
            }

            let was_connected = inner.is_connected(child);
            let reactions = if was_connected {
                inner.disconnect_reactions(child)
            } else {
                Vec::new()
            };

            inner.detach(child)?;
            inner.node_mut(child)?.parent = Some(parent);
            inner.node_mut(parent)?.children.push(child);

            log::trace!("appended {child} to {parent}");

            reactions
        };

        if self.is_connected(parent) {
            reactions.extend(self.connect_reactions(child, None));
        }

        self.run_reactions(reactions);
        Ok(())
    }

    /// Detach `child` from `parent`. The node stays alive and can be inserted again.
    pub fn remove_child(&self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        if self.inner.borrow().node(child)?.parent != Some(parent) {
            return Err(DomError::NotAChild { parent, child });
        }
        self.remove(child)
    }

    /// Detach a node from whatever parent it has.
    pub fn remove(&self, node: NodeId) -> Result<(), DomError> {
        let reactions = {
            let mut inner = self.inner.borrow_mut();
            let was_connected = inner.is_connected(node);
            if inner.detach(node)?.is_none() {
                return Ok(());
            }
            log::trace!("removed {node}");
            if was_connected {
                inner.disconnect_reactions(node)
            } else {
                Vec::new()
            }
        };

        self.run_reactions(reactions);
        Ok(())
    }

    /// Detach a node and free it together with everything below it.
    pub fn destroy(&self, node: NodeId) -> Result<(), DomError> {
        self.remove(node)?;

        let mut inner = self.inner.borrow_mut();
        // a disconnected callback may have moved the node somewhere else
        if inner.node(node)?.parent.is_some() {
            return Ok(());
        }

        for id in inner.shadow_including_descendants(node) {
            inner.nodes.remove(id.slot);
            inner.listeners.remove(&id);
        }

        log::trace!("destroyed {node}");
        Ok(())
    }

    pub fn get_attribute(&self, id: NodeId, name: &str) -> Option<String> {
        self.inner
            .borrow()
            .element(id)
            .ok()?
            .attributes
            .get(&name.to_ascii_lowercase())
            .cloned()
    }

    /// Attribute names of an element in insertion order.
    pub fn attribute_names(&self, id: NodeId) -> Vec<String> {
        self.inner
            .borrow()
            .element(id)
            .map(|element| element.attributes.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn set_attribute(&self, id: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        self.change_attribute(id, name, Some(value))
    }

    pub fn remove_attribute(&self, id: NodeId, name: &str) -> Result<(), DomError> {
        self.change_attribute(id, name, None)
    }

    fn change_attribute(
        &self,
        id: NodeId,
        name: &str,
        value: Option<&str>,
    ) -> Result<(), DomError> {
        let name = name.to_ascii_lowercase();

        let reaction = {
            let mut inner = self.inner.borrow_mut();
            let element = inner.element_mut(id)?;

            let old_value = match value {
                Some(value) => element.attributes.insert(name.clone(), value.to_string()),
                None => element.attributes.shift_remove(&name),
            };

            if old_value.is_none() && value.is_none() {
                return Ok(());
            }

            element
                .behavior
                .as_ref()
                .filter(|behavior| behavior.definition.observes(&name))
                .map(|behavior| PendingReaction {
                    instance: behavior.instance.clone(),
                    element: id,
                    reaction: Reaction::AttributeChanged {
                        name,
                        old_value,
                        new_value: value.map(str::to_string),
                    },
                })
        };

        self.run_reactions(reaction.into_iter().collect());
        Ok(())
    }

    /// Attach a shadow root to `host` and return it.
    pub fn attach_shadow(&self, host: NodeId, mode: ShadowMode) -> Result<NodeId, DomError> {
        let mut inner = self.inner.borrow_mut();
        if inner.element(host)?.shadow_root.is_some() {
            return Err(DomError::ShadowRootExists(host));
        }

        let shadow = inner.insert(NodeKind::ShadowRoot { host, mode });
        inner.element_mut(host)?.shadow_root = Some(shadow);

        log::trace!("attached {mode} shadow root {shadow} to {host}");
        Ok(shadow)
    }

    /// The shadow root of `host`, unless there is none or it is closed.
    pub fn shadow_root(&self, host: NodeId) -> Option<NodeId> {
        let inner = self.inner.borrow();
        let shadow = inner.element(host).ok()?.shadow_root?;
        match inner.node(shadow).ok()?.kind {
            NodeKind::ShadowRoot {
                mode: ShadowMode::Open,
                ..
            } => Some(shadow),
            _ => None,
        }
    }

    /// The host element of a shadow root.
    pub fn shadow_host(&self, shadow: NodeId) -> Option<NodeId> {
        match self.inner.borrow().node(shadow).ok()?.kind {
            NodeKind::ShadowRoot { host, .. } => Some(host),
            _ => None,
        }
    }

    /// Register custom element behavior for `name`.
    ///
    /// Elements with that tag that are already connected are upgraded immediately: they receive an
    /// attribute-changed callback for every observed attribute they carry, then a connected
    /// callback.
    pub fn define(&self, name: &str, definition: ElementDefinition) -> Result<(), DomError> {
        if !is_valid_custom_element_name(name) {
            return Err(DomError::InvalidCustomElementName(name.to_string()));
        }

        let root = {
            let mut inner = self.inner.borrow_mut();
            if inner.registry.contains_key(name) {
                return Err(DomError::AlreadyDefined(name.to_string()));
            }
            inner
                .registry
                .insert(name.to_string(), Rc::new(definition));
            inner.root
        };

        log::debug!("defined custom element <{name}>");

        let reactions = self.connect_reactions(root, Some(name));
        self.run_reactions(reactions);
        Ok(())
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.inner.borrow().registry.contains_key(name)
    }

    pub fn add_event_listener(
        &self,
        node: NodeId,
        name: &str,
        listener: impl Fn(&Event) + 'static,
    ) -> Result<ListenerId, DomError> {
        let mut inner = self.inner.borrow_mut();
        inner.node(node)?;

        inner.next_listener += 1;
        let id = ListenerId(inner.next_listener);
        inner
            .listeners
            .entry(node)
            .or_default()
            .push(RegisteredListener {
                id,
                name: name.to_string(),
                callback: Rc::new(listener),
            });
        Ok(id)
    }

    pub fn remove_event_listener(&self, node: NodeId, listener: ListenerId) {
        if let Some(listeners) = self.inner.borrow_mut().listeners.get_mut(&node) {
            listeners.retain(|registered| registered.id != listener);
        }
    }

    /// Dispatch `event` at `target`, then at each ancestor if it bubbles.
    ///
    /// Bubbling crosses shadow boundaries to the host. Returns how many listeners ran.
    pub fn dispatch_event(&self, target: NodeId, mut event: Event) -> Result<usize, DomError> {
        let path = {
            let inner = self.inner.borrow();
            inner.node(target)?;

            let mut nodes = vec![target];
            if event.bubbles() {
                let mut current = target;
                while let Some(next) = inner.parent_or_host(current) {
                    nodes.push(next);
                    current = next;
                }
            }

            let mut path = Vec::new();
            for node in nodes {
                let Some(listeners) = inner.listeners.get(&node) else { continue };
                path.extend(
                    listeners
                        .iter()
                        .filter(|registered| registered.name == event.name())
                        .map(|registered| (node, registered.callback.clone())),
                );
            }
            path
        };

        log::trace!(
            "dispatching {:?} at {target} to {} listeners",
            event.name(),
            path.len()
        );

        event.retarget(target);
        for (current, callback) in &path {
            event.set_current_target(*current);
            callback(&event);
        }

        Ok(path.len())
    }

    /// Elements with tag `tag` below `root` in the light tree. Shadow trees are not searched.
    pub fn query_selector_all(&self, root: NodeId, tag: &str) -> Vec<NodeId> {
        let tag = tag.to_ascii_lowercase();
        let inner = self.inner.borrow();

        let mut found = Vec::new();
        let mut stack: Vec<NodeId> = inner
            .node(root)
            .map(|node| node.children.iter().rev().copied().collect())
            .unwrap_or_default();
        while let Some(id) = stack.pop() {
            let Ok(node) = inner.node(id) else { continue };
            if matches!(&node.kind, NodeKind::Element(element) if element.tag == tag) {
                found.push(id);
            }
            stack.extend(node.children.iter().rev().copied());
        }
        found
    }

    /// Concatenated text of the light tree below `id`.
    pub fn text_content(&self, id: NodeId) -> String {
        let inner = self.inner.borrow();
        let mut out = String::new();
        collect_text(&inner, id, false, &mut out);
        out
    }

    /// The text a user would see for `id`: a shadow host shows its shadow tree instead of its
    /// children.
    pub fn rendered_text(&self, id: NodeId) -> String {
        let inner = self.inner.borrow();
        let mut out = String::new();
        collect_text(&inner, id, true, &mut out);
        out
    }

    /// Lifecycle reactions for connecting the tree at `root`, upgrading elements whose tag has a
    /// definition on the way. With `only_tag` set, only elements of that tag are considered.
    fn connect_reactions(&self, root: NodeId, only_tag: Option<&str>) -> Vec<PendingReaction> {
        let targets: Vec<(NodeId, Target)> = {
            let inner = self.inner.borrow();
            inner
                .shadow_including_descendants(root)
                .into_iter()
                .filter_map(|id| {
                    let element = inner.element(id).ok()?;
                    if only_tag.map_or(false, |tag| tag != element.tag) {
                        return None;
                    }
                    match &element.behavior {
                        Some(behavior) => Some((id, Target::Ready(behavior.instance.clone()))),
                        None => inner
                            .registry
                            .get(&element.tag)
                            .map(|definition| (id, Target::Upgrade(definition.clone()))),
                    }
                })
                .collect()
        };

        let mut reactions = Vec::new();
        for (id, target) in targets {
            let instance = match target {
                Target::Ready(instance) => instance,
                Target::Upgrade(definition) => {
                    match self.upgrade(id, definition, &mut reactions) {
                        Some(instance) => instance,
                        None => continue,
                    }
                }
            };
            reactions.push(PendingReaction {
                instance,
                element: id,
                reaction: Reaction::Connected,
            });
        }
        reactions
    }

    fn upgrade(
        &self,
        id: NodeId,
        definition: Rc<ElementDefinition>,
        reactions: &mut Vec<PendingReaction>,
    ) -> Option<Rc<dyn CustomElement>> {
        let instance = definition.construct();

        let mut inner = self.inner.borrow_mut();
        let element = inner.element_mut(id).ok()?;

        for (name, value) in &element.attributes {
            if definition.observes(name) {
                reactions.push(PendingReaction {
                    instance: instance.clone(),
                    element: id,
                    reaction: Reaction::AttributeChanged {
                        name: name.clone(),
                        old_value: None,
                        new_value: Some(value.clone()),
                    },
                });
            }
        }

        log::trace!("upgraded <{}> {id}", element.tag);

        element.behavior = Some(Upgraded {
            definition,
            instance: instance.clone(),
        });
        Some(instance)
    }

    fn run_reactions(&self, reactions: Vec<PendingReaction>) {
        for PendingReaction {
            instance,
            element,
            reaction,
        } in reactions
        {
            let this = ElementRef::new(self.clone(), element);
            match reaction {
                Reaction::Connected => instance.connected_callback(&this),
                Reaction::Disconnected => instance.disconnected_callback(&this),
                Reaction::AttributeChanged {
                    name,
                    old_value,
                    new_value,
                } => instance.attribute_changed_callback(
                    &this,
                    &name,
                    old_value.as_deref(),
                    new_value.as_deref(),
                ),
            }
        }
    }

    pub(crate) fn with_inner<O>(&self, f: impl FnOnce(&DocumentView<'_>) -> O) -> O {
        let inner = self.inner.borrow();
        f(&DocumentView { inner: &inner })
    }
}

fn collect_text(inner: &DocumentInner, id: NodeId, composed: bool, out: &mut String) {
    let Ok(node) = inner.node(id) else { return };
    match &node.kind {
        NodeKind::Text(text) => out.push_str(text),
        NodeKind::Element(ElementData {
            shadow_root: Some(shadow),
            ..
        }) if composed => collect_text(inner, *shadow, composed, out),
        _ => {
            for child in &node.children {
                collect_text(inner, *child, composed, out);
            }
        }
    }
}

/// Read-only access to the tree for the serializer.
pub(crate) struct DocumentView<'a> {
    inner: &'a DocumentInner,
}

pub(crate) enum NodeView<'a> {
    Document,
    Element {
        tag: &'a str,
        attributes: &'a indexmap::IndexMap<String, String>,
        shadow: Option<(NodeId, ShadowMode)>,
    },
    Text(&'a str),
    ShadowRoot,
}

impl<'a> DocumentView<'a> {
    pub fn node(&self, id: NodeId) -> Option<(NodeView<'a>, &'a [NodeId])> {
        let inner = self.inner;
        let node = inner.node(id).ok()?;
        let view = match &node.kind {
            NodeKind::Document => NodeView::Document,
            NodeKind::Text(text) => NodeView::Text(text),
            NodeKind::ShadowRoot { .. } => NodeView::ShadowRoot,
            NodeKind::Element(element) => NodeView::Element {
                tag: &element.tag,
                attributes: &element.attributes,
                shadow: element.shadow_root.and_then(|shadow| {
                    match inner.node(shadow).ok()?.kind {
                        NodeKind::ShadowRoot { mode, .. } => Some((shadow, mode)),
                        _ => None,
                    }
                }),
            },
        };
        Some((view, node.children.as_slice()))
    }
}
