//! An in-memory host document for custom elements.
//!
//! This crate plays the part of the browser: it owns a node tree, a custom element registry and
//! event listeners, and it delivers lifecycle callbacks to [`CustomElement`] implementations as
//! elements are connected, disconnected and have their observed attributes changed.
//!
//! ```rust
//! use elemental_dom::{CustomElement, Document, ElementDefinition, ElementRef};
//! use std::{cell::Cell, rc::Rc};
//!
//! struct Counter(Rc<Cell<u32>>);
//!
//! impl CustomElement for Counter {
//!     fn connected_callback(&self, _this: &ElementRef) {
//!         self.0.set(self.0.get() + 1);
//!     }
//! }
//!
//! let connects = Rc::new(Cell::new(0));
//! let document = Document::new();
//! document
//!     .define("x-counter", ElementDefinition::new(Vec::<String>::new(), {
//!         let connects = connects.clone();
//!         move || Counter(connects.clone())
//!     }))
//!     .unwrap();
//!
//! document.append_markup(document.body(), "<x-counter></x-counter>").unwrap();
//! assert_eq!(connects.get(), 1);
//! ```

mod document;
mod event;
mod markup;
mod node;
mod registry;

pub use document::{Document, WeakDocument};
pub use event::{Event, Listener, ListenerId};
pub use node::{NodeId, ShadowMode};
pub use registry::{is_valid_custom_element_name, CustomElement, ElementDefinition, ElementRef};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomError {
    #[error("\"{0}\" is not a valid custom element name")]
    InvalidCustomElementName(String),

    #[error("a custom element named \"{0}\" has already been defined")]
    AlreadyDefined(String),

    #[error("node {0} does not exist in this document")]
    UnknownNode(NodeId),

    #[error("node {0} is not an element")]
    NotAnElement(NodeId),

    #[error("node {0} is not a text node")]
    NotAText(NodeId),

    #[error("element {0} already hosts a shadow root")]
    ShadowRootExists(NodeId),

    #[error("node {child} is not a child of {parent}")]
    NotAChild { parent: NodeId, child: NodeId },

    #[error("node {child} cannot be inserted into {parent}")]
    HierarchyRequest { parent: NodeId, child: NodeId },

    #[error("failed to parse markup: {0}")]
    Markup(#[from] html_parser::Error),
}
