use crate::{Document, DomError, Event, NodeId, ShadowMode};
use std::rc::Rc;

/// Behavior attached to every element whose tag has been [defined](Document::define).
///
/// The document calls these hooks serially for each element, and never while it is borrowed, so an
/// implementation is free to call back into the document through `this`.
pub trait CustomElement: 'static {
    /// The element was inserted into a connected tree.
    fn connected_callback(&self, this: &ElementRef) {
        let _ = this;
    }

    /// The element was removed from a connected tree.
    fn disconnected_callback(&self, this: &ElementRef) {
        let _ = this;
    }

    /// An observed attribute was added, changed or removed.
    ///
    /// Only names listed in the definition's observed attributes are delivered.
    fn attribute_changed_callback(
        &self,
        this: &ElementRef,
        name: &str,
        old_value: Option<&str>,
        new_value: Option<&str>,
    ) {
        let _ = (this, name, old_value, new_value);
    }
}

type Constructor = dyn Fn() -> Rc<dyn CustomElement>;

/// Everything the document needs to upgrade elements of one tag.
pub struct ElementDefinition {
    observed_attributes: Vec<String>,
    constructor: Box<Constructor>,
}

impl ElementDefinition {
    pub fn new<E: CustomElement>(
        observed_attributes: impl IntoIterator<Item = impl Into<String>>,
        constructor: impl Fn() -> E + 'static,
    ) -> Self {
        Self {
            observed_attributes: observed_attributes
                .into_iter()
                .map(|name| name.into().to_ascii_lowercase())
                .collect(),
            constructor: Box::new(move || Rc::new(constructor()) as Rc<dyn CustomElement>),
        }
    }

    pub fn observed_attributes(&self) -> &[String] {
        &self.observed_attributes
    }

    pub fn observes(&self, name: &str) -> bool {
        self.observed_attributes.iter().any(|observed| observed == name)
    }

    pub(crate) fn construct(&self) -> Rc<dyn CustomElement> {
        (self.constructor)()
    }
}

impl std::fmt::Debug for ElementDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElementDefinition")
            .field("observed_attributes", &self.observed_attributes)
            .finish_non_exhaustive()
    }
}

/// The element a lifecycle hook is running for.
#[derive(Clone)]
pub struct ElementRef {
    document: Document,
    id: NodeId,
}

impl ElementRef {
    pub(crate) fn new(document: Document, id: NodeId) -> Self {
        Self { document, id }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn get_attribute(&self, name: &str) -> Option<String> {
        self.document.get_attribute(self.id, name)
    }

    pub fn attach_shadow(&self, mode: ShadowMode) -> Result<NodeId, DomError> {
        self.document.attach_shadow(self.id, mode)
    }

    pub fn dispatch_event(&self, event: Event) -> Result<usize, DomError> {
        self.document.dispatch_event(self.id, event)
    }
}

impl std::fmt::Debug for ElementRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ElementRef").field(&self.id).finish()
    }
}

const RESERVED_NAMES: &[&str] = &[
    "annotation-xml",
    "color-profile",
    "font-face",
    "font-face-src",
    "font-face-uri",
    "font-face-format",
    "font-face-name",
    "missing-glyph",
];

/// Whether `name` may be used as a custom element tag.
///
/// A valid name starts with a lowercase ASCII letter, contains a hyphen, has no uppercase ASCII
/// letters and is not one of the names reserved by SVG and MathML.
pub fn is_valid_custom_element_name(name: &str) -> bool {
    let mut chars = name.chars();

    let starts_lowercase = matches!(chars.next(), Some('a'..='z'));
    let valid_rest = chars.all(|c| {
        matches!(c, 'a'..='z' | '0'..='9' | '-' | '.' | '_') || (!c.is_ascii() && c != '\u{37e}')
    });

    starts_lowercase && valid_rest && name.contains('-') && !RESERVED_NAMES.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_element_names() {
        assert!(is_valid_custom_element_name("x-clock"));
        assert!(is_valid_custom_element_name("portal-clock-closed"));
        assert!(is_valid_custom_element_name("math-α"));
        assert!(is_valid_custom_element_name("my-element.v2"));

        assert!(!is_valid_custom_element_name("clock"));
        assert!(!is_valid_custom_element_name("X-clock"));
        assert!(!is_valid_custom_element_name("x-Clock"));
        assert!(!is_valid_custom_element_name("-clock"));
        assert!(!is_valid_custom_element_name("1-clock"));
        assert!(!is_valid_custom_element_name("x clock"));
        assert!(!is_valid_custom_element_name("font-face"));
        assert!(!is_valid_custom_element_name(""));
    }
}
