use crate::{Component, InstanceMap, Overlay, PortalError, WrapConfig};
use elemental_dom::{is_valid_custom_element_name, Document, DomError, WeakDocument};
use elemental_signaling::SignalingCell;
use std::{cell::Cell, rc::Rc};

/// State shared by an [`Overlay`] and every element instance of its tag.
pub(crate) struct Wrapped {
    pub tag_name: Rc<str>,
    pub observed_attributes: Vec<String>,
    pub config: WrapConfig,
    pub component: Rc<dyn Component>,
    pub document: WeakDocument,
    pub instances: SignalingCell<InstanceMap>,

    /// Set once the tag has been registered with the document.
    pub defined: Cell<bool>,

    /// Set while an overlay is consuming `instances`.
    pub mounted: Cell<bool>,
}

/// Make `component` available as the custom element `tag_name`.
///
/// Every instance of `<tag_name>` in `document`, whether written as markup or created later, has
/// `component` rendered into it (or into its shadow root, see [`WrapConfig::with_shadow_mode`]) with
/// the current values of `observed_attributes` as props.
///
/// Rendering is done by the returned [`Overlay`], which must be mounted exactly once.
///
/// ```rust
/// use elemental_dom::Document;
/// use elemental_portal::{wrap_as_web_component, Props, VNode, WrapConfig};
///
/// let document = Document::new();
/// let overlay = wrap_as_web_component(
///     &document,
///     |props: &Props| VNode::text(props.get("name").unwrap_or("stranger")),
///     "x-greeting",
///     ["name"],
///     WrapConfig::new(),
/// )
/// .unwrap();
///
/// let portal = overlay.mount().unwrap();
/// document
///     .append_markup(document.body(), r#"<x-greeting name="ada"></x-greeting>"#)
///     .unwrap();
/// portal.sync();
///
/// assert_eq!(document.text_content(document.body()), "ada");
/// ```
pub fn wrap_as_web_component(
    document: &Document,
    component: impl Component,
    tag_name: &str,
    observed_attributes: impl IntoIterator<Item = impl Into<String>>,
    config: WrapConfig,
) -> Result<Overlay, PortalError> {
    if !is_valid_custom_element_name(tag_name) {
        return Err(DomError::InvalidCustomElementName(tag_name.to_string()).into());
    }

    let wrapped = Rc::new(Wrapped {
        tag_name: tag_name.into(),
        observed_attributes: observed_attributes
            .into_iter()
            .map(|name| name.into().to_ascii_lowercase())
            .collect(),
        config,
        component: Rc::new(component),
        document: document.downgrade(),
        instances: SignalingCell::new(InstanceMap::new()),
        defined: Cell::new(false),
        mounted: Cell::new(false),
    });

    let overlay = Overlay::new(wrapped);
    overlay.define()?;
    Ok(overlay)
}
