//! Render components into custom elements.
//!
//! [`wrap_as_web_component`] defines a custom element for a component and returns an [`Overlay`].
//! Each instance of the element registers itself in a shared instance map while it is connected;
//! the mounted overlay watches that map and portals a rendering of the component into every
//! instance, keeping it in step with the element's observed attributes.

mod config;
mod element;
mod error;
mod portal;
mod render;
mod snapshot;
mod wrap;

pub use config::WrapConfig;
pub use error::PortalError;
pub use portal::{MountedOverlay, Overlay};
pub use render::{render_into, Component, Mounted, VNode};
pub use snapshot::{AttributeSnapshot, Dispatcher, InstanceKey, InstanceMap, InstanceRecord, Props};
pub use wrap::wrap_as_web_component;

pub use elemental_dom::ShadowMode;
