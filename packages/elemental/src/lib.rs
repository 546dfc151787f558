#![doc = include_str!("../README.md")]

pub use elemental_dom as dom;
pub use elemental_signaling as signaling;

#[cfg(feature = "portal")]
pub use elemental_portal as portal;

pub mod prelude {
    pub use elemental_dom::{
        CustomElement, Document, DomError, ElementDefinition, ElementRef, Event, NodeId,
        ShadowMode,
    };
    pub use elemental_signaling::SignalingCell;

    #[cfg(feature = "portal")]
    pub use elemental_portal::{
        render_into, wrap_as_web_component, Component, Dispatcher, InstanceKey, InstanceMap,
        Mounted, MountedOverlay, Overlay, PortalError, Props, VNode, WrapConfig,
    };
}
