use elemental_dom::ShadowMode;

/// Options for [`crate::wrap_as_web_component`].
///
/// ```rust
/// use elemental_portal::{ShadowMode, WrapConfig};
///
/// let cfg = WrapConfig::new()
///     .with_shadow_mode(ShadowMode::Closed)
///     .with_event_dispatch(true);
///
/// assert_eq!(cfg.shadow_mode(), Some(ShadowMode::Closed));
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "camelCase", default))]
pub struct WrapConfig {
    shadow_mode: Option<ShadowMode>,
    dispatch_events: bool,
}

impl WrapConfig {
    /// Render into the light DOM, without a dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Render into a shadow root of the given mode instead of the element itself.
    pub fn with_shadow_mode(mut self, mode: impl Into<Option<ShadowMode>>) -> Self {
        self.shadow_mode = mode.into();
        self
    }

    /// Hand every rendered component a [`crate::Dispatcher`] bound to its element.
    pub fn with_event_dispatch(mut self, enabled: bool) -> Self {
        self.dispatch_events = enabled;
        self
    }

    pub fn shadow_mode(&self) -> Option<ShadowMode> {
        self.shadow_mode
    }

    pub fn dispatch_events(&self) -> bool {
        self.dispatch_events
    }
}
