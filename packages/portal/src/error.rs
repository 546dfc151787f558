use elemental_dom::DomError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PortalError {
    /// A second overlay tried to consume instances another mount is still rendering.
    #[error("the portal for <{tag}> is already mounted")]
    AlreadyMounted { tag: String },

    #[error("the document hosting <{tag}> has been dropped")]
    DocumentGone { tag: String },

    #[error(transparent)]
    Dom(#[from] DomError),
}
