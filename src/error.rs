//! Error types.

use crate::id::{BindingId, Locator, VolumeId};

/// Errors surfaced by the runtime.
///
/// Failures inside a single binding's data resolver or template are never returned here: they
/// are contained by the render hook, logged, and replaced by fallback markup. Everything else
/// is reported to the caller of the failing operation.
///
/// Failures of user code (mutators, behaviors, template engines) are carried as
/// [`anyhow::Error`], so user code can propagate any error type with `?`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Two child creations claimed the same slot during one resolution pass of a parent.
    #[error("slot {slot:?} of binding {parent} was claimed twice in one render pass")]
    SlotCollision {
        /// The parent whose slot was claimed twice.
        parent: BindingId,
        /// The slot name.
        slot: String,
    },

    /// A child binding was requested under a parent without a slot name.
    #[error("child of binding {parent} requires a non-empty slot name")]
    MissingSlot {
        /// The parent binding.
        parent: BindingId,
    },

    /// A template was rejected by the template engine when its element was defined.
    #[error("template of element <{tag}> is invalid: {source}")]
    Template {
        /// The element tag.
        tag: String,
        /// The engine's error.
        source: anyhow::Error,
    },

    /// An element tag was defined twice.
    #[error("element <{tag}> is already defined")]
    ElementAlreadyDefined {
        /// The element tag.
        tag: String,
    },

    /// A binding without a presentation element was asked to mount.
    #[error("component {component:?} has no presentation element")]
    NoPresentation {
        /// The component's name.
        component: String,
    },

    /// A component refers to an element tag that was never defined.
    #[error("element <{tag}> is not defined")]
    UnknownElement {
        /// The element tag.
        tag: String,
    },

    /// The initial state of a volume was not a JSON object.
    #[error("volume state must be an object, got {kind}")]
    InvalidState {
        /// The JSON kind that was supplied instead.
        kind: &'static str,
    },

    /// A locator string could not be parsed.
    #[error("invalid locator {locator:?}")]
    InvalidLocator {
        /// The rejected string.
        locator: String,
    },

    /// A locator belongs to another app.
    #[error("locator {locator} belongs to another app")]
    ForeignLocator {
        /// The foreign locator.
        locator: Locator,
    },

    /// No volume with this id exists in the app.
    #[error("volume {0} does not exist")]
    UnknownVolume(VolumeId),

    /// No binding with this id exists in the volume.
    #[error("binding {binding} does not exist in volume {volume}")]
    UnknownBinding {
        /// The volume that was searched.
        volume: VolumeId,
        /// The missing binding.
        binding: BindingId,
    },

    /// The binding's component has no behavior with this name.
    #[error("binding {binding} has no behavior named {handler:?}")]
    HandlerNotFound {
        /// The binding that was resolved.
        binding: BindingId,
        /// The requested handler name.
        handler: String,
    },

    /// The ancestor walk reached the root without finding a bound element.
    #[error("no bound ancestor element found")]
    NoBoundAncestor,

    /// The host has no element for a binding that had to be rendered.
    #[error("no host element for binding {locator}")]
    HostElementMissing {
        /// The binding whose element is missing.
        locator: Locator,
    },

    /// An action's mutator failed. State is left as far as the mutator got.
    #[error("action #{index} failed: {source}")]
    Action {
        /// Position of the failing action in its dispatch batch.
        index: usize,
        /// The mutator's error.
        source: anyhow::Error,
    },

    /// A behavior handler failed.
    #[error("behavior {handler:?} failed: {source}")]
    Behavior {
        /// The handler name.
        handler: String,
        /// The handler's error.
        source: anyhow::Error,
    },
}

impl Error {
    /// Returns `true` for caller contract violations that must fail fast.
    ///
    /// A render pass aborts on these instead of continuing with sibling bindings.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::SlotCollision { .. }
                | Error::MissingSlot { .. }
                | Error::Template { .. }
                | Error::ElementAlreadyDefined { .. }
                | Error::UnknownElement { .. }
                | Error::NoPresentation { .. }
                | Error::InvalidState { .. }
        )
    }

    /// Returns `true` if a host element expected at render time was absent.
    pub fn is_host_attachment(&self) -> bool {
        matches!(self, Error::HostElementMissing { .. })
    }
}
