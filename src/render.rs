//! The render hook invoked for every root of change.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::host::Attributes;
use crate::id::BindingId;
use crate::tracer::RenderOutcome;
use crate::volume::Volume;
use crate::Error;

/// Renders one binding.
///
/// Called by [`Volume::propagate`] for each root of change. Implementations resolve the
/// binding's data with [`Volume::resolve`], present it, and render the children claimed during
/// resolution, which is how a re-render refreshes the whole subtree.
///
/// Failures of the binding's own resolver or template are expected to be contained by the
/// hook. Returned errors are configuration errors (which abort the pass) or host attachment
/// errors (which are reported once the pass is over).
pub trait RenderHook {
    /// Render `binding` of `volume`.
    fn render(&mut self, volume: &mut Volume, binding: BindingId) -> Result<(), Error>;
}

impl<F> RenderHook for F
where
    F: FnMut(&mut Volume, BindingId) -> Result<(), Error>,
{
    fn render(&mut self, volume: &mut Volume, binding: BindingId) -> Result<(), Error> {
        self(volume, binding)
    }
}

/// A render hook without a display surface.
///
/// Resolves each binding and its claimed children and keeps the latest data per binding.
/// A failing resolver leaves `null` as the binding's output and unmounts its children.
#[derive(Debug, Default)]
pub struct Headless {
    outputs: BTreeMap<BindingId, Value>,
    renders: usize,
    attributes: Attributes,
}

impl Headless {
    /// Create an empty headless renderer.
    pub fn new() -> Self {
        Self::default()
    }

    /// The latest data rendered for `binding`.
    pub fn output(&self, binding: BindingId) -> Option<&Value> {
        self.outputs.get(&binding)
    }

    /// Total number of binding renders, cascaded children included.
    pub fn render_count(&self) -> usize {
        self.renders
    }
}

impl RenderHook for Headless {
    fn render(&mut self, volume: &mut Volume, binding: BindingId) -> Result<(), Error> {
        let resolution = volume.resolve(binding, &self.attributes)?;
        self.renders += 1;

        let children = resolution.children;
        let outcome = match resolution.data {
            Ok(data) => {
                self.outputs.insert(binding, data);
                RenderOutcome::Resolved
            }
            Err(error) => {
                tracing::error!(volume = %volume.id(), binding = %binding, %error, "resolver failed");
                self.outputs.insert(binding, Value::Null);
                volume.unmount_children(binding);
                RenderOutcome::Fallback {
                    message: error.to_string(),
                }
            }
        };
        volume.tracer().on_render(volume.id(), binding, &outcome);

        if outcome == RenderOutcome::Resolved {
            for child in children {
                self.render(volume, child)?;
            }
        }
        Ok(())
    }
}
