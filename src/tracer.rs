//! Tracer trait for observing binding, dependency and render activity.
//!
//! The default [`NoopTracer`] ignores everything. [`RecordingTracer`] collects events for
//! tests and debugging. Human-readable log records are emitted separately through the
//! `tracing` crate.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use volume_flow::{App, MemoryHost, RecordingTracer};
//!
//! let tracer = Arc::new(RecordingTracer::new());
//! let app = App::<MemoryHost>::builder().tracer(tracer.clone()).build(MemoryHost::new());
//! assert!(tracer.is_empty());
//! # drop(app);
//! ```

use parking_lot::Mutex;

use crate::deps::Subscription;
use crate::id::{BindingId, VolumeId};
use crate::volume::DispatchReport;

/// How a single binding render ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    /// Data resolved and markup written to the host.
    Rendered,
    /// Data resolved; the component has no presentation element, so nothing was written.
    Resolved,
    /// The resolver or template failed and fallback markup was written.
    Fallback {
        /// The failure message.
        message: String,
    },
}

/// A recorded event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    /// A binding was allocated or reused.
    BindingCreated {
        /// The volume.
        volume: VolumeId,
        /// The binding.
        binding: BindingId,
        /// The component's name.
        component: String,
        /// Whether an existing binding was reused.
        reused: bool,
    },
    /// A declared dependency was registered.
    DependencyRegistered {
        /// The volume.
        volume: VolumeId,
        /// The binding.
        binding: BindingId,
        /// The state field.
        field: String,
        /// How the registration ended.
        subscription: Subscription,
    },
    /// A child was not claimed by its parent's latest pass.
    Unmounted {
        /// The volume.
        volume: VolumeId,
        /// The binding.
        binding: BindingId,
    },
    /// An action of a dispatch batch completed.
    ActionApplied {
        /// The volume.
        volume: VolumeId,
        /// Position of the action in its batch.
        index: usize,
        /// Fields the action declared.
        fields: Vec<String>,
    },
    /// A binding was rendered.
    Rendered {
        /// The volume.
        volume: VolumeId,
        /// The binding.
        binding: BindingId,
        /// How the render ended.
        outcome: RenderOutcome,
    },
    /// A dispatch finished its render pass.
    DispatchFinished {
        /// The volume.
        volume: VolumeId,
        /// The dispatch summary.
        report: DispatchReport,
    },
}

/// Observer of runtime activity.
///
/// All methods have empty default implementations.
pub trait Tracer: Send + Sync + 'static {
    /// Called when `create_binding` allocates (`reused == false`) or reuses a binding.
    #[inline]
    fn on_binding_created(
        &self,
        _volume: VolumeId,
        _binding: BindingId,
        _component: &str,
        _reused: bool,
    ) {
    }

    /// Called for every declared dependency of a created binding.
    #[inline]
    fn on_dependency_registered(
        &self,
        _volume: VolumeId,
        _binding: BindingId,
        _field: &str,
        _subscription: Subscription,
    ) {
    }

    /// Called when a binding leaves the live tree.
    #[inline]
    fn on_unmounted(&self, _volume: VolumeId, _binding: BindingId) {}

    /// Called after each action of a dispatch completes.
    #[inline]
    fn on_action_applied(&self, _volume: VolumeId, _index: usize, _fields: &[String]) {}

    /// Called after each binding render, including cascaded child renders.
    #[inline]
    fn on_render(&self, _volume: VolumeId, _binding: BindingId, _outcome: &RenderOutcome) {}

    /// Called once per dispatch after its render pass.
    #[inline]
    fn on_dispatch_end(&self, _volume: VolumeId, _report: &DispatchReport) {}
}

/// Tracer that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl Tracer for NoopTracer {}

/// Tracer that records every event in memory.
#[derive(Debug, Default)]
pub struct RecordingTracer {
    events: Mutex<Vec<TraceEvent>>,
}

impl RecordingTracer {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded events.
    pub fn events(&self) -> Vec<TraceEvent> {
        self.events.lock().clone()
    }

    /// Take the recorded events, leaving the recorder empty.
    pub fn take(&self) -> Vec<TraceEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    /// Clear the recorded events.
    pub fn clear(&self) {
        self.events.lock().clear();
    }

    /// Number of recorded events.
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Returns true if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Bindings rendered so far, in render order.
    pub fn renders(&self) -> Vec<BindingId> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                TraceEvent::Rendered { binding, .. } => Some(*binding),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: TraceEvent) {
        self.events.lock().push(event);
    }
}

impl Tracer for RecordingTracer {
    fn on_binding_created(
        &self,
        volume: VolumeId,
        binding: BindingId,
        component: &str,
        reused: bool,
    ) {
        self.push(TraceEvent::BindingCreated {
            volume,
            binding,
            component: component.to_string(),
            reused,
        });
    }

    fn on_dependency_registered(
        &self,
        volume: VolumeId,
        binding: BindingId,
        field: &str,
        subscription: Subscription,
    ) {
        self.push(TraceEvent::DependencyRegistered {
            volume,
            binding,
            field: field.to_string(),
            subscription,
        });
    }

    fn on_unmounted(&self, volume: VolumeId, binding: BindingId) {
        self.push(TraceEvent::Unmounted { volume, binding });
    }

    fn on_action_applied(&self, volume: VolumeId, index: usize, fields: &[String]) {
        self.push(TraceEvent::ActionApplied {
            volume,
            index,
            fields: fields.to_vec(),
        });
    }

    fn on_render(&self, volume: VolumeId, binding: BindingId, outcome: &RenderOutcome) {
        self.push(TraceEvent::Rendered {
            volume,
            binding,
            outcome: outcome.clone(),
        });
    }

    fn on_dispatch_end(&self, volume: VolumeId, report: &DispatchReport) {
        self.push(TraceEvent::DispatchFinished {
            volume,
            report: report.clone(),
        });
    }
}
