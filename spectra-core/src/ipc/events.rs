//! Status events and spectrum snapshots.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::buffering::{Channel, CHANNEL_COUNT};
use crate::dsp::decay::DecayModel;

// ---------------------------------------------------------------------------
// Status events
// ---------------------------------------------------------------------------

/// Coordinator lifecycle state.
///
/// ```text
/// Idle ─► Configured ─► Running ─► Reconfiguring ─► Running
///              ▲  │                                    │
///              │  └──► Reconfiguring ─► Configured     │
///              └────────────── stop() ◄────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStatus {
    /// Constructed; no buffers allocated yet.
    Idle,
    /// Buffers allocated for a transform size; worker and device unbound.
    Configured,
    /// Worker running and (optionally) a capture device bound.
    Running,
    /// Size-dependent buffers are being swapped.
    Reconfiguring,
    /// Capture device failed to open or start.
    Error,
}

/// Published on every status transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStatusEvent {
    pub status: PipelineStatus,
    /// Active transform size, `None` while idle.
    pub transform_size: Option<usize>,
    /// Optional human-readable detail (e.g. device error).
    pub detail: Option<String>,
}

// ---------------------------------------------------------------------------
// Spectrum snapshots
// ---------------------------------------------------------------------------

/// Read-only copy of the rendered heights for one instant.
///
/// `bins` and both height vectors always have the same length: the bin count
/// of the epoch the snapshot was taken in.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpectrumSnapshot {
    /// Configuration epoch the data belongs to.
    pub epoch: u64,
    pub transform_size: usize,
    /// Bin-index x-axis, `0..transform_size / 2`. Shared, never mutated.
    pub bins: Arc<[f32]>,
    /// Heights per channel, indexed by `Channel::index`.
    pub heights: [Vec<f32>; CHANNEL_COUNT],
}

impl SpectrumSnapshot {
    /// Copy the current heights out of `model`.
    pub fn capture(model: &DecayModel) -> Self {
        let mut snapshot = Self::default();
        snapshot.refresh_from(model);
        snapshot
    }

    /// Overwrite this snapshot from `model`, reusing the height allocations.
    pub fn refresh_from(&mut self, model: &DecayModel) {
        self.epoch = model.epoch();
        self.transform_size = model.bins() * 2;
        let axis = model.axis();
        if !Arc::ptr_eq(&self.bins, &axis) {
            self.bins = axis;
        }
        for channel in Channel::ALL {
            let src = &model.channel(channel).height;
            let dst = &mut self.heights[channel.index()];
            dst.clear();
            dst.extend_from_slice(src);
        }
    }

    pub fn heights(&self, channel: Channel) -> &[f32] {
        &self.heights[channel.index()]
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }
}
