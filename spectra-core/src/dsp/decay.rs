//! Peak-hold thresholds with a fixed-timestep fall model.
//!
//! ## Update rules
//!
//! ```text
//! merge:      height    = max(magnitude, threshold)
//!             threshold = max(magnitude, threshold)
//! decay step: threshold = threshold / max(exp(threshold), 1.01)
//! ```
//!
//! Heights are snapshots taken at merge time and do not move between merges.
//! Decay is driven by wall-clock time through `FixedStep`, which only ever
//! applies whole steps, so the fall law is identical at any render rate.

use std::sync::Arc;
use std::time::Duration;

use crate::buffering::{Channel, CHANNEL_COUNT};
use crate::error::{Result, SpectraError};

/// Default simulation step: 60 Hz.
pub const DEFAULT_TIMESTEP: Duration = Duration::from_nanos(16_666_667);

/// Smallest divisor in the decay step; keeps near-zero thresholds falling.
pub const MIN_DECAY_DIVISOR: f32 = 1.01;

/// Most steps one `advance` may release. Backlog beyond this is dropped, so a
/// long stall costs at most two seconds of catch-up at the default step.
pub const MAX_CATCH_UP_STEPS: u32 = 120;

/// Elapsed-time accumulator that releases whole steps and carries the rest.
#[derive(Debug, Clone)]
pub struct FixedStep {
    step: Duration,
    accumulated: Duration,
}

impl FixedStep {
    /// A zero `step` is replaced by `DEFAULT_TIMESTEP`.
    pub fn new(step: Duration) -> Self {
        Self {
            step: if step.is_zero() { DEFAULT_TIMESTEP } else { step },
            accumulated: Duration::ZERO,
        }
    }

    pub fn step(&self) -> Duration {
        self.step
    }

    /// Time carried towards the next step.
    pub fn remainder(&self) -> Duration {
        self.accumulated
    }

    /// Add `elapsed` and return how many whole steps are now due, at most
    /// `MAX_CATCH_UP_STEPS`.
    pub fn advance(&mut self, elapsed: Duration) -> u32 {
        let cap = self.step.saturating_mul(MAX_CATCH_UP_STEPS);
        self.accumulated = self.accumulated.saturating_add(elapsed).min(cap);
        let steps = (self.accumulated.as_nanos() / self.step.as_nanos()) as u32;
        self.accumulated -= self.step * steps;
        steps
    }
}

impl Default for FixedStep {
    fn default() -> Self {
        Self::new(DEFAULT_TIMESTEP)
    }
}

/// One decay step applied to a single threshold.
#[inline]
pub fn decay_threshold(threshold: f32) -> f32 {
    threshold / threshold.exp().max(MIN_DECAY_DIVISOR)
}

/// Rendered state for one channel.
#[derive(Debug, Clone, Default)]
pub struct ChannelVisualState {
    pub threshold: Vec<f32>,
    pub height: Vec<f32>,
}

impl ChannelVisualState {
    pub fn new(bins: usize) -> Self {
        Self {
            threshold: vec![0.0; bins],
            height: vec![0.0; bins],
        }
    }

    pub fn bins(&self) -> usize {
        self.height.len()
    }

    fn merge(&mut self, magnitudes: &[f32]) {
        for ((height, threshold), &magnitude) in self
            .height
            .iter_mut()
            .zip(self.threshold.iter_mut())
            .zip(magnitudes)
        {
            let peak = magnitude.max(*threshold);
            *height = peak;
            *threshold = peak;
        }
    }

    fn decay_once(&mut self) {
        for threshold in self.threshold.iter_mut() {
            *threshold = decay_threshold(*threshold);
        }
    }
}

/// Per-channel thresholds and heights for one epoch.
#[derive(Debug, Clone)]
pub struct DecayModel {
    channels: [ChannelVisualState; CHANNEL_COUNT],
    axis: Arc<[f32]>,
    clock: FixedStep,
    epoch: u64,
}

impl DecayModel {
    /// Zeroed state for `bins` bins, decaying every `step`.
    pub fn new(bins: usize, step: Duration, epoch: u64) -> Self {
        Self {
            channels: [ChannelVisualState::new(bins), ChannelVisualState::new(bins)],
            axis: (0..bins).map(|i| i as f32).collect(),
            clock: FixedStep::new(step),
            epoch,
        }
    }

    /// Zero-bin state used before the first configuration.
    pub fn empty() -> Self {
        Self::new(0, DEFAULT_TIMESTEP, 0)
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn bins(&self) -> usize {
        self.axis.len()
    }

    /// Immutable `0..bins` x-axis shared with snapshots.
    pub fn axis(&self) -> Arc<[f32]> {
        Arc::clone(&self.axis)
    }

    pub fn channel(&self, channel: Channel) -> &ChannelVisualState {
        &self.channels[channel.index()]
    }

    pub fn clock(&self) -> &FixedStep {
        &self.clock
    }

    /// Fold one spectrum into `channel`.
    ///
    /// # Errors
    /// `SpectraError::FrameLength` if `magnitudes` is not `bins()` long; the
    /// state is left untouched.
    pub fn merge(&mut self, channel: Channel, magnitudes: &[f32]) -> Result<()> {
        if magnitudes.len() != self.bins() {
            return Err(SpectraError::FrameLength {
                expected: self.bins(),
                actual: magnitudes.len(),
            });
        }
        self.channels[channel.index()].merge(magnitudes);
        Ok(())
    }

    /// Accumulate `elapsed` and apply every whole step now due.
    ///
    /// Returns the number of steps applied.
    pub fn decay_step(&mut self, elapsed: Duration) -> u32 {
        let steps = self.clock.advance(elapsed);
        for _ in 0..steps {
            self.apply_step();
        }
        steps
    }

    /// Apply exactly one step, bypassing the accumulator.
    pub fn apply_step(&mut self) {
        for state in self.channels.iter_mut() {
            state.decay_once();
        }
    }
}
