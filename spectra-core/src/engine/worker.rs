//! Transform worker: blocking wait/wake loop over the latest captured frame.
//!
//! ## One pass (per wake)
//!
//! ```text
//! for channel in [Left, Right]:
//!     1. sample-buffer lock   → copy latest transform_size samples
//!     2. engine lock          → window + forward transform + magnitudes
//!     3. draw-buffer lock     → merge into thresholds / heights
//! ```
//!
//! Each section holds exactly one lock. Every size-dependent structure carries
//! the epoch it was built for; a pass that sees the epoch change between
//! sections is abandoned and counted in `stale_passes`.
//!
//! Wakes are a single `pending` flag, not a queue: any number of producer
//! signals before the worker wakes yields one pass over the newest frame.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::buffering::{frame::SpectrumFrame, Channel};
use crate::engine::Shared;

/// Upper bound on one condition wait; guards against a missed shutdown signal.
pub const LIVENESS_TIMEOUT: Duration = Duration::from_millis(250);

/// Log pass statistics every this many passes.
const PASS_LOG_INTERVAL: usize = 1_000;

pub struct PipelineDiagnostics {
    pub frames_captured: AtomicUsize,
    pub wakes_signaled: AtomicUsize,
    /// Producer signals that found a wake already pending (starvation).
    pub wakes_coalesced: AtomicUsize,
    pub passes: AtomicUsize,
    pub transforms: AtomicUsize,
    pub stale_passes: AtomicUsize,
    pub reconfigurations: AtomicUsize,
    pub decay_steps: AtomicUsize,
}

impl Default for PipelineDiagnostics {
    fn default() -> Self {
        Self {
            frames_captured: AtomicUsize::new(0),
            wakes_signaled: AtomicUsize::new(0),
            wakes_coalesced: AtomicUsize::new(0),
            passes: AtomicUsize::new(0),
            transforms: AtomicUsize::new(0),
            stale_passes: AtomicUsize::new(0),
            reconfigurations: AtomicUsize::new(0),
            decay_steps: AtomicUsize::new(0),
        }
    }
}

impl PipelineDiagnostics {
    pub fn reset(&self) {
        self.frames_captured.store(0, Ordering::Relaxed);
        self.wakes_signaled.store(0, Ordering::Relaxed);
        self.wakes_coalesced.store(0, Ordering::Relaxed);
        self.passes.store(0, Ordering::Relaxed);
        self.transforms.store(0, Ordering::Relaxed);
        self.stale_passes.store(0, Ordering::Relaxed);
        self.reconfigurations.store(0, Ordering::Relaxed);
        self.decay_steps.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            frames_captured: self.frames_captured.load(Ordering::Relaxed),
            wakes_signaled: self.wakes_signaled.load(Ordering::Relaxed),
            wakes_coalesced: self.wakes_coalesced.load(Ordering::Relaxed),
            passes: self.passes.load(Ordering::Relaxed),
            transforms: self.transforms.load(Ordering::Relaxed),
            stale_passes: self.stale_passes.load(Ordering::Relaxed),
            reconfigurations: self.reconfigurations.load(Ordering::Relaxed),
            decay_steps: self.decay_steps.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiagnosticsSnapshot {
    pub frames_captured: usize,
    pub wakes_signaled: usize,
    pub wakes_coalesced: usize,
    pub passes: usize,
    pub transforms: usize,
    pub stale_passes: usize,
    pub reconfigurations: usize,
    pub decay_steps: usize,
}

/// Wake flag guarded by the wake mutex.
#[derive(Debug, Default)]
pub(crate) struct WakeState {
    pub(crate) pending: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WakeOutcome {
    /// A wake was pending and has been consumed.
    Work,
    /// Nothing arrived within the timeout.
    TimedOut,
    /// `running` was cleared.
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PassOutcome {
    /// Both channels merged.
    Merged,
    /// A reconfiguration landed mid-pass; results discarded.
    Stale,
    /// No buffers installed yet.
    Unconfigured,
}

/// Worker-owned frame and magnitude buffers, resized once per epoch.
#[derive(Debug, Default)]
pub(crate) struct WorkerScratch {
    frame: Vec<f32>,
    spectrum: SpectrumFrame,
    epoch: u64,
}

impl WorkerScratch {
    fn prepare(&mut self, transform_size: usize, epoch: u64) {
        if self.epoch != epoch || self.frame.len() != transform_size {
            self.frame.resize(transform_size, 0.0);
            self.spectrum.magnitudes.resize(transform_size / 2, 0.0);
            self.epoch = epoch;
        }
    }
}

/// Block until a wake is pending, the timeout elapses, or shutdown.
///
/// Shutdown takes priority over a pending wake.
pub(crate) fn wait_for_work(shared: &Shared, timeout: Duration) -> WakeOutcome {
    let deadline = Instant::now() + timeout;
    let mut wake = shared.wake.lock();
    let mut timed_out = false;
    loop {
        if !shared.running.load(Ordering::Acquire) {
            return WakeOutcome::Shutdown;
        }
        if wake.pending {
            wake.pending = false;
            return WakeOutcome::Work;
        }
        if timed_out {
            return WakeOutcome::TimedOut;
        }
        timed_out = shared.wake_cond.wait_until(&mut wake, deadline).timed_out();
    }
}

/// Transform and merge the latest frame of every channel.
pub(crate) fn process_pass(shared: &Shared, scratch: &mut WorkerScratch) -> PassOutcome {
    for channel in Channel::ALL {
        let epoch = {
            let ring = shared.samples.lock();
            if ring.transform_size() == 0 {
                return PassOutcome::Unconfigured;
            }
            scratch.prepare(ring.transform_size(), ring.epoch());
            ring.snapshot_frame(channel, &mut scratch.frame);
            ring.epoch()
        };

        {
            let mut slot = shared.engine.lock();
            let Some(engine) = slot.as_mut() else {
                return PassOutcome::Unconfigured;
            };
            if engine.epoch() != epoch {
                return stale(shared, epoch, engine.epoch());
            }
            if let Err(e) = engine.process_frame(&scratch.frame, &mut scratch.spectrum.magnitudes) {
                warn!(epoch, "transform rejected frame: {e}");
                return stale(shared, epoch, engine.epoch());
            }
        }
        shared.diagnostics.transforms.fetch_add(1, Ordering::Relaxed);

        {
            let mut draw = shared.draw.lock();
            if draw.epoch() != epoch {
                return stale(shared, epoch, draw.epoch());
            }
            if let Err(e) = draw.merge(channel, &scratch.spectrum.magnitudes) {
                warn!(epoch, "merge rejected spectrum: {e}");
                return stale(shared, epoch, draw.epoch());
            }
        }
    }

    shared.diagnostics.passes.fetch_add(1, Ordering::Relaxed);
    PassOutcome::Merged
}

fn stale(shared: &Shared, frame_epoch: u64, current_epoch: u64) -> PassOutcome {
    shared.diagnostics.stale_passes.fetch_add(1, Ordering::Relaxed);
    debug!(frame_epoch, current_epoch, "epoch changed mid-pass, discarding");
    PassOutcome::Stale
}

/// Run the worker until `shared.running` becomes false.
pub(crate) fn run(shared: Arc<Shared>) {
    info!("transform worker started");
    let mut scratch = WorkerScratch::default();

    loop {
        match wait_for_work(&shared, LIVENESS_TIMEOUT) {
            WakeOutcome::Work => {
                if process_pass(&shared, &mut scratch) == PassOutcome::Merged {
                    let passes = shared.diagnostics.passes.load(Ordering::Relaxed);
                    if passes % PASS_LOG_INTERVAL == 0 {
                        let diag = shared.diagnostics.snapshot();
                        debug!(
                            passes,
                            transforms = diag.transforms,
                            coalesced = diag.wakes_coalesced,
                            stale = diag.stale_passes,
                            "worker progress"
                        );
                    }
                }
            }
            WakeOutcome::TimedOut => continue,
            WakeOutcome::Shutdown => break,
        }
    }

    info!("transform worker exited");
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::f32::consts::PI;
    use std::thread;

    use crate::buffering::StereoRing;
    use crate::dsp::decay::{DecayModel, DEFAULT_TIMESTEP};
    use crate::dsp::spectrum::{MagnitudeMode, SpectrumEngine};
    use crate::dsp::window::WindowType;

    const SIZE: usize = 128;

    fn configured_shared(epoch: u64) -> Arc<Shared> {
        let shared = Arc::new(Shared::new());
        let engine = SpectrumEngine::new(SIZE, WindowType::BlackmanHarris, MagnitudeMode::Exact)
            .expect("engine")
            .with_epoch(epoch);
        shared.install(
            StereoRing::new(SIZE, epoch),
            engine,
            DecayModel::new(SIZE / 2, DEFAULT_TIMESTEP, epoch),
        );
        shared.running.store(true, Ordering::Release);
        shared
    }

    /// Interleaved stereo block of a bin-centred sine on both channels.
    fn stereo_sine(bin: usize) -> Vec<f32> {
        (0..SIZE)
            .flat_map(|i| {
                let s = (2.0 * PI * bin as f32 * i as f32 / SIZE as f32).sin();
                [s, s]
            })
            .collect()
    }

    #[test]
    fn back_to_back_signals_yield_one_pass_over_latest_frame() {
        let shared = configured_shared(1);
        shared.ingest(&stereo_sine(8), |s| s);
        shared.ingest(&stereo_sine(40), |s| s);

        let diag = shared.diagnostics.snapshot();
        assert_eq!(diag.wakes_signaled, 2);
        assert_eq!(diag.wakes_coalesced, 1);

        let mut scratch = WorkerScratch::default();
        assert_eq!(
            wait_for_work(&shared, Duration::from_millis(10)),
            WakeOutcome::Work
        );
        assert_eq!(process_pass(&shared, &mut scratch), PassOutcome::Merged);
        assert_eq!(
            wait_for_work(&shared, Duration::from_millis(10)),
            WakeOutcome::TimedOut
        );

        assert_eq!(shared.diagnostics.snapshot().passes, 1);
        // Right channel was transformed last.
        assert_eq!(scratch.spectrum.peak_bin().map(|(bin, _)| bin), Some(40));
        let draw = shared.draw.lock();
        for channel in Channel::ALL {
            let height = &draw.channel(channel).height;
            assert!(height[40] > 1.0);
            assert!(
                height[8] < height[40] * 1e-3,
                "older frame leaked into merge: {} vs {}",
                height[8],
                height[40]
            );
        }
    }

    #[test]
    fn shutdown_wins_over_pending_wake() {
        let shared = configured_shared(1);
        shared.ingest(&stereo_sine(8), |s| s);
        shared.running.store(false, Ordering::Release);
        assert_eq!(
            wait_for_work(&shared, Duration::from_millis(10)),
            WakeOutcome::Shutdown
        );
    }

    #[test]
    fn pass_is_discarded_when_epochs_disagree() {
        let shared = configured_shared(1);
        // Ring from a newer epoch than engine/draw state.
        *shared.samples.lock() = StereoRing::new(SIZE, 2);
        shared.ingest(&stereo_sine(8), |s| s);

        let mut scratch = WorkerScratch::default();
        assert_eq!(process_pass(&shared, &mut scratch), PassOutcome::Stale);
        let diag = shared.diagnostics.snapshot();
        assert_eq!(diag.stale_passes, 1);
        assert_eq!(diag.passes, 0);
        assert!(shared
            .draw
            .lock()
            .channel(Channel::Left)
            .height
            .iter()
            .all(|&h| h == 0.0));
    }

    #[test]
    fn unconfigured_pipeline_skips_pass() {
        let shared = Shared::new();
        let mut scratch = WorkerScratch::default();
        assert_eq!(process_pass(&shared, &mut scratch), PassOutcome::Unconfigured);
    }

    #[test]
    fn run_exits_after_shutdown_signal() {
        let shared = configured_shared(1);
        let worker = {
            let shared = Arc::clone(&shared);
            thread::spawn(move || run(shared))
        };

        shared.ingest(&stereo_sine(12), |s| s);
        let start = Instant::now();
        while shared.diagnostics.snapshot().passes == 0 {
            assert!(start.elapsed() < Duration::from_secs(2), "worker never ran");
            thread::sleep(Duration::from_millis(2));
        }

        shared.running.store(false, Ordering::Release);
        shared.wake_all();
        worker.join().expect("worker thread panicked");
    }

    #[test]
    fn diagnostics_reset_clears_counters() {
        let diagnostics = PipelineDiagnostics::default();
        diagnostics.passes.fetch_add(3, Ordering::Relaxed);
        diagnostics.wakes_coalesced.fetch_add(1, Ordering::Relaxed);
        diagnostics.reset();
        assert_eq!(diagnostics.snapshot(), DiagnosticsSnapshot::default());
    }
}
