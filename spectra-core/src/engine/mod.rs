//! `PipelineCoordinator`: owner of every pipeline buffer and the lifecycle.
//!
//! ## Lifecycle
//!
//! ```text
//! PipelineCoordinator::new()          → Idle
//!     └─► configure(size, window)     → Reconfiguring → Configured
//!         └─► start()                 → worker spawned, device bound, Running
//!             ├─► configure(..)       → Reconfiguring → Running
//!             └─► stop()              → worker joined, device released, Configured
//! ```
//!
//! `start()`/`stop()` are idempotent. `start()` on an idle coordinator first
//! configures from `PipelineConfig`.
//!
//! ## Locking
//!
//! Three data locks live in `Shared`: sample-buffer (`samples`), transform
//! engine (`engine`) and draw-buffer (`draw`). The capture callback, worker
//! and consumer each hold one at a time. `configure` is the only compound
//! acquisition and always locks in that order: samples → engine → draw.
//!
//! Control calls (`configure`, `start`, `stop`) serialize on `lifecycle`,
//! taken before `config` and the data locks. Every status they publish is
//! therefore derived from the worker state they see under that lock. The
//! worker and the capture callback never touch `lifecycle`.
//!
//! ## Threading
//!
//! `cpal::Stream` is `!Send` on Windows/macOS. The device is therefore opened
//! *inside* a dedicated capture thread that owns the stream until `stop()`
//! releases it. A sync oneshot channel propagates open errors back to the
//! `start()` caller.

pub mod worker;

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    mpsc, Arc,
};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::{
    audio::AudioCapture,
    buffering::StereoRing,
    dsp::{
        decay::{DecayModel, DEFAULT_TIMESTEP},
        spectrum::{MagnitudeMode, SpectrumEngine, TransformSize},
        window::WindowType,
    },
    error::{Result, SpectraError},
    ipc::events::{PipelineStatus, PipelineStatusEvent, SpectrumSnapshot},
};

use worker::{DiagnosticsSnapshot, PipelineDiagnostics, WakeState};

/// Broadcast channel capacity for status events.
const BROADCAST_CAP: usize = 64;

/// Capture rate requested from the device. Capture is fixed 44.1 kHz stereo.
pub const CAPTURE_SAMPLE_RATE: u32 = 44_100;

/// Configuration for `PipelineCoordinator`.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Samples per transform; must be one of `TransformSize::SUPPORTED`.
    /// Default: 8192.
    pub transform_size: usize,
    /// Taper applied before each transform. Default: Blackman-Harris.
    pub window: WindowType,
    /// Complex → magnitude reduction. Default: exact.
    pub magnitude: MagnitudeMode,
    /// Fixed simulation step for threshold decay. Default: 1/60 s.
    pub decay_timestep: Duration,
    /// Requested device capture rate (Hz). Default: 44100.
    pub sample_rate: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            transform_size: TransformSize::DEFAULT.get(),
            window: WindowType::BlackmanHarris,
            magnitude: MagnitudeMode::Exact,
            decay_timestep: DEFAULT_TIMESTEP,
            sample_rate: CAPTURE_SAMPLE_RATE,
        }
    }
}

/// State shared between the capture callback, the worker and the consumer.
pub(crate) struct Shared {
    /// Sample-buffer lock.
    pub(crate) samples: Mutex<StereoRing>,
    /// Engine lock; `None` until the first configuration.
    pub(crate) engine: Mutex<Option<SpectrumEngine>>,
    /// Draw-buffer lock.
    pub(crate) draw: Mutex<DecayModel>,
    pub(crate) wake: Mutex<WakeState>,
    pub(crate) wake_cond: Condvar,
    pub(crate) running: AtomicBool,
    pub(crate) diagnostics: PipelineDiagnostics,
}

impl Shared {
    pub(crate) fn new() -> Self {
        Self {
            samples: Mutex::new(StereoRing::empty()),
            engine: Mutex::new(None),
            draw: Mutex::new(DecayModel::empty()),
            wake: Mutex::new(WakeState::default()),
            wake_cond: Condvar::new(),
            running: AtomicBool::new(false),
            diagnostics: PipelineDiagnostics::default(),
        }
    }

    /// Write an interleaved block and signal the worker.
    pub(crate) fn ingest<T, F>(&self, data: &[T], convert: F)
    where
        T: Copy,
        F: Fn(T) -> f32,
    {
        let frames = self.samples.lock().write_interleaved_with(data, convert);
        self.diagnostics
            .frames_captured
            .fetch_add(frames, Ordering::Relaxed);
        self.signal();
    }

    /// Set the pending wake; a wake that is already pending is coalesced.
    pub(crate) fn signal(&self) {
        {
            let mut wake = self.wake.lock();
            if wake.pending {
                self.diagnostics
                    .wakes_coalesced
                    .fetch_add(1, Ordering::Relaxed);
            }
            wake.pending = true;
        }
        self.diagnostics
            .wakes_signaled
            .fetch_add(1, Ordering::Relaxed);
        self.wake_cond.notify_one();
    }

    /// Wake every waiter without setting `pending` (used for shutdown).
    pub(crate) fn wake_all(&self) {
        let _wake = self.wake.lock();
        self.wake_cond.notify_all();
    }

    /// Swap in a complete set of size-dependent buffers under all three locks.
    ///
    /// The replaced buffers are returned so they are freed after the locks
    /// are released.
    pub(crate) fn install(
        &self,
        ring: StereoRing,
        engine: SpectrumEngine,
        decay: DecayModel,
    ) -> (StereoRing, Option<SpectrumEngine>, DecayModel) {
        let mut samples = self.samples.lock();
        let mut slot = self.engine.lock();
        let mut draw = self.draw.lock();
        (
            std::mem::replace(&mut *samples, ring),
            slot.replace(engine),
            std::mem::replace(&mut *draw, decay),
        )
    }
}

/// Producer-side handle given to the capture callback.
///
/// Pushing is a no-op unless the coordinator is running, so a handle that
/// outlives `stop()` cannot feed a stopped pipeline.
#[derive(Clone)]
pub struct CaptureHandle {
    shared: Arc<Shared>,
}

impl CaptureHandle {
    /// Push an interleaved `L R L R …` block of `f32` samples.
    ///
    /// Bounded by the block length; never allocates.
    pub fn push_interleaved(&self, data: &[f32]) {
        self.push_interleaved_with(data, |s| s);
    }

    /// Push an interleaved block of device samples, converting each to `f32`.
    pub fn push_interleaved_with<T, F>(&self, data: &[T], convert: F)
    where
        T: Copy,
        F: Fn(T) -> f32,
    {
        if !self.shared.running.load(Ordering::Acquire) {
            return;
        }
        self.shared.ingest(data, convert);
    }

    /// Whether pushes currently reach the pipeline.
    pub fn is_active(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for CaptureHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureHandle")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Where `start` gets its samples from.
enum CaptureSource {
    Device { preferred: Option<String> },
    External,
}

/// Capture thread that owns the device stream until released.
struct DeviceThread {
    release_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
    device_name: String,
}

impl DeviceThread {
    fn release(self) {
        drop(self.release_tx);
        if self.handle.join().is_err() {
            warn!(device = self.device_name.as_str(), "capture thread panicked");
        }
    }
}

#[derive(Default)]
struct Lifecycle {
    worker: Option<JoinHandle<()>>,
    device: Option<DeviceThread>,
}

/// The top-level pipeline handle.
///
/// `PipelineCoordinator` is `Send + Sync`; all fields use interior
/// mutability. Share it as `Arc<PipelineCoordinator>` between the render
/// loop and whatever thread issues reconfiguration.
pub struct PipelineCoordinator {
    config: Mutex<PipelineConfig>,
    shared: Arc<Shared>,
    status: Mutex<PipelineStatus>,
    status_tx: broadcast::Sender<PipelineStatusEvent>,
    lifecycle: Mutex<Lifecycle>,
    epoch: AtomicU64,
    configured: AtomicBool,
}

impl PipelineCoordinator {
    /// Create an idle coordinator. No buffers are allocated until `configure`
    /// or `start`.
    pub fn new(config: PipelineConfig) -> Self {
        let (status_tx, _) = broadcast::channel(BROADCAST_CAP);
        Self {
            config: Mutex::new(config),
            shared: Arc::new(Shared::new()),
            status: Mutex::new(PipelineStatus::Idle),
            status_tx,
            lifecycle: Mutex::new(Lifecycle::default()),
            epoch: AtomicU64::new(0),
            configured: AtomicBool::new(false),
        }
    }

    /// Rebuild every size-dependent buffer for `size` and `window`.
    ///
    /// The new engine, ring and decay state are built before any lock is
    /// taken, then swapped in together. Readers observe either the old epoch
    /// or the new one, never a mix.
    ///
    /// # Errors
    /// `SpectraError::UnsupportedTransformSize` for a size outside the preset
    /// set. The active configuration is left untouched.
    pub fn configure(&self, size: usize, window: WindowType) -> Result<()> {
        let lifecycle = self.lifecycle.lock();
        self.configure_locked(&lifecycle, size, window)
    }

    fn configure_locked(
        &self,
        lifecycle: &Lifecycle,
        size: usize,
        window: WindowType,
    ) -> Result<()> {
        let mut config = self.config.lock();
        let engine = SpectrumEngine::new(size, window, config.magnitude)?;

        self.set_status(PipelineStatus::Reconfiguring, Some(size), None);

        let epoch = self.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        let retired = self.shared.install(
            StereoRing::new(size, epoch),
            engine.with_epoch(epoch),
            DecayModel::new(size / 2, config.decay_timestep, epoch),
        );
        drop(retired);

        config.transform_size = size;
        config.window = window;
        self.configured.store(true, Ordering::Release);
        self.shared
            .diagnostics
            .reconfigurations
            .fetch_add(1, Ordering::Relaxed);

        info!(
            transform_size = size,
            epoch,
            window = window.label(),
            "pipeline configured"
        );

        let next = if lifecycle.worker.is_some() {
            PipelineStatus::Running
        } else {
            PipelineStatus::Configured
        };
        self.set_status(next, Some(size), None);
        Ok(())
    }

    /// Change only the transform size, keeping the current window.
    pub fn set_transform_size(&self, size: usize) -> Result<()> {
        let lifecycle = self.lifecycle.lock();
        let window = self.config.lock().window;
        self.configure_locked(&lifecycle, size, window)
    }

    /// Change only the window, keeping the current transform size.
    pub fn set_window(&self, window: WindowType) -> Result<()> {
        let lifecycle = self.lifecycle.lock();
        let size = self.config.lock().transform_size;
        self.configure_locked(&lifecycle, size, window)
    }

    /// Start the worker and capture from the default input device.
    ///
    /// Blocks until the device is confirmed open (or fails). A no-op if
    /// already running.
    ///
    /// # Errors
    /// - `SpectraError::UnsupportedTransformSize` if idle with a bad config.
    /// - `SpectraError::NoDefaultInputDevice` / `AudioDevice` / `AudioStream`
    ///   on device failure; the worker is stopped again before returning.
    pub fn start(&self) -> Result<()> {
        self.start_with_device(None)
    }

    /// Start capturing from a preferred input device name, falling back to
    /// the default input when it is not found.
    pub fn start_with_device(&self, preferred_input_device: Option<String>) -> Result<()> {
        self.start_inner(CaptureSource::Device {
            preferred: preferred_input_device,
        })
    }

    /// Start only the worker. Samples arrive through `capture_handle()`.
    pub fn start_external(&self) -> Result<()> {
        self.start_inner(CaptureSource::External)
    }

    fn start_inner(&self, source: CaptureSource) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.worker.is_some() {
            return Ok(());
        }

        if !self.configured.load(Ordering::Acquire) {
            let (size, window) = {
                let config = self.config.lock();
                (config.transform_size, config.window)
            };
            self.configure_locked(&lifecycle, size, window)?;
        }

        self.shared.running.store(true, Ordering::Release);
        let shared = Arc::clone(&self.shared);
        let worker = match thread::Builder::new()
            .name("spectra-worker".into())
            .spawn(move || worker::run(shared))
        {
            Ok(handle) => handle,
            Err(e) => {
                self.shared.running.store(false, Ordering::Release);
                return Err(e.into());
            }
        };
        lifecycle.worker = Some(worker);

        if let CaptureSource::Device { preferred } = source {
            match self.open_device(preferred) {
                Ok(device) => {
                    info!(device = device.device_name.as_str(), "capture device bound");
                    lifecycle.device = Some(device);
                }
                Err(e) => {
                    if let Err(join_err) = self.shutdown_worker(&mut lifecycle) {
                        warn!("worker shutdown after device failure: {join_err}");
                    }
                    self.set_status(PipelineStatus::Error, self.active_size(), Some(e.to_string()));
                    return Err(e);
                }
            }
        }

        self.set_status(PipelineStatus::Running, self.active_size(), None);
        info!("pipeline started");
        Ok(())
    }

    /// Stop the worker, then release the capture device.
    ///
    /// Returns once the worker thread has observed shutdown and exited. A
    /// no-op if not running.
    ///
    /// # Errors
    /// `SpectraError::Other` if the worker thread panicked.
    pub fn stop(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.worker.is_none() {
            return Ok(());
        }
        let joined = self.shutdown_worker(&mut lifecycle);
        if let Some(device) = lifecycle.device.take() {
            device.release();
        }
        self.set_status(PipelineStatus::Configured, self.active_size(), None);
        info!("pipeline stopped");
        joined
    }

    fn shutdown_worker(&self, lifecycle: &mut Lifecycle) -> Result<()> {
        self.shared.running.store(false, Ordering::Release);
        self.shared.wake_all();
        match lifecycle.worker.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| SpectraError::Other(anyhow::anyhow!("transform worker panicked"))),
            None => Ok(()),
        }
    }

    fn open_device(&self, preferred: Option<String>) -> Result<DeviceThread> {
        let handle = self.capture_handle();
        let sample_rate = self.config.lock().sample_rate;

        // Sync oneshot: capture thread reports the opened device name.
        let (open_tx, open_rx) = mpsc::channel::<Result<String>>();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let thread = thread::Builder::new()
            .name("spectra-capture".into())
            .spawn(move || {
                // ── Open (must happen on THIS thread: cpal::Stream is !Send) ──
                let capture =
                    match AudioCapture::open_with_preference(handle, preferred.as_deref(), sample_rate)
                    {
                        Ok(c) => {
                            let _ = open_tx.send(Ok(c.device_name.clone()));
                            c
                        }
                        Err(e) => {
                            let _ = open_tx.send(Err(e));
                            return;
                        }
                    };

                // Parked until `DeviceThread::release` drops the sender.
                let _ = release_rx.recv();
                capture.stop();
                drop(capture);
            })?;

        match open_rx.recv() {
            Ok(Ok(device_name)) => Ok(DeviceThread {
                release_tx,
                handle: thread,
                device_name,
            }),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(SpectraError::Other(anyhow::anyhow!(
                    "capture thread died unexpectedly"
                )))
            }
        }
    }

    /// Producer handle for feeding interleaved stereo samples.
    pub fn capture_handle(&self) -> CaptureHandle {
        CaptureHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Copy of the current heights and bin axis.
    pub fn snapshot(&self) -> SpectrumSnapshot {
        SpectrumSnapshot::capture(&self.shared.draw.lock())
    }

    /// Accumulate `elapsed` and apply every whole decay step now due.
    pub fn decay_step(&self, elapsed: Duration) -> u32 {
        let steps = self.shared.draw.lock().decay_step(elapsed);
        self.count_decay_steps(steps);
        steps
    }

    /// Consumer frame: decay then snapshot, under one draw-buffer lock.
    pub fn render_tick(&self, elapsed: Duration) -> SpectrumSnapshot {
        let mut snapshot = SpectrumSnapshot::default();
        self.render_tick_into(elapsed, &mut snapshot);
        snapshot
    }

    /// Like `render_tick`, reusing `snapshot`'s allocations. Returns the
    /// number of decay steps applied.
    pub fn render_tick_into(&self, elapsed: Duration, snapshot: &mut SpectrumSnapshot) -> u32 {
        let steps = {
            let mut draw = self.shared.draw.lock();
            let steps = draw.decay_step(elapsed);
            snapshot.refresh_from(&draw);
            steps
        };
        self.count_decay_steps(steps);
        steps
    }

    fn count_decay_steps(&self, steps: u32) {
        self.shared
            .diagnostics
            .decay_steps
            .fetch_add(steps as usize, Ordering::Relaxed);
    }

    /// Currently active configuration.
    pub fn config(&self) -> PipelineConfig {
        self.config.lock().clone()
    }

    /// Active transform size, `None` while idle.
    pub fn transform_size(&self) -> Option<TransformSize> {
        if !self.configured.load(Ordering::Acquire) {
            return None;
        }
        TransformSize::new(self.config.lock().transform_size).ok()
    }

    fn active_size(&self) -> Option<usize> {
        self.transform_size().map(TransformSize::get)
    }

    /// Current configuration epoch (0 while idle).
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle.lock().worker.is_some()
    }

    /// Name of the bound capture device, if any.
    pub fn device_name(&self) -> Option<String> {
        self.lifecycle
            .lock()
            .device
            .as_ref()
            .map(|d| d.device_name.clone())
    }

    /// Current status (snapshot).
    pub fn status(&self) -> PipelineStatus {
        *self.status.lock()
    }

    /// Subscribe to status change events.
    pub fn subscribe_status(&self) -> broadcast::Receiver<PipelineStatusEvent> {
        self.status_tx.subscribe()
    }

    /// Snapshot of pipeline counters for observability.
    pub fn diagnostics(&self) -> DiagnosticsSnapshot {
        self.shared.diagnostics.snapshot()
    }

    fn set_status(
        &self,
        new_status: PipelineStatus,
        transform_size: Option<usize>,
        detail: Option<String>,
    ) {
        *self.status.lock() = new_status;
        let _ = self.status_tx.send(PipelineStatusEvent {
            status: new_status,
            transform_size,
            detail,
        });
    }
}

impl Drop for PipelineCoordinator {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("pipeline stop on drop failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Instant;

    use tokio::sync::broadcast::error::TryRecvError;

    use crate::buffering::Channel;

    fn small_config() -> PipelineConfig {
        PipelineConfig {
            transform_size: 256,
            ..PipelineConfig::default()
        }
    }

    fn recv_status_with_timeout(
        rx: &mut broadcast::Receiver<PipelineStatusEvent>,
        timeout: Duration,
    ) -> PipelineStatusEvent {
        let start = Instant::now();
        loop {
            match rx.try_recv() {
                Ok(ev) => return ev,
                Err(TryRecvError::Empty) => {
                    if start.elapsed() >= timeout {
                        panic!("timed out waiting for status event");
                    }
                    thread::sleep(Duration::from_millis(5));
                }
                Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Closed) => panic!("status channel closed unexpectedly"),
            }
        }
    }

    #[test]
    fn new_coordinator_is_idle_and_empty() {
        let coordinator = PipelineCoordinator::new(small_config());
        assert_eq!(coordinator.status(), PipelineStatus::Idle);
        assert_eq!(coordinator.transform_size(), None);
        assert!(coordinator.snapshot().is_empty());
        assert!(!coordinator.capture_handle().is_active());
    }

    #[test]
    fn configure_allocates_matching_buffers() {
        let coordinator = PipelineCoordinator::new(small_config());
        coordinator
            .configure(1024, WindowType::Hann)
            .expect("configure");
        assert_eq!(coordinator.status(), PipelineStatus::Configured);
        assert_eq!(coordinator.epoch(), 1);

        let snapshot = coordinator.snapshot();
        assert_eq!(snapshot.transform_size, 1024);
        assert_eq!(snapshot.bins.len(), 512);
        assert_eq!(snapshot.heights(Channel::Left).len(), 512);
        assert_eq!(coordinator.config().window, WindowType::Hann);
    }

    #[test]
    fn rejected_size_leaves_prior_configuration_intact() {
        let coordinator = PipelineCoordinator::new(small_config());
        coordinator
            .configure(512, WindowType::BlackmanHarris)
            .expect("configure");
        let mut rx = coordinator.subscribe_status();

        let err = coordinator
            .set_transform_size(1000)
            .expect_err("1000 is not a preset");
        assert!(err.is_configuration());
        assert_eq!(coordinator.transform_size().map(TransformSize::get), Some(512));
        assert_eq!(coordinator.epoch(), 1);
        assert_eq!(coordinator.snapshot().bins.len(), 256);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn configure_publishes_reconfiguring_then_configured() {
        let coordinator = PipelineCoordinator::new(small_config());
        let mut rx = coordinator.subscribe_status();
        coordinator
            .configure(2048, WindowType::BlackmanHarris)
            .expect("configure");

        let first = recv_status_with_timeout(&mut rx, Duration::from_secs(1));
        assert_eq!(first.status, PipelineStatus::Reconfiguring);
        assert_eq!(first.transform_size, Some(2048));
        let second = recv_status_with_timeout(&mut rx, Duration::from_secs(1));
        assert_eq!(second.status, PipelineStatus::Configured);
    }

    #[test]
    fn start_external_configures_from_config_and_is_idempotent() {
        let coordinator = PipelineCoordinator::new(small_config());
        coordinator.start_external().expect("start");
        coordinator.start_external().expect("second start is a no-op");
        assert!(coordinator.is_running());
        assert_eq!(coordinator.status(), PipelineStatus::Running);
        assert_eq!(coordinator.transform_size().map(TransformSize::get), Some(256));
        assert_eq!(coordinator.diagnostics().reconfigurations, 1);

        coordinator.stop().expect("stop");
        coordinator.stop().expect("second stop is a no-op");
        assert!(!coordinator.is_running());
        assert_eq!(coordinator.status(), PipelineStatus::Configured);
    }

    #[test]
    fn start_with_unsupported_config_fails_before_running() {
        let coordinator = PipelineCoordinator::new(PipelineConfig {
            transform_size: 300,
            ..PipelineConfig::default()
        });
        let err = coordinator.start_external().expect_err("bad size");
        assert!(matches!(err, SpectraError::UnsupportedTransformSize { size: 300 }));
        assert!(!coordinator.is_running());
        assert_eq!(coordinator.status(), PipelineStatus::Idle);
    }

    #[test]
    fn reconfigure_while_running_returns_to_running() {
        let coordinator = PipelineCoordinator::new(small_config());
        coordinator.start_external().expect("start");
        coordinator
            .set_transform_size(4096)
            .expect("reconfigure");
        assert_eq!(coordinator.status(), PipelineStatus::Running);
        assert_eq!(coordinator.snapshot().bins.len(), 2048);
        coordinator.stop().expect("stop");
    }

    #[test]
    fn status_tracks_worker_when_configure_races_start_and_stop() {
        let coordinator = Arc::new(PipelineCoordinator::new(small_config()));
        coordinator
            .configure(256, WindowType::BlackmanHarris)
            .expect("configure");

        let toggler = {
            let coordinator = Arc::clone(&coordinator);
            thread::spawn(move || {
                for _ in 0..50 {
                    coordinator.start_external().expect("start");
                    coordinator.stop().expect("stop");
                }
            })
        };
        let reconfigurer = {
            let coordinator = Arc::clone(&coordinator);
            thread::spawn(move || {
                let sizes = [128, 512, 256, 1024];
                for i in 0..200 {
                    coordinator
                        .set_transform_size(sizes[i % sizes.len()])
                        .expect("reconfigure");
                    let status = coordinator.status();
                    assert!(
                        matches!(
                            status,
                            PipelineStatus::Running
                                | PipelineStatus::Configured
                                | PipelineStatus::Reconfiguring
                        ),
                        "unexpected status {status:?}"
                    );
                }
            })
        };
        toggler.join().expect("toggler");
        reconfigurer.join().expect("reconfigurer");

        assert!(!coordinator.is_running());
        assert_eq!(coordinator.status(), PipelineStatus::Configured);

        coordinator.set_window(WindowType::Hann).expect("reconfigure");
        assert_eq!(coordinator.status(), PipelineStatus::Configured);
    }

    #[cfg(not(feature = "audio-cpal"))]
    #[test]
    fn device_failure_stops_worker_and_publishes_error() {
        let coordinator = PipelineCoordinator::new(small_config());
        let mut rx = coordinator.subscribe_status();

        let err = coordinator.start().expect_err("no capture backend");
        assert!(err.is_device());
        assert!(!coordinator.is_running());
        assert_eq!(coordinator.status(), PipelineStatus::Error);

        let mut last = recv_status_with_timeout(&mut rx, Duration::from_secs(1));
        while last.status != PipelineStatus::Error {
            last = recv_status_with_timeout(&mut rx, Duration::from_secs(1));
        }
        assert!(last.detail.is_some());

        coordinator.start_external().expect("worker restarts");
        assert_eq!(coordinator.status(), PipelineStatus::Running);
        coordinator.stop().expect("stop");
    }

    #[test]
    fn pushes_are_ignored_after_stop() {
        let coordinator = PipelineCoordinator::new(small_config());
        let handle = coordinator.capture_handle();
        coordinator.start_external().expect("start");
        handle.push_interleaved(&[0.5; 512]);
        coordinator.stop().expect("stop");

        let captured = coordinator.diagnostics().frames_captured;
        assert_eq!(captured, 256);
        handle.push_interleaved(&[0.5; 512]);
        assert_eq!(coordinator.diagnostics().frames_captured, captured);
    }

    #[test]
    fn render_tick_decays_thresholds_on_fixed_steps() {
        let coordinator = PipelineCoordinator::new(small_config());
        coordinator
            .configure(256, WindowType::BlackmanHarris)
            .expect("configure");
        let step = coordinator.config().decay_timestep;

        assert_eq!(coordinator.decay_step(step / 2), 0);
        let mut snapshot = SpectrumSnapshot::default();
        assert_eq!(coordinator.render_tick_into(step / 2 + step, &mut snapshot), 1);
        assert_eq!(snapshot.bins.len(), 128);
        assert_eq!(coordinator.diagnostics().decay_steps, 1);
    }
}
