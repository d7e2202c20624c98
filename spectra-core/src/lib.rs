//! # spectra-core
//!
//! Real-time stereo audio → magnitude spectrum pipeline.
//!
//! ## Architecture
//!
//! ```text
//! Input device → AudioCapture → CaptureHandle ─► StereoRing   (sample-buffer lock)
//!                                    │ signal (coalescing)
//!                                    ▼
//!                             spectra-worker thread
//!                     copy frame → SpectrumEngine            (engine lock)
//!                                    │
//!                             DecayModel::merge              (draw-buffer lock)
//!                                    │
//!          render loop ◄── PipelineCoordinator::render_tick (decay + snapshot)
//! ```
//!
//! The capture callback never allocates. Each lock is held for one bounded
//! copy or transform; configuration swaps every size-dependent buffer at
//! once under all three.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod audio;
pub mod buffering;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod ipc;

// Convenience re-exports for downstream crates
pub use audio::device::{list_input_devices, DeviceInfo};
pub use buffering::Channel;
pub use dsp::{MagnitudeMode, TransformSize, WindowType};
pub use engine::worker::DiagnosticsSnapshot;
pub use engine::{CaptureHandle, PipelineConfig, PipelineCoordinator};
pub use error::SpectraError;
pub use ipc::events::{PipelineStatus, PipelineStatusEvent, SpectrumSnapshot};
