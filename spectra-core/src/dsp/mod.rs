//! Signal processing stages run by the transform worker.
//!
//! ```text
//! frame ─► window (window.rs) ─► forward transform + magnitude (spectrum.rs)
//!                                          │
//!                                 merge / decay (decay.rs)
//! ```

pub mod decay;
pub mod spectrum;
pub mod window;

pub use decay::{ChannelVisualState, DecayModel, FixedStep};
pub use spectrum::{MagnitudeMode, SpectrumEngine, TransformSize};
pub use window::WindowType;
