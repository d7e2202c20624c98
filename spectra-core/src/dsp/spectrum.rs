//! Windowed real-input forward transform producing per-bin magnitudes.
//!
//! ## Cost model
//!
//! Planning a transform builds twiddle tables and picks an algorithm for the
//! size, so a `SpectrumEngine` is built once per epoch by the coordinator and
//! reused for every frame. `process_frame` performs no allocation.

use std::fmt;
use std::sync::Arc;

use realfft::{num_complex::Complex, RealFftPlanner, RealToComplex};
use serde::{Deserialize, Serialize};

use crate::dsp::window::WindowType;
use crate::error::{Result, SpectraError};

/// Validated transform size: a power of two in `128..=32768`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransformSize(usize);

impl TransformSize {
    /// Every preset the pipeline accepts, smallest first.
    pub const SUPPORTED: [usize; 9] = [128, 256, 512, 1024, 2048, 4096, 8192, 16384, 32768];
    pub const MIN: TransformSize = TransformSize(128);
    pub const MAX: TransformSize = TransformSize(32768);
    pub const DEFAULT: TransformSize = TransformSize(8192);

    /// # Errors
    /// `SpectraError::UnsupportedTransformSize` unless `size` is a preset.
    pub fn new(size: usize) -> Result<Self> {
        if Self::SUPPORTED.contains(&size) {
            Ok(Self(size))
        } else {
            Err(SpectraError::UnsupportedTransformSize { size })
        }
    }

    /// Snap an arbitrary request onto the closest preset (ties go up).
    pub fn nearest(size: usize) -> Self {
        let mut best = Self::MIN.0;
        for &candidate in Self::SUPPORTED.iter() {
            if candidate.abs_diff(size) <= best.abs_diff(size) {
                best = candidate;
            }
        }
        Self(best)
    }

    pub fn get(self) -> usize {
        self.0
    }

    /// Number of magnitude bins (`size / 2`).
    pub fn bins(self) -> usize {
        self.0 / 2
    }
}

impl Default for TransformSize {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<usize> for TransformSize {
    type Error = SpectraError;

    fn try_from(size: usize) -> Result<Self> {
        Self::new(size)
    }
}

impl fmt::Display for TransformSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a complex bin is reduced to a magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MagnitudeMode {
    /// `sqrt(re² + im²)`.
    #[default]
    Exact,
    /// Alpha-max-plus-beta-min: `max + 3·min/8`, within ~7 % of exact.
    Fast,
}

impl MagnitudeMode {
    #[inline]
    pub fn magnitude(self, c: Complex<f32>) -> f32 {
        match self {
            MagnitudeMode::Exact => c.norm(),
            MagnitudeMode::Fast => {
                let re = c.re.abs();
                let im = c.im.abs();
                re.max(im) + 3.0 * re.min(im) / 8.0
            }
        }
    }
}

/// Forward transform plus window and scratch for one transform size.
pub struct SpectrumEngine {
    size: TransformSize,
    window_type: WindowType,
    magnitude: MagnitudeMode,
    window: Vec<f32>,
    fft: Arc<dyn RealToComplex<f32>>,
    /// Real input; overwritten by the transform.
    input: Vec<f32>,
    /// `size / 2 + 1` complex bins, DC through Nyquist.
    spectrum: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    epoch: u64,
}

impl SpectrumEngine {
    /// Plan a real-to-complex transform for `size` samples.
    ///
    /// # Errors
    /// `SpectraError::UnsupportedTransformSize` for a size outside the preset set.
    pub fn new(size: usize, window_type: WindowType, magnitude: MagnitudeMode) -> Result<Self> {
        let size = TransformSize::new(size)?;
        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(size.get());

        Ok(Self {
            size,
            window_type,
            magnitude,
            window: window_type.generate(size.get()),
            input: fft.make_input_vec(),
            spectrum: fft.make_output_vec(),
            scratch: fft.make_scratch_vec(),
            fft,
            epoch: 0,
        })
    }

    /// Tag this engine with the epoch it was built for.
    pub fn with_epoch(mut self, epoch: u64) -> Self {
        self.epoch = epoch;
        self
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn size(&self) -> TransformSize {
        self.size
    }

    pub fn bins(&self) -> usize {
        self.size.bins()
    }

    /// Window `frame` and write `size / 2` magnitudes into `out`.
    ///
    /// # Errors
    /// `SpectraError::FrameLength` if `frame` is not `size` long or `out` is
    /// not `size / 2` long.
    pub fn process_frame(&mut self, frame: &[f32], out: &mut [f32]) -> Result<()> {
        self.check_lengths(frame.len(), out.len())?;
        for ((dst, &sample), &w) in self.input.iter_mut().zip(frame).zip(&self.window) {
            *dst = sample * w;
        }
        self.forward(out)
    }

    /// Transform an already-windowed frame; no taper is applied.
    ///
    /// # Errors
    /// Same length rules as `process_frame`.
    pub fn transform(&mut self, windowed: &[f32], out: &mut [f32]) -> Result<()> {
        self.check_lengths(windowed.len(), out.len())?;
        self.input.copy_from_slice(windowed);
        self.forward(out)
    }

    fn forward(&mut self, out: &mut [f32]) -> Result<()> {
        self.fft
            .process_with_scratch(&mut self.input, &mut self.spectrum, &mut self.scratch)
            .map_err(|e| SpectraError::Other(anyhow::anyhow!("forward transform failed: {e}")))?;
        // The Nyquist bin is dropped: `out` holds DC .. size/2 - 1.
        let mode = self.magnitude;
        for (dst, &c) in out.iter_mut().zip(&self.spectrum) {
            *dst = mode.magnitude(c);
        }
        Ok(())
    }

    fn check_lengths(&self, input: usize, output: usize) -> Result<()> {
        if input != self.size.get() {
            return Err(SpectraError::FrameLength {
                expected: self.size.get(),
                actual: input,
            });
        }
        if output != self.size.bins() {
            return Err(SpectraError::FrameLength {
                expected: self.size.bins(),
                actual: output,
            });
        }
        Ok(())
    }
}

impl fmt::Debug for SpectrumEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectrumEngine")
            .field("size", &self.size)
            .field("window_type", &self.window_type)
            .field("magnitude", &self.magnitude)
            .field("epoch", &self.epoch)
            .finish_non_exhaustive()
    }
}
