//! Magnitude spectrum produced by one transform.

/// Per-bin magnitudes for one channel, `transform_size / 2` bins long.
///
/// Allocated once per epoch and overwritten in place on every merge.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpectrumFrame {
    /// Non-negative magnitudes, index = frequency bin.
    pub magnitudes: Vec<f32>,
}

impl SpectrumFrame {
    /// Zeroed frame with `bins` entries.
    pub fn zeroed(bins: usize) -> Self {
        Self {
            magnitudes: vec![0.0; bins],
        }
    }

    pub fn bins(&self) -> usize {
        self.magnitudes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.magnitudes.is_empty()
    }

    /// Index and value of the strongest bin, ignoring DC.
    pub fn peak_bin(&self) -> Option<(usize, f32)> {
        peak_of(&self.magnitudes)
    }

    /// Centre frequency of `bin` in Hz for a given capture rate.
    pub fn bin_frequency(&self, bin: usize, sample_rate: u32) -> f32 {
        bin_to_hz(bin, self.bins() * 2, sample_rate)
    }
}

/// Strongest bin of any per-bin sequence (magnitudes or heights), ignoring DC.
pub fn peak_of(values: &[f32]) -> Option<(usize, f32)> {
    values
        .iter()
        .copied()
        .enumerate()
        .skip(1)
        .max_by(|a, b| a.1.total_cmp(&b.1))
}

/// `bin × rate / transform_size`; zero for an unconfigured size.
pub fn bin_to_hz(bin: usize, transform_size: usize, sample_rate: u32) -> f32 {
    if transform_size == 0 {
        return 0.0;
    }
    bin as f32 * sample_rate as f32 / transform_size as f32
}
