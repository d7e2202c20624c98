//! Coarse log-log text rendering of a `SpectrumSnapshot`.
//!
//! Columns are spaced logarithmically over bins `1..bins` (DC is skipped, it
//! has no place on a log axis). Each column shows the loudest bin it covers,
//! mapped onto the y-range `[floor, ceiling]` in log10.

use spectra_core::buffering::frame::{bin_to_hz, peak_of};
use spectra_core::{Channel, SpectrumSnapshot};

use crate::settings::AppSettings;

const LEVELS: [char; 9] = [' ', '▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

#[derive(Debug, Clone)]
pub struct SpectrumView {
    columns: usize,
    y_floor: f32,
    y_ceiling: f32,
    swap_channels: bool,
    /// Cached `[start, end)` bin ranges and the bin count they were built for.
    edges: Vec<(usize, usize)>,
    edges_bins: usize,
}

impl SpectrumView {
    pub fn new(settings: &AppSettings) -> Self {
        Self {
            columns: settings.columns,
            y_floor: settings.y_floor,
            y_ceiling: settings.y_ceiling,
            swap_channels: settings.swap_channels,
            edges: Vec::new(),
            edges_bins: 0,
        }
    }

    pub fn swap_channels(&self) -> bool {
        self.swap_channels
    }

    pub fn set_swap_channels(&mut self, swap: bool) {
        self.swap_channels = swap;
    }

    fn channel_order(&self) -> [Channel; 2] {
        if self.swap_channels {
            [Channel::Right, Channel::Left]
        } else {
            [Channel::Left, Channel::Right]
        }
    }

    /// One header line plus one bar line per channel.
    pub fn render(&mut self, snapshot: &SpectrumSnapshot, sample_rate: u32) -> String {
        if snapshot.is_empty() {
            return "waiting for first configuration…\n".to_string();
        }

        let bins = snapshot.bins.len();
        if bins != self.edges_bins {
            self.edges = log_column_edges(bins, self.columns);
            self.edges_bins = bins;
        }

        let mut out = String::with_capacity((self.edges.len() + 16) * 3);
        let top = top_frequency(snapshot, Channel::Left, sample_rate);
        out.push_str(&format!(
            "size {:>5}  epoch {:>3}  L peak {:>8.1} Hz\n",
            snapshot.transform_size, snapshot.epoch, top
        ));

        for channel in self.channel_order() {
            out.push_str(match channel {
                Channel::Left => "L ",
                Channel::Right => "R ",
            });
            let heights = snapshot.heights(channel);
            for &(start, end) in &self.edges {
                let peak = heights[start..end].iter().copied().fold(0.0f32, f32::max);
                out.push(glyph(level(peak, self.y_floor, self.y_ceiling)));
            }
            out.push('\n');
        }
        out
    }
}

/// Split bins `1..bins` into at most `columns` non-empty, log-spaced ranges.
pub fn log_column_edges(bins: usize, columns: usize) -> Vec<(usize, usize)> {
    if bins < 2 || columns == 0 {
        return Vec::new();
    }
    let lo = 1.0f64;
    let hi = bins as f64;
    let ratio = (hi / lo).ln() / columns as f64;

    let mut edges = Vec::with_capacity(columns);
    let mut start = 1usize;
    for col in 1..=columns {
        if start >= bins {
            break;
        }
        let end = ((lo * (ratio * col as f64).exp()).round() as usize).clamp(start + 1, bins);
        edges.push((start, end));
        start = end;
    }
    edges
}

/// Position of `value` in `[floor, ceiling]` on a log10 scale, clamped to `0..=1`.
pub fn level(value: f32, floor: f32, ceiling: f32) -> f32 {
    if value.is_nan() || value <= floor {
        return 0.0;
    }
    let span = ceiling.log10() - floor.log10();
    if span <= 0.0 {
        return 1.0;
    }
    ((value.log10() - floor.log10()) / span).clamp(0.0, 1.0)
}

fn glyph(level: f32) -> char {
    let idx = (level * (LEVELS.len() - 1) as f32).round() as usize;
    LEVELS[idx.min(LEVELS.len() - 1)]
}

fn top_frequency(snapshot: &SpectrumSnapshot, channel: Channel, sample_rate: u32) -> f32 {
    let peak = peak_of(snapshot.heights(channel)).map_or(0, |(bin, _)| bin);
    bin_to_hz(peak, snapshot.transform_size, sample_rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_with(bins: usize, left_peak: (usize, f32)) -> SpectrumSnapshot {
        let mut left = vec![0.0; bins];
        left[left_peak.0] = left_peak.1;
        SpectrumSnapshot {
            epoch: 3,
            transform_size: bins * 2,
            bins: (0..bins).map(|b| b as f32).collect::<Vec<_>>().into(),
            heights: [left, vec![100.0; bins]],
        }
    }

    #[test]
    fn log_edges_cover_every_bin_once() {
        for (bins, columns) in [(64, 16), (4096, 96), (16384, 512), (64, 200)] {
            let edges = log_column_edges(bins, columns);
            assert!(!edges.is_empty());
            assert!(edges.len() <= columns);
            assert_eq!(edges[0].0, 1);
            assert_eq!(edges.last().map(|e| e.1), Some(bins));
            for pair in edges.windows(2) {
                assert_eq!(pair[0].1, pair[1].0, "bins={bins} columns={columns}");
            }
            assert!(edges.iter().all(|&(s, e)| e > s));
        }
    }

    #[test]
    fn log_edges_widen_toward_high_bins() {
        let edges = log_column_edges(8192, 32);
        let first = edges[0].1 - edges[0].0;
        let last = edges[edges.len() - 1].1 - edges[edges.len() - 1].0;
        assert!(last > first * 10);
    }

    #[test]
    fn level_maps_log_range() {
        assert_eq!(level(0.0, 0.001, 100.0), 0.0);
        assert_eq!(level(0.001, 0.001, 100.0), 0.0);
        assert_eq!(level(1000.0, 0.001, 100.0), 1.0);
        assert!((level(1.0, 0.001, 100.0) - 0.6).abs() < 1e-5);
        assert_eq!(level(f32::NAN, 0.001, 100.0), 0.0);
    }

    #[test]
    fn render_swaps_channel_order() {
        let settings = AppSettings {
            columns: 8,
            ..AppSettings::default()
        };
        let snapshot = snapshot_with(64, (10, 50.0));
        let mut view = SpectrumView::new(&settings);

        let text = view.render(&snapshot, 44_100);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("L "));
        assert!(lines[2].starts_with("R "));
        assert!(lines[2].ends_with('█'));

        view.set_swap_channels(true);
        let text = view.render(&snapshot, 44_100);
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[1].starts_with("R "));
        assert!(lines[2].starts_with("L "));
    }

    #[test]
    fn header_reports_left_peak_frequency() {
        let settings = AppSettings::default();
        let snapshot = snapshot_with(1024, (20, 5.0));
        let text = SpectrumView::new(&settings).render(&snapshot, 44_100);
        // 20 × 44100 / 2048
        assert!(text.lines().next().is_some_and(|h| h.contains("430.7 Hz")));
    }

    #[test]
    fn empty_snapshot_renders_placeholder() {
        let mut view = SpectrumView::new(&AppSettings::default());
        assert!(view.render(&SpectrumSnapshot::default(), 44_100).starts_with("waiting"));
    }
}
