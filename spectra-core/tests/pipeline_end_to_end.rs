use std::f32::consts::PI;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread;
use std::time::{Duration, Instant};

use spectra_core::{
    Channel, PipelineConfig, PipelineCoordinator, PipelineStatus, SpectrumSnapshot, TransformSize,
    WindowType,
};

const SAMPLE_RATE: f32 = 44_100.0;

fn stereo_sine(freq: f32, frames: usize) -> Vec<f32> {
    (0..frames)
        .flat_map(|i| {
            let s = (2.0 * PI * freq * i as f32 / SAMPLE_RATE).sin();
            [s, s]
        })
        .collect()
}

fn wait_for<F: Fn() -> bool>(timeout: Duration, what: &str, cond: F) {
    let start = Instant::now();
    while !cond() {
        if start.elapsed() >= timeout {
            panic!("timed out waiting for {what}");
        }
        thread::sleep(Duration::from_millis(5));
    }
}

fn assert_consistent(snapshot: &SpectrumSnapshot) {
    let bins = snapshot.transform_size / 2;
    assert_eq!(snapshot.bins.len(), bins, "axis length for epoch {}", snapshot.epoch);
    for channel in Channel::ALL {
        assert_eq!(
            snapshot.heights(channel).len(),
            bins,
            "{channel:?} heights for epoch {}",
            snapshot.epoch
        );
    }
}

#[test]
fn sine_input_peaks_at_expected_bin() {
    let coordinator = PipelineCoordinator::new(PipelineConfig {
        transform_size: 2048,
        ..PipelineConfig::default()
    });
    coordinator.start_external().expect("start");

    // 440 Hz at 2048 points: bin width ~21.5 Hz, so the peak lands in bin 20.
    coordinator
        .capture_handle()
        .push_interleaved(&stereo_sine(440.0, 4096));
    wait_for(Duration::from_secs(2), "first merged pass", || {
        coordinator.diagnostics().passes >= 1
    });

    let snapshot = coordinator.snapshot();
    coordinator.stop().expect("stop");

    assert_consistent(&snapshot);
    for channel in Channel::ALL {
        let heights = snapshot.heights(channel);
        let (peak, peak_height) = heights
            .iter()
            .copied()
            .enumerate()
            .skip(1)
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .expect("non-empty spectrum");
        assert_eq!(peak, 20, "{channel:?}");

        for (bin, &h) in heights.iter().enumerate() {
            if bin.abs_diff(peak) > 5 {
                assert!(
                    peak_height > h * 100.0,
                    "{channel:?} bin {bin}: {h} vs peak {peak_height}"
                );
            }
        }
    }
}

#[test]
fn reconfiguration_under_load_never_exposes_mixed_buffers() {
    let coordinator = Arc::new(PipelineCoordinator::new(PipelineConfig {
        transform_size: 512,
        ..PipelineConfig::default()
    }));
    coordinator.start_external().expect("start");
    let done = Arc::new(AtomicBool::new(false));

    let feeder = {
        let handle = coordinator.capture_handle();
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let block = stereo_sine(1_000.0, 256);
            while !done.load(Ordering::Acquire) {
                handle.push_interleaved(&block);
                thread::sleep(Duration::from_micros(200));
            }
        })
    };

    let reader = {
        let coordinator = Arc::clone(&coordinator);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut snapshot = SpectrumSnapshot::default();
            let mut checked = 0usize;
            while !done.load(Ordering::Acquire) {
                coordinator.render_tick_into(Duration::from_millis(1), &mut snapshot);
                assert_consistent(&snapshot);
                checked += 1;
            }
            checked
        })
    };

    let sizes = [128, 4096, 256, 32768, 1024, 8192, 512];
    for round in 0..4 {
        for &size in &sizes {
            let window = if round % 2 == 0 {
                WindowType::BlackmanHarris
            } else {
                WindowType::Hann
            };
            coordinator.configure(size, window).expect("configure");
            thread::sleep(Duration::from_millis(2));
        }
    }

    done.store(true, Ordering::Release);
    feeder.join().expect("feeder panicked");
    let checked = reader.join().expect("reader saw an inconsistent snapshot");
    assert!(checked > 0);

    assert_eq!(coordinator.status(), PipelineStatus::Running);
    assert_eq!(coordinator.transform_size(), TransformSize::new(512).ok());
    let diag = coordinator.diagnostics();
    assert_eq!(diag.reconfigurations, 1 + 4 * sizes.len());
    assert!(diag.passes > 0);

    coordinator.stop().expect("stop");
    assert_consistent(&coordinator.snapshot());
}

#[test]
fn start_and_stop_are_idempotent() {
    let coordinator = PipelineCoordinator::new(PipelineConfig {
        transform_size: 128,
        ..PipelineConfig::default()
    });

    coordinator.stop().expect("stop before start is a no-op");
    assert_eq!(coordinator.status(), PipelineStatus::Idle);

    for _ in 0..3 {
        coordinator.start_external().expect("start");
        coordinator.start_external().expect("repeated start");
        assert!(coordinator.is_running());
        coordinator.stop().expect("stop");
        coordinator.stop().expect("repeated stop");
        assert!(!coordinator.is_running());
    }

    assert_eq!(coordinator.status(), PipelineStatus::Configured);
    assert_eq!(coordinator.epoch(), 1);
}
