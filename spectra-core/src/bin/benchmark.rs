use std::f32::consts::PI;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use spectra_core::{
    buffering::frame::SpectrumFrame, dsp::SpectrumEngine, engine::CAPTURE_SAMPLE_RATE,
    MagnitudeMode, TransformSize, WindowType,
};

#[derive(Debug)]
struct Args {
    wav: Option<PathBuf>,
    iterations: usize,
    window: WindowType,
    magnitude: MagnitudeMode,
    output: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct SizeResult {
    transform_size: usize,
    frames: usize,
    p50_us: f64,
    p95_us: f64,
    avg_us: f64,
    /// Share of the frame's own real-time duration spent transforming.
    realtime_load: f64,
    peak_bin: usize,
    peak_hz: f32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct Summary {
    source: String,
    sample_rate: u32,
    window: WindowType,
    magnitude: MagnitudeMode,
    iterations: usize,
    sizes: Vec<SizeResult>,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("benchmark failed: {e:#}");
        std::process::exit(1);
    }
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        wav: None,
        iterations: 64,
        window: WindowType::BlackmanHarris,
        magnitude: MagnitudeMode::Exact,
        output: None,
    };

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        let mut value = |flag: &str| it.next().with_context(|| format!("missing value for {flag}"));
        match arg.as_str() {
            "--wav" => args.wav = Some(PathBuf::from(value("--wav")?)),
            "--iterations" => {
                args.iterations = value("--iterations")?
                    .parse::<usize>()
                    .context("invalid value for --iterations")?
                    .clamp(1, 10_000);
            }
            "--window" => {
                let raw = value("--window")?;
                args.window =
                    WindowType::parse(&raw).with_context(|| format!("unknown window: {raw}"))?;
            }
            "--fast" => args.magnitude = MagnitudeMode::Fast,
            "--output" => args.output = Some(PathBuf::from(value("--output")?)),
            "--help" | "-h" => {
                println!(
                    "Usage: cargo run -p spectra-core --release --bin spectra-bench -- \\
  [--wav <file.wav>] [--iterations <n>] [--window blackman-harris|hann] [--fast] [--output <file.json>]"
                );
                std::process::exit(0);
            }
            other => bail!("unknown argument: {other}"),
        }
    }
    Ok(args)
}

/// Left channel of a WAV file as `f32` in `[-1, 1]`.
fn read_wav_left(path: &Path) -> Result<(Vec<f32>, u32)> {
    let mut reader =
        hound::WavReader::open(path).with_context(|| format!("opening {}", path.display()))?;
    let spec = reader.spec();
    let channels = usize::from(spec.channels.max(1));

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let max = ((1_i64 << (spec.bits_per_sample - 1)) - 1) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max))
                .collect::<Result<_, _>>()?
        }
    };

    Ok((
        interleaved.into_iter().step_by(channels).collect(),
        spec.sample_rate,
    ))
}

fn synthetic_sine(freq: f32, len: usize, sample_rate: u32) -> Vec<f32> {
    (0..len)
        .map(|i| (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
        .collect()
}

fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let idx = ((sorted.len() - 1) as f64 * p.clamp(0.0, 1.0)).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn bench_size(
    size: TransformSize,
    signal: &[f32],
    sample_rate: u32,
    args: &Args,
) -> Result<SizeResult> {
    let n = size.get();
    let mut engine = SpectrumEngine::new(n, args.window, args.magnitude)?;
    let mut spectrum = SpectrumFrame::zeroed(size.bins());
    let hop = n / 2;
    let starts: Vec<usize> = (0..=signal.len() - n).step_by(hop.max(1)).collect();

    let mut latencies = Vec::with_capacity(args.iterations);
    for i in 0..args.iterations {
        let start = starts[i % starts.len()];
        let frame = &signal[start..start + n];
        let began = Instant::now();
        engine.process_frame(frame, &mut spectrum.magnitudes)?;
        latencies.push(began.elapsed().as_secs_f64() * 1e6);
    }

    let (peak_bin, _) = spectrum.peak_bin().unwrap_or((0, 0.0));

    let avg_us = latencies.iter().sum::<f64>() / latencies.len() as f64;
    let frame_us = n as f64 / sample_rate as f64 * 1e6;
    Ok(SizeResult {
        transform_size: n,
        frames: latencies.len(),
        p50_us: percentile(&latencies, 0.50),
        p95_us: percentile(&latencies, 0.95),
        avg_us,
        realtime_load: avg_us / frame_us,
        peak_bin,
        peak_hz: spectrum.bin_frequency(peak_bin, sample_rate),
    })
}

fn run() -> Result<()> {
    let args = parse_args()?;

    let (signal, sample_rate, source) = match &args.wav {
        Some(path) => {
            let (samples, rate) = read_wav_left(path)?;
            (samples, rate, path.display().to_string())
        }
        None => {
            let len = TransformSize::MAX.get() * 4;
            (
                synthetic_sine(440.0, len, CAPTURE_SAMPLE_RATE),
                CAPTURE_SAMPLE_RATE,
                "synthetic 440 Hz sine".to_string(),
            )
        }
    };

    println!(
        "Running spectra benchmark on {source} ({} samples @ {sample_rate} Hz, iterations={})",
        signal.len(),
        args.iterations
    );

    let mut sizes = Vec::new();
    for &raw in &TransformSize::SUPPORTED {
        let size = TransformSize::new(raw)?;
        if signal.len() < raw {
            println!("{raw:>6}: skipped (input shorter than one frame)");
            continue;
        }
        let result = bench_size(size, &signal, sample_rate, &args)?;
        println!(
            "{raw:>6}: p50 {:.1} us, p95 {:.1} us, load {:.4}, peak {:.1} Hz",
            result.p50_us, result.p95_us, result.realtime_load, result.peak_hz
        );
        sizes.push(result);
    }
    if sizes.is_empty() {
        bail!("input too short for the smallest transform size");
    }

    let summary = Summary {
        source,
        sample_rate,
        window: args.window,
        magnitude: args.magnitude,
        iterations: args.iterations,
        sizes,
    };

    let json = serde_json::to_string_pretty(&summary)?;
    match args.output {
        Some(path) => {
            std::fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
            println!("Wrote benchmark summary to {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}
