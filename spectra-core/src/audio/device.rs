//! Audio device enumeration.
//!
//! A spectrum visualizer usually wants what the machine is *playing*, so the
//! recommendation heuristic favours loopback/monitor inputs over microphones.

use serde::{Deserialize, Serialize};

/// Metadata about an audio input device.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    /// Human-readable device name reported by the OS.
    pub name: String,
    /// Whether this is the system default input device.
    pub is_default: bool,
    /// Heuristic flag for devices that likely capture system/output audio.
    pub is_loopback_like: bool,
    /// Whether the device offers a stereo input configuration at all.
    pub supports_stereo: bool,
    /// Heuristic recommendation for the best visualizer source.
    pub is_recommended: bool,
}

const LOOPBACK_KEYWORDS: &[&str] = &[
    "stereo mix",
    "wave out",
    "what u hear",
    "what you hear",
    "loopback",
    "virtual output",
    "monitor of",
    ".monitor",
    "blackhole",
    "soundflower",
    "mixage stereo",
    "mezcla estereo",
    "mix stereo",
];

const MIC_KEYWORDS: &[&str] = &["microphone", "mic", "headset", "webcam"];

/// Best-effort heuristic for loopback/system-output capture devices.
pub fn is_loopback_like_name(name: &str) -> bool {
    let lowered = name.trim().to_ascii_lowercase();
    LOOPBACK_KEYWORDS.iter().any(|k| lowered.contains(k))
}

/// Score a device name for likely use as a visualizer source.
///
/// Higher is better. Loopback devices beat microphones.
pub fn source_preference_score(name: &str) -> i32 {
    let lowered = name.trim().to_ascii_lowercase();
    let mut score = 0;
    if is_loopback_like_name(&lowered) {
        score += 12;
    }
    if MIC_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        score -= 4;
    }
    if lowered.contains("default") {
        score += 1;
    }
    score
}

/// Rank `devices` in place and flag the best stereo-capable one.
pub fn recommend(devices: &mut Vec<DeviceInfo>) {
    for d in devices.iter_mut() {
        d.is_recommended = false;
    }
    if let Some(best) = devices
        .iter_mut()
        .filter(|d| d.supports_stereo)
        .max_by_key(|d| source_preference_score(&d.name) + if d.is_default { 2 } else { 0 })
    {
        best.is_recommended = true;
    }

    devices.sort_by_key(|d| {
        (
            !d.is_recommended,
            !d.is_loopback_like,
            !d.is_default,
            d.name.to_ascii_lowercase(),
        )
    });
}

/// List all available audio input devices on the system.
///
/// Returns an empty `Vec` if cpal is not available or no devices exist.
#[cfg(feature = "audio-cpal")]
pub fn list_input_devices() -> Vec<DeviceInfo> {
    use cpal::traits::{DeviceTrait, HostTrait};

    let host = cpal::default_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());

    let supports_stereo = |device: &cpal::Device| {
        device
            .supported_input_configs()
            .map(|mut ranges| ranges.any(|r| r.channels() as usize == crate::buffering::CHANNEL_COUNT))
            .unwrap_or(false)
    };

    match host.input_devices() {
        Ok(devices) => {
            let mut list = devices
                .enumerate()
                .map(|(idx, device)| {
                    let name = device
                        .name()
                        .unwrap_or_else(|_| format!("Input Device {}", idx + 1));
                    let is_default = default_name.as_deref() == Some(name.as_str());
                    DeviceInfo {
                        is_loopback_like: is_loopback_like_name(&name),
                        supports_stereo: supports_stereo(&device),
                        name,
                        is_default,
                        is_recommended: false,
                    }
                })
                .collect::<Vec<_>>();
            recommend(&mut list);
            list
        }
        Err(e) => {
            tracing::warn!("failed to enumerate input devices: {e}");
            if let Some(default) = host.default_input_device() {
                let name = default
                    .name()
                    .unwrap_or_else(|_| "Default Input Device".to_string());
                let stereo = supports_stereo(&default);
                vec![DeviceInfo {
                    is_loopback_like: is_loopback_like_name(&name),
                    name,
                    is_default: true,
                    supports_stereo: stereo,
                    is_recommended: stereo,
                }]
            } else {
                vec![]
            }
        }
    }
}

#[cfg(not(feature = "audio-cpal"))]
pub fn list_input_devices() -> Vec<DeviceInfo> {
    vec![]
}
