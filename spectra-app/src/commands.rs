//! Terminal command handlers.
//!
//! One command per stdin line. Parsing is pure; `apply` runs a command
//! against the coordinator and the settings cache on the render thread.

use spectra_core::{
    audio::device::list_input_devices, PipelineCoordinator, SpectraError, TransformSize,
    WindowType,
};
use tracing::info;

use crate::render::SpectrumView;
use crate::settings::AppSettings;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Switch to one of the preset transform sizes.
    SetTransformSize(usize),
    SetWindow(WindowType),
    SwapChannels,
    ListDevices,
    /// Restart capture on a named device (`None` = system default).
    UseDevice(Option<String>),
    Status,
    Help,
    Quit,
}

/// What the render loop should do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

pub const HELP: &str = "commands: <size> (128..32768) | window <blackman-harris|hann> | swap | \
devices | device [name] | status | help | q";

pub fn parse_command(line: &str) -> Result<Command, String> {
    let line = line.trim();
    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    };

    if let Ok(size) = head.parse::<usize>() {
        return Ok(Command::SetTransformSize(size));
    }
    if let Some(window) = WindowType::parse(head) {
        return Ok(Command::SetWindow(window));
    }

    match head.to_ascii_lowercase().as_str() {
        "size" => rest
            .parse::<usize>()
            .map(Command::SetTransformSize)
            .map_err(|_| format!("invalid transform size: {rest:?}")),
        "window" => WindowType::parse(rest)
            .map(Command::SetWindow)
            .ok_or_else(|| format!("unknown window: {rest:?}")),
        "swap" => Ok(Command::SwapChannels),
        "devices" => Ok(Command::ListDevices),
        "device" => Ok(Command::UseDevice(
            Some(rest.to_string()).filter(|name| !name.is_empty()),
        )),
        "status" => Ok(Command::Status),
        "help" | "?" => Ok(Command::Help),
        "q" | "quit" | "exit" => Ok(Command::Quit),
        "" => Err("empty command".into()),
        other => Err(format!("unknown command: {other}")),
    }
}

/// Run `command`. Errors are reported to the user; the loop keeps going.
pub fn apply(
    command: Command,
    coordinator: &PipelineCoordinator,
    settings: &mut AppSettings,
    view: &mut SpectrumView,
) -> Result<Flow, String> {
    match command {
        Command::SetTransformSize(size) => {
            coordinator
                .set_transform_size(size)
                .map_err(describe)?;
            settings.transform_size = size;
        }
        Command::SetWindow(window) => {
            coordinator.set_window(window).map_err(describe)?;
            settings.window = window;
        }
        Command::SwapChannels => {
            let swap = !view.swap_channels();
            view.set_swap_channels(swap);
            settings.swap_channels = swap;
        }
        Command::ListDevices => {
            for device in list_input_devices() {
                eprintln!(
                    "{} {}{}{}",
                    if device.is_recommended { "*" } else { " " },
                    device.name,
                    if device.is_default { " (default)" } else { "" },
                    if device.supports_stereo { "" } else { " [mono]" },
                );
            }
        }
        Command::UseDevice(name) => {
            coordinator.stop().map_err(|e| e.to_string())?;
            coordinator
                .start_with_device(name.clone())
                .map_err(describe)?;
            info!(device = ?coordinator.device_name(), "capture device switched");
            settings.preferred_input_device = name;
        }
        Command::Status => {
            let diag = coordinator.diagnostics();
            eprintln!(
                "status {:?} size {:?} device {:?} | passes {} transforms {} coalesced {} stale {}",
                coordinator.status(),
                coordinator.transform_size().map(|s| s.get()),
                coordinator.device_name(),
                diag.passes,
                diag.transforms,
                diag.wakes_coalesced,
                diag.stale_passes,
            );
        }
        Command::Help => eprintln!("{HELP}"),
        Command::Quit => return Ok(Flow::Exit),
    }
    Ok(Flow::Continue)
}

/// User-facing message with a hint for the recoverable error families.
pub fn describe(err: SpectraError) -> String {
    if err.is_configuration() {
        format!("{err}; presets are {:?}", TransformSize::SUPPORTED)
    } else if err.is_device() {
        format!("{err}; run `devices` and pick one with `device <name>`")
    } else {
        err.to_string()
    }
}
