//! Picks the audio output device the beeper plays through.

use anyhow::{Context, Result};
use cpal::{
    traits::{DeviceTrait, HostTrait},
    Device, SupportedStreamConfig,
};

use crate::misc::Similarity;

/// The output device and its default stream config, plus the gain applied to the pin signal.
pub struct OutputDevice {
    pub device: Device,
    pub config: SupportedStreamConfig,
    pub gain: f32,
}

/// Picks the output device named `wanted`, or the host's default for `"default"`.
/// Note: The device is picked by finding the device with the highest string similarity (dice coefficient) to the given name.
pub fn get_output_device(wanted: &str, gain: f32) -> Result<OutputDevice> {
    let host = cpal::default_host();
    let wanted = wanted.to_lowercase();

    let device = match wanted.as_str() {
        "default" => host
            .default_output_device()
            .context("No default output device")?,
        _ => host
            .output_devices()?
            .filter_map(|x| {
                let name = x.name().ok()?.to_lowercase();
                Some((name.similarity(&wanted), x))
            })
            .reduce(|a, b| if a.0 > b.0 { a } else { b })
            .context("No output device found")?
            .1,
    };

    let config = device
        .default_output_config()
        .context("No default output config")?;

    Ok(OutputDevice {
        device,
        config,
        gain,
    })
}
