//! Plays the pin signal through a cpal output stream.
//! The stream callback is what clocks the PIO block while the controller sleeps.

use anyhow::{bail, Context, Result};
use cpal::{
    traits::{DeviceTrait, StreamTrait},
    SampleFormat, Stream,
};
use tracing::error;

use super::{
    devices::OutputDevice,
    sampler::{DcBlocker, PinSampler},
};
use crate::pio::{pin::Pin, Pio};

/// Starts a stream on `output` that clocks `pio` and plays `pin`.
/// The block runs for as long as the returned stream is alive.
pub fn start(output: OutputDevice, pio: Pio, pin: Pin) -> Result<Stream> {
    let OutputDevice {
        device,
        config,
        gain,
    } = output;

    if config.sample_format() != SampleFormat::F32 {
        bail!(
            "Output device wants {:?} samples, only f32 is supported",
            config.sample_format()
        );
    }

    let channels = config.channels() as usize;
    let mut sampler = PinSampler::new(pio, pin, config.sample_rate().0);
    let mut filter = DcBlocker::default();

    let stream = device
        .build_output_stream(
            &config.into(),
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                let mut last = 0.0;
                for (i, e) in data.iter_mut().enumerate() {
                    if i % channels == 0 {
                        let level = sampler.next().unwrap_or(0.0);
                        last = filter.process(level) * gain;
                    }

                    *e = last;
                }
            },
            move |err| error!("Output stream error: {err}"),
            None,
        )
        .context("Failed to build output stream")?;

    stream.play().context("Failed to start output stream")?;
    Ok(stream)
}
