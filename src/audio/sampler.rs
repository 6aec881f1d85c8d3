//! Turns the level of a PIO driven pin into audio samples.

use crate::pio::{pin::Pin, Pio};

/// Clocks a [`Pio`] block one sample period at a time.
/// Each sample is the fraction of system clock ticks the pin spent high during that period,
/// which is what a speaker integrates a PWM signal into.
pub struct PinSampler {
    pio: Pio,
    pin: Pin,
    sample_rate: u32,
    sys_clock: u64,
    /// Leftover fraction of a tick, in units of 1 / sample_rate.
    acc: u64,
}

impl PinSampler {
    pub fn new(pio: Pio, pin: Pin, sample_rate: u32) -> Self {
        let sys_clock = pio.sys_clock() as u64;
        Self {
            pio,
            pin,
            sample_rate,
            sys_clock,
            acc: 0,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl Iterator for PinSampler {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        self.acc += self.sys_clock;
        let ticks = self.acc / self.sample_rate as u64;
        self.acc %= self.sample_rate as u64;

        if ticks == 0 {
            return Some(self.pin.value() as u8 as f32);
        }

        let high = self.pio.advance_probed(ticks, &self.pin);
        Some(high as f32 / ticks as f32)
    }
}

/// Single pole high-pass filter that removes the DC offset of a 0..1 pin signal,
/// like the coupling capacitor in front of a speaker.
pub struct DcBlocker {
    pole: f32,
    last_in: f32,
    last_out: f32,
}

impl DcBlocker {
    pub fn new(pole: f32) -> Self {
        Self {
            pole,
            last_in: 0.0,
            last_out: 0.0,
        }
    }

    pub fn process(&mut self, sample: f32) -> f32 {
        let out = sample - self.last_in + self.pole * self.last_out;
        self.last_in = sample;
        self.last_out = out;
        out
    }
}

impl Default for DcBlocker {
    fn default() -> Self {
        Self::new(0.995)
    }
}
