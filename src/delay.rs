//! Blocking delays used by the beep controller between note events.

use std::{thread, time::Duration};

use crate::audio::sampler::PinSampler;

pub trait Delay {
    fn sleep(&mut self, duration: Duration);
}

/// Sleeps the calling thread while something else (the audio callback) clocks the PIO block.
pub struct RealTime;

impl Delay for RealTime {
    fn sleep(&mut self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Clocks the PIO block itself for the length of the delay, so time only passes inside `sleep`.
/// The pin level is recorded at the sampler's rate while it runs.
pub struct Simulated {
    sampler: PinSampler,
    samples: Vec<f32>,
    elapsed: Duration,
}

impl Simulated {
    pub fn new(sampler: PinSampler) -> Self {
        Self {
            sampler,
            samples: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }

    /// Total simulated time so far.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Takes the samples captured so far, leaving the capture buffer empty.
    pub fn take_samples(&mut self) -> Vec<f32> {
        std::mem::take(&mut self.samples)
    }
}

impl Delay for Simulated {
    fn sleep(&mut self, duration: Duration) {
        self.elapsed += duration;
        let count = (duration.as_secs_f64() * self.sampler.sample_rate() as f64).round();
        self.samples
            .extend(self.sampler.by_ref().take(count as usize));
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::{Delay, Simulated};
    use crate::{
        audio::sampler::PinSampler,
        pio::{pin::Pin, Pio},
    };

    #[test]
    fn test_simulated_capture() {
        let pio = Pio::new(1_000_000);
        let mut delay = Simulated::new(PinSampler::new(pio, Pin::new(0), 8000));

        delay.sleep(Duration::from_millis(250));
        delay.sleep(Duration::from_millis(250));

        assert_eq!(delay.elapsed(), Duration::from_millis(500));
        let samples = delay.take_samples();
        assert_eq!(samples.len(), 4000);
        assert!(samples.iter().all(|&x| x == 0.0));
        assert!(delay.take_samples().is_empty());
    }
}
