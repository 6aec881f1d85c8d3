//! Signal analysis used to check what the beeper actually produced.

use std::f32::consts::PI;

use num_complex::Complex;

/// Implements the [Goertzel algorithm](https://en.wikipedia.org/wiki/Goertzel_algorithm) to find the magnitude of a frequency in a slice of samples.
pub fn goertzel_mag(freq: f32, samples: &[f32], sample_rate: u32) -> f32 {
    let k = (0.5 + (samples.len() as f32 * freq) / sample_rate as f32).floor();
    let omega = (2.0 * PI * k) / samples.len() as f32;
    let sin = omega.sin();
    let cos = omega.cos();
    let coeff = cos * 2.0;

    let mut s1 = 0.0;
    let mut s2 = 0.0;

    for i in samples {
        let s = coeff * s1 - s2 + i;
        s2 = s1;
        s1 = s;
    }

    let real = s1 - s2 * cos;
    let imag = s2 * sin;

    Complex::new(real, imag).norm()
}

/// Estimates the fundamental frequency from the number of times the signal rises through its mean.
/// Returns None for signals with no crossings, like silence.
pub fn crossing_frequency(samples: &[f32], sample_rate: u32) -> Option<f32> {
    if samples.len() < 2 {
        return None;
    }

    let mean = samples.iter().sum::<f32>() / samples.len() as f32;
    let rising = samples
        .windows(2)
        .enumerate()
        .filter(|(_, x)| x[0] <= mean && x[1] > mean)
        .map(|(i, _)| i)
        .collect::<Vec<_>>();

    let (first, last) = (*rising.first()?, *rising.last()?);
    if first == last {
        return None;
    }

    let periods = (rising.len() - 1) as f32;
    Some(periods * sample_rate as f32 / (last - first) as f32)
}

/// Average level of the samples, the effective duty cycle of a pin signal.
pub fn mean_level(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    samples.iter().sum::<f32>() / samples.len() as f32
}

#[cfg(test)]
mod test {
    use std::f32::consts::PI;

    use super::{crossing_frequency, goertzel_mag, mean_level};

    fn sine(freq: f32, sample_rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (i as f32 * freq * 2.0 * PI / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn test_goertzel_picks_frequency() {
        let samples = sine(1000.0, 48_000, 4800);
        let on = goertzel_mag(1000.0, &samples, 48_000);
        let off = goertzel_mag(1500.0, &samples, 48_000);
        assert!(on > off * 10.0);
    }

    #[test]
    fn test_crossing_frequency() {
        let samples = sine(440.0, 48_000, 48_000);
        let freq = crossing_frequency(&samples, 48_000).unwrap();
        assert!((freq - 440.0).abs() < 1.0);

        assert_eq!(crossing_frequency(&[0.0; 100], 48_000), None);
    }

    #[test]
    fn test_mean_level() {
        assert_eq!(mean_level(&[]), 0.0);
        assert_eq!(mean_level(&[1.0, 0.0, 0.5, 0.5]), 0.5);
    }
}
