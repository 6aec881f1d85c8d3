//! Audio utilities.
//! Sampling the beeper pin, playing it back and analysing the result.

pub mod algorithms;
pub mod devices;
pub mod output;
pub mod sampler;
