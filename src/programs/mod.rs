//! The two PIO programs behind the beeper.

pub mod tone;
pub mod volume;

/// IRQ flag the tone sequencer uses to tell the volume sequencer a half period ended.
/// Only the tone sequencer writes it.
pub const SYNC_IRQ: u8 = 4;
