//! The beep controller.
//! Owns the tone and volume state machines plus the output pin, and turns notes into
//! values pushed to the state machines with blocking delays in between.

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::{
    delay::Delay,
    pio::{
        instruction::{Instruction, MovDest, MovSource},
        pin::Pin,
        program::Program,
        state_machine::{Registers, StateMachine},
        Pio,
    },
    programs::{tone, volume, SYNC_IRQ},
};

/// Reference value the tone sequencer counts down from.
pub const MAX_COUNT_TONE: u32 = 5000;
/// Highest duty the volume sequencer understands.
pub const MAX_COUNT_VOLUME: i32 = volume::MAX_DUTY as i32;

pub const TONE_SLOT: usize = 2;
pub const VOLUME_SLOT: usize = 3;

/// Clock rates of the two state machines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeepConfig {
    pub tone_clock: u32,
    pub volume_clock: u32,
}

impl Default for BeepConfig {
    fn default() -> Self {
        Self {
            tone_clock: 1_000_000,
            volume_clock: 125_000_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Pitch {
    Hertz(f64),
    /// A raw half-period count, pushed to the tone sequencer as is.
    Count(i32),
}

/// One note: sound for `duration`, then silence for `pause`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Note {
    pub duration: Duration,
    pub pause: Duration,
    pub pitch: Pitch,
    /// 0 (silent) to 8 (loudest), anything outside is clamped.
    pub volume: i32,
}

impl Note {
    pub fn tone(duration: Duration, pause: Duration, hertz: f64, volume: i32) -> Self {
        Self {
            duration,
            pause,
            pitch: Pitch::Hertz(hertz),
            volume,
        }
    }
}

/// Converts a pitch into the count the tone sequencer stops at.
///
/// Each half period is `2 * (MAX_COUNT_TONE - count)` tone clock cycles.
/// The few fixed instructions around each loop are ignored, so very high pitches come out a little flat.
/// No checks are made: a pitch of zero or below gives a meaningless count.
pub fn pitch_to_count(tone_clock: u32, hertz: f64) -> i32 {
    let reference = 4.0 * MAX_COUNT_TONE as f64;
    (-1.0 * ((tone_clock as f64 / hertz - reference) / 4.0)).round() as i32
}

/// Maps a volume of 0..=8 onto the duty range -1..=7, where -1 is silent.
pub fn duty_for_volume(volume: i32) -> i32 {
    volume.saturating_sub(1).clamp(-1, MAX_COUNT_VOLUME)
}

pub struct BeepController<D: Delay> {
    pin: Pin,
    tone: StateMachine,
    volume: StateMachine,
    tone_program: Program,
    volume_program: Program,
    tone_clock: u32,
    delay: D,
}

impl<D: Delay> BeepController<D> {
    /// Loads both programs into `pio` and preloads the tone sequencer's reference value.
    /// `pin` is driven by the volume sequencer's side-set.
    pub fn new(pio: &Pio, pin: Pin, config: BeepConfig, delay: D) -> Result<Self> {
        let tone_program = tone::program().context("Assembling tone program")?;
        let volume_program = volume::program().context("Assembling volume program")?;

        let tone = pio
            .state_machine(TONE_SLOT, &tone_program, config.tone_clock, None)
            .context("Loading tone state machine")?;
        let volume = pio
            .state_machine(
                VOLUME_SLOT,
                &volume_program,
                config.volume_clock,
                Some(pin.clone()),
            )
            .context("Loading volume state machine")?;

        // The tone loops reload their counter from ISR
        tone.put(MAX_COUNT_TONE);
        tone.exec(Instruction::Pull { block: true })?;
        tone.exec(Instruction::Mov {
            dest: MovDest::Isr,
            source: MovSource::Osr,
        })?;

        debug!(
            pin = pin.id(),
            tone_clock = config.tone_clock,
            volume_clock = config.volume_clock,
            "beep controller ready"
        );

        Ok(Self {
            pin,
            tone,
            volume,
            tone_program,
            volume_program,
            tone_clock: config.tone_clock,
            delay,
        })
    }

    pub fn pitch_to_count(&self, hertz: f64) -> i32 {
        pitch_to_count(self.tone_clock, hertz)
    }

    /// Plays a raw half-period count for `note`, then stays silent for `pause`.
    /// Blocks for both; the state machines run on their own in the meantime.
    pub fn play_value(&mut self, note: Duration, pause: Duration, count: i32, volume: i32) {
        let duty = duty_for_volume(volume);
        debug!(count, duty, ?note, ?pause, "playing");

        self.tone.active(true);
        self.tone.put(count as u32);
        self.volume.active(true);
        self.volume.put(duty as u32);

        self.delay.sleep(note);

        self.tone.active(false);
        self.volume.active(false);
        // A note too short for a pull leaves its values queued
        self.tone.clear_fifos();
        self.volume.clear_fifos();
        // A tone stopped in its low half would leave the flag up for the next note
        if let Err(err) = self.tone.exec(Instruction::irq_clear(SYNC_IRQ)) {
            warn!("Failed to clear sync flag: {err}");
        }

        self.delay.sleep(pause);
        self.pin.off();
    }

    pub fn play_tone(&mut self, note: Duration, pause: Duration, pitch: f64, volume: i32) {
        self.play_value(note, pause, self.pitch_to_count(pitch), volume);
    }

    pub fn play(&mut self, note: &Note) {
        match note.pitch {
            Pitch::Hertz(hertz) => self.play_tone(note.duration, note.pause, hertz, note.volume),
            Pitch::Count(count) => self.play_value(note.duration, note.pause, count, note.volume),
        }
    }

    pub fn pin(&self) -> &Pin {
        &self.pin
    }

    pub fn tone_registers(&self) -> Registers {
        self.tone.registers()
    }

    pub fn volume_registers(&self) -> Registers {
        self.volume.registers()
    }

    pub fn tone_phase(&self) -> tone::Phase {
        tone::phase(&self.tone_program, self.tone.registers().pc)
    }

    pub fn volume_phase(&self) -> volume::Phase {
        volume::phase(&self.volume_program, &self.volume.registers())
    }

    pub fn delay(&self) -> &D {
        &self.delay
    }

    pub fn delay_mut(&mut self) -> &mut D {
        &mut self.delay
    }
}
