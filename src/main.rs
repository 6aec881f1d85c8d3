use anyhow::Result;
use cpal::traits::DeviceTrait;
use tracing::{debug, info, warn};
use tracing_subscriber::util::SubscriberInitExt;

mod args;
mod audio;
mod beep;
mod delay;
mod melody;
mod misc;
mod pio;
mod programs;

use crate::{
    args::Args,
    audio::{algorithms, devices, output, sampler::PinSampler},
    beep::{duty_for_volume, BeepController, Pitch},
    delay::{RealTime, Simulated},
    pio::{pin::Pin, Pio},
    programs::SYNC_IRQ,
};

/// Sample rate the pin is captured at in a dry run.
const DRY_RUN_SAMPLE_RATE: u32 = 48_000;

fn main() -> Result<()> {
    let args = args::parse_args()?;
    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .compact()
        .finish()
        .init();

    let pio = Pio::new(args.sys_clock);
    let pin = Pin::new(args.pin);
    println!(
        "[*] Playing {} note(s) on pin {} (tone {} Hz, volume {} Hz)",
        args.notes.len(),
        args.pin,
        args.config.tone_clock,
        args.config.volume_clock
    );

    if args.dry_run {
        return dry_run(&args, pio, pin);
    }

    play(&args, pio, pin)
}

fn play(args: &Args, pio: Pio, pin: Pin) -> Result<()> {
    let output = devices::get_output_device(&args.output_device, args.output_gain)?;
    println!(
        "[*] Output hooked into `{}` ({})",
        output.device.name().unwrap_or_else(|_| "unknown".to_owned()),
        output.config.sample_rate().0
    );

    if args.sys_clock > 50_000_000 {
        warn!(
            "Emulating a {} Hz PIO clock in real time may stutter, try a lower --sys-clock and --volume-clock",
            args.sys_clock
        );
    }

    let mut beep = BeepController::new(&pio, pin.clone(), args.config, RealTime)?;
    let _stream = output::start(output, pio, pin)?;

    for note in &args.notes {
        beep.play(note);
    }

    info!("Done");
    Ok(())
}

fn dry_run(args: &Args, pio: Pio, pin: Pin) -> Result<()> {
    let sampler = PinSampler::new(pio.clone(), pin.clone(), DRY_RUN_SAMPLE_RATE);
    let mut beep = BeepController::new(&pio, pin, args.config, Simulated::new(sampler))?;

    for note in &args.notes {
        beep.play(note);

        let samples = beep.delay_mut().take_samples();
        let sounding = (note.duration.as_secs_f64() * DRY_RUN_SAMPLE_RATE as f64) as usize;
        let (sounding, pause) = samples.split_at(sounding.min(samples.len()));

        let count = match note.pitch {
            Pitch::Hertz(hertz) => beep.pitch_to_count(hertz),
            Pitch::Count(count) => count,
        };
        let measured = match algorithms::crossing_frequency(sounding, DRY_RUN_SAMPLE_RATE) {
            Some(freq) => format!(
                "{freq:.1} Hz (strength {:.3})",
                algorithms::goertzel_mag(freq, sounding, DRY_RUN_SAMPLE_RATE) / sounding.len() as f32
            ),
            None => "silent".to_owned(),
        };

        println!(
            "[*] {:?} for {:?} (+{:?} pause): count {count}, duty {}, measured {measured}, level {:.3}, pause level {:.3}",
            note.pitch,
            note.duration,
            note.pause,
            duty_for_volume(note.volume),
            algorithms::mean_level(sounding),
            algorithms::mean_level(pause),
        );
        debug!(
            tone = ?beep.tone_registers(),
            tone_phase = ?beep.tone_phase(),
            volume = ?beep.volume_registers(),
            volume_phase = ?beep.volume_phase(),
            "state machines stopped"
        );
    }

    println!(
        "[*] Simulated {:?}, pin ends {}, sync flag {}",
        beep.delay().elapsed(),
        if beep.pin().value() { "high" } else { "low" },
        if pio.irq_flags().level(SYNC_IRQ) { "set" } else { "clear" }
    );
    Ok(())
}
