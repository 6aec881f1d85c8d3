use std::time::Duration;

use anyhow::{bail, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use tracing::Level;

use crate::{
    beep::{BeepConfig, Note, Pitch},
    melody,
};

pub struct Args {
    pub output_device: String,
    pub output_gain: f32,
    pub pin: u8,
    pub sys_clock: u32,
    pub config: BeepConfig,
    pub dry_run: bool,
    pub log_level: Level,
    pub notes: Vec<Note>,
}

pub fn parse_args() -> Result<Args> {
    let note_args = [
        Arg::new("duration")
            .short('d')
            .long("duration")
            .help("How long the note sounds, in seconds")
            .value_parser(seconds)
            .default_value("1"),
        Arg::new("pause")
            .short('p')
            .long("pause")
            .help("Silence after the note, in seconds")
            .value_parser(seconds)
            .default_value("0"),
        Arg::new("volume")
            .short('v')
            .long("volume")
            .help("0 (silent) to 8 (loudest)")
            .value_parser(value_parser!(i32))
            .allow_negative_numbers(true)
            .default_value("8"),
    ];

    let m = Command::new("pio-beep")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Plays square wave beeps generated by two cooperating PIO state machines.")
        .subcommand_required(true)
        .args([
            Arg::new("output-device")
                .short('o')
                .long("output-device")
                .help("Audio output device, picked by closest name")
                .default_value("default")
                .global(true),
            Arg::new("output-gain")
                .short('g')
                .long("output-gain")
                .value_parser(value_parser!(f32))
                .default_value("0.5")
                .global(true),
            Arg::new("pin")
                .long("pin")
                .help("GPIO the volume sequencer drives")
                .value_parser(value_parser!(u8))
                .default_value("22")
                .global(true),
            Arg::new("sys-clock")
                .long("sys-clock")
                .help("PIO block system clock in Hz")
                .value_parser(value_parser!(u32))
                .default_value("125000000")
                .global(true),
            Arg::new("tone-clock")
                .long("tone-clock")
                .help("Tone sequencer clock in Hz")
                .value_parser(value_parser!(u32))
                .default_value("1000000")
                .global(true),
            Arg::new("volume-clock")
                .long("volume-clock")
                .help("Volume sequencer clock in Hz")
                .value_parser(value_parser!(u32))
                .default_value("125000000")
                .global(true),
            Arg::new("dry-run")
                .long("dry-run")
                .help("Simulate without an audio device and report what each note produced")
                .action(ArgAction::SetTrue)
                .global(true),
            Arg::new("log-level")
                .long("log-level")
                .value_parser(value_parser!(Level))
                .default_value("info")
                .global(true),
        ])
        .subcommands([
            Command::new("demo").about("Plays the built in demo melody."),
            Command::new("tone")
                .about("Plays a single pitch.")
                .arg(
                    Arg::new("hertz")
                        .value_parser(value_parser!(f64))
                        .required(true),
                )
                .args(note_args.clone()),
            Command::new("value")
                .about("Plays a raw half-period count.")
                .arg(
                    Arg::new("count")
                        .value_parser(value_parser!(i32))
                        .allow_negative_numbers(true)
                        .required(true),
                )
                .args(note_args),
            Command::new("play")
                .about("Plays a list of notes, each `hertz;duration[;pause[;volume]]`.")
                .arg(
                    Arg::new("notes")
                        .value_parser(|x: &str| melody::parse_note(x).map_err(|e| format!("{e:#}")))
                        .num_args(1..)
                        .required(true),
                ),
        ])
        .get_matches();

    let notes = match m.subcommand() {
        Some(("demo", _)) => melody::demo(),
        Some(("tone", m)) => vec![single_note(m, Pitch::Hertz(*m.get_one::<f64>("hertz").unwrap()))],
        Some(("value", m)) => vec![single_note(m, Pitch::Count(*m.get_one::<i32>("count").unwrap()))],
        Some(("play", m)) => m.get_many::<Note>("notes").unwrap().copied().collect(),
        _ => bail!("Invalid subcommand"),
    };

    Ok(Args {
        output_device: m.get_one::<String>("output-device").unwrap().to_owned(),
        output_gain: *m.get_one::<f32>("output-gain").unwrap(),
        pin: *m.get_one::<u8>("pin").unwrap(),
        sys_clock: *m.get_one::<u32>("sys-clock").unwrap(),
        config: BeepConfig {
            tone_clock: *m.get_one::<u32>("tone-clock").unwrap(),
            volume_clock: *m.get_one::<u32>("volume-clock").unwrap(),
        },
        dry_run: m.get_flag("dry-run"),
        log_level: *m.get_one::<Level>("log-level").unwrap(),
        notes,
    })
}

fn seconds(value: &str) -> Result<Duration, String> {
    melody::seconds(value).map_err(|e| format!("{value}: {e}"))
}

fn single_note(m: &ArgMatches, pitch: Pitch) -> Note {
    Note {
        duration: *m.get_one::<Duration>("duration").unwrap(),
        pause: *m.get_one::<Duration>("pause").unwrap(),
        pitch,
        volume: *m.get_one::<i32>("volume").unwrap(),
    }
}
