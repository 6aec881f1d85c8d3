//! Note lists for the driver: the built in demo, and notes given on the command line.

use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::beep::{Note, Pitch};

/// Volume used when a note string leaves it out.
pub const DEFAULT_VOLUME: i32 = 8;

/// The demo: three tones at falling volume, then a silent note and a pause.
pub fn demo() -> Vec<Note> {
    let s = Duration::from_secs;
    vec![
        Note::tone(s(1), s(0), 1000.0, 8),
        Note::tone(s(1), s(0), 1200.0, 4),
        Note::tone(s(4), s(0), 1300.0, 1),
        Note::tone(s(1), s(1), 5000.0, 0),
    ]
}

/// Parses a note from the format `hertz;duration[;pause[;volume]]`, times in seconds.
/// ```text
/// 440;1.2
/// 1000;0.5;0.1;4
/// ```
pub fn parse_note(note: &str) -> Result<Note> {
    let parts = note.trim().split(';').map(str::trim).collect::<Vec<_>>();
    if parts.len() < 2 || parts.len() > 4 {
        bail!("Invalid note `{note}`, expected `hertz;duration[;pause[;volume]]`");
    }

    let hertz = parts[0]
        .parse::<f64>()
        .with_context(|| format!("Invalid pitch in `{note}`"))?;
    let duration = seconds(parts[1]).with_context(|| format!("Invalid duration in `{note}`"))?;
    let pause = match parts.get(2) {
        Some(x) => seconds(x).with_context(|| format!("Invalid pause in `{note}`"))?,
        None => Duration::ZERO,
    };
    let volume = match parts.get(3) {
        Some(x) => x
            .parse::<i32>()
            .with_context(|| format!("Invalid volume in `{note}`"))?,
        None => DEFAULT_VOLUME,
    };

    Ok(Note {
        duration,
        pause,
        pitch: Pitch::Hertz(hertz),
        volume,
    })
}

/// Parses a duration in seconds, like `0.25`.
pub fn seconds(value: &str) -> Result<Duration> {
    let secs = value.parse::<f64>()?;
    Ok(Duration::try_from_secs_f64(secs)?)
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::{demo, parse_note, seconds, DEFAULT_VOLUME};
    use crate::beep::{Note, Pitch};

    #[test]
    fn test_parse_note() {
        assert_eq!(
            parse_note("440;1.5").unwrap(),
            Note::tone(
                Duration::from_millis(1500),
                Duration::ZERO,
                440.0,
                DEFAULT_VOLUME
            )
        );

        let note = parse_note(" 1000 ; 0.5 ; 0.25 ; 3 ").unwrap();
        assert_eq!(note.pitch, Pitch::Hertz(1000.0));
        assert_eq!(note.pause, Duration::from_millis(250));
        assert_eq!(note.volume, 3);
    }

    #[test]
    fn test_parse_note_errors() {
        assert!(parse_note("440").is_err());
        assert!(parse_note("440;1;0;8;9").is_err());
        assert!(parse_note("loud;1").is_err());
        assert!(parse_note("440;-1").is_err());
        assert!(parse_note("440;1;0;max").is_err());
    }

    #[test]
    fn test_seconds() {
        assert_eq!(seconds("0").unwrap(), Duration::ZERO);
        assert!(seconds("NaN").is_err());
    }

    #[test]
    fn test_demo() {
        let demo = demo();
        assert_eq!(demo.len(), 4);
        let total = demo.iter().map(|x| x.duration + x.pause).sum::<Duration>();
        assert_eq!(total, Duration::from_secs(8));
    }
}
