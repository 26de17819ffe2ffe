//! # Audible Feedback
//!
//! Short melodies confirming mode changes and warning about a weak
//! controller signal.
//!
//! Chimes are queued by the control loop and played by [`ChimePlayer`],
//! which is serviced once per cycle. It only starts and stops tones and
//! never waits, so a melody never delays the loop. Note lengths are
//! therefore quantised to the cycle period.

pub mod pc_speaker;

use std::collections::VecDeque;

use serde::Serialize;
use tracing::debug;

use crate::error::Result;

/// Tone output device.
pub trait Buzzer {
    /// Starts a continuous tone at `frequency_hz`.
    fn start_tone(&mut self, frequency_hz: u16) -> Result<()>;

    /// Silences the buzzer.
    fn stop_tone(&mut self) -> Result<()>;
}

/// Buzzer that discards every tone.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentBuzzer;

impl Buzzer for SilentBuzzer {
    fn start_tone(&mut self, _frequency_hz: u16) -> Result<()> {
        Ok(())
    }

    fn stop_tone(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<B: Buzzer + ?Sized> Buzzer for Box<B> {
    fn start_tone(&mut self, frequency_hz: u16) -> Result<()> {
        (**self).start_tone(frequency_hz)
    }

    fn stop_tone(&mut self) -> Result<()> {
        (**self).stop_tone()
    }
}

/// One note of a chime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Note {
    pub frequency_hz: u16,
    pub duration_ms: u16,
    /// Silence after the note.
    pub pause_ms: u16,
}

const fn note(frequency_hz: u16, duration_ms: u16, pause_ms: u16) -> Note {
    Note {
        frequency_hz,
        duration_ms,
        pause_ms,
    }
}

const READY_NOTES: [Note; 2] = [note(2000, 60, 60), note(2000, 60, 0)];

const DRIVE_NOTES: [Note; 6] = [
    note(2800, 50, 50),
    note(2800, 250, 0),
    note(2000, 50, 0),
    note(2200, 50, 0),
    note(1500, 50, 0),
    note(3000, 50, 0),
];

/// Rising sweep from 500 Hz to 1780 Hz in 80 Hz steps.
const CALIBRATION_NOTES: [Note; 17] = {
    let mut notes = [note(0, 30, 0); 17];
    let mut i = 0;
    while i < notes.len() {
        notes[i].frequency_hz = 500 + 80 * i as u16;
        i += 1;
    }
    notes
};

const ADOPTED_NOTES: [Note; 1] = [note(2800, 30, 70)];

const SAVED_NOTES: [Note; 2] = [note(880, 200, 0), note(1047, 1000, 0)];

const LOW_SIGNAL_NOTES: [Note; 1] = [note(540, 1000, 0)];

/// Melodies the vehicle can play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Chime {
    /// Wait mode entered at boot.
    Ready,
    DriveEntered,
    CalibrationEntered,
    /// Calibration buffer became the active offset.
    OffsetAdopted,
    /// Offset written to storage.
    CalibrationSaved,
    /// Controller brown-out warning.
    LowSignal,
}

impl Chime {
    #[must_use]
    pub fn notes(self) -> &'static [Note] {
        match self {
            Chime::Ready => &READY_NOTES,
            Chime::DriveEntered => &DRIVE_NOTES,
            Chime::CalibrationEntered => &CALIBRATION_NOTES,
            Chime::OffsetAdopted => &ADOPTED_NOTES,
            Chime::CalibrationSaved => &SAVED_NOTES,
            Chime::LowSignal => &LOW_SIGNAL_NOTES,
        }
    }

    /// Total length including pauses.
    #[must_use]
    pub fn duration_ms(self) -> u32 {
        self.notes()
            .iter()
            .map(|n| u32::from(n.duration_ms) + u32::from(n.pause_ms))
            .sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Tone,
    Pause,
}

#[derive(Debug, Clone, Copy)]
struct Playback {
    chime: Chime,
    note_index: usize,
    phase: Phase,
    phase_start_ms: u32,
}

impl Playback {
    fn note(&self) -> Note {
        self.chime.notes()[self.note_index]
    }

    fn phase_length_ms(&self) -> u32 {
        let note = self.note();
        match self.phase {
            Phase::Tone => u32::from(note.duration_ms),
            Phase::Pause => u32::from(note.pause_ms),
        }
    }
}

/// Non-blocking chime sequencer.
#[derive(Debug, Default)]
pub struct ChimePlayer {
    queue: VecDeque<Chime>,
    current: Option<Playback>,
}

impl ChimePlayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a chime behind any already waiting.
    ///
    /// A low-signal warning is dropped while another one is queued or playing.
    pub fn play(&mut self, chime: Chime) {
        if chime == Chime::LowSignal && self.has(Chime::LowSignal) {
            return;
        }
        self.queue.push_back(chime);
    }

    /// Whether `chime` is playing or waiting.
    #[must_use]
    pub fn has(&self, chime: Chime) -> bool {
        self.current.map_or(false, |p| p.chime == chime) || self.queue.contains(&chime)
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.current.is_none() && self.queue.is_empty()
    }

    /// Chime currently sounding, if any.
    #[must_use]
    pub fn current(&self) -> Option<Chime> {
        self.current.map(|p| p.chime)
    }

    /// Advances playback to `now_ms`, switching tones on `buzzer` as needed.
    pub fn update<B: Buzzer + ?Sized>(&mut self, now_ms: u32, buzzer: &mut B) {
        loop {
            let Some(mut playback) = self.current else {
                let Some(chime) = self.queue.pop_front() else {
                    return;
                };
                debug!("Playing {:?}", chime);
                let playback = Playback {
                    chime,
                    note_index: 0,
                    phase: Phase::Tone,
                    phase_start_ms: now_ms,
                };
                start(buzzer, playback.note().frequency_hz);
                self.current = Some(playback);
                continue;
            };

            if now_ms.wrapping_sub(playback.phase_start_ms) < playback.phase_length_ms() {
                return;
            }

            match playback.phase {
                Phase::Tone if playback.note().pause_ms > 0 => {
                    stop(buzzer);
                    playback.phase = Phase::Pause;
                    playback.phase_start_ms = now_ms;
                    self.current = Some(playback);
                }
                _ => {
                    if playback.phase == Phase::Tone {
                        stop(buzzer);
                    }
                    if playback.note_index + 1 < playback.chime.notes().len() {
                        playback.note_index += 1;
                        playback.phase = Phase::Tone;
                        playback.phase_start_ms = now_ms;
                        start(buzzer, playback.note().frequency_hz);
                        self.current = Some(playback);
                    } else {
                        self.current = None;
                    }
                }
            }
        }
    }

    /// Drops everything queued and silences the buzzer.
    pub fn silence<B: Buzzer + ?Sized>(&mut self, buzzer: &mut B) {
        self.queue.clear();
        self.current = None;
        stop(buzzer);
    }
}

fn start<B: Buzzer + ?Sized>(buzzer: &mut B, frequency_hz: u16) {
    if let Err(e) = buzzer.start_tone(frequency_hz) {
        debug!("Buzzer failed to start tone: {}", e);
    }
}

fn stop<B: Buzzer + ?Sized>(buzzer: &mut B) {
    if let Err(e) = buzzer.stop_tone() {
        debug!("Buzzer failed to stop tone: {}", e);
    }
}
