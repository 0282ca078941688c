//! Channel-voice MIDI decoding.
//!
//! Converts raw MIDI 1.0 short messages into [`EngineCommand`]s. Only the
//! messages the engine understands are decoded; everything else is dropped.

use crate::engine::EngineCommand;

/// Where a MIDI message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiSource {
    /// The host's own pads and knobs.
    Internal,
    /// A MIDI controller connected to the host.
    External,
    /// Any other tag the host may define.
    Other(i32),
}

impl MidiSource {
    /// Host tag for the internal control surface.
    pub const INTERNAL_TAG: i32 = 0;
    /// Host tag for external MIDI input.
    pub const EXTERNAL_TAG: i32 = 2;

    pub const fn from_tag(tag: i32) -> Self {
        match tag {
            Self::INTERNAL_TAG => Self::Internal,
            Self::EXTERNAL_TAG => Self::External,
            other => Self::Other(other),
        }
    }
}

/// Suppression of spurious notes generated by capacitive knob touches on the
/// internal surface. Never applied to external input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchFilter {
    Disabled,
    /// Drop internal notes whose raw number is below the threshold.
    BelowNote(u8),
}

impl TouchFilter {
    /// Whether a note event should be dropped.
    #[inline]
    pub fn rejects(self, source: MidiSource, note: u8) -> bool {
        match self {
            Self::Disabled => false,
            Self::BelowNote(threshold) => source == MidiSource::Internal && note < threshold,
        }
    }
}

/// MIDI 1.0 channel-voice status nibbles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Midi1Status {
    NoteOff = 0x80,
    NoteOn = 0x90,
    ControlChange = 0xB0,
    PitchBend = 0xE0,
}

impl Midi1Status {
    pub fn from_byte(status: u8) -> Option<Self> {
        match status & 0xF0 {
            0x80 => Some(Self::NoteOff),
            0x90 => Some(Self::NoteOn),
            0xB0 => Some(Self::ControlChange),
            0xE0 => Some(Self::PitchBend),
            _ => None,
        }
    }
}

/// Modulation wheel.
pub const CC_MOD_WHEEL: u8 = 1;
/// Sustain pedal.
pub const CC_SUSTAIN: u8 = 64;
/// All Notes Off channel mode message.
pub const CC_ALL_NOTES_OFF: u8 = 123;

/// Stateless decoder parameterised by the instance's transpose and policy.
#[derive(Debug, Clone, Copy)]
pub struct MidiDecoder {
    /// Semitone offset applied to every note.
    pub transpose: i32,
    pub touch_filter: TouchFilter,
    pub all_notes_off_cc: bool,
}

impl MidiDecoder {
    /// Decode one message. Returns `None` for anything that does not reach
    /// the engine.
    pub fn decode(&self, msg: &[u8], source: MidiSource) -> Option<EngineCommand> {
        let [status, data1, rest @ ..] = msg else {
            return None;
        };
        // Data bytes are 7-bit; a stray high bit must not leak into ranges.
        let data1 = *data1 & 0x7F;
        let data2 = rest.first().copied().unwrap_or(0) & 0x7F;

        match Midi1Status::from_byte(*status)? {
            status @ (Midi1Status::NoteOn | Midi1Status::NoteOff) => {
                let note = data1;
                if self.touch_filter.rejects(source, note) {
                    log::debug!("Dropped touch note {note} from internal surface");
                    return None;
                }
                let note = self.transpose_note(note);
                if status == Midi1Status::NoteOn && data2 > 0 {
                    Some(EngineCommand::NoteOn {
                        note,
                        velocity: f32::from(data2) / 127.0,
                    })
                } else {
                    Some(EngineCommand::NoteOff(note))
                }
            }
            Midi1Status::ControlChange => match data1 {
                CC_MOD_WHEEL => Some(EngineCommand::ModWheel(f32::from(data2) / 127.0)),
                CC_SUSTAIN => Some(EngineCommand::Sustain(data2 >= 64)),
                CC_ALL_NOTES_OFF if self.all_notes_off_cc => Some(EngineCommand::AllNotesOff),
                _ => None,
            },
            Midi1Status::PitchBend => {
                let bend = ((i32::from(data2) << 7) | i32::from(data1)) - 8192;
                Some(EngineCommand::PitchWheel(bend as f32 / 8192.0))
            }
        }
    }

    #[inline]
    fn transpose_note(&self, note: u8) -> u8 {
        (i32::from(note) + self.transpose).clamp(0, 127) as u8
    }
}
