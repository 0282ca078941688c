//! Synthesis engine boundary.
//!
//! The polyphonic engine itself (oscillators, filters, envelopes, voice
//! allocation) lives outside this crate. The bridge only talks to it through
//! the [`Engine`] trait and addresses its parameters through the flat
//! [`EngineParam`] slot space, which is also the index space of the `Val_<i>`
//! attributes stored in preset banks.

/// Number of engine-addressable parameter slots.
pub const PARAM_COUNT: usize = 80;

/// Engine parameter slot.
///
/// Discriminants are the historical slot indices and must never be
/// reordered: preset banks address parameters by these numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EngineParam {
    Undefined = 0,
    MidiLearn,
    Volume,
    VoiceCount,
    Tune,
    Octave,
    BendRange,
    BendOsc2,
    LegatoMode,
    BendLfoRate,
    VelocityFilterEnv,
    VelocityAmpEnv,
    AsPlayedAllocation,
    Portamento,
    Unison,
    UnisonDetune,
    Osc2Detune,
    LfoFrequency,
    LfoSine,
    LfoSquare,
    LfoSampleHold,
    Lfo1Amount,
    Lfo2Amount,
    LfoOsc1,
    LfoOsc2,
    LfoFilter,
    LfoPw1,
    LfoPw2,
    Osc2HardSync,
    CrossMod,
    Osc1Pitch,
    Osc2Pitch,
    PitchQuantize,
    Osc1Saw,
    Osc1Pulse,
    Osc2Saw,
    Osc2Pulse,
    PulseWidth,
    Brightness,
    EnvelopePitch,
    Osc1Mix,
    Osc2Mix,
    NoiseMix,
    FilterKeyFollow,
    Cutoff,
    Resonance,
    Multimode,
    FilterWarm,
    Bandpass,
    FourPole,
    FilterEnvAmount,
    AmpAttack,
    AmpDecay,
    AmpSustain,
    AmpRelease,
    FilterAttack,
    FilterDecay,
    FilterSustain,
    FilterRelease,
    EnvelopeDetune,
    FilterDetune,
    PortamentoDetune,
    Pan1,
    Pan2,
    Pan3,
    Pan4,
    Pan5,
    Pan6,
    Pan7,
    Pan8,
    Unlearn,
    EconomyMode,
    LfoSync,
    PwEnv,
    PwEnvBoth,
    EnvPitchBoth,
    FilterEnvInvert,
    PwOsc2Offset,
    LevelDif,
    SelfOscPush,
}

impl EngineParam {
    /// Every slot in index order.
    pub const ALL: [EngineParam; PARAM_COUNT] = {
        use EngineParam::*;
        [
            Undefined, MidiLearn, Volume, VoiceCount, Tune, Octave, BendRange, BendOsc2,
            LegatoMode, BendLfoRate, VelocityFilterEnv, VelocityAmpEnv, AsPlayedAllocation,
            Portamento, Unison, UnisonDetune, Osc2Detune, LfoFrequency, LfoSine, LfoSquare,
            LfoSampleHold, Lfo1Amount, Lfo2Amount, LfoOsc1, LfoOsc2, LfoFilter, LfoPw1, LfoPw2,
            Osc2HardSync, CrossMod, Osc1Pitch, Osc2Pitch, PitchQuantize, Osc1Saw, Osc1Pulse,
            Osc2Saw, Osc2Pulse, PulseWidth, Brightness, EnvelopePitch, Osc1Mix, Osc2Mix,
            NoiseMix, FilterKeyFollow, Cutoff, Resonance, Multimode, FilterWarm, Bandpass,
            FourPole, FilterEnvAmount, AmpAttack, AmpDecay, AmpSustain, AmpRelease,
            FilterAttack, FilterDecay, FilterSustain, FilterRelease, EnvelopeDetune,
            FilterDetune, PortamentoDetune, Pan1, Pan2, Pan3, Pan4, Pan5, Pan6, Pan7, Pan8,
            Unlearn, EconomyMode, LfoSync, PwEnv, PwEnvBoth, EnvPitchBoth, FilterEnvInvert,
            PwOsc2Offset, LevelDif, SelfOscPush,
        ]
    };

    /// Slot index in the flat parameter vector.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Look up a slot by index.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

/// Flat per-instance parameter vector, one value per engine slot.
pub type ParameterVector = [f32; PARAM_COUNT];

/// The opaque polyphonic synthesis engine.
///
/// All methods are called from whichever thread owns the engine at the time:
/// the control thread while an instance is being built, the audio thread once
/// rendering has started. Implementations must not assume either.
pub trait Engine: Send + 'static {
    /// Configure the engine sample rate.
    fn set_sample_rate(&mut self, sample_rate: f32);

    /// Provide host tempo and song position.
    fn set_play_head(&mut self, bpm: f32, position: f32);

    /// Push a normalized value into one parameter slot.
    fn set_parameter(&mut self, param: EngineParam, value: f32);

    /// Start a voice. `velocity` is normalized to `0.0..=1.0`.
    fn note_on(&mut self, note: u8, velocity: f32);

    /// Release a voice.
    fn note_off(&mut self, note: u8);

    fn sustain_on(&mut self);

    fn sustain_off(&mut self);

    /// Pitch wheel position in `-1.0..1.0`.
    fn pitch_wheel(&mut self, value: f32);

    /// Modulation wheel position in `0.0..=1.0`.
    fn mod_wheel(&mut self, value: f32);

    /// Release every sounding voice.
    fn all_notes_off(&mut self);

    /// Render one stereo sample.
    fn process_sample(&mut self) -> (f32, f32);
}

/// A single engine mutation, produced on the control plane and applied on
/// the audio plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EngineCommand {
    SetParameter(EngineParam, f32),
    NoteOn { note: u8, velocity: f32 },
    NoteOff(u8),
    Sustain(bool),
    ModWheel(f32),
    PitchWheel(f32),
    AllNotesOff,
}

impl EngineCommand {
    /// Apply this command to an engine.
    pub fn dispatch<E: Engine + ?Sized>(self, engine: &mut E) {
        match self {
            Self::SetParameter(param, value) => engine.set_parameter(param, value),
            Self::NoteOn { note, velocity } => engine.note_on(note, velocity),
            Self::NoteOff(note) => engine.note_off(note),
            Self::Sustain(true) => engine.sustain_on(),
            Self::Sustain(false) => engine.sustain_off(),
            Self::ModWheel(value) => engine.mod_wheel(value),
            Self::PitchWheel(value) => engine.pitch_wheel(value),
            Self::AllNotesOff => engine.all_notes_off(),
        }
    }
}
