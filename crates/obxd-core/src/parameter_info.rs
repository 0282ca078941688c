//! Parameter descriptors.
//!
//! [`SHADOW_PARAMETERS`] is the declarative table behind every named key of
//! the control protocol. Each entry maps a stable string key to one engine
//! slot together with its display name, kind and range. The table order is
//! the order of `state`, `chain_params` and every other enumeration.

use crate::engine::EngineParam;
use crate::parameter_format::Formatter;

/// Value kind of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    /// Continuous value, shown with three decimals.
    Float,
    /// Switch or stepped value, shown without a fractional part.
    Int,
}

impl ParameterKind {
    /// Formatter used for `get` replies.
    pub const fn formatter(self) -> Formatter {
        match self {
            Self::Float => Formatter::Float { precision: 3 },
            Self::Int => Formatter::Integer,
        }
    }

    /// Type tag used in metadata documents.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Float => "float",
            Self::Int => "int",
        }
    }
}

/// Static description of one named parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterDescriptor {
    /// Protocol key (e.g. "cutoff").
    pub key: &'static str,
    /// Human-readable name (e.g. "Cutoff").
    pub name: &'static str,
    pub kind: ParameterKind,
    /// Engine slot backing this key.
    pub slot: EngineParam,
    pub min: f32,
    pub max: f32,
}

impl ParameterDescriptor {
    /// Continuous parameter over `0.0..=1.0`.
    pub const fn float(key: &'static str, name: &'static str, slot: EngineParam) -> Self {
        Self {
            key,
            name,
            kind: ParameterKind::Float,
            slot,
            min: 0.0,
            max: 1.0,
        }
    }

    /// Switch parameter over `0..=1`.
    pub const fn int(key: &'static str, name: &'static str, slot: EngineParam) -> Self {
        Self {
            kind: ParameterKind::Int,
            ..Self::float(key, name, slot)
        }
    }

    /// Clamp a raw value into this parameter's range.
    #[inline]
    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.min, self.max)
    }

    /// Format a value for a `get` reply.
    pub fn text(&self, value: f32) -> String {
        self.kind.formatter().text(value)
    }

    /// Parse and clamp a `set` request value.
    pub fn parse(&self, s: &str) -> Option<f32> {
        self.kind.formatter().parse(s).map(|v| self.clamp(v))
    }
}

use EngineParam as P;
use ParameterDescriptor as D;

/// Every named parameter, in declaration order.
pub static SHADOW_PARAMETERS: [ParameterDescriptor; 60] = [
    // Global
    D::float("volume", "Volume", P::Volume),
    D::float("tune", "Tune", P::Tune),
    D::float("portamento", "Portamento", P::Portamento),
    D::float("unison_det", "Uni Detune", P::UnisonDetune),
    D::int("octave", "Octave", P::Octave),
    D::int("voice_count", "Voices", P::VoiceCount),
    D::int("legato", "Legato", P::LegatoMode),
    D::int("unison", "Unison", P::Unison),
    // Oscillator 1
    D::float("osc1_pitch", "Osc1 Pitch", P::Osc1Pitch),
    D::float("osc1_mix", "Osc1 Mix", P::Osc1Mix),
    D::int("osc1_saw", "Osc1 Saw", P::Osc1Saw),
    D::int("osc1_pulse", "Osc1 Pulse", P::Osc1Pulse),
    // Oscillator 2
    D::float("osc2_pitch", "Osc2 Pitch", P::Osc2Pitch),
    D::float("osc2_mix", "Osc2 Mix", P::Osc2Mix),
    D::float("osc2_detune", "Osc2 Detune", P::Osc2Detune),
    D::int("osc2_saw", "Osc2 Saw", P::Osc2Saw),
    D::int("osc2_pulse", "Osc2 Pulse", P::Osc2Pulse),
    D::int("osc2_sync", "Osc2 Sync", P::Osc2HardSync),
    // Oscillator common
    D::float("pw", "Pulse Width", P::PulseWidth),
    D::float("pw_env", "PW Env Amt", P::PwEnv),
    D::float("pw_ofs", "PW Osc2 Ofs", P::PwOsc2Offset),
    D::float("noise", "Noise", P::NoiseMix),
    D::float("xmod", "X-Mod", P::CrossMod),
    D::float("brightness", "Brightness", P::Brightness),
    D::int("pw_env_both", "PW Env Both", P::PwEnvBoth),
    // Filter
    D::float("cutoff", "Cutoff", P::Cutoff),
    D::float("resonance", "Resonance", P::Resonance),
    D::float("filter_env", "Filter Env", P::FilterEnvAmount),
    D::float("key_follow", "Key Follow", P::FilterKeyFollow),
    D::float("multimode", "Multimode", P::Multimode),
    D::int("bandpass", "Bandpass", P::Bandpass),
    D::int("fourpole", "4-Pole", P::FourPole),
    D::int("self_osc", "Self Osc", P::SelfOscPush),
    D::int("fenv_inv", "F.Env Invert", P::FilterEnvInvert),
    // Filter envelope
    D::float("f_attack", "F Attack", P::FilterAttack),
    D::float("f_decay", "F Decay", P::FilterDecay),
    D::float("f_sustain", "F Sustain", P::FilterSustain),
    D::float("f_release", "F Release", P::FilterRelease),
    D::float("vel_filter", "Vel>Filter", P::VelocityFilterEnv),
    // Amp envelope
    D::float("attack", "Attack", P::AmpAttack),
    D::float("decay", "Decay", P::AmpDecay),
    D::float("sustain", "Sustain", P::AmpSustain),
    D::float("release", "Release", P::AmpRelease),
    D::float("vel_amp", "Vel>Amp", P::VelocityAmpEnv),
    // LFO
    D::float("lfo_rate", "LFO Rate", P::LfoFrequency),
    D::float("lfo_amt1", "LFO Amt 1", P::Lfo1Amount),
    D::float("lfo_amt2", "LFO Amt 2", P::Lfo2Amount),
    D::int("lfo_sin", "LFO Sine", P::LfoSine),
    D::int("lfo_square", "LFO Square", P::LfoSquare),
    D::int("lfo_sh", "LFO S&H", P::LfoSampleHold),
    D::int("lfo_sync", "LFO Sync", P::LfoSync),
    // LFO destinations
    D::int("lfo_osc1", "LFO>Osc1", P::LfoOsc1),
    D::int("lfo_osc2", "LFO>Osc2", P::LfoOsc2),
    D::int("lfo_filter", "LFO>Filter", P::LfoFilter),
    D::int("lfo_pw1", "LFO>PW1", P::LfoPw1),
    D::int("lfo_pw2", "LFO>PW2", P::LfoPw2),
    // Pitch modulation
    D::float("env_pitch", "Env>Pitch", P::EnvelopePitch),
    D::float("vibrato", "Vibrato", P::BendLfoRate),
    D::int("env_pitch_both", "Env Pitch Both", P::EnvPitchBoth),
    D::int("bend_range", "Bend Range", P::BendRange),
];

/// Position of `key` in [`SHADOW_PARAMETERS`].
pub fn shadow_index(key: &str) -> Option<usize> {
    SHADOW_PARAMETERS.iter().position(|d| d.key == key)
}

/// Descriptor for `key`.
pub fn shadow_descriptor(key: &str) -> Option<&'static ParameterDescriptor> {
    SHADOW_PARAMETERS.iter().find(|d| d.key == key)
}
