//! Narrow control-surface banks.
//!
//! Hardware with eight knobs sees the synth through three fixed banks of
//! eight controls, selected by the `param_bank` cursor. A control may drive
//! more than one engine slot (a waveform switch sets saw and pulse together,
//! the oscillator mix crossfades both levels), so each one is described by a
//! [`SurfaceAction`] that expands into ordinary slot writes.

use crate::engine::{EngineParam, ParameterVector};

/// Controls per bank.
pub const CONTROLS_PER_BANK: usize = 8;

/// Number of banks.
pub const BANK_COUNT: usize = 3;

/// How a surface control maps onto engine slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceAction {
    /// One slot, value passed through.
    Direct(EngineParam),
    /// Above 0.5 selects `on` and clears `off`, otherwise the reverse.
    Switch { on: EngineParam, off: EngineParam },
    /// `primary` gets the value, `secondary` its complement.
    Crossfade {
        primary: EngineParam,
        secondary: EngineParam,
    },
    /// Both slots get the same value.
    Pair(EngineParam, EngineParam),
}

impl SurfaceAction {
    /// Expand a control value into slot writes.
    pub fn for_each_write(self, value: f32, mut write: impl FnMut(EngineParam, f32)) {
        match self {
            Self::Direct(slot) => write(slot, value),
            Self::Switch { on, off } => {
                let selected = if value > 0.5 { 1.0 } else { 0.0 };
                write(on, selected);
                write(off, 1.0 - selected);
            }
            Self::Crossfade { primary, secondary } => {
                write(primary, value);
                write(secondary, 1.0 - value);
            }
            Self::Pair(a, b) => {
                write(a, value);
                write(b, value);
            }
        }
    }

    /// Reconstruct the control position from the parameter vector.
    pub fn read(self, params: &ParameterVector) -> f32 {
        match self {
            Self::Direct(slot)
            | Self::Switch { on: slot, .. }
            | Self::Crossfade { primary: slot, .. }
            | Self::Pair(slot, _) => params[slot.index()],
        }
    }
}

/// One knob of a bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceControl {
    /// Label reported through `param_name_<i>`.
    pub name: &'static str,
    pub action: SurfaceAction,
}

const fn control(name: &'static str, action: SurfaceAction) -> SurfaceControl {
    SurfaceControl { name, action }
}

use EngineParam as P;
use SurfaceAction::*;

/// Filter, oscillator and modulation banks.
pub static SURFACE_BANKS: [[SurfaceControl; CONTROLS_PER_BANK]; BANK_COUNT] = [
    [
        control("cutoff", Direct(P::Cutoff)),
        control("resonance", Direct(P::Resonance)),
        control("filter_env", Direct(P::FilterEnvAmount)),
        control("key_track", Direct(P::FilterKeyFollow)),
        control("attack", Direct(P::AmpAttack)),
        control("decay", Direct(P::AmpDecay)),
        control("sustain", Direct(P::AmpSustain)),
        control("release", Direct(P::AmpRelease)),
    ],
    [
        control("osc1_wave", Switch { on: P::Osc1Saw, off: P::Osc1Pulse }),
        control("osc2_wave", Switch { on: P::Osc2Saw, off: P::Osc2Pulse }),
        control("osc_mix", Crossfade { primary: P::Osc1Mix, secondary: P::Osc2Mix }),
        control("noise", Direct(P::NoiseMix)),
        control("pw", Direct(P::PulseWidth)),
        control("osc2_det", Direct(P::Osc2Detune)),
        control("osc1_pitch", Direct(P::Osc1Pitch)),
        control("osc2_pitch", Direct(P::Osc2Pitch)),
    ],
    [
        control("lfo_rate", Direct(P::LfoFrequency)),
        control("lfo_wave", Switch { on: P::LfoSine, off: P::LfoSquare }),
        control("lfo_cutoff", Direct(P::LfoFilter)),
        control("lfo_pitch", Pair(P::LfoOsc1, P::LfoOsc2)),
        control("lfo_pw", Pair(P::LfoPw1, P::LfoPw2)),
        control("vibrato", Direct(P::Lfo1Amount)),
        control("unison", Direct(P::Unison)),
        control("portamento", Direct(P::Portamento)),
    ],
];

/// Last position of every surface control across all banks.
///
/// Positions are written verbatim when a control is turned and refreshed from
/// the parameter vector whenever slots change by other means.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceState {
    values: [[f32; CONTROLS_PER_BANK]; BANK_COUNT],
}

impl SurfaceState {
    pub fn new(params: &ParameterVector) -> Self {
        let mut state = Self {
            values: [[0.0; CONTROLS_PER_BANK]; BANK_COUNT],
        };
        state.mirror(params);
        state
    }

    pub fn get(&self, bank: usize, index: usize) -> Option<f32> {
        self.values.get(bank)?.get(index).copied()
    }

    pub fn set(&mut self, bank: usize, index: usize, value: f32) {
        if let Some(slot) = self.values.get_mut(bank).and_then(|b| b.get_mut(index)) {
            *slot = value;
        }
    }

    /// Refresh every position from the parameter vector.
    pub fn mirror(&mut self, params: &ParameterVector) {
        for (values, controls) in self.values.iter_mut().zip(SURFACE_BANKS.iter()) {
            for (value, control) in values.iter_mut().zip(controls.iter()) {
                *value = control.action.read(params);
            }
        }
    }
}

/// Control at `index` of `bank`.
pub fn surface_control(bank: usize, index: usize) -> Option<&'static SurfaceControl> {
    SURFACE_BANKS.get(bank)?.get(index)
}
