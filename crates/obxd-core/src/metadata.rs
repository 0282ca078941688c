//! JSON documents exposed through the control protocol.
//!
//! - `chain_params`: flat list of every controllable key for generic editors
//! - `ui_hierarchy`: static navigation tree for a parameter browser

use std::sync::OnceLock;

use serde::Serialize;

use crate::config::Config;
use crate::parameter_info::{ParameterKind, SHADOW_PARAMETERS};

/// A numeric bound, kept integral for integer parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Bound {
    Int(i64),
    Float(f32),
}

/// One `chain_params` entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChainParam {
    pub key: &'static str,
    pub name: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub min: Bound,
    pub max: Bound,
}

/// Build the `chain_params` list: preset, octave, then every named parameter.
pub fn chain_params(config: &Config, preset_count: usize) -> Vec<ChainParam> {
    let preset_max = preset_count.saturating_sub(1) as i64;
    let mut params = Vec::with_capacity(SHADOW_PARAMETERS.len() + 2);
    params.push(ChainParam {
        key: "preset",
        name: "Preset",
        kind: ParameterKind::Int.as_str(),
        min: Bound::Int(0),
        max: Bound::Int(preset_max),
    });
    params.push(ChainParam {
        key: "octave_transpose",
        name: "Octave",
        kind: ParameterKind::Int.as_str(),
        min: Bound::Int(i64::from(config.octave_min)),
        max: Bound::Int(i64::from(config.octave_max)),
    });

    params.extend(SHADOW_PARAMETERS.iter().map(|d| {
        let bound = |v: f32| match d.kind {
            ParameterKind::Int => Bound::Int(v as i64),
            ParameterKind::Float => Bound::Float(v),
        };
        ChainParam {
            key: d.key,
            name: if d.name.is_empty() { d.key } else { d.name },
            kind: d.kind.as_str(),
            min: bound(d.min),
            max: bound(d.max),
        }
    }));
    params
}

/// Serialized `chain_params`.
pub fn chain_params_json(config: &Config, preset_count: usize) -> String {
    serde_json::to_string(&chain_params(config, preset_count)).unwrap_or_default()
}

/// An entry of a level's `params` list.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(untagged)]
enum LevelEntry {
    Key(&'static str),
    Level {
        level: &'static str,
        label: &'static str,
    },
}

#[derive(Debug, Clone, Serialize)]
struct Level {
    #[serde(skip_serializing_if = "Option::is_none")]
    list_param: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    count_param: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name_param: Option<&'static str>,
    children: Option<&'static str>,
    knobs: &'static [&'static str],
    params: Vec<LevelEntry>,
}

impl Level {
    fn leaf(knobs: &'static [&'static str], params: &'static [&'static str]) -> Self {
        Self {
            list_param: None,
            count_param: None,
            name_param: None,
            children: None,
            knobs,
            params: params.iter().map(|&key| LevelEntry::Key(key)).collect(),
        }
    }
}

#[derive(Serialize)]
struct Hierarchy {
    modes: Option<()>,
    levels: serde_json::Map<String, serde_json::Value>,
}

const QUICK_KNOBS: &[&str] = &[
    "cutoff", "resonance", "filter_env", "attack", "decay", "sustain", "release",
    "octave_transpose",
];

const SECTIONS: &[(&str, &str)] = &[
    ("global", "Global"),
    ("osc1", "Oscillator 1"),
    ("osc2", "Oscillator 2"),
    ("osc_common", "Osc Common"),
    ("filter", "Filter"),
    ("filt_env", "Filter Env"),
    ("amp_env", "Amp Env"),
    ("lfo", "LFO"),
    ("lfo_dest", "LFO Dest"),
    ("pitch_mod", "Pitch Mod"),
];

fn build_hierarchy() -> Hierarchy {
    const GLOBAL: &[&str] = &[
        "volume", "tune", "octave", "portamento", "unison", "unison_det", "legato",
        "octave_transpose",
    ];
    const OSC1: &[&str] = &["osc1_saw", "osc1_pulse", "osc1_pitch", "osc1_mix"];
    const OSC2: &[&str] = &[
        "osc2_saw", "osc2_pulse", "osc2_pitch", "osc2_mix", "osc2_detune", "osc2_sync",
    ];
    const FILT_ENV: &[&str] = &["f_attack", "f_decay", "f_sustain", "f_release", "vel_filter"];
    const AMP_ENV: &[&str] = &["attack", "decay", "sustain", "release", "vel_amp"];
    const LFO_DEST: &[&str] = &["lfo_osc1", "lfo_osc2", "lfo_filter", "lfo_pw1", "lfo_pw2"];

    let root = Level {
        list_param: Some("preset"),
        count_param: Some("preset_count"),
        name_param: Some("preset_name"),
        children: Some("main"),
        knobs: QUICK_KNOBS,
        params: Vec::new(),
    };
    let main = Level {
        params: SECTIONS
            .iter()
            .map(|&(level, label)| LevelEntry::Level { level, label })
            .collect(),
        ..Level::leaf(QUICK_KNOBS, &[])
    };

    let levels = [
        ("root", root),
        ("main", main),
        ("global", Level::leaf(GLOBAL, GLOBAL)),
        ("osc1", Level::leaf(OSC1, OSC1)),
        ("osc2", Level::leaf(OSC2, OSC2)),
        (
            "osc_common",
            Level::leaf(
                &["pw", "pw_env", "noise", "xmod", "brightness"],
                &["pw", "pw_env", "pw_env_both", "pw_ofs", "noise", "xmod", "brightness"],
            ),
        ),
        (
            "filter",
            Level::leaf(
                &["cutoff", "resonance", "filter_env", "key_follow", "multimode", "fourpole"],
                &[
                    "cutoff", "resonance", "filter_env", "key_follow", "multimode", "bandpass",
                    "fourpole", "self_osc", "fenv_inv",
                ],
            ),
        ),
        ("filt_env", Level::leaf(FILT_ENV, FILT_ENV)),
        ("amp_env", Level::leaf(AMP_ENV, AMP_ENV)),
        (
            "lfo",
            Level::leaf(
                &["lfo_rate", "lfo_sin", "lfo_square", "lfo_sh", "lfo_amt1", "lfo_amt2"],
                &[
                    "lfo_rate", "lfo_sin", "lfo_square", "lfo_sh", "lfo_sync", "lfo_amt1",
                    "lfo_amt2",
                ],
            ),
        ),
        ("lfo_dest", Level::leaf(LFO_DEST, LFO_DEST)),
        (
            "pitch_mod",
            Level::leaf(
                &["env_pitch", "bend_range", "vibrato"],
                &["env_pitch", "env_pitch_both", "bend_range", "vibrato"],
            ),
        ),
    ];

    let levels = levels
        .into_iter()
        .filter_map(|(name, level)| {
            serde_json::to_value(level)
                .ok()
                .map(|value| (name.to_owned(), value))
        })
        .collect();

    Hierarchy { modes: None, levels }
}

/// The static `ui_hierarchy` document, serialized once.
pub fn ui_hierarchy_json() -> &'static str {
    static HIERARCHY: OnceLock<String> = OnceLock::new();
    HIERARCHY.get_or_init(|| serde_json::to_string(&build_hierarchy()).unwrap_or_default())
}
