//! Control protocol key resolution.
//!
//! Every string key a host can send resolves, through one static map built on
//! first use, to a [`ControlKey`]. Namespaces are inserted in priority order
//! and earlier namespaces win, so a shadow parameter can never shadow an
//! instance key.

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::parameter_info::SHADOW_PARAMETERS;
use crate::surface::CONTROLS_PER_BANK;

/// A resolved protocol key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKey {
    Preset,
    PresetCount,
    PresetName,
    Name,
    OctaveTranspose,
    ParamBank,
    /// `param_<i>`: surface control value through the bank cursor.
    SurfaceValue(usize),
    /// `param_name_<i>`: surface control label through the bank cursor.
    SurfaceName(usize),
    /// Index into [`SHADOW_PARAMETERS`].
    Shadow(usize),
    State,
    ChainParams,
    UiHierarchy,
}

const SURFACE_VALUE_KEYS: [&str; CONTROLS_PER_BANK] = [
    "param_0", "param_1", "param_2", "param_3", "param_4", "param_5", "param_6", "param_7",
];

const SURFACE_NAME_KEYS: [&str; CONTROLS_PER_BANK] = [
    "param_name_0",
    "param_name_1",
    "param_name_2",
    "param_name_3",
    "param_name_4",
    "param_name_5",
    "param_name_6",
    "param_name_7",
];

fn key_map() -> &'static HashMap<&'static str, ControlKey> {
    static KEYS: OnceLock<HashMap<&'static str, ControlKey>> = OnceLock::new();
    KEYS.get_or_init(|| {
        let mut map = HashMap::new();
        let mut insert = |key: &'static str, control: ControlKey| {
            map.entry(key).or_insert(control);
        };

        insert("preset", ControlKey::Preset);
        insert("preset_count", ControlKey::PresetCount);
        insert("preset_name", ControlKey::PresetName);
        insert("name", ControlKey::Name);
        insert("octave_transpose", ControlKey::OctaveTranspose);
        insert("param_bank", ControlKey::ParamBank);

        for (index, key) in SURFACE_VALUE_KEYS.iter().enumerate() {
            insert(key, ControlKey::SurfaceValue(index));
        }
        for (index, key) in SURFACE_NAME_KEYS.iter().enumerate() {
            insert(key, ControlKey::SurfaceName(index));
        }

        for (index, descriptor) in SHADOW_PARAMETERS.iter().enumerate() {
            insert(descriptor.key, ControlKey::Shadow(index));
        }

        insert("state", ControlKey::State);
        insert("chain_params", ControlKey::ChainParams);
        insert("ui_hierarchy", ControlKey::UiHierarchy);
        map
    })
}

impl ControlKey {
    /// Resolve a protocol key.
    pub fn lookup(key: &str) -> Option<Self> {
        key_map().get(key).copied()
    }

    /// Whether `set` is rejected for this key.
    pub const fn is_read_only(self) -> bool {
        matches!(
            self,
            Self::PresetCount
                | Self::PresetName
                | Self::Name
                | Self::SurfaceName(_)
                | Self::ChainParams
                | Self::UiHierarchy
        )
    }
}
