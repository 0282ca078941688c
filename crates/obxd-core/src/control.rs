//! Control plane of an instance.
//!
//! The [`Controller`] owns everything a host can read back: the parameter
//! vector, the preset bank and cursor, transpose, surface bank and the last
//! resource error. It never touches the engine directly. Every engine
//! mutation goes through the [`CommandQueue`] and is applied by the renderer,
//! while the controller's own state is updated synchronously so `get` always
//! reflects the latest `set`. Parameter writes are coalesced per slot, so the
//! engine always converges on the values `get` reports.

use std::path::Path;

use serde_json::{Map, Number, Value};

use crate::command::CommandQueue;
use crate::config::Config;
use crate::engine::{EngineCommand, EngineParam, ParameterVector, PARAM_COUNT};
use crate::error::{BridgeError, ParamError};
use crate::keys::ControlKey;
use crate::metadata;
use crate::midi::{MidiDecoder, MidiSource};
use crate::parameter_info::SHADOW_PARAMETERS;
use crate::preset::{is_applied_slot, PresetBank};
use crate::surface::{surface_control, SurfaceState, BANK_COUNT};

/// Name reported before any preset is selected.
pub const INIT_PATCH_NAME: &str = "Init";

/// Control-plane state of one instance.
#[derive(Debug)]
pub struct Controller {
    config: &'static Config,
    params: ParameterVector,
    bank: PresetBank,
    current_preset: Option<usize>,
    preset_name: String,
    octave_transpose: i32,
    param_bank: usize,
    surface: SurfaceState,
    last_error: Option<String>,
    commands: CommandQueue,
}

impl Controller {
    /// A controller with an all-zero parameter vector and no bank.
    pub fn new(config: &'static Config, commands: CommandQueue) -> Self {
        let params = [0.0; PARAM_COUNT];
        Self {
            config,
            surface: SurfaceState::new(&params),
            params,
            bank: PresetBank::empty(),
            current_preset: None,
            preset_name: INIT_PATCH_NAME.to_owned(),
            octave_transpose: 0,
            param_bank: 0,
            last_error: None,
            commands,
        }
    }

    pub fn config(&self) -> &'static Config {
        self.config
    }

    // =========================================================================
    // Engine handoff
    // =========================================================================

    fn enqueue(&self, command: EngineCommand) {
        if !self.commands.push(command) {
            log::warn!(
                "Voice event queue full ({} dropped so far); lost {command:?}, releasing all notes",
                self.commands.dropped()
            );
        }
    }

    /// Store a slot value and forward it to the engine.
    ///
    /// The single path through which any parameter reaches the engine.
    pub fn apply_parameter(&mut self, slot: EngineParam, value: f32) {
        self.params[slot.index()] = value;
        self.enqueue(EngineCommand::SetParameter(slot, value));
    }

    // =========================================================================
    // Patch and presets
    // =========================================================================

    /// Push the built-in initial patch. Slots not listed keep their value.
    pub fn apply_default_patch(&mut self) {
        use EngineParam as P;

        let voices = self.config.max_voices as f32 / 8.0;
        let patch = [
            (P::Volume, 1.0),
            (P::VoiceCount, voices),
            (P::Osc1Saw, 1.0),
            (P::Osc1Pulse, 0.0),
            (P::Osc2Saw, 1.0),
            (P::Osc2Pulse, 0.0),
            (P::Osc1Mix, 0.5),
            (P::Osc2Mix, 0.5),
            (P::Osc2Detune, 0.1),
            (P::Cutoff, 0.7),
            (P::Resonance, 0.2),
            (P::FourPole, 1.0),
            (P::FilterEnvAmount, 0.3),
            (P::AmpAttack, 0.01),
            (P::AmpDecay, 0.3),
            (P::AmpSustain, 0.7),
            (P::AmpRelease, 0.2),
            (P::FilterAttack, 0.01),
            (P::FilterDecay, 0.3),
            (P::FilterSustain, 0.3),
            (P::FilterRelease, 0.2),
        ];
        for (slot, value) in patch {
            self.apply_parameter(slot, value);
        }
        self.preset_name = INIT_PATCH_NAME.to_owned();
        self.surface.mirror(&self.params);
    }

    /// Load the factory bank from `module_dir`.
    ///
    /// A missing bank is normal for modules that ship none. Any other failure
    /// is recorded for `get_error`. Either way the current patch is kept.
    pub fn load_factory_bank(&mut self, module_dir: &Path) -> Result<usize, BridgeError> {
        let path = module_dir.join(self.config.factory_bank);
        match PresetBank::load(&path, self.config.preset_capacity) {
            Ok(bank) => {
                let count = bank.len();
                self.set_bank(bank);
                Ok(count)
            }
            Err(err) => {
                if err.is_missing_file() {
                    log::info!("No factory bank at {}", path.display());
                } else {
                    log::warn!("Factory bank unusable: {err}");
                    self.last_error = Some(err.to_string());
                }
                Err(err)
            }
        }
    }

    /// Replace the bank. The current selection is forgotten.
    pub fn set_bank(&mut self, bank: PresetBank) {
        self.bank = bank;
        self.current_preset = None;
    }

    pub fn bank(&self) -> &PresetBank {
        &self.bank
    }

    /// Select and apply a preset.
    ///
    /// Only the slots the preset defines are written; every slot at or past
    /// its populated count keeps its value in both the vector and the engine.
    pub fn select_preset(&mut self, index: usize) -> Result<(), ParamError> {
        let Some(preset) = self.bank.get(index) else {
            return Err(ParamError::OutOfRange);
        };
        let preset = preset.clone();

        let _batch = self.commands.begin_batch();
        for slot in EngineParam::ALL {
            let Some(value) = preset.value(slot.index()) else {
                break;
            };
            if is_applied_slot(slot) {
                self.apply_parameter(slot, value);
            } else {
                self.params[slot.index()] = value;
            }
        }

        self.current_preset = Some(index);
        self.preset_name = preset.name().to_owned();
        self.surface.mirror(&self.params);
        log::debug!("Selected preset {index} \"{}\"", self.preset_name);
        Ok(())
    }

    // =========================================================================
    // MIDI
    // =========================================================================

    /// Decode a MIDI message and forward it to the engine.
    pub fn on_midi(&self, msg: &[u8], source: MidiSource) {
        let decoder = MidiDecoder {
            transpose: self.octave_transpose * 12,
            touch_filter: self.config.touch_filter,
            all_notes_off_cc: self.config.all_notes_off_cc,
        };
        if let Some(command) = decoder.decode(msg, source) {
            self.enqueue(command);
        }
    }

    // =========================================================================
    // Key protocol
    // =========================================================================

    /// Read a key. `None` when no namespace knows it.
    pub fn get_param(&self, key: &str) -> Option<String> {
        let value = match ControlKey::lookup(key)? {
            ControlKey::Preset => self.current_preset.unwrap_or(0).to_string(),
            ControlKey::PresetCount => self.bank.len().to_string(),
            ControlKey::PresetName => self.preset_name.clone(),
            ControlKey::Name => self.config.name.to_owned(),
            ControlKey::OctaveTranspose => self.octave_transpose.to_string(),
            ControlKey::ParamBank => self.param_bank.to_string(),
            ControlKey::SurfaceValue(index) => {
                format!("{:.3}", self.surface.get(self.param_bank, index)?)
            }
            ControlKey::SurfaceName(index) => {
                surface_control(self.param_bank, index)?.name.to_owned()
            }
            ControlKey::Shadow(index) => {
                let descriptor = &SHADOW_PARAMETERS[index];
                descriptor.text(self.params[descriptor.slot.index()])
            }
            ControlKey::State => self.state_json(),
            ControlKey::ChainParams => metadata::chain_params_json(self.config, self.bank.len()),
            ControlKey::UiHierarchy => metadata::ui_hierarchy_json().to_owned(),
        };
        Some(value)
    }

    /// Write a key.
    pub fn set_param(&mut self, key: &str, value: &str) -> Result<(), ParamError> {
        let control = ControlKey::lookup(key).ok_or(ParamError::NotFound)?;
        if control.is_read_only() {
            return Err(ParamError::ReadOnly);
        }

        match control {
            ControlKey::Preset => {
                let index = parse_int(value)?;
                let index = usize::try_from(index).map_err(|_| ParamError::OutOfRange)?;
                self.select_preset(index)
            }
            ControlKey::OctaveTranspose => {
                self.set_octave_transpose(parse_int(value)?);
                Ok(())
            }
            ControlKey::ParamBank => {
                let bank = parse_int(value)?.clamp(0, BANK_COUNT as i64 - 1);
                self.param_bank = bank as usize;
                Ok(())
            }
            ControlKey::SurfaceValue(index) => {
                let value = value.trim().parse::<f32>().map_err(|_| ParamError::InvalidValue)?;
                if !value.is_finite() {
                    return Err(ParamError::InvalidValue);
                }
                self.set_surface(index, value.clamp(0.0, 1.0));
                Ok(())
            }
            ControlKey::Shadow(index) => {
                let descriptor = &SHADOW_PARAMETERS[index];
                let value = descriptor.parse(value).ok_or(ParamError::InvalidValue)?;
                self.apply_parameter(descriptor.slot, value);
                self.surface.mirror(&self.params);
                Ok(())
            }
            ControlKey::State => self.restore_state(value),
            ControlKey::PresetCount
            | ControlKey::PresetName
            | ControlKey::Name
            | ControlKey::SurfaceName(_)
            | ControlKey::ChainParams
            | ControlKey::UiHierarchy => Err(ParamError::ReadOnly),
        }
    }

    fn set_octave_transpose(&mut self, octave: i64) {
        let octave = octave.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32;
        self.octave_transpose = self.config.clamp_octave(octave);
    }

    fn set_surface(&mut self, index: usize, value: f32) {
        let Some(control) = surface_control(self.param_bank, index) else {
            return;
        };
        self.surface.set(self.param_bank, index, value);
        let _batch = self.commands.begin_batch();
        control
            .action
            .for_each_write(value, |slot, v| self.apply_parameter(slot, v));
    }

    // =========================================================================
    // State snapshot
    // =========================================================================

    /// Serialize preset, transpose and every named parameter.
    pub fn state_json(&self) -> String {
        let mut state = Map::new();
        state.insert(
            "preset".to_owned(),
            Value::from(self.current_preset.unwrap_or(0)),
        );
        state.insert(
            "octave_transpose".to_owned(),
            Value::from(self.octave_transpose),
        );
        for descriptor in &SHADOW_PARAMETERS {
            let value = round4(self.params[descriptor.slot.index()]);
            let number = Number::from_f64(value).map_or(Value::Null, Value::Number);
            state.insert(descriptor.key.to_owned(), number);
        }
        Value::Object(state).to_string()
    }

    /// Restore a snapshot produced by [`state_json`](Self::state_json).
    ///
    /// The preset is applied first so that the individual parameters that
    /// follow override it. Missing or non-numeric entries are skipped.
    pub fn restore_state(&mut self, json: &str) -> Result<(), ParamError> {
        let state: Map<String, Value> =
            serde_json::from_str(json).map_err(|_| ParamError::InvalidValue)?;

        let _batch = self.commands.begin_batch();

        if let Some(index) = state.get("preset").and_then(Value::as_f64) {
            if index >= 0.0 && (index as usize) < self.bank.len() {
                self.select_preset(index as usize)?;
            }
        }

        if let Some(octave) = state.get("octave_transpose").and_then(Value::as_f64) {
            self.set_octave_transpose(octave as i64);
        }

        for descriptor in &SHADOW_PARAMETERS {
            if let Some(value) = state.get(descriptor.key).and_then(Value::as_f64) {
                self.apply_parameter(descriptor.slot, descriptor.clamp(value as f32));
            }
        }

        self.surface.mirror(&self.params);
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Current value of an engine slot.
    pub fn parameter(&self, slot: EngineParam) -> f32 {
        self.params[slot.index()]
    }

    pub fn parameters(&self) -> &ParameterVector {
        &self.params
    }

    pub fn current_preset(&self) -> Option<usize> {
        self.current_preset
    }

    pub fn preset_name(&self) -> &str {
        &self.preset_name
    }

    pub fn octave_transpose(&self) -> i32 {
        self.octave_transpose
    }

    pub fn param_bank(&self) -> usize {
        self.param_bank
    }

    /// Last resource error, if any.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Commands waiting for the renderer.
    pub fn pending_commands(&self) -> usize {
        self.commands.len()
    }
}

/// Parse an integer key value. Accepts decimal notation and truncates.
fn parse_int(s: &str) -> Result<i64, ParamError> {
    let s = s.trim();
    if let Ok(value) = s.parse::<i64>() {
        return Ok(value);
    }
    match s.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value.trunc() as i64),
        _ => Err(ParamError::InvalidValue),
    }
}

fn round4(value: f32) -> f64 {
    (f64::from(value) * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_CONFIG;
    use crate::preset::PresetRecord;
    use crate::testing::MockEngine;

    fn controller() -> Controller {
        let mut controller = Controller::new(&DEFAULT_CONFIG, CommandQueue::new(1024));
        controller.apply_default_patch();
        controller
    }

    fn drain(controller: &Controller) -> Vec<EngineCommand> {
        let mut engine = MockEngine::new();
        let journal = engine.journal();
        controller.commands.drain_into(&mut engine);
        journal.commands()
    }

    fn bank() -> PresetBank {
        let mut lead = vec![0.0; 46];
        lead[44] = 0.9;
        lead[45] = 0.1;
        PresetBank::from_records(
            vec![
                PresetRecord::new("Lead", lead),
                PresetRecord::new("Short", vec![0.0, 0.0, 0.8]),
                PresetRecord::new("Full", vec![0.25; PARAM_COUNT]),
            ],
            128,
        )
    }

    #[test]
    fn test_default_patch() {
        let c = controller();
        assert_eq!(c.get_param("cutoff").as_deref(), Some("0.700"));
        assert_eq!(c.get_param("voice_count").as_deref(), Some("0"));
        assert_eq!(c.parameter(EngineParam::VoiceCount), 0.75);
        assert_eq!(c.get_param("fourpole").as_deref(), Some("1"));
        assert_eq!(c.get_param("preset_name").as_deref(), Some("Init"));
        assert_eq!(c.get_param("name").as_deref(), Some("OB-Xd"));
        assert_eq!(drain(&c).len(), 21);
    }

    #[test]
    fn test_shadow_set_clamps_and_forwards() {
        let mut c = controller();
        drain(&c);

        c.set_param("cutoff", "1.7").unwrap();
        assert_eq!(c.get_param("cutoff").as_deref(), Some("1.000"));
        c.set_param("bandpass", "0.9").unwrap();
        assert_eq!(c.get_param("bandpass").as_deref(), Some("0"));

        assert_eq!(
            drain(&c),
            [
                EngineCommand::SetParameter(EngineParam::Cutoff, 1.0),
                EngineCommand::SetParameter(EngineParam::Bandpass, 0.9),
            ]
        );
    }

    #[test]
    fn test_set_errors() {
        let mut c = controller();
        assert_eq!(c.set_param("wobble", "1"), Err(ParamError::NotFound));
        assert_eq!(c.set_param("preset_count", "1"), Err(ParamError::ReadOnly));
        assert_eq!(c.set_param("cutoff", "high"), Err(ParamError::InvalidValue));
        assert_eq!(c.get_param("cutoff").as_deref(), Some("0.700"));
        assert_eq!(c.get_param("wobble"), None);
    }

    #[test]
    fn test_preset_applies_defined_slots_only() {
        let mut c = controller();
        c.set_bank(bank());
        c.set_param("osc2_detune", "0.6").unwrap();
        drain(&c);

        c.set_param("preset", "0").unwrap();
        assert_eq!(c.get_param("cutoff").as_deref(), Some("0.900"));
        assert_eq!(c.get_param("resonance").as_deref(), Some("0.100"));
        assert_eq!(c.get_param("preset_name").as_deref(), Some("Lead"));
        // Slot 16 is below the populated count, so it is overwritten.
        assert_eq!(c.parameter(EngineParam::Osc2Detune), 0.0);
        // Slots past index 45 are untouched.
        assert_eq!(c.parameter(EngineParam::AmpSustain), 0.7);

        let writes: Vec<_> = drain(&c)
            .into_iter()
            .map(|command| match command {
                EngineCommand::SetParameter(slot, _) => slot.index(),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert!(writes.windows(2).all(|w| w[0] < w[1]));
        assert!(writes.iter().all(|&index| index < 46));
    }

    #[test]
    fn test_short_preset_preserves_newer_slots() {
        let mut c = controller();
        c.set_bank(bank());
        c.set_param("cutoff", "0.33").unwrap();
        let before = *c.parameters();

        c.select_preset(1).unwrap();
        let after = *c.parameters();
        assert_eq!(after[EngineParam::Volume.index()], 0.8);
        assert_eq!(after[3..], before[3..]);

        // Applying twice lands on the same state.
        c.select_preset(1).unwrap();
        assert_eq!(*c.parameters(), after);
    }

    #[test]
    fn test_unapplied_slots_are_stored_not_pushed() {
        let mut c = controller();
        c.set_bank(bank());
        drain(&c);

        c.select_preset(2).unwrap();
        assert_eq!(c.parameter(EngineParam::FilterWarm), 0.25);
        assert!(!drain(&c)
            .iter()
            .any(|cmd| *cmd == EngineCommand::SetParameter(EngineParam::FilterWarm, 0.25)));
    }

    #[test]
    fn test_out_of_range_preset_is_a_no_op() {
        let mut c = controller();
        c.set_bank(bank());
        drain(&c);
        let before = *c.parameters();

        assert_eq!(c.set_param("preset", "3"), Err(ParamError::OutOfRange));
        assert_eq!(c.set_param("preset", "-1"), Err(ParamError::OutOfRange));
        assert_eq!(*c.parameters(), before);
        assert_eq!(c.current_preset(), None);
        assert!(drain(&c).is_empty());
    }

    #[test]
    fn test_meta_keys_clamp() {
        let mut c = controller();
        c.set_param("octave_transpose", "7").unwrap();
        assert_eq!(c.get_param("octave_transpose").as_deref(), Some("3"));
        c.set_param("octave_transpose", "-9").unwrap();
        assert_eq!(c.octave_transpose(), -3);

        c.set_param("param_bank", "5").unwrap();
        assert_eq!(c.get_param("param_bank").as_deref(), Some("2"));
        c.set_param("param_bank", "-1").unwrap();
        assert_eq!(c.param_bank(), 0);
    }

    #[test]
    fn test_surface_bank_addressing() {
        let mut c = controller();
        assert_eq!(c.get_param("param_name_0").as_deref(), Some("cutoff"));
        assert_eq!(c.get_param("param_0").as_deref(), Some("0.700"));

        c.set_param("param_bank", "1").unwrap();
        assert_eq!(c.get_param("param_name_2").as_deref(), Some("osc_mix"));
        drain(&c);

        c.set_param("param_2", "0.2").unwrap();
        assert_eq!(c.get_param("param_2").as_deref(), Some("0.200"));
        assert_eq!(c.get_param("osc1_mix").as_deref(), Some("0.200"));
        assert_eq!(c.get_param("osc2_mix").as_deref(), Some("0.800"));
        // The canonical slots change, not whatever sits at bank * 8 + index.
        assert_eq!(c.parameter(EngineParam::from_index(10).unwrap()), 0.0);

        c.set_param("param_0", "0.1").unwrap();
        assert_eq!(c.get_param("osc1_saw").as_deref(), Some("0"));
        assert_eq!(c.get_param("osc1_pulse").as_deref(), Some("1"));

        assert_eq!(
            drain(&c),
            [
                EngineCommand::SetParameter(EngineParam::Osc1Saw, 0.0),
                EngineCommand::SetParameter(EngineParam::Osc1Pulse, 1.0),
                EngineCommand::SetParameter(EngineParam::Osc1Mix, 0.2),
                EngineCommand::SetParameter(EngineParam::Osc2Mix, 0.8),
            ]
        );
    }

    #[test]
    fn test_surface_mirrors_shadow_writes() {
        let mut c = controller();
        c.set_param("resonance", "0.45").unwrap();
        assert_eq!(c.get_param("param_1").as_deref(), Some("0.450"));

        c.set_param("param_bank", "2").unwrap();
        c.set_param("lfo_osc1", "1").unwrap();
        assert_eq!(c.get_param("param_3").as_deref(), Some("1.000"));
    }

    #[test]
    fn test_state_round_trip_is_a_fixed_point() {
        let mut c = controller();
        c.set_bank(bank());
        c.select_preset(2).unwrap();
        c.set_param("octave_transpose", "-2").unwrap();
        c.set_param("cutoff", "0.12345").unwrap();

        let first = c.get_param("state").unwrap();
        c.set_param("state", &first).unwrap();
        let second = c.get_param("state").unwrap();
        assert_eq!(first, second);

        let json: Value = serde_json::from_str(&first).unwrap();
        let keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys[0], "preset");
        assert_eq!(keys[1], "octave_transpose");
        assert_eq!(keys[2], "volume");
        assert_eq!(keys.len(), SHADOW_PARAMETERS.len() + 2);
        assert_eq!(json["preset"], 2);
        assert_eq!(json["cutoff"], 0.1235);
    }

    #[test]
    fn test_state_restore_order() {
        let mut c = controller();
        c.set_bank(bank());

        c.set_param("state", r#"{"cutoff": 0.3, "preset": 0, "octave_transpose": 9}"#)
            .unwrap();
        assert_eq!(c.current_preset(), Some(0));
        // The explicit value wins over the preset's 0.9.
        assert_eq!(c.get_param("cutoff").as_deref(), Some("0.300"));
        assert_eq!(c.get_param("resonance").as_deref(), Some("0.100"));
        assert_eq!(c.octave_transpose(), 3);
    }

    #[test]
    fn test_malformed_state_changes_nothing() {
        let mut c = controller();
        let before = *c.parameters();
        assert_eq!(c.set_param("state", "{cutoff"), Err(ParamError::InvalidValue));
        assert_eq!(c.set_param("state", "[1, 2]"), Err(ParamError::InvalidValue));
        assert_eq!(*c.parameters(), before);
    }

    #[test]
    fn test_midi_uses_transpose() {
        let mut c = controller();
        drain(&c);
        c.set_param("octave_transpose", "1").unwrap();
        c.on_midi(&[0x90, 60, 127], MidiSource::External);
        c.on_midi(&[0x90, 5, 127], MidiSource::Internal);
        assert_eq!(
            drain(&c),
            [EngineCommand::NoteOn { note: 72, velocity: 1.0 }]
        );
    }

    #[test]
    fn test_parse_int() {
        assert_eq!(parse_int(" 4 "), Ok(4));
        assert_eq!(parse_int("2.9"), Ok(2));
        assert_eq!(parse_int("-1"), Ok(-1));
        assert_eq!(parse_int("two"), Err(ParamError::InvalidValue));
    }
}
