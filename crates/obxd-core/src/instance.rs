//! Instance lifecycle and the audio plane.
//!
//! An [`Instance`] pairs a [`Controller`] with a [`Renderer`] that owns the
//! engine. Used as a whole, every control call is applied to the engine
//! before it returns, which is correct whenever the host serializes control
//! and render calls. Hosts that render on a separate thread call
//! [`Instance::split`] and drive the two halves independently; commands then
//! cross over a lock-free queue and are applied at block boundaries.

use std::path::{Path, PathBuf};

use crate::command::CommandQueue;
use crate::config::Config;
use crate::control::Controller;
use crate::engine::Engine;
use crate::error::ParamError;
use crate::midi::MidiSource;
use crate::render::render_interleaved;

/// Audio-plane half of an instance.
#[derive(Debug)]
pub struct Renderer<E: Engine> {
    engine: E,
    commands: CommandQueue,
    output_gain: f32,
}

impl<E: Engine> Renderer<E> {
    /// Apply pending engine commands without rendering.
    pub fn sync(&mut self) -> usize {
        self.commands.drain_into(&mut self.engine)
    }

    /// Render one block of interleaved stereo into `out`.
    ///
    /// Pending commands are applied first. Never allocates or blocks.
    pub fn render(&mut self, out: &mut [i16]) {
        self.sync();
        render_interleaved(&mut self.engine, self.output_gain, out);
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }
}

/// A fully constructed bridge instance.
#[derive(Debug)]
pub struct Instance<E: Engine> {
    module_dir: PathBuf,
    controller: Controller,
    renderer: Renderer<E>,
}

impl<E: Engine> Instance<E> {
    /// Build an instance around `engine`.
    ///
    /// Attaches the engine, applies the default patch, loads the factory
    /// bank from `module_dir` and selects its first preset, then applies
    /// `json_defaults` (a `state` document) if given. A missing or broken
    /// bank leaves the default patch in place.
    pub fn create(
        module_dir: impl AsRef<Path>,
        json_defaults: Option<&str>,
        mut engine: E,
        config: &'static Config,
    ) -> Self {
        let module_dir = module_dir.as_ref().to_path_buf();
        engine.set_sample_rate(config.sample_rate);
        engine.set_play_head(config.tempo, 0.0);

        let commands = CommandQueue::new(config.command_queue_capacity);
        let mut controller = Controller::new(config, commands.clone());
        let mut renderer = Renderer {
            engine,
            commands,
            output_gain: config.output_gain,
        };

        controller.apply_default_patch();
        renderer.sync();

        if controller.load_factory_bank(&module_dir).is_ok() && !controller.bank().is_empty() {
            // Index 0 exists, so this cannot fail.
            let _ = controller.select_preset(0);
            renderer.sync();
        }

        if let Some(defaults) = json_defaults.filter(|d| !d.trim().is_empty()) {
            if controller.restore_state(defaults).is_err() {
                log::warn!("Ignoring malformed instance defaults");
            }
            renderer.sync();
        }

        log::info!(
            "{} instance ready ({} presets) in {}",
            config.name,
            controller.bank().len(),
            module_dir.display()
        );

        Self {
            module_dir,
            controller,
            renderer,
        }
    }

    pub fn module_dir(&self) -> &Path {
        &self.module_dir
    }

    pub fn get_param(&self, key: &str) -> Option<String> {
        self.controller.get_param(key)
    }

    pub fn set_param(&mut self, key: &str, value: &str) -> Result<(), ParamError> {
        let result = self.controller.set_param(key, value);
        self.renderer.sync();
        result
    }

    pub fn on_midi(&mut self, msg: &[u8], source: MidiSource) {
        self.controller.on_midi(msg, source);
        self.renderer.sync();
    }

    pub fn render(&mut self, out: &mut [i16]) {
        self.renderer.render(out);
    }

    pub fn last_error(&self) -> Option<&str> {
        self.controller.last_error()
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    pub fn engine(&self) -> &E {
        self.renderer.engine()
    }

    /// Separate the control and audio planes.
    pub fn split(self) -> (Controller, Renderer<E>) {
        (self.controller, self.renderer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_CONFIG;
    use crate::engine::{EngineCommand, EngineParam};
    use crate::testing::{EngineCall, MockEngine};
    use std::fs;

    fn write_bank(dir: &Path, xml: &str) {
        fs::create_dir_all(dir.join("presets")).unwrap();
        let mut bytes = b"CcnK\x00\x00\x10\x00FBCh".to_vec();
        bytes.extend_from_slice(xml.as_bytes());
        fs::write(dir.join("presets/factory.fxb"), bytes).unwrap();
    }

    #[test]
    fn test_create_without_bank() {
        let dir = tempfile::tempdir().unwrap();
        let engine = MockEngine::new();
        let journal = engine.journal();
        let instance = Instance::create(dir.path(), None, engine, &DEFAULT_CONFIG);

        assert_eq!(instance.get_param("preset_count").as_deref(), Some("0"));
        assert_eq!(instance.get_param("preset").as_deref(), Some("0"));
        assert_eq!(instance.get_param("preset_name").as_deref(), Some("Init"));
        assert_eq!(instance.last_error(), None);
        assert_eq!(instance.module_dir(), dir.path());

        let calls = journal.calls();
        assert_eq!(calls[0], EngineCall::SampleRate(44100.0));
        assert_eq!(calls[1], EngineCall::PlayHead { bpm: 120.0, position: 0.0 });
        assert_eq!(journal.last_value(EngineParam::Cutoff), Some(0.7));
    }

    #[test]
    fn test_create_selects_first_preset() {
        let dir = tempfile::tempdir().unwrap();
        write_bank(
            dir.path(),
            r#"<?xml version="1.0"?><programs>
                <program programName="Lead" Val_44="0.9" Val_45="0.1"/>
                <program programName="Bass" Val_44="0.2"/>
            </programs>"#,
        );
        let engine = MockEngine::new();
        let journal = engine.journal();
        let instance = Instance::create(dir.path(), None, engine, &DEFAULT_CONFIG);

        assert_eq!(instance.get_param("preset_count").as_deref(), Some("2"));
        assert_eq!(instance.get_param("preset_name").as_deref(), Some("Lead"));
        assert_eq!(instance.get_param("cutoff").as_deref(), Some("0.900"));
        assert_eq!(instance.get_param("resonance").as_deref(), Some("0.100"));
        assert_eq!(journal.last_value(EngineParam::Cutoff), Some(0.9));
    }

    #[test]
    fn test_malformed_bank_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("presets")).unwrap();
        fs::write(dir.path().join("presets/factory.fxb"), b"CcnK garbage").unwrap();

        let instance = Instance::create(dir.path(), None, MockEngine::new(), &DEFAULT_CONFIG);
        assert_eq!(instance.get_param("preset_count").as_deref(), Some("0"));
        assert_eq!(instance.get_param("cutoff").as_deref(), Some("0.700"));
        assert_eq!(instance.last_error(), Some("preset bank has no program list"));
    }

    #[test]
    fn test_json_defaults_override_preset() {
        let dir = tempfile::tempdir().unwrap();
        write_bank(
            dir.path(),
            r#"<?xml?><program programName="A" Val_44="0.9"/><program programName="B" Val_44="0.4"/>"#,
        );
        let instance = Instance::create(
            dir.path(),
            Some(r#"{"preset": 1, "resonance": 0.6}"#),
            MockEngine::new(),
            &DEFAULT_CONFIG,
        );
        assert_eq!(instance.get_param("preset_name").as_deref(), Some("B"));
        assert_eq!(instance.get_param("cutoff").as_deref(), Some("0.400"));
        assert_eq!(instance.get_param("resonance").as_deref(), Some("0.600"));

        let ignored = Instance::create(dir.path(), Some("not json"), MockEngine::new(), &DEFAULT_CONFIG);
        assert_eq!(ignored.get_param("preset_name").as_deref(), Some("A"));
    }

    #[test]
    fn test_control_calls_reach_engine_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let engine = MockEngine::new();
        let journal = engine.journal();
        let mut instance = Instance::create(dir.path(), None, engine, &DEFAULT_CONFIG);
        journal.clear();

        instance.set_param("resonance", "0.5").unwrap();
        instance.on_midi(&[0x90, 64, 127], MidiSource::External);
        assert_eq!(
            journal.commands(),
            [
                EngineCommand::SetParameter(EngineParam::Resonance, 0.5),
                EngineCommand::NoteOn { note: 64, velocity: 1.0 },
            ]
        );
        assert_eq!(instance.controller().pending_commands(), 0);
    }

    #[test]
    fn test_note_on_then_note_off() {
        let dir = tempfile::tempdir().unwrap();
        let engine = MockEngine::new();
        let journal = engine.journal();
        let mut instance = Instance::create(dir.path(), None, engine, &DEFAULT_CONFIG);
        journal.clear();

        instance.on_midi(&[0x90, 60, 100], MidiSource::External);
        instance.on_midi(&[0x80, 60, 0], MidiSource::External);
        assert_eq!(
            journal.commands(),
            [
                EngineCommand::NoteOn { note: 60, velocity: 100.0 / 127.0 },
                EngineCommand::NoteOff(60),
            ]
        );

        // Touch noise from the pads never reaches the engine.
        journal.clear();
        instance.on_midi(&[0x90, 5, 100], MidiSource::Internal);
        instance.on_midi(&[0x80, 5, 0], MidiSource::Internal);
        assert!(journal.is_empty());
    }

    #[test]
    fn test_small_queue_keeps_every_parameter() {
        static SMALL: Config = Config::new("OB-Xd").with_command_queue_capacity(16);
        let dir = tempfile::tempdir().unwrap();
        write_bank(
            dir.path(),
            &format!(
                r#"<?xml?><program programName="Full" {}/>"#,
                (0..80).map(|i| format!(r#"Val_{i}="0.5""#)).collect::<Vec<_>>().join(" ")
            ),
        );
        let engine = MockEngine::new();
        let journal = engine.journal();
        let instance = Instance::create(dir.path(), None, engine, &SMALL);

        assert_eq!(instance.get_param("f_release").as_deref(), Some("0.500"));
        assert_eq!(journal.last_value(EngineParam::FilterRelease), Some(0.5));
        assert_eq!(journal.last_value(EngineParam::Cutoff), Some(0.5));
        assert_eq!(instance.controller().pending_commands(), 0);
    }

    #[test]
    fn test_split_burst_converges() {
        let dir = tempfile::tempdir().unwrap();
        let engine = MockEngine::new();
        let journal = engine.journal();
        let instance = Instance::create(dir.path(), None, engine, &DEFAULT_CONFIG);
        let (mut controller, mut renderer) = instance.split();
        journal.clear();

        controller.on_midi(&[0x90, 60, 100], MidiSource::External);
        for i in 0..1100 {
            controller
                .set_param("cutoff", &format!("{}", (i % 100) as f32 / 100.0))
                .unwrap();
        }
        controller.on_midi(&[0x80, 60, 0], MidiSource::External);
        renderer.render(&mut [0i16; 256]);

        assert_eq!(controller.get_param("cutoff").as_deref(), Some("0.990"));
        assert_eq!(journal.last_value(EngineParam::Cutoff), Some(0.99));
        assert_eq!(
            journal.commands(),
            [
                EngineCommand::SetParameter(EngineParam::Cutoff, 0.99),
                EngineCommand::NoteOn { note: 60, velocity: 100.0 / 127.0 },
                EngineCommand::NoteOff(60),
            ]
        );
    }

    #[test]
    fn test_presets_reach_engine_whole() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::Arc;

        let program = |name: &str, value: &str| {
            let values: Vec<_> = (0..80).map(|i| format!(r#"Val_{i}="{value}""#)).collect();
            format!(r#"<program programName="{name}" {}/>"#, values.join(" "))
        };
        let dir = tempfile::tempdir().unwrap();
        write_bank(
            dir.path(),
            &format!("<?xml?>{}{}", program("Low", "0.25"), program("High", "0.75")),
        );
        let engine = MockEngine::new();
        let journal = engine.journal();
        let instance = Instance::create(dir.path(), None, engine, &DEFAULT_CONFIG);
        let (mut controller, mut renderer) = instance.split();

        let done = Arc::new(AtomicBool::new(false));
        let audio = {
            let done = Arc::clone(&done);
            std::thread::spawn(move || {
                let mut out = [0i16; 32];
                while !done.load(Ordering::Acquire) {
                    journal.clear();
                    renderer.render(&mut out);
                    let writes = journal.parameter_writes();
                    if let Some(&(_, first)) = writes.first() {
                        assert!(writes.iter().all(|&(_, value)| value == first));
                    }
                }
            })
        };
        for i in 0..500 {
            controller.select_preset(i % 2).unwrap();
        }
        done.store(true, Ordering::Release);
        audio.join().unwrap();
    }

    #[test]
    fn test_fresh_instance_renders_in_range() {
        let dir = tempfile::tempdir().unwrap();
        let mut instance = Instance::create(dir.path(), None, MockEngine::new(), &DEFAULT_CONFIG);
        let mut out = [1i16; 256];
        instance.render(&mut out);
        assert!(out.iter().all(|&s| s == 0));
        assert_eq!(instance.engine().samples_rendered, 128);

        let mut loud = Instance::create(
            dir.path(),
            None,
            MockEngine::with_output(3.0, -3.0),
            &DEFAULT_CONFIG,
        );
        loud.render(&mut out);
        assert_eq!(out[0], 32767);
        assert_eq!(out[1], -32768);
    }

    #[test]
    fn test_split_defers_commands_to_block_start() {
        let dir = tempfile::tempdir().unwrap();
        let engine = MockEngine::new();
        let journal = engine.journal();
        let instance = Instance::create(dir.path(), None, engine, &DEFAULT_CONFIG);
        let (mut controller, mut renderer) = instance.split();
        journal.clear();

        controller.set_param("cutoff", "0.25").unwrap();
        assert_eq!(controller.get_param("cutoff").as_deref(), Some("0.250"));
        assert!(journal.is_empty());
        assert_eq!(controller.pending_commands(), 1);

        let mut out = [0i16; 16];
        renderer.render(&mut out);
        assert_eq!(journal.last_value(EngineParam::Cutoff), Some(0.25));
        assert_eq!(controller.pending_commands(), 0);
    }
}
