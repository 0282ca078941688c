//! Recording engine for tests.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::engine::{Engine, EngineCommand, EngineParam};

/// One call observed by [`MockEngine`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EngineCall {
    SampleRate(f32),
    PlayHead { bpm: f32, position: f32 },
    Command(EngineCommand),
}

/// Shared view of the calls a [`MockEngine`] received.
///
/// Survives the engine being moved into an instance or renderer.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<EngineCall>>>);

impl Journal {
    fn lock(&self) -> MutexGuard<'_, Vec<EngineCall>> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn push(&self, call: EngineCall) {
        self.lock().push(call);
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.lock().clone()
    }

    pub fn commands(&self) -> Vec<EngineCommand> {
        self.lock()
            .iter()
            .filter_map(|call| match call {
                EngineCall::Command(command) => Some(*command),
                _ => None,
            })
            .collect()
    }

    /// Every parameter write, in order.
    pub fn parameter_writes(&self) -> Vec<(EngineParam, f32)> {
        self.commands()
            .into_iter()
            .filter_map(|command| match command {
                EngineCommand::SetParameter(param, value) => Some((param, value)),
                _ => None,
            })
            .collect()
    }

    /// Most recent value written to `param`.
    pub fn last_value(&self, param: EngineParam) -> Option<f32> {
        self.parameter_writes()
            .into_iter()
            .rev()
            .find(|(p, _)| *p == param)
            .map(|(_, value)| value)
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Engine double producing a constant stereo sample.
#[derive(Debug, Default)]
pub struct MockEngine {
    journal: Journal,
    output: (f32, f32),
    pub samples_rendered: usize,
}

impl MockEngine {
    /// A silent engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// An engine producing `(left, right)` for every sample.
    pub fn with_output(left: f32, right: f32) -> Self {
        Self {
            output: (left, right),
            ..Self::default()
        }
    }

    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }
}

impl Engine for MockEngine {
    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.journal.push(EngineCall::SampleRate(sample_rate));
    }

    fn set_play_head(&mut self, bpm: f32, position: f32) {
        self.journal.push(EngineCall::PlayHead { bpm, position });
    }

    fn set_parameter(&mut self, param: EngineParam, value: f32) {
        self.journal
            .push(EngineCall::Command(EngineCommand::SetParameter(param, value)));
    }

    fn note_on(&mut self, note: u8, velocity: f32) {
        self.journal
            .push(EngineCall::Command(EngineCommand::NoteOn { note, velocity }));
    }

    fn note_off(&mut self, note: u8) {
        self.journal.push(EngineCall::Command(EngineCommand::NoteOff(note)));
    }

    fn sustain_on(&mut self) {
        self.journal.push(EngineCall::Command(EngineCommand::Sustain(true)));
    }

    fn sustain_off(&mut self) {
        self.journal.push(EngineCall::Command(EngineCommand::Sustain(false)));
    }

    fn pitch_wheel(&mut self, value: f32) {
        self.journal.push(EngineCall::Command(EngineCommand::PitchWheel(value)));
    }

    fn mod_wheel(&mut self, value: f32) {
        self.journal.push(EngineCall::Command(EngineCommand::ModWheel(value)));
    }

    fn all_notes_off(&mut self) {
        self.journal.push(EngineCall::Command(EngineCommand::AllNotesOff));
    }

    fn process_sample(&mut self) -> (f32, f32) {
        self.samples_rendered += 1;
        self.output
    }
}
