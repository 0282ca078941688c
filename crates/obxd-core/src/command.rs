//! Lock-free control-to-audio command handoff.
//!
//! Parameter writes are coalesced per engine slot: the control side stores
//! the latest value and marks the slot dirty, and the audio side applies
//! every dirty slot once at the start of a block. A burst of writes can
//! therefore never be lost, only merged. Voice events (notes, sustain,
//! wheels) keep their order in a bounded FIFO.
//!
//! Writes made inside a [`Batch`] are published together: a block that
//! starts while a batch is open, or races one, defers all parameter writes
//! to the next block instead of applying half of them.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam::queue::ArrayQueue;

use crate::engine::{Engine, EngineCommand, EngineParam, PARAM_COUNT};

const DIRTY_WORDS: usize = PARAM_COUNT.div_ceil(64);

#[derive(Debug)]
struct Shared {
    values: [AtomicU32; PARAM_COUNT],
    dirty: [AtomicU64; DIRTY_WORDS],
    batch_depth: AtomicUsize,
    batch_epoch: AtomicU64,
    voices: ArrayQueue<EngineCommand>,
    voices_lost: AtomicBool,
    dropped: AtomicU64,
}

/// Command handoff shared by a controller and a renderer.
///
/// Cloning is cheap: shared state is behind an Arc.
#[derive(Debug, Clone)]
pub struct CommandQueue {
    shared: Arc<Shared>,
}

/// Open batch of parameter writes. Published when dropped.
#[derive(Debug)]
#[must_use = "the batch is published as soon as the guard is dropped"]
pub struct Batch {
    shared: Arc<Shared>,
}

impl Drop for Batch {
    fn drop(&mut self) {
        self.shared.batch_epoch.fetch_add(1, Ordering::SeqCst);
        self.shared.batch_depth.fetch_sub(1, Ordering::SeqCst);
    }
}

impl CommandQueue {
    /// `voice_capacity` bounds pending voice events per block.
    ///
    /// # Panics
    /// Panics if `voice_capacity` is zero.
    pub fn new(voice_capacity: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                values: std::array::from_fn(|_| AtomicU32::new(0)),
                dirty: std::array::from_fn(|_| AtomicU64::new(0)),
                batch_depth: AtomicUsize::new(0),
                batch_epoch: AtomicU64::new(0),
                voices: ArrayQueue::new(voice_capacity),
                voices_lost: AtomicBool::new(false),
                dropped: AtomicU64::new(0),
            }),
        }
    }

    /// Enqueue a command.
    ///
    /// Parameter writes always succeed. A voice event returns `false` when
    /// the FIFO is full; the loss is counted and the next drain releases all
    /// notes so nothing is left hanging.
    pub fn push(&self, command: EngineCommand) -> bool {
        if let EngineCommand::SetParameter(slot, value) = command {
            self.set_parameter(slot, value);
            return true;
        }
        if self.shared.voices.push(command).is_err() {
            self.shared.dropped.fetch_add(1, Ordering::Relaxed);
            self.shared.voices_lost.store(true, Ordering::Release);
            return false;
        }
        true
    }

    /// Store the latest value for `slot` and mark it dirty.
    pub fn set_parameter(&self, slot: EngineParam, value: f32) {
        let index = slot.index();
        self.shared.values[index].store(value.to_bits(), Ordering::Relaxed);
        self.shared.dirty[index / 64].fetch_or(1 << (index % 64), Ordering::SeqCst);
    }

    /// Group the following parameter writes so they reach the engine in the
    /// same block.
    pub fn begin_batch(&self) -> Batch {
        self.shared.batch_depth.fetch_add(1, Ordering::SeqCst);
        self.shared.batch_epoch.fetch_add(1, Ordering::SeqCst);
        Batch {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Apply pending work: dirty parameters in ascending slot order, then
    /// voice events in FIFO order. Returns the number of engine calls.
    ///
    /// Never allocates. The voice drain is bounded by the FIFO capacity so a
    /// producer racing the drain cannot stretch a single block.
    pub fn drain_into<E: Engine + ?Sized>(&self, engine: &mut E) -> usize {
        let mut applied = self.drain_parameters(engine);

        let voices = &self.shared.voices;
        for _ in 0..voices.capacity() {
            let Some(command) = voices.pop() else {
                break;
            };
            command.dispatch(engine);
            applied += 1;
        }

        if self.shared.voices_lost.swap(false, Ordering::Acquire) {
            engine.all_notes_off();
            applied += 1;
        }
        applied
    }

    fn drain_parameters<E: Engine + ?Sized>(&self, engine: &mut E) -> usize {
        let shared = &*self.shared;
        let epoch = shared.batch_epoch.load(Ordering::SeqCst);
        if shared.batch_depth.load(Ordering::SeqCst) > 0 {
            return 0;
        }

        let mut taken = [0u64; DIRTY_WORDS];
        for (word, dirty) in taken.iter_mut().zip(&shared.dirty) {
            *word = dirty.swap(0, Ordering::SeqCst);
        }

        let mut staged = [(EngineParam::Undefined, 0.0f32); PARAM_COUNT];
        let mut count = 0;
        for (index, value) in shared.values.iter().enumerate() {
            if taken[index / 64] & (1 << (index % 64)) == 0 {
                continue;
            }
            if let Some(slot) = EngineParam::from_index(index) {
                staged[count] = (slot, f32::from_bits(value.load(Ordering::Relaxed)));
                count += 1;
            }
        }

        // A batch opened after `epoch` was read: hand the slots back.
        if shared.batch_epoch.load(Ordering::SeqCst) != epoch {
            for (word, dirty) in taken.iter().zip(&shared.dirty) {
                if *word != 0 {
                    dirty.fetch_or(*word, Ordering::SeqCst);
                }
            }
            return 0;
        }

        for &(slot, value) in &staged[..count] {
            engine.set_parameter(slot, value);
        }
        count
    }

    /// Dirty parameter slots plus queued voice events.
    pub fn len(&self) -> usize {
        let dirty: u32 = self
            .shared
            .dirty
            .iter()
            .map(|word| word.load(Ordering::Relaxed).count_ones())
            .sum();
        dirty as usize + self.shared.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Voice events lost to a full FIFO since creation.
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockEngine;

    #[test]
    fn test_parameters_then_voices() {
        let queue = CommandQueue::new(4);
        assert!(queue.push(EngineCommand::NoteOn { note: 60, velocity: 1.0 }));
        assert!(queue.push(EngineCommand::SetParameter(EngineParam::Resonance, 0.2)));
        assert!(queue.push(EngineCommand::SetParameter(EngineParam::Cutoff, 0.5)));
        assert_eq!(queue.len(), 3);

        let mut engine = MockEngine::new();
        let journal = engine.journal();
        assert_eq!(queue.drain_into(&mut engine), 3);
        assert!(queue.is_empty());
        assert_eq!(
            journal.commands(),
            [
                EngineCommand::SetParameter(EngineParam::Cutoff, 0.5),
                EngineCommand::SetParameter(EngineParam::Resonance, 0.2),
                EngineCommand::NoteOn { note: 60, velocity: 1.0 },
            ]
        );
    }

    #[test]
    fn test_parameter_bursts_coalesce() {
        let queue = CommandQueue::new(1);
        for i in 0..5000 {
            queue.set_parameter(EngineParam::Cutoff, i as f32 / 5000.0);
        }
        queue.set_parameter(EngineParam::SelfOscPush, 1.0);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.dropped(), 0);

        let mut engine = MockEngine::new();
        let journal = engine.journal();
        assert_eq!(queue.drain_into(&mut engine), 2);
        assert_eq!(journal.last_value(EngineParam::Cutoff), Some(4999.0 / 5000.0));
        assert_eq!(journal.last_value(EngineParam::SelfOscPush), Some(1.0));
    }

    #[test]
    fn test_voice_overflow_releases_notes() {
        let queue = CommandQueue::new(1);
        assert!(queue.push(EngineCommand::NoteOn { note: 60, velocity: 1.0 }));
        assert!(!queue.push(EngineCommand::NoteOff(60)));
        assert_eq!(queue.dropped(), 1);

        let mut engine = MockEngine::new();
        let journal = engine.journal();
        queue.drain_into(&mut engine);
        assert_eq!(
            journal.commands(),
            [
                EngineCommand::NoteOn { note: 60, velocity: 1.0 },
                EngineCommand::AllNotesOff,
            ]
        );

        journal.clear();
        queue.drain_into(&mut engine);
        assert!(journal.is_empty());
    }

    #[test]
    fn test_open_batch_defers_parameters() {
        let queue = CommandQueue::new(4);
        let mut engine = MockEngine::new();
        let journal = engine.journal();

        let batch = queue.begin_batch();
        queue.set_parameter(EngineParam::Cutoff, 0.1);
        queue.push(EngineCommand::Sustain(true));
        queue.drain_into(&mut engine);
        assert_eq!(journal.commands(), [EngineCommand::Sustain(true)]);
        assert_eq!(queue.len(), 1);

        queue.set_parameter(EngineParam::Resonance, 0.3);
        drop(batch);
        journal.clear();
        assert_eq!(queue.drain_into(&mut engine), 2);
        assert_eq!(
            journal.commands(),
            [
                EngineCommand::SetParameter(EngineParam::Cutoff, 0.1),
                EngineCommand::SetParameter(EngineParam::Resonance, 0.3),
            ]
        );
    }

    #[test]
    fn test_nested_batches() {
        let queue = CommandQueue::new(4);
        let mut engine = MockEngine::new();
        let outer = queue.begin_batch();
        let inner = queue.begin_batch();
        queue.set_parameter(EngineParam::Volume, 0.5);
        drop(inner);
        assert_eq!(queue.drain_into(&mut engine), 0);
        drop(outer);
        assert_eq!(queue.drain_into(&mut engine), 1);
    }

    #[test]
    fn test_clones_share_state() {
        let producer = CommandQueue::new(8);
        let consumer = producer.clone();
        producer.push(EngineCommand::Sustain(true));
        producer.set_parameter(EngineParam::Tune, 0.5);

        let mut engine = MockEngine::new();
        assert_eq!(consumer.drain_into(&mut engine), 2);
        assert!(producer.is_empty());
    }
}
