//! Bridge configuration.
//!
//! A [`Config`] is built once, in a `static`, with `const fn` builders and
//! shared read-only by every instance.
//!
//! # Example
//!
//! ```ignore
//! use obxd_core::{Config, TouchFilter};
//!
//! pub static CONFIG: Config = Config::new("OB-Xd")
//!     .with_octave_range(-4, 4)
//!     .with_touch_filter(TouchFilter::Disabled);
//! ```

use crate::midi::TouchFilter;

/// Default host sample rate.
pub const DEFAULT_SAMPLE_RATE: f32 = 44100.0;

/// Default preset bank capacity.
pub const DEFAULT_PRESET_CAPACITY: usize = 128;

/// Static configuration for a bridge flavour.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// Instrument name reported through the `name` key.
    pub name: &'static str,
    /// Sample rate handed to the engine at creation.
    pub sample_rate: f32,
    /// Polyphony the engine is built with.
    pub max_voices: u32,
    /// Linear gain applied to every rendered sample.
    pub output_gain: f32,
    /// Tempo reported to the engine's play head.
    pub tempo: f32,
    /// Inclusive lower bound of `octave_transpose`.
    pub octave_min: i32,
    /// Inclusive upper bound of `octave_transpose`.
    pub octave_max: i32,
    /// Touch-noise suppression for the internal control surface.
    pub touch_filter: TouchFilter,
    /// Whether CC 123 releases all voices.
    pub all_notes_off_cc: bool,
    /// Factory bank location, relative to the module directory.
    pub factory_bank: &'static str,
    /// Maximum number of programs read from a bank.
    pub preset_capacity: usize,
    /// Voice events (notes, sustain, wheels) held between two blocks.
    /// Parameter writes are coalesced and never count against it.
    pub command_queue_capacity: usize,
}

impl Config {
    /// Create a configuration with the stock Move defaults.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            sample_rate: DEFAULT_SAMPLE_RATE,
            max_voices: 6,
            output_gain: 0.5,
            tempo: 120.0,
            octave_min: -3,
            octave_max: 3,
            touch_filter: TouchFilter::BelowNote(10),
            all_notes_off_cc: true,
            factory_bank: "presets/factory.fxb",
            preset_capacity: DEFAULT_PRESET_CAPACITY,
            command_queue_capacity: 1024,
        }
    }

    pub const fn with_sample_rate(mut self, sample_rate: f32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub const fn with_max_voices(mut self, voices: u32) -> Self {
        self.max_voices = voices;
        self
    }

    pub const fn with_output_gain(mut self, gain: f32) -> Self {
        self.output_gain = gain;
        self
    }

    pub const fn with_tempo(mut self, bpm: f32) -> Self {
        self.tempo = bpm;
        self
    }

    /// Set the inclusive `octave_transpose` bounds.
    ///
    /// # Panics
    /// Panics at compile time if `min > max`.
    pub const fn with_octave_range(mut self, min: i32, max: i32) -> Self {
        assert!(min <= max, "octave range is empty");
        self.octave_min = min;
        self.octave_max = max;
        self
    }

    pub const fn with_touch_filter(mut self, filter: TouchFilter) -> Self {
        self.touch_filter = filter;
        self
    }

    pub const fn with_all_notes_off_cc(mut self, enabled: bool) -> Self {
        self.all_notes_off_cc = enabled;
        self
    }

    pub const fn with_factory_bank(mut self, relative_path: &'static str) -> Self {
        self.factory_bank = relative_path;
        self
    }

    pub const fn with_preset_capacity(mut self, capacity: usize) -> Self {
        self.preset_capacity = capacity;
        self
    }

    /// # Panics
    /// Panics at compile time if `capacity` is zero.
    pub const fn with_command_queue_capacity(mut self, capacity: usize) -> Self {
        assert!(capacity > 0, "command queue needs at least one slot");
        self.command_queue_capacity = capacity;
        self
    }

    /// Clamp an octave offset into the configured range.
    #[inline]
    pub fn clamp_octave(&self, octave: i32) -> i32 {
        octave.clamp(self.octave_min, self.octave_max)
    }
}

/// Stock configuration used by the Move module.
pub static DEFAULT_CONFIG: Config = Config::new("OB-Xd");
