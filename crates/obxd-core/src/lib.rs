//! # obxd-core
//!
//! Control bridge for the OB-Xd polyphonic synthesizer.
//!
//! This crate sits between a plugin host and an opaque synthesis engine. It
//! owns the string-keyed parameter protocol, the factory preset bank, MIDI
//! decoding and the 16-bit render loop. The engine is reached only through
//! the [`Engine`] trait.
//!
//! ## Architecture
//!
//! ```text
//! Host (set_param / get_param / on_midi)      Host (render_block)
//!        ↓                                           ↓
//! Controller ── CommandQueue (lock-free) ──→  Renderer<E>
//!   ParameterVector, PresetBank,                    ↓
//!   surface banks, state JSON                 E: Engine
//! ```
//!
//! [`Instance`] keeps both halves together and applies every control call
//! immediately. [`Instance::split`] hands them to separate threads.

pub mod command;
pub mod config;
pub mod control;
pub mod engine;
pub mod error;
pub mod instance;
pub mod keys;
pub mod metadata;
pub mod midi;
pub mod parameter_format;
pub mod parameter_info;
pub mod preset;
pub mod render;
pub mod surface;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use command::CommandQueue;
pub use config::{Config, DEFAULT_CONFIG};
pub use control::Controller;
pub use engine::{Engine, EngineCommand, EngineParam, ParameterVector, PARAM_COUNT};
pub use error::{BridgeError, ParamError, Result};
pub use instance::{Instance, Renderer};
pub use keys::ControlKey;
pub use midi::{MidiSource, TouchFilter};
pub use parameter_info::{ParameterDescriptor, ParameterKind, SHADOW_PARAMETERS};
pub use preset::{PresetBank, PresetRecord};
pub use render::render_silence;
