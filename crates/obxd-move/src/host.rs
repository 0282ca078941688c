//! Move host ABI types.
//!
//! Layouts must match the host's `plugin_api_v1.h` / `plugin_api_v2` headers
//! exactly; the host reads these structs through raw pointers.

use std::ffi::{c_char, c_int, c_void};

/// Version reported in [`HostApiV1::api_version`].
pub const MOVE_PLUGIN_API_VERSION: u32 = 1;

/// Version reported in [`PluginApiV2::api_version`].
pub const MOVE_PLUGIN_API_VERSION_2: u32 = 2;

/// Host sample rate.
pub const MOVE_SAMPLE_RATE: c_int = 44100;

/// Host block size in frames.
pub const MOVE_FRAMES_PER_BLOCK: c_int = 128;

/// `source` tag for the Move's own pads and encoders.
pub const MOVE_MIDI_SOURCE_INTERNAL: c_int = 0;

/// `source` tag for USB MIDI input.
pub const MOVE_MIDI_SOURCE_EXTERNAL: c_int = 2;

/// Exported init symbol name.
pub const MOVE_PLUGIN_INIT_V2_SYMBOL: &str = "move_plugin_init_v2";

/// Host log callback.
pub type HostLogFn = unsafe extern "C" fn(msg: *const c_char);

/// Host MIDI send callback.
pub type HostMidiSendFn = unsafe extern "C" fn(msg: *const u8, len: c_int) -> c_int;

/// Services the host offers to a plugin.
#[repr(C)]
#[derive(Debug)]
pub struct HostApiV1 {
    pub api_version: u32,
    pub sample_rate: c_int,
    pub frames_per_block: c_int,
    pub mapped_memory: *mut u8,
    pub audio_out_offset: c_int,
    pub audio_in_offset: c_int,
    pub log: Option<HostLogFn>,
    pub midi_send_internal: Option<HostMidiSendFn>,
    pub midi_send_external: Option<HostMidiSendFn>,
}

/// Opaque instance handle as seen by the host.
pub type InstancePtr = *mut c_void;

/// Instance-based plugin entry table.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct PluginApiV2 {
    pub api_version: u32,
    pub create_instance:
        unsafe extern "C" fn(module_dir: *const c_char, json_defaults: *const c_char) -> InstancePtr,
    pub destroy_instance: unsafe extern "C" fn(instance: InstancePtr),
    pub on_midi:
        unsafe extern "C" fn(instance: InstancePtr, msg: *const u8, len: c_int, source: c_int),
    pub set_param:
        unsafe extern "C" fn(instance: InstancePtr, key: *const c_char, val: *const c_char),
    pub get_param: unsafe extern "C" fn(
        instance: InstancePtr,
        key: *const c_char,
        buf: *mut c_char,
        buf_len: c_int,
    ) -> c_int,
    pub get_error:
        unsafe extern "C" fn(instance: InstancePtr, buf: *mut c_char, buf_len: c_int) -> c_int,
    pub render_block:
        unsafe extern "C" fn(instance: InstancePtr, out_interleaved_lr: *mut i16, frames: c_int),
}

/// Signature of the exported init function.
pub type MovePluginInitV2Fn = unsafe extern "C" fn(host: *const HostApiV1) -> *mut PluginApiV2;
