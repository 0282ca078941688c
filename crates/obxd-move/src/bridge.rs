//! C-ABI bridge for the Move `plugin_api_v2` table.
//!
//! # Architecture
//!
//! ```text
//! Move host
//!        ↓ (plugin_api_v2 calls)
//! bridge.rs (this module)
//!        ↓
//! InstanceHandle { Mutex<Controller>, Mutex<Renderer<E>> }
//!        ↓
//! obxd_core::Engine
//! ```
//!
//! Control calls lock only the controller and leave engine commands on the
//! instance's lock-free queue. `render_block` locks only the renderer, with
//! `try_lock`, and applies those commands before rendering. The audio thread
//! therefore never waits on a control caller.
//!
//! # Safety
//!
//! All functions use `std::panic::catch_unwind` to prevent panics from
//! crossing the FFI boundary. Pointers are validated before dereferencing.
//! Failures are reported as null handles, `-1`, or a silent block.

// These are C-ABI entry points called by the host through a function table.
// The host is responsible for passing valid pointers.
#![allow(clippy::not_unsafe_ptr_arg_deref)]

use std::ffi::{c_char, c_int, CStr};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::ptr;
use std::sync::{Mutex, MutexGuard, PoisonError};

use obxd_core::{
    render_silence, Config, Controller, Engine, Instance, MidiSource, ParamError, Renderer,
};

use crate::host::{HostApiV1, InstancePtr, PluginApiV2, MOVE_PLUGIN_API_VERSION_2};

// =============================================================================
// Descriptor
// =============================================================================

/// Binds an engine implementation and its configuration to the host ABI.
///
/// # Example
///
/// ```ignore
/// struct ObxdMove;
///
/// impl Descriptor for ObxdMove {
///     type Engine = SynthEngine;
///     fn config() -> &'static Config { &DEFAULT_CONFIG }
///     fn create_engine(_module_dir: &Path) -> Option<SynthEngine> {
///         Some(SynthEngine::new(DEFAULT_CONFIG.max_voices))
///     }
/// }
///
/// obxd_move::export_move_plugin!(ObxdMove);
/// ```
pub trait Descriptor: 'static {
    type Engine: Engine;

    fn config() -> &'static Config;

    /// Construct a fresh engine. `None` makes `create_instance` return null.
    fn create_engine(module_dir: &Path) -> Option<Self::Engine>;
}

// =============================================================================
// Macros
// =============================================================================

/// Safely execute code with an instance handle, handling null checks and panics.
///
/// # Usage
///
/// ```ignore
/// with_instance!(instance, D::Engine, default_value, |handle| {
///     // Your code here, with `handle` as &InstanceHandle<D::Engine>
/// })
/// ```
macro_rules! with_instance {
    ($instance:expr, $engine:ty, $default:expr, |$handle:ident| $body:expr) => {{
        if $instance.is_null() {
            return $default;
        }
        catch_unwind(AssertUnwindSafe(|| {
            // SAFETY: non-null handles are only ever produced by
            // `create_instance` and remain valid until `destroy_instance`.
            let $handle = unsafe { &*($instance as *const InstanceHandle<$engine>) };
            $body
        }))
        .unwrap_or($default)
    }};
}

/// Variant of `with_instance!` for functions that return `()`.
macro_rules! with_instance_void {
    ($instance:expr, $engine:ty, |$handle:ident| $body:expr) => {{
        if $instance.is_null() {
            return;
        }
        let _ = catch_unwind(AssertUnwindSafe(|| {
            // SAFETY: non-null handles are only ever produced by
            // `create_instance` and remain valid until `destroy_instance`.
            let $handle = unsafe { &*($instance as *const InstanceHandle<$engine>) };
            $body
        }));
    }};
}

// =============================================================================
// Instance Handle
// =============================================================================

/// Heap-allocated state behind an opaque host handle.
pub struct InstanceHandle<E: Engine> {
    controller: Mutex<Controller>,
    renderer: Mutex<Renderer<E>>,
}

impl<E: Engine> InstanceHandle<E> {
    fn new(instance: Instance<E>) -> Self {
        let (controller, renderer) = instance.split();
        Self {
            controller: Mutex::new(controller),
            renderer: Mutex::new(renderer),
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Lock the controller. A poisoned lock is recovered: controller state is
/// plain data and stays consistent between calls.
fn lock_controller<E: Engine>(handle: &InstanceHandle<E>) -> MutexGuard<'_, Controller> {
    handle
        .controller
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

/// Borrow a C string argument as UTF-8.
///
/// # Safety
///
/// `ptr` must be null or point to a NUL-terminated string that outlives `'a`.
unsafe fn str_arg<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    // SAFETY: validated non-null above; NUL termination is the caller's contract.
    unsafe { CStr::from_ptr(ptr) }.to_str().ok()
}

/// Copy `s` and a NUL terminator into `buf`.
///
/// Returns the string length, or `-1` when `buf` is null or too small.
///
/// # Safety
///
/// `buf` must be null or writable for `buf_len` bytes.
unsafe fn copy_str_to_buffer(s: &str, buf: *mut c_char, buf_len: c_int) -> c_int {
    let bytes = s.as_bytes();
    let Ok(capacity) = usize::try_from(buf_len) else {
        return -1;
    };
    if buf.is_null() || bytes.len() >= capacity {
        return -1;
    }
    let Ok(len) = c_int::try_from(bytes.len()) else {
        return -1;
    };
    // SAFETY: `buf` is non-null and holds `capacity > bytes.len()` bytes.
    unsafe {
        ptr::copy_nonoverlapping(bytes.as_ptr(), buf.cast::<u8>(), bytes.len());
        *buf.add(bytes.len()) = 0;
    }
    len
}

/// Interleaved output buffer for `frames` stereo frames.
///
/// # Safety
///
/// `out` must be null or writable for `2 * frames` samples.
unsafe fn output_block<'a>(out: *mut i16, frames: c_int) -> Option<&'a mut [i16]> {
    let frames = usize::try_from(frames).ok()?;
    if out.is_null() || frames == 0 {
        return None;
    }
    // SAFETY: validated non-null; the host provides `2 * frames` samples.
    Some(unsafe { std::slice::from_raw_parts_mut(out, frames * 2) })
}

// =============================================================================
// Host Entry Points
// =============================================================================

/// Create an instance.
///
/// # Safety
///
/// - `module_dir` must be null or a valid NUL-terminated path string
/// - `json_defaults` must be null or a valid NUL-terminated string
/// - Returns null if the engine cannot be created or construction panics
pub extern "C" fn create_instance<D: Descriptor>(
    module_dir: *const c_char,
    json_defaults: *const c_char,
) -> InstancePtr {
    let result = catch_unwind(|| {
        // SAFETY: pointer validity is the host's contract, checked for null.
        let module_dir = unsafe { str_arg(module_dir) }.unwrap_or_default();
        // SAFETY: as above.
        let json_defaults = unsafe { str_arg(json_defaults) };

        let Some(engine) = D::create_engine(Path::new(module_dir)) else {
            log::error!("{}: engine construction failed", D::config().name);
            return ptr::null_mut();
        };
        let instance = Instance::create(module_dir, json_defaults, engine, D::config());
        Box::into_raw(Box::new(InstanceHandle::new(instance))).cast()
    });
    result.unwrap_or(ptr::null_mut())
}

/// Destroy an instance.
///
/// # Safety
///
/// - `instance` must be a pointer returned by `create_instance`, or null
/// - `instance` must not be used after this call
pub extern "C" fn destroy_instance<D: Descriptor>(instance: InstancePtr) {
    if instance.is_null() {
        return;
    }
    let _ = catch_unwind(AssertUnwindSafe(|| {
        // SAFETY: `instance` came from `Box::into_raw` in `create_instance`
        // and the host relinquishes it here.
        drop(unsafe { Box::from_raw(instance.cast::<InstanceHandle<D::Engine>>()) });
        log::info!("{}: instance destroyed", D::config().name);
    }));
}

/// Deliver one MIDI message.
///
/// # Safety
///
/// - `instance` must be a valid handle or null
/// - `msg` must be null or readable for `len` bytes
pub extern "C" fn on_midi<D: Descriptor>(
    instance: InstancePtr,
    msg: *const u8,
    len: c_int,
    source: c_int,
) {
    let Ok(len) = usize::try_from(len) else {
        return;
    };
    if msg.is_null() {
        return;
    }

    with_instance_void!(instance, D::Engine, |handle| {
        // SAFETY: validated non-null; the host provides `len` readable bytes.
        let bytes = unsafe { std::slice::from_raw_parts(msg, len) };
        lock_controller(handle).on_midi(bytes, MidiSource::from_tag(source));
    })
}

/// Write a parameter key.
///
/// # Safety
///
/// - `instance` must be a valid handle or null
/// - `key` and `val` must be null or valid NUL-terminated strings
pub extern "C" fn set_param<D: Descriptor>(
    instance: InstancePtr,
    key: *const c_char,
    val: *const c_char,
) {
    with_instance_void!(instance, D::Engine, |handle| {
        // SAFETY: pointer validity is the host's contract, checked for null.
        let (Some(key), Some(val)) = (unsafe { str_arg(key) }, unsafe { str_arg(val) }) else {
            return;
        };
        match lock_controller(handle).set_param(key, val) {
            Ok(()) => {}
            Err(ParamError::NotFound) => log::debug!("set_param: unknown key {key}"),
            Err(err) => log::debug!("set_param {key}={val}: {err}"),
        }
    })
}

/// Read a parameter key into `buf`.
///
/// Returns the value length, or `-1` if the key is unknown or the value does
/// not fit in `buf_len` bytes including the terminator.
///
/// # Safety
///
/// - `instance` must be a valid handle or null
/// - `key` must be null or a valid NUL-terminated string
/// - `buf` must be null or writable for `buf_len` bytes
pub extern "C" fn get_param<D: Descriptor>(
    instance: InstancePtr,
    key: *const c_char,
    buf: *mut c_char,
    buf_len: c_int,
) -> c_int {
    with_instance!(instance, D::Engine, -1, |handle| {
        // SAFETY: pointer validity is the host's contract, checked for null.
        let Some(key) = (unsafe { str_arg(key) }) else {
            return -1;
        };
        let Some(value) = lock_controller(handle).get_param(key) else {
            return -1;
        };
        // SAFETY: `buf_len` bytes of `buf` are writable per the host contract.
        unsafe { copy_str_to_buffer(&value, buf, buf_len) }
    })
}

/// Copy the last resource error into `buf`.
///
/// Returns the message length, `0` when there is no error, or `-1` when the
/// message does not fit.
///
/// # Safety
///
/// - `instance` must be a valid handle or null
/// - `buf` must be null or writable for `buf_len` bytes
pub extern "C" fn get_error<D: Descriptor>(
    instance: InstancePtr,
    buf: *mut c_char,
    buf_len: c_int,
) -> c_int {
    with_instance!(instance, D::Engine, 0, |handle| {
        let controller = lock_controller(handle);
        match controller.last_error() {
            // SAFETY: `buf_len` bytes of `buf` are writable per the host contract.
            Some(message) => unsafe { copy_str_to_buffer(message, buf, buf_len) },
            None => {
                // SAFETY: as above.
                unsafe { copy_str_to_buffer("", buf, buf_len) };
                0
            }
        }
    })
}

/// Render `frames` interleaved stereo frames.
///
/// Fills the block with silence when the handle is null, the renderer is busy
/// on another thread, or rendering panics.
///
/// # Safety
///
/// - `instance` must be a valid handle or null
/// - `out` must be null or writable for `2 * frames` samples
pub extern "C" fn render_block<D: Descriptor>(instance: InstancePtr, out: *mut i16, frames: c_int) {
    // SAFETY: `2 * frames` samples are writable per the host contract.
    let Some(block) = (unsafe { output_block(out, frames) }) else {
        return;
    };
    if instance.is_null() {
        render_silence(block);
        return;
    }

    let rendered = catch_unwind(AssertUnwindSafe(|| {
        // SAFETY: non-null handles are only ever produced by `create_instance`
        // and remain valid until `destroy_instance`.
        let handle = unsafe { &*(instance as *const InstanceHandle<D::Engine>) };
        match handle.renderer.try_lock() {
            Ok(mut renderer) => {
                renderer.render(block);
                true
            }
            Err(_) => false,
        }
    }));

    if !matches!(rendered, Ok(true)) {
        // SAFETY: as above; the previous borrow ended with the closure.
        if let Some(block) = unsafe { output_block(out, frames) } {
            render_silence(block);
        }
    }
}

// =============================================================================
// Registration
// =============================================================================

/// The `plugin_api_v2` table for descriptor `D`.
pub const fn plugin_api<D: Descriptor>() -> PluginApiV2 {
    PluginApiV2 {
        api_version: MOVE_PLUGIN_API_VERSION_2,
        create_instance: create_instance::<D>,
        destroy_instance: destroy_instance::<D>,
        on_midi: on_midi::<D>,
        set_param: set_param::<D>,
        get_param: get_param::<D>,
        get_error: get_error::<D>,
        render_block: render_block::<D>,
    }
}

/// Hook the host's services. Called from `move_plugin_init_v2`.
///
/// # Safety
///
/// `host` must be null or point to a host table valid for the module lifetime.
pub fn init_host(host: *const HostApiV1) {
    if host.is_null() {
        return;
    }
    // SAFETY: validated non-null; the host keeps the table alive.
    let host = unsafe { &*host };
    if let Some(log_fn) = host.log {
        crate::logger::install(log_fn);
    }
    log::info!(
        "Plugin API v{} ready (host API v{}, {} Hz, {} frames)",
        MOVE_PLUGIN_API_VERSION_2,
        host.api_version,
        host.sample_rate,
        host.frames_per_block
    );
}
