//! Plugin export macro.

/// Export a Move `plugin_api_v2` module.
///
/// This macro generates the `move_plugin_init_v2` entry point the host looks
/// up after `dlopen`. The entry point installs the host logger and returns a
/// static function table whose calls are routed to [`crate::bridge`].
///
/// # Arguments
///
/// * `$descriptor` - A type implementing [`crate::Descriptor`]
///
/// # Example
///
/// ```rust,ignore
/// struct ObxdMove;
///
/// impl obxd_move::Descriptor for ObxdMove {
///     type Engine = SynthEngine;
///     fn config() -> &'static Config { &CONFIG }
///     fn create_engine(_module_dir: &Path) -> Option<SynthEngine> {
///         Some(SynthEngine::new(CONFIG.max_voices))
///     }
/// }
///
/// obxd_move::export_move_plugin!(ObxdMove);
/// ```
#[macro_export]
macro_rules! export_move_plugin {
    ($descriptor:ty) => {
        #[no_mangle]
        pub extern "C" fn move_plugin_init_v2(
            host: *const $crate::host::HostApiV1,
        ) -> *mut $crate::host::PluginApiV2 {
            static API: $crate::host::PluginApiV2 = $crate::bridge::plugin_api::<$descriptor>();

            $crate::bridge::init_host(host);
            ::std::ptr::addr_of!(API).cast_mut()
        }
    };
}
