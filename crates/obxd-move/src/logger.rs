//! `log` sink that forwards records to the host's log callback.

use std::ffi::CString;
use std::sync::OnceLock;

use log::{LevelFilter, Log, Metadata, Record};

use crate::host::HostLogFn;

/// Prefix added to every forwarded line.
const LOG_PREFIX: &str = "[obxd]";

/// Longest line handed to the host, prefix included.
const MAX_LINE: usize = 255;

/// Forwards `log` records to the host.
pub struct HostLogger {
    sink: HostLogFn,
}

impl HostLogger {
    fn line(record: &Record<'_>) -> String {
        let mut line = match record.level() {
            log::Level::Error | log::Level::Warn => {
                format!("{LOG_PREFIX} {}: {}", record.level(), record.args())
            }
            _ => format!("{LOG_PREFIX} {}", record.args()),
        };
        if line.len() > MAX_LINE {
            let mut end = MAX_LINE;
            while !line.is_char_boundary(end) {
                end -= 1;
            }
            line.truncate(end);
        }
        line.retain(|c| c != '\0');
        line
    }
}

impl Log for HostLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        if let Ok(line) = CString::new(Self::line(record)) {
            // SAFETY: the host guarantees its log callback stays valid for the
            // lifetime of the loaded module, and `line` is NUL-terminated.
            unsafe { (self.sink)(line.as_ptr()) };
        }
    }

    fn flush(&self) {}
}

static LOGGER: OnceLock<HostLogger> = OnceLock::new();

/// Install the host logger once. Later calls, and calls after another logger
/// was installed, are ignored.
pub fn install(sink: HostLogFn) {
    let logger = LOGGER.get_or_init(|| HostLogger { sink });
    if log::set_logger(logger).is_ok() {
        let level = if cfg!(debug_assertions) {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        };
        log::set_max_level(level);
    }
}
