//! Engine log forwarding into the `log` facade.
//!
//! One engine sink per severity band:
//!
//! ```text
//!  DEBUG        ──▸ log::debug!
//!  INFO1..INFO4 ──▸ log::info!
//!  WARN1..WARN4 ──▸ log::warn!
//!  ERR1..ERR4   ──▸ log::error!
//!  FATAL        ──▸ log::error!("fatal: ..")
//! ```

use std::ffi::{c_char, CStr};

use geobridge_core::error::check_c_string;
use geobridge_core::{Boundary, LogMask, LogSink, Result};

const TARGET: &str = "engine";

/// # Safety
///
/// `message` must be null or a valid nul-terminated string.
unsafe fn line<'a>(message: *const c_char) -> std::borrow::Cow<'a, str> {
    if message.is_null() {
        return std::borrow::Cow::Borrowed("");
    }
    CStr::from_ptr(message).to_string_lossy()
}

unsafe extern "C" fn sink_debug(message: *const c_char) {
    log::debug!(target: TARGET, "{}", line(message));
}

unsafe extern "C" fn sink_info(message: *const c_char) {
    log::info!(target: TARGET, "{}", line(message));
}

unsafe extern "C" fn sink_warn(message: *const c_char) {
    log::warn!(target: TARGET, "{}", line(message));
}

unsafe extern "C" fn sink_error(message: *const c_char) {
    log::error!(target: TARGET, "{}", line(message));
}

unsafe extern "C" fn sink_fatal(message: *const c_char) {
    log::error!(target: TARGET, "fatal: {}", line(message));
}

const BANDS: [(LogMask, LogSink); 5] = [
    (LogMask::DEBUG, sink_debug),
    (LogMask::INFO1, sink_info),
    (LogMask::WARN1, sink_warn),
    (LogMask::ERR1, sink_error),
    (LogMask::FATAL, sink_fatal),
];

/// Replace the engine's sinks with forwarding sinks and set its global
/// mask. Sinks are process-wide on the engine side.
pub fn install_log_forwarding(boundary: &Boundary, mask: LogMask) -> Result<()> {
    boundary.call(|e| e.log_clear_sinks())?;
    boundary.call(|e| e.log_set_mask(mask.0))?;
    for (band, sink) in BANDS {
        boundary.call(|e| e.log_add_sink(band.0, sink))?;
    }
    Ok(())
}

/// Write one line into the engine log at `level`.
pub fn engine_log(boundary: &Boundary, level: LogMask, message: &str) -> Result<()> {
    check_c_string(message)?;
    boundary.engine().log(level.0, message);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use geobridge_core::BridgeError;
    use geobridge_sim::SimEngine;

    #[test]
    fn test_null_line_is_empty() {
        assert_eq!(unsafe { line(std::ptr::null()) }, "");
    }

    #[test]
    fn test_every_band_covered_once() {
        let mut seen = 0u32;
        for (band, _) in BANDS {
            assert_eq!(seen & band.0, 0);
            seen |= band.0;
        }
        assert_eq!(seen, LogMask::ALL.0);
    }

    #[test]
    fn test_forwarding_installs_and_logs() {
        let boundary = Boundary::new(Arc::new(SimEngine::new()));
        install_log_forwarding(&boundary, LogMask::ALL).unwrap();
        engine_log(&boundary, LogMask::WARN1, "terrain cache full").unwrap();
        assert_eq!(
            engine_log(&boundary, LogMask::INFO1, "a\0b"),
            Err(BridgeError::InvalidString)
        );
    }
}
