//! Logging shim. Exactly one of the `log`/`defmt` features may be enabled;
//! with neither, every call compiles away to nothing. Mirrors the
//! single-macro-per-level dispatch common in vendor HAL crates' own trace
//! macros.

#[cfg(all(feature = "defmt", feature = "log"))]
compile_error!("You may not enable both `defmt` and `log` features.");

/// Emits a trace-level log line, or does nothing if neither `log` nor
/// `defmt` is enabled.
#[macro_export]
macro_rules! storage_trace {
    ($($arg:tt)*) => {{
        #[cfg(feature = "log")]
        { log::trace!($($arg)*); }
        #[cfg(feature = "defmt")]
        { defmt::trace!($($arg)*); }
        #[cfg(all(not(feature = "log"), not(feature = "defmt")))]
        { let _ = ($($arg)*,); }
    }};
}

/// Emits a debug-level log line, or does nothing if neither `log` nor
/// `defmt` is enabled.
#[macro_export]
macro_rules! storage_debug {
    ($($arg:tt)*) => {{
        #[cfg(feature = "log")]
        { log::debug!($($arg)*); }
        #[cfg(feature = "defmt")]
        { defmt::debug!($($arg)*); }
        #[cfg(all(not(feature = "log"), not(feature = "defmt")))]
        { let _ = ($($arg)*,); }
    }};
}

/// Emits an info-level log line, or does nothing if neither `log` nor
/// `defmt` is enabled.
#[macro_export]
macro_rules! storage_info {
    ($($arg:tt)*) => {{
        #[cfg(feature = "log")]
        { log::info!($($arg)*); }
        #[cfg(feature = "defmt")]
        { defmt::info!($($arg)*); }
        #[cfg(all(not(feature = "log"), not(feature = "defmt")))]
        { let _ = ($($arg)*,); }
    }};
}

/// Emits a warn-level log line, or does nothing if neither `log` nor
/// `defmt` is enabled.
#[macro_export]
macro_rules! storage_warn {
    ($($arg:tt)*) => {{
        #[cfg(feature = "log")]
        { log::warn!($($arg)*); }
        #[cfg(feature = "defmt")]
        { defmt::warn!($($arg)*); }
        #[cfg(all(not(feature = "log"), not(feature = "defmt")))]
        { let _ = ($($arg)*,); }
    }};
}

/// Emits an error-level log line, or does nothing if neither `log` nor
/// `defmt` is enabled.
#[macro_export]
macro_rules! storage_error {
    ($($arg:tt)*) => {{
        #[cfg(feature = "log")]
        { log::error!($($arg)*); }
        #[cfg(feature = "defmt")]
        { defmt::error!($($arg)*); }
        #[cfg(all(not(feature = "log"), not(feature = "defmt")))]
        { let _ = ($($arg)*,); }
    }};
}
