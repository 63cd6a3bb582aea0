//! Logging abstraction
//!
//! Provides unified logging macros that work across different targets:
//! - Embedded (`defmt` feature): Uses defmt
//! - Hosted (`log` feature): Uses the `log` facade
//! - Host tests without a backend: Uses println!
//! - Otherwise: No-op (arguments are still type-checked)
//!
//! The macros are crate-internal; downstream code logs through its own
//! backend of choice.

/// Log informational message
macro_rules! log_info {
    ($($arg:tt)*) => {{
        #[cfg(feature = "defmt")]
        ::defmt::info!($($arg)*);

        #[cfg(all(not(feature = "defmt"), feature = "log"))]
        ::log::info!($($arg)*);

        #[cfg(all(not(feature = "defmt"), not(feature = "log"), test))]
        println!("[INFO] {}", format!($($arg)*));

        #[cfg(all(not(feature = "defmt"), not(feature = "log"), not(test)))]
        let _ = format_args!($($arg)*);
    }};
}

/// Log warning message
macro_rules! log_warn {
    ($($arg:tt)*) => {{
        #[cfg(feature = "defmt")]
        ::defmt::warn!($($arg)*);

        #[cfg(all(not(feature = "defmt"), feature = "log"))]
        ::log::warn!($($arg)*);

        #[cfg(all(not(feature = "defmt"), not(feature = "log"), test))]
        println!("[WARN] {}", format!($($arg)*));

        #[cfg(all(not(feature = "defmt"), not(feature = "log"), not(test)))]
        let _ = format_args!($($arg)*);
    }};
}

/// Log error message
macro_rules! log_error {
    ($($arg:tt)*) => {{
        #[cfg(feature = "defmt")]
        ::defmt::error!($($arg)*);

        #[cfg(all(not(feature = "defmt"), feature = "log"))]
        ::log::error!($($arg)*);

        #[cfg(all(not(feature = "defmt"), not(feature = "log"), test))]
        eprintln!("[ERROR] {}", format!($($arg)*));

        #[cfg(all(not(feature = "defmt"), not(feature = "log"), not(test)))]
        let _ = format_args!($($arg)*);
    }};
}

/// Log debug message
macro_rules! log_debug {
    ($($arg:tt)*) => {{
        #[cfg(feature = "defmt")]
        ::defmt::debug!($($arg)*);

        #[cfg(all(not(feature = "defmt"), feature = "log"))]
        ::log::debug!($($arg)*);

        #[cfg(all(not(feature = "defmt"), not(feature = "log"), test))]
        println!("[DEBUG] {}", format!($($arg)*));

        #[cfg(all(not(feature = "defmt"), not(feature = "log"), not(test)))]
        let _ = format_args!($($arg)*);
    }};
}

/// Log trace message
#[allow(unused_macros)]
macro_rules! log_trace {
    ($($arg:tt)*) => {{
        #[cfg(feature = "defmt")]
        ::defmt::trace!($($arg)*);

        #[cfg(all(not(feature = "defmt"), feature = "log"))]
        ::log::trace!($($arg)*);

        #[cfg(all(not(feature = "defmt"), not(feature = "log"), test))]
        println!("[TRACE] {}", format!($($arg)*));

        #[cfg(all(not(feature = "defmt"), not(feature = "log"), not(test)))]
        let _ = format_args!($($arg)*);
    }};
}
