//! Logging utilities for VJX
//!
//! The engine logs under two tracing targets: [`BUILD_TARGET`] for
//! build-side construction and [`PROBE_TARGET`] for probe-phase batch cuts
//! and the terminal unmatched-build drain. The subscriber helpers here wire
//! those targets into the default filter; they compile only with the
//! `logging` feature, so builds without it carry no subscriber code.

/// Target for build-side construction events.
pub const BUILD_TARGET: &str = "vjx::build";

/// Target for probe-phase events.
pub const PROBE_TARGET: &str = "vjx::probe";

#[cfg(feature = "logging")]
mod subscriber {
    use super::{BUILD_TARGET, PROBE_TARGET};
    use tracing_subscriber::{EnvFilter, fmt};

    /// `RUST_LOG` wins when set; otherwise the join targets get `level`
    /// and everything else stays at `warn`.
    fn join_filter(level: &str) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "warn,vjx_core={level},{BUILD_TARGET}={level},{PROBE_TARGET}={level}"
            ))
        })
    }

    /// Initialize logging with default settings: "info" for the join
    /// targets.
    pub fn init() {
        init_with_level("info")
    }

    /// Initialize logging with a specific level for the join targets.
    ///
    /// Thread ids are not emitted: one engine instance runs on one
    /// operator thread, so they carry no signal here.
    pub fn init_with_level(level: &str) {
        fmt()
            .with_env_filter(join_filter(level))
            .with_target(true)
            .with_line_number(true)
            .init();
    }

    /// Initialize logging for tests: "debug" for the join targets, output
    /// captured per test.
    pub fn init_test() {
        let _ = fmt()
            .with_env_filter(join_filter("debug"))
            .with_test_writer()
            .try_init();
    }
}

#[cfg(feature = "logging")]
pub use subscriber::{init, init_test, init_with_level};

// Stub implementations when the logging feature is disabled
#[cfg(not(feature = "logging"))]
pub fn init() {}

#[cfg(not(feature = "logging"))]
pub fn init_with_level(_level: &str) {}

#[cfg(not(feature = "logging"))]
pub fn init_test() {}
