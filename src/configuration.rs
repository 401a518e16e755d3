//! Config for the referee behaviors
//!
//! This module provides configuration options for controlling the behavior of
//! match and tournament execution.
//!
//! Configuration can be created programmatically using [`Configuration::new()`]
//! or by reading environment variables using [`Configuration::from_env()`].
//!
//! # Environment Variables
//!
//! The following environment variables can be used to override configuration
//! values. All values are optional, and case-insensitive. Set the value to
//! `"true"` to enable a flag.
//!
//! - `REFEREE_VERBOSE` — Print game progress to stdout (default: `true`)
//! - `REFEREE_LOG` — Enable logging to a file (default: `false`)
//! - `REFEREE_SANDBOXED` — Run players inside resource-capped cgroups (default: `false`)
//! - `REFEREE_ALLOW_UNSANDBOXED` — Fall back to a bare process when the sandbox is unavailable (default: `false`)
//! - `REFEREE_SHOW_PLAYER_STDERR` — Print player diagnostic output for debugging (default: `false`)

/// Configuration for referee behaviors.
#[derive(Debug, Clone, Copy)]
pub struct Configuration {
    pub(crate) verbose: bool,
    pub(crate) log: bool,
    pub(crate) sandboxed: bool,
    pub(crate) allow_unsandboxed: bool,
    pub(crate) show_player_stderr: bool,
}

impl Configuration {
    /// Create a new configuration with default parameters.
    ///
    /// By default:
    /// - Game progress is printed to stdout.
    /// - Logging to file is disabled.
    /// - Players run as bare subprocesses (no sandbox).
    /// - Unsandboxed fallback is not allowed.
    /// - Player stderr output is not printed (it is still drained and logged).
    pub fn new() -> Self {
        Self {
            verbose: true,
            log: false,
            sandboxed: false,
            allow_unsandboxed: false,
            show_player_stderr: false,
        }
    }

    /// Create configuration from environment variables.
    ///
    /// Any unrecognized value (including unset) results in the default value
    /// for that field. See the module documentation for the variable list.
    pub fn from_env() -> Self {
        fn get_env_flag(var: &str, default: bool) -> bool {
            match std::env::var(var) {
                Ok(val) => val.eq_ignore_ascii_case("true"),
                Err(_) => default,
            }
        }

        Self {
            verbose: get_env_flag("REFEREE_VERBOSE", true),
            log: get_env_flag("REFEREE_LOG", false),
            sandboxed: get_env_flag("REFEREE_SANDBOXED", false),
            allow_unsandboxed: get_env_flag("REFEREE_ALLOW_UNSANDBOXED", false),
            show_player_stderr: get_env_flag("REFEREE_SHOW_PLAYER_STDERR", false),
        }
    }

    /// Enable or disable printing game progress to stdout.
    pub fn with_verbose(mut self, value: bool) -> Self {
        self.verbose = value;
        self
    }

    /// Enable or disable logging to file.
    pub fn with_log(mut self, value: bool) -> Self {
        self.log = value;
        self
    }

    /// Enable or disable running players inside resource-capped cgroups.
    ///
    /// Sandboxing requires Linux with cgroups v2; see the sandbox transport
    /// for what is enforced.
    pub fn with_sandboxed(mut self, value: bool) -> Self {
        self.sandboxed = value;
        self
    }

    /// Enable or disable falling back to a bare subprocess when the sandbox
    /// cannot be created.
    ///
    /// Only consulted when sandboxing is enabled. When disallowed, a failed
    /// sandbox creation is a match setup error.
    pub fn with_allow_unsandboxed(mut self, value: bool) -> Self {
        self.allow_unsandboxed = value;
        self
    }

    /// Enable or disable printing player stderr output (debug purposes only).
    pub fn with_show_player_stderr(mut self, value: bool) -> Self {
        self.show_player_stderr = value;
        self
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::new()
    }
}
