//! Defines per-player resource and timing limits for match execution.
//!
//! The main entry point is the [`LimitsBuilder`] struct, which uses a builder
//! pattern to configure limits:
//!
//! - **Timing limits**:
//!   * Per-move timeout (bounds the worst-case stall to one ply)
//!   * Readiness timeout for the initial handshake
//!   * Grace period between closing a player's input and force-killing it
//! - **Sandbox caps** (enforced only by the sandboxed transport):
//!   * RAM ceiling per player
//!   * Logical CPUs per player
//!   * Maximum number of processes per player
//!
//! Once built, a [`Limits`] object is passed to the match runner or the
//! tournament. Sandbox caps are enforced through Linux cgroups v2; on other
//! platforms only the timing limits apply.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use game_referee::limits::LimitsBuilder;
//!
//! let limits = LimitsBuilder::new()
//!     .with_move_timeout(Duration::from_secs(5))
//!     .with_ready_timeout(Duration::from_secs(10))
//!     .with_ram_per_player(256)
//!     .build()
//!     .unwrap();
//! ```
//!
//! You may also construct limits from environment variables using
//! [`LimitsBuilder::from_env()`] for runtime configurability.

use std::{env, time::Duration};

use anyhow::bail;

const DEFAULT_MOVE_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(5);
const DEFAULT_RAM_MB: usize = 128;
const DEFAULT_MAX_PIDS: usize = 64;

/// A builder for defining player resource and timing limits.
///
/// All limits have defaults: 10 s per move, 10 s to signal readiness, 5 s of
/// shutdown grace, 128 MB of RAM, one CPU and 64 processes per player.
#[derive(Debug, Default)]
pub struct LimitsBuilder {
    move_timeout: Option<Duration>,
    ready_timeout: Option<Duration>,
    stop_grace: Option<Duration>,
    player_ram: Option<usize>,
    cpus_per_player: Option<usize>,
    max_pids: Option<usize>,
}

impl LimitsBuilder {
    /// Creates a new `LimitsBuilder` with every limit at its default.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new `LimitsBuilder` configured from environment variables.
    ///
    /// Read environment variables are:
    /// - `MOVE_TIMEOUT_MS` (u64): per-move reply deadline in milliseconds
    /// - `READY_TIMEOUT_MS` (u64): readiness handshake deadline in milliseconds
    /// - `STOP_GRACE_MS` (u64): shutdown grace period in milliseconds
    /// - `RAM_PER_PLAYER` (usize): RAM ceiling per player in MB
    /// - `CPUS_PER_PLAYER` (usize): logical CPUs per player
    /// - `MAX_PIDS_PER_PLAYER` (usize): process-count cap per player
    #[must_use]
    pub fn from_env() -> Self {
        fn parse_usize(var: &str) -> Option<usize> {
            env::var(var).ok()?.parse().ok()
        }

        fn parse_duration_millis(var: &str) -> Option<Duration> {
            env::var(var)
                .ok()?
                .parse::<u64>()
                .ok()
                .map(Duration::from_millis)
        }

        LimitsBuilder {
            move_timeout: parse_duration_millis("MOVE_TIMEOUT_MS"),
            ready_timeout: parse_duration_millis("READY_TIMEOUT_MS"),
            stop_grace: parse_duration_millis("STOP_GRACE_MS"),
            player_ram: parse_usize("RAM_PER_PLAYER"),
            cpus_per_player: parse_usize("CPUS_PER_PLAYER"),
            max_pids: parse_usize("MAX_PIDS_PER_PLAYER"),
        }
    }

    /// Sets the maximum duration a player may take to answer one move request.
    ///
    /// This is a per-call deadline, not a game clock: a stalled player costs
    /// at most one ply before the match is aborted.
    #[must_use]
    pub fn with_move_timeout(self, duration: Duration) -> Self {
        Self {
            move_timeout: Some(duration),
            ..self
        }
    }

    /// Sets the maximum duration a freshly started player may take to send
    /// its ready signal.
    #[must_use]
    pub fn with_ready_timeout(self, duration: Duration) -> Self {
        Self {
            ready_timeout: Some(duration),
            ..self
        }
    }

    /// Sets how long a stopped player may keep running after its input is
    /// closed before it is forcibly terminated.
    #[must_use]
    pub fn with_stop_grace(self, duration: Duration) -> Self {
        Self {
            stop_grace: Some(duration),
            ..self
        }
    }

    /// Sets the RAM ceiling per player (in MB). Sandboxed transports only.
    #[must_use]
    pub fn with_ram_per_player(self, megabytes: usize) -> Self {
        Self {
            player_ram: Some(megabytes),
            ..self
        }
    }

    /// Sets the number of logical CPUs per player. Sandboxed transports only.
    ///
    /// Default is one.
    #[must_use]
    pub fn with_cpus_per_player(self, count: usize) -> Self {
        Self {
            cpus_per_player: Some(count),
            ..self
        }
    }

    /// Sets the process-count cap per player. Sandboxed transports only.
    #[must_use]
    pub fn with_max_pids(self, count: usize) -> Self {
        Self {
            max_pids: Some(count),
            ..self
        }
    }

    /// Consumes the builder and returns the constructed `Limits`.
    ///
    /// # Errors
    ///
    /// Returns an error when the limits are impossible on this host, e.g. the
    /// per-player RAM ceiling exceeds the currently available memory or more
    /// CPUs per player are requested than physically exist.
    pub fn build(self) -> anyhow::Result<Limits> {
        let player_ram = self.player_ram.unwrap_or(DEFAULT_RAM_MB);

        let mut sys = sysinfo::System::new();
        sys.refresh_memory();
        let available = sys.available_memory() as usize;
        if player_ram.saturating_mul(1_000_000) > available {
            bail!(
                "player RAM ceiling ({player_ram}MB) exceeds available memory ({}MB)",
                available / 1_000_000
            );
        }

        let physical = num_cpus::get_physical();
        let cpus_per_player = self.cpus_per_player.unwrap_or(1);
        if cpus_per_player == 0 || cpus_per_player > physical {
            bail!("cpus per player must be between 1 and {physical}, got {cpus_per_player}");
        }

        Ok(Limits {
            move_timeout: self.move_timeout.unwrap_or(DEFAULT_MOVE_TIMEOUT),
            ready_timeout: self.ready_timeout.unwrap_or(DEFAULT_READY_TIMEOUT),
            stop_grace: self.stop_grace.unwrap_or(DEFAULT_STOP_GRACE),
            player_ram,
            cpus_per_player,
            max_pids: self.max_pids.unwrap_or(DEFAULT_MAX_PIDS),
        })
    }
}

/// Obtained using `LimitsBuilder`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    pub(crate) move_timeout: Duration,
    pub(crate) ready_timeout: Duration,
    pub(crate) stop_grace: Duration,
    /// RAM ceiling per player, in MB.
    pub(crate) player_ram: usize,
    pub(crate) cpus_per_player: usize,
    pub(crate) max_pids: usize,
}

impl Limits {
    /// create a LimitsBuilder
    pub fn builder() -> LimitsBuilder {
        LimitsBuilder::new()
    }

    /// Cpuset string for the player occupying `slot` within a match.
    ///
    /// Slots are pinned to disjoint CPU ranges as long as the host has enough
    /// physical CPUs; beyond that, ranges wrap around.
    pub(crate) fn cpuset_for(&self, slot: usize) -> String {
        let physical = num_cpus::get_physical().max(1);
        let first = (slot * self.cpus_per_player) % physical;
        let last = (first + self.cpus_per_player - 1).min(physical - 1);
        if first == last {
            format!("{first}")
        } else {
            format!("{first}-{last}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let limits = LimitsBuilder::new().build().unwrap();
        assert_eq!(limits.move_timeout, DEFAULT_MOVE_TIMEOUT);
        assert_eq!(limits.ready_timeout, DEFAULT_READY_TIMEOUT);
        assert_eq!(limits.stop_grace, DEFAULT_STOP_GRACE);
        assert_eq!(limits.player_ram, DEFAULT_RAM_MB);
        assert_eq!(limits.cpus_per_player, 1);
    }

    #[test]
    fn zero_cpus_is_rejected() {
        let err = LimitsBuilder::new().with_cpus_per_player(0).build();
        assert!(err.is_err());
    }

    #[test]
    fn cpuset_slots_are_disjoint_with_one_cpu_each() {
        let limits = LimitsBuilder::new().build().unwrap();
        if num_cpus::get_physical() >= 2 {
            assert_ne!(limits.cpuset_for(0), limits.cpuset_for(1));
        }
    }
}
