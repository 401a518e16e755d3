//! Sandboxed transport: the player process runs inside a resource-capped
//! control group.
//!
//! The sandbox enforces the caps configured in [`Limits`](crate::limits):
//! a RAM ceiling, a pid cap and a cpuset per player. It speaks exactly the
//! same line protocol as [`ProcessTransport`](crate::transport::ProcessTransport)
//! and the two are interchangeable behind the [`Transport`] trait.
//!
//! # Linux-Only
//!
//! Cgroups v2 are required. On other platforms (or when the cgroup cannot be
//! created) starting fails, unless the configuration allows unsandboxed
//! execution, in which case the player falls back to a bare subprocess with
//! a warning and only timing limits apply.

use std::path::Path;
use std::process::Child;
use std::time::Duration;

use anyhow::Context;
use tracing::{instrument, trace, warn};

use crate::error::RefereeError;
use crate::limits::Limits;
use crate::message::Message;
use crate::player::PlayerId;
use crate::transport::{shutdown_child, spawn_player, StreamPump, Transport};

/// [`Transport`] over a subprocess confined to a fresh per-player cgroup.
pub struct SandboxTransport {
    player: PlayerId,
    limits: Limits,
    cpuset: String,
    allow_unsandboxed: bool,
    child: Option<Child>,
    pump: Option<StreamPump>,
    cage: Option<cage::PlayerCage>,
}

impl SandboxTransport {
    /// Creates an unstarted sandboxed transport for `player`.
    ///
    /// `slot` is the player's position in the match roster; it selects a
    /// disjoint cpuset so players of one match do not share cores.
    pub fn new(player: PlayerId, limits: &Limits, slot: usize, allow_unsandboxed: bool) -> Self {
        let cpuset = limits.cpuset_for(slot);
        SandboxTransport {
            player,
            limits: limits.clone(),
            cpuset,
            allow_unsandboxed,
            child: None,
            pump: None,
            cage: None,
        }
    }

    fn pump(&mut self) -> Result<&mut StreamPump, RefereeError> {
        self.pump.as_mut().ok_or(RefereeError::Disconnected)
    }
}

impl Transport for SandboxTransport {
    fn player_id(&self) -> &PlayerId {
        &self.player
    }

    #[instrument(skip_all, fields(player = %self.player))]
    fn start(&mut self, executable: &Path) -> anyhow::Result<()> {
        anyhow::ensure!(self.child.is_none(), "transport already started");

        let cage = match cage::PlayerCage::create(&self.limits, &self.cpuset) {
            Ok(cage) => Some(cage),
            Err(e) if self.allow_unsandboxed => {
                warn!(
                    player = %self.player,
                    "sandbox unavailable, running unconfined: {e:#}"
                );
                None
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("could not create sandbox for player {}", self.player)
                })
            }
        };

        let mut child = spawn_player(executable)?;
        if let Some(cage) = &cage {
            if let Err(e) = cage.adopt(child.id()) {
                let _ = child.kill();
                cage.dismantle();
                return Err(e)
                    .with_context(|| format!("could not confine player {}", self.player));
            }
        }

        match StreamPump::attach(&self.player, &mut child) {
            Ok(pump) => {
                self.child = Some(child);
                self.pump = Some(pump);
                self.cage = cage;
                Ok(())
            }
            Err(e) => {
                let _ = child.kill();
                if let Some(cage) = cage {
                    cage.dismantle();
                }
                Err(e)
            }
        }
    }

    fn send(&mut self, message: &Message) -> Result<(), RefereeError> {
        trace!(player = %self.player, line = %message, "send");
        self.pump()?.send(message)
    }

    fn receive(&mut self, timeout: Duration) -> Result<Message, RefereeError> {
        let message = self.pump()?.receive(timeout)?;
        trace!(player = %self.player, line = %message, "received");
        Ok(message)
    }

    fn drain_diagnostics(&mut self) -> Vec<String> {
        self.pump.as_mut().map(StreamPump::drain).unwrap_or_default()
    }

    fn stop(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        // close stdin first so a cooperative player can exit on its own
        self.pump = None;
        shutdown_child(&self.player, &mut child, self.limits.stop_grace);
        if let Some(cage) = self.cage.take() {
            // sweeps up any process the player may have forked
            cage.dismantle();
        }
    }
}

impl Drop for SandboxTransport {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(target_os = "linux")]
mod cage {
    use std::sync::atomic::{AtomicU32, Ordering};

    use anyhow::Context;
    use cgroups_rs::{cgroup_builder::CgroupBuilder, Cgroup, CgroupPid, MaxValue};
    use tracing::warn;

    use crate::limits::Limits;

    /// One freshly created cgroup confining one player process.
    pub(super) struct PlayerCage(Cgroup);

    impl PlayerCage {
        pub(super) fn create(limits: &Limits, cpuset: &str) -> anyhow::Result<PlayerCage> {
            static COUNTER: AtomicU32 = AtomicU32::new(1);
            let user_id = current_user_id().context("could not get user id")?;
            let group_name = format!(
                "GAME_REFEREE_{}",
                COUNTER.fetch_add(1, Ordering::Relaxed)
            );
            let path = format!(
                "user.slice/user-{user_id}.slice/user@{user_id}.service/{group_name}"
            );

            let mut builder = CgroupBuilder::new(&path)
                .memory()
                .memory_hard_limit((limits.player_ram * 1_000_000) as i64)
                .done()
                .pid()
                .maximum_number_of_processes(MaxValue::Value(limits.max_pids as i64))
                .done();
            if !cpuset.is_empty() {
                builder = builder.cpu().cpus(cpuset.to_owned()).done();
            }
            let group = builder
                .build(cgroups_rs::hierarchies::auto())
                .context("could not create cgroup")?;
            Ok(PlayerCage(group))
        }

        pub(super) fn adopt(&self, pid: u32) -> anyhow::Result<()> {
            self.0
                .add_task_by_tgid(CgroupPid { pid: pid as u64 })
                .context("could not add player process to cgroup")
        }

        /// Kills everything left inside, then removes the cgroup.
        pub(super) fn dismantle(&self) {
            if let Err(e) = self.0.kill() {
                warn!("could not kill cgroup members: {e}");
            }
            if let Err(e) = self.0.delete() {
                // If this happens a lot it may slow down the machine.
                warn!("failed to remove cgroup: {e}");
            }
        }
    }

    fn current_user_id() -> anyhow::Result<String> {
        let output = std::process::Command::new("id")
            .arg("-u")
            .output()
            .context("could not launch 'id -u'")?;
        let id = std::str::from_utf8(&output.stdout).context("id is not a valid string")?;
        Ok(id.trim().to_owned())
    }
}

#[cfg(not(target_os = "linux"))]
mod cage {
    use anyhow::bail;

    use crate::limits::Limits;

    /// Stub: cgroups only exist on Linux.
    pub(super) struct PlayerCage;

    impl PlayerCage {
        pub(super) fn create(_limits: &Limits, _cpuset: &str) -> anyhow::Result<PlayerCage> {
            bail!("cgroups are only available on linux")
        }

        pub(super) fn adopt(&self, _pid: u32) -> anyhow::Result<()> {
            Ok(())
        }

        pub(super) fn dismantle(&self) {}
    }
}
