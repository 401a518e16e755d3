//! Shell-script player fixtures for integration tests.
//!
//! Players are tiny `/bin/sh` scripts written into a temp directory: they
//! speak the real line protocol over stdin/stdout, which exercises the
//! transports end to end without needing prebuilt binaries.
#![allow(dead_code)] // each test binary uses a different subset of fixtures

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

use tempfile::TempDir;

/// Installs a stdout subscriber when `REFEREE_TEST_LOG=true`, to watch a
/// test run live.
pub fn init_test_logging() {
    let enabled = std::env::var("REFEREE_TEST_LOG")
        .is_ok_and(|v| v.eq_ignore_ascii_case("true"));
    if enabled {
        let subscriber = tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(tracing::Level::TRACE)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

pub struct PlayerScripts {
    dir: TempDir,
}

impl PlayerScripts {
    pub fn new() -> Self {
        init_test_logging();
        PlayerScripts {
            dir: TempDir::new().expect("could not create temp dir"),
        }
    }

    pub fn write(&self, name: &str, body: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, body).expect("could not write player script");
        let mut perms = fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).unwrap();
        path
    }

    /// Signals ready, then answers every `your_turn` with the same move.
    pub fn constant_mover(&self, name: &str, mv: &str) -> PathBuf {
        self.write(
            name,
            &format!(
                r#"#!/bin/sh
echo '{{"status": "ready"}}'
while read line; do
    case "$line" in
        *game_over*) exit 0 ;;
        *your_turn*) echo '{{"move": "{mv}"}}' ;;
    esac
done
"#
            ),
        )
    }

    /// Signals ready, then plays the given integer cells in order.
    pub fn scripted_mover(&self, name: &str, moves: &[u32]) -> PathBuf {
        let list = moves
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(" ");
        self.write(
            name,
            &format!(
                r#"#!/bin/sh
set -- {list}
echo '{{"status": "ready"}}'
while read line; do
    case "$line" in
        *game_over*) exit 0 ;;
        *your_turn*) echo "{{\"move\": $1}}"; shift ;;
    esac
done
"#
            ),
        )
    }

    /// Signals ready, then echoes every received line verbatim.
    pub fn echo_player(&self, name: &str) -> PathBuf {
        self.write(
            name,
            r#"#!/bin/sh
echo '{"status": "ready"}'
while read line; do
    echo "$line"
done
"#,
        )
    }

    /// Signals ready, then sleeps through every `your_turn` before replying.
    pub fn sleeper(&self, name: &str, seconds: u32) -> PathBuf {
        self.write(
            name,
            &format!(
                r#"#!/bin/sh
echo '{{"status": "ready"}}'
while read line; do
    case "$line" in
        *game_over*) exit 0 ;;
        *your_turn*) sleep {seconds}; echo '{{"move": "C"}}' ;;
    esac
done
"#
            ),
        )
    }

    /// Opens with something that is not a ready signal, then idles.
    pub fn never_ready(&self, name: &str) -> PathBuf {
        self.write(
            name,
            r#"#!/bin/sh
echo '{"status": "warming_up"}'
while read line; do
    :
done
"#,
        )
    }
}
