//! Common test utilities
//!
//! Integration tests drive the orchestrator against a stub `yt-dlp`: a small
//! POSIX shell script written into a temp dir. The preamble parses the
//! arguments the real tool would get and exposes them to the body as shell
//! variables:
//!
//! - `$stem`   output path without extension (from `-o <stem>.%(ext)s`)
//! - `$ext`    `mp3` for audio requests (`-x`), `mp4` otherwise
//! - `$mode`   `download` or `resolve` (`--get-url`)
//! - `$client` `primary`, `android` or `ios` (from the extractor hint)

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use grabcore::{DownloadRequest, Quality, Settings, Strategy};
use tempfile::TempDir;

const PREAMBLE: &str = r#"#!/bin/sh
out=""
mode="download"
client=""
ext="mp4"
prev=""
for arg in "$@"; do
  if [ "$prev" = "-o" ]; then
    out="$arg"
  fi
  case "$arg" in
    --get-url) mode="resolve" ;;
    -x) ext="mp3" ;;
    *player_client=web,android,ios*) client="primary" ;;
    *player_client=android*) client="android" ;;
    *player_client=ios*) client="ios" ;;
  esac
  prev="$arg"
done
stem=$(printf '%s' "$out" | sed 's/\.%(ext)s$//')
"#;

/// Body that behaves like a successful download of 1024 bytes.
pub const SUCCESS_BODY: &str = r#"
echo "[youtube] abc: Downloading webpage"
echo "[download] Destination: $stem.$ext"
echo "[download]  50.0% of 1.00KiB at 1.00KiB/s ETA 00:01"
echo "[download] 100% of 1.00KiB in 00:01"
head -c 1024 /dev/zero > "$stem.$ext"
echo "[Merger] Merging formats into \"$stem.$ext\""
exit 0
"#;

/// Isolated workspace: stub tool plus artifact directory.
pub struct TestEnvironment {
    pub dir: TempDir,
    pub tool: PathBuf,
    pub artifacts: PathBuf,
}

impl TestEnvironment {
    /// Creates the environment with a stub whose body runs after the preamble.
    pub fn with_stub(body: &str) -> Self {
        let dir = TempDir::new().expect("temp dir");
        let artifacts = dir.path().join("artifacts");
        std::fs::create_dir_all(&artifacts).expect("artifact dir");
        let tool = write_stub(dir.path(), "yt-dlp", body);
        Self { dir, tool, artifacts }
    }

    /// Settings pointing at the stub with short timeouts.
    pub fn settings(&self) -> Settings {
        Settings {
            ytdl_bin: self.tool.to_string_lossy().into_owned(),
            temp_dir: self.artifacts.clone(),
            buffered_timeout_secs: 10,
            progressive_timeout_secs: 10,
            strategies: Strategy::default_order(),
            ..Settings::default()
        }
    }

    /// Path inside the environment (outside the artifact dir).
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Files currently left in the artifact dir.
    pub fn leftover_artifacts(&self) -> Vec<PathBuf> {
        std::fs::read_dir(&self.artifacts)
            .map(|entries| entries.flatten().map(|e| e.path()).collect())
            .unwrap_or_default()
    }

    /// Polls until the artifact dir is empty or the timeout elapses.
    pub async fn wait_for_empty_artifacts(&self, timeout: Duration) -> bool {
        wait_until(timeout, || self.leftover_artifacts().is_empty()).await
    }
}

/// Writes an executable stub script and returns its path.
pub fn write_stub(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("{PREAMBLE}{body}")).expect("write stub");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).expect("chmod stub");
    path
}

pub fn video_request(quality: Quality) -> DownloadRequest {
    DownloadRequest::parse("https://www.youtube.com/watch?v=abc", quality, false).expect("valid request")
}

pub fn audio_request() -> DownloadRequest {
    DownloadRequest::parse("https://www.youtube.com/watch?v=abc", Quality::Audio, false).expect("valid request")
}

/// Whether `pid` is still running. Zombies count as gone: an orphan killed
/// by its group signal may linger unreaped where no init process reaps it.
pub fn process_alive(pid: &str) -> bool {
    if let Ok(stat) = std::fs::read_to_string(format!("/proc/{pid}/stat")) {
        // state is the first field after the parenthesized command name
        return stat
            .rsplit(')')
            .next()
            .and_then(|rest| rest.trim_start().chars().next())
            .is_some_and(|state| state != 'Z');
    }
    if std::path::Path::new("/proc/self").exists() {
        return false;
    }
    std::process::Command::new("kill")
        .args(["-0", pid])
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}
