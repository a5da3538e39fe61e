//! Common test utilities
//!
//! The router is exercised in-process with `tower::ServiceExt::oneshot`
//! against an orchestrator whose yt-dlp is a small shell stub.

#![allow(dead_code)]

use std::path::PathBuf;

use axum::body::{to_bytes, Body};
use axum::http::Response;
use axum::Router;
use grabcore::{Orchestrator, Settings, Strategy};
use grabserver::{router, AppState};
use tempfile::TempDir;

const PREAMBLE: &str = r#"#!/bin/sh
out=""
mode="download"
ext="mp4"
prev=""
for arg in "$@"; do
  if [ "$prev" = "-o" ]; then
    out="$arg"
  fi
  case "$arg" in
    --get-url) mode="resolve" ;;
    -x) ext="mp3" ;;
  esac
  prev="$arg"
done
stem=$(printf '%s' "$out" | sed 's/\.%(ext)s$//')
"#;

pub const SUCCESS_BODY: &str = r#"
echo "[download]  50.0% of 2.00KiB at 1.00KiB/s ETA 00:01"
echo "[download] 100% of 2.00KiB in 00:02"
head -c 2048 /dev/zero > "$stem.$ext"
exit 0
"#;

pub const FALLBACK_BODY: &str = r#"
if [ "$mode" = "resolve" ]; then
  echo "https://cdn.example.com/video.mp4"
  exit 0
fi
echo "ERROR: [youtube] abc: HTTP Error 403: Forbidden" >&2
exit 1
"#;

pub const FAILING_BODY: &str = r#"
echo "ERROR: [youtube] abc: Video unavailable" >&2
exit 1
"#;

pub const ENCODED_URL: &str = "https%3A%2F%2Fwww.youtube.com%2Fwatch%3Fv%3Dabc";

/// Stub tool, artifact dir and the router built on top of them.
pub struct TestServer {
    pub dir: TempDir,
    pub artifacts: PathBuf,
    pub app: Router,
}

impl TestServer {
    pub fn with_stub(body: &str) -> Self {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().expect("temp dir");
        let artifacts = dir.path().join("artifacts");
        std::fs::create_dir_all(&artifacts).expect("artifact dir");

        let tool = dir.path().join("yt-dlp");
        std::fs::write(&tool, format!("{PREAMBLE}{body}")).expect("write stub");
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).expect("chmod stub");

        let settings = Settings {
            ytdl_bin: tool.to_string_lossy().into_owned(),
            temp_dir: artifacts.clone(),
            buffered_timeout_secs: 10,
            progressive_timeout_secs: 10,
            strategies: Strategy::default_order(),
            ..Settings::default()
        };
        let orchestrator = Orchestrator::new(settings).expect("orchestrator");
        let app = router(AppState { orchestrator });

        Self { dir, artifacts, app }
    }

    pub fn leftover_artifacts(&self) -> Vec<PathBuf> {
        std::fs::read_dir(&self.artifacts)
            .map(|entries| entries.flatten().map(|e| e.path()).collect())
            .unwrap_or_default()
    }
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX).await.expect("body").to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).expect("json body")
}
