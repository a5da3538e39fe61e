//! yt-dlp argument construction.
//!
//! Everything here is a pure mapping to an argument vector. The request URL
//! is always a discrete argument after `--`, never part of a shell string.

use std::fmt;

use crate::download::request::{DownloadRequest, Strategy};
use crate::download::temp::ArtifactStem;

/// Browser identity sent by the primary strategy.
pub const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Extra headers sent by the primary strategy, in `Name:Value` form for `--add-header`.
pub const BROWSER_HEADERS: &[&str] = &[
    "Accept:text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
    "Accept-Language:en-US,en;q=0.9",
    "Sec-Fetch-Mode:navigate",
    "Sec-Fetch-Site:none",
    "Sec-Fetch-Dest:document",
    "Upgrade-Insecure-Requests:1",
];

/// A program plus its argument vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Value following the first occurrence of `flag`, for tests and logs.
    pub fn value_of(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }
}

/// Log-friendly rendering; arguments containing spaces are quoted.
impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.contains(char::is_whitespace) {
                write!(f, " {:?}", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Format selection expression for a request.
///
/// Video: capped-height video merged with best audio, falling back to a
/// single stream at or below the cap. Audio: best audio stream.
pub fn format_selector(request: &DownloadRequest) -> String {
    if request.wants_audio() {
        return "bestaudio/best".to_string();
    }
    let height = request.quality().height();
    format!("bestvideo[height<={height}]+bestaudio/best[height<={height}]")
}

/// Identity/client profile arguments for a strategy.
fn strategy_args(strategy: Strategy) -> Vec<String> {
    let mut args = Vec::new();
    if strategy == Strategy::Primary {
        args.push("--user-agent".to_string());
        args.push(BROWSER_USER_AGENT.to_string());
        for header in BROWSER_HEADERS {
            args.push("--add-header".to_string());
            args.push((*header).to_string());
        }
    }
    args.push("--extractor-args".to_string());
    args.push(format!("youtube:player_client={}", strategy.player_clients()));
    args
}

/// Format and post-processing arguments.
fn media_args(request: &DownloadRequest) -> Vec<String> {
    let mut args = vec!["-f".to_string(), format_selector(request)];
    if request.wants_audio() {
        args.extend(["-x", "--audio-format", "mp3", "--audio-quality", "0"].map(String::from));
    } else {
        args.extend(["--merge-output-format", "mp4"].map(String::from));
    }
    args
}

/// Full download invocation writing to `<stem>.<ext>`.
pub fn build_download_command(
    program: &str,
    request: &DownloadRequest,
    strategy: Strategy,
    stem: &ArtifactStem,
) -> Invocation {
    Invocation::new(program)
        .arg("-o")
        .arg(stem.output_template())
        .args(["--newline", "--no-playlist", "--no-mtime", "--force-overwrites"])
        .args(["--socket-timeout", "30", "--retries", "3", "--fragment-retries", "10"])
        .args(media_args(request))
        .args(strategy_args(strategy))
        .arg("--")
        .arg(request.url().as_str())
}

/// URL-resolve invocation: prints direct media URLs (one per line), downloads nothing.
pub fn build_resolve_command(program: &str, request: &DownloadRequest, strategy: Strategy) -> Invocation {
    Invocation::new(program)
        .args(["--get-url", "--no-playlist", "--no-warnings"])
        .args(["--socket-timeout", "30"])
        .arg("-f")
        .arg(format_selector(request))
        .args(strategy_args(strategy))
        .arg("--")
        .arg(request.url().as_str())
}
