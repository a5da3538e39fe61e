//! yt-dlp stdout parsing.
//!
//! `parse_line` is pure and works on one complete line. `ProgressParser`
//! sits in front of it and turns arbitrary read chunks into lines, so a
//! progress line split across two reads is still seen exactly once.

use lazy_regex::regex_captures;

use crate::download::events::ProgressEvent;
use crate::download::size::parse_size;

/// Line prefixes yt-dlp prints while post-processing.
const POSTPROCESS_MARKERS: &[&str] = &[
    "[Merger]",
    "[ExtractAudio]",
    "[FixupM3u8]",
    "[FixupM4a]",
    "[FixupStretched]",
    "[VideoConvertor]",
    "[VideoRemuxer]",
    "[ffmpeg]",
];

/// Parses one stdout line into at most one event.
///
/// Recognizes `[download]  42.5% of 10.00MiB at 1.00MiB/s ETA 00:05` style
/// lines and post-processing markers; everything else yields `None`.
pub fn parse_line(line: &str) -> Option<ProgressEvent> {
    let line = line.trim();
    if line.starts_with("[download]") {
        return parse_download_line(line);
    }
    if line.contains("Merging formats") || POSTPROCESS_MARKERS.iter().any(|marker| line.starts_with(marker)) {
        return Some(ProgressEvent::processing());
    }
    None
}

fn parse_download_line(line: &str) -> Option<ProgressEvent> {
    let Some((_, percent)) = regex_captures!(r"^\[download\]\s+(\d+(?:\.\d+)?)%", line) else {
        // "[download] Destination: ...", "[download] ... has already been downloaded"
        tracing::trace!("download line without percent: {}", line);
        return None;
    };
    let percent = percent.parse::<f64>().ok()?.clamp(0.0, 100.0);

    let parts: Vec<&str> = line.split_whitespace().collect();
    let mut total = None;
    let mut speed = None;
    let mut eta_seconds = None;

    for (i, part) in parts.iter().enumerate() {
        let Some(value) = value_after(&parts, i) else {
            continue;
        };
        match *part {
            // "of 10.00MiB", "of ~ 10.00MiB"
            "of" => total = Some(parse_size(value)).filter(|&bytes| bytes > 0),
            // "at 500.00KiB/s", "at Unknown B/s"
            "at" => speed = Some(parse_size(value)).filter(|&bytes| bytes > 0),
            // "ETA 00:10", "ETA 1:02:03"
            "ETA" => eta_seconds = parse_eta(value),
            _ => {}
        }
    }

    let downloaded = total.map(|bytes| (bytes as f64 * percent / 100.0).round() as u64);

    Some(ProgressEvent::Progress {
        message: format!("Downloading... {:.1}%", percent),
        progress: percent,
        downloaded,
        total,
        speed,
        eta_seconds,
    })
}

/// Token following `parts[i]`, skipping a detached `~` estimate marker.
fn value_after<'a>(parts: &[&'a str], i: usize) -> Option<&'a str> {
    match parts.get(i + 1).copied() {
        Some("~") => parts.get(i + 2).copied(),
        other => other,
    }
}

/// Parses ETA strings like "00:10", "1:23" or "1:02:03" into seconds.
fn parse_eta(eta: &str) -> Option<u64> {
    let mut seconds = 0u64;
    let mut fields = 0;
    for field in eta.split(':') {
        seconds = seconds.checked_mul(60)?.checked_add(field.parse::<u64>().ok()?)?;
        fields += 1;
    }
    (2..=3).contains(&fields).then_some(seconds)
}

/// Longest unterminated line kept; bytes past it are discarded until the next break.
pub const MAX_PENDING_BYTES: usize = 64 * 1024;

/// Splits a byte stream into lines on `\n` or `\r`.
///
/// Bytes are buffered (not `str`) so a multi-byte character split across two
/// reads is decoded only once complete. An unterminated line is capped at
/// `MAX_PENDING_BYTES`.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk and returns every line it completed (empty lines dropped).
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n' || b == b'\r') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&raw[..raw.len() - 1]);
            let text = text.trim_end();
            if !text.is_empty() {
                lines.push(text.to_string());
            }
        }
        if self.pending.len() > MAX_PENDING_BYTES {
            self.pending.truncate(MAX_PENDING_BYTES);
        }
        lines
    }

    /// Returns the unterminated tail, if any, at end of stream.
    pub fn finish(&mut self) -> Option<String> {
        let raw = std::mem::take(&mut self.pending);
        let text = String::from_utf8_lossy(&raw).trim_end().to_string();
        (!text.is_empty()).then_some(text)
    }
}

/// Per-attempt stdout parser: line buffering plus `parse_line`.
#[derive(Debug, Default)]
pub struct ProgressParser {
    lines: LineBuffer,
}

impl ProgressParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one read chunk, returns the events of every line it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<ProgressEvent> {
        self.lines.push(chunk).iter().filter_map(|line| parse_line(line)).collect()
    }

    /// Flushes a trailing line without newline at end of stream.
    pub fn finish(&mut self) -> Option<ProgressEvent> {
        self.lines.finish().and_then(|line| parse_line(&line))
    }
}
