//! yt-dlp stderr analysis
//!
//! Two separate questions are answered here:
//! - per line, while the process runs: does this line mean the attempt is dead?
//!   (`classify_line`, driven by an ordered signature table)
//! - after the fact, on the collected stderr: what kind of failure was it?
//!   (`analyze_ytdlp_error`, used for suggestions and logging)

/// Verdict for a single stderr line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineVerdict {
    /// Diagnostic noise, keep reading
    Benign,
    /// The current attempt has failed; stop it now
    Fatal,
}

/// One entry in the signature table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureRule {
    pub token: &'static str,
    pub verdict: LineVerdict,
}

/// Ordered signature table. The first rule whose token occurs in a line wins,
/// so a warning that quotes an error message stays benign.
pub const SIGNATURE_RULES: &[SignatureRule] = &[
    SignatureRule {
        token: "WARNING",
        verdict: LineVerdict::Benign,
    },
    SignatureRule {
        token: "ERROR",
        verdict: LineVerdict::Fatal,
    },
];

/// Classifies one stderr line against `SIGNATURE_RULES`.
pub fn classify_line(line: &str) -> LineVerdict {
    classify_with(SIGNATURE_RULES, line)
}

/// Classifies one stderr line against an arbitrary rule table.
pub fn classify_with(rules: &[SignatureRule], line: &str) -> LineVerdict {
    rules
        .iter()
        .find(|rule| line.contains(rule.token))
        .map(|rule| rule.verdict)
        .unwrap_or(LineVerdict::Benign)
}

/// Strips the `ERROR:` prefix from a fatal line.
pub fn fatal_message(line: &str) -> &str {
    let line = line.trim();
    line.strip_prefix("ERROR:").map(str::trim).unwrap_or(line)
}

/// yt-dlp failure kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum YtDlpErrorType {
    /// Site asks for sign-in / cookies
    InvalidCookies,
    /// Site detected automated access (HTTP 403, extraction blocked)
    BotDetection,
    /// Private, removed or region-locked media
    VideoUnavailable,
    /// The URL is not handled by any extractor
    UnsupportedUrl,
    /// Timeouts, DNS, connection resets
    NetworkError,
    Unknown,
}

/// Analyzes yt-dlp stderr and determines the failure kind.
pub fn analyze_ytdlp_error(stderr: &str) -> YtDlpErrorType {
    let stderr_lower = stderr.to_lowercase();

    if stderr_lower.contains("cookies are no longer valid")
        || stderr_lower.contains("cookies have likely been rotated")
        || stderr_lower.contains("sign in to confirm you're not a bot")
        || stderr_lower.contains("please sign in")
        || stderr_lower.contains("use --cookies-from-browser")
        || stderr_lower.contains("use --cookies for the authentication")
    {
        return YtDlpErrorType::InvalidCookies;
    }

    if stderr_lower.contains("bot detection")
        || stderr_lower.contains("http error 403")
        || stderr_lower.contains("unable to extract")
        || stderr_lower.contains("signature extraction failed")
    {
        return YtDlpErrorType::BotDetection;
    }

    if stderr_lower.contains("private video")
        || stderr_lower.contains("video unavailable")
        || stderr_lower.contains("this video is not available")
        || stderr_lower.contains("video is private")
        || stderr_lower.contains("video has been removed")
        || stderr_lower.contains("this video does not exist")
        || stderr_lower.contains("not available in your country")
    {
        return YtDlpErrorType::VideoUnavailable;
    }

    if stderr_lower.contains("unsupported url") {
        return YtDlpErrorType::UnsupportedUrl;
    }

    if stderr_lower.contains("timed out")
        || stderr_lower.contains("timeout")
        || stderr_lower.contains("connection")
        || stderr_lower.contains("network")
        || stderr_lower.contains("socket")
        || stderr_lower.contains("dns")
        || stderr_lower.contains("failed to connect")
    {
        return YtDlpErrorType::NetworkError;
    }

    YtDlpErrorType::Unknown
}

/// Actionable hint shown to the client next to the error message.
pub fn suggestion_for(error_type: YtDlpErrorType) -> &'static str {
    match error_type {
        YtDlpErrorType::InvalidCookies => {
            "The site requires sign-in for this media. Try again later or use a publicly available link."
        }
        YtDlpErrorType::BotDetection => {
            "The site blocked the request. Wait a few minutes and retry, or update yt-dlp on the server."
        }
        YtDlpErrorType::VideoUnavailable => {
            "The media is private, removed or region-locked. Check that the link opens in a browser."
        }
        YtDlpErrorType::UnsupportedUrl => "This site is not supported. Paste a direct link to a video page.",
        YtDlpErrorType::NetworkError => "Network problem while contacting the site. Retry in a minute.",
        YtDlpErrorType::Unknown => "Check that the link is correct and try a lower quality or audio only.",
    }
}
