//! Small string helpers shared by the download pipeline.

/// Keeps the last `max_bytes` bytes of `text`, cut on a char boundary.
///
/// Used to bound the amount of yt-dlp stderr carried in error details.
///
/// ```
/// use grabcore::core::utils::truncate_tail_utf8;
///
/// assert_eq!(truncate_tail_utf8("hello world", 5), "...world");
/// assert_eq!(truncate_tail_utf8("short", 64), "short");
/// ```
pub fn truncate_tail_utf8(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut start = text.len() - max_bytes;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &text[start..])
}

/// Replaces filesystem and header-unsafe characters in a file name.
///
/// ```
/// use grabcore::core::utils::escape_filename;
///
/// assert_eq!(escape_filename("song/name*.mp3"), "song_name_.mp3");
/// ```
pub fn escape_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '<' | '>' | '|' => '_',
            '"' => '\'',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}
