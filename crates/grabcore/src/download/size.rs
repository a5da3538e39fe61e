//! Human-readable size tokens from yt-dlp output ("10.00MiB", "~1.2GB", "500KiB/s").

/// Unit suffixes and their byte factors. Binary units first so "MiB" never
/// gets compared as "MB".
const UNITS: &[(&str, u64)] = &[
    ("KiB", 1 << 10),
    ("MiB", 1 << 20),
    ("GiB", 1 << 30),
    ("TiB", 1 << 40),
    ("KB", 1_000),
    ("MB", 1_000_000),
    ("GB", 1_000_000_000),
    ("TB", 1_000_000_000_000),
    ("B", 1),
];

/// Parses a size token into bytes.
///
/// Unknown units count as bytes; anything without a leading number is `0`.
/// Never fails.
///
/// ```
/// use grabcore::download::size::parse_size;
///
/// assert_eq!(parse_size("1.5MiB"), 1_572_864);
/// assert_eq!(parse_size("~2.00GB"), 2_000_000_000);
/// assert_eq!(parse_size("NA"), 0);
/// ```
pub fn parse_size(token: &str) -> u64 {
    let token = token.trim().trim_start_matches('~').trim_end_matches("/s").trim();

    let split = token
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(token.len());
    let (number, unit) = token.split_at(split);

    let value = match number.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => v,
        _ => return 0,
    };

    let unit = unit.trim();
    let factor = UNITS
        .iter()
        .find(|(suffix, _)| suffix.eq_ignore_ascii_case(unit))
        .map(|(_, factor)| *factor)
        .unwrap_or(1);

    (value * factor as f64).round() as u64
}
