/// Sanitize a string for use as a single path segment.
///
/// Strips the characters that are invalid in filenames and trims surrounding
/// whitespace. The result may be empty; re-applying the function is a no-op.
pub fn sanitize_filename(input: &str) -> String {
    const INVALID_CHARS: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

    input
        .chars()
        .filter(|c| !INVALID_CHARS.contains(c) && *c >= ' ')
        .collect::<String>()
        .trim()
        .to_string()
}

/// Format a byte count in human-readable form for log output.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{} {}", bytes, UNITS[unit])
    } else {
        format!("{:.2} {}", size, UNITS[unit])
    }
}
