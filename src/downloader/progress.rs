//! Parsing of yt-dlp console output

/// Progress template passed to `--progress-template`
///
/// Produces one line per update: `download:<percent>|<rate>|<eta>`.
pub const PROGRESS_TEMPLATE: &str =
    "download:%(progress._percent_str)s|%(progress._speed_str)s|%(progress._eta_str)s";

/// One parsed progress update
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressLine {
    /// Percent complete (0.0 to 100.0)
    pub percent: f32,
    /// Transfer rate, e.g. "2.50MiB/s"
    pub rate: Option<String>,
    /// Remaining time, e.g. "00:42"
    pub eta: Option<String>,
}

/// Parse a progress line
///
/// Accepts both the [`PROGRESS_TEMPLATE`] form and yt-dlp's default
/// `[download]  45.2% of 10.00MiB at 2.50MiB/s ETA 00:42` form. Any other line yields `None`.
pub fn parse_progress_line(line: &str) -> Option<ProgressLine> {
    let line = line.trim();

    if let Some(rest) = line.strip_prefix("download:") {
        let mut fields = rest.split('|');
        let percent = parse_percent(fields.next()?)?;
        let rate = fields.next().and_then(known_value);
        let eta = fields.next().and_then(known_value);
        return Some(ProgressLine { percent, rate, eta });
    }

    let rest = line.strip_prefix("[download]")?;
    let mut words = rest.split_whitespace();
    let percent = parse_percent(words.next()?)?;

    let mut rate = None;
    let mut eta = None;
    while let Some(word) = words.next() {
        match word {
            "at" => rate = words.next().and_then(known_value),
            "ETA" => eta = words.next().and_then(known_value),
            _ => {}
        }
    }
    Some(ProgressLine { percent, rate, eta })
}

/// Extract the output path from a destination or merge announcement
pub fn parse_destination_line(line: &str) -> Option<String> {
    let line = line.trim();

    if let Some(rest) = line.strip_prefix("[download] Destination:") {
        let path = rest.trim();
        if !path.is_empty() {
            return Some(path.to_string());
        }
    }

    if let Some(rest) = line.strip_prefix("[Merger] Merging formats into \"") {
        let path = rest.trim_end_matches('"');
        if !path.is_empty() {
            return Some(path.to_string());
        }
    }

    if let Some(rest) = line.strip_prefix("[download] ")
        && let Some(path) = rest.strip_suffix(" has already been downloaded")
        && !path.is_empty()
    {
        return Some(path.to_string());
    }

    None
}

fn parse_percent(field: &str) -> Option<f32> {
    let field = field.trim();
    let number = field.strip_suffix('%')?;
    let percent: f32 = number.trim().parse().ok()?;
    Some(percent.clamp(0.0, 100.0))
}

fn known_value(field: &str) -> Option<String> {
    let field = field.trim();
    match field {
        "" | "N/A" | "NA" | "Unknown" | "Unknown B/s" | "Unknown ETA" => None,
        _ => Some(field.to_string()),
    }
}
