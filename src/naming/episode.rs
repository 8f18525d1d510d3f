//! Season/episode inference from free-text titles
//!
//! Titles are matched against an ordered rule table. The first rule that matches wins,
//! so more specific shapes ("S01E05") sit above looser ones (a bare trailing number).
//! Later rules are strictly more permissive; reordering the table changes results.

use crate::types::EpisodeMatch;
use regex::Regex;
use std::sync::LazyLock;
use tracing::error;

/// Where a rule takes its season number from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SeasonSource {
    /// Captured from the title (three captures: series, season, episode)
    Captured,
    /// Not present in the title; season 1 (two captures: series, episode)
    DefaultFirst,
}

/// One entry of the rule table
struct Rule {
    name: &'static str,
    pattern: &'static str,
    season: SeasonSource,
}

const RULES: [Rule; 8] = [
    Rule {
        name: "sxxexx",
        pattern: r"(?i)(.+?)\s+S([0-9]+)E([0-9]+)",
        season: SeasonSource::Captured,
    },
    Rule {
        name: "season-episode",
        pattern: r"(?i)(.+?)\s+Season\s+([0-9]+)\s+Episode\s+([0-9]+)",
        season: SeasonSource::Captured,
    },
    Rule {
        name: "nxnn",
        pattern: r"(?i)(.+?)\s+([0-9]+)x([0-9]+)",
        season: SeasonSource::Captured,
    },
    Rule {
        name: "series-episode",
        pattern: r"(?i)(.+?)\s+Series\s+([0-9]+)\s+Episode\s+([0-9]+)",
        season: SeasonSource::Captured,
    },
    Rule {
        name: "dashed-series-episode",
        pattern: r"(?i)(.+?)\s+-\s+Series\s+([0-9]+)\s+-\s+Episode\s+([0-9]+)",
        season: SeasonSource::Captured,
    },
    Rule {
        name: "dashed-episode",
        pattern: r"(?i)(.+?)\s+-\s+Episode\s+([0-9]+)",
        season: SeasonSource::DefaultFirst,
    },
    Rule {
        name: "episode",
        pattern: r"(?i)(.+?)\s+Episode\s+([0-9]+)",
        season: SeasonSource::DefaultFirst,
    },
    Rule {
        name: "trailing-number",
        pattern: r"(?i)(.+?)\s+([0-9]+)$",
        season: SeasonSource::DefaultFirst,
    },
];

static COMPILED: LazyLock<Vec<(&'static Rule, Regex)>> = LazyLock::new(|| {
    RULES
        .iter()
        .filter_map(|rule| match Regex::new(rule.pattern) {
            Ok(regex) => Some((rule, regex)),
            Err(e) => {
                error!(rule = rule.name, error = %e, "invalid episode rule, skipping");
                None
            }
        })
        .collect()
});

/// Infer `(series, season, episode)` from an upload title
///
/// Returns `None` when no rule matches, in which case callers organise the upload under
/// the channel name instead. The captured series text is trimmed and otherwise left as
/// found. A number too large to represent makes its rule miss, and the next rule is tried.
///
/// # Examples
///
/// ```
/// use tubeshelf::naming::parse_episode;
///
/// let m = parse_episode("Game of Thrones S01E01").unwrap();
/// assert_eq!((m.series.as_str(), m.season, m.episode), ("Game of Thrones", 1, 1));
///
/// assert!(parse_episode("Random Video Title").is_none());
/// ```
pub fn parse_episode(title: &str) -> Option<EpisodeMatch> {
    COMPILED.iter().find_map(|(rule, regex)| {
        let caps = regex.captures(title)?;
        let series = caps.get(1)?.as_str().trim().to_string();

        let (season, episode) = match rule.season {
            SeasonSource::Captured => (
                caps.get(2)?.as_str().parse::<u32>().ok()?,
                caps.get(3)?.as_str().parse::<u32>().ok()?,
            ),
            SeasonSource::DefaultFirst => (1, caps.get(2)?.as_str().parse::<u32>().ok()?),
        };

        Some(EpisodeMatch {
            series,
            season,
            episode,
        })
    })
}
