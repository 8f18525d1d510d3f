//! Filter chain: recency, title pattern, duration, excluded keywords
//!
//! Stages run in that fixed order, each over the survivors of the previous one. Every
//! stage is a pure predicate over a [`CandidateItem`]; a stage with nothing configured
//! passes everything through. Drop reasons are for diagnostics only.

pub mod fuzzy;

pub use fuzzy::partial_ratio;

use crate::config::FiltersConfig;
use crate::types::CandidateItem;
use chrono::{NaiveDateTime, TimeDelta};
use serde::Serialize;
use tracing::{debug, info};

/// A stage of the filter chain
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterStage {
    /// Upload age within the configured window
    Recency,
    /// Title contains, or fuzzily matches, a configured pattern
    TitlePattern,
    /// Duration within configured bounds (unknown duration always passes)
    Duration,
    /// Title and description free of excluded keywords
    ExcludeKeywords,
}

impl FilterStage {
    /// All stages in evaluation order
    pub const ORDER: [FilterStage; 4] = [
        FilterStage::Recency,
        FilterStage::TitlePattern,
        FilterStage::Duration,
        FilterStage::ExcludeKeywords,
    ];

    /// Machine-readable stage name used in events
    pub fn name(&self) -> &'static str {
        match self {
            FilterStage::Recency => "recency",
            FilterStage::TitlePattern => "title_pattern",
            FilterStage::Duration => "duration",
            FilterStage::ExcludeKeywords => "exclude_keywords",
        }
    }

    /// Human-readable stage name used in logs
    pub fn label(&self) -> &'static str {
        match self {
            FilterStage::Recency => "Upload date filter",
            FilterStage::TitlePattern => "Title pattern filter",
            FilterStage::Duration => "Duration filter",
            FilterStage::ExcludeKeywords => "Exclude keywords filter",
        }
    }
}

/// Outcome of one stage for one item
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// Item passes
    Keep,
    /// Item is dropped, with the reason
    Drop(String),
}

impl Verdict {
    /// Whether the item passes
    pub fn is_keep(&self) -> bool {
        matches!(self, Verdict::Keep)
    }
}

/// Per-stage pass counts from one [`FilterChain::apply`] call
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StageCount {
    /// The stage
    pub stage: FilterStage,
    /// Items that passed
    pub kept: usize,
    /// Items that entered
    pub total: usize,
}

/// Result of running the whole chain
#[derive(Clone, Debug)]
pub struct FilterOutcome {
    /// Items that passed every stage, in input order
    pub kept: Vec<CandidateItem>,
    /// Counts for each active stage
    pub stages: Vec<StageCount>,
}

/// The configured filter chain
#[derive(Clone, Debug)]
pub struct FilterChain {
    config: FiltersConfig,
}

impl FilterChain {
    /// Build a chain from validated filter settings
    pub fn new(config: FiltersConfig) -> Self {
        Self { config }
    }

    /// Whether a stage has anything configured
    pub fn is_active(&self, stage: FilterStage) -> bool {
        match stage {
            FilterStage::Recency => self.config.upload_window_days > 0,
            FilterStage::TitlePattern => !self.config.title_patterns.is_empty(),
            FilterStage::Duration => {
                self.config.min_duration_minutes.is_some()
                    || self.config.max_duration_minutes.is_some()
            }
            FilterStage::ExcludeKeywords => !self.config.exclude_keywords.is_empty(),
        }
    }

    /// Judge one item against one stage, with `now` as the reference time
    pub fn evaluate(&self, stage: FilterStage, item: &CandidateItem, now: NaiveDateTime) -> Verdict {
        if !self.is_active(stage) {
            return Verdict::Keep;
        }
        match stage {
            FilterStage::Recency => self.check_recency(item, now),
            FilterStage::TitlePattern => self.check_title(item),
            FilterStage::Duration => self.check_duration(item),
            FilterStage::ExcludeKeywords => self.check_keywords(item),
        }
    }

    /// Run every stage in order over `items`
    pub fn apply(&self, items: Vec<CandidateItem>, now: NaiveDateTime) -> FilterOutcome {
        info!("Starting to filter {} videos", items.len());
        let initial = items.len();

        let mut kept = items;
        let mut stages = Vec::new();
        for stage in FilterStage::ORDER {
            if !self.is_active(stage) {
                continue;
            }
            let total = kept.len();
            kept.retain(|item| match self.evaluate(stage, item, now) {
                Verdict::Keep => true,
                Verdict::Drop(reason) => {
                    debug!(video_id = %item.id, title = %item.title, %reason, "filtered out");
                    false
                }
            });
            info!("{}: {}/{} videos passed", stage.label(), kept.len(), total);
            stages.push(StageCount {
                stage,
                kept: kept.len(),
                total,
            });
        }

        info!(
            "Filtering complete: {}/{} videos passed all filters",
            kept.len(),
            initial
        );
        FilterOutcome { kept, stages }
    }

    /// Human-readable description of the configured filters
    ///
    /// e.g. `Upload window: last 7 days; Duration: 0-unlimited minutes`
    pub fn summary(&self) -> String {
        let c = &self.config;
        let mut parts = Vec::new();

        if c.upload_window_days > 0 {
            parts.push(format!("Upload window: last {} days", c.upload_window_days));
        }
        if !c.title_patterns.is_empty() {
            let patterns: Vec<String> = c
                .title_patterns
                .iter()
                .map(|p| format!("'{}' ({}%)", p.pattern, p.fuzzy_threshold))
                .collect();
            parts.push(format!("Title patterns: {}", patterns.join(", ")));
        }
        if c.min_duration_minutes.is_some() || c.max_duration_minutes.is_some() {
            let min = c.min_duration_minutes.unwrap_or(0);
            let max = match c.max_duration_minutes {
                Some(max) if max > 0 => max.to_string(),
                _ => "unlimited".to_string(),
            };
            parts.push(format!("Duration: {min}-{max} minutes"));
        }
        if !c.exclude_keywords.is_empty() {
            parts.push(format!("Exclude keywords: {}", c.exclude_keywords.join(", ")));
        }

        if parts.is_empty() {
            "No filters configured".to_string()
        } else {
            parts.join("; ")
        }
    }

    /// The settings this chain was built from
    pub fn config(&self) -> &FiltersConfig {
        &self.config
    }

    fn check_recency(&self, item: &CandidateItem, now: NaiveDateTime) -> Verdict {
        let Some(cutoff) = TimeDelta::try_days(self.config.upload_window_days)
            .and_then(|window| now.checked_sub_signed(window))
        else {
            return Verdict::Keep;
        };

        if item.published >= cutoff {
            Verdict::Keep
        } else {
            Verdict::Drop(format!(
                "published {} is older than {} days",
                item.published, self.config.upload_window_days
            ))
        }
    }

    fn check_title(&self, item: &CandidateItem) -> Verdict {
        let title = item.title.to_lowercase();
        for p in &self.config.title_patterns {
            let pattern = p.pattern.to_lowercase();
            if title.contains(&pattern) {
                debug!(video_id = %item.id, %pattern, "title matched pattern (exact)");
                return Verdict::Keep;
            }
            let score = partial_ratio(&pattern, &title);
            if score >= p.fuzzy_threshold {
                debug!(video_id = %item.id, %pattern, score, threshold = p.fuzzy_threshold, "title matched pattern (fuzzy)");
                return Verdict::Keep;
            }
            debug!(video_id = %item.id, %pattern, score, threshold = p.fuzzy_threshold, "title did not match pattern");
        }
        Verdict::Drop("title matches no pattern".to_string())
    }

    fn check_duration(&self, item: &CandidateItem) -> Verdict {
        let Some(minutes) = item.duration_minutes() else {
            debug!(video_id = %item.id, "no duration info, including by default");
            return Verdict::Keep;
        };
        if let Some(min) = self.config.min_duration_minutes
            && minutes < min
        {
            return Verdict::Drop(format!("{minutes} < {min} minutes"));
        }
        if let Some(max) = self.config.max_duration_minutes
            && minutes > max
        {
            return Verdict::Drop(format!("{minutes} > {max} minutes"));
        }
        Verdict::Keep
    }

    fn check_keywords(&self, item: &CandidateItem) -> Verdict {
        let title = item.title.to_lowercase();
        let description = item.description.to_lowercase();
        self.config
            .exclude_keywords
            .iter()
            .find(|k| {
                let k = k.to_lowercase();
                title.contains(&k) || description.contains(&k)
            })
            .map_or(Verdict::Keep, |k| {
                Verdict::Drop(format!("excluded by keyword '{k}'"))
            })
    }
}
