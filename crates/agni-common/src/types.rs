//! Core types for the device export pipeline.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A raw upstream record: a flat-ish JSON object keyed by field name.
///
/// Session records, identity lookups, and enriched output rows all use
/// this shape. Records are replaced, never mutated in place, except
/// during the merge step which owns its copy.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// A half-open time interval `[from, to)` bounding one paginated query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl TimeWindow {
    /// Window width.
    pub fn width(&self) -> Duration {
        self.to - self.from
    }
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} -> {}",
            self.from.format("%Y-%m-%d %H:%M:%S"),
            self.to.format("%Y-%m-%d %H:%M:%S")
        )
    }
}

/// Builds the backward scan plan: windows of `width` walking from `now`
/// down to `now - lookback`, newest first.
///
/// The final window is clamped to the lower bound, so the plan covers
/// `[now - lookback, now]` with no gaps and no window narrower than
/// `width` except possibly the last. Empty if `lookback` or `width` is
/// not positive.
pub fn window_plan(now: DateTime<Utc>, lookback: Duration, width: Duration) -> Vec<TimeWindow> {
    if lookback <= Duration::zero() || width <= Duration::zero() {
        return Vec::new();
    }

    let floor = now - lookback;
    let mut windows = Vec::new();
    let mut to = now;

    while to > floor {
        let from = std::cmp::max(to - width, floor);
        windows.push(TimeWindow { from, to });
        to = from;
    }

    windows
}

/// Policy for picking the surviving record when a natural key recurs.
///
/// The scan walks windows newest-first, so the first occurrence of a key
/// is chronologically the most recent one. `NewestWins` keeps that first
/// occurrence; `OldestWins` lets later (older) occurrences replace it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DedupPolicy {
    /// Keep the first-seen occurrence (most recent, given the backward scan).
    #[default]
    NewestWins,
    /// Keep the last-seen occurrence (oldest, given the backward scan).
    OldestWins,
}

impl DedupPolicy {
    /// Returns the display name.
    pub fn as_str(&self) -> &'static str {
        match self {
            DedupPolicy::NewestWins => "newest-wins",
            DedupPolicy::OldestWins => "oldest-wins",
        }
    }
}

impl std::fmt::Display for DedupPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for DedupPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "newest-wins" | "newest" => Ok(DedupPolicy::NewestWins),
            "oldest-wins" | "oldest" => Ok(DedupPolicy::OldestWins),
            other => Err(format!(
                "Unknown dedup policy '{}' (expected newest-wins or oldest-wins)",
                other
            )),
        }
    }
}
