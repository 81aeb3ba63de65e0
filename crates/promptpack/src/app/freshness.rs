//! Relative age of the loaded snapshot.

use std::fmt;

use time::{Duration, OffsetDateTime};

/// Age tier shown next to the snapshot timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreshnessTier {
    JustNow,
    Moderate,
    Stale,
    Old,
}

impl FreshnessTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            FreshnessTier::JustNow => "just now",
            FreshnessTier::Moderate => "moderate",
            FreshnessTier::Stale => "stale",
            FreshnessTier::Old => "old",
        }
    }
}

impl fmt::Display for FreshnessTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Freshness {
    pub tier: FreshnessTier,
    /// e.g. `3 min ago`.
    pub relative: String,
}

/// Classify how old `at` is relative to `now`. Timestamps in the future count as just now.
pub fn freshness(at: OffsetDateTime, now: OffsetDateTime) -> Freshness {
    let age = (now - at).max(Duration::ZERO);
    let tier = if age < Duration::minutes(1) {
        FreshnessTier::JustNow
    } else if age < Duration::minutes(10) {
        FreshnessTier::Moderate
    } else if age < Duration::hours(1) {
        FreshnessTier::Stale
    } else {
        FreshnessTier::Old
    };
    Freshness {
        tier,
        relative: relative_label(age),
    }
}

fn relative_label(age: Duration) -> String {
    if age < Duration::minutes(1) {
        "just now".to_owned()
    } else if age < Duration::hours(1) {
        format!("{} min ago", age.whole_minutes())
    } else if age < Duration::days(1) {
        format!("{} h ago", age.whole_hours())
    } else {
        format!("{} d ago", age.whole_days())
    }
}
