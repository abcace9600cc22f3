//! Bounded check history and the statistics derived from it.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::monitoring::types::{HistoryEntry, ProbeStatus};

/// In-memory cap on history entries per URL.
pub const MAX_HISTORY_ENTRIES: usize = 1000;

/// Ordered check history, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History {
    entries: VecDeque<HistoryEntry>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `entry`, dropping the oldest entries beyond `limit`.
    pub fn push_bounded(&mut self, entry: HistoryEntry, limit: usize) {
        self.entries.push_back(entry);
        self.truncate_to(limit);
    }

    /// Keep only the most recent `limit` entries.
    pub fn truncate_to(&mut self, limit: usize) {
        while self.entries.len() > limit {
            self.entries.pop_front();
        }
    }

    /// Copy holding the most recent `limit` entries.
    pub fn most_recent(&self, limit: usize) -> History {
        let skip = self.entries.len().saturating_sub(limit);
        Self { entries: self.entries.iter().skip(skip).cloned().collect() }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn last(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }

    /// Percentage of UP entries; 0 for an empty history.
    pub fn uptime(&self) -> f64 {
        uptime_percentage(self.entries.iter())
    }

    pub fn summarize(&self, range: TimeRange, now: DateTime<Utc>) -> HistorySummary {
        HistorySummary::from_entries(self.entries.iter().filter(|entry| range.contains(entry, now)))
    }
}

impl FromIterator<HistoryEntry> for History {
    fn from_iter<I: IntoIterator<Item = HistoryEntry>>(iter: I) -> Self {
        Self { entries: iter.into_iter().collect() }
    }
}

fn uptime_percentage<'a>(entries: impl Iterator<Item = &'a HistoryEntry>) -> f64 {
    let (total, up) = entries.fold((0usize, 0usize), |(total, up), entry| {
        (total + 1, up + usize::from(entry.status == ProbeStatus::Up))
    });

    if total == 0 { 0.0 } else { 100.0 * up as f64 / total as f64 }
}

/// Look-back window for a history summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TimeRange {
    #[default]
    #[serde(rename = "24h")]
    Day,
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "30d")]
    Month,
    #[serde(rename = "all")]
    All,
}

impl TimeRange {
    fn window(self) -> Option<Duration> {
        match self {
            TimeRange::Day => Some(Duration::hours(24)),
            TimeRange::Week => Some(Duration::days(7)),
            TimeRange::Month => Some(Duration::days(30)),
            TimeRange::All => None,
        }
    }

    fn contains(self, entry: &HistoryEntry, now: DateTime<Utc>) -> bool {
        match self.window() {
            Some(window) => now.signed_duration_since(entry.timestamp) <= window,
            None => true,
        }
    }
}

impl std::str::FromStr for TimeRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "24h" => Ok(TimeRange::Day),
            "7d" => Ok(TimeRange::Week),
            "30d" => Ok(TimeRange::Month),
            "all" => Ok(TimeRange::All),
            other => Err(format!("Unknown time range: {other}")),
        }
    }
}

/// Aggregate figures over a slice of history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistorySummary {
    pub total_checks: usize,
    pub successful_checks: usize,
    pub failed_checks: usize,
    pub uptime: f64,
    pub avg_response_time_ms: f64,
    pub min_response_time_ms: u64,
    pub max_response_time_ms: u64,
    pub reliability_score: u32,
}

impl HistorySummary {
    fn from_entries<'a>(entries: impl Iterator<Item = &'a HistoryEntry>) -> Self {
        let entries: Vec<&HistoryEntry> = entries.collect();
        let total_checks = entries.len();
        let successful_checks = entries.iter().filter(|e| e.status == ProbeStatus::Up).count();
        let failed_checks = total_checks - successful_checks;
        let uptime = uptime_percentage(entries.iter().copied());

        let latencies: Vec<u64> = entries.iter().filter_map(|e| e.response_time_ms).collect();
        let avg_response_time_ms = if latencies.is_empty() {
            0.0
        } else {
            latencies.iter().sum::<u64>() as f64 / latencies.len() as f64
        };

        let reliability_score = if total_checks == 0 {
            0
        } else {
            let latency_credit = if avg_response_time_ms < 500.0 {
                30.0
            } else if avg_response_time_ms < 1000.0 {
                20.0
            } else {
                10.0
            };
            (uptime * 0.7 + latency_credit).round() as u32
        };

        Self {
            total_checks,
            successful_checks,
            failed_checks,
            uptime,
            avg_response_time_ms,
            min_response_time_ms: latencies.iter().copied().min().unwrap_or(0),
            max_response_time_ms: latencies.iter().copied().max().unwrap_or(0),
            reliability_score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(status: ProbeStatus, response_time_ms: Option<u64>) -> HistoryEntry {
        HistoryEntry { timestamp: Utc::now(), status, response_time_ms }
    }

    fn entry_at(age: Duration, status: ProbeStatus, response_time_ms: Option<u64>) -> HistoryEntry {
        HistoryEntry { timestamp: Utc::now() - age, status, response_time_ms }
    }

    #[test]
    fn test_uptime_of_empty_history_is_zero() {
        assert_eq!(History::new().uptime(), 0.0);
    }

    #[test]
    fn test_uptime_matches_up_ratio() {
        for (n, u) in [(1usize, 0usize), (1, 1), (3, 1), (4, 3), (7, 5)] {
            let history: History = (0..n)
                .map(|i| entry(if i < u { ProbeStatus::Up } else { ProbeStatus::Down }, None))
                .collect();
            assert_eq!(history.uptime(), 100.0 * u as f64 / n as f64);
        }
    }

    #[test]
    fn test_history_keeps_most_recent_entries() {
        let mut history = History::new();
        for i in 0..(MAX_HISTORY_ENTRIES as u64 + 25) {
            history.push_bounded(entry(ProbeStatus::Up, Some(i)), MAX_HISTORY_ENTRIES);
        }

        assert_eq!(history.len(), MAX_HISTORY_ENTRIES);
        let latencies: Vec<u64> = history.iter().filter_map(|e| e.response_time_ms).collect();
        assert_eq!(latencies.first(), Some(&25));
        assert_eq!(latencies.last(), Some(&(MAX_HISTORY_ENTRIES as u64 + 24)));
        assert!(latencies.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_most_recent_copy_leaves_original() {
        let history: History = (0..10u64).map(|i| entry(ProbeStatus::Down, Some(i))).collect();
        let tail = history.most_recent(3);

        assert_eq!(tail.len(), 3);
        assert_eq!(tail.iter().next().unwrap().response_time_ms, Some(7));
        assert_eq!(history.len(), 10);
    }

    #[test]
    fn test_summary_over_range() {
        let history: History = vec![
            entry_at(Duration::days(3), ProbeStatus::Down, None),
            entry_at(Duration::hours(2), ProbeStatus::Up, Some(100)),
            entry_at(Duration::hours(1), ProbeStatus::Up, Some(300)),
            entry_at(Duration::minutes(5), ProbeStatus::Down, None),
        ]
        .into_iter()
        .collect();

        let day = history.summarize(TimeRange::Day, Utc::now());
        assert_eq!(day.total_checks, 3);
        assert_eq!(day.successful_checks, 2);
        assert_eq!(day.failed_checks, 1);
        assert_eq!(day.avg_response_time_ms, 200.0);
        assert_eq!(day.min_response_time_ms, 100);
        assert_eq!(day.max_response_time_ms, 300);
        // 66.67 * 0.7 + 30
        assert_eq!(day.reliability_score, 77);

        let week = history.summarize(TimeRange::Week, Utc::now());
        assert_eq!(week.total_checks, 4);
        assert_eq!(week.uptime, 50.0);
    }

    #[test]
    fn test_summary_of_empty_range() {
        let history: History = vec![entry_at(Duration::days(40), ProbeStatus::Up, Some(900))]
            .into_iter()
            .collect();

        let summary = history.summarize(TimeRange::Month, Utc::now());
        assert_eq!(summary.total_checks, 0);
        assert_eq!(summary.reliability_score, 0);
        assert_eq!(summary.min_response_time_ms, 0);

        let all = history.summarize(TimeRange::All, Utc::now());
        assert_eq!(all.total_checks, 1);
        // 100 * 0.7 + 20
        assert_eq!(all.reliability_score, 90);
    }

    #[test]
    fn test_time_range_parsing() {
        assert_eq!("7d".parse::<TimeRange>().unwrap(), TimeRange::Week);
        assert!("1y".parse::<TimeRange>().is_err());
        assert_eq!(serde_json::to_string(&TimeRange::Month).unwrap(), "\"30d\"");
    }
}
