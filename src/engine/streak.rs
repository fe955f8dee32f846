//! Activity streaks
//!
//! Counts how many days a seller has been active. The default policy is a
//! consecutive-day streak that tolerates no activity yet today; the
//! alternative simply counts every distinct day with a sale.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreakPolicy {
    /// Consecutive active days ending today (or yesterday)
    #[default]
    Consecutive,
    /// Every distinct day with at least one sale
    DistinctDays,
}

impl StreakPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreakPolicy::Consecutive => "consecutive",
            StreakPolicy::DistinctDays => "distinct_days",
        }
    }

    pub fn active_days<I>(&self, dates: I, today: NaiveDate) -> u32
    where
        I: IntoIterator<Item = NaiveDate>,
    {
        let dates: BTreeSet<NaiveDate> = dates.into_iter().collect();
        match self {
            StreakPolicy::Consecutive => consecutive_streak(&dates, today),
            StreakPolicy::DistinctDays => dates.len() as u32,
        }
    }
}

impl std::fmt::Display for StreakPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Walk back from today (or yesterday if today is still empty) until the first gap
pub fn consecutive_streak(dates: &BTreeSet<NaiveDate>, today: NaiveDate) -> u32 {
    let yesterday = today - Duration::days(1);
    let mut cursor = if dates.contains(&today) {
        today
    } else if dates.contains(&yesterday) {
        yesterday
    } else {
        return 0;
    };

    let mut streak = 0;
    while dates.contains(&cursor) {
        streak += 1;
        cursor -= Duration::days(1);
    }
    streak
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    fn days_ago(n: i64) -> NaiveDate {
        today() - Duration::days(n)
    }

    #[test]
    fn test_three_day_streak() {
        let dates = vec![today(), days_ago(1), days_ago(2)];
        assert_eq!(StreakPolicy::Consecutive.active_days(dates, today()), 3);
    }

    #[test]
    fn test_gap_today_and_yesterday_breaks_streak() {
        let dates = vec![days_ago(2)];
        assert_eq!(StreakPolicy::Consecutive.active_days(dates, today()), 0);
    }

    #[test]
    fn test_streak_can_start_yesterday() {
        let dates = vec![days_ago(1)];
        assert_eq!(StreakPolicy::Consecutive.active_days(dates, today()), 1);

        let dates = vec![days_ago(1), days_ago(2), days_ago(4)];
        assert_eq!(StreakPolicy::Consecutive.active_days(dates, today()), 2);
    }

    #[test]
    fn test_duplicates_and_future_dates() {
        let dates = vec![today(), today(), days_ago(1), today() + Duration::days(3)];
        assert_eq!(StreakPolicy::Consecutive.active_days(dates, today()), 2);
    }

    #[test]
    fn test_empty_history() {
        let dates: Vec<NaiveDate> = Vec::new();
        assert_eq!(StreakPolicy::Consecutive.active_days(dates.clone(), today()), 0);
        assert_eq!(StreakPolicy::DistinctDays.active_days(dates, today()), 0);
    }

    #[test]
    fn test_distinct_days_ignores_gaps() {
        let dates = vec![days_ago(30), days_ago(10), days_ago(10), days_ago(2)];
        assert_eq!(StreakPolicy::DistinctDays.active_days(dates, today()), 3);
    }
}
