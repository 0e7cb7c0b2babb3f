//! Listing helpers for the dashboard views: status tabs, period and team
//! filters, the stats list ordering, calendar days and countdown text.

use chrono::{DateTime, Duration, Months, NaiveDate, Utc};

use super::models::{Match, MatchStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodFilter {
    Last24h,
    LastWeek,
    LastMonth,
}

impl PeriodFilter {
    /// Kickoffs must fall strictly after this instant to be in the period.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Self::Last24h => now - Duration::hours(24),
            Self::LastWeek => now - Duration::weeks(1),
            Self::LastMonth => now
                .checked_sub_months(Months::new(1))
                .unwrap_or(now - Duration::days(30)),
        }
    }

    pub fn contains(&self, m: &Match, now: DateTime<Utc>) -> bool {
        m.scheduled_at > self.cutoff(now)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScoreSort {
    #[default]
    Default,
    TotalDesc,
    TotalAsc,
}

/// Matches with the given status, optionally narrowed by period and a team
/// search, in store order.
pub fn by_status<'a>(
    matches: &'a [Match],
    status: MatchStatus,
    period: Option<PeriodFilter>,
    query: &str,
    now: DateTime<Utc>,
) -> Vec<&'a Match> {
    matches
        .iter()
        .filter(|m| m.status == status)
        .filter(|m| period.map_or(true, |p| p.contains(m, now)))
        .filter(|m| matches_team(m, query))
        .collect()
}

/// Case-insensitive substring match on either team. An empty query matches
/// everything.
pub fn matches_team(m: &Match, query: &str) -> bool {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return true;
    }
    m.team1.to_lowercase().contains(&query) || m.team2.to_lowercase().contains(&query)
}

pub fn search_teams<'a>(matches: &'a [Match], query: &str) -> Vec<&'a Match> {
    matches.iter().filter(|m| matches_team(m, query)).collect()
}

/// The stats list: live and finished matches only, sorted by total goals
/// when asked to. The sort is stable so ties keep store order.
pub fn stats_matches<'a>(
    matches: &'a [Match],
    period: Option<PeriodFilter>,
    query: &str,
    sort: ScoreSort,
    now: DateTime<Utc>,
) -> Vec<&'a Match> {
    let mut selected: Vec<&Match> = matches
        .iter()
        .filter(|m| m.status != MatchStatus::Upcoming)
        .filter(|m| period.map_or(true, |p| p.contains(m, now)))
        .filter(|m| matches_team(m, query))
        .collect();

    match sort {
        ScoreSort::Default => {}
        ScoreSort::TotalDesc => selected.sort_by(|a, b| b.total_goals().cmp(&a.total_goals())),
        ScoreSort::TotalAsc => selected.sort_by_key(|m| m.total_goals()),
    }
    selected
}

/// Matches kicking off on `day` (UTC calendar day).
pub fn on_day(matches: &[Match], day: NaiveDate) -> Vec<&Match> {
    matches
        .iter()
        .filter(|m| m.scheduled_at.date_naive() == day)
        .collect()
}

/// `M:SS` countdown text; negative input renders as `0:00`.
pub fn format_countdown(seconds: i64) -> String {
    let seconds = seconds.max(0);
    format!("{}:{:02}", seconds / 60, seconds % 60)
}
