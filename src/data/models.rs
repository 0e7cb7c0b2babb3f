//! Core data models for the match/tournament REST resource.
//!
//! Field names follow the collaborator's wire format: kickoff is `date`,
//! the recorded start is `start_time`, the match length is `duration`
//! (minutes) and the per-side counters are camelCase.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Enums
// =============================================================================

/// Authoritative lifecycle phase of a match as last confirmed by the store.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MatchStatus {
    #[default]
    #[serde(rename = "Предстоящий", alias = "Upcoming")]
    Upcoming,
    #[serde(rename = "Идет", alias = "InProgress")]
    InProgress,
    #[serde(rename = "Завершен", alias = "Finished")]
    Finished,
}

impl MatchStatus {
    /// Whether this status may be followed by `next`. Status only moves
    /// forward: Upcoming -> InProgress -> Finished.
    pub fn can_advance_to(&self, next: MatchStatus) -> bool {
        matches!(
            (self, next),
            (Self::Upcoming, Self::InProgress)
                | (Self::Upcoming, Self::Finished)
                | (Self::InProgress, Self::Finished)
        )
    }

    pub fn is_live_relevant(&self) -> bool {
        matches!(self, Self::Upcoming | Self::InProgress)
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Upcoming => write!(f, "Upcoming"),
            Self::InProgress => write!(f, "InProgress"),
            Self::Finished => write!(f, "Finished"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchType {
    #[serde(rename = "Товарищеский", alias = "Friendly")]
    Friendly,
    #[serde(rename = "Турнирный", alias = "Tournament")]
    Tournament,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    #[serde(rename = "Групповой этап", alias = "GroupStage")]
    GroupStage,
    #[serde(rename = "Четвертьфинал", alias = "QuarterFinal")]
    QuarterFinal,
    #[serde(rename = "Полуфинал", alias = "SemiFinal")]
    SemiFinal,
    #[serde(rename = "Финал", alias = "Final")]
    Final,
}

// =============================================================================
// Match
// =============================================================================

/// Free-form per-side counters edited through the match form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchStats {
    #[serde(default, rename = "shotsOnGoal1")]
    pub shots_on_goal1: u32,
    #[serde(default, rename = "shotsOnGoal2")]
    pub shots_on_goal2: u32,
    #[serde(default, rename = "shotsOnTarget1")]
    pub shots_on_target1: u32,
    #[serde(default, rename = "shotsOnTarget2")]
    pub shots_on_target2: u32,
    #[serde(default, rename = "yellowCards1")]
    pub yellow_cards1: u32,
    #[serde(default, rename = "yellowCards2")]
    pub yellow_cards2: u32,
    #[serde(default, rename = "redCards1")]
    pub red_cards1: u32,
    #[serde(default, rename = "redCards2")]
    pub red_cards2: u32,
    #[serde(default)]
    pub corners1: u32,
    #[serde(default)]
    pub corners2: u32,
    #[serde(default)]
    pub possession1: u32,
    #[serde(default)]
    pub possession2: u32,
}

/// Player lists per side. `None` and an empty list are distinct on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchPlayers {
    #[serde(default, rename = "goalScorers1")]
    pub goal_scorers1: Option<Vec<String>>,
    #[serde(default, rename = "goalScorers2")]
    pub goal_scorers2: Option<Vec<String>>,
    #[serde(default, rename = "yellowCardPlayers1")]
    pub yellow_card_players1: Option<Vec<String>>,
    #[serde(default, rename = "yellowCardPlayers2")]
    pub yellow_card_players2: Option<Vec<String>>,
    #[serde(default, rename = "redCardPlayers1")]
    pub red_card_players1: Option<Vec<String>>,
    #[serde(default, rename = "redCardPlayers2")]
    pub red_card_players2: Option<Vec<String>>,
}

/// A football match as held by the collaborator store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(default)]
    pub tournament_id: Option<u64>,
    pub team1: String,
    pub team2: String,
    #[serde(rename = "date")]
    pub scheduled_at: DateTime<Utc>,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub status: MatchStatus,
    #[serde(default)]
    pub score1: u32,
    #[serde(default)]
    pub score2: u32,
    #[serde(flatten)]
    pub stats: MatchStats,
    #[serde(rename = "start_time", default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(rename = "duration", default)]
    pub duration_minutes: Option<u32>,
    #[serde(flatten)]
    pub players: MatchPlayers,
    #[serde(default)]
    pub match_type: Option<MatchType>,
    #[serde(default)]
    pub referee: Option<String>,
    #[serde(default)]
    pub stage: Option<Stage>,
}

impl Match {
    /// A fresh friendly match: Upcoming, no start time, all counters zero.
    pub fn friendly(
        team1: &str,
        team2: &str,
        scheduled_at: DateTime<Utc>,
        location: &str,
        duration_minutes: Option<u32>,
        referee: Option<&str>,
    ) -> Self {
        Self {
            id: None,
            tournament_id: None,
            team1: team1.to_string(),
            team2: team2.to_string(),
            scheduled_at,
            location: location.to_string(),
            status: MatchStatus::Upcoming,
            score1: 0,
            score2: 0,
            stats: MatchStats::default(),
            started_at: None,
            duration_minutes,
            players: MatchPlayers::default(),
            match_type: Some(MatchType::Friendly),
            referee: referee.filter(|r| !r.trim().is_empty()).map(str::to_string),
            stage: None,
        }
    }

    /// A tournament fixture. Location comes from the tournament and the
    /// fixture carries no duration until one is edited in.
    pub fn tournament_fixture(
        tournament: &Tournament,
        team1: &str,
        team2: &str,
        scheduled_at: DateTime<Utc>,
        stage: Option<Stage>,
    ) -> Self {
        Self {
            tournament_id: Some(tournament.id),
            match_type: Some(MatchType::Tournament),
            stage,
            referee: None,
            ..Self::friendly(team1, team2, scheduled_at, &tournament.location, None, None)
        }
    }

    pub fn total_goals(&self) -> u32 {
        self.score1 + self.score2
    }

    /// Label used in log lines, e.g. `"Spartak vs Zenit"`.
    pub fn fixture_label(&self) -> String {
        format!("{} vs {}", self.team1, self.team2)
    }

    /// Check the field-level invariants of a record before it is sent.
    pub fn validate(&self) -> Result<(), String> {
        if self.team1.trim().is_empty() || self.team2.trim().is_empty() {
            return Err("team names must be non-empty".to_string());
        }
        if self.duration_minutes == Some(0) {
            return Err("duration must be a positive number of minutes".to_string());
        }
        let started = self.started_at.is_some();
        let should_be_started = self.status != MatchStatus::Upcoming;
        if started != should_be_started {
            return Err(format!(
                "start_time must be set exactly when status is in progress or finished (status={})",
                self.status
            ));
        }
        Ok(())
    }
}

/// Score/stat edits submitted through the edit form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchEdit {
    pub score1: u32,
    pub score2: u32,
    pub stats: MatchStats,
    pub players: MatchPlayers,
}

impl MatchEdit {
    pub fn apply_to(&self, m: &mut Match) {
        m.score1 = self.score1;
        m.score2 = self.score2;
        m.stats = self.stats.clone();
        m.players = self.players.clone();
    }
}

// =============================================================================
// Tournaments
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tournament {
    pub id: u64,
    pub name: String,
    /// JSON-encoded list of [`Team`]; use [`Tournament::teams`].
    #[serde(default)]
    pub teams: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matches: Option<Vec<Match>>,
}

impl Tournament {
    /// Decode the embedded team list. A malformed or empty string yields
    /// no teams.
    pub fn teams(&self) -> Vec<Team> {
        if self.teams.trim().is_empty() {
            return Vec::new();
        }
        serde_json::from_str(&self.teams).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTournament {
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub location: String,
    pub teams: Vec<Team>,
}

impl NewTournament {
    pub fn new(
        name: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
        location: &str,
        team_names: &[&str],
    ) -> Self {
        let teams = team_names
            .iter()
            .map(|n| n.trim())
            .filter(|n| !n.is_empty())
            .map(|n| Team {
                id: None,
                name: n.to_string(),
            })
            .collect();
        Self {
            name: name.to_string(),
            start_date,
            end_date,
            location: location.to_string(),
            teams,
        }
    }
}
