//! Match log and the player statistics derived from it.
//!
//! Matches live newest-first under `matches.recent`, capped to the most
//! recent fifty; recording a match recomputes the aggregate stats over the
//! retained records and persists them under `stats.player`.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::Date;

use crate::store::{ProfileStore, StoreError, keys};

/// How many match records are retained.
pub const MAX_RECENT_MATCHES: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MatchResult {
    Win,
    Loss,
}

/// One recorded match with its optional free-text reflection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchRecord {
    pub id: u64,
    pub result: MatchResult,
    pub kills: u32,
    pub deaths: u32,
    pub assists: u32,
    pub cs: u32,
    /// Match length in minutes; at least 1.
    pub duration_min: u32,
    #[serde(with = "match_date")]
    pub date: Date,
    /// The player's narrative about the match; input for tag generation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feelings: Option<String>,
}

impl MatchRecord {
    /// Kills/deaths/assists in the conventional display form.
    pub fn kda(&self) -> String {
        format!("{}/{}/{}", self.kills, self.deaths, self.assists)
    }
}

mod match_date {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};
    use time::{Date, format_description::FormatItem, macros::format_description};

    const FORMAT: &[FormatItem<'_>] = format_description!("[year]-[month]-[day]");

    pub fn serialize<S: Serializer>(date: &Date, serializer: S) -> Result<S::Ok, S::Error> {
        let formatted = date
            .format(&FORMAT)
            .map_err(|err| serde::ser::Error::custom(err.to_string()))?;
        serializer.serialize_str(&formatted)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Date, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Date::parse(&raw, &FORMAT).map_err(D::Error::custom)
    }
}

/// Aggregates shown on the dashboard, recomputed on every recorded match.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct PlayerStats {
    /// Percentage of wins over the retained matches, one decimal.
    pub win_rate: f64,
    /// (kills + assists) / max(deaths, 1), two decimals.
    pub avg_kda: f64,
    /// Creep score per minute over the retained matches, one decimal.
    pub cs_per_min: f64,
    pub games_played: u32,
}

#[derive(Debug, Error)]
pub enum MatchError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Invalid match data in store: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Load retained matches, newest first.
pub fn recent_matches(store: &impl ProfileStore) -> Result<Vec<MatchRecord>, MatchError> {
    match store.get(keys::RECENT_MATCHES)? {
        Some(raw) => Ok(serde_json::from_str(&raw)?),
        None => Ok(Vec::new()),
    }
}

/// Load the last persisted aggregates.
pub fn player_stats(store: &impl ProfileStore) -> Result<PlayerStats, MatchError> {
    match store.get(keys::PLAYER_STATS)? {
        Some(raw) => Ok(serde_json::from_str(&raw)?),
        None => Ok(PlayerStats::default()),
    }
}

/// Prepend a match, trim the log to its cap, and recompute the aggregates.
pub fn record_match(
    store: &mut impl ProfileStore,
    record: MatchRecord,
) -> Result<PlayerStats, MatchError> {
    let mut matches = recent_matches(store)?;
    matches.insert(0, record);
    matches.truncate(MAX_RECENT_MATCHES);

    let stats = compute_stats(&matches);
    store.set(keys::RECENT_MATCHES, &serde_json::to_string(&matches)?)?;
    store.set(keys::PLAYER_STATS, &serde_json::to_string(&stats)?)?;
    Ok(stats)
}

fn compute_stats(matches: &[MatchRecord]) -> PlayerStats {
    if matches.is_empty() {
        return PlayerStats::default();
    }
    let games = matches.len() as u32;
    let wins = matches
        .iter()
        .filter(|m| m.result == MatchResult::Win)
        .count() as f64;
    let (kills, deaths, assists, cs, minutes) =
        matches.iter().fold((0u64, 0u64, 0u64, 0u64, 0u64), |acc, m| {
            (
                acc.0 + u64::from(m.kills),
                acc.1 + u64::from(m.deaths),
                acc.2 + u64::from(m.assists),
                acc.3 + u64::from(m.cs),
                acc.4 + u64::from(m.duration_min),
            )
        });

    let win_rate = round_to(wins / f64::from(games) * 100.0, 1);
    let avg_kda = round_to(
        (kills + assists) as f64 / (deaths.max(1)) as f64,
        2,
    );
    let cs_per_min = if minutes == 0 {
        0.0
    } else {
        round_to(cs as f64 / minutes as f64, 1)
    };
    PlayerStats {
        win_rate,
        avg_kda,
        cs_per_min,
        games_played: games,
    }
}

fn round_to(value: f64, decimals: u32) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    (value * scale).round() / scale
}
