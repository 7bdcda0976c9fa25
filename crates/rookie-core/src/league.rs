// League data model (Sleeper shapes) and the provider trait the pipeline reads
// it through.
//
// The raw Sleeper payloads are loosely typed: roster ids inside bracket
// matches can be objects for unplayed games, seasons arrive as strings, and
// roster records live under a nested `settings` object. Everything is
// normalized here, once, at deserialization time.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::draft::pick::Position;

// ---------------------------------------------------------------------------
// Lenient field helpers
// ---------------------------------------------------------------------------

/// Accept a number or a numeric string; anything else becomes `None`.
pub(crate) fn lenient_u32(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn de_opt_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(lenient_u32(&value))
}

fn de_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(lenient_u32(&value).unwrap_or(0))
}

fn de_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    })
}

// ---------------------------------------------------------------------------
// Rosters and users
// ---------------------------------------------------------------------------

/// Read-only roster snapshot with the season record flattened out of
/// Sleeper's `settings` object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawRoster")]
pub struct Roster {
    pub roster_id: u32,
    pub owner_id: Option<String>,
    pub wins: u32,
    pub losses: u32,
    pub ties: u32,
    /// Season points-for, including the decimal part.
    pub fpts: f64,
    pub players: Vec<String>,
    pub starters: Vec<String>,
}

impl Roster {
    /// Win percentage with ties counted as games played; 0 games -> 0.0.
    pub fn win_pct(&self) -> f64 {
        let games = (self.wins + self.losses + self.ties).max(1);
        f64::from(self.wins) / f64::from(games)
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawRosterSettings {
    #[serde(default, deserialize_with = "de_opt_u32")]
    wins: Option<u32>,
    #[serde(default, deserialize_with = "de_opt_u32")]
    losses: Option<u32>,
    #[serde(default, deserialize_with = "de_opt_u32")]
    ties: Option<u32>,
    #[serde(default, deserialize_with = "de_f64")]
    fpts: f64,
    #[serde(default, deserialize_with = "de_f64")]
    fpts_decimal: f64,
}

#[derive(Debug, Deserialize)]
struct RawRoster {
    #[serde(deserialize_with = "de_u32")]
    roster_id: u32,
    #[serde(default)]
    owner_id: Option<String>,
    #[serde(default)]
    settings: Option<RawRosterSettings>,
    #[serde(default, deserialize_with = "de_opt_u32")]
    wins: Option<u32>,
    #[serde(default, deserialize_with = "de_opt_u32")]
    losses: Option<u32>,
    #[serde(default, deserialize_with = "de_opt_u32")]
    ties: Option<u32>,
    #[serde(default)]
    fpts: Option<f64>,
    #[serde(default)]
    players: Option<Vec<String>>,
    #[serde(default)]
    starters: Option<Vec<String>>,
}

impl From<RawRoster> for Roster {
    fn from(raw: RawRoster) -> Self {
        let settings = raw.settings.unwrap_or_default();
        let settings_fpts = settings.fpts + settings.fpts_decimal / 100.0;
        Roster {
            roster_id: raw.roster_id,
            owner_id: raw.owner_id,
            wins: raw.wins.or(settings.wins).unwrap_or(0),
            losses: raw.losses.or(settings.losses).unwrap_or(0),
            ties: raw.ties.or(settings.ties).unwrap_or(0),
            fpts: raw.fpts.unwrap_or(settings_fpts),
            players: raw.players.unwrap_or_default(),
            starters: raw.starters.unwrap_or_default(),
        }
    }
}

/// A league member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeagueUser {
    pub user_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

impl LeagueUser {
    /// Display name, falling back to username.
    pub fn label(&self) -> Option<&str> {
        self.display_name
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.username.as_deref().filter(|s| !s.is_empty()))
    }

    pub fn avatar_url(&self) -> Option<String> {
        self.avatar
            .as_deref()
            .filter(|a| !a.is_empty())
            .map(|a| format!("https://sleepercdn.com/avatars/thumbs/{a}"))
    }
}

// ---------------------------------------------------------------------------
// Bracket, trades, drafts
// ---------------------------------------------------------------------------

/// One match of the winners bracket.
///
/// `t1`/`t2` are `None` until the participants are known (Sleeper sends
/// `{"w": 1}`-style references for future games). `p` marks a placement game
/// (1 = championship, 3 = third place, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BracketMatch {
    #[serde(default, deserialize_with = "de_u32")]
    pub r: u32,
    #[serde(default, deserialize_with = "de_opt_u32")]
    pub m: Option<u32>,
    #[serde(default, deserialize_with = "de_opt_u32")]
    pub t1: Option<u32>,
    #[serde(default, deserialize_with = "de_opt_u32")]
    pub t2: Option<u32>,
    #[serde(default, deserialize_with = "de_opt_u32")]
    pub w: Option<u32>,
    #[serde(default, deserialize_with = "de_opt_u32")]
    pub l: Option<u32>,
    #[serde(default, deserialize_with = "de_opt_u32")]
    pub p: Option<u32>,
}

/// A future draft pick that changed hands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradedPick {
    #[serde(deserialize_with = "de_u32")]
    pub season: u32,
    #[serde(deserialize_with = "de_u32")]
    pub round: u32,
    /// Roster that originally owned the pick (the slot owner).
    #[serde(deserialize_with = "de_u32")]
    pub roster_id: u32,
    /// Roster that owns the pick now.
    #[serde(deserialize_with = "de_u32")]
    pub owner_id: u32,
    #[serde(default, deserialize_with = "de_opt_u32")]
    pub previous_owner_id: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftSummary {
    #[serde(default)]
    pub draft_id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, deserialize_with = "de_u32")]
    pub season: u32,
}

// ---------------------------------------------------------------------------
// League settings and NFL state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LeagueSettings {
    #[serde(default, deserialize_with = "de_opt_u32")]
    pub playoff_week_start: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LeagueInfo {
    #[serde(default)]
    pub league_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "de_u32")]
    pub season: u32,
    #[serde(default)]
    pub roster_positions: Vec<String>,
    #[serde(default)]
    pub settings: LeagueSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NflState {
    #[serde(default, deserialize_with = "de_u32")]
    pub season: u32,
    #[serde(default, deserialize_with = "de_u32")]
    pub week: u32,
    #[serde(default)]
    pub season_type: String,
}

impl NflState {
    pub fn is_regular_season(&self) -> bool {
        self.season_type.eq_ignore_ascii_case("regular")
    }
}

/// One roster's entry in a week's matchups.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Matchup {
    #[serde(default, deserialize_with = "de_opt_u32")]
    pub roster_id: Option<u32>,
    #[serde(default)]
    pub players_points: HashMap<String, f64>,
    #[serde(default)]
    pub starters: Vec<String>,
    #[serde(default, deserialize_with = "de_f64")]
    pub points: f64,
}

// ---------------------------------------------------------------------------
// Provider trait
// ---------------------------------------------------------------------------

/// Read-only access to the league data provider.
///
/// The production implementation talks to the Sleeper HTTP API; tests use
/// in-memory fixtures.
#[async_trait]
pub trait LeagueProvider: Send + Sync {
    async fn nfl_state(&self) -> anyhow::Result<NflState>;

    async fn league(&self, league_id: &str) -> anyhow::Result<LeagueInfo>;

    async fn user_leagues(&self, user_id: &str, season: u32) -> anyhow::Result<Vec<LeagueInfo>>;

    async fn users(&self, league_id: &str) -> anyhow::Result<Vec<LeagueUser>>;

    async fn rosters(&self, league_id: &str) -> anyhow::Result<Vec<Roster>>;

    async fn winners_bracket(&self, league_id: &str) -> anyhow::Result<Vec<BracketMatch>>;

    async fn traded_picks(&self, league_id: &str) -> anyhow::Result<Vec<TradedPick>>;

    async fn drafts(&self, league_id: &str) -> anyhow::Result<Vec<DraftSummary>>;

    async fn matchups(&self, league_id: &str, week: u32) -> anyhow::Result<Vec<Matchup>>;

    /// Player id -> position for every player the provider knows about.
    async fn player_positions(&self) -> anyhow::Result<HashMap<String, Position>>;
}

/// Parse the provider's full player directory (`id -> {position, ...}`).
pub fn player_positions_from_json(value: &Value) -> HashMap<String, Position> {
    let Some(obj) = value.as_object() else {
        return HashMap::new();
    };
    obj.iter()
        .filter_map(|(id, player)| {
            let pos = player.get("position")?.as_str()?;
            Some((id.clone(), Position::parse_lenient(pos)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roster_flattens_sleeper_settings() {
        let json = r#"{
            "roster_id": 4,
            "owner_id": "u4",
            "players": ["a", "b", "c"],
            "starters": ["a"],
            "settings": { "wins": 9, "losses": 5, "ties": 0, "fpts": 1702, "fpts_decimal": 44 }
        }"#;
        let roster: Roster = serde_json::from_str(json).unwrap();
        assert_eq!(roster.roster_id, 4);
        assert_eq!(roster.owner_id.as_deref(), Some("u4"));
        assert_eq!(roster.wins, 9);
        assert_eq!(roster.losses, 5);
        assert!((roster.fpts - 1702.44).abs() < 1e-9);
        assert_eq!(roster.players.len(), 3);
    }

    #[test]
    fn roster_accepts_flat_record() {
        let json = r#"{ "roster_id": 1, "wins": 5, "losses": 9, "fpts": 1000.5 }"#;
        let roster: Roster = serde_json::from_str(json).unwrap();
        assert_eq!(roster.wins, 5);
        assert!((roster.fpts - 1000.5).abs() < 1e-9);
        assert!(roster.owner_id.is_none());
    }

    #[test]
    fn win_pct_handles_zero_games() {
        let roster: Roster = serde_json::from_str(r#"{ "roster_id": 1 }"#).unwrap();
        assert_eq!(roster.win_pct(), 0.0);
        let roster: Roster =
            serde_json::from_str(r#"{ "roster_id": 1, "wins": 3, "losses": 1 }"#).unwrap();
        assert!((roster.win_pct() - 0.75).abs() < 1e-9);
    }

    #[test]
    fn bracket_match_ignores_unresolved_references() {
        let json = r#"{ "r": 2, "m": 5, "t1": {"w": 1}, "t2": 3, "w": null, "l": null }"#;
        let m: BracketMatch = serde_json::from_str(json).unwrap();
        assert_eq!(m.r, 2);
        assert_eq!(m.t1, None);
        assert_eq!(m.t2, Some(3));
        assert_eq!(m.w, None);
        assert_eq!(m.p, None);
    }

    #[test]
    fn traded_pick_parses_string_season() {
        let json = r#"{ "season": "2026", "round": 1, "roster_id": 7, "owner_id": 9, "previous_owner_id": 7 }"#;
        let tp: TradedPick = serde_json::from_str(json).unwrap();
        assert_eq!(tp.season, 2026);
        assert_eq!(tp.roster_id, 7);
        assert_eq!(tp.owner_id, 9);
    }

    #[test]
    fn user_label_falls_back_to_username() {
        let user = LeagueUser {
            user_id: "u1".into(),
            display_name: Some(String::new()),
            username: Some("gridiron".into()),
            avatar: Some("abc".into()),
        };
        assert_eq!(user.label(), Some("gridiron"));
        assert_eq!(
            user.avatar_url().as_deref(),
            Some("https://sleepercdn.com/avatars/thumbs/abc")
        );
    }

    #[test]
    fn nfl_state_regular_season() {
        let state: NflState =
            serde_json::from_str(r#"{ "season": "2025", "week": 6, "season_type": "regular" }"#)
                .unwrap();
        assert!(state.is_regular_season());
        assert_eq!(state.season, 2025);
        let off: NflState = serde_json::from_str(r#"{ "season_type": "off" }"#).unwrap();
        assert!(!off.is_regular_season());
    }

    #[test]
    fn player_directory_parsing() {
        let value = serde_json::json!({
            "4046": { "position": "QB", "full_name": "Patrick Mahomes" },
            "9999": { "position": "LS" },
            "1234": { "full_name": "No Position" }
        });
        let map = player_positions_from_json(&value);
        assert_eq!(map.get("4046"), Some(&Position::Quarterback));
        assert_eq!(map.get("9999"), Some(&Position::Unknown));
        assert!(!map.contains_key("1234"));
    }
}
