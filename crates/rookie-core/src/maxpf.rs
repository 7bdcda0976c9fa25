// MaxPF: the season points a roster would have scored had the best eligible
// lineup been started every regular-season week.
//
// Per week, starter slots and rostered players are matched as a max-weight
// assignment. Flex eligibility sets can overlap without nesting (WRR and
// REC_FLEX), so a greedy fill is not enough.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, info, warn};

use crate::draft::pick::Position;
use crate::league::{LeagueProvider, Matchup, NflState};

/// Regular-season length assumed when the league has no playoff start week.
pub const DEFAULT_REGULAR_SEASON_LAST_WEEK: u32 = 14;

/// Roster position codes that never start.
const NON_STARTING_SLOTS: [&str; 3] = ["BN", "IR", "TAXI"];

/// roster_id -> cumulative MaxPF.
pub type MaxPfMap = BTreeMap<u32, f64>;

// ---------------------------------------------------------------------------
// Starter slots
// ---------------------------------------------------------------------------

/// A starting lineup slot and the positions allowed to fill it.
#[derive(Debug, Clone, PartialEq)]
pub struct StarterSlot {
    pub code: String,
    pub eligible: Vec<Position>,
}

impl StarterSlot {
    /// Build a slot from a Sleeper roster position code. Returns `None` for
    /// bench/IR/taxi and for codes that map to no known position.
    pub fn from_code(code: &str) -> Option<Self> {
        let code = code.trim().to_uppercase();
        if NON_STARTING_SLOTS.contains(&code.as_str()) {
            return None;
        }
        let eligible = match code.as_str() {
            "FLEX" | "WRT" | "RWT" => vec![
                Position::RunningBack,
                Position::WideReceiver,
                Position::TightEnd,
            ],
            "WRR" => vec![Position::WideReceiver, Position::RunningBack],
            "REC_FLEX" => vec![Position::WideReceiver, Position::TightEnd],
            "SUPER_FLEX" => vec![
                Position::Quarterback,
                Position::RunningBack,
                Position::WideReceiver,
                Position::TightEnd,
            ],
            "IDP_FLEX" => vec![
                Position::DefensiveLine,
                Position::Linebacker,
                Position::DefensiveBack,
            ],
            other => vec![Position::from_str_pos(other)?],
        };
        Some(StarterSlot { code, eligible })
    }

    pub fn accepts(&self, pos: Position) -> bool {
        self.eligible.contains(&pos)
    }
}

/// The ordered set of starter slots used for weekly lineup optimization.
#[derive(Debug, Clone, PartialEq)]
pub struct StarterSlots {
    slots: Vec<StarterSlot>,
}

impl StarterSlots {
    /// Build starter slots from the league's `roster_positions`, dropping
    /// bench/IR/taxi entries. Falls back to the default lineup when nothing
    /// usable remains.
    pub fn from_roster_positions(roster_positions: &[String]) -> Self {
        let slots: Vec<StarterSlot> = roster_positions
            .iter()
            .filter_map(|code| {
                let slot = StarterSlot::from_code(code);
                if slot.is_none() && !NON_STARTING_SLOTS.contains(&code.to_uppercase().as_str()) {
                    debug!(code = code.as_str(), "ignoring unrecognized roster slot");
                }
                slot
            })
            .collect();

        if slots.is_empty() {
            return Self::default_lineup();
        }
        StarterSlots { slots }
    }

    /// Lineup assumed when league settings are missing or unusable:
    /// QB, 2 RB, 3 WR, TE, FLEX, SUPER_FLEX.
    pub fn default_lineup() -> Self {
        let codes = ["QB", "RB", "RB", "WR", "WR", "WR", "TE", "FLEX", "SUPER_FLEX"];
        StarterSlots {
            slots: codes.iter().filter_map(|c| StarterSlot::from_code(c)).collect(),
        }
    }

    pub fn slots(&self) -> &[StarterSlot] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Weekly optimization
// ---------------------------------------------------------------------------

/// A rostered player's score for one week.
#[derive(Debug, Clone, PartialEq)]
pub struct WeeklyPlayer {
    pub player_id: String,
    pub position: Position,
    pub points: f64,
}

/// The best lineup found for one roster-week.
#[derive(Debug, Clone, PartialEq)]
pub struct WeeklyLineup {
    pub total: f64,
    pub chosen: Vec<String>,
}

/// Cost of an ineligible slot/player pair. Every slot also has a zero-point
/// placeholder column, so this cost is never part of an optimal matching.
const INELIGIBLE: f64 = 1e9;

/// Choose the lineup with the highest total: each slot takes at most one
/// eligible player and each player fills at most one slot. Slots left empty
/// (or only coverable by negative scores) contribute zero.
///
/// `chosen` lists the selected player ids in slot order.
pub fn fill_weekly_max(players: &[WeeklyPlayer], slots: &StarterSlots) -> WeeklyLineup {
    let candidates: Vec<&WeeklyPlayer> = players
        .iter()
        .filter(|p| slots.slots().iter().any(|s| s.accepts(p.position)))
        .collect();
    let n = slots.len();
    if n == 0 || candidates.is_empty() {
        return WeeklyLineup {
            total: 0.0,
            chosen: Vec::new(),
        };
    }

    // Columns: candidates, then one empty placeholder per slot.
    let m = candidates.len() + n;
    let cost = |slot: &StarterSlot, col: usize| -> f64 {
        match candidates.get(col) {
            Some(p) if slot.accepts(p.position) => -p.points,
            Some(_) => INELIGIBLE,
            None => 0.0,
        }
    };

    let assigned = min_cost_assignment(n, m, |row, col| cost(&slots.slots()[row], col));

    let mut total = 0.0;
    let mut chosen = Vec::with_capacity(n);
    for col in assigned {
        if let Some(p) = candidates.get(col).filter(|p| p.points > 0.0) {
            total += p.points;
            chosen.push(p.player_id.clone());
        }
    }
    WeeklyLineup { total, chosen }
}

/// Hungarian method for an `n x m` cost matrix with `n <= m`. Returns the
/// column assigned to each row.
fn min_cost_assignment(n: usize, m: usize, cost: impl Fn(usize, usize) -> f64) -> Vec<usize> {
    // 1-based potentials; column 0 is the virtual start.
    let mut u = vec![0.0f64; n + 1];
    let mut v = vec![0.0f64; m + 1];
    let mut row_of = vec![0usize; m + 1];
    let mut way = vec![0usize; m + 1];

    for row in 1..=n {
        row_of[0] = row;
        let mut col0 = 0;
        let mut min_v = vec![f64::INFINITY; m + 1];
        let mut used = vec![false; m + 1];
        loop {
            used[col0] = true;
            let row0 = row_of[col0];
            let mut delta = f64::INFINITY;
            let mut col1 = 0;
            for col in 1..=m {
                if used[col] {
                    continue;
                }
                let reduced = cost(row0 - 1, col - 1) - u[row0] - v[col];
                if reduced < min_v[col] {
                    min_v[col] = reduced;
                    way[col] = col0;
                }
                if min_v[col] < delta {
                    delta = min_v[col];
                    col1 = col;
                }
            }
            for col in 0..=m {
                if used[col] {
                    u[row_of[col]] += delta;
                    v[col] -= delta;
                } else {
                    min_v[col] -= delta;
                }
            }
            col0 = col1;
            if row_of[col0] == 0 {
                break;
            }
        }
        loop {
            let prev = way[col0];
            row_of[col0] = row_of[prev];
            col0 = prev;
            if col0 == 0 {
                break;
            }
        }
    }

    let mut assigned = vec![0usize; n];
    for col in 1..=m {
        if row_of[col] != 0 {
            assigned[row_of[col] - 1] = col - 1;
        }
    }
    assigned
}

/// Expand a matchup row into per-player scores. Players missing from the
/// directory are `Unknown` and can fill no slot.
pub fn weekly_players(matchup: &Matchup, positions: &HashMap<String, Position>) -> Vec<WeeklyPlayer> {
    matchup
        .players_points
        .iter()
        .map(|(pid, &points)| WeeklyPlayer {
            player_id: pid.clone(),
            position: positions.get(pid).copied().unwrap_or(Position::Unknown),
            points,
        })
        .collect()
}

/// Add one week's optimal totals into the running map.
pub fn accumulate_week(
    max_pf: &mut MaxPfMap,
    matchups: &[Matchup],
    positions: &HashMap<String, Position>,
    slots: &StarterSlots,
) {
    for matchup in matchups {
        let Some(roster_id) = matchup.roster_id.filter(|&id| id > 0) else {
            continue;
        };
        let lineup = fill_weekly_max(&weekly_players(matchup, positions), slots);
        *max_pf.entry(roster_id).or_insert(0.0) += lineup.total;
    }
}

// ---------------------------------------------------------------------------
// Season window
// ---------------------------------------------------------------------------

/// Last regular-season week to include.
///
/// `playoff_week_start - 1` (default 14). While the NFL is in its regular
/// season the window is clamped to the current week. In the off-season and
/// post-season the provider's week counter resets, so it is ignored and the
/// full regular season is used.
pub fn last_regular_season_week(playoff_week_start: Option<u32>, state: Option<&NflState>) -> u32 {
    let regular_last = match playoff_week_start {
        Some(start) if start > 1 => start - 1,
        _ => DEFAULT_REGULAR_SEASON_LAST_WEEK,
    };

    match state {
        Some(s) if s.is_regular_season() && s.week > 0 => regular_last.min(s.week),
        _ => regular_last,
    }
}

// ---------------------------------------------------------------------------
// Season calculation
// ---------------------------------------------------------------------------

/// Compute MaxPF for every roster in the league.
///
/// Never fails: a missing league falls back to default slots, a missing
/// player directory leaves every player `Unknown`, and a week whose matchups
/// cannot be fetched contributes nothing.
pub async fn calculate_season_max_pf(provider: &dyn LeagueProvider, league_id: &str) -> MaxPfMap {
    let league = match provider.league(league_id).await {
        Ok(league) => Some(league),
        Err(e) => {
            warn!(league_id, "league settings unavailable, using default lineup: {e:#}");
            None
        }
    };

    let slots = league
        .as_ref()
        .map(|l| StarterSlots::from_roster_positions(&l.roster_positions))
        .unwrap_or_else(StarterSlots::default_lineup);

    let positions = match provider.player_positions().await {
        Ok(p) => p,
        Err(e) => {
            warn!("player directory unavailable: {e:#}");
            HashMap::new()
        }
    };

    let state = match provider.nfl_state().await {
        Ok(s) => Some(s),
        Err(e) => {
            warn!("NFL state unavailable, using full regular season: {e:#}");
            None
        }
    };

    let playoff_week_start = league.as_ref().and_then(|l| l.settings.playoff_week_start);
    let last_week = last_regular_season_week(playoff_week_start, state.as_ref());
    info!(league_id, last_week, slots = slots.len(), "computing MaxPF");

    let mut max_pf = MaxPfMap::new();
    for week in 1..=last_week {
        let matchups = match provider.matchups(league_id, week).await {
            Ok(m) => m,
            Err(e) => {
                warn!(week, "skipping week: {e:#}");
                continue;
            }
        };
        accumulate_week(&mut max_pf, &matchups, &positions, &slots);
    }

    max_pf
}
