// Rookie draft order: non-playoff teams by MaxPF, playoff teams by bracket
// finish, then traded-pick ownership per round.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::league::{BracketMatch, LeagueUser, Roster, TradedPick};
use crate::maxpf::MaxPfMap;

/// Number of teams assumed to make the playoffs when the bracket is empty.
pub const PLAYOFF_TEAMS: usize = 6;

/// Rounds a rookie draft can have.
pub const MAX_ROUNDS: u32 = 7;

/// Bounds on the number of picks in one simulated draft.
pub const MIN_TOTAL_PICKS: usize = 12;
pub const MAX_TOTAL_PICKS: usize = 84;

const UNKNOWN_TEAM: &str = "Unknown Team";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Original (pre-trade) owner of a draft slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftSlot {
    pub slot: u32,
    pub roster_id: u32,
}

/// A slot in a specific round after traded-pick overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundSlot {
    pub round: u32,
    pub slot: u32,
    pub original_roster_id: u32,
    /// Current owner after trades.
    pub roster_id: u32,
}

impl RoundSlot {
    pub fn is_traded(&self) -> bool {
        self.roster_id != self.original_roster_id
    }
}

/// Final per-round, per-slot ownership with display data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedDraftEntry {
    pub round: u32,
    pub slot: u32,
    pub roster_id: u32,
    pub original_roster_id: u32,
    pub team_name: String,
    pub owner_user_id: Option<String>,
    pub avatar_url: Option<String>,
    /// MaxPF of the original slot owner, when known.
    pub maxpf: Option<f64>,
    pub wins: u32,
    pub losses: u32,
    pub ties: u32,
    pub fpts: f64,
}

/// A non-playoff roster with the fields the ordering looks at.
#[derive(Debug, Clone, PartialEq)]
pub struct NonPlayoffTeam {
    pub roster_id: u32,
    pub maxpf: f64,
    pub win_pct: f64,
    pub fpts: f64,
}

// ---------------------------------------------------------------------------
// Playoff participants
// ---------------------------------------------------------------------------

/// Every roster id that appears as t1, t2, winner, or loser in the bracket.
pub fn playoff_participants(bracket: &[BracketMatch]) -> BTreeSet<u32> {
    bracket
        .iter()
        .flat_map(|m| [m.t1, m.t2, m.w, m.l])
        .flatten()
        .collect()
}

/// Rank rosters by wins desc, then points-for desc, then roster id asc.
pub fn rank_by_record<'a>(rosters: impl IntoIterator<Item = &'a Roster>) -> Vec<u32> {
    let mut ranked: Vec<&Roster> = rosters.into_iter().collect();
    ranked.sort_by(|a, b| {
        b.wins
            .cmp(&a.wins)
            .then_with(|| b.fpts.total_cmp(&a.fpts))
            .then_with(|| a.roster_id.cmp(&b.roster_id))
    });
    ranked.into_iter().map(|r| r.roster_id).collect()
}

/// Placeholder playoff set for a season without bracket data: the top
/// `count` rosters by record.
pub fn infer_playoff_teams(rosters: &[Roster], count: usize) -> BTreeSet<u32> {
    rank_by_record(rosters).into_iter().take(count).collect()
}

// ---------------------------------------------------------------------------
// Non-playoff ordering
// ---------------------------------------------------------------------------

/// Sort non-playoff teams for slots 1.. (worst first).
///
/// MaxPF asc, then win% asc, then points-for asc. Teams still tied are
/// ordered by a coin flip drawn from `rng`; every team gets its flip up front
/// so the comparator stays a total order.
pub fn sort_non_playoff<R: Rng + ?Sized>(teams: Vec<NonPlayoffTeam>, rng: &mut R) -> Vec<NonPlayoffTeam> {
    let mut keyed: Vec<(u64, NonPlayoffTeam)> =
        teams.into_iter().map(|t| (rng.gen::<u64>(), t)).collect();
    keyed.sort_by(|(ka, a), (kb, b)| compare_non_playoff(a, b).then_with(|| ka.cmp(kb)));
    keyed.into_iter().map(|(_, t)| t).collect()
}

/// The deterministic part of the non-playoff ordering.
pub fn compare_non_playoff(a: &NonPlayoffTeam, b: &NonPlayoffTeam) -> Ordering {
    a.maxpf
        .total_cmp(&b.maxpf)
        .then_with(|| a.win_pct.total_cmp(&b.win_pct))
        .then_with(|| a.fpts.total_cmp(&b.fpts))
}

// ---------------------------------------------------------------------------
// Playoff finish order
// ---------------------------------------------------------------------------

/// Roster ids in bracket finish order, champion first.
///
/// Completed placement games (`p` set, winner and loser known) win when
/// present: sorted by placement, each contributes winner then loser. Without
/// them, the final's winner and loser lead and everyone else follows by the
/// latest round they appeared in.
pub fn playoff_finish_order(bracket: &[BracketMatch]) -> Vec<u32> {
    if bracket.is_empty() {
        return Vec::new();
    }

    let mut placement: Vec<&BracketMatch> = bracket
        .iter()
        .filter(|m| m.p.is_some() && m.w.is_some() && m.l.is_some())
        .collect();

    if !placement.is_empty() {
        placement.sort_by_key(|m| m.p);
        let mut finish = Vec::new();
        for m in placement {
            for id in [m.w, m.l].into_iter().flatten() {
                if !finish.contains(&id) {
                    finish.push(id);
                }
            }
        }
        return finish;
    }

    let final_round = bracket.iter().map(|m| m.r).max().unwrap_or(0);
    let final_match = bracket
        .iter()
        .find(|m| m.r == final_round && m.w.is_some() && m.l.is_some());
    let champion = final_match.and_then(|m| m.w);
    let runner_up = final_match.and_then(|m| m.l);

    let mut last_round: HashMap<u32, u32> = HashMap::new();
    let mut participants: Vec<u32> = Vec::new();
    for m in bracket {
        for id in [m.t1, m.t2].into_iter().flatten() {
            if !participants.contains(&id) {
                participants.push(id);
            }
        }
        for id in [m.t1, m.t2, m.w, m.l].into_iter().flatten() {
            let entry = last_round.entry(id).or_insert(0);
            *entry = (*entry).max(m.r);
        }
    }

    let mut order: Vec<u32> = [champion, runner_up].into_iter().flatten().collect();
    let mut others: Vec<u32> = participants
        .into_iter()
        .filter(|id| Some(*id) != champion && Some(*id) != runner_up)
        .collect();
    // Stable: first-appearance order breaks equal rounds.
    others.sort_by(|a, b| last_round[b].cmp(&last_round[a]));
    order.extend(others);
    order
}

// ---------------------------------------------------------------------------
// Base order
// ---------------------------------------------------------------------------

/// Build the slot -> original owner order for one draft.
///
/// Non-playoff rosters take slots `1..=n`, playoff rosters fill from the
/// last slot down (champion last). With 12 rosters and a 6-team bracket that
/// is slots 1-6 and 7-12. Bracket ids that are not league rosters are
/// ignored; playoff rosters missing from the finish order are placed after
/// it by record.
pub fn build_draft_order<R: Rng + ?Sized>(
    rosters: &[Roster],
    max_pf: &MaxPfMap,
    bracket: &[BracketMatch],
    rng: &mut R,
) -> Vec<DraftSlot> {
    let roster_ids: BTreeSet<u32> = rosters.iter().map(|r| r.roster_id).collect();

    let mut playoff: BTreeSet<u32> = playoff_participants(bracket)
        .intersection(&roster_ids)
        .copied()
        .collect();
    if playoff.is_empty() && !rosters.is_empty() {
        playoff = infer_playoff_teams(rosters, PLAYOFF_TEAMS);
    }

    let non_playoff: Vec<NonPlayoffTeam> = rosters
        .iter()
        .filter(|r| !playoff.contains(&r.roster_id))
        .map(|r| NonPlayoffTeam {
            roster_id: r.roster_id,
            maxpf: max_pf.get(&r.roster_id).copied().unwrap_or(0.0),
            win_pct: r.win_pct(),
            fpts: r.fpts,
        })
        .collect();

    let mut order: Vec<DraftSlot> = sort_non_playoff(non_playoff, rng)
        .into_iter()
        .enumerate()
        .map(|(idx, t)| DraftSlot {
            slot: idx as u32 + 1,
            roster_id: t.roster_id,
        })
        .collect();
    let first_playoff_slot = order.len() as u32 + 1;

    let mut finish: Vec<u32> = playoff_finish_order(bracket)
        .into_iter()
        .filter(|id| playoff.contains(id))
        .collect();
    let unplaced = rosters
        .iter()
        .filter(|r| playoff.contains(&r.roster_id) && !finish.contains(&r.roster_id));
    finish.extend(rank_by_record(unplaced));

    let mut slot = rosters.len() as u32;
    for roster_id in finish {
        if slot < first_playoff_slot {
            break;
        }
        order.push(DraftSlot { slot, roster_id });
        slot -= 1;
    }

    order.sort_by_key(|d| d.slot);
    order
}

// ---------------------------------------------------------------------------
// Traded picks and multi-round orders
// ---------------------------------------------------------------------------

/// Apply traded-pick ownership for one `(season, round)`.
pub fn apply_traded_picks(
    base: &[DraftSlot],
    trades: &[TradedPick],
    season: u32,
    round: u32,
) -> Vec<RoundSlot> {
    let mut sorted: Vec<DraftSlot> = base.to_vec();
    sorted.sort_by_key(|d| d.slot);

    sorted
        .into_iter()
        .map(|entry| {
            let trade = trades
                .iter()
                .find(|tp| tp.season == season && tp.round == round && tp.roster_id == entry.roster_id);
            RoundSlot {
                round,
                slot: entry.slot,
                original_roster_id: entry.roster_id,
                roster_id: trade.map_or(entry.roster_id, |tp| tp.owner_id),
            }
        })
        .collect()
}

/// Trades that apply to a given season and round.
pub fn trades_for_round(trades: &[TradedPick], season: u32, round: u32) -> usize {
    trades
        .iter()
        .filter(|tp| tp.season == season && tp.round == round)
        .count()
}

/// Clamp a requested round count into `1..=MAX_ROUNDS`.
pub fn clamp_rounds(rounds: u32) -> u32 {
    rounds.clamp(1, MAX_ROUNDS)
}

/// Number of picks to simulate: `rounds * 12` unless overridden, bounded to
/// `MIN_TOTAL_PICKS..=MAX_TOTAL_PICKS`.
pub fn total_pick_cap(rounds: u32, max_picks: Option<usize>) -> usize {
    let requested = max_picks
        .filter(|&n| n > 0)
        .unwrap_or(clamp_rounds(rounds) as usize * 12);
    requested.clamp(MIN_TOTAL_PICKS, MAX_TOTAL_PICKS)
}

/// Rounds `1..=rounds`, each with its own traded-pick overrides.
pub fn build_multi_round_order(
    base: &[DraftSlot],
    trades: &[TradedPick],
    season: u32,
    rounds: u32,
) -> Vec<RoundSlot> {
    (1..=clamp_rounds(rounds))
        .flat_map(|round| apply_traded_picks(base, trades, season, round))
        .collect()
}

/// Attach team names, avatars, records, and MaxPF to round slots. Name,
/// avatar and record follow the current owner; MaxPF stays with the slot's
/// original roster.
pub fn resolve_entries(
    slots: &[RoundSlot],
    rosters: &[Roster],
    users: &[LeagueUser],
    max_pf: &MaxPfMap,
) -> Vec<ResolvedDraftEntry> {
    let roster_by_id: HashMap<u32, &Roster> = rosters.iter().map(|r| (r.roster_id, r)).collect();
    let user_by_id: HashMap<&str, &LeagueUser> =
        users.iter().map(|u| (u.user_id.as_str(), u)).collect();

    slots
        .iter()
        .map(|rs| {
            let roster = roster_by_id.get(&rs.roster_id).copied();
            let owner_user_id = roster.and_then(|r| r.owner_id.clone());
            let user = owner_user_id
                .as_deref()
                .and_then(|id| user_by_id.get(id).copied());

            ResolvedDraftEntry {
                round: rs.round,
                slot: rs.slot,
                roster_id: rs.roster_id,
                original_roster_id: rs.original_roster_id,
                team_name: user
                    .and_then(|u| u.label())
                    .unwrap_or(UNKNOWN_TEAM)
                    .to_string(),
                owner_user_id,
                avatar_url: user.and_then(|u| u.avatar_url()),
                maxpf: max_pf.get(&rs.original_roster_id).copied(),
                wins: roster.map_or(0, |r| r.wins),
                losses: roster.map_or(0, |r| r.losses),
                ties: roster.map_or(0, |r| r.ties),
                fpts: roster.map_or(0.0, |r| r.fpts),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn roster(id: u32, wins: u32, losses: u32, fpts: f64) -> Roster {
        Roster {
            roster_id: id,
            owner_id: Some(format!("user_{id}")),
            wins,
            losses,
            ties: 0,
            fpts,
            players: vec![],
            starters: vec![],
        }
    }

    fn team(id: u32, maxpf: f64, win_pct: f64, fpts: f64) -> NonPlayoffTeam {
        NonPlayoffTeam {
            roster_id: id,
            maxpf,
            win_pct,
            fpts,
        }
    }

    fn twelve_rosters() -> Vec<Roster> {
        (1..=12)
            .map(|id| roster(id, 14 - id, id, 1500.0 - f64::from(id) * 10.0))
            .collect()
    }

    fn game(r: u32, t1: u32, t2: u32, w: Option<u32>, p: Option<u32>) -> BracketMatch {
        BracketMatch {
            r,
            m: None,
            t1: Some(t1),
            t2: Some(t2),
            w,
            l: w.map(|w| if w == t1 { t2 } else { t1 }),
            p,
        }
    }

    #[test]
    fn participants_include_all_bracket_roles() {
        let bracket = vec![
            BracketMatch { r: 1, t1: Some(1), t2: Some(2), w: Some(1), l: Some(2), ..Default::default() },
            BracketMatch { r: 2, t1: Some(3), w: Some(5), ..Default::default() },
        ];
        let ids = playoff_participants(&bracket);
        assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec![1, 2, 3, 5]);
    }

    #[test]
    fn non_playoff_lower_maxpf_picks_first() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let teams = vec![team(1, 50.0, 5.0 / 14.0, 1000.0), team(2, 40.0, 6.0 / 14.0, 900.0)];
        let sorted = sort_non_playoff(teams, &mut rng);
        assert_eq!(sorted[0].roster_id, 2);
        assert_eq!(sorted[1].roster_id, 1);
    }

    #[test]
    fn tie_break_cascade_is_deterministic_before_coin_flip() {
        // Same MaxPF: lower win% first regardless of seed.
        for seed in 0..16 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let sorted = sort_non_playoff(vec![team(1, 80.0, 0.5, 900.0), team(2, 80.0, 0.3, 1200.0)], &mut rng);
            assert_eq!(sorted[0].roster_id, 2);
        }
        // Same MaxPF and win%: lower points-for first regardless of seed.
        for seed in 0..16 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let sorted = sort_non_playoff(vec![team(1, 80.0, 0.5, 1100.0), team(2, 80.0, 0.5, 1000.0)], &mut rng);
            assert_eq!(sorted[0].roster_id, 2);
        }
    }

    #[test]
    fn full_tie_is_seeded_coin_flip() {
        let tied = || vec![team(1, 80.0, 0.5, 1000.0), team(2, 80.0, 0.5, 1000.0)];

        let first = |seed| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            sort_non_playoff(tied(), &mut rng)[0].roster_id
        };

        // Reproducible for a fixed seed.
        assert_eq!(first(7), first(7));

        // Both outcomes occur across seeds.
        let outcomes: BTreeSet<u32> = (0..64).map(first).collect();
        assert_eq!(outcomes.len(), 2);
    }

    #[test]
    fn finish_order_prefers_placement_games() {
        let bracket = vec![
            game(1, 1, 8, Some(1), None),
            game(3, 1, 2, Some(2), Some(1)),
            game(3, 3, 4, Some(4), Some(3)),
            game(3, 5, 6, Some(5), Some(5)),
        ];
        assert_eq!(playoff_finish_order(&bracket), vec![2, 1, 4, 3, 5, 6]);
    }

    #[test]
    fn finish_order_without_placement_uses_final_and_last_round() {
        let bracket = vec![
            game(1, 3, 6, Some(3), None),
            game(1, 4, 5, Some(4), None),
            game(2, 1, 4, Some(1), None),
            game(2, 2, 3, Some(3), None),
            game(3, 1, 3, Some(3), None),
        ];
        let order = playoff_finish_order(&bracket);
        assert_eq!(order[0], 3);
        assert_eq!(order[1], 1);
        // Semifinal losers (round 2) before quarterfinal losers (round 1).
        assert_eq!(&order[2..4], &[4, 2]);
        assert_eq!(&order[4..], &[6, 5]);
    }

    #[test]
    fn finish_order_empty_bracket() {
        assert!(playoff_finish_order(&[]).is_empty());
    }

    #[test]
    fn draft_order_is_complete_for_twelve_rosters() {
        let rosters = twelve_rosters();
        let max_pf: MaxPfMap = rosters.iter().map(|r| (r.roster_id, 1000.0 + f64::from(r.roster_id))).collect();
        let bracket = vec![
            game(1, 3, 6, Some(3), None),
            game(1, 4, 5, Some(4), None),
            game(2, 1, 4, Some(1), None),
            game(2, 2, 3, Some(3), None),
            game(3, 1, 3, Some(3), Some(1)),
            game(3, 2, 4, Some(2), Some(3)),
            game(3, 5, 6, Some(6), Some(5)),
        ];
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let order = build_draft_order(&rosters, &max_pf, &bracket, &mut rng);

        assert_eq!(order.len(), 12);
        let slots: Vec<u32> = order.iter().map(|d| d.slot).collect();
        assert_eq!(slots, (1..=12).collect::<Vec<_>>());
        let owners: BTreeSet<u32> = order.iter().map(|d| d.roster_id).collect();
        assert_eq!(owners.len(), 12);

        // Champion picks last, runner-up 11th.
        assert_eq!(order[11].roster_id, 3);
        assert_eq!(order[10].roster_id, 1);
        // Non-playoff teams 7..12 by MaxPF asc.
        let first_six: Vec<u32> = order[..6].iter().map(|d| d.roster_id).collect();
        assert_eq!(first_six, vec![7, 8, 9, 10, 11, 12]);
    }

    #[test]
    fn empty_bracket_infers_top_six_by_record() {
        let rosters = twelve_rosters();
        let max_pf = MaxPfMap::new();
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let order = build_draft_order(&rosters, &max_pf, &[], &mut rng);

        assert_eq!(order.len(), 12);
        // Roster 1 has the best record: treated as champion.
        assert_eq!(order[11].roster_id, 1);
        assert_eq!(order[6].roster_id, 6);
        let non_playoff: BTreeSet<u32> = order[..6].iter().map(|d| d.roster_id).collect();
        assert_eq!(non_playoff, (7..=12).collect());
    }

    #[test]
    fn bracket_ids_outside_league_are_ignored() {
        let rosters = twelve_rosters();
        let bracket = vec![game(1, 1, 99, Some(1), Some(1))];
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let order = build_draft_order(&rosters, &MaxPfMap::new(), &bracket, &mut rng);
        assert_eq!(order.len(), 12);
        assert!(order.iter().all(|d| d.roster_id != 99));
        assert_eq!(order[11].roster_id, 1);
    }

    #[test]
    fn traded_pick_overrides_only_matching_round() {
        let base = vec![DraftSlot { slot: 3, roster_id: 7 }];
        let trades = vec![TradedPick {
            season: 2026,
            round: 1,
            roster_id: 7,
            owner_id: 9,
            previous_owner_id: Some(7),
        }];

        let round_one = apply_traded_picks(&base, &trades, 2026, 1);
        assert_eq!(round_one[0].roster_id, 9);
        assert_eq!(round_one[0].original_roster_id, 7);
        assert!(round_one[0].is_traded());

        let round_two = apply_traded_picks(&base, &trades, 2026, 2);
        assert_eq!(round_two[0].roster_id, 7);
        assert!(!round_two[0].is_traded());

        let other_season = apply_traded_picks(&base, &trades, 2027, 1);
        assert_eq!(other_season[0].roster_id, 7);
        assert_eq!(trades_for_round(&trades, 2026, 1), 1);
    }

    #[test]
    fn multi_round_order_is_round_major() {
        let base: Vec<DraftSlot> = (1..=12).map(|s| DraftSlot { slot: s, roster_id: s }).collect();
        let order = build_multi_round_order(&base, &[], 2026, 2);
        assert_eq!(order.len(), 24);
        assert_eq!((order[0].round, order[0].slot), (1, 1));
        assert_eq!((order[12].round, order[12].slot), (2, 1));
        assert_eq!(build_multi_round_order(&base, &[], 2026, 0).len(), 12);
        assert_eq!(build_multi_round_order(&base, &[], 2026, 10).len(), 84);
    }

    #[test]
    fn pick_cap_bounds() {
        assert_eq!(total_pick_cap(2, None), 24);
        assert_eq!(total_pick_cap(7, None), 84);
        assert_eq!(total_pick_cap(9, None), 84);
        assert_eq!(total_pick_cap(1, Some(5)), 12);
        assert_eq!(total_pick_cap(3, Some(200)), 84);
        assert_eq!(total_pick_cap(3, Some(0)), 36);
    }

    #[test]
    fn resolve_entries_uses_current_owner_name_and_original_maxpf() {
        let rosters = vec![roster(7, 3, 11, 900.0), roster(9, 10, 4, 1400.0)];
        let users = vec![
            LeagueUser {
                user_id: "user_7".into(),
                display_name: Some("Seven".into()),
                username: None,
                avatar: None,
            },
            LeagueUser {
                user_id: "user_9".into(),
                display_name: None,
                username: Some("nine".into()),
                avatar: Some("av9".into()),
            },
        ];
        let max_pf: MaxPfMap = [(7, 1111.0), (9, 1999.0)].into_iter().collect();
        let slots = vec![RoundSlot {
            round: 1,
            slot: 3,
            original_roster_id: 7,
            roster_id: 9,
        }];
        let resolved = resolve_entries(&slots, &rosters, &users, &max_pf);
        assert_eq!(resolved[0].team_name, "nine");
        assert_eq!(resolved[0].owner_user_id.as_deref(), Some("user_9"));
        assert_eq!(resolved[0].maxpf, Some(1111.0));
        assert_eq!(resolved[0].wins, 10);
        assert_eq!(resolved[0].losses, 4);
        assert!((resolved[0].fpts - 1400.0).abs() < 1e-9);
        assert!(resolved[0].avatar_url.as_deref().unwrap().ends_with("av9"));

        let orphan = vec![RoundSlot { round: 1, slot: 1, original_roster_id: 42, roster_id: 42 }];
        let resolved = resolve_entries(&orphan, &rosters, &users, &max_pf);
        assert_eq!(resolved[0].team_name, "Unknown Team");
        assert_eq!(resolved[0].maxpf, None);
    }
}
