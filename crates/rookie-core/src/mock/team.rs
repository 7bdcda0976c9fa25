// Per-pick team context: who is on the clock and how their roster looks.

use serde::{Deserialize, Serialize};

use crate::draft::order::ResolvedDraftEntry;
use crate::draft::pick::format_pick_number;
use crate::league::Roster;
use crate::mock::prompt::persona_for_slot;

/// Starter and depth counts for a roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterSummary {
    pub starters_count: usize,
    /// Rostered players not in the starting lineup.
    pub depth_count: usize,
}

impl RosterSummary {
    pub fn from_roster(roster: &Roster) -> Self {
        let depth_count = roster
            .players
            .iter()
            .filter(|id| !roster.starters.contains(id))
            .count();
        Self {
            starters_count: roster.starters.len(),
            depth_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamProfile {
    pub team_name: String,
    pub owner_id: Option<String>,
    pub persona: &'static str,
    pub roster_summary: Option<RosterSummary>,
}

/// One pick in the overall draft sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftTurn {
    pub round: u32,
    pub slot: u32,
    pub team: TeamProfile,
}

impl DraftTurn {
    pub fn pick_number(&self) -> String {
        format_pick_number(self.round, self.slot)
    }
}

/// Turn resolved order entries into draft turns with personas and roster
/// summaries of the current owners.
pub fn build_turns(entries: &[ResolvedDraftEntry], rosters: &[Roster]) -> Vec<DraftTurn> {
    entries
        .iter()
        .map(|entry| {
            let roster = rosters.iter().find(|r| r.roster_id == entry.roster_id);
            DraftTurn {
                round: entry.round,
                slot: entry.slot,
                team: TeamProfile {
                    team_name: entry.team_name.clone(),
                    owner_id: entry.owner_user_id.clone(),
                    persona: persona_for_slot(entry.slot),
                    roster_summary: roster.map(RosterSummary::from_roster),
                },
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster() -> Roster {
        Roster {
            roster_id: 5,
            owner_id: Some("u5".into()),
            wins: 7,
            losses: 7,
            ties: 0,
            fpts: 1500.0,
            players: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            starters: vec!["a".into(), "c".into()],
        }
    }

    #[test]
    fn summary_counts_depth_outside_starters() {
        let summary = RosterSummary::from_roster(&roster());
        assert_eq!(summary.starters_count, 2);
        assert_eq!(summary.depth_count, 2);
    }

    #[test]
    fn turns_carry_slot_persona_and_owner_summary() {
        let entry = ResolvedDraftEntry {
            round: 2,
            slot: 5,
            roster_id: 5,
            original_roster_id: 9,
            team_name: "Five".into(),
            owner_user_id: Some("u5".into()),
            avatar_url: None,
            maxpf: None,
            wins: 7,
            losses: 7,
            ties: 0,
            fpts: 1500.0,
        };
        let turns = build_turns(&[entry], &[roster()]);
        assert_eq!(turns[0].pick_number(), "2.05");
        assert_eq!(turns[0].team.persona, "Immediate Impact Seeker");
        assert_eq!(turns[0].team.roster_summary.unwrap().depth_count, 2);
    }
}
