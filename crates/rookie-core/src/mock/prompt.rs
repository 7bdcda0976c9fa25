// Prompt templates for per-pick mock draft decisions.
//
// Each pick gets a system prompt (persona, constraints, style, required JSON
// shape) and a user prompt listing only the candidates the decision step may
// choose from. Persona, reason template, and style token rotate so a long
// draft does not read as one repeated paragraph.

use crate::draft::pick::Prospect;
use crate::mock::team::TeamProfile;

// ---------------------------------------------------------------------------
// Rotating text pools
// ---------------------------------------------------------------------------

/// One persona per draft slot, indexed by `(slot - 1) % 12`.
pub const PERSONAS: [&str; 12] = [
    "Balanced Strategist",
    "Ceiling Chaser",
    "Risk-Averse Planner",
    "Positional Scarcity Maximizer",
    "Immediate Impact Seeker",
    "Depth-First Builder",
    "Value Arbitrage Analyst",
    "Scheme Fit Purist",
    "Late Bloom Optimist",
    "Trade-Up Visionary",
    "Injury-Aware Realist",
    "Long-Term Dynasty Architect",
];

/// Writing patterns, indexed by overall pick position.
pub const REASON_TEMPLATES: [&str; 4] = [
    "Start with player name and role fit; follow with value vs generic alternatives; conclude with a minor risk.",
    "Open with player name + how he improves the lineup; compare to generic options; end with a tempered concern.",
    "Lead with player name and expected role contribution; discuss value and timing; add a light caveat.",
    "Begin with player name and team fit; touch on development path and value; mention one risk to monitor.",
];

/// Style guidance, indexed by pick position plus a small random jitter.
pub const STYLE_TOKENS: [&str; 5] = [
    "Write with concise sentences; avoid clichés.",
    "Use varied sentence openings; keep the tone analytical.",
    "Favor plain language; avoid buzzwords.",
    "Blend tactical and developmental notes; avoid repetition.",
    "Keep it practical and grounded; avoid sweeping claims.",
];

/// Upper bound (exclusive) of the style token jitter.
pub const STYLE_JITTER: usize = 3;

pub const LEAGUE_HINTS: &str =
    "Focus on player fit, role clarity, and overall value. Avoid repeating the same adjectives or stock phrases.";

/// Persona for a 1-based draft slot. Stable across rounds.
pub fn persona_for_slot(slot: u32) -> &'static str {
    PERSONAS[(slot.max(1) as usize - 1) % PERSONAS.len()]
}

/// Reason template for the pick at 0-based overall position `index`.
pub fn reason_template_for(index: usize) -> &'static str {
    REASON_TEMPLATES[index % REASON_TEMPLATES.len()]
}

/// Style token for the pick at `index` with `jitter` in `0..STYLE_JITTER`.
pub fn style_token_for(index: usize, jitter: usize) -> &'static str {
    STYLE_TOKENS[(index + jitter) % STYLE_TOKENS.len()]
}

// ---------------------------------------------------------------------------
// Prompts
// ---------------------------------------------------------------------------

/// System prompt for one pick.
pub fn system_prompt(team: &TeamProfile, style_token: &str) -> String {
    let mut prompt = String::with_capacity(1024);
    prompt.push_str(&format!(
        "You are the AI GM for {} in a closed-universe fantasy football league (no NFL teams/contracts). \
         Adopt the persona: \"{}\" for tone and decision style.\n",
        team.team_name, team.persona,
    ));
    prompt.push_str(
        "Follow constraints strictly:\n\
         - Only draft from the provided Available Players list.\n\
         - Only select from the TOP 10 ranked players remaining in the pool.\n\
         - Do not mention real-life contracts or NFL franchises.\n\
         - Prioritize upgrading likely starters first; consider depth second.\n\
         Avoid overemphasizing scarcity; focus on roster fit, role clarity, and value.\n",
    );
    prompt.push_str(&format!(
        "Style guidance: {style_token}. Aim for variety: change sentence openings, avoid stock phrases, \
         avoid repeating identical adjectives.\n"
    ));
    prompt.push_str(
        "Your response MUST be valid JSON only with two keys and no extra text: \
         { \"pick\": \"Exact Player Name\", \"reason\": \"3-5 sentences that start by restating the chosen \
         player's name and explain team fit, role clarity, value vs alternatives (generic only, no names), \
         and one minor risk/concern.\" }",
    );
    prompt
}

/// One candidate line: `Name (POS) [rank N, value V]`, value only when
/// positive.
pub fn format_candidate(p: &Prospect) -> String {
    if p.value > 0.0 {
        format!(
            "{} ({}) [rank {}, value {}]",
            p.name,
            p.position_label(),
            p.rank,
            p.value
        )
    } else {
        format!("{} ({}) [rank {}]", p.name, p.position_label(), p.rank)
    }
}

/// User prompt for one pick. `candidates` is the presented window, best
/// first.
pub fn user_prompt(
    pick_number: &str,
    team: &TeamProfile,
    candidates: &[Prospect],
    league_hints: &str,
    reason_template: &str,
) -> String {
    let mut prompt = String::with_capacity(1024);
    prompt.push_str(&format!("Pick: {pick_number}\nTeam: {}\n", team.team_name));
    if let Some(summary) = &team.roster_summary {
        prompt.push_str(&format!(
            "Roster: {} starters, {} depth players\n",
            summary.starters_count, summary.depth_count
        ));
    }
    prompt.push('\n');
    prompt.push_str(&format!("Draft context: {league_hints}\n"));
    prompt.push_str(&format!("Use this writing pattern: {reason_template}\n\n"));

    prompt.push_str("Available Players (TOP 10 ONLY):\n");
    for p in candidates {
        prompt.push_str(&format_candidate(p));
        prompt.push('\n');
    }

    prompt.push_str(
        "\nChoose the best pick for this team from ONLY the top 10 above and return JSON as specified.",
    );
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::pick::Position;
    use crate::mock::team::RosterSummary;

    fn team() -> TeamProfile {
        TeamProfile {
            team_name: "Gridiron Gurus".into(),
            owner_id: Some("u1".into()),
            persona: persona_for_slot(3),
            roster_summary: Some(RosterSummary {
                starters_count: 9,
                depth_count: 16,
            }),
        }
    }

    fn prospect(name: &str, rank: u32, value: f64) -> Prospect {
        Prospect {
            id: rank.to_string(),
            name: name.into(),
            position: Position::WideReceiver,
            position_code: None,
            rank,
            value,
        }
    }

    #[test]
    fn persona_is_stable_per_slot() {
        assert_eq!(persona_for_slot(1), "Balanced Strategist");
        assert_eq!(persona_for_slot(12), "Long-Term Dynasty Architect");
        assert_eq!(persona_for_slot(13), persona_for_slot(1));
        assert_eq!(persona_for_slot(0), persona_for_slot(1));
    }

    #[test]
    fn templates_rotate() {
        assert_eq!(reason_template_for(0), reason_template_for(4));
        assert_ne!(reason_template_for(0), reason_template_for(1));
        assert_eq!(style_token_for(3, 2), STYLE_TOKENS[0]);
    }

    #[test]
    fn system_prompt_carries_persona_style_and_shape() {
        let prompt = system_prompt(&team(), STYLE_TOKENS[1]);
        assert!(prompt.contains("Gridiron Gurus"));
        assert!(prompt.contains("Risk-Averse Planner"));
        assert!(prompt.contains(STYLE_TOKENS[1]));
        assert!(prompt.contains("\"pick\""));
        assert!(prompt.contains("TOP 10"));
    }

    #[test]
    fn user_prompt_lists_candidates() {
        let candidates = vec![prospect("Alpha One", 1, 7412.0), prospect("Beta Two", 2, 0.0)];
        let prompt = user_prompt("1.03", &team(), &candidates, LEAGUE_HINTS, REASON_TEMPLATES[2]);
        assert!(prompt.starts_with("Pick: 1.03\nTeam: Gridiron Gurus\n"));
        assert!(prompt.contains("Roster: 9 starters, 16 depth players"));
        assert!(prompt.contains("Alpha One (WR) [rank 1, value 7412]"));
        assert!(prompt.contains("Beta Two (WR) [rank 2]\n"));
        assert!(prompt.contains(REASON_TEMPLATES[2]));
    }
}
