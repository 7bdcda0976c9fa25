// League pipeline: fetch league context, resolve seasons, and turn it into
// draft-order reports and mock draft turns.

use anyhow::{bail, Context, Result};
use rand::Rng;
use serde::Serialize;
use tracing::{info, warn};

use crate::draft::order::{
    apply_traded_picks, build_draft_order, build_multi_round_order, resolve_entries,
    total_pick_cap, trades_for_round, ResolvedDraftEntry,
};
use crate::league::{BracketMatch, LeagueProvider, LeagueUser, Roster, TradedPick};
use crate::maxpf::{calculate_season_max_pf, MaxPfMap};
use crate::mock::team::{build_turns, DraftTurn};

/// Seasons before this are treated as a bad provider response.
const MIN_VALID_SEASON: u32 = 2000;

// ---------------------------------------------------------------------------
// Season and league resolution
// ---------------------------------------------------------------------------

/// The provider's current league year.
pub async fn resolve_league_year(provider: &dyn LeagueProvider) -> Result<u32> {
    let state = provider
        .nfl_state()
        .await
        .context("failed to fetch NFL state")?;
    if state.season < MIN_VALID_SEASON {
        bail!("could not resolve NFL season (got {})", state.season);
    }
    Ok(state.season)
}

/// Season the upcoming rookie draft belongs to.
///
/// While any league draft is still open (a non-empty status other than
/// `complete`) the draft is for the league year. Otherwise, or when drafts
/// cannot be fetched, it is for the following year.
pub async fn resolve_target_season(
    provider: &dyn LeagueProvider,
    league_id: &str,
    league_year: u32,
) -> u32 {
    let drafts = match provider.drafts(league_id).await {
        Ok(d) => d,
        Err(e) => {
            warn!(league_id, "drafts unavailable, assuming next season: {e:#}");
            return league_year + 1;
        }
    };

    let has_open_draft = drafts
        .iter()
        .any(|d| !d.status.is_empty() && !d.status.eq_ignore_ascii_case("complete"));
    if has_open_draft {
        league_year
    } else {
        league_year + 1
    }
}

/// Whether `name` matches any pattern. A pattern matches when every
/// `+`-separated term appears in the lowercased name.
pub fn league_name_matches(name: &str, patterns: &[String]) -> bool {
    let name = name.to_lowercase();
    patterns.iter().any(|pattern| {
        let mut terms = pattern
            .split('+')
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .peekable();
        terms.peek().is_some() && terms.all(|t| name.contains(&t))
    })
}

/// Find the commissioner's league by name, searching the current season and
/// then the previous one. The most recent match wins.
pub async fn resolve_league_id(
    provider: &dyn LeagueProvider,
    user_id: &str,
    patterns: &[String],
    league_year: u32,
) -> Result<String> {
    for season in [league_year, league_year.saturating_sub(1)] {
        let leagues = provider
            .user_leagues(user_id, season)
            .await
            .with_context(|| format!("failed to list leagues for {user_id} in {season}"))?;

        let best = leagues
            .into_iter()
            .filter(|l| league_name_matches(&l.name, patterns))
            .max_by_key(|l| l.season);
        if let Some(league) = best {
            info!(league_id = %league.league_id, name = %league.name, season = league.season, "resolved league");
            return Ok(league.league_id);
        }
    }

    bail!("no league matching {patterns:?} found for user {user_id}")
}

// ---------------------------------------------------------------------------
// League context
// ---------------------------------------------------------------------------

/// Everything the order builders need, fetched once per computation.
#[derive(Debug, Clone, Default)]
pub struct LeagueContext {
    pub league_id: String,
    pub league_name: String,
    pub league_year: u32,
    pub target_season: u32,
    pub users: Vec<LeagueUser>,
    pub rosters: Vec<Roster>,
    pub bracket: Vec<BracketMatch>,
    pub traded_picks: Vec<TradedPick>,
    pub max_pf: MaxPfMap,
}

/// Fetch users, rosters, bracket, and traded picks concurrently, then
/// compute MaxPF.
///
/// Users and rosters are required. A missing bracket falls back to the
/// inferred playoff field and missing trades leave every pick with its
/// original owner.
pub async fn load_league_context(
    provider: &dyn LeagueProvider,
    league_id: &str,
) -> Result<LeagueContext> {
    let league_year = resolve_league_year(provider).await?;

    let (league, users, rosters, bracket, traded_picks) = tokio::join!(
        provider.league(league_id),
        provider.users(league_id),
        provider.rosters(league_id),
        provider.winners_bracket(league_id),
        provider.traded_picks(league_id),
    );

    let users = users.with_context(|| format!("failed to fetch users for league {league_id}"))?;
    let rosters =
        rosters.with_context(|| format!("failed to fetch rosters for league {league_id}"))?;
    let league_name = match league {
        Ok(l) => l.name,
        Err(e) => {
            warn!(league_id, "league info unavailable: {e:#}");
            String::new()
        }
    };
    let bracket = bracket.unwrap_or_else(|e| {
        warn!(league_id, "winners bracket unavailable: {e:#}");
        Vec::new()
    });
    let traded_picks = traded_picks.unwrap_or_else(|e| {
        warn!(league_id, "traded picks unavailable: {e:#}");
        Vec::new()
    });

    let target_season = resolve_target_season(provider, league_id, league_year).await;
    let max_pf = calculate_season_max_pf(provider, league_id).await;

    info!(
        league_id,
        league_year,
        target_season,
        rosters = rosters.len(),
        trades = traded_picks.len(),
        "league context loaded"
    );

    Ok(LeagueContext {
        league_id: league_id.to_string(),
        league_name,
        league_year,
        target_season,
        users,
        rosters,
        bracket,
        traded_picks,
        max_pf,
    })
}

// ---------------------------------------------------------------------------
// Draft order report
// ---------------------------------------------------------------------------

/// Round-one order with current owners, as shown on the draft order page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DraftOrderReport {
    pub league_id: String,
    pub season: u32,
    pub entries: Vec<ResolvedDraftEntry>,
    /// Traded picks that apply to round one of `season`.
    pub used_trades_count: usize,
}

pub fn draft_order_report<R: Rng + ?Sized>(ctx: &LeagueContext, rng: &mut R) -> DraftOrderReport {
    let base = build_draft_order(&ctx.rosters, &ctx.max_pf, &ctx.bracket, rng);
    let slots = apply_traded_picks(&base, &ctx.traded_picks, ctx.target_season, 1);
    DraftOrderReport {
        league_id: ctx.league_id.clone(),
        season: ctx.target_season,
        entries: resolve_entries(&slots, &ctx.rosters, &ctx.users, &ctx.max_pf),
        used_trades_count: trades_for_round(&ctx.traded_picks, ctx.target_season, 1),
    }
}

pub async fn calculate_draft_order_for_league<R: Rng + ?Sized>(
    provider: &dyn LeagueProvider,
    league_id: &str,
    rng: &mut R,
) -> Result<DraftOrderReport> {
    let ctx = load_league_context(provider, league_id).await?;
    Ok(draft_order_report(&ctx, rng))
}

// ---------------------------------------------------------------------------
// Mock draft order
// ---------------------------------------------------------------------------

/// The full pick sequence for a mock draft.
#[derive(Debug, Clone)]
pub struct MockOrder {
    pub league_id: String,
    pub league_name: String,
    pub season: u32,
    pub turns: Vec<DraftTurn>,
}

/// Multi-round turns with per-round trades applied, cut to the pick cap.
pub fn mock_order<R: Rng + ?Sized>(
    ctx: &LeagueContext,
    rounds: u32,
    max_picks: Option<usize>,
    rng: &mut R,
) -> MockOrder {
    let base = build_draft_order(&ctx.rosters, &ctx.max_pf, &ctx.bracket, rng);
    let slots = build_multi_round_order(&base, &ctx.traded_picks, ctx.target_season, rounds);
    let entries = resolve_entries(&slots, &ctx.rosters, &ctx.users, &ctx.max_pf);

    let mut turns = build_turns(&entries, &ctx.rosters);
    turns.truncate(total_pick_cap(rounds, max_picks));

    MockOrder {
        league_id: ctx.league_id.clone(),
        league_name: ctx.league_name.clone(),
        season: ctx.target_season,
        turns,
    }
}

pub async fn build_mock_order<R: Rng + ?Sized>(
    provider: &dyn LeagueProvider,
    league_id: &str,
    rounds: u32,
    max_picks: Option<usize>,
    rng: &mut R,
) -> Result<MockOrder> {
    let ctx = load_league_context(provider, league_id).await?;
    Ok(mock_order(&ctx, rounds, max_picks, rng))
}
