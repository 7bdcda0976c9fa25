// Sleeper HTTP API client implementing the core league provider.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use rookie_core::draft::pick::Position;
use rookie_core::league::{
    player_positions_from_json, BracketMatch, DraftSummary, LeagueInfo, LeagueProvider,
    LeagueUser, Matchup, NflState, Roster, TradedPick,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, info};

pub const SLEEPER_API_URL: &str = "https://api.sleeper.app/v1";

/// Per-request ceiling. The player directory is several megabytes.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct SleeperClient {
    http: reqwest::Client,
    base_url: String,
    /// The player directory rarely changes; fetch it once per process.
    positions: OnceCell<HashMap<String, Position>>,
}

impl SleeperClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: SLEEPER_API_URL.to_string(),
            positions: OnceCell::new(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{path}", self.base_url);
        debug!(%url, "sleeper request");

        let response = self
            .http
            .get(&url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("GET {url} returned {status}");
        }

        response
            .json::<T>()
            .await
            .with_context(|| format!("failed to decode response from {url}"))
    }

    /// Sleeper answers `null` for empty collections on some endpoints.
    async fn get_list<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        Ok(self.get_json::<Option<Vec<T>>>(path).await?.unwrap_or_default())
    }
}

impl Default for SleeperClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LeagueProvider for SleeperClient {
    async fn nfl_state(&self) -> Result<NflState> {
        self.get_json("/state/nfl").await
    }

    async fn league(&self, league_id: &str) -> Result<LeagueInfo> {
        self.get_json(&format!("/league/{league_id}")).await
    }

    async fn user_leagues(&self, user_id: &str, season: u32) -> Result<Vec<LeagueInfo>> {
        self.get_list(&format!("/user/{user_id}/leagues/nfl/{season}"))
            .await
    }

    async fn users(&self, league_id: &str) -> Result<Vec<LeagueUser>> {
        self.get_list(&format!("/league/{league_id}/users")).await
    }

    async fn rosters(&self, league_id: &str) -> Result<Vec<Roster>> {
        self.get_list(&format!("/league/{league_id}/rosters")).await
    }

    async fn winners_bracket(&self, league_id: &str) -> Result<Vec<BracketMatch>> {
        self.get_list(&format!("/league/{league_id}/winners_bracket"))
            .await
    }

    async fn traded_picks(&self, league_id: &str) -> Result<Vec<TradedPick>> {
        self.get_list(&format!("/league/{league_id}/traded_picks"))
            .await
    }

    async fn drafts(&self, league_id: &str) -> Result<Vec<DraftSummary>> {
        self.get_list(&format!("/league/{league_id}/drafts")).await
    }

    async fn matchups(&self, league_id: &str, week: u32) -> Result<Vec<Matchup>> {
        self.get_list(&format!("/league/{league_id}/matchups/{week}"))
            .await
    }

    async fn player_positions(&self) -> Result<HashMap<String, Position>> {
        let positions = self
            .positions
            .get_or_try_init(|| async {
                let directory: Value = self.get_json("/players/nfl").await?;
                let positions = player_positions_from_json(&directory);
                info!(players = positions.len(), "player directory loaded");
                Ok::<_, anyhow::Error>(positions)
            })
            .await?;
        Ok(positions.clone())
    }
}
