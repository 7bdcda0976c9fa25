// Prospect pool: ingestion of loosely-shaped ranking feeds and the immutable
// pool the mock draft consumes.

use std::path::Path;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{info, warn};

use crate::db::Database;
use crate::draft::pick::{Position, Prospect};

/// Document key used for the database fallback source.
pub const POOL_DOCUMENT_KEY: &str = "player_pool";

/// Candidates shown to the decision step for each pick.
pub const PRESENTED_CANDIDATES: usize = 10;

// Accepted aliases per canonical field, in priority order.
const ID_KEYS: &[&str] = &["playerID", "id", "player_id"];
const NAME_KEYS: &[&str] = &["display_name", "name", "full_name", "player"];
// `position_code` first so stored pools keep codes outside the enum.
const POSITION_KEYS: &[&str] = &["position_code", "position", "pos"];
const RANK_KEYS: &[&str] = &["rank", "overallRank", "positionalRank"];
const VALUE_KEYS: &[&str] = &["value", "ktc_value", "superflexValue", "ktc"];

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("player pool source not found: {0}")]
    SourceMissing(String),

    #[error("failed to read player pool at {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse player pool from {origin}: {source}")]
    Parse {
        origin: String,
        source: serde_json::Error,
    },

    #[error("player pool document lookup failed: {0}")]
    Store(String),

    #[error("player pool from {0} is not a JSON array of prospects")]
    InvalidShape(String),

    #[error("player pool is empty")]
    Empty,
}

// ---------------------------------------------------------------------------
// ProspectPool
// ---------------------------------------------------------------------------

/// Ranked prospects, best first. Never mutated in place: removing a prospect
/// returns the remaining pool.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProspectPool {
    prospects: Vec<Prospect>,
}

impl ProspectPool {
    /// Build a pool, sorting by rank. Callers that need unique ranks go
    /// through [`normalize_pool`].
    pub fn new(mut prospects: Vec<Prospect>) -> Self {
        prospects.sort_by_key(|p| p.rank);
        Self { prospects }
    }

    pub fn len(&self) -> usize {
        self.prospects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prospects.is_empty()
    }

    pub fn prospects(&self) -> &[Prospect] {
        &self.prospects
    }

    /// Best player available.
    pub fn best(&self) -> Option<&Prospect> {
        self.prospects.first()
    }

    /// The `n` best remaining prospects.
    pub fn top(&self, n: usize) -> &[Prospect] {
        &self.prospects[..n.min(self.prospects.len())]
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.position_of(name).is_some()
    }

    fn position_of(&self, name: &str) -> Option<usize> {
        let wanted = name.trim().to_lowercase();
        self.prospects
            .iter()
            .position(|p| p.name.to_lowercase() == wanted)
    }

    /// Remove a prospect by case-insensitive name. Returns the prospect and
    /// the remaining pool, or `None` when the name is not in the pool.
    pub fn pop_by_name(&self, name: &str) -> Option<(Prospect, ProspectPool)> {
        let idx = self.position_of(name)?;
        let mut rest = self.prospects.clone();
        let picked = rest.remove(idx);
        Some((picked, ProspectPool { prospects: rest }))
    }

    /// Remove the best player available.
    pub fn pop_best(&self) -> Option<(Prospect, ProspectPool)> {
        let (first, rest) = self.prospects.split_first()?;
        Some((
            first.clone(),
            ProspectPool {
                prospects: rest.to_vec(),
            },
        ))
    }

    /// The pool without any of `names` (case-insensitive).
    pub fn without<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> ProspectPool {
        let taken: Vec<String> = names.into_iter().map(|n| n.trim().to_lowercase()).collect();
        ProspectPool {
            prospects: self
                .prospects
                .iter()
                .filter(|p| !taken.contains(&p.name.to_lowercase()))
                .cloned()
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

fn first_present<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().filter_map(|k| obj.get(*k)).find(|v| match v {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        _ => true,
    })
}

/// Numbers pass through; numeric strings lose thousands separators.
fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.replace(',', "").trim().parse().ok(),
        _ => None,
    }
}

fn coerce_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Map one raw feed entry to a prospect. `idx` is the entry's position in the
/// feed and supplies the id, rank, and value when those are absent.
fn normalize_entry(idx: usize, obj: &Map<String, Value>) -> Option<Prospect> {
    let name = first_present(obj, NAME_KEYS).and_then(coerce_string)?;

    let id = first_present(obj, ID_KEYS)
        .and_then(coerce_string)
        .unwrap_or_else(|| (idx + 1).to_string());
    let position_code = first_present(obj, POSITION_KEYS)
        .and_then(Value::as_str)
        .map(|code| code.trim().to_uppercase());
    let position = position_code
        .as_deref()
        .map(Position::parse_lenient)
        .unwrap_or(Position::Unknown);
    let rank = first_present(obj, RANK_KEYS)
        .and_then(coerce_number)
        .filter(|r| *r >= 1.0)
        .map(|r| r.round() as u32)
        .unwrap_or(idx as u32 + 1);
    let value = first_present(obj, VALUE_KEYS)
        .and_then(coerce_number)
        .unwrap_or_else(|| placeholder_value(idx));

    Some(Prospect {
        id,
        name,
        position,
        position_code,
        rank,
        value,
    })
}

/// Value for feed entries that carry none: 100 for the first entry, one less
/// for each after it, never below 1.
fn placeholder_value(idx: usize) -> f64 {
    (100.0 - idx as f64).max(1.0)
}

/// Normalize raw feed entries into a pool.
///
/// Entries without a usable name are skipped. The result is sorted by rank;
/// duplicate ranks are renumbered `1..=n` in sorted order so ranks stay
/// unique.
pub fn normalize_pool(entries: &[Value]) -> ProspectPool {
    let mut prospects: Vec<Prospect> = entries
        .iter()
        .enumerate()
        .filter_map(|(idx, entry)| {
            let Some(obj) = entry.as_object() else {
                warn!(index = idx, "skipping non-object player pool entry");
                return None;
            };
            let prospect = normalize_entry(idx, obj);
            if prospect.is_none() {
                warn!(index = idx, "skipping player pool entry without a name");
            }
            prospect
        })
        .collect();

    prospects.sort_by_key(|p| p.rank);

    let has_duplicates = prospects.windows(2).any(|w| w[0].rank == w[1].rank);
    if has_duplicates {
        warn!("player pool has duplicate ranks; renumbering in sorted order");
        for (idx, p) in prospects.iter_mut().enumerate() {
            p.rank = idx as u32 + 1;
        }
    }

    ProspectPool { prospects }
}

/// Accept either a bare array or an object wrapping it under `players`.
fn entries_of(value: &Value) -> Option<&Vec<Value>> {
    match value {
        Value::Array(arr) => Some(arr),
        Value::Object(obj) => obj.get("players").and_then(Value::as_array),
        _ => None,
    }
}

fn pool_from_value(value: &Value, origin: &str) -> Result<ProspectPool, PoolError> {
    let entries = entries_of(value).ok_or_else(|| PoolError::InvalidShape(origin.to_string()))?;
    let pool = normalize_pool(entries);
    if pool.is_empty() {
        return Err(PoolError::Empty);
    }
    Ok(pool)
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load and normalize a pool from a JSON file.
pub fn load_pool_from_file(path: &Path) -> Result<ProspectPool, PoolError> {
    let display = path.display().to_string();
    if !path.exists() {
        return Err(PoolError::SourceMissing(display));
    }
    let raw = std::fs::read_to_string(path).map_err(|source| PoolError::Read {
        path: display.clone(),
        source,
    })?;
    let value: Value = serde_json::from_str(&raw).map_err(|source| PoolError::Parse {
        origin: display.clone(),
        source,
    })?;
    pool_from_value(&value, &display)
}

/// Load and normalize a pool from the document store.
pub fn load_pool_from_store(db: &Database) -> Result<ProspectPool, PoolError> {
    let doc = db
        .load_document(POOL_DOCUMENT_KEY)
        .map_err(|e| PoolError::Store(format!("{e:#}")))?
        .ok_or_else(|| PoolError::SourceMissing(format!("document '{POOL_DOCUMENT_KEY}'")))?;
    pool_from_value(&doc, &format!("document '{POOL_DOCUMENT_KEY}'"))
}

/// Load the prospect pool: the file first, then the document store.
///
/// A missing or unreadable file falls through to the store; a file that
/// parses but yields no prospects is an error, as is having no source at all.
pub fn load_pool(file: Option<&Path>, store: Option<&Database>) -> Result<ProspectPool, PoolError> {
    let mut last_err = PoolError::SourceMissing("no player pool source configured".into());

    if let Some(path) = file {
        match load_pool_from_file(path) {
            Ok(pool) => {
                info!(path = %path.display(), prospects = pool.len(), "loaded player pool from file");
                return Ok(pool);
            }
            Err(PoolError::Empty) => return Err(PoolError::Empty),
            Err(e) => {
                warn!("player pool file unavailable: {e}");
                last_err = e;
            }
        }
    }

    if let Some(db) = store {
        let pool = load_pool_from_store(db)?;
        info!(prospects = pool.len(), "loaded player pool from document store");
        return Ok(pool);
    }

    Err(last_err)
}
