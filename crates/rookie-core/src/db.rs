// SQLite persistence for published mock drafts, keyed documents, and
// background generation jobs.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::Value;

use crate::jobs::{JobConfig, JobProgress, JobRecord, JobResult, JobStatus};

/// Shortest lease a runner may hold on a job.
pub const MIN_LEASE: Duration = Duration::from_secs(5);

/// A finished mock draft ready to publish.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMockDraft {
    pub title: String,
    pub description: String,
    /// Markdown article.
    pub content: String,
    pub author: String,
    /// Structured metadata: league id, model, picks, trace.
    pub meta: Value,
}

/// A stored mock draft document.
#[derive(Debug, Clone, PartialEq)]
pub struct MockDraftRow {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub content: String,
    pub author: String,
    /// Publication date, `YYYY-MM-DD`.
    pub date: String,
    pub active: bool,
    pub archived: bool,
    pub meta: Value,
    pub created_at: String,
    pub updated_at: String,
}

/// SQLite-backed store for mock drafts, documents, and jobs.
pub struct Database {
    conn: Mutex<Connection>,
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl Database {
    /// Open (or create) a SQLite database at `path` and ensure all tables
    /// exist. Pass `":memory:"` for an ephemeral in-memory database.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS mock_drafts (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                title       TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                content     TEXT NOT NULL,
                author      TEXT NOT NULL,
                date        TEXT NOT NULL,
                active      INTEGER NOT NULL DEFAULT 0,
                archived    INTEGER NOT NULL DEFAULT 0,
                meta        TEXT NOT NULL DEFAULT '{}',
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_mock_drafts_active ON mock_drafts(active);

            CREATE TABLE IF NOT EXISTS documents (
                key        TEXT PRIMARY KEY,
                value      TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS mock_draft_jobs (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                status          TEXT NOT NULL,
                created_by      TEXT,
                config          TEXT NOT NULL,
                next_pick_index INTEGER NOT NULL DEFAULT 0,
                progress        TEXT NOT NULL,
                result          TEXT NOT NULL,
                error           TEXT,
                lease_id        TEXT,
                lease_until     INTEGER,
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL,
                started_at      TEXT,
                finished_at     TEXT
            );
            ",
        )
        .context("failed to create database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the database connection.
    ///
    /// Panics if the mutex is poisoned (another thread panicked while
    /// holding the lock).
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    // ------------------------------------------------------------------
    // Documents
    // ------------------------------------------------------------------

    /// Store a JSON document under `key`, replacing any previous value.
    pub fn save_document(&self, key: &str, value: &Value) -> Result<()> {
        let conn = self.conn();
        let json_str = serde_json::to_string(value).context("failed to serialize document")?;
        conn.execute(
            "INSERT OR REPLACE INTO documents (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![key, json_str, now_rfc3339()],
        )
        .context("failed to save document")?;
        Ok(())
    }

    /// Load a JSON document by `key`. Returns `None` if the key does not
    /// exist.
    pub fn load_document(&self, key: &str) -> Result<Option<Value>> {
        let conn = self.conn();
        let json_str: Option<String> = conn
            .query_row(
                "SELECT value FROM documents WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .context("failed to query document")?;

        json_str
            .map(|s| serde_json::from_str(&s).context("failed to deserialize document"))
            .transpose()
    }

    // ------------------------------------------------------------------
    // Mock drafts
    // ------------------------------------------------------------------

    /// Publish a mock draft as the single active document.
    ///
    /// Deactivating every active draft and inserting the new one happen in one
    /// transaction, so readers never observe two active drafts.
    pub fn publish_mock_draft(&self, draft: &NewMockDraft) -> Result<i64> {
        let mut conn = self.conn();
        let meta = serde_json::to_string(&draft.meta).context("failed to serialize draft meta")?;
        let now = chrono::Utc::now();
        let stamp = now.to_rfc3339();
        let date = now.format("%Y-%m-%d").to_string();

        let tx = conn.transaction().context("failed to begin publish transaction")?;
        tx.execute(
            "UPDATE mock_drafts SET active = 0, updated_at = ?1 WHERE active = 1",
            params![stamp],
        )
        .context("failed to deactivate mock drafts")?;
        tx.execute(
            "INSERT INTO mock_drafts
                (title, description, content, author, date, active, archived, meta, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 1, 0, ?6, ?7, ?7)",
            params![
                draft.title,
                draft.description,
                draft.content,
                draft.author,
                date,
                meta,
                stamp,
            ],
        )
        .context("failed to insert mock draft")?;
        let id = tx.last_insert_rowid();
        tx.commit().context("failed to commit publish_mock_draft")?;
        Ok(id)
    }

    /// Make `id` the only active draft. Returns `false` if no such draft.
    pub fn set_active(&self, id: i64) -> Result<bool> {
        let mut conn = self.conn();
        let stamp = now_rfc3339();
        let tx = conn.transaction().context("failed to begin set_active transaction")?;
        let exists: bool = tx
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM mock_drafts WHERE id = ?1)",
                params![id],
                |row| row.get(0),
            )
            .context("failed to check mock draft existence")?;
        if !exists {
            return Ok(false);
        }
        tx.execute(
            "UPDATE mock_drafts SET active = 0, updated_at = ?1 WHERE active = 1 AND id != ?2",
            params![stamp, id],
        )
        .context("failed to deactivate mock drafts")?;
        tx.execute(
            "UPDATE mock_drafts SET active = 1, archived = 0, updated_at = ?1 WHERE id = ?2",
            params![stamp, id],
        )
        .context("failed to activate mock draft")?;
        tx.commit().context("failed to commit set_active")?;
        Ok(true)
    }

    /// Archive or unarchive a draft. Archiving also deactivates it.
    pub fn set_archived(&self, id: i64, archived: bool) -> Result<bool> {
        let conn = self.conn();
        let changed = conn
            .execute(
                "UPDATE mock_drafts
                 SET archived = ?1, active = CASE WHEN ?1 THEN 0 ELSE active END, updated_at = ?2
                 WHERE id = ?3",
                params![archived, now_rfc3339(), id],
            )
            .context("failed to update archived flag")?;
        Ok(changed == 1)
    }

    fn row_to_mock_draft(row: &Row<'_>) -> rusqlite::Result<MockDraftRow> {
        let meta: String = row.get(8)?;
        Ok(MockDraftRow {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            content: row.get(3)?,
            author: row.get(4)?,
            date: row.get(5)?,
            active: row.get(6)?,
            archived: row.get(7)?,
            meta: serde_json::from_str(&meta).unwrap_or(Value::Null),
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }

    const MOCK_DRAFT_COLUMNS: &'static str =
        "id, title, description, content, author, date, active, archived, meta, created_at, updated_at";

    /// All drafts, newest first.
    pub fn list_mock_drafts(&self) -> Result<Vec<MockDraftRow>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM mock_drafts ORDER BY id DESC",
                Self::MOCK_DRAFT_COLUMNS
            ))
            .context("failed to prepare list_mock_drafts query")?;
        let rows = stmt
            .query_map([], Self::row_to_mock_draft)
            .context("failed to query mock drafts")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map mock draft rows")?;
        Ok(rows)
    }

    pub fn get_mock_draft(&self, id: i64) -> Result<Option<MockDraftRow>> {
        let conn = self.conn();
        conn.query_row(
            &format!(
                "SELECT {} FROM mock_drafts WHERE id = ?1",
                Self::MOCK_DRAFT_COLUMNS
            ),
            params![id],
            Self::row_to_mock_draft,
        )
        .optional()
        .context("failed to query mock draft")
    }

    /// The currently active draft, if any.
    pub fn active_mock_draft(&self) -> Result<Option<MockDraftRow>> {
        let conn = self.conn();
        conn.query_row(
            &format!(
                "SELECT {} FROM mock_drafts WHERE active = 1 ORDER BY id DESC LIMIT 1",
                Self::MOCK_DRAFT_COLUMNS
            ),
            [],
            Self::row_to_mock_draft,
        )
        .optional()
        .context("failed to query active mock draft")
    }

    pub fn delete_mock_draft(&self, id: i64) -> Result<bool> {
        let conn = self.conn();
        let deleted = conn
            .execute("DELETE FROM mock_drafts WHERE id = ?1", params![id])
            .context("failed to delete mock draft")?;
        Ok(deleted == 1)
    }

    // ------------------------------------------------------------------
    // Jobs
    // ------------------------------------------------------------------

    /// Create a queued job and return its id.
    pub fn create_job(&self, config: &JobConfig, created_by: Option<&str>) -> Result<i64> {
        let conn = self.conn();
        let config_json = serde_json::to_string(config).context("failed to serialize job config")?;
        let progress = JobProgress::queued(config.max_picks);
        let progress_json =
            serde_json::to_string(&progress).context("failed to serialize job progress")?;
        let result_json = serde_json::to_string(&JobResult::default())
            .context("failed to serialize job result")?;
        let stamp = now_rfc3339();
        conn.execute(
            "INSERT INTO mock_draft_jobs
                (status, created_by, config, next_pick_index, progress, result, created_at, updated_at)
             VALUES (?1, ?2, ?3, 0, ?4, ?5, ?6, ?6)",
            params![
                JobStatus::Queued.as_str(),
                created_by,
                config_json,
                progress_json,
                result_json,
                stamp,
            ],
        )
        .context("failed to create job")?;
        Ok(conn.last_insert_rowid())
    }

    pub fn load_job(&self, id: i64) -> Result<Option<JobRecord>> {
        let conn = self.conn();
        type RawJob = (
            i64,
            String,
            Option<String>,
            String,
            i64,
            String,
            String,
            Option<String>,
            (String, String, Option<String>, Option<String>),
        );
        let raw: Option<RawJob> = conn
            .query_row(
                "SELECT id, status, created_by, config, next_pick_index, progress, result, error,
                        created_at, updated_at, started_at, finished_at
                 FROM mock_draft_jobs WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                        row.get(6)?,
                        row.get(7)?,
                        (row.get(8)?, row.get(9)?, row.get(10)?, row.get(11)?),
                    ))
                },
            )
            .optional()
            .context("failed to query job")?;

        let Some((id, status, created_by, config, next, progress, result, error, stamps)) = raw else {
            return Ok(None);
        };

        Ok(Some(JobRecord {
            id,
            status: JobStatus::parse(&status)
                .with_context(|| format!("unknown job status '{status}'"))?,
            created_by,
            config: serde_json::from_str(&config).context("failed to deserialize job config")?,
            next_pick_index: usize::try_from(next).unwrap_or(0),
            progress: serde_json::from_str(&progress)
                .context("failed to deserialize job progress")?,
            result: serde_json::from_str(&result).context("failed to deserialize job result")?,
            error,
            created_at: stamps.0,
            updated_at: stamps.1,
            started_at: stamps.2,
            finished_at: stamps.3,
        }))
    }

    /// Set status `running`; `started_at` is only set the first time.
    pub fn mark_job_running(&self, id: i64) -> Result<()> {
        let conn = self.conn();
        let stamp = now_rfc3339();
        conn.execute(
            "UPDATE mock_draft_jobs
             SET status = ?1, started_at = COALESCE(started_at, ?2), updated_at = ?2
             WHERE id = ?3",
            params![JobStatus::Running.as_str(), stamp, id],
        )
        .context("failed to mark job running")?;
        Ok(())
    }

    pub fn update_job_progress(&self, id: i64, progress: &JobProgress) -> Result<()> {
        let conn = self.conn();
        let progress_json =
            serde_json::to_string(progress).context("failed to serialize job progress")?;
        conn.execute(
            "UPDATE mock_draft_jobs SET progress = ?1, updated_at = ?2 WHERE id = ?3",
            params![progress_json, now_rfc3339(), id],
        )
        .context("failed to update job progress")?;
        Ok(())
    }

    /// Persist a finished batch: resume index, progress, and partial result.
    pub fn save_job_batch(
        &self,
        id: i64,
        next_pick_index: usize,
        progress: &JobProgress,
        result: &JobResult,
    ) -> Result<()> {
        let conn = self.conn();
        let progress_json =
            serde_json::to_string(progress).context("failed to serialize job progress")?;
        let result_json = serde_json::to_string(result).context("failed to serialize job result")?;
        conn.execute(
            "UPDATE mock_draft_jobs
             SET next_pick_index = ?1, progress = ?2, result = ?3, updated_at = ?4
             WHERE id = ?5",
            params![next_pick_index as i64, progress_json, result_json, now_rfc3339(), id],
        )
        .context("failed to save job batch")?;
        Ok(())
    }

    pub fn mark_job_done(&self, id: i64, progress: &JobProgress, result: &JobResult) -> Result<()> {
        let conn = self.conn();
        let progress_json =
            serde_json::to_string(progress).context("failed to serialize job progress")?;
        let result_json = serde_json::to_string(result).context("failed to serialize job result")?;
        let stamp = now_rfc3339();
        conn.execute(
            "UPDATE mock_draft_jobs
             SET status = ?1, progress = ?2, result = ?3, error = NULL, finished_at = ?4, updated_at = ?4
             WHERE id = ?5",
            params![JobStatus::Done.as_str(), progress_json, result_json, stamp, id],
        )
        .context("failed to mark job done")?;
        Ok(())
    }

    pub fn mark_job_error(&self, id: i64, message: &str) -> Result<()> {
        let conn = self.conn();
        let stamp = now_rfc3339();
        conn.execute(
            "UPDATE mock_draft_jobs
             SET status = ?1, error = ?2, finished_at = ?3, updated_at = ?3
             WHERE id = ?4",
            params![JobStatus::Error.as_str(), message, stamp, id],
        )
        .context("failed to mark job error")?;
        Ok(())
    }

    /// Try to take the runner lease on a queued or running job. Returns the
    /// lease id when acquired, `None` when another runner holds an unexpired
    /// lease (or the job is finished or missing).
    pub fn try_acquire_lease(&self, id: i64, lease: Duration) -> Result<Option<String>> {
        self.try_acquire_lease_at(id, lease, now_millis())
    }

    pub(crate) fn try_acquire_lease_at(
        &self,
        id: i64,
        lease: Duration,
        now_ms: i64,
    ) -> Result<Option<String>> {
        let conn = self.conn();
        let lease_id = format!("lease_{now_ms}_{:016x}", rand::random::<u64>());
        let until = now_ms + lease.max(MIN_LEASE).as_millis() as i64;
        let changed = conn
            .execute(
                "UPDATE mock_draft_jobs
                 SET lease_id = ?1, lease_until = ?2, updated_at = ?3
                 WHERE id = ?4
                   AND status IN ('queued', 'running')
                   AND (lease_until IS NULL OR lease_until <= ?5)",
                params![lease_id, until, now_rfc3339(), id, now_ms],
            )
            .context("failed to acquire job lease")?;
        Ok((changed == 1).then_some(lease_id))
    }

    /// Extend a held lease. Returns `false` if the lease is no longer ours.
    pub fn renew_lease(&self, id: i64, lease_id: &str, lease: Duration) -> Result<bool> {
        let conn = self.conn();
        let until = now_millis() + lease.max(MIN_LEASE).as_millis() as i64;
        let changed = conn
            .execute(
                "UPDATE mock_draft_jobs SET lease_until = ?1, updated_at = ?2
                 WHERE id = ?3 AND lease_id = ?4",
                params![until, now_rfc3339(), id, lease_id],
            )
            .context("failed to renew job lease")?;
        Ok(changed == 1)
    }

    pub fn release_lease(&self, id: i64, lease_id: &str) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "UPDATE mock_draft_jobs SET lease_id = NULL, lease_until = NULL, updated_at = ?1
             WHERE id = ?2 AND lease_id = ?3",
            params![now_rfc3339(), id, lease_id],
        )
        .context("failed to release job lease")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Helper: create a fresh in-memory database for each test.
    fn test_db() -> Database {
        Database::open(":memory:").expect("in-memory database should open")
    }

    fn sample_draft(title: &str) -> NewMockDraft {
        NewMockDraft {
            title: title.to_string(),
            description: "AI-generated mock draft".to_string(),
            content: format!("# {title}\n"),
            author: "Commissioner".to_string(),
            meta: json!({ "picks": [] }),
        }
    }

    fn sample_job_config() -> JobConfig {
        JobConfig {
            title: "Mock".into(),
            description: "desc".into(),
            rounds: 2,
            max_picks: 24,
            trace: true,
            model: "gpt-4o-mini".into(),
            seed: Some(7),
        }
    }

    #[test]
    fn open_creates_tables() {
        let db = test_db();
        let conn = db.conn();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        assert!(tables.contains(&"mock_drafts".to_string()));
        assert!(tables.contains(&"documents".to_string()));
        assert!(tables.contains(&"mock_draft_jobs".to_string()));
    }

    // ------------------------------------------------------------------
    // Documents
    // ------------------------------------------------------------------

    #[test]
    fn documents_round_trip_and_overwrite() {
        let db = test_db();
        assert!(db.load_document("player_pool").unwrap().is_none());

        db.save_document("player_pool", &json!([{ "name": "A" }])).unwrap();
        db.save_document("player_pool", &json!([{ "name": "B" }])).unwrap();

        let loaded = db.load_document("player_pool").unwrap().unwrap();
        assert_eq!(loaded, json!([{ "name": "B" }]));
    }

    // ------------------------------------------------------------------
    // Mock drafts
    // ------------------------------------------------------------------

    #[test]
    fn publish_leaves_exactly_one_active() {
        let db = test_db();
        let first = db.publish_mock_draft(&sample_draft("First")).unwrap();
        let second = db.publish_mock_draft(&sample_draft("Second")).unwrap();

        let drafts = db.list_mock_drafts().unwrap();
        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts.iter().filter(|d| d.active).count(), 1);

        let active = db.active_mock_draft().unwrap().unwrap();
        assert_eq!(active.id, second);
        assert_eq!(active.title, "Second");
        assert_eq!(active.meta, json!({ "picks": [] }));
        assert_eq!(active.date.len(), 10);

        assert!(!db.get_mock_draft(first).unwrap().unwrap().active);
    }

    #[test]
    fn set_active_switches_single_active_draft() {
        let db = test_db();
        let first = db.publish_mock_draft(&sample_draft("First")).unwrap();
        let second = db.publish_mock_draft(&sample_draft("Second")).unwrap();

        assert!(db.set_active(first).unwrap());
        assert_eq!(db.active_mock_draft().unwrap().unwrap().id, first);
        assert!(!db.get_mock_draft(second).unwrap().unwrap().active);

        assert!(!db.set_active(9999).unwrap());
        assert_eq!(db.active_mock_draft().unwrap().unwrap().id, first);
    }

    #[test]
    fn archive_deactivates() {
        let db = test_db();
        let id = db.publish_mock_draft(&sample_draft("Only")).unwrap();
        assert!(db.set_archived(id, true).unwrap());
        let row = db.get_mock_draft(id).unwrap().unwrap();
        assert!(row.archived);
        assert!(!row.active);
        assert!(db.active_mock_draft().unwrap().is_none());
    }

    #[test]
    fn delete_mock_draft_removes_row() {
        let db = test_db();
        let id = db.publish_mock_draft(&sample_draft("Gone")).unwrap();
        assert!(db.delete_mock_draft(id).unwrap());
        assert!(!db.delete_mock_draft(id).unwrap());
        assert!(db.get_mock_draft(id).unwrap().is_none());
    }

    // ------------------------------------------------------------------
    // Jobs
    // ------------------------------------------------------------------

    #[test]
    fn job_lifecycle() {
        let db = test_db();
        let id = db.create_job(&sample_job_config(), Some("commish")).unwrap();

        let job = db.load_job(id).unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.next_pick_index, 0);
        assert_eq!(job.progress.total_picks, 24);
        assert_eq!(job.created_by.as_deref(), Some("commish"));
        assert!(job.started_at.is_none());

        db.mark_job_running(id).unwrap();
        let started = db.load_job(id).unwrap().unwrap().started_at;
        assert!(started.is_some());
        db.mark_job_running(id).unwrap();
        assert_eq!(db.load_job(id).unwrap().unwrap().started_at, started);

        let progress = JobProgress {
            message: "Generated through 1.04".into(),
            current_pick_number: Some("1.04".into()),
            generated_picks: 4,
            total_picks: 24,
            heartbeat_at: None,
        };
        db.save_job_batch(id, 4, &progress, &JobResult::default()).unwrap();
        let job = db.load_job(id).unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(job.next_pick_index, 4);
        assert_eq!(job.progress.current_pick_number.as_deref(), Some("1.04"));

        db.mark_job_done(id, &progress, &JobResult::default()).unwrap();
        let job = db.load_job(id).unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Done);
        assert!(job.finished_at.is_some());
    }

    #[test]
    fn job_error_is_recorded() {
        let db = test_db();
        let id = db.create_job(&sample_job_config(), None).unwrap();
        db.mark_job_error(id, "player pool is empty").unwrap();
        let job = db.load_job(id).unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Error);
        assert_eq!(job.error.as_deref(), Some("player pool is empty"));
        assert!(db.load_job(id + 100).unwrap().is_none());
    }

    #[test]
    fn lease_excludes_second_runner_until_expiry() {
        let db = test_db();
        let id = db.create_job(&sample_job_config(), None).unwrap();
        let lease = Duration::from_secs(45);
        let now = 1_000_000;

        let held = db.try_acquire_lease_at(id, lease, now).unwrap();
        assert!(held.is_some());
        assert!(db.try_acquire_lease_at(id, lease, now + 1_000).unwrap().is_none());

        // Expired leases can be taken over.
        let taken = db.try_acquire_lease_at(id, lease, now + 46_000).unwrap();
        assert!(taken.is_some());
        assert_ne!(held, taken);

        // The stale holder can no longer renew or release.
        assert!(!db.renew_lease(id, held.as_deref().unwrap(), lease).unwrap());
        db.release_lease(id, held.as_deref().unwrap()).unwrap();
        assert!(db.try_acquire_lease_at(id, lease, now + 47_000).unwrap().is_none());

        db.release_lease(id, taken.as_deref().unwrap()).unwrap();
        assert!(db.try_acquire_lease_at(id, lease, now + 47_000).unwrap().is_some());
    }

    #[test]
    fn short_leases_are_raised_to_minimum() {
        let db = test_db();
        let id = db.create_job(&sample_job_config(), None).unwrap();
        let now = 5_000_000;
        db.try_acquire_lease_at(id, Duration::from_millis(10), now).unwrap().unwrap();
        assert!(db.try_acquire_lease_at(id, Duration::from_secs(45), now + 4_000).unwrap().is_none());
        assert!(db.try_acquire_lease_at(id, Duration::from_secs(45), now + 5_000).unwrap().is_some());
    }

    #[test]
    fn finished_jobs_cannot_be_leased() {
        let db = test_db();
        let id = db.create_job(&sample_job_config(), None).unwrap();
        db.mark_job_done(id, &JobProgress::queued(24), &JobResult::default()).unwrap();
        assert!(db.try_acquire_lease(id, Duration::from_secs(45)).unwrap().is_none());
    }
}
