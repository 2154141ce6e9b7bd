//! SQLite-backed pipeline store.
//!
//! ## Claim Protocol
//!
//! `claim_next` opens an exclusive write transaction (`BEGIN IMMEDIATE`),
//! selects the oldest row with `processing = 0 AND processed = 0`, flips it to
//! `processing = 1` and commits. The selecting UPDATE re-checks the pending
//! predicate, so a row can only be handed out once even if two writers race
//! for the lock.
//!
//! ## Error Mapping
//!
//! | SQLx Error | SQLite primary code | StoreError |
//! |------------|---------------------|------------|
//! | Database | `SQLITE_BUSY` (5), `SQLITE_LOCKED` (6) | `Contention` |
//! | Database | `SQLITE_IOERR` (10), `SQLITE_CORRUPT` (11), `SQLITE_CANTOPEN` (14), `SQLITE_NOTADB` (26) | `Unavailable` |
//! | Database | "no such table" | `SchemaMissing` |
//! | Database | any other (constraint, FK, trigger abort) | `Storage` |
//! | PoolTimedOut | N/A | `Contention` |
//! | PoolClosed, Io, Configuration | N/A | `Unavailable` |
//! | Decode, ColumnDecode, ColumnNotFound | N/A | `Serialization` |
//!
//! ## Threading
//!
//! The store owns a small Tokio runtime and drives sqlx on it, exposing the
//! synchronous store traits. Calls block the calling thread, so they must not
//! be made from inside another async runtime.

use std::future::Future;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value as JsonValue;
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePool, SqlitePoolOptions,
    SqliteSynchronous,
};
use sqlx::{FromRow, Sqlite};
use tokio::runtime::Runtime;
use tracing::{debug, info, instrument, warn};

use trustscore_core::{JobId, UserId, UserSnapshot, WorkerId};
use trustscore_scoring::ScoreResult;

use crate::config::StoreConfig;
use crate::jobs::{JobState, JobStats, Processed, RecomputeJob};

use super::r#trait::{AuditEntry, JobStore, ScoreStore, StoreError, TrustScoreRecord, UserStore};
use super::schema;

const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;
const SQLITE_IOERR: i32 = 10;
const SQLITE_CORRUPT: i32 = 11;
const SQLITE_CANTOPEN: i32 = 14;
const SQLITE_NOTADB: i32 = 26;

macro_rules! job_columns {
    () => {
        "id, user_id, processing, processed, attempts, processor, \
         enqueued_at, claimed_at, processed_at, last_error"
    };
}

const CLAIM_NEXT: &str = concat!(
    "UPDATE recompute_jobs \
     SET processing = 1, processor = ?, attempts = attempts + 1, claimed_at = ? \
     WHERE id = ( \
         SELECT id FROM recompute_jobs \
         WHERE processing = 0 AND processed = 0 \
         ORDER BY enqueued_at ASC, id ASC \
         LIMIT 1 \
     ) \
     AND processing = 0 AND processed = 0 \
     RETURNING ",
    job_columns!()
);

/// SQLite-backed store for users, scores, audit entries and recompute jobs.
///
/// `Send + Sync`; share it between worker threads behind an `Arc`.
#[derive(Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
    runtime: Runtime,
}

impl SqliteStore {
    /// Open (creating if needed) the database described by `config`.
    ///
    /// `claim_timeout` is used both as SQLite's busy timeout and as the pool
    /// acquire timeout: a caller waits at most that long for the write lock
    /// before getting [`StoreError::Contention`].
    pub fn open(config: &StoreConfig) -> Result<Self, StoreError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("trustscore-sqlite")
            .enable_all()
            .build()
            .map_err(|e| StoreError::Unavailable(format!("failed to start storage runtime: {e}")))?;

        let options = SqliteConnectOptions::from_str(&config.database_url)
            .map_err(|e| map_sqlx_error("open", e))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(config.claim_timeout);

        let pool = runtime
            .block_on(
                SqlitePoolOptions::new()
                    .max_connections(config.max_connections)
                    .acquire_timeout(config.claim_timeout)
                    .connect_with(options),
            )
            .map_err(|e| map_sqlx_error("open", e))?;

        info!(
            database_url = %config.database_url,
            max_connections = config.max_connections,
            claim_timeout_ms = config.claim_timeout.as_millis() as u64,
            "opened sqlite store"
        );

        Ok(Self { pool, runtime })
    }

    /// Open a database file by path.
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open(&StoreConfig::for_path(path))
    }

    /// Create tables, indexes and triggers that do not exist yet.
    #[instrument(skip(self), err)]
    pub fn migrate(&self) -> Result<(), StoreError> {
        self.block_on(async {
            for statement in schema::STATEMENTS {
                sqlx::query(statement)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| map_sqlx_error("migrate", e))?;
            }
            Ok::<_, StoreError>(())
        })?;
        debug!(statements = schema::STATEMENTS.len(), "schema up to date");
        Ok(())
    }

    /// Close every pooled connection.
    pub fn close(&self) {
        self.block_on(self.pool.close());
    }

    fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    async fn fetch_job(&self, job_id: JobId) -> Result<Option<RecomputeJob>, StoreError> {
        let row = sqlx::query_as::<_, JobRow>(concat!(
            "SELECT ",
            job_columns!(),
            " FROM recompute_jobs WHERE id = ?"
        ))
        .bind(job_id.as_raw())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_job", e))?;

        row.map(RecomputeJob::try_from).transpose()
    }

    /// Explain why a guarded update touched no rows.
    async fn rejected(&self, job_id: JobId, to: JobState) -> StoreError {
        match self.fetch_job(job_id).await {
            Ok(Some(job)) => StoreError::transition(job_id, job.state(), to),
            Ok(None) => StoreError::NotFound(job_id),
            Err(e) => e,
        }
    }

    async fn claim(&self, worker: &WorkerId) -> Result<Option<RecomputeJob>, StoreError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| map_sqlx_error("claim_next", e))?;

        sqlx::query("BEGIN IMMEDIATE")
            .execute(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error("claim_next", e))?;

        let claimed = sqlx::query_as::<_, JobRow>(CLAIM_NEXT)
            .bind(worker.as_str())
            .bind(fmt_ts(Utc::now()))
            .fetch_optional(&mut *conn)
            .await;

        let row = match claimed {
            Ok(row) => row,
            Err(e) => {
                rollback(conn).await;
                return Err(map_sqlx_error("claim_next", e));
            }
        };

        if let Err(e) = sqlx::query("COMMIT").execute(&mut *conn).await {
            rollback(conn).await;
            return Err(map_sqlx_error("claim_next", e));
        }

        row.map(RecomputeJob::try_from).transpose()
    }
}

/// Roll back a manually opened transaction. A connection that cannot roll
/// back is detached from the pool and closed.
async fn rollback(mut conn: PoolConnection<Sqlite>) {
    if let Err(e) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
        warn!(error = %e, "rollback failed; discarding connection");
        drop(conn.detach());
    }
}

async fn enqueue_in(
    conn: &mut SqliteConnection,
    user_id: &str,
    at: DateTime<Utc>,
) -> Result<Option<JobId>, sqlx::Error> {
    let result = sqlx::query(
        "INSERT OR IGNORE INTO recompute_jobs (user_id, enqueued_at) VALUES (?, ?)",
    )
    .bind(user_id)
    .bind(fmt_ts(at))
    .execute(&mut *conn)
    .await?;

    Ok((result.rows_affected() > 0).then(|| JobId::from_raw(result.last_insert_rowid())))
}

impl UserStore for SqliteStore {
    #[instrument(skip(self), fields(user_id = %user_id), err)]
    fn get_user(&self, user_id: &UserId) -> Result<Option<UserSnapshot>, StoreError> {
        let row = self
            .block_on(
                sqlx::query_as::<_, UserRow>(
                    r#"
                    SELECT user_id, photos, bio_filled, interests_count, selfie_verified,
                           id_verified, login_streak, response_rate_pct, reports_count,
                           last_active_at
                    FROM users
                    WHERE user_id = ?
                    "#,
                )
                .bind(user_id.as_str())
                .fetch_optional(&self.pool),
            )
            .map_err(|e| map_sqlx_error("get_user", e))?;

        row.map(UserSnapshot::try_from).transpose()
    }

    #[instrument(skip(self, user), fields(user_id = %user.user_id), err)]
    fn upsert_user(&self, user: &UserSnapshot) -> Result<Option<JobId>, StoreError> {
        let now = Utc::now();
        self.block_on(async {
            let mut tx = self.pool.begin().await?;

            sqlx::query(
                r#"
                INSERT INTO users (
                    user_id, photos, bio_filled, interests_count, selfie_verified,
                    id_verified, login_streak, response_rate_pct, reports_count,
                    last_active_at, updated_at
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT (user_id) DO UPDATE SET
                    photos = excluded.photos,
                    bio_filled = excluded.bio_filled,
                    interests_count = excluded.interests_count,
                    selfie_verified = excluded.selfie_verified,
                    id_verified = excluded.id_verified,
                    login_streak = excluded.login_streak,
                    response_rate_pct = excluded.response_rate_pct,
                    reports_count = excluded.reports_count,
                    last_active_at = excluded.last_active_at,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(user.user_id.as_str())
            .bind(user.photos)
            .bind(i64::from(user.bio_present))
            .bind(user.interests_count)
            .bind(i64::from(user.selfie_verified))
            .bind(i64::from(user.id_verified))
            .bind(user.login_streak_days)
            .bind(user.response_rate_pct)
            .bind(user.reports_received)
            .bind(user.last_active_at.as_deref())
            .bind(fmt_ts(now))
            .execute(&mut *tx)
            .await?;

            let job = enqueue_in(&mut tx, user.user_id.as_str(), now).await?;
            tx.commit().await?;
            Ok::<_, sqlx::Error>(job)
        })
        .map_err(|e| map_sqlx_error("upsert_user", e))
    }

    #[instrument(skip(self), fields(user_id = %user_id), err)]
    fn delete_user(&self, user_id: &UserId) -> Result<bool, StoreError> {
        let result = self
            .block_on(
                sqlx::query("DELETE FROM users WHERE user_id = ?")
                    .bind(user_id.as_str())
                    .execute(&self.pool),
            )
            .map_err(|e| map_sqlx_error("delete_user", e))?;

        Ok(result.rows_affected() > 0)
    }
}

impl ScoreStore for SqliteStore {
    #[instrument(
        skip(self, result),
        fields(user_id = %result.user_id, score = result.final_score),
        err
    )]
    fn record_score(
        &self,
        result: &ScoreResult,
        computed_at: DateTime<Utc>,
    ) -> Result<AuditEntry, StoreError> {
        let breakdown = serde_json::to_value(&result.breakdown)?;
        let breakdown_text = serde_json::to_string(&breakdown)?;
        let computed = fmt_ts(computed_at);

        let id = self
            .block_on(async {
                let mut tx = self.pool.begin().await?;

                sqlx::query(
                    r#"
                    INSERT INTO trust_scores (user_id, score, updated_at)
                    VALUES (?, ?, ?)
                    ON CONFLICT (user_id) DO UPDATE SET
                        score = excluded.score,
                        updated_at = excluded.updated_at
                    "#,
                )
                .bind(result.user_id.as_str())
                .bind(result.final_score)
                .bind(&computed)
                .execute(&mut *tx)
                .await?;

                let audit = sqlx::query(
                    r#"
                    INSERT INTO trust_score_audit (user_id, score, breakdown, computed_at)
                    VALUES (?, ?, ?, ?)
                    "#,
                )
                .bind(result.user_id.as_str())
                .bind(result.final_score)
                .bind(&breakdown_text)
                .bind(&computed)
                .execute(&mut *tx)
                .await?;

                tx.commit().await?;
                Ok::<_, sqlx::Error>(audit.last_insert_rowid())
            })
            .map_err(|e| map_sqlx_error("record_score", e))?;

        Ok(AuditEntry {
            id,
            user_id: result.user_id.clone(),
            score: result.final_score,
            breakdown,
            computed_at,
        })
    }

    #[instrument(skip(self), fields(user_id = %user_id), err)]
    fn get_score(&self, user_id: &UserId) -> Result<Option<TrustScoreRecord>, StoreError> {
        let row = self
            .block_on(
                sqlx::query_as::<_, ScoreRow>(
                    "SELECT user_id, score, updated_at FROM trust_scores WHERE user_id = ?",
                )
                .bind(user_id.as_str())
                .fetch_optional(&self.pool),
            )
            .map_err(|e| map_sqlx_error("get_score", e))?;

        row.map(TrustScoreRecord::try_from).transpose()
    }

    #[instrument(skip(self), fields(user_id = %user_id), err)]
    fn audit_history(&self, user_id: &UserId) -> Result<Vec<AuditEntry>, StoreError> {
        let rows = self
            .block_on(
                sqlx::query_as::<_, AuditRow>(
                    r#"
                    SELECT id, user_id, score, breakdown, computed_at
                    FROM trust_score_audit
                    WHERE user_id = ?
                    ORDER BY computed_at ASC, id ASC
                    "#,
                )
                .bind(user_id.as_str())
                .fetch_all(&self.pool),
            )
            .map_err(|e| map_sqlx_error("audit_history", e))?;

        rows.into_iter().map(AuditEntry::try_from).collect()
    }
}

impl JobStore for SqliteStore {
    #[instrument(skip(self), fields(user_id = %user_id), err)]
    fn enqueue(&self, user_id: &UserId) -> Result<Option<JobId>, StoreError> {
        self.block_on(async {
            let mut conn = self.pool.acquire().await?;
            enqueue_in(&mut conn, user_id.as_str(), Utc::now()).await
        })
        .map_err(|e| map_sqlx_error("enqueue", e))
    }

    #[instrument(skip(self), fields(worker = %worker), err)]
    fn claim_next(&self, worker: &WorkerId) -> Result<Option<RecomputeJob>, StoreError> {
        self.block_on(self.claim(worker))
    }

    #[instrument(skip(self), fields(job_id = %job_id), err)]
    fn mark_done(&self, job_id: JobId) -> Result<(), StoreError> {
        self.block_on(async {
            let result = sqlx::query(
                r#"
                UPDATE recompute_jobs
                SET processing = 0, processed = 1, processed_at = ?
                WHERE id = ? AND processing = 1 AND processed = 0
                "#,
            )
            .bind(fmt_ts(Utc::now()))
            .bind(job_id.as_raw())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("mark_done", e))?;

            if result.rows_affected() == 0 {
                return Err(self.rejected(job_id, JobState::Done).await);
            }
            Ok::<_, StoreError>(())
        })
    }

    #[instrument(skip(self), fields(job_id = %job_id), err)]
    fn mark_failed(&self, job_id: JobId, error: &str) -> Result<(), StoreError> {
        self.block_on(async {
            let result = sqlx::query(
                r#"
                UPDATE recompute_jobs
                SET processing = 0, processed = 2, processed_at = ?, last_error = ?
                WHERE id = ? AND processing = 1 AND processed = 0
                "#,
            )
            .bind(fmt_ts(Utc::now()))
            .bind(error)
            .bind(job_id.as_raw())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("mark_failed", e))?;

            if result.rows_affected() == 0 {
                return Err(self.rejected(job_id, JobState::Failed).await);
            }
            Ok::<_, StoreError>(())
        })
    }

    fn get(&self, job_id: JobId) -> Result<Option<RecomputeJob>, StoreError> {
        self.block_on(self.fetch_job(job_id))
    }

    fn latest_for_user(&self, user_id: &UserId) -> Result<Option<RecomputeJob>, StoreError> {
        let row = self
            .block_on(
                sqlx::query_as::<_, JobRow>(concat!(
                    "SELECT ",
                    job_columns!(),
                    " FROM recompute_jobs WHERE user_id = ? \
                     ORDER BY enqueued_at DESC, id DESC LIMIT 1"
                ))
                .bind(user_id.as_str())
                .fetch_optional(&self.pool),
            )
            .map_err(|e| map_sqlx_error("latest_for_user", e))?;

        row.map(RecomputeJob::try_from).transpose()
    }

    #[instrument(skip(self), err)]
    fn expire_stale_claims(
        &self,
        claimed_before: DateTime<Utc>,
    ) -> Result<Vec<JobId>, StoreError> {
        let now = Utc::now();
        self.block_on(async {
            let mut tx = self.pool.begin().await?;

            let expired: Vec<(i64, String)> = sqlx::query_as(
                r#"
                UPDATE recompute_jobs
                SET processing = 0,
                    processed = 2,
                    processed_at = ?,
                    last_error = CASE
                        WHEN processor IS NULL THEN 'claim expired'
                        ELSE 'claim expired (held by ' || processor || ')'
                    END
                WHERE processing = 1 AND processed = 0 AND claimed_at < ?
                RETURNING id, user_id
                "#,
            )
            .bind(fmt_ts(now))
            .bind(fmt_ts(claimed_before))
            .fetch_all(&mut *tx)
            .await?;

            for (_, user_id) in &expired {
                enqueue_in(&mut tx, user_id, now).await?;
            }

            tx.commit().await?;
            Ok::<_, sqlx::Error>(
                expired
                    .into_iter()
                    .map(|(id, _)| JobId::from_raw(id))
                    .collect::<Vec<_>>(),
            )
        })
        .map_err(|e| map_sqlx_error("expire_stale_claims", e))
    }

    fn stats(&self) -> Result<JobStats, StoreError> {
        let (pending, processing, done, failed): (i64, i64, i64, i64) = self
            .block_on(
                sqlx::query_as(
                    r#"
                    SELECT
                        COALESCE(SUM(CASE WHEN processed = 0 AND processing = 0 THEN 1 ELSE 0 END), 0),
                        COALESCE(SUM(CASE WHEN processed = 0 AND processing = 1 THEN 1 ELSE 0 END), 0),
                        COALESCE(SUM(CASE WHEN processed = 1 THEN 1 ELSE 0 END), 0),
                        COALESCE(SUM(CASE WHEN processed = 2 THEN 1 ELSE 0 END), 0)
                    FROM recompute_jobs
                    "#,
                )
                .fetch_one(&self.pool),
            )
            .map_err(|e| map_sqlx_error("stats", e))?;

        Ok(JobStats {
            pending: count(pending),
            processing: count(processing),
            done: count(done),
            failed: count(failed),
        })
    }
}

#[derive(Debug, FromRow)]
struct JobRow {
    id: i64,
    user_id: String,
    processing: i64,
    processed: i64,
    attempts: i64,
    processor: Option<String>,
    enqueued_at: String,
    claimed_at: Option<String>,
    processed_at: Option<String>,
    last_error: Option<String>,
}

impl TryFrom<JobRow> for RecomputeJob {
    type Error = StoreError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let processed = Processed::from_code(row.processed).ok_or_else(|| {
            StoreError::Serialization(format!("unknown processed code {}", row.processed))
        })?;

        Ok(RecomputeJob {
            id: JobId::from_raw(row.id),
            user_id: parse_user_id(row.user_id)?,
            processing: row.processing != 0,
            processed,
            attempts: u32::try_from(row.attempts).map_err(|_| {
                StoreError::Serialization(format!("attempts out of range: {}", row.attempts))
            })?,
            processor: row
                .processor
                .map(WorkerId::new)
                .transpose()
                .map_err(|e| StoreError::Serialization(e.to_string()))?,
            enqueued_at: parse_ts(&row.enqueued_at)?,
            claimed_at: row.claimed_at.as_deref().map(parse_ts).transpose()?,
            processed_at: row.processed_at.as_deref().map(parse_ts).transpose()?,
            last_error: row.last_error,
        })
    }
}

#[derive(Debug, FromRow)]
struct UserRow {
    user_id: String,
    photos: i64,
    bio_filled: i64,
    interests_count: i64,
    selfie_verified: i64,
    id_verified: i64,
    login_streak: i64,
    response_rate_pct: i64,
    reports_count: i64,
    last_active_at: Option<String>,
}

impl TryFrom<UserRow> for UserSnapshot {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(UserSnapshot {
            user_id: parse_user_id(row.user_id)?,
            photos: row.photos,
            bio_present: row.bio_filled != 0,
            interests_count: row.interests_count,
            selfie_verified: row.selfie_verified != 0,
            id_verified: row.id_verified != 0,
            login_streak_days: row.login_streak,
            response_rate_pct: row.response_rate_pct,
            reports_received: row.reports_count,
            last_active_at: row.last_active_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ScoreRow {
    user_id: String,
    score: f64,
    updated_at: String,
}

impl TryFrom<ScoreRow> for TrustScoreRecord {
    type Error = StoreError;

    fn try_from(row: ScoreRow) -> Result<Self, Self::Error> {
        Ok(TrustScoreRecord {
            user_id: parse_user_id(row.user_id)?,
            score: row.score,
            updated_at: parse_ts(&row.updated_at)?,
        })
    }
}

#[derive(Debug, FromRow)]
struct AuditRow {
    id: i64,
    user_id: String,
    score: f64,
    breakdown: String,
    computed_at: String,
}

impl TryFrom<AuditRow> for AuditEntry {
    type Error = StoreError;

    fn try_from(row: AuditRow) -> Result<Self, Self::Error> {
        Ok(AuditEntry {
            id: row.id,
            user_id: parse_user_id(row.user_id)?,
            score: row.score,
            breakdown: serde_json::from_str::<JsonValue>(&row.breakdown)?,
            computed_at: parse_ts(&row.computed_at)?,
        })
    }
}

fn parse_user_id(raw: String) -> Result<UserId, StoreError> {
    UserId::new(raw).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn count(raw: i64) -> usize {
    usize::try_from(raw).unwrap_or(0)
}

fn fmt_ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| StoreError::Serialization(format!("invalid timestamp {raw:?}: {e}")))
}

/// Map SQLx errors to `StoreError`. See the module docs for the table.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());

            // Extended result codes carry the primary code in the low byte.
            let primary = db_err
                .code()
                .and_then(|code| code.parse::<i32>().ok())
                .map(|code| code & 0xff);

            match primary {
                Some(SQLITE_BUSY | SQLITE_LOCKED) => StoreError::Contention(msg),
                Some(SQLITE_IOERR | SQLITE_CORRUPT | SQLITE_CANTOPEN | SQLITE_NOTADB) => {
                    StoreError::Unavailable(msg)
                }
                _ if db_err.message().starts_with("no such table") => {
                    StoreError::SchemaMissing(msg)
                }
                _ => StoreError::Storage(msg),
            }
        }
        sqlx::Error::PoolTimedOut => StoreError::Contention(format!(
            "timed out waiting for a connection in {}",
            operation
        )),
        sqlx::Error::PoolClosed => {
            StoreError::Unavailable(format!("connection pool closed in {}", operation))
        }
        sqlx::Error::Io(e) => StoreError::Unavailable(format!("i/o error in {}: {}", operation, e)),
        sqlx::Error::Configuration(e) => {
            StoreError::Unavailable(format!("invalid configuration in {}: {}", operation, e))
        }
        sqlx::Error::Decode(_) | sqlx::Error::ColumnDecode { .. } | sqlx::Error::ColumnNotFound(_) => {
            StoreError::Serialization(format!("failed to decode row in {}: {}", operation, err))
        }
        _ => StoreError::Storage(format!("sqlx error in {}: {}", operation, err)),
    }
}
