//! SQLite schema.
//!
//! Applied statement by statement by [`super::SqliteStore::migrate`]; every
//! statement is idempotent.
//!
//! Timestamps are stored as fixed-width RFC 3339 UTC text
//! (`YYYY-MM-DDTHH:MM:SS.ffffffZ`) so that text ordering is time ordering.

pub(crate) const STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        user_id           TEXT PRIMARY KEY,
        photos            INTEGER NOT NULL DEFAULT 0,
        bio_filled        INTEGER NOT NULL DEFAULT 0,
        interests_count   INTEGER NOT NULL DEFAULT 0,
        selfie_verified   INTEGER NOT NULL DEFAULT 0,
        id_verified       INTEGER NOT NULL DEFAULT 0,
        login_streak      INTEGER NOT NULL DEFAULT 0,
        response_rate_pct INTEGER NOT NULL DEFAULT 0,
        reports_count     INTEGER NOT NULL DEFAULT 0,
        last_active_at    TEXT,
        updated_at        TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS trust_scores (
        user_id    TEXT PRIMARY KEY REFERENCES users(user_id) ON DELETE CASCADE,
        score      REAL NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS trust_score_audit (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id     TEXT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
        score       REAL NOT NULL,
        breakdown   TEXT NOT NULL,
        computed_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_trust_score_audit_user
        ON trust_score_audit (user_id, computed_at, id)
    "#,
    // Audit rows are append-only; removal happens only through the user cascade.
    r#"
    CREATE TRIGGER IF NOT EXISTS trg_trust_score_audit_immutable
    BEFORE UPDATE ON trust_score_audit
    BEGIN
        SELECT RAISE(ABORT, 'audit entries are immutable');
    END
    "#,
    // No foreign key to users: a job may outlive its user.
    r#"
    CREATE TABLE IF NOT EXISTS recompute_jobs (
        id           INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id      TEXT NOT NULL,
        processing   INTEGER NOT NULL DEFAULT 0 CHECK (processing IN (0, 1)),
        processed    INTEGER NOT NULL DEFAULT 0 CHECK (processed IN (0, 1, 2)),
        attempts     INTEGER NOT NULL DEFAULT 0,
        processor    TEXT,
        enqueued_at  TEXT NOT NULL,
        claimed_at   TEXT,
        processed_at TEXT,
        last_error   TEXT
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_recompute_jobs_claimable
        ON recompute_jobs (processed, processing, enqueued_at, id)
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_recompute_jobs_user
        ON recompute_jobs (user_id, enqueued_at, id)
    "#,
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS idx_recompute_jobs_one_pending_per_user
        ON recompute_jobs (user_id)
        WHERE processing = 0 AND processed = 0
    "#,
    r#"
    CREATE TRIGGER IF NOT EXISTS trg_recompute_jobs_terminal
    BEFORE UPDATE OF processing, processed ON recompute_jobs
    WHEN OLD.processed <> 0
    BEGIN
        SELECT RAISE(ABORT, 'recompute job already finished');
    END
    "#,
];
