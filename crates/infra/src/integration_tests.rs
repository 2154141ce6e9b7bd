//! Integration tests for the recompute pipeline against a real SQLite file.
//!
//! Tests: upsert → queue → claim → score → persist → complete
//!
//! Verifies:
//! - Scores and audit entries land together and match the engine
//! - A pending job is handed to exactly one of many racing workers
//! - Job state never moves backwards
//! - Multiple worker threads drain a shared queue without double processing

use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, TimeZone, Utc};

use trustscore_core::{JobId, UserId, UserSnapshot, WorkerId};
use trustscore_scoring::{Badge, ScoreBreakdown, compute_score};

use crate::config::StoreConfig;
use crate::jobs::{JobState, Processed};
use crate::store::{JobStore, ScoreStore, SqliteStore, StoreError, UserStore};
use crate::wait::{WaitOptions, upsert_and_wait};
use crate::workers::{Cycle, Disposition, RecomputeWorker, WorkerHandle};

fn reference() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 12, 24, 9, 30, 0).unwrap()
}

fn setup() -> (tempfile::TempDir, Arc<SqliteStore>) {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig {
        max_connections: 8,
        claim_timeout: Duration::from_secs(5),
        ..StoreConfig::for_path(dir.path().join("trust_engine.db"))
    };
    let store = SqliteStore::open(&config).unwrap();
    store.migrate().unwrap();
    (dir, Arc::new(store))
}

fn user(id: &str) -> UserSnapshot {
    UserSnapshot::new(UserId::new(id).unwrap())
}

fn scenario_a() -> UserSnapshot {
    UserSnapshot {
        photos: 6,
        bio_present: true,
        interests_count: 5,
        selfie_verified: true,
        id_verified: true,
        login_streak_days: 30,
        response_rate_pct: 100,
        reports_received: 0,
        last_active_at: Some(reference().to_rfc3339()),
        ..user("scenario-a")
    }
}

fn worker(store: &Arc<SqliteStore>, id: &str) -> RecomputeWorker<Arc<SqliteStore>> {
    RecomputeWorker::new(Arc::clone(store), WorkerId::new(id).unwrap()).with_clock(reference)
}

#[test]
fn scenarios_score_end_to_end() {
    let (_dir, store) = setup();
    let w = worker(&store, "w1");

    let a = scenario_a();
    let b = UserSnapshot {
        last_active_at: Some((reference() - chrono::Duration::days(15)).to_rfc3339()),
        ..UserSnapshot {
            user_id: UserId::new("scenario-b").unwrap(),
            ..scenario_a()
        }
    };
    let c = user("scenario-c");
    let d = UserSnapshot {
        reports_received: 10,
        ..user("scenario-d")
    };

    for u in [&a, &b, &c, &d] {
        store.upsert_user(u).unwrap();
    }
    while let Cycle::Processed(_) = w.run_once().unwrap() {}

    let score = |u: &UserSnapshot| store.get_score(&u.user_id).unwrap().unwrap().score;
    assert_eq!(score(&a), 100.0);
    assert_eq!(score(&b), 90.0);
    assert_eq!(score(&c), 0.0);
    assert_eq!(score(&d), 0.0);

    let audit_b = store.audit_history(&b.user_id).unwrap();
    let breakdown: ScoreBreakdown =
        serde_json::from_value(audit_b[0].breakdown.clone()).unwrap();
    assert_eq!(breakdown.decay.applied, 10.0);
    assert_eq!(breakdown.badges, vec![Badge::VerifiedUser, Badge::TrustedMember]);
    assert_eq!(breakdown, compute_score(&b, reference()).breakdown);

    let audit_d = store.audit_history(&d.user_id).unwrap();
    assert_eq!(audit_d[0].breakdown["activity"]["total"], -8.0);

    let stats = store.stats().unwrap();
    assert_eq!(stats.done, 4);
    assert_eq!(stats.pending + stats.processing + stats.failed, 0);
}

#[test]
fn racing_claims_hand_out_a_job_exactly_once() {
    let (_dir, store) = setup();
    let job_id = store.upsert_user(&scenario_a()).unwrap().unwrap();

    const RACERS: usize = 8;
    let barrier = Arc::new(Barrier::new(RACERS));
    let racers: Vec<_> = (0..RACERS)
        .map(|n| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let worker = WorkerId::new(format!("racer-{n}")).unwrap();
                barrier.wait();
                loop {
                    match store.claim_next(&worker) {
                        Ok(claimed) => return claimed,
                        Err(StoreError::Contention(_)) => thread::sleep(Duration::from_millis(1)),
                        Err(e) => panic!("unexpected claim error: {e}"),
                    }
                }
            })
        })
        .collect();

    let winners: Vec<_> = racers
        .into_iter()
        .filter_map(|racer| racer.join().unwrap())
        .collect();

    assert_eq!(winners.len(), 1);
    assert_eq!(winners[0].id, job_id);
    assert_eq!(winners[0].attempts, 1);

    let job = store.get(job_id).unwrap().unwrap();
    assert_eq!(job.state(), JobState::Claimed);
    assert_eq!(job.processor, winners[0].processor);
}

#[test]
fn worker_threads_drain_queue_without_double_processing() {
    let (_dir, store) = setup();
    const USERS: usize = 40;

    let mut enqueued = HashSet::new();
    for n in 0..USERS {
        let u = UserSnapshot {
            photos: (n % 7) as i64,
            login_streak_days: n as i64,
            ..user(&format!("user-{n}"))
        };
        enqueued.insert(store.upsert_user(&u).unwrap().unwrap());
    }

    let handles: Vec<_> = (0..4)
        .map(|n| {
            worker(&store, &format!("drain-{n}"))
                .spawn(Duration::from_millis(5))
                .unwrap()
        })
        .collect();

    let scored = |handles: &[WorkerHandle]| -> u64 {
        handles.iter().map(|h| h.stats().scored).sum()
    };
    let deadline = Instant::now() + Duration::from_secs(20);
    while scored(&handles) < USERS as u64 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(scored(&handles), USERS as u64);

    for handle in handles {
        assert_eq!(handle.stats().failed, 0);
        handle.shutdown().unwrap();
    }
    assert_eq!(store.stats().unwrap().done, USERS);

    for job_id in enqueued {
        let job = store.get(job_id).unwrap().unwrap();
        assert_eq!(job.processed, Processed::Done);
        assert_eq!(job.attempts, 1);
        assert_eq!(store.audit_history(&job.user_id).unwrap().len(), 1);
    }
}

#[test]
fn terminal_state_is_enforced_by_the_database() {
    let (_dir, store) = setup();
    let job_id = store.upsert_user(&scenario_a()).unwrap().unwrap();
    store.claim_next(&WorkerId::new("w1").unwrap()).unwrap();
    store.mark_done(job_id).unwrap();

    assert!(matches!(
        store.mark_failed(job_id, "late"),
        Err(StoreError::InvalidTransition(_))
    ));
    assert!(store.claim_next(&WorkerId::new("w2").unwrap()).unwrap().is_none());
    assert_eq!(store.get(job_id).unwrap().unwrap().state(), JobState::Done);
}

#[test]
fn duplicate_requests_collapse_until_claimed() {
    let (_dir, store) = setup();
    let u = scenario_a();

    let first = store.upsert_user(&u).unwrap();
    assert!(first.is_some());
    assert_eq!(store.enqueue(&u.user_id).unwrap(), None);
    assert_eq!(store.upsert_user(&u).unwrap(), None);

    let w = worker(&store, "w1");
    assert!(matches!(w.run_once().unwrap(), Cycle::Processed(_)));

    let after_first = store.get_score(&u.user_id).unwrap().unwrap();

    let second = store.upsert_user(&u).unwrap();
    assert!(second.is_some());
    assert_ne!(first, second);
    assert!(matches!(w.run_once().unwrap(), Cycle::Processed(_)));

    // Same snapshot and reference time: the rerun persists an identical result.
    assert_eq!(store.get_score(&u.user_id).unwrap().unwrap(), after_first);
    let history = store.audit_history(&u.user_id).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].score, history[1].score);
    assert_eq!(history[0].breakdown, history[1].breakdown);
    assert_eq!(history[0].computed_at, history[1].computed_at);
    assert!(history[0].id < history[1].id);
}

#[test]
fn user_deleted_before_claim_completes_without_score() {
    let (_dir, store) = setup();
    let u = scenario_a();
    let job_id = store.upsert_user(&u).unwrap().unwrap();
    assert!(store.delete_user(&u.user_id).unwrap());

    let w = worker(&store, "w1");
    let Cycle::Processed(outcome) = w.run_once().unwrap() else {
        panic!("expected the orphaned job to be processed");
    };
    assert_eq!(outcome.disposition, Disposition::UserMissing);
    assert_eq!(outcome.job_id, job_id);
    assert_eq!(store.get(job_id).unwrap().unwrap().state(), JobState::Done);
    assert!(store.get_score(&u.user_id).unwrap().is_none());
}

#[test]
fn audit_trail_grows_with_every_recompute() {
    let (_dir, store) = setup();
    let w = worker(&store, "w1");
    let mut u = scenario_a();

    for photos in [6, 3, 0] {
        u.photos = photos;
        store.upsert_user(&u).unwrap();
        w.run_once().unwrap();
    }

    let history = store.audit_history(&u.user_id).unwrap();
    let scores: Vec<f64> = history.iter().map(|e| e.score).collect();
    assert_eq!(scores, vec![100.0, 90.0, 80.0]);
    assert!(history.windows(2).all(|w| w[0].id < w[1].id));
    assert_eq!(store.get_score(&u.user_id).unwrap().unwrap().score, 80.0);
}

#[test]
fn upsert_and_wait_reports_the_finished_recompute() {
    let (_dir, store) = setup();
    let handle = worker(&store, "w1").spawn(Duration::from_millis(5)).unwrap();

    let status = upsert_and_wait(
        store.as_ref(),
        &scenario_a(),
        WaitOptions {
            timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(10),
        },
    )
    .unwrap();
    handle.shutdown().unwrap();

    assert!(!status.timed_out);
    assert_eq!(status.job.map(|j| j.state()), Some(JobState::Done));
    assert_eq!(status.score.map(|s| s.score), Some(100.0));
    assert_eq!(status.audit.len(), 1);
}

#[test]
fn stale_claims_are_recovered_by_a_fresh_job() {
    let (_dir, store) = setup();
    let u = scenario_a();
    let abandoned = store.upsert_user(&u).unwrap().unwrap();
    store
        .claim_next(&WorkerId::new("crashed").unwrap())
        .unwrap()
        .unwrap();
    thread::sleep(Duration::from_millis(5));

    let w = worker(&store, "w1").with_stale_claim_timeout(Some(Duration::from_millis(1)));
    assert_eq!(w.run_once().unwrap(), Cycle::Idle { expired_claims: 1 });
    assert!(matches!(w.run_once().unwrap(), Cycle::Processed(_)));

    let old = store.get(abandoned).unwrap().unwrap();
    assert_eq!(old.state(), JobState::Failed);
    assert!(old.last_error.unwrap().starts_with("claim expired"));
    assert_eq!(store.get_score(&u.user_id).unwrap().unwrap().score, 100.0);
}

#[test]
fn unknown_job_ids_are_not_found() {
    let (_dir, store) = setup();
    assert!(store.get(JobId::from_raw(77)).unwrap().is_none());
    assert!(matches!(
        store.mark_failed(JobId::from_raw(77), "x"),
        Err(StoreError::NotFound(_))
    ));
}
