//! Recompute worker process.
//!
//! Opens the configured SQLite database, applies the schema, runs
//! `TRUSTSCORE_WORKERS` worker threads and stops them on Ctrl-C. Exits
//! non-zero if any worker stopped on a fatal storage error.

use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use tracing::{error, info, warn};

use trustscore_infra::{AppConfig, RecomputeWorker, SqliteStore, WorkerHandle};

fn main() -> anyhow::Result<()> {
    trustscore_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    info!(
        database_url = %config.store.database_url,
        workers = config.worker.workers,
        worker_id = %config.worker.worker_id,
        "starting trust score worker"
    );

    let store = SqliteStore::open(&config.store).context("failed to open database")?;
    store.migrate().context("failed to apply schema")?;
    let store = Arc::new(store);

    let mut handles = Vec::with_capacity(config.worker.workers);
    for n in 0..config.worker.workers {
        let worker_id = config.worker.worker_id.with_suffix(n);
        let handle = RecomputeWorker::new(Arc::clone(&store), worker_id)
            .with_stale_claim_timeout(config.worker.stale_claim_timeout)
            .spawn(config.worker.poll_interval)
            .context("failed to start worker")?;
        handles.push(handle);
    }

    wait_for_shutdown(&handles)?;
    info!("shutting down workers");

    let mut fatal = 0;
    for handle in handles {
        let worker_id = handle.worker_id().clone();
        match handle.shutdown() {
            Ok(stats) => info!(
                worker = %worker_id,
                scored = stats.scored,
                failed = stats.failed,
                skipped = stats.skipped_missing_user,
                unfinalized = stats.unfinalized,
                "worker stopped"
            ),
            Err(e) => {
                error!(worker = %worker_id, error = %e, "worker stopped with an error");
                fatal += 1;
            }
        }
    }

    store.close();

    if fatal > 0 {
        bail!("{fatal} worker(s) stopped with errors");
    }
    Ok(())
}

/// Block until Ctrl-C, or until any worker exits on its own.
fn wait_for_shutdown(handles: &[WorkerHandle]) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start signal runtime")?;

    runtime.block_on(async {
        let mut ctrl_c = pin!(tokio::signal::ctrl_c());
        loop {
            match tokio::time::timeout(Duration::from_secs(1), ctrl_c.as_mut()).await {
                Ok(signal) => {
                    signal.context("failed to listen for Ctrl-C")?;
                    info!("received Ctrl-C");
                    return anyhow::Ok(());
                }
                Err(_) if handles.iter().any(WorkerHandle::is_finished) => {
                    warn!("a worker exited unexpectedly");
                    return anyhow::Ok(());
                }
                Err(_) => {}
            }
        }
    })
}
