use chrono::TimeDelta;
use orderbook_harvester::credentials::{Credential, CredentialPool, SharedPool};
use orderbook_harvester::failure_log::FailureLog;
use orderbook_harvester::fetcher::PageFetcher;
use orderbook_harvester::harvest::{HarvestSettings, SymbolWorker, WorkerContext, WorkerOutcome};
use orderbook_harvester::shutdown::ShutdownCoordinator;
use orderbook_harvester::sink::{MemorySink, PersistenceSink};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use crate::common::{page_between, rate_limited, snapshot, t0, FlakySink, MockFetcher};

struct Harness {
    ctx: WorkerContext,
    _dir: TempDir,
}

fn harness(
    settings: HarvestSettings,
    pool: SharedPool,
    fetcher: Arc<dyn PageFetcher>,
    sink: Arc<dyn PersistenceSink>,
) -> Harness {
    let dir = TempDir::new().unwrap();
    let failure_log = Arc::new(FailureLog::new(dir.path().join("api_errors.log")));
    Harness {
        ctx: WorkerContext {
            settings: Arc::new(settings),
            pool,
            fetcher,
            sink,
            failure_log,
            shutdown: ShutdownCoordinator::shared(),
        },
        _dir: dir,
    }
}

fn settings() -> HarvestSettings {
    HarvestSettings::new(t0(), t0() + TimeDelta::days(1))
}

fn single_key_pool() -> SharedPool {
    CredentialPool::shared(vec![Credential::new("key-aaaa-0001")])
}

/// An empty page ends the worker and returns its credential exactly once
#[tokio::test(start_paused = true)]
async fn empty_page_releases_credential_exactly_once() {
    let pool = single_key_pool();
    let fetcher = Arc::new(MockFetcher::empty());
    let h = harness(settings(), pool.clone(), fetcher.clone(), Arc::new(MemorySink::new()));

    let report = SymbolWorker::new("X_USD", h.ctx.clone()).run().await;

    assert_eq!(report.outcome, WorkerOutcome::CaughtUp);
    assert_eq!(fetcher.calls().len(), 1);
    let snapshot = pool.snapshot();
    assert_eq!(snapshot.available, 1);
    assert_eq!(snapshot.checked_out, 0);
    assert_eq!(snapshot.cooling, 0);
}

/// Each fetch starts strictly after the previous one
#[tokio::test(start_paused = true)]
async fn cursor_strictly_increases_between_fetches() {
    // Provider stalls: every page ends exactly at the requested start
    let fetcher = Arc::new(MockFetcher::new(|call, attempt| {
        if attempt >= 6 {
            Ok(Vec::new())
        } else {
            Ok(vec![snapshot(&call.symbol, call.since)])
        }
    }));
    let h = harness(
        settings(),
        single_key_pool(),
        fetcher.clone(),
        Arc::new(MemorySink::new()),
    );

    let report = SymbolWorker::new("X_USD", h.ctx.clone()).run().await;
    assert_eq!(report.outcome, WorkerOutcome::CaughtUp);

    let calls = fetcher.calls();
    assert_eq!(calls.len(), 7);
    for pair in calls.windows(2) {
        assert!(pair[1].since > pair[0].since);
        assert_eq!(pair[1].since - pair[0].since, TimeDelta::seconds(50));
    }
}

/// The worker resumes from the newest stored record
#[tokio::test(start_paused = true)]
async fn worker_resumes_from_stored_data() {
    let stored_until = t0() + TimeDelta::hours(6);
    let sink = Arc::new(MemorySink::with_records(
        "X_USD",
        vec![snapshot("X_USD", stored_until)],
    ));
    let fetcher = Arc::new(MockFetcher::empty());
    let h = harness(settings(), single_key_pool(), fetcher.clone(), sink);

    SymbolWorker::new("X_USD", h.ctx.clone()).run().await;
    assert_eq!(fetcher.calls()[0].since, stored_until);
}

/// The page limit is passed to every fetch
#[tokio::test(start_paused = true)]
async fn page_limit_forwarded_to_fetcher() {
    let fetcher = Arc::new(MockFetcher::empty());
    let h = harness(
        settings().with_page_limit(250),
        single_key_pool(),
        fetcher.clone(),
        Arc::new(MemorySink::new()),
    );

    SymbolWorker::new("X_USD", h.ctx.clone()).run().await;
    assert_eq!(fetcher.calls()[0].limit, 250);
}

/// A failed fetch rotates to another credential at the same cursor
#[tokio::test(start_paused = true)]
async fn failure_rotates_to_next_credential_without_waiting() {
    let pool = CredentialPool::shared(vec![
        Credential::new("key-aaaa-0001"),
        Credential::new("key-bbbb-0002"),
    ]);
    let fetcher = Arc::new(MockFetcher::new(|call, _| {
        if call.credential == "key-aaaa-0001" {
            Err(rate_limited())
        } else {
            Ok(Vec::new())
        }
    }));
    let h = harness(settings(), pool.clone(), fetcher.clone(), Arc::new(MemorySink::new()));

    let started = tokio::time::Instant::now();
    let report = SymbolWorker::new("X_USD", h.ctx.clone()).run().await;

    assert_eq!(report.outcome, WorkerOutcome::CaughtUp);
    assert_eq!(report.fetch_failures, 1);
    assert!(started.elapsed() < Duration::from_secs(1));

    let calls = fetcher.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].credential, "key-aaaa-0001");
    assert_eq!(calls[1].credential, "key-bbbb-0002");
    assert_eq!(calls[0].since, calls[1].since);

    // The failed key is still cooling down
    let snapshot = pool.snapshot();
    assert_eq!(snapshot.cooling, 1);
    assert_eq!(snapshot.available, 1);
}

/// Consecutive requests of one symbol are spaced by the request delay
#[tokio::test(start_paused = true)]
async fn request_delay_between_pages() {
    let fetcher = Arc::new(MockFetcher::new(|call, attempt| {
        if attempt >= 2 {
            Ok(Vec::new())
        } else {
            Ok(vec![snapshot(&call.symbol, call.since)])
        }
    }));
    let h = harness(
        settings().with_request_delay(Duration::from_secs(5)),
        single_key_pool(),
        fetcher,
        Arc::new(MemorySink::new()),
    );

    let started = tokio::time::Instant::now();
    SymbolWorker::new("X_USD", h.ctx.clone()).run().await;
    assert!(started.elapsed() >= Duration::from_secs(10));
}

/// Stored data already past the end time means there is nothing to fetch
#[tokio::test(start_paused = true)]
async fn stored_data_past_end_skips_fetching() {
    let sink = Arc::new(MemorySink::with_records(
        "X_USD",
        vec![snapshot("X_USD", t0() + TimeDelta::days(2))],
    ));
    let fetcher = Arc::new(MockFetcher::empty());
    let h = harness(settings(), single_key_pool(), fetcher.clone(), sink);

    let report = SymbolWorker::new("X_USD", h.ctx.clone()).run().await;
    assert_eq!(report.outcome, WorkerOutcome::ReachedEnd);
    assert!(fetcher.calls().is_empty());
}

/// A sink that cannot report its latest record ends only that worker
#[tokio::test(start_paused = true)]
async fn resume_failure_is_fatal_for_worker() {
    let pool = single_key_pool();
    let fetcher = Arc::new(MockFetcher::empty());
    let sink = Arc::new(FlakySink::new().failing_latest_for("X_USD"));
    let h = harness(settings(), pool.clone(), fetcher.clone(), sink);

    let report = SymbolWorker::new("X_USD", h.ctx.clone()).run().await;

    assert!(matches!(report.outcome, WorkerOutcome::ResumeFailed(_)));
    assert!(report.final_cursor.is_none());
    assert!(fetcher.calls().is_empty());
    assert_eq!(pool.snapshot().available, 1);
}

/// With a wait timeout configured, a starved worker gives up
#[tokio::test(start_paused = true)]
async fn credential_wait_timeout_ends_worker() {
    let pool = single_key_pool();
    let _held = pool.acquire().await.unwrap();
    let h = harness(
        settings().with_credential_wait_timeout(Some(Duration::from_secs(30))),
        pool,
        Arc::new(MockFetcher::empty()),
        Arc::new(MemorySink::new()),
    );

    let started = tokio::time::Instant::now();
    let report = SymbolWorker::new("X_USD", h.ctx.clone()).run().await;

    assert_eq!(report.outcome, WorkerOutcome::CredentialWaitTimedOut);
    assert!(started.elapsed() >= Duration::from_secs(30));
}

/// Closing the pool ends a waiting worker
#[tokio::test(start_paused = true)]
async fn closed_pool_ends_waiting_worker() {
    let pool = single_key_pool();
    let _held = pool.acquire().await.unwrap();
    let h = harness(
        settings(),
        pool.clone(),
        Arc::new(MockFetcher::empty()),
        Arc::new(MemorySink::new()),
    );

    let worker = tokio::spawn(SymbolWorker::new("X_USD", h.ctx.clone()).run());
    tokio::time::sleep(Duration::from_secs(60)).await;
    pool.close();

    let report = worker.await.unwrap();
    assert_eq!(report.outcome, WorkerOutcome::NoCredentials);
}

/// Fetch failures are written to the failure log with the full key
#[tokio::test(start_paused = true)]
async fn fetch_failure_written_to_failure_log() {
    let fetcher = Arc::new(MockFetcher::new(|_, attempt| {
        if attempt == 0 {
            Err(rate_limited())
        } else {
            Ok(Vec::new())
        }
    }));
    let h = harness(
        settings(),
        single_key_pool(),
        fetcher,
        Arc::new(MemorySink::new()),
    );

    SymbolWorker::new("X_USD", h.ctx.clone()).run().await;

    let contents = std::fs::read_to_string(h.ctx.failure_log.path()).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("\tcredential=key-aaaa-0001\t"));
    assert!(lines[0].contains("\tkind=rate_limit\t"));
}

/// Pages are persisted in one call per page, in order
#[tokio::test(start_paused = true)]
async fn one_persist_call_per_page() {
    let fetcher = Arc::new(MockFetcher::new(|call, attempt| {
        if attempt >= 3 {
            Ok(Vec::new())
        } else {
            Ok(page_between(
                &call.symbol,
                call.since,
                call.since + TimeDelta::seconds(30),
                10,
            ))
        }
    }));
    let sink = Arc::new(FlakySink::new());
    let h = harness(settings(), single_key_pool(), fetcher, sink.clone());

    let report = SymbolWorker::new("X_USD", h.ctx.clone()).run().await;

    assert_eq!(report.pages_fetched, 3);
    assert_eq!(report.records_persisted, 30);
    assert_eq!(sink.append_calls(), 3);
    let records = sink.records("X_USD");
    assert!(records
        .windows(2)
        .all(|w| w[0].exchange_time <= w[1].exchange_time));
}
