//! Log output never carries raw credentials

use chrono::TimeDelta;
use orderbook_harvester::credentials::{Credential, CredentialPool};
use orderbook_harvester::failure_log::FailureLog;
use orderbook_harvester::harvest::{HarvestSettings, SymbolWorker, WorkerContext, WorkerOutcome};
use orderbook_harvester::shutdown::ShutdownCoordinator;
use orderbook_harvester::sink::MemorySink;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

use crate::common::{snapshot, t0, MockFetcher};

const KEY: &str = "73034021-THIS-IS-A-SECRET-KEY-0001";

#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn pool_logs_mask_credentials() {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::new("orderbook_harvester=debug"))
        .with_writer(move || writer.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let pool = CredentialPool::shared(vec![Credential::new(KEY), Credential::new(KEY)]);
    let credential = pool.acquire().await.unwrap();
    pool.release(credential, Duration::from_secs(60)).unwrap();
    pool.close();

    let text = logs.text();
    assert!(text.contains("Credential cooling down"));
    assert!(text.contains("7303…0001"));
    assert!(!text.contains(KEY));
}

#[tokio::test(start_paused = true)]
async fn worker_logs_top_of_book_for_each_page() {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::new("orderbook_harvester=debug"))
        .with_writer(move || writer.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let dir = TempDir::new().unwrap();
    let fetcher = Arc::new(MockFetcher::new(|call, attempt| {
        if attempt == 0 {
            Ok(vec![snapshot(&call.symbol, call.since)])
        } else {
            Ok(Vec::new())
        }
    }));
    let ctx = WorkerContext {
        settings: Arc::new(HarvestSettings::new(t0(), t0() + TimeDelta::days(1))),
        pool: CredentialPool::shared(vec![Credential::new(KEY)]),
        fetcher,
        sink: Arc::new(MemorySink::new()),
        failure_log: Arc::new(FailureLog::new(dir.path().join("api_errors.log"))),
        shutdown: ShutdownCoordinator::shared(),
    };

    let report = SymbolWorker::new("X_USD", ctx).run().await;
    assert_eq!(report.outcome, WorkerOutcome::CaughtUp);

    let text = logs.text();
    assert!(text.contains("Page top of book"));
    assert!(text.contains("42000.10"));
    assert!(text.contains("41999.90"));
    assert!(!text.contains(KEY));
}

#[test]
fn credential_formatting_is_masked() {
    let credential = Credential::new(KEY);
    assert_eq!(credential.to_string(), "7303…0001");
    assert!(!format!("{credential:?}").contains(KEY));
    assert_eq!(Credential::new("short").to_string(), "*****");
}
