use orderbook_harvester::credentials::{Credential, CredentialPool, PoolError};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

fn pool_of(keys: &[&str]) -> orderbook_harvester::credentials::SharedPool {
    CredentialPool::shared(keys.iter().map(|k| Credential::new(*k)).collect())
}

/// No credential is ever held by two tasks at once, under heavy contention
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn pool_never_hands_out_a_credential_twice() {
    let pool = pool_of(&["key-a", "key-b", "key-c"]);
    let held: Arc<Mutex<HashSet<String>>> = Arc::new(Mutex::new(HashSet::new()));

    let mut tasks = Vec::new();
    for worker in 0..8 {
        let pool = pool.clone();
        let held = held.clone();
        tasks.push(tokio::spawn(async move {
            for round in 0..50 {
                let credential = pool.acquire().await.unwrap();
                let key = credential.expose().to_string();
                assert!(
                    held.lock().unwrap().insert(key.clone()),
                    "{key} handed out twice"
                );
                tokio::task::yield_now().await;
                assert!(held.lock().unwrap().remove(&key));

                let delay = if (worker + round) % 5 == 0 {
                    Duration::from_millis(2)
                } else {
                    Duration::ZERO
                };
                pool.release(credential, delay).unwrap();
            }
        }));
    }

    for task in tasks {
        tokio::time::timeout(Duration::from_secs(30), task)
            .await
            .expect("contention test stalled")
            .unwrap();
    }

    // All cooldowns eventually drain back into the available set
    tokio::time::sleep(Duration::from_millis(50)).await;
    let snapshot = pool.snapshot();
    assert_eq!(snapshot.available, 3);
    assert_eq!(snapshot.checked_out, 0);
    assert_eq!(snapshot.cooling, 0);
}

/// A delayed release is invisible until its delay elapses, then visible
#[tokio::test(start_paused = true)]
async fn cooldown_respected_and_then_released() {
    let pool = pool_of(&["key-a"]);
    let credential = pool.acquire().await.unwrap();

    let released_at = Instant::now();
    pool.release(credential, Duration::from_secs(3 * 60 * 60))
        .unwrap();

    let waiter = {
        let pool = pool.clone();
        tokio::spawn(async move {
            let credential = pool.acquire().await.unwrap();
            (credential.expose().to_string(), Instant::now())
        })
    };

    let (key, acquired_at) = waiter.await.unwrap();
    assert_eq!(key, "key-a");
    assert!(acquired_at - released_at >= Duration::from_secs(3 * 60 * 60));
}

/// Release does not wait for the cooldown
#[tokio::test(start_paused = true)]
async fn delayed_release_does_not_block_caller() {
    let pool = pool_of(&["key-a"]);
    let credential = pool.acquire().await.unwrap();

    let before = Instant::now();
    pool.release(credential, Duration::from_secs(600)).unwrap();
    assert_eq!(Instant::now(), before);
    assert_eq!(pool.snapshot().cooling, 1);
}

/// Every blocked waiter is eventually served by a single credential
#[tokio::test(start_paused = true)]
async fn blocked_waiters_all_make_progress() {
    let pool = pool_of(&["key-a"]);
    let served = Arc::new(Mutex::new(0usize));

    let mut tasks = Vec::new();
    for _ in 0..5 {
        let pool = pool.clone();
        let served = served.clone();
        tasks.push(tokio::spawn(async move {
            let credential = pool.acquire().await.unwrap();
            tokio::time::sleep(Duration::from_secs(1)).await;
            *served.lock().unwrap() += 1;
            pool.release(credential, Duration::from_secs(10)).unwrap();
        }));
    }

    for task in tasks {
        task.await.unwrap();
    }
    assert_eq!(*served.lock().unwrap(), 5);
}

/// An empty pool that is closed wakes its waiters instead of hanging
#[tokio::test]
async fn closing_empty_pool_releases_waiters() {
    let pool = pool_of(&[]);
    let waiter = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.acquire().await })
    };
    tokio::task::yield_now().await;
    pool.close();

    let result = tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(result.unwrap_err(), PoolError::Closed);
}
