//! Shared credential pool
//!
//! The pool is the only mutable state shared between symbol workers. All of
//! its bookkeeping (available keys, checked-out keys, keys cooling down after
//! a failure) sits behind one mutex, and [`CredentialPool::acquire`] and
//! [`CredentialPool::release`] are the only ways to move a key in or out.
//!
//! Cooldowns are scheduled releases owned by the pool: a timer task per
//! cooling key re-inserts it into the available set once its delay elapses.
//! Closing the pool cancels those timers and wakes every blocked acquirer.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::Credential;

/// Shared handle to a credential pool
pub type SharedPool = Arc<CredentialPool>;

/// Pool errors
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PoolError {
    /// The pool was closed; no credential will ever become available
    #[error("credential pool is closed")]
    Closed,

    /// No credential became available within the wait limit
    #[error("no credential available within {0:?}")]
    TimedOut(Duration),

    /// A credential was released that is not currently checked out
    #[error("credential {0} is not checked out")]
    NotCheckedOut(String),
}

/// Point-in-time view of the pool counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolSnapshot {
    /// Keys ready to be handed out
    pub available: usize,
    /// Keys currently held by workers
    pub checked_out: usize,
    /// Keys waiting for their cooldown to elapse
    pub cooling: usize,
    /// Whether the pool has been closed
    pub closed: bool,
}

impl PoolSnapshot {
    /// Total keys the pool is tracking
    pub fn total(&self) -> usize {
        self.available + self.checked_out + self.cooling
    }
}

struct CoolingEntry {
    credential: Credential,
    timer: JoinHandle<()>,
}

#[derive(Default)]
struct PoolState {
    available: VecDeque<Credential>,
    checked_out: HashSet<String>,
    cooling: HashMap<u64, CoolingEntry>,
    next_release_id: u64,
    closed: bool,
}

impl PoolState {
    fn snapshot(&self) -> PoolSnapshot {
        PoolSnapshot {
            available: self.available.len(),
            checked_out: self.checked_out.len(),
            cooling: self.cooling.len(),
            closed: self.closed,
        }
    }
}

/// Pool of API credentials shared by all symbol workers
pub struct CredentialPool {
    state: Mutex<PoolState>,
    notify: Notify,
    self_ref: Weak<CredentialPool>,
}

impl CredentialPool {
    /// Create a shared pool pre-populated with the given credentials
    ///
    /// Duplicate keys are collapsed so a key can never be handed out twice.
    pub fn shared(credentials: Vec<Credential>) -> SharedPool {
        let mut seen = HashSet::new();
        let mut available = VecDeque::with_capacity(credentials.len());
        for credential in credentials {
            if seen.insert(credential.expose().to_string()) {
                available.push_back(credential);
            } else {
                warn!(credential = %credential, "Duplicate credential ignored");
            }
        }

        info!(credentials = available.len(), "Credential pool initialised");

        Arc::new_cyclic(|self_ref| Self {
            state: Mutex::new(PoolState {
                available,
                ..PoolState::default()
            }),
            notify: Notify::new(),
            self_ref: self_ref.clone(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        // Critical sections never panic midway, so a poisoned state is still consistent
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Wait for a credential
    ///
    /// Blocks without polling until a credential is available or the pool is
    /// closed. Any waiting worker may receive any available credential.
    pub async fn acquire(&self) -> Result<Credential, PoolError> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);

            {
                let mut state = self.lock();
                if state.closed {
                    return Err(PoolError::Closed);
                }
                if let Some(credential) = state.available.pop_front() {
                    state.checked_out.insert(credential.expose().to_string());
                    crate::metrics::record_pool_state(&state.snapshot());
                    debug!(credential = %credential, "Credential acquired");
                    return Ok(credential);
                }
                // Register before unlocking so a concurrent release cannot be missed
                notified.as_mut().enable();
            }

            notified.await;
        }
    }

    /// Wait for a credential, giving up after `timeout`
    pub async fn acquire_timeout(&self, timeout: Duration) -> Result<Credential, PoolError> {
        match tokio::time::timeout(timeout, self.acquire()).await {
            Ok(result) => result,
            Err(_) => Err(PoolError::TimedOut(timeout)),
        }
    }

    /// Return a credential to the pool
    ///
    /// With a zero `delay` the credential is available to the next acquirer
    /// immediately. Otherwise it cools down and only becomes visible to
    /// [`acquire`](Self::acquire) once `delay` has elapsed. Never blocks the caller.
    pub fn release(&self, credential: Credential, delay: Duration) -> Result<(), PoolError> {
        let mut state = self.lock();

        if !state.checked_out.remove(credential.expose()) {
            return Err(PoolError::NotCheckedOut(credential.masked()));
        }

        if state.closed {
            debug!(credential = %credential, "Pool closed, dropping released credential");
        } else if delay.is_zero() {
            debug!(credential = %credential, "Credential released");
            state.available.push_back(credential);
            self.notify.notify_one();
        } else {
            let id = state.next_release_id;
            state.next_release_id += 1;

            info!(
                credential = %credential,
                cooldown_secs = delay.as_secs(),
                "Credential cooling down"
            );

            let deadline = Instant::now() + delay;
            let pool = self.self_ref.clone();
            let timer = tokio::spawn(async move {
                tokio::time::sleep_until(deadline).await;
                if let Some(pool) = pool.upgrade() {
                    pool.finish_cooldown(id);
                }
            });
            state.cooling.insert(id, CoolingEntry { credential, timer });
        }

        crate::metrics::record_pool_state(&state.snapshot());
        Ok(())
    }

    fn finish_cooldown(&self, id: u64) {
        let mut state = self.lock();
        let Some(entry) = state.cooling.remove(&id) else {
            return;
        };
        if state.closed {
            return;
        }

        info!(credential = %entry.credential, "Credential cooldown elapsed");
        state.available.push_back(entry.credential);
        crate::metrics::record_pool_state(&state.snapshot());
        self.notify.notify_one();
    }

    /// Permanently close the pool
    ///
    /// Pending cooldowns are cancelled and every blocked or future
    /// [`acquire`](Self::acquire) returns [`PoolError::Closed`].
    pub fn close(&self) {
        let mut state = self.lock();
        if state.closed {
            return;
        }
        state.closed = true;

        for (_, entry) in state.cooling.drain() {
            entry.timer.abort();
        }
        state.available.clear();

        info!(checked_out = state.checked_out.len(), "Credential pool closed");
        crate::metrics::record_pool_state(&state.snapshot());
        drop(state);

        self.notify.notify_waiters();
    }

    /// Whether the pool has been closed
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Current counters
    pub fn snapshot(&self) -> PoolSnapshot {
        self.lock().snapshot()
    }
}
