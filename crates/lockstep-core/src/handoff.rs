//! Turn handoff between the two tasks of a run.
//!
//! Each task owns one [`HandoffFlag`]. A task holds the turn while its own
//! flag is set; handing the turn over means setting the peer's flag. At any
//! quiescent moment exactly one of the two flags is set, starting with the
//! first task's.
//!
//! ```text
//!   T1                                T2
//!   acquire_turn (own flag preset)    acquire_turn ......... blocks
//!   step                                   :
//!   yield_and_wait --set T2 flag-->   (wakes, clears T2 flag)
//!      : blocks                       step
//!   (wakes, clears T1 flag) <--set--  yield_and_wait
//!   step                                   : blocks
//! ```

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::log::SequenceLog;

/// How long a task waits for the turn to come back before reporting a stall.
pub const DEFAULT_HANDOFF_TIMEOUT: Duration = Duration::from_secs(2);

/// A single-slot signal: set by the peer, consumed by the owner.
#[derive(Debug, Default)]
pub struct HandoffFlag {
    set: AtomicBool,
    notify: Notify,
    grants: AtomicU64,
    takes: AtomicU64,
}

/// How often a flag was granted (set by the peer) and taken (consumed by its
/// owner). The initial preset of the first task's flag is not a grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HandoffStats {
    pub grants: u64,
    pub takes: u64,
}

impl HandoffFlag {
    /// A flag that starts set when its owner begins holding the turn.
    pub fn new(initially_set: bool) -> Self {
        Self {
            set: AtomicBool::new(initially_set),
            ..Self::default()
        }
    }

    /// Whether a grant is waiting to be taken.
    pub fn is_set(&self) -> bool {
        self.set.load(Ordering::SeqCst)
    }

    /// Set the flag and wake the owner if it is waiting. Never blocks.
    pub fn grant(&self) {
        self.grants.fetch_add(1, Ordering::SeqCst);
        self.set.store(true, Ordering::SeqCst);
        // Stores a permit when nobody waits yet, so the wakeup is not lost.
        self.notify.notify_one();
    }

    /// Wait until the flag is set, then clear it.
    ///
    /// Checking and clearing is one atomic swap, so a grant is consumed
    /// exactly once. Cancel-safe: dropping the future never loses a grant.
    pub async fn take(&self) {
        loop {
            if self.set.swap(false, Ordering::SeqCst) {
                self.takes.fetch_add(1, Ordering::SeqCst);
                return;
            }
            self.notify.notified().await;
        }
    }

    /// Drop a pending grant without waking anyone.
    pub fn clear(&self) {
        self.set.store(false, Ordering::SeqCst);
    }

    /// Grants and takes counted so far.
    pub fn stats(&self) -> HandoffStats {
        HandoffStats {
            grants: self.grants.load(Ordering::SeqCst),
            takes: self.takes.load(Ordering::SeqCst),
        }
    }
}

/// One task's view of the handoff pair: its own flag, the peer's flag, the
/// shared log and the stall bound.
#[derive(Debug)]
pub struct Turn {
    label: String,
    own: Arc<HandoffFlag>,
    peer: Arc<HandoffFlag>,
    log: Arc<SequenceLog>,
    timeout: Duration,
}

/// Build the two [`Turn`]s of a run. The first starts holding the turn.
pub fn turn_pair(
    first_label: &str,
    second_label: &str,
    log: Arc<SequenceLog>,
    timeout: Duration,
) -> (Turn, Turn) {
    let first_flag = Arc::new(HandoffFlag::new(true));
    let second_flag = Arc::new(HandoffFlag::new(false));

    let first = Turn {
        label: first_label.to_owned(),
        own: Arc::clone(&first_flag),
        peer: Arc::clone(&second_flag),
        log: Arc::clone(&log),
        timeout,
    };
    let second = Turn {
        label: second_label.to_owned(),
        own: second_flag,
        peer: first_flag,
        log,
        timeout,
    };
    (first, second)
}

impl Turn {
    /// `T1` or `T2`.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Accounting for this task's own flag.
    pub fn stats(&self) -> HandoffStats {
        self.own.stats()
    }

    /// Whether this task's own flag is currently set.
    pub fn holds_grant(&self) -> bool {
        self.own.is_set()
    }

    /// Emit a line on the shared log under this task's label.
    pub fn log(&self, headline: &str, detail: Option<&str>) -> u64 {
        self.log.log(&self.label, headline, detail)
    }

    /// Block until this task is granted the turn, consuming the grant.
    pub async fn acquire_turn(&self) {
        debug!(task = %self.label, "waiting for turn");
        self.own.take().await;
        debug!(task = %self.label, "turn acquired");
    }

    /// Hand the turn to the peer. Never blocks.
    pub fn release_turn(&self) {
        debug!(task = %self.label, "releasing turn");
        self.peer.grant();
    }

    /// Hand the turn to the peer and wait for it to come back.
    ///
    /// If the peer does not hand it back within the timeout, a stall line is
    /// logged and the task carries on anyway.
    pub async fn yield_and_wait(&self) {
        self.release_turn();
        if tokio::time::timeout(self.timeout, self.own.take())
            .await
            .is_err()
        {
            self.report_stall();
        }
        self.own.clear();
    }

    /// Like [`yield_and_wait`](Self::yield_and_wait), while `pending` (typically
    /// a statement blocked on a lock the peer holds) makes progress.
    ///
    /// The operation and the wait for the turn share one deadline. Missing it
    /// logs a single stall line; the operation is still driven to completion
    /// and its output returned.
    pub async fn yield_and_wait_on<F: Future>(&self, pending: F) -> F::Output {
        self.release_turn();
        let deadline = Instant::now() + self.timeout;
        let stalled = AtomicBool::new(false);
        let stall = || {
            if !stalled.swap(true, Ordering::SeqCst) {
                self.report_stall();
            }
        };

        let operation = async {
            tokio::pin!(pending);
            match tokio::time::timeout_at(deadline, &mut pending).await {
                Ok(output) => output,
                Err(_) => {
                    stall();
                    pending.await
                }
            }
        };
        let turn_back = async {
            if tokio::time::timeout_at(deadline, self.own.take())
                .await
                .is_err()
            {
                stall();
            }
        };

        let (output, ()) = futures::future::join(operation, turn_back).await;
        self.own.clear();
        output
    }

    fn report_stall(&self) {
        warn!(
            task = %self.label,
            timeout_ms = self.timeout.as_millis() as u64,
            "turn was not handed back in time"
        );
        self.log("yield_to_other", Some("TIMEOUT"));
    }
}
