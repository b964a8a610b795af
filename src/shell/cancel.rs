use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Instant,
};

use once_cell::sync::Lazy;

/// A poll-able "should this operation stop" predicate. Checkers are invoked at
/// every expansion checkpoint, potentially thousands of times per operation,
/// so implementations must be O(1), non-blocking, and must not fail.
pub type CancelChecker = Arc<dyn Fn() -> bool + Send + Sync>;

static NEVER_CANCEL: Lazy<CancelChecker> = Lazy::new(|| Arc::new(|| false));

/// The default checker: never signals cancellation.
pub fn no_cancel() -> CancelChecker {
    NEVER_CANCEL.clone()
}

/// A checker that trips once `deadline` has passed. Timeouts are just another
/// cancellation source under the polling contract.
pub fn cancel_after(deadline: Instant) -> CancelChecker {
    Arc::new(move || Instant::now() >= deadline)
}

/// An interrupt flag shared between the thread consuming an operation and
/// whatever sets it: a ctrl-c handler, a watchdog, or a parent operation
/// cancelling its children.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    flag: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// A checker view over this flag, for wiring into an operation context.
    pub fn checker(&self) -> CancelChecker {
        let flag = self.flag.clone();
        Arc::new(move || flag.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use std::{thread, time::Duration};

    use super::*;

    #[test]
    fn no_cancel_never_signals() {
        let checker = no_cancel();
        for _ in 0..1000 {
            assert!(!checker());
        }
    }

    #[test]
    fn flag_set_from_other_thread_is_observed() {
        let flag = CancelFlag::new();
        let checker = flag.checker();
        assert!(!checker());

        let remote = flag.clone();
        thread::spawn(move || remote.set()).join().unwrap();
        assert!(checker());

        flag.clear();
        assert!(!checker());
    }

    #[test]
    fn deadline_checker_trips_after_deadline() {
        let checker = cancel_after(Instant::now() - Duration::from_millis(1));
        assert!(checker());
        let far = cancel_after(Instant::now() + Duration::from_secs(3600));
        assert!(!far());
    }
}
