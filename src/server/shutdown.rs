//! Lifecycle coordination for [`super::Server::stop`]: a broadcast stop
//! signal plus a counter of live per-connection/accept fibers that `stop`
//! awaits before returning.
//!
//! This is an atomic wait-group: a plain `AtomicUsize` counter paired
//! with a `tokio::sync::Notify`, rather than the teacher's hand-polled
//! `futures 0.1` drain (`common::drain`'s `Signal`/`Watch`/`Draining`
//! state machine) — see `DESIGN.md`. `async`/`await` makes the teacher's
//! manual `poll()` plumbing unnecessary; a guard's `Drop` impl plus one
//! `Notify` is enough to let `wait_idle` suspend until the last guard is
//! gone.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{watch, Notify};

/// Creates the server-wide stop broadcast. The sender lives on
/// [`super::Server`]; every accept/reader/shutdown fiber holds a clone of
/// the receiver.
pub fn stop_channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

/// An atomic wait-group. Every fiber the server spawns holds one
/// [`FiberGuard`] for its lifetime; [`FiberCounter::wait_idle`] resolves
/// once every outstanding guard has been dropped.
#[derive(Default)]
pub struct FiberCounter {
    count: AtomicUsize,
    idle: Notify,
}

impl FiberCounter {
    pub fn new() -> Arc<Self> {
        Arc::new(FiberCounter {
            count: AtomicUsize::new(0),
            idle: Notify::new(),
        })
    }

    /// Increments the live-fiber count and returns a guard that
    /// decrements it on drop.
    pub fn guard(self: &Arc<Self>) -> FiberGuard {
        self.count.fetch_add(1, Ordering::SeqCst);
        FiberGuard {
            counter: self.clone(),
        }
    }

    /// Resolves once the live-fiber count has reached zero. Registers
    /// interest in the `idle` notification before checking the count, so
    /// a guard drop racing this call is never missed.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.count.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

pub struct FiberGuard {
    counter: Arc<FiberCounter>,
}

impl Drop for FiberGuard {
    fn drop(&mut self) {
        if self.counter.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.counter.idle.notify_waiters();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn wait_idle_returns_immediately_with_no_guards() {
        let counter = FiberCounter::new();
        counter.wait_idle().await;
    }

    #[tokio::test]
    async fn wait_idle_blocks_until_every_guard_drops() {
        let counter = FiberCounter::new();
        let a = counter.guard();
        let b = counter.guard();

        let waiter_counter = counter.clone();
        let waiter = tokio::spawn(async move {
            waiter_counter.wait_idle().await;
        });

        tokio::task::yield_now().await;
        drop(a);
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        drop(b);
        waiter.await.unwrap();
    }
}
