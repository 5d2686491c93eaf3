//! Cancellable repeating fetch tasks

use parking_lot::Mutex;
use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Runs `tick` immediately and then once per period until stopped.
///
/// Every tick is spawned as its own task, so a slow fetch never delays the
/// next one and several may be in flight at once. Stopping the poller only
/// prevents further ticks; fetches already issued still complete.
pub struct Poller {
    name: &'static str,
    ticker: JoinHandle<()>,
}

impl Poller {
    pub fn spawn<F, Fut>(name: &'static str, period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let ticker = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                tracing::trace!(poller = name, "Poll tick");
                tokio::spawn(tick());
            }
        });

        tracing::debug!(poller = name, ?period, "Poller started");
        Self { name, ticker }
    }

    pub fn stop(&self) {
        if !self.ticker.is_finished() {
            tracing::debug!(poller = self.name, "Poller stopped");
        }
        self.ticker.abort();
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.ticker.abort();
    }
}

/// Owns at most one poller, keyed by the scope it polls.
pub struct ScopedPoller<K> {
    current: Mutex<Option<(K, Poller)>>,
}

impl<K: PartialEq + Clone + Debug> ScopedPoller<K> {
    pub fn new() -> Self {
        Self {
            current: Mutex::new(None),
        }
    }

    /// Replaces the running poller with one for `scope`. The old one is
    /// stopped before the new one starts, under the same lock, so two scopes
    /// never tick side by side. Returns false if `scope` is already running.
    pub fn restart<F, Fut>(&self, scope: K, name: &'static str, period: Duration, tick: F) -> bool
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut current = self.current.lock();
        if matches!(&*current, Some((running, _)) if *running == scope) {
            return false;
        }

        if let Some((old, poller)) = current.take() {
            tracing::debug!(poller = name, scope = ?old, "Leaving scope");
            poller.stop();
        }
        *current = Some((scope, Poller::spawn(name, period, tick)));
        true
    }

    /// Stops the running poller and returns the scope it was polling.
    pub fn stop(&self) -> Option<K> {
        self.current.lock().take().map(|(scope, poller)| {
            poller.stop();
            scope
        })
    }

    pub fn scope(&self) -> Option<K> {
        self.current.lock().as_ref().map(|(scope, _)| scope.clone())
    }
}

impl<K: PartialEq + Clone + Debug> Default for ScopedPoller<K> {
    fn default() -> Self {
        Self::new()
    }
}
