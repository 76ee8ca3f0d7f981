//! Periodic polling with staleness tracking.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::aggregator::{PollOutcome, StatusAggregator};
use crate::cache::{CachedStatus, StatusCache};
use crate::config::PollSettings;
use crate::endpoint::PrinterEndpoint;
use crate::error::{CoordinatorError, ErrorKind};
use crate::transport::Transport;

/// Polls one printer on a fixed interval and publishes into a [`StatusCache`].
///
/// At most one cycle runs at a time: a tick (or [`refresh`](Self::refresh))
/// that arrives while a cycle is in flight is skipped.
pub struct PollingCoordinator<T> {
    inner: Arc<Inner<T>>,
    running: Mutex<Option<Running>>,
}

struct Running {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

struct Inner<T> {
    endpoint: PrinterEndpoint,
    aggregator: StatusAggregator<T>,
    cache: StatusCache,
    in_flight: Arc<AtomicBool>,
    settings: PollSettings,
}

/// A spawned cycle, aborted when dropped so it never outlives the loop.
struct CycleTask(JoinHandle<PollOutcome>);

impl Drop for CycleTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Held for the duration of one cycle; clears the in-flight flag on drop,
/// including when the cycle is cancelled.
struct InFlightGuard(Arc<AtomicBool>);

impl InFlightGuard {
    fn try_acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(Arc::clone(flag)))
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<T: Transport> Inner<T> {
    async fn run_cycle(&self, _guard: InFlightGuard, cycle_timeout: Duration) -> PollOutcome {
        let poll = self
            .aggregator
            .poll(&self.endpoint, self.settings.call_timeout());

        // Dropping the poll future on timeout drops any open socket with it.
        let outcome = match tokio::time::timeout(cycle_timeout, poll).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(endpoint = %self.endpoint, ?cycle_timeout, "poll cycle timed out");
                PollOutcome::Failure(ErrorKind::Timeout)
            }
        };

        let was_available = self.cache.current().available;
        let published = self.cache.publish(&outcome);
        match &outcome {
            PollOutcome::Success(_) => debug!(endpoint = %self.endpoint, "status refreshed"),
            PollOutcome::PartialSuccess(_) => {
                debug!(endpoint = %self.endpoint, "status partially refreshed")
            }
            PollOutcome::Failure(kind) if was_available => {
                warn!(endpoint = %self.endpoint, %kind, stale = published.is_stale(), "printer unavailable")
            }
            PollOutcome::Failure(kind) => debug!(endpoint = %self.endpoint, %kind, "poll failed"),
        }
        outcome
    }
}

impl<T: Transport> PollingCoordinator<T> {
    /// Create a stopped coordinator for one printer.
    pub fn new(endpoint: PrinterEndpoint, transport: T, settings: PollSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                endpoint,
                aggregator: StatusAggregator::new(transport),
                cache: StatusCache::new(),
                in_flight: Arc::new(AtomicBool::new(false)),
                settings,
            }),
            running: Mutex::new(None),
        }
    }

    /// The printer being polled.
    pub fn endpoint(&self) -> &PrinterEndpoint {
        &self.inner.endpoint
    }

    /// The transport used for sub-queries.
    pub fn transport(&self) -> &T {
        self.inner.aggregator.transport()
    }

    /// Copy of the latest published status.
    pub fn current_status(&self) -> CachedStatus {
        self.inner.cache.current()
    }

    /// Receiver notified after every cycle.
    pub fn subscribe(&self) -> watch::Receiver<CachedStatus> {
        self.inner.cache.subscribe()
    }

    /// Whether the background loop is running.
    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .map(|r| r.as_ref().is_some_and(|r| !r.handle.is_finished()))
            .unwrap_or(false)
    }

    /// Run one cycle now with the configured cycle budget.
    ///
    /// Returns `None` if a cycle was already in flight.
    pub async fn refresh(&self) -> Option<PollOutcome> {
        let guard = InFlightGuard::try_acquire(&self.inner.in_flight)?;
        Some(
            self.inner
                .run_cycle(guard, self.inner.settings.cycle_timeout())
                .await,
        )
    }

    /// Start polling every `interval`; the first cycle runs immediately.
    ///
    /// Must be called from within a tokio runtime. Both durations must be
    /// non-zero.
    pub fn start(&self, interval: Duration, cycle_timeout: Duration) -> Result<(), CoordinatorError> {
        if interval.is_zero() {
            return Err(CoordinatorError::ZeroDuration("interval"));
        }
        if cycle_timeout.is_zero() {
            return Err(CoordinatorError::ZeroDuration("cycle timeout"));
        }

        let mut running = self
            .running
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if running.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            return Err(CoordinatorError::AlreadyRunning);
        }

        let (stop, stop_rx) = oneshot::channel();
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(poll_loop(inner, interval, cycle_timeout, stop_rx));
        *running = Some(Running { stop, handle });

        info!(endpoint = %self.inner.endpoint, ?interval, ?cycle_timeout, "polling started");
        Ok(())
    }

    /// Stop polling. No cycle starts after this returns; one in flight is
    /// abandoned and its connection closed. Calling it twice is harmless.
    pub async fn stop(&self) {
        let running = self
            .running
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        let Some(Running { stop, handle }) = running else {
            return;
        };
        let _ = stop.send(());
        let _ = handle.await;
        info!(endpoint = %self.inner.endpoint, "polling stopped");
    }
}

impl<T> Drop for PollingCoordinator<T> {
    fn drop(&mut self) {
        if let Ok(mut running) = self.running.lock() {
            if let Some(r) = running.take() {
                r.handle.abort();
            }
        }
    }
}

async fn poll_loop<T: Transport>(
    inner: Arc<Inner<T>>,
    interval: Duration,
    cycle_timeout: Duration,
    mut stop: oneshot::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut current: Option<CycleTask> = None;

    loop {
        tokio::select! {
            biased;
            _ = &mut stop => break,
            _ = ticker.tick() => {}
        }

        match InFlightGuard::try_acquire(&inner.in_flight) {
            Some(guard) => {
                let inner = Arc::clone(&inner);
                current = Some(CycleTask(tokio::spawn(async move {
                    inner.run_cycle(guard, cycle_timeout).await
                })));
            }
            None => debug!(endpoint = %inner.endpoint, "cycle still in flight, skipping tick"),
        }
    }

    if let Some(mut cycle) = current.take() {
        cycle.0.abort();
        // wait for the cancelled cycle to be dropped so its socket is closed
        let _ = (&mut cycle.0).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{printing_cycle, refused, ScriptedTransport, Step};
    use tokio::time::{sleep, Instant};

    fn settings() -> PollSettings {
        PollSettings {
            interval_secs: 60,
            cycle_timeout_secs: 5,
            call_timeout_ms: 2000,
        }
    }

    fn coordinator(steps: Vec<Step>) -> PollingCoordinator<Arc<ScriptedTransport>> {
        PollingCoordinator::new(
            PrinterEndpoint::new("10.0.0.5", 8899),
            Arc::new(ScriptedTransport::new(steps)),
            settings(),
        )
    }

    #[tokio::test]
    async fn test_success_then_unreachable() {
        let mut steps = printing_cycle();
        steps.push(refused());
        let coord = coordinator(steps);

        let first = coord.refresh().await.unwrap();
        assert!(matches!(first, PollOutcome::Success(_)));
        let cached = coord.current_status();
        assert!(cached.available);
        let snapshot = cached.status.clone().unwrap();
        assert!(snapshot.fields().all(|f| f.reading.is_known()));

        let second = coord.refresh().await.unwrap();
        assert_eq!(second, PollOutcome::Failure(ErrorKind::Unreachable));
        let cached = coord.current_status();
        assert!(!cached.available);
        assert_eq!(cached.status, Some(snapshot));
        assert!(cached.is_stale());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_transport_times_out_cycle() {
        let mut steps = printing_cycle();
        steps.push(Step::Hang);
        let coord = coordinator(steps);
        coord.refresh().await.unwrap();
        let before = coord.current_status().status;

        let started = Instant::now();
        let outcome = coord.refresh().await.unwrap();
        let elapsed = started.elapsed();

        assert_eq!(outcome, PollOutcome::Failure(ErrorKind::Timeout));
        assert!(elapsed >= Duration::from_secs(5));
        assert!(elapsed < Duration::from_secs(5) + Duration::from_millis(50));
        let cached = coord.current_status();
        assert!(!cached.available);
        assert_eq!(cached.status, before);
        // guard released, so the next cycle can run
        assert!(coord.refresh().await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_refresh_is_skipped() {
        let mut steps = printing_cycle();
        if let Step::Reply(bytes) = steps[0].clone() {
            steps[0] = Step::Slow(Duration::from_secs(1), bytes);
        }
        let coord = coordinator(steps);

        let (a, b) = tokio::join!(coord.refresh(), coord.refresh());
        assert!(matches!(a, Some(PollOutcome::Success(_))));
        assert!(b.is_none());
        assert_eq!(coord.transport().requests().len(), 4);
        assert_eq!(coord.transport().peak_concurrency(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_skipped_while_cycle_in_flight() {
        let mut steps = printing_cycle();
        if let Step::Reply(bytes) = steps[0].clone() {
            steps[0] = Step::Slow(Duration::from_millis(2500), bytes);
        }
        let coord = coordinator(steps);
        coord
            .start(Duration::from_secs(1), Duration::from_secs(5))
            .unwrap();

        // ticks at 1s and 2s land while the first cycle is still running
        sleep(Duration::from_millis(2800)).await;
        assert_eq!(coord.transport().requests().len(), 4);
        assert!(coord.current_status().available);

        // tick at 3s starts a new cycle; the script is exhausted so it fails
        sleep(Duration::from_millis(400)).await;
        assert_eq!(coord.transport().requests().len(), 5);
        assert!(!coord.current_status().available);
        assert_eq!(coord.transport().peak_concurrency(), 1);

        coord.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_prevents_further_cycles() {
        let coord = coordinator(printing_cycle());
        let mut rx = coord.subscribe();
        coord
            .start(Duration::from_secs(10), Duration::from_secs(5))
            .unwrap();
        assert_eq!(
            coord.start(Duration::from_secs(10), Duration::from_secs(5)),
            Err(CoordinatorError::AlreadyRunning)
        );

        rx.changed().await.unwrap();
        assert!(rx.borrow().available);
        assert!(coord.is_running());

        coord.stop().await;
        coord.stop().await;
        assert!(!coord.is_running());

        sleep(Duration::from_secs(60)).await;
        assert_eq!(coord.transport().requests().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_abandons_in_flight_cycle() {
        let coord = coordinator(vec![Step::Hang]);
        coord
            .start(Duration::from_secs(10), Duration::from_secs(5))
            .unwrap();
        sleep(Duration::from_millis(100)).await;
        assert_eq!(coord.transport().requests().len(), 1);

        coord.stop().await;
        // the cycle task was aborted, so the guard is free again
        assert!(coord.refresh().await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_aborts_in_flight_cycle() {
        let transport = Arc::new(ScriptedTransport::new(vec![Step::Hang]));
        let coord = PollingCoordinator::new(
            PrinterEndpoint::new("10.0.0.5", 8899),
            Arc::clone(&transport),
            settings(),
        );
        coord
            .start(Duration::from_secs(10), Duration::from_secs(5))
            .unwrap();
        sleep(Duration::from_millis(100)).await;
        assert_eq!(transport.requests().len(), 1);

        drop(coord);
        sleep(Duration::from_millis(100)).await;
        // loop and cycle tasks are both gone, releasing their clones
        assert_eq!(Arc::strong_count(&transport), 1);
    }

    #[tokio::test]
    async fn test_start_rejects_zero_durations() {
        let coord = coordinator(printing_cycle());
        assert_eq!(
            coord.start(Duration::ZERO, Duration::from_secs(5)),
            Err(CoordinatorError::ZeroDuration("interval"))
        );
        assert_eq!(
            coord.start(Duration::from_secs(1), Duration::ZERO),
            Err(CoordinatorError::ZeroDuration("cycle timeout"))
        );
        assert!(!coord.is_running());
        assert!(coord.transport().requests().is_empty());
    }
}
