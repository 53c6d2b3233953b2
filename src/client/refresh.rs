//! Single-flight coordination of token refreshes.

use std::future::Future;
use std::sync::{Arc, Mutex};

use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::debug;

use crate::models::AccessToken;

type Flight = Shared<BoxFuture<'static, Option<AccessToken>>>;

#[derive(Default)]
struct State {
    pending: Option<Flight>,
    /// Number of refreshes that have resolved so far.
    completed: u64,
    /// Outcome of the most recently resolved refresh.
    last_outcome: Option<AccessToken>,
}

/// Makes sure at most one refresh runs per burst of authentication failures.
///
/// The first caller starts the refresh; everyone arriving while it is pending
/// awaits the same shared result. The pending slot empties itself the moment
/// the refresh resolves. A request that was sent before that moment reuses
/// the recorded outcome (see `run_after`), so only failures of requests sent
/// afterwards start a new refresh.
#[derive(Default)]
pub struct RefreshCoordinator {
    state: Arc<Mutex<State>>,
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_refreshing(&self) -> bool {
        self.state
            .lock()
            .expect("refresh state mutex poisoned")
            .pending
            .is_some()
    }

    /// The number of resolved refreshes. Read it before sending a request
    /// and hand it to `run_after` if the request fails.
    pub fn generation(&self) -> u64 {
        self.state
            .lock()
            .expect("refresh state mutex poisoned")
            .completed
    }

    /// Joins the pending refresh, or starts one with `start` if none is pending.
    pub async fn run<F, Fut>(&self, start: F) -> Option<AccessToken>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Option<AccessToken>> + Send + 'static,
    {
        self.join_or_start(None, start).await
    }

    /// Like `run`, for a request sent at generation `sent_at`. If a refresh
    /// resolved after that, its outcome (success or failure) is returned and
    /// nothing new is started.
    pub async fn run_after<F, Fut>(&self, sent_at: u64, start: F) -> Option<AccessToken>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Option<AccessToken>> + Send + 'static,
    {
        self.join_or_start(Some(sent_at), start).await
    }

    // Checking the state and installing a new flight happen under one lock
    // with no `.await` in between.
    async fn join_or_start<F, Fut>(&self, sent_at: Option<u64>, start: F) -> Option<AccessToken>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Option<AccessToken>> + Send + 'static,
    {
        let flight = {
            let mut state = self.state.lock().expect("refresh state mutex poisoned");
            if let Some(pending) = state.pending.as_ref() {
                debug!("Joining the token refresh already in flight");
                pending.clone()
            } else if matches!(sent_at, Some(generation) if state.completed > generation) {
                debug!("A token refresh resolved after the request was sent; reusing its outcome");
                return state.last_outcome.clone();
            } else {
                debug!("Starting a token refresh");
                let operation = start();
                let release = Arc::clone(&self.state);
                let flight = async move {
                    let token = operation.await;
                    let mut state = release.lock().expect("refresh state mutex poisoned");
                    state.pending = None;
                    state.completed += 1;
                    state.last_outcome = token.clone();
                    token
                }
                .boxed()
                .shared();
                state.pending = Some(flight.clone());
                flight
            }
        };
        flight.await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::join_all;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn token(raw: &str) -> AccessToken {
        AccessToken::new(raw).unwrap()
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_refresh() {
        let coordinator = RefreshCoordinator::new();
        let started = Arc::new(AtomicUsize::new(0));

        let callers = (0..5).map(|_| {
            let started = started.clone();
            coordinator.run(move || {
                started.fetch_add(1, Ordering::SeqCst);
                async {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Some(token("new-token"))
                }
            })
        });
        let results = join_all(callers).await;

        assert_eq!(started.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| r.as_ref() == Some(&token("new-token"))));
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test]
    async fn test_failed_refresh_is_shared_too() {
        let coordinator = RefreshCoordinator::new();
        let started = Arc::new(AtomicUsize::new(0));

        let callers = (0..3).map(|_| {
            let started = started.clone();
            coordinator.run(move || {
                started.fetch_add(1, Ordering::SeqCst);
                async {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    None
                }
            })
        });
        let results = join_all(callers).await;

        assert_eq!(started.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(Option::is_none));
    }

    #[tokio::test]
    async fn test_sequential_refreshes_start_fresh_flights() {
        let coordinator = RefreshCoordinator::new();

        let first = coordinator.run(|| async { Some(token("first")) }).await;
        assert!(!coordinator.is_refreshing());
        let second = coordinator.run(|| async { Some(token("second")) }).await;

        assert_eq!(first, Some(token("first")));
        assert_eq!(second, Some(token("second")));
    }

    #[tokio::test]
    async fn test_slot_is_visible_while_pending() {
        let coordinator = Arc::new(RefreshCoordinator::new());
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

        let waiter = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move {
                coordinator
                    .run(move || async move {
                        let _ = release_rx.await;
                        Some(token("late"))
                    })
                    .await
            })
        };

        while !coordinator.is_refreshing() {
            tokio::task::yield_now().await;
        }
        release_tx.send(()).unwrap();

        assert_eq!(waiter.await.unwrap(), Some(token("late")));
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test]
    async fn test_failed_outcome_is_reused_by_requests_sent_before_it() {
        let coordinator = RefreshCoordinator::new();
        let started = Arc::new(AtomicUsize::new(0));
        let sent_at = coordinator.generation();

        let counter = started.clone();
        let first = coordinator
            .run_after(sent_at, move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { None }
            })
            .await;
        assert_eq!(first, None);
        assert_eq!(coordinator.generation(), sent_at + 1);

        // A late failure of a request sent before the refresh resolved.
        let counter = started.clone();
        let late = coordinator
            .run_after(sent_at, move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Some(token("unexpected")) }
            })
            .await;

        assert_eq!(late, None);
        assert_eq!(started.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_successful_outcome_is_reused_and_newer_requests_refresh_again() {
        let coordinator = RefreshCoordinator::new();
        let sent_at = coordinator.generation();

        coordinator.run(|| async { Some(token("first")) }).await;
        let reused = coordinator
            .run_after(sent_at, || async { Some(token("second")) })
            .await;
        assert_eq!(reused, Some(token("first")));

        let fresh = coordinator
            .run_after(coordinator.generation(), || async { Some(token("second")) })
            .await;
        assert_eq!(fresh, Some(token("second")));
        assert_eq!(coordinator.generation(), 2);
    }
}
