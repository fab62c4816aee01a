use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{Error, Result};

type Flight<T> = Shared<BoxFuture<'static, Result<T>>>;
type Flights<K, T> = Arc<Mutex<HashMap<K, Flight<T>>>>;

/// Registry of in-flight operations.
///
/// The first caller for a key spawns the work onto the runtime; callers that
/// arrive while it runs await the same result instead of starting their own.
/// The entry is dropped as soon as the work finishes, so the work itself has
/// to start with its own cache check.
///
/// Spawned work runs to completion even if every caller goes away, which lets
/// an aborted request still fill the cache for the next one.
pub struct SingleFlight<K, T> {
    in_flight: Flights<K, T>,
}

impl<K, T> SingleFlight<K, T>
where
    K: Eq + Hash + Clone + Send + 'static,
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        SingleFlight {
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn run<F>(&self, key: K, work: F) -> impl Future<Output = Result<T>>
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(flight) = in_flight.get(&key) {
            return flight.clone();
        }

        let registry = Arc::clone(&self.in_flight);
        let finished_key = key.clone();
        let handle = tokio::spawn(async move {
            let result = work.await;
            registry
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&finished_key);

            result
        });

        let flight = handle
            .map(|joined| match joined {
                Ok(result) => result,
                Err(e) => Err(Error::Internal(format!("in-flight task failed: {}", e))),
            })
            .boxed()
            .shared();

        in_flight.insert(key, flight.clone());
        flight
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl<K, T> Default for SingleFlight<K, T>
where
    K: Eq + Hash + Clone + Send + 'static,
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    #[tokio::test]
    async fn test_concurrent_callers_share_one_execution() {
        let flights: SingleFlight<&'static str, usize> = SingleFlight::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let release = Arc::new(Notify::new());

        let waiters: Vec<_> = (0..8)
            .map(|_| {
                let calls = Arc::clone(&calls);
                let release = Arc::clone(&release);
                flights.run("key", async move {
                    release.notified().await;
                    Ok(calls.fetch_add(1, Ordering::SeqCst) + 1)
                })
            })
            .collect();

        assert_eq!(flights.in_flight(), 1);
        release.notify_one();

        let results = futures::future::join_all(waiters).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.into_iter().all(|r| r.unwrap() == 1));
        assert_eq!(flights.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_distinct_keys_run_in_parallel() {
        let flights: SingleFlight<u64, u64> = SingleFlight::new();
        let release = Arc::new(Notify::new());

        let blocked = {
            let release = Arc::clone(&release);
            flights.run(1, async move {
                release.notified().await;
                Ok(1)
            })
        };

        let other = flights.run(2, async { Ok(2) });
        assert_eq!(
            tokio::time::timeout(Duration::from_secs(5), other)
                .await
                .unwrap()
                .unwrap(),
            2
        );

        release.notify_one();
        assert_eq!(blocked.await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_errors_are_shared_and_not_cached() {
        let flights: SingleFlight<&'static str, ()> = SingleFlight::new();

        let first = flights.run("key", async { Err(Error::Internal("boom".into())) });
        let second = flights.run("key", async { Ok(()) });

        assert!(first.await.is_err());
        assert!(second.await.is_err());

        let retry = flights.run("key", async { Ok(()) });
        assert!(retry.await.is_ok());
    }

    #[tokio::test]
    async fn test_work_survives_dropped_caller() {
        let flights: SingleFlight<&'static str, ()> = SingleFlight::new();
        let done = Arc::new(Notify::new());

        let flight = {
            let done = Arc::clone(&done);
            flights.run("key", async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                done.notify_one();
                Ok(())
            })
        };
        drop(flight);

        tokio::time::timeout(Duration::from_secs(5), done.notified())
            .await
            .unwrap();
    }
}
