//! Guarded slot holding at most one live value.
//!
//! The check-then-create sequence is the only contended critical section
//! in the connection manager: two workers observing "no live connection"
//! must converge on a single winner instead of each creating one. The
//! slot serializes that sequence behind an async mutex and hands out
//! shared handles, so the contract can be exercised in tests without a
//! broker on the other end.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;

/// At-most-one live value, replaced in place when it is observed dead.
#[derive(Debug)]
pub struct Slot<C> {
    inner: Mutex<Option<Arc<C>>>,
}

impl<C> Slot<C> {
    /// Create an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self { inner: Mutex::new(None) }
    }

    /// Return the held value if it is still alive according to `is_open`,
    /// otherwise build a replacement with `create` and store it.
    ///
    /// The mutex is held across the whole check-then-create sequence, so
    /// concurrent callers against an empty or dead slot block until the
    /// winner has stored its value and then converge on it.
    ///
    /// # Errors
    /// Propagates the error from `create`; the slot keeps whatever it
    /// held before (a dead value is only dropped once a replacement
    /// exists).
    pub async fn acquire<F, Fut, E>(
        &self,
        is_open: impl Fn(&C) -> bool,
        create: F,
    ) -> Result<Arc<C>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<C, E>>,
    {
        let mut guard = self.inner.lock().await;
        if let Some(existing) = guard.as_ref() {
            if is_open(existing) {
                return Ok(Arc::clone(existing));
            }
        }
        let fresh = Arc::new(create().await?);
        *guard = Some(Arc::clone(&fresh));
        Ok(fresh)
    }

    /// Empty the slot, returning the held value.
    pub async fn take(&self) -> Option<Arc<C>> {
        self.inner.lock().await.take()
    }

    /// Whether the slot currently holds a value, alive or not.
    pub async fn is_populated(&self) -> bool {
        self.inner.lock().await.is_some()
    }
}

impl<C> Default for Slot<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::Barrier;

    #[derive(Debug)]
    struct FakeConn {
        open: AtomicBool,
    }

    impl FakeConn {
        fn new() -> Self {
            Self { open: AtomicBool::new(true) }
        }

        fn is_open(&self) -> bool {
            self.open.load(Ordering::SeqCst)
        }

        fn close(&self) {
            self.open.store(false, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn repeated_acquire_returns_the_same_value() {
        let slot = Slot::new();
        let created = AtomicUsize::new(0);
        let make = || async {
            created.fetch_add(1, Ordering::SeqCst);
            Ok::<_, Infallible>(FakeConn::new())
        };

        let first = slot.acquire(FakeConn::is_open, make).await.unwrap();
        let second = slot
            .acquire(FakeConn::is_open, || async {
                created.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Infallible>(FakeConn::new())
            })
            .await
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(created.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn dead_value_is_replaced_exactly_once() {
        let slot = Slot::new();
        let first = slot
            .acquire(FakeConn::is_open, || async { Ok::<_, Infallible>(FakeConn::new()) })
            .await
            .unwrap();
        first.close();

        let second = slot
            .acquire(FakeConn::is_open, || async { Ok::<_, Infallible>(FakeConn::new()) })
            .await
            .unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(second.is_open());

        let third: Result<_, Infallible> = slot
            .acquire(FakeConn::is_open, || async {
                panic!("live value must not be replaced")
            })
            .await;
        let third = third.unwrap();
        assert!(Arc::ptr_eq(&second, &third));
    }

    #[tokio::test]
    async fn create_failure_leaves_the_slot_usable() {
        let slot: Slot<FakeConn> = Slot::new();
        let result = slot
            .acquire(FakeConn::is_open, || async { Err::<FakeConn, _>("broker down") })
            .await;
        assert_eq!(result.unwrap_err(), "broker down");
        assert!(!slot.is_populated().await);

        let conn = slot
            .acquire(FakeConn::is_open, || async { Ok::<_, &str>(FakeConn::new()) })
            .await
            .unwrap();
        assert!(conn.is_open());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_cold_acquires_converge_on_one_value() {
        const TASKS: usize = 32;

        let slot = Arc::new(Slot::new());
        let created = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(TASKS));

        let mut handles = Vec::with_capacity(TASKS);
        for _ in 0..TASKS {
            let slot = Arc::clone(&slot);
            let created = Arc::clone(&created);
            let barrier = Arc::clone(&barrier);
            handles.push(tokio::spawn(async move {
                barrier.wait().await;
                slot.acquire(FakeConn::is_open, || async {
                    created.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, Infallible>(FakeConn::new())
                })
                .await
                .unwrap()
            }));
        }

        let mut values = Vec::with_capacity(TASKS);
        for handle in handles {
            values.push(handle.await.unwrap());
        }

        assert_eq!(created.load(Ordering::SeqCst), 1);
        assert!(values.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
    }

    #[tokio::test]
    async fn take_empties_the_slot() {
        let slot = Slot::new();
        let conn = slot
            .acquire(FakeConn::is_open, || async { Ok::<_, Infallible>(FakeConn::new()) })
            .await
            .unwrap();

        let taken = slot.take().await.expect("slot was populated");
        assert!(Arc::ptr_eq(&conn, &taken));
        assert!(!slot.is_populated().await);
        assert!(slot.take().await.is_none());
    }
}
