//! Category-bounded task dispatcher.

use std::any::Any;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::{oneshot, OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::config::{CategoryConfig, PoolConfig, TaskCategory};
use super::slot::{next_idle, Slot, SlotSnapshot, SlotState};
use super::worker::{Job, Reply, Request, Worker};
use super::{PoolError, PoolStats};

#[derive(Default)]
struct Counters {
    dispatched: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    timeouts: AtomicU64,
    recycled: AtomicU64,
    saturated: AtomicU64,
    abandoned: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

struct SlotTable {
    slots: Vec<Slot>,
    /// Slot after the one most recently handed out.
    cursor: usize,
}

/// Slots, permits and counters for one category.
struct CategoryPool {
    category: TaskCategory,
    timeout: Duration,
    semaphore: Arc<Semaphore>,
    table: Mutex<SlotTable>,
    counters: Counters,
}

impl CategoryPool {
    fn start(category: TaskCategory, config: CategoryConfig) -> Result<Self, PoolError> {
        let workers = config.workers().max(1);
        let slots = (0..workers)
            .map(|i| Worker::spawn(category, i, 0).map(|w| Slot::new(i, w)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            category,
            timeout: config.timeout(),
            semaphore: Arc::new(Semaphore::new(workers)),
            table: Mutex::new(SlotTable { slots, cursor: 0 }),
            counters: Counters::default(),
        })
    }

    /// Mark the next idle slot busy.
    fn claim(&self) -> Option<usize> {
        let mut table = self.table.lock();
        let index = next_idle(&table.slots, table.cursor)?;
        table.slots[index].state = SlotState::Busy;
        table.cursor = (index + 1) % table.slots.len();
        Some(index)
    }

    fn send(&self, index: usize, request: Request) -> Result<(), Request> {
        let table = self.table.lock();
        match table.slots[index].worker.as_ref() {
            Some(worker) => worker.send(request),
            None => Err(request),
        }
    }

    fn set_state(&self, index: usize, state: SlotState) {
        self.table.lock().slots[index].state = state;
    }

    /// Retire the slot's worker and start a fresh one.
    ///
    /// Returns the old thread's exit signal and whether the new worker
    /// started. A slot whose worker could not be respawned stays out of
    /// rotation.
    fn replace_worker(&self, index: usize) -> (Option<oneshot::Receiver<()>>, bool) {
        let (old, generation) = {
            let mut table = self.table.lock();
            let slot = &mut table.slots[index];
            (slot.worker.take(), slot.generation + 1)
        };
        let exited = old.map(Worker::retire);

        let started = match Worker::spawn(self.category, index, generation) {
            Ok(worker) => {
                let mut table = self.table.lock();
                let slot = &mut table.slots[index];
                slot.worker = Some(worker);
                slot.generation = generation;
                self.counters.recycled.fetch_add(1, Ordering::Relaxed);
                slot.state = SlotState::Idle;
                true
            }
            Err(e) => {
                error!(
                    category = %self.category,
                    slot = index,
                    error = %e,
                    "Failed to respawn worker; slot disabled"
                );
                false
            }
        };
        (exited, started)
    }

    fn snapshot(&self) -> Vec<SlotSnapshot> {
        self.table.lock().slots.iter().map(Slot::snapshot).collect()
    }

    fn stats(&self) -> PoolStats {
        let c = &self.counters;
        PoolStats {
            dispatched: c.dispatched.load(Ordering::Relaxed),
            completed: c.completed.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
            timeouts: c.timeouts.load(Ordering::Relaxed),
            recycled: c.recycled.load(Ordering::Relaxed),
            saturated: c.saturated.load(Ordering::Relaxed),
            abandoned: c.abandoned.load(Ordering::Relaxed),
            in_flight: c.in_flight.load(Ordering::Relaxed),
            peak_in_flight: c.peak_in_flight.load(Ordering::Relaxed),
        }
    }
}

struct PoolInner {
    config: PoolConfig,
    categories: [CategoryPool; 2],
    next_request_id: AtomicU64,
    shutdown: CancellationToken,
}

impl PoolInner {
    fn category(&self, category: TaskCategory) -> &CategoryPool {
        &self.categories[category.index()]
    }

    /// Put the slot into `Recycling` and replace its worker in the
    /// background.
    ///
    /// The old thread may still be running the timed-out job. It is counted
    /// as abandoned and keeps the task's permit until it exits, so the
    /// category never executes more than its worker count at once.
    fn recycle(
        inner: &Arc<PoolInner>,
        category: TaskCategory,
        index: usize,
        permit: Option<OwnedSemaphorePermit>,
    ) {
        let pool = inner.category(category);
        pool.set_state(index, SlotState::Recycling);

        if inner.shutdown.is_cancelled() {
            pool.table.lock().slots[index].worker = None;
            return;
        }
        pool.counters.abandoned.fetch_add(1, Ordering::Relaxed);

        let inner = Arc::clone(inner);
        let job = move || {
            let pool = inner.category(category);
            let (exited, started) = pool.replace_worker(index);
            let permit = if started {
                info!(category = %category, slot = index, "Worker slot recycled");
                permit
            } else {
                if let Some(permit) = permit {
                    permit.forget();
                }
                None
            };
            PoolInner::release_on_exit(Arc::clone(&inner), category, exited, permit);
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(job);
            }
            Err(_) => job(),
        }
    }

    /// Wait for an abandoned thread to exit, then return its permit.
    fn release_on_exit(
        inner: Arc<PoolInner>,
        category: TaskCategory,
        exited: Option<oneshot::Receiver<()>>,
        permit: Option<OwnedSemaphorePermit>,
    ) {
        let on_exit = move || {
            inner
                .category(category)
                .counters
                .abandoned
                .fetch_sub(1, Ordering::Relaxed);
            drop(permit);
            debug!(category = %category, "Abandoned worker thread exited");
        };

        let Some(exited) = exited else {
            on_exit();
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    let _ = exited.await;
                    on_exit();
                });
            }
            Err(_) => {
                std::thread::spawn(move || {
                    let _ = exited.blocking_recv();
                    on_exit();
                });
            }
        }
    }
}

/// A claimed slot plus its permit.
///
/// Must be settled with [`release`](Self::release) or
/// [`recycle`](Self::recycle). Dropping an unsettled lease (the caller's
/// future was cancelled mid-task) recycles the slot, since the worker may
/// still be running.
struct SlotLease {
    inner: Arc<PoolInner>,
    category: TaskCategory,
    index: usize,
    permit: Option<OwnedSemaphorePermit>,
    settled: bool,
}

impl SlotLease {
    fn new(
        inner: Arc<PoolInner>,
        category: TaskCategory,
        index: usize,
        permit: OwnedSemaphorePermit,
    ) -> Self {
        let counters = &inner.category(category).counters;
        let now = counters.in_flight.fetch_add(1, Ordering::Relaxed) + 1;
        counters.peak_in_flight.fetch_max(now, Ordering::Relaxed);

        Self {
            inner,
            category,
            index,
            permit: Some(permit),
            settled: false,
        }
    }

    fn settle(&mut self) -> Option<OwnedSemaphorePermit> {
        self.settled = true;
        self.inner
            .category(self.category)
            .counters
            .in_flight
            .fetch_sub(1, Ordering::Relaxed);
        self.permit.take()
    }

    fn release(mut self) {
        let permit = self.settle();
        self.inner
            .category(self.category)
            .set_state(self.index, SlotState::Idle);
        drop(permit);
    }

    fn recycle(mut self) {
        let permit = self.settle();
        PoolInner::recycle(&self.inner, self.category, self.index, permit);
    }
}

impl Drop for SlotLease {
    fn drop(&mut self) {
        if !self.settled {
            let permit = self.settle();
            PoolInner::recycle(&self.inner, self.category, self.index, permit);
        }
    }
}

/// Bounded pool of isolated worker threads.
///
/// Each [`TaskCategory`] has a fixed number of slots. At most that many
/// tasks of the category are outstanding at once; further callers wait for
/// a permit. A task that exceeds its timeout fails with
/// [`PoolError::Timeout`] and its slot gets a fresh worker, without
/// affecting tasks on other slots.
///
/// Cloning is cheap and shares the same workers.
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

impl WorkerPool {
    /// Spawn all workers.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Spawn`] if a worker thread cannot be created.
    pub fn new(config: PoolConfig) -> Result<Self, PoolError> {
        let categories = [
            CategoryPool::start(TaskCategory::ArchiveIndex, config.archive_index)?,
            CategoryPool::start(TaskCategory::AssetDecode, config.asset_decode)?,
        ];

        info!(
            archive_workers = config.archive_index.workers(),
            asset_workers = config.asset_decode.workers(),
            archive_timeout_ms = config.archive_index.timeout().as_millis() as u64,
            asset_timeout_ms = config.asset_decode.timeout().as_millis() as u64,
            "Worker pool started"
        );

        Ok(Self {
            inner: Arc::new(PoolInner {
                config,
                categories,
                next_request_id: AtomicU64::new(1),
                shutdown: CancellationToken::new(),
            }),
        })
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Run `task` on a worker of `category` and wait for its result.
    ///
    /// # Errors
    ///
    /// - [`PoolError::Timeout`] if the task runs past the category timeout
    /// - [`PoolError::Saturated`] if no slot frees up within the timeout
    /// - [`PoolError::TaskPanicked`] if the task panics (the slot is kept)
    /// - [`PoolError::WorkerLost`] if the worker thread disappeared
    /// - [`PoolError::ShutDown`] after [`shutdown`](Self::shutdown)
    pub async fn dispatch<T, F>(&self, category: TaskCategory, task: F) -> Result<T, PoolError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let shutdown = &self.inner.shutdown;
        if shutdown.is_cancelled() {
            return Err(PoolError::ShutDown);
        }
        let pool = self.inner.category(category);

        let acquire =
            tokio::time::timeout(pool.timeout, Arc::clone(&pool.semaphore).acquire_owned());
        let permit = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return Err(PoolError::ShutDown),
            acquired = acquire => match acquired {
                Ok(permit) => permit.map_err(|_| PoolError::ShutDown)?,
                Err(_) => {
                    pool.counters.saturated.fetch_add(1, Ordering::Relaxed);
                    debug!(category = %category, "No worker slot freed up in time");
                    return Err(PoolError::Saturated {
                        category,
                        timeout: pool.timeout,
                    });
                }
            }
        };
        let index = pool.claim().ok_or(PoolError::NoIdleSlot(category))?;
        let lease = SlotLease::new(Arc::clone(&self.inner), category, index, permit);

        let id = self.inner.next_request_id.fetch_add(1, Ordering::Relaxed);
        let (reply_tx, reply_rx) = oneshot::channel();
        let job: Job = Box::new(move || Box::new(task()) as Box<dyn Any + Send>);

        if pool
            .send(
                index,
                Request {
                    id,
                    job,
                    reply: reply_tx,
                },
            )
            .is_err()
        {
            pool.counters.failed.fetch_add(1, Ordering::Relaxed);
            lease.recycle();
            return Err(PoolError::WorkerLost { category });
        }
        pool.counters.dispatched.fetch_add(1, Ordering::Relaxed);
        debug!(category = %category, slot = index, request_id = id, "Task dispatched");

        let started = Instant::now();
        let outcome = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return Err(PoolError::ShutDown),
            result = tokio::time::timeout(pool.timeout, reply_rx) => result,
        };

        match outcome {
            Ok(Ok(reply)) => {
                lease.release();
                let result = unpack::<T>(category, id, reply);
                let counter = if result.is_ok() {
                    &pool.counters.completed
                } else {
                    &pool.counters.failed
                };
                counter.fetch_add(1, Ordering::Relaxed);
                debug!(
                    category = %category,
                    slot = index,
                    request_id = id,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    ok = result.is_ok(),
                    "Task finished"
                );
                result
            }
            Ok(Err(_)) => {
                pool.counters.failed.fetch_add(1, Ordering::Relaxed);
                warn!(category = %category, slot = index, "Worker dropped request");
                lease.recycle();
                Err(PoolError::WorkerLost { category })
            }
            Err(_) => {
                pool.counters.timeouts.fetch_add(1, Ordering::Relaxed);
                warn!(
                    category = %category,
                    slot = index,
                    request_id = id,
                    timeout_ms = pool.timeout.as_millis() as u64,
                    "Task timed out, recycling worker slot"
                );
                lease.recycle();
                Err(PoolError::Timeout {
                    category,
                    timeout: pool.timeout,
                })
            }
        }
    }

    /// Counters summed over all categories.
    pub fn stats(&self) -> PoolStats {
        TaskCategory::ALL
            .iter()
            .map(|&c| self.category_stats(c))
            .fold(PoolStats::default(), |acc, s| acc.merge(&s))
    }

    pub fn category_stats(&self, category: TaskCategory) -> PoolStats {
        self.inner.category(category).stats()
    }

    /// Current state of every slot of `category`.
    pub fn slots(&self, category: TaskCategory) -> Vec<SlotSnapshot> {
        self.inner.category(category).snapshot()
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    /// Stop accepting work and close every worker channel.
    ///
    /// Waiting and in-flight callers receive [`PoolError::ShutDown`].
    /// Worker threads exit once their current job returns.
    pub fn shutdown(&self) {
        if self.inner.shutdown.is_cancelled() {
            return;
        }
        self.inner.shutdown.cancel();
        for pool in &self.inner.categories {
            pool.semaphore.close();
            for slot in pool.table.lock().slots.iter_mut() {
                slot.worker = None;
            }
        }
        info!("Worker pool shut down");
    }
}

fn unpack<T: 'static>(category: TaskCategory, id: u64, reply: Reply) -> Result<T, PoolError> {
    let received = reply.id;
    if received != id {
        return Err(PoolError::UnexpectedReply {
            expected: id,
            received,
        });
    }
    match reply.outcome {
        Ok(value) => value
            .downcast::<T>()
            .map(|v| *v)
            .map_err(|_| PoolError::UnexpectedReply {
                expected: id,
                received,
            }),
        Err(message) => Err(PoolError::TaskPanicked { category, message }),
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("config", &self.inner.config)
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(workers: usize, timeout_ms: u64) -> WorkerPool {
        WorkerPool::new(PoolConfig::uniform(
            workers,
            Duration::from_millis(timeout_ms),
        ))
        .unwrap()
    }

    async fn wait_for_generation(pool: &WorkerPool, slot: usize, generation: u64) {
        for _ in 0..200 {
            let snap = pool.slots(TaskCategory::AssetDecode)[slot];
            if snap.generation >= generation && snap.state == SlotState::Idle {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("slot {} never reached generation {}", slot, generation);
    }

    #[tokio::test]
    async fn test_dispatch_returns_value() {
        let pool = pool(2, 1_000);
        let value = pool
            .dispatch(TaskCategory::AssetDecode, || "decoded".to_string())
            .await
            .unwrap();

        assert_eq!(value, "decoded");
        let stats = pool.category_stats(TaskCategory::AssetDecode);
        assert_eq!(stats.dispatched, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.in_flight, 0);
    }

    #[tokio::test]
    async fn test_round_robin_slot_selection() {
        let pool = pool(3, 1_000);
        let mut names = Vec::new();
        for _ in 0..3 {
            let name = pool
                .dispatch(TaskCategory::ArchiveIndex, || {
                    std::thread::current().name().map(str::to_string)
                })
                .await
                .unwrap()
                .unwrap();
            names.push(name);
        }

        assert_eq!(
            names,
            vec![
                "pakmount-archive-index-0.0",
                "pakmount-archive-index-1.0",
                "pakmount-archive-index-2.0",
            ]
        );
    }

    #[tokio::test]
    async fn test_panic_propagates_without_recycle() {
        let pool = pool(1, 1_000);
        let err = pool
            .dispatch(TaskCategory::AssetDecode, || -> u32 { panic!("corrupt model") })
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PoolError::TaskPanicked { ref message, .. } if message == "corrupt model"
        ));
        let snap = pool.slots(TaskCategory::AssetDecode)[0];
        assert_eq!(snap.generation, 0);
        assert_eq!(snap.state, SlotState::Idle);

        // The same worker keeps serving.
        let v = pool.dispatch(TaskCategory::AssetDecode, || 5u8).await.unwrap();
        assert_eq!(v, 5);
        assert_eq!(pool.category_stats(TaskCategory::AssetDecode).recycled, 0);
    }

    async fn wait_for_abandoned_exit(pool: &WorkerPool) {
        for _ in 0..200 {
            if pool.category_stats(TaskCategory::AssetDecode).abandoned == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("abandoned worker never exited");
    }

    #[tokio::test]
    async fn test_timeout_recycles_slot() {
        let pool = pool(1, 30);
        let (hold, gate) = std::sync::mpsc::channel::<()>();

        let started = Instant::now();
        let err = pool
            .dispatch(TaskCategory::AssetDecode, move || {
                let _ = gate.recv();
            })
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert!(started.elapsed() >= Duration::from_millis(30));

        wait_for_generation(&pool, 0, 1).await;
        drop(hold);
        wait_for_abandoned_exit(&pool).await;
        let v = pool.dispatch(TaskCategory::AssetDecode, || 9i32).await.unwrap();
        assert_eq!(v, 9);

        let stats = pool.category_stats(TaskCategory::AssetDecode);
        assert_eq!(stats.timeouts, 1);
        assert_eq!(stats.recycled, 1);
    }

    #[tokio::test]
    async fn test_hung_thread_keeps_its_permit() {
        let pool = pool(1, 30);
        let (hold, gate) = std::sync::mpsc::channel::<()>();

        let err = pool
            .dispatch(TaskCategory::AssetDecode, move || {
                let _ = gate.recv();
            })
            .await
            .unwrap_err();
        assert!(err.is_timeout());

        // The replacement worker is idle but the old thread still runs.
        wait_for_generation(&pool, 0, 1).await;
        let err = pool
            .dispatch(TaskCategory::AssetDecode, || 1)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PoolError::Saturated {
                category: TaskCategory::AssetDecode,
                ..
            }
        ));
        let stats = pool.category_stats(TaskCategory::AssetDecode);
        assert_eq!(stats.abandoned, 1);
        assert_eq!(stats.saturated, 1);

        drop(hold);
        wait_for_abandoned_exit(&pool).await;
        assert_eq!(pool.dispatch(TaskCategory::AssetDecode, || 2).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_zero_workers_clamped_to_one() {
        let config = PoolConfig {
            archive_index: CategoryConfig::new(0, Duration::from_millis(50)),
            asset_decode: CategoryConfig::new(0, Duration::from_millis(50)),
        };
        let pool = WorkerPool::new(config).unwrap();

        let value = tokio::time::timeout(
            Duration::from_secs(1),
            pool.dispatch(TaskCategory::ArchiveIndex, || 1),
        )
        .await
        .expect("dispatch should not wait forever")
        .unwrap();
        assert_eq!(value, 1);
        assert_eq!(pool.slots(TaskCategory::ArchiveIndex).len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrency_bounded_per_category() {
        let pool = pool(2, 5_000);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let pool = pool.clone();
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            handles.push(tokio::spawn(async move {
                pool.dispatch(TaskCategory::ArchiveIndex, move || {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(20));
                    running.fetch_sub(1, Ordering::SeqCst);
                })
                .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 2);
        let stats = pool.category_stats(TaskCategory::ArchiveIndex);
        assert!(stats.peak_in_flight <= 2);
        assert_eq!(stats.completed, 8);
    }

    #[tokio::test]
    async fn test_shutdown_rejects_dispatch() {
        let pool = pool(1, 1_000);
        pool.shutdown();
        pool.shutdown();

        let err = pool
            .dispatch(TaskCategory::AssetDecode, || 1)
            .await
            .unwrap_err();
        assert!(matches!(err, PoolError::ShutDown));
        assert!(pool.is_shut_down());
    }

    #[tokio::test]
    async fn test_stats_sum_categories() {
        let pool = pool(1, 1_000);
        pool.dispatch(TaskCategory::AssetDecode, || ()).await.unwrap();
        pool.dispatch(TaskCategory::ArchiveIndex, || ()).await.unwrap();

        let stats = pool.stats();
        assert_eq!(stats.dispatched, 2);
        assert_eq!(stats.completed, 2);
    }
}
