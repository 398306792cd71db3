//! Bounded-concurrency batch execution.
//!
//! [`BatchProcessor::process_batch`] runs a handler over a slice of items
//! on a fixed set of scoped worker threads fed through a bounded queue.
//! Every call is bounded by a deadline, honours the caller's
//! [`CancelToken`] and the processor-wide stop switch, and fails fast on
//! the first handler error.
//!
//! # Example
//! ```
//! use sqlporter::batch::{BatchConfig, BatchProcessor};
//! use sqlporter::cancel::CancelToken;
//!
//! let processor = BatchProcessor::new(BatchConfig::default().with_workers(2));
//! let items = vec![1, 2, 3];
//! processor
//!     .process_batch(&CancelToken::new(), &items, |n, _ctx| {
//!         assert!(*n > 0);
//!         Ok(())
//!     })
//!     .unwrap();
//! ```

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{at, bounded, select, Receiver, Sender, TrySendError};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::error::{PortError, Result};
use crate::pool::BufferPool;

pub const DEFAULT_BATCH_SIZE: usize = 1000;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Sink for errors that cannot be returned to the caller.
pub type ErrorHandler = Arc<dyn Fn(&PortError) + Send + Sync>;

/// Number of workers used when none is configured.
pub fn default_workers() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Options for a [`BatchProcessor`]. Zero sizes fall back to the defaults.
#[derive(Clone)]
pub struct BatchConfig {
    /// Capacity of the input queue.
    pub batch_size: usize,
    /// Worker threads per call.
    pub workers: usize,
    /// Deadline for a whole call.
    pub timeout: Duration,
    /// Cap on concurrent handler invocations; `None` means `workers`.
    pub max_in_flight: Option<usize>,
    /// Scratch buffers lent to the handler, one per item.
    pub mem_optimizer: Option<Arc<BufferPool>>,
    pub error_handler: Option<ErrorHandler>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            workers: default_workers(),
            timeout: DEFAULT_TIMEOUT,
            max_in_flight: None,
            mem_optimizer: None,
            error_handler: None,
        }
    }
}

impl fmt::Debug for BatchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchConfig")
            .field("batch_size", &self.batch_size)
            .field("workers", &self.workers)
            .field("timeout", &self.timeout)
            .field("max_in_flight", &self.max_in_flight)
            .field("mem_optimizer", &self.mem_optimizer)
            .field("error_handler", &self.error_handler.is_some())
            .finish()
    }
}

impl BatchConfig {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_in_flight(mut self, limit: usize) -> Self {
        self.max_in_flight = Some(limit);
        self
    }

    pub fn with_buffer_pool(mut self, pool: Arc<BufferPool>) -> Self {
        self.mem_optimizer = Some(pool);
        self
    }

    pub fn with_error_handler<H>(mut self, handler: H) -> Self
    where
        H: Fn(&PortError) + Send + Sync + 'static,
    {
        self.error_handler = Some(Arc::new(handler));
        self
    }
}

/// Per-call snapshot of the configuration.
#[derive(Clone)]
struct Settings {
    batch_size: usize,
    workers: usize,
    timeout: Duration,
    max_in_flight: usize,
    pool: Option<Arc<BufferPool>>,
    error_handler: ErrorHandler,
}

impl From<BatchConfig> for Settings {
    fn from(config: BatchConfig) -> Self {
        let workers = if config.workers == 0 {
            default_workers()
        } else {
            config.workers
        };
        Self {
            batch_size: non_zero(config.batch_size, DEFAULT_BATCH_SIZE),
            workers,
            timeout: if config.timeout.is_zero() {
                DEFAULT_TIMEOUT
            } else {
                config.timeout
            },
            max_in_flight: non_zero(config.max_in_flight.unwrap_or(workers), workers),
            pool: config.mem_optimizer,
            error_handler: config
                .error_handler
                .unwrap_or_else(|| Arc::new(ignore_error)),
        }
    }
}

fn ignore_error(_: &PortError) {}

fn non_zero(value: usize, fallback: usize) -> usize {
    if value == 0 { fallback } else { value }
}

struct State {
    settings: Settings,
    stopped: bool,
}

/// Reusable bounded-concurrency executor.
pub struct BatchProcessor {
    state: RwLock<State>,
    stop: CancelToken,
}

impl BatchProcessor {
    pub fn new(config: BatchConfig) -> Self {
        Self {
            state: RwLock::new(State {
                settings: config.into(),
                stopped: false,
            }),
            stop: CancelToken::new(),
        }
    }

    /// Apply `handler` to every item.
    ///
    /// Returns the first handler error, [`PortError::Timeout`] when the
    /// deadline passes first, [`PortError::Cancelled`] when `cancel` fires
    /// and [`PortError::Stopped`] when the processor is or becomes stopped.
    /// Further handler errors go to the configured error handler. All
    /// worker threads have exited when this returns.
    pub fn process_batch<T, F>(&self, cancel: &CancelToken, items: &[T], handler: F) -> Result<()>
    where
        T: Sync,
        F: Fn(&T, &mut ItemContext<'_>) -> Result<()> + Sync,
    {
        let settings = {
            let state = self.state.read();
            if state.stopped {
                return Err(PortError::Stopped);
            }
            state.settings.clone()
        };
        if items.is_empty() {
            return Ok(());
        }

        let started = Instant::now();
        let run = Run {
            handler: &handler,
            signals: Signals {
                cancel,
                stop: &self.stop,
                abort: CancelToken::new(),
                deadline: started + settings.timeout,
                timeout: settings.timeout,
            },
            limiter: Limiter::new(settings.max_in_flight),
            processed: AtomicUsize::new(0),
            pool: settings.pool.as_deref(),
            error_handler: &settings.error_handler,
        };

        let (queue_tx, queue_rx) = bounded::<&T>(settings.batch_size);
        let (err_tx, err_rx) = bounded::<PortError>(settings.workers);

        debug!(
            items = items.len(),
            workers = settings.workers,
            batch_size = settings.batch_size,
            "Starting batch"
        );

        let fed = thread::scope(|s| {
            for id in 0..settings.workers {
                let queue = queue_rx.clone();
                let errors = err_tx.clone();
                let run = &run;
                s.spawn(move || run.work(id, queue, errors));
            }
            drop(queue_rx);
            drop(err_tx);

            let fed = self.feed(items, &queue_tx, &err_rx, &run.signals);
            drop(queue_tx);
            if fed.is_err() {
                run.signals.abort.cancel();
            }
            fed
        });

        let mut first = fed.err();
        for err in err_rx.try_iter() {
            match first {
                None => first = Some(err),
                Some(_) => (settings.error_handler)(&err),
            }
        }
        if let Some(err) = first {
            debug!(error = %err, "Batch failed");
            return Err(err);
        }

        let processed = run.processed.load(Ordering::SeqCst);
        if processed < items.len() {
            return Err(run.signals.interruption());
        }

        debug!(
            items = processed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Batch complete"
        );
        Ok(())
    }

    fn feed<'t, T>(
        &self,
        items: &'t [T],
        queue: &Sender<&'t T>,
        errors: &Receiver<PortError>,
        signals: &Signals<'_>,
    ) -> Result<()> {
        let expired = at(signals.deadline);
        for item in items {
            if self.is_stopped() {
                return Err(PortError::Stopped);
            }
            select! {
                send(queue, item) -> res => {
                    if res.is_err() {
                        return Ok(());
                    }
                }
                // A disconnect means every worker has exited.
                recv(errors) -> err => return err.map_or(Ok(()), Err),
                recv(signals.cancel.listen()) -> _ => return Err(PortError::Cancelled),
                recv(signals.stop.listen()) -> _ => return Err(PortError::Stopped),
                recv(expired) -> _ => return Err(PortError::Timeout(signals.timeout)),
            }
        }
        Ok(())
    }

    /// Stop the processor. Calls after the first are no-ops.
    pub fn stop(&self) {
        let mut state = self.state.write();
        if state.stopped {
            return;
        }
        state.stopped = true;
        self.stop.cancel();
        info!("Batch processor stopped");
    }

    pub fn is_stopped(&self) -> bool {
        self.state.read().stopped
    }

    /// Takes effect for subsequent calls.
    pub fn set_timeout(&self, timeout: Duration) {
        let mut state = self.state.write();
        state.settings.timeout = if timeout.is_zero() {
            DEFAULT_TIMEOUT
        } else {
            timeout
        };
    }

    /// Takes effect for subsequent calls.
    pub fn set_batch_size(&self, batch_size: usize) {
        self.state.write().settings.batch_size = non_zero(batch_size, DEFAULT_BATCH_SIZE);
    }

    /// Takes effect for subsequent calls.
    pub fn set_error_handler(&self, handler: ErrorHandler) {
        self.state.write().settings.error_handler = handler;
    }

    pub fn timeout(&self) -> Duration {
        self.state.read().settings.timeout
    }

    pub fn batch_size(&self) -> usize {
        self.state.read().settings.batch_size
    }

    pub fn workers(&self) -> usize {
        self.state.read().settings.workers
    }
}

impl Default for BatchProcessor {
    fn default() -> Self {
        Self::new(BatchConfig::default())
    }
}

impl fmt::Debug for BatchProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("BatchProcessor")
            .field("workers", &state.settings.workers)
            .field("batch_size", &state.settings.batch_size)
            .field("timeout", &state.settings.timeout)
            .field("stopped", &state.stopped)
            .finish()
    }
}

/// Everything that ends a call early.
struct Signals<'a> {
    cancel: &'a CancelToken,
    stop: &'a CancelToken,
    /// Fired on the first handler error so sibling workers wind down.
    abort: CancelToken,
    deadline: Instant,
    timeout: Duration,
}

impl Signals<'_> {
    fn check(&self) -> Result<()> {
        if self.cancel.is_cancelled() || self.abort.is_cancelled() {
            Err(PortError::Cancelled)
        } else if self.stop.is_cancelled() {
            Err(PortError::Stopped)
        } else if Instant::now() >= self.deadline {
            Err(PortError::Timeout(self.timeout))
        } else {
            Ok(())
        }
    }

    fn interruption(&self) -> PortError {
        if self.cancel.is_cancelled() {
            PortError::Cancelled
        } else if self.stop.is_cancelled() {
            PortError::Stopped
        } else {
            PortError::Timeout(self.timeout)
        }
    }
}

/// Token-bucket semaphore bounding handler invocations in flight.
struct Limiter {
    slots: Sender<()>,
    freed: Receiver<()>,
}

struct Permit<'a>(&'a Limiter);

impl Limiter {
    fn new(permits: usize) -> Self {
        let (slots, freed) = bounded(permits);
        Self { slots, freed }
    }

    fn acquire(&self, signals: &Signals<'_>) -> Result<Permit<'_>> {
        let expired = at(signals.deadline);
        select! {
            send(self.slots, ()) -> res => res
                .map(|()| Permit(self))
                .map_err(|_| PortError::Cancelled),
            recv(signals.cancel.listen()) -> _ => Err(PortError::Cancelled),
            recv(signals.abort.listen()) -> _ => Err(PortError::Cancelled),
            recv(signals.stop.listen()) -> _ => Err(PortError::Stopped),
            recv(expired) -> _ => Err(PortError::Timeout(signals.timeout)),
        }
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        let _ = self.0.freed.try_recv();
    }
}

/// State shared by the workers of one call.
struct Run<'a, F> {
    handler: &'a F,
    signals: Signals<'a>,
    limiter: Limiter,
    processed: AtomicUsize,
    pool: Option<&'a BufferPool>,
    error_handler: &'a ErrorHandler,
}

impl<F> Run<'_, F> {
    fn work<T>(&self, id: usize, queue: Receiver<&T>, errors: Sender<PortError>)
    where
        F: Fn(&T, &mut ItemContext<'_>) -> Result<()>,
    {
        let expired = at(self.signals.deadline);
        let mut done = 0usize;
        loop {
            let item = select! {
                recv(queue) -> msg => match msg {
                    Ok(item) => item,
                    Err(_) => break,
                },
                recv(self.signals.cancel.listen()) -> _ => break,
                recv(self.signals.stop.listen()) -> _ => break,
                recv(self.signals.abort.listen()) -> _ => break,
                recv(expired) -> _ => break,
            };

            match self.process_item(id, item) {
                Ok(()) => {
                    self.processed.fetch_add(1, Ordering::SeqCst);
                    done += 1;
                }
                // Only this call's own signals end a worker quietly.
                Err(err) if err.is_interruption() && self.signals.check().is_err() => break,
                Err(err) => {
                    self.signals.abort.cancel();
                    warn!(worker = id, error = %err, "Batch item failed");
                    if let Err(TrySendError::Full(err) | TrySendError::Disconnected(err)) =
                        errors.try_send(err)
                    {
                        (self.error_handler)(&err);
                    }
                    break;
                }
            }
        }
        debug!(worker = id, processed = done, "Batch worker finished");
    }

    fn process_item<T>(&self, id: usize, item: &T) -> Result<()>
    where
        F: Fn(&T, &mut ItemContext<'_>) -> Result<()>,
    {
        self.signals.check()?;
        let _permit = self.limiter.acquire(&self.signals)?;
        let mut buffer = self.pool.map(BufferPool::acquire);
        let mut ctx = ItemContext {
            buffer: buffer.as_deref_mut(),
            signals: &self.signals,
            worker: id,
        };
        panic::catch_unwind(AssertUnwindSafe(|| (self.handler)(item, &mut ctx)))
            .unwrap_or_else(|payload| Err(PortError::WorkerPanic(panic_message(payload.as_ref()))))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// What a handler can see about the call it runs in.
pub struct ItemContext<'a> {
    buffer: Option<&'a mut Vec<u8>>,
    signals: &'a Signals<'a>,
    worker: usize,
}

impl ItemContext<'_> {
    /// Pooled scratch buffer, empty on entry. `None` without a pool.
    pub fn buffer(&mut self) -> Option<&mut Vec<u8>> {
        self.buffer.as_deref_mut()
    }

    /// Index of the worker running the handler.
    pub fn worker(&self) -> usize {
        self.worker
    }

    /// Time left before the call's deadline.
    pub fn remaining(&self) -> Duration {
        self.signals.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_cancelled(&self) -> bool {
        self.checkpoint().is_err()
    }

    /// `Err` with the reason once the call should wind down.
    pub fn checkpoint(&self) -> Result<()> {
        self.signals.check()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    fn config(workers: usize) -> BatchConfig {
        BatchConfig::default().with_workers(workers)
    }

    #[test]
    fn test_processes_every_item() {
        let processor = BatchProcessor::new(config(4).with_batch_size(3));
        let items: Vec<u64> = (1..=100).collect();
        let sum = AtomicUsize::new(0);

        processor
            .process_batch(&CancelToken::new(), &items, |n, _| {
                sum.fetch_add(*n as usize, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();

        assert_eq!(sum.load(Ordering::SeqCst), 5050);
    }

    #[test]
    fn test_empty_batch() {
        let processor = BatchProcessor::default();
        let items: Vec<u8> = Vec::new();
        processor
            .process_batch(&CancelToken::new(), &items, |_, _| {
                panic!("no items to handle")
            })
            .unwrap();
    }

    fn peak_concurrency(processor: &BatchProcessor, items: usize) -> usize {
        let current = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        let items: Vec<usize> = (0..items).collect();
        processor
            .process_batch(&CancelToken::new(), &items, |_, _| {
                let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(2));
                current.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();
        peak.load(Ordering::SeqCst)
    }

    #[test]
    fn test_never_exceeds_workers() {
        let processor = BatchProcessor::new(config(3).with_batch_size(2));
        let peak = peak_concurrency(&processor, 40);
        assert!(peak >= 1 && peak <= 3, "peak was {peak}");
    }

    #[test]
    fn test_max_in_flight_limits_below_workers() {
        let processor = BatchProcessor::new(config(4).with_max_in_flight(1));
        assert_eq!(peak_concurrency(&processor, 20), 1);
    }

    #[test]
    fn test_stopped_processor_rejects_work() {
        let processor = BatchProcessor::new(config(2));
        processor.stop();
        processor.stop();
        assert!(processor.is_stopped());

        let called = AtomicBool::new(false);
        let err = processor
            .process_batch(&CancelToken::new(), &[1, 2, 3], |_, _| {
                called.store(true, Ordering::SeqCst);
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(err, PortError::Stopped));
        assert!(!called.load(Ordering::SeqCst));
    }

    #[test]
    fn test_stop_during_batch() {
        let processor = Arc::new(BatchProcessor::new(config(2)));
        let items: Vec<u32> = (0..200).collect();

        let stopper = {
            let processor = Arc::clone(&processor);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(30));
                processor.stop();
            })
        };

        let err = processor
            .process_batch(&CancelToken::new(), &items, |_, _| {
                thread::sleep(Duration::from_millis(5));
                Ok(())
            })
            .unwrap_err();
        stopper.join().unwrap();
        assert!(matches!(err, PortError::Stopped));
    }

    #[test]
    fn test_slow_handler_times_out() {
        let processor =
            BatchProcessor::new(config(1).with_timeout(Duration::from_millis(50)));
        let started = Instant::now();

        let err = processor
            .process_batch(&CancelToken::new(), &[1, 2, 3], |_, _| {
                thread::sleep(Duration::from_millis(200));
                Ok(())
            })
            .unwrap_err();

        assert!(matches!(err, PortError::Timeout(_)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_cooperative_handler_sees_deadline() {
        let processor =
            BatchProcessor::new(config(2).with_timeout(Duration::from_millis(30)));
        let err = processor
            .process_batch(&CancelToken::new(), &[1, 2], |_, ctx| {
                while !ctx.is_cancelled() {
                    thread::sleep(Duration::from_millis(1));
                }
                assert_eq!(ctx.remaining(), Duration::ZERO);
                ctx.checkpoint()
            })
            .unwrap_err();
        assert!(matches!(err, PortError::Timeout(_)));
    }

    #[test]
    fn test_cancelled_before_start() {
        let processor = BatchProcessor::new(config(2));
        let cancel = CancelToken::new();
        cancel.cancel();

        let calls = AtomicUsize::new(0);
        let err = processor
            .process_batch(&cancel, &[1, 2, 3, 4], |_, _| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(err, PortError::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_first_error_returned_rest_routed() {
        let routed = Arc::new(AtomicUsize::new(0));
        let processor = {
            let routed = Arc::clone(&routed);
            BatchProcessor::new(config(4).with_error_handler(move |_| {
                routed.fetch_add(1, Ordering::SeqCst);
            }))
        };
        let failures = AtomicUsize::new(0);
        let items: Vec<u32> = (0..50).collect();

        let err = processor
            .process_batch(&CancelToken::new(), &items, |n, _| {
                failures.fetch_add(1, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(1));
                Err(PortError::callback(format!("item {n}")))
            })
            .unwrap_err();

        assert!(matches!(err, PortError::Callback(_)));
        let failures = failures.load(Ordering::SeqCst);
        assert!(failures >= 1 && failures <= 4);
        assert_eq!(routed.load(Ordering::SeqCst) + 1, failures);
    }

    #[test]
    fn test_handler_interruption_kind_is_kept() {
        let processor = BatchProcessor::new(config(1));
        let started = Instant::now();

        let err = processor
            .process_batch(&CancelToken::new(), &[1], |_, _| Err(PortError::Stopped))
            .unwrap_err();
        assert!(matches!(err, PortError::Stopped), "{err:?}");
        assert!(!processor.is_stopped());

        let err = processor
            .process_batch(&CancelToken::new(), &[1], |_, _| Err(PortError::Cancelled))
            .unwrap_err();
        assert!(matches!(err, PortError::Cancelled), "{err:?}");
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_cancel_while_queue_is_full() {
        let processor = BatchProcessor::new(config(1).with_batch_size(1));
        let items: Vec<u32> = (0..100).collect();
        let cancel = CancelToken::new();
        let calls = AtomicUsize::new(0);

        let canceller = {
            let cancel = cancel.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(30));
                cancel.cancel();
            })
        };

        let started = Instant::now();
        let err = processor
            .process_batch(&cancel, &items, |_, _| {
                calls.fetch_add(1, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(5));
                Ok(())
            })
            .unwrap_err();
        canceller.join().unwrap();

        assert!(matches!(err, PortError::Cancelled), "{err:?}");
        assert!(calls.load(Ordering::SeqCst) < items.len());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_timeout_while_queue_is_full() {
        let processor = BatchProcessor::new(
            config(1)
                .with_batch_size(1)
                .with_timeout(Duration::from_millis(30)),
        );
        let items: Vec<u32> = (0..100).collect();
        let calls = AtomicUsize::new(0);

        let started = Instant::now();
        let err = processor
            .process_batch(&CancelToken::new(), &items, |_, _| {
                calls.fetch_add(1, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(5));
                Ok(())
            })
            .unwrap_err();

        assert!(matches!(err, PortError::Timeout(_)), "{err:?}");
        assert!(calls.load(Ordering::SeqCst) < items.len());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_panic_becomes_error_and_releases_buffer() {
        let pool = Arc::new(BufferPool::new(256));
        let processor = BatchProcessor::new(config(2).with_buffer_pool(Arc::clone(&pool)));

        let err = processor
            .process_batch(&CancelToken::new(), &[1, 2, 3], |n, ctx| {
                ctx.buffer().unwrap().extend_from_slice(b"scratch");
                if *n == 2 {
                    panic!("boom on {n}");
                }
                Ok(())
            })
            .unwrap_err();

        match err {
            PortError::WorkerPanic(msg) => assert_eq!(msg, "boom on 2"),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(pool.outstanding(), 0);
    }

    #[test]
    fn test_buffers_come_back_empty() {
        let pool = Arc::new(BufferPool::new(64));
        let processor = BatchProcessor::new(config(2).with_buffer_pool(Arc::clone(&pool)));
        let items: Vec<u8> = (0..20).collect();

        processor
            .process_batch(&CancelToken::new(), &items, |n, ctx| {
                let buf = ctx.buffer().unwrap();
                assert!(buf.is_empty());
                buf.push(*n);
                Ok(())
            })
            .unwrap();

        assert_eq!(pool.outstanding(), 0);
        assert!(pool.allocated() <= 2);
    }

    #[test]
    fn test_setters_apply_to_next_call() {
        let processor = BatchProcessor::new(config(1));
        processor.set_timeout(Duration::from_millis(20));
        processor.set_batch_size(0);
        assert_eq!(processor.timeout(), Duration::from_millis(20));
        assert_eq!(processor.batch_size(), DEFAULT_BATCH_SIZE);

        let err = processor
            .process_batch(&CancelToken::new(), &[1, 2], |_, _| {
                thread::sleep(Duration::from_millis(60));
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(err, PortError::Timeout(_)));
    }
}
