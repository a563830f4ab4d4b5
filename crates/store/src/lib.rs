//! ItemVoid store: discovery queue, recursive container expansion and the poll/bake
//! pipeline that turns queued discoveries into deduplicated batches.

#![forbid(unsafe_code)]

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use itemvoid_core::{is_collectible, BakedItem, Stack, VoidConfig, VoidError, VoidItem, VoidResult};
use metrics::{counter, gauge, histogram};
use rustc_hash::FxHashSet;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

pub mod expand;
pub mod queue;

pub use queue::DiscoveryQueue;

/// One poll's output: at most one baked item per distinct stack.
pub type Batch<S> = FxHashSet<BakedItem<S>>;

/// Shared run state. Cloned into every poll task; once stopped, intake drops items and
/// new polls resolve empty.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    active: Arc<AtomicBool>,
}

impl Lifecycle {
    pub fn new() -> Self { Self { active: Arc::new(AtomicBool::new(true)) } }

    pub fn is_active(&self) -> bool { self.active.load(Ordering::Acquire) }

    /// Returns true if this call performed the transition.
    pub fn stop(&self) -> bool { self.active.swap(false, Ordering::AcqRel) }
}

impl Default for Lifecycle {
    fn default() -> Self { Self::new() }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    Stopped,
    Air,
    NoMeta,
}

impl Rejection {
    fn as_str(self) -> &'static str {
        match self {
            Rejection::Stopped => "stopped",
            Rejection::Air => "air",
            Rejection::NoMeta => "no_meta",
        }
    }
}

fn admit<S: Stack>(lifecycle: &Lifecycle, stack: &S) -> Result<(), Rejection> {
    if !lifecycle.is_active() {
        return Err(Rejection::Stopped);
    }
    if !stack.has_meta() {
        return Err(Rejection::NoMeta);
    }
    if stack.is_air() {
        return Err(Rejection::Air);
    }
    Ok(())
}

/// Entry point for hosts: accepts discoveries from any thread and bakes them on demand.
pub struct VoidManager<S: Stack> {
    queue: Arc<DiscoveryQueue<VoidItem<S>>>,
    lifecycle: Lifecycle,
    max_parse_depth: usize,
    runtime: Handle,
}

impl<S: Stack> VoidManager<S> {
    /// Build a manager bound to the ambient tokio runtime.
    pub fn new(config: VoidConfig) -> VoidResult<Self> {
        let runtime = Handle::try_current().map_err(|_| VoidError::NoRuntime)?;
        Self::with_handle(config, runtime)
    }

    pub fn with_handle(config: VoidConfig, runtime: Handle) -> VoidResult<Self> {
        let config = config.validate()?;
        Ok(Self {
            queue: Arc::new(DiscoveryQueue::new()),
            lifecycle: Lifecycle::new(),
            max_parse_depth: config.recursive_scan_depth,
            runtime,
        })
    }

    pub fn lifecycle(&self) -> &Lifecycle { &self.lifecycle }
    pub fn max_parse_depth(&self) -> usize { self.max_parse_depth }

    /// Entries waiting to be polled.
    pub fn pending(&self) -> usize { self.queue.len() }

    /// Queue a stack for later baking. Air, meta-less stacks and anything arriving after
    /// shutdown are dropped silently.
    pub fn discover(&self, stack: S) {
        match admit(&self.lifecycle, &stack) {
            Ok(()) => {
                self.queue.push_back(VoidItem::now(stack));
                counter!("itemvoid_discovered_total", 1u64);
            }
            Err(why) => {
                counter!("itemvoid_dropped_total", 1u64, "reason" => why.as_str());
                debug!(reason = why.as_str(), "discovery dropped");
            }
        }
    }

    /// Absent stacks are ignored.
    pub fn discover_maybe(&self, stack: Option<S>) {
        if let Some(stack) = stack {
            self.discover(stack);
        }
    }

    /// Each element goes through `discover` on its own; a concurrent poll may see part of
    /// the batch.
    pub fn discover_all<I>(&self, stacks: I)
    where
        I: IntoIterator<Item = S>,
    {
        for stack in stacks {
            self.discover(stack);
        }
    }

    /// Drain up to `count` queue entries (all entries present at call time when negative)
    /// on a blocking worker and resolve to the deduplicated baked batch.
    pub fn poll_items(&self, count: i64) -> PollHandle<S> {
        if !self.lifecycle.is_active() {
            debug!(count, "poll after shutdown; returning empty batch");
            return PollHandle::ready(Batch::default());
        }
        let queue = Arc::clone(&self.queue);
        let lifecycle = self.lifecycle.clone();
        let max_depth = self.max_parse_depth;
        let task = self.runtime.spawn_blocking(move || bake(&queue, &lifecycle, count, max_depth));
        PollHandle { state: PollState::Running(task) }
    }

    /// Mark the manager stopped. Polls already running finish normally.
    pub fn shutdown(&self) {
        if self.lifecycle.stop() {
            info!(pending = self.queue.len(), "item void manager stopped");
        }
    }
}

impl<S: Stack> Drop for VoidManager<S> {
    fn drop(&mut self) { self.shutdown(); }
}

fn bake<S: Stack>(
    queue: &DiscoveryQueue<VoidItem<S>>,
    lifecycle: &Lifecycle,
    count: i64,
    max_depth: usize,
) -> Batch<S> {
    let mut batch = Batch::default();
    if !lifecycle.is_active() {
        return batch;
    }
    let started = Instant::now();
    // Sampled once; discoveries racing with the drain may or may not be included.
    let limit = usize::try_from(count).unwrap_or_else(|_| queue.len());
    let mut drained = 0usize;
    while drained < limit {
        let Some(VoidItem { discovered_at, stack }) = queue.pop_front() else { break };
        drained += 1;
        // A panicking entry costs only itself; the rest of the batch survives.
        let found = expand::isolate(0, || {
            let mut found = Vec::new();
            if is_collectible(Some(&stack)) {
                found.push(stack.clone());
            }
            if let Some(meta) = stack.meta() {
                found.extend(expand::expand::<S>(meta, 0, max_depth));
            }
            found
        });
        // `insert` keeps the first occurrence, so the earliest discovery wins a tie.
        for s in found {
            batch.insert(BakedItem::new(discovered_at, s));
        }
    }
    counter!("itemvoid_drained_total", drained as u64);
    counter!("itemvoid_baked_total", batch.len() as u64);
    gauge!("itemvoid_queue_len", queue.len() as f64);
    histogram!("itemvoid_poll_ms", started.elapsed().as_secs_f64() * 1000.0);
    debug!(drained, baked = batch.len(), "poll finished");
    batch
}

/// Handle to an in-flight poll. Always resolves to a batch, never to an error.
pub struct PollHandle<S: Stack> {
    state: PollState<S>,
}

enum PollState<S: Stack> {
    Ready(Option<Batch<S>>),
    Running(JoinHandle<Batch<S>>),
}

impl<S: Stack> PollHandle<S> {
    fn ready(batch: Batch<S>) -> Self { Self { state: PollState::Ready(Some(batch)) } }

    pub fn is_finished(&self) -> bool {
        match &self.state {
            PollState::Ready(_) => true,
            PollState::Running(task) => task.is_finished(),
        }
    }
}

// No field is structurally pinned.
impl<S: Stack> Unpin for PollHandle<S> {}

impl<S: Stack> Future for PollHandle<S> {
    type Output = Batch<S>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match &mut this.state {
            PollState::Ready(batch) => Poll::Ready(batch.take().unwrap_or_default()),
            PollState::Running(task) => match Pin::new(task).poll(cx) {
                Poll::Ready(Ok(batch)) => Poll::Ready(batch),
                Poll::Ready(Err(e)) => {
                    error!(error = %e, "poll task failed; returning empty batch");
                    Poll::Ready(Batch::default())
                }
                Poll::Pending => Poll::Pending,
            },
        }
    }
}
