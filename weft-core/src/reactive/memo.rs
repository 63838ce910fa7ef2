//! Async Memo Implementation
//!
//! An `AsyncMemo` is a cached asynchronous computation. It runs its
//! computation once per epoch of its dependencies and shares that single run
//! between every caller that asks while it is in flight.
//!
//! # How Async Memos Work
//!
//! 1. On first `get`, the memo starts a run. The computation receives a scene
//!    whose reads are attributed to that run, and the same run tracker is the
//!    ambient tracker while the computation is polled.
//!
//! 2. Every atom read during the run becomes a subscription: the memo adds
//!    itself to the atom's subscriber set.
//!
//! 3. When the run finishes and is still the current one, its value is
//!    cached. Later `get` calls return the cache and copy the subscriptions
//!    into the caller, which makes the caller depend on the same atoms.
//!
//! 4. When a subscribed atom changes, the memo drops its cache, its pending
//!    run and its subscriptions, then tells its observer. It does not
//!    recompute until the next `get`.
//!
//! # States
//!
//! ```text
//!   Empty --get--> Pending --run ok--> Cached
//!     ^               |                  |
//!     +--run failed---+                  |
//!     +----------atom changed------------+
//! ```
//!
//! A run that completes after the memo was invalidated (or disposed) is
//! superseded: its result still reaches the callers that awaited it, but it is
//! never cached.

use std::fmt::Debug;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use futures_util::future::{BoxFuture, FutureExt, Shared};
use indexmap::IndexSet;
use parking_lot::Mutex;

use super::atom::Atom;
use super::context::TrackingScope;
use super::subscriber::{AtomSubscriber, SubscriberId};
use super::tracker::ChangeTracker;
use crate::error::{ReactiveError, Result};
use crate::scene::{Scene, Span};

/// The user computation behind a memo.
pub type Computation<T> = Arc<dyn Fn(Scene) -> BoxFuture<'static, Result<T>> + Send + Sync>;

/// An in-flight run, shared by every caller awaiting it.
type Run<T> = Shared<BoxFuture<'static, (Result<T>, Vec<Atom>)>>;

/// Identifies one run of a memo's computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RunId(u64);

/// Cache state for a memo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoState {
    /// No cached value and nothing running.
    Empty,

    /// A run is in flight.
    Pending,

    /// A value is cached.
    Cached,
}

enum Slot<T> {
    Empty,
    Pending { run: RunId, task: Run<T> },
    Cached(T),
}

struct NodeState<T> {
    slot: Slot<T>,
    subscriptions: IndexSet<Atom>,
    last_run: u64,
}

/// A memoized asynchronous computation.
///
/// Cloning yields another handle to the same memo.
pub struct AsyncMemo<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<MemoInner<T>>,
}

struct MemoInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    id: SubscriberId,
    compute: Computation<T>,
    observer: Option<Weak<dyn AtomSubscriber>>,
    state: Mutex<NodeState<T>>,
    runs: AtomicUsize,
}

impl<T> AsyncMemo<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a memo. The computation does not run until the first `get`.
    pub fn new<F, Fut>(compute: F) -> Self
    where
        F: Fn(Scene) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        Self::build(compute, None)
    }

    /// Create a memo that notifies `observer` whenever its cache is dropped.
    ///
    /// The memo only keeps a weak reference to the observer.
    pub fn with_observer<F, Fut>(compute: F, observer: &Arc<dyn AtomSubscriber>) -> Self
    where
        F: Fn(Scene) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        Self::build(compute, Some(Arc::downgrade(observer)))
    }

    pub(crate) fn with_weak_observer<F, Fut>(compute: F, observer: Weak<dyn AtomSubscriber>) -> Self
    where
        F: Fn(Scene) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        Self::build(compute, Some(observer))
    }

    fn build<F, Fut>(compute: F, observer: Option<Weak<dyn AtomSubscriber>>) -> Self
    where
        F: Fn(Scene) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        Self {
            inner: Arc::new(MemoInner {
                id: SubscriberId::new(),
                compute: Arc::new(move |scene| compute(scene).boxed()),
                observer,
                state: Mutex::new(NodeState {
                    slot: Slot::Empty,
                    subscriptions: IndexSet::new(),
                    last_run: 0,
                }),
                runs: AtomicUsize::new(0),
            }),
        }
    }

    /// The subscriber ID this memo uses on atoms.
    pub fn id(&self) -> SubscriberId {
        self.inner.id
    }

    /// Get the value, running the computation if nothing is cached.
    ///
    /// Every atom the value depends on is reported to `scene`.
    pub async fn get(&self, scene: &Scene) -> Result<T> {
        enum Step<T> {
            Hit(T, Vec<Atom>),
            Wait(Run<T>),
        }

        let step = {
            let mut state = self.inner.state.lock();
            match &state.slot {
                Slot::Cached(value) => Step::Hit(
                    value.clone(),
                    state.subscriptions.iter().cloned().collect(),
                ),
                Slot::Pending { task, .. } => Step::Wait(task.clone()),
                Slot::Empty => Step::Wait(self.inner.start(&mut state, scene)),
            }
        };

        match step {
            Step::Hit(value, atoms) => {
                tracing::trace!(memo = ?self.inner.id, "cache hit");
                copy_subscriptions(scene, &atoms)?;
                Ok(value)
            }
            Step::Wait(task) => {
                let (outcome, reads) = task.await;
                let value = outcome?;
                copy_subscriptions(scene, &reads)?;
                Ok(value)
            }
        }
    }

    /// Drop the cache and every subscription. Safe to call repeatedly.
    ///
    /// A run in flight keeps going, but its result will not be cached.
    pub fn dispose(&self) {
        self.inner.reset();
    }

    /// Get the current cache state.
    pub fn state(&self) -> MemoState {
        match self.inner.state.lock().slot {
            Slot::Empty => MemoState::Empty,
            Slot::Pending { .. } => MemoState::Pending,
            Slot::Cached(_) => MemoState::Cached,
        }
    }

    /// Check if the memo has a cached value.
    pub fn has_value(&self) -> bool {
        self.state() == MemoState::Cached
    }

    /// Atoms the memo is subscribed to.
    pub fn subscriptions(&self) -> Vec<Atom> {
        self.inner.state.lock().subscriptions.iter().cloned().collect()
    }

    /// Get the number of subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.inner.state.lock().subscriptions.len()
    }

    /// Number of times the computation has been started.
    pub fn run_count(&self) -> usize {
        self.inner.runs.load(Ordering::SeqCst)
    }
}

fn copy_subscriptions(scene: &Scene, atoms: &[Atom]) -> Result<()> {
    for atom in atoms {
        scene.on_atom_read(atom)?;
    }
    Ok(())
}

impl<T> MemoInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Start a run. Called with the state lock held; the computation itself
    /// is only invoked once the returned task is polled.
    fn start(self: &Arc<Self>, state: &mut NodeState<T>, scene: &Scene) -> Run<T> {
        state.last_run += 1;
        let run = RunId(state.last_run);
        let tracker = Arc::new(RunTracker {
            node: Arc::downgrade(self),
            run,
            reads: Mutex::new(IndexSet::new()),
        });
        let child = scene.track_reads(tracker.clone());
        let compute = Arc::clone(&self.compute);
        let node = Arc::downgrade(self);
        let id = self.id;

        self.runs.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(memo = ?id, run = run.0, op = scene.span().op(), "computation started");

        let task = async move {
            let outcome = TrackingScope::run(tracker.clone(), async move { compute(child).await }).await;
            let reads = tracker.reads();
            match node.upgrade() {
                Some(node) => node.complete(run, &outcome),
                None => tracing::debug!(memo = ?id, run = run.0, "memo dropped before run finished"),
            }
            (outcome, reads)
        }
        .boxed()
        .shared();

        state.slot = Slot::Pending {
            run,
            task: task.clone(),
        };
        task
    }

    /// Promote a finished run, unless it has been superseded.
    fn complete(&self, run: RunId, outcome: &Result<T>) {
        let mut state = self.state.lock();
        let current = matches!(state.slot, Slot::Pending { run: r, .. } if r == run);
        if !current {
            tracing::debug!(memo = ?self.id, run = run.0, "discarding superseded run");
            return;
        }
        match outcome {
            Ok(value) => {
                state.slot = Slot::Cached(value.clone());
                tracing::debug!(
                    memo = ?self.id,
                    run = run.0,
                    subscriptions = state.subscriptions.len(),
                    "value cached"
                );
            }
            Err(err) => {
                state.slot = Slot::Empty;
                self.unsubscribe_all(&mut state);
                tracing::debug!(memo = ?self.id, run = run.0, error = %err, "computation failed");
            }
        }
    }

    /// Record a read made by `run`, if it is still the current run.
    fn subscribe(self: &Arc<Self>, run: RunId, atom: &Atom) {
        let mut state = self.state.lock();
        if !matches!(state.slot, Slot::Pending { run: r, .. } if r == run) {
            tracing::trace!(memo = ?self.id, run = run.0, atom = %atom, "read from superseded run ignored");
            return;
        }
        if state.subscriptions.insert(atom.clone()) {
            let subscriber: Arc<dyn AtomSubscriber> = self.clone();
            atom.add_subscriber(&subscriber);
        }
    }

    fn unsubscribe_all(&self, state: &mut NodeState<T>) {
        for atom in state.subscriptions.drain(..) {
            atom.delete_subscriber(self.id);
        }
    }

    /// Clear cache, pending run and subscriptions. Returns whether anything
    /// was held.
    fn reset(&self) -> bool {
        let mut state = self.state.lock();
        let held = !matches!(state.slot, Slot::Empty) || !state.subscriptions.is_empty();
        state.slot = Slot::Empty;
        self.unsubscribe_all(&mut state);
        held
    }
}

impl<T> AtomSubscriber for MemoInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn subscriber_id(&self) -> SubscriberId {
        self.id
    }

    fn on_atom_changed(&self, span: &Span) {
        if !self.reset() {
            return;
        }
        tracing::debug!(memo = ?self.id, op = span.op(), "invalidated");
        if let Some(observer) = self.observer.as_ref().and_then(Weak::upgrade) {
            observer.on_atom_changed(span);
        }
    }
}

/// The tracker installed for one run.
///
/// Reads are kept for the run's callers and, while the run is still current,
/// turned into subscriptions of the memo.
struct RunTracker<T>
where
    T: Clone + Send + Sync + 'static,
{
    node: Weak<MemoInner<T>>,
    run: RunId,
    reads: Mutex<IndexSet<Atom>>,
}

impl<T> RunTracker<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn reads(&self) -> Vec<Atom> {
        self.reads.lock().iter().cloned().collect()
    }
}

impl<T> ChangeTracker for RunTracker<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn on_atom_read(&self, atom: &Atom) -> Result<()> {
        self.reads.lock().insert(atom.clone());
        if let Some(node) = self.node.upgrade() {
            node.subscribe(self.run, atom);
        }
        Ok(())
    }

    fn on_atom_changed(&self, atom: &Atom) -> Result<()> {
        Err(ReactiveError::ReadonlyViolation {
            scene: format!("memo run {}", self.run.0),
            atom: atom.to_string(),
        })
    }
}

impl<T> Clone for AsyncMemo<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for AsyncMemo<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncMemo")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .field("subscription_count", &self.subscription_count())
            .field("run_count", &self.run_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
