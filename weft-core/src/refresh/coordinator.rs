//! Refresh coordinator implementation.

use std::fmt::Debug;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use futures_util::future::{join_all, BoxFuture, FutureExt};
use indexmap::{IndexMap, IndexSet};
use parking_lot::{Mutex, RwLock};
use tokio::sync::Notify;

use super::config::RefreshConfig;
use crate::error::{ReactiveError, Result};
use crate::reactive::{AsyncMemo, Atom, AtomSubscriber, ChangeTracker, ReadSet, SubscriberId};
use crate::scene::{Scene, Span};

/// Work run in a read-write scene when a coordinator mounts or unmounts.
pub type MountHook = Arc<dyn Fn(Scene) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Refreshes a named set of memos as one batch.
///
/// Cloning yields another handle to the same coordinator.
pub struct RefreshCoordinator<V>
where
    V: Clone + PartialEq + Send + Sync + 'static,
{
    inner: Arc<CoordinatorInner<V>>,
}

struct CoordinatorInner<V>
where
    V: Clone + PartialEq + Send + Sync + 'static,
{
    id: SubscriberId,
    config: RefreshConfig,

    /// Owned memos, disposed on unmount.
    nodes: RwLock<IndexMap<String, AsyncMemo<V>>>,

    /// Last value seen for each memo.
    values: RwLock<IndexMap<String, V>>,

    /// Atoms read directly through the coordinator.
    direct: Mutex<IndexSet<Atom>>,

    mount_hook: RwLock<Option<MountHook>>,
    unmount_hook: Mutex<Option<MountHook>>,
    listener: RwLock<Option<Arc<dyn AtomSubscriber>>>,

    unmounted: AtomicBool,
    stale: AtomicBool,
    invalidated: Notify,
}

impl<V> RefreshCoordinator<V>
where
    V: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create an empty coordinator.
    pub fn new(config: RefreshConfig) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                id: SubscriberId::new(),
                config,
                nodes: RwLock::new(IndexMap::new()),
                values: RwLock::new(IndexMap::new()),
                direct: Mutex::new(IndexSet::new()),
                mount_hook: RwLock::new(None),
                unmount_hook: Mutex::new(None),
                listener: RwLock::new(None),
                unmounted: AtomicBool::new(false),
                stale: AtomicBool::new(false),
                invalidated: Notify::new(),
            }),
        }
    }

    /// The coordinator's settings.
    pub fn config(&self) -> &RefreshConfig {
        &self.inner.config
    }

    /// Register a memo under `name`.
    ///
    /// The memo reports invalidations to this coordinator. Registering a
    /// name twice disposes the memo it replaces.
    pub fn subscribe<F, Fut>(&self, name: impl Into<String>, compute: F) -> AsyncMemo<V>
    where
        F: Fn(Scene) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let name = name.into();
        let observer: Weak<dyn AtomSubscriber> = Arc::downgrade(&self.inner) as Weak<dyn AtomSubscriber>;
        let memo = AsyncMemo::with_weak_observer(compute, observer);
        if let Some(replaced) = self.inner.nodes.write().insert(name.clone(), memo.clone()) {
            tracing::debug!(coordinator = %self.inner.config.label, node = %name, "replacing node");
            replaced.dispose();
        }
        memo
    }

    /// Set the listener that receives the aggregated change notification.
    pub fn on_change(&self, listener: Arc<dyn AtomSubscriber>) {
        *self.inner.listener.write() = Some(listener);
    }

    /// Set work to run before the initial refresh.
    pub fn on_mount<F, Fut>(&self, hook: F)
    where
        F: Fn(Scene) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let hook: MountHook = Arc::new(move |scene| hook(scene).boxed());
        *self.inner.mount_hook.write() = Some(hook);
    }

    /// Set work to run when the coordinator unmounts.
    ///
    /// The hook runs once, in a fresh read-write scene spawned on the current
    /// tokio runtime. Its failure goes to the unmount span's error sink.
    pub fn on_unmount<F, Fut>(&self, hook: F)
    where
        F: Fn(Scene) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let hook: MountHook = Arc::new(move |scene| hook(scene).boxed());
        *self.inner.unmount_hook.lock() = Some(hook);
    }

    /// Whether mounting has asynchronous work to do.
    pub fn needs_async_mount(&self) -> bool {
        self.inner.mount_hook.read().is_some() || !self.inner.nodes.read().is_empty()
    }

    /// Run the mount hook, then the initial refresh.
    pub async fn mount(&self, span: &Span) -> Result<()> {
        let hook = self.inner.mount_hook.read().clone();
        if let Some(hook) = hook {
            let scene = Scene::read_write(span.child(format!("mount {}", self.inner.config.label)));
            hook(scene).await?;
        }
        self.refresh(span, true).await.map(|_| ())
    }

    /// Refresh every memo concurrently.
    ///
    /// Returns whether any stored value changed. On the initial load any
    /// failure is returned; later failures go to the span's error sink unless
    /// failure isolation is turned off.
    pub async fn refresh(&self, span: &Span, is_initial: bool) -> Result<bool> {
        let inner = &self.inner;
        if self.is_unmounted() {
            tracing::debug!(coordinator = %inner.config.label, "refresh after unmount ignored");
            return Ok(false);
        }
        inner.stale.store(false, Ordering::SeqCst);

        let nodes: Vec<(String, AsyncMemo<V>)> = inner
            .nodes
            .read()
            .iter()
            .map(|(name, memo)| (name.clone(), memo.clone()))
            .collect();
        tracing::debug!(
            coordinator = %inner.config.label,
            nodes = nodes.len(),
            is_initial,
            "refresh started"
        );

        let runs = nodes.into_iter().map(|(name, memo)| {
            let reads = Arc::new(ReadSet::new());
            let span = span.child(format!("{} {}", inner.config.label, name));
            let scene = Scene::with_mode(span, inner.config.refresh_mode).track_reads(reads.clone());
            async move {
                let outcome = memo.get(&scene).await;
                tracing::trace!(node = %name, reads = reads.len(), "node evaluated");
                (name, outcome)
            }
        });
        let results = join_all(runs).await;

        let mut dirty = false;
        let mut failure = None;
        for (name, outcome) in results {
            match outcome {
                Ok(value) => {
                    let mut values = inner.values.write();
                    if values.get(&name) != Some(&value) {
                        tracing::debug!(coordinator = %inner.config.label, node = %name, "value changed");
                        values.insert(name, value);
                        dirty = true;
                    }
                }
                Err(err) if is_initial || !inner.config.isolate_failures => {
                    tracing::debug!(node = %name, error = %err, "refresh failed");
                    failure.get_or_insert(err);
                }
                Err(err) => {
                    tracing::warn!(coordinator = %inner.config.label, node = %name, error = %err, "node refresh failed");
                    span.on_error(&err);
                }
            }
        }

        if let Some(err) = failure {
            return Err(err);
        }
        if dirty && !is_initial {
            self.emit(span);
        }
        Ok(dirty)
    }

    fn emit(&self, span: &Span) {
        let listener = self.inner.listener.read().clone();
        tracing::debug!(coordinator = %self.inner.config.label, op = span.op(), "values changed");
        if let Some(listener) = listener {
            listener.on_atom_changed(span);
        }
    }

    /// The last refreshed value of `name`.
    pub fn value(&self, name: &str) -> Option<V> {
        self.inner.values.read().get(name).cloned()
    }

    /// All refreshed values, in registration order.
    pub fn values(&self) -> IndexMap<String, V> {
        self.inner.values.read().clone()
    }

    /// The memo registered under `name`.
    pub fn node(&self, name: &str) -> Option<AsyncMemo<V>> {
        self.inner.nodes.read().get(name).cloned()
    }

    /// Atoms the coordinator read directly.
    pub fn direct_atoms(&self) -> Vec<Atom> {
        self.inner.direct.lock().iter().cloned().collect()
    }

    /// Whether a dependency changed since the last refresh.
    pub fn is_stale(&self) -> bool {
        self.inner.stale.load(Ordering::SeqCst)
    }

    /// Wait until a dependency changes or the coordinator is unmounted.
    pub async fn invalidated(&self) {
        loop {
            let notified = self.inner.invalidated.notified();
            if self.is_stale() || self.is_unmounted() {
                return;
            }
            notified.await;
        }
    }

    /// Dispose every memo and release every direct subscription.
    ///
    /// Later invalidations and refreshes are ignored.
    pub fn unmount(&self) {
        let span = Span::new(format!("unmount {}", self.inner.config.label));
        self.unmount_with_span(&span);
    }

    /// Like [`unmount`](Self::unmount), running the unmount hook under `span`.
    pub fn unmount_with_span(&self, span: &Span) {
        let inner = &self.inner;
        if inner.unmounted.swap(true, Ordering::SeqCst) {
            return;
        }
        for (_, memo) in inner.nodes.write().drain(..) {
            memo.dispose();
        }
        for atom in inner.direct.lock().drain(..) {
            atom.delete_subscriber(inner.id);
        }
        tracing::debug!(coordinator = %inner.config.label, "unmounted");
        inner.invalidated.notify_waiters();

        let hook = inner.unmount_hook.lock().take();
        if let Some(hook) = hook {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    let span = span.clone();
                    handle.spawn(async move {
                        Scene::run_callback(span, |scene| hook(scene)).await;
                    });
                }
                Err(_) => {
                    tracing::warn!(coordinator = %inner.config.label, "no tokio runtime, unmount hook skipped");
                }
            }
        }
    }

    /// Whether `unmount` has been called.
    pub fn is_unmounted(&self) -> bool {
        self.inner.unmounted.load(Ordering::SeqCst)
    }
}

impl<V> ChangeTracker for RefreshCoordinator<V>
where
    V: Clone + PartialEq + Send + Sync + 'static,
{
    fn on_atom_read(&self, atom: &Atom) -> Result<()> {
        if self.is_unmounted() {
            return Ok(());
        }
        if self.inner.direct.lock().insert(atom.clone()) {
            let subscriber: Arc<dyn AtomSubscriber> = self.inner.clone();
            atom.add_subscriber(&subscriber);
            tracing::trace!(coordinator = %self.inner.config.label, atom = %atom, "direct subscription");
        }
        Ok(())
    }

    fn on_atom_changed(&self, atom: &Atom) -> Result<()> {
        Err(ReactiveError::ReadonlyViolation {
            scene: self.inner.config.label.clone(),
            atom: atom.to_string(),
        })
    }
}

impl<V> AtomSubscriber for CoordinatorInner<V>
where
    V: Clone + PartialEq + Send + Sync + 'static,
{
    fn subscriber_id(&self) -> SubscriberId {
        self.id
    }

    fn on_atom_changed(&self, span: &Span) {
        if self.unmounted.load(Ordering::SeqCst) {
            tracing::trace!(coordinator = %self.config.label, "invalidation after unmount ignored");
            return;
        }
        self.stale.store(true, Ordering::SeqCst);
        tracing::debug!(coordinator = %self.config.label, op = span.op(), "invalidated");
        self.invalidated.notify_waiters();
    }
}

impl<V> Clone for RefreshCoordinator<V>
where
    V: Clone + PartialEq + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> Default for RefreshCoordinator<V>
where
    V: Clone + PartialEq + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(RefreshConfig::default())
    }
}

impl<V> Debug for RefreshCoordinator<V>
where
    V: Clone + PartialEq + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("label", &self.inner.config.label)
            .field("values", &self.values())
            .field("direct_atoms", &self.inner.direct.lock().len())
            .field("stale", &self.is_stale())
            .field("unmounted", &self.is_unmounted())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
