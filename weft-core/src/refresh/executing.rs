//! Busy flag for async write actions.

use std::future::Future;

use futures_util::future::{ready, Ready};

use crate::error::Result;
use crate::reactive::{ChangeTracker, Ref};
use crate::scene::Scene;

/// Tracks whether an async action is in flight.
///
/// The flag is a `Ref<bool>`, so memos that read it are invalidated when an
/// action starts and again when it finishes.
#[derive(Debug, Clone)]
pub struct ExecutingFlag {
    cell: Ref<bool>,
}

impl ExecutingFlag {
    /// Create a lowered flag.
    pub fn new() -> Self {
        Self::labeled("executing")
    }

    /// Create a flag whose atom carries a label.
    pub fn labeled(label: impl Into<String>) -> Self {
        Self {
            cell: Ref::labeled(label, false),
        }
    }

    /// Read the flag, reporting the read to `tracker`.
    pub fn get(&self, tracker: &dyn ChangeTracker) -> Result<bool> {
        self.cell.get(tracker)
    }

    /// Read the flag without tracking.
    pub fn is_executing(&self) -> bool {
        self.cell.get_untracked()
    }

    /// Run `work` with the flag raised.
    ///
    /// The flag is lowered whether or not `work` succeeds. An error from
    /// `work` wins over one from lowering the flag.
    pub async fn run<Fut, T>(&self, scene: &Scene, work: Fut) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        self.cell.set(true, scene)?;
        tracing::trace!(op = scene.span().op(), "action started");
        let outcome = work.await;
        let lowered = self.cell.set(false, scene);
        tracing::trace!(op = scene.span().op(), ok = outcome.is_ok(), "action finished");
        let value = outcome?;
        lowered?;
        Ok(value)
    }

    /// A computation reading the flag, for registration on a coordinator.
    pub fn computation(&self) -> impl Fn(Scene) -> Ready<Result<bool>> + Send + Sync + 'static {
        let cell = self.cell.clone();
        move |scene| ready(cell.get(&scene))
    }
}

impl Default for ExecutingFlag {
    fn default() -> Self {
        Self::new()
    }
}
