//! Scenes
//!
//! A scene is the execution context a computation or a callback runs in. It
//! decides what happens when an atom changes:
//!
//! - a read-write scene notifies the atom's subscribers, which is how edits
//!   made by event handlers invalidate cached memos;
//! - a read-only scene refuses the change, so evaluations that are supposed
//!   to be pure can never produce side effects.
//!
//! Reads are forwarded to the tracker installed with [`Scene::track_reads`],
//! which is how a memo learns what its computation depends on.

mod span;

pub use span::{ErrorSink, Span, TraceId};

use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::{ReactiveError, Result};
use crate::reactive::{Atom, ChangeTracker, SharedTracker};

/// Whether a scene may change state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SceneMode {
    /// Changes notify subscribers.
    ReadWrite,
    /// Changes fail with [`ReactiveError::ReadonlyViolation`].
    #[default]
    ReadOnly,
}

/// Execution context for computations and callbacks.
#[derive(Clone)]
pub struct Scene {
    span: Span,
    mode: SceneMode,
    reads: Option<SharedTracker>,
}

impl Scene {
    /// A scene whose changes notify subscribers.
    pub fn read_write(span: Span) -> Self {
        Self::with_mode(span, SceneMode::ReadWrite)
    }

    /// A scene that rejects every change.
    pub fn read_only(span: Span) -> Self {
        Self::with_mode(span, SceneMode::ReadOnly)
    }

    /// A scene with an explicit mode.
    pub fn with_mode(span: Span, mode: SceneMode) -> Self {
        Self {
            span,
            mode,
            reads: None,
        }
    }

    /// The causal context of this scene.
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// The scene's mode.
    pub fn mode(&self) -> SceneMode {
        self.mode
    }

    /// Whether changes are rejected.
    pub fn is_read_only(&self) -> bool {
        self.mode == SceneMode::ReadOnly
    }

    /// A copy of this scene whose reads are attributed to `tracker`.
    ///
    /// The original scene is left untouched, so concurrent computations each
    /// get their own attribution.
    pub fn track_reads(&self, tracker: SharedTracker) -> Scene {
        Scene {
            span: self.span.clone(),
            mode: self.mode,
            reads: Some(tracker),
        }
    }

    /// Run a write callback in a fresh read-write scene.
    ///
    /// Failures are handed to the span's error sink and yield `None`.
    pub async fn run_callback<F, Fut, T>(span: Span, callback: F) -> Option<T>
    where
        F: FnOnce(Scene) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let scene = Scene::read_write(span);
        match callback(scene.clone()).await {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(op = scene.span.op(), error = %err, "unhandled callback error");
                scene.span.on_error(&err);
                None
            }
        }
    }
}

impl ChangeTracker for Scene {
    fn on_atom_read(&self, atom: &Atom) -> Result<()> {
        match &self.reads {
            Some(tracker) => tracker.on_atom_read(atom),
            None => {
                tracing::trace!(op = self.span.op(), atom = %atom, "read outside tracked computation");
                Ok(())
            }
        }
    }

    fn on_atom_changed(&self, atom: &Atom) -> Result<()> {
        match self.mode {
            SceneMode::ReadWrite => {
                atom.notify_subscribers(&self.span);
                Ok(())
            }
            SceneMode::ReadOnly => Err(ReactiveError::ReadonlyViolation {
                scene: self.span.op().to_string(),
                atom: atom.to_string(),
            }),
        }
    }
}

impl fmt::Debug for Scene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scene")
            .field("span", &self.span)
            .field("mode", &self.mode)
            .field("tracks_reads", &self.reads.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{AtomSubscriber, FnSubscriber, ReadSet};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Arc;

    #[test]
    fn read_write_scene_notifies_subscribers() {
        let atom = Atom::new();
        let hits = Arc::new(AtomicI32::new(0));
        let hits_clone = hits.clone();
        let subscriber: Arc<dyn AtomSubscriber> = Arc::new(FnSubscriber::new(move |span| {
            assert_eq!(span.op(), "edit");
            hits_clone.fetch_add(1, Ordering::SeqCst);
        }));
        atom.add_subscriber(&subscriber);

        Scene::read_write(Span::new("edit"))
            .on_atom_changed(&atom)
            .unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn read_only_scene_rejects_changes() {
        let scene = Scene::read_only(Span::new("render"));
        let err = scene.on_atom_changed(&Atom::labeled("title")).unwrap_err();
        match err {
            ReactiveError::ReadonlyViolation { scene, atom } => {
                assert_eq!(scene, "render");
                assert!(atom.ends_with("(title)"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn track_reads_forwards_to_tracker() {
        let root = Scene::read_only(Span::new("render"));
        let reads = Arc::new(ReadSet::new());
        let tracked = root.track_reads(reads.clone());
        let atom = Atom::new();

        root.on_atom_read(&atom).unwrap();
        assert!(reads.is_empty());

        tracked.on_atom_read(&atom).unwrap();
        assert!(reads.contains(&atom));
        assert!(tracked.is_read_only());
    }

    #[tokio::test]
    async fn callback_errors_go_to_the_sink() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let span = Span::new("click").with_error_sink(move |_, err| {
            seen_clone.lock().push(err.to_string());
        });

        let ok = Scene::run_callback(span.clone(), |scene| async move {
            assert!(!scene.is_read_only());
            Ok(7)
        })
        .await;
        let failed: Option<i32> = Scene::run_callback(span, |_| async {
            Err(anyhow::anyhow!("save failed").into())
        })
        .await;

        assert_eq!(ok, Some(7));
        assert_eq!(failed, None);
        assert_eq!(seen.lock().as_slice(), ["computation failed: save failed"]);
    }

    #[test]
    fn scene_mode_deserializes_from_snake_case() {
        let mode: SceneMode = serde_json::from_str("\"read_write\"").unwrap();
        assert_eq!(mode, SceneMode::ReadWrite);
        assert_eq!(SceneMode::default(), SceneMode::ReadOnly);
    }
}
