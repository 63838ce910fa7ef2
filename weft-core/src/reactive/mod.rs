//! Reactive Primitives
//!
//! This module implements tracked state and the memoized computations that
//! depend on it. Together they form the foundation of Weft's incremental
//! recomputation.
//!
//! # Concepts
//!
//! ## Atoms
//!
//! An Atom is the unit of change notification. It holds no value, only a set
//! of weakly held subscribers. Reading state reports the atom to a tracker;
//! changing state reports the atom again, and a read-write scene then notifies
//! every subscriber.
//!
//! ## Reactive Containers
//!
//! A `ReactiveObject` is a keyed record with one atom per key. Attaching it
//! to a tracker yields an `Attached` view whose reads and writes are reported
//! to that tracker. Nested values are reached through a `Cursor`, which
//! reports on the atom of the top-level key the value lives under. A `Ref` is
//! the single-value case.
//!
//! ## Async Memos
//!
//! An `AsyncMemo` caches the result of an asynchronous computation. It
//! subscribes to every atom the computation read, drops its cache when one of
//! them changes, and recomputes lazily on the next `get`. Concurrent callers
//! share a single run.
//!
//! # Implementation Notes
//!
//! Trackers are passed explicitly. For code that cannot thread one through,
//! `TrackingScope` installs a task-local ambient tracker around a future;
//! detached containers read through it and refuse writes.
//!
//! Subscriber callbacks are never invoked while an atom's lock is held, so a
//! subscriber may freely unsubscribe itself or read other atoms.

mod atom;
mod cell;
mod context;
mod cursor;
mod memo;
mod object;
mod subscriber;
mod tracker;
mod value;

pub use atom::{Atom, AtomId};
pub use cell::Ref;
pub use context::{AmbientTracker, TrackingScope};
pub use cursor::Cursor;
pub use memo::{AsyncMemo, Computation, MemoState};
pub use object::{Attached, ReactiveObject};
pub use subscriber::{AtomSubscriber, FnSubscriber, SubscriberId};
pub use tracker::{ChangeTracker, ReadSet, SharedTracker};
pub use value::{Value, ValueMap, ValueSet};
