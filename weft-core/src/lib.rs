//! Weft Core
//!
//! This crate provides the incremental computation core of Weft. It
//! implements:
//!
//! - Atoms and the subscriber protocol used for change notification
//! - Reactive containers that report reads and writes per key
//! - Memoized async computations that cache until a dependency changes
//! - A coordinator that refreshes a set of computations as one batch
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Atoms, trackers, containers and async memos
//! - `scene`: Execution contexts and causal spans
//! - `refresh`: Batch refresh of named memos
//! - `error`: The crate error type
//!
//! # Example
//!
//! ```rust
//! use weft_core::reactive::{AsyncMemo, ReactiveObject, Value};
//! use weft_core::scene::{Scene, Span};
//!
//! # tokio_test_block(async {
//! let state = ReactiveObject::new([("count", Value::from(1))]);
//!
//! // A memo that reads the count
//! let doubled = {
//!     let state = state.clone();
//!     AsyncMemo::new(move |scene: Scene| {
//!         let count = state.attach_to(scene).get("count").and_then(|c| c.as_i64());
//!         async move { Ok(count? * 2) }
//!     })
//! };
//!
//! let scene = Scene::read_write(Span::new("example"));
//! assert_eq!(doubled.get(&scene).await.unwrap(), 2);
//!
//! // Writing through a read-write scene invalidates the memo
//! state.attach_to(scene.clone()).set("count", 5).unwrap();
//! assert_eq!(doubled.get(&scene).await.unwrap(), 10);
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

pub mod error;
pub mod reactive;
pub mod refresh;
pub mod scene;

pub use error::{ReactiveError, Result};
pub use reactive::{AsyncMemo, Atom, ChangeTracker, ReactiveObject, Ref, Value};
pub use refresh::{ExecutingFlag, RefreshConfig, RefreshCoordinator};
pub use scene::{Scene, SceneMode, Span};
