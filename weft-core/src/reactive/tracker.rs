//! The change tracker protocol.
//!
//! A change tracker connects a running computation to the atoms it touches:
//! containers report reads and writes to whatever tracker they are attached
//! to, and the tracker decides what that means (subscribe a memo, notify
//! subscribers, reject writes in a read-only scene, ...).

use std::sync::Arc;

use indexmap::IndexSet;
use parking_lot::Mutex;

use super::atom::Atom;
use crate::error::{ReactiveError, Result};

/// Records reads of atoms and propagates changes to them.
pub trait ChangeTracker: Send + Sync {
    /// Record that the current computation read `atom`.
    fn on_atom_read(&self, atom: &Atom) -> Result<()>;

    /// Record that `atom` changed.
    fn on_atom_changed(&self, atom: &Atom) -> Result<()>;
}

impl<T: ChangeTracker + ?Sized> ChangeTracker for Arc<T> {
    fn on_atom_read(&self, atom: &Atom) -> Result<()> {
        (**self).on_atom_read(atom)
    }

    fn on_atom_changed(&self, atom: &Atom) -> Result<()> {
        (**self).on_atom_changed(atom)
    }
}

/// Shared, type-erased tracker handle.
pub type SharedTracker = Arc<dyn ChangeTracker>;

/// A tracker that only collects the atoms read through it.
///
/// Changes are rejected: a read set describes an evaluation that must not
/// have side effects.
#[derive(Debug, Default)]
pub struct ReadSet {
    atoms: Mutex<IndexSet<Atom>>,
}

impl ReadSet {
    /// Create an empty read set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Atoms read so far, in first-read order.
    pub fn atoms(&self) -> Vec<Atom> {
        self.atoms.lock().iter().cloned().collect()
    }

    /// Number of distinct atoms read.
    pub fn len(&self) -> usize {
        self.atoms.lock().len()
    }

    /// Whether nothing has been read.
    pub fn is_empty(&self) -> bool {
        self.atoms.lock().is_empty()
    }

    /// Whether `atom` has been read.
    pub fn contains(&self, atom: &Atom) -> bool {
        self.atoms.lock().contains(atom)
    }
}

impl ChangeTracker for ReadSet {
    fn on_atom_read(&self, atom: &Atom) -> Result<()> {
        self.atoms.lock().insert(atom.clone());
        Ok(())
    }

    fn on_atom_changed(&self, atom: &Atom) -> Result<()> {
        Err(ReactiveError::ReadonlyViolation {
            scene: "read set".to_string(),
            atom: atom.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_set_deduplicates_reads() {
        let reads = ReadSet::new();
        let a = Atom::new();
        let b = Atom::new();

        reads.on_atom_read(&a).unwrap();
        reads.on_atom_read(&b).unwrap();
        reads.on_atom_read(&a).unwrap();

        assert_eq!(reads.len(), 2);
        assert_eq!(reads.atoms(), vec![a.clone(), b]);
        assert!(reads.contains(&a));
    }

    #[test]
    fn read_set_rejects_changes() {
        let reads = ReadSet::new();
        let err = reads.on_atom_changed(&Atom::labeled("x")).unwrap_err();
        assert!(matches!(err, ReactiveError::ReadonlyViolation { .. }));
    }

    #[test]
    fn shared_tracker_delegates() {
        let reads = Arc::new(ReadSet::new());
        let shared: SharedTracker = reads.clone();
        let atom = Atom::new();

        shared.on_atom_read(&atom).unwrap();
        assert!(reads.contains(&atom));
    }
}
