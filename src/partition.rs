//! Partitions of the expression universe.
//!
//! A partition assigns every universe index a class id; equal ids mean
//! provably equivalent expressions. The lattice's greatest element TOP
//! ("node not yet reached") is a distinct variant rather than a sentinel id,
//! so the all-or-nothing shape invariant holds by construction.

use hashbrown::HashMap;

use crate::registry::{ClassId, ClassRegistry};
use crate::universe::Universe;

/// The equivalence information at one CFG node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Partition {
    /// Unreached: no information. Coarser than every real partition.
    Top,
    /// One class id per universe index.
    Classes(Vec<ClassId>),
}

impl Partition {
    /// The TOP partition.
    pub fn top() -> Self {
        Partition::Top
    }

    /// The start-node partition: every atom in its own fresh class, every
    /// binary canonicalised through the registry.
    pub fn initial(universe: &Universe, registry: &mut ClassRegistry) -> Self {
        let mut ids = Vec::with_capacity(universe.len());
        for _ in 0..universe.num_atoms() {
            ids.push(registry.fresh());
        }
        for i in universe.binary_indices() {
            let (op, lhs, rhs) = universe.binary_at(i);
            let l = ids[universe.atom_index(lhs)];
            let r = ids[universe.atom_index(rhs)];
            ids.push(registry.lookup_or_create(op, l, r));
        }
        Partition::Classes(ids)
    }

    pub fn is_top(&self) -> bool {
        matches!(self, Partition::Top)
    }

    /// The class vector, or `None` for TOP.
    pub fn ids(&self) -> Option<&[ClassId]> {
        match self {
            Partition::Top => None,
            Partition::Classes(ids) => Some(ids),
        }
    }

    /// Whether `self` and `other` induce the same equivalence relation.
    ///
    /// Ids are compared up to renaming: every group of `self` must be
    /// constant under `other`. The check is one-directional; the driver's
    /// iterates only ever refine, so constancy of the older partition's
    /// groups under the newer one is equality.
    pub fn same_partition(&self, other: &Partition) -> bool {
        let (p, q) = match (self.ids(), other.ids()) {
            (None, None) => return true,
            (Some(p), Some(q)) => (p, q),
            _ => return false,
        };
        debug_assert_eq!(p.len(), q.len());

        let mut renaming: HashMap<ClassId, ClassId> = HashMap::new();
        for (pi, qi) in p.iter().zip(q) {
            match renaming.get(pi) {
                Some(mapped) if mapped != qi => return false,
                Some(_) => {}
                None => {
                    renaming.insert(*pi, *qi);
                }
            }
        }
        true
    }

    /// All indices sharing a class with `index`.
    ///
    /// For TOP this is every index: an unreached node constrains nothing, so
    /// intersecting with its classes must be a no-op.
    pub fn class_of(&self, index: usize, len: usize) -> Vec<usize> {
        match self {
            Partition::Top => (0..len).collect(),
            Partition::Classes(ids) => {
                let id = ids[index];
                (0..ids.len()).filter(|&j| ids[j] == id).collect()
            }
        }
    }
}
