use std::collections::{BTreeMap, BTreeSet};

use crate::potts::voxel::{NEIGH_COUNT, NO_NEIGHBOR};
use crate::potts::Spin;

/// Canonical key for the interface between two grains.
///
/// The smaller spin is always stored first, so the unordered pair (5, 10)
/// and (10, 5) resolve to the same boundary and no redundant objects can
/// exist. Keys double as stable handles: junction maps refer to other
/// boundaries by key, never by reference, so a deleted counterpart leaves a
/// dangling key that is skipped on resolution and pruned by the periodic
/// sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BoundaryKey {
    pub a: Spin,
    pub b: Spin,
}

impl BoundaryKey {
    pub fn new(a: Spin, b: Spin) -> Self {
        if a < b {
            BoundaryKey { a, b }
        } else {
            BoundaryKey { a: b, b: a }
        }
    }
}

/// The interface between two grains, materialised as a first-class object.
#[derive(Debug, Clone)]
pub struct Boundary {
    pub a_spin: Spin,
    pub b_spin: Spin,

    pub marked_for_deletion: bool,
    pub transformed: bool,

    /// Indices of the voxels whose neighbor tables currently evidence this
    /// interface (both sides contribute).
    pub voxels: BTreeSet<usize>,

    pub previous_surface_area: usize,
    pub potential_energy: i64,

    /// Adjacent boundaries and the running tally of voxel-level
    /// triple-junction evidence shared with each. A tally of zero means no
    /// current evidence; such entries may linger until the next sweep.
    pub junctions: BTreeMap<BoundaryKey, i64>,
}

impl Boundary {
    fn new(key: BoundaryKey) -> Self {
        Boundary {
            a_spin: key.a,
            b_spin: key.b,
            marked_for_deletion: false,
            transformed: false,
            voxels: BTreeSet::new(),
            previous_surface_area: 0,
            potential_energy: 0,
            junctions: BTreeMap::new(),
        }
    }

    pub fn key(&self) -> BoundaryKey {
        BoundaryKey::new(self.a_spin, self.b_spin)
    }

    /// Surface area of the boundary, in voxels.
    pub fn area(&self) -> usize {
        self.voxels.len()
    }

    pub fn delta_junction(&mut self, other: BoundaryKey, d_area: i64) {
        *self.junctions.entry(other).or_insert(0) += d_area;
    }
}

/// Flip tallies across one interface, split by direction relative to the
/// canonical key order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlipCounts {
    /// Flips from the smaller spin to the larger.
    pub low_to_high: u64,
    /// Flips from the larger spin to the smaller.
    pub high_to_low: u64,
}

/// Registry owning every [`Boundary`], keyed by canonical spin pair.
///
/// Iteration order is the key order, which is what the transformation
/// driver relies on as the registry's canonical traversal order.
#[derive(Debug, Default)]
pub struct BoundaryTracker {
    boundaries: BTreeMap<BoundaryKey, Boundary>,
    transformed_count: usize,
    flip_counts: BTreeMap<BoundaryKey, FlipCounts>,
}

impl BoundaryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_boundary_count(&self) -> usize {
        self.boundaries.len()
    }

    pub fn transformed_boundary_count(&self) -> usize {
        self.transformed_count
    }

    pub fn get(&self, key: BoundaryKey) -> Option<&Boundary> {
        self.boundaries.get(&key)
    }

    pub fn get_mut(&mut self, key: BoundaryKey) -> Option<&mut Boundary> {
        self.boundaries.get_mut(&key)
    }

    /// The boundary between grains `a` and `b`, if it exists.
    pub fn between(&self, a: Spin, b: Spin) -> Option<&Boundary> {
        self.get(BoundaryKey::new(a, b))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BoundaryKey, &Boundary)> {
        self.boundaries.iter()
    }

    /// Keys of every boundary, in canonical order.
    pub fn boundary_keys(&self) -> Vec<BoundaryKey> {
        self.boundaries.keys().copied().collect()
    }

    /// Find the boundary between two grains, creating it if absent. A
    /// pending deletion mark is cleared, since fresh evidence of the
    /// adjacency has arrived.
    pub fn find_or_create(&mut self, a: Spin, b: Spin) -> &mut Boundary {
        let key = BoundaryKey::new(a, b);
        let boundary = self.boundaries.entry(key).or_insert_with(|| Boundary::new(key));
        boundary.marked_for_deletion = false;
        boundary
    }

    /// Whether the boundary between `a` and `b` is transformed. Absent
    /// boundaries are reported untransformed; the query never creates.
    pub fn is_transformed(&self, a: Spin, b: Spin) -> bool {
        self.between(a, b).is_some_and(|boundary| boundary.transformed)
    }

    /// Mark the boundary between two grains as transformed, creating it if
    /// necessary. The transformed counter moves exactly once per boundary.
    pub fn mark_transformed(&mut self, a: Spin, b: Spin) {
        let key = self.find_or_create(a, b).key();
        self.mark_transformed_key(key);
    }

    /// Mark an existing boundary, by key. Absent keys are a no-op.
    pub fn mark_transformed_key(&mut self, key: BoundaryKey) {
        if let Some(boundary) = self.boundaries.get_mut(&key) {
            if !boundary.transformed {
                boundary.transformed = true;
                self.transformed_count += 1;
            }
        }
    }

    /// Record voxel `index` on the (a, b) boundary and credit a junction
    /// towards (a, s) for every other foreign spin `s` in the voxel's
    /// table.
    ///
    /// `a` is always the root voxel's own spin, so junction evidence is
    /// credited to (a, s) and never to (b, s).
    pub fn add_to_boundary(
        &mut self,
        a: Spin,
        b: Spin,
        index: usize,
        voxel_neighbor_spins: &[Spin; NEIGH_COUNT],
    ) {
        let key = BoundaryKey::new(a, b);
        self.find_or_create(a, b).voxels.insert(index);
        for &s in voxel_neighbor_spins {
            if s != NO_NEIGHBOR && s != a && s != b {
                let junction = self.find_or_create(a, s).key();
                if let Some(boundary) = self.boundaries.get_mut(&key) {
                    boundary.delta_junction(junction, 1);
                }
            }
        }
    }

    /// Remove voxel `index` from the (a, b) boundary, reversing the
    /// junction credits. An emptied boundary is marked for deletion (its
    /// junction tallies are left to the sweep).
    pub fn remove_from_boundary(
        &mut self,
        a: Spin,
        b: Spin,
        index: usize,
        voxel_neighbor_spins: &[Spin; NEIGH_COUNT],
    ) {
        let key = BoundaryKey::new(a, b);
        {
            let boundary = self.find_or_create(a, b);
            boundary.voxels.remove(&index);
            if boundary.area() == 0 {
                boundary.marked_for_deletion = true;
                return;
            }
        }
        for &s in voxel_neighbor_spins {
            if s != NO_NEIGHBOR && s != a && s != b {
                let junction = self.find_or_create(a, s).key();
                if let Some(boundary) = self.boundaries.get_mut(&key) {
                    boundary.delta_junction(junction, -1);
                }
            }
        }
    }

    /// Unlink and drop a boundary.
    ///
    /// Any accumulated potential energy is handed to a surviving junction
    /// partner: preferably a transformed one that already holds energy,
    /// else any transformed one, else the first live junction. Dangling
    /// junction keys are skipped.
    pub fn delete_boundary(&mut self, key: BoundaryKey) {
        let Some(boundary) = self.boundaries.remove(&key) else {
            return;
        };
        if boundary.transformed {
            self.transformed_count -= 1;
        }

        if boundary.potential_energy != 0 && !boundary.junctions.is_empty() {
            let mut transfer: Option<BoundaryKey> = None;
            for junction in boundary.junctions.keys() {
                let Some(other) = self.boundaries.get(junction) else {
                    continue;
                };
                if other.transformed {
                    if other.potential_energy > 0 {
                        transfer = Some(*junction);
                        break;
                    }
                    if transfer.is_none() {
                        transfer = Some(*junction);
                    }
                }
            }
            if transfer.is_none() {
                transfer = boundary
                    .junctions
                    .keys()
                    .find(|junction| self.boundaries.contains_key(junction))
                    .copied();
            }
            if let Some(target) = transfer {
                if let Some(other) = self.boundaries.get_mut(&target) {
                    other.potential_energy += boundary.potential_energy;
                }
            }
        }
    }

    /// Sweep: prune junction entries whose counterpart is doomed, dangling
    /// or carries a non-positive tally, then delete every marked (or
    /// empty) boundary.
    pub fn remove_marked_boundaries(&mut self) {
        let doomed: BTreeSet<BoundaryKey> = self
            .boundaries
            .iter()
            .filter(|(_, boundary)| boundary.marked_for_deletion || boundary.area() == 0)
            .map(|(key, _)| *key)
            .collect();

        let survivors: Vec<BoundaryKey> = self
            .boundaries
            .keys()
            .filter(|key| !doomed.contains(key))
            .copied()
            .collect();
        for key in survivors {
            let prune: Vec<BoundaryKey> = self.boundaries[&key]
                .junctions
                .iter()
                .filter(|(junction, &tally)| {
                    tally <= 0
                        || doomed.contains(junction)
                        || !self.boundaries.contains_key(junction)
                })
                .map(|(junction, _)| *junction)
                .collect();
            if let Some(boundary) = self.boundaries.get_mut(&key) {
                for junction in prune {
                    boundary.junctions.remove(&junction);
                }
            }
        }

        for key in doomed {
            self.delete_boundary(key);
        }
    }

    /// Record one voxel flip across the (old, new) interface in the
    /// velocity table.
    pub fn track_flip(&mut self, old_spin: Spin, new_spin: Spin) {
        let key = BoundaryKey::new(old_spin, new_spin);
        let counts = self.flip_counts.entry(key).or_default();
        if old_spin < new_spin {
            counts.low_to_high += 1;
        } else {
            counts.high_to_low += 1;
        }
    }

    pub fn flip_counts(&self) -> &BTreeMap<BoundaryKey, FlipCounts> {
        &self.flip_counts
    }

    pub fn reset_flip_counts(&mut self) {
        self.flip_counts.clear();
    }
}
