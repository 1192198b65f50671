use thiserror::Error;

use crate::potts::boundary::BoundaryTracker;
use crate::potts::Spin;

/// Number of cells in the 26-neighborhood of a voxel. Corner and edge
/// neighbors carry the same weight as face neighbors, following Holm's
/// original Fortran convention.
pub const NEIGH_COUNT: usize = 26;

/// Sentinel spin marking an empty slot in a voxel's neighbor table.
pub const NO_NEIGHBOR: Spin = 0;

#[derive(Error, Debug)]
pub enum VoxelError {
    #[error("neighbor table overflow at voxel {index}: all 26 slots occupied")]
    NeighborTableOverflow { index: usize },
}

/// A single cell of the lattice.
///
/// Each voxel keeps an inline table of the *foreign* grains present in its
/// 26-neighborhood together with the probability of flipping to each. The
/// table is unique per spin and never contains the voxel's own spin; its
/// `activity` is the sum of the stored probabilities. A fixed-capacity
/// inline table keeps the hot path free of allocation: each foreign spin
/// occupies one slot and a voxel has only 26 geometric neighbors, so 26
/// slots always suffice.
#[derive(Debug, Clone)]
pub struct Voxel {
    /// The grain this voxel currently belongs to.
    pub spin: Spin,
    /// Total flip-probability mass of this voxel.
    pub activity: f64,
    /// Linear index of this voxel within the lattice.
    pub index: usize,
    neighbor_spins: [Spin; NEIGH_COUNT],
    neighbor_probs: [f64; NEIGH_COUNT],
}

impl Voxel {
    pub fn new(index: usize) -> Self {
        Voxel {
            spin: 0,
            activity: 0.0,
            index,
            neighbor_spins: [NO_NEIGHBOR; NEIGH_COUNT],
            neighbor_probs: [0.0; NEIGH_COUNT],
        }
    }

    /// Set the probability of flipping to grain `nspin`, returning the
    /// resulting change in this voxel's activity.
    ///
    /// A probability of zero delegates to [`Voxel::remove_neighbor`]. A new
    /// foreign spin claims the first empty slot and the adjacency is
    /// reported to the boundary registry; an existing slot is updated in
    /// place without touching the registry.
    pub fn set_neighbor(
        &mut self,
        nspin: Spin,
        prob: f64,
        boundaries: &mut BoundaryTracker,
    ) -> Result<f64, VoxelError> {
        if prob == 0.0 {
            return Ok(self.remove_neighbor(nspin, boundaries));
        }

        let mut slot = None;
        let mut new_neighbor = true;
        for i in 0..NEIGH_COUNT {
            if self.neighbor_spins[i] == nspin {
                slot = Some(i);
                new_neighbor = false;
                break;
            }
            if slot.is_none() && self.neighbor_spins[i] == NO_NEIGHBOR {
                slot = Some(i);
            }
        }
        let Some(i) = slot else {
            return Err(VoxelError::NeighborTableOverflow { index: self.index });
        };

        if new_neighbor {
            self.neighbor_spins[i] = nspin;
            self.neighbor_probs[i] = prob;
            self.activity += prob;
            boundaries.add_to_boundary(self.spin, nspin, self.index, &self.neighbor_spins);
            Ok(prob)
        } else {
            let delta = prob - self.neighbor_probs[i];
            self.neighbor_probs[i] = prob;
            self.activity += delta;
            Ok(delta)
        }
    }

    /// Remove grain `nspin` from the neighbor table, reporting the removed
    /// adjacency to the registry. Returns the (non-positive) change in
    /// activity; absent spins are a no-op.
    pub fn remove_neighbor(&mut self, nspin: Spin, boundaries: &mut BoundaryTracker) -> f64 {
        for i in 0..NEIGH_COUNT {
            if self.neighbor_spins[i] == nspin {
                self.neighbor_spins[i] = NO_NEIGHBOR;
                let delta = -self.neighbor_probs[i];
                self.neighbor_probs[i] = 0.0;
                self.activity += delta;
                boundaries.remove_from_boundary(self.spin, nspin, self.index, &self.neighbor_spins);
                return delta;
            }
        }
        0.0
    }

    /// Clear the whole neighbor table, reporting every removal to the
    /// registry. Returns the total (non-positive) change in activity.
    pub fn reset(&mut self, boundaries: &mut BoundaryTracker) -> f64 {
        let mut delta = 0.0;
        for i in 0..NEIGH_COUNT {
            let nspin = self.neighbor_spins[i];
            if nspin != NO_NEIGHBOR {
                delta -= self.neighbor_probs[i];
                self.neighbor_spins[i] = NO_NEIGHBOR;
                self.neighbor_probs[i] = 0.0;
                boundaries.remove_from_boundary(self.spin, nspin, self.index, &self.neighbor_spins);
            }
        }
        self.activity = 0.0;
        delta
    }

    pub fn has_neighbor(&self, nspin: Spin) -> bool {
        self.neighbor_spins.contains(&nspin)
    }

    /// Probability stored for `nspin`, or 0 if absent.
    pub fn neighbor_prob(&self, nspin: Spin) -> f64 {
        for i in 0..NEIGH_COUNT {
            if self.neighbor_spins[i] == nspin {
                return self.neighbor_probs[i];
            }
        }
        0.0
    }

    /// Occupied slots of the neighbor table, in slot order.
    pub fn neighbors(&self) -> impl Iterator<Item = (Spin, f64)> + '_ {
        self.neighbor_spins
            .iter()
            .zip(self.neighbor_probs.iter())
            .filter(|(&s, _)| s != NO_NEIGHBOR)
            .map(|(&s, &p)| (s, p))
    }

    /// Pick a flip target from a draw in `[0, activity)`.
    ///
    /// Walks the occupied slots in array order, subtracting each slot's
    /// probability from the draw, and returns the first spin that takes the
    /// running value to zero or below. The slot order is deterministic, so
    /// the sampling distribution is fixed by insertion history.
    pub fn choose_neighbor(&self, desired_activ: f64) -> Option<Spin> {
        let mut remaining = desired_activ;
        for i in 0..NEIGH_COUNT {
            if self.neighbor_spins[i] == NO_NEIGHBOR {
                continue;
            }
            remaining -= self.neighbor_probs[i];
            if remaining <= 0.0 {
                return Some(self.neighbor_spins[i]);
            }
        }
        None
    }
}
